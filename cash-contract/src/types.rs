//! Value model for the cash contract
//!
//! All types are designed for:
//! - Immutability (records are consumed, never mutated)
//! - Deterministic serialization (bincode signing payloads)
//! - Exact arithmetic (integer minor units, no rounding)

use crate::error::AmountError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// ISO 4217 currency code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// British Pound
    GBP,
    /// Swiss Franc
    CHF,
    /// Japanese Yen
    JPY,
    /// UAE Dirham
    AED,
    /// Indian Rupee
    INR,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::CHF => "CHF",
            Currency::JPY => "JPY",
            Currency::AED => "AED",
            Currency::INR => "INR",
        }
    }

    /// Number of decimal places of the minor unit
    pub fn minor_exponent(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "CHF" => Ok(Currency::CHF),
            "JPY" => Ok(Currency::JPY),
            "AED" => Ok(Currency::AED),
            "INR" => Ok(Currency::INR),
            other => Err(format!("unknown currency code: {other}")),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A non-negative quantity of one currency, in minor units.
///
/// Arithmetic between different currencies is a programming error: the
/// operator forms panic, the `try_` forms return [`AmountError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    /// Quantity in the currency's minor unit (cents, pence, ...)
    pub minor_units: u64,
    /// Currency
    pub currency: Currency,
}

impl Amount {
    /// Create an amount
    pub fn new(minor_units: u64, currency: Currency) -> Self {
        Self {
            minor_units,
            currency,
        }
    }

    /// Zero of the given currency
    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Whether the amount is zero
    pub fn is_zero(&self) -> bool {
        self.minor_units == 0
    }

    /// Checked addition
    pub fn try_add(self, rhs: Amount) -> Result<Amount, AmountError> {
        self.same_currency(&rhs)?;
        self.minor_units
            .checked_add(rhs.minor_units)
            .map(|units| Amount::new(units, self.currency))
            .ok_or(AmountError::Overflow(self.currency))
    }

    /// Checked subtraction
    pub fn try_sub(self, rhs: Amount) -> Result<Amount, AmountError> {
        self.same_currency(&rhs)?;
        self.minor_units
            .checked_sub(rhs.minor_units)
            .map(|units| Amount::new(units, self.currency))
            .ok_or(AmountError::Underflow(self.currency))
    }

    fn same_currency(&self, rhs: &Amount) -> Result<(), AmountError> {
        if self.currency == rhs.currency {
            Ok(())
        } else {
            Err(AmountError::CurrencyMismatch {
                left: self.currency,
                right: rhs.currency,
            })
        }
    }
}

impl Add for Amount {
    type Output = Amount;

    /// # Panics
    ///
    /// On currency mismatch or overflow.
    fn add(self, rhs: Amount) -> Amount {
        match self.try_add(rhs) {
            Ok(sum) => sum,
            Err(e) => panic!("invalid amount addition: {e}"),
        }
    }
}

impl Sub for Amount {
    type Output = Amount;

    /// # Panics
    ///
    /// On currency mismatch or underflow.
    fn sub(self, rhs: Amount) -> Amount {
        match self.try_sub(rhs) {
            Ok(diff) => diff,
            Err(e) => panic!("invalid amount subtraction: {e}"),
        }
    }
}

/// Amounts of different currencies are unordered.
impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (self.currency == other.currency).then(|| self.minor_units.cmp(&other.minor_units))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let exponent = self.currency.minor_exponent();
        if exponent == 0 {
            return write!(f, "{} {}", self.minor_units, self.currency);
        }
        let scale = 10u64.pow(exponent);
        write!(
            f,
            "{}.{:0width$} {}",
            self.minor_units / scale,
            self.minor_units % scale,
            self.currency,
            width = exponent as usize
        )
    }
}

/// Identity of an owner or signer: the DER (SubjectPublicKeyInfo) encoding of
/// a public key. Serialized as a hex string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartyKey(Vec<u8>);

impl PartyKey {
    /// Wrap DER-encoded public key bytes
    pub fn from_der(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Parse from a hex string
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(s).map(Self)
    }

    /// DER bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Full hex encoding
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// Prints the trailing 8 bytes; the DER prefix is shared by every key of a
/// scheme.
impl fmt::Display for PartyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tail = &self.0[self.0.len().saturating_sub(8)..];
        write!(f, "key:{}", hex::encode(tail))
    }
}

impl fmt::Debug for PartyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PartyKey({self})")
    }
}

impl Serialize for PartyKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PartyKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PartyKey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A custodian institution, identified by its signing key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Institution {
    /// Display name
    pub name: String,
    /// Key that authorizes exits from this institution
    pub owning_key: PartyKey,
}

impl Institution {
    /// Create an institution
    pub fn new(name: impl Into<String>, owning_key: PartyKey) -> Self {
        Self {
            name: name.into(),
            owning_key,
        }
    }
}

impl fmt::Display for Institution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Reference to the reserve backing a cash state: which institution holds
/// it and under which opaque deposit reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Deposit {
    /// Custodian institution
    pub institution: Institution,
    /// Opaque account/reserve reference at the institution
    #[serde(with = "serde_bytes")]
    pub reference: Vec<u8>,
}

impl Deposit {
    /// Create a deposit reference
    pub fn new(institution: Institution, reference: impl Into<Vec<u8>>) -> Self {
        Self {
            institution,
            reference: reference.into(),
        }
    }
}

impl fmt::Display for Deposit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "deposit {} at {}",
            hex::encode(&self.reference),
            self.institution
        )
    }
}

/// Identifier of the contract program that governs a ledger state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgramId([u8; 32]);

impl ProgramId {
    /// SHA-256 of the program name
    pub fn of(name: &str) -> Self {
        Self(Sha256::digest(name.as_bytes()).into())
    }

    /// The cash program
    pub fn cash() -> Self {
        Self::of("cash")
    }

    /// Raw hash bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A claim on the cash reserves of some institution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CashState {
    /// Where the backing currency can be found
    pub deposit: Deposit,
    /// Value of the claim
    pub amount: Amount,
    /// Key that must sign a move command to spend this state
    pub owner: PartyKey,
}

impl CashState {
    /// Create a cash state
    pub fn new(deposit: Deposit, amount: Amount, owner: PartyKey) -> Self {
        Self {
            deposit,
            amount,
            owner,
        }
    }

    /// Program governing cash states
    pub fn program_ref(&self) -> ProgramId {
        ProgramId::cash()
    }
}

impl fmt::Display for CashState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cash({} at {} owned by {})",
            self.amount, self.deposit, self.owner
        )
    }
}

/// A state governed by some other contract, carried opaquely
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignState {
    /// Governing program
    pub program: ProgramId,
    /// Contract-specific encoding
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

/// Any state a transaction can consume or create
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerState {
    /// Cash claim, validated by this crate
    Cash(CashState),
    /// State of another contract, ignored by the cash validator
    Foreign(ForeignState),
}

impl LedgerState {
    /// The cash state, if this is one
    pub fn as_cash(&self) -> Option<&CashState> {
        match self {
            LedgerState::Cash(cash) => Some(cash),
            LedgerState::Foreign(_) => None,
        }
    }

    /// Program governing this state
    pub fn program_ref(&self) -> ProgramId {
        match self {
            LedgerState::Cash(cash) => cash.program_ref(),
            LedgerState::Foreign(foreign) => foreign.program,
        }
    }
}

impl From<CashState> for LedgerState {
    fn from(cash: CashState) -> Self {
        LedgerState::Cash(cash)
    }
}

/// Commands understood by the cash contract
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Proves ownership of inputs; the signature covers the transaction states
    Move,
    /// Declares that an amount has left the ledger at the signing institution
    Exit(Amount),
}

/// A command together with the keys whose signatures over the transaction
/// have already been checked.
///
/// Only the signature verification path ([`crate::crypto::SchemeRegistry::authorize`])
/// can build one, so holding a value means the signatures were verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizedCommand {
    command: Command,
    signers: BTreeSet<PartyKey>,
}

impl AuthorizedCommand {
    pub(crate) fn new(command: Command, signers: BTreeSet<PartyKey>) -> Self {
        Self { command, signers }
    }

    /// The authorized command
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Keys whose signatures were verified
    pub fn signers(&self) -> &BTreeSet<PartyKey> {
        &self.signers
    }

    /// Whether `key` signed this command
    pub fn is_signed_by(&self, key: &PartyKey) -> bool {
        self.signers.contains(key)
    }
}

/// Cash states of one deposit, in first-appearance order
#[derive(Debug)]
pub(crate) struct DepositGroup<'a> {
    pub deposit: &'a Deposit,
    pub states: Vec<&'a CashState>,
}

/// Group cash states by deposit, keeping the order in which each deposit
/// first appears.
pub(crate) fn group_by_deposit<'a>(
    states: impl IntoIterator<Item = &'a CashState>,
) -> Vec<DepositGroup<'a>> {
    let mut groups: Vec<DepositGroup<'a>> = Vec::new();
    let mut index: HashMap<&'a Deposit, usize> = HashMap::new();

    for state in states {
        match index.get(&state.deposit) {
            Some(&i) => groups[i].states.push(state),
            None => {
                index.insert(&state.deposit, groups.len());
                groups.push(DepositGroup {
                    deposit: &state.deposit,
                    states: vec![state],
                });
            }
        }
    }

    groups
}

fn fold_amounts<'a>(
    amounts: impl IntoIterator<Item = &'a Amount>,
) -> Result<Option<Amount>, AmountError> {
    amounts.into_iter().try_fold(None::<Amount>, |total, amount| match total {
        None => Ok(Some(*amount)),
        Some(total) => total.try_add(*amount).map(Some),
    })
}

/// Total of all cash states; `None` when there are none
pub fn sum_cash<'a>(
    states: impl IntoIterator<Item = &'a LedgerState>,
) -> Result<Option<Amount>, AmountError> {
    fold_amounts(
        states
            .into_iter()
            .filter_map(LedgerState::as_cash)
            .map(|cash| &cash.amount),
    )
}

/// Total of the cash states owned by `owner`; `None` when there are none
pub fn sum_cash_by<'a>(
    states: impl IntoIterator<Item = &'a LedgerState>,
    owner: &PartyKey,
) -> Result<Option<Amount>, AmountError> {
    fold_amounts(
        states
            .into_iter()
            .filter_map(LedgerState::as_cash)
            .filter(|cash| &cash.owner == owner)
            .map(|cash| &cash.amount),
    )
}

/// Total of all cash states, or zero of `currency` when there are none
pub fn sum_cash_or_zero<'a>(
    states: impl IntoIterator<Item = &'a LedgerState>,
    currency: Currency,
) -> Result<Amount, AmountError> {
    let total = sum_cash(states)?.unwrap_or_else(|| Amount::zero(currency));
    if total.currency != currency {
        return Err(AmountError::CurrencyMismatch {
            left: currency,
            right: total.currency,
        });
    }
    Ok(total)
}
