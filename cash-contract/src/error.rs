//! Error types for the cash contract
//!
//! Each component reports its own error enum so callers can match on the
//! exact failure kind. [`Error`] wraps all of them for code that just wants
//! to propagate with `?`.

use crate::types::{Amount, Currency, Deposit, Institution, PartyKey};
use std::collections::BTreeSet;
use thiserror::Error;

/// Result type for cash contract operations
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error
#[derive(Error, Debug)]
pub enum Error {
    /// Transaction rejected by the verification engine
    #[error("Transaction rejected: {0}")]
    Verify(#[from] VerifyError),

    /// Spend could not be crafted
    #[error("Spend failed: {0}")]
    Craft(#[from] CraftError),

    /// Signature scheme failure
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Amount arithmetic failure
    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Checked amount arithmetic failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountError {
    /// Operands carry different currencies
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch {
        /// Left operand currency
        left: Currency,
        /// Right operand currency
        right: Currency,
    },

    /// Result does not fit in u64 minor units
    #[error("{0} amount overflow")]
    Overflow(Currency),

    /// Subtraction would go negative
    #[error("{0} amount underflow")]
    Underflow(Currency),
}

/// Reasons the verification engine rejects a proposed transaction.
///
/// Variants are listed in the order the checks run; the first failing check
/// wins.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// No cash inputs at all
    #[error("there is no cash input")]
    EmptyInputSet,

    /// A cash input carries a zero amount
    #[error("cash input #{index} has a zero amount")]
    ZeroAmountInput {
        /// Position of the offending record in the transaction inputs
        index: usize,
    },

    /// Inputs, outputs or an exit command disagree on currency
    #[error("currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch {
        /// Currency established by the first cash input
        expected: Currency,
        /// Offending currency
        found: Currency,
    },

    /// Inputs of a deposit do not equal its outputs plus the exited amount
    #[error("amounts do not balance for {deposit}: inputs {expected}, outputs plus exit {actual}")]
    BalanceMismatch {
        /// Deposit group that failed
        deposit: Deposit,
        /// Sum of the group's inputs
        expected: Amount,
        /// Sum of the group's outputs plus the exited amount
        actual: Amount,
    },

    /// A cash output belongs to no input deposit
    #[error("output at {deposit} is not backed by any input deposit")]
    UnattributedOutput {
        /// Deposit of the first unaccounted output
        deposit: Deposit,
    },

    /// More than one exit command is authorized by the same institution
    #[error("{count} exit commands authorized by {institution}")]
    AmbiguousExitCommand {
        /// Institution with conflicting exits
        institution: Institution,
        /// Number of matching exit commands
        count: usize,
    },

    /// Input owners and move signers differ
    #[error("owning keys {} differ from signing keys {}", format_keys(.expected_owners), format_keys(.actual_signers))]
    SignerMismatch {
        /// Owners of the cash inputs that must sign
        expected_owners: BTreeSet<PartyKey>,
        /// Keys that signed move commands
        actual_signers: BTreeSet<PartyKey>,
    },

    /// A deposit total does not fit in u64 minor units
    #[error("amount overflow while summing {deposit}")]
    AmountOverflow {
        /// Deposit being summed
        deposit: Deposit,
    },
}

/// Spend crafting failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CraftError {
    /// Not enough funds of the requested currency
    #[error("insufficient balance: missing {shortfall}")]
    InsufficientBalance {
        /// Amount still missing after all matching records were gathered
        shortfall: Amount,
    },

    /// Nothing to spend
    #[error("cannot spend a zero {0} amount")]
    ZeroTarget(Currency),

    /// Gathered total does not fit in u64 minor units
    #[error("{0} amount overflow while gathering coins")]
    AmountOverflow(Currency),
}

impl CraftError {
    /// Whether the caller can retry with more funds or a smaller amount
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CraftError::InsufficientBalance { .. })
    }
}

/// Signing collaborator failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Scheme name or key type not present in the registry
    #[error("unsupported signature scheme: {0}")]
    UnsupportedScheme(String),

    /// Key bytes could not be decoded by any registered scheme
    #[error("key decode failure: {0}")]
    KeyDecodeFailure(String),

    /// Empty message passed to sign or verify
    #[error("signing or verifying empty data is not allowed")]
    EmptyData,

    /// Scheme cannot derive keys from a caller-supplied seed
    #[error("scheme {0} does not support seeded key generation")]
    SeedingUnsupported(String),

    /// Key encoding or signing primitive failed
    #[error("signing failure: {0}")]
    Signing(String),

    /// A signature did not verify for the claimed signer
    #[error("invalid signature from {signer}")]
    InvalidSignature {
        /// Claimed signer
        signer: PartyKey,
    },

    /// A command arrived without any signature
    #[error("command carries no signatures")]
    NoSigners,

    /// No key pair supplied for a required signer
    #[error("no key available for signer {signer}")]
    MissingKey {
        /// Signer required by the skeleton
        signer: PartyKey,
    },
}

fn format_keys(keys: &BTreeSet<PartyKey>) -> String {
    let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
    format!("[{}]", keys.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_insufficient_balance_is_recoverable() {
        let shortfall = Amount::new(5, Currency::USD);
        assert!(CraftError::InsufficientBalance { shortfall }.is_recoverable());
        assert!(!CraftError::ZeroTarget(Currency::USD).is_recoverable());
        assert!(!CraftError::AmountOverflow(Currency::USD).is_recoverable());
    }

    #[test]
    fn test_signer_mismatch_message_lists_keys() {
        let owner = PartyKey::from_der(vec![0xaa; 12]);
        let err = VerifyError::SignerMismatch {
            expected_owners: BTreeSet::from([owner.clone()]),
            actual_signers: BTreeSet::new(),
        };
        let message = err.to_string();
        assert!(message.contains(&owner.to_string()));
        assert!(message.ends_with("[]"));
    }
}
