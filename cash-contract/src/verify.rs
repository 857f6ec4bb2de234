//! Cash verification engine
//!
//! Decides whether a single proposed transaction is internally consistent
//! for the cash contract. Ordering between conflicting transactions and
//! double-spend detection belong to the notary, not to this module.
//!
//! # Checks (in order, first failure wins)
//!
//! 1. At least one cash input, none of them zero
//! 2. One currency across cash inputs and outputs
//! 3. Per deposit: inputs == outputs + exit authorized by the institution
//! 4. Every cash output belongs to an input deposit
//! 5. Input owners == move signers (see [`SignerPolicy`])
//!
//! States of other contracts are ignored; each contract validates its own
//! slice of a transaction.

use crate::config::{SignerPolicy, VerifierConfig};
use crate::error::VerifyError;
use crate::transaction::ProposedTransaction;
use crate::types::{
    group_by_deposit, Amount, AuthorizedCommand, CashState, Command, Currency, Deposit,
    Institution, PartyKey,
};
use std::collections::BTreeSet;

/// Verification engine for cash transactions
#[derive(Debug, Clone, Default)]
pub struct CashVerifier {
    config: VerifierConfig,
}

impl CashVerifier {
    /// Create a verifier
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    /// Active signer policy
    pub fn signer_policy(&self) -> SignerPolicy {
        self.config.signer_policy
    }

    /// Accept (`Ok`) or reject the transaction
    pub fn verify(&self, tx: &ProposedTransaction) -> Result<(), VerifyError> {
        let result = self.check(tx);
        match &result {
            Ok(()) => tracing::debug!(
                inputs = tx.inputs.len(),
                outputs = tx.outputs.len(),
                commands = tx.commands.len(),
                "Cash transaction accepted"
            ),
            Err(reason) => tracing::debug!(%reason, "Cash transaction rejected"),
        }
        result
    }

    fn check(&self, tx: &ProposedTransaction) -> Result<(), VerifyError> {
        let cash_inputs: Vec<(usize, &CashState)> = tx
            .inputs
            .iter()
            .enumerate()
            .filter_map(|(index, state)| state.as_cash().map(|cash| (index, cash)))
            .collect();
        // There may be no cash outputs at all if everything is exiting.
        let cash_outputs: Vec<&CashState> = tx.cash_outputs().collect();

        let currency = check_inputs(&cash_inputs)?;
        if let Some(output) = cash_outputs.iter().find(|o| o.amount.currency != currency) {
            return Err(VerifyError::CurrencyMismatch {
                expected: currency,
                found: output.amount.currency,
            });
        }

        let groups = group_by_deposit(cash_inputs.iter().map(|(_, state)| *state));
        let mut outputs_left = cash_outputs.len();
        let mut required_owners = BTreeSet::new();

        for group in &groups {
            let outputs: Vec<&CashState> = cash_outputs
                .iter()
                .copied()
                .filter(|o| &o.deposit == group.deposit)
                .collect();
            outputs_left -= outputs.len();

            let overflow = || VerifyError::AmountOverflow {
                deposit: group.deposit.clone(),
            };
            let input_amount = sum_or_zero(group.states.iter().map(|s| s.amount), currency)
                .ok_or_else(overflow)?;
            let output_amount =
                sum_or_zero(outputs.iter().map(|s| s.amount), currency).ok_or_else(overflow)?;
            let exiting =
                exited_amount(&tx.commands, &group.deposit.institution, currency)?;
            let actual = output_amount.try_add(exiting).map_err(|_| overflow())?;

            if input_amount != actual {
                return Err(VerifyError::BalanceMismatch {
                    deposit: group.deposit.clone(),
                    expected: input_amount,
                    actual,
                });
            }

            let fully_exited = outputs.is_empty() && !exiting.is_zero();
            if !(fully_exited && self.config.signer_policy == SignerPolicy::ExemptFullyExited) {
                required_owners.extend(group.states.iter().map(|s| s.owner.clone()));
            }
        }

        if outputs_left > 0 {
            let stray = cash_outputs
                .iter()
                .find(|o| !groups.iter().any(|g| g.deposit == &o.deposit));
            if let Some(stray) = stray {
                return Err(VerifyError::UnattributedOutput {
                    deposit: stray.deposit.clone(),
                });
            }
        }

        // Signatures were checked against the transaction by the platform
        // before the commands reached us; only the key sets matter here.
        let owners: BTreeSet<PartyKey> = cash_inputs
            .iter()
            .map(|(_, state)| state.owner.clone())
            .collect();
        let signers = move_signers(&tx.commands);

        let accepted = match self.config.signer_policy {
            SignerPolicy::Strict => owners == signers,
            SignerPolicy::ExemptFullyExited => {
                required_owners.is_subset(&signers) && signers.is_subset(&owners)
            }
        };
        if !accepted {
            let expected_owners = match self.config.signer_policy {
                SignerPolicy::Strict => owners,
                SignerPolicy::ExemptFullyExited => required_owners,
            };
            return Err(VerifyError::SignerMismatch {
                expected_owners,
                actual_signers: signers,
            });
        }

        Ok(())
    }
}

/// Verify with the default (strict) configuration
pub fn verify(tx: &ProposedTransaction) -> Result<(), VerifyError> {
    CashVerifier::default().verify(tx)
}

/// Non-empty, no zero amounts, single currency. Returns that currency.
fn check_inputs(cash_inputs: &[(usize, &CashState)]) -> Result<Currency, VerifyError> {
    let (_, first) = cash_inputs.first().ok_or(VerifyError::EmptyInputSet)?;

    if let Some((index, _)) = cash_inputs.iter().find(|(_, s)| s.amount.is_zero()) {
        return Err(VerifyError::ZeroAmountInput { index: *index });
    }

    let currency = first.amount.currency;
    if let Some((_, state)) = cash_inputs.iter().find(|(_, s)| s.amount.currency != currency) {
        return Err(VerifyError::CurrencyMismatch {
            expected: currency,
            found: state.amount.currency,
        });
    }

    Ok(currency)
}

fn sum_or_zero(amounts: impl Iterator<Item = Amount>, currency: Currency) -> Option<Amount> {
    amounts.fold(Some(Amount::zero(currency)), |total, amount| {
        total.and_then(|t| t.try_add(amount).ok())
    })
}

/// Amount exited at `institution`: zero without an exit command, an error
/// when more than one exit is signed by the institution.
fn exited_amount(
    commands: &[AuthorizedCommand],
    institution: &Institution,
    currency: Currency,
) -> Result<Amount, VerifyError> {
    let exits: Vec<&Amount> = commands
        .iter()
        .filter(|c| c.is_signed_by(&institution.owning_key))
        .filter_map(|c| match c.command() {
            Command::Exit(amount) => Some(amount),
            Command::Move => None,
        })
        .collect();

    match exits.as_slice() {
        [] => Ok(Amount::zero(currency)),
        [amount] if amount.currency == currency => Ok(**amount),
        [amount] => Err(VerifyError::CurrencyMismatch {
            expected: currency,
            found: amount.currency,
        }),
        many => Err(VerifyError::AmbiguousExitCommand {
            institution: institution.clone(),
            count: many.len(),
        }),
    }
}

fn move_signers(commands: &[AuthorizedCommand]) -> BTreeSet<PartyKey> {
    commands
        .iter()
        .filter_map(|c| match c.command() {
            Command::Move => Some(c.signers()),
            Command::Exit(_) => None,
        })
        .flatten()
        .cloned()
        .collect()
}

/// Deposits present among the cash inputs, in first-appearance order
pub fn input_deposits(tx: &ProposedTransaction) -> Vec<Deposit> {
    group_by_deposit(tx.cash_inputs())
        .into_iter()
        .map(|group| group.deposit.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ForeignState, LedgerState, ProgramId};
    use chrono::{TimeZone, Utc};

    fn key(byte: u8) -> PartyKey {
        PartyKey::from_der(vec![byte; 12])
    }

    fn bank() -> Institution {
        Institution::new("MegaBank", key(0xb1))
    }

    fn other_bank() -> Institution {
        Institution::new("OtherBank", key(0xb2))
    }

    fn deposit_x() -> Deposit {
        Deposit::new(bank(), b"x".to_vec())
    }

    fn deposit_y() -> Deposit {
        Deposit::new(other_bank(), b"y".to_vec())
    }

    fn usd(units: u64) -> Amount {
        Amount::new(units, Currency::USD)
    }

    fn cash(deposit: Deposit, amount: Amount, owner: u8) -> LedgerState {
        LedgerState::Cash(CashState::new(deposit, amount, key(owner)))
    }

    fn move_by(owners: &[u8]) -> AuthorizedCommand {
        AuthorizedCommand::new(Command::Move, owners.iter().map(|b| key(*b)).collect())
    }

    fn exit_by(amount: Amount, institution: &Institution) -> AuthorizedCommand {
        AuthorizedCommand::new(
            Command::Exit(amount),
            BTreeSet::from([institution.owning_key.clone()]),
        )
    }

    fn tx(
        inputs: Vec<LedgerState>,
        outputs: Vec<LedgerState>,
        commands: Vec<AuthorizedCommand>,
    ) -> ProposedTransaction {
        ProposedTransaction {
            inputs,
            outputs,
            commands,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn relaxed() -> CashVerifier {
        CashVerifier::new(VerifierConfig {
            signer_policy: SignerPolicy::ExemptFullyExited,
        })
    }

    #[test]
    fn test_simple_move_accepted() {
        let t = tx(
            vec![cash(deposit_x(), usd(100), 1)],
            vec![cash(deposit_x(), usd(100), 2)],
            vec![move_by(&[1])],
        );
        assert_eq!(verify(&t), Ok(()));
    }

    #[test]
    fn test_no_cash_inputs_rejected() {
        let foreign = LedgerState::Foreign(ForeignState {
            program: ProgramId::of("bond"),
            payload: vec![7],
        });
        let t = tx(vec![foreign], vec![], vec![]);
        assert_eq!(verify(&t), Err(VerifyError::EmptyInputSet));
    }

    #[test]
    fn test_zero_input_reports_position() {
        let foreign = LedgerState::Foreign(ForeignState {
            program: ProgramId::of("bond"),
            payload: vec![],
        });
        let t = tx(
            vec![foreign, cash(deposit_x(), usd(10), 1), cash(deposit_x(), usd(0), 1)],
            vec![cash(deposit_x(), usd(10), 2)],
            vec![move_by(&[1])],
        );
        assert_eq!(verify(&t), Err(VerifyError::ZeroAmountInput { index: 2 }));
    }

    #[test]
    fn test_mixed_input_currencies_rejected() {
        let t = tx(
            vec![
                cash(deposit_x(), usd(10), 1),
                cash(deposit_x(), Amount::new(10, Currency::EUR), 1),
            ],
            vec![],
            vec![move_by(&[1])],
        );
        assert_eq!(
            verify(&t),
            Err(VerifyError::CurrencyMismatch {
                expected: Currency::USD,
                found: Currency::EUR
            })
        );
    }

    #[test]
    fn test_output_currency_must_match_inputs() {
        let t = tx(
            vec![cash(deposit_x(), usd(10), 1)],
            vec![cash(deposit_x(), Amount::new(10, Currency::GBP), 2)],
            vec![move_by(&[1])],
        );
        assert!(matches!(verify(&t), Err(VerifyError::CurrencyMismatch { .. })));
    }

    #[test]
    fn test_exit_currency_must_match_inputs() {
        let t = tx(
            vec![cash(deposit_x(), usd(100), 1)],
            vec![],
            vec![exit_by(Amount::new(100, Currency::EUR), &bank()), move_by(&[1])],
        );
        assert_eq!(
            verify(&t),
            Err(VerifyError::CurrencyMismatch {
                expected: Currency::USD,
                found: Currency::EUR
            })
        );
    }

    #[test]
    fn test_partial_exit_balances() {
        let t = tx(
            vec![cash(deposit_x(), usd(100), 1)],
            vec![cash(deposit_x(), usd(70), 2)],
            vec![exit_by(usd(30), &bank()), move_by(&[1])],
        );
        assert_eq!(verify(&t), Ok(()));
    }

    #[test]
    fn test_exit_signed_by_wrong_institution_is_ignored() {
        let t = tx(
            vec![cash(deposit_x(), usd(100), 1)],
            vec![cash(deposit_x(), usd(70), 2)],
            vec![exit_by(usd(30), &other_bank()), move_by(&[1])],
        );
        assert_eq!(
            verify(&t),
            Err(VerifyError::BalanceMismatch {
                deposit: deposit_x(),
                expected: usd(100),
                actual: usd(70)
            })
        );
    }

    #[test]
    fn test_two_exits_from_same_institution_are_ambiguous() {
        let t = tx(
            vec![cash(deposit_x(), usd(100), 1)],
            vec![],
            vec![
                exit_by(usd(50), &bank()),
                exit_by(usd(50), &bank()),
                move_by(&[1]),
            ],
        );
        assert_eq!(
            verify(&t),
            Err(VerifyError::AmbiguousExitCommand {
                institution: bank(),
                count: 2
            })
        );
    }

    #[test]
    fn test_balance_checked_per_deposit() {
        // Totals match overall, but value moves from X to Y.
        let t = tx(
            vec![cash(deposit_x(), usd(50), 1), cash(deposit_y(), usd(50), 1)],
            vec![cash(deposit_x(), usd(40), 2), cash(deposit_y(), usd(60), 2)],
            vec![move_by(&[1])],
        );
        assert_eq!(
            verify(&t),
            Err(VerifyError::BalanceMismatch {
                deposit: deposit_x(),
                expected: usd(50),
                actual: usd(40)
            })
        );
    }

    #[test]
    fn test_output_at_unknown_deposit_rejected() {
        let t = tx(
            vec![cash(deposit_x(), usd(100), 1)],
            vec![cash(deposit_x(), usd(100), 2), cash(deposit_y(), usd(5), 2)],
            vec![move_by(&[1])],
        );
        assert_eq!(
            verify(&t),
            Err(VerifyError::UnattributedOutput {
                deposit: deposit_y()
            })
        );
    }

    #[test]
    fn test_missing_signer_rejected() {
        let t = tx(
            vec![cash(deposit_x(), usd(50), 1), cash(deposit_x(), usd(50), 3)],
            vec![cash(deposit_x(), usd(100), 2)],
            vec![move_by(&[1])],
        );
        assert_eq!(
            verify(&t),
            Err(VerifyError::SignerMismatch {
                expected_owners: BTreeSet::from([key(1), key(3)]),
                actual_signers: BTreeSet::from([key(1)]),
            })
        );
    }

    #[test]
    fn test_extra_signer_rejected() {
        let t = tx(
            vec![cash(deposit_x(), usd(100), 1)],
            vec![cash(deposit_x(), usd(100), 2)],
            vec![move_by(&[1, 9])],
        );
        assert!(matches!(verify(&t), Err(VerifyError::SignerMismatch { .. })));
    }

    #[test]
    fn test_signers_split_across_move_commands() {
        let t = tx(
            vec![cash(deposit_x(), usd(50), 1), cash(deposit_y(), usd(50), 3)],
            vec![cash(deposit_x(), usd(50), 2), cash(deposit_y(), usd(50), 2)],
            vec![move_by(&[1]), move_by(&[3])],
        );
        assert_eq!(verify(&t), Ok(()));
    }

    #[test]
    fn test_exit_signers_do_not_count_as_move_signers() {
        let t = tx(
            vec![cash(deposit_x(), usd(100), 0xb1)],
            vec![cash(deposit_x(), usd(60), 2)],
            vec![exit_by(usd(40), &bank())],
        );
        assert!(matches!(verify(&t), Err(VerifyError::SignerMismatch { .. })));
    }

    #[test]
    fn test_balance_failure_reported_before_signer_failure() {
        let t = tx(
            vec![cash(deposit_x(), usd(100), 1)],
            vec![cash(deposit_x(), usd(90), 2)],
            vec![],
        );
        assert!(matches!(verify(&t), Err(VerifyError::BalanceMismatch { .. })));
    }

    #[test]
    fn test_deposit_sum_overflow_rejected() {
        let t = tx(
            vec![cash(deposit_x(), usd(u64::MAX), 1), cash(deposit_x(), usd(1), 1)],
            vec![],
            vec![move_by(&[1])],
        );
        assert_eq!(
            verify(&t),
            Err(VerifyError::AmountOverflow {
                deposit: deposit_x()
            })
        );
    }

    #[test]
    fn test_full_exit_without_move_strict_vs_relaxed() {
        let t = tx(
            vec![cash(deposit_x(), usd(100), 1)],
            vec![],
            vec![exit_by(usd(100), &bank())],
        );
        assert_eq!(
            verify(&t),
            Err(VerifyError::SignerMismatch {
                expected_owners: BTreeSet::from([key(1)]),
                actual_signers: BTreeSet::new(),
            })
        );
        assert_eq!(relaxed().verify(&t), Ok(()));
    }

    #[test]
    fn test_relaxed_still_requires_owners_of_moved_deposits() {
        let t = tx(
            vec![cash(deposit_x(), usd(100), 1), cash(deposit_y(), usd(20), 3)],
            vec![cash(deposit_y(), usd(20), 2)],
            vec![exit_by(usd(100), &bank())],
        );
        assert_eq!(
            relaxed().verify(&t),
            Err(VerifyError::SignerMismatch {
                expected_owners: BTreeSet::from([key(3)]),
                actual_signers: BTreeSet::new(),
            })
        );

        let mut signed = t.clone();
        signed.commands.push(move_by(&[3]));
        assert_eq!(relaxed().verify(&signed), Ok(()));

        // Exempt owners may still sign, strangers may not.
        signed.commands.push(move_by(&[1]));
        assert_eq!(relaxed().verify(&signed), Ok(()));
        signed.commands.push(move_by(&[7]));
        assert!(relaxed().verify(&signed).is_err());
    }

    #[test]
    fn test_partial_exit_owner_not_exempt_under_relaxed_policy() {
        let t = tx(
            vec![cash(deposit_x(), usd(100), 1)],
            vec![cash(deposit_x(), usd(60), 2)],
            vec![exit_by(usd(40), &bank())],
        );
        assert!(matches!(
            relaxed().verify(&t),
            Err(VerifyError::SignerMismatch { .. })
        ));
    }

    #[test]
    fn test_input_deposits_in_first_appearance_order() {
        let t = tx(
            vec![
                cash(deposit_y(), usd(1), 1),
                cash(deposit_x(), usd(1), 1),
                cash(deposit_y(), usd(1), 1),
            ],
            vec![],
            vec![],
        );
        assert_eq!(input_deposits(&t), vec![deposit_y(), deposit_x()]);
    }
}
