//! Proposed transactions and unsigned skeletons

use crate::types::{AuthorizedCommand, CashState, Command, LedgerState, PartyKey};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fully assembled transaction handed to the verification engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposedTransaction {
    /// States consumed, in order
    pub inputs: Vec<LedgerState>,
    /// States created, in order
    pub outputs: Vec<LedgerState>,
    /// Commands with verified signers
    pub commands: Vec<AuthorizedCommand>,
    /// Proposal time; not consulted by the cash checks
    pub timestamp: DateTime<Utc>,
}

impl ProposedTransaction {
    /// Cash inputs, skipping states of other contracts
    pub fn cash_inputs(&self) -> impl Iterator<Item = &CashState> {
        self.inputs.iter().filter_map(LedgerState::as_cash)
    }

    /// Cash outputs, skipping states of other contracts
    pub fn cash_outputs(&self) -> impl Iterator<Item = &CashState> {
        self.outputs.iter().filter_map(LedgerState::as_cash)
    }
}

/// A command that still needs a signature from `signer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCommand {
    /// Command to authorize
    pub command: Command,
    /// Key expected to sign it
    pub signer: PartyKey,
}

impl PendingCommand {
    /// Create a pending command
    pub fn new(command: Command, signer: PartyKey) -> Self {
        Self { command, signer }
    }
}

/// Balanced but unsigned spend produced by the crafter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSkeleton {
    /// Selected coins
    pub inputs: Vec<CashState>,
    /// Recipient outputs followed by the change output, if any
    pub outputs: Vec<CashState>,
    /// One move command per distinct input owner
    pub commands: Vec<PendingCommand>,
}

impl TransactionSkeleton {
    /// Bytes every signer signs: the canonical encoding of inputs and outputs
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&(&self.inputs, &self.outputs))?)
    }

    /// Attach authorized commands and a timestamp
    pub fn into_proposed(
        self,
        commands: Vec<AuthorizedCommand>,
        timestamp: DateTime<Utc>,
    ) -> ProposedTransaction {
        ProposedTransaction {
            inputs: self.inputs.into_iter().map(LedgerState::Cash).collect(),
            outputs: self.outputs.into_iter().map(LedgerState::Cash).collect(),
            commands,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Amount, Currency, Deposit, ForeignState, Institution, ProgramId};

    fn skeleton() -> TransactionSkeleton {
        let bank = Institution::new("Bank", PartyKey::from_der(vec![9; 12]));
        let deposit = Deposit::new(bank, b"ref".to_vec());
        let owner = PartyKey::from_der(vec![1; 12]);
        TransactionSkeleton {
            inputs: vec![CashState::new(
                deposit.clone(),
                Amount::new(100, Currency::USD),
                owner.clone(),
            )],
            outputs: vec![CashState::new(
                deposit,
                Amount::new(100, Currency::USD),
                PartyKey::from_der(vec![2; 12]),
            )],
            commands: vec![PendingCommand::new(Command::Move, owner)],
        }
    }

    #[test]
    fn test_signing_payload_is_deterministic() {
        let a = skeleton().signing_payload().unwrap();
        let b = skeleton().signing_payload().unwrap();
        assert_eq!(a, b);

        let mut changed = skeleton();
        changed.outputs[0].amount = Amount::new(99, Currency::USD);
        assert_ne!(a, changed.signing_payload().unwrap());
    }

    #[test]
    fn test_into_proposed_wraps_cash_states() {
        let tx = skeleton().into_proposed(vec![], Utc::now());
        assert_eq!(tx.cash_inputs().count(), 1);
        assert_eq!(tx.cash_outputs().count(), 1);
        assert!(tx.commands.is_empty());
    }

    #[test]
    fn test_cash_views_skip_foreign_states() {
        let mut tx = skeleton().into_proposed(vec![], Utc::now());
        tx.inputs.push(LedgerState::Foreign(ForeignState {
            program: ProgramId::of("bond"),
            payload: vec![],
        }));
        assert_eq!(tx.inputs.len(), 2);
        assert_eq!(tx.cash_inputs().count(), 1);
    }
}
