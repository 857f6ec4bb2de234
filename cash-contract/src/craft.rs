//! Spend crafting
//!
//! Builds an unsigned, balanced transaction that moves a target amount to a
//! recipient out of a wallet of cash states.
//!
//! # Coin selection
//!
//! First-fit over the wallet in caller order: coins of the target currency
//! are gathered until the target is reached. The result only depends on the
//! order of `available`. No attempt is made at privacy or at minimising the
//! number of states created.
//!
//! Outputs never merge coins from different deposits: the recipient gets one
//! output per selected deposit, and the change comes out of the output of
//! the last consumed coin's deposit.

use crate::config::{ChangePolicy, CrafterConfig};
use crate::error::CraftError;
use crate::transaction::{PendingCommand, TransactionSkeleton};
use crate::types::{group_by_deposit, Amount, CashState, Command, PartyKey};
use std::collections::BTreeSet;

/// Spend crafter
#[derive(Debug, Clone, Default)]
pub struct SpendCrafter {
    config: CrafterConfig,
}

impl SpendCrafter {
    /// Create a crafter
    pub fn new(config: CrafterConfig) -> Self {
        Self { config }
    }

    /// Select coins from `available` and build a skeleton paying `target`
    /// to `recipient`. `available` is not modified.
    pub fn craft_spend(
        &self,
        target: Amount,
        recipient: &PartyKey,
        available: &[CashState],
    ) -> Result<TransactionSkeleton, CraftError> {
        let currency = target.currency;
        if target.is_zero() {
            return Err(CraftError::ZeroTarget(currency));
        }

        // Zero-valued coins can never be valid inputs.
        let coins = available
            .iter()
            .filter(|c| c.amount.currency == currency && !c.amount.is_zero());

        let mut gathered: Vec<&CashState> = Vec::new();
        let mut gathered_amount = Amount::zero(currency);
        for coin in coins {
            if gathered_amount.minor_units >= target.minor_units {
                break;
            }
            gathered_amount = gathered_amount
                .try_add(coin.amount)
                .map_err(|_| CraftError::AmountOverflow(currency))?;
            gathered.push(coin);
        }

        // Non-empty from here on: the target is positive.
        let last = match gathered.last() {
            Some(last) if gathered_amount.minor_units >= target.minor_units => *last,
            _ => {
                return Err(CraftError::InsufficientBalance {
                    shortfall: target - gathered_amount,
                })
            }
        };

        let change = gathered_amount - target;

        let mut outputs = group_by_deposit(gathered.iter().copied())
            .into_iter()
            .map(|group| {
                let total = group
                    .states
                    .iter()
                    .try_fold(Amount::zero(currency), |total, s| total.try_add(s.amount))
                    .map_err(|_| CraftError::AmountOverflow(currency))?;
                Ok(CashState::new(group.deposit.clone(), total, recipient.clone()))
            })
            .collect::<Result<Vec<_>, CraftError>>()?;

        if !change.is_zero() {
            // The last coin alone exceeds the change, so its deposit's
            // output stays positive.
            if let Some(output) = outputs.iter_mut().find(|o| o.deposit == last.deposit) {
                output.amount = output.amount - change;
            }
            let change_owner = match &self.config.change_policy {
                ChangePolicy::LastConsumedOwner => last.owner.clone(),
                ChangePolicy::FreshKey { key } => key.clone(),
            };
            outputs.push(CashState::new(last.deposit.clone(), change, change_owner));
        }

        let mut owners = BTreeSet::new();
        let commands: Vec<PendingCommand> = gathered
            .iter()
            .filter(|coin| owners.insert(coin.owner.clone()))
            .map(|coin| PendingCommand::new(Command::Move, coin.owner.clone()))
            .collect();

        tracing::debug!(
            target_amount = %target,
            selected = gathered.len(),
            change = %change,
            signers = commands.len(),
            "Spend crafted"
        );

        Ok(TransactionSkeleton {
            inputs: gathered.into_iter().cloned().collect(),
            outputs,
            commands,
        })
    }
}

/// Craft with the default configuration (change back to the last owner)
pub fn craft_spend(
    target: Amount,
    recipient: &PartyKey,
    available: &[CashState],
) -> Result<TransactionSkeleton, CraftError> {
    SpendCrafter::default().craft_spend(target, recipient, available)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Currency, Deposit, Institution};

    fn key(byte: u8) -> PartyKey {
        PartyKey::from_der(vec![byte; 12])
    }

    fn deposit(reference: &[u8]) -> Deposit {
        Deposit::new(Institution::new("MegaBank", key(0xb1)), reference.to_vec())
    }

    fn usd(units: u64) -> Amount {
        Amount::new(units, Currency::USD)
    }

    fn coin(reference: &[u8], units: u64, owner: u8) -> CashState {
        CashState::new(deposit(reference), usd(units), key(owner))
    }

    #[test]
    fn test_exact_amount_has_no_change() {
        let wallet = vec![coin(b"x", 100, 1)];
        let skeleton = craft_spend(usd(100), &key(2), &wallet).unwrap();
        assert_eq!(skeleton.inputs, wallet);
        assert_eq!(skeleton.outputs, vec![coin(b"x", 100, 2)]);
        assert_eq!(
            skeleton.commands,
            vec![PendingCommand::new(Command::Move, key(1))]
        );
    }

    #[test]
    fn test_stops_once_target_reached() {
        let wallet = vec![coin(b"x", 50, 1), coin(b"x", 60, 1), coin(b"x", 70, 1)];
        let skeleton = craft_spend(usd(100), &key(2), &wallet).unwrap();
        assert_eq!(skeleton.inputs.len(), 2);
        assert_eq!(
            skeleton.outputs,
            vec![coin(b"x", 100, 2), coin(b"x", 10, 1)]
        );
    }

    #[test]
    fn test_other_currencies_and_zero_coins_skipped() {
        let euros = CashState::new(deposit(b"x"), Amount::new(500, Currency::EUR), key(1));
        let wallet = vec![euros, coin(b"x", 0, 1), coin(b"x", 30, 3)];
        let skeleton = craft_spend(usd(30), &key(2), &wallet).unwrap();
        assert_eq!(skeleton.inputs, vec![coin(b"x", 30, 3)]);
    }

    #[test]
    fn test_insufficient_balance_reports_shortfall() {
        let wallet = vec![coin(b"x", 20, 1), coin(b"y", 30, 1)];
        assert_eq!(
            craft_spend(usd(80), &key(2), &wallet),
            Err(CraftError::InsufficientBalance {
                shortfall: usd(30)
            })
        );
        assert_eq!(
            craft_spend(usd(1), &key(2), &[]),
            Err(CraftError::InsufficientBalance { shortfall: usd(1) })
        );
    }

    #[test]
    fn test_zero_target_rejected() {
        let wallet = vec![coin(b"x", 20, 1)];
        assert_eq!(
            craft_spend(usd(0), &key(2), &wallet),
            Err(CraftError::ZeroTarget(Currency::USD))
        );
    }

    #[test]
    fn test_one_output_per_deposit() {
        let wallet = vec![coin(b"x", 40, 1), coin(b"y", 25, 1), coin(b"x", 35, 1)];
        let skeleton = craft_spend(usd(100), &key(2), &wallet).unwrap();
        assert_eq!(
            skeleton.outputs,
            vec![coin(b"x", 75, 2), coin(b"y", 25, 2)]
        );
    }

    #[test]
    fn test_change_taken_from_last_coin_deposit() {
        // Last coin is at x, but y is the last deposit group emitted.
        let wallet = vec![coin(b"x", 50, 1), coin(b"y", 10, 3), coin(b"x", 30, 4)];
        let skeleton = craft_spend(usd(85), &key(2), &wallet).unwrap();
        assert_eq!(
            skeleton.outputs,
            vec![coin(b"x", 75, 2), coin(b"y", 10, 2), coin(b"x", 5, 4)]
        );
    }

    #[test]
    fn test_one_move_per_distinct_owner() {
        let wallet = vec![
            coin(b"x", 10, 1),
            coin(b"x", 10, 3),
            coin(b"y", 10, 1),
            coin(b"y", 10, 3),
        ];
        let skeleton = craft_spend(usd(40), &key(2), &wallet).unwrap();
        assert_eq!(
            skeleton.commands,
            vec![
                PendingCommand::new(Command::Move, key(1)),
                PendingCommand::new(Command::Move, key(3)),
            ]
        );
    }

    #[test]
    fn test_fresh_change_key() {
        let crafter = SpendCrafter::new(CrafterConfig {
            change_policy: ChangePolicy::FreshKey { key: key(9) },
        });
        let wallet = vec![coin(b"x", 50, 1), coin(b"x", 40, 1)];
        let skeleton = crafter.craft_spend(usd(70), &key(2), &wallet).unwrap();
        assert_eq!(
            skeleton.outputs,
            vec![coin(b"x", 70, 2), coin(b"x", 20, 9)]
        );
        assert_eq!(
            skeleton.commands,
            vec![PendingCommand::new(Command::Move, key(1))]
        );
    }

    #[test]
    fn test_gathering_overflow_reported() {
        let wallet = vec![coin(b"x", u64::MAX - 1, 1), coin(b"x", 5, 1)];
        assert_eq!(
            craft_spend(usd(u64::MAX), &key(2), &wallet),
            Err(CraftError::AmountOverflow(Currency::USD))
        );
    }
}
