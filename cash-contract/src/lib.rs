//! Cash Contract
//!
//! Verification and spend crafting for a UTXO-style cash asset.
//!
//! # Architecture
//!
//! - **Value model** ([`types`]): amounts, deposits, cash states, commands
//! - **Verification engine** ([`verify`]): accepts or rejects one proposed transaction
//! - **Spend crafter** ([`craft`]): first-fit coin selection into an unsigned skeleton
//! - **Signature schemes** ([`crypto`]): explicit registry, signing, command authorization
//!
//! Data flows crafter → signer → verifier:
//!
//! ```no_run
//! use cash_contract::{craft_spend, crypto::{sign_skeleton, SchemeRegistry}, verify};
//! # fn demo(wallet: Vec<cash_contract::CashState>, keys: Vec<cash_contract::crypto::KeyPair>,
//! #         target: cash_contract::Amount, recipient: cash_contract::PartyKey) -> cash_contract::Result<()> {
//! let registry = SchemeRegistry::with_default_schemes();
//! let skeleton = craft_spend(target, &recipient, &wallet)?;
//! let tx = sign_skeleton(&registry, skeleton, &keys, chrono::Utc::now())?;
//! verify(&tx)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Invariants
//!
//! - Per deposit: Σ(inputs) == Σ(outputs) + exited amount
//! - Input owners == move signers
//! - Deterministic: the verdict depends only on the transaction
//! - No ordering or double-spend decisions: those belong to the notary

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod craft;
pub mod crypto;
pub mod error;
pub mod transaction;
pub mod types;
pub mod verify;

// Re-exports
pub use config::{ChangePolicy, Config, CrafterConfig, SignerPolicy, VerifierConfig};
pub use craft::{craft_spend, SpendCrafter};
pub use error::{AmountError, CraftError, CryptoError, Error, Result, VerifyError};
pub use transaction::{PendingCommand, ProposedTransaction, TransactionSkeleton};
pub use types::{
    sum_cash, sum_cash_by, sum_cash_or_zero, Amount, AuthorizedCommand, CashState, Command,
    Currency, Deposit, ForeignState, Institution, LedgerState, PartyKey, ProgramId,
};
pub use verify::{verify, CashVerifier};
