//! Configuration for the cash contract components

use crate::crypto::SchemeId;
use crate::types::PartyKey;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Verification engine configuration
    pub verifier: VerifierConfig,

    /// Spend crafter configuration
    pub crafter: CrafterConfig,

    /// Signature scheme configuration
    pub signing: SigningConfig,
}

/// Verification engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// How input owners are matched against move signers
    pub signer_policy: SignerPolicy,
}

/// Owner/signer matching rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignerPolicy {
    /// Move signers must equal the set of all input owners
    #[default]
    Strict,
    /// Owners whose deposits are entirely exited need not sign a move;
    /// they may still do so
    ExemptFullyExited,
}

impl FromStr for SignerPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "strict" => Ok(SignerPolicy::Strict),
            "exempt_fully_exited" => Ok(SignerPolicy::ExemptFullyExited),
            other => Err(Error::Config(format!("unknown signer policy: {other}"))),
        }
    }
}

/// Spend crafter configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrafterConfig {
    /// Where change goes
    pub change_policy: ChangePolicy,
}

/// Destination of the change output
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangePolicy {
    /// Back to the owner of the last consumed coin (links the change to the spender)
    #[default]
    LastConsumedOwner,
    /// To a caller-supplied key
    FreshKey {
        /// Change key
        key: PartyKey,
    },
}

/// Signature scheme configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    /// Code name of the scheme used when none is requested
    pub default_scheme: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            default_scheme: SchemeId::EddsaEd25519Sha512.code_name().to_string(),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(policy) = std::env::var("CASH_SIGNER_POLICY") {
            config.verifier.signer_policy = policy.parse()?;
        }

        if let Ok(scheme) = std::env::var("CASH_DEFAULT_SCHEME") {
            config.signing.default_scheme = scheme;
        }

        Ok(config)
    }
}
