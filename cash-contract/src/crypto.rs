//! Signature schemes used to authorize cash commands
//!
//! This module provides:
//! - An explicit [`SchemeRegistry`] of supported schemes (no global state)
//! - Key pair generation, deterministic seeding, PKCS#8 / SPKI decoding
//! - Signing and verification, with scheme inference from the key
//! - [`SchemeRegistry::authorize`], the only way to obtain an
//!   [`AuthorizedCommand`]
//!
//! Supported schemes:
//! - `RSA_SHA256` (RSA-PSS with SHA-256 and MGF1, 3072-bit keys)
//! - `ECDSA_SECP256K1_SHA256` (ECDSA on the secp256k1 Koblitz curve)
//! - `ECDSA_SECP256R1_SHA256` (ECDSA on NIST P-256)
//! - `EDDSA_ED25519_SHA512` (EdDSA on the ed25519 twisted Edwards curve, the default)
//! - `SPHINCS-256_SHA512` (SPHINCS+ SHA2-256f, hash-based and post-quantum)
//!
//! Both ECDSA schemes share the algorithm name, so a key is matched to its
//! scheme by algorithm *and* curve.
//!
//! A signature always covers [`command_message`]: the transaction payload
//! together with the command it authorizes.

use crate::error::CryptoError;
use crate::transaction::{ProposedTransaction, TransactionSkeleton};
use crate::types::{AuthorizedCommand, Command, PartyKey};
use crate::Result;
use chrono::{DateTime, Utc};
use pkcs8::der::{asn1::BitStringRef, Encode};
use pkcs8::{
    AlgorithmIdentifierRef, DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey,
    ObjectIdentifier, PrivateKeyInfo, SubjectPublicKeyInfoRef,
};
use pqcrypto_sphincsplus::sphincssha2256fsimple as sphincs;
use pqcrypto_traits::sign::{DetachedSignature as _, PublicKey as _, SecretKey as _};
use rand::rngs::{OsRng, StdRng};
use rand::SeedableRng;
use rsa::pss;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use signature::{RandomizedSigner, SignatureEncoding, Signer, Verifier};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

type CryptoResult<T> = std::result::Result<T, CryptoError>;

/// RSA modulus size
const RSA_KEY_BITS: usize = 3072;

/// Algorithm identifier carried in SPHINCS PKCS#8 and SPKI encodings
const SPHINCS_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.8301.3.1.3.2");

/// Identifier of a supported signature scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SchemeId {
    /// RSA-PSS with SHA-256 and MGF1
    RsaSha256,
    /// ECDSA over secp256k1 with SHA-256
    EcdsaSecp256k1Sha256,
    /// ECDSA over secp256r1 (P-256) with SHA-256
    EcdsaSecp256r1Sha256,
    /// EdDSA over ed25519 with SHA-512
    EddsaEd25519Sha512,
    /// SPHINCS+ hash-based signatures, SHA2-256 fast parameter set
    Sphincs256Sha512,
}

impl SchemeId {
    /// Every scheme this build can provide
    pub const ALL: [SchemeId; 5] = [
        SchemeId::RsaSha256,
        SchemeId::EcdsaSecp256k1Sha256,
        SchemeId::EcdsaSecp256r1Sha256,
        SchemeId::EddsaEd25519Sha512,
        SchemeId::Sphincs256Sha512,
    ];

    /// Stable numeric code
    pub fn code(&self) -> u8 {
        match self {
            SchemeId::RsaSha256 => 1,
            SchemeId::EcdsaSecp256k1Sha256 => 2,
            SchemeId::EcdsaSecp256r1Sha256 => 3,
            SchemeId::EddsaEd25519Sha512 => 4,
            SchemeId::Sphincs256Sha512 => 5,
        }
    }

    /// Code name used in configuration and lookups
    pub fn code_name(&self) -> &'static str {
        match self {
            SchemeId::RsaSha256 => "RSA_SHA256",
            SchemeId::EcdsaSecp256k1Sha256 => "ECDSA_SECP256K1_SHA256",
            SchemeId::EcdsaSecp256r1Sha256 => "ECDSA_SECP256R1_SHA256",
            SchemeId::EddsaEd25519Sha512 => "EDDSA_ED25519_SHA512",
            SchemeId::Sphincs256Sha512 => "SPHINCS-256_SHA512",
        }
    }

    /// Parse a code name
    pub fn from_code_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.code_name() == name)
    }
}

impl fmt::Display for SchemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code_name())
    }
}

/// Signature algorithm family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// RSA
    Rsa,
    /// Elliptic-curve DSA
    Ecdsa,
    /// Edwards-curve DSA
    EdDsa,
    /// SPHINCS hash-based signatures
    Sphincs,
}

impl KeyAlgorithm {
    /// Algorithm name as reported by keys
    pub fn name(&self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa => "RSA",
            KeyAlgorithm::Ecdsa => "ECDSA",
            KeyAlgorithm::EdDsa => "EdDSA",
            KeyAlgorithm::Sphincs => "SPHINCS-256",
        }
    }
}

/// Curve parameters of an elliptic-curve key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Curve {
    /// secp256k1 Koblitz curve
    Secp256k1,
    /// NIST P-256
    Secp256r1,
    /// ed25519 twisted Edwards curve
    Ed25519,
}

/// Description of a signature scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureScheme {
    /// Scheme identifier
    pub id: SchemeId,
    /// Algorithm family
    pub algorithm: KeyAlgorithm,
    /// Curve parameters; `None` for RSA and SPHINCS
    pub curve: Option<Curve>,
    /// Key size in bits
    pub key_size: u32,
    /// Human-readable description
    pub description: &'static str,
}

impl SignatureScheme {
    /// Metadata for a scheme id
    pub fn describe(id: SchemeId) -> Self {
        match id {
            SchemeId::RsaSha256 => Self {
                id,
                algorithm: KeyAlgorithm::Rsa,
                curve: None,
                key_size: RSA_KEY_BITS as u32,
                description: "RSA signature scheme using SHA256 as hash algorithm and MGF1 (with SHA256) as mask generation function.",
            },
            SchemeId::EcdsaSecp256k1Sha256 => Self {
                id,
                algorithm: KeyAlgorithm::Ecdsa,
                curve: Some(Curve::Secp256k1),
                key_size: 256,
                description: "ECDSA signature scheme using the secp256k1 Koblitz curve.",
            },
            SchemeId::EcdsaSecp256r1Sha256 => Self {
                id,
                algorithm: KeyAlgorithm::Ecdsa,
                curve: Some(Curve::Secp256r1),
                key_size: 256,
                description: "ECDSA signature scheme using the secp256r1 (NIST P-256) curve.",
            },
            SchemeId::EddsaEd25519Sha512 => Self {
                id,
                algorithm: KeyAlgorithm::EdDsa,
                curve: Some(Curve::Ed25519),
                key_size: 256,
                description: "EdDSA signature scheme using the ed25519 twisted Edwards curve.",
            },
            SchemeId::Sphincs256Sha512 => Self {
                id,
                algorithm: KeyAlgorithm::Sphincs,
                curve: None,
                key_size: 256,
                description: "SPHINCS hash-based signature scheme. It provides 128bit security against post-quantum attackers at the cost of larger key sizes.",
            },
        }
    }

    fn generate(&self) -> CryptoResult<PrivateKey> {
        Ok(match self.id {
            SchemeId::RsaSha256 => PrivateKey::Rsa(
                rsa::RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
                    .map_err(|e| CryptoError::Signing(e.to_string()))?,
            ),
            SchemeId::EcdsaSecp256k1Sha256 => {
                PrivateKey::Secp256k1(k256::ecdsa::SigningKey::random(&mut OsRng))
            }
            SchemeId::EcdsaSecp256r1Sha256 => {
                PrivateKey::Secp256r1(p256::ecdsa::SigningKey::random(&mut OsRng))
            }
            SchemeId::EddsaEd25519Sha512 => {
                PrivateKey::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng))
            }
            SchemeId::Sphincs256Sha512 => {
                let (public, secret) = sphincs::keypair();
                PrivateKey::Sphincs {
                    secret: secret.as_bytes().to_vec(),
                    public: public.as_bytes().to_vec(),
                }
            }
        })
    }

    fn seeded(&self, seed: &[u8; 32]) -> CryptoResult<PrivateKey> {
        let invalid = |e: signature::Error| CryptoError::Signing(format!("invalid seed: {e}"));
        Ok(match self.id {
            SchemeId::RsaSha256 => PrivateKey::Rsa(
                rsa::RsaPrivateKey::new(&mut StdRng::from_seed(*seed), RSA_KEY_BITS)
                    .map_err(|e| CryptoError::Signing(e.to_string()))?,
            ),
            SchemeId::EcdsaSecp256k1Sha256 => {
                PrivateKey::Secp256k1(k256::ecdsa::SigningKey::from_slice(seed).map_err(invalid)?)
            }
            SchemeId::EcdsaSecp256r1Sha256 => {
                PrivateKey::Secp256r1(p256::ecdsa::SigningKey::from_slice(seed).map_err(invalid)?)
            }
            SchemeId::EddsaEd25519Sha512 => {
                PrivateKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(seed))
            }
            // Key generation draws from the system RNG only.
            SchemeId::Sphincs256Sha512 => {
                return Err(CryptoError::SeedingUnsupported(self.id.code_name().to_string()))
            }
        })
    }

    fn decode_private(&self, der: &[u8]) -> Option<PrivateKey> {
        match self.id {
            SchemeId::RsaSha256 => rsa::RsaPrivateKey::from_pkcs8_der(der)
                .ok()
                .map(PrivateKey::Rsa),
            SchemeId::EcdsaSecp256k1Sha256 => k256::ecdsa::SigningKey::from_pkcs8_der(der)
                .ok()
                .map(PrivateKey::Secp256k1),
            SchemeId::EcdsaSecp256r1Sha256 => p256::ecdsa::SigningKey::from_pkcs8_der(der)
                .ok()
                .map(PrivateKey::Secp256r1),
            SchemeId::EddsaEd25519Sha512 => ed25519_dalek::SigningKey::from_pkcs8_der(der)
                .ok()
                .map(PrivateKey::Ed25519),
            SchemeId::Sphincs256Sha512 => decode_sphincs_private(der),
        }
    }

    fn decode_public(&self, der: &[u8]) -> Option<PublicKey> {
        match self.id {
            SchemeId::RsaSha256 => rsa::RsaPublicKey::from_public_key_der(der)
                .ok()
                .map(PublicKey::Rsa),
            SchemeId::EcdsaSecp256k1Sha256 => k256::ecdsa::VerifyingKey::from_public_key_der(der)
                .ok()
                .map(PublicKey::Secp256k1),
            SchemeId::EcdsaSecp256r1Sha256 => p256::ecdsa::VerifyingKey::from_public_key_der(der)
                .ok()
                .map(PublicKey::Secp256r1),
            SchemeId::EddsaEd25519Sha512 => ed25519_dalek::VerifyingKey::from_public_key_der(der)
                .ok()
                .map(PublicKey::Ed25519),
            SchemeId::Sphincs256Sha512 => decode_sphincs_public(der),
        }
    }
}

fn sphincs_algorithm() -> AlgorithmIdentifierRef<'static> {
    AlgorithmIdentifierRef {
        oid: SPHINCS_OID,
        parameters: None,
    }
}

fn decode_sphincs_private(der: &[u8]) -> Option<PrivateKey> {
    let info = PrivateKeyInfo::try_from(der).ok()?;
    if info.algorithm.oid != SPHINCS_OID || info.private_key.len() != sphincs::secret_key_bytes() {
        return None;
    }
    // The secret key ends with the public seed and root, i.e. the public key.
    let public = match info.public_key {
        Some(public) => public,
        None => &info.private_key[sphincs::secret_key_bytes() - sphincs::public_key_bytes()..],
    };
    (public.len() == sphincs::public_key_bytes()).then(|| PrivateKey::Sphincs {
        secret: info.private_key.to_vec(),
        public: public.to_vec(),
    })
}

fn decode_sphincs_public(der: &[u8]) -> Option<PublicKey> {
    let spki = SubjectPublicKeyInfoRef::try_from(der).ok()?;
    if spki.algorithm.oid != SPHINCS_OID {
        return None;
    }
    let public = spki.subject_public_key.as_bytes()?;
    (public.len() == sphincs::public_key_bytes()).then(|| PublicKey::Sphincs(public.to_vec()))
}

fn encoding_failed(e: impl fmt::Display) -> CryptoError {
    CryptoError::Signing(e.to_string())
}

/// Private signing key
#[derive(Clone)]
pub enum PrivateKey {
    /// RSA key
    Rsa(rsa::RsaPrivateKey),
    /// secp256k1 ECDSA key
    Secp256k1(k256::ecdsa::SigningKey),
    /// P-256 ECDSA key
    Secp256r1(p256::ecdsa::SigningKey),
    /// ed25519 key
    Ed25519(ed25519_dalek::SigningKey),
    /// SPHINCS key with its public half
    Sphincs {
        /// Raw secret key
        secret: Vec<u8>,
        /// Raw public key
        public: Vec<u8>,
    },
}

impl PrivateKey {
    /// Matching public key
    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Rsa(k) => PublicKey::Rsa(k.to_public_key()),
            PrivateKey::Secp256k1(k) => PublicKey::Secp256k1(*k.verifying_key()),
            PrivateKey::Secp256r1(k) => PublicKey::Secp256r1(*k.verifying_key()),
            PrivateKey::Ed25519(k) => PublicKey::Ed25519(k.verifying_key()),
            PrivateKey::Sphincs { public, .. } => PublicKey::Sphincs(public.clone()),
        }
    }

    /// PKCS#8 DER encoding (USE WITH CAUTION - should be protected)
    pub fn to_pkcs8_der(&self) -> CryptoResult<Vec<u8>> {
        let document = match self {
            PrivateKey::Rsa(k) => k.to_pkcs8_der(),
            PrivateKey::Secp256k1(k) => k.to_pkcs8_der(),
            PrivateKey::Secp256r1(k) => k.to_pkcs8_der(),
            PrivateKey::Ed25519(k) => k.to_pkcs8_der(),
            PrivateKey::Sphincs { secret, public } => {
                let mut info = PrivateKeyInfo::new(sphincs_algorithm(), secret);
                info.public_key = Some(public.as_slice());
                return info.to_der().map_err(encoding_failed);
            }
        }
        .map_err(encoding_failed)?;
        Ok(document.as_bytes().to_vec())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrivateKey")
            .field(&self.public_key().algorithm())
            .finish_non_exhaustive()
    }
}

/// Public verification key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    /// RSA key
    Rsa(rsa::RsaPublicKey),
    /// secp256k1 ECDSA key
    Secp256k1(k256::ecdsa::VerifyingKey),
    /// P-256 ECDSA key
    Secp256r1(p256::ecdsa::VerifyingKey),
    /// ed25519 key
    Ed25519(ed25519_dalek::VerifyingKey),
    /// Raw SPHINCS public key
    Sphincs(Vec<u8>),
}

impl PublicKey {
    /// Algorithm family of this key
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            PublicKey::Rsa(_) => KeyAlgorithm::Rsa,
            PublicKey::Secp256k1(_) | PublicKey::Secp256r1(_) => KeyAlgorithm::Ecdsa,
            PublicKey::Ed25519(_) => KeyAlgorithm::EdDsa,
            PublicKey::Sphincs(_) => KeyAlgorithm::Sphincs,
        }
    }

    /// Curve parameters of this key, if it is an elliptic-curve key
    pub fn curve(&self) -> Option<Curve> {
        match self {
            PublicKey::Secp256k1(_) => Some(Curve::Secp256k1),
            PublicKey::Secp256r1(_) => Some(Curve::Secp256r1),
            PublicKey::Ed25519(_) => Some(Curve::Ed25519),
            PublicKey::Rsa(_) | PublicKey::Sphincs(_) => None,
        }
    }

    /// SubjectPublicKeyInfo DER encoding
    pub fn to_der(&self) -> CryptoResult<Vec<u8>> {
        let document = match self {
            PublicKey::Rsa(k) => k.to_public_key_der(),
            PublicKey::Secp256k1(k) => k.to_public_key_der(),
            PublicKey::Secp256r1(k) => k.to_public_key_der(),
            PublicKey::Ed25519(k) => k.to_public_key_der(),
            PublicKey::Sphincs(public) => {
                let spki = SubjectPublicKeyInfoRef {
                    algorithm: sphincs_algorithm(),
                    subject_public_key: BitStringRef::from_bytes(public)
                        .map_err(encoding_failed)?,
                };
                return spki.to_der().map_err(encoding_failed);
            }
        }
        .map_err(encoding_failed)?;
        Ok(document.as_bytes().to_vec())
    }

    /// Ledger identity of this key
    pub fn party_key(&self) -> CryptoResult<PartyKey> {
        self.to_der().map(PartyKey::from_der)
    }
}
/// Signature bytes tagged with the scheme that produced them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    scheme: SchemeId,
    #[serde(with = "serde_bytes")]
    bytes: Vec<u8>,
}

impl Signature {
    /// Create from raw parts
    pub fn from_parts(scheme: SchemeId, bytes: Vec<u8>) -> Self {
        Self { scheme, bytes }
    }

    /// Producing scheme
    pub fn scheme(&self) -> SchemeId {
        self.scheme
    }

    /// Raw signature bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Private key with its public half and ledger identity
#[derive(Debug, Clone)]
pub struct KeyPair {
    private: PrivateKey,
    public: PublicKey,
    party: PartyKey,
}

impl KeyPair {
    /// Build from a private key
    pub fn from_private(private: PrivateKey) -> CryptoResult<Self> {
        let public = private.public_key();
        let party = public.party_key()?;
        Ok(Self {
            private,
            public,
            party,
        })
    }

    /// Private half
    pub fn private(&self) -> &PrivateKey {
        &self.private
    }

    /// Public half
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// Ledger identity (DER public key)
    pub fn party_key(&self) -> &PartyKey {
        &self.party
    }
}

/// Signatures collected for one command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCommand {
    /// Command being authorized
    pub command: Command,
    /// Claimed signer and signature pairs
    pub signatures: Vec<(PartyKey, Signature)>,
}

impl SignedCommand {
    /// Start with no signatures
    pub fn new(command: Command) -> Self {
        Self {
            command,
            signatures: Vec::new(),
        }
    }

    /// Add a signature
    pub fn with_signature(mut self, signer: PartyKey, signature: Signature) -> Self {
        self.signatures.push((signer, signature));
        self
    }
}

/// Bytes signed to authorize `command` within the transaction whose
/// signing payload is `payload`. A signature over one command never
/// verifies for another.
pub fn command_message(payload: &[u8], command: &Command) -> CryptoResult<Vec<u8>> {
    if payload.is_empty() {
        return Err(CryptoError::EmptyData);
    }
    bincode::serialize(&(payload, command)).map_err(encoding_failed)
}

/// Registry of the signature schemes a component may use.
///
/// Constructed explicitly and passed to whoever signs or verifies.
#[derive(Debug, Clone)]
pub struct SchemeRegistry {
    schemes: BTreeMap<SchemeId, SignatureScheme>,
    default: SchemeId,
}

impl SchemeRegistry {
    /// Registry restricted to `schemes`; `default` must be among them
    pub fn new(
        default: SchemeId,
        schemes: impl IntoIterator<Item = SchemeId>,
    ) -> CryptoResult<Self> {
        let schemes: BTreeMap<SchemeId, SignatureScheme> = schemes
            .into_iter()
            .map(|id| (id, SignatureScheme::describe(id)))
            .collect();
        if !schemes.contains_key(&default) {
            return Err(CryptoError::UnsupportedScheme(default.code_name().to_string()));
        }
        Ok(Self { schemes, default })
    }

    /// All schemes, ed25519 as default
    pub fn with_default_schemes() -> Self {
        Self {
            schemes: SchemeId::ALL
                .into_iter()
                .map(|id| (id, SignatureScheme::describe(id)))
                .collect(),
            default: SchemeId::EddsaEd25519Sha512,
        }
    }

    /// All schemes, with the default taken from configuration
    pub fn from_config(config: &crate::config::SigningConfig) -> CryptoResult<Self> {
        let default = SchemeId::from_code_name(&config.default_scheme)
            .ok_or_else(|| CryptoError::UnsupportedScheme(config.default_scheme.clone()))?;
        Self::new(default, SchemeId::ALL)
    }

    /// Scheme used when none is requested
    pub fn default_scheme(&self) -> &SignatureScheme {
        &self.schemes[&self.default]
    }

    /// Registered schemes
    pub fn schemes(&self) -> impl Iterator<Item = &SignatureScheme> {
        self.schemes.values()
    }

    /// Look up a scheme by code name
    pub fn find(&self, code_name: &str) -> CryptoResult<&SignatureScheme> {
        SchemeId::from_code_name(code_name)
            .and_then(|id| self.schemes.get(&id))
            .ok_or_else(|| CryptoError::UnsupportedScheme(code_name.to_string()))
    }

    /// Infer the scheme of a key from its algorithm and curve
    pub fn find_for_key(&self, key: &PublicKey) -> CryptoResult<&SignatureScheme> {
        self.schemes
            .values()
            .find(|s| s.algorithm == key.algorithm() && s.curve == key.curve())
            .ok_or_else(|| {
                CryptoError::UnsupportedScheme(format!(
                    "{} key on {:?}",
                    key.algorithm().name(),
                    key.curve()
                ))
            })
    }

    /// Fresh random key pair for `code_name`, or for the default scheme
    pub fn generate_key_pair(&self, code_name: Option<&str>) -> CryptoResult<KeyPair> {
        let scheme = match code_name {
            Some(name) => self.find(name)?,
            None => self.default_scheme(),
        };
        KeyPair::from_private(scheme.generate()?)
    }

    /// Deterministic key pair from a 32-byte seed
    pub fn key_pair_from_seed(&self, code_name: &str, seed: &[u8; 32]) -> CryptoResult<KeyPair> {
        let private = self.find(code_name)?.seeded(seed)?;
        KeyPair::from_private(private)
    }

    /// Decode a PKCS#8 DER private key with the first scheme that accepts it
    pub fn decode_private_key(&self, der: &[u8]) -> CryptoResult<PrivateKey> {
        self.schemes
            .values()
            .find_map(|s| s.decode_private(der))
            .ok_or_else(|| {
                CryptoError::KeyDecodeFailure(
                    "private key is not PKCS#8 encoded or its algorithm is not supported"
                        .to_string(),
                )
            })
    }

    /// Decode an SPKI DER public key with the first scheme that accepts it
    pub fn decode_public_key(&self, der: &[u8]) -> CryptoResult<PublicKey> {
        self.schemes
            .values()
            .find_map(|s| s.decode_public(der))
            .ok_or_else(|| {
                CryptoError::KeyDecodeFailure(
                    "public key is not X.509 encoded or its algorithm is not supported"
                        .to_string(),
                )
            })
    }

    /// Sign `data`
    pub fn sign(&self, key: &PrivateKey, data: &[u8]) -> CryptoResult<Signature> {
        if data.is_empty() {
            return Err(CryptoError::EmptyData);
        }
        let scheme = self.find_for_key(&key.public_key())?.id;
        let failed = |e: signature::Error| CryptoError::Signing(e.to_string());

        let bytes = match key {
            PrivateKey::Rsa(k) => {
                let signer = pss::SigningKey::<Sha256>::new(k.clone());
                let sig: pss::Signature = signer
                    .try_sign_with_rng(&mut OsRng, data)
                    .map_err(failed)?;
                sig.to_vec()
            }
            PrivateKey::Secp256k1(k) => {
                let sig: k256::ecdsa::Signature = k.try_sign(data).map_err(failed)?;
                sig.to_bytes().to_vec()
            }
            PrivateKey::Secp256r1(k) => {
                let sig: p256::ecdsa::Signature = k.try_sign(data).map_err(failed)?;
                sig.to_bytes().to_vec()
            }
            PrivateKey::Ed25519(k) => {
                let sig: ed25519_dalek::Signature = k.try_sign(data).map_err(failed)?;
                sig.to_bytes().to_vec()
            }
            PrivateKey::Sphincs { secret, .. } => {
                let secret = sphincs::SecretKey::from_bytes(secret)
                    .map_err(|e| CryptoError::Signing(format!("{e:?}")))?;
                sphincs::detached_sign(data, &secret).as_bytes().to_vec()
            }
        };

        Ok(Signature::from_parts(scheme, bytes))
    }

    /// Sign `command` as part of the transaction with signing payload `payload`
    pub fn sign_command(
        &self,
        key: &PrivateKey,
        command: &Command,
        payload: &[u8],
    ) -> CryptoResult<Signature> {
        self.sign(key, &command_message(payload, command)?)
    }

    /// Check `signature` over `data`. Malformed signatures verify as `false`.
    pub fn verify(&self, key: &PublicKey, signature: &Signature, data: &[u8]) -> CryptoResult<bool> {
        if data.is_empty() {
            return Err(CryptoError::EmptyData);
        }
        let scheme = self.find_for_key(key)?.id;
        if signature.scheme != scheme {
            return Ok(false);
        }

        let bytes = signature.as_bytes();
        let valid = match key {
            PublicKey::Rsa(k) => pss::Signature::try_from(bytes)
                .map(|sig| {
                    pss::VerifyingKey::<Sha256>::new(k.clone())
                        .verify(data, &sig)
                        .is_ok()
                })
                .unwrap_or(false),
            PublicKey::Secp256k1(k) => k256::ecdsa::Signature::from_slice(bytes)
                .map(|sig| k.verify(data, &sig).is_ok())
                .unwrap_or(false),
            PublicKey::Secp256r1(k) => p256::ecdsa::Signature::from_slice(bytes)
                .map(|sig| k.verify(data, &sig).is_ok())
                .unwrap_or(false),
            PublicKey::Ed25519(k) => ed25519_dalek::Signature::from_slice(bytes)
                .map(|sig| k.verify(data, &sig).is_ok())
                .unwrap_or(false),
            PublicKey::Sphincs(public) => match (
                sphincs::PublicKey::from_bytes(public),
                sphincs::DetachedSignature::from_bytes(bytes),
            ) {
                (Ok(public), Ok(sig)) => {
                    sphincs::verify_detached_signature(&sig, data, &public).is_ok()
                }
                _ => false,
            },
        };
        Ok(valid)
    }

    /// Verify every signature on `signed` over the command's message for
    /// `payload` (see [`command_message`]) and hand back the command with
    /// its verified signer set.
    pub fn authorize(&self, signed: &SignedCommand, payload: &[u8]) -> CryptoResult<AuthorizedCommand> {
        if signed.signatures.is_empty() {
            return Err(CryptoError::NoSigners);
        }
        let message = command_message(payload, &signed.command)?;

        let mut signers = BTreeSet::new();
        for (signer, signature) in &signed.signatures {
            let key = self.decode_public_key(signer.as_bytes())?;
            if !self.verify(&key, signature, &message)? {
                return Err(CryptoError::InvalidSignature {
                    signer: signer.clone(),
                });
            }
            signers.insert(signer.clone());
        }

        Ok(AuthorizedCommand::new(signed.command.clone(), signers))
    }
}

/// Sign every pending command of `skeleton` with the matching key from
/// `keys`, verify the signatures, and assemble the proposed transaction.
pub fn sign_skeleton(
    registry: &SchemeRegistry,
    skeleton: TransactionSkeleton,
    keys: &[KeyPair],
    timestamp: DateTime<Utc>,
) -> Result<ProposedTransaction> {
    let payload = skeleton.signing_payload()?;

    let mut commands = Vec::with_capacity(skeleton.commands.len());
    for pending in &skeleton.commands {
        let key = keys
            .iter()
            .find(|k| k.party_key() == &pending.signer)
            .ok_or_else(|| CryptoError::MissingKey {
                signer: pending.signer.clone(),
            })?;
        let signature = registry.sign_command(key.private(), &pending.command, &payload)?;
        let signed = SignedCommand::new(pending.command.clone())
            .with_signature(pending.signer.clone(), signature);
        commands.push(registry.authorize(&signed, &payload)?);
    }

    tracing::debug!(commands = commands.len(), "Skeleton signed");
    Ok(skeleton.into_proposed(commands, timestamp))
}
