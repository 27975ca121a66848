//! # Key Management
//!
//! Key material for every supported algorithm, and the handles the key
//! store hands out in its place.
//!
//! ## Key Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          KEY TYPES                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  KeyHandle  (safe to share, never holds secrets)                       │
//! │  ──────────                                                             │
//! │  • alias       - caller-chosen name                                    │
//! │  • algorithm   - AES / RSA / EC                                        │
//! │  • purposes    - encrypt | decrypt | sign | verify                     │
//! │  • key_id      - UUID v4, changes on every generation                  │
//! │  • created_at  - Unix milliseconds                                     │
//! │                                                                         │
//! │  KeyMaterial  (zeroized on drop)                                       │
//! │  ───────────                                                            │
//! │  ┌───────────────┐  ┌───────────────┐  ┌───────────────┐              │
//! │  │ Aes           │  │ Rsa           │  │ Ec            │              │
//! │  │ 32 raw bytes  │  │ private key   │  │ P-256 scalar  │              │
//! │  │               │  │ (PKCS#8 DER   │  │ (32-byte SEC1 │              │
//! │  │               │  │  at rest)     │  │  at rest)     │              │
//! │  └───────────────┘  └───────────────┘  └───────────────┘              │
//! │                                                                         │
//! │  Key = KeyHandle + KeyMaterial                                         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Fingerprints
//!
//! Every ciphertext header carries the first 8 bytes of a SHA-256 digest
//! over the key's identity (the public key for RSA/EC, a domain-separated
//! digest of the secret for AES). A mismatch is reported as a decryption
//! failure before any primitive runs.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::RngCore;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{Algorithm, KeyPurpose, Purposes};
use crate::error::{Error, Result};

/// Size of AES keys in bytes (256 bits)
pub const AES_KEY_SIZE: usize = 32;

/// RSA modulus size in bits
pub const RSA_KEY_BITS: usize = 2048;

/// Size of a key fingerprint in bytes
pub const FINGERPRINT_SIZE: usize = 8;

// ============================================================================
// KEY HANDLE
// ============================================================================

/// A reference to a stored key
///
/// Handles never expose key material. A handle is only valid while the
/// store still holds the exact key generation it was issued for: once the
/// alias is regenerated or deleted, every operation using the old handle
/// fails with `KeyNotFound`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyHandle {
    /// Caller-chosen alias
    pub alias: String,
    /// Key algorithm
    pub algorithm: Algorithm,
    /// Operations the key may be used for
    pub purposes: Purposes,
    /// Unique identifier of this key generation
    pub key_id: Uuid,
    /// Creation time (Unix milliseconds)
    pub created_at: i64,
}

// ============================================================================
// KEY MATERIAL
// ============================================================================

/// Raw AES-256 key bytes
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AesKey([u8; AES_KEY_SIZE]);

impl AesKey {
    /// Get the raw key bytes
    pub(crate) fn as_bytes(&self) -> &[u8; AES_KEY_SIZE] {
        &self.0
    }
}

/// Secret key material for one of the supported algorithms
///
/// The RSA and P-256 key types zeroize themselves on drop; the AES key is
/// wrapped in [`AesKey`] for the same guarantee.
#[derive(Clone)]
pub enum KeyMaterial {
    /// AES-256 key
    Aes(AesKey),
    /// RSA-2048 private key
    Rsa(Box<RsaPrivateKey>),
    /// P-256 secret scalar
    Ec(p256::SecretKey),
}

impl KeyMaterial {
    /// Generate fresh key material from the OS random source
    ///
    /// ## Errors
    ///
    /// `KeyGenerationFailed` if the random source fails or the primitive
    /// rejects its parameters.
    pub fn generate(algorithm: Algorithm) -> Result<Self> {
        let mut rng = rand::rngs::OsRng;
        match algorithm {
            Algorithm::Aes => {
                let mut bytes = [0u8; AES_KEY_SIZE];
                rng.try_fill_bytes(&mut bytes)
                    .map_err(|e| Error::KeyGenerationFailed(format!("Random source failed: {}", e)))?;
                let key = AesKey(bytes);
                bytes.zeroize();
                Ok(KeyMaterial::Aes(key))
            }
            Algorithm::Rsa => {
                let key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
                    .map_err(|e| Error::KeyGenerationFailed(format!("RSA key generation failed: {}", e)))?;
                Ok(KeyMaterial::Rsa(Box::new(key)))
            }
            Algorithm::Ec => Ok(KeyMaterial::Ec(p256::SecretKey::random(&mut rng))),
        }
    }

    /// The algorithm this material belongs to
    pub fn algorithm(&self) -> Algorithm {
        match self {
            KeyMaterial::Aes(_) => Algorithm::Aes,
            KeyMaterial::Rsa(_) => Algorithm::Rsa,
            KeyMaterial::Ec(_) => Algorithm::Ec,
        }
    }

    /// Encode the material for persistence
    ///
    /// AES keys are stored raw, RSA keys as PKCS#8 DER, EC keys as the
    /// 32-byte SEC1 scalar.
    pub fn to_bytes(&self) -> Result<Zeroizing<Vec<u8>>> {
        match self {
            KeyMaterial::Aes(key) => Ok(Zeroizing::new(key.0.to_vec())),
            KeyMaterial::Rsa(key) => {
                let der = key
                    .to_pkcs8_der()
                    .map_err(|e| Error::SerializationError(format!("PKCS#8 encoding failed: {}", e)))?;
                Ok(Zeroizing::new(der.as_bytes().to_vec()))
            }
            KeyMaterial::Ec(key) => Ok(Zeroizing::new(key.to_bytes().to_vec())),
        }
    }

    /// Decode persisted material
    ///
    /// ## Errors
    ///
    /// `StorageCorrupted` if the bytes are not valid material for `algorithm`.
    pub fn from_bytes(algorithm: Algorithm, bytes: &[u8]) -> Result<Self> {
        match algorithm {
            Algorithm::Aes => {
                let raw: [u8; AES_KEY_SIZE] = bytes.try_into().map_err(|_| {
                    Error::StorageCorrupted(format!(
                        "AES key must be {} bytes, found {}",
                        AES_KEY_SIZE,
                        bytes.len()
                    ))
                })?;
                Ok(KeyMaterial::Aes(AesKey(raw)))
            }
            Algorithm::Rsa => {
                let key = RsaPrivateKey::from_pkcs8_der(bytes)
                    .map_err(|e| Error::StorageCorrupted(format!("Invalid RSA key: {}", e)))?;
                Ok(KeyMaterial::Rsa(Box::new(key)))
            }
            Algorithm::Ec => {
                let key = p256::SecretKey::from_slice(bytes)
                    .map_err(|_| Error::StorageCorrupted("Invalid P-256 scalar".into()))?;
                Ok(KeyMaterial::Ec(key))
            }
        }
    }

    /// Compute the 8-byte key fingerprint carried in ciphertext headers
    pub fn fingerprint(&self) -> [u8; FINGERPRINT_SIZE] {
        let mut hasher = Sha256::new();
        match self {
            KeyMaterial::Aes(key) => {
                hasher.update(b"netwatch-aes-fingerprint-v1");
                hasher.update(key.0);
            }
            KeyMaterial::Rsa(key) => {
                hasher.update(b"netwatch-rsa-fingerprint-v1");
                hasher.update(key.n().to_bytes_be());
                hasher.update(key.e().to_bytes_be());
            }
            KeyMaterial::Ec(key) => {
                hasher.update(b"netwatch-ec-fingerprint-v1");
                hasher.update(key.public_key().to_encoded_point(true).as_bytes());
            }
        }
        let digest = hasher.finalize();

        let mut fingerprint = [0u8; FINGERPRINT_SIZE];
        fingerprint.copy_from_slice(&digest[..FINGERPRINT_SIZE]);
        fingerprint
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial::{}([REDACTED])", self.algorithm())
    }
}

// ============================================================================
// KEY
// ============================================================================

/// A stored key: its handle plus its secret material
pub struct Key {
    handle: KeyHandle,
    material: KeyMaterial,
}

impl Key {
    /// Pair a handle with its material
    pub fn new(handle: KeyHandle, material: KeyMaterial) -> Self {
        Self { handle, material }
    }

    /// The key's handle
    pub fn handle(&self) -> &KeyHandle {
        &self.handle
    }

    /// The key's algorithm
    pub fn algorithm(&self) -> Algorithm {
        self.handle.algorithm
    }

    /// The key's alias
    pub fn alias(&self) -> &str {
        &self.handle.alias
    }

    /// The secret material
    pub fn material(&self) -> &KeyMaterial {
        &self.material
    }

    /// Whether the key was generated with `purpose`
    pub fn allows(&self, purpose: KeyPurpose) -> bool {
        self.handle.purposes.contains(purpose)
    }

    /// Fail with `UnsupportedAlgorithm` unless the key allows `purpose`
    pub fn require(&self, purpose: KeyPurpose) -> Result<()> {
        if self.allows(purpose) {
            Ok(())
        } else {
            Err(Error::UnsupportedAlgorithm(format!(
                "{} key '{}' cannot be used to {}",
                self.algorithm(),
                self.alias(),
                purpose
            )))
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("handle", &self.handle)
            .field("material", &self.material)
            .finish()
    }
}
