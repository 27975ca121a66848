//! # Cryptography Module
//!
//! Algorithms, key material, the cipher engine and the signer.
//!
//! ## Algorithm Table
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       SUPPORTED ALGORITHMS                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌───────────────┐  ┌───────────────┐  ┌───────────────┐              │
//! │  │     AES       │  │     RSA       │  │      EC       │              │
//! │  │ AES-256-GCM   │  │  RSA-2048     │  │   EC-P256     │              │
//! │  │               │  │               │  │               │              │
//! │  │ • encrypt     │  │ • encrypt     │  │ • encrypt     │              │
//! │  │ • decrypt     │  │ • decrypt     │  │ • decrypt     │              │
//! │  │               │  │ • sign        │  │ • sign        │              │
//! │  │               │  │ • verify      │  │ • verify      │              │
//! │  │               │  │               │  │               │              │
//! │  │ 96-bit nonce  │  │ OAEP-SHA256   │  │ ECDSA-SHA256  │              │
//! │  │ 128-bit tag   │  │ PKCS#1 v1.5   │  │ ECIES (ECDH + │              │
//! │  │               │  │ max 190 bytes │  │ HKDF + GCM)   │              │
//! │  └───────────────┘  └───────────────┘  └───────────────┘              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Considerations
//!
//! 1. **Key Zeroization**: All secret key material is zeroized when dropped
//! 2. **Secure Random**: `rand::rngs::OsRng` for keys, nonces and ECIES
//!    ephemeral keys
//! 3. **No Nonce Reuse**: A fresh nonce for every AES-GCM encryption unless
//!    the caller explicitly supplies one
//! 4. **Authenticated Headers**: Ciphertext headers are bound as associated
//!    data so they cannot be swapped between envelopes

mod keys;
mod encryption;
mod signing;

pub use keys::{Key, KeyHandle, KeyMaterial, AES_KEY_SIZE, FINGERPRINT_SIZE, RSA_KEY_BITS};
pub use encryption::{
    decrypt, decrypt_stream, encrypt, encrypt_file, encrypt_stream, encrypt_with_nonce,
    ChunkOptions, Nonce, Scheme, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_THRESHOLD, FORMAT_VERSION,
    HEADER_SIZE, MAX_CHUNK_SIZE, NONCE_SIZE, RSA_MAX_PLAINTEXT, TAG_SIZE,
};
pub use signing::{sign, verify, ECDSA_SIGNATURE_SIZE, RSA_SIGNATURE_SIZE};
pub(crate) use encryption::{open_sealed, seal_with_random_nonce};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

// ============================================================================
// ALGORITHMS
// ============================================================================

/// A supported key algorithm with its fixed parameter set
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Algorithm {
    /// AES-256-GCM symmetric encryption
    Aes,
    /// RSA-2048 with OAEP-SHA256 encryption and PKCS#1 v1.5 signatures
    Rsa,
    /// NIST P-256 with ECDSA-SHA256 signatures and ECIES encryption
    Ec,
}

impl Algorithm {
    /// Every supported algorithm, in capability order
    pub const ALL: [Algorithm; 3] = [Algorithm::Aes, Algorithm::Rsa, Algorithm::Ec];

    /// Short canonical name (`AES`, `RSA`, `EC`)
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Aes => "AES",
            Algorithm::Rsa => "RSA",
            Algorithm::Ec => "EC",
        }
    }

    /// Descriptive parameter summary
    pub fn parameters(&self) -> &'static str {
        match self {
            Algorithm::Aes => "AES-256-GCM",
            Algorithm::Rsa => "RSA-2048",
            Algorithm::Ec => "EC-P256",
        }
    }

    /// Purposes a key of this algorithm can be generated with
    pub fn supported_purposes(&self) -> Purposes {
        match self {
            Algorithm::Aes => Purposes::ENCRYPT | Purposes::DECRYPT,
            Algorithm::Rsa | Algorithm::Ec => Purposes::ALL,
        }
    }

    /// Whether this algorithm can produce signatures
    pub fn can_sign(&self) -> bool {
        self.supported_purposes().contains(KeyPurpose::Sign)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    /// Parse an algorithm name, ignoring case and surrounding whitespace.
    ///
    /// Accepts the short names plus the descriptive forms, e.g. `aes`,
    /// `AES-256-GCM`, `rsa2048`, `EC-P256`, `ECDSA`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_uppercase)
            .collect();

        match normalized.as_str() {
            "AES" | "AES256" | "AES256GCM" | "AESGCM" => Ok(Algorithm::Aes),
            "RSA" | "RSA2048" => Ok(Algorithm::Rsa),
            "EC" | "ECC" | "ECP256" | "P256" | "ECDSA" | "SECP256R1" => Ok(Algorithm::Ec),
            _ => Err(Error::UnknownAlgorithm(s.to_string())),
        }
    }
}

// ============================================================================
// PURPOSES
// ============================================================================

/// A single operation a key may be used for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyPurpose {
    /// Produce ciphertexts
    Encrypt,
    /// Open ciphertexts
    Decrypt,
    /// Produce signatures
    Sign,
    /// Check signatures
    Verify,
}

impl KeyPurpose {
    const ALL: [KeyPurpose; 4] = [
        KeyPurpose::Encrypt,
        KeyPurpose::Decrypt,
        KeyPurpose::Sign,
        KeyPurpose::Verify,
    ];

    fn bit(self) -> u8 {
        match self {
            KeyPurpose::Encrypt => 0b0001,
            KeyPurpose::Decrypt => 0b0010,
            KeyPurpose::Sign => 0b0100,
            KeyPurpose::Verify => 0b1000,
        }
    }

    /// Lowercase operation name
    pub fn name(&self) -> &'static str {
        match self {
            KeyPurpose::Encrypt => "encrypt",
            KeyPurpose::Decrypt => "decrypt",
            KeyPurpose::Sign => "sign",
            KeyPurpose::Verify => "verify",
        }
    }
}

impl fmt::Display for KeyPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of [`KeyPurpose`]s, stored as a bit mask
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Purposes(u8);

impl Purposes {
    /// No purposes
    pub const NONE: Purposes = Purposes(0);
    /// Encrypt only
    pub const ENCRYPT: Purposes = Purposes(0b0001);
    /// Decrypt only
    pub const DECRYPT: Purposes = Purposes(0b0010);
    /// Sign only
    pub const SIGN: Purposes = Purposes(0b0100);
    /// Verify only
    pub const VERIFY: Purposes = Purposes(0b1000);
    /// Every purpose
    pub const ALL: Purposes = Purposes(0b1111);

    /// Whether `purpose` is in the set
    pub fn contains(&self, purpose: KeyPurpose) -> bool {
        self.0 & purpose.bit() != 0
    }

    /// Whether every purpose in `self` is also in `other`
    pub fn is_subset_of(&self, other: Purposes) -> bool {
        self.0 & !other.0 == 0
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate over the purposes in the set
    pub fn iter(&self) -> impl Iterator<Item = KeyPurpose> + '_ {
        KeyPurpose::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

impl std::ops::BitOr for Purposes {
    type Output = Purposes;

    fn bitor(self, rhs: Purposes) -> Purposes {
        Purposes(self.0 | rhs.0)
    }
}

impl From<KeyPurpose> for Purposes {
    fn from(purpose: KeyPurpose) -> Self {
        Purposes(purpose.bit())
    }
}

impl FromIterator<KeyPurpose> for Purposes {
    fn from_iter<I: IntoIterator<Item = KeyPurpose>>(iter: I) -> Self {
        Purposes(iter.into_iter().fold(0, |mask, p| mask | p.bit()))
    }
}

impl fmt::Display for Purposes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|p| p.name()).collect();
        f.write_str(&names.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_algorithm_case_insensitive() {
        assert_eq!("aes".parse::<Algorithm>().unwrap(), Algorithm::Aes);
        assert_eq!("Rsa".parse::<Algorithm>().unwrap(), Algorithm::Rsa);
        assert_eq!(" ec ".parse::<Algorithm>().unwrap(), Algorithm::Ec);
    }

    #[test]
    fn test_parse_algorithm_aliases() {
        assert_eq!("AES-256-GCM".parse::<Algorithm>().unwrap(), Algorithm::Aes);
        assert_eq!("rsa-2048".parse::<Algorithm>().unwrap(), Algorithm::Rsa);
        assert_eq!("EC-P256".parse::<Algorithm>().unwrap(), Algorithm::Ec);
        assert_eq!("ECDSA".parse::<Algorithm>().unwrap(), Algorithm::Ec);
    }

    #[test]
    fn test_parse_unknown_algorithm() {
        let err = "DES".parse::<Algorithm>().unwrap_err();
        assert!(matches!(err, Error::UnknownAlgorithm(ref name) if name == "DES"));

        assert!("".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_supported_purposes() {
        assert!(!Algorithm::Aes.can_sign());
        assert!(Algorithm::Rsa.can_sign());
        assert!(Algorithm::Ec.supported_purposes().contains(KeyPurpose::Encrypt));
        assert_eq!(Algorithm::Aes.supported_purposes().to_string(), "encrypt|decrypt");
    }

    #[test]
    fn test_purpose_set_operations() {
        let set: Purposes = [KeyPurpose::Sign, KeyPurpose::Verify].into_iter().collect();
        assert!(set.contains(KeyPurpose::Sign));
        assert!(!set.contains(KeyPurpose::Encrypt));
        assert!(set.is_subset_of(Purposes::ALL));
        assert!(!set.is_subset_of(Algorithm::Aes.supported_purposes()));
        assert!(Purposes::NONE.is_empty());
    }
}
