//! # Digital Signatures
//!
//! RSA PKCS#1 v1.5 and ECDSA P-256 signatures, both over SHA-256.
//!
//! ## Signature Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SIGNATURE FLOW                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  SIGNING                                                               │
//! │  ───────                                                                │
//! │  payload ──► SHA-256 ──► RSA PKCS#1 v1.5   ──► 256-byte signature      │
//! │                     └──► ECDSA P-256       ──► 64-byte r ‖ s           │
//! │                                                                         │
//! │  VERIFICATION                                                          │
//! │  ────────────                                                           │
//! │  (payload, signature, key) ──► true / false                            │
//! │                                                                         │
//! │  • Wrong signature length        → VerificationFailed (malformed)      │
//! │  • Key that cannot verify        → VerificationFailed                  │
//! │  • Tampered payload or signature → false                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use p256::ecdsa::{
    signature::{Signer as _, Verifier as _},
    Signature as EcdsaSignature, SigningKey as EcdsaSigningKey, VerifyingKey as EcdsaVerifyingKey,
};
use rsa::pkcs1v15::{Signature as RsaSignature, SigningKey as RsaSigningKey, VerifyingKey as RsaVerifyingKey};
use rsa::signature::SignatureEncoding;
use sha2::Sha256;

use super::keys::{Key, KeyMaterial};
use super::KeyPurpose;
use crate::error::{Error, Result};

/// Size of an RSA-2048 signature in bytes
pub const RSA_SIGNATURE_SIZE: usize = 256;

/// Size of an ECDSA P-256 signature in bytes (`r ‖ s`)
pub const ECDSA_SIGNATURE_SIZE: usize = 64;

/// Sign a payload
///
/// ## Parameters
///
/// - `key`: An RSA or EC key generated with the sign purpose
/// - `payload`: Bytes to sign (may be empty)
///
/// ## Returns
///
/// The algorithm-native signature bytes.
///
/// ## Errors
///
/// `UnsupportedAlgorithm` if the key lacks the sign purpose (AES keys
/// never have it).
pub fn sign(key: &Key, payload: &[u8]) -> Result<Vec<u8>> {
    key.require(KeyPurpose::Sign)?;

    match key.material() {
        KeyMaterial::Rsa(private) => {
            let signing_key = RsaSigningKey::<Sha256>::new(private.as_ref().clone());
            let signature: RsaSignature = signing_key
                .try_sign(payload)
                .map_err(|e| Error::SigningFailed(e.to_string()))?;
            Ok(signature.to_vec())
        }
        KeyMaterial::Ec(secret) => {
            let signing_key = EcdsaSigningKey::from(secret);
            let signature: EcdsaSignature = signing_key
                .try_sign(payload)
                .map_err(|e| Error::SigningFailed(e.to_string()))?;
            Ok(signature.to_bytes().to_vec())
        }
        KeyMaterial::Aes(_) => Err(Error::UnsupportedAlgorithm(
            "AES keys cannot produce signatures".into(),
        )),
    }
}

/// Verify a signature
///
/// ## Returns
///
/// `true` if `signature` was produced over `payload` by `key`, `false` on
/// any mismatch.
///
/// ## Errors
///
/// `VerificationFailed` when the signature has the wrong length for the
/// algorithm, or the key cannot verify (AES, or no verify purpose).
pub fn verify(key: &Key, payload: &[u8], signature: &[u8]) -> Result<bool> {
    if !key.allows(KeyPurpose::Verify) {
        return Err(Error::VerificationFailed(format!(
            "{} key '{}' cannot verify signatures",
            key.algorithm(),
            key.alias()
        )));
    }

    match key.material() {
        KeyMaterial::Rsa(private) => {
            expect_length(signature, RSA_SIGNATURE_SIZE)?;
            let Ok(signature) = RsaSignature::try_from(signature) else {
                return Ok(false);
            };
            let verifying_key = RsaVerifyingKey::<Sha256>::new(private.to_public_key());
            Ok(verifying_key.verify(payload, &signature).is_ok())
        }
        KeyMaterial::Ec(secret) => {
            expect_length(signature, ECDSA_SIGNATURE_SIZE)?;
            // Correct length but r or s out of range: a mismatch, not malformed
            let Ok(signature) = EcdsaSignature::from_slice(signature) else {
                return Ok(false);
            };
            let verifying_key = EcdsaVerifyingKey::from(&secret.public_key());
            Ok(verifying_key.verify(payload, &signature).is_ok())
        }
        KeyMaterial::Aes(_) => Err(Error::VerificationFailed(
            "AES keys cannot verify signatures".into(),
        )),
    }
}

fn expect_length(signature: &[u8], expected: usize) -> Result<()> {
    if signature.len() != expected {
        return Err(Error::VerificationFailed(format!(
            "Malformed signature: expected {} bytes, found {}",
            expected,
            signature.len()
        )));
    }
    Ok(())
}
