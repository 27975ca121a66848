//! # Crypto Service
//!
//! The single entry surface used by hosts (JNI, C ABI, CLI).
//!
//! ## Request Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          REQUEST FLOW                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  encrypt_text("Hello", Some("aes"))                                    │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  1. Parse algorithm name (case-insensitive, aliases allowed)           │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  2. Look up the active key for that algorithm ──► KeyStore             │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  3. Run the operation ──► cipher engine / signer                       │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  4. Encode the result (URL-safe base64 for text operations)            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Active Keys
//!
//! Text and file operations name an algorithm, not a key. The service binds
//! one *active* key per algorithm: the most recently generated one, or on
//! open the newest persisted one. The `*_with_key` variants take an
//! explicit alias instead.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, PAD, URL_SAFE};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, info};

use crate::capabilities::{capability_names, list_capabilities, Capability};
use crate::config::CoreConfig;
use crate::crypto::{self, Algorithm, Key, KeyHandle, KeyPurpose, Purposes};
use crate::error::{Error, Result};
use crate::storage::{FileBackend, KeyStore, SecureStore};

/// Key selection for a single operation
enum KeySelector<'a> {
    /// The active key of an algorithm
    Active(Algorithm),
    /// An explicit alias
    Alias(&'a str),
}

/// Facade over the key store, cipher engine and signer
///
/// `CryptoService` is `Send + Sync`; share it behind an `Arc`.
pub struct CryptoService {
    keys: KeyStore,
    config: CoreConfig,
    active: RwLock<HashMap<Algorithm, String>>,
}

impl CryptoService {
    /// Create a service over an already opened key store
    ///
    /// Each algorithm's active key is the newest stored key of that
    /// algorithm (ties broken by alias).
    pub fn new(keys: KeyStore, config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let mut active: HashMap<Algorithm, KeyHandle> = HashMap::new();
        for handle in keys.list_keys()? {
            let newer = active
                .get(&handle.algorithm)
                .map_or(true, |current| handle.created_at >= current.created_at);
            if newer {
                active.insert(handle.algorithm, handle);
            }
        }

        Ok(Self {
            keys,
            config,
            active: RwLock::new(
                active
                    .into_iter()
                    .map(|(algorithm, handle)| (algorithm, handle.alias))
                    .collect(),
            ),
        })
    }

    /// Open a service as described by `config`
    ///
    /// Keys persist under `config.storage_path` when set, otherwise in
    /// memory for the lifetime of the service.
    pub fn open(config: CoreConfig) -> Result<Self> {
        let store = match config.storage_path {
            Some(ref path) => SecureStore::new(Box::new(FileBackend::open(path)?)),
            None => SecureStore::in_memory(),
        };
        Self::open_with_store(store, config)
    }

    /// Open a service whose persisted keys are sealed under `wrapping_key`
    pub fn open_sealed(config: CoreConfig, wrapping_key: [u8; 32]) -> Result<Self> {
        let backend: Box<dyn crate::storage::KeystoreBackend> = match config.storage_path {
            Some(ref path) => Box::new(FileBackend::open(path)?),
            None => Box::new(crate::storage::MemoryBackend::new()),
        };
        Self::open_with_store(SecureStore::with_encryption(backend, wrapping_key), config)
    }

    /// Open a service over a caller-provided secure store
    pub fn open_with_store(store: SecureStore, config: CoreConfig) -> Result<Self> {
        config.validate()?;
        let keys = KeyStore::open(store, config.overwrite_policy)?;
        let service = Self::new(keys, config)?;
        info!(
            keys = service.keys.len(),
            default_cipher = %service.config.default_cipher_algorithm,
            default_signing = %service.config.default_signing_algorithm,
            "Crypto service ready"
        );
        Ok(service)
    }

    /// Create a service with an in-memory store and default configuration
    pub fn in_memory() -> Self {
        Self {
            keys: KeyStore::in_memory(CoreConfig::default().overwrite_policy),
            config: CoreConfig::default(),
            active: RwLock::new(HashMap::new()),
        }
    }

    /// The service configuration
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// The underlying key store
    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }

    /// Close the key store; every later operation fails with `StoreClosed`
    pub fn close(&self) {
        self.active.write().clear();
        self.keys.close();
    }

    // ========================================================================
    // ALGORITHM & KEY SELECTION
    // ========================================================================

    fn parse_or(name: Option<&str>, default: Algorithm) -> Result<Algorithm> {
        match name.map(str::trim) {
            None | Some("") => Ok(default),
            Some(name) => name.parse(),
        }
    }

    fn cipher_algorithm(&self, name: Option<&str>) -> Result<Algorithm> {
        Self::parse_or(name, self.config.default_cipher_algorithm)
    }

    fn signing_algorithm(&self, name: Option<&str>) -> Result<Algorithm> {
        Self::parse_or(name, self.config.default_signing_algorithm)
    }

    /// Alias of the active key for `algorithm`, if one is bound
    pub fn active_alias(&self, algorithm: Algorithm) -> Option<String> {
        self.active.read().get(&algorithm).cloned()
    }

    fn select(&self, selector: KeySelector<'_>) -> Result<Arc<Key>> {
        match selector {
            KeySelector::Alias(alias) => self.keys.key(alias),
            KeySelector::Active(algorithm) => {
                let alias = self.active_alias(algorithm).ok_or_else(|| {
                    Error::KeyNotFound(format!("no active {} key; generate one first", algorithm))
                })?;
                let key = self.keys.key(&alias)?;
                // The alias may since have been regenerated with another algorithm
                if key.algorithm() != algorithm {
                    return Err(Error::KeyNotFound(format!(
                        "no active {} key; '{}' now holds an {} key",
                        algorithm,
                        alias,
                        key.algorithm()
                    )));
                }
                Ok(key)
            }
        }
    }

    /// Load the key under `alias` for `operation`, requiring it to be an
    /// `algorithm` key
    ///
    /// A key of another algorithm is reported the way `operation` reports
    /// an unusable key: `DecryptionFailed` for decrypt, `VerificationFailed`
    /// for verify, `UnsupportedAlgorithm` for encrypt and sign.
    pub fn key_for_operation(&self, alias: &str, algorithm: &str, operation: KeyPurpose) -> Result<Arc<Key>> {
        let algorithm: Algorithm = algorithm.parse()?;
        let key = self.keys.key(alias)?;
        if key.algorithm() == algorithm {
            return Ok(key);
        }

        let message = format!("key '{}' is {}, not {}", alias, key.algorithm(), algorithm);
        Err(match operation {
            KeyPurpose::Decrypt => Error::DecryptionFailed(message),
            KeyPurpose::Verify => Error::VerificationFailed(message),
            KeyPurpose::Encrypt | KeyPurpose::Sign => Error::UnsupportedAlgorithm(message),
        })
    }

    fn rebind_after_removal(&self, alias: &str) -> Result<()> {
        let mut active = self.active.write();
        let orphaned: Vec<Algorithm> = active
            .iter()
            .filter(|(_, bound)| bound.as_str() == alias)
            .map(|(algorithm, _)| *algorithm)
            .collect();
        if orphaned.is_empty() {
            return Ok(());
        }

        let remaining = self.keys.list_keys()?;
        for algorithm in orphaned {
            let replacement = remaining
                .iter()
                .filter(|handle| handle.algorithm == algorithm)
                .max_by_key(|handle| handle.created_at)
                .map(|handle| handle.alias.clone());
            match replacement {
                Some(next) => {
                    active.insert(algorithm, next);
                }
                None => {
                    active.remove(&algorithm);
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // KEY MANAGEMENT
    // ========================================================================

    /// Generate a key with every purpose its algorithm supports
    ///
    /// The new key becomes the active key for its algorithm.
    ///
    /// ## Errors
    ///
    /// `UnknownAlgorithm` for an unrecognised name, otherwise as
    /// [`KeyStore::generate_key`].
    pub fn generate_key(&self, alias: &str, algorithm: &str) -> Result<KeyHandle> {
        let algorithm: Algorithm = algorithm.parse()?;
        self.generate_key_with(alias, algorithm, algorithm.supported_purposes())
    }

    /// Generate a key with explicit purposes
    pub fn generate_key_with(&self, alias: &str, algorithm: Algorithm, purposes: Purposes) -> Result<KeyHandle> {
        // Bound under the alias lock so the binding matches the stored key
        let handle = self.keys.generate_key_and(alias, algorithm, purposes, |_| {
            let mut active = self.active.write();
            // A regenerated alias no longer backs the algorithm it used to
            active.retain(|bound_algorithm, bound| bound.as_str() != alias || *bound_algorithm == algorithm);
            active.insert(algorithm, alias.to_string());
        })?;

        info!(alias, algorithm = %algorithm, "Key generated");
        Ok(handle)
    }

    /// Generate a key on the blocking thread pool
    ///
    /// RSA generation can take seconds; this keeps async callers responsive.
    /// Must be called from within a Tokio runtime.
    pub async fn generate_key_async(self: &Arc<Self>, alias: String, algorithm: String) -> Result<KeyHandle> {
        let service = Arc::clone(self);
        tokio::task::spawn_blocking(move || service.generate_key(&alias, &algorithm))
            .await
            .map_err(|e| Error::Internal(format!("Key generation task failed: {}", e)))?
    }

    /// Get the handle of the key under `alias`
    pub fn get_key(&self, alias: &str) -> Result<KeyHandle> {
        self.keys.get_key(alias)
    }

    /// Handles of every stored key, ordered by alias
    pub fn list_keys(&self) -> Result<Vec<KeyHandle>> {
        self.keys.list_keys()
    }

    /// Delete the key under `alias` (idempotent)
    ///
    /// If it was an active key, the newest remaining key of the same
    /// algorithm takes its place.
    pub fn delete_key(&self, alias: &str) -> Result<bool> {
        self.keys.delete_key_and(alias, || self.rebind_after_removal(alias))
    }

    /// Supported algorithm names, in the order AES, RSA, EC
    pub fn get_capabilities(&self) -> Vec<String> {
        capability_names()
    }

    /// Supported algorithms with their parameters and operations
    pub fn capabilities(&self) -> &'static [Capability] {
        list_capabilities()
    }

    // ========================================================================
    // TEXT OPERATIONS
    // ========================================================================

    /// Encrypt UTF-8 text with the active key of `algorithm`
    ///
    /// ## Returns
    ///
    /// The envelope as URL-safe base64 with padding.
    pub fn encrypt_text(&self, text: &str, algorithm: Option<&str>) -> Result<String> {
        let algorithm = self.cipher_algorithm(algorithm)?;
        self.encrypt_text_inner(text, KeySelector::Active(algorithm))
    }

    /// Encrypt UTF-8 text with the key under `alias`
    pub fn encrypt_text_with_key(&self, text: &str, alias: &str) -> Result<String> {
        self.encrypt_text_inner(text, KeySelector::Alias(alias))
    }

    fn encrypt_text_inner(&self, text: &str, selector: KeySelector<'_>) -> Result<String> {
        let key = self.select(selector)?;
        let ciphertext = crypto::encrypt(&key, text.as_bytes())?;
        debug!(alias = key.alias(), bytes = text.len(), "Text encrypted");
        Ok(encode_base64(ciphertext))
    }

    /// Decrypt text produced by [`encrypt_text`](Self::encrypt_text)
    ///
    /// ## Errors
    ///
    /// `DecryptionFailed` for invalid base64, a failed envelope, or
    /// plaintext that is not UTF-8.
    pub fn decrypt_text(&self, encoded: &str, algorithm: Option<&str>) -> Result<String> {
        let algorithm = self.cipher_algorithm(algorithm)?;
        self.decrypt_text_inner(encoded, KeySelector::Active(algorithm))
    }

    /// Decrypt text with the key under `alias`
    pub fn decrypt_text_with_key(&self, encoded: &str, alias: &str) -> Result<String> {
        self.decrypt_text_inner(encoded, KeySelector::Alias(alias))
    }

    fn decrypt_text_inner(&self, encoded: &str, selector: KeySelector<'_>) -> Result<String> {
        let key = self.select(selector)?;
        let ciphertext = decode_base64(encoded)
            .map_err(|e| Error::DecryptionFailed(format!("Invalid base64: {}", e)))?;
        let plaintext = crypto::decrypt(&key, &ciphertext)?;
        debug!(alias = key.alias(), bytes = plaintext.len(), "Text decrypted");
        String::from_utf8(plaintext)
            .map_err(|_| Error::DecryptionFailed("Plaintext is not valid UTF-8".into()))
    }

    /// Sign UTF-8 text with the active key of `algorithm`
    ///
    /// ## Returns
    ///
    /// The signature as URL-safe base64 with padding.
    pub fn sign_text(&self, text: &str, algorithm: Option<&str>) -> Result<String> {
        let algorithm = self.signing_algorithm(algorithm)?;
        self.sign_text_inner(text, KeySelector::Active(algorithm))
    }

    /// Sign UTF-8 text with the key under `alias`
    pub fn sign_text_with_key(&self, text: &str, alias: &str) -> Result<String> {
        self.sign_text_inner(text, KeySelector::Alias(alias))
    }

    fn sign_text_inner(&self, text: &str, selector: KeySelector<'_>) -> Result<String> {
        let key = self.select(selector)?;
        let signature = crypto::sign(&key, text.as_bytes())?;
        debug!(alias = key.alias(), bytes = text.len(), "Text signed");
        Ok(encode_base64(signature))
    }

    /// Verify a base64 signature over UTF-8 text
    ///
    /// ## Returns
    ///
    /// `false` on mismatch.
    ///
    /// ## Errors
    ///
    /// `VerificationFailed` for invalid base64, a wrong-length signature,
    /// or a key that cannot verify.
    pub fn verify_text(&self, text: &str, signature: &str, algorithm: Option<&str>) -> Result<bool> {
        let algorithm = self.signing_algorithm(algorithm)?;
        self.verify_text_inner(text, signature, KeySelector::Active(algorithm))
    }

    /// Verify a base64 signature with the key under `alias`
    pub fn verify_text_with_key(&self, text: &str, signature: &str, alias: &str) -> Result<bool> {
        self.verify_text_inner(text, signature, KeySelector::Alias(alias))
    }

    fn verify_text_inner(&self, text: &str, signature: &str, selector: KeySelector<'_>) -> Result<bool> {
        let key = self.select(selector)?;
        let signature = decode_base64(signature)
            .map_err(|e| Error::VerificationFailed(format!("Invalid base64: {}", e)))?;
        let valid = crypto::verify(&key, text.as_bytes(), &signature)?;
        debug!(alias = key.alias(), valid, "Signature checked");
        Ok(valid)
    }

    // ========================================================================
    // FILE OPERATIONS
    // ========================================================================

    /// Encrypt file contents with the active key of `algorithm`
    ///
    /// Payloads above the configured threshold are chunked.
    pub fn encrypt_file(&self, data: &[u8], algorithm: Option<&str>) -> Result<Vec<u8>> {
        let algorithm = self.cipher_algorithm(algorithm)?;
        self.encrypt_file_inner(data, KeySelector::Active(algorithm))
    }

    /// Encrypt file contents with the key under `alias`
    pub fn encrypt_file_with_key(&self, data: &[u8], alias: &str) -> Result<Vec<u8>> {
        self.encrypt_file_inner(data, KeySelector::Alias(alias))
    }

    fn encrypt_file_inner(&self, data: &[u8], selector: KeySelector<'_>) -> Result<Vec<u8>> {
        let key = self.select(selector)?;
        let ciphertext = crypto::encrypt_file(&key, data, &self.config.chunk_options())?;
        debug!(alias = key.alias(), bytes = data.len(), "File encrypted");
        Ok(ciphertext)
    }

    /// Decrypt file contents with the active key of `algorithm`
    pub fn decrypt_file(&self, data: &[u8], algorithm: Option<&str>) -> Result<Vec<u8>> {
        let algorithm = self.cipher_algorithm(algorithm)?;
        self.decrypt_file_inner(data, KeySelector::Active(algorithm))
    }

    /// Decrypt file contents with the key under `alias`
    pub fn decrypt_file_with_key(&self, data: &[u8], alias: &str) -> Result<Vec<u8>> {
        self.decrypt_file_inner(data, KeySelector::Alias(alias))
    }

    fn decrypt_file_inner(&self, data: &[u8], selector: KeySelector<'_>) -> Result<Vec<u8>> {
        let key = self.select(selector)?;
        let plaintext = crypto::decrypt(&key, data)?;
        debug!(alias = key.alias(), bytes = plaintext.len(), "File decrypted");
        Ok(plaintext)
    }

    /// Encrypt a stream in chunks with the active key of `algorithm`
    ///
    /// ## Returns
    ///
    /// Number of plaintext bytes consumed.
    pub fn encrypt_stream<R: Read, W: Write>(&self, reader: R, writer: W, algorithm: Option<&str>) -> Result<u64> {
        let algorithm = self.cipher_algorithm(algorithm)?;
        let key = self.select(KeySelector::Active(algorithm))?;
        crypto::encrypt_stream(&key, reader, writer, self.config.chunk_size)
    }

    /// Encrypt a stream in chunks with the key under `alias`
    pub fn encrypt_stream_with_key<R: Read, W: Write>(&self, reader: R, writer: W, alias: &str) -> Result<u64> {
        let key = self.select(KeySelector::Alias(alias))?;
        crypto::encrypt_stream(&key, reader, writer, self.config.chunk_size)
    }

    /// Decrypt a stream with the active key of `algorithm`
    ///
    /// Output is written as chunks authenticate; see
    /// [`crypto::decrypt_stream`].
    pub fn decrypt_stream<R: Read, W: Write>(&self, reader: R, writer: W, algorithm: Option<&str>) -> Result<u64> {
        let algorithm = self.cipher_algorithm(algorithm)?;
        let key = self.select(KeySelector::Active(algorithm))?;
        crypto::decrypt_stream(&key, reader, writer)
    }

    /// Decrypt a stream with the key under `alias`
    pub fn decrypt_stream_with_key<R: Read, W: Write>(&self, reader: R, writer: W, alias: &str) -> Result<u64> {
        let key = self.select(KeySelector::Alias(alias))?;
        crypto::decrypt_stream(&key, reader, writer)
    }
}

impl std::fmt::Debug for CryptoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoService")
            .field("keys", &self.keys)
            .field("active", &*self.active.read())
            .finish()
    }
}

/// URL-safe decoding that accepts input with or without padding
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    PAD.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode bytes as URL-safe base64 with padding
pub fn encode_base64(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE.encode(bytes)
}

/// Decode URL-safe base64, ignoring ASCII whitespace (line-wrapped input)
pub fn decode_base64(encoded: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    URL_SAFE_LENIENT.decode(compact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyOverwritePolicy;

    fn service() -> CryptoService {
        CryptoService::in_memory()
    }

    #[test]
    fn test_ec_sign_verify_scenario() {
        let service = service();
        service.generate_key("k1", "EC").unwrap();

        let signature = service.sign_text("Hello World", Some("EC")).unwrap();
        assert!(service.verify_text("Hello World", &signature, Some("EC")).unwrap());

        let mut bytes = decode_base64(&signature).unwrap();
        bytes[5] ^= 0x01;
        let tampered = URL_SAFE.encode(bytes);
        assert!(!service.verify_text("Hello World", &tampered, Some("EC")).unwrap());
    }

    #[test]
    fn test_aes_double_encrypt_scenario() {
        let service = service();
        service.generate_key("k2", "AES").unwrap();

        let first = service.encrypt_text("Hello World", Some("AES")).unwrap();
        let second = service.encrypt_text("Hello World", Some("AES")).unwrap();
        assert_ne!(first, second);
        assert_eq!(service.decrypt_text(&first, Some("AES")).unwrap(), "Hello World");
        assert_eq!(service.decrypt_text(&second, Some("AES")).unwrap(), "Hello World");
    }

    #[test]
    fn test_text_roundtrip_every_algorithm() {
        let service = service();
        for name in ["aes", "rsa", "ec"] {
            service.generate_key(&format!("{}-key", name), name).unwrap();
            let encrypted = service.encrypt_text("héllo wörld", Some(name)).unwrap();
            assert_eq!(service.decrypt_text(&encrypted, Some(name)).unwrap(), "héllo wörld");
        }
    }

    #[test]
    fn test_defaults_when_algorithm_omitted() {
        let service = service();
        service.generate_key("cipher", "AES").unwrap();
        service.generate_key("signer", "EC").unwrap();

        let encrypted = service.encrypt_text("x", None).unwrap();
        assert_eq!(service.decrypt_text(&encrypted, Some("AES")).unwrap(), "x");

        let signature = service.sign_text("x", Some("")).unwrap();
        assert!(service.verify_text("x", &signature, Some("EC")).unwrap());
    }

    #[test]
    fn test_unknown_algorithm() {
        let service = service();
        assert!(matches!(service.generate_key("k", "DES"), Err(Error::UnknownAlgorithm(_))));
        assert!(matches!(service.encrypt_text("x", Some("blowfish")), Err(Error::UnknownAlgorithm(_))));
    }

    #[test]
    fn test_no_active_key() {
        let service = service();
        assert!(matches!(service.encrypt_text("x", Some("AES")), Err(Error::KeyNotFound(_))));
    }

    #[test]
    fn test_aes_cannot_sign() {
        let service = service();
        service.generate_key("k", "AES").unwrap();
        assert!(matches!(service.sign_text("x", Some("AES")), Err(Error::UnsupportedAlgorithm(_))));
        assert!(matches!(
            service.verify_text("x", &URL_SAFE.encode([0u8; 64]), Some("AES")),
            Err(Error::VerificationFailed(_))
        ));
    }

    #[test]
    fn test_rsa_payload_too_large() {
        let service = service();
        service.generate_key("r", "RSA").unwrap();
        let long = "a".repeat(191);
        assert!(matches!(
            service.encrypt_text(&long, Some("RSA")),
            Err(Error::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_whitespace_in_encoded_input() {
        let service = service();
        service.generate_key("k", "AES").unwrap();
        let encrypted = service.encrypt_text("wrapped", None).unwrap();

        let (head, tail) = encrypted.split_at(10);
        let wrapped = format!("  {}\n{}\r\n", head, tail);
        assert_eq!(service.decrypt_text(&wrapped, None).unwrap(), "wrapped");
    }

    #[test]
    fn test_unpadded_input_accepted() {
        let service = service();
        service.generate_key("k", "AES").unwrap();
        let encrypted = service.encrypt_text("pad", None).unwrap();
        let unpadded = encrypted.trim_end_matches('=');
        assert_eq!(service.decrypt_text(unpadded, None).unwrap(), "pad");
    }

    #[test]
    fn test_invalid_base64() {
        let service = service();
        service.generate_key("k", "EC").unwrap();
        assert!(matches!(service.decrypt_text("!!!", Some("EC")), Err(Error::DecryptionFailed(_))));
        assert!(matches!(
            service.verify_text("x", "!!!", Some("EC")),
            Err(Error::VerificationFailed(_))
        ));
    }

    #[test]
    fn test_decrypt_with_replaced_key_fails() {
        let service = service();
        service.generate_key("k", "AES").unwrap();
        let encrypted = service.encrypt_text("secret", None).unwrap();

        service.generate_key("k", "AES").unwrap();
        assert!(matches!(service.decrypt_text(&encrypted, None), Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_active_key_follows_latest_generation() {
        let service = service();
        service.generate_key("first", "AES").unwrap();
        service.generate_key("second", "AES").unwrap();
        assert_eq!(service.active_alias(Algorithm::Aes).as_deref(), Some("second"));

        let encrypted = service.encrypt_text("x", None).unwrap();
        assert!(service.decrypt_text_with_key(&encrypted, "first").is_err());
        assert_eq!(service.decrypt_text_with_key(&encrypted, "second").unwrap(), "x");

        service.delete_key("second").unwrap();
        assert_eq!(service.active_alias(Algorithm::Aes).as_deref(), Some("first"));
        service.delete_key("first").unwrap();
        assert_eq!(service.active_alias(Algorithm::Aes), None);
    }

    #[test]
    fn test_alias_regenerated_with_other_algorithm() {
        let service = service();
        service.generate_key("k", "AES").unwrap();
        service.generate_key("k", "EC").unwrap();

        assert_eq!(service.active_alias(Algorithm::Aes), None);
        assert!(matches!(service.encrypt_text("x", Some("AES")), Err(Error::KeyNotFound(_))));
        assert!(service.encrypt_text("x", Some("EC")).is_ok());
    }

    #[test]
    fn test_explicit_key_variants() {
        let service = service();
        service.generate_key("signer", "EC").unwrap();
        service.generate_key("other", "EC").unwrap();

        let signature = service.sign_text_with_key("msg", "signer").unwrap();
        assert!(service.verify_text_with_key("msg", &signature, "signer").unwrap());
        assert!(!service.verify_text_with_key("msg", &signature, "other").unwrap());
        assert!(matches!(
            service.sign_text_with_key("msg", "missing"),
            Err(Error::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_file_roundtrip_chunked() {
        let config = CoreConfig {
            chunk_threshold: 2048,
            chunk_size: 1000,
            ..CoreConfig::default()
        };
        let service = CryptoService::new(KeyStore::in_memory(KeyOverwritePolicy::Replace), config).unwrap();
        service.generate_key("files", "EC").unwrap();

        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 256) as u8).collect();
        let encrypted = service.encrypt_file(&data, Some("EC")).unwrap();
        assert!(crypto::Scheme::of(&encrypted).unwrap().is_chunked());
        assert_eq!(service.decrypt_file(&encrypted, Some("EC")).unwrap(), data);

        let small = service.encrypt_file(b"tiny", Some("EC")).unwrap();
        assert_eq!(service.decrypt_file(&small, Some("EC")).unwrap(), b"tiny");
    }

    #[test]
    fn test_empty_file() {
        let service = service();
        service.generate_key("k", "AES").unwrap();
        let encrypted = service.encrypt_file(b"", None).unwrap();
        assert!(service.decrypt_file(&encrypted, None).unwrap().is_empty());
    }

    #[test]
    fn test_stream_with_key() {
        let service = service();
        service.generate_key("stream", "AES").unwrap();

        let mut encrypted = Vec::new();
        service.encrypt_stream_with_key(&b"streamed data"[..], &mut encrypted, "stream").unwrap();
        let mut decrypted = Vec::new();
        service.decrypt_stream(&encrypted[..], &mut decrypted, Some("AES")).unwrap();
        assert_eq!(decrypted, b"streamed data");
    }

    #[test]
    fn test_capabilities() {
        let service = service();
        assert_eq!(service.get_capabilities(), vec!["AES", "RSA", "EC"]);
        assert_eq!(service.capabilities().len(), 3);
    }

    #[test]
    fn test_active_keys_restored_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreConfig {
            storage_path: Some(dir.path().to_string_lossy().into_owned()),
            ..CoreConfig::default()
        };

        let encrypted = {
            let service = CryptoService::open(config.clone()).unwrap();
            service.generate_key("old", "AES").unwrap();
            std::thread::sleep(std::time::Duration::from_millis(5));
            service.generate_key("new", "AES").unwrap();
            service.encrypt_text("persisted", None).unwrap()
        };

        let service = CryptoService::open(config).unwrap();
        assert_eq!(service.active_alias(Algorithm::Aes).as_deref(), Some("new"));
        assert_eq!(service.decrypt_text(&encrypted, None).unwrap(), "persisted");
    }

    #[test]
    fn test_sealed_service() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreConfig {
            storage_path: Some(dir.path().to_string_lossy().into_owned()),
            ..CoreConfig::default()
        };

        CryptoService::open_sealed(config.clone(), [3u8; 32])
            .unwrap()
            .generate_key("k", "EC")
            .unwrap();

        assert!(CryptoService::open_sealed(config.clone(), [3u8; 32]).is_ok());
        assert!(matches!(CryptoService::open(config), Err(Error::StorageCorrupted(_))));
    }

    #[test]
    fn test_closed_service() {
        let service = service();
        service.generate_key("k", "AES").unwrap();
        service.close();
        assert!(matches!(service.generate_key("j", "AES"), Err(Error::StoreClosed)));
        assert!(matches!(service.list_keys(), Err(Error::StoreClosed)));
    }

    #[test]
    fn test_concurrent_operations() {
        let service = Arc::new(service());
        service.generate_key("k", "AES").unwrap();
        service.generate_key("s", "EC").unwrap();

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let service = Arc::clone(&service);
                std::thread::spawn(move || {
                    let text = format!("message {}", i);
                    let encrypted = service.encrypt_text(&text, None).unwrap();
                    assert_eq!(service.decrypt_text(&encrypted, None).unwrap(), text);
                    let signature = service.sign_text(&text, None).unwrap();
                    assert!(service.verify_text(&text, &signature, None).unwrap());
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
    }

    #[test]
    fn test_concurrent_regeneration_keeps_binding() {
        let service = Arc::new(service());

        for _ in 0..200 {
            let threads: Vec<_> = (0..8)
                .map(|i| {
                    let service = Arc::clone(&service);
                    let algorithm = if i % 2 == 0 { "AES" } else { "EC" };
                    std::thread::spawn(move || service.generate_key("k", algorithm).unwrap())
                })
                .collect();
            for thread in threads {
                thread.join().unwrap();
            }

            let stored = service.get_key("k").unwrap().algorithm;
            let other = if stored == Algorithm::Aes { Algorithm::Ec } else { Algorithm::Aes };
            assert_eq!(service.active_alias(stored).as_deref(), Some("k"));
            assert_eq!(service.active_alias(other), None);

            let encrypted = service.encrypt_text("x", Some(stored.name())).unwrap();
            assert_eq!(service.decrypt_text(&encrypted, Some(stored.name())).unwrap(), "x");
        }
    }

    #[test]
    fn test_delete_racing_regeneration() {
        let service = Arc::new(service());
        service.generate_key("fallback", "EC").unwrap();

        for _ in 0..100 {
            let threads: Vec<_> = (0..4)
                .map(|i| {
                    let service = Arc::clone(&service);
                    std::thread::spawn(move || {
                        if i % 2 == 0 {
                            service.generate_key("k", "EC").map(|_| ())
                        } else {
                            service.delete_key("k").map(|_| ())
                        }
                    })
                })
                .collect();
            for thread in threads {
                thread.join().unwrap().unwrap();
            }

            let bound = service.active_alias(Algorithm::Ec).unwrap();
            assert_eq!(service.get_key(&bound).unwrap().algorithm, Algorithm::Ec);
            assert!(service.sign_text("x", Some("EC")).is_ok());
        }
    }

    #[test]
    fn test_key_for_operation_mismatch() {
        let service = service();
        service.generate_key("ec", "EC").unwrap();

        assert_eq!(
            service.key_for_operation("ec", "ec", KeyPurpose::Verify).unwrap().algorithm(),
            Algorithm::Ec
        );
        assert!(matches!(
            service.key_for_operation("ec", "RSA", KeyPurpose::Verify),
            Err(Error::VerificationFailed(_))
        ));
        assert!(matches!(
            service.key_for_operation("ec", "RSA", KeyPurpose::Decrypt),
            Err(Error::DecryptionFailed(_))
        ));
        assert!(matches!(
            service.key_for_operation("ec", "AES", KeyPurpose::Sign),
            Err(Error::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            service.key_for_operation("ec", "DES", KeyPurpose::Verify),
            Err(Error::UnknownAlgorithm(_))
        ));
        assert!(matches!(
            service.key_for_operation("missing", "EC", KeyPurpose::Verify),
            Err(Error::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_delete_after_close_reports_error() {
        let service = service();
        service.generate_key("k", "AES").unwrap();
        service.close();
        assert!(matches!(service.delete_key("k"), Err(Error::StoreClosed)));
    }

    #[tokio::test]
    async fn test_generate_key_async() {
        let service = Arc::new(service());
        let handle = service
            .generate_key_async("async".to_string(), "EC".to_string())
            .await
            .unwrap();

        assert_eq!(handle.algorithm, Algorithm::Ec);
        assert_eq!(service.get_key("async").unwrap(), handle);
        assert_eq!(service.active_alias(Algorithm::Ec).as_deref(), Some("async"));
    }

    #[tokio::test]
    async fn test_generate_key_async_error() {
        let service = Arc::new(service());
        let result = service.generate_key_async("k".to_string(), "DES".to_string()).await;
        assert!(matches!(result, Err(Error::UnknownAlgorithm(_))));
    }
}
