//! # Configuration
//!
//! Runtime configuration for the crypto service, loadable from JSON.
//!
//! Every field has a default, so `{}` is a valid configuration:
//!
//! ```json
//! {
//!   "storage_path": "/data/user/0/com.example.netwatch/files/keys",
//!   "chunk_threshold": 16777216,
//!   "chunk_size": 1048576,
//!   "overwrite_policy": "replace",
//!   "default_cipher_algorithm": "AES",
//!   "default_signing_algorithm": "EC",
//!   "verbose_logging": false
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::crypto::{Algorithm, ChunkOptions, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_THRESHOLD, MAX_CHUNK_SIZE};
use crate::error::{Error, Result};

/// What `generate_key` does when the alias is already taken
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyOverwritePolicy {
    /// Replace the existing key; handles to it become stale
    #[default]
    Replace,
    /// Fail with `KeyAlreadyExists`
    Reject,
}

/// Configuration for the Netwatch crypto service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Directory for persisted keys (in-memory store if None)
    pub storage_path: Option<String>,
    /// File payloads larger than this many bytes are chunked
    pub chunk_threshold: usize,
    /// Plaintext bytes per chunk
    pub chunk_size: usize,
    /// Behaviour when regenerating an existing alias
    pub overwrite_policy: KeyOverwritePolicy,
    /// Algorithm for cipher operations that name none
    pub default_cipher_algorithm: Algorithm,
    /// Algorithm for signing operations that name none
    pub default_signing_algorithm: Algorithm,
    /// Enable verbose logging
    pub verbose_logging: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            storage_path: None,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            overwrite_policy: KeyOverwritePolicy::Replace,
            default_cipher_algorithm: Algorithm::Aes,
            default_signing_algorithm: Algorithm::Ec,
            verbose_logging: false,
        }
    }
}

impl CoreConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CoreConfig = serde_json::from_str(json)
            .map_err(|e| Error::InvalidInput(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values are usable together
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(Error::InvalidInput(format!(
                "chunk_size must be between 1 and {} bytes",
                MAX_CHUNK_SIZE
            )));
        }
        if !self.default_signing_algorithm.can_sign() {
            return Err(Error::InvalidInput(format!(
                "default_signing_algorithm {} cannot sign",
                self.default_signing_algorithm
            )));
        }
        Ok(())
    }

    /// Chunking parameters for file encryption
    pub fn chunk_options(&self) -> ChunkOptions {
        ChunkOptions {
            threshold: self.chunk_threshold,
            chunk_size: self.chunk_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.default_cipher_algorithm, Algorithm::Aes);
        assert_eq!(config.default_signing_algorithm, Algorithm::Ec);
        assert_eq!(config.overwrite_policy, KeyOverwritePolicy::Replace);
        assert_eq!(config.chunk_threshold, 16 * 1024 * 1024);
        assert_eq!(config.chunk_size, 1024 * 1024);
        assert!(config.storage_path.is_none());
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(CoreConfig::from_json("{}").unwrap(), CoreConfig::default());
    }

    #[test]
    fn test_partial_json() {
        let config = CoreConfig::from_json(
            r#"{"overwrite_policy": "reject", "default_signing_algorithm": "RSA", "chunk_size": 4096}"#,
        )
        .unwrap();
        assert_eq!(config.overwrite_policy, KeyOverwritePolicy::Reject);
        assert_eq!(config.default_signing_algorithm, Algorithm::Rsa);
        assert_eq!(config.chunk_options().chunk_size, 4096);
        assert_eq!(config.default_cipher_algorithm, Algorithm::Aes);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            CoreConfig::from_json(r#"{"chunk_size": 0}"#),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            CoreConfig::from_json(r#"{"default_signing_algorithm": "AES"}"#),
            Err(Error::InvalidInput(_))
        ));
        assert!(CoreConfig::from_json("not json").is_err());
    }
}
