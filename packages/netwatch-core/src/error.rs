//! # Error Handling
//!
//! This module provides the error type shared by every Netwatch Core
//! component.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Lifecycle Errors (100-199)                                        │
//! │  │   ├── NotInitialized        - FFI layer not initialized             │
//! │  │   ├── AlreadyInitialized    - FFI layer already initialized         │
//! │  │   └── StoreClosed           - Key store has been closed             │
//! │  │                                                                      │
//! │  ├── Key Errors (200-299)                                              │
//! │  │   ├── KeyNotFound           - No key under alias / stale handle     │
//! │  │   ├── KeyGenerationFailed   - RNG failure or invalid parameters     │
//! │  │   ├── KeyAlreadyExists      - Alias taken under the reject policy   │
//! │  │   └── InvalidAlias          - Empty or oversized alias              │
//! │  │                                                                      │
//! │  ├── Crypto Errors (300-399)                                           │
//! │  │   ├── UnsupportedAlgorithm  - Key cannot perform the operation      │
//! │  │   ├── UnknownAlgorithm      - Algorithm name not recognised         │
//! │  │   ├── PayloadTooLarge       - Input exceeds the algorithm limit     │
//! │  │   ├── DecryptionFailed      - Tag mismatch, malformed, wrong key    │
//! │  │   ├── VerificationFailed    - Malformed signature / key mismatch    │
//! │  │   ├── EncryptionFailed      - Primitive failure while encrypting    │
//! │  │   └── SigningFailed         - Primitive failure while signing       │
//! │  │                                                                      │
//! │  ├── Storage Errors (400-499)                                          │
//! │  │   ├── StorageReadError      - Backend read failed                   │
//! │  │   ├── StorageWriteError     - Backend write failed                  │
//! │  │   └── StorageCorrupted      - Persisted record cannot be decoded    │
//! │  │                                                                      │
//! │  └── Internal Errors (900-999)                                         │
//! │      ├── Internal, SerializationError, InvalidInput                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Crossing the FFI boundary
//!
//! ```text
//!  Internal (Rust)              FFI Boundary              Host (Kotlin/C)
//!  ──────────────────────────────────────────────────────────────────────
//!  Result<T, Error>  ──────►  code + kind + message  ──────►  exception
//!
//!  Err(Error::DecryptionFailed(..))
//!      →  { code: 303, kind: "DecryptionError", message: "..." }
//! ```

use thiserror::Error;

/// Result type alias for Netwatch Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Netwatch Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Lifecycle Errors (100-199)
    // ========================================================================

    /// The FFI layer has not been initialized
    #[error("Netwatch Core has not been initialized. Call netwatch_init() first.")]
    NotInitialized,

    /// The FFI layer has already been initialized
    #[error("Netwatch Core has already been initialized.")]
    AlreadyInitialized,

    /// The key store was closed
    #[error("The key store has been closed.")]
    StoreClosed,

    // ========================================================================
    // Key Errors (200-299)
    // ========================================================================

    /// No key stored under the alias, or the handle refers to a key that
    /// has since been replaced or deleted
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Key generation failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// Alias already in use and the store rejects overwrites
    #[error("A key already exists under alias '{0}'.")]
    KeyAlreadyExists(String),

    /// Alias is empty or too long
    #[error("Invalid key alias: {0}")]
    InvalidAlias(String),

    // ========================================================================
    // Crypto Errors (300-399)
    // ========================================================================

    /// The key or algorithm cannot perform the requested operation
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The algorithm name is not recognised
    #[error("Unknown algorithm: '{0}'")]
    UnknownAlgorithm(String),

    /// The input is larger than the algorithm accepts
    #[error("Payload too large: {size} bytes exceeds the {algorithm} limit of {limit} bytes")]
    PayloadTooLarge {
        /// Algorithm name
        algorithm: &'static str,
        /// Input size in bytes
        size: usize,
        /// Maximum accepted size in bytes
        limit: usize,
    },

    /// Decryption failed
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Signature verification could not be performed
    #[error("Signature verification failed: {0}")]
    VerificationFailed(String),

    /// Encryption failed
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Signing failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    // ========================================================================
    // Storage Errors (400-499)
    // ========================================================================

    /// Failed to read from storage
    #[error("Failed to read from storage: {0}")]
    StorageReadError(String),

    /// Failed to write to storage
    #[error("Failed to write to storage: {0}")]
    StorageWriteError(String),

    /// Data corruption detected
    #[error("Data corruption detected: {0}")]
    StorageCorrupted(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Get the error code for FFI
    ///
    /// Error codes are organized by category:
    /// - 100-199: Lifecycle
    /// - 200-299: Keys
    /// - 300-399: Crypto
    /// - 400-499: Storage
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Lifecycle (100-199)
            Error::NotInitialized => 100,
            Error::AlreadyInitialized => 101,
            Error::StoreClosed => 102,

            // Keys (200-299)
            Error::KeyNotFound(_) => 200,
            Error::KeyGenerationFailed(_) => 201,
            Error::KeyAlreadyExists(_) => 202,
            Error::InvalidAlias(_) => 203,

            // Crypto (300-399)
            Error::UnsupportedAlgorithm(_) => 300,
            Error::UnknownAlgorithm(_) => 301,
            Error::PayloadTooLarge { .. } => 302,
            Error::DecryptionFailed(_) => 303,
            Error::VerificationFailed(_) => 304,
            Error::EncryptionFailed(_) => 305,
            Error::SigningFailed(_) => 306,

            // Storage (400-499)
            Error::StorageReadError(_) => 400,
            Error::StorageWriteError(_) => 401,
            Error::StorageCorrupted(_) => 402,

            // Internal (900-999)
            Error::Internal(_) => 900,
            Error::SerializationError(_) => 901,
            Error::InvalidInput(_) => 902,
        }
    }

    /// Stable, caller-facing name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotInitialized => "NotInitializedError",
            Error::AlreadyInitialized => "AlreadyInitializedError",
            Error::StoreClosed => "StoreClosedError",
            Error::KeyNotFound(_) => "KeyNotFoundError",
            Error::KeyGenerationFailed(_) => "KeyGenerationError",
            Error::KeyAlreadyExists(_) => "KeyAlreadyExistsError",
            Error::InvalidAlias(_) => "InvalidAliasError",
            Error::UnsupportedAlgorithm(_) => "UnsupportedAlgorithmError",
            Error::UnknownAlgorithm(_) => "UnknownAlgorithmError",
            Error::PayloadTooLarge { .. } => "PayloadTooLargeError",
            Error::DecryptionFailed(_) => "DecryptionError",
            Error::VerificationFailed(_) => "VerificationError",
            Error::EncryptionFailed(_) => "EncryptionError",
            Error::SigningFailed(_) => "SigningError",
            Error::StorageReadError(_) => "StorageReadError",
            Error::StorageWriteError(_) => "StorageWriteError",
            Error::StorageCorrupted(_) => "StorageCorruptedError",
            Error::Internal(_) => "InternalError",
            Error::SerializationError(_) => "SerializationError",
            Error::InvalidInput(_) => "InvalidInputError",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Decryption and verification failures are expected outcomes of
    /// handling untrusted input, never fatal to the process.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::KeyNotFound(_)
                | Error::DecryptionFailed(_)
                | Error::VerificationFailed(_)
                | Error::PayloadTooLarge { .. }
                | Error::UnknownAlgorithm(_)
                | Error::UnsupportedAlgorithm(_)
                | Error::KeyAlreadyExists(_)
                | Error::InvalidAlias(_)
                | Error::InvalidInput(_)
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StorageReadError(err.to_string())
    }
}

// ============================================================================
// FFI ERROR REPRESENTATION
// ============================================================================

/// FFI-friendly error representation
#[derive(Debug, Clone, serde::Serialize)]
pub struct FfiError {
    /// Numeric error code
    pub code: i32,
    /// Error kind name (e.g. `DecryptionError`)
    pub kind: &'static str,
    /// Human-readable error message
    pub message: String,
    /// Whether the error is recoverable
    pub recoverable: bool,
}

impl From<Error> for FfiError {
    fn from(err: Error) -> Self {
        Self {
            code: err.code(),
            kind: err.kind(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
