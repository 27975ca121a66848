//! # Netwatch Core
//!
//! Key management, text/file encryption and signing for the Netwatch
//! mobile app. The Android UI (and any other host) calls into this library
//! through JNI, the C ABI, or directly from Rust.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        NETWATCH CORE MODULES                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Host (Kotlin UI, C caller, netwatch CLI)                              │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  ffi (JNI / C ABI / JSON dispatcher)        [feature = "ffi"]   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  CryptoService (facade)                                         │   │
//! │  │  algorithm names, base64 payloads, active key per algorithm     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │         │                │                  │                 │         │
//! │         ▼                ▼                  ▼                 ▼         │
//! │  ┌────────────┐  ┌──────────────┐  ┌──────────────┐  ┌─────────────┐   │
//! │  │  KeyStore  │  │ Cipher Engine│  │    Signer    │  │ Capability  │   │
//! │  │            │  │              │  │              │  │  Registry   │   │
//! │  │ - aliases  │  │ - AES-GCM    │  │ - RSA PKCS#1 │  │             │   │
//! │  │ - persist  │  │ - RSA-OAEP   │  │ - ECDSA P256 │  │ - AES, RSA, │   │
//! │  │ - handles  │  │ - ECIES      │  │              │  │   EC        │   │
//! │  │            │  │ - chunking   │  │              │  │             │   │
//! │  └────────────┘  └──────────────┘  └──────────────┘  └─────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`config`] - Service configuration (JSON loadable)
//! - [`crypto`] - Algorithms, key material, cipher engine, signer
//! - [`storage`] - Key store, secure store, keystore backends
//! - [`capabilities`] - Supported algorithm registry
//! - [`service`] - The facade hosts call
//!
//! ## Quick Start
//!
//! ```
//! use netwatch_core::CryptoService;
//!
//! let service = CryptoService::in_memory();
//! service.generate_key("k2", "AES").unwrap();
//!
//! let encrypted = service.encrypt_text("Hello World", Some("AES")).unwrap();
//! assert_eq!(service.decrypt_text(&encrypted, Some("AES")).unwrap(), "Hello World");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod capabilities;
pub mod config;
pub mod crypto;
pub mod error;
pub mod service;
pub mod storage;
/// Wall-clock helpers for key timestamps.
pub mod time;

#[cfg(feature = "ffi")]
pub mod ffi;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use capabilities::{list_capabilities, Capability};
pub use config::{CoreConfig, KeyOverwritePolicy};
pub use crypto::{Algorithm, KeyHandle, KeyPurpose, Purposes};
pub use error::{Error, Result};
pub use service::CryptoService;
pub use storage::KeyStore;

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Netwatch Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Returns build information for debugging
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        #[cfg(target_os = "ios")]
        target: "ios",
        #[cfg(target_os = "android")]
        target: "android",
        #[cfg(target_os = "macos")]
        target: "macos",
        #[cfg(target_os = "linux")]
        target: "linux",
        #[cfg(target_os = "windows")]
        target: "windows",
        #[cfg(not(any(
            target_os = "ios",
            target_os = "android",
            target_os = "macos",
            target_os = "linux",
            target_os = "windows"
        )))]
        target: "unknown",
        profile: if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        },
    }
}

/// Build information for debugging
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildInfo {
    /// Crate version
    pub version: &'static str,
    /// Target operating system
    pub target: &'static str,
    /// Build profile (debug/release)
    pub profile: &'static str,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[test]
    fn test_build_info() {
        let info = build_info();
        assert_eq!(info.version, version());
        assert!(info.profile == "debug" || info.profile == "release");
    }
}
