//! # Storage Module
//!
//! Key persistence for Netwatch.
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        STORAGE ARCHITECTURE                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeyStore                                                       │   │
//! │  │  aliases, handles, overwrite policy, per-alias locking          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                              │                                          │
//! │                              ▼                                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  SecureStore                                                    │   │
//! │  │  optional AES-256-GCM sealing under a wrapping key              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                              │                                          │
//! │                              ▼                                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeystoreBackend                                                │   │
//! │  │  MemoryBackend │ FileBackend │ (platform keystore)              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! Key material only leaves memory as a persisted record through the
//! backend. Handles carry no secrets. Material is zeroized when the last
//! reference to a key is dropped.

mod key_store;
mod secure_store;

pub use key_store::{KeyStore, MAX_ALIAS_LEN};
pub use secure_store::{FileBackend, KeystoreBackend, MemoryBackend, SecureStore};
