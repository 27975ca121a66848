//! # FFI Bindings
//!
//! Foreign Function Interface bindings for the Android app and native hosts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         FFI ARCHITECTURE                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Kotlin/Java/C                                                          │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Platform Bindings                            │   │
//! │  │                                                                 │   │
//! │  │  Android:  JNI (RustNetwatch) → Kotlin UI                      │   │
//! │  │  Native:   C ABI (netwatch_*) and netwatch_call JSON dispatch  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   CryptoService (global)                        │   │
//! │  │                                                                 │   │
//! │  │  Keys │ Text │ Files │ Capabilities                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! All FFI functions return results through:
//! - C FFI: `FfiResult` / `FfiBytesResult` with error code, kind and message
//! - JNI: `java/lang/RuntimeException` thrown on error
//! - Async key generation: a `key_generated` event on the registered callback

mod types;

mod state;

mod events;

mod dispatcher;

mod c_api;

#[cfg(target_os = "android")]
mod jni;

pub use c_api::*;
pub use dispatcher::{dispatch, CallError, DResult};
pub use events::netwatch_register_event_callback;
pub use state::EventCallback;
pub use types::*;
