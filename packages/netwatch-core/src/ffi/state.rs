//! # Shared FFI State
//!
//! Global state and runtime shared between `c_api.rs`, `dispatcher.rs` and
//! the JNI bindings.

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::error::{Error, Result};
use crate::service::CryptoService;

// ============================================================================
// RUNTIME
// ============================================================================

/// Global async runtime for FFI calls
static RUNTIME: OnceCell<Runtime> = OnceCell::new();

/// Global state
static STATE: OnceCell<Arc<RwLock<FfiState>>> = OnceCell::new();

/// C callback type for pushing events to Kotlin/C
pub type EventCallback =
    extern "C" fn(event_type: *const std::os::raw::c_char, data: *const std::os::raw::c_char);

/// FFI state holding the service
#[derive(Default)]
pub(crate) struct FfiState {
    pub service: Option<Arc<CryptoService>>,
    pub storage_path: Option<String>,
}

pub(crate) fn get_runtime() -> Result<&'static Runtime> {
    RUNTIME.get_or_try_init(|| {
        Runtime::new().map_err(|e| Error::Internal(format!("Failed to create Tokio runtime: {}", e)))
    })
}

fn state() -> &'static Arc<RwLock<FfiState>> {
    STATE.get_or_init(|| Arc::new(RwLock::new(FfiState::default())))
}

/// The running service, or `NotInitialized`
pub(crate) fn get_service() -> Result<Arc<CryptoService>> {
    state().read().service.clone().ok_or(Error::NotInitialized)
}

/// Install a service. Fails with `AlreadyInitialized` while one is running.
pub(crate) fn init_service(service: CryptoService, storage_path: Option<String>) -> Result<Arc<CryptoService>> {
    let mut state = state().write();
    if state.service.is_some() {
        return Err(Error::AlreadyInitialized);
    }
    let service = Arc::new(service);
    state.service = Some(service.clone());
    state.storage_path = storage_path;
    Ok(service)
}

/// Remove the running service so a later init can open a new one
pub(crate) fn take_service() -> Option<Arc<CryptoService>> {
    let mut state = state().write();
    state.storage_path = None;
    state.service.take()
}

#[cfg(test)]
pub(crate) fn ensure_test_service() -> Arc<CryptoService> {
    match get_service() {
        Ok(service) => service,
        Err(_) => match init_service(CryptoService::in_memory(), None) {
            Ok(service) => service,
            Err(_) => get_service().unwrap(),
        },
    }
}
