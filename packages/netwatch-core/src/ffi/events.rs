//! # FFI Event System
//!
//! Pushes events from Rust to Kotlin/C via a registered C callback.
//! Events: `key_generated` (async generation finished), `key_deleted`.

use std::ffi::CString;
use std::os::raw::c_char;
use std::sync::OnceLock;

use super::state::EventCallback;

// ============================================================================
// GLOBAL CALLBACK
// ============================================================================

static EVENT_CB: OnceLock<EventCallback> = OnceLock::new();

/// Register the event callback from the native side.
/// Should be called once during app initialization.
///
/// # Safety
/// `cb` must stay callable for the lifetime of the process. The strings it
/// receives are only valid for the duration of the call.
#[no_mangle]
pub unsafe extern "C" fn netwatch_register_event_callback(
    cb: extern "C" fn(event_type: *const c_char, data: *const c_char),
) {
    let _ = EVENT_CB.set(cb);
}

// ============================================================================
// EVENT EMISSION
// ============================================================================

/// Emit an event to the native layer.
/// `event_type`: e.g. "key_generated", "key_deleted"
/// `data`: JSON string with event payload
pub(crate) fn emit_event(event_type: &str, data: &str) {
    match EVENT_CB.get() {
        Some(cb) => {
            if let (Ok(etype), Ok(edata)) = (CString::new(event_type), CString::new(data)) {
                cb(etype.as_ptr(), edata.as_ptr());
            }
        }
        None => tracing::debug!(event_type, "No event callback registered, event dropped"),
    }
}
