//! # C API
//!
//! C-compatible FFI functions for native hosts.
//!
//! All functions follow the naming convention: `netwatch_<action>`.
//! Key-using functions take a nullable `alias` and a nullable `algorithm`:
//! a non-null alias selects that key, otherwise the active key of
//! `algorithm` (or the configured default) is used.

use std::os::raw::c_char;

use super::dispatcher::{dispatch, handle_json};
use super::events::emit_event;
use super::state::{get_runtime, get_service, init_service, take_service};
use super::types::*;
use crate::config::CoreConfig;
use crate::error::{Error, FfiError, Result};
use crate::service::CryptoService;

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Initialize Netwatch Core
///
/// Must be called before any other key or crypto function.
///
/// # Arguments
/// * `storage_path` - Directory for persisted keys (null keeps keys in memory
///   unless the config names a path)
/// * `config_json` - `CoreConfig` as JSON (null for defaults)
///
/// # Returns
/// FfiResult with the storage path (or empty) on success. Error 101 if
/// already initialized.
///
/// # Safety
/// Both pointers must be null or valid null-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn netwatch_init(
    storage_path: *const c_char,
    config_json: *const c_char,
) -> FfiResult {
    let result = (|| -> Result<Option<String>> {
        if get_service().is_ok() {
            return Err(Error::AlreadyInitialized);
        }
        let mut config = match cstr_to_string(config_json) {
            Some(json) => CoreConfig::from_json(&json)?,
            None => CoreConfig::default(),
        };
        if let Some(path) = cstr_to_string(storage_path) {
            config.storage_path = Some(path);
        }
        let storage_path = config.storage_path.clone();
        init_service(CryptoService::open(config)?, storage_path.clone())?;
        tracing::info!(storage_path = ?storage_path, "Netwatch core initialized");
        Ok(storage_path)
    })();

    match result {
        Ok(Some(path)) => FfiResult::ok(path),
        Ok(None) => FfiResult::ok_empty(),
        Err(e) => FfiResult::from_error(&e),
    }
}

/// Shut down Netwatch Core
///
/// Closes the key store. A later [`netwatch_init`] opens a fresh service.
#[no_mangle]
pub extern "C" fn netwatch_shutdown() -> FfiResult {
    match take_service() {
        Some(service) => {
            service.close();
            tracing::info!("Netwatch core shut down");
            FfiResult::ok_empty()
        }
        None => FfiResult::from_error(&Error::NotInitialized),
    }
}

/// Get Netwatch Core version
///
/// The returned string must be freed with [`netwatch_free_string`].
#[no_mangle]
pub extern "C" fn netwatch_version() -> *mut c_char {
    into_c_string(crate::version().to_string())
}

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Supported algorithm names as a JSON array, e.g. `["AES","RSA","EC"]`
///
/// Does not require initialization.
#[no_mangle]
pub extern "C" fn netwatch_get_capabilities() -> FfiResult {
    FfiResult::from_result(
        serde_json::to_string(&crate::capabilities::capability_names()).map_err(Error::from),
    )
}

// ============================================================================
// KEYS
// ============================================================================

/// Generate a key under `alias`
///
/// # Returns
/// FfiResult with the key handle as JSON.
///
/// # Safety
/// Both pointers must be valid null-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn netwatch_generate_key(
    alias: *const c_char,
    algorithm: *const c_char,
) -> FfiResult {
    let result = (|| -> Result<String> {
        let alias = required(alias, "alias")?;
        let algorithm = required(algorithm, "algorithm")?;
        let handle = get_service()?.generate_key(&alias, &algorithm)?;
        Ok(handle_json(&handle).to_string())
    })();
    FfiResult::from_result(result)
}

/// Generate a key in the background
///
/// Returns as soon as the work is scheduled. Completion is reported as a
/// `key_generated` event:
///
/// - success: `{"alias", "success": true, "algorithm", "key_id", "key"}`
///   where `key` is the full handle
/// - failure: `{"alias", "success": false, "error": {"code", "kind",
///   "message", "recoverable"}}`
///
/// # Safety
/// Both pointers must be valid null-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn netwatch_generate_key_async(
    alias: *const c_char,
    algorithm: *const c_char,
) -> FfiResult {
    let result = (|| -> Result<()> {
        let alias = required(alias, "alias")?;
        let algorithm = required(algorithm, "algorithm")?;
        let service = get_service()?;
        get_runtime()?.spawn(async move {
            let payload = match service.generate_key_async(alias.clone(), algorithm).await {
                Ok(handle) => serde_json::json!({
                    "alias": alias,
                    "success": true,
                    "algorithm": handle.algorithm.name(),
                    "key_id": handle.key_id.to_string(),
                    "key": handle_json(&handle),
                }),
                Err(e) => {
                    tracing::warn!(alias = %alias, error = %e, "Background key generation failed");
                    serde_json::json!({
                        "alias": alias,
                        "success": false,
                        "error": FfiError::from(e),
                    })
                }
            };
            emit_event("key_generated", &payload.to_string());
        });
        Ok(())
    })();

    match result {
        Ok(()) => FfiResult::ok_empty(),
        Err(e) => FfiResult::from_error(&e),
    }
}

/// List all keys as a JSON array of handles
#[no_mangle]
pub extern "C" fn netwatch_list_keys() -> FfiResult {
    let result = (|| -> Result<String> {
        let handles = get_service()?.list_keys()?;
        let list: Vec<serde_json::Value> = handles.iter().map(handle_json).collect();
        Ok(serde_json::Value::Array(list).to_string())
    })();
    FfiResult::from_result(result)
}

/// Delete a key. Data is `"true"` if a key was removed, `"false"` otherwise.
///
/// # Safety
/// `alias` must be a valid null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn netwatch_delete_key(alias: *const c_char) -> FfiResult {
    let result = (|| -> Result<bool> {
        let alias = required(alias, "alias")?;
        let deleted = get_service()?.delete_key(&alias)?;
        if deleted {
            emit_event("key_deleted", &serde_json::json!({ "alias": alias }).to_string());
        }
        Ok(deleted)
    })();
    FfiResult::from_result(result)
}

// ============================================================================
// TEXT
// ============================================================================

/// Encrypt UTF-8 text. Data is the base64 ciphertext.
///
/// # Safety
/// `text` must be a valid null-terminated string; `alias` and `algorithm`
/// may be null.
#[no_mangle]
pub unsafe extern "C" fn netwatch_encrypt_text(
    text: *const c_char,
    alias: *const c_char,
    algorithm: *const c_char,
) -> FfiResult {
    let result = (|| -> Result<String> {
        let text = required(text, "text")?;
        let service = get_service()?;
        match cstr_to_string(alias) {
            Some(alias) => service.encrypt_text_with_key(&text, &alias),
            None => service.encrypt_text(&text, cstr_to_string(algorithm).as_deref()),
        }
    })();
    FfiResult::from_result(result)
}

/// Decrypt base64 ciphertext back to text
///
/// # Safety
/// `ciphertext` must be a valid null-terminated string; `alias` and
/// `algorithm` may be null.
#[no_mangle]
pub unsafe extern "C" fn netwatch_decrypt_text(
    ciphertext: *const c_char,
    alias: *const c_char,
    algorithm: *const c_char,
) -> FfiResult {
    let result = (|| -> Result<String> {
        let ciphertext = required(ciphertext, "ciphertext")?;
        let service = get_service()?;
        match cstr_to_string(alias) {
            Some(alias) => service.decrypt_text_with_key(&ciphertext, &alias),
            None => service.decrypt_text(&ciphertext, cstr_to_string(algorithm).as_deref()),
        }
    })();
    FfiResult::from_result(result)
}

/// Sign UTF-8 text. Data is the base64 signature.
///
/// # Safety
/// `text` must be a valid null-terminated string; `alias` and `algorithm`
/// may be null.
#[no_mangle]
pub unsafe extern "C" fn netwatch_sign_text(
    text: *const c_char,
    alias: *const c_char,
    algorithm: *const c_char,
) -> FfiResult {
    let result = (|| -> Result<String> {
        let text = required(text, "text")?;
        let service = get_service()?;
        match cstr_to_string(alias) {
            Some(alias) => service.sign_text_with_key(&text, &alias),
            None => service.sign_text(&text, cstr_to_string(algorithm).as_deref()),
        }
    })();
    FfiResult::from_result(result)
}

/// Verify a base64 signature over text. Data is `"true"` or `"false"`.
///
/// # Safety
/// `text` and `signature` must be valid null-terminated strings; `alias`
/// and `algorithm` may be null.
#[no_mangle]
pub unsafe extern "C" fn netwatch_verify_text(
    text: *const c_char,
    signature: *const c_char,
    alias: *const c_char,
    algorithm: *const c_char,
) -> FfiResult {
    let result = (|| -> Result<bool> {
        let text = required(text, "text")?;
        let signature = required(signature, "signature")?;
        let service = get_service()?;
        match cstr_to_string(alias) {
            Some(alias) => service.verify_text_with_key(&text, &signature, &alias),
            None => service.verify_text(&text, &signature, cstr_to_string(algorithm).as_deref()),
        }
    })();
    FfiResult::from_result(result)
}

// ============================================================================
// FILES
// ============================================================================

/// Encrypt a binary payload
///
/// # Safety
/// `data` must point to `len` readable bytes (or be null with `len == 0`);
/// `alias` and `algorithm` may be null.
#[no_mangle]
pub unsafe extern "C" fn netwatch_encrypt_file(
    data: *const u8,
    len: usize,
    alias: *const c_char,
    algorithm: *const c_char,
) -> FfiBytesResult {
    let result = (|| -> Result<Vec<u8>> {
        let data = bytes_from_raw(data, len)
            .ok_or_else(|| Error::InvalidInput("null data pointer".into()))?;
        let service = get_service()?;
        match cstr_to_string(alias) {
            Some(alias) => service.encrypt_file_with_key(data, &alias),
            None => service.encrypt_file(data, cstr_to_string(algorithm).as_deref()),
        }
    })();
    FfiBytesResult::from_result(result)
}

/// Decrypt a payload produced by [`netwatch_encrypt_file`]
///
/// # Safety
/// `data` must point to `len` readable bytes (or be null with `len == 0`);
/// `alias` and `algorithm` may be null.
#[no_mangle]
pub unsafe extern "C" fn netwatch_decrypt_file(
    data: *const u8,
    len: usize,
    alias: *const c_char,
    algorithm: *const c_char,
) -> FfiBytesResult {
    let result = (|| -> Result<Vec<u8>> {
        let data = bytes_from_raw(data, len)
            .ok_or_else(|| Error::DecryptionFailed("null data pointer".into()))?;
        let service = get_service()?;
        match cstr_to_string(alias) {
            Some(alias) => service.decrypt_file_with_key(data, &alias),
            None => service.decrypt_file(data, cstr_to_string(algorithm).as_deref()),
        }
    })();
    FfiBytesResult::from_result(result)
}

// ============================================================================
// GENERIC DISPATCH
// ============================================================================

/// Call any dispatcher method with JSON arguments
///
/// # Safety
/// `method` must be a valid null-terminated string; `args` may be null.
#[no_mangle]
pub unsafe extern "C" fn netwatch_call(method: *const c_char, args: *const c_char) -> FfiResult {
    let method = match cstr_to_string(method) {
        Some(m) => m,
        None => return FfiResult::err(2, "InvalidRequest", "Missing method".to_string()),
    };
    let args = cstr_to_string(args).unwrap_or_default();

    match dispatch(&method, &args) {
        Ok(json) => FfiResult::ok(json),
        Err(e) => FfiResult::err(e.code, e.kind, e.message),
    }
}

unsafe fn required(ptr: *const c_char, field: &str) -> Result<String> {
    cstr_to_string(ptr).ok_or_else(|| Error::InvalidInput(format!("Missing {}", field)))
}
