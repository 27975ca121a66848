//! # FFI Dispatcher
//!
//! Generic JSON-RPC style dispatcher that routes method names to
//! [`CryptoService`](crate::service::CryptoService) calls.
//! Called from `netwatch_call(method, args)` in c_api.rs.
//!
//! Methods that act on a key accept either `"alias"` (a specific key) or
//! `"algorithm"` (the active key of that algorithm). Neither means the
//! configured default algorithm.
//!
//! Returns `Ok(json_string)` on success, `Err(CallError)` on failure.

use serde_json::{json, Value};

use super::state::get_service;
use crate::crypto::KeyHandle;
use crate::error::Error;
use crate::service::{decode_base64, encode_base64, CryptoService};

/// Failure of a dispatched call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallError {
    /// Numeric error code (core codes, or 1/2/404 for request errors)
    pub code: i32,
    /// Error kind name
    pub kind: &'static str,
    /// Human-readable message
    pub message: String,
}

impl From<Error> for CallError {
    fn from(e: Error) -> Self {
        Self {
            code: e.code(),
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Dispatch result: JSON on success
pub type DResult = Result<String, CallError>;

// ============================================================================
// HELPERS
// ============================================================================

fn err(code: i32, msg: impl ToString) -> CallError {
    CallError {
        code,
        kind: "InvalidRequest",
        message: msg.to_string(),
    }
}

fn json_parse(args: &str) -> Result<Value, CallError> {
    if args.trim().is_empty() {
        return Ok(json!({}));
    }
    serde_json::from_str(args).map_err(|e| err(1, format!("Invalid JSON: {}", e)))
}

fn require_str<'a>(data: &'a Value, field: &str) -> Result<&'a str, CallError> {
    data[field].as_str().ok_or_else(|| err(2, format!("Missing {}", field)))
}

fn ok_json(v: Value) -> DResult {
    Ok(v.to_string())
}

fn service() -> Result<std::sync::Arc<CryptoService>, CallError> {
    get_service().map_err(CallError::from)
}

/// Key selection carried in the request
enum Target<'a> {
    Alias(&'a str),
    Algorithm(Option<&'a str>),
}

fn target(data: &Value) -> Target<'_> {
    match data["alias"].as_str() {
        Some(alias) => Target::Alias(alias),
        None => Target::Algorithm(data["algorithm"].as_str()),
    }
}

/// JSON view of a key handle
pub(crate) fn handle_json(handle: &KeyHandle) -> Value {
    let purposes: Vec<&str> = handle.purposes.iter().map(|p| p.name()).collect();
    json!({
        "alias": handle.alias,
        "algorithm": handle.algorithm.name(),
        "purposes": purposes,
        "key_id": handle.key_id.to_string(),
        "created_at": handle.created_at,
        "created_at_iso": crate::time::format_millis(handle.created_at),
    })
}

// ============================================================================
// DISPATCH
// ============================================================================

/// Route a method call to the service
///
/// ## Parameters
///
/// - `method`: method name, e.g. `keys_generate`
/// - `args`: JSON object with the method's arguments (may be empty)
pub fn dispatch(method: &str, args: &str) -> DResult {
    tracing::trace!(method, "Dispatching FFI call");
    match method {
        // ── Meta ──────────────────────────────────────────────────
        "version" => ok_json(json!({ "version": crate::version(), "build": crate::build_info() })),
        "capabilities" => ok_json(json!(crate::capabilities::capability_names())),
        "capabilities_detail" => ok_json(json!(crate::list_capabilities())),

        // ── Keys ──────────────────────────────────────────────────
        "keys_generate" => keys_generate(args),
        "keys_get" => keys_get(args),
        "keys_list" => keys_list(),
        "keys_delete" => keys_delete(args),

        // ── Text ──────────────────────────────────────────────────
        "text_encrypt" => text_encrypt(args),
        "text_decrypt" => text_decrypt(args),
        "text_sign" => text_sign(args),
        "text_verify" => text_verify(args),

        // ── Files ─────────────────────────────────────────────────
        "file_encrypt" => file_encrypt(args),
        "file_decrypt" => file_decrypt(args),

        _ => Err(err(404, format!("Unknown method: {}", method))),
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

fn keys_generate(args: &str) -> DResult {
    let data = json_parse(args)?;
    let alias = require_str(&data, "alias")?;
    let algorithm = require_str(&data, "algorithm")?;
    let handle = service()?.generate_key(alias, algorithm)?;
    ok_json(handle_json(&handle))
}

fn keys_get(args: &str) -> DResult {
    let data = json_parse(args)?;
    let alias = require_str(&data, "alias")?;
    let handle = service()?.get_key(alias)?;
    ok_json(handle_json(&handle))
}

fn keys_list() -> DResult {
    let handles = service()?.list_keys()?;
    ok_json(Value::Array(handles.iter().map(handle_json).collect()))
}

fn keys_delete(args: &str) -> DResult {
    let data = json_parse(args)?;
    let alias = require_str(&data, "alias")?;
    let deleted = service()?.delete_key(alias)?;
    if deleted {
        super::events::emit_event("key_deleted", &json!({ "alias": alias }).to_string());
    }
    ok_json(json!({ "deleted": deleted }))
}

fn text_encrypt(args: &str) -> DResult {
    let data = json_parse(args)?;
    let text = require_str(&data, "text")?;
    let service = service()?;
    let ciphertext = match target(&data) {
        Target::Alias(alias) => service.encrypt_text_with_key(text, alias)?,
        Target::Algorithm(algorithm) => service.encrypt_text(text, algorithm)?,
    };
    ok_json(json!({ "ciphertext": ciphertext }))
}

fn text_decrypt(args: &str) -> DResult {
    let data = json_parse(args)?;
    let ciphertext = require_str(&data, "ciphertext")?;
    let service = service()?;
    let text = match target(&data) {
        Target::Alias(alias) => service.decrypt_text_with_key(ciphertext, alias)?,
        Target::Algorithm(algorithm) => service.decrypt_text(ciphertext, algorithm)?,
    };
    ok_json(json!({ "text": text }))
}

fn text_sign(args: &str) -> DResult {
    let data = json_parse(args)?;
    let text = require_str(&data, "text")?;
    let service = service()?;
    let signature = match target(&data) {
        Target::Alias(alias) => service.sign_text_with_key(text, alias)?,
        Target::Algorithm(algorithm) => service.sign_text(text, algorithm)?,
    };
    ok_json(json!({ "signature": signature }))
}

fn text_verify(args: &str) -> DResult {
    let data = json_parse(args)?;
    let text = require_str(&data, "text")?;
    let signature = require_str(&data, "signature")?;
    let service = service()?;
    let valid = match target(&data) {
        Target::Alias(alias) => service.verify_text_with_key(text, signature, alias)?,
        Target::Algorithm(algorithm) => service.verify_text(text, signature, algorithm)?,
    };
    ok_json(json!({ "valid": valid }))
}

fn file_encrypt(args: &str) -> DResult {
    let data = json_parse(args)?;
    let plaintext = decode_base64(require_str(&data, "data_b64")?)
        .map_err(|e| CallError::from(Error::InvalidInput(format!("Invalid base64: {}", e))))?;
    let service = service()?;
    let encrypted = match target(&data) {
        Target::Alias(alias) => service.encrypt_file_with_key(&plaintext, alias)?,
        Target::Algorithm(algorithm) => service.encrypt_file(&plaintext, algorithm)?,
    };
    ok_json(json!({ "data_b64": encode_base64(encrypted) }))
}

fn file_decrypt(args: &str) -> DResult {
    let data = json_parse(args)?;
    let encrypted = decode_base64(require_str(&data, "data_b64")?)
        .map_err(|e| CallError::from(Error::DecryptionFailed(format!("Invalid base64: {}", e))))?;
    let service = service()?;
    let plaintext = match target(&data) {
        Target::Alias(alias) => service.decrypt_file_with_key(&encrypted, alias)?,
        Target::Algorithm(algorithm) => service.decrypt_file(&encrypted, algorithm)?,
    };
    ok_json(json!({ "data_b64": encode_base64(plaintext) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::state::ensure_test_service;

    fn call(method: &str, args: Value) -> Value {
        let out = dispatch(method, &args.to_string()).unwrap();
        serde_json::from_str(&out).unwrap()
    }

    #[test]
    fn test_unknown_method() {
        let e = dispatch("keys_rotate", "{}").unwrap_err();
        assert_eq!(e.code, 404);
    }

    #[test]
    fn test_invalid_json_and_missing_field() {
        ensure_test_service();
        assert_eq!(dispatch("keys_get", "{not json").unwrap_err().code, 1);
        assert_eq!(dispatch("keys_get", "{}").unwrap_err().code, 2);
    }

    #[test]
    fn test_capabilities() {
        let caps = call("capabilities", json!({}));
        assert_eq!(caps, json!(["AES", "RSA", "EC"]));
        let detail = call("capabilities_detail", json!({}));
        assert_eq!(detail[0]["parameters"], "AES-256-GCM");
    }

    #[test]
    fn test_generate_and_get() {
        ensure_test_service();
        let handle = call("keys_generate", json!({ "alias": "dispatch-ec", "algorithm": "EC" }));
        assert_eq!(handle["alias"], "dispatch-ec");
        assert_eq!(handle["algorithm"], "EC");
        assert_eq!(handle["purposes"], json!(["encrypt", "decrypt", "sign", "verify"]));

        let fetched = call("keys_get", json!({ "alias": "dispatch-ec" }));
        assert_eq!(fetched["key_id"], handle["key_id"]);

        let listed = call("keys_list", json!({}));
        assert!(listed
            .as_array()
            .unwrap()
            .iter()
            .any(|h| h["alias"] == "dispatch-ec"));
    }

    #[test]
    fn test_core_errors_keep_kind() {
        ensure_test_service();
        let e = dispatch("keys_get", &json!({ "alias": "dispatch-missing" }).to_string()).unwrap_err();
        assert_eq!(e.kind, "KeyNotFoundError");
        assert_eq!(e.code, 200);

        let e = dispatch("keys_generate", &json!({ "alias": "x", "algorithm": "DES" }).to_string())
            .unwrap_err();
        assert_eq!(e.kind, "UnknownAlgorithmError");
    }

    #[test]
    fn test_text_round_trip_by_alias() {
        ensure_test_service();
        call("keys_generate", json!({ "alias": "dispatch-aes", "algorithm": "AES" }));
        let enc = call("text_encrypt", json!({ "alias": "dispatch-aes", "text": "Hello World" }));
        let ciphertext = enc["ciphertext"].as_str().unwrap();
        let dec = call("text_decrypt", json!({ "alias": "dispatch-aes", "ciphertext": ciphertext }));
        assert_eq!(dec["text"], "Hello World");
    }

    #[test]
    fn test_sign_verify_by_alias() {
        ensure_test_service();
        call("keys_generate", json!({ "alias": "dispatch-signer", "algorithm": "EC" }));
        let signed = call("text_sign", json!({ "alias": "dispatch-signer", "text": "Hello World" }));
        let signature = signed["signature"].as_str().unwrap();

        let ok = call(
            "text_verify",
            json!({ "alias": "dispatch-signer", "text": "Hello World", "signature": signature }),
        );
        assert_eq!(ok["valid"], true);

        let tampered = call(
            "text_verify",
            json!({ "alias": "dispatch-signer", "text": "Hello World!", "signature": signature }),
        );
        assert_eq!(tampered["valid"], false);
    }

    #[test]
    fn test_file_round_trip() {
        ensure_test_service();
        call("keys_generate", json!({ "alias": "dispatch-file", "algorithm": "AES" }));
        let payload = encode_base64(b"\x00\x01binary\xff");
        let enc = call("file_encrypt", json!({ "alias": "dispatch-file", "data_b64": payload }));
        let dec = call(
            "file_decrypt",
            json!({ "alias": "dispatch-file", "data_b64": enc["data_b64"] }),
        );
        assert_eq!(dec["data_b64"], payload);
    }

    #[test]
    fn test_file_round_trip_random_payloads() {
        use rand::{Rng, RngCore};

        ensure_test_service();
        call("keys_generate", json!({ "alias": "dispatch-file-random", "algorithm": "EC" }));

        let mut rng = rand::thread_rng();
        for _ in 0..64 {
            let mut plain = vec![0u8; rng.gen_range(0..600)];
            rng.fill_bytes(&mut plain);
            let payload = encode_base64(&plain);

            let enc = call("file_encrypt", json!({ "alias": "dispatch-file-random", "data_b64": payload }));
            let ciphertext = enc["data_b64"].as_str().unwrap();
            assert!(!ciphertext.contains('+') && !ciphertext.contains('/'));

            let dec = call("file_decrypt", json!({ "alias": "dispatch-file-random", "data_b64": ciphertext }));
            assert_eq!(decode_base64(dec["data_b64"].as_str().unwrap()).unwrap(), plain);
        }
    }

    #[test]
    fn test_file_output_matches_text_encoding() {
        ensure_test_service();
        call("keys_generate", json!({ "alias": "dispatch-file-bytes", "algorithm": "AES" }));

        // 0xfb 0xff encodes to "-_8=" in the URL-safe alphabet
        let payload = encode_base64([0xfbu8, 0xff]);
        assert_eq!(payload, "-_8=");
        let enc = call("file_encrypt", json!({ "alias": "dispatch-file-bytes", "data_b64": payload }));
        let dec = call("file_decrypt", json!({ "alias": "dispatch-file-bytes", "data_b64": enc["data_b64"] }));
        assert_eq!(dec["data_b64"], "-_8=");
    }

    #[test]
    fn test_delete() {
        ensure_test_service();
        call("keys_generate", json!({ "alias": "dispatch-gone", "algorithm": "AES" }));
        assert_eq!(call("keys_delete", json!({ "alias": "dispatch-gone" }))["deleted"], true);
        assert_eq!(call("keys_delete", json!({ "alias": "dispatch-gone" }))["deleted"], false);
    }
}
