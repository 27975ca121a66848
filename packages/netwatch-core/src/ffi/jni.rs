//! # JNI Bindings
//!
//! Direct bindings for the Android app's `com.example.netwatch.RustNetwatch`
//! class:
//!
//! ```text
//! public static native void     init(String storagePath);
//! public static native String[] getCapabilities();
//! public static native void     generateNewKey(String keyId, String algo);
//! public static native byte[]   encrypt(String keyId, byte[] bytes, String algo);
//! public static native byte[]   decrypt(String keyId, byte[] bytes, String algo);
//! public static native byte[]   sign(String keyId, byte[] bytes, String algo);
//! public static native boolean  verify(String keyId, byte[] data, byte[] signature, String algo);
//! ```
//!
//! Errors surface as `java.lang.RuntimeException` whose message starts with
//! the error kind, e.g. `KeyNotFoundError: Key not found: 'k1'`. Calls made
//! before `init` run against an in-memory service.

use std::sync::Arc;

use jni::objects::{JByteArray, JClass, JObject, JObjectArray, JString};
use jni::sys::{jboolean, jbyteArray, jobjectArray, JNI_FALSE, JNI_TRUE};
use jni::JNIEnv;

use super::state::{get_service, init_service};
use crate::config::CoreConfig;
use crate::crypto::{self, KeyPurpose};
use crate::error::{Error, Result};
use crate::service::CryptoService;

// ============================================================================
// HELPERS
// ============================================================================

fn jni_err(e: jni::errors::Error) -> Error {
    Error::Internal(format!("JNI: {}", e))
}

fn throw(env: &mut JNIEnv, error: &Error) {
    tracing::warn!(code = error.code(), kind = error.kind(), "JNI call failed: {}", error);
    let message = format!("{}: {}", error.kind(), error);
    let _ = env.throw_new("java/lang/RuntimeException", message);
}

fn service() -> Result<Arc<CryptoService>> {
    match get_service() {
        Ok(service) => Ok(service),
        Err(_) => match init_service(CryptoService::in_memory(), None) {
            Ok(service) => Ok(service),
            // Another thread won the race
            Err(Error::AlreadyInitialized) => get_service(),
            Err(e) => Err(e),
        },
    }
}

fn read_string(env: &mut JNIEnv, value: &JString) -> Result<String> {
    if value.is_null() {
        return Err(Error::InvalidInput("null string argument".into()));
    }
    Ok(env.get_string(value).map_err(jni_err)?.into())
}

fn read_bytes(env: &mut JNIEnv, value: &JByteArray) -> Result<Vec<u8>> {
    if value.is_null() {
        return Err(Error::InvalidInput("null byte[] argument".into()));
    }
    env.convert_byte_array(value).map_err(jni_err)
}

fn to_byte_array(env: &mut JNIEnv, bytes: Result<Vec<u8>>) -> jbyteArray {
    let result = bytes.and_then(|bytes| env.byte_array_from_slice(&bytes).map_err(jni_err));
    match result {
        Ok(array) => array.into_raw(),
        Err(e) => {
            throw(env, &e);
            JObject::null().into_raw()
        }
    }
}

// ============================================================================
// EXPORTS
// ============================================================================

/// `RustNetwatch.init(String storagePath)`
#[no_mangle]
pub extern "system" fn Java_com_example_netwatch_RustNetwatch_init<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    storage_path: JString<'local>,
) {
    let result = (|| -> Result<()> {
        let config = CoreConfig {
            storage_path: Some(read_string(&mut env, &storage_path)?),
            ..CoreConfig::default()
        };
        let path = config.storage_path.clone();
        init_service(CryptoService::open(config)?, path)?;
        Ok(())
    })();
    if let Err(e) = result {
        throw(&mut env, &e);
    }
}

/// `RustNetwatch.getCapabilities()`
#[no_mangle]
pub extern "system" fn Java_com_example_netwatch_RustNetwatch_getCapabilities<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
) -> jobjectArray {
    let result = (|| -> Result<JObjectArray<'local>> {
        let names = crate::capabilities::capability_names();
        let array = env
            .new_object_array(names.len() as i32, "java/lang/String", JObject::null())
            .map_err(jni_err)?;
        for (i, name) in names.iter().enumerate() {
            let value = env.new_string(name).map_err(jni_err)?;
            env.set_object_array_element(&array, i as i32, value)
                .map_err(jni_err)?;
        }
        Ok(array)
    })();

    match result {
        Ok(array) => array.into_raw(),
        Err(e) => {
            throw(&mut env, &e);
            JObject::null().into_raw()
        }
    }
}

/// `RustNetwatch.generateNewKey(String keyId, String algo)`
#[no_mangle]
pub extern "system" fn Java_com_example_netwatch_RustNetwatch_generateNewKey<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    key_id: JString<'local>,
    algorithm: JString<'local>,
) {
    let result = (|| -> Result<()> {
        let alias = read_string(&mut env, &key_id)?;
        let algorithm = read_string(&mut env, &algorithm)?;
        service()?.generate_key(&alias, &algorithm)?;
        Ok(())
    })();
    if let Err(e) = result {
        throw(&mut env, &e);
    }
}

/// `RustNetwatch.encrypt(String keyId, byte[] bytes, String algo)`
#[no_mangle]
pub extern "system" fn Java_com_example_netwatch_RustNetwatch_encrypt<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    key_id: JString<'local>,
    bytes: JByteArray<'local>,
    algorithm: JString<'local>,
) -> jbyteArray {
    let result = (|| -> Result<Vec<u8>> {
        let alias = read_string(&mut env, &key_id)?;
        let data = read_bytes(&mut env, &bytes)?;
        let algorithm = read_string(&mut env, &algorithm)?;
        let service = service()?;
        service.key_for_operation(&alias, &algorithm, KeyPurpose::Encrypt)?;
        service.encrypt_file_with_key(&data, &alias)
    })();
    to_byte_array(&mut env, result)
}

/// `RustNetwatch.decrypt(String keyId, byte[] bytes, String algo)`
#[no_mangle]
pub extern "system" fn Java_com_example_netwatch_RustNetwatch_decrypt<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    key_id: JString<'local>,
    bytes: JByteArray<'local>,
    algorithm: JString<'local>,
) -> jbyteArray {
    let result = (|| -> Result<Vec<u8>> {
        let alias = read_string(&mut env, &key_id)?;
        let data = read_bytes(&mut env, &bytes)?;
        let algorithm = read_string(&mut env, &algorithm)?;
        let service = service()?;
        service.key_for_operation(&alias, &algorithm, KeyPurpose::Decrypt)?;
        service.decrypt_file_with_key(&data, &alias)
    })();
    to_byte_array(&mut env, result)
}

/// `RustNetwatch.sign(String keyId, byte[] bytes, String algo)`
#[no_mangle]
pub extern "system" fn Java_com_example_netwatch_RustNetwatch_sign<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    key_id: JString<'local>,
    bytes: JByteArray<'local>,
    algorithm: JString<'local>,
) -> jbyteArray {
    let result = (|| -> Result<Vec<u8>> {
        let alias = read_string(&mut env, &key_id)?;
        let data = read_bytes(&mut env, &bytes)?;
        let algorithm = read_string(&mut env, &algorithm)?;
        let key = service()?.key_for_operation(&alias, &algorithm, KeyPurpose::Sign)?;
        crypto::sign(&key, &data)
    })();
    to_byte_array(&mut env, result)
}

/// `RustNetwatch.verify(String keyId, byte[] data, byte[] signature, String algo)`
#[no_mangle]
pub extern "system" fn Java_com_example_netwatch_RustNetwatch_verify<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    key_id: JString<'local>,
    data: JByteArray<'local>,
    signature: JByteArray<'local>,
    algorithm: JString<'local>,
) -> jboolean {
    let result = (|| -> Result<bool> {
        let alias = read_string(&mut env, &key_id)?;
        let data = read_bytes(&mut env, &data)?;
        let signature = read_bytes(&mut env, &signature)?;
        let algorithm = read_string(&mut env, &algorithm)?;
        let key = service()?.key_for_operation(&alias, &algorithm, KeyPurpose::Verify)?;
        crypto::verify(&key, &data, &signature)
    })();

    match result {
        Ok(true) => JNI_TRUE,
        Ok(false) => JNI_FALSE,
        Err(e) => {
            throw(&mut env, &e);
            JNI_FALSE
        }
    }
}
