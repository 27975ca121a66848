//! # Key Store
//!
//! Generates, persists and hands out keys by alias.
//!
//! ## Concurrency
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        KEY STORE LOCKING                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  generate_key("k")                                                     │
//! │    1. validate alias + purposes                                        │
//! │    2. generate material          (no lock held)                        │
//! │    3. lock alias "k"             (per-alias mutex)                     │
//! │    4. persist record             (backend I/O, cache unlocked)         │
//! │    5. swap Arc<Key> into cache   (brief write lock)                    │
//! │    6. run commit hook            (alias still locked)                  │
//! │                                                                         │
//! │  encrypt / decrypt / sign / verify                                     │
//! │    clone Arc<Key> under a read lock, then run without any lock         │
//! │                                                                         │
//! │  Writers to one alias are serialized; the backend and the cache are    │
//! │  always updated together, so the last writer's key is the one both     │
//! │  hold. Writers to different aliases never wait on each other.          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Persisted Record
//!
//! Each key is stored under `netwatch.key.<alias>` as a bincode-encoded
//! record: format version, alias, algorithm, purposes, key id, creation
//! time and the encoded material.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroize;

use super::secure_store::SecureStore;
use crate::config::KeyOverwritePolicy;
use crate::crypto::{Algorithm, Key, KeyHandle, KeyMaterial, Purposes};
use crate::error::{Error, Result};

/// Prefix of key entries in the secure store
const ENTRY_PREFIX: &str = "netwatch.key.";

/// Version of the persisted record layout
const RECORD_VERSION: u8 = 1;

/// Longest accepted alias in bytes
pub const MAX_ALIAS_LEN: usize = 128;

#[derive(Serialize, Deserialize)]
struct KeyRecord {
    version: u8,
    alias: String,
    algorithm: Algorithm,
    purposes: Purposes,
    key_id: Uuid,
    created_at: i64,
    material: Vec<u8>,
}

impl Drop for KeyRecord {
    fn drop(&mut self) {
        self.material.zeroize();
    }
}

fn entry_name(alias: &str) -> String {
    format!("{}{}", ENTRY_PREFIX, alias)
}

fn check_alias(alias: &str) -> std::result::Result<(), String> {
    if alias.is_empty() {
        return Err("alias must not be empty".into());
    }
    if alias.len() > MAX_ALIAS_LEN {
        return Err(format!("alias exceeds {} bytes", MAX_ALIAS_LEN));
    }
    if alias.chars().any(char::is_control) {
        return Err("alias contains control characters".into());
    }
    Ok(())
}

fn encode_record(key: &Key) -> Result<Vec<u8>> {
    let handle = key.handle();
    let material = key.material().to_bytes()?;
    let record = KeyRecord {
        version: RECORD_VERSION,
        alias: handle.alias.clone(),
        algorithm: handle.algorithm,
        purposes: handle.purposes,
        key_id: handle.key_id,
        created_at: handle.created_at,
        material: material.to_vec(),
    };
    Ok(bincode::serialize(&record)?)
}

fn decode_record(name: &str, bytes: &[u8]) -> Result<Key> {
    let record: KeyRecord = bincode::deserialize(bytes)
        .map_err(|e| Error::StorageCorrupted(format!("Entry '{}': {}", name, e)))?;

    if record.version != RECORD_VERSION {
        return Err(Error::StorageCorrupted(format!(
            "Entry '{}' has unsupported record version {}",
            name, record.version
        )));
    }
    if entry_name(&record.alias) != name {
        return Err(Error::StorageCorrupted(format!(
            "Entry '{}' holds the key for alias '{}'",
            name, record.alias
        )));
    }

    let material = KeyMaterial::from_bytes(record.algorithm, &record.material)?;
    let handle = KeyHandle {
        alias: record.alias.clone(),
        algorithm: record.algorithm,
        purposes: record.purposes,
        key_id: record.key_id,
        created_at: record.created_at,
    };
    Ok(Key::new(handle, material))
}

/// Alias-addressed key storage
///
/// `KeyStore` is `Send + Sync`; share it behind an `Arc`.
pub struct KeyStore {
    store: SecureStore,
    cache: RwLock<HashMap<String, Arc<Key>>>,
    alias_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    policy: KeyOverwritePolicy,
    closed: AtomicBool,
}

impl KeyStore {
    /// Open a key store, loading every key persisted in `store`
    ///
    /// ## Errors
    ///
    /// Storage errors from the backend, or `StorageCorrupted` if any
    /// persisted record cannot be decoded.
    pub fn open(store: SecureStore, policy: KeyOverwritePolicy) -> Result<Self> {
        let mut cache = HashMap::new();
        for name in store.names_with_prefix(ENTRY_PREFIX)? {
            let Some(bytes) = store.retrieve(&name)? else {
                continue;
            };
            let key = decode_record(&name, &bytes)?;
            cache.insert(key.alias().to_string(), Arc::new(key));
        }

        info!(
            backend = %store.describe(),
            sealed = store.is_sealed(),
            keys = cache.len(),
            "Key store opened"
        );

        Ok(Self {
            store,
            cache: RwLock::new(cache),
            alias_locks: Mutex::new(HashMap::new()),
            policy,
            closed: AtomicBool::new(false),
        })
    }

    /// Create an empty in-memory key store
    pub fn in_memory(policy: KeyOverwritePolicy) -> Self {
        Self {
            store: SecureStore::in_memory(),
            cache: RwLock::new(HashMap::new()),
            alias_locks: Mutex::new(HashMap::new()),
            policy,
            closed: AtomicBool::new(false),
        }
    }

    /// The configured overwrite policy
    pub fn policy(&self) -> KeyOverwritePolicy {
        self.policy
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::StoreClosed);
        }
        Ok(())
    }

    /// Run `f` while holding the per-alias lock
    ///
    /// The lock entry is dropped from the map once nobody else holds or
    /// waits on it, so the map only ever holds aliases in flight.
    fn with_alias_lock<T>(&self, alias: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self
            .alias_locks
            .lock()
            .entry(alias.to_string())
            .or_default()
            .clone();
        let result = {
            let _guard = lock.lock();
            f()
        };

        // Clones are only handed out under the map lock, so a count of one
        // here means no other caller can reach this entry.
        let mut locks = self.alias_locks.lock();
        drop(lock);
        if locks.get(alias).map_or(false, |entry| Arc::strong_count(entry) == 1) {
            locks.remove(alias);
        }
        result
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Generate a key and persist it under `alias`
    ///
    /// ## Parameters
    ///
    /// - `alias`: Non-empty name, at most 128 bytes, no control characters
    /// - `algorithm`: Key algorithm
    /// - `purposes`: Non-empty subset of the algorithm's supported purposes
    ///
    /// ## Returns
    ///
    /// The handle of the new key. If the alias was taken and the policy is
    /// `Replace`, handles to the previous key become stale.
    ///
    /// ## Errors
    ///
    /// - `KeyGenerationFailed` for an invalid alias or purposes, or if the
    ///   random source fails
    /// - `KeyAlreadyExists` if the alias is taken under the `Reject` policy
    /// - `StoreClosed` after [`close`](Self::close)
    pub fn generate_key(&self, alias: &str, algorithm: Algorithm, purposes: Purposes) -> Result<KeyHandle> {
        self.generate_key_and(alias, algorithm, purposes, |_| {})
    }

    /// [`generate_key`](Self::generate_key), running `on_commit` with the new
    /// handle before the alias lock is released
    ///
    /// Other writers to the same alias cannot interleave between the commit
    /// and `on_commit`, so state derived from "the key under this alias"
    /// follows the same order as the store.
    #[tracing::instrument(level = "debug", skip(self, on_commit))]
    pub(crate) fn generate_key_and<F>(
        &self,
        alias: &str,
        algorithm: Algorithm,
        purposes: Purposes,
        on_commit: F,
    ) -> Result<KeyHandle>
    where
        F: FnOnce(&KeyHandle),
    {
        self.ensure_open()?;
        check_alias(alias).map_err(Error::KeyGenerationFailed)?;

        if purposes.is_empty() || !purposes.is_subset_of(algorithm.supported_purposes()) {
            return Err(Error::KeyGenerationFailed(format!(
                "{} keys support only {}, requested '{}'",
                algorithm,
                algorithm.supported_purposes(),
                purposes
            )));
        }

        // Key generation (slow for RSA) happens before taking the alias lock
        let material = KeyMaterial::generate(algorithm)?;
        let handle = KeyHandle {
            alias: alias.to_string(),
            algorithm,
            purposes,
            key_id: Uuid::new_v4(),
            created_at: crate::time::now_timestamp_millis(),
        };
        let key = Arc::new(Key::new(handle.clone(), material));
        let record = encode_record(&key)?;

        self.with_alias_lock(alias, || {
            self.ensure_open()?;

            let previous = self.cache.read().get(alias).map(|k| k.handle().clone());
            if let Some(ref previous) = previous {
                if self.policy == KeyOverwritePolicy::Reject {
                    return Err(Error::KeyAlreadyExists(alias.to_string()));
                }
                warn!(
                    alias,
                    old_algorithm = %previous.algorithm,
                    new_algorithm = %algorithm,
                    "Replacing existing key"
                );
            }

            self.store.store(&entry_name(alias), &record)?;
            self.cache.write().insert(alias.to_string(), key);
            on_commit(&handle);

            debug!(alias, algorithm = %algorithm, key_id = %handle.key_id, "Key generated");
            Ok(handle)
        })
    }

    /// Delete the key stored under `alias`
    ///
    /// Idempotent: returns `Ok(false)` if there was nothing to delete.
    pub fn delete_key(&self, alias: &str) -> Result<bool> {
        self.delete_key_and(alias, || Ok(()))
    }

    /// [`delete_key`](Self::delete_key), running `on_commit` before the alias
    /// lock is released
    ///
    /// An error from `on_commit` is returned; the key stays deleted.
    #[tracing::instrument(level = "debug", skip(self, on_commit))]
    pub(crate) fn delete_key_and<F>(&self, alias: &str, on_commit: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        self.ensure_open()?;
        check_alias(alias).map_err(Error::InvalidAlias)?;

        self.with_alias_lock(alias, || {
            let persisted = self.store.delete(&entry_name(alias))?;
            let cached = self.cache.write().remove(alias).is_some();
            on_commit()?;

            let existed = persisted || cached;
            if existed {
                debug!(alias, "Key deleted");
            }
            Ok(existed)
        })
    }

    /// Delete every key
    ///
    /// ## Returns
    ///
    /// Number of keys removed.
    pub fn reset(&self) -> Result<usize> {
        self.ensure_open()?;

        let mut aliases: Vec<String> = self
            .store
            .names_with_prefix(ENTRY_PREFIX)?
            .into_iter()
            .filter_map(|name| name.strip_prefix(ENTRY_PREFIX).map(str::to_string))
            .collect();
        aliases.extend(self.cache.read().keys().cloned());
        aliases.sort();
        aliases.dedup();

        let mut removed = 0;
        for alias in &aliases {
            let existed = self.with_alias_lock(alias, || {
                let persisted = self.store.delete(&entry_name(alias))?;
                let cached = self.cache.write().remove(alias).is_some();
                Ok(persisted || cached)
            })?;
            if existed {
                removed += 1;
            }
        }

        info!(removed, "Key store reset");
        Ok(removed)
    }

    /// Close the store
    ///
    /// Cached key material is dropped (and zeroized once no operation holds
    /// it); every later call fails with `StoreClosed`. Persisted keys are
    /// kept.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let dropped = {
            let mut cache = self.cache.write();
            let count = cache.len();
            cache.clear();
            count
        };
        info!(keys = dropped, "Key store closed");
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // ========================================================================
    // LOOKUPS
    // ========================================================================

    /// Get the handle of the key stored under `alias`
    ///
    /// ## Errors
    ///
    /// `KeyNotFound` if no key is stored under the alias.
    pub fn get_key(&self, alias: &str) -> Result<KeyHandle> {
        Ok(self.key(alias)?.handle().clone())
    }

    /// Get the key stored under `alias`, material included
    pub(crate) fn key(&self, alias: &str) -> Result<Arc<Key>> {
        self.ensure_open()?;
        check_alias(alias).map_err(Error::InvalidAlias)?;

        self.cache
            .read()
            .get(alias)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(alias.to_string()))
    }

    /// Get the key a handle refers to
    ///
    /// ## Errors
    ///
    /// `KeyNotFound` if the alias is empty or now holds a different key
    /// generation than the handle was issued for.
    pub fn resolve(&self, handle: &KeyHandle) -> Result<Arc<Key>> {
        let key = self.key(&handle.alias)?;
        if key.handle().key_id != handle.key_id {
            return Err(Error::KeyNotFound(format!(
                "{} (the key this handle refers to was replaced)",
                handle.alias
            )));
        }
        Ok(key)
    }

    /// Handles of every stored key, ordered by alias
    pub fn list_keys(&self) -> Result<Vec<KeyHandle>> {
        self.ensure_open()?;
        let mut handles: Vec<KeyHandle> = self
            .cache
            .read()
            .values()
            .map(|key| key.handle().clone())
            .collect();
        handles.sort_by(|a, b| a.alias.cmp(&b.alias));
        Ok(handles)
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("backend", &self.store.describe())
            .field("keys", &self.len())
            .field("policy", &self.policy)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{decrypt, encrypt, sign, verify};
    use crate::storage::{FileBackend, MemoryBackend};
    use std::path::Path;

    fn memory_store() -> KeyStore {
        KeyStore::in_memory(KeyOverwritePolicy::Replace)
    }

    fn file_store(dir: &Path) -> KeyStore {
        let backend = FileBackend::open(dir).unwrap();
        KeyStore::open(SecureStore::new(Box::new(backend)), KeyOverwritePolicy::Replace).unwrap()
    }

    #[test]
    fn test_generate_get_list_delete() {
        let store = memory_store();
        let handle = store.generate_key("b", Algorithm::Aes, Purposes::ENCRYPT | Purposes::DECRYPT).unwrap();
        store.generate_key("a", Algorithm::Ec, Purposes::ALL).unwrap();

        assert_eq!(store.get_key("b").unwrap(), handle);
        let aliases: Vec<String> = store.list_keys().unwrap().into_iter().map(|h| h.alias).collect();
        assert_eq!(aliases, vec!["a", "b"]);

        assert!(store.delete_key("b").unwrap());
        assert!(!store.delete_key("b").unwrap());
        assert!(matches!(store.get_key("b"), Err(Error::KeyNotFound(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_key() {
        let store = memory_store();
        assert!(matches!(store.get_key("nope"), Err(Error::KeyNotFound(_))));
        assert!(matches!(store.get_key(""), Err(Error::InvalidAlias(_))));
    }

    #[test]
    fn test_invalid_generation_parameters() {
        let store = memory_store();
        assert!(matches!(
            store.generate_key("", Algorithm::Aes, Purposes::ENCRYPT),
            Err(Error::KeyGenerationFailed(_))
        ));
        assert!(matches!(
            store.generate_key(&"x".repeat(MAX_ALIAS_LEN + 1), Algorithm::Aes, Purposes::ENCRYPT),
            Err(Error::KeyGenerationFailed(_))
        ));
        assert!(matches!(
            store.generate_key("aes", Algorithm::Aes, Purposes::SIGN),
            Err(Error::KeyGenerationFailed(_))
        ));
        assert!(matches!(
            store.generate_key("none", Algorithm::Ec, Purposes::NONE),
            Err(Error::KeyGenerationFailed(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_overwrite_makes_old_handle_stale() {
        let store = memory_store();
        let old = store.generate_key("k", Algorithm::Aes, Purposes::ENCRYPT | Purposes::DECRYPT).unwrap();
        let new = store.generate_key("k", Algorithm::Ec, Purposes::ALL).unwrap();

        assert_ne!(old.key_id, new.key_id);
        assert!(matches!(store.resolve(&old), Err(Error::KeyNotFound(_))));
        assert_eq!(store.resolve(&new).unwrap().algorithm(), Algorithm::Ec);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_deleted_handle_is_stale() {
        let store = memory_store();
        let handle = store.generate_key("k", Algorithm::Aes, Purposes::ENCRYPT | Purposes::DECRYPT).unwrap();
        store.delete_key("k").unwrap();
        assert!(matches!(store.resolve(&handle), Err(Error::KeyNotFound(_))));
    }

    #[test]
    fn test_reject_policy() {
        let store = KeyStore::in_memory(KeyOverwritePolicy::Reject);
        let first = store.generate_key("k", Algorithm::Ec, Purposes::ALL).unwrap();
        assert!(matches!(
            store.generate_key("k", Algorithm::Ec, Purposes::ALL),
            Err(Error::KeyAlreadyExists(_))
        ));
        assert_eq!(store.get_key("k").unwrap(), first);
    }

    #[test]
    fn test_concurrent_generation_same_alias() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(file_store(dir.path()));

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let algorithm = if i % 2 == 0 { Algorithm::Aes } else { Algorithm::Ec };
                std::thread::spawn(move || {
                    store
                        .generate_key("shared", algorithm, algorithm.supported_purposes())
                        .unwrap()
                })
            })
            .collect();
        let issued: Vec<KeyHandle> = threads.into_iter().map(|t| t.join().unwrap()).collect();

        let winner = store.get_key("shared").unwrap();
        assert!(issued.contains(&winner));
        assert_eq!(store.list_keys().unwrap().len(), 1);

        // The persisted record is the same generation the cache holds
        let live = store.key("shared").unwrap();
        let reopened = file_store(dir.path());
        let persisted = reopened.key("shared").unwrap();
        assert_eq!(persisted.handle(), live.handle());
        assert_eq!(persisted.material().fingerprint(), live.material().fingerprint());
    }

    #[test]
    fn test_alias_locks_released() {
        let store = Arc::new(memory_store());
        store.generate_key("a", Algorithm::Aes, Purposes::ENCRYPT | Purposes::DECRYPT).unwrap();
        store.delete_key("a").unwrap();
        store.delete_key("never-existed").unwrap();

        let threads: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for round in 0..50 {
                        let alias = format!("alias-{}", (i + round) % 3);
                        store.generate_key(&alias, Algorithm::Ec, Purposes::ALL).unwrap();
                        store.delete_key(&alias).unwrap();
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert!(store.alias_locks.lock().is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_commit_hook_runs_under_alias_lock() {
        let store = memory_store();
        let mut seen = None;
        let handle = store
            .generate_key_and("hooked", Algorithm::Ec, Purposes::ALL, |handle| {
                // The entry is held while the hook runs
                assert_eq!(store.alias_locks.lock().len(), 1);
                seen = Some(handle.clone());
            })
            .unwrap();
        assert_eq!(seen, Some(handle));

        let mut deleted = false;
        assert!(store
            .delete_key_and("hooked", || {
                deleted = true;
                Ok(())
            })
            .unwrap());
        assert!(deleted);
        assert!(store.alias_locks.lock().is_empty());

        let failed = store.delete_key_and("hooked", || Err(Error::StoreClosed));
        assert!(matches!(failed, Err(Error::StoreClosed)));
    }

    #[test]
    fn test_keys_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (aes_handle, ec_handle, ciphertext, signature) = {
            let store = file_store(dir.path());
            let aes = store.generate_key("k2", Algorithm::Aes, Algorithm::Aes.supported_purposes()).unwrap();
            let ec = store.generate_key("k1", Algorithm::Ec, Purposes::ALL).unwrap();
            let ciphertext = encrypt(&store.resolve(&aes).unwrap(), b"Hello World").unwrap();
            let signature = sign(&store.resolve(&ec).unwrap(), b"Hello World").unwrap();
            (aes, ec, ciphertext, signature)
        };

        let store = file_store(dir.path());
        assert_eq!(store.get_key("k2").unwrap(), aes_handle);
        let aes = store.resolve(&aes_handle).unwrap();
        assert_eq!(decrypt(&aes, &ciphertext).unwrap(), b"Hello World");
        let ec = store.resolve(&ec_handle).unwrap();
        assert!(verify(&ec, b"Hello World", &signature).unwrap());
    }

    #[test]
    fn test_rsa_key_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let handle = file_store(dir.path())
            .generate_key("rsa", Algorithm::Rsa, Purposes::ALL)
            .unwrap();

        let store = file_store(dir.path());
        let key = store.resolve(&handle).unwrap();
        let ciphertext = encrypt(&key, b"short secret").unwrap();
        assert_eq!(decrypt(&key, &ciphertext).unwrap(), b"short secret");
    }

    #[test]
    fn test_sealed_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let open_sealed = |wrapping_key: [u8; 32]| {
            let backend = FileBackend::open(dir.path()).unwrap();
            KeyStore::open(
                SecureStore::with_encryption(Box::new(backend), wrapping_key),
                KeyOverwritePolicy::Replace,
            )
        };

        let handle = open_sealed([5u8; 32])
            .unwrap()
            .generate_key("sealed", Algorithm::Ec, Purposes::ALL)
            .unwrap();

        assert_eq!(open_sealed([5u8; 32]).unwrap().get_key("sealed").unwrap(), handle);
        assert!(matches!(open_sealed([6u8; 32]), Err(Error::StorageCorrupted(_))));
    }

    #[test]
    fn test_corrupted_record_fails_open() {
        let backend = MemoryBackend::new();
        crate::storage::KeystoreBackend::put(&backend, "netwatch.key.bad", b"garbage").unwrap();

        let result = KeyStore::open(SecureStore::new(Box::new(backend)), KeyOverwritePolicy::Replace);
        assert!(matches!(result, Err(Error::StorageCorrupted(_))));
    }

    #[test]
    fn test_close_rejects_operations() {
        let store = memory_store();
        let handle = store.generate_key("k", Algorithm::Aes, Purposes::ENCRYPT | Purposes::DECRYPT).unwrap();
        store.close();

        assert!(store.is_closed());
        assert!(matches!(store.get_key("k"), Err(Error::StoreClosed)));
        assert!(matches!(store.resolve(&handle), Err(Error::StoreClosed)));
        assert!(matches!(
            store.generate_key("j", Algorithm::Aes, Purposes::ENCRYPT),
            Err(Error::StoreClosed)
        ));
        assert!(matches!(store.delete_key("k"), Err(Error::StoreClosed)));
        assert!(matches!(store.list_keys(), Err(Error::StoreClosed)));
    }

    #[test]
    fn test_reset_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = file_store(dir.path());
        store.generate_key("a", Algorithm::Aes, Purposes::ENCRYPT | Purposes::DECRYPT).unwrap();
        store.generate_key("b", Algorithm::Ec, Purposes::ALL).unwrap();

        assert_eq!(store.reset().unwrap(), 2);
        assert!(store.is_empty());
        assert!(file_store(dir.path()).is_empty());
    }
}
