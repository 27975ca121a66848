//! # Secure Storage
//!
//! Keystore backends and the optional sealing layer on top of them.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SECURE STORAGE                                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  SecureStore                                                    │   │
//! │  │  ───────────                                                     │   │
//! │  │  • store(name, value)   - Seal (if configured) and persist      │   │
//! │  │  • retrieve(name)       - Load and unseal                       │   │
//! │  │  • delete(name)         - Remove the entry                      │   │
//! │  │  • names()              - Enumerate entries                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                              │                                          │
//! │                              ▼                                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  KeystoreBackend trait (the platform seam)                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │           │                               │                             │
//! │           ▼                               ▼                             │
//! │  ┌─────────────────┐            ┌─────────────────────┐                │
//! │  │ MemoryBackend   │            │ FileBackend         │                │
//! │  │ tests, no path  │            │ one file per entry, │                │
//! │  │                 │            │ temp file + rename  │                │
//! │  └─────────────────┘            └─────────────────────┘                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Sealing
//!
//! With a wrapping key, every value is stored as
//! `nonce(12) ‖ AES-256-GCM(value) ‖ tag(16)` with the entry name as
//! associated data, so a sealed value cannot be moved to another name.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use crate::crypto::{open_sealed, seal_with_random_nonce, AES_KEY_SIZE};
use crate::error::{Error, Result};

/// File extension of persisted entries
const ENTRY_EXTENSION: &str = "entry";

// ============================================================================
// BACKENDS
// ============================================================================

/// Raw persistence for named byte values
///
/// Implementations must be safe to call from several threads at once.
/// A hardware keystore would implement this trait.
pub trait KeystoreBackend: Send + Sync {
    /// Store `value` under `name`, replacing any previous value
    fn put(&self, name: &str, value: &[u8]) -> Result<()>;

    /// Load the value under `name`
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>>;

    /// Remove the value under `name`, returning whether it existed
    fn remove(&self, name: &str) -> Result<bool>;

    /// Names of every stored value
    fn names(&self) -> Result<Vec<String>>;

    /// Short description for logs
    fn describe(&self) -> String;
}

/// In-memory backend (for development/testing)
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeystoreBackend for MemoryBackend {
    fn put(&self, name: &str, value: &[u8]) -> Result<()> {
        self.entries.write().insert(name.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(name).cloned())
    }

    fn remove(&self, name: &str) -> Result<bool> {
        Ok(self.entries.write().remove(name).is_some())
    }

    fn names(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Directory backend: one file per entry
///
/// File names are the hex encoding of the entry name, so any name is
/// representable on any filesystem. Writes go to a uniquely named
/// temporary file first and are renamed into place, so a crash never
/// leaves a half-written entry.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open (creating if needed) a backend rooted at `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            Error::StorageWriteError(format!("Cannot create {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    fn entry_path(&self, name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", hex::encode(name.as_bytes()), ENTRY_EXTENSION))
    }
}

impl KeystoreBackend for FileBackend {
    fn put(&self, name: &str, value: &[u8]) -> Result<()> {
        let path = self.entry_path(name);
        let tmp = self
            .dir
            .join(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));

        let write = || -> io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(value)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        };

        write().map_err(|e| {
            let _ = fs::remove_file(&tmp);
            Error::StorageWriteError(format!("Cannot write {}: {}", path.display(), e))
        })
    }

    fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.entry_path(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::StorageReadError(format!(
                "Cannot read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn remove(&self, name: &str) -> Result<bool> {
        let path = self.entry_path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::StorageWriteError(format!(
                "Cannot delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn names(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            Error::StorageReadError(format!("Cannot list {}: {}", self.dir.display(), e))
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::StorageReadError(e.to_string()))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Foreign files in the directory are not ours to interpret
            let Ok(raw) = hex::decode(stem) else {
                tracing::warn!(path = %path.display(), "Skipping unrecognised file in key directory");
                continue;
            };
            let name = String::from_utf8(raw)
                .map_err(|_| Error::StorageCorrupted(format!("Invalid entry name {}", stem)))?;
            names.push(name);
        }
        Ok(names)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.dir.display())
    }
}

// ============================================================================
// SECURE STORE
// ============================================================================

/// Named-value store with optional sealing under a wrapping key
pub struct SecureStore {
    backend: Box<dyn KeystoreBackend>,

    /// Optional wrapping key for additional protection
    wrapping_key: Option<Zeroizing<[u8; AES_KEY_SIZE]>>,
}

impl SecureStore {
    /// Create a store over `backend`, storing values as-is
    pub fn new(backend: Box<dyn KeystoreBackend>) -> Self {
        Self {
            backend,
            wrapping_key: None,
        }
    }

    /// Create an unsealed in-memory store
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::new()))
    }

    /// Create a store that seals every value under `key`
    pub fn with_encryption(backend: Box<dyn KeystoreBackend>, key: [u8; AES_KEY_SIZE]) -> Self {
        Self {
            backend,
            wrapping_key: Some(Zeroizing::new(key)),
        }
    }

    /// Whether values are sealed before storage
    pub fn is_sealed(&self) -> bool {
        self.wrapping_key.is_some()
    }

    /// Short description of the backend for logs
    pub fn describe(&self) -> String {
        self.backend.describe()
    }

    /// Store data securely
    ///
    /// The data will be sealed if a wrapping key was provided.
    pub fn store(&self, name: &str, value: &[u8]) -> Result<()> {
        match self.wrapping_key {
            Some(ref key) => {
                let sealed = seal_with_random_nonce(key, value, name.as_bytes())?;
                self.backend.put(name, &sealed)
            }
            None => self.backend.put(name, value),
        }
    }

    /// Retrieve data securely
    ///
    /// ## Errors
    ///
    /// `StorageCorrupted` if a sealed value fails authentication.
    pub fn retrieve(&self, name: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        let Some(data) = self.backend.get(name)? else {
            return Ok(None);
        };

        let value = match self.wrapping_key {
            Some(ref key) => open_sealed(key, &data, name.as_bytes()).map_err(|_| {
                Error::StorageCorrupted(format!("Entry '{}' failed authentication", name))
            })?,
            None => data,
        };
        Ok(Some(Zeroizing::new(value)))
    }

    /// Delete data from secure storage
    pub fn delete(&self, name: &str) -> Result<bool> {
        self.backend.remove(name)
    }

    /// Names of every entry starting with `prefix`
    pub fn names_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .backend
            .names()?
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .collect();
        names.sort();
        Ok(names)
    }
}

impl Default for SecureStore {
    fn default() -> Self {
        Self::in_memory()
    }
}
