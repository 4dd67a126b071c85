//! Key-value backends for the response cache

use std::{
    collections::HashMap,
    fmt::Debug,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::RwLock,
};

use directories::ProjectDirs;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use url::form_urlencoded;

use super::error::{CacheError, Result};

/// Byte-oriented key-value store backing a [`ResponseCache`](super::ResponseCache).
///
/// Implementations only move bytes around; expiry and namespacing are handled
/// by the cache on top.
pub trait KeyValueStore: Send + Sync + Debug {
    /// Short backend name for logging
    fn name(&self) -> &'static str;

    /// Return the stored bytes, `None` on a miss
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// All keys currently stored
    fn keys(&self) -> Result<Vec<String>>;
}

/// Process-local store, mostly useful for tests and one-shot runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.keys().cloned().collect())
    }
}

/// Directory-backed store with one JSON file per key
///
/// Keys are form-urlencoded into file names so full request URLs can be used
/// as keys. Keys whose encoded form would not fit in a file name are stored
/// under a SHA-256 name instead, with the encoded key on the first line of the
/// file. Writes go to a unique temporary file first and are persisted into
/// place with a rename.
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
}

const ENTRY_EXTENSION: &str = ".json";
/// `~` is always percent-encoded by `form_urlencoded`, so plain names never start with it
const HASHED_PREFIX: char = '~';
/// Leaves room for the extension under the usual 255 byte limit
const MAX_ENCODED_KEY_LEN: usize = 200;

/// Where a key lives on disk
struct EntryLocation {
    path: PathBuf,
    /// Encoded key header for hashed entries
    header: Option<String>,
}

impl DirStore {
    /// Store in the platform cache directory (`~/.cache/folio-pulse` on Linux).
    ///
    /// Returns `None` when no home directory can be determined.
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "folio-pulse")?;
        Some(Self::with_dir(project_dirs.cache_dir().to_path_buf()))
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn locate(&self, key: &str) -> EntryLocation {
        let encoded: String = form_urlencoded::byte_serialize(key.as_bytes()).collect();
        if encoded.len() <= MAX_ENCODED_KEY_LEN {
            return EntryLocation {
                path: self.dir.join(format!("{encoded}{ENTRY_EXTENSION}")),
                header: None,
            };
        }

        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let digest = hex::encode(hasher.finalize());
        EntryLocation {
            path: self.dir.join(format!("{HASHED_PREFIX}{digest}{ENTRY_EXTENSION}")),
            header: Some(encoded),
        }
    }

    fn decode_key(encoded: &[u8]) -> Option<String> {
        form_urlencoded::parse(encoded)
            .next()
            .map(|(key, _)| key.into_owned())
    }

    /// Split a hashed entry into its encoded key header and value
    fn split_header(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
        let newline = bytes.iter().position(|&b| b == b'\n')?;
        Some((&bytes[..newline], &bytes[newline + 1..]))
    }

    fn key_for_file(&self, name: &str) -> Result<Option<String>> {
        let Some(stem) = name.strip_suffix(ENTRY_EXTENSION) else {
            return Ok(None);
        };
        if !stem.starts_with(HASHED_PREFIX) {
            return Ok(Self::decode_key(stem.as_bytes()));
        }

        let bytes = match fs::read(self.dir.join(name)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Self::split_header(&bytes).and_then(|(header, _)| Self::decode_key(header)))
    }
}

impl KeyValueStore for DirStore {
    fn name(&self) -> &'static str {
        "dir"
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let location = self.locate(key);
        let bytes = match fs::read(&location.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match &location.header {
            None => Ok(Some(bytes)),
            Some(expected) => Ok(Self::split_header(&bytes)
                .filter(|(header, _)| *header == expected.as_bytes())
                .map(|(_, value)| value.to_vec())),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        let location = self.locate(key);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        if let Some(header) = &location.header {
            tmp.write_all(header.as_bytes())?;
            tmp.write_all(b"\n")?;
        }
        tmp.write_all(value)?;
        tmp.persist(&location.path).map_err(|e| CacheError::Io(e.error))?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.locate(key).path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if let Some(key) = self.key_for_file(&name)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
