//! Snapshot-file commit sink.
//!
//! Every commit rewrites the whole entry set as one snapshot. The snapshot is
//! written to a temporary file in the target directory and renamed over the
//! target, so a crash leaves either the previous or the new snapshot, never a
//! mix.

use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::commit::{CommitSink, CommitUnit};
use crate::config::{Encoding, StoreConfig, SyncMode};
use crate::error::{CommitError, CommitResult};

/// Snapshot file magic.
const MAGIC: &[u8; 4] = b"HRD1";

/// Header size: 4 bytes magic + 1 byte encoding + 4 bytes length + 4 bytes CRC.
///
/// On-disk format:
/// ```text
/// [4 bytes: magic "HRD1"]
/// [1 byte:  encoding tag (0 = json, 1 = bincode)]
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload, the entries as a sequence of (key, value) pairs]
/// ```
const HEADER_SIZE: usize = 13;

/// Commit sink that persists the entry set as a snapshot file.
pub struct FileSink<K, V> {
    path: PathBuf,
    sync_mode: SyncMode,
    encoding: Encoding,
    _entries: PhantomData<fn() -> (K, V)>,
}

impl<K, V> FileSink<K, V> {
    /// Open a sink for the snapshot described by `config`.
    ///
    /// Creates the parent directory if needed. The snapshot itself is not
    /// read until [`restore`](CommitSink::restore).
    pub fn open(config: &StoreConfig) -> CommitResult<Self> {
        if let Some(parent) = non_empty_parent(&config.path) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path: config.path.clone(),
            sync_mode: config.sync_mode,
            encoding: config.encoding,
            _entries: PhantomData,
        })
    }

    /// Snapshot file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_snapshot(&self, payload: &[u8]) -> CommitResult<()> {
        let length = u32::try_from(payload.len()).map_err(|_| {
            CommitError::Serialization(format!(
                "snapshot payload of {} bytes exceeds the 4 GiB limit",
                payload.len()
            ))
        })?;
        let crc = crc32fast::hash(payload);

        let dir = non_empty_parent(&self.path).unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(MAGIC)?;
        tmp.write_all(&[self.encoding.tag()])?;
        tmp.write_all(&length.to_le_bytes())?;
        tmp.write_all(&crc.to_le_bytes())?;
        tmp.write_all(payload)?;
        tmp.flush()?;

        if self.sync_mode == SyncMode::EveryCommit {
            tmp.as_file().sync_all()?;
        }
        tmp.persist(&self.path).map_err(|e| CommitError::Io(e.error))?;
        if self.sync_mode == SyncMode::EveryCommit {
            sync_dir(dir)?;
        }

        debug!(path = %self.path.display(), len = payload.len(), "snapshot committed");
        Ok(())
    }

    fn corrupt(&self, reason: impl Into<String>) -> CommitError {
        CommitError::Corrupt {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

impl<K, V> CommitSink<K, V> for FileSink<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    fn begin(&self) -> CommitResult<Box<dyn CommitUnit<K, V> + '_>> {
        Ok(Box::new(FileUnit {
            sink: self,
            payload: None,
        }))
    }

    fn restore(&self) -> CommitResult<Vec<(K, V)>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot to restore");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        if bytes.len() < HEADER_SIZE {
            return Err(self.corrupt(format!("truncated header ({} bytes)", bytes.len())));
        }
        if &bytes[0..4] != MAGIC {
            return Err(self.corrupt("bad magic"));
        }
        let encoding = Encoding::from_tag(bytes[4])
            .ok_or_else(|| self.corrupt(format!("unknown encoding tag {}", bytes[4])))?;
        let length = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]) as usize;
        let expected_crc = u32::from_le_bytes([bytes[9], bytes[10], bytes[11], bytes[12]]);

        let payload = &bytes[HEADER_SIZE..];
        if payload.len() != length {
            return Err(self.corrupt(format!(
                "payload length {} does not match header length {length}",
                payload.len()
            )));
        }
        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            return Err(self.corrupt(format!(
                "CRC mismatch: expected {expected_crc:#010x}, got {actual_crc:#010x}"
            )));
        }

        let entries: Vec<(K, V)> = decode(encoding, payload)?;
        info!(path = %self.path.display(), entries = entries.len(), "snapshot restored");
        Ok(entries)
    }
}

impl<K, V> std::fmt::Debug for FileSink<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink")
            .field("path", &self.path)
            .field("sync_mode", &self.sync_mode)
            .field("encoding", &self.encoding)
            .finish()
    }
}

struct FileUnit<'a, K, V> {
    sink: &'a FileSink<K, V>,
    payload: Option<Vec<u8>>,
}

impl<K, V> CommitUnit<K, V> for FileUnit<'_, K, V>
where
    K: Serialize,
    V: Serialize,
{
    fn store(&mut self, root: &IndexMap<K, V>) -> CommitResult<()> {
        let pairs: Vec<(&K, &V)> = root.iter().collect();
        self.payload = Some(encode(self.sink.encoding, &pairs)?);
        Ok(())
    }

    fn commit(self: Box<Self>) -> CommitResult<()> {
        match self.payload {
            Some(payload) => self.sink.write_snapshot(&payload),
            None => Ok(()),
        }
    }
}

fn encode<T: Serialize>(encoding: Encoding, value: &T) -> CommitResult<Vec<u8>> {
    match encoding {
        Encoding::Json => {
            serde_json::to_vec(value).map_err(|e| CommitError::Serialization(e.to_string()))
        }
        Encoding::Bincode => {
            bincode::serialize(value).map_err(|e| CommitError::Serialization(e.to_string()))
        }
    }
}

fn decode<T: DeserializeOwned>(encoding: Encoding, bytes: &[u8]) -> CommitResult<T> {
    match encoding {
        Encoding::Json => {
            serde_json::from_slice(bytes).map_err(|e| CommitError::Serialization(e.to_string()))
        }
        Encoding::Bincode => {
            bincode::deserialize(bytes).map_err(|e| CommitError::Serialization(e.to_string()))
        }
    }
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
