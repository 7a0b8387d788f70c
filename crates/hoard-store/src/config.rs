use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Flush strategy for snapshot commits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` the snapshot and its directory on every commit.
    EveryCommit,
    /// Rely on OS page-cache buffering (faster, survives process crashes
    /// but not power loss).
    OsDefault,
}

impl Default for SyncMode {
    fn default() -> Self {
        Self::EveryCommit
    }
}

/// Payload encoding for snapshot files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Self-describing JSON. Required for dynamically typed values.
    Json,
    /// Compact bincode. Keys and values must be statically typed.
    Bincode,
}

impl Default for Encoding {
    fn default() -> Self {
        Self::Json
    }
}

impl Encoding {
    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Json => 0,
            Self::Bincode => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Json),
            1 => Some(Self::Bincode),
            _ => None,
        }
    }
}

/// Configuration for a file-backed store.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// path = "data/books.snapshot"
/// sync_mode = "os_default"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Snapshot file location.
    pub path: PathBuf,
    /// Flush strategy.
    pub sync_mode: SyncMode,
    /// Encoding for newly written snapshots.
    pub encoding: Encoding,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("hoard.snapshot"),
            sync_mode: SyncMode::default(),
            encoding: Encoding::default(),
        }
    }
}

impl StoreConfig {
    /// Default configuration with the snapshot at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        toml::from_str(text).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Read and parse a TOML configuration file.
    pub fn from_toml_file(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.path, PathBuf::from("hoard.snapshot"));
        assert_eq!(c.sync_mode, SyncMode::EveryCommit);
        assert_eq!(c.encoding, Encoding::Json);
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let c = StoreConfig::from_toml_str(
            r#"
            path = "data/books.snapshot"
            sync_mode = "os_default"
            "#,
        )
        .unwrap();
        assert_eq!(c.path, PathBuf::from("data/books.snapshot"));
        assert_eq!(c.sync_mode, SyncMode::OsDefault);
        assert_eq!(c.encoding, Encoding::Json);
    }

    #[test]
    fn toml_rejects_unknown_encoding() {
        let err = StoreConfig::from_toml_str(r#"encoding = "xml""#).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn toml_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hoard.toml");
        let config = StoreConfig::new(dir.path().join("snap")).with_encoding(Encoding::Bincode);
        std::fs::write(&file, toml::to_string(&config).unwrap()).unwrap();

        assert_eq!(StoreConfig::from_toml_file(&file).unwrap(), config);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = StoreConfig::from_toml_file(Path::new("/nonexistent/hoard.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/hoard.toml"));
    }

    #[test]
    fn encoding_tags() {
        for encoding in [Encoding::Json, Encoding::Bincode] {
            assert_eq!(Encoding::from_tag(encoding.tag()), Some(encoding));
        }
        assert_eq!(Encoding::from_tag(9), None);
    }
}
