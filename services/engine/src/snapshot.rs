//! Snapshot persistence
//!
//! Serializes the full engine state (every book plus the ledger) to a single
//! file with a format version and a SHA-256 integrity checksum, optionally
//! zstd-compressed. Writes go to a sibling temp file which is fsynced and
//! renamed over the target, so the restore path never observes a partial
//! file.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use types::balance::Balance;
use types::ids::UserId;

use crate::book::BookSnapshot;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailure { expected: String, actual: String },

    #[error("unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    #[error("compression error: {0}")]
    Compression(String),
}

/// Full engine state at one command boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub orderbooks: Vec<BookSnapshot>,
    pub balances: Vec<(UserId, BTreeMap<String, Balance>)>,
}

/// On-disk wrapper: version and checksum stay readable even when the state
/// payload is compressed
#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    checksum: String,
    compressed: bool,
    data: Vec<u8>,
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Reads and writes the engine's single snapshot file
pub struct SnapshotStore {
    path: PathBuf,
    compress: bool,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>, compress: bool) -> Self {
        Self {
            path: path.into(),
            compress,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write a snapshot atomically: serialize → checksum → temp file →
    /// fsync → rename
    pub fn write(&self, state: &EngineSnapshot) -> Result<(), SnapshotError> {
        let data = bincode::serialize(state)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;
        let checksum = sha256_hex(&data);

        let payload = if self.compress {
            zstd::encode_all(data.as_slice(), 3)
                .map_err(|e| SnapshotError::Compression(e.to_string()))?
        } else {
            data
        };

        let envelope = Envelope {
            version: SNAPSHOT_VERSION,
            checksum,
            compressed: self.compress,
            data: payload,
        };
        let bytes = bincode::serialize(&envelope)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }

    /// Load and verify the snapshot file
    pub fn load(&self) -> Result<EngineSnapshot, SnapshotError> {
        let mut file = File::open(&self.path)?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;

        let envelope: Envelope = bincode::deserialize(&bytes)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;

        if envelope.version > SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(envelope.version));
        }

        let data = if envelope.compressed {
            zstd::decode_all(envelope.data.as_slice())
                .map_err(|e| SnapshotError::Compression(e.to_string()))?
        } else {
            envelope.data
        };

        let actual = sha256_hex(&data);
        if actual != envelope.checksum {
            return Err(SnapshotError::IntegrityFailure {
                expected: envelope.checksum,
                actual,
            });
        }

        bincode::deserialize(&data).map_err(|e| SnapshotError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;
    use types::ids::MarketSymbol;
    use types::numeric::Price;
    use types::order::StpMode;

    fn sample_state() -> EngineSnapshot {
        let mut balances = BTreeMap::new();
        balances.insert(
            "INR".to_string(),
            Balance {
                available: dec!(7000),
                locked: dec!(3000),
            },
        );
        EngineSnapshot {
            orderbooks: vec![BookSnapshot {
                market: MarketSymbol::new("TATA_INR"),
                base_asset: "TATA".to_string(),
                quote_asset: "INR".to_string(),
                bids: Vec::new(),
                asks: Vec::new(),
                last_trade_id: 42,
                last_price: Some(Price::from_u64(100)),
                stp_mode: StpMode::CancelNewest,
            }],
            balances: vec![(UserId::new("u1"), balances)],
        }
    }

    #[test]
    fn test_write_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path().join("state.bin"), false);

        let state = sample_state();
        store.write(&state).unwrap();
        assert!(store.exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_write_and_load_compressed() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path().join("state.bin"), true);

        let state = sample_state();
        store.write(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn test_overwrite_keeps_latest() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path().join("state.bin"), false);

        let mut state = sample_state();
        store.write(&state).unwrap();
        state.orderbooks[0].last_trade_id = 99;
        store.write(&state).unwrap();

        assert_eq!(store.load().unwrap().orderbooks[0].last_trade_id, 99);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path().join("absent.bin"), false);
        assert!(matches!(store.load(), Err(SnapshotError::Io(_))));
    }

    #[test]
    fn test_corrupted_file_detected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.bin");
        let store = SnapshotStore::new(&path, false);
        store.write(&sample_state()).unwrap();

        // Flip a byte near the end of the file (inside the state payload)
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, &bytes).unwrap();

        assert!(store.load().is_err());
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path().join("state.bin"), false);
        store.write(&sample_state()).unwrap();

        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|name| name.ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
