use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};

/// Flush/sync strategy for a write-ahead log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every append (safest, highest latency).
    EveryWrite,
    /// Flush to the OS after every append and rely on its page cache.
    #[default]
    OsDefault,
}

/// Configuration for a [`WriteAheadLog`].
#[derive(Clone, Debug, Default)]
pub struct WalConfig {
    pub sync_mode: SyncMode,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: u64 = 8;

struct WalWriter {
    file: File,
    /// Current end-of-log offset.
    offset: u64,
}

/// Append-only, crash-recoverable log of serialized entries.
///
/// On-disk frame format:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized T)]
/// ```
///
/// Frames failing the CRC check are skipped on recovery. A torn frame at the
/// tail (from a crash mid-append) is cut off when the log is opened, so new
/// appends never land behind unreadable bytes.
pub struct WriteAheadLog<T> {
    path: PathBuf,
    writer: Mutex<WalWriter>,
    config: WalConfig,
    _entry: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> WriteAheadLog<T> {
    /// Open (or create) a log file at the given path.
    pub fn open(path: &Path, config: WalConfig) -> StoreResult<Self> {
        if path.is_dir() {
            return Err(StoreError::BadPath(path.to_path_buf()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let file_len = file.metadata()?.len();
        let (_, valid_len) = scan::<T>(path)?;
        if valid_len < file_len {
            warn!(
                path = %path.display(),
                file_len,
                valid_len,
                "cutting torn tail from log"
            );
            file.set_len(valid_len)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(WalWriter {
                file,
                offset: valid_len,
            }),
            config,
            _entry: PhantomData,
        })
    }

    /// Append a single entry. Returns the byte offset of its frame.
    ///
    /// The frame is handed to the OS in a single write (and synced under
    /// [`SyncMode::EveryWrite`]) before this returns.
    pub fn append(&self, entry: &T) -> StoreResult<u64> {
        let payload =
            bincode::serialize(entry).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let length = u32::try_from(payload.len())
            .map_err(|_| StoreError::Serialization("entry exceeds 4 GiB".into()))?;
        let crc = crc32fast::hash(&payload);

        let mut w = self
            .writer
            .lock()
            .map_err(|_| StoreError::poisoned("WAL"))?;
        let entry_offset = w.offset;

        let mut frame = Vec::with_capacity(HEADER_SIZE as usize + payload.len());
        frame.extend_from_slice(&length.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&payload);

        let written = w.file.write_all(&frame).and_then(|()| {
            if self.config.sync_mode == SyncMode::EveryWrite {
                w.file.sync_all()
            } else {
                Ok(())
            }
        });
        if let Err(e) = written {
            // Drop any partial frame so the next append starts on a boundary.
            if let Err(cut) = w.file.set_len(entry_offset) {
                warn!(offset = entry_offset, error = %cut, "failed to cut partial frame");
            }
            return Err(e.into());
        }

        w.offset += frame.len() as u64;

        debug!(offset = entry_offset, len = payload.len(), "WAL append");
        Ok(entry_offset)
    }

    /// Recover all valid entries, front to back.
    pub fn recover(&self) -> StoreResult<Vec<T>> {
        // Holding the writer lock keeps an in-flight frame from being read
        // as a torn tail.
        let _guard = self
            .writer
            .lock()
            .map_err(|_| StoreError::poisoned("WAL"))?;
        let (entries, _) = scan::<T>(&self.path)?;
        debug!(recovered = entries.len(), "WAL recovery complete");
        Ok(entries)
    }

    /// Current end-of-log offset.
    pub fn offset(&self) -> StoreResult<u64> {
        Ok(self
            .writer
            .lock()
            .map_err(|_| StoreError::poisoned("WAL"))?
            .offset)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every frame of the file. Returns the decoded entries and the offset
/// just past the last complete frame.
fn scan<T: DeserializeOwned>(path: &Path) -> StoreResult<(Vec<T>, u64)> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut entries = Vec::new();
    let mut offset: u64 = 0;

    while offset + HEADER_SIZE <= file_len {
        let mut header = [0u8; HEADER_SIZE as usize];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if length == 0 || offset + HEADER_SIZE + length as u64 > file_len {
            warn!(offset, length, file_len, "invalid frame length; stopping recovery");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        match reader.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!(offset, "truncated frame; stopping recovery");
                break;
            }
            Err(e) => return Err(e.into()),
        }

        let next = offset + HEADER_SIZE + length as u64;
        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(offset, expected = expected_crc, actual = actual_crc, "CRC mismatch; skipping frame");
        } else {
            match bincode::deserialize::<T>(&payload) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(offset, error = %e, "undecodable frame; skipping"),
            }
        }
        offset = next;
    }

    Ok((entries, offset))
}
