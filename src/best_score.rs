//! On-disk best-score record.
//!
//! Layout (17 bytes): `B2S1` magic, version byte, best score as LE u64,
//! CRC32C of the preceding 13 bytes as LE u32.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::engine::Score;

const MAGIC: &[u8; 4] = b"B2S1";
const VERSION: u8 = 1;
const BODY_LEN: usize = 4 + 1 + 8;
const RECORD_LEN: usize = BODY_LEN + 4;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid magic")]
    Magic,
    #[error("unsupported version {0}")]
    Version(u8),
    #[error("record has wrong length")]
    Malformed,
    #[error("checksum mismatch")]
    Checksum,
}

#[inline]
fn read_u32_le(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(..4)?.try_into().ok()?))
}

#[inline]
fn read_u64_le(bytes: &[u8]) -> Option<u64> {
    Some(u64::from_le_bytes(bytes.get(..8)?.try_into().ok()?))
}

pub fn encode(best: Score) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RECORD_LEN);
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    buf.extend_from_slice(&best.to_le_bytes());
    let checksum = crc32c::crc32c(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    buf
}

pub fn decode(bytes: &[u8]) -> Result<Score, StoreError> {
    if bytes.len() != RECORD_LEN {
        return Err(StoreError::Malformed);
    }
    // Checksum first so a torn write never reads as a valid score
    let (content, trailer) = bytes.split_at(BODY_LEN);
    let file_crc = read_u32_le(trailer).ok_or(StoreError::Malformed)?;
    if file_crc != crc32c::crc32c(content) {
        return Err(StoreError::Checksum);
    }
    if &content[..4] != MAGIC {
        return Err(StoreError::Magic);
    }
    if content[4] != VERSION {
        return Err(StoreError::Version(content[4]));
    }
    read_u64_le(&content[5..]).ok_or(StoreError::Malformed)
}

/// Best score persisted at a fixed path.
#[derive(Debug, Clone)]
pub struct BestScoreStore {
    path: PathBuf,
}

impl BestScoreStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path { &self.path }

    /// Read the stored best. A missing file means no game has been played yet.
    pub fn load(&self) -> Result<Score, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => decode(&bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no best-score record at {}", self.path.display());
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the record, going through a sibling temp file and a rename.
    pub fn save(&self, best: Score) -> Result<(), StoreError> {
        let mut tmp_name = self.path.clone().into_os_string();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&encode(best))?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        info!("saved best score {} to {}", best, self.path.display());
        Ok(())
    }

    /// Save `score` if it beats the stored best. Returns the effective best.
    pub fn record(&self, score: Score) -> Result<Score, StoreError> {
        let best = self.load()?;
        if score > best {
            self.save(score)?;
            Ok(score)
        } else {
            Ok(best)
        }
    }
}
