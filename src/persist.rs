//! Persistence seam — remembers the last-loaded score so a session can
//! resume it. Strictly best-effort: a quota or availability failure is a
//! warning, never an error that blocks playback.

use crate::error::StorageWarning;

/// Store for the raw bytes of the most recently loaded score.
pub trait ScoreStore {
    /// Persist `bytes` under `name`, replacing any previous entry.
    fn store(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageWarning>;

    /// The last stored entry, if any.
    fn retrieve(&self) -> Option<(String, Vec<u8>)>;
}

/// In-memory reference implementation with a byte quota, mirroring the
/// size limits of browser- or mobile-side storage backends.
#[derive(Debug)]
pub struct MemoryStore {
    quota_bytes: usize,
    entry: Option<(String, Vec<u8>)>,
}

impl MemoryStore {
    pub fn new(quota_bytes: usize) -> Self {
        Self {
            quota_bytes,
            entry: None,
        }
    }
}

impl ScoreStore for MemoryStore {
    fn store(&mut self, name: &str, bytes: &[u8]) -> Result<(), StorageWarning> {
        if bytes.len() > self.quota_bytes {
            return Err(StorageWarning::QuotaExceeded {
                name: name.to_string(),
                size: bytes.len(),
                quota: self.quota_bytes,
            });
        }
        self.entry = Some((name.to_string(), bytes.to_vec()));
        Ok(())
    }

    fn retrieve(&self) -> Option<(String, Vec<u8>)> {
        self.entry.clone()
    }
}
