//! Error taxonomy for score loading and playback.
//!
//! Only `ParseError` is fatal, and only to the load attempt that produced
//! it. The warning types describe degradations the engine keeps playing
//! through; callers log them and continue.

use thiserror::Error;

/// The score bytes could not be turned into a [`crate::Score`].
#[derive(Error, Debug)]
pub enum ParseError {
    /// The bytes are not a valid Standard MIDI File container.
    #[error("not a valid MIDI file: {0}")]
    InvalidContainer(#[from] midly::Error),

    /// The container parsed but holds no tracks to play.
    #[error("MIDI file contains no tracks")]
    NoTracks,

    /// The file could not be read from disk.
    #[error("failed to read score file: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence failed; the last-used file simply will not be remembered.
#[derive(Error, Debug)]
pub enum StorageWarning {
    /// The payload exceeds the store's quota.
    #[error("storage quota exceeded while saving '{name}' ({size} bytes over {quota})")]
    QuotaExceeded {
        name: String,
        size: usize,
        quota: usize,
    },

    /// The backing store is not usable at all right now.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// An instrument loaded with gaps; the affected pitches stay silent.
///
/// This is the host's half of the [`crate::Instrument`] contract: sample
/// loading happens behind that seam, and implementations report partial
/// failures with this type (typically via `log::warn!`) instead of
/// blocking playback. The library defines the vocabulary so hosts degrade
/// consistently; it never constructs these itself.
#[derive(Error, Debug)]
pub enum InstrumentWarning {
    #[error("sample for '{0}' failed to load; the pitch will not sound")]
    MissingSample(String),
}
