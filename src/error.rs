//! # Error Types
//!
//! This module defines all error types for the B.Click rhythm core.
//!
//! Most of the core is deliberately forgiving: malformed beat descriptors are
//! normalized, rhythms with the wrong total duration fall back to a default bar,
//! and out-of-range bar indices auto-extend the bar array. Errors are reserved for
//! settings that cannot be interpreted at all and for explicit edits that would
//! break the beat-coverage invariant of a bar.
//!
//! ## Error Types
//! - `InvalidTimeSignature` - time signature string not in `N/D` form
//! - `InvalidRhythmToken` - strict parse of a rhythm token failed
//! - `DivisionNotAllowed` / `CoveredBeat` / `BeatOutOfRange` / `SymbolOutOfRange` -
//!   rejected edits in the per-bar rhythm editor
//! - `InvalidSetting` - a score setting is out of range
//! - `Config` / `Json` / `Io` - loading settings files
//!
//! ## Usage
//! ```rust
//! use bclick::{BClickError, ScoreSettings};
//!
//! match ScoreSettings::from_yaml("timeSignature: 5/3") {
//!     Ok(settings) => println!("{} beats per bar", settings.time_signature.beats),
//!     Err(BClickError::InvalidTimeSignature(raw)) => eprintln!("bad time signature {}", raw),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BClickError {
    /// Time signature that is not `N/D` with N in 1..=16 and D in 2, 4, 8 or 16.
    ///
    /// # Example
    /// ```
    /// # use bclick::BClickError;
    /// let err = BClickError::InvalidTimeSignature("7/5".to_string());
    /// assert_eq!(
    ///     err.to_string(),
    ///     "Invalid time signature '7/5': expected N/D with N in 1..=16 and D in 2, 4, 8 or 16"
    /// );
    /// ```
    #[error("Invalid time signature '{0}': expected N/D with N in 1..=16 and D in 2, 4, 8 or 16")]
    InvalidTimeSignature(String),

    /// Rhythm token that is not one of `1 2 4 8 16`, optionally prefixed with `r` or `t`.
    #[error("Invalid rhythm token '{0}'")]
    InvalidRhythmToken(String),

    /// The division does not fit at this beat position (too few beats left, or
    /// whole notes in 2/4 and 3/4).
    #[error("Division {division} is not allowed at beat {beat}")]
    DivisionNotAllowed { beat: usize, division: u8 },

    /// The beat is consumed by a preceding whole or half note.
    #[error("Beat {beat} is covered by a longer note and cannot be edited")]
    CoveredBeat { beat: usize },

    #[error("Beat {beat} is out of range for a bar of {beat_count} beats")]
    BeatOutOfRange { beat: usize, beat_count: usize },

    #[error("Symbol index {index} is out of range for beat {beat}")]
    SymbolOutOfRange { beat: usize, index: usize },

    /// A score setting is present but out of range.
    ///
    /// # Example
    /// ```
    /// # use bclick::BClickError;
    /// let err = BClickError::InvalidSetting("tempo must be between 20 and 400".to_string());
    /// assert_eq!(err.to_string(), "Invalid setting: tempo must be between 20 and 400");
    /// ```
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Invalid settings file: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
