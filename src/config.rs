//! # Score Settings
//!
//! Loads the score-wide settings (tempo, clicks, count-in, time signature,
//! layout, progression, rhythm template, optional saved bars) from YAML or JSON.
//!
//! Files are read in two steps: serde fills a `RawSettings` where every field is
//! optional, then `ScoreSettings::from_raw` applies defaults and range checks.
//!
//! ## Example
//! ```rust
//! use bclick::ScoreSettings;
//!
//! let settings = ScoreSettings::from_yaml(r#"
//! tempo: 96
//! timeSignature: 3/4
//! progression: "| C | G | Am F |"
//! rhythmPattern: ["4", "8", "8", "4"]
//! "#)?;
//! assert_eq!(settings.tempo, 96);
//! assert_eq!(settings.time_signature.beats, 3);
//! # Ok::<(), bclick::BClickError>(())
//! ```

use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BClickError;
use crate::model::{Bar, TimeSignature};

const TEMPO_RANGE: RangeInclusive<u32> = 20..=400;
const CLICKS_RANGE: RangeInclusive<u32> = 1..=64;
const COUNT_IN_RANGE: RangeInclusive<u32> = 0..=8;
const BARS_PER_ROW_RANGE: RangeInclusive<u32> = 1..=8;
const MEASURES_RANGE: RangeInclusive<usize> = 1..=512;

/// Settings as written by the settings store, all optional
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawSettings {
    pub tempo: Option<u32>,
    pub clicks: Option<u32>,
    pub count_in: Option<u32>,
    pub time_signature: Option<String>,
    pub bars_per_row: Option<u32>,
    pub measures: Option<usize>,
    pub progression: Option<String>,
    pub rhythm_pattern: Option<Vec<String>>,
    pub bars: Option<Vec<Bar>>,
}

/// Validated score-wide settings
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSettings {
    /// Beats per minute (quarter note)
    pub tempo: u32,
    /// Clicks per bar played by the metronome
    pub clicks: u32,
    /// Count-in bars before the score starts
    pub count_in: u32,
    pub time_signature: TimeSignature,
    /// Layout hint for the renderer
    pub bars_per_row: u32,
    /// Bar count; defaults to one bar per progression bar
    pub measures: Option<usize>,
    pub progression: String,
    /// Rhythm tokens used for every synthesized bar
    pub rhythm_pattern: Vec<String>,
    /// Saved bars, when the user has edited the score
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bars: Option<Vec<Bar>>,
}

impl Default for ScoreSettings {
    fn default() -> Self {
        Self {
            tempo: 120,
            clicks: 4,
            count_in: 1,
            time_signature: TimeSignature::default(),
            bars_per_row: 4,
            measures: None,
            progression: String::new(),
            rhythm_pattern: Vec::new(),
            bars: None,
        }
    }
}

impl ScoreSettings {
    pub fn from_yaml(source: &str) -> Result<Self, BClickError> {
        if source.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: RawSettings = serde_yaml::from_str(source)?;
        Self::from_raw(raw)
    }

    pub fn from_json(source: &str) -> Result<Self, BClickError> {
        let raw: RawSettings = serde_json::from_str(source)?;
        Self::from_raw(raw)
    }

    /// Load a settings file; `.json` files are read as JSON, anything else as YAML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BClickError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&source),
            _ => Self::from_yaml(&source),
        }
    }

    pub fn from_raw(raw: RawSettings) -> Result<Self, BClickError> {
        let defaults = Self::default();

        let time_signature = match raw.time_signature.as_deref() {
            Some(ts) => ts.parse()?,
            None => defaults.time_signature,
        };

        Ok(Self {
            tempo: in_range("tempo", raw.tempo.unwrap_or(defaults.tempo), TEMPO_RANGE)?,
            clicks: in_range("clicks", raw.clicks.unwrap_or(defaults.clicks), CLICKS_RANGE)?,
            count_in: in_range(
                "countIn",
                raw.count_in.unwrap_or(defaults.count_in),
                COUNT_IN_RANGE,
            )?,
            time_signature,
            bars_per_row: in_range(
                "barsPerRow",
                raw.bars_per_row.unwrap_or(defaults.bars_per_row),
                BARS_PER_ROW_RANGE,
            )?,
            measures: raw
                .measures
                .map(|measures| in_range("measures", measures, MEASURES_RANGE))
                .transpose()?,
            progression: raw.progression.unwrap_or_default(),
            rhythm_pattern: raw.rhythm_pattern.unwrap_or_default(),
            bars: raw.bars,
        })
    }

    pub fn to_json(&self) -> Result<String, BClickError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn in_range<T: PartialOrd + Display + Copy>(
    name: &str,
    value: T,
    range: RangeInclusive<T>,
) -> Result<T, BClickError> {
    if !range.contains(&value) {
        return Err(BClickError::InvalidSetting(format!(
            "{} must be between {} and {}, got {}",
            name,
            range.start(),
            range.end(),
            value
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChordLayout;

    #[test]
    fn test_defaults_for_empty_source() {
        assert_eq!(ScoreSettings::from_yaml("").unwrap(), ScoreSettings::default());
        assert_eq!(ScoreSettings::from_json("{}").unwrap(), ScoreSettings::default());
    }

    #[test]
    fn test_yaml_settings() {
        let settings = ScoreSettings::from_yaml(
            "tempo: 90\nclicks: 3\ncountIn: 2\ntimeSignature: 3/4\nbarsPerRow: 2\nmeasures: 8\nprogression: C G\n",
        )
        .unwrap();
        assert_eq!(settings.tempo, 90);
        assert_eq!(settings.clicks, 3);
        assert_eq!(settings.count_in, 2);
        assert_eq!(settings.time_signature, TimeSignature { beats: 3, beat_type: 4 });
        assert_eq!(settings.bars_per_row, 2);
        assert_eq!(settings.measures, Some(8));
        assert_eq!(settings.progression, "C G");
    }

    #[test]
    fn test_json_settings_with_bars() {
        let settings = ScoreSettings::from_json(
            r#"{
                "timeSignature": "4/4",
                "bars": [
                    {"chord": ["C", "", "G", ""], "rhythm": ["4", "4", "4", "4"]},
                    {"chord": [["Am", "", "D", ""], ["", "", "", ""]], "rhythm": ["2", "2"]}
                ]
            }"#,
        )
        .unwrap();
        let bars = settings.bars.unwrap();
        assert_eq!(bars.len(), 2);
        assert!(matches!(bars[0].chord, ChordLayout::PerBeat(_)));
        assert!(matches!(bars[1].chord, ChordLayout::Grid(_)));
    }

    #[test]
    fn test_invalid_time_signature() {
        let err = ScoreSettings::from_yaml("timeSignature: 4/3").unwrap_err();
        assert!(matches!(err, BClickError::InvalidTimeSignature(_)));
    }

    #[test]
    fn test_out_of_range_setting() {
        let err = ScoreSettings::from_yaml("tempo: 1000").unwrap_err();
        match err {
            BClickError::InvalidSetting(message) => assert!(message.contains("tempo")),
            other => panic!("Expected InvalidSetting but got: {:?}", other),
        }
    }

    #[test]
    fn test_measures_out_of_range() {
        for yaml in ["measures: 100000", "measures: 0"] {
            match ScoreSettings::from_yaml(yaml).unwrap_err() {
                BClickError::InvalidSetting(message) => assert!(message.contains("measures")),
                other => panic!("Expected InvalidSetting but got: {:?}", other),
            }
        }
        let settings = ScoreSettings::from_yaml("measures: 512").unwrap();
        assert_eq!(settings.measures, Some(512));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = ScoreSettings::from_yaml("tempo: [fast").unwrap_err();
        assert!(matches!(err, BClickError::Config(_)));
    }

    #[test]
    fn test_json_round_trip_keeps_time_signature_string() {
        let settings = ScoreSettings::from_yaml("timeSignature: 2/4").unwrap();
        let json = settings.to_json().unwrap();
        assert!(json.contains(r#""timeSignature": "2/4""#));
        assert_eq!(ScoreSettings::from_json(&json).unwrap(), settings);
    }
}
