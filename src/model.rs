//! # Data Model
//!
//! Types shared by every stage of the rhythm core.
//!
//! ## Type Hierarchy
//! ```text
//! Bar (persisted)
//!   ├── chord: ChordLayout (Single | PerBeat | Grid)
//!   └── rhythm: Vec<String>      e.g. ["4", "r8", "t8", "16", ...]
//!
//! BeatDescriptor (per-beat editing unit)
//!   ├── division: Division       1 | 2 | 4 | 8 | 16
//!   └── pattern: Vec<Symbol>     note | rest | tieNote | tie
//!
//! NotationToken (transient, per beat)
//!   └── kind, length (16ths), tie_from_prev, tie_to_next
//! ```
//!
//! ## Key Concepts
//!
//! ### Division
//! The note-value denominator on a quarter-note beat grid. Whole and half notes
//! span 4 and 2 beat slots; quarter, eighth and sixteenth fit in one slot and
//! carry 1, 2 and 4 pattern symbols.
//!
//! ### Durations
//! - Rhythm tokens are measured in quarter beats: `16` = 0.25, `8` = 0.5, `4` = 1,
//!   `2` = 2, `1` = 4.
//! - Notation tokens are measured in sixteenths: one beat = 4.
//!
//! ### Chords
//! Chord labels are stored per beat in `MAX_SUBDIV` slots so a chord can change
//! on any sixteenth. Older data stored one label per beat (or a single label for
//! the whole bar); both shapes are accepted and normalized to the grid.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BClickError;

/// Chord label slots per beat (one per sixteenth).
pub const MAX_SUBDIV: usize = 4;

/// Sixteenth notes in one quarter-note beat.
pub const SIXTEENTHS_PER_BEAT: u32 = 4;

/// Time signature (e.g., 4/4, 3/4, 6/8)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSignature {
    pub beats: u8,
    pub beat_type: u8,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

impl TimeSignature {
    pub fn new(beats: u8, beat_type: u8) -> Result<Self, BClickError> {
        if !(1..=16).contains(&beats) || !matches!(beat_type, 2 | 4 | 8 | 16) {
            return Err(BClickError::InvalidTimeSignature(format!(
                "{}/{}",
                beats, beat_type
            )));
        }
        Ok(Self { beats, beat_type })
    }

    /// Number of beat slots in one bar.
    pub fn beat_count(&self) -> usize {
        self.beats as usize
    }

    /// Whole notes are a product rule: never offered in 2/4 and 3/4.
    pub fn allows_whole_notes(&self) -> bool {
        !matches!(self.beats, 2 | 3)
    }
}

impl FromStr for TimeSignature {
    type Err = BClickError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BClickError::InvalidTimeSignature(s.to_string());
        let (beats, beat_type) = s.trim().split_once('/').ok_or_else(invalid)?;
        let beats = beats.trim().parse::<u8>().map_err(|_| invalid())?;
        let beat_type = beat_type.trim().parse::<u8>().map_err(|_| invalid())?;
        Self::new(beats, beat_type).map_err(|_| invalid())
    }
}

impl TryFrom<String> for TimeSignature {
    type Error = BClickError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeSignature> for String {
    fn from(ts: TimeSignature) -> Self {
        ts.to_string()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.beat_type)
    }
}

/// Note value of a beat descriptor or rhythm token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum Division {
    Whole,
    Half,
    #[default]
    Quarter,
    Eighth,
    Sixteenth,
}

impl Division {
    pub const ALL: [Division; 5] = [
        Division::Whole,
        Division::Half,
        Division::Quarter,
        Division::Eighth,
        Division::Sixteenth,
    ];

    /// Denominator as written in rhythm tokens (1, 2, 4, 8, 16)
    pub fn value(self) -> u8 {
        match self {
            Division::Whole => 1,
            Division::Half => 2,
            Division::Quarter => 4,
            Division::Eighth => 8,
            Division::Sixteenth => 16,
        }
    }

    /// Strict lookup by denominator
    pub fn from_value(value: u8) -> Option<Self> {
        match value {
            1 => Some(Division::Whole),
            2 => Some(Division::Half),
            4 => Some(Division::Quarter),
            8 => Some(Division::Eighth),
            16 => Some(Division::Sixteenth),
            _ => None,
        }
    }

    /// Division named by the numeric suffix of a rhythm token; quarter if unrecognized.
    pub fn from_suffix(token: &str) -> Self {
        let digits = token.trim_start_matches(|c: char| !c.is_ascii_digit());
        digits
            .parse::<u8>()
            .ok()
            .and_then(Self::from_value)
            .unwrap_or_default()
    }

    /// Symbols in a beat descriptor of this division
    pub fn pattern_len(self) -> usize {
        match self {
            Division::Sixteenth => 4,
            Division::Eighth => 2,
            _ => 1,
        }
    }

    /// Beat slots covered by one descriptor of this division
    pub fn beat_span(self) -> usize {
        match self {
            Division::Whole => 4,
            Division::Half => 2,
            _ => 1,
        }
    }

    /// Length of one symbol in sixteenths
    pub fn unit(self) -> u32 {
        16 / self.value() as u32
    }

    /// Length of one symbol in quarter beats
    pub fn quarter_beats(self) -> f64 {
        4.0 / self.value() as f64
    }
}

impl From<u8> for Division {
    fn from(value: u8) -> Self {
        Self::from_value(value).unwrap_or_default()
    }
}

impl From<Division> for u8 {
    fn from(division: Division) -> Self {
        division.value()
    }
}

/// One symbol of a beat pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Symbol {
    #[default]
    Note,
    Rest,
    /// Continues the previous beat's note (index 0 only)
    TieNote,
    /// Extends the previous sub-symbol's note (index > 0 only)
    Tie,
}

impl Symbol {
    pub fn as_str(self) -> &'static str {
        match self {
            Symbol::Note => "note",
            Symbol::Rest => "rest",
            Symbol::TieNote => "tieNote",
            Symbol::Tie => "tie",
        }
    }

    pub fn is_tie(self) -> bool {
        matches!(self, Symbol::Tie | Symbol::TieNote)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        match s {
            "rest" => Symbol::Rest,
            "tieNote" => Symbol::TieNote,
            "tie" => Symbol::Tie,
            _ => Symbol::Note,
        }
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol::from(s.as_str())
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.as_str().to_string()
    }
}

/// Per-beat editing unit: a division plus its fixed-length symbol pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatDescriptor {
    pub division: Division,
    pub pattern: Vec<Symbol>,
}

impl Default for BeatDescriptor {
    fn default() -> Self {
        Self::quarter()
    }
}

impl BeatDescriptor {
    /// Build a normalized descriptor.
    pub fn new(division: Division, pattern: Vec<Symbol>) -> Self {
        Self { division, pattern }.normalized()
    }

    /// The default beat: one quarter note.
    pub fn quarter() -> Self {
        Self {
            division: Division::Quarter,
            pattern: vec![Symbol::Note],
        }
    }

    /// Fix the pattern length and tie placement.
    ///
    /// Short patterns are padded with notes and long ones truncated; `tie` at
    /// index 0 becomes `note`, `tieNote` past index 0 becomes `tie`.
    pub fn normalized(mut self) -> Self {
        self.pattern.resize(self.division.pattern_len(), Symbol::Note);
        for (i, symbol) in self.pattern.iter_mut().enumerate() {
            match *symbol {
                Symbol::Tie if i == 0 => *symbol = Symbol::Note,
                Symbol::TieNote if i > 0 => *symbol = Symbol::Tie,
                _ => {}
            }
        }
        self
    }

    /// Beat slots this descriptor occupies
    pub fn beat_span(&self) -> usize {
        self.division.beat_span()
    }

    /// Total length in sixteenths
    pub fn sixteenths(&self) -> u32 {
        self.division.unit() * self.division.pattern_len() as u32
    }
}

/// Whether a notation token sounds or rests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Note,
    Rest,
}

/// Renderer-facing token produced for one beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotationToken {
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Length in sixteenths
    pub length: u32,
    pub tie_from_prev: bool,
    pub tie_to_next: bool,
}

impl NotationToken {
    pub fn note(length: u32) -> Self {
        Self {
            kind: TokenKind::Note,
            length,
            tie_from_prev: false,
            tie_to_next: false,
        }
    }

    pub fn rest(length: u32) -> Self {
        Self {
            kind: TokenKind::Rest,
            ..Self::note(length)
        }
    }

    /// A note that continues the previous one
    pub fn tied_note(length: u32) -> Self {
        Self {
            tie_from_prev: true,
            ..Self::note(length)
        }
    }

    pub fn is_rest(&self) -> bool {
        self.kind == TokenKind::Rest
    }
}

/// How a rhythm token starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RhythmKind {
    Note,
    Rest,
    /// Continues the previous note without a new attack
    Tie,
}

/// One entry of a bar's flat rhythm, e.g. `"8"`, `"r4"`, `"t16"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RhythmToken {
    pub kind: RhythmKind,
    pub division: Division,
}

impl RhythmToken {
    pub fn note(division: Division) -> Self {
        Self {
            kind: RhythmKind::Note,
            division,
        }
    }

    pub fn rest(division: Division) -> Self {
        Self {
            kind: RhythmKind::Rest,
            division,
        }
    }

    pub fn tie(division: Division) -> Self {
        Self {
            kind: RhythmKind::Tie,
            division,
        }
    }

    /// Forgiving parse: the prefix picks the kind and an unknown suffix reads as a quarter.
    pub fn lenient(token: &str) -> Self {
        let token = token.trim();
        let kind = match token.chars().next() {
            Some('r') => RhythmKind::Rest,
            Some('t') => RhythmKind::Tie,
            _ => RhythmKind::Note,
        };
        Self {
            kind,
            division: Division::from_suffix(token),
        }
    }

    /// Duration in quarter beats
    pub fn quarter_beats(&self) -> f64 {
        self.division.quarter_beats()
    }

    /// Duration in sixteenths
    pub fn sixteenths(&self) -> u32 {
        self.division.unit()
    }
}

impl FromStr for RhythmToken {
    type Err = BClickError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, digits) = match s.as_bytes().first() {
            Some(b'r') => (RhythmKind::Rest, &s[1..]),
            Some(b't') => (RhythmKind::Tie, &s[1..]),
            _ => (RhythmKind::Note, s),
        };
        let division = digits
            .parse::<u8>()
            .ok()
            .and_then(Division::from_value)
            .ok_or_else(|| BClickError::InvalidRhythmToken(s.to_string()))?;
        Ok(Self { kind, division })
    }
}

impl fmt::Display for RhythmToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            RhythmKind::Note => "",
            RhythmKind::Rest => "r",
            RhythmKind::Tie => "t",
        };
        write!(f, "{}{}", prefix, self.division.value())
    }
}

/// Sum of token durations in quarter beats
pub fn rhythm_duration(tokens: &[RhythmToken]) -> f64 {
    tokens.iter().map(RhythmToken::quarter_beats).sum()
}

/// Render tokens back to their persisted string form
pub fn rhythm_to_strings(tokens: &[RhythmToken]) -> Vec<String> {
    tokens.iter().map(ToString::to_string).collect()
}

/// Chord labels of one bar in any of the persisted shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChordLayout {
    /// One label for the whole bar, placed on beat 0
    Single(String),
    /// One label per beat
    PerBeat(Vec<String>),
    /// `MAX_SUBDIV` label slots per beat
    Grid(Vec<Vec<String>>),
}

impl Default for ChordLayout {
    fn default() -> Self {
        ChordLayout::Grid(Vec::new())
    }
}

impl ChordLayout {
    /// Normalize to exactly `beat_count` rows of `MAX_SUBDIV` slots.
    pub fn to_grid(&self, beat_count: usize) -> Vec<Vec<String>> {
        let mut grid = vec![vec![String::new(); MAX_SUBDIV]; beat_count];
        match self {
            ChordLayout::Single(label) => {
                if let Some(row) = grid.first_mut() {
                    row[0] = label.clone();
                }
            }
            ChordLayout::PerBeat(labels) => {
                for (row, label) in grid.iter_mut().zip(labels) {
                    row[0] = label.clone();
                }
            }
            ChordLayout::Grid(rows) => {
                for (row, source) in grid.iter_mut().zip(rows) {
                    for (slot, label) in row.iter_mut().zip(source) {
                        *slot = label.clone();
                    }
                }
            }
        }
        grid
    }

    /// First non-empty label, if any
    pub fn first_label(&self) -> Option<&str> {
        match self {
            ChordLayout::Single(label) => Some(label.as_str()).filter(|l| !l.is_empty()),
            ChordLayout::PerBeat(labels) => {
                labels.iter().map(String::as_str).find(|l| !l.is_empty())
            }
            ChordLayout::Grid(rows) => rows
                .iter()
                .flatten()
                .map(String::as_str)
                .find(|l| !l.is_empty()),
        }
    }
}

/// One bar of the score as persisted by the settings store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    #[serde(default)]
    pub chord: ChordLayout,
    #[serde(default)]
    pub rhythm: Vec<String>,
}

impl Bar {
    /// Strictly parsed rhythm tokens, or `None` if any token is malformed.
    pub fn rhythm_tokens(&self) -> Option<Vec<RhythmToken>> {
        self.rhythm.iter().map(|t| t.parse().ok()).collect()
    }

    /// Copy of this bar with the chord grid normalized to `beat_count` beats.
    pub fn normalized(&self, beat_count: usize) -> Bar {
        Bar {
            chord: ChordLayout::Grid(self.chord.to_grid(beat_count)),
            rhythm: self.rhythm.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_signature_parse() {
        let ts: TimeSignature = "3/4".parse().unwrap();
        assert_eq!(ts.beats, 3);
        assert_eq!(ts.beat_type, 4);
        assert!(!ts.allows_whole_notes());
        assert!("4/4".parse::<TimeSignature>().unwrap().allows_whole_notes());
        assert!("2/4".parse::<TimeSignature>().map(|t| !t.allows_whole_notes()).unwrap());
    }

    #[test]
    fn test_time_signature_rejects_garbage() {
        assert!("4".parse::<TimeSignature>().is_err());
        assert!("4/5".parse::<TimeSignature>().is_err());
        assert!("0/4".parse::<TimeSignature>().is_err());
        assert!("x/4".parse::<TimeSignature>().is_err());
    }

    #[test]
    fn test_division_from_suffix() {
        assert_eq!(Division::from_suffix("16"), Division::Sixteenth);
        assert_eq!(Division::from_suffix("r8"), Division::Eighth);
        assert_eq!(Division::from_suffix("t2"), Division::Half);
        assert_eq!(Division::from_suffix("1"), Division::Whole);
        assert_eq!(Division::from_suffix("r3"), Division::Quarter);
        assert_eq!(Division::from_suffix("?"), Division::Quarter);
    }

    #[test]
    fn test_division_shapes() {
        assert_eq!(Division::Whole.beat_span(), 4);
        assert_eq!(Division::Half.beat_span(), 2);
        assert_eq!(Division::Eighth.beat_span(), 1);
        assert_eq!(Division::Sixteenth.pattern_len(), 4);
        assert_eq!(Division::Eighth.pattern_len(), 2);
        assert_eq!(Division::Whole.pattern_len(), 1);
        assert_eq!(Division::Whole.unit(), 16);
        assert_eq!(Division::Sixteenth.unit(), 1);
    }

    #[test]
    fn test_descriptor_normalization() {
        let d = BeatDescriptor::new(Division::Sixteenth, vec![Symbol::Tie, Symbol::TieNote]);
        assert_eq!(
            d.pattern,
            vec![Symbol::Note, Symbol::Tie, Symbol::Note, Symbol::Note]
        );

        let d = BeatDescriptor::new(Division::Quarter, vec![Symbol::Rest, Symbol::Note]);
        assert_eq!(d.pattern, vec![Symbol::Rest]);
    }

    #[test]
    fn test_descriptor_json_defaults_unknown_values() {
        let d: BeatDescriptor =
            serde_json::from_str(r#"{"division": 3, "pattern": ["bogus"]}"#).unwrap();
        assert_eq!(d.normalized(), BeatDescriptor::quarter());

        let d: BeatDescriptor =
            serde_json::from_str(r#"{"division": 8, "pattern": ["tieNote", "rest"]}"#).unwrap();
        assert_eq!(d.pattern, vec![Symbol::TieNote, Symbol::Rest]);
        assert_eq!(
            serde_json::to_string(&d).unwrap(),
            r#"{"division":8,"pattern":["tieNote","rest"]}"#
        );
    }

    #[test]
    fn test_rhythm_token_parse() {
        assert_eq!("r8".parse::<RhythmToken>().unwrap(), RhythmToken::rest(Division::Eighth));
        assert_eq!("t16".parse::<RhythmToken>().unwrap(), RhythmToken::tie(Division::Sixteenth));
        assert_eq!("1".parse::<RhythmToken>().unwrap(), RhythmToken::note(Division::Whole));
        assert!("r5".parse::<RhythmToken>().is_err());
        assert!("".parse::<RhythmToken>().is_err());
        assert_eq!(RhythmToken::lenient("x"), RhythmToken::note(Division::Quarter));
        assert_eq!(RhythmToken::tie(Division::Half).to_string(), "t2");
    }

    #[test]
    fn test_rhythm_duration() {
        let tokens: Vec<RhythmToken> = ["8", "r8", "2", "t16", "16", "r8"]
            .iter()
            .map(|t| t.parse().unwrap())
            .collect();
        assert_eq!(rhythm_duration(&tokens), 4.0);
    }

    #[test]
    fn test_chord_layouts_normalize_to_grid() {
        let single: ChordLayout = serde_json::from_str(r#""Am7""#).unwrap();
        let grid = single.to_grid(3);
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[0], vec!["Am7", "", "", ""]);
        assert_eq!(grid[1], vec!["", "", "", ""]);

        let per_beat: ChordLayout = serde_json::from_str(r#"["C", "", "G", "F", "extra"]"#).unwrap();
        assert!(matches!(per_beat, ChordLayout::PerBeat(_)));
        let grid = per_beat.to_grid(4);
        assert_eq!(grid.len(), 4);
        assert_eq!(grid[2][0], "G");
        assert_eq!(grid[3][0], "F");

        let nested: ChordLayout = serde_json::from_str(r#"[["C", "", "D"], ["E"]]"#).unwrap();
        assert!(matches!(nested, ChordLayout::Grid(_)));
        let grid = nested.to_grid(2);
        assert_eq!(grid[0], vec!["C", "", "D", ""]);
        assert_eq!(grid[1], vec!["E", "", "", ""]);
    }

    #[test]
    fn test_bar_rhythm_tokens_strict() {
        let bar = Bar {
            chord: ChordLayout::default(),
            rhythm: vec!["4".into(), "r4".into()],
        };
        assert_eq!(bar.rhythm_tokens().map(|t| t.len()), Some(2));

        let broken = Bar {
            chord: ChordLayout::default(),
            rhythm: vec!["4".into(), "q".into()],
        };
        assert!(broken.rhythm_tokens().is_none());
    }
}
