//! # Rhythm Tokens ↔ Beat Patterns
//!
//! The per-bar rhythm editor works on one `BeatDescriptor` per beat slot, while
//! bars are stored as a flat rhythm (`["4", "r8", "t8", ...]`). This module
//! translates between the two.
//!
//! ## Beat Coverage
//! Whole and half notes occupy more than one beat slot. The slots they consume
//! are `BeatSlot::Covered` placeholders: they are never edited on their own and
//! never produce rhythm tokens.
//!
//! ```text
//! rhythm:  ["2",        "8", "r8",  "4"]
//! slots:   [Beat(2 n)] [Covered] [Beat(8 n r)] [Beat(4 n)]
//! ```
//!
//! For every bar, the non-covered slots plus their spans exactly partition
//! `[0, beat_count)`.
//!
//! ## Allowed Divisions
//! - whole note: at least 4 slots left, and never in 2/4 or 3/4
//! - half note: at least 2 slots left
//! - quarter, eighth, sixteenth: always

use serde::{Deserialize, Serialize};

use crate::error::BClickError;
use crate::model::{BeatDescriptor, Division, RhythmKind, RhythmToken, Symbol, TimeSignature};

/// One beat slot of a bar in the editing view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BeatSlot {
    /// An editable beat
    Beat(BeatDescriptor),
    /// Consumed by the whole or half note starting at beat `by`
    Covered { by: usize },
}

impl BeatSlot {
    pub fn descriptor(&self) -> Option<&BeatDescriptor> {
        match self {
            BeatSlot::Beat(descriptor) => Some(descriptor),
            BeatSlot::Covered { .. } => None,
        }
    }

    pub fn is_covered(&self) -> bool {
        matches!(self, BeatSlot::Covered { .. })
    }
}

/// Which divisions a beat position may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DivisionRules {
    pub beat_count: usize,
    pub numerator: u8,
}

impl DivisionRules {
    pub fn new(beat_count: usize, numerator: u8) -> Self {
        Self {
            beat_count,
            numerator,
        }
    }

    pub fn for_time_signature(time_signature: &TimeSignature) -> Self {
        Self::new(time_signature.beat_count(), time_signature.beats)
    }

    /// Divisions offered at `beat_index`, longest first.
    pub fn allowed_at(&self, beat_index: usize) -> Vec<Division> {
        allowed_divisions_for_beat(beat_index, self.beat_count, self.numerator)
    }

    pub fn allows(&self, beat_index: usize, division: Division) -> bool {
        self.allowed_at(beat_index).contains(&division)
    }
}

/// Divisions offered at a beat position.
///
/// # Example
/// ```rust
/// use bclick::{allowed_divisions_for_beat, Division};
///
/// // 3/4: no whole notes anywhere, half notes only with two beats left
/// assert!(!allowed_divisions_for_beat(0, 3, 3).contains(&Division::Whole));
/// assert!(allowed_divisions_for_beat(1, 3, 3).contains(&Division::Half));
/// assert!(!allowed_divisions_for_beat(2, 3, 3).contains(&Division::Half));
/// ```
pub fn allowed_divisions_for_beat(beat_index: usize, beat_count: usize, numerator: u8) -> Vec<Division> {
    let remaining = beat_count.saturating_sub(beat_index);
    let whole_notes_allowed = !matches!(numerator, 2 | 3);

    Division::ALL
        .into_iter()
        .filter(|division| match division {
            Division::Whole => whole_notes_allowed && remaining >= 4,
            Division::Half => remaining >= 2,
            _ => true,
        })
        .collect()
}

/// Map one rhythm token to its pattern symbol at `sub_index`.
fn symbol_for(token: &RhythmToken, sub_index: usize) -> Symbol {
    match token.kind {
        RhythmKind::Rest => Symbol::Rest,
        RhythmKind::Tie if sub_index == 0 => Symbol::TieNote,
        RhythmKind::Tie => Symbol::Tie,
        RhythmKind::Note => Symbol::Note,
    }
}

/// Split a flat rhythm into `beat_count` beat slots.
///
/// The division of each beat comes from the first token at that position; it
/// consumes `pattern_len` tokens and covers `beat_span` slots. Positions without
/// tokens get a default quarter note. A division that does not fit at its
/// position is replaced by the default quarter note.
///
/// # Example
/// ```rust
/// use bclick::{parse_rhythm_to_beat_patterns, BeatSlot, DivisionRules, Symbol};
///
/// let slots = parse_rhythm_to_beat_patterns(&["4", "4", "r4", "4"], &DivisionRules::new(4, 4));
/// assert_eq!(slots.len(), 4);
/// let third = slots[2].descriptor().unwrap();
/// assert_eq!(third.pattern, vec![Symbol::Rest]);
/// ```
pub fn parse_rhythm_to_beat_patterns<S: AsRef<str>>(tokens: &[S], rules: &DivisionRules) -> Vec<BeatSlot> {
    let tokens: Vec<RhythmToken> = tokens.iter().map(|t| RhythmToken::lenient(t.as_ref())).collect();
    let beat_count = rules.beat_count;

    let mut slots = Vec::with_capacity(beat_count);
    let mut token_index = 0;

    while slots.len() < beat_count {
        let beat_index = slots.len();
        let Some(first) = tokens.get(token_index) else {
            slots.push(BeatSlot::Beat(BeatDescriptor::quarter()));
            continue;
        };

        let division = first.division;
        let pattern_len = division.pattern_len();
        let pattern: Vec<Symbol> = tokens
            .iter()
            .skip(token_index)
            .take(pattern_len)
            .enumerate()
            .map(|(i, token)| symbol_for(token, i))
            .collect();
        token_index += pattern_len;

        if !rules.allows(beat_index, division) {
            slots.push(BeatSlot::Beat(BeatDescriptor::quarter()));
            continue;
        }

        slots.push(BeatSlot::Beat(BeatDescriptor::new(division, pattern)));
        let span = division.beat_span().min(beat_count - beat_index);
        for _ in 1..span {
            slots.push(BeatSlot::Covered { by: beat_index });
        }
    }

    slots
}

/// Flatten beat slots back into a bar rhythm. Covered slots contribute nothing.
pub fn flatten_to_rhythm_tokens(slots: &[BeatSlot]) -> Vec<RhythmToken> {
    let mut tokens = Vec::new();
    for descriptor in slots.iter().filter_map(BeatSlot::descriptor) {
        let descriptor = descriptor.clone().normalized();
        for symbol in &descriptor.pattern {
            tokens.push(match symbol {
                Symbol::Note => RhythmToken::note(descriptor.division),
                Symbol::Rest => RhythmToken::rest(descriptor.division),
                Symbol::TieNote | Symbol::Tie => RhythmToken::tie(descriptor.division),
            });
        }
    }
    tokens
}

/// Editing state for the rhythm of one bar.
///
/// Every mutation keeps the coverage invariant: after `set_division`, the slots
/// a long note consumes are covered and slots released by a shorter note come
/// back as quarter notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureRhythm {
    rules: DivisionRules,
    slots: Vec<BeatSlot>,
}

impl MeasureRhythm {
    pub fn from_rhythm<S: AsRef<str>>(tokens: &[S], rules: DivisionRules) -> Self {
        Self {
            slots: parse_rhythm_to_beat_patterns(tokens, &rules),
            rules,
        }
    }

    pub fn slots(&self) -> &[BeatSlot] {
        &self.slots
    }

    pub fn beat_count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_covered(&self, beat: usize) -> bool {
        self.slots.get(beat).is_some_and(BeatSlot::is_covered)
    }

    pub fn descriptor(&self, beat: usize) -> Option<&BeatDescriptor> {
        self.slots.get(beat).and_then(BeatSlot::descriptor)
    }

    /// Divisions the UI may offer at `beat`; empty for covered beats.
    pub fn allowed_divisions(&self, beat: usize) -> Vec<Division> {
        if self.is_covered(beat) {
            return Vec::new();
        }
        self.rules.allowed_at(beat)
    }

    /// Change the division of a beat, keeping its first symbol.
    pub fn set_division(&mut self, beat: usize, division: Division) -> Result<(), BClickError> {
        let current = self.editable(beat)?.clone();
        if !self.rules.allows(beat, division) {
            return Err(BClickError::DivisionNotAllowed {
                beat,
                division: division.value(),
            });
        }

        let first = current.pattern.first().copied().unwrap_or_default();
        self.slots[beat] = BeatSlot::Beat(BeatDescriptor::new(division, vec![first]));

        // Release whatever the old note covered, then let the walk re-cover.
        for j in (beat + 1)..(beat + current.beat_span()).min(self.slots.len()) {
            self.slots[j] = BeatSlot::Beat(BeatDescriptor::quarter());
        }
        for j in (beat + 1)..(beat + division.beat_span()).min(self.slots.len()) {
            self.slots[j] = BeatSlot::Covered { by: beat };
        }
        self.repair_coverage();
        Ok(())
    }

    /// Replace one symbol of a beat pattern.
    pub fn set_symbol(&mut self, beat: usize, index: usize, symbol: Symbol) -> Result<(), BClickError> {
        let current = self.editable(beat)?;
        if index >= current.pattern.len() {
            return Err(BClickError::SymbolOutOfRange { beat, index });
        }
        let division = current.division;
        let mut pattern = current.pattern.clone();
        pattern[index] = symbol;
        self.slots[beat] = BeatSlot::Beat(BeatDescriptor::new(division, pattern));
        Ok(())
    }

    pub fn to_rhythm(&self) -> Vec<RhythmToken> {
        flatten_to_rhythm_tokens(&self.slots)
    }

    fn editable(&self, beat: usize) -> Result<&BeatDescriptor, BClickError> {
        match self.slots.get(beat) {
            None => Err(BClickError::BeatOutOfRange {
                beat,
                beat_count: self.slots.len(),
            }),
            Some(BeatSlot::Covered { .. }) => Err(BClickError::CoveredBeat { beat }),
            Some(BeatSlot::Beat(descriptor)) => Ok(descriptor),
        }
    }

    /// Walk the slots and rebuild coverage from the beats, turning orphaned
    /// placeholders back into quarter notes.
    fn repair_coverage(&mut self) {
        let mut i = 0;
        while i < self.slots.len() {
            match self.slots[i].descriptor().map(BeatDescriptor::beat_span) {
                Some(span) => {
                    let end = (i + span).min(self.slots.len());
                    for j in (i + 1)..end {
                        self.slots[j] = BeatSlot::Covered { by: i };
                    }
                    i = end;
                }
                None => {
                    self.slots[i] = BeatSlot::Beat(BeatDescriptor::quarter());
                    i += 1;
                }
            }
        }
    }
}
