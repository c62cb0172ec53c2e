//! # Bar Construction
//!
//! Builds the bar array from the score settings and synthesizes the default bars
//! the bar editor needs when it extends or resets the array.
//!
//! ## Progression Syntax
//! - Chords are separated by whitespace.
//! - `|` separates bars; chords inside one bar are spread evenly over its beats
//!   (on sixteenth slots when there are more chords than beats).
//! - Without any `|`, every chord fills one bar.
//!
//! ```text
//! "C G Am F"          → 4 bars, one chord each
//! "| C G | Am | F |"  → 3 bars, the first one changes chord on beat 3 (in 4/4)
//! ```
//!
//! ## Rhythm Validation
//! A bar rhythm is valid when every token parses and the total duration equals
//! the time signature numerator (in quarter beats). Anything else is replaced
//! by one quarter note per beat. There is no per-token repair.

use tracing::warn;

use crate::config::ScoreSettings;
use crate::model::{
    rhythm_duration, rhythm_to_strings, Bar, ChordLayout, Division, RhythmToken, TimeSignature,
    MAX_SUBDIV,
};

/// Floating point tolerance when comparing bar durations
const DURATION_TOLERANCE: f64 = 0.001;

/// Everything needed to synthesize bars for one score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreData {
    time_signature: TimeSignature,
    progression: Vec<Vec<String>>,
    rhythm_template: Vec<RhythmToken>,
    measures: Option<usize>,
}

impl ScoreData {
    pub fn new(
        time_signature: TimeSignature,
        progression: &str,
        rhythm_pattern: &[String],
        measures: Option<usize>,
    ) -> Self {
        let beat_count = time_signature.beat_count();
        let rhythm_template = validate_rhythm(rhythm_pattern, beat_count).unwrap_or_else(|| {
            if !rhythm_pattern.is_empty() {
                warn!(
                    pattern = ?rhythm_pattern,
                    "rhythm template does not fill a {} bar, using quarter notes",
                    time_signature
                );
            }
            default_rhythm(beat_count)
        });

        Self {
            time_signature,
            progression: parse_progression(progression),
            rhythm_template,
            measures,
        }
    }

    pub fn from_settings(settings: &ScoreSettings) -> Self {
        Self::new(
            settings.time_signature,
            &settings.progression,
            &settings.rhythm_pattern,
            settings.measures,
        )
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn beat_count(&self) -> usize {
        self.time_signature.beat_count()
    }

    pub fn rhythm_template(&self) -> &[RhythmToken] {
        &self.rhythm_template
    }

    /// Bars in a freshly built score: `measures` if set, else one per progression bar.
    pub fn bar_count(&self) -> usize {
        self.measures.unwrap_or(self.progression.len()).max(1)
    }

    /// Build the full bar array. The progression repeats when `measures` is longer.
    pub fn build_bars(&self) -> Vec<Bar> {
        (0..self.bar_count()).map(|i| self.default_bar(i)).collect()
    }

    /// The bar that belongs at `index` when nothing has been edited.
    pub fn default_bar(&self, index: usize) -> Bar {
        let beat_count = self.beat_count();
        let mut grid = vec![vec![String::new(); MAX_SUBDIV]; beat_count];

        if !self.progression.is_empty() {
            let chords = &self.progression[index % self.progression.len()];
            // Chords sit on beats while they fit, else on sixteenth slots.
            let slots = if chords.len() <= beat_count {
                beat_count
            } else {
                beat_count * MAX_SUBDIV
            };
            let slot_len = beat_count * MAX_SUBDIV / slots;
            for (i, chord) in chords.iter().enumerate() {
                let slot = i * slots / chords.len() * slot_len;
                let cell = &mut grid[slot / MAX_SUBDIV][slot % MAX_SUBDIV];
                if cell.is_empty() {
                    *cell = chord.clone();
                }
            }
        }

        Bar {
            chord: ChordLayout::Grid(grid),
            rhythm: rhythm_to_strings(&self.rhythm_template),
        }
    }

    /// Grow `bars` with default bars until `index` is a valid position.
    pub fn ensure_bar(&self, bars: &mut Vec<Bar>, index: usize) {
        while bars.len() <= index {
            bars.push(self.default_bar(bars.len()));
        }
    }

    /// The rhythm of `bar`, or the default rhythm if it does not fill the bar.
    pub fn bar_rhythm(&self, bar: &Bar) -> Vec<RhythmToken> {
        validate_rhythm(&bar.rhythm, self.beat_count()).unwrap_or_else(|| {
            warn!(rhythm = ?bar.rhythm, "invalid bar rhythm, using quarter notes");
            default_rhythm(self.beat_count())
        })
    }
}

/// Parsed tokens if they fill exactly `beat_count` quarter beats.
pub fn validate_rhythm<S: AsRef<str>>(rhythm: &[S], beat_count: usize) -> Option<Vec<RhythmToken>> {
    let tokens: Vec<RhythmToken> = rhythm
        .iter()
        .map(|t| t.as_ref().parse().ok())
        .collect::<Option<_>>()?;
    let expected = beat_count as f64;
    ((rhythm_duration(&tokens) - expected).abs() < DURATION_TOLERANCE && !tokens.is_empty())
        .then_some(tokens)
}

/// One quarter note per beat
pub fn default_rhythm(beat_count: usize) -> Vec<RhythmToken> {
    vec![RhythmToken::note(Division::Quarter); beat_count]
}

/// Split a progression string into bars of chord labels.
pub fn parse_progression(progression: &str) -> Vec<Vec<String>> {
    if !progression.contains('|') {
        return progression
            .split_whitespace()
            .map(|chord| vec![chord.to_string()])
            .collect();
    }

    progression
        .split('|')
        .map(|bar| bar.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .filter(|bar| !bar.is_empty())
        .collect()
}
