//! # alphaTex Output
//!
//! Serializes bars into the alphaTex markup consumed by the notation renderer.
//! Every note is drawn as a slashed `B4` so the score reads as a rhythm chart;
//! chord labels ride on the notes as `ch` effects.
//!
//! A label lands on the first note (or continuation marker) at or after its
//! sixteenth slot, even when that note sits in a later beat.
//!
//! ## Output Shape
//! ```text
//! \tempo 120
//! \defaultSystemsLayout 4
//! .
//! \ts 4 4 B4.4 {slashed ch "C"} B4.8 {slashed} r.8 {slashed} B4.2 {slashed} |
//! - {slashed ch "G"} B4.4 {slashed} B4.2 {slashed}
//! ```
//!
//! ## Ties
//! A `t` token continues the sound before it. It lengthens the previous note
//! (or rest) when the combined length is a single notatable value and no
//! chord label is waiting to be attached. Otherwise a `-` continuation marker
//! is written, carrying the waiting label. A tie at the very start of the
//! score has nothing to continue and is dropped.

use tracing::debug;

use crate::config::ScoreSettings;
use crate::model::{Bar, RhythmKind, TimeSignature, MAX_SUBDIV, SIXTEENTHS_PER_BEAT};
use crate::score_data::ScoreData;

/// Pitch every slashed note is written on
pub const SLASH_PITCH: &str = "B4";

/// Running duration before anything has been written
const INITIAL_DURATION: u8 = 4;

/// Notatable lengths in sixteenths: (length, duration, dotted)
const NOTE_VALUES: [(u32, u8, bool); 8] = [
    (16, 1, false),
    (12, 2, true),
    (8, 2, false),
    (6, 4, true),
    (4, 4, false),
    (3, 8, true),
    (2, 8, false),
    (1, 16, false),
];

/// Everything the markup depends on
#[derive(Debug, Clone)]
pub struct AlphaTexInput<'a> {
    pub time_signature: TimeSignature,
    pub measures: Option<usize>,
    pub bars_per_row: u32,
    pub progression: &'a str,
    pub rhythm_pattern: &'a [String],
    /// Explicit bars; synthesized from the progression when absent
    pub bars: Option<&'a [Bar]>,
    pub tempo: u32,
}

impl<'a> From<&'a ScoreSettings> for AlphaTexInput<'a> {
    fn from(settings: &'a ScoreSettings) -> Self {
        Self {
            time_signature: settings.time_signature,
            measures: settings.measures,
            bars_per_row: settings.bars_per_row,
            progression: &settings.progression,
            rhythm_pattern: &settings.rhythm_pattern,
            bars: settings.bars.as_deref(),
            tempo: settings.tempo,
        }
    }
}

/// Build the alphaTex markup for a whole score.
pub fn build_alpha_tex(input: &AlphaTexInput) -> String {
    let data = ScoreData::new(
        input.time_signature,
        input.progression,
        input.rhythm_pattern,
        input.measures,
    );
    match input.bars {
        Some(bars) if !bars.is_empty() => {
            write_alpha_tex(&data, bars, input.tempo, input.bars_per_row)
        }
        _ => write_alpha_tex(&data, &data.build_bars(), input.tempo, input.bars_per_row),
    }
}

/// Build the markup for bars that are already in memory.
pub fn write_alpha_tex(data: &ScoreData, bars: &[Bar], tempo: u32, bars_per_row: u32) -> String {
    let mut tex = String::new();

    tex.push_str(&format!("\\tempo {}\n", tempo));
    tex.push_str(&format!("\\defaultSystemsLayout {}\n", bars_per_row));
    tex.push_str(".\n");

    let ts = data.time_signature();
    let mut writer = EventWriter::default();
    let rendered: Vec<String> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let events = walk_bar(data, bar, i == 0);
            let body = writer.write_bar(&events);
            if i == 0 {
                format!("\\ts {} {} {}", ts.beats, ts.beat_type, body)
            } else {
                body
            }
        })
        .collect();

    tex.push_str(&rendered.join(" |\n"));
    tex.push('\n');
    tex
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Note { length: u32, chord: Option<String> },
    Rest { length: u32 },
    /// `-` marker continuing the previous sound
    Continuation { length: u32, chord: Option<String> },
}

impl Event {
    fn length_mut(&mut self) -> &mut u32 {
        match self {
            Event::Note { length, .. }
            | Event::Rest { length }
            | Event::Continuation { length, .. } => length,
        }
    }
}

/// Position within one bar while its tokens are walked
struct BarWalk<'a> {
    grid: &'a [Vec<String>],
    beat: usize,
    /// Sixteenths into the current beat
    position: u32,
    /// First chord slot of the bar not yet attached
    chord_cursor: usize,
    events: Vec<Event>,
}

fn walk_bar(data: &ScoreData, bar: &Bar, first_bar: bool) -> Vec<Event> {
    let grid = bar.chord.to_grid(data.beat_count());
    let mut walk = BarWalk {
        grid: &grid,
        beat: 0,
        position: 0,
        chord_cursor: 0,
        events: Vec::new(),
    };

    for token in data.bar_rhythm(bar) {
        let length = token.sixteenths();
        match token.kind {
            RhythmKind::Note => {
                let chord = walk.take_chord();
                walk.events.push(Event::Note { length, chord });
            }
            RhythmKind::Rest => walk.events.push(Event::Rest { length }),
            RhythmKind::Tie => walk.tie(length, first_bar),
        }
        walk.advance(length);
    }

    if let Some(label) = walk.pending_chord() {
        debug!(label = %label, "chord label after the last onset of the bar");
    }
    walk.events
}

impl BarWalk<'_> {
    fn slot(&self) -> usize {
        (self.position as usize).min(MAX_SUBDIV - 1)
    }

    /// Chord slot under the walk, counted from the start of the bar
    fn bar_slot(&self) -> usize {
        self.beat * MAX_SUBDIV + self.slot()
    }

    /// Latest non-empty label between the cursor and the current slot. Labels
    /// on slots without an onset stay pending until the next note.
    fn pending_chord(&self) -> Option<String> {
        let current = self.bar_slot();
        if self.chord_cursor > current {
            return None;
        }
        self.grid
            .iter()
            .flatten()
            .take(current + 1)
            .skip(self.chord_cursor)
            .map(|label| sanitize_label(label))
            .filter(|label| !label.is_empty())
            .last()
    }

    fn take_chord(&mut self) -> Option<String> {
        let chord = self.pending_chord();
        self.chord_cursor = self.bar_slot() + 1;
        chord
    }

    fn tie(&mut self, length: u32, first_bar: bool) {
        let previous = self.events.last().map(|event| match event {
            Event::Rest { length } => (true, *length),
            Event::Note { length, .. } | Event::Continuation { length, .. } => (false, *length),
        });

        match previous {
            None if first_bar => debug!("dropping tie at the start of the score"),
            None => {
                let chord = self.take_chord();
                self.events.push(Event::Continuation { length, chord });
            }
            Some((true, prev)) => {
                if note_value(prev + length).is_some() {
                    self.extend_last(length);
                } else {
                    self.events.push(Event::Rest { length });
                }
            }
            Some((false, prev)) => {
                if self.pending_chord().is_none() && note_value(prev + length).is_some() {
                    self.extend_last(length);
                } else {
                    let chord = self.take_chord();
                    self.events.push(Event::Continuation { length, chord });
                }
            }
        }
    }

    fn extend_last(&mut self, length: u32) {
        if let Some(event) = self.events.last_mut() {
            *event.length_mut() += length;
        }
    }

    fn advance(&mut self, length: u32) {
        self.position += length;
        while self.position >= SIXTEENTHS_PER_BEAT {
            if self.beat + 1 >= self.grid.len() {
                break;
            }
            self.beat += 1;
            self.position -= SIXTEENTHS_PER_BEAT;
        }
    }
}

/// Renders events and tracks the duration alphaTex carries between beats
struct EventWriter {
    duration: u8,
}

impl Default for EventWriter {
    fn default() -> Self {
        Self {
            duration: INITIAL_DURATION,
        }
    }
}

impl EventWriter {
    fn write_bar(&mut self, events: &[Event]) -> String {
        events
            .iter()
            .map(|event| self.write_event(event))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn write_event(&mut self, event: &Event) -> String {
        match event {
            Event::Note { length, chord } => {
                let (duration, dotted) = self.value(*length);
                format!("{}.{} {}", SLASH_PITCH, duration, effects(dotted, chord.as_deref()))
            }
            Event::Rest { length } => {
                let (duration, dotted) = self.value(*length);
                format!("r.{} {}", duration, effects(dotted, None))
            }
            Event::Continuation { length, chord } => {
                let previous = self.duration;
                let (duration, dotted) = self.value(*length);
                let marker = format!("- {}", effects(dotted, chord.as_deref()));
                if duration == previous {
                    marker
                } else {
                    format!(":{} {}", duration, marker)
                }
            }
        }
    }

    fn value(&mut self, length: u32) -> (u8, bool) {
        // Events only ever hold single token lengths or notatable sums.
        let (duration, dotted) = note_value(length).unwrap_or((INITIAL_DURATION, false));
        self.duration = duration;
        (duration, dotted)
    }
}

/// Duration and dot for a length in sixteenths, if one note value covers it
fn note_value(length: u32) -> Option<(u8, bool)> {
    NOTE_VALUES
        .iter()
        .find(|(l, _, _)| *l == length)
        .map(|&(_, duration, dotted)| (duration, dotted))
}

fn effects(dotted: bool, chord: Option<&str>) -> String {
    let mut fx = String::from("{slashed");
    if dotted {
        fx.push_str(" d");
    }
    if let Some(label) = chord {
        fx.push_str(&format!(" ch \"{}\"", label));
    }
    fx.push('}');
    fx
}

fn sanitize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| *c != '"' && *c != '\\')
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChordLayout;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "\\tempo 120\n\\defaultSystemsLayout 4\n.\n";

    fn bar(chord: ChordLayout, rhythm: &[&str]) -> Bar {
        Bar {
            chord,
            rhythm: rhythm.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn per_beat(labels: &[&str]) -> ChordLayout {
        ChordLayout::PerBeat(labels.iter().map(|l| l.to_string()).collect())
    }

    fn render(ts: &str, bars: &[Bar]) -> String {
        let data = ScoreData::new(ts.parse().unwrap(), "", &[], None);
        write_alpha_tex(&data, bars, 120, 4)
    }

    fn body(tex: &str) -> &str {
        tex.strip_prefix(HEADER).unwrap().trim_end()
    }

    #[test]
    fn test_default_bars_from_settings() {
        let settings = ScoreSettings::from_yaml("progression: C G").unwrap();
        let tex = build_alpha_tex(&AlphaTexInput::from(&settings));
        assert_eq!(
            tex,
            concat!(
                "\\tempo 120\n\\defaultSystemsLayout 4\n.\n",
                "\\ts 4 4 B4.4 {slashed ch \"C\"} B4.4 {slashed} B4.4 {slashed} B4.4 {slashed} |\n",
                "B4.4 {slashed ch \"G\"} B4.4 {slashed} B4.4 {slashed} B4.4 {slashed}\n",
            )
        );
    }

    #[test]
    fn test_header_uses_tempo_and_layout() {
        let settings =
            ScoreSettings::from_yaml("tempo: 72\nbarsPerRow: 3\ntimeSignature: 3/4").unwrap();
        let tex = build_alpha_tex(&AlphaTexInput::from(&settings));
        assert!(tex.starts_with("\\tempo 72\n\\defaultSystemsLayout 3\n.\n\\ts 3 4 "));
    }

    #[test]
    fn test_tie_extends_previous_note() {
        let tex = render("4/4", &[bar(per_beat(&["C"]), &["4", "t4", "2"])]);
        assert_eq!(body(&tex), "\\ts 4 4 B4.2 {slashed ch \"C\"} B4.2 {slashed}");

        let tex = render("3/4", &[bar(per_beat(&["C"]), &["2", "t4"])]);
        assert_eq!(body(&tex), "\\ts 3 4 B4.2 {slashed d ch \"C\"}");
    }

    #[test]
    fn test_unnotatable_tie_writes_continuation() {
        let tex = render("4/4", &[bar(per_beat(&[]), &["2", "t8", "8", "4"])]);
        assert_eq!(
            body(&tex),
            "\\ts 4 4 B4.2 {slashed} :8 - {slashed} B4.8 {slashed} B4.4 {slashed}"
        );
    }

    #[test]
    fn test_tie_onto_chord_change_writes_continuation() {
        let tex = render("4/4", &[bar(per_beat(&["C", "", "G", ""]), &["2", "t2"])]);
        assert_eq!(body(&tex), "\\ts 4 4 B4.2 {slashed ch \"C\"} - {slashed ch \"G\"}");
    }

    #[test]
    fn test_tie_at_bar_start() {
        let bars = [
            bar(per_beat(&[]), &["4", "4", "4", "4"]),
            bar(per_beat(&["G"]), &["t4", "4", "2"]),
        ];
        let tex = render("4/4", &bars);
        assert_eq!(
            body(&tex),
            "\\ts 4 4 B4.4 {slashed} B4.4 {slashed} B4.4 {slashed} B4.4 {slashed} |\n- {slashed ch \"G\"} B4.4 {slashed} B4.2 {slashed}"
        );

        // Nothing precedes the first bar's tie.
        let tex = render("2/4", &[bar(per_beat(&[]), &["t4", "4"])]);
        assert_eq!(body(&tex), "\\ts 2 4 B4.4 {slashed}");
    }

    #[test]
    fn test_tie_after_rest_extends_rest() {
        let tex = render("4/4", &[bar(per_beat(&[]), &["r4", "t4", "2"])]);
        assert_eq!(body(&tex), "\\ts 4 4 r.2 {slashed} B4.2 {slashed}");
    }

    #[test]
    fn test_chords_on_sixteenth_slots() {
        let grid = ChordLayout::Grid(vec![
            vec!["C".into(), "".into(), "G".into(), "".into()],
            vec!["Am".into()],
        ]);
        let tex = render("2/4", &[bar(grid, &["16", "16", "16", "16", "8", "8"])]);
        assert_eq!(
            body(&tex),
            "\\ts 2 4 B4.16 {slashed ch \"C\"} B4.16 {slashed} B4.16 {slashed ch \"G\"} B4.16 {slashed} B4.8 {slashed ch \"Am\"} B4.8 {slashed}"
        );
    }

    #[test]
    fn test_chord_waits_for_first_note_in_beat() {
        let tex = render("2/4", &[bar(per_beat(&["C", "F"]), &["r8", "8", "4"])]);
        assert_eq!(
            body(&tex),
            "\\ts 2 4 r.8 {slashed} B4.8 {slashed ch \"C\"} B4.4 {slashed ch \"F\"}"
        );
    }

    fn assert_labels_once(tex: &str, labels: &[&str]) {
        for label in labels {
            let attached = tex.matches(&format!("ch \"{}\"", label)).count();
            assert_eq!(attached, 1, "chord {} attached {} times", label, attached);
        }
    }

    #[test]
    fn test_progression_chord_changes_reach_markup() {
        let settings = ScoreSettings::from_yaml("progression: \"| C D E |\"").unwrap();
        let tex = build_alpha_tex(&AlphaTexInput::from(&settings));
        assert_eq!(
            body(&tex),
            "\\ts 4 4 B4.4 {slashed ch \"C\"} B4.4 {slashed ch \"D\"} B4.4 {slashed ch \"E\"} B4.4 {slashed}"
        );
        assert_labels_once(&tex, &["C", "D", "E"]);
    }

    #[test]
    fn test_label_between_onsets_moves_to_next_note() {
        let grid = ChordLayout::Grid(vec![vec!["C".into(), "".into(), "F".into(), "".into()]]);
        let tex = render("2/4", &[bar(grid, &["4", "4"])]);
        assert_eq!(body(&tex), "\\ts 2 4 B4.4 {slashed ch \"C\"} B4.4 {slashed ch \"F\"}");
        assert_labels_once(&tex, &["C", "F"]);
    }

    #[test]
    fn test_label_on_rest_beat_moves_to_next_note() {
        let tex = render("3/4", &[bar(per_beat(&["C", "G", ""]), &["4", "r4", "4"])]);
        assert_eq!(
            body(&tex),
            "\\ts 3 4 B4.4 {slashed ch \"C\"} r.4 {slashed} B4.4 {slashed ch \"G\"}"
        );
        assert_labels_once(&tex, &["C", "G"]);
    }

    #[test]
    fn test_label_under_tied_rest_moves_to_next_note() {
        let tex = render("4/4", &[bar(per_beat(&["", "A", "", ""]), &["r4", "t4", "2"])]);
        assert_eq!(body(&tex), "\\ts 4 4 r.2 {slashed} B4.2 {slashed ch \"A\"}");
        assert_labels_once(&tex, &["A"]);
    }

    #[test]
    fn test_label_under_held_note_moves_to_continuation() {
        let tex = render("4/4", &[bar(per_beat(&["", "Dm", "", ""]), &["2", "t2"])]);
        assert_eq!(body(&tex), "\\ts 4 4 B4.2 {slashed} - {slashed ch \"Dm\"}");
        assert_labels_once(&tex, &["Dm"]);
    }

    #[test]
    fn test_labels_are_sanitized() {
        let tex = render("2/4", &[bar(ChordLayout::Single("A\"b\\7".into()), &["2"])]);
        assert_eq!(body(&tex), "\\ts 2 4 B4.2 {slashed ch \"Ab7\"}");
    }

    #[test]
    fn test_invalid_rhythm_falls_back_to_quarters() {
        let tex = render("3/4", &[bar(per_beat(&[]), &["2", "2"])]);
        assert_eq!(body(&tex), "\\ts 3 4 B4.4 {slashed} B4.4 {slashed} B4.4 {slashed}");
    }

    #[test]
    fn test_note_values() {
        assert_eq!(note_value(12), Some((2, true)));
        assert_eq!(note_value(3), Some((8, true)));
        assert_eq!(note_value(5), None);
        assert_eq!(note_value(10), None);
    }
}
