//! # Bar Editor
//!
//! Copy, paste, duplicate and delete on the bar array, with a one-bar
//! clipboard. Every operation works on a copy of the array and hands back the
//! new array; the caller decides when to commit it.
//!
//! An index past the end is not an error: the array is first extended with
//! the default bars that belong at those positions.
//!
//! ```rust
//! use bclick::{EditMessage, ScoreBarEditor, ScoreData};
//!
//! let data = ScoreData::new("4/4".parse()?, "C G", &[], None);
//! let bars = data.build_bars();
//! let mut editor = ScoreBarEditor::new(data);
//!
//! editor.copy(&bars, 0);
//! let edit = editor.paste(&bars, 1).unwrap();
//! assert_eq!(edit.message, EditMessage::Pasted);
//! assert_eq!(edit.bars[1], edit.bars[0]);
//! # Ok::<(), bclick::BClickError>(())
//! ```

use serde::Serialize;
use tracing::debug;

use crate::model::Bar;
use crate::score_data::ScoreData;

/// Status reported to the user after an edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EditMessage {
    Copied,
    Pasted,
    Duplicated,
    Deleted,
    /// The only bar was deleted and replaced by its default
    Reset,
}

impl EditMessage {
    /// Message id for the host's string table
    pub fn id(self) -> &'static str {
        match self {
            EditMessage::Copied => "barCopied",
            EditMessage::Pasted => "barPasted",
            EditMessage::Duplicated => "barDuplicated",
            EditMessage::Deleted => "barDeleted",
            EditMessage::Reset => "barReset",
        }
    }
}

/// Result of one edit
#[derive(Debug, Clone, PartialEq)]
pub struct BarEdit {
    pub bars: Vec<Bar>,
    /// Bar the edit landed on, for highlighting
    pub index: usize,
    pub message: EditMessage,
}

#[derive(Debug, Clone)]
pub struct ScoreBarEditor {
    data: ScoreData,
    clipboard: Option<Bar>,
}

impl ScoreBarEditor {
    pub fn new(data: ScoreData) -> Self {
        Self {
            data,
            clipboard: None,
        }
    }

    pub fn data(&self) -> &ScoreData {
        &self.data
    }

    /// Swap the settings used for default bars. The clipboard is kept.
    pub fn set_data(&mut self, data: ScoreData) {
        self.data = data;
    }

    pub fn clipboard(&self) -> Option<&Bar> {
        self.clipboard.as_ref()
    }

    pub fn has_clipboard(&self) -> bool {
        self.clipboard.is_some()
    }

    /// Forget the copied bar; called when the editing session ends.
    pub fn clear_clipboard(&mut self) {
        self.clipboard = None;
    }

    pub fn copy(&mut self, bars: &[Bar], index: usize) -> Option<BarEdit> {
        let bars = self.extended(bars, index);
        self.clipboard = Some(self.clone_bar(&bars[index]));
        debug!(index, "copied bar");
        Some(BarEdit {
            bars,
            index,
            message: EditMessage::Copied,
        })
    }

    /// Overwrite the bar at `index` with the clipboard; `None` when nothing was copied.
    pub fn paste(&mut self, bars: &[Bar], index: usize) -> Option<BarEdit> {
        let copied = self.clone_bar(self.clipboard.as_ref()?);
        let mut bars = self.extended(bars, index);
        bars[index] = copied;
        debug!(index, "pasted bar");
        Some(BarEdit {
            bars,
            index,
            message: EditMessage::Pasted,
        })
    }

    /// Insert a copy of the bar at `index` right after it.
    pub fn duplicate(&mut self, bars: &[Bar], index: usize) -> Option<BarEdit> {
        let mut bars = self.extended(bars, index);
        let copy = self.clone_bar(&bars[index]);
        bars.insert(index + 1, copy);
        debug!(index, "duplicated bar");
        Some(BarEdit {
            bars,
            index: index + 1,
            message: EditMessage::Duplicated,
        })
    }

    /// Remove the bar at `index`. The last remaining bar is reset instead.
    pub fn delete(&mut self, bars: &[Bar], index: usize) -> Option<BarEdit> {
        let mut bars = self.extended(bars, index);
        if bars.len() > 1 {
            bars.remove(index);
            debug!(index, remaining = bars.len(), "deleted bar");
            let index = index.min(bars.len() - 1);
            Some(BarEdit {
                bars,
                index,
                message: EditMessage::Deleted,
            })
        } else {
            bars[index] = self.data.default_bar(index);
            debug!(index, "reset only bar");
            Some(BarEdit {
                bars,
                index,
                message: EditMessage::Reset,
            })
        }
    }

    fn extended(&self, bars: &[Bar], index: usize) -> Vec<Bar> {
        let mut bars = bars.to_vec();
        self.data.ensure_bar(&mut bars, index);
        bars
    }

    fn clone_bar(&self, bar: &Bar) -> Bar {
        bar.normalized(self.data.beat_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChordLayout;

    fn editor(progression: &str) -> (ScoreBarEditor, Vec<Bar>) {
        let rhythm: Vec<String> = Vec::new();
        let data = ScoreData::new("4/4".parse().unwrap(), progression, &rhythm, None);
        let bars = data.build_bars();
        (ScoreBarEditor::new(data), bars)
    }

    fn labels(bars: &[Bar]) -> Vec<Option<&str>> {
        bars.iter().map(|b| b.chord.first_label()).collect()
    }

    #[test]
    fn test_paste_without_clipboard() {
        let (mut editor, bars) = editor("C G");
        assert!(!editor.has_clipboard());
        assert!(editor.paste(&bars, 0).is_none());
    }

    #[test]
    fn test_copy_then_paste() {
        let (mut editor, bars) = editor("C G Am");
        let copied = editor.copy(&bars, 2).unwrap();
        assert_eq!(copied.message, EditMessage::Copied);
        assert_eq!(copied.bars, bars);

        let pasted = editor.paste(&bars, 0).unwrap();
        assert_eq!(pasted.message, EditMessage::Pasted);
        assert_eq!(pasted.index, 0);
        assert_eq!(labels(&pasted.bars), vec![Some("Am"), Some("G"), Some("Am")]);
        // The input array is untouched.
        assert_eq!(labels(&bars), vec![Some("C"), Some("G"), Some("Am")]);
    }

    #[test]
    fn test_clipboard_is_independent() {
        let (mut editor, bars) = editor("C");
        editor.copy(&bars, 0);

        let mut pasted = editor.paste(&bars, 0).unwrap().bars;
        pasted[0].rhythm = vec!["1".into()];
        assert_eq!(editor.clipboard().unwrap().rhythm, vec!["4", "4", "4", "4"]);

        let again = editor.paste(&pasted, 0).unwrap();
        assert_eq!(again.bars[0].rhythm, vec!["4", "4", "4", "4"]);
    }

    #[test]
    fn test_copy_normalizes_chords() {
        let (mut editor, _) = editor("");
        let bars = vec![Bar {
            chord: ChordLayout::Single("Dm".into()),
            rhythm: vec!["1".into()],
        }];
        editor.copy(&bars, 0);
        let ChordLayout::Grid(grid) = &editor.clipboard().unwrap().chord else {
            panic!("clipboard bars hold the chord grid");
        };
        assert_eq!(grid.len(), 4);
        assert_eq!(grid[0][0], "Dm");
    }

    #[test]
    fn test_duplicate_inserts_after() {
        let (mut editor, bars) = editor("C G");
        let edit = editor.duplicate(&bars, 0).unwrap();
        assert_eq!(edit.message, EditMessage::Duplicated);
        assert_eq!(edit.index, 1);
        assert_eq!(labels(&edit.bars), vec![Some("C"), Some("C"), Some("G")]);
    }

    #[test]
    fn test_out_of_range_index_extends() {
        let (mut editor, bars) = editor("C G");
        let edit = editor.duplicate(&bars, 3).unwrap();
        assert_eq!(
            labels(&edit.bars),
            vec![Some("C"), Some("G"), Some("C"), Some("G"), Some("G")]
        );

        editor.copy(&bars, 0);
        let edit = editor.paste(&bars, 4).unwrap();
        assert_eq!(edit.bars.len(), 5);
        assert_eq!(edit.bars[4].chord.first_label(), Some("C"));
    }

    #[test]
    fn test_delete() {
        let (mut editor, bars) = editor("C G Am");
        let edit = editor.delete(&bars, 1).unwrap();
        assert_eq!(edit.message, EditMessage::Deleted);
        assert_eq!(edit.index, 1);
        assert_eq!(labels(&edit.bars), vec![Some("C"), Some("Am")]);

        let edit = editor.delete(&edit.bars, 1).unwrap();
        assert_eq!(edit.index, 0);
        assert_eq!(labels(&edit.bars), vec![Some("C")]);
    }

    #[test]
    fn test_delete_never_empties() {
        let (mut editor, mut bars) = editor("C");
        bars[0].rhythm = vec!["2".into(), "2".into()];

        let edit = editor.delete(&bars, 0).unwrap();
        assert_eq!(edit.message, EditMessage::Reset);
        assert_eq!(edit.bars.len(), 1);
        assert_eq!(edit.bars[0], editor.data().default_bar(0));

        let edit = editor.delete(&edit.bars, 0).unwrap();
        assert_eq!(edit.bars.len(), 1);
    }

    #[test]
    fn test_clear_clipboard() {
        let (mut editor, bars) = editor("C");
        editor.copy(&bars, 0);
        assert!(editor.has_clipboard());
        editor.clear_clipboard();
        assert!(editor.paste(&bars, 0).is_none());
    }

    #[test]
    fn test_message_ids() {
        assert_eq!(EditMessage::Copied.id(), "barCopied");
        assert_eq!(EditMessage::Reset.id(), "barReset");
    }
}
