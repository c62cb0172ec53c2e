//! # Score Session
//!
//! `RhythmScore` owns the bar array of one open score and keeps the rendered
//! view in step with it. Each bar edit re-renders the score and then
//! reconciles the view once the renderer has laid the new markup out:
//!
//! - Paste, duplicate and delete keep the edited bar where it was on screen by
//!   shifting the scroll position by however far its handle moved.
//! - Deleting the last bar scrolls to the bottom instead.
//! - The bar the edit landed on is highlighted for three seconds.
//!
//! Handles only appear after layout, so both steps poll the view through
//! [`PollUntil`]. The host drives them by calling [`RhythmScore::on_tick`]
//! from its timer. Starting a new edit cancels whatever the previous one was
//! still waiting on.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::alphatex::write_alpha_tex;
use crate::beats::{DivisionRules, MeasureRhythm};
use crate::config::ScoreSettings;
use crate::editor::{BarEdit, EditMessage, ScoreBarEditor};
use crate::error::BClickError;
use crate::model::{rhythm_to_strings, Bar, ChordLayout, MAX_SUBDIV};
use crate::poll::{PollStep, PollUntil, RetryPolicy, RunGuard};
use crate::score_data::ScoreData;

/// How long an edited bar stays highlighted
pub const HIGHLIGHT_DURATION: Duration = Duration::from_secs(3);

/// A rendered bar as seen by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarHandle {
    pub id: u64,
    /// Distance from the top of the scroll container
    pub offset_top: f64,
}

/// The host renderer and its scroll container
pub trait ScoreView {
    /// Hand new markup to the renderer. Layout may finish later.
    fn render(&mut self, alpha_tex: &str);

    fn scroll_top(&self) -> f64;

    fn set_scroll_top(&mut self, top: f64);

    fn max_scroll_top(&self) -> f64;

    /// The handle of a laid-out bar, or `None` while layout is pending.
    fn locate_bar(&self, index: usize) -> Option<BarHandle>;

    fn set_bar_highlight(&mut self, handle: &BarHandle, on: bool);
}

/// Scroll state captured before an edit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollSnapshot {
    pub scroll_top: f64,
    pub anchor_bar: usize,
    pub anchor_offset: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarOp {
    Copy,
    Paste,
    Duplicate,
    Delete,
}

impl BarOp {
    /// Ops that can move bars around on screen
    fn shifts_layout(self) -> bool {
        !matches!(self, BarOp::Copy)
    }
}

#[derive(Debug)]
enum ScrollTask {
    Restore {
        poll: PollUntil,
        snapshot: ScrollSnapshot,
    },
    /// Follow the bottom until the scroll height settles
    Bottom {
        poll: PollUntil,
        last_max: Option<f64>,
    },
}

#[derive(Debug)]
enum HighlightTask {
    Locating { poll: PollUntil, index: usize },
    Shown { handle: BarHandle, until: Duration },
}

pub struct RhythmScore<V: ScoreView> {
    view: V,
    settings: ScoreSettings,
    data: ScoreData,
    bars: Vec<Bar>,
    editor: ScoreBarEditor,
    active_chord_index: Option<usize>,
    last_edited_bar: Option<usize>,
    handles: HashMap<usize, BarHandle>,
    guard: RunGuard,
    policy: RetryPolicy,
    scroll: Option<ScrollTask>,
    highlight: Option<HighlightTask>,
    markup: String,
}

impl<V: ScoreView> RhythmScore<V> {
    /// Open a score and render it.
    pub fn new(view: V, settings: ScoreSettings) -> Self {
        let data = ScoreData::from_settings(&settings);
        let bars = initial_bars(&settings, &data);
        let mut score = Self {
            view,
            editor: ScoreBarEditor::new(data.clone()),
            settings,
            data,
            bars,
            active_chord_index: None,
            last_edited_bar: None,
            handles: HashMap::new(),
            guard: RunGuard::new(),
            policy: RetryPolicy::RENDER,
            scroll: None,
            highlight: None,
            markup: String::new(),
        };
        score.render();
        score
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn editor(&self) -> &ScoreBarEditor {
        &self.editor
    }

    pub fn last_edited_bar(&self) -> Option<usize> {
        self.last_edited_bar
    }

    pub fn active_chord_index(&self) -> Option<usize> {
        self.active_chord_index
    }

    pub fn set_active_chord_index(&mut self, index: Option<usize>) {
        self.active_chord_index = index;
    }

    /// Last known handle of a bar
    pub fn bar_handle(&self, index: usize) -> Option<BarHandle> {
        self.handles.get(&index).copied()
    }

    /// True while a scroll or highlight task is still polling
    pub fn is_polling(&self) -> bool {
        self.scroll.is_some() || matches!(self.highlight, Some(HighlightTask::Locating { .. }))
    }

    pub fn is_highlighted(&self, index: usize) -> bool {
        match &self.highlight {
            Some(HighlightTask::Shown { handle, .. }) => self.bar_handle(index) == Some(*handle),
            _ => false,
        }
    }

    /// Settings to persist, including the edited bars.
    pub fn settings(&self) -> ScoreSettings {
        ScoreSettings {
            bars: Some(self.bars.clone()),
            ..self.settings.clone()
        }
    }

    /// Apply new score settings. Saved bars in `settings` replace the current
    /// ones; without them the bars are rebuilt from the progression.
    pub fn update_settings(&mut self, settings: ScoreSettings) {
        self.guard.cancel_all();
        self.clear_highlight();
        self.scroll = None;

        self.data = ScoreData::from_settings(&settings);
        self.editor.set_data(self.data.clone());
        self.bars = initial_bars(&settings, &self.data);
        self.settings = settings;
        self.render();
    }

    /// Run one bar operation. Returns the status message, or `None` when the
    /// op did nothing (paste with an empty clipboard).
    pub fn apply(&mut self, op: BarOp, index: usize, now: Duration) -> Option<EditMessage> {
        let edit = match op {
            BarOp::Copy => self.editor.copy(&self.bars, index),
            BarOp::Paste => self.editor.paste(&self.bars, index),
            BarOp::Duplicate => self.editor.duplicate(&self.bars, index),
            BarOp::Delete => self.editor.delete(&self.bars, index),
        }?;
        let BarEdit {
            bars,
            index: landed,
            message,
        } = edit;

        let token = self.guard.begin();
        self.clear_highlight();
        self.scroll = None;

        let deleting_last = op == BarOp::Delete && index + 1 >= self.bars.len();
        let snapshot = if op.shifts_layout() && !deleting_last {
            self.snapshot(index)
        } else {
            None
        };

        self.last_edited_bar = Some(landed);
        if bars != self.bars {
            self.bars = bars;
            self.render();
        }

        if deleting_last {
            self.scroll = Some(ScrollTask::Bottom {
                poll: PollUntil::new(token.clone(), self.policy, now),
                last_max: None,
            });
        } else if let Some(snapshot) = snapshot {
            self.scroll = Some(ScrollTask::Restore {
                poll: PollUntil::new(token.clone(), self.policy, now),
                snapshot,
            });
        }
        self.highlight = Some(HighlightTask::Locating {
            poll: PollUntil::new(token, self.policy, now),
            index: landed,
        });

        debug!(?op, index, landed, message = message.id(), "bar edit applied");
        Some(message)
    }

    /// Advance polling and highlight expiry. Call from the host's timer.
    pub fn on_tick(&mut self, now: Duration) {
        self.tick_scroll(now);
        self.tick_highlight(now);
    }

    /// Open the per-beat editor for one bar.
    /// Bars past the end are read as their defaults; nothing is stored until
    /// `set_bar_rhythm`.
    pub fn measure_rhythm(&self, index: usize) -> MeasureRhythm {
        let bar = match self.bars.get(index) {
            Some(bar) => bar.clone(),
            None => self.data.default_bar(index),
        };
        let rhythm = rhythm_to_strings(&self.data.bar_rhythm(&bar));
        let rules = DivisionRules::for_time_signature(&self.data.time_signature());
        MeasureRhythm::from_rhythm(&rhythm, rules)
    }

    /// Store an edited bar rhythm and re-render.
    pub fn set_bar_rhythm(&mut self, index: usize, measure: &MeasureRhythm) {
        self.data.ensure_bar(&mut self.bars, index);
        self.bars[index].rhythm = rhythm_to_strings(&measure.to_rhythm());
        self.last_edited_bar = Some(index);
        self.render();
    }

    /// Set the chord label in one sixteenth slot of a bar.
    pub fn set_chord(
        &mut self,
        index: usize,
        beat: usize,
        slot: usize,
        label: &str,
    ) -> Result<(), BClickError> {
        let beat_count = self.data.beat_count();
        if beat >= beat_count {
            return Err(BClickError::BeatOutOfRange { beat, beat_count });
        }
        if slot >= MAX_SUBDIV {
            return Err(BClickError::SymbolOutOfRange { beat, index: slot });
        }

        self.data.ensure_bar(&mut self.bars, index);
        let bar = &mut self.bars[index];
        let mut grid = bar.chord.to_grid(beat_count);
        grid[beat][slot] = label.trim().to_string();
        bar.chord = ChordLayout::Grid(grid);
        self.last_edited_bar = Some(index);
        self.render();
        Ok(())
    }

    /// Leave the editor: stop polling, drop the highlight and the clipboard.
    pub fn end_session(&mut self) {
        self.guard.cancel_all();
        self.clear_highlight();
        self.scroll = None;
        self.editor.clear_clipboard();
        self.active_chord_index = None;
        self.last_edited_bar = None;
    }

    fn render(&mut self) {
        self.markup = write_alpha_tex(
            &self.data,
            &self.bars,
            self.settings.tempo,
            self.settings.bars_per_row,
        );
        self.view.render(&self.markup);
        self.handles.clear();
    }

    fn snapshot(&mut self, index: usize) -> Option<ScrollSnapshot> {
        let handle = self.locate(index)?;
        Some(ScrollSnapshot {
            scroll_top: self.view.scroll_top(),
            anchor_bar: index,
            anchor_offset: handle.offset_top,
        })
    }

    fn locate(&mut self, index: usize) -> Option<BarHandle> {
        if let Some(handle) = self.handles.get(&index) {
            return Some(*handle);
        }
        let handle = self.view.locate_bar(index)?;
        self.handles.insert(index, handle);
        Some(handle)
    }

    fn clear_highlight(&mut self) {
        if let Some(HighlightTask::Shown { handle, .. }) = self.highlight.take() {
            self.view.set_bar_highlight(&handle, false);
        }
    }

    fn tick_scroll(&mut self, now: Duration) {
        let Some(task) = self.scroll.as_mut() else {
            return;
        };

        let finished = match task {
            ScrollTask::Restore { poll, snapshot } => {
                let view = &self.view;
                let step = poll.step(now, || view.locate_bar(snapshot.anchor_bar));
                if let PollStep::Ready(handle) = step {
                    let top = snapshot.scroll_top + (handle.offset_top - snapshot.anchor_offset);
                    self.view.set_scroll_top(top.max(0.0));
                    self.handles.insert(snapshot.anchor_bar, handle);
                    debug!(top, bar = snapshot.anchor_bar, "scroll restored");
                    true
                } else {
                    step.is_finished()
                }
            }
            ScrollTask::Bottom { poll, last_max } => {
                let view = &mut self.view;
                poll.step(now, || {
                    let max = view.max_scroll_top();
                    view.set_scroll_top(max);
                    let settled = *last_max == Some(max);
                    *last_max = Some(max);
                    settled.then_some(())
                })
                .is_finished()
            }
        };

        if finished {
            self.scroll = None;
        }
    }

    fn tick_highlight(&mut self, now: Duration) {
        let next = match self.highlight.as_mut() {
            None => return,
            Some(HighlightTask::Shown { handle, until }) => {
                if now < *until {
                    return;
                }
                self.view.set_bar_highlight(handle, false);
                None
            }
            Some(HighlightTask::Locating { poll, index }) => {
                let view = &self.view;
                let index = *index;
                match poll.step(now, || view.locate_bar(index)) {
                    PollStep::Waiting => return,
                    PollStep::Ready(handle) => {
                        self.view.set_bar_highlight(&handle, true);
                        self.handles.insert(index, handle);
                        Some(HighlightTask::Shown {
                            handle,
                            until: now + HIGHLIGHT_DURATION,
                        })
                    }
                    PollStep::Exhausted | PollStep::Cancelled => None,
                }
            }
        };
        self.highlight = next;
    }
}

fn initial_bars(settings: &ScoreSettings, data: &ScoreData) -> Vec<Bar> {
    match &settings.bars {
        Some(bars) if !bars.is_empty() => bars
            .iter()
            .map(|bar| bar.normalized(data.beat_count()))
            .collect(),
        _ => data.build_bars(),
    }
}
