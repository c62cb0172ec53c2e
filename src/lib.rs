pub mod alphatex;
pub mod beats;
pub mod config;
pub mod editor;
pub mod error;
pub mod model;
pub mod poll;
pub mod score_data;
pub mod session;
pub mod tokens;

pub use alphatex::{build_alpha_tex, write_alpha_tex, AlphaTexInput};
pub use beats::{
    allowed_divisions_for_beat, flatten_to_rhythm_tokens, parse_rhythm_to_beat_patterns,
    BeatSlot, DivisionRules, MeasureRhythm,
};
pub use config::ScoreSettings;
pub use editor::{BarEdit, EditMessage, ScoreBarEditor};
pub use error::*;
pub use model::*;
pub use poll::{poll_until, PollStep, PollUntil, RetryPolicy, RunGuard, RunToken};
pub use score_data::ScoreData;
pub use session::{BarHandle, BarOp, RhythmScore, ScoreView, ScrollSnapshot};
pub use tokens::{build_abc_tokens, render_abc};

/// Render the alphaTex markup for a settings document (YAML or JSON).
/// This is the main entry point for the library.
pub fn render_settings(source: &str) -> Result<String, BClickError> {
    let settings = if source.trim_start().starts_with('{') {
        ScoreSettings::from_json(source)?
    } else {
        ScoreSettings::from_yaml(source)?
    };
    Ok(build_alpha_tex(&AlphaTexInput::from(&settings)))
}
