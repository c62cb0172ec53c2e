use std::fmt::Display;

use bclick::{
    allowed_divisions_for_beat, build_abc_tokens, flatten_to_rhythm_tokens,
    parse_rhythm_to_beat_patterns, render_abc, rhythm_to_strings, AlphaTexInput, Bar, BarEdit,
    BeatDescriptor, BeatSlot, DivisionRules, ScoreBarEditor, ScoreData, ScoreSettings,
    TimeSignature,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[derive(Serialize)]
struct BindingError {
    message: String,
}

#[derive(Serialize)]
struct EditResult {
    bars: Vec<Bar>,
    index: usize,
    message: &'static str,
}

impl From<BarEdit> for EditResult {
    fn from(edit: BarEdit) -> Self {
        Self {
            bars: edit.bars,
            index: edit.index,
            message: edit.message.id(),
        }
    }
}

fn to_js_error(e: impl Display) -> JsValue {
    let message = e.to_string();
    let json = serde_json::to_string(&BindingError {
        message: message.clone(),
    })
    .unwrap_or(message);
    JsValue::from_str(&json)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(to_js_error)
}

fn parse_bars(bars_json: &str) -> Result<Vec<Bar>, JsValue> {
    serde_json::from_str(bars_json).map_err(to_js_error)
}

/// Render settings JSON (as kept by the settings store) to alphaTex
#[wasm_bindgen]
pub fn render_alpha_tex(settings_json: &str) -> Result<String, JsValue> {
    let settings = ScoreSettings::from_json(settings_json).map_err(to_js_error)?;
    Ok(bclick::build_alpha_tex(&AlphaTexInput::from(&settings)))
}

/// Default bars for the settings, as a JSON array
#[wasm_bindgen]
pub fn build_bars(settings_json: &str) -> Result<String, JsValue> {
    let settings = ScoreSettings::from_json(settings_json).map_err(to_js_error)?;
    to_json(&ScoreData::from_settings(&settings).build_bars())
}

/// Split a bar rhythm (JSON string array) into beat slots
#[wasm_bindgen]
pub fn beat_patterns(rhythm_json: &str, time_signature: &str) -> Result<String, JsValue> {
    let rhythm: Vec<String> = serde_json::from_str(rhythm_json).map_err(to_js_error)?;
    let ts: TimeSignature = time_signature.parse().map_err(to_js_error)?;
    let slots = parse_rhythm_to_beat_patterns(&rhythm, &DivisionRules::for_time_signature(&ts));
    to_json(&slots)
}

/// Flatten beat slots back into a bar rhythm
#[wasm_bindgen]
pub fn flatten_beats(slots_json: &str) -> Result<String, JsValue> {
    let slots: Vec<BeatSlot> = serde_json::from_str(slots_json).map_err(to_js_error)?;
    to_json(&rhythm_to_strings(&flatten_to_rhythm_tokens(&slots)))
}

/// Divisions selectable at a beat, as a JSON number array
#[wasm_bindgen]
pub fn allowed_divisions(beat_index: usize, beat_count: usize, numerator: u8) -> String {
    let divisions: Vec<u8> = allowed_divisions_for_beat(beat_index, beat_count, numerator)
        .into_iter()
        .map(|d| d.value())
        .collect();
    serde_json::to_string(&divisions).unwrap_or_else(|_| "[]".to_string())
}

/// Notation tokens for one beat descriptor
#[wasm_bindgen]
pub fn beat_tokens(descriptor_json: &str) -> Result<String, JsValue> {
    let beat: BeatDescriptor = serde_json::from_str(descriptor_json).map_err(to_js_error)?;
    to_json(&build_abc_tokens(&beat.normalized()))
}

/// ABC preview of one beat descriptor
#[wasm_bindgen]
pub fn beat_abc(descriptor_json: &str) -> Result<String, JsValue> {
    let beat: BeatDescriptor = serde_json::from_str(descriptor_json).map_err(to_js_error)?;
    Ok(render_abc(&build_abc_tokens(&beat.normalized())))
}

/// Bar editor with a clipboard that lives as long as the JS object
#[wasm_bindgen]
pub struct BarEditor {
    inner: ScoreBarEditor,
}

#[wasm_bindgen]
impl BarEditor {
    #[wasm_bindgen(constructor)]
    pub fn new(settings_json: &str) -> Result<BarEditor, JsValue> {
        let settings = ScoreSettings::from_json(settings_json).map_err(to_js_error)?;
        Ok(Self {
            inner: ScoreBarEditor::new(ScoreData::from_settings(&settings)),
        })
    }

    pub fn copy(&mut self, bars_json: &str, index: usize) -> Result<Option<String>, JsValue> {
        let bars = parse_bars(bars_json)?;
        finish(self.inner.copy(&bars, index))
    }

    /// `undefined` when nothing has been copied
    pub fn paste(&mut self, bars_json: &str, index: usize) -> Result<Option<String>, JsValue> {
        let bars = parse_bars(bars_json)?;
        finish(self.inner.paste(&bars, index))
    }

    pub fn duplicate(&mut self, bars_json: &str, index: usize) -> Result<Option<String>, JsValue> {
        let bars = parse_bars(bars_json)?;
        finish(self.inner.duplicate(&bars, index))
    }

    pub fn delete(&mut self, bars_json: &str, index: usize) -> Result<Option<String>, JsValue> {
        let bars = parse_bars(bars_json)?;
        finish(self.inner.delete(&bars, index))
    }

    #[wasm_bindgen(js_name = hasClipboard)]
    pub fn has_clipboard(&self) -> bool {
        self.inner.has_clipboard()
    }

    #[wasm_bindgen(js_name = clearClipboard)]
    pub fn clear_clipboard(&mut self) {
        self.inner.clear_clipboard();
    }
}

fn finish(edit: Option<BarEdit>) -> Result<Option<String>, JsValue> {
    edit.map(|edit| to_json(&EditResult::from(edit))).transpose()
}
