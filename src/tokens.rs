//! # Beat → Notation Tokens
//!
//! Converts one `BeatDescriptor` into the notation tokens the bar serializer and
//! the per-beat preview consume.
//!
//! ## Rules by Division
//! - **1, 2, 4**: exactly one token.
//! - **8**: one token per symbol, two eighth rests merge into a quarter rest.
//! - **16**: raw pass, known-shape collapse, rest-run merge, tie-adjacency fixup
//!   (in that order).
//!
//! ## Known Shapes (sixteenths, no rests)
//! ```text
//! note tie  note note   →  2 1 1
//! note tie  tie  note   →  3 1
//! note note tie  tie    →  1 3
//! note note note tie    →  1 1 2
//! note note tie  note   →  1 2 1
//! ```
//! Only these five collapse. Everything else keeps one token per symbol.
//!
//! ## Invariant
//! The summed token length always equals the descriptor's length in sixteenths
//! (`16 / division` per symbol).

use crate::model::{BeatDescriptor, Division, NotationToken, Symbol, TokenKind};

/// One position of a collapse shape: a fresh attack or a tie.
#[derive(Clone, Copy, PartialEq)]
enum Stroke {
    Attack,
    Hold,
}

use Stroke::{Attack, Hold};

/// Literal collapse table: symbol shape → token lengths in units.
const COLLAPSE_SHAPES: [([Stroke; 4], &[u32]); 5] = [
    ([Attack, Hold, Attack, Attack], &[2, 1, 1]),
    ([Attack, Hold, Hold, Attack], &[3, 1]),
    ([Attack, Attack, Hold, Hold], &[1, 3]),
    ([Attack, Attack, Attack, Hold], &[1, 1, 2]),
    ([Attack, Attack, Hold, Attack], &[1, 2, 1]),
];

/// Build the notation tokens for one beat.
///
/// # Example
/// ```rust
/// use bclick::{build_abc_tokens, BeatDescriptor, Division, Symbol};
///
/// let beat = BeatDescriptor::new(Division::Eighth, vec![Symbol::Rest, Symbol::Rest]);
/// let tokens = build_abc_tokens(&beat);
/// assert_eq!(tokens.len(), 1);
/// assert!(tokens[0].is_rest());
/// assert_eq!(tokens[0].length, 4);
/// ```
pub fn build_abc_tokens(beat: &BeatDescriptor) -> Vec<NotationToken> {
    let beat = beat.clone().normalized();
    let unit = beat.division.unit();

    let mut tokens = match beat.division {
        Division::Whole | Division::Half | Division::Quarter => {
            vec![single_token(beat.pattern[0], unit)]
        }
        Division::Eighth => {
            let mut tokens = raw_tokens(&beat.pattern, unit);
            merge_rest_runs(&mut tokens, unit, &[2]);
            tokens
        }
        Division::Sixteenth => {
            let raw = raw_tokens(&beat.pattern, unit);
            let mut tokens = collapse_known_shape(&beat.pattern, &raw, unit).unwrap_or(raw);
            merge_rest_runs(&mut tokens, unit, &[4, 2]);
            tokens
        }
    };

    fix_tie_adjacency(&mut tokens);
    tokens
}

fn single_token(symbol: Symbol, unit: u32) -> NotationToken {
    match symbol {
        Symbol::Rest => NotationToken::rest(unit),
        Symbol::TieNote => NotationToken::tied_note(unit),
        _ => NotationToken::note(unit),
    }
}

/// One provisional token per symbol. A tie after a rest lengthens the rest.
fn raw_tokens(pattern: &[Symbol], unit: u32) -> Vec<NotationToken> {
    let mut tokens: Vec<NotationToken> = Vec::with_capacity(pattern.len());

    for (i, symbol) in pattern.iter().enumerate() {
        match symbol {
            Symbol::Rest => tokens.push(NotationToken::rest(unit)),
            Symbol::Note => tokens.push(NotationToken::note(unit)),
            Symbol::TieNote if i == 0 => tokens.push(NotationToken::tied_note(unit)),
            Symbol::Tie | Symbol::TieNote => match tokens.last_mut() {
                Some(prev) if prev.kind == TokenKind::Rest => prev.length += unit,
                Some(prev) => {
                    prev.tie_to_next = true;
                    tokens.push(NotationToken::tied_note(unit));
                }
                None => tokens.push(NotationToken::tied_note(unit)),
            },
        }
    }

    tokens
}

/// Replace the raw tokens when the pattern is one of the five known shapes.
fn collapse_known_shape(
    pattern: &[Symbol],
    raw: &[NotationToken],
    unit: u32,
) -> Option<Vec<NotationToken>> {
    let shape = stroke_shape(pattern)?;
    let (_, lengths) = COLLAPSE_SHAPES.iter().find(|(s, _)| *s == shape)?;

    let mut tokens: Vec<NotationToken> = lengths
        .iter()
        .map(|len| NotationToken::note(len * unit))
        .collect();
    tokens[0].tie_from_prev = raw.first().is_some_and(|t| t.tie_from_prev);
    Some(tokens)
}

/// Attack/hold reading of a four-symbol pattern; `None` if it holds a rest.
fn stroke_shape(pattern: &[Symbol]) -> Option<[Stroke; 4]> {
    if pattern.len() != 4 {
        return None;
    }
    let mut shape = [Attack; 4];
    for (i, symbol) in pattern.iter().enumerate() {
        shape[i] = match symbol {
            Symbol::Rest => return None,
            Symbol::Note => Attack,
            Symbol::TieNote if i == 0 => Attack,
            Symbol::Tie | Symbol::TieNote => Hold,
        };
    }
    Some(shape)
}

/// Merge runs of unit-length rests, trying the longest run size first.
fn merge_rest_runs(tokens: &mut Vec<NotationToken>, unit: u32, run_sizes: &[usize]) {
    let is_unit_rest = |t: &NotationToken| t.is_rest() && t.length == unit;

    let mut merged = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let run = run_sizes.iter().copied().find(|&n| {
            i + n <= tokens.len() && tokens[i..i + n].iter().all(is_unit_rest)
        });
        match run {
            Some(n) => {
                merged.push(NotationToken::rest(unit * n as u32));
                i += n;
            }
            None => {
                merged.push(tokens[i]);
                i += 1;
            }
        }
    }
    *tokens = merged;
}

/// Make sure both ends of every tie are flagged.
fn fix_tie_adjacency(tokens: &mut [NotationToken]) {
    for i in 1..tokens.len() {
        if tokens[i].tie_from_prev && tokens[i - 1].kind == TokenKind::Note {
            tokens[i - 1].tie_to_next = true;
        }
    }
}

/// ABC preview of one beat with `L:1/16`: `B` for notes, `z` for rests, `-` after
/// a note tied into the next one.
///
/// # Example
/// ```rust
/// use bclick::{build_abc_tokens, render_abc, BeatDescriptor, Division, Symbol};
///
/// let beat = BeatDescriptor::new(
///     Division::Sixteenth,
///     vec![Symbol::Note, Symbol::Tie, Symbol::Tie, Symbol::Note],
/// );
/// assert_eq!(render_abc(&build_abc_tokens(&beat)), "B3B");
/// ```
pub fn render_abc(tokens: &[NotationToken]) -> String {
    let mut abc = String::new();
    for token in tokens {
        abc.push(if token.is_rest() { 'z' } else { 'B' });
        if token.length != 1 {
            abc.push_str(&token.length.to_string());
        }
        if token.tie_to_next && !token.is_rest() {
            abc.push('-');
        }
    }
    abc
}
