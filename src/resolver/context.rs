//! Per-call evaluation context derived from the current card

use serde_json::Value;

use crate::card::Card;
use crate::vocabulary::Vocabulary;

use super::expr::coerce_i64;
use super::order;
use super::path::read_value;

/// Context variables available to expressions during one resolution call.
///
/// Both are derived once from the current card and never change while a
/// template resolves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveVars {
    /// `$current.volumeNumber`
    pub volume_number: Option<i64>,
    /// `$current.chapterNumber`
    pub chapter_number: Option<i64>,
}

impl ResolveVars {
    /// Derive the variables from the current card.
    ///
    /// Volume number precedence: top-level `volume_number`, the outline
    /// wrappers' `volume_number`, then the `第N卷` title pattern. Chapter
    /// number: top-level `chapter_number`, then the chapter outline's.
    pub fn from_current(current: Option<&Card>) -> Self {
        let Some(card) = current else {
            return Self::default();
        };
        Self {
            volume_number: volume_number_of(card),
            chapter_number: chapter_number_of(card),
        }
    }
}

fn volume_number_of(card: &Card) -> Option<i64> {
    const SOURCES: [&str; 3] = [
        "volume_number",
        "volume_outline.volume_number",
        "chapter_outline.volume_number",
    ];
    for source in SOURCES {
        if let Some(n) = read_value(&card.content, source).and_then(coerce_i64) {
            return Some(n);
        }
    }
    order::volume_number_in_title(&card.title)
}

fn chapter_number_of(card: &Card) -> Option<i64> {
    for source in ["chapter_number", "chapter_outline.chapter_number"] {
        if let Some(n) = read_value(&card.content, source).and_then(coerce_i64) {
            return Some(n);
        }
    }
    None
}

/// Unwrap volume-outline content from its historical wrapper keys.
///
/// A mapping already carrying one of the hallmark outline fields is returned
/// as-is; anything else is treated as absent.
pub fn unwrap_volume_outline<'a>(content: &'a Value, vocab: &Vocabulary) -> Option<&'a Value> {
    let map = content.as_object()?;
    for key in &vocab.outline_wrapper_keys {
        if let Some(inner @ Value::Object(_)) = map.get(key) {
            return Some(inner);
        }
    }
    if vocab
        .outline_hallmark_fields
        .iter()
        .any(|field| map.contains_key(field))
    {
        return Some(content);
    }
    None
}
