//! Selector resolution - turns parsed reference tokens into replacement text
//!
//! [`Resolver`] holds one call's worth of read-only state: the card
//! snapshot, the optional current card, the derived context variables, and
//! the vocabulary. Resolution is pure - nothing is cached across calls and
//! the snapshot is never mutated.

pub mod context;
pub mod expr;
pub mod order;
pub mod path;

use serde_json::{Map, Value};

use crate::card::Card;
use crate::error::ResolveFailure;
use crate::parser::ast::{Filter, IndexArg, PathSpec, PrevScope, Selector};
use crate::parser::{parse_selector, scanner};
use crate::vocabulary::Vocabulary;

use context::{unwrap_volume_outline, ResolveVars};

/// Per-call resolution state
pub struct Resolver<'a> {
    cards: &'a [Card],
    current: Option<&'a Card>,
    vars: ResolveVars,
    vocabulary: &'a Vocabulary,
}

impl<'a> Resolver<'a> {
    pub fn new(cards: &'a [Card], current: Option<&'a Card>, vocabulary: &'a Vocabulary) -> Self {
        Self {
            cards,
            current,
            vars: ResolveVars::from_current(current),
            vocabulary,
        }
    }

    pub(crate) fn current(&self) -> Option<&'a Card> {
        self.current
    }

    pub(crate) fn vars(&self) -> ResolveVars {
        self.vars
    }

    pub(crate) fn parent_card(&self) -> Option<&'a Card> {
        order::parent_of(self.cards, self.current?)
    }

    /// Render a template: scan for tokens, resolve each, and splice the
    /// replacements back to front so earlier offsets stay valid.
    pub fn render(&self, template: &str) -> String {
        let tokens = scanner::scan(template);
        if tokens.is_empty() {
            return template.to_string();
        }
        log::debug!("resolving {} reference token(s)", tokens.len());
        let mut out = template.to_string();
        for token in tokens.iter().rev() {
            let raw = token.text(template);
            let replacement = self.resolve_token(raw).unwrap_or_else(|failure| {
                log::debug!("token {raw:?} resolved to marker: {failure}");
                failure.to_string()
            });
            out.replace_range(token.span(), &replacement);
        }
        out
    }

    /// Resolve one token (leading `@` included) to its replacement text
    pub fn resolve_token(&self, raw: &str) -> Result<String, ResolveFailure> {
        let selector = parse_selector(raw)?;
        self.resolve_selector(&selector)
    }

    fn resolve_selector(&self, selector: &Selector) -> Result<String, ResolveFailure> {
        match selector {
            Selector::CurrentStage { path } => Ok(self.resolve_stage(path)),
            Selector::PreviousChapters => {
                let chapters = Value::Array(self.previous_chapters());
                Ok(path::stringify(Some(&chapters)))
            }
            Selector::ByType {
                type_name,
                filter,
                path,
            } => self.resolve_type(type_name, filter.as_ref(), path),
            Selector::CurrentCard { path } => {
                let card = self.current.ok_or_else(|| ResolveFailure::CardNotFound {
                    selector: "self".to_string(),
                })?;
                self.extract(card, path)
            }
            Selector::ParentCard { path } => {
                let card = self.parent_card().ok_or_else(|| ResolveFailure::CardNotFound {
                    selector: "parent".to_string(),
                })?;
                self.extract(card, path)
            }
            Selector::ByTitle { title, path } => {
                let card = self
                    .cards
                    .iter()
                    .find(|c| c.title == *title)
                    .ok_or_else(|| ResolveFailure::CardNotFound {
                        selector: title.clone(),
                    })?;
                self.extract(card, path)
            }
        }
    }

    fn resolve_type(
        &self,
        type_name: &str,
        filter: Option<&Filter>,
        spec: &PathSpec,
    ) -> Result<String, ResolveFailure> {
        if !self.cards.iter().any(|c| c.type_name == type_name) {
            return Err(ResolveFailure::TypeNotFound {
                type_name: type_name.to_string(),
            });
        }

        match filter {
            Some(Filter::Previous { scope, take }) => {
                let list = self.previous_list(type_name, *scope, *take);
                Ok(self.extract_collection(&list, spec))
            }
            Some(Filter::Sibling) => {
                let list = self.sibling_list(type_name);
                Ok(self.extract_siblings(&list, spec))
            }
            Some(Filter::Index(Some(IndexArg::Where(predicate)))) => {
                let matched: Vec<&Card> = self
                    .type_candidates(type_name)
                    .into_iter()
                    .filter(|card| expr::matches(predicate, card, self))
                    .collect();
                Ok(self.extract_collection(&matched, spec))
            }
            Some(Filter::Index(arg)) => {
                let candidates = self.type_candidates(type_name);
                let selected = match arg {
                    Some(IndexArg::At(index)) => expr::eval_index(index, self, candidates.len())
                        .and_then(|i| candidates.get(i).copied()),
                    // the expression parsed as neither predicate nor position
                    _ => None,
                };
                match selected {
                    Some(card) => self.extract(card, spec),
                    None => Ok(String::new()),
                }
            }
            Some(Filter::Last) => match self.type_candidates(type_name).last() {
                Some(card) => self.extract(card, spec),
                None => Ok(String::new()),
            },
            None | Some(Filter::First) => match self.type_candidates(type_name).first() {
                Some(card) => self.extract(card, spec),
                None => Ok(String::new()),
            },
        }
    }

    /// Cards of a type in stable candidate order
    fn type_candidates(&self, type_name: &str) -> Vec<&'a Card> {
        let mut candidates: Vec<&Card> = order::preorder(self.cards)
            .into_iter()
            .filter(|c| c.type_name == type_name)
            .collect();
        order::sort_candidates(&mut candidates);
        candidates
    }

    /// Same-type cards before the current card, in the requested scope
    fn previous_list(
        &self,
        type_name: &str,
        scope: PrevScope,
        take: Option<usize>,
    ) -> Vec<&'a Card> {
        let Some(current) = self.current else {
            return Vec::new();
        };
        let mut list: Vec<&Card> = match scope {
            PrevScope::Global => {
                let ordered = order::preorder(self.cards);
                let Some(position) = ordered.iter().position(|c| c.id == current.id) else {
                    return Vec::new();
                };
                ordered[..position]
                    .iter()
                    .copied()
                    .filter(|c| c.type_name == type_name)
                    .collect()
            }
            PrevScope::Local => {
                let mut siblings: Vec<&Card> = self
                    .cards
                    .iter()
                    .filter(|c| {
                        c.parent_id == current.parent_id
                            && c.type_name == type_name
                            && c.id != current.id
                            && c.display_order < current.display_order
                    })
                    .collect();
                siblings.sort_by_key(|c| c.display_order);
                siblings
            }
        };
        list = self.filter_short_lived(list);
        if let Some(n) = take {
            if list.len() > n {
                list.drain(..list.len() - n);
            }
        }
        list
    }

    /// Same-type cards under the current card's parent, current excluded
    fn sibling_list(&self, type_name: &str) -> Vec<&'a Card> {
        let (parent_id, current_id) = match self.current {
            Some(c) => (c.parent_id, Some(c.id)),
            None => (None, None),
        };
        let mut siblings: Vec<&Card> = self
            .cards
            .iter()
            .filter(|c| {
                c.parent_id == parent_id && c.type_name == type_name && Some(c.id) != current_id
            })
            .collect();
        siblings.sort_by_key(|c| c.display_order);
        siblings
    }

    /// Drop short-lived entity cards that belong to a different volume than
    /// the current card
    fn filter_short_lived(&self, list: Vec<&'a Card>) -> Vec<&'a Card> {
        let Some(current) = self.current else {
            return list;
        };
        let vocab = self.vocabulary;
        let current_volume =
            order::nearest_ancestor_of_type(self.cards, current, &vocab.volume_outline_type)
                .map(|c| c.id);
        list.into_iter()
            .filter(|card| {
                if !vocab.is_entity_type(&card.type_name) {
                    return true;
                }
                let short_lived = path::read_value(&card.content, "life_span")
                    .and_then(|v| v.as_str())
                    .map(|s| s == vocab.short_lived_value)
                    .unwrap_or(false);
                if !short_lived {
                    return true;
                }
                let volume = order::nearest_ancestor_of_type(
                    self.cards,
                    card,
                    &vocab.volume_outline_type,
                )
                .map(|c| c.id);
                volume == current_volume
            })
            .collect()
    }

    /// `stage:current` - the stage line of the current volume outline whose
    /// chapter range contains the current chapter number
    fn resolve_stage(&self, stage_path: &str) -> String {
        let Some(stage) = self.current_stage() else {
            return String::new();
        };
        path::stringify(path::read_value(stage, stage_path))
    }

    /// The volume-outline card at the current volume's 1-based position
    fn current_volume_card(&self) -> Option<&'a Card> {
        let volume = self.vars.volume_number?;
        if volume < 1 {
            return None;
        }
        self.type_candidates(&self.vocabulary.volume_outline_type)
            .get(volume as usize - 1)
            .copied()
    }

    fn current_stage(&self) -> Option<&'a Value> {
        let volume = self.current_volume_card()?;
        let outline = unwrap_volume_outline(&volume.content, self.vocabulary)?;
        let stage_lines = path::read_value(outline, "stage_lines")?.as_array()?;
        let chapter = self.vars.chapter_number? as f64;
        stage_lines.iter().find(|entry| {
            let Some(range) =
                path::read_value(entry, "reference_chapter").and_then(|v| v.as_array())
            else {
                return false;
            };
            if range.len() < 2 {
                return false;
            }
            match (expr::coerce_f64(&range[0]), expr::coerce_f64(&range[1])) {
                (Some(start), Some(end)) => start <= chapter && chapter <= end,
                _ => false,
            }
        })
    }

    /// `chapters:previous` - chapter outlines of the current volume before
    /// the current chapter, projected to their summary fields
    fn previous_chapters(&self) -> Vec<Value> {
        let (Some(volume), Some(chapter)) = (self.vars.volume_number, self.vars.chapter_number)
        else {
            return Vec::new();
        };
        let mut outlines: Vec<(f64, &Card)> = self
            .cards
            .iter()
            .filter(|c| c.type_name == self.vocabulary.chapter_outline_type)
            .filter_map(|c| {
                let outline = path::read_value(&c.content, "chapter_outline")?;
                let card_volume = path::read_value(outline, "volume_number")?.as_f64()?;
                if card_volume != volume as f64 {
                    return None;
                }
                let card_chapter = path::read_value(outline, "chapter_number")?.as_f64()?;
                if card_chapter >= chapter as f64 {
                    return None;
                }
                Some((card_chapter, c))
            })
            .collect();
        outlines.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        outlines
            .into_iter()
            .map(|(_, card)| {
                let outline = path::read_value(&card.content, "chapter_outline");
                let mut entry = Map::new();
                for key in ["title", "chapter_number", "overview"] {
                    if let Some(value) = outline.and_then(|o| path::read_value(o, key)) {
                        entry.insert(key.to_string(), value.clone());
                    }
                }
                for key in ["enemy", "resolve_enemy"] {
                    let value = outline
                        .and_then(|o| path::read_value(o, key))
                        .cloned()
                        .unwrap_or(Value::Null);
                    entry.insert(key.to_string(), value);
                }
                Value::Object(entry)
            })
            .collect()
    }

    /// Extract a path from a single selected card
    fn extract(&self, card: &Card, spec: &PathSpec) -> Result<String, ResolveFailure> {
        match spec {
            PathSpec::Content => Ok(path::stringify(path::read_card(card, "content").as_ref())),
            PathSpec::Multi(paths) => {
                Ok(path::stringify(Some(&path::pick_fields(card, paths))))
            }
            PathSpec::Single(p) => match path::read_card(card, p) {
                Some(value) => Ok(path::stringify(Some(&value))),
                None => Err(ResolveFailure::FieldNotFound { path: p.clone() }),
            },
        }
    }

    /// Extract a path from each card of a collection
    fn extract_collection(&self, list: &[&Card], spec: &PathSpec) -> String {
        let items: Vec<Value> = match spec {
            PathSpec::Content => list.iter().map(|c| c.content.clone()).collect(),
            PathSpec::Multi(paths) => list.iter().map(|c| path::pick_fields(c, paths)).collect(),
            PathSpec::Single(p) => list
                .iter()
                .map(|c| path::read_card(c, p).unwrap_or(Value::Null))
                .collect(),
        };
        path::stringify(Some(&Value::Array(items)))
    }

    /// Sibling extraction: single-path results drop blanks and a singleton
    /// is returned unwrapped
    fn extract_siblings(&self, list: &[&Card], spec: &PathSpec) -> String {
        let PathSpec::Single(p) = spec else {
            return self.extract_collection(list, spec);
        };
        let values: Vec<Value> = list
            .iter()
            .filter_map(|c| path::read_card(c, p))
            .filter(|v| {
                !v.is_null() && !matches!(v, Value::String(s) if s.trim().is_empty())
            })
            .collect();
        match values.len() {
            0 => String::new(),
            1 => path::stringify(values.first()),
            _ => path::stringify(Some(&Value::Array(values))),
        }
    }
}
