//! Card Context - resolves `@` reference templates against a hierarchical
//! card snapshot
//!
//! Templates embed reference tokens (`@self.content.title`,
//! `@type:角色卡[last].content.name`, `@stage:current.stage_target`, ...)
//! that are resolved against an immutable snapshot of cards and substituted
//! into the surrounding text. Resolution is pure, synchronous and
//! infallible: a failed token renders as an inline marker and never aborts
//! the template.
//!
//! # Example
//!
//! ```rust
//! use card_context::{resolve, Card};
//! use serde_json::json;
//!
//! let cards = vec![
//!     Card::new(1, "章节大纲", "第一章").with_content(json!({"title": "Ch1"})),
//! ];
//!
//! let out = resolve("@self.content.title", &cards, Some(&cards[0]));
//! assert_eq!(out, "Ch1");
//! ```

pub mod card;
pub mod error;
pub mod parser;
pub mod resolver;
pub mod vocabulary;

pub use card::Card;
pub use error::ResolveFailure;
pub use resolver::Resolver;
pub use vocabulary::{Vocabulary, VocabularyError};

/// Configuration for a resolution call
#[derive(Debug, Clone, Default)]
pub struct ResolveConfig {
    /// Product vocabulary consulted by the contextual selectors
    pub vocabulary: Vocabulary,
}

impl ResolveConfig {
    /// Create a configuration with the default vocabulary
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the vocabulary
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }
}

/// Resolve a template against a card snapshot with the default vocabulary.
///
/// This is the main entry point for the library. The snapshot and the
/// current card are borrowed for the duration of the call and never
/// mutated; the returned string is the template with every reference token
/// replaced by its resolved text or an inline failure marker.
pub fn resolve(template: &str, cards: &[Card], current: Option<&Card>) -> String {
    resolve_with_config(template, cards, current, &ResolveConfig::default())
}

/// Resolve a template with an explicit configuration
pub fn resolve_with_config(
    template: &str,
    cards: &[Card],
    current: Option<&Card>,
    config: &ResolveConfig,
) -> String {
    Resolver::new(cards, current, &config.vocabulary).render(template)
}
