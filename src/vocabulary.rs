//! Product vocabulary - the card type names and content keys the contextual
//! selectors depend on
//!
//! The `stage:current`, `chapters:previous` and `previous` selectors need to
//! know which card types hold volume and chapter outlines, which types are
//! entity cards, and under which wrapper keys outline content may be nested.
//! The defaults are the names the host product ships with; a host can load a
//! different set from TOML without touching the engine.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading or parsing a vocabulary
#[derive(Error, Debug)]
pub enum VocabularyError {
    #[error("Failed to read vocabulary file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse vocabulary TOML: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Names consulted by the contextual selectors
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Vocabulary {
    /// Card type holding a volume outline
    pub volume_outline_type: String,
    /// Card type holding a chapter outline
    pub chapter_outline_type: String,
    /// Entity card types subject to the short-lived cross-volume filter
    pub entity_types: Vec<String>,
    /// `content.life_span` value marking an entity as short-lived
    pub short_lived_value: String,
    /// Wrapper keys under which volume-outline content may be nested
    pub outline_wrapper_keys: Vec<String>,
    /// Fields whose presence marks a content mapping as an already
    /// unwrapped volume outline
    pub outline_hallmark_fields: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            volume_outline_type: "分卷大纲".to_string(),
            chapter_outline_type: "章节大纲".to_string(),
            entity_types: vec![
                "角色卡".to_string(),
                "场景卡".to_string(),
                "组织卡".to_string(),
            ],
            short_lived_value: "短期".to_string(),
            outline_wrapper_keys: vec![
                "volume_outline".to_string(),
                "VolumeOutline".to_string(),
                "volumeOutline".to_string(),
                "volume_outline_response".to_string(),
                "VolumeOutlineResponse".to_string(),
            ],
            outline_hallmark_fields: vec![
                "stage_lines".to_string(),
                "main_target".to_string(),
                "thinking".to_string(),
                "character_snapshot".to_string(),
                "branch_line".to_string(),
            ],
        }
    }
}

impl Vocabulary {
    /// Load a vocabulary from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, VocabularyError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load a vocabulary from a TOML string; omitted keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, VocabularyError> {
        Ok(toml::from_str(content)?)
    }

    /// Check whether a card type is an entity type
    pub fn is_entity_type(&self, type_name: &str) -> bool {
        self.entity_types.iter().any(|t| t == type_name)
    }
}
