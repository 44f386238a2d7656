//! Card records - the hierarchical content snapshot the engine resolves against

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A node in the hierarchical content tree.
///
/// `parent_id` links cards into a forest: a card whose parent id is absent
/// from the snapshot is treated as a root. `display_order` orders siblings
/// under one parent; ties keep input order. `content` is an arbitrary nested
/// mapping owned by the host application - the engine never interprets its
/// schema beyond dot-path traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub display_order: i64,
    pub type_name: String,
    #[serde(default)]
    pub content: Value,
}

impl Card {
    /// Create a root card with empty content at display order 0
    pub fn new(id: i64, type_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            parent_id: None,
            display_order: 0,
            type_name: type_name.into(),
            content: Value::Null,
        }
    }

    /// Set the parent card id
    pub fn with_parent(mut self, parent_id: i64) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Set the sibling display order
    pub fn with_order(mut self, display_order: i64) -> Self {
        self.display_order = display_order;
        self
    }

    /// Set the content mapping
    pub fn with_content(mut self, content: Value) -> Self {
        self.content = content;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_chain() {
        let card = Card::new(7, "角色卡", "Alice")
            .with_parent(3)
            .with_order(2)
            .with_content(json!({"name": "Alice"}));
        assert_eq!(card.id, 7);
        assert_eq!(card.parent_id, Some(3));
        assert_eq!(card.display_order, 2);
        assert_eq!(card.content["name"], "Alice");
    }

    #[test]
    fn test_deserialize_defaults_optional_fields() {
        let card: Card =
            serde_json::from_str(r#"{"id": 1, "title": "t", "type_name": "章节大纲"}"#)
                .expect("Should deserialize");
        assert_eq!(card.parent_id, None);
        assert_eq!(card.display_order, 0);
        assert!(card.content.is_null());
    }
}
