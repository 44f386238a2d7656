//! Dot-path reads into cards and content values, and canonical
//! stringification of resolved values

use serde_json::{Map, Value};

use crate::card::Card;

/// Read a card-rooted dot path.
///
/// The first segment addresses the card itself (`content`, `title`, `id`,
/// `parent_id`, `display_order`, `type_name`); the remaining segments walk
/// the content mapping. An absent path is `None` - distinct from a present
/// `null`, which stringifies to empty text without being a miss.
pub fn read_card(card: &Card, path: &str) -> Option<Value> {
    if path.is_empty() {
        return None;
    }
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    match head {
        "content" => match rest {
            Some(rest) => read_value(&card.content, rest).cloned(),
            None => Some(card.content.clone()),
        },
        "title" => scalar(rest, Value::String(card.title.clone())),
        "id" => scalar(rest, Value::from(card.id)),
        "parent_id" => scalar(rest, card.parent_id.map(Value::from).unwrap_or(Value::Null)),
        "display_order" => scalar(rest, Value::from(card.display_order)),
        "type_name" => scalar(rest, Value::String(card.type_name.clone())),
        _ => None,
    }
}

fn scalar(rest: Option<&str>, value: Value) -> Option<Value> {
    match rest {
        None => Some(value),
        Some(_) => None,
    }
}

/// Walk a dot path through a JSON value; the empty path is the value itself.
/// Sequences accept numeric segments.
pub fn read_value<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Canonical text form of a resolved value: absent and `null` are empty,
/// scalars take their direct text form, mappings and sequences pretty-print
/// as JSON with the content's own key order.
pub fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => number_text(n),
        Some(composite) => serde_json::to_string_pretty(composite).unwrap_or_default(),
    }
}

/// Direct text form of a number; integral floats render without `.0`
pub(crate) fn number_text(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    n.as_f64()
        .map(|f| f.to_string())
        .unwrap_or_else(|| n.to_string())
}

/// Multi-path projection: a mapping keyed by each path's final segment,
/// absent paths omitted.
pub fn pick_fields(card: &Card, paths: &[String]) -> Value {
    let mut out = Map::new();
    for path in paths {
        if let Some(value) = read_card(card, path) {
            let key = path.rsplit('.').next().unwrap_or(path.as_str());
            out.insert(key.to_string(), value);
        }
    }
    Value::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card() -> Card {
        Card::new(5, "角色卡", "Alice")
            .with_order(3)
            .with_content(json!({
                "name": "Alice",
                "traits": {"tone": "dry"},
                "tags": ["a", "b"],
                "empty": null
            }))
    }

    #[test]
    fn test_read_card_content_path() {
        assert_eq!(
            read_card(&card(), "content.traits.tone"),
            Some(json!("dry"))
        );
    }

    #[test]
    fn test_read_card_scalar_heads() {
        let c = card();
        assert_eq!(read_card(&c, "title"), Some(json!("Alice")));
        assert_eq!(read_card(&c, "id"), Some(json!(5)));
        assert_eq!(read_card(&c, "display_order"), Some(json!(3)));
        assert_eq!(read_card(&c, "parent_id"), Some(Value::Null));
        assert_eq!(read_card(&c, "type_name"), Some(json!("角色卡")));
    }

    #[test]
    fn test_read_card_absent_vs_null() {
        let c = card();
        assert_eq!(read_card(&c, "content.missing"), None);
        assert_eq!(read_card(&c, "content.empty"), Some(Value::Null));
        assert_eq!(read_card(&c, "title.deeper"), None);
        assert_eq!(read_card(&c, "unknown_head"), None);
    }

    #[test]
    fn test_read_value_array_index() {
        let root = json!({"tags": ["a", "b"]});
        assert_eq!(read_value(&root, "tags.1"), Some(&json!("b")));
        assert_eq!(read_value(&root, "tags.9"), None);
        assert_eq!(read_value(&root, "tags.x"), None);
    }

    #[test]
    fn test_read_value_empty_path_is_identity() {
        let root = json!({"a": 1});
        assert_eq!(read_value(&root, ""), Some(&root));
    }

    #[test]
    fn test_stringify_scalars() {
        assert_eq!(stringify(None), "");
        assert_eq!(stringify(Some(&Value::Null)), "");
        assert_eq!(stringify(Some(&json!("text"))), "text");
        assert_eq!(stringify(Some(&json!(3))), "3");
        assert_eq!(stringify(Some(&json!(3.5))), "3.5");
        assert_eq!(stringify(Some(&json!(true))), "true");
    }

    #[test]
    fn test_stringify_mapping_keeps_key_order() {
        let value = json!({"z": 1, "a": 2});
        assert_eq!(stringify(Some(&value)), "{\n  \"z\": 1,\n  \"a\": 2\n}");
    }

    #[test]
    fn test_stringify_empty_sequence() {
        assert_eq!(stringify(Some(&json!([]))), "[]");
    }

    #[test]
    fn test_pick_fields_omits_absent() {
        let c = card();
        let picked = pick_fields(
            &c,
            &[
                "content.name".to_string(),
                "title".to_string(),
                "content.missing".to_string(),
            ],
        );
        assert_eq!(picked, json!({"name": "Alice", "title": "Alice"}));
    }
}
