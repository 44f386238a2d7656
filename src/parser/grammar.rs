//! Token grammar - parses one reference token into a [`Selector`]
//!
//! Parse attempts run in a fixed priority order: the contextual schemes
//! (`stage:current`, `chapters:previous`), then `type:`, then `self` and
//! `parent`, then the card-title fallback. A token matching none of these is
//! an invalid reference. The filter text of a `type:` selector is extracted
//! bracket-aware so predicates may carry nested JSON literals.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::error::ResolveFailure;

use super::ast::{
    CmpOp, Condition, Filter, IndexArg, IndexExpr, PathSpec, Predicate, PrevScope, Selector,
    ValueExpr,
};

static SELF_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$self\.(.+?)(?:\s*([+-])\s*(\d+))?$").expect("valid pattern")
});
static PARENT_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$parent\.(.+?)(?:\s*([+-])\s*(\d+))?$").expect("valid pattern")
});
static CURRENT_FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$current\.(.+?)(?:\s*([+-])\s*(\d+))?$").expect("valid pattern")
});
static VOLUME_OFFSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\$current\.volumeNumber\s*([+-])\s*(\d+)$").expect("valid pattern")
});
static NUMBER_LIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?\d+(?:\.\d+)?$").expect("valid pattern"));

/// Parse a reference token (leading `@` tolerated) into a selector.
pub fn parse_selector(raw: &str) -> Result<Selector, ResolveFailure> {
    let token = raw.strip_prefix('@').unwrap_or(raw);
    let invalid = || ResolveFailure::InvalidReference {
        token: raw.to_string(),
    };

    if token == "stage:current" {
        return Ok(Selector::CurrentStage {
            path: String::new(),
        });
    }
    if let Some(path) = token.strip_prefix("stage:current.") {
        return Ok(Selector::CurrentStage {
            path: path.to_string(),
        });
    }
    if token == "chapters:previous" {
        return Ok(Selector::PreviousChapters);
    }
    if let Some(body) = token.strip_prefix("type:") {
        return parse_type_selector(body).ok_or_else(invalid);
    }
    if token == "self" {
        return Ok(Selector::CurrentCard {
            path: PathSpec::Content,
        });
    }
    if let Some(rest) = token.strip_prefix("self.") {
        return Ok(Selector::CurrentCard {
            path: PathSpec::parse(rest),
        });
    }
    if token == "parent" {
        return Ok(Selector::ParentCard {
            path: PathSpec::Content,
        });
    }
    if let Some(rest) = token.strip_prefix("parent.") {
        return Ok(Selector::ParentCard {
            path: PathSpec::parse(rest),
        });
    }

    // Title fallback. Schemes are exhausted above, so a colon here is an
    // unknown scheme, not a title.
    let (title, rest) = match token.split_once('.') {
        Some((t, r)) => (t, Some(r)),
        None => (token, None),
    };
    if title.is_empty()
        || title
            .chars()
            .any(|c| c == ':' || c == '[' || c.is_whitespace())
    {
        return Err(invalid());
    }
    Ok(Selector::ByTitle {
        title: title.to_string(),
        path: rest.map(PathSpec::parse).unwrap_or(PathSpec::Content),
    })
}

fn parse_type_selector(body: &str) -> Option<Selector> {
    let name_end = body.find(|c: char| c == '[' || c == '.').unwrap_or(body.len());
    let type_name = &body[..name_end];
    if type_name.is_empty() || type_name.contains(char::is_whitespace) {
        return None;
    }

    let mut rest = &body[name_end..];
    let mut filter = None;
    if let Some(inner) = rest.strip_prefix('[') {
        let close = matching_bracket(inner)?;
        // an unrecognized filter word falls back to the first candidate
        filter = parse_filter(&inner[..close]);
        rest = &inner[close + 1..];
    }

    let path = if rest.is_empty() {
        PathSpec::Content
    } else {
        PathSpec::parse(rest.strip_prefix('.')?)
    };

    Some(Selector::ByType {
        type_name: type_name.to_string(),
        filter,
        path,
    })
}

/// Index of the `]` closing the bracket this text was opened with, honoring
/// nested brackets and quoted spans.
fn matching_bracket(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut prev = '\0';
    for (i, ch) in text.char_indices() {
        if let Some(open) = quote {
            if ch == open && prev != '\\' {
                quote = None;
            }
        } else {
            match ch {
                '"' | '\'' => quote = Some(ch),
                '[' => depth += 1,
                ']' => {
                    if depth == 0 {
                        return Some(i);
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        prev = ch;
    }
    None
}

fn parse_filter(text: &str) -> Option<Filter> {
    let text = text.trim();
    match text {
        "first" => return Some(Filter::First),
        "last" => return Some(Filter::Last),
        "sibling" => return Some(Filter::Sibling),
        _ => {}
    }
    if let Some(expr) = text.strip_prefix("index=") {
        return Some(Filter::Index(parse_index_arg(expr.trim())));
    }
    if text == "previous" || text.starts_with("previous:") {
        let mut scope = PrevScope::Global;
        let mut take = None;
        for part in text.split(':').skip(1) {
            match part {
                "global" => scope = PrevScope::Global,
                "local" => scope = PrevScope::Local,
                _ => {
                    if let Ok(n) = part.parse::<usize>() {
                        if n > 0 {
                            take = Some(n);
                        }
                    }
                }
            }
        }
        return Some(Filter::Previous { scope, take });
    }
    None
}

fn parse_index_arg(expr: &str) -> Option<IndexArg> {
    if let Some(predicate) = parse_predicate(expr) {
        return Some(IndexArg::Where(predicate));
    }
    parse_index_expr(expr).map(IndexArg::At)
}

/// Parse a `&&`-joined conjunction of `field <op> rhs` conditions.
///
/// Returns `None` when any part is not a recognizable condition, in which
/// case the caller retries the text as a position expression.
pub(crate) fn parse_predicate(expr: &str) -> Option<Predicate> {
    let body = expr.trim();
    let body = body.strip_prefix("filter:").map(str::trim).unwrap_or(body);
    if body.is_empty() {
        return None;
    }
    let mut conditions = Vec::new();
    for part in body.split("&&") {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        conditions.push(parse_condition(part)?);
    }
    if conditions.is_empty() {
        None
    } else {
        Some(Predicate { conditions })
    }
}

fn parse_condition(part: &str) -> Option<Condition> {
    if let Some(at) = part.find(" in ") {
        return Some(Condition {
            field: normalize_field(&part[..at]),
            op: CmpOp::In,
            rhs: parse_value_expr(&part[at + 4..]),
        });
    }
    // the first operator found wins, checked `<` then `>` then `=`
    for (needle, op) in [(" < ", CmpOp::Lt), (" > ", CmpOp::Gt), (" = ", CmpOp::Eq)] {
        if let Some(at) = part.find(needle) {
            return Some(Condition {
                field: normalize_field(&part[..at]),
                op,
                rhs: parse_value_expr(&part[at + 3..]),
            });
        }
    }
    None
}

/// Drop a leading `card.` and qualify the path with `content.`
fn normalize_field(field: &str) -> String {
    let field = field.trim();
    let field = field.strip_prefix("card.").unwrap_or(field);
    if field.starts_with("content.") {
        field.to_string()
    } else {
        format!("content.{field}")
    }
}

fn parse_index_expr(expr: &str) -> Option<IndexExpr> {
    let text = expr.trim();
    match text {
        "last" => return Some(IndexExpr::Last),
        "first" => return Some(IndexExpr::First),
        "$current.chapterNumber" => return Some(IndexExpr::ChapterNumber),
        "$current.volumeNumber" => return Some(IndexExpr::VolumeNumber { offset: 0 }),
        _ => {}
    }
    if let Some(digits) = text.strip_prefix('-') {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return Some(IndexExpr::FromEnd(digits.parse().ok()?));
        }
    }
    if let Some(cap) = VOLUME_OFFSET.captures(text) {
        return Some(IndexExpr::VolumeNumber {
            offset: signed_offset(&cap[1], &cap[2])?,
        });
    }
    if let Some(cap) = SELF_FIELD.captures(text) {
        return Some(IndexExpr::SelfField {
            path: cap[1].to_string(),
            offset: capture_offset(&cap),
        });
    }
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        return Some(IndexExpr::Absolute(text.parse().ok()?));
    }
    None
}

/// Parse a right-hand value expression. Never fails: unrecognized text is a
/// bare string literal.
pub(crate) fn parse_value_expr(raw: &str) -> ValueExpr {
    let text = raw.trim();
    if let Some(cap) = SELF_FIELD.captures(text) {
        return ValueExpr::SelfField {
            path: cap[1].to_string(),
            offset: capture_offset(&cap),
        };
    }
    if let Some(cap) = PARENT_FIELD.captures(text) {
        return ValueExpr::ParentField {
            path: cap[1].to_string(),
            offset: capture_offset(&cap),
        };
    }
    if let Some(cap) = CURRENT_FIELD.captures(text) {
        return ValueExpr::CurrentField {
            path: cap[1].to_string(),
            offset: capture_offset(&cap),
        };
    }
    if (text.starts_with('[') && text.ends_with(']'))
        || (text.starts_with('{') && text.ends_with('}'))
    {
        if let Ok(value) = serde_json::from_str::<Value>(text) {
            return ValueExpr::Literal(value);
        }
    }
    if NUMBER_LIT.is_match(text) {
        if let Ok(n) = text.parse::<f64>() {
            return ValueExpr::Number(n);
        }
    }
    if text.len() >= 2
        && ((text.starts_with('"') && text.ends_with('"'))
            || (text.starts_with('\'') && text.ends_with('\'')))
    {
        return ValueExpr::Text(text[1..text.len() - 1].to_string());
    }
    ValueExpr::Text(text.to_string())
}

fn capture_offset(cap: &Captures<'_>) -> i64 {
    match (cap.get(2), cap.get(3)) {
        (Some(sign), Some(digits)) => {
            signed_offset(sign.as_str(), digits.as_str()).unwrap_or(0)
        }
        _ => 0,
    }
}

fn signed_offset(sign: &str, digits: &str) -> Option<i64> {
    let n: i64 = digits.parse().ok()?;
    Some(if sign == "-" { -n } else { n })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_current_with_and_without_path() {
        assert_eq!(
            parse_selector("@stage:current"),
            Ok(Selector::CurrentStage {
                path: String::new()
            })
        );
        assert_eq!(
            parse_selector("@stage:current.stage_target"),
            Ok(Selector::CurrentStage {
                path: "stage_target".to_string()
            })
        );
    }

    #[test]
    fn test_chapters_previous() {
        assert_eq!(parse_selector("@chapters:previous"), Ok(Selector::PreviousChapters));
    }

    #[test]
    fn test_type_selector_plain() {
        assert_eq!(
            parse_selector("@type:分卷大纲"),
            Ok(Selector::ByType {
                type_name: "分卷大纲".to_string(),
                filter: None,
                path: PathSpec::Content,
            })
        );
    }

    #[test]
    fn test_type_selector_with_filter_and_path() {
        assert_eq!(
            parse_selector("@type:分卷大纲[last].content.volume_outline"),
            Ok(Selector::ByType {
                type_name: "分卷大纲".to_string(),
                filter: Some(Filter::Last),
                path: PathSpec::Single("content.volume_outline".to_string()),
            })
        );
    }

    #[test]
    fn test_type_selector_index_position() {
        let selector = parse_selector("@type:x[index=$current.volumeNumber-1].content").unwrap();
        match selector {
            Selector::ByType { filter, .. } => assert_eq!(
                filter,
                Some(Filter::Index(Some(IndexArg::At(IndexExpr::VolumeNumber {
                    offset: -1
                }))))
            ),
            other => panic!("Expected ByType, got {:?}", other),
        }
    }

    #[test]
    fn test_type_selector_index_predicate_with_nested_json() {
        let selector =
            parse_selector(r#"@type:角色卡[index=name in ["Alice", "Bob"]].content.name"#).unwrap();
        match selector {
            Selector::ByType { filter, .. } => match filter {
                Some(Filter::Index(Some(IndexArg::Where(predicate)))) => {
                    assert_eq!(predicate.conditions.len(), 1);
                    assert_eq!(predicate.conditions[0].field, "content.name");
                    assert_eq!(predicate.conditions[0].op, CmpOp::In);
                }
                other => panic!("Expected predicate filter, got {:?}", other),
            },
            other => panic!("Expected ByType, got {:?}", other),
        }
    }

    #[test]
    fn test_type_selector_unresolvable_index() {
        let selector = parse_selector("@type:x[index=nonsense]").unwrap();
        match selector {
            Selector::ByType { filter, .. } => assert_eq!(filter, Some(Filter::Index(None))),
            other => panic!("Expected ByType, got {:?}", other),
        }
    }

    #[test]
    fn test_previous_filter_parts() {
        let selector = parse_selector("@type:章节大纲[previous:local:3]").unwrap();
        match selector {
            Selector::ByType { filter, .. } => assert_eq!(
                filter,
                Some(Filter::Previous {
                    scope: PrevScope::Local,
                    take: Some(3)
                })
            ),
            other => panic!("Expected ByType, got {:?}", other),
        }
    }

    #[test]
    fn test_previous_filter_defaults_global() {
        let selector = parse_selector("@type:章节大纲[previous]").unwrap();
        match selector {
            Selector::ByType { filter, .. } => assert_eq!(
                filter,
                Some(Filter::Previous {
                    scope: PrevScope::Global,
                    take: None
                })
            ),
            other => panic!("Expected ByType, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_filter_word_is_ignored() {
        let selector = parse_selector("@type:x[whatever]").unwrap();
        match selector {
            Selector::ByType { filter, .. } => assert_eq!(filter, None),
            other => panic!("Expected ByType, got {:?}", other),
        }
    }

    #[test]
    fn test_self_and_parent() {
        assert_eq!(
            parse_selector("@self.content.title"),
            Ok(Selector::CurrentCard {
                path: PathSpec::Single("content.title".to_string())
            })
        );
        assert_eq!(
            parse_selector("@parent"),
            Ok(Selector::ParentCard {
                path: PathSpec::Content
            })
        );
    }

    #[test]
    fn test_self_with_multipath() {
        assert_eq!(
            parse_selector("@self.{content.name,title}"),
            Ok(Selector::CurrentCard {
                path: PathSpec::Multi(vec!["content.name".to_string(), "title".to_string()])
            })
        );
    }

    #[test]
    fn test_title_fallback() {
        assert_eq!(
            parse_selector("@核心蓝图.content.world_name"),
            Ok(Selector::ByTitle {
                title: "核心蓝图".to_string(),
                path: PathSpec::Single("content.world_name".to_string()),
            })
        );
    }

    #[test]
    fn test_unknown_scheme_is_invalid() {
        assert_eq!(
            parse_selector("@foo:bar"),
            Err(ResolveFailure::InvalidReference {
                token: "@foo:bar".to_string()
            })
        );
    }

    #[test]
    fn test_empty_token_is_invalid() {
        assert!(parse_selector("@").is_err());
    }

    #[test]
    fn test_unterminated_filter_is_invalid() {
        assert!(parse_selector("@type:x[index=1").is_err());
    }

    #[test]
    fn test_predicate_conjunction() {
        let predicate = parse_predicate("card.status = \"active\" && priority > 2").unwrap();
        assert_eq!(predicate.conditions.len(), 2);
        assert_eq!(predicate.conditions[0].field, "content.status");
        assert_eq!(predicate.conditions[0].op, CmpOp::Eq);
        assert_eq!(predicate.conditions[1].field, "content.priority");
        assert_eq!(predicate.conditions[1].op, CmpOp::Gt);
    }

    #[test]
    fn test_predicate_rejects_plain_expression() {
        assert!(parse_predicate("42").is_none());
        assert!(parse_predicate("last").is_none());
    }

    #[test]
    fn test_index_expr_forms() {
        assert_eq!(parse_index_expr("3"), Some(IndexExpr::Absolute(3)));
        assert_eq!(parse_index_expr("-1"), Some(IndexExpr::FromEnd(1)));
        assert_eq!(parse_index_expr("last"), Some(IndexExpr::Last));
        assert_eq!(parse_index_expr("first"), Some(IndexExpr::First));
        assert_eq!(
            parse_index_expr("$self.content.chapter_number - 1"),
            Some(IndexExpr::SelfField {
                path: "content.chapter_number".to_string(),
                offset: -1
            })
        );
        assert_eq!(
            parse_index_expr("$current.volumeNumber+2"),
            Some(IndexExpr::VolumeNumber { offset: 2 })
        );
        assert_eq!(parse_index_expr("garbage"), None);
    }

    #[test]
    fn test_value_expr_forms() {
        assert_eq!(
            parse_value_expr("\"quoted\""),
            ValueExpr::Text("quoted".to_string())
        );
        assert_eq!(parse_value_expr("3.5"), ValueExpr::Number(3.5));
        assert_eq!(parse_value_expr("bare"), ValueExpr::Text("bare".to_string()));
        assert_eq!(
            parse_value_expr("$parent.content.volume_number + 1"),
            ValueExpr::ParentField {
                path: "content.volume_number".to_string(),
                offset: 1
            }
        );
        match parse_value_expr(r#"[{"name": "Alice"}]"#) {
            ValueExpr::Literal(value) => assert!(value.is_array()),
            other => panic!("Expected Literal, got {:?}", other),
        }
    }
}
