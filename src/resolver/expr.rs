//! Expression evaluation - index positions, filter predicates, and
//! right-hand value expressions
//!
//! Evaluation never fails: an unresolvable operand means "no selection" for
//! index expressions and "no match" for predicate conditions.

use std::cmp::Ordering;

use serde_json::Value;

use crate::card::Card;
use crate::parser::ast::{CmpOp, Condition, IndexExpr, Predicate, ValueExpr};

use super::path::{number_text, read_card, read_value};
use super::Resolver;

/// Evaluate an index expression into a 0-based candidate position.
///
/// `None` covers both unresolvable operands and out-of-range positions;
/// either renders as empty text.
pub fn eval_index(expr: &IndexExpr, resolver: &Resolver<'_>, len: usize) -> Option<usize> {
    let position = match expr {
        IndexExpr::First => Some(1),
        IndexExpr::Last => return len.checked_sub(1),
        IndexExpr::Absolute(n) => Some(*n as i64),
        // counted from the end, clamped to the first candidate
        IndexExpr::FromEnd(n) => Some((len as i64 + 1 - *n as i64).max(1)),
        IndexExpr::SelfField { path, offset } => {
            let value = read_card(resolver.current()?, path)?;
            coerce_i64(&value).map(|n| n + offset)
        }
        IndexExpr::VolumeNumber { offset } => {
            resolver.vars().volume_number.map(|n| n + offset)
        }
        IndexExpr::ChapterNumber => resolver.vars().chapter_number,
    }?;
    if position >= 1 && position <= len as i64 {
        Some(position as usize - 1)
    } else {
        None
    }
}

/// Test a candidate card against a filter predicate
pub fn matches(predicate: &Predicate, card: &Card, resolver: &Resolver<'_>) -> bool {
    predicate
        .conditions
        .iter()
        .all(|condition| matches_condition(condition, card, resolver))
}

fn matches_condition(condition: &Condition, card: &Card, resolver: &Resolver<'_>) -> bool {
    let lhs = condition_lhs(condition, card);
    let rhs = eval_value(&condition.rhs, resolver);
    match condition.op {
        CmpOp::In => {
            let needle = lhs.to_lowercase();
            normalize_string_set(rhs.as_ref())
                .iter()
                .any(|s| s.to_lowercase() == needle)
        }
        CmpOp::Eq => {
            let rhs = rhs_scalar(rhs);
            match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
                (Ok(a), Ok(b)) => a == b,
                _ => lhs == rhs,
            }
        }
        CmpOp::Lt | CmpOp::Gt => {
            let rhs = rhs_scalar(rhs);
            let ordering = match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
                (Ok(a), Ok(b)) => a.partial_cmp(&b),
                _ => Some(lhs.as_str().cmp(rhs.as_str())),
            };
            matches!(
                (condition.op, ordering),
                (CmpOp::Lt, Some(Ordering::Less)) | (CmpOp::Gt, Some(Ordering::Greater))
            )
        }
    }
}

// `name`-like fields fall back to the card title, then `content.title`,
// when the stored value is absent or blank
fn condition_lhs(condition: &Condition, card: &Card) -> String {
    let value = read_card(card, &condition.field);
    let blank = match &value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    };
    if blank && condition.field.ends_with(".name") {
        if !card.title.is_empty() {
            return card.title.clone();
        }
        return scalar_text(read_value(&card.content, "title"));
    }
    scalar_text(value.as_ref())
}

/// Evaluate a right-hand value expression
pub fn eval_value(expr: &ValueExpr, resolver: &Resolver<'_>) -> Option<Value> {
    match expr {
        ValueExpr::SelfField { path, offset } => {
            with_offset(read_card(resolver.current()?, path), *offset)
        }
        ValueExpr::ParentField { path, offset } => {
            with_offset(read_card(resolver.parent_card()?, path), *offset)
        }
        ValueExpr::CurrentField { path, offset } => {
            let full = if path.starts_with("content.") {
                path.clone()
            } else {
                format!("content.{path}")
            };
            with_offset(read_card(resolver.current()?, &full), *offset)
        }
        ValueExpr::Literal(value) => Some(value.clone()),
        ValueExpr::Number(n) => Some(number_value(*n)),
        ValueExpr::Text(s) => Some(Value::String(s.clone())),
    }
}

// a numeric base takes the offset; anything else passes through unchanged
fn with_offset(value: Option<Value>, offset: i64) -> Option<Value> {
    let value = value?;
    match coerce_f64(&value) {
        Some(base) => Some(number_value(base + offset as f64)),
        None => Some(value),
    }
}

fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(&n) {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Flatten a value into a deduplicated string set for `in` comparison.
///
/// Sequences flatten recursively; mapping elements contribute their first
/// present `name`/`title`/`label`/`content.name` field and are otherwise
/// skipped.
pub fn normalize_string_set(value: Option<&Value>) -> Vec<String> {
    let mut flat = Vec::new();
    if let Some(v) = value {
        flatten(v, &mut flat);
    }
    let mut out: Vec<String> = Vec::new();
    for item in flat {
        let text = match item {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(number_text(n)),
            Value::Bool(b) => Some(b.to_string()),
            Value::Object(_) => ["name", "title", "label", "content.name"]
                .iter()
                .find_map(|p| read_value(item, p))
                .filter(|v| !v.is_null())
                .map(|v| scalar_text(Some(v))),
            _ => None,
        };
        if let Some(text) = text {
            if !out.contains(&text) {
                out.push(text);
            }
        }
    }
    out
}

fn flatten<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Null => {}
        Value::Array(items) => items.iter().for_each(|v| flatten(v, out)),
        other => out.push(other),
    }
}

// a sequence RHS contributes its first element to scalar comparisons
fn rhs_scalar(value: Option<Value>) -> String {
    match value {
        Some(Value::Array(items)) => scalar_text(items.first()),
        other => scalar_text(other.as_ref()),
    }
}

fn scalar_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => number_text(n),
        Some(composite) => serde_json::to_string(composite).unwrap_or_default(),
    }
}

/// Numeric coercion used by context variables and index expressions:
/// JSON numbers and numeric strings, integral values only
pub fn coerce_i64(value: &Value) -> Option<i64> {
    let n = coerce_f64(value)?;
    if n.is_finite() && n.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(&n) {
        Some(n as i64)
    } else {
        None
    }
}

/// JSON numbers and numeric strings as floats
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
