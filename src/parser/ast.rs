//! Abstract syntax for reference tokens

use serde_json::Value;

/// A parsed reference token.
///
/// Variants are listed in grammar priority order: parse attempts run top to
/// bottom and the first match wins, so `stage:`/`chapters:` schemes can never
/// be shadowed by a card title.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// `stage:current[.<path>]` - the stage line covering the current chapter
    CurrentStage { path: String },
    /// `chapters:previous` - chapter outlines before the current chapter
    PreviousChapters,
    /// `type:<name>[<filter>][.<path>]`
    ByType {
        type_name: String,
        filter: Option<Filter>,
        path: PathSpec,
    },
    /// `self[.<path>]` - the current card
    CurrentCard { path: PathSpec },
    /// `parent[.<path>]` - the current card's immediate parent
    ParentCard { path: PathSpec },
    /// `<title>[.<path>]` - first card with an exactly matching title
    ByTitle { title: String, path: PathSpec },
}

/// Bracketed filter on a `type:` selector
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `first` - first candidate in stable order
    First,
    /// `last` - last candidate in stable order
    Last,
    /// `index=<expr>` - a predicate (all matches, as a collection) or a
    /// position (one candidate). `None` when the expression parses as
    /// neither; such a filter selects nothing.
    Index(Option<IndexArg>),
    /// `previous[:local|global][:N]`
    Previous { scope: PrevScope, take: Option<usize> },
    /// `sibling` - same-type cards under the same parent
    Sibling,
}

/// Scope of a `previous` filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrevScope {
    /// All candidates before the current card in global preorder
    Global,
    /// Same-parent candidates before the current card in sibling order
    Local,
}

/// The argument of an `index=` filter
#[derive(Debug, Clone, PartialEq)]
pub enum IndexArg {
    /// All candidates matching a predicate
    Where(Predicate),
    /// One candidate by 1-based position
    At(IndexExpr),
}

/// A position expression inside `index=`
#[derive(Debug, Clone, PartialEq)]
pub enum IndexExpr {
    First,
    Last,
    /// 1-based absolute position
    Absolute(usize),
    /// `-N`: 1-based position from the end, clamped to the first candidate
    FromEnd(usize),
    /// `$self.<path>` plus offset - a numeric field on the current card
    SelfField { path: String, offset: i64 },
    /// `$current.volumeNumber` plus offset
    VolumeNumber { offset: i64 },
    /// `$current.chapterNumber`
    ChapterNumber,
}

/// Conjunction of filter conditions (`&&`-joined)
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub conditions: Vec<Condition>,
}

/// One `field <op> rhs` condition
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Content dot-path; `content.`-qualified during parsing
    pub field: String,
    pub op: CmpOp,
    pub rhs: ValueExpr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    In,
    Eq,
    Lt,
    Gt,
}

/// Right-hand side of a filter condition
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExpr {
    /// `$self.<path>` - card-rooted path on the current card
    SelfField { path: String, offset: i64 },
    /// `$parent.<path>` - card-rooted path on the current card's parent
    ParentField { path: String, offset: i64 },
    /// `$current.<path>` - implicitly `content.`-prefixed path on the
    /// current card
    CurrentField { path: String, offset: i64 },
    /// JSON array or object literal
    Literal(Value),
    Number(f64),
    Text(String),
}

/// Trailing path of a selector
#[derive(Debug, Clone, PartialEq)]
pub enum PathSpec {
    /// No explicit path: the card's whole `content` mapping
    Content,
    /// Single dot-path rooted at the card
    Single(String),
    /// `{a,b,c}`: mapping keyed by each path's final segment
    Multi(Vec<String>),
}

impl PathSpec {
    /// Parse the text after a selector's `.` separator
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('.').unwrap_or(raw);
        if raw.is_empty() {
            return PathSpec::Content;
        }
        if let Some(inner) = raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
            let paths: Vec<String> = inner
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if !paths.is_empty() {
                return PathSpec::Multi(paths);
            }
        }
        PathSpec::Single(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_spec_single() {
        assert_eq!(
            PathSpec::parse("content.name"),
            PathSpec::Single("content.name".to_string())
        );
    }

    #[test]
    fn test_path_spec_multi() {
        assert_eq!(
            PathSpec::parse("{content.name, title}"),
            PathSpec::Multi(vec!["content.name".to_string(), "title".to_string()])
        );
    }

    #[test]
    fn test_path_spec_strips_leading_dot() {
        assert_eq!(PathSpec::parse(".title"), PathSpec::Single("title".to_string()));
    }

    #[test]
    fn test_path_spec_empty_is_content() {
        assert_eq!(PathSpec::parse(""), PathSpec::Content);
    }
}
