//! Failure taxonomy for token resolution
//!
//! Resolution never escapes the renderer as an error: every failure is
//! rendered into the output as an inline marker, so `Display` here *is* the
//! marker text. Expression-level gaps (unresolvable index, out-of-range
//! position, non-comparable operands) are not failures at all - they resolve
//! to empty text.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveFailure {
    /// Token matched no grammar rule (unknown scheme, malformed body,
    /// empty token)
    #[error("[Error: Invalid reference '{token}']")]
    InvalidReference { token: String },

    /// No card of the requested type exists in the snapshot
    #[error("[未找到卡片类型: {type_name}]")]
    TypeNotFound { type_name: String },

    /// No card matched a title selector, or `self`/`parent` has no card to
    /// resolve against
    #[error("[未找到卡片: {selector}]")]
    CardNotFound { selector: String },

    /// The selected card has no value at the requested path
    #[error("[字段未找到: {path}]")]
    FieldNotFound { path: String },
}
