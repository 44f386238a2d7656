//! Rendered-output regression tests
//!
//! Pin the exact rendered text of representative templates so changes to
//! stringification or marker formatting show up as snapshot diffs.

use card_context::{resolve, Card};
use serde_json::json;

fn snapshot_cards() -> Vec<Card> {
    vec![
        Card::new(1, "角色卡", "主角")
            .with_order(0)
            .with_content(json!({"name": "Alice", "rank": 3})),
        Card::new(2, "角色卡", "配角")
            .with_order(1)
            .with_content(json!({"name": "Bob"})),
    ]
}

#[test]
fn test_scalar_substitution() {
    let cards = snapshot_cards();
    let out = resolve(
        "角色 @self.content.name rank=@self.content.rank done",
        &cards,
        Some(&cards[0]),
    );
    insta::assert_snapshot!(out, @"角色 Alice rank=3 done");
}

#[test]
fn test_failure_markers_inline() {
    let cards = snapshot_cards();
    let out = resolve("@foo:bar 与 @type:不存在", &cards, None);
    insta::assert_snapshot!(out, @"[Error: Invalid reference '@foo:bar'] 与 [未找到卡片类型: 不存在]");
}

#[test]
fn test_multipath_block() {
    let cards = snapshot_cards();
    let out = resolve("@self.{content.name,title}", &cards, Some(&cards[0]));
    insta::assert_snapshot!(out, @r#"
{
  "name": "Alice",
  "title": "主角"
}
"#);
}

#[test]
fn test_sibling_singleton_unwraps() {
    let cards = snapshot_cards();
    let out = resolve("@type:角色卡[sibling].content.name", &cards, Some(&cards[0]));
    insta::assert_snapshot!(out, @"Bob");
}
