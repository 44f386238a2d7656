//! Tree ordering - the preorder traversal and sibling/ancestor lookups that
//! selector resolution depends on

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::card::Card;

static VOLUME_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^第(\d+)卷$").expect("valid pattern"));

/// Volume number of a `第N卷` title
pub fn volume_number_in_title(title: &str) -> Option<i64> {
    VOLUME_TITLE.captures(title)?.get(1)?.as_str().parse().ok()
}

/// Depth-first, parent-before-children traversal of the snapshot.
///
/// Sibling groups and roots are ordered ascending by `display_order`, ties
/// keeping input order. A card whose `parent_id` is missing from the
/// snapshot is a root; cards on a malformed parent cycle are unreachable
/// from any root and are omitted.
pub fn preorder(cards: &[Card]) -> Vec<&Card> {
    let known: HashSet<i64> = cards.iter().map(|c| c.id).collect();
    let mut children: HashMap<i64, Vec<usize>> = HashMap::new();
    let mut roots: Vec<usize> = Vec::new();
    for (i, card) in cards.iter().enumerate() {
        match card.parent_id {
            Some(parent) if known.contains(&parent) => {
                children.entry(parent).or_default().push(i)
            }
            _ => roots.push(i),
        }
    }

    let by_order = |a: &usize, b: &usize| cards[*a].display_order.cmp(&cards[*b].display_order);
    roots.sort_by(by_order);
    for group in children.values_mut() {
        group.sort_by(by_order);
    }

    let mut out = Vec::with_capacity(cards.len());
    let mut stack: Vec<usize> = roots.into_iter().rev().collect();
    while let Some(i) = stack.pop() {
        out.push(&cards[i]);
        if let Some(group) = children.get(&cards[i].id) {
            stack.extend(group.iter().rev().copied());
        }
    }
    out
}

/// The immediate parent of a card, if present in the snapshot
pub fn parent_of<'a>(cards: &'a [Card], card: &Card) -> Option<&'a Card> {
    let parent_id = card.parent_id?;
    cards.iter().find(|c| c.id == parent_id)
}

/// Nearest ancestor of the given type, walking `parent_id` upward.
/// The hop count is bounded by the snapshot size so a parent cycle
/// terminates.
pub fn nearest_ancestor_of_type<'a>(
    cards: &'a [Card],
    card: &Card,
    type_name: &str,
) -> Option<&'a Card> {
    let mut current = card;
    for _ in 0..cards.len() {
        let parent = parent_of(cards, current)?;
        if parent.type_name == type_name {
            return Some(parent);
        }
        current = parent;
    }
    None
}

/// Stable candidate order for `type:` selection: volume-numbered titles
/// first, ascending by number, then the rest by `display_order`; ties keep
/// the incoming (preorder) position.
pub fn sort_candidates(candidates: &mut [&Card]) {
    candidates.sort_by_key(|c| match volume_number_in_title(&c.title) {
        Some(n) => (0, n, c.display_order),
        None => (1, 0, c.display_order),
    });
}
