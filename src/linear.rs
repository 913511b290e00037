//! Linear (token sequence) matching.
//!
//! From an anchor position the entry is extended one subword at a time towards the left and
//! towards the right. Wildcard slots may keep consuming tokens in the same direction, which
//! makes the search branch; branches are kept on an explicit stack so long sentences cannot
//! exhaust the native stack.

use std::collections::BTreeSet;

use crate::features::{match_any, LemmaFeatureMap};
use crate::models::{Entry, Matching, Subword};

/// Direction of a linear extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    fn step(self) -> isize {
        match self {
            Direction::Left => -1,
            Direction::Right => 1,
        }
    }
}

fn in_bounds(idx: isize, len: usize) -> bool {
    idx >= 0 && (idx as usize) < len
}

/// All partial matchings of `subwords` starting at (`subword_idx`, `position`) and moving
/// in `direction`.
///
/// Running off the end of the subwords is success; running off the sentence with subwords
/// left is failure. The result always contains the empty matching when there is nothing
/// to match in that direction.
pub fn extend(
    subwords: &[Subword],
    features: &[LemmaFeatureMap],
    subword_idx: isize,
    position: isize,
    direction: Direction,
    extend_wildcards: bool,
) -> BTreeSet<Matching> {
    let step = direction.step();
    let mut results = BTreeSet::new();
    let mut stack = vec![(subword_idx, position, Matching::new())];

    while let Some((subword_idx, position, matching)) = stack.pop() {
        if !in_bounds(subword_idx, subwords.len()) {
            results.insert(matching);
            continue;
        }
        if !in_bounds(position, features.len()) {
            continue;
        }

        let matcher = &subwords[subword_idx as usize].features;
        let Some(kind) = match_any(matcher, &features[position as usize]) else {
            continue;
        };

        let next = matching.with(subword_idx as usize, position as usize);
        if kind.is_wildcard() && extend_wildcards {
            // Slot stays open and absorbs the next token too
            stack.push((subword_idx, position + step, next.clone()));
        }
        stack.push((subword_idx + step, position + step, next));
    }

    results
}

/// Full matchings of `entry` with its key subword fixed at `anchor`.
///
/// The key's own feature compatibility is checked by the caller. Empty when either side
/// cannot be completed.
pub fn match_anchor(
    entry: &Entry,
    anchor: usize,
    features: &[LemmaFeatureMap],
    extend_wildcards: bool,
) -> BTreeSet<Matching> {
    if entry.key_idx >= entry.subwords.len() || anchor >= features.len() {
        return BTreeSet::new();
    }
    let key_idx = entry.key_idx as isize;
    let anchor_pos = anchor as isize;

    let left = extend(
        &entry.subwords,
        features,
        key_idx - 1,
        anchor_pos - 1,
        Direction::Left,
        extend_wildcards,
    );
    if left.is_empty() {
        return BTreeSet::new();
    }
    let right = extend(
        &entry.subwords,
        features,
        key_idx + 1,
        anchor_pos + 1,
        Direction::Right,
        extend_wildcards,
    );
    if right.is_empty() {
        return BTreeSet::new();
    }

    let key_matching = Matching::single(entry.key_idx, anchor);
    let mut matchings = BTreeSet::new();
    for left_matching in &left {
        let with_key = left_matching.merged(&key_matching);
        for right_matching in &right {
            matchings.insert(with_key.merged(right_matching));
        }
    }
    matchings
}
