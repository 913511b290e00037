//! Choosing among alternative matchings of the same entry.

use std::collections::BTreeSet;

use crate::models::Matching;

/// Number of sentence positions consumed, summed over subwords.
pub fn match_length(matching: &Matching) -> usize {
    matching.iter().map(|(_, positions)| positions.len()).sum()
}

/// Matchings of maximal length. Ties are all kept.
pub fn longest_matches(matchings: &BTreeSet<Matching>) -> BTreeSet<Matching> {
    let Some(longest) = matchings.iter().map(match_length).max() else {
        return BTreeSet::new();
    };
    matchings
        .iter()
        .filter(|m| match_length(m) == longest)
        .cloned()
        .collect()
}
