//! Morphological feature readings and the compatibility tests built on them.
//!
//! A token (or an entry slot) has one or more candidate lemmas, and each lemma has a set
//! of alternative readings. Compatibility is existential on both sides: some required
//! reading must be a subset of some present reading.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Sentinel lemma for open slots: matches any lemma, constrained only by features.
pub const WILDCARD: &str = "__WILDCARD__";

/// One morphological analysis: a set of (feature name, feature value) pairs.
///
/// Names are stored lowercase and values uppercase, whatever the source used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawReading", into = "Vec<(String, String)>")]
pub struct FeatureReading(BTreeSet<(String, String)>);

/// Readings arrive either as `[[name, value], ...]` or as `{name: value}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawReading {
    Pairs(Vec<(String, String)>),
    Map(BTreeMap<String, String>),
}

impl From<RawReading> for FeatureReading {
    fn from(raw: RawReading) -> Self {
        match raw {
            RawReading::Pairs(pairs) => FeatureReading::from_pairs(pairs),
            RawReading::Map(map) => FeatureReading::from_pairs(map),
        }
    }
}

impl From<FeatureReading> for Vec<(String, String)> {
    fn from(reading: FeatureReading) -> Self {
        reading.0.into_iter().collect()
    }
}

impl FeatureReading {
    /// The empty reading, compatible with everything as a requirement.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a reading from (name, value) pairs, normalizing case.
    pub fn from_pairs<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: AsRef<str>,
    {
        FeatureReading(
            pairs
                .into_iter()
                .map(|(name, value)| normalize_feature(name.as_ref(), value.as_ref()))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// `self ⊆ other` as sets of pairs.
    pub fn is_subset(&self, other: &FeatureReading) -> bool {
        self.0.is_subset(&other.0)
    }
}

/// Canonical casing for a feature pair: `Case=Ela` and `CASE=ela` both become `case=ELA`.
pub fn normalize_feature(name: &str, value: &str) -> (String, String) {
    (name.trim().to_lowercase(), value.trim().to_uppercase())
}

/// Mapping from candidate lemma to its alternative readings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LemmaFeatureMap(BTreeMap<String, BTreeSet<FeatureReading>>);

impl LemmaFeatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map with a single lemma and a single reading.
    pub fn single(lemma: impl Into<String>, reading: FeatureReading) -> Self {
        let mut map = Self::new();
        map.insert(lemma, reading);
        map
    }

    /// A wildcard slot requiring the given reading.
    pub fn wildcard(reading: FeatureReading) -> Self {
        Self::single(WILDCARD, reading)
    }

    /// Add one reading for `lemma`.
    pub fn insert(&mut self, lemma: impl Into<String>, reading: FeatureReading) {
        self.0.entry(lemma.into()).or_default().insert(reading);
    }

    /// Register `lemma` with no readings at all (it then never matches).
    pub fn insert_lemma(&mut self, lemma: impl Into<String>) {
        self.0.entry(lemma.into()).or_default();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains_lemma(&self, lemma: &str) -> bool {
        self.0.contains_key(lemma)
    }

    pub fn has_wildcard(&self) -> bool {
        self.0.contains_key(WILDCARD)
    }

    pub fn readings(&self, lemma: &str) -> Option<&BTreeSet<FeatureReading>> {
        self.0.get(lemma)
    }

    /// All candidate lemmas, including the wildcard sentinel if present.
    pub fn lemmas(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Candidate lemmas other than the wildcard sentinel.
    pub fn literal_lemmas(&self) -> impl Iterator<Item = &str> {
        self.lemmas().filter(|lemma| *lemma != WILDCARD)
    }

    /// Every reading of every lemma alternative.
    pub fn all_readings(&self) -> impl Iterator<Item = &FeatureReading> + Clone {
        self.0.values().flat_map(|readings| readings.iter())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<FeatureReading>)> {
        self.0.iter().map(|(lemma, readings)| (lemma.as_str(), readings))
    }

    /// True when every reading of every lemma carries no features.
    pub fn is_featureless(&self) -> bool {
        self.all_readings().all(FeatureReading::is_empty)
    }
}

impl FromIterator<(String, FeatureReading)> for LemmaFeatureMap {
    fn from_iter<T: IntoIterator<Item = (String, FeatureReading)>>(iter: T) -> Self {
        let mut map = LemmaFeatureMap::new();
        for (lemma, reading) in iter {
            map.insert(lemma, reading);
        }
        map
    }
}

/// How a slot matched a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// A shared literal lemma with compatible readings.
    Literal,
    /// Only the wildcard's feature requirement matched; the slot may absorb more tokens.
    Wildcard,
}

impl MatchKind {
    pub fn is_wildcard(self) -> bool {
        matches!(self, MatchKind::Wildcard)
    }
}

/// `required ⊆ present`. An empty requirement always matches.
#[inline]
pub fn feature_subset(required: &FeatureReading, present: &FeatureReading) -> bool {
    required.is_subset(present)
}

/// True iff some required reading is a subset of some present reading.
pub fn any_subset<'a, R, P>(required: R, present: P) -> bool
where
    R: IntoIterator<Item = &'a FeatureReading>,
    P: IntoIterator<Item = &'a FeatureReading> + Clone,
{
    required.into_iter().any(|req| {
        present
            .clone()
            .into_iter()
            .any(|pres| feature_subset(req, pres))
    })
}

/// Test only the wildcard requirement of `matcher` against every reading of `candidate`.
pub fn wildcard_subset(matcher: &LemmaFeatureMap, candidate: &LemmaFeatureMap) -> bool {
    match matcher.readings(WILDCARD) {
        Some(required) => any_subset(required, candidate.all_readings()),
        None => false,
    }
}

/// Match an entry slot against a token.
///
/// Shared literal lemmas are tried first; the wildcard requirement is only consulted when
/// no literal lemma matched.
pub fn match_any(matcher: &LemmaFeatureMap, candidate: &LemmaFeatureMap) -> Option<MatchKind> {
    for (lemma, required) in matcher.iter() {
        if lemma == WILDCARD {
            continue;
        }
        if let Some(present) = candidate.readings(lemma) {
            if any_subset(required, present) {
                return Some(MatchKind::Literal);
            }
        }
    }
    if wildcard_subset(matcher, candidate) {
        return Some(MatchKind::Wildcard);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(pairs: &[(&str, &str)]) -> FeatureReading {
        FeatureReading::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_normalizes_case() {
        let r = reading(&[("Case", "Ela"), ("NUMBER", "sg")]);
        assert_eq!(r.get("case"), Some("ELA"));
        assert_eq!(r.get("number"), Some("SG"));
    }

    #[test]
    fn test_empty_requirement_matches() {
        assert!(feature_subset(&FeatureReading::empty(), &reading(&[("case", "NOM")])));
        assert!(feature_subset(&FeatureReading::empty(), &FeatureReading::empty()));
    }

    #[test]
    fn test_subset() {
        let required = reading(&[("case", "ELA")]);
        let present = reading(&[("case", "ELA"), ("number", "SG")]);
        assert!(feature_subset(&required, &present));
        assert!(!feature_subset(&present, &required));
    }

    #[test]
    fn test_any_subset_is_existential() {
        let required = [reading(&[("case", "INE")]), reading(&[("case", "ELA")])];
        let present = [reading(&[("case", "NOM")]), reading(&[("case", "ELA"), ("number", "PL")])];
        assert!(any_subset(&required, &present));
        assert!(!any_subset(&required[..1], &present));
        assert!(!any_subset(&required, &Vec::<FeatureReading>::new()));
    }

    #[test]
    fn test_any_subset_monotonic() {
        let required = [reading(&[("case", "ELA")])];
        let present = [reading(&[("case", "ELA")])];
        let widened = [reading(&[("case", "ELA"), ("number", "SG"), ("pos", "NOUN")])];
        assert!(any_subset(&required, &present));
        assert!(any_subset(&required, &widened));
    }

    #[test]
    fn test_match_any_literal_before_wildcard() {
        let mut matcher = LemmaFeatureMap::single("pitää", FeatureReading::empty());
        matcher.insert(WILDCARD, FeatureReading::empty());
        let candidate = LemmaFeatureMap::single("pitää", reading(&[("mood", "IND")]));
        assert_eq!(match_any(&matcher, &candidate), Some(MatchKind::Literal));
    }

    #[test]
    fn test_match_any_wildcard_uses_all_lemma_readings() {
        let matcher = LemmaFeatureMap::wildcard(reading(&[("case", "ELA")]));
        let mut candidate = LemmaFeatureMap::single("voi", reading(&[("case", "NOM")]));
        candidate.insert("kakku", reading(&[("case", "ELA"), ("number", "SG")]));
        assert_eq!(match_any(&matcher, &candidate), Some(MatchKind::Wildcard));

        let nominative = LemmaFeatureMap::single("kakku", reading(&[("case", "NOM")]));
        assert_eq!(match_any(&matcher, &nominative), None);
    }

    #[test]
    fn test_match_any_lemma_mismatch() {
        let matcher = LemmaFeatureMap::single("tulla", FeatureReading::empty());
        let candidate = LemmaFeatureMap::single("mennä", FeatureReading::empty());
        assert_eq!(match_any(&matcher, &candidate), None);
    }

    #[test]
    fn test_reading_deserializes_from_pairs_and_map() {
        let pairs: FeatureReading = serde_json::from_str(r#"[["Case", "Ela"]]"#).unwrap();
        let map: FeatureReading = serde_json::from_str(r#"{"CASE": "ela"}"#).unwrap();
        assert_eq!(pairs, map);
        assert_eq!(serde_json::to_string(&pairs).unwrap(), r#"[["case","ELA"]]"#);
    }

    #[test]
    fn test_lemma_feature_map_json() {
        let json = r#"{"__WILDCARD__": [[["case", "ELA"]]], "pitää": [[]]}"#;
        let map: LemmaFeatureMap = serde_json::from_str(json).unwrap();
        assert!(map.has_wildcard());
        assert_eq!(map.literal_lemmas().collect::<Vec<_>>(), vec!["pitää"]);
        let round: LemmaFeatureMap =
            serde_json::from_str(&serde_json::to_string(&map).unwrap()).unwrap();
        assert_eq!(round, map);
    }
}
