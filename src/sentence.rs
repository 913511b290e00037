//! Sentence indexing: lemma -> positions, plus each token's lemma readings.

use std::collections::BTreeMap;

use crate::conllu::DepToken;
use crate::features::{FeatureReading, LemmaFeatureMap, WILDCARD};
use crate::lemmatize::Lemmatizer;

/// A sentence prepared for matching.
#[derive(Debug, Clone, Default)]
pub struct SentenceIndex {
    lemma_positions: BTreeMap<String, Vec<usize>>,
    features: Vec<LemmaFeatureMap>,
}

impl SentenceIndex {
    /// Index per-token analyses directly.
    pub fn from_features(features: Vec<LemmaFeatureMap>) -> Self {
        let mut lemma_positions: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (position, analysis) in features.iter().enumerate() {
            for lemma in analysis.literal_lemmas() {
                lemma_positions
                    .entry(lemma.to_string())
                    .or_default()
                    .push(position);
            }
        }
        SentenceIndex {
            lemma_positions,
            features,
        }
    }

    /// Lemmatize each surface token.
    pub fn from_surfaces<S: AsRef<str>>(surfaces: &[S], lemmatizer: &dyn Lemmatizer) -> Self {
        let features = surfaces
            .iter()
            .map(|surface| sanitize(lemmatizer.lemmatize(surface.as_ref())))
            .collect();
        Self::from_features(features)
    }

    /// Use the lemma and FEATS of pre-annotated tokens: one reading per token.
    ///
    /// Lemmas are lowercased like entry and lemmatizer lemmas.
    pub fn from_dep_tokens(tokens: &[DepToken]) -> Self {
        let features = tokens
            .iter()
            .map(|token| {
                LemmaFeatureMap::single(
                    token.lemma.to_lowercase(),
                    FeatureReading::from_pairs(token.feats.iter().map(|(n, v)| (n, v))),
                )
            })
            .collect();
        Self::from_features(features)
    }

    /// Sorted positions at which `lemma` occurs.
    pub fn positions(&self, lemma: &str) -> &[usize] {
        self.lemma_positions
            .get(lemma)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn lemmas(&self) -> impl Iterator<Item = &str> {
        self.lemma_positions.keys().map(String::as_str)
    }

    pub fn features(&self) -> &[LemmaFeatureMap] {
        &self.features
    }

    pub fn token(&self, position: usize) -> Option<&LemmaFeatureMap> {
        self.features.get(position)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Analyzer output must not contain the wildcard sentinel.
fn sanitize(analysis: LemmaFeatureMap) -> LemmaFeatureMap {
    if !analysis.has_wildcard() {
        return analysis;
    }
    let mut clean = LemmaFeatureMap::new();
    for (lemma, readings) in analysis.iter().filter(|(l, _)| *l != WILDCARD) {
        clean.insert_lemma(lemma);
        for reading in readings {
            clean.insert(lemma, reading.clone());
        }
    }
    clean
}
