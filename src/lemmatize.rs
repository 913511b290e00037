//! Lemmatizer oracles: surface form -> candidate lemmas with their readings.
//!
//! Morphological analysis itself lives outside this crate. `TableLemmatizer` serves a
//! precomputed analysis table (for example dumped from an external analyzer).

use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::features::{FeatureReading, LemmaFeatureMap, WILDCARD};

/// Surface form to lemma readings.
pub trait Lemmatizer {
    fn lemmatize(&self, surface: &str) -> LemmaFeatureMap;
}

impl<L: Lemmatizer + ?Sized> Lemmatizer for &L {
    fn lemmatize(&self, surface: &str) -> LemmaFeatureMap {
        (**self).lemmatize(surface)
    }
}

/// Treats every form as its own lemma with a single empty reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLemmatizer;

impl Lemmatizer for NullLemmatizer {
    fn lemmatize(&self, surface: &str) -> LemmaFeatureMap {
        LemmaFeatureMap::single(surface, FeatureReading::empty())
    }
}

/// Lookup-table lemmatizer keyed by lowercased surface form.
///
/// Forms missing from the table fall back to the null analysis (the lowercased form as its
/// own lemma), so unknown tokens can still anchor literal entries.
#[derive(Debug, Clone, Default)]
pub struct TableLemmatizer {
    table: HashMap<String, LemmaFeatureMap>,
}

#[derive(Deserialize)]
#[serde(transparent)]
struct RawTable(HashMap<String, LemmaFeatureMap>);

impl TableLemmatizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON object `{surface: {lemma: [reading, ...]}}`.
    pub fn from_json_file(path: &Path) -> Result<Self, std::io::Error> {
        let reader = BufReader::new(File::open(path)?);
        let raw: RawTable = serde_json::from_reader(reader)?;
        let mut lemmatizer = Self::new();
        for (surface, analysis) in raw.0 {
            lemmatizer.add_analysis(&surface, analysis);
        }
        Ok(lemmatizer)
    }

    /// Add one reading of `lemma` for `surface`.
    pub fn add(&mut self, surface: &str, lemma: &str, reading: FeatureReading) {
        self.table
            .entry(surface.to_lowercase())
            .or_default()
            .insert(lemma.to_lowercase(), reading);
    }

    /// Merge a whole analysis for `surface`.
    pub fn add_analysis(&mut self, surface: &str, analysis: LemmaFeatureMap) {
        for (lemma, readings) in analysis.iter() {
            // The sentinel never comes out of an analyzer.
            if lemma == WILDCARD {
                continue;
            }
            for reading in readings {
                self.add(surface, lemma, reading.clone());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Lemmatizer for TableLemmatizer {
    fn lemmatize(&self, surface: &str) -> LemmaFeatureMap {
        let key = surface.to_lowercase();
        match self.table.get(&key) {
            Some(analysis) => analysis.clone(),
            None => NullLemmatizer.lemmatize(&key),
        }
    }
}
