//! Key selection: which subword of an entry the index is keyed on.
//!
//! The key should be the rarest literal lemma so that each sentence lemma fans out to as
//! few candidate entries as possible. A designated headword overrides frequency.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::models::Subword;

/// Corpus unigram frequencies in `[0, 1]`.
pub trait FrequencyOracle {
    fn unigram_frequency(&self, lemma: &str, language: &str) -> f64;
}

/// Frequency table for a single language. Unknown lemmas (and other languages) score 0.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrequencyTable {
    pub language: String,
    pub frequencies: HashMap<String, f64>,
}

impl FrequencyTable {
    pub fn new(language: &str) -> Self {
        FrequencyTable {
            language: language.to_string(),
            frequencies: HashMap::new(),
        }
    }

    /// Load `{"language": "fi", "frequencies": {"lemma": 0.001, ...}}`.
    pub fn from_json_file(path: &Path) -> Result<Self, std::io::Error> {
        let reader = BufReader::new(File::open(path)?);
        let table: FrequencyTable = serde_json::from_reader(reader)?;
        Ok(table)
    }

    pub fn insert(&mut self, lemma: &str, frequency: f64) {
        self.frequencies
            .insert(lemma.to_string(), frequency.clamp(0.0, 1.0));
    }

    pub fn with(mut self, lemma: &str, frequency: f64) -> Self {
        self.insert(lemma, frequency);
        self
    }
}

impl FrequencyOracle for FrequencyTable {
    fn unigram_frequency(&self, lemma: &str, language: &str) -> f64 {
        if language != self.language {
            return 0.0;
        }
        self.frequencies.get(lemma).copied().unwrap_or(0.0)
    }
}

/// Memoizes oracle lookups for the duration of one index build.
pub struct FrequencyCache<'a> {
    oracle: &'a dyn FrequencyOracle,
    language: String,
    memo: HashMap<String, f64>,
}

impl<'a> FrequencyCache<'a> {
    pub fn new(oracle: &'a dyn FrequencyOracle, language: &str) -> Self {
        FrequencyCache {
            oracle,
            language: language.to_string(),
            memo: HashMap::new(),
        }
    }

    pub fn frequency(&mut self, lemma: &str) -> f64 {
        if let Some(&freq) = self.memo.get(lemma) {
            return freq;
        }
        let freq = self.oracle.unigram_frequency(lemma, &self.language);
        self.memo.insert(lemma.to_string(), freq);
        freq
    }

    /// Drop memoized values, e.g. after the underlying corpus changed.
    pub fn clear(&mut self) {
        self.memo.clear();
    }

    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }
}

/// Outcome of key selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChoice {
    pub key_idx: usize,
    pub key_is_head: bool,
}

/// True if the subword can serve as a key: it has a literal lemma and no wildcard.
pub fn is_keyable(subword: &Subword) -> bool {
    !subword.features.has_wildcard() && has_literal_lemma(subword)
}

fn has_literal_lemma(subword: &Subword) -> bool {
    subword.features.literal_lemmas().next().is_some()
}

/// Choose the key subword. Returns `None` when no subword has a literal key lemma.
///
/// Ties on frequency keep the earliest subword.
pub fn select_key(
    subwords: &[Subword],
    headword_idx: Option<usize>,
    freqs: &mut FrequencyCache<'_>,
) -> Option<KeyChoice> {
    // A lone subword is keyed on its literal lemmas, whatever else it allows
    if subwords.len() == 1 {
        return has_literal_lemma(&subwords[0]).then_some(KeyChoice {
            key_idx: 0,
            key_is_head: false,
        });
    }

    if let Some(head) = headword_idx {
        if subwords.get(head).is_some_and(is_keyable) {
            return Some(KeyChoice {
                key_idx: head,
                key_is_head: true,
            });
        }
    }

    let mut key_idx = subwords.iter().position(is_keyable)?;
    let mut min_freq = 1.0;
    for (idx, subword) in subwords.iter().enumerate() {
        if !is_keyable(subword) {
            continue;
        }
        let total: f64 = subword
            .features
            .literal_lemmas()
            .map(|lemma| freqs.frequency(lemma))
            .sum();
        if total < min_freq {
            min_freq = total;
            key_idx = idx;
        }
    }

    Some(KeyChoice {
        key_idx,
        key_is_head: false,
    })
}
