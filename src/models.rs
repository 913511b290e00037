//! Data structures for the keyed lexical index and its matches.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::features::LemmaFeatureMap;

/// Identifier of a stored entry.
pub type EntryId = i64;

/// What kind of lexical pattern an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// A single inflected word form
    Inflection,
    /// A fixed multiword expression
    Multiword,
    /// A pattern with open (wildcard) argument slots
    Frame,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Inflection => "inflection",
            EntryType::Multiword => "multiword",
            EntryType::Frame => "frame",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inflection" => Some(EntryType::Inflection),
            "multiword" => Some(EntryType::Multiword),
            "frame" => Some(EntryType::Frame),
            _ => None,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One slot of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subword {
    pub form: Option<String>,
    pub features: LemmaFeatureMap,
}

impl Subword {
    pub fn new(form: Option<String>, features: LemmaFeatureMap) -> Self {
        Subword { form, features }
    }
}

/// A stored lexical pattern ("word").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub form: String,
    pub entry_type: EntryType,
    pub key_idx: usize,
    pub key_is_head: bool,
    pub subwords: Vec<Subword>,
    pub sources: Vec<String>,
    pub payload: serde_json::Value,
}

impl Entry {
    /// `None` when `key_idx` is out of range.
    pub fn key_subword(&self) -> Option<&Subword> {
        self.subwords.get(self.key_idx)
    }

    /// Lemmas under which the entry is indexed.
    pub fn key_lemmas(&self) -> impl Iterator<Item = &str> {
        self.key_subword()
            .into_iter()
            .flat_map(|key| key.features.literal_lemmas())
    }

    /// An entry can be stored only if its key subword exists and has a literal lemma.
    pub fn is_indexable(&self) -> bool {
        self.key_lemmas().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.subwords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subwords.is_empty()
    }
}

/// Alignment of subword indices to the sentence positions they consumed.
///
/// Ordered maps give value-based equality, ordering and hashing, so sets of matchings
/// deduplicate identical alignments found along different search paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Matching(BTreeMap<usize, BTreeSet<usize>>);

impl Matching {
    pub fn new() -> Self {
        Self::default()
    }

    /// A matching with a single subword consuming a single position.
    pub fn single(subword_idx: usize, position: usize) -> Self {
        Matching::new().with(subword_idx, position)
    }

    /// Copy of `self` with `position` added to `subword_idx`'s position set.
    pub fn with(&self, subword_idx: usize, position: usize) -> Self {
        let mut next = self.clone();
        next.insert(subword_idx, position);
        next
    }

    pub fn insert(&mut self, subword_idx: usize, position: usize) {
        self.0.entry(subword_idx).or_default().insert(position);
    }

    /// Union of two matchings over disjoint (or agreeing) subword ranges.
    pub fn merged(&self, other: &Matching) -> Self {
        let mut merged = self.clone();
        for (&subword_idx, positions) in &other.0 {
            merged
                .0
                .entry(subword_idx)
                .or_default()
                .extend(positions.iter().copied());
        }
        merged
    }

    pub fn positions(&self, subword_idx: usize) -> Option<&BTreeSet<usize>> {
        self.0.get(&subword_idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &BTreeSet<usize>)> {
        self.0.iter().map(|(&idx, positions)| (idx, positions))
    }

    /// Number of subword indices aligned.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every sentence position consumed, in order.
    pub fn all_positions(&self) -> BTreeSet<usize> {
        self.0.values().flat_map(|p| p.iter().copied()).collect()
    }

    pub fn from_pairs<I, P>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, P)>,
        P: IntoIterator<Item = usize>,
    {
        let mut matching = Matching::new();
        for (subword_idx, positions) in pairs {
            for position in positions {
                matching.insert(subword_idx, position);
            }
        }
        matching
    }
}

/// All alignments of one entry found from one anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMatch {
    pub entry_id: EntryId,
    pub anchor: usize,
    pub key_lemma: String,
    pub entry: Entry,
    pub matchings: BTreeSet<Matching>,
}

/// Matches found in one input sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceMatches {
    /// 0-based index of the sentence in its input
    pub sentence_idx: usize,
    pub tokens: Vec<String>,
    /// Set when the sentence could not be matched (malformed tree)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub matches: Vec<EntryMatch>,
}

impl SentenceMatches {
    pub fn match_count(&self) -> usize {
        self.matches.len()
    }
}

/// Query-time parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchParams {
    /// Let wildcard slots absorb more than one token
    pub extend_wildcards: bool,
    /// Keep only the longest matchings of each entry match
    pub longest_only: bool,
    /// Lemmas per index lookup round trip
    pub lemma_chunk_size: usize,
    /// For CoNLL-U input, take features from the FEATS column instead of the lemmatizer
    pub use_conllu_feats: bool,
    /// Fan (entry, anchor) pairs out over the rayon pool
    pub parallel: bool,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            extend_wildcards: true,
            longest_only: false,
            lemma_chunk_size: 256,
            use_conllu_feats: false,
            parallel: true,
        }
    }
}

/// Index build parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildParams {
    /// Language code passed to the frequency oracle
    pub language: String,
    /// Entries per storage transaction
    pub commit_batch_size: usize,
}

impl Default for BuildParams {
    fn default() -> Self {
        Self {
            language: "fi".to_string(),
            commit_batch_size: 1000,
        }
    }
}

/// Index statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    pub words: u64,
    pub key_lemmas: u64,
    pub subwords: u64,
}
