//! The lexical index: key lemma -> entries, entry -> ordered subwords.
//!
//! Entries are written once by a single builder and only read afterwards. Lookups are
//! batched by lemma chunks to bound the number of storage round trips.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::db::DbError;
use crate::models::{Entry, EntryId, IndexStats};

/// Default number of lemmas per lookup round trip.
pub const LEMMAS_CHUNK_SIZE: usize = 256;

/// Backing store for the lexical index.
pub trait LexicalStore {
    /// Store one entry and index it under its key lemmas.
    ///
    /// Entries without a literal key lemma fail with `DbError::Unindexable`.
    fn insert(&mut self, entry: &Entry) -> Result<EntryId, DbError>;

    /// Store a batch of entries. Stores with transactions commit the batch atomically.
    fn insert_batch(&mut self, entries: &[Entry]) -> Result<Vec<EntryId>, DbError> {
        entries.iter().map(|entry| self.insert(entry)).collect()
    }

    /// `(key_lemma, entry_id)` pairs for every key lemma in `lemmas`, grouped by lemma.
    fn key_lemma_entries(&self, lemmas: &[&str]) -> Result<Vec<(String, EntryId)>, DbError>;

    /// Full entries for the given ids.
    fn entries(&self, ids: &[EntryId]) -> Result<HashMap<EntryId, Entry>, DbError>;

    fn stats(&self) -> Result<IndexStats, DbError>;
}

/// Candidate entries for a set of sentence lemmas.
#[derive(Debug, Clone, Default)]
pub struct CandidateBatch {
    /// Key lemma -> entry ids keyed on it, in id order
    pub key_lemmas: BTreeMap<String, Vec<EntryId>>,
    pub entries: HashMap<EntryId, Entry>,
}

impl CandidateBatch {
    pub fn is_empty(&self) -> bool {
        self.key_lemmas.is_empty()
    }

    /// Number of (key lemma, entry) pairs.
    pub fn pair_count(&self) -> usize {
        self.key_lemmas.values().map(Vec::len).sum()
    }

    /// `(key_lemma, entry_id, entry)` for every candidate pair.
    pub fn iter(&self) -> impl Iterator<Item = (&str, EntryId, &Entry)> {
        self.key_lemmas.iter().flat_map(move |(lemma, ids)| {
            ids.iter().filter_map(move |id| {
                self.entries
                    .get(id)
                    .map(|entry| (lemma.as_str(), *id, entry))
            })
        })
    }

    fn extend(&mut self, pairs: Vec<(String, EntryId)>, entries: HashMap<EntryId, Entry>) {
        for (lemma, id) in pairs {
            let ids = self.key_lemmas.entry(lemma).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        self.entries.extend(entries);
    }
}

/// Look up all entries keyed on any of `lemmas`, `chunk_size` lemmas per round trip.
pub fn lookup_candidates<S, I, L>(
    store: &S,
    lemmas: I,
    chunk_size: usize,
) -> Result<CandidateBatch, DbError>
where
    S: LexicalStore + ?Sized,
    I: IntoIterator<Item = L>,
    L: AsRef<str>,
{
    let lemmas: BTreeSet<String> = lemmas.into_iter().map(|l| l.as_ref().to_string()).collect();
    let lemmas: Vec<&str> = lemmas.iter().map(String::as_str).collect();
    let mut batch = CandidateBatch::default();

    for chunk in lemmas.chunks(chunk_size.max(1)) {
        let pairs = store.key_lemma_entries(chunk)?;
        if pairs.is_empty() {
            continue;
        }
        let mut ids: Vec<EntryId> = pairs
            .iter()
            .map(|(_, id)| *id)
            .filter(|id| !batch.entries.contains_key(id))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        let entries = store.entries(&ids)?;
        if let Some(missing) = ids.iter().find(|id| !entries.contains_key(id)) {
            return Err(DbError::MissingEntry(*missing));
        }
        batch.extend(pairs, entries);
    }

    Ok(batch)
}

/// In-memory lexical index.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    key_lemmas: HashMap<String, Vec<EntryId>>,
    entries: BTreeMap<EntryId, Entry>,
    next_id: EntryId,
}

impl MemoryIndex {
    pub fn new() -> Self {
        MemoryIndex {
            key_lemmas: HashMap::new(),
            entries: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(&id)
    }
}

impl LexicalStore for MemoryIndex {
    fn insert(&mut self, entry: &Entry) -> Result<EntryId, DbError> {
        if !entry.is_indexable() {
            return Err(DbError::unindexable(entry));
        }
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        for lemma in entry.key_lemmas() {
            self.key_lemmas.entry(lemma.to_string()).or_default().push(id);
        }
        self.entries.insert(id, entry.clone());
        Ok(id)
    }

    fn key_lemma_entries(&self, lemmas: &[&str]) -> Result<Vec<(String, EntryId)>, DbError> {
        let mut sorted: Vec<&str> = lemmas.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let mut pairs = Vec::new();
        for lemma in sorted {
            if let Some(ids) = self.key_lemmas.get(lemma) {
                pairs.extend(ids.iter().map(|&id| (lemma.to_string(), id)));
            }
        }
        Ok(pairs)
    }

    fn entries(&self, ids: &[EntryId]) -> Result<HashMap<EntryId, Entry>, DbError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.entries.get(id).map(|entry| (*id, entry.clone())))
            .collect())
    }

    fn stats(&self) -> Result<IndexStats, DbError> {
        Ok(IndexStats {
            words: self.entries.len() as u64,
            key_lemmas: self.key_lemmas.values().map(|ids| ids.len() as u64).sum(),
            subwords: self.entries.values().map(|e| e.subwords.len() as u64).sum(),
        })
    }
}
