//! SQLite storage for the lexical index.
//!
//! Three tables: `word` (one row per entry), `key_lemma` (key lemma -> word, secondary
//! index on the lemma) and `subword` (ordered slots with their lemma/feature maps as JSON).

use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::features::LemmaFeatureMap;
use crate::index::{LexicalStore, LEMMAS_CHUNK_SIZE};
use crate::models::{Entry, EntryId, EntryType, IndexStats, Subword};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Entry not found: {0}")]
    MissingEntry(EntryId),
    #[error("Invalid entry type {1:?} for entry {0}")]
    InvalidEntryType(EntryId, String),
    #[error("Entry {form:?} has no literal key lemma at subword {key_idx}")]
    Unindexable { form: String, key_idx: usize },
}

impl DbError {
    pub(crate) fn unindexable(entry: &Entry) -> Self {
        DbError::Unindexable {
            form: entry.form.clone(),
            key_idx: entry.key_idx,
        }
    }

    /// Storage-availability failures the caller may retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen
            ),
            DbError::Io(_) => true,
            _ => false,
        }
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS word (
    id INTEGER PRIMARY KEY,
    form TEXT NOT NULL,
    type TEXT NOT NULL,
    key_idx INTEGER NOT NULL,
    key_is_head INTEGER NOT NULL,
    sources TEXT NOT NULL,
    payload TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS key_lemma (
    id INTEGER PRIMARY KEY,
    key_lemma TEXT NOT NULL,
    word_id INTEGER NOT NULL REFERENCES word(id)
);
CREATE INDEX IF NOT EXISTS key_lemma_lemma_idx ON key_lemma (key_lemma);
CREATE TABLE IF NOT EXISTS subword (
    id INTEGER PRIMARY KEY,
    word_id INTEGER NOT NULL REFERENCES word(id),
    subword_idx INTEGER NOT NULL,
    form TEXT,
    lemma_feats TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS subword_word_idx ON subword (word_id, subword_idx);
";

/// Lexical index backed by a SQLite database.
pub struct SqliteIndex {
    conn: Connection,
}

impl SqliteIndex {
    /// Open (creating if needed) an index database.
    pub fn open(db_path: &Path) -> Result<Self, DbError> {
        Self::from_connection(Connection::open(db_path)?)
    }

    /// A throwaway in-memory index.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch(SCHEMA)?;
        Ok(SqliteIndex { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Fetch a single entry by id.
    pub fn entry(&self, id: EntryId) -> Result<Option<Entry>, DbError> {
        let mut entries = self.entries(&[id])?;
        Ok(entries.remove(&id))
    }

    /// Look up the id of the entry with the given form, if any.
    pub fn find_by_form(&self, form: &str) -> Result<Option<EntryId>, DbError> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM word WHERE form = ? ORDER BY id LIMIT 1",
                [form],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }
}

fn insert_entry(conn: &Connection, entry: &Entry) -> Result<EntryId, DbError> {
    if !entry.is_indexable() {
        return Err(DbError::unindexable(entry));
    }
    conn.execute(
        "INSERT INTO word (form, type, key_idx, key_is_head, sources, payload)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            entry.form,
            entry.entry_type.as_str(),
            entry.key_idx as i64,
            entry.key_is_head,
            serde_json::to_string(&entry.sources)?,
            serde_json::to_string(&entry.payload)?,
        ],
    )?;
    let word_id = conn.last_insert_rowid();

    let mut key_stmt =
        conn.prepare_cached("INSERT INTO key_lemma (key_lemma, word_id) VALUES (?, ?)")?;
    for lemma in entry.key_lemmas() {
        key_stmt.execute(params![lemma, word_id])?;
    }

    let mut subword_stmt = conn.prepare_cached(
        "INSERT INTO subword (word_id, subword_idx, form, lemma_feats) VALUES (?, ?, ?, ?)",
    )?;
    for (idx, subword) in entry.subwords.iter().enumerate() {
        subword_stmt.execute(params![
            word_id,
            idx as i64,
            subword.form,
            serde_json::to_string(&subword.features)?,
        ])?;
    }

    Ok(word_id)
}

/// `?, ?, ?` with `n` placeholders.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

impl LexicalStore for SqliteIndex {
    fn insert(&mut self, entry: &Entry) -> Result<EntryId, DbError> {
        insert_entry(&self.conn, entry)
    }

    fn insert_batch(&mut self, entries: &[Entry]) -> Result<Vec<EntryId>, DbError> {
        let tx = self.conn.transaction()?;
        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            ids.push(insert_entry(&tx, entry)?);
        }
        tx.commit()?;
        Ok(ids)
    }

    fn key_lemma_entries(&self, lemmas: &[&str]) -> Result<Vec<(String, EntryId)>, DbError> {
        let mut pairs = Vec::new();
        for chunk in lemmas.chunks(LEMMAS_CHUNK_SIZE) {
            let sql = format!(
                "SELECT key_lemma, word_id FROM key_lemma
                 WHERE key_lemma IN ({})
                 ORDER BY key_lemma, word_id",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
            while let Some(row) = rows.next()? {
                pairs.push((row.get(0)?, row.get(1)?));
            }
        }
        Ok(pairs)
    }

    fn entries(&self, ids: &[EntryId]) -> Result<HashMap<EntryId, Entry>, DbError> {
        let mut entries: HashMap<EntryId, Entry> = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(LEMMAS_CHUNK_SIZE) {
            let sql = format!(
                "SELECT w.id, w.form, w.type, w.key_idx, w.key_is_head, w.sources, w.payload,
                        s.subword_idx, s.form, s.lemma_feats
                 FROM word w
                 JOIN subword s ON s.word_id = w.id
                 WHERE w.id IN ({})
                 ORDER BY w.id, s.subword_idx",
                placeholders(chunk.len())
            );
            let mut stmt = self.conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(chunk.iter()))?;

            while let Some(row) = rows.next()? {
                let word_id: EntryId = row.get(0)?;
                if !entries.contains_key(&word_id) {
                    let type_name: String = row.get(2)?;
                    let entry_type = EntryType::parse(&type_name)
                        .ok_or_else(|| DbError::InvalidEntryType(word_id, type_name.clone()))?;
                    let key_idx: i64 = row.get(3)?;
                    let sources: String = row.get(5)?;
                    let payload: String = row.get(6)?;
                    entries.insert(
                        word_id,
                        Entry {
                            form: row.get(1)?,
                            entry_type,
                            key_idx: key_idx as usize,
                            key_is_head: row.get(4)?,
                            subwords: Vec::new(),
                            sources: serde_json::from_str(&sources)?,
                            payload: serde_json::from_str(&payload)?,
                        },
                    );
                }

                let form: Option<String> = row.get(8)?;
                let lemma_feats: String = row.get(9)?;
                let features: LemmaFeatureMap = serde_json::from_str(&lemma_feats)?;
                if let Some(entry) = entries.get_mut(&word_id) {
                    entry.subwords.push(Subword::new(form, features));
                }
            }
        }

        Ok(entries)
    }

    fn stats(&self) -> Result<IndexStats, DbError> {
        let words: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM word", [], |row| row.get(0))?;
        let key_lemmas: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM key_lemma", [], |row| row.get(0))?;
        let subwords: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM subword", [], |row| row.get(0))?;
        Ok(IndexStats {
            words,
            key_lemmas,
            subwords,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureReading, WILDCARD};
    use crate::index::lookup_candidates;

    fn frame_entry() -> Entry {
        let mut elative = LemmaFeatureMap::new();
        elative.insert(WILDCARD, FeatureReading::from_pairs([("case", "ELA")]));
        Entry {
            form: "pitää ___-sta".to_string(),
            entry_type: EntryType::Frame,
            key_idx: 0,
            key_is_head: true,
            subwords: vec![
                Subword::new(
                    Some("pitää".to_string()),
                    LemmaFeatureMap::single("pitää", FeatureReading::empty()),
                ),
                Subword::new(None, elative),
            ],
            sources: vec!["wiktionary_frames".to_string()],
            payload: serde_json::json!({"sense_id": 70086}),
        }
    }

    #[test]
    fn test_insert_and_fetch_round_trip() {
        let mut index = SqliteIndex::open_in_memory().unwrap();
        let entry = frame_entry();
        let id = index.insert(&entry).unwrap();

        let fetched = index.entry(id).unwrap().unwrap();
        assert_eq!(fetched, entry);
        assert_eq!(index.find_by_form("pitää ___-sta").unwrap(), Some(id));
        assert_eq!(index.find_by_form("nope").unwrap(), None);
    }

    #[test]
    fn test_key_lemma_lookup_excludes_wildcard() {
        let mut index = SqliteIndex::open_in_memory().unwrap();
        let ids = index.insert_batch(&[frame_entry(), frame_entry()]).unwrap();

        let pairs = index.key_lemma_entries(&["pitää", WILDCARD]).unwrap();
        assert_eq!(
            pairs,
            vec![("pitää".to_string(), ids[0]), ("pitää".to_string(), ids[1])]
        );

        let stats = index.stats().unwrap();
        assert_eq!(stats.words, 2);
        assert_eq!(stats.key_lemmas, 2);
        assert_eq!(stats.subwords, 4);
    }

    #[test]
    fn test_lookup_candidates_over_sqlite() {
        let mut index = SqliteIndex::open_in_memory().unwrap();
        let id = index.insert(&frame_entry()).unwrap();
        let batch = lookup_candidates(&index, ["minä", "pitää"], 1).unwrap();
        assert_eq!(batch.key_lemmas.get("pitää"), Some(&vec![id]));
        assert_eq!(batch.entries[&id].subwords.len(), 2);
    }

    #[test]
    fn test_missing_entries_are_skipped_by_store() {
        let index = SqliteIndex::open_in_memory().unwrap();
        assert!(index.entries(&[42]).unwrap().is_empty());
    }

    #[test]
    fn test_unindexable_entries_rejected() {
        let mut index = SqliteIndex::open_in_memory().unwrap();
        let mut out_of_range = frame_entry();
        out_of_range.key_idx = 3;
        assert!(matches!(
            index.insert(&out_of_range),
            Err(DbError::Unindexable { key_idx: 3, .. })
        ));

        // The whole batch rolls back.
        let mut wildcard_key = frame_entry();
        wildcard_key.key_idx = 1;
        let err = index
            .insert_batch(&[frame_entry(), wildcard_key])
            .unwrap_err();
        assert!(matches!(err, DbError::Unindexable { key_idx: 1, .. }));
        assert!(!err.is_retryable());
        assert_eq!(index.stats().unwrap().words, 0);
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
