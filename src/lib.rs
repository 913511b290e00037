//! Lextract: keyed lexical index and pattern matching
//!
//! Finds inflected words, multiword expressions and frames with open argument slots in
//! lemmatized sentences. Entries are indexed under the lemma of their rarest literal
//! subword; a sentence query looks up its own lemmas, anchors each candidate entry at the
//! matching tokens and extends it either along the token sequence or along the edges of a
//! dependency tree.
//!
//! # Example
//!
//! ```no_run
//! use lextract::prelude::*;
//!
//! let mut index = SqliteIndex::open_in_memory().unwrap();
//! let lemmatizer = NullLemmatizer;
//! let frequencies = FrequencyTable::new("fi");
//!
//! // Index one frame: "pitää" followed by an open slot
//! let spec = EntrySpec {
//!     tokens: vec![EntryToken::lemma("pitää"), EntryToken::wildcard([("case", "ELA")])],
//!     ..EntrySpec::default()
//! };
//! build_index(&mut index, vec![spec], &lemmatizer, &frequencies, &BuildParams::default(), false)
//!     .unwrap();
//!
//! // Match a tokenized sentence
//! let matches = match_tokens(&index, &["minä", "pitää"], &lemmatizer, &MatchParams::default())
//!     .unwrap();
//! for m in &matches {
//!     println!("{} at {}: {} matchings", m.entry.form, m.anchor, m.matchings.len());
//! }
//! ```

pub mod conllu;
pub mod db;
pub mod extract;
pub mod features;
pub mod index;
pub mod ingest;
pub mod key;
pub mod lemmatize;
pub mod linear;
pub mod models;
pub mod output;
pub mod select;
pub mod sentence;
pub mod tree;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::conllu::{parse_file, parse_str, ConlluError, DepSentence, DepToken};
    pub use crate::db::{DbError, SqliteIndex};
    pub use crate::extract::{
        anchors, match_dep_sentences, match_token_sentences, match_tokens, match_tokens_indexed,
        match_tree, match_tree_indexed, select_longest, Anchor, ExtractError,
    };
    pub use crate::features::{
        any_subset, feature_subset, match_any, wildcard_subset, FeatureReading, LemmaFeatureMap,
        MatchKind, WILDCARD,
    };
    pub use crate::index::{lookup_candidates, CandidateBatch, LexicalStore, MemoryIndex};
    pub use crate::ingest::{
        build_index, index_entry, read_entry_specs, BuildReport, EntrySpec, EntryToken,
        IndexingError,
    };
    pub use crate::key::{select_key, FrequencyCache, FrequencyOracle, FrequencyTable, KeyChoice};
    pub use crate::lemmatize::{Lemmatizer, NullLemmatizer, TableLemmatizer};
    pub use crate::models::{
        BuildParams, Entry, EntryId, EntryMatch, EntryType, IndexStats, MatchParams, Matching,
        SentenceMatches, Subword,
    };
    pub use crate::output::{
        format_match, format_matching, print_matches, print_stats, print_summary, write_json,
        write_json_file, write_json_lines, OutputError,
    };
    pub use crate::select::{longest_matches, match_length};
    pub use crate::sentence::SentenceIndex;
    pub use crate::tree::{DepTree, TreeError};
}

// Re-export commonly used types at the crate root
pub use models::{Entry, EntryMatch, MatchParams, Matching};
