//! Query API: find index entries in token sequences and dependency trees.
//!
//! Each query runs in two phases. The sentence's lemmas are looked up in the index in
//! chunks (the only storage round trips), then every (entry, anchor) candidate is matched
//! independently, in parallel when enabled.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::conllu::DepSentence;
use crate::db::DbError;
use crate::features::any_subset;
use crate::index::{lookup_candidates, CandidateBatch, LexicalStore};
use crate::lemmatize::Lemmatizer;
use crate::linear;
use crate::models::{Entry, EntryId, EntryMatch, MatchParams, Matching, SentenceMatches};
use crate::select::longest_matches;
use crate::sentence::SentenceIndex;
use crate::tree::{self, DepTree, TreeError};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Index lookup failed: {0}")]
    Lookup(#[from] DbError),
    #[error("Malformed tree: {0}")]
    MalformedTree(#[from] TreeError),
}

impl ExtractError {
    /// Whether retrying the same query may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExtractError::Lookup(err) => err.is_retryable(),
            ExtractError::MalformedTree(_) => false,
        }
    }
}

/// An entry whose key subword is compatible with the token at `position`.
#[derive(Debug, Clone, Copy)]
pub struct Anchor<'a> {
    pub key_lemma: &'a str,
    pub entry_id: EntryId,
    pub entry: &'a Entry,
    pub position: usize,
}

/// Enumerate anchors: every occurrence of a candidate's key lemma whose readings satisfy
/// the key subword's requirement for that same lemma.
pub fn anchors<'a>(batch: &'a CandidateBatch, sentence: &SentenceIndex) -> Vec<Anchor<'a>> {
    let mut found = Vec::new();
    for (key_lemma, entry_id, entry) in batch.iter() {
        let Some(required) = entry
            .subwords
            .get(entry.key_idx)
            .and_then(|key| key.features.readings(key_lemma))
        else {
            continue;
        };
        for &position in sentence.positions(key_lemma) {
            let Some(present) = sentence.token(position).and_then(|t| t.readings(key_lemma))
            else {
                continue;
            };
            if any_subset(required, present) {
                found.push(Anchor {
                    key_lemma,
                    entry_id,
                    entry,
                    position,
                });
            }
        }
    }
    found
}

/// Run `matcher` over every anchor and keep the non-empty results.
fn collect_matches<F>(anchors: &[Anchor<'_>], params: &MatchParams, matcher: F) -> Vec<EntryMatch>
where
    F: Fn(&Anchor<'_>) -> BTreeSet<Matching> + Sync,
{
    let build = |anchor: &Anchor<'_>| {
        let mut matchings = matcher(anchor);
        if matchings.is_empty() {
            return None;
        }
        if params.longest_only {
            matchings = longest_matches(&matchings);
        }
        Some(EntryMatch {
            entry_id: anchor.entry_id,
            anchor: anchor.position,
            key_lemma: anchor.key_lemma.to_string(),
            entry: anchor.entry.clone(),
            matchings,
        })
    };

    let mut matches: Vec<EntryMatch> = if params.parallel {
        anchors.par_iter().filter_map(build).collect()
    } else {
        anchors.iter().filter_map(build).collect()
    };

    matches.sort_by(|a, b| {
        (a.anchor, a.entry_id, &a.key_lemma).cmp(&(b.anchor, b.entry_id, &b.key_lemma))
    });
    // An entry keyed on two lemmas of one ambiguous token is found once per lemma
    matches.dedup_by(|next, kept| next.anchor == kept.anchor && next.entry_id == kept.entry_id);
    matches
}

/// Lemmatize `surfaces` and find every entry occurring in them as a token sequence.
pub fn match_tokens<S, T>(
    store: &S,
    surfaces: &[T],
    lemmatizer: &dyn Lemmatizer,
    params: &MatchParams,
) -> Result<Vec<EntryMatch>, ExtractError>
where
    S: LexicalStore + ?Sized,
    T: AsRef<str>,
{
    let sentence = SentenceIndex::from_surfaces(surfaces, lemmatizer);
    match_tokens_indexed(store, &sentence, params)
}

/// Linear matching over an already indexed sentence.
pub fn match_tokens_indexed<S>(
    store: &S,
    sentence: &SentenceIndex,
    params: &MatchParams,
) -> Result<Vec<EntryMatch>, ExtractError>
where
    S: LexicalStore + ?Sized,
{
    let batch = lookup_candidates(store, sentence.lemmas(), params.lemma_chunk_size)?;
    let anchors = anchors(&batch, sentence);
    Ok(collect_matches(&anchors, params, |anchor| {
        linear::match_anchor(
            anchor.entry,
            anchor.position,
            sentence.features(),
            params.extend_wildcards,
        )
    }))
}

/// Find every entry occurring in a dependency-parsed sentence, following tree adjacency.
///
/// Features come from the FEATS column when `params.use_conllu_feats` is set, otherwise
/// the word forms are lemmatized.
pub fn match_tree<S>(
    store: &S,
    sentence: &DepSentence,
    lemmatizer: &dyn Lemmatizer,
    params: &MatchParams,
) -> Result<Vec<EntryMatch>, ExtractError>
where
    S: LexicalStore + ?Sized,
{
    let tree = DepTree::from_tokens(&sentence.tokens)?;
    let index = if params.use_conllu_feats {
        SentenceIndex::from_dep_tokens(&sentence.tokens)
    } else {
        SentenceIndex::from_surfaces(sentence.forms().as_slice(), lemmatizer)
    };
    match_tree_indexed(store, &tree, &index, params)
}

/// Tree matching over an already validated tree and indexed sentence.
pub fn match_tree_indexed<S>(
    store: &S,
    tree: &DepTree,
    sentence: &SentenceIndex,
    params: &MatchParams,
) -> Result<Vec<EntryMatch>, ExtractError>
where
    S: LexicalStore + ?Sized,
{
    let batch = lookup_candidates(store, sentence.lemmas(), params.lemma_chunk_size)?;
    let anchors = anchors(&batch, sentence);
    Ok(collect_matches(&anchors, params, |anchor| {
        tree::match_tree_anchor(
            anchor.entry,
            anchor.position,
            tree,
            sentence.features(),
            params.extend_wildcards,
        )
    }))
}

/// Keep only the maximal-length matchings.
pub fn select_longest(matchings: &BTreeSet<Matching>) -> BTreeSet<Matching> {
    longest_matches(matchings)
}

fn progress_bar(len: usize, show_progress: bool) -> Option<ProgressBar> {
    if !show_progress {
        return None;
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    Some(pb)
}

/// Linear matching over many tokenized sentences. A lookup failure aborts the batch.
pub fn match_token_sentences<S>(
    store: &S,
    sentences: &[Vec<String>],
    lemmatizer: &dyn Lemmatizer,
    params: &MatchParams,
    show_progress: bool,
) -> Result<Vec<SentenceMatches>, ExtractError>
where
    S: LexicalStore + ?Sized,
{
    let progress = progress_bar(sentences.len(), show_progress);
    let mut results = Vec::with_capacity(sentences.len());

    for (sentence_idx, tokens) in sentences.iter().enumerate() {
        let matches = match_tokens(store, tokens.as_slice(), lemmatizer, params)?;
        results.push(SentenceMatches {
            sentence_idx,
            tokens: tokens.clone(),
            error: None,
            matches,
        });
        if let Some(ref pb) = progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message("Done");
    }
    Ok(results)
}

/// Tree matching over many CoNLL-U sentences.
///
/// A malformed tree is recorded on its own sentence and the batch continues; a lookup
/// failure aborts the batch.
pub fn match_dep_sentences<S>(
    store: &S,
    sentences: &[DepSentence],
    lemmatizer: &dyn Lemmatizer,
    params: &MatchParams,
    show_progress: bool,
) -> Result<Vec<SentenceMatches>, ExtractError>
where
    S: LexicalStore + ?Sized,
{
    let progress = progress_bar(sentences.len(), show_progress);
    let mut results = Vec::with_capacity(sentences.len());

    for (sentence_idx, sentence) in sentences.iter().enumerate() {
        let (matches, error) = match match_tree(store, sentence, lemmatizer, params) {
            Ok(matches) => (matches, None),
            Err(ExtractError::MalformedTree(err)) => {
                if let Some(ref pb) = progress {
                    pb.println(format!("Sentence {}: {}", sentence_idx, err));
                }
                (Vec::new(), Some(err.to_string()))
            }
            Err(err) => return Err(err),
        };
        results.push(SentenceMatches {
            sentence_idx,
            tokens: sentence.forms(),
            error,
            matches,
        });
        if let Some(ref pb) = progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message("Done");
    }
    Ok(results)
}
