//! Entry ingestion: resolve entry tokens into subwords, choose keys, store.
//!
//! Entries that cannot be indexed are reported per entry and never abort the batch.

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

use crate::db::DbError;
use crate::features::{FeatureReading, LemmaFeatureMap};
use crate::index::LexicalStore;
use crate::key::{select_key, FrequencyCache, FrequencyOracle};
use crate::lemmatize::Lemmatizer;
use crate::models::{BuildParams, Entry, EntryId, EntryType, Subword};

/// Form shown for wildcard slots.
pub const WILDCARD_FORM: &str = "___";

/// Why an entry was not indexed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexingError {
    #[error("entry has no subwords")]
    Empty,
    #[error("no subword of {0:?} has a literal key lemma")]
    NoKeyLemma(String),
    #[error("{0:?} only lemmatizes to itself")]
    SelfLemma(String),
    #[error("headword index {idx} out of range for {len} subwords")]
    HeadwordOutOfRange { idx: usize, len: usize },
    #[error("surface token {0:?} carries features; only lemma tokens and open slots may")]
    SurfaceFeats(String),
}

/// One token of an incoming entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryToken {
    /// Lemma or surface form; absent for open slots
    #[serde(default)]
    pub payload: Option<String>,
    /// Whether `payload` is already a lemma (otherwise it is lemmatized)
    #[serde(default = "default_true")]
    pub payload_is_lemma: bool,
    /// Required features
    #[serde(default)]
    pub feats: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl EntryToken {
    pub fn lemma(lemma: &str) -> Self {
        EntryToken {
            payload: Some(lemma.to_string()),
            payload_is_lemma: true,
            feats: BTreeMap::new(),
        }
    }

    pub fn surface(form: &str) -> Self {
        EntryToken {
            payload: Some(form.to_string()),
            payload_is_lemma: false,
            feats: BTreeMap::new(),
        }
    }

    pub fn wildcard<I, N, V>(feats: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        EntryToken {
            payload: None,
            payload_is_lemma: true,
            feats: feats
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }

    pub fn with_feat(mut self, name: &str, value: &str) -> Self {
        self.feats.insert(name.to_string(), value.to_string());
        self
    }

    /// Surface payloads get their readings from the lemmatizer, so any feats would be lost.
    pub fn check(&self) -> Result<(), IndexingError> {
        match &self.payload {
            Some(surface) if !self.payload_is_lemma && !self.feats.is_empty() => {
                Err(IndexingError::SurfaceFeats(surface.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Resolve into a subword, lemmatizing surface payloads.
    pub fn resolve(&self, lemmatizer: &dyn Lemmatizer) -> Subword {
        let reading = FeatureReading::from_pairs(self.feats.iter());
        match &self.payload {
            None => Subword::new(
                Some(WILDCARD_FORM.to_string()),
                LemmaFeatureMap::wildcard(reading),
            ),
            Some(lemma) if self.payload_is_lemma => Subword::new(
                Some(lemma.clone()),
                LemmaFeatureMap::single(lemma.to_lowercase(), reading),
            ),
            Some(surface) => Subword::new(Some(surface.clone()), lemmatizer.lemmatize(surface)),
        }
    }
}

/// An entry as produced by the extraction pipelines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntrySpec {
    pub tokens: Vec<EntryToken>,
    #[serde(default)]
    pub headword_idx: Option<usize>,
    #[serde(default)]
    pub entry_type: Option<EntryType>,
    #[serde(default)]
    pub form: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl EntrySpec {
    /// A plain word list: every subword is a surface form to lemmatize.
    pub fn from_words<S: AsRef<str>>(words: &[S]) -> Self {
        EntrySpec {
            tokens: words
                .iter()
                .map(|w| EntryToken::surface(w.as_ref()))
                .collect(),
            ..Default::default()
        }
    }

    pub fn with_sources(mut self, sources: &[&str]) -> Self {
        self.sources = sources.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_headword(mut self, idx: usize) -> Self {
        self.headword_idx = Some(idx);
        self
    }

    /// Space-joined token payloads, `___` for open slots.
    pub fn display_form(&self) -> String {
        match &self.form {
            Some(form) => form.clone(),
            None => self
                .tokens
                .iter()
                .map(|t| t.payload.as_deref().unwrap_or(WILDCARD_FORM))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Resolve, validate and key one entry.
pub fn index_entry(
    spec: &EntrySpec,
    lemmatizer: &dyn Lemmatizer,
    freqs: &mut FrequencyCache<'_>,
) -> Result<Entry, IndexingError> {
    for token in &spec.tokens {
        token.check()?;
    }
    let subwords: Vec<Subword> = spec.tokens.iter().map(|t| t.resolve(lemmatizer)).collect();
    let form = spec.display_form();
    index_subwords(form, subwords, spec, freqs)
}

/// Key already resolved subwords.
pub fn index_subwords(
    form: String,
    subwords: Vec<Subword>,
    spec: &EntrySpec,
    freqs: &mut FrequencyCache<'_>,
) -> Result<Entry, IndexingError> {
    if subwords.is_empty() {
        return Err(IndexingError::Empty);
    }
    if let Some(idx) = spec.headword_idx {
        if idx >= subwords.len() {
            return Err(IndexingError::HeadwordOutOfRange {
                idx,
                len: subwords.len(),
            });
        }
    }
    if subwords.len() == 1 && lemmatizes_to_itself(&subwords[0]) {
        return Err(IndexingError::SelfLemma(form));
    }

    let choice = select_key(&subwords, spec.headword_idx, freqs)
        .ok_or_else(|| IndexingError::NoKeyLemma(form.clone()))?;

    let entry_type = spec.entry_type.unwrap_or_else(|| infer_type(&subwords));

    Ok(Entry {
        form,
        entry_type,
        key_idx: choice.key_idx,
        key_is_head: choice.key_is_head,
        subwords,
        sources: spec.sources.clone(),
        payload: spec.payload.clone(),
    })
}

/// A lone subword whose only lemma is its own form, with no feature-bearing reading,
/// would be found by plain lemma lookup anyway.
fn lemmatizes_to_itself(subword: &Subword) -> bool {
    let Some(form) = &subword.form else {
        return false;
    };
    let form = form.to_lowercase();
    let mut lemmas = subword.features.lemmas();
    matches!((lemmas.next(), lemmas.next()), (Some(only), None) if only.to_lowercase() == form)
        && subword.features.is_featureless()
}

fn infer_type(subwords: &[Subword]) -> EntryType {
    if subwords.len() == 1 {
        EntryType::Inflection
    } else if subwords.iter().any(|s| s.features.has_wildcard()) {
        EntryType::Frame
    } else {
        EntryType::Multiword
    }
}

/// Result of an index build.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub inserted: Vec<EntryId>,
    /// (entry form, reason) for every rejected entry
    pub failed: Vec<(String, IndexingError)>,
}

impl BuildReport {
    pub fn inserted_count(&self) -> usize {
        self.inserted.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Index a stream of entry specs into `store`, committing in batches.
pub fn build_index<S, I>(
    store: &mut S,
    specs: I,
    lemmatizer: &dyn Lemmatizer,
    oracle: &dyn FrequencyOracle,
    params: &BuildParams,
    show_progress: bool,
) -> Result<BuildReport, DbError>
where
    S: LexicalStore + ?Sized,
    I: IntoIterator<Item = EntrySpec>,
{
    let mut freqs = FrequencyCache::new(oracle, &params.language);
    let mut report = BuildReport::default();
    let mut pending: Vec<Entry> = Vec::with_capacity(params.commit_batch_size);

    let progress = if show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} entries ({per_sec}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Some(pb)
    } else {
        None
    };

    for spec in specs {
        match index_entry(&spec, lemmatizer, &mut freqs) {
            Ok(entry) => pending.push(entry),
            Err(err) => {
                if let Some(ref pb) = progress {
                    pb.println(format!("Skipping entry: {}", err));
                }
                report.failed.push((spec.display_form(), err));
            }
        }
        if let Some(ref pb) = progress {
            pb.inc(1);
        }
        if pending.len() >= params.commit_batch_size.max(1) {
            report.inserted.extend(store.insert_batch(&pending)?);
            pending.clear();
        }
    }
    if !pending.is_empty() {
        report.inserted.extend(store.insert_batch(&pending)?);
    }

    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "{} indexed, {} failed",
            report.inserted_count(),
            report.failed_count()
        ));
    }

    Ok(report)
}

/// Read entry specs from a JSON-lines file (blank lines skipped).
pub fn read_entry_specs(path: &Path) -> Result<Vec<EntrySpec>, DbError> {
    let reader = BufReader::new(File::open(path)?);
    let mut specs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        specs.push(parse_entry_line(line)?);
    }
    Ok(specs)
}

/// A line is either a full `EntrySpec` object or a bare array of surface words.
fn parse_entry_line(line: &str) -> Result<EntrySpec, serde_json::Error> {
    if line.starts_with('[') {
        let words: Vec<String> = serde_json::from_str(line)?;
        Ok(EntrySpec::from_words(&words))
    } else {
        serde_json::from_str(line)
    }
}
