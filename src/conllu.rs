//! Minimal CoNLL-U reader.
//!
//! Only the columns the matchers need are kept: ID, FORM, LEMMA, UPOS, FEATS, HEAD and
//! DEPREL. Multiword-token ranges (`1-2`) and empty nodes (`1.1`) are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConlluError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: expected 10 tab-separated columns, found {found}")]
    ColumnCount { line: usize, found: usize },
    #[error("line {line}: invalid {column} value {value:?}")]
    InvalidNumber {
        line: usize,
        column: &'static str,
        value: String,
    },
}

/// One syntactic word of a dependency-parsed sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepToken {
    /// 1-based position in the sentence
    pub id: usize,
    pub form: String,
    pub lemma: String,
    pub upos: String,
    /// FEATS column as (name, value) pairs; empty for `_`
    pub feats: Vec<(String, String)>,
    /// Id of the governing token, 0 for the root
    pub head: usize,
    pub deprel: String,
}

impl DepToken {
    pub fn new(id: usize, form: &str, lemma: &str, feats: &str, head: usize) -> Self {
        DepToken {
            id,
            form: form.to_string(),
            lemma: lemma.to_string(),
            upos: "_".to_string(),
            feats: parse_feats(feats),
            head,
            deprel: "_".to_string(),
        }
    }
}

/// A sentence as a flat token list; tree structure is in the `head` fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepSentence {
    pub comments: Vec<String>,
    pub tokens: Vec<DepToken>,
}

impl DepSentence {
    pub fn forms(&self) -> Vec<String> {
        self.tokens.iter().map(|t| t.form.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Parse `Case=Ela|Number=Sing` into pairs. `_` and empty yield no pairs.
pub fn parse_feats(feats: &str) -> Vec<(String, String)> {
    if feats == "_" || feats.is_empty() {
        return Vec::new();
    }
    feats
        .split('|')
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

fn parse_number(value: &str, line: usize, column: &'static str) -> Result<usize, ConlluError> {
    value.parse().map_err(|_| ConlluError::InvalidNumber {
        line,
        column,
        value: value.to_string(),
    })
}

/// Parse CoNLL-U text into sentences separated by blank lines.
pub fn parse_str(text: &str) -> Result<Vec<DepSentence>, ConlluError> {
    parse_lines(text.lines().map(|l| Ok(l.to_string())))
}

/// Parse a CoNLL-U file.
pub fn parse_file(path: &Path) -> Result<Vec<DepSentence>, ConlluError> {
    let reader = BufReader::new(File::open(path)?);
    parse_lines(reader.lines())
}

fn parse_lines<I>(lines: I) -> Result<Vec<DepSentence>, ConlluError>
where
    I: IntoIterator<Item = Result<String, std::io::Error>>,
{
    let mut sentences = Vec::new();
    let mut current = DepSentence::default();

    for (idx, line) in lines.into_iter().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        let line = line.trim_end_matches(['\r', '\n']);

        if line.trim().is_empty() {
            if !current.is_empty() {
                sentences.push(std::mem::take(&mut current));
            } else {
                current.comments.clear();
            }
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            current.comments.push(comment.trim().to_string());
            continue;
        }

        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() != 10 {
            return Err(ConlluError::ColumnCount {
                line: line_no,
                found: cols.len(),
            });
        }
        if cols[0].contains('-') || cols[0].contains('.') {
            continue;
        }

        current.tokens.push(DepToken {
            id: parse_number(cols[0], line_no, "ID")?,
            form: cols[1].to_string(),
            lemma: cols[2].to_string(),
            upos: cols[3].to_string(),
            feats: parse_feats(cols[5]),
            head: parse_number(cols[6], line_no, "HEAD")?,
            deprel: cols[7].to_string(),
        });
    }

    if !current.is_empty() {
        sentences.push(current);
    }

    Ok(sentences)
}
