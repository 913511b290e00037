//! Output formatting for extraction results (JSON, plain text).

use crate::models::{EntryMatch, IndexStats, Matching, SentenceMatches};
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write results as pretty-printed JSON.
pub fn write_json<W: Write>(results: &[SentenceMatches], writer: &mut W) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(results)?;
    writer.write_all(json.as_bytes())?;
    writeln!(writer)?;
    Ok(())
}

/// Write results as JSON to a file.
pub fn write_json_file(results: &[SentenceMatches], path: &Path) -> Result<(), OutputError> {
    let mut file = std::fs::File::create(path)?;
    write_json(results, &mut file)
}

/// Write one compact JSON object per sentence.
pub fn write_json_lines<W: Write>(
    results: &[SentenceMatches],
    writer: &mut W,
) -> Result<(), OutputError> {
    for sentence in results {
        serde_json::to_writer(&mut *writer, sentence)?;
        writeln!(writer)?;
    }
    Ok(())
}

/// Render a matching as the matched tokens, wildcard spans joined by spaces:
/// `pidän [herkullisesta voileipäkakusta]`.
pub fn format_matching(matching: &Matching, tokens: &[String]) -> String {
    matching
        .iter()
        .map(|(_, positions)| {
            let words: Vec<&str> = positions
                .iter()
                .map(|&p| tokens.get(p).map(String::as_str).unwrap_or("?"))
                .collect();
            if words.len() == 1 {
                words[0].to_string()
            } else {
                format!("[{}]", words.join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format a match as a human-readable string.
pub fn format_match(m: &EntryMatch, tokens: &[String]) -> String {
    let mut out = format!(
        "{} ({}, id {}, key {:?} @ {})",
        m.entry.form, m.entry.entry_type, m.entry_id, m.key_lemma, m.anchor
    );
    for matching in &m.matchings {
        out.push_str("\n    ");
        out.push_str(&format_matching(matching, tokens));
    }
    out
}

/// Print per-sentence matches to stdout.
pub fn print_matches(results: &[SentenceMatches]) {
    for sentence in results {
        println!("# {}: {}", sentence.sentence_idx, sentence.tokens.join(" "));
        if let Some(ref err) = sentence.error {
            println!("  error: {}", err);
            continue;
        }
        for m in &sentence.matches {
            println!("  {}", format_match(m, &sentence.tokens));
        }
    }
}

/// Print a one-paragraph summary to stdout.
pub fn print_summary(results: &[SentenceMatches]) {
    let matched = results.iter().filter(|s| !s.matches.is_empty()).count();
    let total: usize = results.iter().map(SentenceMatches::match_count).sum();
    let failed = results.iter().filter(|s| s.error.is_some()).count();

    println!("\n=== Extraction Summary ===");
    println!("Sentences: {}", results.len());
    println!("  With matches: {}", matched);
    println!("  Malformed: {}", failed);
    println!("Entry matches: {}", total);
}

/// Print index statistics.
pub fn print_stats(stats: &IndexStats) {
    println!("=== Index Statistics ===");
    println!("Words: {}", stats.words);
    println!("Key lemmas: {}", stats.key_lemmas);
    println!("Subwords: {}", stats.subwords);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::LemmaFeatureMap;
    use crate::models::{Entry, EntryType, Subword};
    use std::collections::BTreeSet;

    fn tokens() -> Vec<String> {
        ["Minä", "pidän", "herkullisesta", "voileipäkakusta"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn sample() -> SentenceMatches {
        let entry = Entry {
            form: "pitää ___".to_string(),
            entry_type: EntryType::Frame,
            key_idx: 0,
            key_is_head: true,
            subwords: vec![Subword::new(Some("pitää".to_string()), LemmaFeatureMap::new())],
            sources: vec!["test".to_string()],
            payload: serde_json::Value::Null,
        };
        SentenceMatches {
            sentence_idx: 0,
            tokens: tokens(),
            error: None,
            matches: vec![EntryMatch {
                entry_id: 1,
                anchor: 1,
                key_lemma: "pitää".to_string(),
                entry,
                matchings: BTreeSet::from([Matching::from_pairs([(0, vec![1]), (1, vec![2, 3])])]),
            }],
        }
    }

    #[test]
    fn test_format_matching() {
        let matching = Matching::from_pairs([(0, vec![1]), (1, vec![2, 3])]);
        assert_eq!(
            format_matching(&matching, &tokens()),
            "pidän [herkullisesta voileipäkakusta]"
        );
    }

    #[test]
    fn test_format_match() {
        let results = sample();
        let text = format_match(&results.matches[0], &results.tokens);
        assert!(text.starts_with("pitää ___ (frame, id 1"));
        assert!(text.contains("pidän [herkullisesta voileipäkakusta]"));
    }

    #[test]
    fn test_write_json() {
        let mut buf = Vec::new();
        write_json(&[sample()], &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["matches"][0]["matchings"][0]["1"], serde_json::json!([2, 3]));
        assert!(value[0].get("error").is_none());
    }

    #[test]
    fn test_write_json_lines() {
        let mut buf = Vec::new();
        write_json_lines(&[sample(), sample()], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
