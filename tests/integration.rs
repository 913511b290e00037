//! Integration tests for lextract.
//!
//! These tests build small indexes (in memory and in an in-memory SQLite database) and run
//! the token and dependency-tree queries end to end.

use std::collections::BTreeSet;

use lextract::conllu::parse_str;
use lextract::db::SqliteIndex;
use lextract::extract::{match_tokens, match_tokens_indexed, match_tree, select_longest};
use lextract::features::{any_subset, FeatureReading};
use lextract::index::{LexicalStore, MemoryIndex};
use lextract::ingest::{build_index, EntrySpec, EntryToken, IndexingError};
use lextract::key::FrequencyTable;
use lextract::lemmatize::TableLemmatizer;
use lextract::models::{BuildParams, EntryMatch, MatchParams, Matching};
use lextract::sentence::SentenceIndex;

fn reading(pairs: &[(&str, &str)]) -> FeatureReading {
    FeatureReading::from_pairs(pairs.iter().copied())
}

/// Small Finnish analysis table standing in for a morphological analyzer.
fn lemmatizer() -> TableLemmatizer {
    let mut table = TableLemmatizer::new();
    table.add("tulla", "tulla", reading(&[("pos", "VERB")]));
    table.add("tule", "tulla", reading(&[("pos", "VERB"), ("mood", "IMPV")]));
    table.add("älä", "ei", reading(&[("pos", "AUX"), ("mood", "IMPV")]));
    table.add("humalaan", "humala", reading(&[("case", "ILL")]));
    table.add("humalassa", "humala", reading(&[("case", "INE")]));
    table.add("humaloissa", "humala", reading(&[("case", "INE"), ("number", "PL")]));
    table.add("olen", "olla", reading(&[("mood", "IND")]));
    table.add("minä", "minä", reading(&[("case", "NOM")]));
    table.add("pidän", "pitää", reading(&[("mood", "IND"), ("person", "1")]));
    table.add("herkullisesta", "herkullinen", reading(&[("case", "ELA")]));
    table.add("voileipäkakusta", "voileipäkakku", reading(&[("case", "ELA")]));
    table.add("siistiä", "siisti", reading(&[("case", "PAR")]));
    table.add("ihmisiä", "ihminen", reading(&[("case", "PAR"), ("number", "PL")]));
    table.add("vihamielisinä", "vihamielinen", reading(&[("case", "ESS"), ("number", "PL")]));
    table
}

fn frequencies() -> FrequencyTable {
    FrequencyTable::new("fi")
        .with("tulla", 0.002)
        .with("humala", 0.00001)
        .with("pitää", 0.001)
        .with("kummuta", 0.00002)
}

fn elative_frame(verb: &str) -> EntrySpec {
    EntrySpec {
        tokens: vec![
            EntryToken::lemma(verb),
            EntryToken::wildcard([("case", "ELA")]),
        ],
        headword_idx: Some(0),
        ..EntrySpec::default()
    }
}

fn entry_specs() -> Vec<EntrySpec> {
    vec![
        EntrySpec::from_words(&["tulla", "humalaan"]),
        EntrySpec::from_words(&["humalassa"]),
        EntrySpec::from_words(&["kiinni"]),
        elative_frame("pitää"),
        elative_frame("kummuta"),
        EntrySpec {
            tokens: vec![
                EntryToken::lemma("pitää"),
                EntryToken::wildcard([("case", "PAR")]),
                EntryToken::wildcard([("case", "ESS")]),
            ],
            headword_idx: Some(0),
            form: Some("pitää ___-ta ___-na".to_string()),
            ..EntrySpec::default()
        },
        EntrySpec {
            tokens: vec![
                EntryToken::lemma("pitää"),
                EntryToken::wildcard([("case", "ELA")]),
                EntryToken::lemma("kiinni"),
            ],
            headword_idx: Some(0),
            form: Some("pitää ___-sta kiinni".to_string()),
            ..EntrySpec::default()
        },
    ]
}

fn build<S: LexicalStore>(store: &mut S) {
    let report = build_index(
        store,
        entry_specs(),
        &lemmatizer(),
        &frequencies(),
        &BuildParams::default(),
        false,
    )
    .unwrap();
    assert_eq!(report.inserted_count(), 6);
    assert_eq!(
        report.failed,
        vec![("kiinni".to_string(), IndexingError::SelfLemma("kiinni".to_string()))]
    );
}

fn memory_index() -> MemoryIndex {
    let mut index = MemoryIndex::new();
    build(&mut index);
    index
}

fn sqlite_index() -> SqliteIndex {
    let mut index = SqliteIndex::open_in_memory().unwrap();
    build(&mut index);
    index
}

fn find<'a>(matches: &'a [EntryMatch], form: &str) -> Option<&'a EntryMatch> {
    matches.iter().find(|m| m.entry.form == form)
}

#[test]
fn test_multiword_with_inflected_verb() {
    for_each_store(|store| {
        let matches = match_tokens(
            store,
            &["älä", "tule", "humalaan"],
            &lemmatizer(),
            &MatchParams::default(),
        )
        .unwrap();
        let m = find(&matches, "tulla humalaan").expect("multiword match");
        assert_eq!(m.entry.key_idx, 1);
        assert_eq!(m.key_lemma, "humala");
        assert_eq!(m.anchor, 2);
        assert_eq!(
            m.matchings,
            BTreeSet::from([Matching::from_pairs([(0, vec![1]), (1, vec![2])])])
        );
    });
}

#[test]
fn test_inflection_matches_other_inflection_of_same_lemma() {
    for_each_store(|store| {
        let matches =
            match_tokens(store, &["olen", "humaloissa"], &lemmatizer(), &MatchParams::default())
                .unwrap();
        let m = find(&matches, "humalassa").expect("inflection match");
        assert_eq!(
            m.matchings,
            BTreeSet::from([Matching::from_pairs([(0, vec![1])])])
        );

        // Illative does not satisfy the inessive requirement
        let matches =
            match_tokens(store, &["humalaan"], &lemmatizer(), &MatchParams::default()).unwrap();
        assert!(find(&matches, "humalassa").is_none());
    });
}

#[test]
fn test_frame_single_argument() {
    for_each_store(|store| {
        let matches = match_tokens(
            store,
            &["Minä", "pidän", "voileipäkakusta"],
            &lemmatizer(),
            &MatchParams::default(),
        )
        .unwrap();
        let m = find(&matches, "pitää ___").expect("frame match");
        assert_eq!(
            m.matchings,
            BTreeSet::from([Matching::from_pairs([(0, vec![1]), (1, vec![2])])])
        );
    });
}

#[test]
fn test_frame_wildcard_absorption_and_longest() {
    let sentence = ["Minä", "pidän", "herkullisesta", "voileipäkakusta"];
    for_each_store(|store| {
        let matches =
            match_tokens(store, &sentence, &lemmatizer(), &MatchParams::default()).unwrap();
        let m = find(&matches, "pitää ___").expect("frame match");
        let short = Matching::from_pairs([(0, vec![1]), (1, vec![2])]);
        let long = Matching::from_pairs([(0, vec![1]), (1, vec![2, 3])]);
        assert_eq!(m.matchings, BTreeSet::from([short, long.clone()]));

        let longest = select_longest(&m.matchings);
        assert_eq!(longest, BTreeSet::from([long]));
        assert_eq!(select_longest(&longest), longest);
    });
}

#[test]
fn test_no_extension_without_wildcard_extension() {
    let index = memory_index();
    let params = MatchParams {
        extend_wildcards: false,
        ..MatchParams::default()
    };
    let matches = match_tokens(
        &index,
        &["Minä", "pidän", "herkullisesta", "voileipäkakusta"],
        &lemmatizer(),
        &params,
    )
    .unwrap();
    let m = find(&matches, "pitää ___").expect("frame match");
    assert_eq!(
            m.matchings,
            BTreeSet::from([Matching::from_pairs([(0, vec![1]), (1, vec![2])])])
        );
}

#[test]
fn test_frame_adjacent_slots() {
    for_each_store(|store| {
        let matches = match_tokens(
            store,
            &["Minä", "pidän", "siistiä", "ihmisiä", "vihamielisinä"],
            &lemmatizer(),
            &MatchParams::default(),
        )
        .unwrap();
        let m = find(&matches, "pitää ___-ta ___-na").expect("two-slot frame match");
        assert_eq!(
            m.matchings,
            BTreeSet::from([Matching::from_pairs([
                (0, vec![1]),
                (1, vec![2, 3]),
                (2, vec![4]),
            ])])
        );
    });
}

#[test]
fn test_frame_slot_before_trailing_literal() {
    for_each_store(|store| {
        let matches = match_tokens(
            store,
            &["Minä", "pidän", "voileipäkakusta", "kiinni"],
            &lemmatizer(),
            &MatchParams::default(),
        )
        .unwrap();
        let m = find(&matches, "pitää ___-sta kiinni").expect("frame match");
        assert_eq!(
            m.matchings,
            BTreeSet::from([Matching::from_pairs([(0, vec![1]), (1, vec![2]), (2, vec![3])])])
        );

        // The slot absorbs both elatives but must stop before the literal
        let matches = match_tokens(
            store,
            &["Minä", "pidän", "herkullisesta", "voileipäkakusta", "kiinni"],
            &lemmatizer(),
            &MatchParams::default(),
        )
        .unwrap();
        let m = find(&matches, "pitää ___-sta kiinni").expect("frame match");
        assert_eq!(
            m.matchings,
            BTreeSet::from([Matching::from_pairs([
                (0, vec![1]),
                (1, vec![2, 3]),
                (2, vec![4]),
            ])])
        );

        // Without the literal the frame does not match
        let matches = match_tokens(
            store,
            &["Minä", "pidän", "voileipäkakusta"],
            &lemmatizer(),
            &MatchParams::default(),
        )
        .unwrap();
        assert!(find(&matches, "pitää ___-sta kiinni").is_none());
    });
}

const ALA_TULE: &str = "# text = Älä tule humalaan
1\tÄlä\tei\tAUX\t_\tMood=Imp|Person=2\t2\taux\t_\t_
2\ttule\ttulla\tVERB\t_\tMood=Imp|Person=2\t0\troot\t_\t_
3\thumalaan\thumala\tNOUN\t_\tCase=Ill|Number=Sing\t2\tobl\t_\t_
";

#[test]
fn test_tree_match_multiword() {
    let sentences = parse_str(ALA_TULE).unwrap();
    let sentence = &sentences[0];

    for_each_store(|store| {
        let matches = match_tree(store, sentence, &lemmatizer(), &MatchParams::default()).unwrap();
        let m = find(&matches, "tulla humalaan").expect("tree multiword match");
        assert_eq!(m.anchor, 2);
        assert_eq!(
            m.matchings,
            BTreeSet::from([Matching::from_pairs([(0, vec![1]), (1, vec![2])])])
        );
    });
}

const KUMMUTA: &str = "# text = Ilo kumpuaa hänen sydämestään
1\tIlo\tilo\tNOUN\t_\tCase=Nom|Number=Sing\t2\tnsubj\t_\t_
2\tkumpuaa\tkummuta\tVERB\t_\tMood=Ind|Person=3|Tense=Pres\t0\troot\t_\t_
3\thänen\thän\tPRON\t_\tCase=Gen|Number=Sing\t4\tnmod:poss\t_\t_
4\tsydämestään\tsydän\tNOUN\t_\tCase=Ela|Number=Sing\t2\tobl\t_\t_
";

#[test]
fn test_tree_match_where_linear_fails() {
    let sentences = parse_str(KUMMUTA).unwrap();
    let sentence = &sentences[0];
    let params = MatchParams {
        use_conllu_feats: true,
        ..MatchParams::default()
    };

    for_each_store(|store| {
        let tree_matches = match_tree(store, sentence, &lemmatizer(), &params).unwrap();
        let m = find(&tree_matches, "kummuta ___").expect("tree match");
        assert_eq!(
            m.matchings,
            BTreeSet::from([Matching::from_pairs([(0, vec![1]), (1, vec![3])])])
        );

        let indexed = SentenceIndex::from_dep_tokens(&sentence.tokens);
        let linear_matches = match_tokens_indexed(store, &indexed, &params).unwrap();
        assert!(find(&linear_matches, "kummuta ___").is_none());
    });
}

#[test]
fn test_key_never_wildcard() {
    let index = memory_index();
    for id in 1..=index.len() as i64 {
        let entry = index.get(id).unwrap();
        let key = &entry.subwords[entry.key_idx];
        assert!(!key.features.has_wildcard());
        assert!(key.features.literal_lemmas().next().is_some());
    }
}

#[test]
fn test_self_lemma_not_indexed() {
    let index = sqlite_index();
    assert_eq!(index.find_by_form("kiinni").unwrap(), None);
    assert_eq!(index.stats().unwrap().words, 6);
}

#[test]
fn test_chunked_lookup_same_results() {
    let index = sqlite_index();
    let sentence = ["älä", "tule", "humalaan", "pidän", "voileipäkakusta"];
    let whole = match_tokens(&index, &sentence, &lemmatizer(), &MatchParams::default()).unwrap();
    let chunked = match_tokens(
        &index,
        &sentence,
        &lemmatizer(),
        &MatchParams {
            lemma_chunk_size: 1,
            ..MatchParams::default()
        },
    )
    .unwrap();

    let summary = |ms: &[EntryMatch]| {
        ms.iter()
            .map(|m| (m.anchor, m.entry_id, m.matchings.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(summary(&whole), summary(&chunked));
    assert_eq!(whole.len(), 2);
}

#[test]
fn test_any_subset_monotonic_over_widened_readings() {
    let required = [reading(&[("case", "ELA")])];
    let present = [reading(&[("case", "ELA")]), reading(&[("case", "NOM")])];
    let widened = [
        reading(&[("case", "ELA"), ("number", "SG")]),
        reading(&[("case", "NOM"), ("number", "PL")]),
    ];
    assert!(any_subset(&required, &present));
    assert!(any_subset(&required, &widened));
}

/// Run `check` against both store implementations.
fn for_each_store<F>(check: F)
where
    F: Fn(&dyn LexicalStore),
{
    check(&memory_index());
    check(&sqlite_index());
}
