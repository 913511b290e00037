//! Lextract command line
//!
//! Builds a keyed lexical index from JSON-lines entries and extracts matches from
//! whitespace-tokenized text or CoNLL-U dependency parses.

use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use lextract::prelude::*;

#[derive(Parser)]
#[command(name = "lextract")]
#[command(about = "Keyed lexical index and multiword/frame extraction")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Output format for extraction results
#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    /// Pretty-printed JSON array, one object per sentence
    Json,
    /// One compact JSON object per line
    Jsonl,
    /// Human-readable listing
    Text,
}

/// Options shared by both extraction commands.
#[derive(clap::Args)]
struct MatchArgs {
    /// Path to the index database
    #[arg(long)]
    db: PathBuf,

    /// Lemmatizer table (JSON `{surface: {lemma: [reading, ...]}}`); forms are their own
    /// lemmas without it
    #[arg(long)]
    lemmatizer: Option<PathBuf>,

    /// Output file (stdout if omitted)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Keep only the longest matchings of each match
    #[arg(long)]
    longest_only: bool,

    /// Wildcard slots consume exactly one token
    #[arg(long)]
    no_extend_wildcards: bool,

    /// Match candidates on the current thread only
    #[arg(long)]
    sequential: bool,

    /// Lemmas per index lookup [default: 256]
    #[arg(long)]
    lemma_chunk_size: Option<usize>,

    /// Suppress progress output
    #[arg(long)]
    quiet: bool,
}

impl MatchArgs {
    fn params(&self, use_conllu_feats: bool) -> MatchParams {
        let defaults = MatchParams::default();
        MatchParams {
            extend_wildcards: !self.no_extend_wildcards,
            longest_only: self.longest_only,
            lemma_chunk_size: self.lemma_chunk_size.unwrap_or(defaults.lemma_chunk_size),
            use_conllu_feats,
            parallel: !self.sequential,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build (or extend) an index from JSON-lines entries
    ///
    /// Each line is either an array of surface words or an object with `tokens`,
    /// optional `headword_idx`, `entry_type`, `form`, `sources` and `payload`.
    Build {
        /// Path to the index database (created if missing)
        #[arg(long)]
        db: PathBuf,

        /// JSON-lines entry file
        #[arg(long)]
        entries: PathBuf,

        /// Lemmatizer table for surface-form tokens
        #[arg(long)]
        lemmatizer: Option<PathBuf>,

        /// Frequency table (JSON `{"language": .., "frequencies": {lemma: f}}`)
        #[arg(long)]
        frequencies: Option<PathBuf>,

        /// Language passed to the frequency oracle [default: table language, else fi]
        #[arg(long)]
        language: Option<String>,

        /// Entries per transaction [default: 1000]
        #[arg(long)]
        commit_batch_size: Option<usize>,

        /// Suppress progress output
        #[arg(long)]
        quiet: bool,
    },

    /// Match whitespace-tokenized sentences from stdin, one per line
    ExtractToks {
        #[command(flatten)]
        args: MatchArgs,
    },

    /// Match the sentences of a CoNLL-U file along their dependency trees
    ExtractDeps {
        #[command(flatten)]
        args: MatchArgs,

        /// CoNLL-U input file
        #[arg(long)]
        conllu: PathBuf,

        /// Take lemmas and features from the CoNLL-U columns instead of the lemmatizer
        #[arg(long)]
        use_conllu_feats: bool,
    },

    /// Show index statistics
    Stats {
        /// Path to the index database
        #[arg(long)]
        db: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            db,
            entries,
            lemmatizer,
            frequencies,
            language,
            commit_batch_size,
            quiet,
        } => {
            let defaults = BuildParams::default();
            let table = match frequencies {
                Some(path) => FrequencyTable::from_json_file(&path)?,
                None => FrequencyTable::new(&defaults.language),
            };
            let params = BuildParams {
                language: language.unwrap_or_else(|| table.language.clone()),
                commit_batch_size: commit_batch_size.unwrap_or(defaults.commit_batch_size),
            };
            let lemmatizer = load_lemmatizer(lemmatizer.as_deref(), quiet)?;

            if !quiet {
                eprintln!("Reading entries from {}...", entries.display());
            }
            let specs = read_entry_specs(&entries)?;
            if !quiet {
                eprintln!("  {} entries", specs.len());
            }

            let mut index = SqliteIndex::open(&db)?;
            let report = build_index(
                &mut index,
                specs,
                lemmatizer.as_ref(),
                &table,
                &params,
                !quiet,
            )?;

            println!("Indexed: {}", report.inserted_count());
            println!("Failed: {}", report.failed_count());
            if !quiet {
                eprintln!("\nIndex: {}", db.display());
            }
        }

        Commands::ExtractToks { args } => {
            let params = args.params(false);
            let index = SqliteIndex::open(&args.db)?;
            let lemmatizer = load_lemmatizer(args.lemmatizer.as_deref(), args.quiet)?;

            let mut sentences = Vec::new();
            for line in io::stdin().lock().lines() {
                let tokens: Vec<String> = line?.split_whitespace().map(str::to_string).collect();
                sentences.push(tokens);
            }
            if !args.quiet {
                eprintln!("Matching {} sentences...", sentences.len());
            }

            let results = match_token_sentences(
                &index,
                &sentences,
                lemmatizer.as_ref(),
                &params,
                !args.quiet,
            )?;
            emit(&results, &args)?;
        }

        Commands::ExtractDeps {
            args,
            conllu,
            use_conllu_feats,
        } => {
            let params = args.params(use_conllu_feats);
            let index = SqliteIndex::open(&args.db)?;
            let lemmatizer = load_lemmatizer(args.lemmatizer.as_deref(), args.quiet)?;

            if !args.quiet {
                eprintln!("Reading {}...", conllu.display());
            }
            let sentences = parse_file(&conllu)?;
            if !args.quiet {
                eprintln!("Matching {} sentences...", sentences.len());
            }

            let results = match_dep_sentences(
                &index,
                &sentences,
                lemmatizer.as_ref(),
                &params,
                !args.quiet,
            )?;
            emit(&results, &args)?;
        }

        Commands::Stats { db } => {
            let index = SqliteIndex::open(&db)?;
            print_stats(&index.stats()?);
        }
    }

    Ok(())
}

fn load_lemmatizer(path: Option<&Path>, quiet: bool) -> Result<Box<dyn Lemmatizer>, io::Error> {
    match path {
        Some(path) => {
            if !quiet {
                eprintln!("Loading lemmatizer table {}...", path.display());
            }
            let table = TableLemmatizer::from_json_file(path)?;
            if !quiet {
                eprintln!("  {} surface forms", table.len());
            }
            Ok(Box::new(table))
        }
        None => Ok(Box::new(NullLemmatizer)),
    }
}

fn emit(results: &[SentenceMatches], args: &MatchArgs) -> Result<(), OutputError> {
    match (&args.output, args.format) {
        (Some(path), OutputFormat::Json) => write_json_file(results, path)?,
        (Some(path), OutputFormat::Jsonl) => {
            let mut file = std::fs::File::create(path)?;
            write_json_lines(results, &mut file)?;
        }
        (Some(path), OutputFormat::Text) => {
            eprintln!(
                "Warning: text format is printed to stdout, ignoring --output {}",
                path.display()
            );
            print_matches(results);
        }
        (None, OutputFormat::Json) => write_json(results, &mut io::stdout().lock())?,
        (None, OutputFormat::Jsonl) => write_json_lines(results, &mut io::stdout().lock())?,
        (None, OutputFormat::Text) => print_matches(results),
    }
    io::stdout().flush()?;

    if !args.quiet {
        if matches!(args.format, OutputFormat::Text) {
            print_summary(results);
        }
        if let Some(ref path) = args.output {
            eprintln!("\nOutput: {}", path.display());
        }
    }
    Ok(())
}
