use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use odict_lemmatizer::Lemmatizer;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;
use wordnet_db::{LazyThesaurus, LoadMode, Thesaurus};

use textindex::{AppState, TextIndex, frequency_report, join_sections, router, write_report};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_INDEX: &str = "index.json";
const DEFAULT_DICTIONARY: &str = "odict.csv";
const DEFAULT_THESAURUS: &str = "rwn3";
const MAX_COMMON: usize = 1000;

/// Lemma-aware concordance over a text corpus.
#[derive(Parser)]
#[command(name = "textindex", version, about)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build an index from a corpus file and save it.
    Index {
        /// Corpus text file.
        #[arg(short, long)]
        input: PathBuf,
        /// Where to write the index snapshot.
        #[arg(short, long)]
        output: PathBuf,
        /// Word-form dictionary (`lemma,tag,form,...` per line).
        #[arg(long, env = "TEXTINDEX_DICTIONARY", default_value = DEFAULT_DICTIONARY)]
        dictionary: PathBuf,
    },
    /// Most frequent lemmas.
    Common {
        count: usize,
        #[command(flatten)]
        io: ReportArgs,
    },
    /// Lines containing any form of each word.
    Lines {
        #[arg(required = true)]
        words: Vec<String>,
        #[command(flatten)]
        io: ReportArgs,
    },
    /// Occurrences, forms and pages of each lemma.
    Info {
        #[arg(required = true)]
        words: Vec<String>,
        #[command(flatten)]
        io: ReportArgs,
    },
    /// Occurrences of every hyponym of each group word.
    Group {
        #[arg(required = true)]
        groups: Vec<String>,
        #[command(flatten)]
        io: ReportArgs,
        #[command(flatten)]
        thesaurus: ThesaurusArgs,
    },
    /// Serve queries over HTTP.
    Serve {
        #[arg(short, long, env = "TEXTINDEX_INDEX", default_value = DEFAULT_INDEX)]
        index: PathBuf,
        #[command(flatten)]
        thesaurus: ThesaurusArgs,
        #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
        host: String,
        #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

#[derive(Args)]
struct ReportArgs {
    /// Index snapshot written by `index`.
    #[arg(short, long, env = "TEXTINDEX_INDEX", default_value = DEFAULT_INDEX)]
    index: PathBuf,
    /// Write the report to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ThesaurusArgs {
    /// Directory with WordNet `index.*` and `data.*` files.
    #[arg(long, env = "TEXTINDEX_THESAURUS", default_value = DEFAULT_THESAURUS)]
    thesaurus: PathBuf,
    /// `mmap` or `owned`.
    #[arg(long, env = "TEXTINDEX_WORDNET_MODE", default_value = "mmap")]
    wordnet_mode: LoadMode,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Index {
            input,
            output,
            dictionary,
        } => build_index(&input, &output, &dictionary),
        Command::Common { count, io } => {
            let index = load_index(&io.index)?;
            let report = frequency_report(&index.most_frequent(count));
            write_report(io.output.as_deref(), &report)
        }
        Command::Lines { words, io } => {
            let index = load_index(&io.index)?;
            let sections = words.iter().map(|w| index.find_lines(&w.to_lowercase()));
            write_report(io.output.as_deref(), &join_sections(sections))
        }
        Command::Info { words, io } => {
            let index = load_index(&io.index)?;
            let sections = words
                .iter()
                .map(|w| index.generate_report(&w.to_lowercase()));
            write_report(io.output.as_deref(), &join_sections(sections))
        }
        Command::Group {
            groups,
            io,
            thesaurus,
        } => group_reports(&groups, &io, &thesaurus),
        Command::Serve {
            index,
            thesaurus,
            host,
            port,
        } => serve(&index, thesaurus, &host, port).await,
    }
}

fn build_index(input: &Path, output: &Path, dictionary: &Path) -> Result<()> {
    info!("using dictionary at {}", dictionary.display());
    let start = Instant::now();
    let lemmatizer = Lemmatizer::load(dictionary)?;
    info!("dictionary loaded in {} ms", start.elapsed().as_millis());

    let start = Instant::now();
    let index = TextIndex::from_file(input, &lemmatizer)?;
    info!("index built in {} ms", start.elapsed().as_millis());

    index.save(output)?;
    info!("index saved to {}", output.display());
    Ok(())
}

fn group_reports(groups: &[String], io: &ReportArgs, args: &ThesaurusArgs) -> Result<()> {
    let index = load_index(&io.index)?;
    let start = Instant::now();
    let thesaurus = Thesaurus::load_with_mode(&args.thesaurus, args.wordnet_mode)
        .with_context(|| format!("loading thesaurus from {}", args.thesaurus.display()))?;
    info!("thesaurus loaded in {} ms", start.elapsed().as_millis());

    let mut sections = Vec::with_capacity(groups.len());
    let mut failed = 0usize;
    for group in groups {
        match index.generate_group_report(&group.to_lowercase(), &thesaurus) {
            Ok(report) => sections.push(report),
            Err(e) => {
                error!("group `{group}` skipped: {e}");
                failed += 1;
            }
        }
    }
    write_report(io.output.as_deref(), &join_sections(sections))?;
    if failed > 0 {
        anyhow::bail!("{failed} group queries failed");
    }
    Ok(())
}

async fn serve(index_path: &Path, args: ThesaurusArgs, host: &str, port: u16) -> Result<()> {
    info!("binding to {}:{}", host, port);
    info!(
        "using thesaurus at {} (mode: {:?}), loaded on first group query",
        args.thesaurus.display(),
        args.wordnet_mode
    );

    let index = Arc::new(load_index(index_path)?);
    let state = AppState {
        index,
        thesaurus: Arc::new(LazyThesaurus::from_dir(args.thesaurus, args.wordnet_mode)),
        max_count: MAX_COMMON,
    };

    let app = router(state).layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;
    Ok(())
}

fn load_index(path: &Path) -> Result<TextIndex> {
    let start = Instant::now();
    let index = TextIndex::load(path)?;
    info!(
        "index loaded from {} in {} ms ({} lines, {} lemmas)",
        path.display(),
        start.elapsed().as_millis(),
        index.line_count(),
        index.lemma_count()
    );
    Ok(index)
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .with_writer(std::io::stderr)
        .init();
}
