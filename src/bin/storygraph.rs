//! Storygraph command-line interface.
//!
//! Usage:
//!   storygraph ingest <manuscript> [--file path] [--per-paragraph] [--mock]
//!   storygraph arc <manuscript> <character>
//!   storygraph ask <manuscript> <question...>
//!   storygraph suggest <manuscript>
//!   storygraph stats <manuscript>

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use storygraph::{
    ArcAnalyzer, ArcOutcome, ChatClient, GraphStore, IngestionWorker, ManuscriptId, MockGenerator,
    OpenStore, SceneSuggester, SqliteStore, StorygraphConfig, Submission, TextGenerator,
    TimelineQaEngine,
};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(
    name = "storygraph",
    version,
    about = "Incremental story knowledge graph"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Path to YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug log output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract entities from text and add them to the graph
    Ingest {
        /// Manuscript id
        manuscript: String,
        /// Read text from a file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
        /// Chapter number
        #[arg(long)]
        chapter: Option<u32>,
        /// Paragraph id for a single submission
        #[arg(long, default_value = "p1")]
        paragraph: String,
        /// Submit each blank-line separated paragraph on its own (p1, p2, ...)
        #[arg(long)]
        per_paragraph: bool,
        /// Use an offline generator that extracts nothing
        #[arg(long)]
        mock: bool,
    },
    /// Print a character's sentiment arc as JSON
    Arc {
        /// Manuscript id
        manuscript: String,
        /// Character name (case-insensitive, partial match)
        character: String,
    },
    /// Ask a question about the story timeline
    Ask {
        /// Manuscript id
        manuscript: String,
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Suggest what could happen in the next scene
    Suggest {
        /// Manuscript id
        manuscript: String,
    },
    /// Print node and edge counts for a manuscript
    Stats {
        /// Manuscript id
        manuscript: String,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, _) => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(config: &StorygraphConfig, db: Option<PathBuf>) -> Result<Arc<SqliteStore>, String> {
    let db_path = db.unwrap_or_else(|| config.database_path());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let store =
        SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(Arc::new(store))
}

fn open_generator(config: &StorygraphConfig, mock: bool) -> Result<Arc<dyn TextGenerator>, String> {
    if mock {
        return Ok(Arc::new(MockGenerator::new().with_fallback("{}")));
    }
    let client = ChatClient::from_config(&config.generator)
        .map_err(|e| format!("Failed to create generator: {}", e))?;
    Ok(Arc::new(client))
}

fn print_json<T: Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn read_input(file: Option<&PathBuf>) -> Result<String, String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e)),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| format!("Failed to read stdin: {}", e))?;
            Ok(text)
        }
    }
}

fn submissions(
    manuscript: &ManuscriptId,
    chapter: Option<u32>,
    paragraph: &str,
    per_paragraph: bool,
    text: &str,
) -> Vec<Submission> {
    if !per_paragraph {
        return vec![Submission {
            manuscript_id: manuscript.clone(),
            chapter,
            paragraph_id: paragraph.to_string(),
            text: text.to_string(),
        }];
    }
    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .enumerate()
        .map(|(i, p)| Submission {
            manuscript_id: manuscript.clone(),
            chapter,
            paragraph_id: format!("p{}", i + 1),
            text: p.to_string(),
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
async fn cmd_ingest(
    config: &StorygraphConfig,
    store: Arc<SqliteStore>,
    manuscript: &str,
    file: Option<PathBuf>,
    chapter: Option<u32>,
    paragraph: &str,
    per_paragraph: bool,
    mock: bool,
) -> i32 {
    let text = match read_input(file.as_ref()) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let generator = match open_generator(config, mock) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let manuscript = ManuscriptId::from(manuscript);
    let (handle, task) = IngestionWorker::from_config(config, store, generator).spawn();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();

    let mut queued = 0;
    for submission in submissions(&manuscript, chapter, paragraph, per_paragraph, &text) {
        match handle.submit(submission, Some(reply_tx.clone())) {
            Ok(ids) => queued += ids.len(),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    }
    drop(reply_tx);
    drop(handle);

    if queued == 0 {
        eprintln!("Nothing to ingest");
        return 0;
    }

    let mut failed = 0;
    while let Some(event) = reply_rx.recv().await {
        if !event.is_success() {
            failed += 1;
        }
        match serde_json::to_string(&event) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("Error: {}", e),
        }
    }
    if let Err(e) = task.await {
        eprintln!("Error: worker task failed: {}", e);
        return 1;
    }

    if failed > 0 {
        eprintln!("{} of {} chunks failed", failed, queued);
        1
    } else {
        0
    }
}

fn cmd_arc(store: Arc<SqliteStore>, manuscript: &str, character: &str) -> i32 {
    let analyzer = ArcAnalyzer::new(store);
    match analyzer.arc(&ManuscriptId::from(manuscript), character) {
        Ok(ArcOutcome::Found(arc)) => print_json(&arc),
        Ok(ArcOutcome::NotFound) => {
            eprintln!("Error: no scenes found for '{}'", character);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_ask(
    config: &StorygraphConfig,
    store: Arc<SqliteStore>,
    manuscript: &str,
    question: &[String],
) -> i32 {
    let generator = match open_generator(config, false) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let engine = TimelineQaEngine::new(store, generator);
    let answer = engine
        .answer(&ManuscriptId::from(manuscript), &question.join(" "))
        .await;
    print_json(&answer)
}

async fn cmd_suggest(config: &StorygraphConfig, store: Arc<SqliteStore>, manuscript: &str) -> i32 {
    let generator = match open_generator(config, false) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let suggestion = SceneSuggester::new(store, generator)
        .suggest(&ManuscriptId::from(manuscript))
        .await;
    print_json(&suggestion)
}

fn cmd_stats(store: Arc<SqliteStore>, manuscript: &str) -> i32 {
    match store.stats(&ManuscriptId::from(manuscript)) {
        Ok(stats) => print_json(&stats),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = match StorygraphConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let store = match open_store(&config, cli.db) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Ingest {
            manuscript,
            file,
            chapter,
            paragraph,
            per_paragraph,
            mock,
        } => {
            cmd_ingest(
                &config,
                store,
                &manuscript,
                file,
                chapter,
                &paragraph,
                per_paragraph,
                mock,
            )
            .await
        }
        Commands::Arc {
            manuscript,
            character,
        } => cmd_arc(store, &manuscript, &character),
        Commands::Ask {
            manuscript,
            question,
        } => cmd_ask(&config, store, &manuscript, &question).await,
        Commands::Suggest { manuscript } => cmd_suggest(&config, store, &manuscript).await,
        Commands::Stats { manuscript } => cmd_stats(store, &manuscript),
    };
    std::process::exit(code);
}
