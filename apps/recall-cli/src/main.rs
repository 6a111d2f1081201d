//! `recall`: operate a hybrid retrieval corpus from the command line.
//!
//! ```bash
//! recall ingest ./notes            # chunk every .txt file, replacing earlier versions
//! recall add-text runbook "..."    # one manual_text group keyed by `runbook`
//! recall sync-registry systems.json
//! recall query "restart the beta cluster" -k 4 --context
//! recall remove rag::manual_text::runbook
//! recall stats
//! ```
//!
//! Settings come from `config.toml` / `APP_*` (see `[retrieval]`).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use recall_core::config::Config;
use recall_core::ingest::{build_bft_documents, build_generic_documents, chunk_text, clean_text, ChunkingConfig, DataProcessor, SOURCE_MANUAL_TEXT};
use recall_core::registry::{extract_known_systems, JsonFileRegistry};
use recall_core::Metadata;
use recall_hybrid::{format_context, open_default_engine, DefaultEngine, MutationReport};

#[derive(Parser)]
#[command(name = "recall", version, about = "Hybrid BM25 + vector retrieval over a local corpus")]
struct Cli {
    /// Override `retrieval.data_dir`
    #[arg(long, global = true, env = "RECALL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk and index every .txt file under a directory
    Ingest {
        dir: PathBuf,
        /// Only the first N files (sorted by path)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Index free text as one replaceable group
    AddText {
        key: String,
        text: String,
        #[arg(long, default_value = SOURCE_MANUAL_TEXT)]
        source: String,
    },
    /// Index the text of a BFT document under `bft::<id>`
    AddBft { bft_id: String, text: String },
    /// Replace registry-derived documents with the systems in a JSON file
    SyncRegistry { file: PathBuf },
    Query {
        text: String,
        #[arg(short, long)]
        k: Option<usize>,
        /// Print prompt-ready context blocks instead of a ranked list
        #[arg(long)]
        context: bool,
        /// Also list the systems mentioned by the results
        #[arg(long)]
        systems: bool,
    },
    /// Delete whole base-id groups
    Remove {
        #[arg(required = true)]
        base_ids: Vec<String>,
    },
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let config = Config::load().context("loading configuration")?;
    let mut settings = config.retrieval()?;
    if let Some(dir) = cli.data_dir { settings.data_dir = dir.to_string_lossy().into_owned(); }
    let chunking = ChunkingConfig::from_settings(&settings);
    let engine = open_default_engine(&settings).context("opening retrieval engine")?;

    match cli.command {
        Command::Ingest { dir, limit } => ingest(&engine, &dir, chunking, limit)?,
        Command::AddText { key, text, source } => {
            let docs = build_generic_documents(&key, &source, &text, &Metadata::new(), &chunking);
            print_report(&engine.add_documents(docs, true)?);
        }
        Command::AddBft { bft_id, text } => {
            let docs = build_bft_documents(&bft_id, &chunk_text(&clean_text(&text), &chunking));
            print_report(&engine.add_documents(docs, true)?);
        }
        Command::SyncRegistry { file } => {
            print_report(&engine.sync_registry(&JsonFileRegistry::new(file))?);
        }
        Command::Query { text, k, context, systems } => {
            let k = k.unwrap_or(settings.top_k);
            let hits = engine.retrieve_scored(&text, k)?;
            if context {
                let docs: Vec<_> = hits.iter().map(|h| h.document.clone()).collect();
                println!("{}", format_context(&docs));
            } else if hits.is_empty() {
                println!("no results for \"{text}\"");
            } else {
                for (i, hit) in hits.iter().enumerate() {
                    let rank = |r: Option<usize>| r.map_or_else(|| "-".to_string(), |r| r.to_string());
                    println!(
                        "{:>2}. {:.5}  lex={} vec={}  {}  [{}]",
                        i + 1,
                        hit.score,
                        rank(hit.lexical_rank),
                        rank(hit.vector_rank),
                        hit.document.id,
                        hit.document.source
                    );
                    println!("    {}", preview(&hit.document.content, 160));
                }
            }
            if systems {
                let docs: Vec<_> = hits.into_iter().map(|h| h.document).collect();
                println!("{}", serde_json::to_string_pretty(&extract_known_systems(&docs))?);
            }
        }
        Command::Remove { base_ids } => print_report(&engine.remove_base_ids(&base_ids)?),
        Command::Stats => {
            let stats = engine.stats()?;
            println!("documents: {}", stats.documents);
            println!("base ids:  {}", stats.base_ids);
            println!("vectors:   {}", stats.vectors);
            for (source, count) in &stats.by_source { println!("  {source}: {count}"); }
        }
    }
    Ok(())
}

fn ingest(engine: &DefaultEngine, dir: &std::path::Path, chunking: ChunkingConfig, limit: Option<usize>) -> Result<()> {
    let mut processor = DataProcessor::new(chunking);
    if let Some(limit) = limit { processor = processor.with_limit(limit); }
    let files = processor.list_txt_files(dir);
    if files.is_empty() {
        println!("no .txt files under {}", dir.display());
        return Ok(());
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let mut docs = Vec::new();
    for file in &files {
        pb.set_message(file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default());
        docs.extend(processor.process_file(dir, file)?);
        pb.inc(1);
    }
    pb.finish_with_message(format!("{} chunks", docs.len()));

    info!(files = files.len(), chunks = docs.len(), "indexing");
    print_report(&engine.add_documents(docs, true)?);
    Ok(())
}

fn print_report(report: &MutationReport) {
    if report.is_noop() {
        println!("nothing changed ({} skipped)", report.skipped);
    } else {
        println!("removed {}, inserted {}, skipped {}", report.removed, report.inserted, report.skipped);
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
