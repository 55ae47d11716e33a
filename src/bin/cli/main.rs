//! folio-cli: index and query a file-backed store from the terminal.
//!
//! The server defaults to an in-memory index; the CLI always works against
//! a SQLite file so repeated invocations see the same store.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use folio::config::AppConfig;
use folio::pdf;
use folio::providers::{OpenAiEmbedder, OpenAiGenerator};
use folio::rag::{self, AnswerComposer, Retriever, VectorIndex};

#[derive(Parser)]
#[command(name = "folio-cli", about = "PDF question answering from the terminal", version)]
struct Cli {
    /// Path to a TOML config file (default: <config_dir>/folio/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the index database (default: <data_dir>/folio/index.db)
    #[arg(long, global = true)]
    index: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed, and index a PDF
    Index {
        /// Path to the PDF file
        pdf: PathBuf,
    },

    /// Ask a question about the indexed documents
    Ask {
        /// The question
        question: String,
        /// Print the retrieved chunks used as context
        #[arg(long)]
        sources: bool,
        /// Override the number of chunks retrieved
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Show index statistics
    Stats,

    /// Remove every entry from the index
    Clear,
}

fn resolve_index_path(cli_path: Option<PathBuf>, config: &AppConfig) -> anyhow::Result<PathBuf> {
    cli_path
        .or_else(|| config.index.path.clone())
        .or_else(AppConfig::default_index_path)
        .context("no index path configured and no data directory available")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("failed to load config")?;
    let index_path = resolve_index_path(cli.index.clone(), &config)?;

    match cli.command {
        Command::Index { pdf: pdf_path } => {
            let index =
                VectorIndex::open_pinned(Some(&index_path), config.pinned_embedding())?;
            let embedder = OpenAiEmbedder::from_config(&config.embedding)
                .context("failed to build embedding client")?;

            let pages = pdf::load_pages(&pdf_path)
                .with_context(|| format!("failed to load {}", pdf_path.display()))?;

            let index = Mutex::new(index);
            let report =
                rag::ingest_pages(&embedder, &index, &pages, &config.chunking).await?;

            println!(
                "indexed {} chunks from {} pages into {}",
                report.chunks,
                report.pages,
                index_path.display()
            );
        }

        Command::Ask {
            question,
            sources,
            top_k,
        } => {
            let index =
                VectorIndex::open_pinned(Some(&index_path), config.pinned_embedding())?;
            if index.is_empty()? {
                bail!(
                    "index at {} is empty; run `folio-cli index <pdf>` first",
                    index_path.display()
                );
            }

            let embedder = Arc::new(
                OpenAiEmbedder::from_config(&config.embedding)
                    .context("failed to build embedding client")?,
            );
            let generator = Arc::new(
                OpenAiGenerator::from_config(&config.generation)
                    .context("failed to build generation client")?,
            );

            let retriever = Retriever::new(
                embedder,
                Arc::new(Mutex::new(index)),
                top_k.unwrap_or(config.retriever.top_k),
            );
            let composer =
                AnswerComposer::new(generator, config.generation.max_context_chars);

            let chunks = retriever.retrieve(&question).await?;
            let answer = composer.answer(&question, &chunks, sources).await?;

            println!("{}", answer.text);
            if let Some(used) = answer.sources {
                println!("\n--- Sources ---");
                for chunk in used {
                    println!(
                        "[pages {}-{}, score {:.3}]\n{}\n",
                        chunk.page_start,
                        chunk.page_end,
                        chunk.score,
                        chunk.content.trim()
                    );
                }
            }
        }

        Command::Stats => {
            let index =
                VectorIndex::open_pinned(Some(&index_path), config.pinned_embedding())?;
            let stats = index.stats()?;
            println!("index:      {}", index_path.display());
            println!("chunks:     {}", stats.chunk_count);
            println!("dimensions: {}", stats.dimensions);
        }

        Command::Clear => {
            let mut index =
                VectorIndex::open_pinned(Some(&index_path), config.pinned_embedding())?;
            index.clear()?;
            println!("cleared index at {}", index_path.display());
        }
    }

    Ok(())
}
