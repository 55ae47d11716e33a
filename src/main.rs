use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use folio::config::AppConfig;
use folio::providers::{OpenAiEmbedder, OpenAiGenerator};
use folio::rag::VectorIndex;
use folio::server::{self, AppState};

#[derive(Parser)]
#[command(name = "folio", about = "PDF question-answering server", version)]
struct Cli {
    /// Path to a TOML config file (default: <config_dir>/folio/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the listen port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let index = VectorIndex::open_pinned(config.index.path.as_deref(), config.pinned_embedding())
        .context("failed to open vector index")?;
    if let Some(path) = &config.index.path {
        log::info!("using file-backed index at {}", path.display());
    } else {
        log::info!("using in-memory index; contents are lost on exit");
    }

    let embedder = Arc::new(
        OpenAiEmbedder::from_config(&config.embedding)
            .context("failed to build embedding client")?,
    );
    let generator = Arc::new(
        OpenAiGenerator::from_config(&config.generation)
            .context("failed to build generation client")?,
    );

    let state = Arc::new(AppState::new(config, index, embedder, generator));
    server::serve(state).await.context("server failed")?;

    Ok(())
}
