use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docqa::config::Config;
use docqa::embedder::download;
use docqa::embedder::onnx::OnnxEmbedder;
use docqa::embedder::Embedder;
use docqa::service::RetrievalService;

#[derive(Parser)]
#[command(name = "docqa", about = "Document QA retrieval core", version)]
struct Cli {
    /// Path to the JSON config file.
    #[arg(long, default_value = "config.json")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk, embed, and index a text file under the given document ID.
    Ingest { doc_id: i64, file: PathBuf },

    /// Retrieve the chunks most similar to a question.
    Query {
        text: String,

        /// Maximum number of results.
        #[arg(long)]
        top_k: Option<usize>,

        /// Minimum cosine score for a result.
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Remove every indexed chunk of a document.
    Remove { doc_id: i64 },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // 1. Load and validate config
    let config = Config::load(&cli.config)?;
    config.validate()?;

    // 2. Init embedder (downloads model files on first run)
    let model_dir = download::model_dir(&config.model.name);
    download::ensure_model_files(&model_dir, &config.model.name)?;
    let embedder: Arc<dyn Embedder> = Arc::new(
        OnnxEmbedder::load(&model_dir, config.model.dimensions)
            .context("failed to load embedding model")?,
    );

    // 3. Open the retrieval service (loads snapshot if present)
    let service = RetrievalService::open(
        Path::new(&config.index_dir),
        embedder,
        config.chunk_size,
        config.chunk_overlap,
    )
    .context("failed to open retrieval service")?;

    match cli.command {
        Command::Ingest { doc_id, file } => {
            let text = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let ids = service.ingest(doc_id, &text)?;
            println!("Indexed {} chunks for document {doc_id}", ids.len());
        }
        Command::Query {
            text,
            top_k,
            threshold,
        } => {
            let k = top_k.unwrap_or(config.search_top_k);
            let threshold = threshold.unwrap_or(config.score_threshold);
            let hits = service.query(&text, k, threshold)?;

            if hits.is_empty() {
                println!("No chunks scored at or above {threshold}");
            }
            for hit in hits {
                println!("{}\t{:.4}", hit.id, hit.score);
            }
        }
        Command::Remove { doc_id } => {
            let ids = service.document_chunks(doc_id);
            service.remove_document(doc_id, &ids)?;
            println!("Removed {} chunks for document {doc_id}", ids.len());
        }
    }

    service.flush()?;
    Ok(())
}
