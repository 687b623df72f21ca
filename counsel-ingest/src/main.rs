use std::path::PathBuf;

use clap::Parser;
use counsel_core::config::expand_path;
use counsel_core::{CounselConfig, OpenAiEmbeddingClient};
use counsel_ingest::{IngestOptions, RetryPolicy};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Build the example-retrieval indexes from counseling transcripts")]
struct Args {
    #[arg(short, long, default_value = "counsel.toml")]
    config: String,

    /// Directory of `high_*` / `low_*` transcript files
    #[arg(short, long, default_value = "HighLowQualityCounseling/transcripts")]
    transcripts: String,

    /// Output directory (defaults to `examples.index_dir` from the config)
    #[arg(short, long)]
    output: Option<String>,

    #[arg(long, default_value_t = 3)]
    max_retries: usize,

    #[arg(long, default_value_t = 500)]
    retry_delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = CounselConfig::load(&args.config)?;
    let backend = OpenAiEmbeddingClient::from_env(config.embedding.clone())?;

    let output: PathBuf = match &args.output {
        Some(dir) => expand_path(dir),
        None => expand_path(&config.examples.index_dir),
    };
    let options = IngestOptions {
        transcripts_dir: expand_path(&args.transcripts),
        output_dir: output,
        retry: RetryPolicy {
            max_retries: args.max_retries,
            base_delay_ms: args.retry_delay_ms,
        },
    };

    let summary = counsel_ingest::run(&options, &backend).await?;
    tracing::info!(
        high = summary.high,
        low = summary.low,
        dimensions = summary.dimensions,
        "Ingest complete"
    );

    Ok(())
}
