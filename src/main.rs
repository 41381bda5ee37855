use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod client;
mod codegen;
mod config;
mod engine;
mod engines;
mod error;
mod fusion;
mod json;
mod layout;
mod parser;
mod pipeline;
mod report;
mod server;
mod signals;
mod snapshot;
mod types;
mod vision;

use config::OcrBackend;

#[derive(Parser, Debug)]
#[command(name = "snapshot-inventory-server")]
#[command(about = "Turns product page snapshots into a feature inventory report")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "SNAPSHOT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "SNAPSHOT_PORT", default_value = "3001")]
    pub port: u16,

    /// Maximum request body size in bytes (default: 10MB)
    #[arg(long, env = "SNAPSHOT_MAX_BODY_SIZE", default_value = "10485760")]
    pub max_body_size: usize,

    /// Text recognition strategy used for image snapshots
    #[arg(long, env = "SNAPSHOT_OCR_BACKEND", value_enum, default_value = "model")]
    pub ocr_backend: OcrBackend,

    /// Base URL of an OpenAI-compatible chat completions endpoint
    #[arg(
        long,
        env = "SNAPSHOT_MODEL_BASE_URL",
        default_value = "https://api.openai.com/v1"
    )]
    pub model_base_url: String,

    /// Bearer token for the model endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model used for the structured vision pass
    #[arg(long, env = "SNAPSHOT_VISION_MODEL", default_value = "gpt-4o")]
    pub vision_model: String,

    /// Model used for model-based OCR
    #[arg(long, env = "SNAPSHOT_OCR_MODEL", default_value = "gpt-4o-mini")]
    pub ocr_model: String,

    /// Model used to analyze text snapshots
    #[arg(long, env = "SNAPSHOT_ANALYSIS_MODEL", default_value = "gpt-4o")]
    pub analysis_model: String,

    /// Per-call timeout for model requests, in seconds
    #[arg(long, env = "SNAPSHOT_MODEL_TIMEOUT_SECS", default_value = "60")]
    pub model_timeout_secs: u64,

    /// Completion token limit for model requests
    #[arg(long, env = "SNAPSHOT_MAX_TOKENS", default_value = "1500")]
    pub max_tokens: u32,

    /// OCR confidence at or above which the OCR title wins over the vision title
    #[arg(long, env = "SNAPSHOT_OCR_TITLE_THRESHOLD", default_value = "75")]
    pub ocr_title_threshold: f32,

    /// Minimum length of a line accepted as a title by the signal extractor
    #[arg(long, env = "SNAPSHOT_MIN_TITLE_LENGTH", default_value = "8")]
    pub min_title_length: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from(args);

    tracing::info!(
        "Starting snapshot-inventory-server v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!(
        "Binding to {}:{} (ocr backend: {})",
        config.host,
        config.port,
        config.ocr_backend.as_str()
    );

    server::run(config).await
}
