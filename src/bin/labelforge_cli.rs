//! LabelForge CLI - One invocation, one document
//!
//! Takes the render payload as an argument or a file.
//! Prints the JSON status object to stdout; logs go to stderr.
//! Returns non-zero when no document was stored.

use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use labelforge_core::pipeline::PipelineError;
use labelforge_core::storage::ObjectStore;
use labelforge_core::{
    FsObjectStore, RenderConfig, RenderPipeline, RenderStatus, ReqwestFetcher, S3ObjectStore,
    Storage,
};

#[derive(Parser)]
#[command(name = "labelforge-cli")]
#[command(about = "LabelForge CLI - data-driven SVG label compositor")]
struct Cli {
    /// JSON payload (RenderRequest)
    #[arg(required_unless_present = "payload_file", conflicts_with = "payload_file")]
    payload: Option<String>,

    /// Read the JSON payload from a file
    #[arg(long)]
    payload_file: Option<PathBuf>,

    /// Serve s3:// locators from bucket directories under this root instead of S3
    #[arg(long, env = "LABELFORGE_STORE_ROOT")]
    store_root: Option<PathBuf>,

    /// Parent directory for per-invocation scratch space
    #[arg(long, env = "LABELFORGE_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Network timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Skip loading system fonts before rasterizing
    #[arg(long)]
    no_system_fonts: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let timeout = Duration::from_secs(cli.timeout);
    let mut config = RenderConfig::new()
        .with_http_timeout(timeout)
        .with_load_system_fonts(!cli.no_system_fonts);
    if let Some(dir) = &cli.scratch_dir {
        config = config.with_scratch_root(dir);
    }

    let result = build_pipeline(&cli, config)
        .and_then(|pipeline| read_payload(&cli).and_then(|payload| pipeline.render_payload(payload)));
    if let Err(e) = &result {
        tracing::error!(error = %e, "render failed");
    }

    let status = RenderStatus::from(&result);
    println!("{}", status.to_json());

    if status.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn build_pipeline(cli: &Cli, config: RenderConfig) -> Result<RenderPipeline, PipelineError> {
    let timeout = config.http_timeout;
    let objects: Box<dyn ObjectStore> = match &cli.store_root {
        Some(root) => Box::new(FsObjectStore::new(root)),
        None => Box::new(S3ObjectStore::from_env(timeout)?),
    };
    let storage = Storage::new(objects, Box::new(ReqwestFetcher::new(timeout)?));
    Ok(RenderPipeline::with_defaults(Arc::new(storage), config))
}

fn read_payload(cli: &Cli) -> Result<serde_json::Value, PipelineError> {
    let raw = match (&cli.payload, &cli.payload_file) {
        (Some(inline), _) => inline.clone(),
        (None, Some(path)) => fs::read_to_string(path)?,
        (None, None) => return Err(PipelineError::MalformedSpec("no payload given".into())),
    };
    serde_json::from_str(&raw).map_err(|e| PipelineError::MalformedSpec(e.to_string()))
}
