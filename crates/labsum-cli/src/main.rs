//! labsum CLI - Lab report summaries behind a hallucination guardrail
//!
//! ## Commands
//!
//! - `labsum verify --input FILE` - Run only the guardrail on `{tests_raw, tests}`
//! - `labsum extract --text T | --file F | --image I` - Extract raw test lines
//! - `labsum normalize --input FILE` - Normalize `{tests_raw}` into structured tests
//! - `labsum summarize --input FILE` - Guardrail, then patient summary
//! - `labsum process --text T | --file F | --image I` - Full pipeline
//!
//! Results are printed as JSON on stdout; logs go to stderr.
//!
//! ## Exit codes
//!
//! 0 processed, 1 server-side failure, 2 bad input, 3 unprocessed (guardrail refused)

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use labsum_core::{ExtractionResult, Guardrail, SummarizeRequest};
use labsum_runtime::{
    ConfigError, DocumentSource, PipelineError, PipelineOutcome, ProviderError, ProviderRegistry,
    ReportPipeline, ReportPipelineBuilder, RuntimeConfig, TesseractExtractor,
};

const EXIT_SERVER_ERROR: u8 = 1;
const EXIT_CLIENT_ERROR: u8 = 2;
const EXIT_UNPROCESSED: u8 = 3;

/// labsum - Patient-friendly lab report summaries with a hallucination guardrail
#[derive(Parser)]
#[command(name = "labsum")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (YAML or JSON)
    #[arg(short, long, global = true, env = "LABSUM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check normalized tests against raw tests without calling a model
    Verify {
        /// JSON file with `tests_raw` and `tests` ("-" for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Step 1: extract raw test lines from a report
    Extract {
        #[command(flatten)]
        source: SourceArgs,

        /// Tesseract binary used for --image
        #[arg(long, default_value = "tesseract")]
        ocr_binary: String,
    },

    /// Step 2: normalize raw test lines
    Normalize {
        /// JSON file with `tests_raw` ("-" for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Step 3: run the guardrail, then summarize
    Summarize {
        /// JSON file with `tests_raw` and `tests` ("-" for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Run the full pipeline on a report
    Process {
        #[command(flatten)]
        source: SourceArgs,

        /// Tesseract binary used for --image
        #[arg(long, default_value = "tesseract")]
        ocr_binary: String,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    /// Report text
    #[arg(long)]
    text: Option<String>,

    /// Text file containing the report
    #[arg(long)]
    file: Option<PathBuf>,

    /// Report image, read with OCR
    #[arg(long)]
    image: Option<PathBuf>,
}

impl SourceArgs {
    fn load(&self) -> Result<DocumentSource> {
        if let Some(text) = &self.text {
            return Ok(DocumentSource::Text(text.clone()));
        }
        if let Some(path) = &self.file {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read report file {}", path.display()))?;
            return Ok(DocumentSource::Text(text));
        }
        if let Some(path) = &self.image {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read image {}", path.display()))?;
            return Ok(DocumentSource::Image(bytes));
        }
        anyhow::bail!("One of --text, --file or --image is required")
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Verify { input } => {
            let request: SummarizeRequest = read_json(&input)?;
            let verdict = Guardrail::with_config(config.guardrail)
                .verify(&request.tests_raw, &request.tests);
            tracing::debug!(pass = verdict.is_pass(), "Guardrail verdict");
            print_json(&verdict)?;
            Ok(if verdict.is_pass() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_UNPROCESSED)
            })
        }

        Commands::Extract { source, ocr_binary } => {
            let document = source.load()?;
            let output = build_pipeline(config, &ocr_binary)?.extract(&document).await?;
            print_json(&output)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Normalize { input } => {
            let request: ExtractionResult = read_json(&input)?;
            let output = build_pipeline(config, "tesseract")?
                .normalize(&request.tests_raw)
                .await?;
            print_json(&output)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Summarize { input } => {
            let request: SummarizeRequest = read_json(&input)?;
            let outcome = build_pipeline(config, "tesseract")?
                .summarize(&request.tests_raw, request.tests)
                .await?;
            report_outcome(&outcome)
        }

        Commands::Process { source, ocr_binary } => {
            let document = source.load()?;
            let outcome = build_pipeline(config, &ocr_binary)?.process(&document).await?;
            report_outcome(&outcome)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };

    tracing::debug!(
        source = %path.map_or_else(|| "defaults".to_string(), |p| p.display().to_string()),
        provider = %config.provider,
        model = %config.model,
        threshold = config.guardrail.match_threshold,
        "Config loaded"
    );
    Ok(config)
}

fn build_pipeline(config: RuntimeConfig, ocr_binary: &str) -> Result<ReportPipeline> {
    let provider = ProviderRegistry::with_defaults()
        .create_from(&config)
        .with_context(|| format!("Failed to create '{}' provider", config.provider))?;

    Ok(ReportPipelineBuilder::new()
        .provider(provider)
        .text_extractor(Arc::new(TesseractExtractor::new(ocr_binary)))
        .config(config)
        .build()?)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input {}", path.display()))?
    };

    serde_json::from_str(&contents)
        .with_context(|| format!("Invalid input JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report_outcome(outcome: &PipelineOutcome) -> Result<ExitCode> {
    print_json(outcome)?;
    Ok(ExitCode::from(outcome_exit_code(outcome)))
}

fn outcome_exit_code(outcome: &PipelineOutcome) -> u8 {
    let code = if outcome.is_processed() { 0 } else { EXIT_UNPROCESSED };
    tracing::debug!(status = outcome.status_code(), exit_code = code, "Run finished");
    code
}

/// Bad input and configuration (including a missing API key) exit with 2;
/// everything else with 1.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(pipeline) = err.downcast_ref::<PipelineError>() {
        return if pipeline.is_client_error() {
            EXIT_CLIENT_ERROR
        } else {
            EXIT_SERVER_ERROR
        };
    }

    let is_input_error = err.downcast_ref::<ConfigError>().is_some()
        || matches!(
            err.downcast_ref::<ProviderError>(),
            Some(ProviderError::NotConfigured(_))
        )
        || err.downcast_ref::<serde_json::Error>().is_some()
        || err.downcast_ref::<std::io::Error>().is_some();

    if is_input_error {
        EXIT_CLIENT_ERROR
    } else {
        EXIT_SERVER_ERROR
    }
}
