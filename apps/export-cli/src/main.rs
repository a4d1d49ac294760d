//! Review export CLI
//!
//! Reads an export request (the camelCase JSON the review UI sends) and writes
//! the corrected document into an output directory.

mod host;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use host::{FsDownloader, StderrNotifier};
use review_export::{ExportConfig, ExportFormat, ExportOutcome, ExportRequest, Exporter, FileKind};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Environment variable naming a TOML config file.
const CONFIG_ENV: &str = "REVIEW_EXPORT_CONFIG";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Original,
    Html,
    Pdf,
    Docx,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Original => ExportFormat::Original,
            FormatArg::Html => ExportFormat::Html,
            FormatArg::Pdf => ExportFormat::Pdf,
            FormatArg::Docx => ExportFormat::Docx,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "export-cli")]
#[command(version, about = "Export a corrected document from a review export request")]
struct Args {
    /// Export request JSON file
    #[arg(short, long)]
    request: PathBuf,

    /// Directory the exported file is written to
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// TOML configuration (falls back to $REVIEW_EXPORT_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the format stored in the request
    #[arg(short, long, value_enum)]
    format: Option<FormatArg>,

    /// Write a plain-text dump of the edited content instead
    #[arg(long)]
    text: bool,
}

fn load_config(path: Option<PathBuf>) -> Result<ExportConfig> {
    let path = path.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    match path {
        Some(path) => ExportConfig::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(ExportConfig::default()),
    }
}

fn load_request(path: &Path) -> Result<ExportRequest> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file: {}", path.display()))?;
    ExportRequest::from_json(&json)
        .with_context(|| format!("Failed to parse request file: {}", path.display()))
}

fn main() -> Result<ExitCode> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("review_export=info".parse()?)
                .add_directive("export_cli=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(args.config)?;
    let mut request = load_request(&args.request)?;
    if let Some(format) = args.format {
        request.format = format.into();
    }

    if request.file_kind() == FileKind::Pdf && !request.original_base64.is_empty() {
        match review_export::dispatch::decode_original(&request.original_base64)
            .and_then(|bytes| review_export::get_page_count(&bytes))
        {
            Ok(pages) => tracing::debug!(pages, "original PDF loaded"),
            Err(e) => tracing::warn!(error = %e, "original PDF could not be inspected"),
        }
    }

    let downloader = FsDownloader::new(&args.out_dir);
    let exporter = Exporter::new(&downloader, StderrNotifier).with_config(config);

    let outcome = if args.text {
        exporter.export_text(&request)
    } else {
        exporter.export(&request)
    };

    match outcome {
        ExportOutcome::Delivered { route, file_name } => {
            println!("{}", downloader.target(&file_name).display());
            tracing::info!(route = route.as_str(), "export complete");
            Ok(ExitCode::SUCCESS)
        }
        ExportOutcome::Degraded { file_name } => {
            println!("{}", downloader.target(&file_name).display());
            tracing::warn!("export degraded to plain text");
            Ok(ExitCode::SUCCESS)
        }
        ExportOutcome::Rejected { .. } => Ok(ExitCode::from(2)),
        ExportOutcome::Failed { .. } => Ok(ExitCode::FAILURE),
    }
}
