//! CLI entry point for BlockPreview.
//!
//! This binary provides the `blockpreview` command with subcommands for
//! serving the preview API and for running the pipeline stages offline.

mod config;
mod input;

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use blockpreview_assets::AssetProxy;
use blockpreview_sandbox::PreviewPipeline;
use blockpreview_sanitize::{SanitizePolicy, sanitize_with_report};
use blockpreview_web::WebServer;

use crate::config::{DEFAULT_CONFIG_PATH, PreviewSettings};
use crate::input::RenderInput;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// BlockPreview: safe live previews of block-based projects.
#[derive(Parser)]
#[command(
    name = "blockpreview",
    version,
    about = "BlockPreview: safe live previews of block-based projects",
    long_about = "Renders block-based projects to sanitized markup and serves them \
                  into isolated preview frames."
)]
struct Cli {
    /// Settings file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the preview web server.
    Serve,

    /// Render a block file to safe markup.
    Render {
        /// JSON file: an array of blocks, or `{"blocks": [...], "projectId": ...}`.
        file: PathBuf,
        /// Print markup and line mapping as JSON.
        #[arg(long)]
        mapping: bool,
        /// Only render blocks of this project.
        #[arg(long)]
        project: Option<String>,
    },

    /// Sanitize a markup file.
    Sanitize {
        file: PathBuf,
        /// Use the strict policy instead of the configured one.
        #[arg(long)]
        strict: bool,
    },

    /// Resolve an asset key against the asset root.
    Asset {
        key: String,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let default_level = match cli.command {
        Commands::Serve => "info",
        _ => "warn",
    };
    init_tracing(default_level);

    let settings = PreviewSettings::load(&cli.config)?;

    match cli.command {
        Commands::Serve => cmd_serve(settings).await,
        Commands::Render {
            file,
            mapping,
            project,
        } => cmd_render(&settings, file, mapping, project),
        Commands::Sanitize { file, strict } => cmd_sanitize(&settings, file, strict),
        Commands::Asset { key } => cmd_asset(&settings, &key).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(settings: PreviewSettings) -> Result<()> {
    let server = WebServer::new(
        settings.web_config(),
        settings.sandbox_config(),
        settings.sanitize_policy(),
        settings.asset_config(),
    );

    if settings.sandbox.allow_scripts {
        warn!("preview frames may run scripts");
    }
    info!(
        addr = %server.addr(),
        asset_root = %settings.assets.root.display(),
        handshake_timeout_ms = settings.sandbox.handshake_timeout_ms,
        "configuration loaded"
    );

    server
        .start()
        .await
        .map_err(|e| anyhow!(e))
        .context("web server failed")
}

// ---------------------------------------------------------------------------
// Subcommand: render
// ---------------------------------------------------------------------------

fn cmd_render(
    settings: &PreviewSettings,
    file: PathBuf,
    mapping: bool,
    project: Option<String>,
) -> Result<()> {
    let input = RenderInput::read(&file)?.with_project(project);
    let pipeline = PreviewPipeline::new(settings.sanitize_policy());
    let preview = pipeline
        .render(input.project_id, input.blocks)
        .context("failed to render preview")?;

    let mut out = std::io::stdout().lock();
    if mapping {
        serde_json::to_writer_pretty(&mut out, &preview)?;
        writeln!(out)?;
    } else {
        writeln!(out, "{}", preview.markup)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: sanitize
// ---------------------------------------------------------------------------

fn cmd_sanitize(settings: &PreviewSettings, file: PathBuf, strict: bool) -> Result<()> {
    let markup = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let policy = if strict {
        SanitizePolicy::strict()
    } else {
        settings.sanitize_policy()
    };

    let (safe, report) = sanitize_with_report(&markup, &policy);
    if !report.is_clean() {
        info!(
            removed_elements = report.removed_elements,
            removed_attributes = report.removed_attributes,
            script_like = report.script_like,
            "markup changed"
        );
    }

    writeln!(std::io::stdout().lock(), "{safe}")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: asset
// ---------------------------------------------------------------------------

async fn cmd_asset(settings: &PreviewSettings, key: &str) -> Result<()> {
    let proxy = AssetProxy::new(settings.asset_config());
    let asset = proxy
        .stat(key)
        .await
        .with_context(|| format!("cannot serve {key:?} from {}", proxy.root().display()))?;

    writeln!(
        std::io::stdout().lock(),
        "{}\t{}\t{}",
        asset.content_type,
        asset.size,
        asset.key
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
