//! CLI binary for edgequake-pdf2img.
//!
//! A thin shim over the library crate: `serve` runs the upload form,
//! `generate` runs one request from the command line, `prompt` shows the
//! prompt a request would send.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use edgequake_pdf2img::server::{self, AppState};
use edgequake_pdf2img::{
    create_provider, preview_prompt, IllustrationRequest, Illustrator, IllustratorConfig,
    PromptPolicy, ProviderKind, ProviderSettings, UploadedPdf,
};
use std::io;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the upload form with Imagen on Vertex AI
  pdf2img serve --provider vertex --port 5000

  # Serve with Gemini and the structured prompt for every grade
  pdf2img serve --provider gemini

  # One-shot generation from the command line
  pdf2img generate chapter3.pdf --topic "Plants" --grade "Grade 2"

  # Show the prompt that would be sent (no credentials needed)
  pdf2img prompt chapter3.pdf --topic "Volcanoes" --grade 7

PROVIDERS:
  Provider  Model (default)                              Prompt policy
  ────────  ───────────────────────────────────────────  ─────────────
  vertex    imagen-3.0-generate-001                      keyword-safe
  gemini    gemini-2.0-flash-preview-image-generation    generic

ENVIRONMENT VARIABLES:
  GOOGLE_CLOUD_PROJECT_ID         Vertex AI project (required for vertex)
  GOOGLE_CLOUD_LOCATION           Vertex AI region (default us-central1)
  GOOGLE_APPLICATION_CREDENTIALS  Service account key file (optional)
  GEMINI_API_KEY                  Gemini API key (required for gemini)
  PDF2IMG_VERTEX_MODEL            Override the Imagen model
  PDF2IMG_GEMINI_MODEL            Override the Gemini model
  RUST_LOG                        Log filter (overrides --verbose/--quiet)

  Variables are also read from a .env file in the working directory.
"#;

/// Illustrate textbook chapters with generative image models.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2img",
    version,
    about = "Illustrate textbook chapters (PDF + topic + grade) with generative image models",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2IMG_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2IMG_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the upload form over HTTP.
    Serve(ServeArgs),
    /// Illustrate one PDF and print where the image was saved.
    Generate(GenerateArgs),
    /// Print the prompt that would be sent for a PDF.
    Prompt(PromptArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind.
    #[arg(long, env = "PDF2IMG_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "PDF2IMG_PORT", default_value_t = 5000)]
    port: u16,

    /// Maximum upload size in MiB.
    #[arg(long, env = "PDF2IMG_MAX_UPLOAD_MB", default_value_t = 20)]
    max_upload_mb: usize,

    #[command(flatten)]
    flow: FlowArgs,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Chapter PDF.
    pdf: PathBuf,

    #[command(flatten)]
    subject: SubjectArgs,

    /// Print the full result as JSON.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    flow: FlowArgs,
}

#[derive(Args, Debug)]
struct PromptArgs {
    /// Chapter PDF.
    pdf: PathBuf,

    #[command(flatten)]
    subject: SubjectArgs,

    /// Provider whose default prompt policy applies.
    #[arg(long, env = "PDF2IMG_PROVIDER", value_enum, default_value = "vertex")]
    provider: ProviderArg,

    /// Override the provider's default prompt policy.
    #[arg(long, env = "PDF2IMG_PROMPT_POLICY", value_enum)]
    prompt_policy: Option<PolicyArg>,
}

#[derive(Args, Debug)]
struct SubjectArgs {
    /// Chapter topic, e.g. "Photosynthesis".
    #[arg(long)]
    topic: String,

    /// Grade level: "N" or "Grade N".
    #[arg(long)]
    grade: String,
}

/// Options shared by every command that calls a provider.
#[derive(Args, Debug)]
struct FlowArgs {
    /// Image provider.
    #[arg(long, env = "PDF2IMG_PROVIDER", value_enum, default_value = "vertex")]
    provider: ProviderArg,

    /// Override the provider's default prompt policy.
    #[arg(long, env = "PDF2IMG_PROMPT_POLICY", value_enum)]
    prompt_policy: Option<PolicyArg>,

    /// Holding area for uploaded PDFs.
    #[arg(long, env = "PDF2IMG_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Directory generated PNGs are written to.
    #[arg(long, env = "PDF2IMG_OUTPUT_DIR", default_value = "static/output")]
    output_dir: PathBuf,

    /// Per-attempt provider timeout in seconds.
    #[arg(long, env = "PDF2IMG_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Extra attempts after a transient provider failure (0–3).
    #[arg(long, env = "PDF2IMG_MAX_RETRIES", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(0..=3))]
    max_retries: u32,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ProviderArg {
    Vertex,
    Gemini,
}

impl From<ProviderArg> for ProviderKind {
    fn from(v: ProviderArg) -> Self {
        match v {
            ProviderArg::Vertex => ProviderKind::Vertex,
            ProviderArg::Gemini => ProviderKind::Gemini,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    KeywordSafe,
    Generic,
}

impl From<PolicyArg> for PromptPolicy {
    fn from(v: PolicyArg) -> Self {
        match v {
            PolicyArg::KeywordSafe => PromptPolicy::KeywordSafe,
            PolicyArg::Generic => PromptPolicy::Generic,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal; the environment may be set directly.
    let _ = dotenv::dotenv();

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Generate(args) => run_generate(args, cli.quiet).await,
        Command::Prompt(args) => run_prompt(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = build_config(&args.flow, Some(args.max_upload_mb))?;
    config
        .ensure_directories()
        .await
        .context("Failed to create storage directories")?;

    // Provider configuration errors abort before the listener is bound.
    let illustrator = build_illustrator(&args.flow, config).await?;
    let state = AppState::new(illustrator).context("Failed to compile page templates")?;
    let router = server::router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    server::serve(listener, router, shutdown_signal())
        .await
        .context("Server error")
}

async fn run_generate(args: GenerateArgs, quiet: bool) -> Result<()> {
    let config = build_config(&args.flow, None)?;
    config
        .ensure_directories()
        .await
        .context("Failed to create storage directories")?;

    let bytes = tokio::fs::read(&args.pdf)
        .await
        .with_context(|| format!("Failed to read {}", args.pdf.display()))?;
    let file_name = args
        .pdf
        .file_name()
        .map(|n| n.to_string_lossy().into_owned());

    let illustrator = build_illustrator(&args.flow, config).await?;
    let request = IllustrationRequest {
        pdf: Some(UploadedPdf { file_name, bytes }),
        topic: args.subject.topic,
        grade: args.subject.grade,
    };

    let output = match illustrator.illustrate(request).await {
        Ok(output) => output,
        Err(e) => {
            if !quiet {
                eprintln!("{} {}", red("✘"), e.user_message());
            }
            return Err(e).context("Illustration failed");
        }
    };

    if args.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        println!("{}", output.image_path.display());
        if !quiet {
            eprintln!(
                "{}  {}  {}",
                green("✔"),
                bold(&output.image_url),
                dim(&format!(
                    "{} attempt(s), {}ms total",
                    output.stats.attempts, output.stats.total_ms
                )),
            );
        }
    }
    Ok(())
}

async fn run_prompt(args: PromptArgs) -> Result<()> {
    let kind = ProviderKind::from(args.provider);
    let policy = args
        .prompt_policy
        .map(PromptPolicy::from)
        .unwrap_or_else(|| kind.default_prompt_policy());
    let config = IllustratorConfig::builder()
        .prompt_policy(policy)
        .build()
        .context("Invalid configuration")?;

    let prompt = preview_prompt(&args.pdf, &args.subject.topic, &args.subject.grade, &config)
        .await
        .context("Could not build prompt")?;
    println!("{prompt}");
    Ok(())
}

/// Map CLI args to `IllustratorConfig`.
fn build_config(flow: &FlowArgs, max_upload_mb: Option<usize>) -> Result<IllustratorConfig> {
    let kind = ProviderKind::from(flow.provider);
    let policy = flow
        .prompt_policy
        .map(PromptPolicy::from)
        .unwrap_or_else(|| kind.default_prompt_policy());

    let mut builder = IllustratorConfig::builder()
        .upload_dir(&flow.upload_dir)
        .output_dir(&flow.output_dir)
        .prompt_policy(policy)
        .api_timeout_secs(flow.api_timeout)
        .max_retries(flow.max_retries);

    if let Some(mb) = max_upload_mb {
        builder = builder.max_upload_bytes(mb.saturating_mul(1024 * 1024));
    }

    builder.build().context("Invalid configuration")
}

/// Read provider settings from the environment and build the illustrator.
async fn build_illustrator(flow: &FlowArgs, config: IllustratorConfig) -> Result<Illustrator> {
    let kind = ProviderKind::from(flow.provider);
    let settings = ProviderSettings::from_env(kind)?;
    let provider = create_provider(&settings).await?;
    info!(
        "Provider {} ready, prompt policy {:?}",
        provider.name(),
        config.prompt_policy
    );
    Ok(Illustrator::new(provider, config))
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C).
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
