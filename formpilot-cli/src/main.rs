//! formpilot CLI
//!
//! Drives multi-step web forms with a human at the keyboard for logins,
//! two-factor prompts and anything automation cannot finish.
//!
//! Usage:
//!   formpilot create-app --app-name "My App" --bundle-id com.example.app \
//!       --sku com.example.app --platform IOS --language "English (U.S.)"
//!   formpilot run workflow.yaml --trace-dir ./traces

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

use formpilot::presets::{app_record_workflow, AccessLevel, AppPlatform, AppRecordParams};
use formpilot::workflow::{WorkflowConfig, WorkflowSettings};
use formpilot::{SurfaceConfig, TerminalCheckpoint, WorkflowEngine};

mod report;

#[derive(Parser)]
#[command(name = "formpilot")]
#[command(version)]
#[command(about = "Resilient browser form automation with a human in the loop")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new App Store Connect app record through the web UI
    CreateApp(CreateAppArgs),
    /// Run a workflow described in a YAML or JSON file
    Run(RunArgs),
}

/// Options shared by every command that opens a browser
#[derive(Args, Debug, Clone)]
struct SessionArgs {
    /// Run the browser headless (not recommended: checkpoints need a visible page)
    #[clap(long, env = "FORMPILOT_HEADLESS")]
    headless: bool,

    /// Directory for the session trace and failure screenshots
    #[clap(long, env = "FORMPILOT_TRACE_DIR")]
    trace_dir: Option<PathBuf>,

    /// Default action timeout in milliseconds [default: 15000, or the workflow's own]
    #[clap(long, env = "FORMPILOT_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Print the run report as JSON on stdout
    #[clap(long)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
#[clap(rename_all = "SCREAMING_SNAKE_CASE")]
enum PlatformArg {
    Ios,
    MacOs,
    TvOs,
    VisionOs,
}

impl From<PlatformArg> for AppPlatform {
    fn from(value: PlatformArg) -> Self {
        match value {
            PlatformArg::Ios => AppPlatform::Ios,
            PlatformArg::MacOs => AppPlatform::MacOs,
            PlatformArg::TvOs => AppPlatform::TvOs,
            PlatformArg::VisionOs => AppPlatform::VisionOs,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
#[clap(rename_all = "lower")]
enum AccessArg {
    #[default]
    Full,
    Limited,
}

impl From<AccessArg> for AccessLevel {
    fn from(value: AccessArg) -> Self {
        match value {
            AccessArg::Full => AccessLevel::Full,
            AccessArg::Limited => AccessLevel::Limited,
        }
    }
}

#[derive(Parser, Debug)]
struct CreateAppArgs {
    /// App name to create
    #[clap(long)]
    app_name: String,

    /// Bundle identifier (must exist in the developer portal)
    #[clap(long)]
    bundle_id: String,

    /// SKU (usually the same as the bundle ID)
    #[clap(long)]
    sku: String,

    #[clap(long, value_enum)]
    platform: PlatformArg,

    /// Primary language label, e.g. "English (U.S.)"
    #[clap(long)]
    language: String,

    /// User access for the new app
    #[clap(long, value_enum, default_value_t = AccessArg::Full)]
    access: AccessArg,

    /// Print the generated workflow as YAML and exit without opening a browser
    #[clap(long)]
    dry_run: bool,

    #[command(flatten)]
    session: SessionArgs,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Workflow file (.yaml, .yml or .json)
    workflow: PathBuf,

    /// Validate the workflow and print it back without running it
    #[clap(long)]
    dry_run: bool,

    #[command(flatten)]
    session: SessionArgs,
}

fn init_logging() {
    let log_level = std::env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with_writer(std::io::stderr)
        .init();
}

/// Apply command-line session options on top of the workflow's own settings.
fn apply_session_args(settings: &mut WorkflowSettings, args: &SessionArgs) {
    if let Some(timeout_ms) = args.timeout_ms {
        settings.action_timeout_ms = timeout_ms;
        // Locator attempts must stay strictly shorter than the action timeout.
        settings.attempt_timeout_ms = settings.attempt_timeout_ms.min(timeout_ms / 2).max(1);
    }
    if args.trace_dir.is_some() {
        settings.diagnostics_dir = args.trace_dir.clone();
    }
}

async fn execute(config: WorkflowConfig, session: &SessionArgs) -> Result<ExitCode> {
    config
        .validate()
        .with_context(|| format!("invalid workflow '{}'", config.name))?;

    let surface_config = SurfaceConfig {
        headless: session.headless,
        ..SurfaceConfig::default()
    };
    info!("Launching browser (headless={})", session.headless);
    let engine = WorkflowEngine::launch(config, surface_config, Box::new(TerminalCheckpoint))
        .await
        .context("failed to start the browser session")?;

    let run = engine.run().await;
    if session.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        report::display(&run);
    }
    Ok(ExitCode::from(run.exit_code()))
}

async fn create_app(args: CreateAppArgs) -> Result<ExitCode> {
    let params = AppRecordParams {
        app_name: args.app_name,
        bundle_id: args.bundle_id,
        sku: args.sku,
        platform: args.platform.into(),
        language: args.language,
        access: args.access.into(),
    };
    let mut settings = WorkflowSettings::default();
    apply_session_args(&mut settings, &args.session);
    let config = app_record_workflow(&params, settings);

    if args.dry_run {
        print!("{}", config.to_yaml()?);
        return Ok(ExitCode::SUCCESS);
    }
    execute(config, &args.session).await
}

async fn run_workflow(args: RunArgs) -> Result<ExitCode> {
    let mut config = WorkflowConfig::from_file(&args.workflow)
        .with_context(|| format!("failed to load workflow from {}", args.workflow.display()))?;
    debug!("Loaded workflow '{}' with {} steps", config.name, config.steps.len());
    apply_session_args(&mut config.settings, &args.session);

    if args.dry_run {
        config.validate()?;
        print!("{}", config.to_yaml()?);
        return Ok(ExitCode::SUCCESS);
    }
    execute(config, &args.session).await
}

#[tokio::main]
async fn main() -> ExitCode {
    // Missing .env is fine
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::CreateApp(args) => create_app(args).await,
        Commands::Run(args) => run_workflow(args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
