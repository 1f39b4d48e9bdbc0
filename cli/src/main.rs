//! Relay CLI: run a built-in two-phase tool against one adapter.
//!
//! ```text
//! relay list
//! relay run guess_card --params '{"choices": ["Ace", "King"]}'
//! relay run guess_card --adapter scripted --script answers.json
//! ```
//!
//! The result is printed to stdout as JSON. Logs and prompts go to stderr.

mod surface;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use relay_adapters::{InteractiveAdapter, ScriptedAdapter};
use relay_config::{AdapterKind, RelayConfig};
use relay_executor::{ToolRegistry, ToolRunner};
use relay_runtime::Backchannel;
use relay_types::{Limits, Outcome};

use crate::surface::StdinSurface;

const EXIT_CANCELLED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "relay", version, about = "Run two-phase tools")]
struct Cli {
    /// Config file, overriding RELAY_CONFIG and ~/.relay/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List registered tools.
    List {
        /// Print full descriptors as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run one tool to completion.
    Run(RunArgs),
}

#[derive(Debug, clap::Args)]
struct RunArgs {
    tool: String,

    /// Tool parameters as a JSON object.
    #[arg(long, default_value = "{}")]
    params: String,

    #[arg(long, value_enum)]
    adapter: Option<AdapterArg>,

    /// Scripted responses (JSON array), for `--adapter scripted`.
    #[arg(long)]
    script: Option<PathBuf>,

    #[arg(long)]
    max_depth: Option<u32>,

    #[arg(long)]
    max_tokens: Option<u64>,

    /// Whole-call timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AdapterArg {
    Interactive,
    Scripted,
    Automated,
}

impl From<AdapterArg> for AdapterKind {
    fn from(arg: AdapterArg) -> Self {
        match arg {
            AdapterArg::Interactive => AdapterKind::Interactive,
            AdapterArg::Scripted => AdapterKind::Scripted,
            AdapterArg::Automated => AdapterKind::Automated,
        }
    }
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

fn env_filter(config_filter: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the subscriber before anything can log; the config's filter is applied
/// later through the returned handle.
fn init_tracing() -> FilterHandle {
    let (filter, handle) = reload::Layer::new(env_filter(None));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
    handle
}

fn apply_config_filter(handle: &FilterHandle, config: &RelayConfig) {
    let Some(filter) = config.log_filter() else {
        return;
    };
    if let Err(err) = handle.reload(env_filter(Some(filter))) {
        tracing::warn!("Failed to apply logging filter {filter:?}: {err}");
    }
}

/// An explicit `--config` must exist; the default location may be absent.
fn load_config(path: Option<&PathBuf>) -> Result<RelayConfig> {
    match path {
        Some(path) => Ok(RelayConfig::load_required(path)?),
        None => Ok(RelayConfig::load()?.unwrap_or_default()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = init_tracing();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    apply_config_filter(&filter, &config);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(dispatch(cli.command, &config));
    // A blocked stdin read must not hold the process open after cancellation.
    runtime.shutdown_background();

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Command, config: &RelayConfig) -> Result<ExitCode> {
    let mut registry = ToolRegistry::default();
    relay_tools::register_builtins(&mut registry)?;

    match command {
        Command::List { json } => {
            list(&registry, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(args) => run(registry, args, config).await,
    }
}

fn list(registry: &ToolRegistry, json: bool) -> Result<()> {
    let descriptors = registry.definitions();
    if json {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
        return Ok(());
    }
    for descriptor in descriptors {
        println!("{:<12} {}", descriptor.name, descriptor.description);
    }
    Ok(())
}

async fn run(registry: ToolRegistry, args: RunArgs, config: &RelayConfig) -> Result<ExitCode> {
    let params: serde_json::Value =
        serde_json::from_str(&args.params).context("--params is not valid JSON")?;

    let kind = args
        .adapter
        .map(AdapterKind::from)
        .or(config.adapter_kind())
        .unwrap_or(AdapterKind::Interactive);
    let backchannel = build_adapter(kind, args.script.clone(), config)?;

    let flags = Limits {
        max_depth: args.max_depth,
        max_tokens: args.max_tokens,
        timeout: args.timeout.map(Duration::from_secs),
    };
    let runner = ToolRunner::new(registry, backchannel).with_defaults(flags.or(config.limits()));

    let signal = CancellationToken::new();
    let on_interrupt = signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    match runner.run(&args.tool, params, &signal).await? {
        Outcome::Completed(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(ExitCode::SUCCESS)
        }
        Outcome::Cancelled => {
            eprintln!("Cancelled");
            Ok(ExitCode::from(EXIT_CANCELLED))
        }
    }
}

fn build_adapter(
    kind: AdapterKind,
    script: Option<PathBuf>,
    config: &RelayConfig,
) -> Result<Arc<dyn Backchannel>> {
    match kind {
        AdapterKind::Interactive => Ok(Arc::new(InteractiveAdapter::new(Arc::new(StdinSurface)))),
        AdapterKind::Scripted => {
            let Some(path) = script.or_else(|| config.script_path()) else {
                bail!("the scripted adapter needs --script or adapter.script in config");
            };
            let adapter = ScriptedAdapter::load(&path)
                .with_context(|| format!("failed to load script {}", path.display()))?;
            Ok(Arc::new(adapter))
        }
        AdapterKind::Automated => {
            bail!(
                "the automated adapter needs a completion provider, and none is built into this binary"
            )
        }
    }
}
