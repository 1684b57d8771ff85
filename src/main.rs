use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use legocharm_provider::config::{process_env, ProviderConfig};
use legocharm_provider::framework::{Diagnostics, ProviderHost};
use legocharm_provider::provider::{LegoCharmProvider, VERSION};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Reconcile LegoCharm users and domain access grants
#[derive(Parser, Debug)]
#[command(name = "legocharm-provider", version = VERSION, about, long_about = None)]
struct Args {
    /// Provider configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List resource types and their schemas
    Resources,
    /// Show what apply would do
    Plan {
        #[command(flatten)]
        target: Target,
    },
    /// Plan and carry out the change
    Apply {
        #[command(flatten)]
        target: Target,
        /// Write the new state here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Refresh a state file from LegoCharm
    Read {
        #[arg(short, long)]
        resource: String,
        #[arg(short, long)]
        state: PathBuf,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Bring an existing remote object under management
    Import {
        #[arg(short, long)]
        resource: String,
        /// Composite import key, e.g. `username:password`
        #[arg(long)]
        id: String,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Delete the remote object recorded in a state file
    Delete {
        #[arg(short, long)]
        resource: String,
        #[arg(short, long)]
        state: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct Target {
    /// Resource type, e.g. `legocharm_user`
    #[arg(short, long)]
    resource: String,

    /// Prior state (JSON); omit for a resource that does not exist yet
    #[arg(short, long)]
    state: Option<PathBuf>,

    /// Desired configuration (YAML or JSON); omit to destroy
    #[arg(short, long)]
    desired: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    // RUST_LOG narrows individual targets; --log-level caps everything
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("legocharm-provider {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("legocharm").join("provider.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".legocharm").join("provider.log");
    }
    PathBuf::from("legocharm-provider.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let mut host = ProviderHost::new(LegoCharmProvider::default());

    if let Command::Resources = args.command {
        let schemas: serde_json::Map<String, Value> = host
            .resource_types()
            .into_iter()
            .filter_map(|name| {
                let schema = host.schema(name)?;
                Some((name.to_string(), serde_json::to_value(schema).ok()?))
            })
            .collect();
        return emit(&schemas, None);
    }

    let block = ProviderConfig::load_block(args.config.as_deref())?;
    let diags = host.configure(&block, &process_env);
    report(&diags)?;

    match args.command {
        Command::Resources => Ok(()),
        Command::Plan { target } => {
            let prior = read_state(target.state.as_deref())?;
            let desired = read_desired(target.desired.as_deref())?;
            match host.plan(&target.resource, prior.as_ref(), desired.as_ref()) {
                Ok(plan) => emit(&plan, None),
                Err(diags) => report(&diags),
            }
        }
        Command::Apply { target, out } => {
            let prior = read_state(target.state.as_deref())?;
            let desired = read_desired(target.desired.as_deref())?;
            let plan = match host.plan(&target.resource, prior.as_ref(), desired.as_ref()) {
                Ok(plan) => plan,
                Err(diags) => {
                    report(&diags)?;
                    bail!("Planning {} failed", target.resource);
                }
            };
            let response = host.apply(&target.resource, prior, &plan).await;
            finish(response.state, &response.diagnostics, out.as_deref())
        }
        Command::Read {
            resource,
            state,
            out,
        } => {
            let Some(prior) = read_state(Some(&state))? else {
                bail!("State file {} is empty", state.display());
            };
            let response = host.read(&resource, prior).await;
            finish(response.state, &response.diagnostics, out.as_deref())
        }
        Command::Import { resource, id, out } => {
            let response = host.import(&resource, &id).await;
            finish(response.state, &response.diagnostics, out.as_deref())
        }
        Command::Delete { resource, state } => {
            let Some(prior) = read_state(Some(&state))? else {
                bail!("State file {} is empty", state.display());
            };
            let diags = host.delete(&resource, prior).await;
            report(&diags)
        }
    }
}

/// Print diagnostics to stderr; error diagnostics fail the command
fn report(diags: &Diagnostics) -> Result<()> {
    for diagnostic in diags.iter() {
        eprintln!("{}", diagnostic);
    }
    if diags.has_error() {
        bail!("{} error(s) reported", diags.errors().len());
    }
    Ok(())
}

fn finish(state: Option<Value>, diags: &Diagnostics, out: Option<&Path>) -> Result<()> {
    // Write whatever state came back before failing so partial progress is kept
    emit(&state.unwrap_or(Value::Null), out)?;
    report(diags)
}

fn emit<T: Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode output")?;
    match out {
        Some(path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{}", json);
            Ok(())
        }
    }
}

fn read_state(path: Option<&Path>) -> Result<Option<Value>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse state file {}", path.display()))?;
    Ok(Some(value).filter(|v| !v.is_null()))
}

fn read_desired(path: Option<&Path>) -> Result<Option<Value>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse configuration {}", path.display()))?;
    Ok(Some(value).filter(|v| !v.is_null()))
}
