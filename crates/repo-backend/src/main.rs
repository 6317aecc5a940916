use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use repo_backend::config::{self, ConfigDoc};
use repo_backend::env::{self, EnvMap};
use repo_backend::secrets::EnvSecretStore;
use repo_backend::{BackendSpec, GlobalConfig, PRECEDENCE, Result};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Log output format (filter with RUST_LOG)
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the restic repository string of the active backend
    Repo {
        /// Backend document (TOML, or JSON by extension)
        config: PathBuf,
    },
    /// Print the credential environment of the active backend
    Env {
        config: PathBuf,
        #[arg(long)]
        json: bool,
        /// Replace secret references with values from the process environment
        #[arg(long)]
        resolve_secrets: bool,
    },
    /// Print the environment of an S3 restore job
    RestoreEnv {
        config: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Print the full environment of a backup job
    JobEnv {
        config: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Report whether two documents point at the same repository; both must
    /// carry the same [globals]
    Compare { a: PathBuf, b: PathBuf },
    /// Fail unless exactly one backend is configured
    Check { config: PathBuf },
    /// List backend kinds in precedence order with their credential env keys
    Kinds,
    /// Print the document after merging its extends chain
    Resolve { config: PathBuf },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.log_format);

    match args.cmd {
        Command::Repo { config } => cmd_repo(&config),
        Command::Env {
            config,
            json,
            resolve_secrets,
        } => cmd_env(&config, json, resolve_secrets),
        Command::RestoreEnv { config, json } => cmd_restore_env(&config, json),
        Command::JobEnv { config, json } => cmd_job_env(&config, json),
        Command::Compare { a, b } => cmd_compare(&a, &b),
        Command::Check { config } => cmd_check(&config),
        Command::Kinds => {
            cmd_kinds();
            Ok(())
        }
        Command::Resolve { config } => cmd_resolve(&config),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

// Globals from the document, overridden by BACKUP_GLOBAL* env vars.
fn load(path: &Path) -> Result<(ConfigDoc, BackendSpec, GlobalConfig)> {
    let doc = config::load(path)?;
    let spec = doc.backend()?;
    let globals = doc.globals()?.overlay_env(|k| std::env::var(k).ok());
    Ok((doc, spec, globals))
}

fn print_env(vars: &EnvMap, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(vars)?);
    } else {
        for (k, v) in vars {
            println!("{k}={v}");
        }
    }
    Ok(())
}

fn cmd_repo(path: &Path) -> Result<()> {
    let (_, spec, globals) = load(path)?;
    println!("{}", spec.repository(&globals));
    Ok(())
}

fn cmd_env(path: &Path, json: bool, resolve_secrets: bool) -> Result<()> {
    let (_, spec, _) = load(path)?;
    let vars = if resolve_secrets {
        spec.resolve_credential_env(&EnvSecretStore)?
    } else {
        spec.credential_env()
    };
    match vars {
        Some(vars) => print_env(&vars, json),
        None => {
            tracing::warn!(config = %path.display(), "no storage backend configured");
            print_env(&EnvMap::new(), json)
        }
    }
}

fn cmd_restore_env(path: &Path, json: bool) -> Result<()> {
    let (_, spec, globals) = load(path)?;
    let vars = spec.restore_env_vars(&globals);
    if json {
        println!("{}", serde_json::to_string_pretty(&env::to_env_list(&vars))?);
    } else {
        for var in vars.values() {
            println!("{}={}", var.name, var.value);
        }
    }
    Ok(())
}

fn cmd_job_env(path: &Path, json: bool) -> Result<()> {
    let (_, spec, globals) = load(path)?;
    print_env(&spec.job_env(&globals), json)
}

fn cmd_compare(a: &Path, b: &Path) -> Result<()> {
    let (doc_a, spec_a, _) = load(a)?;
    let (doc_b, spec_b, _) = load(b)?;
    let globals = config::shared_globals(&doc_a, &doc_b)?.overlay_env(|k| std::env::var(k).ok());
    let equal = spec_a.is_backend_equal_to(Some(&spec_b), &globals);
    println!("{}", if equal { "equal" } else { "different" });
    Ok(())
}

fn cmd_check(path: &Path) -> Result<()> {
    let (_, spec, globals) = load(path)?;
    let kind = spec.validate()?;
    println!("ok: {} -> {}", kind, spec.repository(&globals));
    Ok(())
}

fn cmd_kinds() {
    for (i, kind) in PRECEDENCE.iter().enumerate() {
        println!(
            "{:>2}. {:<6} {}",
            i + 1,
            kind.as_str(),
            kind.env_keys().join(", ")
        );
    }
}

fn cmd_resolve(path: &Path) -> Result<()> {
    let (doc, _, _) = load(path)?;
    // Best-effort pretty print of the merged document.
    let s = toml::to_string_pretty(&doc.value).unwrap_or_else(|_| format!("{:?}", doc.value));
    print!("{s}");
    Ok(())
}
