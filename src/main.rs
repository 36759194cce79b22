use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use googlebigquery::manifest::{self as runner, Manifest, StateFile};
use googlebigquery::resource::schema::process_env;
use googlebigquery::{Diagnostics, Provider, VERSION};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Manage Google BigQuery datasets and tables
#[derive(Parser, Debug)]
#[command(name = "terraform-provider-googlebigquery", version = VERSION, about, long_about = None)]
struct Args {
    /// Log level for debugging (off, error, warn, info, debug, trace)
    #[arg(long, env = "TF_LOG", default_value = "off", value_parser = parse_log_level)]
    log_level: LogLevel,

    /// Write logs here instead of the default log file
    #[arg(long, env = "TF_LOG_PATH")]
    log_file: Option<PathBuf>,

    /// Host version reported in the user agent
    #[arg(long, env = "TF_VERSION", default_value = VERSION)]
    terraform_version: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the provider and resource schemas as JSON
    Schema,
    /// Validate a manifest without calling any API
    Validate {
        manifest: PathBuf,
    },
    /// Create every resource in the manifest that is not tracked yet
    Apply {
        manifest: PathBuf,
        #[arg(long, default_value = "googlebigquery.tfstate.json")]
        state: PathBuf,
    },
    /// Re-read tracked resources and drop the ones that are gone
    Refresh {
        manifest: PathBuf,
        #[arg(long, default_value = "googlebigquery.tfstate.json")]
        state: PathBuf,
    },
    /// Delete tracked resources in reverse creation order
    Destroy {
        manifest: PathBuf,
        #[arg(long, default_value = "googlebigquery.tfstate.json")]
        state: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Accepts any `TF_LOG` value: known levels map directly, anything else
/// (such as `JSON`) turns logging on at info
fn parse_log_level(value: &str) -> std::result::Result<LogLevel, String> {
    let level = match value.trim().to_ascii_lowercase().as_str() {
        "" | "off" => LogLevel::Off,
        "error" => LogLevel::Error,
        "warn" => LogLevel::Warn,
        "info" => LogLevel::Info,
        "debug" => LogLevel::Debug,
        "trace" => LogLevel::Trace,
        _ => LogLevel::Info,
    };
    Ok(level)
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

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<PathBuf>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = log_file.unwrap_or_else(default_log_path);
    let (writer, guard) = tracing_appender::non_blocking(open_log_file(&log_path)?);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(writer.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        "terraform-provider-googlebigquery {} logging at {:?} to {}",
        VERSION,
        level,
        log_path.display()
    );

    Ok(Some(guard))
}

/// `<config dir>/terraform-provider-googlebigquery/provider.log`, falling
/// back to the home directory and then the working directory
fn default_log_path() -> PathBuf {
    const FILE: &str = "provider.log";
    dirs::config_dir()
        .map(|dir| dir.join("terraform-provider-googlebigquery").join(FILE))
        .or_else(|| dirs::home_dir().map(|home| home.join(".terraform-provider-googlebigquery").join(FILE)))
        .unwrap_or_else(|| PathBuf::from("terraform-provider-googlebigquery.log"))
}

/// Print warnings, and fail if there are errors
fn report(diags: Diagnostics) -> Result<()> {
    for warning in &diags.warnings {
        eprintln!("Warning: {}", warning);
    }
    for error in &diags.errors {
        eprintln!("Error: {}", error);
    }
    if diags.has_errors() {
        anyhow::bail!("{} validation error(s)", diags.errors.len());
    }
    Ok(())
}

fn load_validated(path: &Path, provider: &Provider) -> Result<Manifest> {
    let manifest = Manifest::load(path)?;
    report(manifest.validate(provider, &process_env))?;
    Ok(manifest)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.clone())?;

    let provider = Provider::new();

    match &args.command {
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&provider.schema())?);
        }
        Command::Validate { manifest } => {
            load_validated(manifest, &provider)?;
            println!("Success! The configuration is valid.");
        }
        Command::Apply { manifest, state } => {
            let manifest = load_validated(manifest, &provider)?;
            let configured = provider
                .configure(&manifest.provider, &args.terraform_version, &process_env)
                .await
                .context("Failed to configure provider")?;

            let mut tracked = StateFile::load(state)?;
            let result = runner::apply(&configured, &manifest, &mut tracked).await;
            tracked.save(state)?;
            result.context("Apply failed")?;

            println!("Apply complete! {} resource(s) tracked.", tracked.resources.len());
        }
        Command::Refresh { manifest, state } => {
            let manifest = load_validated(manifest, &provider)?;
            let configured = provider
                .configure(&manifest.provider, &args.terraform_version, &process_env)
                .await
                .context("Failed to configure provider")?;

            let mut tracked = StateFile::load(state)?;
            runner::refresh(&configured, &mut tracked)
                .await
                .context("Refresh failed")?;
            tracked.save(state)?;

            println!("Refresh complete! {} resource(s) tracked.", tracked.resources.len());
        }
        Command::Destroy { manifest, state } => {
            let manifest = load_validated(manifest, &provider)?;
            let configured = provider
                .configure(&manifest.provider, &args.terraform_version, &process_env)
                .await
                .context("Failed to configure provider")?;

            let mut tracked = StateFile::load(state)?;
            let result = runner::destroy(&configured, &mut tracked).await;
            tracked.save(state)?;
            result.context("Destroy failed")?;

            println!("Destroy complete!");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_log_levels_ignore_case() {
        assert_eq!(parse_log_level("DEBUG"), Ok(LogLevel::Debug));
        assert_eq!(parse_log_level("warn"), Ok(LogLevel::Warn));
        assert_eq!(parse_log_level("off"), Ok(LogLevel::Off));
    }

    #[test]
    fn test_terraform_json_log_value_enables_info() {
        assert_eq!(parse_log_level("JSON"), Ok(LogLevel::Info));

        let args = Args::try_parse_from([
            "terraform-provider-googlebigquery",
            "--log-level",
            "JSON",
            "schema",
        ])
        .unwrap();
        assert_eq!(args.log_level, LogLevel::Info);
    }

    #[test]
    fn test_log_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("provider.log");

        open_log_file(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_unusable_log_directory_is_reported() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().join("sub").join("provider.log");

        let err = open_log_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to create log directory"));
    }
}
