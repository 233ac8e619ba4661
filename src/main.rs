use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::Serialize;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use release_finder::config::{self, FinderConfig, GITHUB_TOKEN_ENV};
use release_finder::package::types::PackageId;
use release_finder::release::error::ReleaseError;
use release_finder::release::resolver::ReleaseResolver;

/// Exit status for packages no source covers
const EXIT_UNSUPPORTED: u8 = 2;

#[derive(Parser)]
#[command(name = "release-finder")]
#[command(version, about = "Discover the published releases of a package")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (defaults to $XDG_CONFIG_HOME/release-finder/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Command {
    /// Print one release per line with download URL, date and homepage
    Releases(PackageArgs),
    /// Print one version per line with its release date
    Versions(PackageArgs),
}

#[derive(Args)]
struct PackageArgs {
    /// Package type, e.g. pypi, npm, github, generic
    #[arg(long = "type")]
    package_type: String,
    #[arg(long)]
    namespace: Option<String>,
    #[arg(long)]
    name: String,
    /// Only look for this version
    #[arg(long)]
    version: Option<String>,
}

impl PackageArgs {
    fn into_package(self) -> PackageId {
        PackageId {
            package_type: self.package_type,
            namespace: self.namespace,
            name: self.name,
            version: self.version,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref(), cli.log_format)?;
    let config = load_config(cli.config.as_deref())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli.command, config))
}

/// Install the global subscriber; the returned guard flushes the log file on drop
fn init_tracing(log_file: Option<&Path>, format: LogFormat) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("release_finder=info"));

    let (writer, guard) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };
    let ansi = log_file.is_none();

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_ansi(ansi).with_writer(writer))
            .init(),
    }

    Ok(guard)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<FinderConfig> {
    let config = match path {
        Some(path) => FinderConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => {
            let default_path = config::config_path();
            if default_path.exists() {
                FinderConfig::load(&default_path)?
            } else {
                FinderConfig::default()
            }
        }
    };

    Ok(config.with_env_token(std::env::var(GITHUB_TOKEN_ENV).ok()))
}

async fn run(command: Command, config: FinderConfig) -> anyhow::Result<ExitCode> {
    let resolver =
        ReleaseResolver::from_config(&config).context("failed to set up release sources")?;
    let timeout = Duration::from_millis(config.fetch_timeout_ms);

    let (package, printed) = match command {
        Command::Releases(args) => {
            let package = args.into_package();
            let printed = match resolver.releases(&package) {
                Some(stream) => Some(print_lines(stream, timeout).await),
                None => None,
            };
            (package, printed)
        }
        Command::Versions(args) => {
            let package = args.into_package();
            let printed = match resolver.versions(&package) {
                Some(stream) => Some(print_lines(stream, timeout).await),
                None => None,
            };
            (package, printed)
        }
    };

    match printed {
        Some(count) => {
            info!("Found {} results for {}", count?, package);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!("Unsupported package: {}", package);
            Ok(ExitCode::from(EXIT_UNSUPPORTED))
        }
    }
}

/// Print each item as one JSON line, failing when any single pull exceeds `timeout`
async fn print_lines<T: Serialize>(
    mut stream: BoxStream<'static, Result<T, ReleaseError>>,
    timeout: Duration,
) -> anyhow::Result<usize> {
    let mut count = 0;
    while let Some(item) = tokio::time::timeout(timeout, stream.next())
        .await
        .with_context(|| format!("upstream did not answer within {} ms", timeout.as_millis()))?
    {
        println!("{}", serde_json::to_string(&item?)?);
        count += 1;
    }

    Ok(count)
}
