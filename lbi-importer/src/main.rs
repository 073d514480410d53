//! lbi-importer - Deezer listening history to ListenBrainz
//!
//! Submits the rows of a Deezer listening history CSV export to ListenBrainz in
//! batches, recording per-file progress in the config file so an interrupted
//! import resumes where it stopped.
//!
//! Before the first run, create the config file (default `deezer_importer.toml`)
//! with your ListenBrainz token:
//!
//! ```toml
//! [brainz]
//! auth_token = "your-token"
//! ```
//!
//! Exit codes: 0 success, 2 usage / credential / connectivity / interrupt,
//! 1 any other failure.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use lbi_common::config::{resolve_config_path, CONFIG_ENV_VAR};
use lbi_common::{logging, TomlProgressStore};
use lbi_importer::error::EXIT_RETRY;
use lbi_importer::{
    file_key_for, CsvListenSource, ImportEngine, ImportError, ListenBrainzClient, SubmitError,
};
use tokio::signal;
use tracing::{error, info, warn, Dispatch};

/// Command-line arguments for lbi-importer
#[derive(Parser, Debug)]
#[command(name = "lbi-importer")]
#[command(about = "Submit a Deezer listening history export to ListenBrainz")]
#[command(version)]
struct Args {
    /// Deezer listening history export (CSV)
    csv_file: PathBuf,

    /// Config file holding the auth token and import progress
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides it
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Usage errors exit with code 2 from here
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    // Logging is configured from this file, so report its absence directly
    if !config_path.exists() {
        eprintln!(
            "Config file '{}' not found, starting with an empty configuration",
            config_path.display()
        );
    }
    let store = match TomlProgressStore::open(&config_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!(
                "\nCan't read configuration '{}': {}",
                config_path.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    };

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| store.config().logging.level.clone());
    let dispatch = logging::init(&level);

    info!(
        "Starting lbi-importer v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    tokio::select! {
        code = run(&args.csv_file, store, dispatch) => code,
        _ = shutdown_signal() => {
            eprintln!("\nCtrl+c received, shutting down...");
            ExitCode::from(EXIT_RETRY)
        }
    }
}

async fn run(csv_file: &Path, store: TomlProgressStore, dispatch: Dispatch) -> ExitCode {
    let config_path = store.path().display().to_string();

    let token = match store.config().auth_token() {
        Ok(token) => token.to_string(),
        Err(e) => {
            error!("{}", e);
            eprintln!(
                "\nCan't read ListenBrainz auth_token. Please, check your '{}' configuration file.",
                config_path
            );
            return ExitCode::from(EXIT_RETRY);
        }
    };

    #[cfg(unix)]
    if let Ok(true) = lbi_common::config::check_toml_permissions_loose(store.path()) {
        warn!(
            "{} is readable by other users; it contains your auth token (chmod 600 recommended)",
            config_path
        );
    }

    let client = match ListenBrainzClient::connect(store.config().api_url(), &token).await {
        Ok(client) => client,
        Err(SubmitError::InvalidToken) => {
            eprintln!(
                "\nInvalid ListenBrainz auth_token error. Please, check your '{}' configuration file.",
                config_path
            );
            return ExitCode::from(EXIT_RETRY);
        }
        Err(e) if e.is_transient() => {
            error!("Could not reach ListenBrainz: {}", e);
            eprintln!("\nConnection error validating auth_token. Nothing was submitted.");
            return ExitCode::from(EXIT_RETRY);
        }
        Err(e) => {
            eprintln!("\nListenBrainz token validation failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match import(csv_file, &client, store, dispatch).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("\n{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn import(
    csv_file: &Path,
    client: &ListenBrainzClient,
    mut store: TomlProgressStore,
    dispatch: Dispatch,
) -> Result<ExitCode> {
    let file_key = file_key_for(csv_file)
        .with_context(|| format!("'{}' does not name a file", csv_file.display()))?;
    let mut source = CsvListenSource::open(csv_file)
        .with_context(|| format!("Failed to open {}", csv_file.display()))?;

    let max_batch_size = store.config().max_batch_size();
    let mut engine =
        ImportEngine::new(client, &mut store, max_batch_size).with_dispatch(dispatch);

    match engine.import_file(&file_key, &mut source).await {
        Ok(summary) => {
            println!(
                "Submitted {} listen(s) from {} ({} processed in total)",
                summary.submitted, file_key, summary.total_processed
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ ImportError::Interrupted { .. }) => {
            error!("{}", e);
            eprintln!("\nConnection error or reset submitting listens. Saving processed entries");
            Ok(ExitCode::from(e.exit_code()))
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("\nImport of {} failed: {}", file_key, e);
            Ok(ExitCode::from(e.exit_code()))
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
