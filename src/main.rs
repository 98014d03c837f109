use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hypothesis_lab::commitment::{prediction_lock_stats, verify_prediction};
use hypothesis_lab::config::Config;
use hypothesis_lab::session::validate_session;
use hypothesis_lab::storage::{SqliteStorage, Storage};

#[derive(Parser)]
#[command(name = "hypothesis-lab", version, about = "Inspect and audit falsification sessions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List stored sessions
    List,
    /// Print a session as JSON
    Show {
        /// Session id
        id: String,
    },
    /// Verify a session's commit chain, invariants, and locked predictions
    Verify {
        /// Session id
        id: String,
    },
    /// Delete a session
    Delete {
        /// Session id
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    // Initialize storage
    let storage = match SqliteStorage::new(&config.database).await {
        Ok(s) => {
            info!(path = %config.database.path.display(), "Database initialized");
            s
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            return Err(e.into());
        }
    };

    match cli.command {
        Command::List => {
            let summaries = storage.list().await?;
            if summaries.is_empty() {
                println!("No sessions stored.");
            }
            for summary in summaries {
                println!(
                    "{}  phase={}  hypotheses={}  rev={}  updated={}",
                    summary.id,
                    summary.phase,
                    summary.hypothesis_count,
                    summary.revision,
                    summary.updated_at.to_rfc3339()
                );
            }
        }
        Command::Show { id } => {
            let Some(stored) = storage.load(&id).await? else {
                error!(session_id = %id, "Session not found");
                std::process::exit(1);
            };
            println!("{}", serde_json::to_string_pretty(&stored.session)?);
        }
        Command::Verify { id } => {
            let Some(stored) = storage.load(&id).await? else {
                error!(session_id = %id, "Session not found");
                std::process::exit(1);
            };
            let session = stored.session;

            match session.verify_commit_chain() {
                Ok(length) => println!("commit chain: ok ({} commits)", length),
                Err(e) => println!("commit chain: FAILED ({})", e),
            }

            let validation = validate_session(&session);
            for warning in &validation.warnings {
                println!("warning: {}", warning);
            }
            for err in &validation.errors {
                println!("error: {}", err);
            }
            if validation.is_clean() {
                println!("invariants: ok");
            }

            let mut tampered = 0usize;
            for prediction in &session.locked_predictions {
                let outcome = verify_prediction(prediction);
                if !outcome.valid {
                    tampered += 1;
                    println!(
                        "prediction {}: {}",
                        prediction.id,
                        outcome.reason.unwrap_or_else(|| "invalid".to_string())
                    );
                }
            }
            let stats = prediction_lock_stats(&session.locked_predictions);
            println!(
                "predictions: {} total, {} tampered, integrity score {}",
                stats.total, tampered, stats.integrity_score
            );

            if validation.is_fatal() || tampered > 0 {
                std::process::exit(1);
            }
        }
        Command::Delete { id } => {
            storage.delete(&id).await?;
            info!(session_id = %id, "Session deleted");
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        hypothesis_lab::config::LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        hypothesis_lab::config::LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
