//! Consumption Prediction Control CLI
//!
//! Thin wrapper around consumption-core for operators on the plugin host.
//!
//! ## Usage
//!
//! ```bash
//! # Database and service reachability
//! consumption-ctl status
//!
//! # List the viewable logs
//! consumption-ctl logs list
//!
//! # Newest 50 lines of the training log
//! consumption-ctl logs show train_model --limit 50
//!
//! # Show and change the plugin configuration
//! consumption-ctl config show
//! consumption-ctl config set mqtt_broker=192.168.1.5 mqtt_port=1884
//!
//! # Start model training
//! consumption-ctl job run train
//!
//! # Show or replace the compose manifest
//! consumption-ctl manifest show
//! consumption-ctl manifest replace ./docker-compose.yml
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use consumption_core::{Applied, ControlApi, ControlSettings, SettingValue};

/// Consumption Prediction Control
#[derive(Parser)]
#[command(name = "consumption-ctl")]
#[command(version = "0.1.0")]
#[command(about = "Control the consumption prediction plugin")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Control settings file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Plugin data directory (default: /opt/loxberry/data/plugins/consumption_prediction)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show database and service reachability
    Status,

    /// Log inspection
    Logs {
        #[command(subcommand)]
        action: LogsAction,
    },

    /// Plugin configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Batch jobs
    Job {
        #[command(subcommand)]
        action: JobAction,
    },

    /// Service-composition manifest
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },
}

#[derive(Subcommand)]
enum LogsAction {
    /// List viewable logs
    List,

    /// Show a log, newest line first
    Show {
        /// Log identifier or file name (default: mqtt_daemon)
        log: Option<String>,

        /// Maximum number of lines (at most 500)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Set one or more keys and restart the dependent service
    Set {
        /// Assignments in key=value form
        #[arg(required = true, value_parser = parse_assignment)]
        assignments: Vec<(String, String)>,
    },
}

#[derive(Subcommand)]
enum JobAction {
    /// Start a job and return immediately
    Run {
        /// Job name (train, predict, evaluate)
        name: String,
    },

    /// List job names
    List,
}

#[derive(Subcommand)]
enum ManifestAction {
    /// Print the manifest
    Show,

    /// Replace the manifest with the contents of a file and restart the dependent service
    Replace {
        /// File holding the new manifest
        file: PathBuf,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Parse a `key=value` assignment
fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

/// Report the restart raised by a change; never fatal.
fn report_restart<T>(applied: &Applied<T>, service: &str) {
    match &applied.restart_error {
        None => println!("Restarted service: {}", service),
        Some(e) => eprintln!("Warning: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let mut settings =
        ControlSettings::load(cli.config.as_deref()).context("Failed to load control settings")?;
    if let Some(dir) = cli.data_dir {
        settings = settings.with_data_dir(dir);
    }
    let api = ControlApi::from_settings(&settings);

    match cli.command {
        Commands::Status => {
            let report = api.status().await;
            println!(
                "Database: {}",
                if report.database { "found" } else { "not found" }
            );
            for service in &report.services {
                println!("{}", service);
            }
        }

        Commands::Logs { action } => match action {
            LogsAction::List => {
                for source in api.log_catalog() {
                    println!("{:<18} {:<20} {}", source.id, source.file, source.label);
                }
            }
            LogsAction::Show { log, limit } => {
                let view = match limit {
                    Some(limit) => api.log_tail(log.as_deref(), limit).await?,
                    None => api.log_view(log.as_deref()).await?,
                };
                if view.is_empty() {
                    println!("(empty)");
                }
                for entry in &view.entries {
                    println!("{:>7} {}", entry.severity, entry.text);
                }
                if view.is_truncated() {
                    eprintln!(
                        "Showing {} of {} lines of {}",
                        view.len(),
                        view.total_lines,
                        view.log
                    );
                }
            }
        },

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let config = api.config().await?;
                for (key, value) in config.iter() {
                    println!("{} = {}", key, value);
                }
            }
            ConfigAction::Set { assignments } => {
                let updates = assignments
                    .into_iter()
                    .map(|(key, value)| (key, SettingValue::from(value)))
                    .collect();
                let applied = api.save_config(updates).await?;

                println!("Settings saved successfully.");
                for key in &applied.value.ignored {
                    eprintln!("Ignored unknown key: {}", key);
                }
                report_restart(&applied, api.dependent_service());
            }
        },

        Commands::Job { action } => match action {
            JobAction::Run { name } => {
                let ack = api.trigger_job(&name)?;
                println!("{}", ack.message);
                if let Some(pid) = ack.pid {
                    println!("  PID: {}", pid);
                }
            }
            JobAction::List => {
                for name in api.jobs().table().names() {
                    println!("{}", name);
                }
            }
        },

        Commands::Manifest { action } => match action {
            ManifestAction::Show => {
                print!("{}", api.manifest().await?);
            }
            ManifestAction::Replace { file } => {
                let contents = std::fs::read_to_string(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let applied = api.replace_manifest(contents).await?;

                println!("Manifest saved successfully.");
                report_restart(&applied, api.dependent_service());
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("mqtt_port=1884").unwrap(),
            ("mqtt_port".to_string(), "1884".to_string())
        );
        assert_eq!(
            parse_assignment("mqtt_password=a=b").unwrap(),
            ("mqtt_password".to_string(), "a=b".to_string())
        );
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=x").is_err());
    }
}
