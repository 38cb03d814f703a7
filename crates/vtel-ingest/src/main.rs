//! VTel - Main entry point

use std::process;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use vtel_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use vtel_ingest::commands::{self, print_json};
use vtel_ingest::query::{DetectionQuery, ReportQuery};
use vtel_ingest::{Cli, Commands, Config, Ingestor};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Console logs go to stderr so stdout carries only JSON
    let log_config = LogConfig::builder()
        .level(if cli.verbose { LogLevel::Debug } else { LogLevel::Warn })
        .output(LogOutput::Console)
        .log_file_prefix("vtel")
        .build();

    let log_config = match log_config.with_env_overrides() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Warning: logging disabled: {}", e);
            None
        }
    };

    if let Err(e) = execute_command(cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn execute_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    match cli.command {
        Commands::Migrate => print_json(&commands::migrate(&config).await?),

        Commands::Ingest { files, object_types } => {
            if let Some(types) = object_types {
                config.ingest.object_types = types;
            }
            config.validate()?;

            let pool = commands::connect(&config).await?;
            let ingestor = Ingestor::new(pool.clone()).with_object_types(config.ingest.object_types.clone());
            let statuses = commands::ingest::run(&ingestor, &files).await;
            pool.close().await;
            print_json(&statuses)
        }

        Commands::Watch {
            dir,
            interval_ms,
            timeout,
            delay_ms,
            archive_dir,
            extension,
            object_types,
        } => {
            let mut watch = config.watch.clone();
            if let Some(dir) = dir {
                watch.directory = dir;
            }
            if let Some(ms) = interval_ms {
                watch.interval = Duration::from_millis(ms);
            }
            if let Some(secs) = timeout {
                watch.timeout = Some(vtel_ingest::config::seconds("--timeout", secs)?);
            }
            if let Some(ms) = delay_ms {
                watch.delay = Some(Duration::from_millis(ms));
            }
            if let Some(archive_dir) = archive_dir {
                watch.archive_dir = Some(archive_dir);
            }
            if let Some(extension) = extension {
                watch.extension = extension.trim_start_matches('.').to_string();
            }
            config.watch = watch;
            if let Some(types) = object_types {
                config.ingest.object_types = types;
            }
            config.validate()?;

            let pool = commands::connect(&config).await?;
            let ingestor = Ingestor::new(pool.clone()).with_object_types(config.ingest.object_types.clone());
            let statuses = commands::watch::run(ingestor, config.watch.clone(), shutdown_signal()).await;
            pool.close().await;
            print_json(&statuses)
        }

        Commands::Reports {
            statuses,
            start,
            end,
            vehicle,
        } => {
            let pool = commands::connect(&config).await?;
            let filter = ReportQuery {
                statuses: Some(statuses),
                start,
                end,
                vehicle_id: vehicle,
            };
            print_json(&commands::query::reports(&pool, filter).await?)
        }

        Commands::Detections {
            types,
            values,
            min,
            max,
            start,
            end,
            vehicle,
        } => {
            let pool = commands::connect(&config).await?;
            let filter = DetectionQuery {
                types: Some(types),
                exact_values: Some(values),
                value_min: min,
                value_max: max,
                start,
                end,
                vehicle_id: vehicle,
            };
            print_json(&commands::query::detections(&pool, filter).await?)
        }

        Commands::Vehicle { id, delete } => {
            let pool = commands::connect(&config).await?;
            if delete {
                print_json(&commands::query::delete_vehicle(&pool, &id).await?)
            } else {
                print_json(&commands::query::vehicle(&pool, &id).await?)
            }
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
            info!("Received Ctrl+C, stopping watcher");
        },
        _ = terminate => {
            info!("Received terminate signal, stopping watcher");
        },
    }
}
