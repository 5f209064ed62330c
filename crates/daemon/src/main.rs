// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Farm daemon (dfd)
//!
//! Background process that owns the farm runtime. Signals map to engine
//! actions: TERM/INT shut down, USR1 suspends the check queue before the
//! host sleeps, USR2 resumes it on wake, HUP reloads the farm list.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod lifecycle;

use std::path::{Path, PathBuf};
use std::time::Duration;

use df_core::Event;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};

use crate::lifecycle::{Config, LifecycleError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::resolve(config_path)?;

    write_startup_marker(&config)?;

    let log_guard = setup_logging(&config.log_path)?;

    info!("Starting dfd with config {}", config.config_path.display());

    let daemon = match lifecycle::startup(&config).await {
        Ok(d) => d,
        Err(e) => {
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    let mut events = daemon.runtime.subscribe();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;
    let mut sigusr2 = signal(SignalKind::user_defined2())?;
    let mut sighup = signal(SignalKind::hangup())?;

    info!(farms = daemon.runtime.farms().len(), "Daemon ready");
    println!("READY");

    loop {
        tokio::select! {
            Some(event) = events.recv() => log_event(&event),

            _ = sigusr1.recv() => daemon.suspend(),

            _ = sigusr2.recv() => daemon.wake(),

            _ = sighup.recv() => {
                if let Err(e) = daemon.reload().await {
                    error!("Failed to reload configuration: {}", e);
                }
            }

            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                daemon.shutdown().await?;
                break;
            }

            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down...");
                daemon.shutdown().await?;
                break;
            }
        }
    }

    info!("Daemon stopped");
    Ok(())
}

/// Log a status-change notification
fn log_event(event: &Event) {
    match event {
        Event::FarmStatusChanged {
            id,
            status,
            schedule_minutes,
            session_count,
        } => info!(farm = %id, %status, schedule_minutes, session_count, "farm status changed"),
        Event::ConditionFulfilled {
            id,
            kind,
            accrued_ms,
        } => info!(
            farm = %id,
            %kind,
            accrued = %humantime::format_duration(Duration::from_secs(accrued_ms / 1000)),
            "condition fulfilled"
        ),
        Event::ConditionReset { id } => info!(farm = %id, "condition reset"),
        Event::CycleFailed { id, reason } => warn!(farm = %id, reason = reason.as_str(), "check failed"),
        other => debug!(event = other.name().as_str(), "queue event"),
    }
}

/// Startup marker prefix written to log before anything else.
/// Full format: "--- dfd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- dfd: starting (pid: ";

/// Append one line to the log file, bypassing tracing
fn append_log_line(log_path: &Path, line: &str) -> std::io::Result<()> {
    use std::io::Write;

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    writeln!(file, "{line}")
}

fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    let marker = format!("{STARTUP_MARKER_PREFIX}{}) ---", std::process::id());
    append_log_line(&config.log_path, &marker)?;
    Ok(())
}

/// Startup errors are written synchronously; the non-blocking writer may
/// not flush before the process exits
fn write_startup_error(config: &Config, error: &LifecycleError) {
    let _ = append_log_line(
        &config.log_path,
        &format!("ERROR Failed to start daemon: {error}"),
    );
}

/// Install the file logger. `DFD_LOG` takes precedence over `RUST_LOG`.
fn setup_logging(
    log_path: &Path,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let (Some(dir), Some(file_name)) = (log_path.parent(), log_path.file_name()) else {
        return Err(LifecycleError::NoStateDir);
    };
    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_env("DFD_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();

    Ok(guard)
}
