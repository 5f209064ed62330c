// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, sleep/wake, reload, shutdown.

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use df_adapters::{
    JsonStatsStore, NoOpSessionHost, NoOpSiteAdapter, SiteCatalog, StoreError, TracedSessionHost,
    TracedSiteAdapter,
};
use df_core::{ConfigError, ConfigFile, EngineConfig, SystemClock};
use df_engine::{Runtime, RuntimeDeps, RuntimeError};
use fs2::FileExt;
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{info, warn};

/// Connectivity probes made after a wake before checks go ahead anyway
const WAKE_PROBE_ATTEMPTS: u32 = 5;
const WAKE_PROBE_RETRY: Duration = Duration::from_secs(10);

/// Daemon runtime with concrete adapter types (wrapped with tracing)
pub type DaemonRuntime = Runtime<TracedSessionHost<NoOpSessionHost>, JsonStatsStore, SystemClock>;

/// Daemon paths
#[derive(Debug, Clone)]
pub struct Config {
    /// TOML file listing the engine settings and farms
    pub config_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    /// Path to the per-farm stats file
    pub stats_path: PathBuf,
}

impl Config {
    /// Resolve paths, using the user config directory when no config file
    /// is given
    pub fn resolve(config_path: Option<PathBuf>) -> Result<Self, LifecycleError> {
        let config_path = match config_path {
            Some(path) => path,
            None => config_dir()?.join("dfd.toml"),
        };
        Ok(Self::with_state_dir(config_path, &state_dir()?))
    }

    pub fn with_state_dir(config_path: PathBuf, state_dir: &Path) -> Self {
        Self {
            config_path,
            lock_path: state_dir.join("dfd.pid"),
            log_path: state_dir.join("dfd.log"),
            stats_path: state_dir.join("stats.json"),
        }
    }
}

/// Daemon state during operation
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub runtime: DaemonRuntime,
    pub engine: EngineConfig,
    pub start_time: Instant,
}

impl DaemonState {
    /// Host is going to sleep: hold queued checks
    pub fn suspend(&self) {
        info!("suspending check queue");
        self.runtime.suspend();
    }

    /// Host woke up: resume the queue behind a connectivity check.
    ///
    /// The check is a high-priority job that retries until the probe
    /// address answers, so with the default concurrency of one no farm
    /// check starts while the network is still down.
    pub fn wake(&self) {
        info!("resuming check queue");
        if let Some(address) = self.engine.probe_address.clone() {
            let timeout = self.engine.probe_timeout;
            self.runtime.submit_housekeeping(
                "connectivity probe",
                Box::pin(async move {
                    let reachable =
                        await_connectivity(&address, timeout, WAKE_PROBE_ATTEMPTS, WAKE_PROBE_RETRY)
                            .await;
                    if !reachable {
                        warn!(
                            address = address.as_str(),
                            attempts = WAKE_PROBE_ATTEMPTS,
                            "network still unreachable, resuming checks"
                        );
                    }
                }),
            );
        }
        self.runtime.resume();
    }

    /// Re-read the config file and make the registry match it: listed
    /// farms are added or updated, farms no longer listed are removed
    pub async fn reload(&self) -> Result<(), LifecycleError> {
        let file = load_config(&self.config.config_path)?;
        if file.engine != self.engine {
            warn!("engine settings changed; they apply after a restart");
        }
        self.runtime.apply_all(&file.farms).await?;

        let listed: HashSet<_> = file.farms.iter().map(|farm| &farm.id).collect();
        for farm in self.runtime.farms() {
            if !listed.contains(&farm.id) {
                self.runtime.remove_farm(&farm.id).await?;
            }
        }
        info!(farms = file.farms.len(), "configuration reloaded");
        Ok(())
    }

    /// Shutdown the daemon gracefully
    pub async fn shutdown(&self) -> Result<(), LifecycleError> {
        info!(uptime = %humantime::format_duration(round_secs(self.start_time.elapsed())), "shutting down daemon");
        self.runtime.shutdown().await;

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Stats store error: {0}")]
    Store(#[from] StoreError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        Err(e) => {
            cleanup_on_failure(config, &e);
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create state directory
    if let Some(parent) = config.lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // 2. Acquire lock file FIRST - prevents two daemons sharing a stats file
    let mut lock_file = File::create(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    use std::io::Write;
    writeln!(lock_file, "{}", std::process::id())?;

    // 3. Load and validate configuration before touching any farm
    let file = load_config(&config.config_path)?;
    if file.farms.is_empty() {
        warn!(
            path = %config.config_path.display(),
            "no farms configured, starting with an empty registry"
        );
    }

    // 4. Set up adapters (wrapped with tracing for observability)
    let store = JsonStatsStore::open(&config.stats_path)?;
    let host = TracedSessionHost::new(NoOpSessionHost::new());

    // 5. Create runtime and register farms
    let runtime = Runtime::new(
        RuntimeDeps {
            host,
            store,
            sites: site_catalog(),
        },
        SystemClock,
        &file.engine,
    );
    runtime.apply_all(&file.farms).await?;

    info!(
        farms = file.farms.len(),
        concurrency = file.engine.concurrency,
        stats = %config.stats_path.display(),
        "daemon started"
    );

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        runtime,
        engine: file.engine,
        start_time: Instant::now(),
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config, error: &LifecycleError) {
    // Another daemon owns the lock file
    if matches!(error, LifecycleError::LockFailed(_)) {
        return;
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

/// Site adapters available to farms, keyed by tag
pub fn site_catalog() -> SiteCatalog {
    SiteCatalog::new().with(Arc::new(TracedSiteAdapter::new(Arc::new(
        NoOpSiteAdapter::default(),
    ))))
}

/// Read the config file; a missing file means no farms
fn load_config(path: &Path) -> Result<ConfigFile, LifecycleError> {
    if !path.exists() {
        warn!(path = %path.display(), "config file not found, using defaults");
        return Ok(ConfigFile::default());
    }
    Ok(ConfigFile::load(path)?)
}

/// Try to open a TCP connection to `address` within `timeout`
pub async fn probe(address: &str, timeout: Duration) -> bool {
    let start = Instant::now();
    match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(Ok(_)) => {
            let elapsed_ms = start.elapsed().as_millis() as u64;
            info!(address, elapsed_ms, "connectivity probe succeeded");
            true
        }
        Ok(Err(e)) => {
            warn!(address, error = %e, "connectivity probe failed");
            false
        }
        Err(_) => {
            warn!(address, timeout = %humantime::format_duration(timeout), "connectivity probe timed out");
            false
        }
    }
}

/// Probe `address` up to `attempts` times, `retry` apart. Returns whether
/// it became reachable.
pub async fn await_connectivity(
    address: &str,
    timeout: Duration,
    attempts: u32,
    retry: Duration,
) -> bool {
    for attempt in 1..=attempts {
        if probe(address, timeout).await {
            return true;
        }
        if attempt < attempts {
            tokio::time::sleep(retry).await;
        }
    }
    false
}

fn round_secs(d: Duration) -> Duration {
    Duration::from_secs(d.as_secs())
}

/// Get the state directory for dfd
fn state_dir() -> Result<PathBuf, LifecycleError> {
    // DFD_STATE_DIR overrides for testing
    if let Ok(dir) = std::env::var("DFD_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("dfd"));
    }
    dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/state")))
        .map(|dir| dir.join("dfd"))
        .ok_or(LifecycleError::NoStateDir)
}

/// Get the config directory for dfd
fn config_dir() -> Result<PathBuf, LifecycleError> {
    dirs::config_dir()
        .map(|dir| dir.join("dfd"))
        .ok_or(LifecycleError::NoConfigDir)
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
