// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration types and validation
//!
//! Settings are validated here, at the apply boundary. The engine only ever
//! sees values that passed [`FarmSettings::validate`].

use crate::condition::{Condition, ConditionKind};
use crate::id::FarmId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Smallest allowed check interval, in minutes
pub const MIN_SCHEDULE_MINUTES: u32 = 1;
/// Largest allowed check interval, in minutes
pub const MAX_SCHEDULE_MINUTES: u32 = 60;
/// Interval used when a farm does not set one
pub const DEFAULT_SCHEDULE_MINUTES: u32 = 30;

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("schedule of {0} minutes is outside {MIN_SCHEDULE_MINUTES}..={MAX_SCHEDULE_MINUTES}")]
    ScheduleOutOfRange(u32),
    #[error("{0} condition needs a non-zero target")]
    MissingTarget(ConditionKind),
    #[error("time window starts after it ends")]
    InvalidWindow,
    #[error("duplicate farm id: {0}")]
    DuplicateFarm(FarmId),
    #[error("farm {0} has no url")]
    MissingUrl(FarmId),
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
}

/// Condition settings as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionConfig {
    #[serde(default = "default_kind")]
    pub kind: ConditionKind,
    #[serde(default, with = "humantime_serde")]
    pub target: Duration,
    #[serde(default, with = "humantime_serde")]
    pub buffer: Duration,
    #[serde(default)]
    pub repeating: bool,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

fn default_kind() -> ConditionKind {
    ConditionKind::Unlimited
}

impl Default for ConditionConfig {
    fn default() -> Self {
        Self {
            kind: ConditionKind::Unlimited,
            target: Duration::ZERO,
            buffer: Duration::ZERO,
            repeating: false,
            from: None,
            to: None,
        }
    }
}

impl ConditionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.kind {
            ConditionKind::Weekly | ConditionKind::Monthly if self.target.is_zero() => {
                Err(ConfigError::MissingTarget(self.kind))
            }
            ConditionKind::TimeWindow => match (self.from, self.to) {
                (Some(from), Some(to)) if from > to => Err(ConfigError::InvalidWindow),
                _ => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Build a fresh condition from these settings
    pub fn to_condition(&self) -> Condition {
        match self.kind {
            ConditionKind::Unlimited => Condition::unlimited(),
            ConditionKind::Weekly => Condition::weekly(self.target, self.buffer, self.repeating),
            ConditionKind::Monthly => Condition::monthly(self.target, self.buffer, self.repeating),
            ConditionKind::TimeWindow => Condition::time_window(self.from, self.to),
        }
    }
}

/// User-adjustable settings of a farm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_schedule")]
    pub schedule_minutes: u32,
    #[serde(default)]
    pub condition: ConditionConfig,
}

fn default_enabled() -> bool {
    true
}

fn default_schedule() -> u32 {
    DEFAULT_SCHEDULE_MINUTES
}

impl Default for FarmSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            schedule_minutes: DEFAULT_SCHEDULE_MINUTES,
            condition: ConditionConfig::default(),
        }
    }
}

impl FarmSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_SCHEDULE_MINUTES..=MAX_SCHEDULE_MINUTES).contains(&self.schedule_minutes) {
            return Err(ConfigError::ScheduleOutOfRange(self.schedule_minutes));
        }
        self.condition.validate()
    }

    /// Check interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.schedule_minutes) * 60)
    }
}

/// A farm entry in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmConfig {
    pub id: FarmId,
    /// Site adapter tag
    pub site: String,
    /// Page the checker session opens
    pub url: String,
    #[serde(flatten)]
    pub settings: FarmSettings,
}

impl FarmConfig {
    pub fn new(id: impl Into<FarmId>, site: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            site: site.into(),
            url: url.into(),
            settings: FarmSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: FarmSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingUrl(self.id.clone()));
        }
        self.settings.validate()
    }
}

/// Engine-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Check cycles allowed to run at once across all farms
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Interval given to farms that do not set `schedule_minutes`
    #[serde(default = "default_schedule")]
    pub default_schedule_minutes: u32,
    /// `host:port` probed after wake to confirm connectivity
    #[serde(default)]
    pub probe_address: Option<String>,
    #[serde(default = "default_probe_timeout", with = "humantime_serde")]
    pub probe_timeout: Duration,
}

fn default_concurrency() -> usize {
    1
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            default_schedule_minutes: DEFAULT_SCHEDULE_MINUTES,
            probe_address: None,
            probe_timeout: default_probe_timeout(),
        }
    }
}

/// Top-level config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub farms: Vec<FarmConfig>,
}

impl ConfigFile {
    /// Parse and validate a config document
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut doc: toml::Table = content.parse()?;
        apply_default_schedule(&mut doc);
        let file: ConfigFile = toml::Value::Table(doc).try_into()?;
        file.validate()?;
        Ok(file)
    }

    /// Read, parse and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        let default_schedule = self.engine.default_schedule_minutes;
        if !(MIN_SCHEDULE_MINUTES..=MAX_SCHEDULE_MINUTES).contains(&default_schedule) {
            return Err(ConfigError::ScheduleOutOfRange(default_schedule));
        }
        let mut seen = HashSet::new();
        for farm in &self.farms {
            if !seen.insert(&farm.id) {
                return Err(ConfigError::DuplicateFarm(farm.id.clone()));
            }
            farm.validate()?;
        }
        Ok(())
    }
}

/// Fill in `schedule_minutes` for farms that omit it from
/// `engine.default_schedule_minutes`
fn apply_default_schedule(doc: &mut toml::Table) {
    let Some(default) = doc
        .get("engine")
        .and_then(|engine| engine.get("default_schedule_minutes"))
        .cloned()
    else {
        return;
    };
    let Some(toml::Value::Array(farms)) = doc.get_mut("farms") else {
        return;
    };
    for farm in farms.iter_mut() {
        if let toml::Value::Table(table) = farm {
            table
                .entry("schedule_minutes")
                .or_insert_with(|| default.clone());
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
