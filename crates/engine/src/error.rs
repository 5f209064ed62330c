// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine runtime

use df_adapters::{HostError, SiteError, StoreError};
use df_core::{ConfigError, FarmId};
use thiserror::Error;

/// Errors that can occur in the runtime
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("farm not found: {0}")]
    FarmNotFound(FarmId),
    #[error("farm already registered: {0}")]
    DuplicateFarm(FarmId),
    #[error("invalid settings: {0}")]
    Config(#[from] ConfigError),
    #[error("site error: {0}")]
    Site(#[from] SiteError),
    #[error("host error: {0}")]
    Host(#[from] HostError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("runtime is shutting down")]
    ShuttingDown,
}
