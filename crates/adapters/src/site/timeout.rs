// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Waiting for page conditions

use super::SiteError;
use std::future::Future;
use std::time::Duration;

/// How long a step may wait for a page condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTimeout {
    After(Duration),
    /// Wait as long as it takes, e.g. for the user to finish a manual login
    Never,
}

/// Poll `check` every `every` until it returns true.
///
/// With [`StepTimeout::Never`] this only returns once the condition holds
/// or `check` errors.
pub async fn wait_until<F, Fut>(
    what: &str,
    timeout: StepTimeout,
    every: Duration,
    mut check: F,
) -> Result<(), SiteError>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<bool, SiteError>> + Send,
{
    let wait = async {
        loop {
            if check().await? {
                return Ok::<(), SiteError>(());
            }
            tokio::time::sleep(every).await;
        }
    };

    match timeout {
        StepTimeout::Never => wait.await,
        StepTimeout::After(limit) => tokio::time::timeout(limit, wait)
            .await
            .map_err(|_| SiteError::Timeout(what.to_string()))?,
    }
}

#[cfg(test)]
#[path = "timeout_tests.rs"]
mod tests;
