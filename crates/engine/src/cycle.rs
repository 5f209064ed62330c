// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Check cycle pipeline
//!
//! Steps run in order and the first failure ends the cycle:
//! open checker, login, still-active (only with activity open), start
//! activity (only when the condition permits and nothing is open). The
//! outcome is fed back to the farm, which closes the checker and settles
//! its status.

use crate::executor::Executor;
use crate::pool::SessionPool;
use df_adapters::{SessionHost, SiteError, SiteSessions, StatsStore};
use df_core::{Clock, FarmEvent, FarmId};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Run one check cycle for `id` started at `epoch`
pub(crate) async fn run<H, S, C>(exec: Arc<Executor<H, S, C>>, id: FarmId, epoch: u64)
where
    H: SessionHost,
    S: StatsStore,
    C: Clock,
{
    let span = tracing::info_span!("cycle", farm = %id, epoch);
    async move {
        let start = Instant::now();
        let outcome = steps(&exec, &id, epoch).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let event = match outcome {
            Ok(()) => {
                tracing::info!(elapsed_ms, "cycle finished");
                FarmEvent::CycleFinished { epoch }
            }
            Err(SiteError::Superseded)
                if !exec.farm(&id).is_ok_and(|farm| farm.is_current(epoch)) =>
            {
                tracing::info!(elapsed_ms, "cycle superseded");
                return;
            }
            Err(e) => {
                tracing::warn!(elapsed_ms, error = %e, "cycle failed");
                FarmEvent::CycleFailed {
                    epoch,
                    reason: e.to_string(),
                }
            }
        };
        if let Err(e) = exec.feed(&id, event).await {
            tracing::debug!(error = %e, "farm removed before cycle result");
        }
    }
    .instrument(span)
    .await
}

async fn steps<H, S, C>(exec: &Arc<Executor<H, S, C>>, id: &FarmId, epoch: u64) -> Result<(), SiteError>
where
    H: SessionHost,
    S: StatsStore,
    C: Clock,
{
    let farm = exec.farm(id).map_err(|_| SiteError::Superseded)?;
    if !farm.is_current(epoch) {
        return Err(SiteError::Superseded);
    }
    let site = exec.sites.get(&farm.site)?;
    let mut pool = SessionPool::new(Arc::clone(exec), &farm, epoch);

    pool.open_checker().await?;
    site.login(&mut pool).await?;
    pool.current()?;

    if !pool.activity().is_empty() {
        site.still_active(&mut pool).await?;
    }

    if pool.current()?.may_start_activity(exec.clock.utc_now()) {
        site.start_activity(&mut pool).await?;
        pool.current()?;
    }
    Ok(())
}
