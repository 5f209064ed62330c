// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Farm engine runtime
//!
//! Wires the pure farm state machines from `df-core` to the adapters:
//! a keyed scheduler fires check ticks, a bounded priority queue runs
//! check cycles, and the executor applies every effect a transition
//! returns.

mod clock;
mod cycle;
mod error;
mod events;
mod executor;
mod pool;
mod queue;
mod registry;
mod runtime;
mod scheduler;

pub use clock::TokioClock;
pub use error::RuntimeError;
pub use events::EventBus;
pub use executor::{Executor, RestartHook};
pub use queue::{Job, WorkQueue};
pub use registry::{FarmCell, FarmRegistry};
pub use runtime::{Runtime, RuntimeDeps};
pub use scheduler::{Scheduler, TickCallback, TokioScheduler};
