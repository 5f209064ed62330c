// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: the session host, site automation and
//! stats persistence

pub mod session;
pub mod site;
pub mod store;
pub mod traced;

pub use session::{HostError, NoOpSessionHost, SessionHost};
pub use site::{
    wait_until, NoOpSiteAdapter, SiteAdapter, SiteCatalog, SiteError, SiteSessions, StepTimeout,
};
pub use store::{FarmStats, JsonStatsStore, MemoryStatsStore, StatsStore, StoreError};
pub use traced::{TracedSessionHost, TracedSiteAdapter};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use session::{FakeHostSession, FakeSessionHost, HostCall};
#[cfg(any(test, feature = "test-support"))]
pub use site::{FakeSiteAdapter, SiteCall};
