// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Naming for effects in logs

/// Effects that the engine logs as it applies them
pub trait TracedEffect {
    /// Short span name (e.g. "destroy_sessions")
    fn name(&self) -> &'static str;

    /// Structured fields attached to the span
    fn fields(&self) -> Vec<(&'static str, String)>;
}
