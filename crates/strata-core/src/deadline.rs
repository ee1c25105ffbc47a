// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deadline and cancellation propagation for engine operations.
//!
//! Every public facade operation accepts a [`Deadline`]; child operations
//! inherit it by cloning. Pipelines call [`Deadline::checkpoint`] between
//! steps and short-circuit with `StrataError::Cancelled` when it fires.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::StrataError;

/// A cooperative deadline: an optional wall-clock cutoff plus a cancellation
/// token shared down the call tree.
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Option<Instant>,
    token: CancellationToken,
}

impl Deadline {
    /// A deadline that never fires on time; still cancellable via its token.
    pub fn none() -> Self {
        Self {
            expires_at: None,
            token: CancellationToken::new(),
        }
    }

    /// A deadline that fires `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Some(Instant::now() + timeout),
            token: CancellationToken::new(),
        }
    }

    /// The cancellation token shared with child operations.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Explicitly cancel all operations sharing this deadline.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the deadline has passed or cancellation has been requested.
    pub fn expired(&self) -> bool {
        if self.token.is_cancelled() {
            return true;
        }
        match self.expires_at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }

    /// Time remaining, if a cutoff is set. `None` means unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Returns `Err(Cancelled)` when the deadline has fired. Pipelines call
    /// this between steps so partial work is surfaced instead of lost.
    pub fn checkpoint(&self, stage: &str) -> Result<(), StrataError> {
        if self.token.is_cancelled() {
            return Err(StrataError::Cancelled(format!(
                "cancelled before {stage}"
            )));
        }
        if self.expired() {
            return Err(StrataError::Cancelled(format!(
                "deadline exceeded before {stage}"
            )));
        }
        Ok(())
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_never_expires_on_time() {
        let d = Deadline::none();
        assert!(!d.expired());
        assert!(d.remaining().is_none());
        assert!(d.checkpoint("anything").is_ok());
    }

    #[test]
    fn after_zero_is_already_expired() {
        let d = Deadline::after(Duration::ZERO);
        assert!(d.expired());
        let err = d.checkpoint("fusion").unwrap_err();
        assert!(matches!(err, StrataError::Cancelled(_)));
        assert!(err.to_string().contains("fusion"));
    }

    #[test]
    fn cancel_propagates_to_clones() {
        let d = Deadline::after(Duration::from_secs(60));
        let child = d.clone();
        assert!(!child.expired());
        d.cancel();
        assert!(child.expired());
        assert!(matches!(
            child.checkpoint("dedup"),
            Err(StrataError::Cancelled(_))
        ));
    }
}
