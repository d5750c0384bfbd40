//! Wall-clock budget shared by the pipeline stages.
//!
//! CPU-bound stages poll [`Deadline::check`] so a ceiling fires even when no
//! `.await` would let a timer run; remote stages get a slice of what is left
//! via [`Deadline::share`] so their retries cannot consume the whole budget.

use crate::error::{DigestError, Result};
use std::time::Duration;
use tokio::time::Instant;

/// A point in time after which work must stop, or no limit at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
    ceiling: Duration,
}

impl Deadline {
    /// Expires `ceiling` from now.
    pub fn after(ceiling: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(ceiling),
            ceiling,
        }
    }

    /// Never expires.
    pub fn none() -> Self {
        Self {
            at: None,
            ceiling: Duration::MAX,
        }
    }

    /// The total budget this deadline was created with.
    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Time left; `Duration::MAX` when unbounded.
    pub fn remaining(&self) -> Duration {
        match self.at {
            Some(at) => at.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// `Err(Timeout)` once the deadline has passed.
    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            Err(DigestError::Timeout(self.ceiling))
        } else {
            Ok(())
        }
    }

    /// A tighter deadline using `fraction` of the remaining time, leaving
    /// the rest in reserve for later stages. Reports the same ceiling.
    pub fn share(&self, fraction: f64) -> Self {
        let Some(at) = self.at else { return *self };
        let now = Instant::now();
        let slice = at
            .saturating_duration_since(now)
            .mul_f64(fraction.clamp(0.0, 1.0));
        Self {
            at: Some(now + slice),
            ceiling: self.ceiling,
        }
    }
}
