//! Circuit breaker for the vendor API.
//!
//! After `threshold` consecutive failures the circuit opens and requests
//! are refused locally for `cooldown`. Once the cooldown has passed a
//! single trial request is let through: success closes the circuit,
//! failure reopens it for another cooldown.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::error::GatewayError;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
            threshold: threshold.max(1),
            cooldown,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // The state is a pair of counters; a poisoned lock still holds usable data.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state(&self) -> CircuitState {
        let inner = self.lock();
        match inner.opened_at {
            None => CircuitState::Closed,
            Some(at) if at.elapsed() >= self.cooldown => CircuitState::HalfOpen,
            Some(_) => CircuitState::Open,
        }
    }

    /// Checks whether a request may be sent now.
    pub fn acquire(&self) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        let Some(opened_at) = inner.opened_at else {
            return Ok(());
        };

        let elapsed = opened_at.elapsed();
        if elapsed >= self.cooldown && !inner.trial_in_flight {
            inner.trial_in_flight = true;
            tracing::debug!("Circuit half-open, allowing trial request");
            return Ok(());
        }

        let remaining = self.cooldown.saturating_sub(elapsed);
        Err(GatewayError::CircuitOpen {
            retry_after_secs: remaining.as_secs().max(1),
        })
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.opened_at.is_some() {
            tracing::info!("Vendor circuit closed after successful trial request");
        }
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        if inner.opened_at.is_some() {
            // Failed trial: restart the cooldown.
            inner.opened_at = Some(Instant::now());
            inner.trial_in_flight = false;
            tracing::warn!("Vendor circuit reopened after failed trial request");
        } else if inner.consecutive_failures >= self.threshold {
            inner.opened_at = Some(Instant::now());
            tracing::warn!(
                "Vendor circuit opened after {} consecutive failures",
                inner.consecutive_failures
            );
        }
    }

    /// Outcome that neither proves nor disproves vendor health (e.g. 4xx).
    pub fn record_neutral(&self) {
        let mut inner = self.lock();
        inner.trial_in_flight = false;
    }
}
