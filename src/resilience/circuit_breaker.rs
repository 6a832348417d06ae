//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed down, calls fail fast
//! - Half-Open: testing if upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure percentage >= threshold within the rolling window
//! Open → Half-Open: first admission check after the reset timeout
//! Half-Open → Closed: probe call succeeds
//! Half-Open → Open: probe call fails
//! ```
//!
//! # Design Decisions
//! - One breaker per protected operation, shared by all requests through `Arc`
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering recovering upstream)
//! - Every transition bumps a generation counter; outcomes of calls admitted
//!   under an older generation do not move the state machine

use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::clock::{Clock, SystemClock};
use crate::config::CircuitBreakerConfig;
use crate::resilience::events::BreakerListener;
use crate::resilience::timeouts::with_deadline;
use crate::resilience::window::RollingWindow;
use crate::upstream::UpstreamError;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a breaker, for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub successes: u64,
    pub failures: u64,
    pub failure_percentage: u64,
    pub open_for_ms: Option<u64>,
    pub probe_in_flight: bool,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    window: RollingWindow,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    generation: u64,
}

type Transition = (CircuitState, CircuitState);

impl BreakerInner {
    fn transition(&mut self, to: CircuitState, now: Instant) -> Transition {
        let from = self.state;
        self.state = to;
        self.generation += 1;
        self.probe_in_flight = false;
        match to {
            CircuitState::Open => self.opened_at = Some(now),
            CircuitState::HalfOpen => {}
            CircuitState::Closed => {
                self.opened_at = None;
                self.window.reset();
            }
        }
        (from, to)
    }
}

/// Gate in front of one upstream operation.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<BreakerInner>,
    listeners: Vec<Arc<dyn BreakerListener>>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &self.state())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a breaker driven by the system clock.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Create a breaker driven by the given clock.
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let window = RollingWindow::new(clock.now(), config.rolling_window(), config.rolling_buckets);
        Self {
            name: name.into(),
            config,
            clock,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window,
                opened_at: None,
                probe_in_flight: false,
                generation: 0,
            }),
            listeners: Vec::new(),
        }
    }

    /// Register a listener for state transitions and call outcomes.
    pub fn with_listener(mut self, listener: Arc<dyn BreakerListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state. Does not advance Open → Half-Open; only admission does.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = self.clock.now();
        let inner = self.lock();
        let counts = inner.window.counts(now);
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            successes: counts.successes,
            failures: counts.failures,
            failure_percentage: counts.failure_percentage(),
            open_for_ms: inner
                .opened_at
                .map(|at| now.saturating_duration_since(at).as_millis() as u64),
            probe_in_flight: inner.probe_in_flight,
        }
    }

    /// Run `call` through the breaker.
    ///
    /// Rejected calls return [`UpstreamError::BreakerOpen`] without invoking
    /// `call`. Admitted calls are bounded by `call_timeout`; their outcome is
    /// fed back into the state machine.
    pub async fn fire<T, F, Fut>(&self, call: F) -> Result<T, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let permit = self.admit()?;
        let result = with_deadline(self.config.call_timeout(), call()).await;
        match &result {
            Ok(_) => permit.succeed(),
            Err(e) => permit.fail(e),
        }
        result
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit(&self) -> Result<CallPermit<'_>, UpstreamError> {
        let now = self.clock.now();
        let mut transition = None;

        let admitted = {
            let mut inner = self.lock();
            let probe = match inner.state {
                CircuitState::Closed => Some(false),
                CircuitState::Open => {
                    let expired = inner.opened_at.map_or(true, |at| {
                        now.saturating_duration_since(at) >= self.config.reset_timeout()
                    });
                    if expired {
                        transition = Some(inner.transition(CircuitState::HalfOpen, now));
                        inner.probe_in_flight = true;
                        Some(true)
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen if inner.probe_in_flight => None,
                CircuitState::HalfOpen => {
                    inner.probe_in_flight = true;
                    Some(true)
                }
            };
            probe.map(|probe| (probe, inner.generation))
        };

        if let Some(transition) = transition {
            self.notify_transition(transition);
        }

        match admitted {
            Some((probe, generation)) => Ok(CallPermit {
                breaker: self,
                probe,
                generation,
                settled: false,
            }),
            None => {
                for listener in &self.listeners {
                    listener.on_reject(&self.name);
                }
                Err(UpstreamError::BreakerOpen {
                    breaker: self.name.clone(),
                })
            }
        }
    }

    fn record_success(&self, probe: bool, generation: u64) {
        let now = self.clock.now();
        let transition = {
            let mut inner = self.lock();
            if inner.generation != generation {
                None
            } else if probe {
                Some(inner.transition(CircuitState::Closed, now))
            } else {
                inner.window.record_success(now);
                None
            }
        };

        for listener in &self.listeners {
            listener.on_success(&self.name);
        }
        if let Some(transition) = transition {
            self.notify_transition(transition);
        }
    }

    fn record_failure(&self, probe: bool, generation: u64, error: &UpstreamError) {
        let now = self.clock.now();
        let transition = {
            let mut inner = self.lock();
            if inner.generation != generation {
                None
            } else if probe {
                Some(inner.transition(CircuitState::Open, now))
            } else {
                inner.window.record_failure(now);
                let counts = inner.window.counts(now);
                let tripped = counts.total() >= u64::from(self.config.volume_threshold)
                    && counts.failure_percentage() >= u64::from(self.config.error_threshold_percentage);
                if tripped {
                    tracing::debug!(
                        breaker = %self.name,
                        failures = counts.failures,
                        total = counts.total(),
                        "Failure threshold crossed"
                    );
                    Some(inner.transition(CircuitState::Open, now))
                } else {
                    None
                }
            }
        };

        for listener in &self.listeners {
            listener.on_failure(&self.name, error);
        }
        if let Some(transition) = transition {
            self.notify_transition(transition);
        }
    }

    fn release_probe(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation && inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
        }
    }

    fn notify_transition(&self, (from, to): Transition) {
        for listener in &self.listeners {
            listener.on_state_change(&self.name, from, to);
        }
    }
}

/// Admission ticket for one call. A probe ticket dropped without an outcome
/// (the caller's future was cancelled) frees the Half-Open probe slot.
struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    generation: u64,
    settled: bool,
}

impl CallPermit<'_> {
    fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success(self.probe, self.generation);
    }

    fn fail(mut self, error: &UpstreamError) {
        self.settled = true;
        self.breaker.record_failure(self.probe, self.generation, error);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe(self.generation);
        }
    }
}
