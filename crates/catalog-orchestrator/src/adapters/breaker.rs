//! Per-dependency circuit breaker.
//!
//! `Closed` counts consecutive failures; `failure_threshold` of them inside
//! `window` opens the circuit. `Open` rejects every call until `cooldown`
//! has passed, then admits exactly one trial call (`HalfOpen`). The trial's
//! outcome either closes the circuit or reopens it for another cooldown.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub window: Duration,
    pub cooldown: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Externally visible breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum State {
    Closed {
        failures: u32,
        first_failure: Option<Instant>,
    },
    Open {
        until: Instant,
    },
    HalfOpen {
        trial_started: Instant,
    },
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            name: name.into(),
            settings: BreakerSettings {
                failure_threshold: settings.failure_threshold.max(1),
                ..settings
            },
            state: Mutex::new(State::Closed {
                failures: 0,
                first_failure: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BreakerState {
        match *self.lock() {
            State::Closed { .. } => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    /// Asks permission for one call. Returns `false` when the call must
    /// fail fast without touching the dependency.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut state = self.lock();
        match *state {
            State::Closed { .. } => true,
            State::Open { until } if now >= until => {
                log::info!("Circuit '{}' half-open, admitting trial call", self.name);
                *state = State::HalfOpen { trial_started: now };
                true
            }
            State::Open { .. } => false,
            // A trial that never reported back (caller dropped) must not
            // wedge the breaker; admit a new one after another cooldown.
            State::HalfOpen { trial_started } if now >= trial_started + self.settings.cooldown => {
                *state = State::HalfOpen { trial_started: now };
                true
            }
            State::HalfOpen { .. } => false,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.lock();
        if matches!(*state, State::HalfOpen { .. }) {
            log::info!("Circuit '{}' closed after successful trial", self.name);
        }
        *state = State::Closed {
            failures: 0,
            first_failure: None,
        };
    }

    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut state = self.lock();
        let next = match *state {
            State::Closed {
                failures,
                first_failure,
            } => {
                let (failures, first) = match first_failure {
                    Some(first) if now.duration_since(first) <= self.settings.window => {
                        (failures + 1, first)
                    }
                    _ => (1, now),
                };
                if failures >= self.settings.failure_threshold {
                    log::warn!(
                        "Circuit '{}' opened after {} consecutive failures",
                        self.name,
                        failures
                    );
                    State::Open {
                        until: now + self.settings.cooldown,
                    }
                } else {
                    State::Closed {
                        failures,
                        first_failure: Some(first),
                    }
                }
            }
            State::HalfOpen { .. } => {
                log::warn!("Circuit '{}' trial call failed, reopening", self.name);
                State::Open {
                    until: now + self.settings.cooldown,
                }
            }
            State::Open { until } => State::Open { until },
        };
        *state = next;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
