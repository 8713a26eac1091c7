//! Per-channel circuit breaker
//!
//! Each channel has its own circuit. Once a channel fails `failure_threshold`
//! times inside `failure_window_secs`, its circuit opens and deliveries on it
//! are held for `timeout_secs` instead of being attempted. When the hold runs
//! out the circuit goes half-open and lets deliveries through on trial:
//! `success_threshold` successes close it, a single failure opens it again.
//!
//! A held delivery records no attempt and is not counted by the transport
//! either; the worker hands the task back with the remaining hold as its
//! delay. An outage longer than the redelivery budget therefore fails
//! nothing.
//!
//! Validation failures reflect the recipient, not the channel, and are not
//! counted.

use std::time::{Duration, Instant};

use ahash::AHashMap;
use courier_common::{Channel, DeliveryResult, ErrorCode, tracing};
use parking_lot::Mutex;
use serde::Deserialize;

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_failure_window_secs() -> u64 {
    60
}

const fn default_timeout_secs() -> u64 {
    300
}

const fn default_success_threshold() -> u32 {
    1
}

/// Thresholds and timings for one channel's circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CircuitSettings {
    /// Failures inside the window that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds over which failures are counted
    #[serde(default = "default_failure_window_secs")]
    pub failure_window_secs: u64,

    /// Seconds deliveries are held once the circuit opens
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Trial successes that close the circuit again
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

impl Default for CircuitSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            failure_window_secs: default_failure_window_secs(),
            timeout_secs: default_timeout_secs(),
            success_threshold: default_success_threshold(),
        }
    }
}

impl CircuitSettings {
    const fn failure_window(&self) -> Duration {
        Duration::from_secs(self.failure_window_secs)
    }

    const fn hold(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings shared by every channel, plus per-channel replacements.
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_failure_window_secs")]
    pub failure_window_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,

    #[serde(default)]
    pub channel_overrides: AHashMap<Channel, CircuitSettings>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        let defaults = CircuitSettings::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            failure_window_secs: defaults.failure_window_secs,
            timeout_secs: defaults.timeout_secs,
            success_threshold: defaults.success_threshold,
            channel_overrides: AHashMap::default(),
        }
    }
}

impl CircuitBreakerConfig {
    /// The override for `channel` if there is one, the shared settings
    /// otherwise
    #[must_use]
    pub fn settings_for(&self, channel: Channel) -> CircuitSettings {
        self.channel_overrides
            .get(&channel)
            .copied()
            .unwrap_or(CircuitSettings {
                failure_threshold: self.failure_threshold,
                failure_window_secs: self.failure_window_secs,
                timeout_secs: self.timeout_secs,
                success_threshold: self.success_threshold,
            })
    }
}

/// Whether a delivery on a channel may go ahead now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,

    /// The circuit is open; ask again after `retry_after`.
    Hold { retry_after: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Circuit {
    /// `failures` counted since `window_start`
    Closed {
        failures: u32,
        window_start: Option<Instant>,
    },
    Open {
        until: Instant,
    },
    HalfOpen {
        successes: u32,
    },
}

impl Circuit {
    const CLOSED: Self = Self::Closed {
        failures: 0,
        window_start: None,
    };

    fn admit(&mut self, channel: Channel, now: Instant) -> Admission {
        match *self {
            Self::Open { until } if now < until => Admission::Hold {
                retry_after: until.duration_since(now),
            },
            Self::Open { .. } => {
                *self = Self::HalfOpen { successes: 0 };
                tracing::info!(channel = channel.code(), "Circuit half-open, trying deliveries again");
                Admission::Allow
            }
            Self::Closed { .. } | Self::HalfOpen { .. } => Admission::Allow,
        }
    }

    fn on_failure(&mut self, channel: Channel, settings: &CircuitSettings, now: Instant) {
        match *self {
            Self::Closed {
                failures,
                window_start,
            } => {
                let (failures, window_start) = match window_start {
                    Some(start) if now.duration_since(start) <= settings.failure_window() => {
                        (failures.saturating_add(1), start)
                    }
                    _ => (1, now),
                };

                if failures >= settings.failure_threshold {
                    *self = Self::Open {
                        until: now + settings.hold(),
                    };
                    tracing::warn!(
                        channel = channel.code(),
                        failures,
                        hold_secs = settings.timeout_secs,
                        "Circuit opened, holding deliveries on this channel"
                    );
                } else {
                    *self = Self::Closed {
                        failures,
                        window_start: Some(window_start),
                    };
                }
            }
            Self::HalfOpen { .. } => {
                *self = Self::Open {
                    until: now + settings.hold(),
                };
                tracing::warn!(channel = channel.code(), "Trial delivery failed, circuit reopened");
            }
            // Cycles admitted before the circuit opened can still report in.
            Self::Open { .. } => {}
        }
    }

    fn on_success(&mut self, channel: Channel, settings: &CircuitSettings) {
        match *self {
            Self::Closed { .. } => *self = Self::CLOSED,
            Self::HalfOpen { successes } => {
                let successes = successes.saturating_add(1);
                if successes >= settings.success_threshold {
                    *self = Self::CLOSED;
                    tracing::info!(channel = channel.code(), "Circuit closed, channel recovered");
                } else {
                    *self = Self::HalfOpen { successes };
                }
            }
            Self::Open { .. } => {}
        }
    }
}

#[derive(Debug)]
struct ChannelCircuit {
    settings: CircuitSettings,
    circuit: Mutex<Circuit>,
}

/// Circuits for every channel, built up front from a [`CircuitBreakerConfig`]
#[derive(Debug)]
pub struct CircuitBreaker {
    circuits: AHashMap<Channel, ChannelCircuit>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        let circuits = Channel::ALL
            .into_iter()
            .map(|channel| {
                let circuit = ChannelCircuit {
                    settings: config.settings_for(channel),
                    circuit: Mutex::new(Circuit::CLOSED),
                };
                (channel, circuit)
            })
            .collect();

        Self { circuits }
    }

    /// Ask whether a delivery on `channel` may go ahead now. An open circuit
    /// whose hold ran out moves to half-open and admits.
    #[must_use]
    pub fn admit(&self, channel: Channel) -> Admission {
        self.circuits.get(&channel).map_or(Admission::Allow, |entry| {
            entry.circuit.lock().admit(channel, Instant::now())
        })
    }

    /// Count the outcome of a delivery attempt on `channel`.
    pub fn record(&self, channel: Channel, result: &DeliveryResult) {
        if result.has_error_code(&ErrorCode::ValidationError) {
            return;
        }
        let Some(entry) = self.circuits.get(&channel) else {
            return;
        };

        let mut circuit = entry.circuit.lock();
        if result.success {
            circuit.on_success(channel, &entry.settings);
        } else {
            circuit.on_failure(channel, &entry.settings, Instant::now());
        }
    }
}
