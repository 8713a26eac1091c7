use std::time::Duration;

use rand::Rng;

/// Latency and failure injection for channels without a real backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Simulation {
    /// Percentage of sends that fail, 0 to 100
    pub failure_rate: u8,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
}

impl Simulation {
    /// No latency and no failures
    pub const NONE: Self = Self {
        failure_rate: 0,
        min_latency_ms: 0,
        max_latency_ms: 0,
    };

    fn latency(&self) -> Duration {
        let low = self.min_latency_ms.min(self.max_latency_ms);
        let high = self.min_latency_ms.max(self.max_latency_ms);
        if high == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(low..=high))
    }

    fn should_fail(&self) -> bool {
        self.failure_rate > 0 && rand::rng().random_range(0..100u8) < self.failure_rate
    }

    /// Wait out the simulated network latency, then report whether this send
    /// should fail.
    pub(crate) async fn run(&self) -> bool {
        let latency = self.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.should_fail()
    }
}
