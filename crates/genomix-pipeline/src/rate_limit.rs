use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Spaces calls at least `min_interval` apart, measured on the monotonic
/// clock. Callers queue on the gate in arrival order.
#[derive(Debug)]
pub struct IntervalGate {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl IntervalGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
        }
    }

    pub fn per_second(rate: u32) -> Self {
        Self::new(Duration::from_secs_f64(1.0 / f64::from(rate.max(1))))
    }

    /// Wait until the next call is allowed.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let next = previous + self.min_interval;
            if next > Instant::now() {
                tracing::debug!(wait_ms = (next - Instant::now()).as_millis() as u64, "rate limited");
                tokio::time::sleep_until(next).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_calls_are_spaced() {
        let gate = IntervalGate::per_second(4);
        let start = Instant::now();
        for _ in 0..3 {
            gate.wait().await;
        }
        // first call is free, then two 250 ms gaps
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert!(start.elapsed() < Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_idle() {
        let gate = IntervalGate::new(Duration::from_millis(100));
        gate.wait().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        let before = Instant::now();
        gate.wait().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }
}
