use rand::Rng;
use std::time::Duration;

/// Randomised pause between consecutive downloads, in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    min_minutes: u64,
    max_minutes: u64,
}

impl PacingPolicy {
    /// `min` and `max` are swapped if given in the wrong order.
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes: min_minutes.min(max_minutes),
            max_minutes: min_minutes.max(max_minutes),
        }
    }

    /// Draw a delay uniformly from `[min, max]` minutes, inclusive.
    pub fn draw_minutes<R: Rng>(&self, rng: &mut R) -> u64 {
        rng.random_range(self.min_minutes..=self.max_minutes)
    }

    /// Next delay using the thread-local CSPRNG.
    pub fn next_delay(&self) -> Duration {
        let minutes = self.draw_minutes(&mut rand::rng());
        Duration::from_secs(minutes * 60)
    }
}
