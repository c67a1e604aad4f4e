use std::collections::VecDeque;
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};
/// Datalog reads per plot division.
pub const READS_PER_DIV: u32 = 10;
/// Horizontal divisions shown in datalog mode.
pub const DIVISIONS: u32 = 10;
/// Datalog horizontal scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AcquisitionRate {
    #[default]
    #[serde(rename = "100 ms/div")]
    Ms100,
    #[serde(rename = "200 ms/div")]
    Ms200,
    #[serde(rename = "500 ms/div")]
    Ms500,
    #[serde(rename = "1 s/div")]
    S1,
}
impl AcquisitionRate {
    pub const ALL: [AcquisitionRate; 4] = [
        AcquisitionRate::Ms100,
        AcquisitionRate::Ms200,
        AcquisitionRate::Ms500,
        AcquisitionRate::S1,
    ];
    pub fn label(self) -> &'static str {
        match self {
            AcquisitionRate::Ms100 => "100 ms/div",
            AcquisitionRate::Ms200 => "200 ms/div",
            AcquisitionRate::Ms500 => "500 ms/div",
            AcquisitionRate::S1 => "1 s/div",
        }
    }
    pub fn millis_per_div(self) -> u64 {
        match self {
            AcquisitionRate::Ms100 => 100,
            AcquisitionRate::Ms200 => 200,
            AcquisitionRate::Ms500 => 500,
            AcquisitionRate::S1 => 1000,
        }
    }
    /// Time between consecutive datalog reads.
    pub fn period(self) -> Duration {
        Duration::from_millis(self.millis_per_div()) / READS_PER_DIV
    }
}
/// Rolling event rate over a fixed time window.
pub struct RateWindow {
    window: Duration,
    stamps: VecDeque<Instant>,
}
impl RateWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            stamps: VecDeque::new(),
        }
    }
    pub fn mark(&mut self) -> f64 {
        self.mark_at(Instant::now())
    }
    /// Records an event at `now` and returns events per second over the window.
    pub fn mark_at(&mut self, now: Instant) -> f64 {
        while let Some(front) = self.stamps.front() {
            if now.duration_since(*front) > self.window {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
        self.stamps.push_back(now);
        self.rate()
    }
    pub fn rate(&self) -> f64 {
        self.stamps.len() as f64 / self.window.as_secs_f64()
    }
    pub fn clear(&mut self) {
        self.stamps.clear();
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn period_is_a_tenth_of_a_division() {
        assert_eq!(AcquisitionRate::Ms100.period(), Duration::from_millis(10));
        assert_eq!(AcquisitionRate::S1.period(), Duration::from_millis(100));
    }
    #[test]
    fn rate_window_drops_old_marks() {
        let mut rate = RateWindow::new(Duration::from_millis(200));
        let t0 = Instant::now();
        for i in 0..4 {
            rate.mark_at(t0 + Duration::from_millis(i * 10));
        }
        assert!((rate.rate() - 20.0).abs() < 1e-9);
        let r = rate.mark_at(t0 + Duration::from_millis(500));
        assert!((r - 5.0).abs() < 1e-9);
    }
}
