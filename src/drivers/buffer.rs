use std::collections::VecDeque;
use std::time::Duration;
use crate::drivers::rate::{DIVISIONS, READS_PER_DIV};
/// Rolling store of datalog reads, one screen wide.
pub struct DatalogBuffer {
    per_channel: [VecDeque<f64>; 2],
    capacity: usize,
    period: Duration,
}
impl DatalogBuffer {
    pub fn new(period: Duration) -> Self {
        Self::with_capacity((DIVISIONS * READS_PER_DIV) as usize, period)
    }
    pub fn with_capacity(capacity: usize, period: Duration) -> Self {
        Self {
            per_channel: [
                VecDeque::with_capacity(capacity),
                VecDeque::with_capacity(capacity),
            ],
            capacity: capacity.max(1),
            period,
        }
    }
    pub fn period(&self) -> Duration {
        self.period
    }
    /// A different period restarts the trace.
    pub fn set_period(&mut self, period: Duration) {
        if period != self.period {
            self.period = period;
            self.clear();
        }
    }
    pub fn push(&mut self, volts: [f64; 2]) {
        for (queue, v) in self.per_channel.iter_mut().zip(volts) {
            if queue.len() == self.capacity {
                queue.pop_front();
            }
            queue.push_back(v);
        }
    }
    pub fn len(&self) -> usize {
        self.per_channel[0].len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn clear(&mut self) {
        for queue in &mut self.per_channel {
            queue.clear();
        }
    }
    pub fn latest(&self) -> Option<[f64; 2]> {
        Some([*self.per_channel[0].back()?, *self.per_channel[1].back()?])
    }
    /// `[seconds, volts]` pairs, oldest first, starting at zero.
    pub fn points(&self, channel: usize) -> Vec<[f64; 2]> {
        let step = self.period.as_secs_f64();
        self.per_channel[channel]
            .iter()
            .enumerate()
            .map(|(i, v)| [i as f64 * step, *v])
            .collect()
    }
    /// Seconds spanned by a full buffer.
    pub fn span_seconds(&self) -> f64 {
        self.capacity as f64 * self.period.as_secs_f64()
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn rolls_over_at_capacity() {
        let mut buffer = DatalogBuffer::with_capacity(3, Duration::from_millis(10));
        for i in 0..5 {
            buffer.push([i as f64, -(i as f64)]);
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.latest(), Some([4.0, -4.0]));
        let points = buffer.points(0);
        assert_eq!(points[0][1], 2.0);
        assert!((points[2][0] - 0.02).abs() < 1e-12);
    }
    #[test]
    fn default_capacity_is_one_screen() {
        let buffer = DatalogBuffer::new(Duration::from_millis(10));
        assert!((buffer.span_seconds() - 1.0).abs() < 1e-12);
        assert!(buffer.is_empty());
        assert_eq!(buffer.latest(), None);
    }
    #[test]
    fn new_period_clears_trace() {
        let mut buffer = DatalogBuffer::new(Duration::from_millis(10));
        buffer.push([1.0, 2.0]);
        buffer.set_period(Duration::from_millis(10));
        assert_eq!(buffer.len(), 1);
        buffer.set_period(Duration::from_millis(20));
        assert!(buffer.is_empty());
    }
}
