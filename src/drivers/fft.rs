use rustfft::{num_complex::Complex32, FftPlanner};
use crate::drivers::capture::CaptureBuffer;
use crate::drivers::settings::PollMode;
use crate::drivers::ScopeError;
/// Magnitude spectrum for both channels.
#[derive(Clone, Debug)]
pub struct FrequencySpectrum {
    pub sample_rate_hz: f32,
    pub frequencies_hz: Vec<f32>,
    pub magnitudes: [Vec<f32>; 2], // channel -> bins
}
impl FrequencySpectrum {
    /// Frequency of the strongest bin of `channel`.
    pub fn peak_hz(&self, channel: usize) -> Option<f32> {
        self.magnitudes[channel]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .and_then(|(k, _)| self.frequencies_hz.get(k).copied())
    }
    pub fn points(&self, channel: usize) -> Vec<[f64; 2]> {
        self.frequencies_hz
            .iter()
            .zip(&self.magnitudes[channel])
            .map(|(f, m)| [*f as f64, *m as f64])
            .collect()
    }
}
/// Computes FFTs of time-domain captures for a given window size.
pub struct SpectrumBuilder {
    fft_size: usize,
}
impl SpectrumBuilder {
    pub fn with_size(fft_size: usize) -> Self {
        Self { fft_size }
    }
    /// Window covering the whole capture.
    pub fn for_capture(capture: &CaptureBuffer) -> Self {
        Self::with_size(capture.samples_per_channel())
    }
    /// Spectrum of the capture's voltages with the DC level removed.
    pub fn compute(&self, capture: &CaptureBuffer) -> Result<FrequencySpectrum, ScopeError> {
        if capture.mode == PollMode::Fft {
            return Err(ScopeError::InvalidSetting(
                "capture is already a device FFT result".into(),
            ));
        }
        let interval = capture.sample_interval();
        if self.fft_size < 2 || interval <= 0.0 {
            return Err(ScopeError::InvalidSetting(format!(
                "cannot compute a {}-point spectrum at {interval} s/sample",
                self.fft_size
            )));
        }
        let sample_rate_hz = (1.0 / interval) as f32;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(self.fft_size);
        let frequencies_hz = (0..self.fft_size / 2)
            .map(|k| k as f32 * (sample_rate_hz / self.fft_size as f32))
            .collect();
        let magnitudes = [0, 1].map(|ch| {
            let volts = capture.volts(ch);
            let mean = volts.iter().sum::<f64>() / volts.len().max(1) as f64;
            let mut buffer: Vec<Complex32> = volts
                .iter()
                .take(self.fft_size)
                .map(|v| Complex32::new((v - mean) as f32, 0.0))
                .collect();
            buffer.resize(self.fft_size, Complex32::ZERO);
            fft.process(&mut buffer);
            buffer
                .iter()
                .take(self.fft_size / 2)
                .map(|c| c.norm() / self.fft_size as f32)
                .collect()
        });
        Ok(FrequencySpectrum {
            sample_rate_hz,
            frequencies_hz,
            magnitudes,
        })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;
    fn sine_capture(n: usize, cycles: f64) -> CaptureBuffer {
        let ch1 = (0..n)
            .map(|i| (128.0 + 100.0 * (TAU * cycles * i as f64 / n as f64).sin()).round() as u8)
            .collect();
        let mut capture = CaptureBuffer::new(PollMode::Time, [ch1, vec![128; n]]);
        // 64 samples over 10 divisions of 0.1 s: 64 Hz sampling
        capture.seconds_per_div = 0.1;
        capture
    }
    #[test]
    fn sine_peaks_at_its_frequency() {
        let capture = sine_capture(64, 8.0);
        let spectrum = SpectrumBuilder::for_capture(&capture).compute(&capture).unwrap();
        assert!((spectrum.sample_rate_hz - 64.0).abs() < 1e-3);
        assert_eq!(spectrum.frequencies_hz.len(), 32);
        assert_eq!(spectrum.peak_hz(0), Some(8.0));
        assert!(spectrum.magnitudes[1].iter().all(|m| *m < 1e-6));
        assert_eq!(spectrum.points(0).len(), 32);
    }
    #[test]
    fn device_fft_captures_are_rejected() {
        let mut capture = sine_capture(16, 1.0);
        capture.mode = PollMode::Fft;
        assert!(SpectrumBuilder::with_size(16).compute(&capture).is_err());
    }
    #[test]
    fn unscaled_capture_is_rejected() {
        let capture = CaptureBuffer::new(PollMode::Time, [vec![1; 8], vec![1; 8]]);
        assert!(matches!(
            SpectrumBuilder::with_size(8).compute(&capture),
            Err(ScopeError::InvalidSetting(_))
        ));
    }
}
