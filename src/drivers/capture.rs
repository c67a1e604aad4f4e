use std::time::SystemTime;
use crate::drivers::rate::DIVISIONS;
use crate::drivers::settings::PollMode;
use crate::drivers::ScopeError;
/// Maximum samples per channel the device returns from one readback.
pub const MAX_READBACK_SAMPLES: u8 = 205;
/// One acquisition: raw 8-bit samples for both channels plus display scales.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureBuffer {
    pub captured_at: SystemTime,
    pub mode: PollMode,
    pub samples: [Vec<u8>; 2],
    /// Nominal horizontal scale.
    pub seconds_per_div: f64,
    pub volts_per_div: [f64; 2],
    /// Conversion factor from sample code to volts, per channel.
    pub volts_per_code: [f64; 2],
}
impl CaptureBuffer {
    pub fn new(mode: PollMode, samples: [Vec<u8>; 2]) -> Self {
        Self {
            captured_at: SystemTime::now(),
            mode,
            samples,
            seconds_per_div: 0.0,
            volts_per_div: [0.0; 2],
            volts_per_code: [1.0; 2],
        }
    }
    pub fn validate(&self) -> Result<(), ScopeError> {
        let [a, b] = &self.samples;
        if a.len() != b.len() {
            return Err(ScopeError::Decode(format!(
                "channel length mismatch: {} vs {}",
                a.len(),
                b.len()
            )));
        }
        Ok(())
    }
    pub fn samples_per_channel(&self) -> usize {
        self.samples[0].len()
    }
    /// Seconds between samples, with the record spread over the full screen.
    pub fn sample_interval(&self) -> f64 {
        match self.samples_per_channel() {
            0 => 0.0,
            n => self.seconds_per_div * DIVISIONS as f64 / n as f64,
        }
    }
    pub fn volts(&self, channel: usize) -> Vec<f64> {
        let factor = self.volts_per_code[channel];
        self.samples[channel]
            .iter()
            .map(|&code| code as f64 * factor)
            .collect()
    }
    /// `[x, y]` pairs for plotting: sample index against volts.
    pub fn points(&self, channel: usize) -> Vec<[f64; 2]> {
        self.volts(channel)
            .into_iter()
            .enumerate()
            .map(|(i, v)| [i as f64, v])
            .collect()
    }
    /// `[ch1, ch2]` voltage pairs for an XY plot.
    pub fn xy_points(&self) -> Vec<[f64; 2]> {
        self.volts(0)
            .into_iter()
            .zip(self.volts(1))
            .map(|(x, y)| [x, y])
            .collect()
    }
}
/// Splits a readback block into per-channel samples.
///
/// `data` is what follows the status byte: one header byte then `2 * n` sample
/// bytes. Time-mode samples are interleaved ch1, ch2, ch1, ...; FFT-mode
/// results are ch1 bins followed by ch2 bins. Any other length is rejected.
pub fn decode_readback(
    mode: PollMode,
    data: &[u8],
    samples: u8,
) -> Result<CaptureBuffer, ScopeError> {
    let expected = 1 + 2 * samples as usize;
    if data.len() != expected {
        return Err(ScopeError::Decode(format!(
            "readback block must be {expected} bytes for {samples} samples, got {}",
            data.len()
        )));
    }
    let body = &data[1..];
    let channels = match mode {
        PollMode::Time => [
            body.iter().step_by(2).copied().collect(),
            body.iter().skip(1).step_by(2).copied().collect(),
        ],
        PollMode::Fft => {
            let (ch1, ch2) = body.split_at(samples as usize);
            [ch1.to_vec(), ch2.to_vec()]
        }
    };
    let capture = CaptureBuffer::new(mode, channels);
    capture.validate()?;
    Ok(capture)
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn full_block_decodes_to_readback_length() {
        let n = MAX_READBACK_SAMPLES;
        let mut data = vec![0u8];
        for i in 0..n {
            data.push(i);
            data.push(255 - i);
        }
        let capture = decode_readback(PollMode::Time, &data, n).unwrap();
        assert_eq!(capture.samples_per_channel(), 205);
        assert_eq!(capture.samples[0][..3], [0, 1, 2]);
        assert_eq!(capture.samples[1][..3], [255, 254, 253]);
    }
    #[test]
    fn fft_block_is_split_in_halves() {
        let data = [9, 1, 2, 3, 4, 5, 6];
        let capture = decode_readback(PollMode::Fft, &data, 3).unwrap();
        assert_eq!(capture.samples, [vec![1, 2, 3], vec![4, 5, 6]]);
    }
    #[test]
    fn wrong_length_blocks_are_rejected() {
        assert!(matches!(
            decode_readback(PollMode::Time, &[0, 1, 2, 3], 2),
            Err(ScopeError::Decode(_))
        ));
        assert!(decode_readback(PollMode::Time, &[0, 1, 2, 3, 4, 5], 2).is_err());
        assert!(decode_readback(PollMode::Fft, &[], 0).is_err());
    }
    #[test]
    fn volts_use_per_channel_factor() {
        let mut capture = CaptureBuffer::new(PollMode::Time, [vec![10, 20], vec![1, 2]]);
        capture.volts_per_code = [0.5, 2.0];
        assert_eq!(capture.volts(0), vec![5.0, 10.0]);
        assert_eq!(capture.points(1), vec![[0.0, 2.0], [1.0, 4.0]]);
        assert_eq!(capture.xy_points(), vec![[5.0, 2.0], [10.0, 4.0]]);
    }
}
