//! Scope configuration in front-panel terms, and the device codes behind it.
use serde::{Deserialize, Serialize};
use crate::drivers::gain::VerticalScale;
use crate::drivers::rate::AcquisitionRate;
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerSource {
    #[default]
    Auto,
    Ch1,
    Ch2,
}
impl TriggerSource {
    pub const ALL: [TriggerSource; 3] =
        [TriggerSource::Auto, TriggerSource::Ch1, TriggerSource::Ch2];
    pub fn code(self) -> u8 {
        match self {
            TriggerSource::Auto => 0,
            TriggerSource::Ch1 => 1,
            TriggerSource::Ch2 => 2,
        }
    }
    pub fn label(self) -> &'static str {
        match self {
            TriggerSource::Auto => "Auto",
            TriggerSource::Ch1 => "Ch1",
            TriggerSource::Ch2 => "Ch2",
        }
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerPolarity {
    #[default]
    Rising,
    Falling,
}
impl TriggerPolarity {
    pub fn code(self) -> u8 {
        match self {
            TriggerPolarity::Rising => 0,
            TriggerPolarity::Falling => 1,
        }
    }
}
/// Mid-scale of the 10-bit trigger comparator.
pub const DEFAULT_TRIGGER_LEVEL: u16 = 512;
/// Full scale of the trigger comparator.
pub const MAX_TRIGGER_LEVEL: u16 = 1023;
/// ADC input range selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    /// Full resolution over a quarter of the input range.
    High,
    /// Quarter resolution over the full input range.
    #[default]
    Low,
}
impl Resolution {
    pub const ALL: [Resolution; 2] = [Resolution::High, Resolution::Low];
    pub fn code(self) -> u8 {
        match self {
            Resolution::High => 0,
            Resolution::Low => 1,
        }
    }
    pub fn label(self) -> &'static str {
        match self {
            Resolution::High => "High res",
            Resolution::Low => "Low res",
        }
    }
}
/// Horizontal setting for scope-mode captures: device sample-rate code plus the
/// nominal time per division it is displayed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Timebase {
    #[serde(rename = "50 us/div")]
    Us50,
    #[serde(rename = "100 us/div")]
    Us100,
    #[default]
    #[serde(rename = "200 us/div")]
    Us200,
    #[serde(rename = "500 us/div")]
    Us500,
    #[serde(rename = "1 ms/div")]
    Ms1,
    #[serde(rename = "2 ms/div")]
    Ms2,
}
impl Timebase {
    pub const ALL: [Timebase; 6] = [
        Timebase::Us50,
        Timebase::Us100,
        Timebase::Us200,
        Timebase::Us500,
        Timebase::Ms1,
        Timebase::Ms2,
    ];
    pub fn sample_rate_code(self) -> u8 {
        match self {
            Timebase::Us50 => 0,
            Timebase::Us100 => 1,
            Timebase::Us200 => 2,
            Timebase::Us500 => 3,
            Timebase::Ms1 => 4,
            Timebase::Ms2 => 5,
        }
    }
    pub fn seconds_per_div(self) -> f64 {
        match self {
            Timebase::Us50 => 50e-6,
            Timebase::Us100 => 100e-6,
            Timebase::Us200 => 200e-6,
            Timebase::Us500 => 500e-6,
            Timebase::Ms1 => 1e-3,
            Timebase::Ms2 => 2e-3,
        }
    }
    pub fn label(self) -> &'static str {
        match self {
            Timebase::Us50 => "50 us/div",
            Timebase::Us100 => "100 us/div",
            Timebase::Us200 => "200 us/div",
            Timebase::Us500 => "500 us/div",
            Timebase::Ms1 => "1 ms/div",
            Timebase::Ms2 => "2 ms/div",
        }
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SampleMode {
    /// Triggered waveform capture read back as a block.
    Scope,
    /// Periodic single ADC reads.
    #[default]
    Datalog,
}
impl SampleMode {
    pub fn label(self) -> &'static str {
        match self {
            SampleMode::Scope => "Scope mode",
            SampleMode::Datalog => "Datalog mode",
        }
    }
}
/// Domain of a scope-mode capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PollMode {
    #[default]
    Time,
    Fft,
}
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub enabled: bool,
    pub scale: VerticalScale,
}
impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scale: VerticalScale::default(),
        }
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub channels: [ChannelConfig; 2],
    pub trigger_source: TriggerSource,
    pub trigger_polarity: TriggerPolarity,
    pub trigger_level: u16,
    pub noise_reject: bool,
    pub resolution: Resolution,
    pub timebase: Timebase,
    pub sample_mode: SampleMode,
    pub poll_mode: PollMode,
    pub acquisition_rate: AcquisitionRate,
    /// Plot channel 2 against channel 1 instead of against time.
    pub xy: bool,
}
impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            channels: [ChannelConfig::default(); 2],
            trigger_source: TriggerSource::default(),
            trigger_polarity: TriggerPolarity::default(),
            trigger_level: DEFAULT_TRIGGER_LEVEL,
            noise_reject: false,
            resolution: Resolution::default(),
            timebase: Timebase::default(),
            sample_mode: SampleMode::default(),
            poll_mode: PollMode::default(),
            acquisition_rate: AcquisitionRate::default(),
            xy: false,
        }
    }
}
impl ScopeConfig {
    /// True when `other` would send the same values to the device. Channel
    /// enables, XY, poll mode and the datalog rate only affect the host side.
    pub fn same_device_settings(&self, other: &ScopeConfig) -> bool {
        self.trigger_source == other.trigger_source
            && self.trigger_polarity == other.trigger_polarity
            && self.trigger_level == other.trigger_level
            && self.noise_reject == other.noise_reject
            && self.resolution == other.resolution
            && self.timebase == other.timebase
            && self.channels[0].scale == other.channels[0].scale
            && self.channels[1].scale == other.channels[1].scale
    }
    pub fn both_channels(&self) -> bool {
        self.channels[0].enabled && self.channels[1].enabled
    }
    /// The most sensitive enabled channel's scale (ch1 if none are enabled).
    pub fn display_scale(&self) -> VerticalScale {
        let [ch1, ch2] = self.channels;
        match (ch1.enabled, ch2.enabled) {
            (true, true) if ch2.scale.voltage_max() < ch1.scale.voltage_max() => ch2.scale,
            (false, true) => ch2.scale,
            _ => ch1.scale,
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn defaults_match_front_panel_power_on() {
        let cfg = ScopeConfig::default();
        assert_eq!(cfg.trigger_source, TriggerSource::Auto);
        assert_eq!(cfg.resolution, Resolution::Low);
        assert_eq!(cfg.sample_mode, SampleMode::Datalog);
        assert!(cfg.both_channels());
    }
    #[test]
    fn display_fields_do_not_change_device_settings() {
        let base = ScopeConfig::default();
        let mut display = base;
        display.xy = true;
        display.poll_mode = PollMode::Fft;
        display.channels[0].enabled = false;
        display.acquisition_rate = AcquisitionRate::S1;
        assert!(base.same_device_settings(&display));
        let mut device = base;
        device.trigger_level = 300;
        assert!(!base.same_device_settings(&device));
        device = base;
        device.channels[1].scale = VerticalScale::Mv20;
        assert!(!base.same_device_settings(&device));
    }
    #[test]
    fn display_scale_picks_smallest_range() {
        let mut cfg = ScopeConfig::default();
        cfg.channels[1].scale = VerticalScale::Mv50;
        assert_eq!(cfg.display_scale(), VerticalScale::Mv50);
        cfg.channels[1].enabled = false;
        assert_eq!(cfg.display_scale(), VerticalScale::V1);
        cfg.channels[0].enabled = false;
        cfg.channels[1].enabled = true;
        assert_eq!(cfg.display_scale(), VerticalScale::Mv50);
    }
    #[test]
    fn config_deserializes_with_labels() {
        let cfg: ScopeConfig = serde_json::from_str(
            r#"{"timebase":"1 ms/div","channels":[{"scale":"20 mV/div"},{"enabled":false}]}"#,
        )
        .unwrap();
        assert_eq!(cfg.timebase, Timebase::Ms1);
        assert_eq!(cfg.channels[0].scale, VerticalScale::Mv20);
        assert!(cfg.channels[0].enabled);
        assert!(!cfg.channels[1].enabled);
        assert_eq!(cfg.trigger_level, DEFAULT_TRIGGER_LEVEL);
    }
}
