use serde::{Deserialize, Serialize};
use crate::drivers::ScopeError;
/// Hardware code / amplification factor pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GainCode {
    pub code: u8,
    pub factor: u32,
}
/// Lookup table between gain codes and factors for one amplifier stage.
pub struct GainTable {
    name: &'static str,
    entries: &'static [GainCode],
}
pub const GAIN: GainTable = GainTable {
    name: "gain",
    entries: &[
        GainCode { code: 0, factor: 1 },
        GainCode { code: 1, factor: 2 },
        GainCode { code: 2, factor: 4 },
        GainCode { code: 3, factor: 5 },
        GainCode { code: 4, factor: 8 },
        GainCode { code: 5, factor: 10 },
        GainCode { code: 6, factor: 16 },
        GainCode { code: 7, factor: 32 },
    ],
};
pub const PRE_GAIN: GainTable = GainTable {
    name: "pre-gain",
    entries: &[
        GainCode { code: 0, factor: 1 },
        GainCode { code: 1, factor: 10 },
    ],
};
impl GainTable {
    pub fn code_for(&self, factor: u32) -> Result<u8, ScopeError> {
        self.entries
            .iter()
            .find(|g| g.factor == factor)
            .map(|g| g.code)
            .ok_or_else(|| {
                ScopeError::InvalidSetting(format!(
                    "invalid {} value {factor}; possible values are {:?}",
                    self.name,
                    self.entries.iter().map(|g| g.factor).collect::<Vec<_>>()
                ))
            })
    }
    pub fn factor_for(&self, code: u8) -> Result<u32, ScopeError> {
        self.entries
            .iter()
            .find(|g| g.code == code)
            .map(|g| g.factor)
            .ok_or_else(|| {
                ScopeError::InvalidSetting(format!(
                    "invalid {} code {code}; possible codes are {:?}",
                    self.name,
                    self.entries.iter().map(|g| g.code).collect::<Vec<_>>()
                ))
            })
    }
}
/// Front-panel volts/div choice, realised as a pre-gain and gain combination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerticalScale {
    #[default]
    #[serde(rename = "1 V/div")]
    V1,
    #[serde(rename = "0.5 V/div")]
    Mv500,
    #[serde(rename = "0.2 V/div")]
    Mv200,
    #[serde(rename = "0.1 V/div")]
    Mv100,
    #[serde(rename = "50 mV/div")]
    Mv50,
    #[serde(rename = "20 mV/div")]
    Mv20,
    #[serde(rename = "10 mV/div")]
    Mv10,
}
/// Nominal USB supply used for the display range.
const NOMINAL_VCC: f64 = 5.0;
/// Input divider at the probe entry point.
const INPUT_DIVIDER: f64 = 4.0;
impl VerticalScale {
    pub const ALL: [VerticalScale; 7] = [
        VerticalScale::V1,
        VerticalScale::Mv500,
        VerticalScale::Mv200,
        VerticalScale::Mv100,
        VerticalScale::Mv50,
        VerticalScale::Mv20,
        VerticalScale::Mv10,
    ];
    pub fn label(self) -> &'static str {
        match self {
            VerticalScale::V1 => "1 V/div",
            VerticalScale::Mv500 => "0.5 V/div",
            VerticalScale::Mv200 => "0.2 V/div",
            VerticalScale::Mv100 => "0.1 V/div",
            VerticalScale::Mv50 => "50 mV/div",
            VerticalScale::Mv20 => "20 mV/div",
            VerticalScale::Mv10 => "10 mV/div",
        }
    }
    pub fn millivolts_per_div(self) -> f64 {
        match self {
            VerticalScale::V1 => 1000.0,
            VerticalScale::Mv500 => 500.0,
            VerticalScale::Mv200 => 200.0,
            VerticalScale::Mv100 => 100.0,
            VerticalScale::Mv50 => 50.0,
            VerticalScale::Mv20 => 20.0,
            VerticalScale::Mv10 => 10.0,
        }
    }
    pub fn volts_per_div(self) -> f64 {
        self.millivolts_per_div() / 1000.0
    }
    /// (pre-gain factor, gain factor).
    pub fn factors(self) -> (u32, u32) {
        match self {
            VerticalScale::V1 => (1, 4),
            VerticalScale::Mv500 => (1, 8),
            VerticalScale::Mv200 => (10, 2),
            VerticalScale::Mv100 => (10, 4),
            VerticalScale::Mv50 => (10, 8),
            VerticalScale::Mv20 => (10, 16),
            VerticalScale::Mv10 => (10, 32),
        }
    }
    pub fn cumulative_gain(self) -> u32 {
        let (pre, gain) = self.factors();
        pre * gain
    }
    /// (pre-gain code, gain code) to send to the device.
    pub fn codes(self) -> Result<(u8, u8), ScopeError> {
        let (pre, gain) = self.factors();
        Ok((PRE_GAIN.code_for(pre)?, GAIN.code_for(gain)?))
    }
    /// Largest input voltage representable at this setting.
    pub fn voltage_max(self) -> f64 {
        NOMINAL_VCC * INPUT_DIVIDER / self.cumulative_gain() as f64
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn gain_tables_convert_both_ways() {
        assert_eq!(GAIN.code_for(5).unwrap(), 3);
        assert_eq!(GAIN.factor_for(7).unwrap(), 32);
        assert_eq!(PRE_GAIN.code_for(10).unwrap(), 1);
        assert!(matches!(GAIN.code_for(3), Err(ScopeError::InvalidSetting(_))));
        assert!(PRE_GAIN.factor_for(2).is_err());
    }
    #[test]
    fn every_scale_maps_to_valid_codes() {
        for scale in VerticalScale::ALL {
            let (pre, gain) = scale.codes().unwrap();
            assert_eq!(
                PRE_GAIN.factor_for(pre).unwrap() * GAIN.factor_for(gain).unwrap(),
                scale.cumulative_gain()
            );
        }
        assert_eq!(VerticalScale::Mv50.codes().unwrap(), (1, 4));
    }
    #[test]
    fn voltage_max_follows_cumulative_gain() {
        assert!((VerticalScale::V1.voltage_max() - 5.0).abs() < 1e-12);
        assert!((VerticalScale::Mv10.voltage_max() - 0.0625).abs() < 1e-12);
    }
    #[test]
    fn default_scale_is_one_volt_per_div() {
        assert_eq!(VerticalScale::default(), VerticalScale::V1);
        assert_eq!(VerticalScale::default().codes().unwrap(), (0, 2));
    }
}
