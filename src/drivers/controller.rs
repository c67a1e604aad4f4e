use std::time::{Duration, Instant};
use log::{info, warn};
use crate::drivers::capture::{decode_readback, CaptureBuffer, MAX_READBACK_SAMPLES};
use crate::drivers::interface::Interface;
use crate::drivers::settings::{PollMode, ScopeConfig};
use crate::drivers::transport::Transport;
use crate::drivers::voltage;
use crate::drivers::ScopeError;
/// Where the controller is in an acquisition cycle.
#[derive(Clone, Debug, PartialEq)]
pub enum AcquisitionState {
    Idle,
    Configuring,
    Armed,
    Capturing,
    /// Last operation failed; the message is the error it returned.
    Failed(String),
}
#[derive(Clone, Copy, Debug)]
pub struct ControllerOptions {
    /// How long to wait for a trigger after arming.
    pub arm_timeout: Duration,
    /// Samples per channel requested from the readback.
    pub readback_samples: u8,
}
impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            arm_timeout: Duration::from_secs(3),
            readback_samples: MAX_READBACK_SAMPLES,
        }
    }
}
/// High level DPScope control: settings, captures and datalog reads, with
/// results scaled to volts.
pub struct ScopeController<T: Transport> {
    iface: Interface<T>,
    options: ControllerOptions,
    config: ScopeConfig,
    applied: Option<ScopeConfig>,
    usb_voltage: Option<f64>,
    state: AcquisitionState,
    identity: String,
}
impl<T: Transport> ScopeController<T> {
    /// Checks that a DPScope answers on `transport`.
    ///
    /// A silent or foreign device is reported as `ScopeError::Connection`.
    pub fn connect(
        mut transport: T,
        options: ControllerOptions,
        config: ScopeConfig,
    ) -> Result<Self, ScopeError> {
        let port = transport.description();
        transport.clear_input()?;
        let mut iface = Interface::new(transport);
        let not_acknowledged = |e: ScopeError| ScopeError::Connection {
            port: port.clone(),
            reason: format!("device did not acknowledge ({e})"),
        };
        let identity = iface.ping().map_err(not_acknowledged)?;
        let (major, minor) = iface.revision().map_err(not_acknowledged)?;
        info!("Connected to '{identity}' firmware {major}.{minor} on {port}");
        Ok(Self {
            iface,
            options,
            config,
            applied: None,
            usb_voltage: None,
            state: AcquisitionState::Idle,
            identity,
        })
    }
    pub fn identity(&self) -> &str {
        &self.identity
    }
    pub fn state(&self) -> &AcquisitionState {
        &self.state
    }
    #[cfg(test)]
    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }
    pub fn set_config(&mut self, config: ScopeConfig) {
        self.config = config;
    }
    #[cfg(test)]
    pub fn into_transport(self) -> T {
        self.iface.into_transport()
    }
    #[cfg(test)]
    pub fn transport(&self) -> &T {
        self.iface.transport()
    }
    #[cfg(test)]
    pub fn transport_mut(&mut self) -> &mut T {
        self.iface.transport_mut()
    }
    /// Drops bytes a failed exchange may have left behind.
    fn settle_after_failure(&mut self) -> Result<(), ScopeError> {
        if matches!(self.state, AcquisitionState::Failed(_)) {
            self.iface.transport_mut().clear_input()?;
        }
        Ok(())
    }
    /// Best-effort return to a disarmed, drained device.
    fn disarm(&mut self) {
        if let Err(e) = self.iface.transport_mut().clear_input() {
            warn!("clearing input before abort failed: {e}");
        }
        if let Err(e) = self.iface.abort() {
            warn!("abort after failed acquisition failed: {e}");
        }
        if let Err(e) = self.iface.transport_mut().clear_input() {
            warn!("clearing input after abort failed: {e}");
        }
    }
    fn track<R>(&mut self, result: Result<R, ScopeError>) -> Result<R, ScopeError> {
        self.state = match &result {
            Ok(_) => AcquisitionState::Idle,
            Err(e) => AcquisitionState::Failed(e.to_string()),
        };
        result
    }
    /// Sends every setting to the device.
    pub fn configure(&mut self) -> Result<(), ScopeError> {
        let result = self.settle_after_failure().and_then(|_| self.send_settings());
        self.track(result)
    }
    fn send_settings(&mut self) -> Result<(), ScopeError> {
        self.state = AcquisitionState::Configuring;
        let cfg = self.config;
        self.iface.trig_source(cfg.trigger_source.code())?;
        self.iface.trig_pol(cfg.trigger_polarity.code())?;
        self.iface.trig_level(cfg.trigger_level)?;
        self.iface.noise_reject(cfg.noise_reject)?;
        self.iface.adcon_from(cfg.resolution.code())?;
        self.iface.sample_rate(cfg.timebase.sample_rate_code())?;
        for (ch, channel) in cfg.channels.iter().enumerate() {
            let (pre_code, gain_code) = channel.scale.codes()?;
            self.iface.pre_gain(ch as u8, pre_code)?;
            self.iface.gain(ch as u8, gain_code)?;
        }
        if self.applied.map(|a| a.trigger_source) != Some(cfg.trigger_source) {
            info!("Trigger source set to '{}'", cfg.trigger_source.label());
        }
        if self.applied.map(|a| a.resolution) != Some(cfg.resolution) {
            info!("ADC resolution set to {:?}", cfg.resolution);
        }
        self.applied = Some(cfg);
        Ok(())
    }
    /// USB supply voltage, measured once per connection.
    pub fn usb_voltage(&mut self) -> Result<f64, ScopeError> {
        if let Some(v) = self.usb_voltage {
            return Ok(v);
        }
        let v = voltage::calibrate_usb(&mut self.iface, self.config.resolution)?;
        self.usb_voltage = Some(v);
        Ok(v)
    }
    /// One complete capture: configure, arm, wait for data, read back, decode.
    pub fn acquire(&mut self) -> Result<CaptureBuffer, ScopeError> {
        let result = self.settle_after_failure().and_then(|_| self.run_acquisition());
        self.track(result)
    }
    fn run_acquisition(&mut self) -> Result<CaptureBuffer, ScopeError> {
        let usb = self.usb_voltage()?;
        self.send_settings()?;
        let cfg = self.config;
        let samples = self.options.readback_samples;
        let data = match self.arm_and_read_back(cfg.poll_mode, samples) {
            Ok(data) => data,
            Err(e) => {
                self.disarm();
                return Err(e);
            }
        };
        let mut capture = decode_readback(cfg.poll_mode, &data, samples)?;
        capture.seconds_per_div = cfg.timebase.seconds_per_div();
        for ch in 0..2 {
            let scale = cfg.channels[ch].scale;
            capture.volts_per_div[ch] = scale.volts_per_div();
            capture.volts_per_code[ch] = voltage::volts_per_code(usb, cfg.resolution, scale);
        }
        Ok(capture)
    }
    /// Arms, polls until the block is ready, then aborts. Any error leaves the
    /// device possibly armed; the caller disarms it.
    fn arm_and_read_back(&mut self, mode: PollMode, samples: u8) -> Result<Vec<u8>, ScopeError> {
        self.state = AcquisitionState::Armed;
        match mode {
            PollMode::Time => self.iface.arm(0)?,
            PollMode::Fft => self.iface.arm_fft(0, 0)?,
        }
        let deadline = Instant::now() + self.options.arm_timeout;
        let data = loop {
            if let Some(data) = self.iface.read_back(samples)? {
                break data;
            }
            if Instant::now() >= deadline {
                return Err(ScopeError::Timeout(format!(
                    "no trigger within {} ms",
                    self.options.arm_timeout.as_millis()
                )));
            }
        };
        self.state = AcquisitionState::Capturing;
        self.iface.abort()?;
        Ok(data)
    }
    /// Single datalog read of both channels in volts.
    ///
    /// Settings are only re-sent when they changed since the last read.
    pub fn read_voltages(&mut self) -> Result<[f64; 2], ScopeError> {
        let result = self.settle_after_failure().and_then(|_| self.datalog_read());
        self.track(result)
    }
    fn datalog_read(&mut self) -> Result<[f64; 2], ScopeError> {
        let usb = self.usb_voltage()?;
        let stale = match &self.applied {
            Some(applied) => !applied.same_device_settings(&self.config),
            None => true,
        };
        if stale {
            self.send_settings()?;
        }
        let adc = self.iface.read_adc()?;
        let scales = [self.config.channels[0].scale, self.config.channels[1].scale];
        Ok(voltage::datalog_volts(adc, usb, self.config.resolution, scales))
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::command::Command;
    use crate::drivers::gain::VerticalScale;
    use crate::drivers::rate::AcquisitionRate;
    use crate::drivers::settings::Timebase;
    use crate::drivers::sim::SimulatedScope;
    fn controller(sim: SimulatedScope) -> ScopeController<SimulatedScope> {
        ScopeController::connect(sim, ControllerOptions::default(), ScopeConfig::default()).unwrap()
    }
    #[test]
    fn silent_device_is_a_connection_error() {
        let started = Instant::now();
        let err = ScopeController::connect(
            SimulatedScope::unresponsive(),
            ControllerOptions::default(),
            ScopeConfig::default(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ScopeError::Connection { .. }), "{err}");
        assert!(err.to_string().contains("did not acknowledge"));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
    #[test]
    fn capture_has_readback_length_and_scales() {
        let mut scope = controller(SimulatedScope::new(7));
        let mut cfg = ScopeConfig::default();
        cfg.timebase = Timebase::Ms1;
        cfg.channels[1].scale = VerticalScale::Mv50;
        scope.set_config(cfg);
        let capture = scope.acquire().unwrap();
        assert_eq!(*scope.state(), AcquisitionState::Idle);
        assert_eq!(capture.samples_per_channel(), MAX_READBACK_SAMPLES as usize);
        assert_eq!(capture.mode, PollMode::Time);
        assert_eq!(capture.seconds_per_div, 1e-3);
        assert_eq!(capture.volts_per_div, [1.0, 0.05]);
        assert!(capture.volts_per_code[1] > capture.volts_per_code[0]);
    }
    #[test]
    fn acquisition_sends_settings_then_arms_then_aborts() {
        let mut scope = controller(SimulatedScope::new(8));
        scope.acquire().unwrap();
        let sent = scope.into_transport().received().to_vec();
        let pos = |c: Command| sent.iter().position(|s| *s == c).unwrap();
        assert!(pos(Command::MeasureOffset) < pos(Command::TrigSource));
        assert!(pos(Command::Gain) < pos(Command::Arm));
        assert!(pos(Command::Arm) < pos(Command::ReadBack));
        assert_eq!(sent.last(), Some(&Command::Abort));
    }
    #[test]
    fn gains_reach_the_device() {
        let mut scope = controller(SimulatedScope::new(9));
        let mut cfg = ScopeConfig::default();
        cfg.channels[0].scale = VerticalScale::Mv10;
        scope.set_config(cfg);
        scope.configure().unwrap();
        let sim = scope.transport_mut();
        assert_eq!(sim.pre_gain_codes(), [1, 0]);
        assert_eq!(sim.gain_codes(), [7, 2]);
    }
    #[test]
    fn fft_capture_uses_fft_arm() {
        let mut scope = controller(SimulatedScope::new(10));
        let mut cfg = ScopeConfig::default();
        cfg.poll_mode = PollMode::Fft;
        scope.set_config(cfg);
        let capture = scope.acquire().unwrap();
        assert_eq!(capture.mode, PollMode::Fft);
        assert_eq!(capture.samples_per_channel(), MAX_READBACK_SAMPLES as usize);
        assert!(scope.into_transport().received().contains(&Command::ArmFft));
    }
    #[test]
    fn missing_trigger_times_out_into_failed_state() {
        let options = ControllerOptions {
            arm_timeout: Duration::from_millis(20),
            ..ControllerOptions::default()
        };
        let sim = SimulatedScope::new(11).with_trigger_delay(u32::MAX);
        let mut scope = ScopeController::connect(sim, options, ScopeConfig::default()).unwrap();
        let err = scope.acquire().unwrap_err();
        assert!(err.is_timeout(), "{err}");
        assert!(matches!(scope.state(), AcquisitionState::Failed(_)));
        assert_eq!(scope.into_transport().received().last(), Some(&Command::Abort));
    }
    #[test]
    fn datalog_reads_calibrate_once_and_configure_on_change() {
        let mut scope = controller(SimulatedScope::new(12));
        let [a, b] = scope.read_voltages().unwrap();
        assert!(a >= 0.0 && b >= 0.0);
        scope.read_voltages().unwrap();
        let usb = scope.usb_voltage().unwrap();
        assert!((usb - 4.899521531100478).abs() < 1e-9);
        let count = |s: &ScopeController<SimulatedScope>, c: Command| {
            s.transport().received().iter().filter(|r| **r == c).count()
        };
        assert_eq!(count(&scope, Command::MeasureOffset), 1);
        assert_eq!(count(&scope, Command::TrigSource), 1);
        let mut cfg = *scope.config();
        cfg.xy = true;
        cfg.channels[1].enabled = false;
        cfg.acquisition_rate = AcquisitionRate::S1;
        scope.set_config(cfg);
        scope.read_voltages().unwrap();
        assert_eq!(count(&scope, Command::TrigSource), 1, "display-only change");
        cfg.channels[0].scale = VerticalScale::Mv200;
        scope.set_config(cfg);
        scope.read_voltages().unwrap();
        assert_eq!(count(&scope, Command::TrigSource), 2);
        assert_eq!(count(&scope, Command::ReadAdc), 4);
    }
    #[test]
    fn acquisition_recovers_after_failed_readback() {
        let sim = SimulatedScope::new(13).with_truncated_readbacks(1);
        let mut scope = controller(sim);
        let err = scope.acquire().unwrap_err();
        assert!(err.is_timeout(), "{err}");
        assert!(matches!(scope.state(), AcquisitionState::Failed(_)));
        let sent = scope.transport().received();
        assert_eq!(sent.last(), Some(&Command::Abort), "device left armed");
        let capture = scope.acquire().unwrap();
        assert_eq!(capture.samples_per_channel(), MAX_READBACK_SAMPLES as usize);
        assert_eq!(*scope.state(), AcquisitionState::Idle);
    }
}
