//! In-process DPScope stand-in that speaks the serial command protocol.
//!
//! Replies are produced synchronously as commands are written, so a read with
//! nothing queued behaves like a serial timeout without any waiting.
use std::collections::VecDeque;
use std::f64::consts::TAU;
use std::time::Duration;
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::drivers::command::Command;
use crate::drivers::settings::PollMode;
use crate::drivers::transport::Transport;
use crate::drivers::voltage::CALIBRATION_DAC_MV;
use crate::drivers::ScopeError;
/// `measure_offset` reading for the 3000 mV reference on a 4.9 V USB supply.
pub const SIM_REFERENCE_COUNTS: u16 = 627;
pub struct SimulatedScope {
    responsive: bool,
    inbox: Vec<u8>,
    outbox: VecDeque<u8>,
    rng: StdRng,
    phase: f64,
    armed: Option<PollMode>,
    polls_until_ready: u32,
    trigger_delay_polls: u32,
    truncated_readbacks: u32,
    late: Vec<u8>,
    dac_mv: [u16; 2],
    gain_codes: [u8; 2],
    pre_gain_codes: [u8; 2],
    received: Vec<Command>,
}
impl SimulatedScope {
    pub fn new(seed: u64) -> Self {
        Self {
            responsive: true,
            inbox: Vec::new(),
            outbox: VecDeque::new(),
            rng: StdRng::seed_from_u64(seed),
            phase: 0.0,
            armed: None,
            polls_until_ready: 0,
            trigger_delay_polls: 2,
            truncated_readbacks: 0,
            late: Vec::new(),
            dac_mv: [0; 2],
            gain_codes: [0; 2],
            pre_gain_codes: [0; 2],
            received: Vec::new(),
        }
    }
    /// A port with nothing attached: every write is swallowed.
    pub fn unresponsive() -> Self {
        Self {
            responsive: false,
            ..Self::new(0)
        }
    }
    /// Number of `read_back` polls answered with silence after arming.
    pub fn with_trigger_delay(mut self, polls: u32) -> Self {
        self.trigger_delay_polls = polls;
        self
    }
    /// The first `count` readback blocks arrive cut in half; the missing tail
    /// shows up with the next command.
    pub fn with_truncated_readbacks(mut self, count: u32) -> Self {
        self.truncated_readbacks = count;
        self
    }
    pub fn received(&self) -> &[Command] {
        &self.received
    }
    pub fn gain_codes(&self) -> [u8; 2] {
        self.gain_codes
    }
    pub fn pre_gain_codes(&self) -> [u8; 2] {
        self.pre_gain_codes
    }
    fn signal(&mut self, channel: usize) -> u8 {
        let noise: f64 = self.rng.gen_range(-2.0..2.0);
        let v = match channel {
            0 => 128.0 + 90.0 * (self.phase * TAU).sin(),
            _ => {
                if (self.phase * 3.0).fract() < 0.5 {
                    60.0
                } else {
                    190.0
                }
            }
        };
        (v + noise).clamp(0.0, 255.0) as u8
    }
    fn advance(&mut self, step: f64) {
        self.phase = (self.phase + step).fract();
    }
    fn readback_block(&mut self, mode: PollMode, samples: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(1 + 2 * samples);
        data.push(0);
        match mode {
            PollMode::Time => {
                for _ in 0..samples {
                    let a = self.signal(0);
                    let b = self.signal(1);
                    data.push(a);
                    data.push(b);
                    self.advance(1.0 / 50.0);
                }
            }
            PollMode::Fft => {
                for (peak, width) in [(20.0, 3.0), (60.0, 6.0)] {
                    for k in 0..samples {
                        let d = k as f64 - peak;
                        let floor: f64 = self.rng.gen_range(0.0..4.0);
                        data.push((220.0 * (-(d * d) / (2.0 * width * width)).exp() + floor) as u8);
                    }
                }
            }
        }
        data
    }
    fn handle(&mut self, command: Command, params: &[u8]) {
        let spec = command.spec();
        self.received.push(command);
        if spec.ack {
            self.outbox.push_back(spec.code);
        }
        match command {
            Command::ReadAdc => {
                let pair = [self.signal(0), self.signal(1)];
                self.advance(1.0 / 100.0);
                self.outbox.extend(pair);
            }
            Command::Ping => self.outbox.extend(*b"DPScope"),
            Command::Revision => self.outbox.extend([2, 1]),
            Command::ReadAdc10 => {
                for ch in 0..2 {
                    let v = self.signal(ch) as u16 * 4;
                    self.outbox.extend(v.to_be_bytes());
                }
            }
            Command::MeasureOffset => {
                for ch in 0..2 {
                    let counts = if self.dac_mv[ch] == CALIBRATION_DAC_MV {
                        SIM_REFERENCE_COUNTS
                    } else {
                        0
                    };
                    self.outbox.extend(counts.to_be_bytes());
                }
            }
            Command::ReadBack => {
                let samples = params[0] as usize;
                match self.armed {
                    Some(mode) if self.polls_until_ready == 0 => {
                        self.outbox.push_back(1);
                        let mut block = self.readback_block(mode, samples);
                        if self.truncated_readbacks > 0 {
                            self.truncated_readbacks -= 1;
                            self.late = block.split_off(block.len() / 2);
                        }
                        self.outbox.extend(block);
                    }
                    Some(_) => self.polls_until_ready = self.polls_until_ready.saturating_sub(1),
                    None => debug!("sim: read_back while not armed"),
                }
            }
            Command::Arm => self.arm(PollMode::Time),
            Command::ArmFft => self.arm(PollMode::Fft),
            Command::Abort => self.armed = None,
            Command::SetDac => {
                let channel = (params[0] >> 7) as usize;
                self.dac_mv[channel] = (((params[0] & 0x0f) as u16) << 8) | params[1] as u16;
            }
            Command::Gain => self.gain_codes[params[0] as usize % 2] = params[1],
            Command::PreGain => self.pre_gain_codes[params[0] as usize % 2] = params[1],
            _ => {}
        }
        if spec.postack {
            self.outbox.push_back(spec.code);
        }
    }
    fn arm(&mut self, mode: PollMode) {
        self.armed = Some(mode);
        self.polls_until_ready = self.trigger_delay_polls;
    }
    fn process_inbox(&mut self) {
        while let Some(&code) = self.inbox.first() {
            let Some(command) = Command::from_code(code) else {
                warn!("sim: ignoring unknown command byte {code}");
                self.inbox.remove(0);
                continue;
            };
            let needed = 1 + command.spec().params_len();
            if self.inbox.len() < needed {
                break;
            }
            let frame: Vec<u8> = self.inbox.drain(..needed).collect();
            self.handle(command, &frame[1..]);
        }
    }
}
impl Transport for SimulatedScope {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ScopeError> {
        if self.responsive {
            self.outbox.extend(self.late.drain(..));
            self.inbox.extend_from_slice(bytes);
            self.process_inbox();
        }
        Ok(())
    }
    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, ScopeError> {
        if self.outbox.len() < n {
            self.outbox.clear();
            return Err(ScopeError::Timeout(format!("read of {n} bytes")));
        }
        Ok(self.outbox.drain(..n).collect())
    }
    fn bytes_pending(&mut self) -> Result<usize, ScopeError> {
        Ok(self.outbox.len())
    }
    fn clear_input(&mut self) -> Result<(), ScopeError> {
        self.outbox.clear();
        Ok(())
    }
    fn set_timeout(&mut self, _timeout: Duration) -> Result<(), ScopeError> {
        Ok(())
    }
    fn description(&self) -> String {
        "simulated DPScope".into()
    }
}
