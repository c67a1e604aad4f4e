//! Request/acknowledge/reply exchange for every DPScope command.
//!
//! `Interface` owns the transport. Each method sends one command, checks the
//! acknowledgement echo(es), reads the fixed-length reply, and insists that no
//! stray bytes are left in the receive buffer afterwards.
use log::debug;
use crate::drivers::command::{self, Command, Param, Response};
use crate::drivers::transport::Transport;
use crate::drivers::ScopeError;
pub struct Interface<T: Transport> {
    transport: T,
}
impl<T: Transport> Interface<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
    #[cfg(test)]
    pub fn into_transport(self) -> T {
        self.transport
    }
    fn ack(&mut self, command: Command) -> Result<(), ScopeError> {
        let echoed = self.transport.read_exact(1)?[0];
        if echoed != command.code() {
            return Err(ScopeError::Comms(format!(
                "command sent was {}; DPScope responded with {echoed}. DPScope did not \
                 acknowledge with a copy of the original command; it may be a different \
                 device or malfunctioning",
                command.code()
            )));
        }
        Ok(())
    }
    fn ensure_drained(&mut self, command: Command) -> Result<(), ScopeError> {
        let pending = self.transport.bytes_pending()?;
        if pending != 0 {
            return Err(ScopeError::Comms(format!(
                "{pending} unexpected unread bytes after {} response",
                command.name()
            )));
        }
        Ok(())
    }
    /// Generic exchange driven by the command table.
    pub fn call(&mut self, command: Command, params: &[Param]) -> Result<Response, ScopeError> {
        let spec = command.spec();
        let frame = command::encode(command, params)?;
        debug!("{} {:?}", spec.name, params);
        self.transport.write_all(&frame)?;
        if spec.ack {
            self.ack(command)?;
        }
        let raw = self.transport.read_exact(spec.reply.len())?;
        let response = command::decode(command, &raw)?;
        if spec.postack {
            self.ack(command)?;
        }
        self.ensure_drained(command)?;
        Ok(response)
    }
    fn call_u8(&mut self, command: Command, value: u8) -> Result<(), ScopeError> {
        self.call(command, &[Param::U8(value)]).map(|_| ())
    }
    fn call_u8_u8(&mut self, command: Command, a: u8, b: u8) -> Result<(), ScopeError> {
        self.call(command, &[Param::U8(a), Param::U8(b)]).map(|_| ())
    }
    fn call_u16(&mut self, command: Command, value: u16) -> Result<(), ScopeError> {
        self.call(command, &[Param::U16(value)]).map(|_| ())
    }
    fn pair(response: Response, command: Command) -> Result<[u16; 2], ScopeError> {
        match response.values() {
            [a, b] => Ok([*a, *b]),
            other => Err(ScopeError::Decode(format!(
                "{} expected 2 values, got {other:?}",
                command.name()
            ))),
        }
    }
    // ---- no parameters ----
    /// Instantaneous 8-bit ADC reading of both channels.
    pub fn read_adc(&mut self) -> Result<[u8; 2], ScopeError> {
        let [a, b] = Self::pair(self.call(Command::ReadAdc, &[])?, Command::ReadAdc)?;
        Ok([a as u8, b as u8])
    }
    pub fn ping(&mut self) -> Result<String, ScopeError> {
        match self.call(Command::Ping, &[])? {
            Response::Text(text) => Ok(text),
            other => Err(ScopeError::Decode(format!("ping reply {other:?}"))),
        }
    }
    pub fn revision(&mut self) -> Result<(u8, u8), ScopeError> {
        let [major, minor] = Self::pair(self.call(Command::Revision, &[])?, Command::Revision)?;
        Ok((major as u8, minor as u8))
    }
    pub fn abort(&mut self) -> Result<(), ScopeError> {
        self.call(Command::Abort, &[]).map(|_| ())
    }
    #[allow(dead_code)]
    pub fn read_adc_10(&mut self) -> Result<[u16; 2], ScopeError> {
        Self::pair(self.call(Command::ReadAdc10, &[])?, Command::ReadAdc10)
    }
    pub fn measure_offset(&mut self) -> Result<[u16; 2], ScopeError> {
        Self::pair(
            self.call(Command::MeasureOffset, &[])?,
            Command::MeasureOffset,
        )
    }
    // ---- one byte ----
    pub fn trig_source(&mut self, source: u8) -> Result<(), ScopeError> {
        self.call_u8(Command::TrigSource, source)
    }
    pub fn trig_pol(&mut self, polarity: u8) -> Result<(), ScopeError> {
        self.call_u8(Command::TrigPol, polarity)
    }
    /// Requests `blocks` samples per channel of the acquisition record.
    ///
    /// Returns `Ok(None)` when the device does not send a status byte within the
    /// timeout (acquisition not finished). Otherwise returns the raw `1 + 2 * blocks`
    /// data bytes that follow the status byte.
    pub fn read_back(&mut self, blocks: u8) -> Result<Option<Vec<u8>>, ScopeError> {
        let frame = command::encode(Command::ReadBack, &[Param::U8(blocks)])?;
        self.transport.write_all(&frame)?;
        match self.transport.read_exact(1) {
            Ok(_status) => {}
            Err(e) if e.is_timeout() => {
                debug!("read_back: no data ready");
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
        let data = self.transport.read_exact(1 + 2 * blocks as usize)?;
        self.ensure_drained(Command::ReadBack)?;
        Ok(Some(data))
    }
    pub fn sample_rate(&mut self, code: u8) -> Result<(), ScopeError> {
        self.call_u8(Command::SampleRate, code)
    }
    pub fn noise_reject(&mut self, enabled: bool) -> Result<(), ScopeError> {
        self.call_u8(Command::NoiseReject, enabled as u8)
    }
    pub fn arm(&mut self, mode: u8) -> Result<(), ScopeError> {
        self.call_u8(Command::Arm, mode)
    }
    pub fn adcon_from(&mut self, code: u8) -> Result<(), ScopeError> {
        self.call_u8(Command::AdconFrom, code)
    }
    #[allow(dead_code)]
    pub fn cal_mode(&mut self, mode: u8) -> Result<(), ScopeError> {
        self.call_u8(Command::CalMode, mode)
    }
    #[allow(dead_code)]
    pub fn pretrigger_mode(&mut self, mode: u8) -> Result<(), ScopeError> {
        self.call_u8(Command::PretriggerMode, mode)
    }
    #[allow(dead_code)]
    pub fn timer_prescale(&mut self, prescale: u8) -> Result<(), ScopeError> {
        self.call_u8(Command::TimerPrescale, prescale)
    }
    #[allow(dead_code)]
    pub fn post_trig_cnt(&mut self, count: u8) -> Result<(), ScopeError> {
        self.call_u8(Command::PostTrigCount, count)
    }
    #[allow(dead_code)]
    pub fn serial_tx(&mut self, byte: u8) -> Result<(), ScopeError> {
        self.call_u8(Command::SerialTx, byte)
    }
    #[allow(dead_code)]
    pub fn status_led(&mut self, on: bool) -> Result<(), ScopeError> {
        self.call_u8(Command::StatusLed, on as u8)
    }
    // ---- two bytes ----
    pub fn trig_level(&mut self, level: u16) -> Result<(), ScopeError> {
        self.call_u16(Command::TrigLevel, level)
    }
    pub fn pre_gain(&mut self, channel: u8, code: u8) -> Result<(), ScopeError> {
        self.call_u8_u8(Command::PreGain, channel, code)
    }
    pub fn gain(&mut self, channel: u8, code: u8) -> Result<(), ScopeError> {
        self.call_u8_u8(Command::Gain, channel, code)
    }
    pub fn set_dac(&mut self, channel: u8, millivolts: u16) -> Result<(), ScopeError> {
        let (b1, b2) = command::set_dac_bytes(channel, millivolts);
        self.call_u8_u8(Command::SetDac, b1, b2)
    }
    pub fn arm_fft(&mut self, a: u8, b: u8) -> Result<(), ScopeError> {
        self.call_u8_u8(Command::ArmFft, a, b)
    }
    #[allow(dead_code)]
    pub fn set_delay(&mut self, delay: u16) -> Result<(), ScopeError> {
        self.call_u16(Command::SetDelay, delay)
    }
    #[allow(dead_code)]
    pub fn timer_period(&mut self, period: u16) -> Result<(), ScopeError> {
        self.call_u16(Command::TimerPeriod, period)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::transport::ScriptedTransport;
    #[test]
    fn acknowledged_command_with_reply() {
        let mut iface = Interface::new(ScriptedTransport::new(&[3, 0x80, 0x40]));
        assert_eq!(iface.read_adc().unwrap(), [0x80, 0x40]);
        assert_eq!(iface.into_transport().written, vec![3]);
    }
    #[test]
    fn postack_follows_reply() {
        let mut iface = Interface::new(ScriptedTransport::new(&[8, 0x02, 0x73, 0x02, 0x72, 8]));
        assert_eq!(iface.measure_offset().unwrap(), [0x0273, 0x0272]);
    }
    #[test]
    fn wrong_echo_is_rejected() {
        let mut iface = Interface::new(ScriptedTransport::new(&[99]));
        let err = iface.abort().unwrap_err();
        assert!(matches!(err, ScopeError::Comms(_)), "{err}");
    }
    #[test]
    fn stray_bytes_are_rejected() {
        let mut iface = Interface::new(ScriptedTransport::new(&[43, 0xff]));
        let err = iface.gain(0, 3).unwrap_err();
        assert!(err.to_string().contains("1 unexpected unread bytes"), "{err}");
    }
    #[test]
    fn ping_has_no_ack() {
        let mut iface = Interface::new(ScriptedTransport::new(b"DPScope"));
        assert_eq!(iface.ping().unwrap(), "DPScope");
    }
    #[test]
    fn silent_device_times_out() {
        let mut iface = Interface::new(ScriptedTransport::new(&[]));
        assert!(iface.ping().unwrap_err().is_timeout());
    }
    #[test]
    fn set_dac_sends_packed_bytes() {
        let mut iface = Interface::new(ScriptedTransport::new(&[44]));
        iface.set_dac(1, 3000).unwrap();
        assert_eq!(iface.into_transport().written, vec![44, 0x9B, 0xB8]);
    }
    #[test]
    fn read_back_returns_none_without_status() {
        let mut iface = Interface::new(ScriptedTransport::new(&[]));
        assert_eq!(iface.read_back(2).unwrap(), None);
        assert_eq!(iface.into_transport().written, vec![23, 2]);
    }
    #[test]
    fn read_back_returns_data_block() {
        let mut iface = Interface::new(ScriptedTransport::new(&[1, 0, 10, 20, 11, 21]));
        assert_eq!(iface.read_back(2).unwrap(), Some(vec![0, 10, 20, 11, 21]));
    }
    #[test]
    fn read_back_short_block_times_out() {
        let mut iface = Interface::new(ScriptedTransport::new(&[1, 0, 10]));
        assert!(iface.read_back(2).unwrap_err().is_timeout());
    }
}
