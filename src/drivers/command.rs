//! DPScope command table and the byte layout of each command.
//!
//! Every request is one command byte followed by big-endian packed parameters.
//! Most commands are acknowledged by the device echoing the command byte; a
//! few echo it a second time after their reply ("post-ack").
use crate::drivers::ScopeError;
/// Packed field in a parameter list or reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    U8,
    U16,
}
impl Field {
    pub const fn size(self) -> usize {
        match self {
            Field::U8 => 1,
            Field::U16 => 2,
        }
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyLayout {
    Fields(&'static [Field]),
    /// Fixed-length ASCII text.
    Text(usize),
}
impl ReplyLayout {
    pub fn len(&self) -> usize {
        match self {
            ReplyLayout::Fields(fields) => fields.iter().map(|f| f.size()).sum(),
            ReplyLayout::Text(n) => *n,
        }
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub code: u8,
    pub name: &'static str,
    pub ack: bool,
    pub postack: bool,
    pub params: &'static [Field],
    pub reply: ReplyLayout,
}
impl CommandSpec {
    pub fn params_len(&self) -> usize {
        self.params.iter().map(|f| f.size()).sum()
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    ReadAdc,
    Ping,
    Revision,
    Abort,
    ReadAdc10,
    MeasureOffset,
    TrigSource,
    TrigPol,
    ReadBack,
    SampleRate,
    NoiseReject,
    Arm,
    AdconFrom,
    CalMode,
    PretriggerMode,
    TimerPrescale,
    PostTrigCount,
    SerialTx,
    StatusLed,
    TrigLevel,
    PreGain,
    Gain,
    SetDac,
    ArmFft,
    SetDelay,
    TimerPeriod,
}
const NONE: &[Field] = &[];
const BYTE: &[Field] = &[Field::U8];
const TWO_BYTES: &[Field] = &[Field::U8, Field::U8];
const WORD: &[Field] = &[Field::U16];
const TWO_WORDS: &[Field] = &[Field::U16, Field::U16];
const fn spec(
    code: u8,
    name: &'static str,
    ack: bool,
    postack: bool,
    params: &'static [Field],
    reply: ReplyLayout,
) -> CommandSpec {
    CommandSpec {
        code,
        name,
        ack,
        postack,
        params,
        reply,
    }
}
const NO_REPLY: ReplyLayout = ReplyLayout::Fields(NONE);
impl Command {
    pub const ALL: [Command; 26] = [
        Command::ReadAdc,
        Command::Ping,
        Command::Revision,
        Command::Abort,
        Command::ReadAdc10,
        Command::MeasureOffset,
        Command::TrigSource,
        Command::TrigPol,
        Command::ReadBack,
        Command::SampleRate,
        Command::NoiseReject,
        Command::Arm,
        Command::AdconFrom,
        Command::CalMode,
        Command::PretriggerMode,
        Command::TimerPrescale,
        Command::PostTrigCount,
        Command::SerialTx,
        Command::StatusLed,
        Command::TrigLevel,
        Command::PreGain,
        Command::Gain,
        Command::SetDac,
        Command::ArmFft,
        Command::SetDelay,
        Command::TimerPeriod,
    ];
    pub fn spec(self) -> CommandSpec {
        use Command::*;
        match self {
            ReadAdc => spec(3, "read_adc", true, false, NONE, ReplyLayout::Fields(TWO_BYTES)),
            Ping => spec(4, "ping", false, false, NONE, ReplyLayout::Text(7)),
            // firmware revision 2.1 or later is assumed
            Revision => spec(5, "revision", false, false, NONE, ReplyLayout::Fields(TWO_BYTES)),
            Abort => spec(6, "abort", true, false, NONE, NO_REPLY),
            ReadAdc10 => spec(7, "read_adc_10", true, true, NONE, ReplyLayout::Fields(TWO_WORDS)),
            MeasureOffset => {
                spec(8, "measure_offset", true, true, NONE, ReplyLayout::Fields(TWO_WORDS))
            }
            TrigSource => spec(21, "trig_source", true, false, BYTE, NO_REPLY),
            TrigPol => spec(22, "trig_pol", true, false, BYTE, NO_REPLY),
            // reply length depends on the requested block; see `Interface::read_back`
            ReadBack => spec(23, "read_back", false, false, BYTE, NO_REPLY),
            SampleRate => spec(24, "sample_rate", true, false, BYTE, NO_REPLY),
            NoiseReject => spec(25, "noise_reject", true, false, BYTE, NO_REPLY),
            Arm => spec(26, "arm", true, false, BYTE, NO_REPLY),
            AdconFrom => spec(27, "adcon_from", true, false, BYTE, NO_REPLY),
            CalMode => spec(28, "cal_mode", true, false, BYTE, NO_REPLY),
            PretriggerMode => spec(29, "pretrigger_mode", true, false, BYTE, NO_REPLY),
            TimerPrescale => spec(30, "timer_prescale", true, false, BYTE, NO_REPLY),
            PostTrigCount => spec(31, "post_trig_cnt", true, false, BYTE, NO_REPLY),
            SerialTx => spec(32, "serial_tx", true, false, BYTE, NO_REPLY),
            StatusLed => spec(33, "status_led", true, false, BYTE, NO_REPLY),
            TrigLevel => spec(41, "trig_level", true, false, WORD, NO_REPLY),
            PreGain => spec(42, "pre_gain", true, false, TWO_BYTES, NO_REPLY),
            Gain => spec(43, "gain", true, false, TWO_BYTES, NO_REPLY),
            SetDac => spec(44, "set_dac", true, false, TWO_BYTES, NO_REPLY),
            ArmFft => spec(45, "arm_fft", true, false, TWO_BYTES, NO_REPLY),
            SetDelay => spec(49, "set_delay", true, false, WORD, NO_REPLY),
            TimerPeriod => spec(51, "timer_period", true, false, WORD, NO_REPLY),
        }
    }
    pub fn code(self) -> u8 {
        self.spec().code
    }
    pub fn name(self) -> &'static str {
        self.spec().name
    }
    pub fn from_code(code: u8) -> Option<Command> {
        Command::ALL.iter().copied().find(|c| c.code() == code)
    }
}
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Param {
    U8(u8),
    U16(u16),
}
impl Param {
    fn field(self) -> Field {
        match self {
            Param::U8(_) => Field::U8,
            Param::U16(_) => Field::U16,
        }
    }
}
/// Decoded device reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    Empty,
    Values(Vec<u16>),
    Text(String),
}
impl Response {
    pub fn values(&self) -> &[u16] {
        match self {
            Response::Values(v) => v,
            _ => &[],
        }
    }
}
/// Packs `command` and its parameters into the request frame.
pub fn encode(command: Command, params: &[Param]) -> Result<Vec<u8>, ScopeError> {
    let spec = command.spec();
    if params.len() != spec.params.len() {
        return Err(ScopeError::Command {
            command: spec.name,
            reason: format!(
                "requires {} parameters, {} provided",
                spec.params.len(),
                params.len()
            ),
        });
    }
    let mut frame = Vec::with_capacity(1 + spec.params_len());
    frame.push(spec.code);
    for (idx, (param, field)) in params.iter().zip(spec.params).enumerate() {
        if param.field() != *field {
            return Err(ScopeError::Command {
                command: spec.name,
                reason: format!("parameter {idx} must be {field:?}, got {param:?}"),
            });
        }
        match *param {
            Param::U8(v) => frame.push(v),
            Param::U16(v) => frame.extend_from_slice(&v.to_be_bytes()),
        }
    }
    Ok(frame)
}
/// Unpacks a reply. `bytes` must be exactly the documented reply length.
pub fn decode(command: Command, bytes: &[u8]) -> Result<Response, ScopeError> {
    let spec = command.spec();
    let expected = spec.reply.len();
    if bytes.len() != expected {
        return Err(ScopeError::Decode(format!(
            "{} reply must be {expected} bytes, got {}",
            spec.name,
            bytes.len()
        )));
    }
    match spec.reply {
        ReplyLayout::Fields([]) => Ok(Response::Empty),
        ReplyLayout::Fields(fields) => {
            let mut values = Vec::with_capacity(fields.len());
            let mut offset = 0;
            for field in fields {
                let value = match field {
                    Field::U8 => bytes[offset] as u16,
                    Field::U16 => u16::from_be_bytes([bytes[offset], bytes[offset + 1]]),
                };
                offset += field.size();
                values.push(value);
            }
            Ok(Response::Values(values))
        }
        ReplyLayout::Text(_) => Ok(Response::Text(
            String::from_utf8_lossy(bytes).trim_end_matches('\0').to_string(),
        )),
    }
}
/// Parameter bytes for `set_dac`: channel select in bit 7, nibble marker 0x10,
/// then the 12-bit millivolt value split across both bytes.
pub fn set_dac_bytes(channel: u8, millivolts: u16) -> (u8, u8) {
    let ch = 0x80u16 * (channel as u16 % 2);
    let b1 = (ch + 0x10 + (millivolts >> 8)) as u8;
    let b2 = (millivolts & 0xff) as u8;
    (b1, b2)
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn codes_are_unique_and_round_trip() {
        for cmd in Command::ALL {
            assert_eq!(Command::from_code(cmd.code()), Some(cmd), "{}", cmd.name());
        }
        assert_eq!(Command::from_code(0), None);
    }
    #[test]
    fn encodes_big_endian_words() {
        let frame = encode(Command::TrigLevel, &[Param::U16(0x0203)]).unwrap();
        assert_eq!(frame, vec![41, 0x02, 0x03]);
        let frame = encode(Command::Gain, &[Param::U8(1), Param::U8(7)]).unwrap();
        assert_eq!(frame, vec![43, 1, 7]);
        assert_eq!(encode(Command::Abort, &[]).unwrap(), vec![6]);
    }
    #[test]
    fn rejects_wrong_parameters() {
        let err = encode(Command::Gain, &[Param::U8(1)]).unwrap_err();
        assert!(matches!(err, ScopeError::Command { command: "gain", .. }));
        let err = encode(Command::TrigLevel, &[Param::U8(1)]).unwrap_err();
        assert!(matches!(err, ScopeError::Command { .. }));
        assert!(encode(Command::Ping, &[Param::U8(0)]).is_err());
    }
    #[test]
    fn decodes_fixed_replies_and_fails_closed() {
        assert_eq!(
            decode(Command::MeasureOffset, &[0x02, 0x73, 0x00, 0x10]).unwrap(),
            Response::Values(vec![0x0273, 0x0010])
        );
        assert_eq!(
            decode(Command::Ping, b"DPScope").unwrap(),
            Response::Text("DPScope".into())
        );
        assert_eq!(decode(Command::Abort, &[]).unwrap(), Response::Empty);
        assert!(matches!(
            decode(Command::ReadAdc, &[1]),
            Err(ScopeError::Decode(_))
        ));
        assert!(decode(Command::ReadAdc, &[1, 2, 3]).is_err());
    }
    #[test]
    fn set_dac_packs_channel_and_millivolts() {
        // 3000 mV = 0x0BB8
        assert_eq!(set_dac_bytes(0, 3000), (0x10 + 0x0B, 0xB8));
        assert_eq!(set_dac_bytes(1, 3000), (0x80 + 0x10 + 0x0B, 0xB8));
        assert_eq!(set_dac_bytes(3, 0), (0x90, 0x00));
    }
}
