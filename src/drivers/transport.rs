use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use log::{debug, info};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use crate::drivers::ScopeError;
/// Default DPScope line rate over the USB virtual COM port.
pub const DEFAULT_BAUD_RATE: u32 = 500_000;
/// Default blocking read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
/// Byte pipe to a DPScope. All calls block until done or the timeout elapses.
pub trait Transport: Send {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ScopeError>;
    /// Returns exactly `n` bytes, or `ScopeError::Timeout`.
    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, ScopeError>;
    fn bytes_pending(&mut self) -> Result<usize, ScopeError>;
    fn clear_input(&mut self) -> Result<(), ScopeError>;
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ScopeError>;
    fn description(&self) -> String;
}
impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ScopeError> {
        (**self).write_all(bytes)
    }
    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, ScopeError> {
        (**self).read_exact(n)
    }
    fn bytes_pending(&mut self) -> Result<usize, ScopeError> {
        (**self).bytes_pending()
    }
    fn clear_input(&mut self) -> Result<(), ScopeError> {
        (**self).clear_input()
    }
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ScopeError> {
        (**self).set_timeout(timeout)
    }
    fn description(&self) -> String {
        (**self).description()
    }
}
/// Serial (VCP) link to real hardware.
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    port: Box<dyn SerialPort>,
}
impl SerialTransport {
    /// Opens `port_name` at `baud_rate`, 8N1 without flow control.
    pub fn open(port_name: &str, baud_rate: u32, timeout: Duration) -> Result<Self, ScopeError> {
        info!("Opening connection to DPScope (port: {port_name} | baudrate: {baud_rate})");
        let port = serialport::new(port_name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| ScopeError::Connection {
                port: port_name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            port_name: port_name.to_string(),
            baud_rate,
            port,
        })
    }
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
    fn map_io(&self, err: std::io::Error, what: &str) -> ScopeError {
        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::UnexpectedEof => {
                ScopeError::Timeout(format!("{what} on {}", self.port_name))
            }
            _ => ScopeError::Io(err),
        }
    }
}
impl Transport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ScopeError> {
        debug!("tx {:02x?}", bytes);
        if let Err(e) = Write::write_all(&mut self.port, bytes).and_then(|_| self.port.flush()) {
            return Err(self.map_io(e, "write"));
        }
        Ok(())
    }
    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, ScopeError> {
        let mut buf = vec![0u8; n];
        if let Err(e) = Read::read_exact(&mut self.port, &mut buf) {
            return Err(self.map_io(e, &format!("read of {n} bytes")));
        }
        debug!("rx {:02x?}", buf);
        Ok(buf)
    }
    fn bytes_pending(&mut self) -> Result<usize, ScopeError> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(|e| ScopeError::Comms(e.to_string()))
    }
    fn clear_input(&mut self) -> Result<(), ScopeError> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| ScopeError::Comms(e.to_string()))
    }
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), ScopeError> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| ScopeError::Comms(e.to_string()))
    }
    fn description(&self) -> String {
        format!("{} @ {} baud", self.port_name, self.baud_rate)
    }
}
/// Port names the OS currently reports; empty if enumeration fails.
pub fn available_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
        Err(e) => {
            log::warn!("serial port enumeration failed: {e}");
            Vec::new()
        }
    }
}
/// In-memory transport that replays canned device bytes and records what was sent.
#[cfg(test)]
pub(crate) struct ScriptedTransport {
    pub written: Vec<u8>,
    replies: std::collections::VecDeque<u8>,
}
#[cfg(test)]
impl ScriptedTransport {
    pub fn new(replies: &[u8]) -> Self {
        Self {
            written: Vec::new(),
            replies: replies.iter().copied().collect(),
        }
    }
}
#[cfg(test)]
impl Transport for ScriptedTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ScopeError> {
        self.written.extend_from_slice(bytes);
        Ok(())
    }
    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, ScopeError> {
        if self.replies.len() < n {
            self.replies.clear();
            return Err(ScopeError::Timeout(format!("read of {n} bytes")));
        }
        Ok(self.replies.drain(..n).collect())
    }
    fn bytes_pending(&mut self) -> Result<usize, ScopeError> {
        Ok(self.replies.len())
    }
    fn clear_input(&mut self) -> Result<(), ScopeError> {
        self.replies.clear();
        Ok(())
    }
    fn set_timeout(&mut self, _timeout: Duration) -> Result<(), ScopeError> {
        Ok(())
    }
    fn description(&self) -> String {
        "scripted".into()
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn missing_port_is_a_connection_error() {
        let started = std::time::Instant::now();
        let result = SerialTransport::open(
            "/dev/this-port-does-not-exist",
            DEFAULT_BAUD_RATE,
            DEFAULT_TIMEOUT,
        );
        match result {
            Err(ScopeError::Connection { port, .. }) => {
                assert_eq!(port, "/dev/this-port-does-not-exist")
            }
            Err(other) => panic!("expected connection error, got {other}"),
            Ok(_) => panic!("opening a missing port succeeded"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }
    #[test]
    fn scripted_transport_times_out_on_short_read() {
        let mut t = ScriptedTransport::new(&[1, 2]);
        assert_eq!(t.read_exact(1).unwrap(), vec![1]);
        assert!(t.read_exact(2).unwrap_err().is_timeout());
        assert_eq!(t.bytes_pending().unwrap(), 0);
    }
}
