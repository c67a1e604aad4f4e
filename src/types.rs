// src/types.rs
use crate::drivers::{CaptureBuffer, ScopeConfig};
// 连接模式
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum ConnectionMode {
    Simulation,
    Hardware,
}
// GUI 发给后台的命令
#[derive(Clone, Debug)]
pub enum GuiCommand {
    /// Port name is ignored in simulation mode.
    Connect(ConnectionMode, String),
    Disconnect,
    Configure(ScopeConfig),
    Start,
    Stop,
    /// One acquisition or datalog read.
    Poll,
    StartRecording,
    StopRecording,
}
// 后台发给 GUI 的消息
#[derive(Clone, Debug)]
pub enum ScopeMessage {
    Log(String),
    Status(bool),    // 连接状态
    Streaming(bool), // 采集状态
    UsbVoltage(f64),
    Datalog([f64; 2]),
    Capture(CaptureBuffer),
    /// Measurements per second.
    Rate(f64),
    RecordingStatus(bool),
    Error(String),
}
