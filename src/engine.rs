// src/engine.rs
use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use log::{error, info, warn};
use crate::config::AppConfig;
use crate::drivers::rate::RateWindow;
use crate::drivers::{
    SampleMode, ScopeConfig, ScopeController, ScopeError, SerialTransport, SimulatedScope,
    Transport,
};
use crate::recorder::DataRecorder;
use crate::types::*;
/// Window the measurement rate is averaged over.
const RATE_WINDOW: Duration = Duration::from_millis(200);
const IDLE_SLEEP: Duration = Duration::from_millis(20);
type Scope = ScopeController<Box<dyn Transport>>;
pub fn spawn_thread(
    tx: Sender<ScopeMessage>,
    rx_cmd: Receiver<GuiCommand>,
    config: AppConfig,
) -> JoinHandle<()> {
    thread::spawn(move || run(tx, rx_cmd, config))
}
/// Command loop; returns once every command sender has been dropped.
pub fn run(tx: Sender<ScopeMessage>, rx_cmd: Receiver<GuiCommand>, config: AppConfig) {
    let mut engine = Engine::new(tx, config);
    engine.log("DPScope engine ready.");
    loop {
        // 1. 消息处理
        for _ in 0..10 {
            match rx_cmd.try_recv() {
                Ok(cmd) => engine.handle(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    engine.disconnect();
                    info!("Command channel closed, engine exiting");
                    return;
                }
            }
        }
        // 2. 数据流循环
        if engine.streaming {
            engine.stream_step();
        } else {
            thread::sleep(IDLE_SLEEP);
        }
    }
}
struct Engine {
    tx: Sender<ScopeMessage>,
    config: AppConfig,
    scope_config: ScopeConfig,
    scope: Option<Scope>,
    streaming: bool,
    next_read: Instant,
    rate: RateWindow,
    recorder: DataRecorder,
}
impl Engine {
    fn new(tx: Sender<ScopeMessage>, config: AppConfig) -> Self {
        Self {
            tx,
            scope_config: config.scope,
            config,
            scope: None,
            streaming: false,
            next_read: Instant::now(),
            rate: RateWindow::new(RATE_WINDOW),
            recorder: DataRecorder::new(),
        }
    }
    fn send(&self, msg: ScopeMessage) {
        self.tx.send(msg).ok();
    }
    fn log(&self, line: &str) {
        info!("{line}");
        self.send(ScopeMessage::Log(line.to_owned()));
    }
    fn report(&mut self, err: &ScopeError) {
        error!("{err}");
        self.send(ScopeMessage::Error(err.to_string()));
        self.set_streaming(false);
    }
    fn set_streaming(&mut self, on: bool) {
        if self.streaming != on {
            self.streaming = on;
            self.send(ScopeMessage::Streaming(on));
        }
        if on {
            self.rate.clear();
            self.next_read = Instant::now();
        }
    }
    fn handle(&mut self, cmd: GuiCommand) {
        match cmd {
            GuiCommand::Connect(mode, port) => self.connect(mode, &port),
            GuiCommand::Disconnect => self.disconnect(),
            GuiCommand::Configure(cfg) => {
                if cfg.sample_mode != self.scope_config.sample_mode {
                    self.rate.clear();
                    self.log(cfg.sample_mode.label());
                }
                self.scope_config = cfg;
                if let Some(scope) = &mut self.scope {
                    scope.set_config(cfg);
                    if !self.streaming {
                        if let Err(e) = scope.configure() {
                            self.report(&e);
                        }
                    }
                }
            }
            GuiCommand::Start => {
                if self.scope.is_some() {
                    self.set_streaming(true);
                } else {
                    self.send(ScopeMessage::Error("not connected".into()));
                }
            }
            GuiCommand::Stop => self.set_streaming(false),
            GuiCommand::Poll => {
                if self.scope.is_some() {
                    self.measure();
                } else {
                    self.send(ScopeMessage::Error("not connected".into()));
                }
            }
            GuiCommand::StartRecording => match self.recorder.start(&self.config.output_dir) {
                Ok(path) => {
                    self.log(&format!("Recording to {}", path.display()));
                    self.send(ScopeMessage::RecordingStatus(true));
                }
                Err(e) => {
                    error!("{e:#}");
                    self.send(ScopeMessage::Error(format!("{e:#}")));
                }
            },
            GuiCommand::StopRecording => self.stop_recording(),
        }
    }
    fn open(&self, mode: ConnectionMode, port: &str) -> Result<Scope, ScopeError> {
        let transport: Box<dyn Transport> = match mode {
            ConnectionMode::Simulation => Box::new(SimulatedScope::new(rand::random())),
            ConnectionMode::Hardware => Box::new(SerialTransport::open(
                port,
                self.config.baud_rate,
                self.config.io_timeout(),
            )?),
        };
        ScopeController::connect(transport, self.config.controller_options(), self.scope_config)
    }
    fn connect(&mut self, mode: ConnectionMode, port: &str) {
        if self.scope.is_some() {
            warn!("Connect ignored: already connected");
            return;
        }
        let mut scope = match self.open(mode, port) {
            Ok(scope) => scope,
            Err(e) => {
                self.report(&e);
                return;
            }
        };
        self.log(&format!("Connected to {}", scope.identity()));
        match scope.usb_voltage() {
            Ok(v) => self.send(ScopeMessage::UsbVoltage(v)),
            Err(e) => {
                self.report(&e);
                return;
            }
        }
        self.scope = Some(scope);
        self.send(ScopeMessage::Status(true));
    }
    fn disconnect(&mut self) {
        self.set_streaming(false);
        self.stop_recording();
        if self.scope.take().is_some() {
            self.log("Disconnected");
            self.send(ScopeMessage::Status(false));
        }
    }
    fn stop_recording(&mut self) {
        if !self.recorder.is_recording() {
            return;
        }
        if let Err(e) = self.recorder.stop() {
            self.send(ScopeMessage::Error(format!("{e:#}")));
        }
        self.send(ScopeMessage::RecordingStatus(false));
    }
    fn stream_step(&mut self) {
        if self.scope_config.sample_mode == SampleMode::Datalog {
            let now = Instant::now();
            if now < self.next_read {
                thread::sleep((self.next_read - now).min(Duration::from_millis(5)));
                return;
            }
            let period = self.scope_config.acquisition_rate.period();
            self.next_read += period;
            if self.next_read < now {
                self.next_read = now + period;
            }
        }
        self.measure();
    }
    /// One datalog read or one capture, depending on the sample mode.
    fn measure(&mut self) {
        let Some(scope) = self.scope.as_mut() else {
            return;
        };
        let result = match self.scope_config.sample_mode {
            SampleMode::Datalog => scope.read_voltages().map(ScopeMessage::Datalog),
            SampleMode::Scope => scope.acquire().map(ScopeMessage::Capture),
        };
        match result {
            Ok(msg) => {
                if let ScopeMessage::Datalog(volts) = &msg {
                    if let Err(e) = self.recorder.write_record(*volts) {
                        error!("{e:#}");
                        self.send(ScopeMessage::Error(format!("{e:#}")));
                        self.stop_recording();
                    }
                }
                self.send(msg);
                let rate = self.rate.mark();
                self.send(ScopeMessage::Rate(rate));
            }
            Err(e) => {
                warn!("Acquisition failed in state {:?}", scope.state());
                self.report(&e);
            }
        }
    }
}
