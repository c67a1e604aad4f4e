// src/gui.rs
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use eframe::egui;
use egui::Color32;
use egui_plot::{Legend, Line, Plot, PlotPoints};
use log::error;
use crate::config::AppConfig;
use crate::drivers::gain::VerticalScale;
use crate::drivers::settings::{Resolution, TriggerPolarity, MAX_TRIGGER_LEVEL};
use crate::drivers::transport::available_ports;
use crate::drivers::{
    render_capture_png, AcquisitionRate, CaptureBuffer, DatalogBuffer, PlotStyle, PollMode,
    SampleMode, ScopeConfig, SpectrumBuilder, Timebase, TriggerSource,
};
use crate::engine;
use crate::types::*;
const CH_COLORS: [Color32; 2] = [Color32::YELLOW, Color32::from_rgb(0, 255, 255)];
pub struct DpScopeApp {
    // 系统状态
    is_connected: bool,
    is_streaming: bool,
    is_recording: bool,
    connection_mode: ConnectionMode,
    ports: Vec<String>,
    port: String,
    // 显示设置
    scope: ScopeConfig,
    show_spectrum: bool,
    output_dir: PathBuf,
    // 数据
    datalog: DatalogBuffer,
    capture: Option<CaptureBuffer>,
    usb_voltage: Option<f64>,
    rate: f64,
    log_messages: Vec<String>,
    // 通讯管道
    rx: Receiver<ScopeMessage>,
    tx_cmd: Sender<GuiCommand>,
}
impl DpScopeApp {
    pub fn new(config: AppConfig) -> Self {
        let (tx, rx) = channel();
        let (tx_cmd, rx_cmd) = channel();
        let scope = config.scope;
        let output_dir = config.output_dir.clone();
        let ports = available_ports();
        let port = config
            .port
            .clone()
            .or_else(|| ports.first().cloned())
            .unwrap_or_default();
        // 启动后台引擎
        engine::spawn_thread(tx, rx_cmd, config);
        Self {
            is_connected: false,
            is_streaming: false,
            is_recording: false,
            connection_mode: ConnectionMode::Simulation,
            ports,
            port,
            scope,
            show_spectrum: false,
            output_dir,
            datalog: DatalogBuffer::new(scope.acquisition_rate.period()),
            capture: None,
            usb_voltage: None,
            rate: 0.0,
            log_messages: vec!["DPScope ready.".to_owned()],
            rx,
            tx_cmd,
        }
    }
    fn log(&mut self, msg: &str) {
        self.log_messages.push(format!("> {}", msg));
        if self.log_messages.len() > 8 {
            self.log_messages.remove(0);
        }
    }
    fn send(&mut self, cmd: GuiCommand) {
        if self.tx_cmd.send(cmd).is_err() {
            self.log("engine stopped");
        }
    }
    fn drain_messages(&mut self) {
        let mut msg_count = 0;
        while let Ok(msg) = self.rx.try_recv() {
            msg_count += 1;
            match msg {
                ScopeMessage::Log(s) => self.log(&s),
                ScopeMessage::Error(s) => self.log(&format!("ERROR: {s}")),
                ScopeMessage::Status(b) => {
                    self.is_connected = b;
                    if !b {
                        self.usb_voltage = None;
                        self.rate = 0.0;
                    }
                }
                ScopeMessage::Streaming(b) => self.is_streaming = b,
                ScopeMessage::UsbVoltage(v) => self.usb_voltage = Some(v),
                ScopeMessage::Datalog(v) => self.datalog.push(v),
                ScopeMessage::Capture(c) => self.capture = Some(c),
                ScopeMessage::Rate(r) => self.rate = r,
                ScopeMessage::RecordingStatus(b) => self.is_recording = b,
            }
            if msg_count > 200 {
                break;
            }
        }
    }
    fn save_png(&mut self) {
        let Some(capture) = &self.capture else {
            self.log("no capture to save");
            return;
        };
        let style = PlotStyle {
            channels: [self.scope.channels[0].enabled, self.scope.channels[1].enabled],
            ..PlotStyle::default()
        };
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let path = self.output_dir.join(format!("dpscope_capture_{stamp}.png"));
        let result = render_capture_png(capture, &style)
            .map_err(anyhow::Error::from)
            .and_then(|png| Ok(std::fs::write(&path, png)?));
        match result {
            Ok(()) => self.log(&format!("Saved {}", path.display())),
            Err(e) => {
                error!("PNG export failed: {e:#}");
                self.log(&format!("ERROR: {e:#}"));
            }
        }
    }
    fn connection_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.connection_mode, ConnectionMode::Simulation, "SIM");
            ui.selectable_value(&mut self.connection_mode, ConnectionMode::Hardware, "REAL");
        });
        if self.connection_mode == ConnectionMode::Hardware {
            ui.horizontal(|ui| {
                egui::ComboBox::from_id_source("port")
                    .selected_text(if self.port.is_empty() { "(none)" } else { self.port.as_str() })
                    .show_ui(ui, |ui| {
                        for p in &self.ports {
                            ui.selectable_value(&mut self.port, p.clone(), p.as_str());
                        }
                    });
                if ui.button("⟳").clicked() {
                    self.ports = available_ports();
                }
            });
        }
        let btn_txt = if self.is_connected { "DISCONNECT" } else { "CONNECT" };
        if ui.button(btn_txt).clicked() {
            if self.is_connected {
                self.send(GuiCommand::Disconnect);
            } else {
                self.send(GuiCommand::Connect(self.connection_mode, self.port.clone()));
                self.send(GuiCommand::Configure(self.scope));
            }
        }
    }
    fn acquisition_ui(&mut self, ui: &mut egui::Ui) {
        ui.add_enabled_ui(self.is_connected, |ui| {
            ui.horizontal(|ui| {
                let stream_btn = if self.is_streaming { "STOP" } else { "START" };
                if ui.button(stream_btn).clicked() {
                    if self.is_streaming {
                        self.send(GuiCommand::Stop);
                    } else {
                        self.send(GuiCommand::Start);
                    }
                }
                if ui.button("POLL").clicked() {
                    self.send(GuiCommand::Poll);
                }
                if ui.button("CLEAR").clicked() {
                    self.datalog.clear();
                    self.capture = None;
                }
            });
        });
    }
    /// Settings widgets; returns true when anything changed.
    fn settings_ui(&mut self, ui: &mut egui::Ui) -> bool {
        let before = self.scope;
        let cfg = &mut self.scope;
        ui.label("DISPLAY");
        ui.horizontal(|ui| {
            ui.checkbox(&mut cfg.channels[0].enabled, "Ch1");
            ui.checkbox(&mut cfg.channels[1].enabled, "Ch2");
            ui.checkbox(&mut cfg.xy, "XY");
        });
        ui.horizontal(|ui| {
            let mut fft = cfg.poll_mode == PollMode::Fft;
            if ui.checkbox(&mut fft, "FFT").changed() {
                cfg.poll_mode = if fft { PollMode::Fft } else { PollMode::Time };
            }
            ui.checkbox(&mut self.show_spectrum, "Spectrum");
        });
        ui.label("VERTICAL");
        for (ch, name) in ["Ch1", "Ch2"].iter().enumerate() {
            egui::ComboBox::from_label(*name)
                .selected_text(cfg.channels[ch].scale.label())
                .show_ui(ui, |ui| {
                    for scale in VerticalScale::ALL {
                        ui.selectable_value(&mut cfg.channels[ch].scale, scale, scale.label());
                    }
                });
        }
        ui.horizontal(|ui| {
            for res in Resolution::ALL {
                ui.radio_value(&mut cfg.resolution, res, res.label());
            }
        });
        ui.label("HORIZONTAL");
        egui::ComboBox::from_label("Mode")
            .selected_text(cfg.sample_mode.label())
            .show_ui(ui, |ui| {
                for mode in [SampleMode::Datalog, SampleMode::Scope] {
                    ui.selectable_value(&mut cfg.sample_mode, mode, mode.label());
                }
            });
        match cfg.sample_mode {
            SampleMode::Scope => {
                egui::ComboBox::from_label("Timebase")
                    .selected_text(cfg.timebase.label())
                    .show_ui(ui, |ui| {
                        for tb in Timebase::ALL {
                            ui.selectable_value(&mut cfg.timebase, tb, tb.label());
                        }
                    });
            }
            SampleMode::Datalog => {
                egui::ComboBox::from_label("Rate")
                    .selected_text(cfg.acquisition_rate.label())
                    .show_ui(ui, |ui| {
                        for rate in AcquisitionRate::ALL {
                            ui.selectable_value(&mut cfg.acquisition_rate, rate, rate.label());
                        }
                    });
            }
        }
        ui.label("TRIGGER");
        egui::ComboBox::from_label("Source")
            .selected_text(cfg.trigger_source.label())
            .show_ui(ui, |ui| {
                for src in TriggerSource::ALL {
                    ui.selectable_value(&mut cfg.trigger_source, src, src.label());
                }
            });
        ui.horizontal(|ui| {
            ui.radio_value(&mut cfg.trigger_polarity, TriggerPolarity::Rising, "Rising");
            ui.radio_value(&mut cfg.trigger_polarity, TriggerPolarity::Falling, "Falling");
        });
        ui.add(egui::Slider::new(&mut cfg.trigger_level, 0..=MAX_TRIGGER_LEVEL).text("Level"));
        ui.checkbox(&mut cfg.noise_reject, "Noise reject");
        self.scope != before
    }
    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let (txt, col) = if self.is_connected {
                ("Connected", Color32::GREEN)
            } else {
                ("Disconnected", Color32::GRAY)
            };
            ui.colored_label(col, txt);
            ui.separator();
            match self.usb_voltage {
                Some(v) => ui.label(format!("USB {v:.3} V")),
                None => ui.label("USB -"),
            };
            ui.separator();
            ui.label(format!("{:.1} meas/s", self.rate));
            ui.separator();
            ui.label(self.scope.sample_mode.label());
            if self.is_recording {
                ui.separator();
                ui.colored_label(Color32::RED, "REC");
            }
        });
    }
    fn traces(&self) -> Vec<(usize, Vec<[f64; 2]>)> {
        let enabled = |ch: usize| self.scope.channels[ch].enabled;
        match self.scope.sample_mode {
            SampleMode::Datalog => {
                if self.scope.xy {
                    let xy = self
                        .datalog
                        .points(0)
                        .into_iter()
                        .zip(self.datalog.points(1))
                        .map(|(a, b)| [a[1], b[1]])
                        .collect();
                    return vec![(1, xy)];
                }
                (0..2)
                    .filter(|ch| enabled(*ch))
                    .map(|ch| (ch, self.datalog.points(ch)))
                    .collect()
            }
            SampleMode::Scope => {
                let Some(capture) = &self.capture else {
                    return Vec::new();
                };
                if self.scope.xy {
                    return vec![(1, capture.xy_points())];
                }
                if self.show_spectrum && capture.mode == PollMode::Time {
                    if let Ok(spectrum) = SpectrumBuilder::for_capture(capture).compute(capture) {
                        return (0..2)
                            .filter(|ch| enabled(*ch))
                            .map(|ch| (ch, spectrum.points(ch)))
                            .collect();
                    }
                }
                let step = match capture.sample_interval() {
                    dt if dt > 0.0 && capture.mode == PollMode::Time => dt,
                    _ => 1.0,
                };
                (0..2)
                    .filter(|ch| enabled(*ch))
                    .map(|ch| {
                        let pts = capture
                            .volts(ch)
                            .into_iter()
                            .enumerate()
                            .map(|(i, v)| [i as f64 * step, v])
                            .collect();
                        (ch, pts)
                    })
                    .collect()
            }
        }
    }
}
impl eframe::App for DpScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_messages();
        if self.is_streaming {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
        ctx.set_visuals(egui::Visuals::dark());
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| self.status_bar(ui));
        egui::SidePanel::left("L").min_width(260.0).show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("DPScope");
                ui.separator();
                self.connection_ui(ui);
                ui.separator();
                self.acquisition_ui(ui);
                ui.separator();
                if self.settings_ui(ui) {
                    self.datalog.set_period(self.scope.acquisition_rate.period());
                    let cfg = self.scope;
                    self.send(GuiCommand::Configure(cfg));
                }
                ui.separator();
                ui.horizontal(|ui| {
                    let rec_btn_text = if self.is_recording {
                        "⏹ STOP REC"
                    } else {
                        "🔴 RECORD"
                    };
                    let can_record =
                        self.is_connected && self.scope.sample_mode == SampleMode::Datalog;
                    if ui
                        .add_enabled(
                            can_record || self.is_recording,
                            egui::Button::new(rec_btn_text),
                        )
                        .clicked()
                    {
                        if self.is_recording {
                            self.send(GuiCommand::StopRecording);
                        } else {
                            self.send(GuiCommand::StartRecording);
                        }
                    }
                    if ui
                        .add_enabled(self.capture.is_some(), egui::Button::new("SAVE PNG"))
                        .clicked()
                    {
                        self.save_png();
                    }
                });
                ui.add_space(10.0);
                egui::ScrollArea::vertical()
                    .id_source("log")
                    .max_height(120.0)
                    .show(ui, |ui| {
                        for m in &self.log_messages {
                            ui.monospace(m);
                        }
                    });
            });
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            if !self.is_connected {
                ui.label("Connect first.");
            }
            let traces = self.traces();
            let scale = self.scope.display_scale();
            let mut plot = Plot::new("scope_plot").legend(Legend::default());
            let spectrum = self.show_spectrum && self.scope.sample_mode == SampleMode::Scope;
            if !spectrum {
                plot = plot.include_y(0.0).include_y(scale.voltage_max());
            }
            if self.scope.sample_mode == SampleMode::Datalog && !self.scope.xy {
                plot = plot.include_x(0.0).include_x(self.datalog.span_seconds());
            }
            plot.show(ui, |plot_ui| {
                for (ch, pts) in traces {
                    let name = if self.scope.xy {
                        "Ch2 vs Ch1".to_owned()
                    } else {
                        format!("Ch{}", ch + 1)
                    };
                    let line = Line::new(PlotPoints::new(pts)).name(name).color(CH_COLORS[ch]);
                    plot_ui.line(line);
                }
            });
        });
    }
}
