// src/drivers/mod.rs
// DPScope driver stack: serial transport, command codec, controller, and the
// helpers that turn captures into plots.
pub mod buffer;
pub mod capture;
pub mod command;
pub mod controller;
pub mod error;
pub mod fft;
pub mod gain;
pub mod interface;
pub mod plot;
pub mod rate;
pub mod settings;
pub mod sim;
pub mod transport;
pub mod voltage;
pub use buffer::DatalogBuffer;
pub use capture::CaptureBuffer;
pub use controller::{AcquisitionState, ControllerOptions, ScopeController};
pub use error::ScopeError;
pub use fft::{FrequencySpectrum, SpectrumBuilder};
pub use gain::VerticalScale;
pub use plot::{render_capture_png, render_spectrum_png, PlotStyle};
pub use rate::{AcquisitionRate, RateWindow};
pub use settings::{PollMode, SampleMode, ScopeConfig, Timebase, TriggerPolarity, TriggerSource};
pub use sim::SimulatedScope;
pub use transport::{SerialTransport, Transport};
