use std::io::Cursor;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::prelude::LineSeries;
use plotters::prelude::*;
use crate::drivers::capture::CaptureBuffer;
use crate::drivers::error::ScopeError;
use crate::drivers::fft::FrequencySpectrum;
use crate::drivers::settings::PollMode;
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub palette: [RGBColor; 2],
    /// Caption, axis labels and legend. These need a system font.
    pub labels: bool,
    /// Which channels to draw.
    pub channels: [bool; 2],
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 400,
            background: RGBColor(10, 10, 10),
            palette: [YELLOW, CYAN],
            labels: true,
            channels: [true, true],
        }
    }
}
const CHANNEL_LABELS: [&str; 2] = ["Ch1", "Ch2"];
type Trace = Vec<(f32, f32)>;
fn bounds(traces: &[(usize, Trace)]) -> (f32, f32, f32, f32) {
    let mut x_max = 0.0f32;
    let (mut y_min, mut y_max) = (0.0f32, 0.0f32);
    for (_, trace) in traces {
        for &(x, y) in trace {
            x_max = x_max.max(x);
            y_min = y_min.min(y);
            y_max = y_max.max(y);
        }
    }
    if x_max <= 0.0 {
        x_max = 1.0;
    }
    if (y_max - y_min).abs() < f32::EPSILON {
        y_max = y_min + 1.0;
    }
    (0.0, x_max, y_min, y_max)
}
fn render_traces(
    caption: &str,
    traces: Vec<(usize, Trace)>,
    style: &PlotStyle,
) -> Result<Vec<u8>, ScopeError> {
    if traces.iter().all(|(_, t)| t.is_empty()) {
        return Err(ScopeError::Plot("nothing to plot".into()));
    }
    let (x_min, x_max, y_min, y_max) = bounds(&traces);
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let mut builder = ChartBuilder::on(&root);
        builder.margin(10);
        if style.labels {
            builder
                .caption(caption, ("sans-serif", 20).into_font().color(&WHITE))
                .set_label_area_size(LabelAreaPosition::Left, 45)
                .set_label_area_size(LabelAreaPosition::Bottom, 40);
        }
        let mut chart = builder.build_cartesian_2d(x_min..x_max, y_min..y_max)?;
        if style.labels {
            chart
                .configure_mesh()
                .light_line_style(&WHITE.mix(0.1))
                .draw()?;
        }
        for (ch, trace) in traces {
            let color = style.palette[ch];
            chart
                .draw_series(LineSeries::new(trace, &color))?
                .label(CHANNEL_LABELS[ch])
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
        }
        if style.labels {
            chart
                .configure_series_labels()
                .border_style(&WHITE.mix(0.2))
                .background_style(&style.background)
                .draw()?;
        }
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
/// Renders a capture in volts. Time captures are plotted against seconds,
/// device FFT captures against bin number.
pub fn render_capture_png(
    capture: &CaptureBuffer,
    style: &PlotStyle,
) -> Result<Vec<u8>, ScopeError> {
    capture.validate()?;
    let (caption, step) = match capture.mode {
        PollMode::Time if capture.sample_interval() > 0.0 => {
            ("Capture (s)", capture.sample_interval())
        }
        PollMode::Time => ("Capture (samples)", 1.0),
        PollMode::Fft => ("Device FFT (bins)", 1.0),
    };
    let traces = (0..2)
        .filter(|ch| style.channels[*ch])
        .map(|ch| {
            let trace = capture
                .volts(ch)
                .into_iter()
                .enumerate()
                .map(|(i, v)| ((i as f64 * step) as f32, v as f32))
                .collect();
            (ch, trace)
        })
        .collect();
    render_traces(caption, traces, style)
}
pub fn render_spectrum_png(
    spectrum: &FrequencySpectrum,
    style: &PlotStyle,
) -> Result<Vec<u8>, ScopeError> {
    let traces = (0..2)
        .filter(|ch| style.channels[*ch])
        .map(|ch| {
            let trace = spectrum
                .frequencies_hz
                .iter()
                .copied()
                .zip(spectrum.magnitudes[ch].iter().copied())
                .collect();
            (ch, trace)
        })
        .collect();
    render_traces("FFT Magnitude (Hz)", traces, style)
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ScopeError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| ScopeError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::fft::SpectrumBuilder;
    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
    fn style() -> PlotStyle {
        PlotStyle {
            width: 160,
            height: 90,
            labels: false,
            ..PlotStyle::default()
        }
    }
    fn capture() -> CaptureBuffer {
        let ramp: Vec<u8> = (0..64).map(|i| i * 3).collect();
        let mut capture = CaptureBuffer::new(PollMode::Time, [ramp.clone(), ramp]);
        capture.seconds_per_div = 1e-3;
        capture.volts_per_code = [0.02, 0.01];
        capture
    }
    #[test]
    fn capture_renders_to_png() {
        let png = render_capture_png(&capture(), &style()).unwrap();
        assert_eq!(png[..8], PNG_MAGIC);
    }
    #[test]
    fn spectrum_renders_to_png() {
        let capture = capture();
        let spectrum = SpectrumBuilder::for_capture(&capture).compute(&capture).unwrap();
        let png = render_spectrum_png(&spectrum, &style()).unwrap();
        assert_eq!(png[..8], PNG_MAGIC);
    }
    #[test]
    fn no_channels_is_a_plot_error() {
        let style = PlotStyle {
            channels: [false, false],
            ..style()
        };
        assert!(matches!(
            render_capture_png(&capture(), &style),
            Err(ScopeError::Plot(_))
        ));
    }
}
