use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use anyhow::{Context, Result};
use log::info;
/// CSV writer for datalog samples: `time_s,ch1_v,ch2_v`.
pub struct DataRecorder {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
    start_time: Instant,
}
impl DataRecorder {
    pub fn new() -> Self {
        Self {
            writer: None,
            path: None,
            start_time: Instant::now(),
        }
    }
    /// Opens a new timestamped file in `dir` and returns its path.
    pub fn start(&mut self, dir: &Path) -> Result<PathBuf> {
        self.stop()?;
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let path = dir.join(format!("dpscope_datalog_{timestamp}.csv"));
        let file = File::create(&path)
            .with_context(|| format!("creating recording {}", path.display()))?;
        let mut w = BufWriter::new(file);
        writeln!(w, "time_s,ch1_v,ch2_v")?;
        info!("Recording started: {}", path.display());
        self.writer = Some(w);
        self.path = Some(path.clone());
        self.start_time = Instant::now();
        Ok(path)
    }
    pub fn stop(&mut self) -> Result<()> {
        if let Some(mut w) = self.writer.take() {
            w.flush().context("flushing recording")?;
            if let Some(path) = self.path.take() {
                info!("Recording saved: {}", path.display());
            }
        }
        Ok(())
    }
    pub fn write_record(&mut self, volts: [f64; 2]) -> Result<()> {
        let t = self.start_time.elapsed().as_secs_f64();
        self.write_record_at(t, volts)
    }
    pub fn write_record_at(&mut self, seconds: f64, volts: [f64; 2]) -> Result<()> {
        if let Some(w) = &mut self.writer {
            writeln!(w, "{seconds:.4},{:.5},{:.5}", volts[0], volts[1])
                .context("writing recording")?;
        }
        Ok(())
    }
    pub fn is_recording(&self) -> bool {
        self.writer.is_some()
    }
}
impl Default for DataRecorder {
    fn default() -> Self {
        Self::new()
    }
}
