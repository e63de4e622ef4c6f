//! Per-epoch scalar telemetry.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// One scalar sample of a named series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarRecord {
    pub tag: String,
    pub epoch: usize,
    pub value: f64,
}

/// Receives per-epoch scalars such as `training/mrstft` or `validation/esr`.
pub trait TelemetrySink {
    fn scalar(&mut self, tag: &str, epoch: usize, value: f64);

    /// Called once when training ends.
    fn flush(&mut self) {}
}

/// Emits every scalar as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn scalar(&mut self, tag: &str, epoch: usize, value: f64) {
        tracing::info!(target: "tonewell::telemetry", tag, epoch, value);
    }
}

/// Collects scalars in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<ScalarRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ScalarRecord> {
        self.records.lock().clone()
    }

    /// Values of one series ordered by epoch.
    pub fn series(&self, tag: &str) -> Vec<(usize, f64)> {
        let mut series: Vec<_> = self
            .records
            .lock()
            .iter()
            .filter(|r| r.tag == tag)
            .map(|r| (r.epoch, r.value))
            .collect();
        series.sort_by_key(|(epoch, _)| *epoch);
        series
    }
}

impl TelemetrySink for MemorySink {
    fn scalar(&mut self, tag: &str, epoch: usize, value: f64) {
        self.records.lock().push(ScalarRecord {
            tag: tag.to_string(),
            epoch,
            value,
        });
    }
}

/// Appends one JSON object per scalar to a file, for offline plotting.
pub struct JsonLinesSink {
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    pub fn create(path: &Path) -> crate::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::options().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl TelemetrySink for JsonLinesSink {
    fn scalar(&mut self, tag: &str, epoch: usize, value: f64) {
        let record = ScalarRecord {
            tag: tag.to_string(),
            epoch,
            value,
        };
        let written = serde_json::to_writer(&mut self.writer, &record)
            .map_err(std::io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"));
        if let Err(e) = written {
            tracing::warn!("Failed to write telemetry record {}: {}", tag, e);
        }
    }

    fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            tracing::warn!("Failed to flush telemetry: {}", e);
        }
    }
}

impl Drop for JsonLinesSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Forwards every scalar to several sinks.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn TelemetrySink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl TelemetrySink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl TelemetrySink for FanoutSink {
    fn scalar(&mut self, tag: &str, epoch: usize, value: f64) {
        for sink in &mut self.sinks {
            sink.scalar(tag, epoch, value);
        }
    }

    fn flush(&mut self) {
        for sink in &mut self.sinks {
            sink.flush();
        }
    }
}
