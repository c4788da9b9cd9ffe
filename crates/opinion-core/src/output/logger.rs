//! Sweep Logger
//!
//! Append-only JSONL log of sweep records, one line per run.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use opinion_events::SweepRecord;
use tracing::warn;

pub struct SweepLogger {
    writer: BufWriter<File>,
    record_count: u64,
}

impl SweepLogger {
    /// Create a logger writing to the specified path (truncating it)
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: BufWriter::new(file),
            record_count: 0,
        })
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn log(&mut self, record: &SweepRecord) -> std::io::Result<()> {
        let json = record.to_jsonl()?;
        writeln!(self.writer, "{}", json)?;
        self.record_count += 1;
        Ok(())
    }

    pub fn log_batch(&mut self, records: &[SweepRecord]) -> std::io::Result<()> {
        for record in records {
            self.log(record)?;
        }
        Ok(())
    }

    /// Flush the buffer to disk
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl Drop for SweepLogger {
    fn drop(&mut self) {
        if let Err(error) = self.flush() {
            warn!(%error, records = self.record_count, "failed to flush sweep log");
        }
    }
}
