use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::train::epoch_stats::EpochStats;

/// Result of one final-test pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub mode: String,
    pub backend: String,
    pub average_psnr: f64,
    pub average_ssim: f64,
    pub sample_count: usize,
    pub elapsed_ms: u64,
}

/// One line of the JSON-lines run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunRecord {
    Epoch(EpochStats),
    Test(TestSummary),
}

/// Per-run logging context, created by the caller and handed to the
/// trainer or tester, which calls `finish` when the run ends.
///
/// Every record is emitted as a `tracing` event, appended to the log file
/// when one is open, and forwarded to the progress channel when attached.
#[derive(Default)]
pub struct RunLog {
    file: Option<BufWriter<File>>,
    progress: Option<Sender<EpochStats>>,
}

impl RunLog {
    /// A context that only emits `tracing` events.
    pub fn disabled() -> Self {
        RunLog::default()
    }

    /// Creates (or truncates) a JSON-lines log at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        info!(path = %path.display(), "run log opened");
        Ok(RunLog { file: Some(BufWriter::new(file)), progress: None })
    }

    /// `open` when a path is configured, `disabled` otherwise.
    pub fn from_option(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => RunLog::open(p),
            None => Ok(RunLog::disabled()),
        }
    }

    pub fn with_progress(mut self, tx: Sender<EpochStats>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn epoch(&mut self, stats: &EpochStats) -> Result<()> {
        info!(
            epoch = stats.epoch,
            step = stats.global_step,
            lr = stats.learning_rate,
            train_psnr = stats.train_psnr,
            train_ssim = stats.train_ssim,
            val_psnr = stats.val_psnr,
            val_ssim = stats.val_ssim,
            best_val_psnr = stats.best.val_psnr,
            elapsed_ms = stats.elapsed_ms,
            "epoch finished"
        );
        if let Some(tx) = &self.progress {
            // A receiver that went away just stops listening.
            if tx.send(stats.clone()).is_err() {
                self.progress = None;
            }
        }
        self.write(&RunRecord::Epoch(stats.clone()))
    }

    pub fn test(&mut self, summary: &TestSummary) -> Result<()> {
        info!(
            mode = %summary.mode,
            backend = %summary.backend,
            psnr = summary.average_psnr,
            ssim = summary.average_ssim,
            samples = summary.sample_count,
            "test finished"
        );
        self.write(&RunRecord::Test(summary.clone()))
    }

    fn write(&mut self, record: &RunRecord) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            serde_json::to_writer(&mut *file, record)?;
            file.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Flushes and closes the log file.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
            file.get_ref().sync_all()?;
        }
        self.progress = None;
        Ok(())
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        if self.file.is_some() {
            if let Err(err) = self.finish() {
                warn!(%err, "run log was not closed cleanly");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{BestMetrics, PassMetrics};
    use std::sync::mpsc;

    fn stats() -> EpochStats {
        let pass = PassMetrics { psnr: 30.0, ssim: 0.9, loss: Some(0.1), samples: 4 };
        EpochStats::new(0, 3, 0.01, &pass, &pass, BestMetrics::default(), 12)
    }

    #[test]
    fn records_are_written_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/run.jsonl");
        let mut log = RunLog::open(&path).unwrap();
        log.epoch(&stats()).unwrap();
        log.epoch(&stats()).unwrap();
        log.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let record: RunRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(record, RunRecord::Epoch(stats()));
    }

    #[test]
    fn dropped_progress_receiver_is_ignored() {
        let (tx, rx) = mpsc::channel();
        let mut log = RunLog::disabled().with_progress(tx);
        log.epoch(&stats()).unwrap();
        assert_eq!(rx.recv().unwrap().global_step, 3);
        drop(rx);
        assert!(log.epoch(&stats()).is_ok());
    }
}
