// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per training epoch.
//
//   epoch,train_loss,val_loss,lr,grad_norm,tokens
//   1,2.904118,2.871502,0.000600,0.8312,10752
//   2,2.415530,,0.000598,0.6047,21504
//
// val_loss is left empty when the run has no validation split.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::Result;

const HEADER: &str = "epoch,train_loss,val_loss,lr,grad_norm,tokens";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,
    /// Mean masked loss over the epoch's training batches
    pub train_loss: f64,
    pub val_loss:   Option<f64>,
    /// Rate in effect at the end of the epoch
    pub lr:         f64,
    /// Mean pre-clip global gradient norm over the epoch's steps
    pub grad_norm:  f64,
    /// Cumulative supervised tokens processed so far
    pub tokens:     u64,
}

impl EpochMetrics {
    /// Only a validation loss below the best so far counts.
    pub fn is_improvement(&self, best_val_loss: f64) -> bool {
        self.val_loss.is_some_and(|v| v < best_val_loss)
    }

    fn csv_row(&self) -> String {
        let val = self.val_loss.map(|v| format!("{v:.6}")).unwrap_or_default();
        format!(
            "{},{:.6},{},{:.6},{:.4},{}",
            self.epoch, self.train_loss, val, self.lr, self.grad_norm, self.tokens
        )
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header only when the file does not exist yet, so
    /// several runs can share one log.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }
        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(f, "{}", m.csv_row())?;
        tracing::debug!("Logged epoch {} metrics to '{}'", m.epoch, self.csv_path.display());
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
