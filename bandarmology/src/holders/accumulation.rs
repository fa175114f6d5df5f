use std::path::{Path, PathBuf};

use crate::errors::Result;
use crate::models::AccumulationReport;

/// JSON file holding the latest accumulation report.
#[derive(Clone, Debug)]
pub struct AccumulationStore {
    path: PathBuf,
}

impl AccumulationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        AccumulationStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the stored report.
    pub async fn save(&self, report: &AccumulationReport) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_vec_pretty(report)?;
        tokio::fs::write(&self.path, json).await?;
        tracing::info!(path = %self.path.display(), brokers = report.brokers.len(), "accumulation data saved");
        Ok(())
    }

    /// The stored report, or an empty one when the file is missing or unreadable.
    pub async fn load(&self) -> AccumulationReport {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return AccumulationReport::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read accumulation data");
                return AccumulationReport::default();
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "corrupt accumulation data, using empty report");
                AccumulationReport::default()
            }
        }
    }

    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "accumulation data cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
