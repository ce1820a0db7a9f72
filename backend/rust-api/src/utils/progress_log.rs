use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;

/// Append-only diagnostic log for progress-persistence failures.
///
/// The write is awaited so the entry is on disk before the failure is
/// surfaced to the caller, but any logging error stays here: nothing is ever
/// propagated back into the request path.
#[derive(Debug, Clone)]
pub struct DiagnosticLog {
    path: PathBuf,
}

impl DiagnosticLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, message: &str, context: serde_json::Value) {
        if let Err(e) = write_entry(&self.path, message, &context).await {
            tracing::error!(
                "Failed to append diagnostic log entry to {}: {:#}",
                self.path.display(),
                e
            );
        }
    }
}

async fn write_entry(
    path: &Path,
    message: &str,
    context: &serde_json::Value,
) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            tokio::fs::create_dir_all(dir).await?;
        }
    }

    let entry = format!(
        "[{}] {}\n{}\n\n",
        Utc::now().to_rfc3339(),
        message,
        serde_json::to_string_pretty(context)?
    );

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(entry.as_bytes()).await?;
    file.flush().await?;

    Ok(())
}
