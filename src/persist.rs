//! On-disk snapshot file.
//!
//! The whole state is written as one JSON document on an interval, after each
//! submission and at shutdown. It is read back once at startup. Writes go to a
//! sibling temp file that is renamed over the target so a crash never leaves a
//! half-written snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::error::AttemptError;
use crate::state::export::StateSnapshot;
use crate::state::AppState;

/// Load a snapshot into `state`. A missing file is not an error.
pub async fn load_snapshot(state: &AppState, path: &Path) -> Result<bool, AttemptError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!("No snapshot at {}, starting empty", path.display());
            return Ok(false);
        }
        Err(e) => {
            return Err(AttemptError::Storage(format!(
                "reading {}: {}",
                path.display(),
                e
            )))
        }
    };

    let snapshot: StateSnapshot = serde_json::from_slice(&bytes).map_err(|e| {
        AttemptError::Storage(format!("parsing {}: {}", path.display(), e))
    })?;
    state
        .import_state(snapshot)
        .await
        .map_err(AttemptError::Storage)?;

    tracing::info!("Restored state from {}", path.display());
    Ok(true)
}

/// Write the current state to `path` atomically
pub async fn write_snapshot(state: &AppState, path: &Path) -> Result<(), AttemptError> {
    let snapshot = state.export_state().await?;
    let json = serde_json::to_vec_pretty(&snapshot)
        .map_err(|e| AttemptError::Storage(format!("serializing snapshot: {}", e)))?;

    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, &json)
        .await
        .map_err(|e| AttemptError::Storage(format!("writing {}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| AttemptError::Storage(format!("renaming to {}: {}", path.display(), e)))?;

    tracing::debug!(
        "Wrote snapshot to {} ({} attempts)",
        path.display(),
        snapshot.attempts.len()
    );
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Spawn a background task that writes a snapshot every `interval`, and
/// right away whenever an attempt is submitted
pub fn spawn_snapshot_writer(state: Arc<AppState>, path: PathBuf, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; the state was just loaded
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = state.persist_nudge.notified() => {
                    tracing::debug!("Submission recorded, writing snapshot early");
                }
            }
            if let Err(e) = write_snapshot(&state, &path).await {
                tracing::error!("Snapshot write failed: {}", e);
            }
        }
    });
}
