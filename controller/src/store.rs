use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use homeclimate_common::ControlState;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

/// Sole owner of the shared [`ControlState`] and of its persisted form.
///
/// Every mutation, whether from the control tick or the command API, goes
/// through [`StateStore::apply`] so concurrent writers never interleave a
/// partial update. Persistence holds the same lock for the duration of the
/// write and flushes to stable storage before releasing it, so a reader of
/// the file never observes a torn document.
#[derive(Clone)]
pub struct StateStore {
    state: Arc<Mutex<ControlState>>,
    path: Arc<PathBuf>,
}

impl StateStore {
    /// Loads the persisted state, or falls back to the documented default
    /// world when the file is missing or corrupt. Neither is fatal.
    pub async fn load(path: PathBuf) -> Self {
        let state = match tokio::fs::read(&path).await {
            Ok(raw) => match serde_json::from_slice::<ControlState>(&raw) {
                Ok(state) => state,
                Err(err) => {
                    warn!("corrupt state file {}, using defaults: {err}", path.display());
                    ControlState::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!("no state file at {}, using defaults", path.display());
                ControlState::default()
            }
            Err(err) => {
                warn!("unreadable state file {}, using defaults: {err}", path.display());
                ControlState::default()
            }
        };

        Self {
            state: Arc::new(Mutex::new(state)),
            path: Arc::new(path),
        }
    }

    pub async fn snapshot(&self) -> ControlState {
        self.state.lock().await.clone()
    }

    /// Atomic read-modify-write; returns the resulting state.
    pub async fn apply<F>(&self, mutate: F) -> ControlState
    where
        F: FnOnce(&mut ControlState),
    {
        let mut state = self.state.lock().await;
        mutate(&mut state);
        state.clone()
    }

    /// Writes the current state to disk: temp file, fsync, then an atomic
    /// rename over the live document, all while holding the state lock.
    pub async fn persist(&self) -> anyhow::Result<()> {
        let state = self.state.lock().await;
        let payload = serde_json::to_vec_pretty(&*state)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating state dir {}", parent.display()))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .with_context(|| format!("creating {}", tmp_path.display()))?;
        file.write_all(&payload).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp_path, self.path.as_ref())
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}
