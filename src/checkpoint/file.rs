//! File-backed checkpoint store.
//!
//! One JSON document per workflow at `<dir>/<workflow_id>.json`:
//! - writes go to a temp file that is renamed over the checkpoint
//! - a sibling `.lock` file serializes writers and readers via `fs2`
//! - blocking I/O runs on the blocking pool

use super::{CheckpointInfo, CheckpointStore};
use crate::errors::CheckpointError;
use crate::state::WorkflowState;
use async_trait::async_trait;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CheckpointError + '_ {
    move |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, workflow_id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", workflow_id))
    }

    fn lock_path(&self, workflow_id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.lock", workflow_id))
    }

    fn open_lock(path: &Path) -> Result<File, CheckpointError> {
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(io_err(path))
    }

    fn save_blocking(&self, workflow_id: Uuid, encoded: &str) -> Result<(), CheckpointError> {
        std::fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;

        let lock_path = self.lock_path(workflow_id);
        let lock = Self::open_lock(&lock_path)?;
        lock.lock_exclusive().map_err(io_err(&lock_path))?;

        let path = self.path_for(workflow_id);
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, encoded).map_err(io_err(&tmp_path))?;
        std::fs::rename(&tmp_path, &path).map_err(io_err(&path))?;

        FileExt::unlock(&lock).map_err(io_err(&lock_path))?;
        Ok(())
    }

    fn load_blocking(&self, workflow_id: Uuid) -> Result<WorkflowState, CheckpointError> {
        let path = self.path_for(workflow_id);
        if !path.exists() {
            return Err(CheckpointError::NotFound(workflow_id));
        }

        let lock_path = self.lock_path(workflow_id);
        let lock = Self::open_lock(&lock_path)?;
        lock.lock_shared().map_err(io_err(&lock_path))?;

        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CheckpointError::NotFound(workflow_id));
            }
            Err(e) => return Err(io_err(&path)(e)),
        };
        FileExt::unlock(&lock).map_err(io_err(&lock_path))?;

        Ok(serde_json::from_str(&content)?)
    }

    fn list_blocking(&self) -> Result<Vec<CheckpointInfo>, CheckpointError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.dir)(e)),
        };

        let mut infos = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_err(&self.dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|c| {
                    serde_json::from_str::<WorkflowState>(&c).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(state) => infos.push(CheckpointInfo::from_state(&state)),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable checkpoint"),
            }
        }
        infos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(infos)
    }
}

fn join_err(e: tokio::task::JoinError) -> CheckpointError {
    CheckpointError::Unavailable(format!("checkpoint task failed: {}", e))
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn save(&self, workflow_id: Uuid, state: &WorkflowState) -> Result<(), CheckpointError> {
        let encoded = serde_json::to_string_pretty(state)?;
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.save_blocking(workflow_id, &encoded))
            .await
            .map_err(join_err)?
    }

    async fn load(&self, workflow_id: Uuid) -> Result<WorkflowState, CheckpointError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.load_blocking(workflow_id))
            .await
            .map_err(join_err)?
    }

    async fn list(&self) -> Result<Vec<CheckpointInfo>, CheckpointError> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.list_blocking())
            .await
            .map_err(join_err)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WorkflowInput;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("checkpoints"));
        let mut state = WorkflowState::new(WorkflowInput::default(), false);
        state.checkpoint_seq = 7;

        store.save(state.workflow_id, &state).await.unwrap();
        assert!(store.path_for(state.workflow_id).exists());
        assert!(!store.path_for(state.workflow_id).with_extension("json.tmp").exists());

        let loaded = store.load(state.workflow_id).await.unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn test_overwrite_keeps_latest() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let mut state = WorkflowState::new(WorkflowInput::default(), false);
        store.save(state.workflow_id, &state).await.unwrap();
        state.checkpoint_seq = 2;
        store.save(state.workflow_id, &state).await.unwrap();
        assert_eq!(store.load(state.workflow_id).await.unwrap().checkpoint_seq, 2);
    }

    #[tokio::test]
    async fn test_missing_checkpoint_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let id = Uuid::new_v4();
        assert!(matches!(
            store.load(id).await,
            Err(CheckpointError::NotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_list_skips_corrupt_files() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path());
        let state = WorkflowState::new(WorkflowInput::default(), false);
        store.save(state.workflow_id, &state).await.unwrap();
        std::fs::write(dir.path().join("garbage.json"), "{not json").unwrap();

        let infos = store.list().await.unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].workflow_id, state.workflow_id);
    }

    #[tokio::test]
    async fn test_list_of_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("nope"));
        assert!(store.list().await.unwrap().is_empty());
    }
}
