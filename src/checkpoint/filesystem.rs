// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 agentflow contributors

//! Filesystem checkpoint store
//!
//! Stores each run as a directory of JSON files under a checkpoint root.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

use super::integrity::{decode, sign};
use super::{Checkpoint, CheckpointStore, RunFilter, RunId, RunMetadata};
use crate::errors::AgentflowError;

const CHECKPOINT_FILE: &str = "checkpoint.json";
const METADATA_FILE: &str = "metadata.json";
const ARTIFACTS_DIR: &str = "artifacts";
const LOGS_DIR: &str = "logs";
const LOG_FILE: &str = "run.log";

type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;
type RemoveDir = Arc<dyn Fn(&Path) -> std::io::Result<()> + Send + Sync>;

/// Filesystem-based checkpoint store
pub struct FilesystemCheckpointStore {
    /// Checkpoint root directory
    root: PathBuf,
    /// Source of `updatedAt` stamps and the cleanup reference time
    clock: Clock,
    /// Removes a whole run directory
    remove_dir: RemoveDir,
}

impl FilesystemCheckpointStore {
    /// Create a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: Arc::new(Utc::now),
            remove_dir: Arc::new(|path: &Path| std::fs::remove_dir_all(path)),
        }
    }

    /// Replace the clock
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Replace how run directories are removed by `delete` and cleanup
    pub fn with_remove_dir<F>(mut self, remove_dir: F) -> Self
    where
        F: Fn(&Path) -> std::io::Result<()> + Send + Sync + 'static,
    {
        self.remove_dir = Arc::new(remove_dir);
        self
    }

    /// Directory for a validated run id
    fn run_dir(&self, run_id: &RunId) -> PathBuf {
        self.root.join(run_id.as_str())
    }

    async fn remove_run_dir(&self, run_id: &RunId) -> std::io::Result<()> {
        let remove_dir = self.remove_dir.clone();
        let dir = self.run_dir(run_id);

        tokio::task::spawn_blocking(move || remove_dir(&dir))
            .await
            .unwrap_or_else(|e| Err(std::io::Error::other(e)))
    }

    /// Run ids of every run directory under the root
    async fn run_ids(&self) -> Result<Vec<RunId>, AgentflowError> {
        let mut ids = Vec::new();

        if !self.root.exists() {
            return Ok(ids);
        }

        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| AgentflowError::checkpoint_io("failed to read checkpoint root", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AgentflowError::checkpoint_io("failed to read checkpoint root", e))?
        {
            if !entry.path().is_dir() {
                continue;
            }

            // Anything that is not a run id was not written by this store
            let name = entry.file_name();
            match name.to_str().map(RunId::parse) {
                Some(Ok(id)) => ids.push(id),
                _ => tracing::debug!(entry = ?name, "ignoring non-run directory"),
            }
        }

        Ok(ids)
    }

    /// Read a run's metadata, rebuilding it from the checkpoint if the summary is unreadable
    pub async fn load_metadata(&self, run_id: &str) -> Result<RunMetadata, AgentflowError> {
        let id = RunId::parse(run_id)?;
        let path = self.run_dir(&id).join(METADATA_FILE);

        if let Ok(content) = tokio::fs::read(&path).await {
            match serde_json::from_slice::<RunMetadata>(&content) {
                Ok(metadata) => return Ok(metadata),
                Err(e) => tracing::warn!(run_id = %id, error = %e, "metadata unreadable, falling back to checkpoint"),
            }
        }

        Ok(self.load(id.as_str()).await?.metadata())
    }

    /// Run summaries matching a filter, most recently updated first
    pub async fn list_metadata(&self, filter: &RunFilter) -> Result<Vec<RunMetadata>, AgentflowError> {
        let mut runs = Vec::new();

        for id in self.run_ids().await? {
            match self.load_metadata(id.as_str()).await {
                Ok(metadata) if filter.matches(&metadata) => runs.push(metadata),
                Ok(_) => {}
                Err(e) => tracing::warn!(run_id = %id, error = %e, "skipping unreadable run"),
            }
        }

        runs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(limit) = filter.limit {
            runs.truncate(limit);
        }

        Ok(runs)
    }

    /// Delete runs last updated more than `retention_days` before `now`
    pub async fn cleanup_at(
        &self,
        retention_days: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, AgentflowError> {
        let cutoff = now - Duration::days(i64::from(retention_days));
        let mut removed = 0;

        for id in self.run_ids().await? {
            let metadata = match self.load_metadata(id.as_str()).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::warn!(run_id = %id, error = %e, "cannot read run, leaving it in place");
                    continue;
                }
            };

            if metadata.updated_at >= cutoff {
                continue;
            }

            match self.remove_run_dir(&id).await {
                Ok(()) => {
                    tracing::info!(run_id = %id, updated_at = %metadata.updated_at, "removed expired run");
                    removed += 1;
                }
                Err(e) => tracing::warn!(run_id = %id, error = %e, "failed to remove expired run"),
            }
        }

        Ok(removed)
    }

    /// Write an artifact file for a run
    pub async fn write_artifact(
        &self,
        run_id: &str,
        name: &str,
        contents: &[u8],
    ) -> Result<PathBuf, AgentflowError> {
        let id = RunId::parse(run_id)?;
        validate_artifact_name(name)?;

        let dir = self.run_dir(&id).join(ARTIFACTS_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AgentflowError::checkpoint_io("failed to create artifacts directory", e))?;

        let path = dir.join(name);
        write_atomic(&path, contents).await?;
        Ok(path)
    }

    /// Artifact file names for a run, sorted
    pub async fn list_artifacts(&self, run_id: &str) -> Result<Vec<String>, AgentflowError> {
        let id = RunId::parse(run_id)?;
        let dir = self.run_dir(&id).join(ARTIFACTS_DIR);

        let pattern = format!("{}/*", glob::Pattern::escape(&dir.to_string_lossy()));
        let paths = glob::glob(&pattern)
            .map_err(|e| AgentflowError::checkpoint_io("invalid artifact pattern", e))?;

        let mut names: Vec<String> = paths
            .filter_map(Result::ok)
            .filter(|path| path.is_file())
            .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .filter(|name| !name.ends_with(".tmp"))
            .collect();
        names.sort();

        Ok(names)
    }

    /// Append a timestamped line to the run log
    pub async fn append_log(&self, run_id: &str, line: &str) -> Result<(), AgentflowError> {
        let id = RunId::parse(run_id)?;
        let dir = self.run_dir(&id).join(LOGS_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AgentflowError::checkpoint_io("failed to create logs directory", e))?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE))
            .await
            .map_err(|e| AgentflowError::checkpoint_io("failed to open run log", e))?;

        let entry = format!("{} {}\n", (self.clock)().to_rfc3339(), line);
        file.write_all(entry.as_bytes())
            .await
            .map_err(|e| AgentflowError::checkpoint_io("failed to write run log", e))?;

        Ok(())
    }

    /// Contents of the run log
    pub async fn read_log(&self, run_id: &str) -> Result<String, AgentflowError> {
        let id = RunId::parse(run_id)?;
        let path = self.run_dir(&id).join(LOGS_DIR).join(LOG_FILE);

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(AgentflowError::checkpoint_io("failed to read run log", e)),
        }
    }
}

#[async_trait]
impl CheckpointStore for FilesystemCheckpointStore {
    async fn save(&self, checkpoint: &mut Checkpoint) -> Result<PathBuf, AgentflowError> {
        let id = RunId::parse(&checkpoint.run_id)?;
        let dir = self.run_dir(&id);

        for sub in [ARTIFACTS_DIR, LOGS_DIR] {
            tokio::fs::create_dir_all(dir.join(sub))
                .await
                .map_err(|e| AgentflowError::checkpoint_io("failed to create run directory", e))?;
        }

        checkpoint.run_id = id.to_string();
        checkpoint.updated_at = (self.clock)();
        sign(checkpoint)?;

        let path = dir.join(CHECKPOINT_FILE);
        write_atomic(&path, &serde_json::to_vec_pretty(checkpoint)?).await?;
        write_atomic(
            &dir.join(METADATA_FILE),
            &serde_json::to_vec_pretty(&checkpoint.metadata())?,
        )
        .await?;

        tracing::debug!(run_id = %id, path = %path.display(), "checkpoint saved");
        Ok(path)
    }

    async fn load(&self, run_id: &str) -> Result<Checkpoint, AgentflowError> {
        let id = RunId::parse(run_id)?;
        let path = self.run_dir(&id).join(CHECKPOINT_FILE);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AgentflowError::CheckpointNotFound {
                    run_id: id.to_string(),
                });
            }
            Err(e) => return Err(AgentflowError::checkpoint_io("failed to read checkpoint", e)),
        };

        decode(id.as_str(), &bytes)
    }

    async fn exists(&self, run_id: &str) -> Result<bool, AgentflowError> {
        let id = RunId::parse(run_id)?;
        Ok(self.run_dir(&id).join(CHECKPOINT_FILE).is_file())
    }

    async fn list(&self) -> Result<Vec<Checkpoint>, AgentflowError> {
        let mut checkpoints = Vec::new();

        for id in self.run_ids().await? {
            match self.load(id.as_str()).await {
                Ok(checkpoint) => checkpoints.push(checkpoint),
                Err(e) => tracing::warn!(run_id = %id, error = %e, "skipping unreadable checkpoint"),
            }
        }

        checkpoints.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(checkpoints)
    }

    async fn delete(&self, run_id: &str) -> Result<(), AgentflowError> {
        let id = RunId::parse(run_id)?;
        let dir = self.run_dir(&id);

        if !dir.is_dir() {
            return Err(AgentflowError::CheckpointNotFound {
                run_id: id.to_string(),
            });
        }

        self.remove_run_dir(&id)
            .await
            .map_err(|e| AgentflowError::checkpoint_io("failed to delete run", e))?;

        tracing::info!(run_id = %id, "run deleted");
        Ok(())
    }

    async fn cleanup(&self, retention_days: u32) -> Result<usize, AgentflowError> {
        self.cleanup_at(retention_days, (self.clock)()).await
    }
}

/// Write to a sibling temp file, flush it to disk, then rename over the target
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AgentflowError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{}.tmp", file_name));

    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(|e| AgentflowError::checkpoint_io("failed to create temp file", e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| AgentflowError::checkpoint_io("failed to write temp file", e))?;
    file.sync_all()
        .await
        .map_err(|e| AgentflowError::checkpoint_io("failed to sync temp file", e))?;
    drop(file);

    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| AgentflowError::checkpoint_io("failed to replace file", e))
}

fn validate_artifact_name(name: &str) -> Result<(), AgentflowError> {
    let invalid = name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains(['/', '\\', '\0'])
        || name.ends_with(".tmp");

    if invalid {
        return Err(AgentflowError::InvalidArtifactName {
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{NodeStatus, RunMode, RunStatus};
    use crate::engine::ExecutionResult;
    use tempfile::TempDir;

    fn sample(run_id: &RunId) -> Checkpoint {
        let mut cp = Checkpoint::new(
            run_id,
            "writer",
            "write report",
            RunMode {
                parallel: true,
                continue_on_failure: false,
                max_concurrent: Some(2),
                resumed: false,
            },
            ["outline".to_string(), "draft".to_string()],
        );
        cp.record(
            &ExecutionResult {
                name: "outline".into(),
                index: 0,
                output: "1. intro".into(),
                duration_ms: 12,
                tokens_used: 40,
                success: true,
                error: None,
                model: Some("sonnet".into()),
                skipped: false,
            },
            Utc::now(),
        );
        cp.shared_data
            .insert("temperature".into(), serde_json::json!(0.7));
        cp
    }

    fn store(dir: &TempDir) -> FilesystemCheckpointStore {
        FilesystemCheckpointStore::new(dir.path())
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let id = RunId::generate();

        let mut cp = sample(&id);
        let path = store.save(&mut cp).await.unwrap();
        assert!(path.ends_with("checkpoint.json"));
        assert!(!cp.checksum.is_empty());

        let loaded = store.load(id.as_str()).await.unwrap();
        assert_eq!(loaded, cp);
        assert_eq!(loaded.node_states[0].status, NodeStatus::Completed);
        assert!(store.exists(id.as_str()).await.unwrap());
    }

    #[tokio::test]
    async fn test_layout_and_metadata() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let id = RunId::generate();

        store.save(&mut sample(&id)).await.unwrap();

        let run_dir = dir.path().join(id.as_str());
        assert!(run_dir.join("metadata.json").is_file());
        assert!(run_dir.join("artifacts").is_dir());
        assert!(run_dir.join("logs").is_dir());

        let leftovers: Vec<_> = std::fs::read_dir(&run_dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let metadata = store.load_metadata(id.as_str()).await.unwrap();
        assert_eq!(metadata.total_stages, 2);
        assert_eq!(metadata.completed_stages, 1);
        assert_eq!(metadata.status, RunStatus::InProgress);
        assert_eq!(metadata.agent, "writer");
    }

    #[tokio::test]
    async fn test_tampered_value_is_detected() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let id = RunId::generate();
        let path = store.save(&mut sample(&id)).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let tampered = content.replace("write report", "write invoice");
        assert_ne!(content, tampered);
        std::fs::write(&path, tampered).unwrap();

        let err = store.load(id.as_str()).await.unwrap_err();
        assert!(matches!(err, AgentflowError::ChecksumMismatch { .. }));
    }

    #[tokio::test]
    async fn test_truncated_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let id = RunId::generate();
        let path = store.save(&mut sample(&id)).await.unwrap();

        let content = std::fs::read(&path).unwrap();
        std::fs::write(&path, &content[..content.len() / 2]).unwrap();

        let err = store.load(id.as_str()).await.unwrap_err();
        assert!(matches!(err, AgentflowError::CorruptCheckpoint { .. }));
    }

    #[tokio::test]
    async fn test_missing_required_field() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let id = RunId::generate();
        let path = store.save(&mut sample(&id)).await.unwrap();

        let mut value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        value.as_object_mut().unwrap().remove("mode");
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        match store.load(id.as_str()).await {
            Err(AgentflowError::MissingCheckpointField { field, .. }) => assert_eq!(field, "mode"),
            other => panic!("expected missing field, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_newer_schema_fails_closed() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let id = RunId::generate();
        let path = store.save(&mut sample(&id)).await.unwrap();

        // Re-sign with a future schema version so only the version check trips
        let mut value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        value["schemaVersion"] = serde_json::json!(99);
        value["checksum"] = serde_json::json!(crate::checkpoint::checksum_of(&value).unwrap());
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        match store.load(id.as_str()).await {
            Err(AgentflowError::IncompatibleSchemaVersion { found, .. }) => assert_eq!(found, 99),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_checkpoint() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let id = RunId::generate();

        assert!(!store.exists(id.as_str()).await.unwrap());
        assert!(matches!(
            store.load(id.as_str()).await,
            Err(AgentflowError::CheckpointNotFound { .. })
        ));
        assert!(matches!(
            store.delete(id.as_str()).await,
            Err(AgentflowError::CheckpointNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_run_ids_rejected_everywhere() {
        let dir = TempDir::new().unwrap();
        let store = FilesystemCheckpointStore::new(dir.path().join("root"));
        let outside = dir.path().join("victim");
        std::fs::create_dir_all(&outside).unwrap();

        for bad in ["../../../etc/passwd", "not-a-uuid", "../victim"] {
            let invalid = |r: &Result<_, AgentflowError>| {
                matches!(r, Err(AgentflowError::InvalidRunIdFormat { .. }))
            };

            assert!(invalid(&store.load(bad).await.map(|_| ())));
            assert!(invalid(&store.exists(bad).await.map(|_| ())));
            assert!(invalid(&store.delete(bad).await));
            assert!(invalid(&store.load_metadata(bad).await.map(|_| ())));
            assert!(invalid(&store.write_artifact(bad, "x.md", b"x").await.map(|_| ())));
            assert!(invalid(&store.append_log(bad, "x").await));

            let mut cp = sample(&RunId::generate());
            cp.run_id = bad.to_string();
            assert!(invalid(&store.save(&mut cp).await.map(|_| ())));
        }

        assert!(outside.is_dir());
        assert!(!dir.path().join("root").exists());
    }

    #[tokio::test]
    async fn test_list_sorted_by_update() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();

        let older = FilesystemCheckpointStore::new(dir.path()).with_clock(move || now - Duration::hours(2));
        let newer = FilesystemCheckpointStore::new(dir.path()).with_clock(move || now);

        let old_id = RunId::generate();
        let new_id = RunId::generate();
        older.save(&mut sample(&old_id)).await.unwrap();
        newer.save(&mut sample(&new_id)).await.unwrap();
        std::fs::create_dir_all(dir.path().join("scratch")).unwrap();

        let listed = newer.list().await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|cp| cp.run_id.as_str()).collect();
        assert_eq!(ids, vec![new_id.as_str(), old_id.as_str()]);

        let limited = newer
            .list_metadata(&RunFilter {
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].run_id, new_id.as_str());
    }

    #[tokio::test]
    async fn test_list_metadata_filters() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let mut done = sample(&RunId::generate());
        done.record(
            &ExecutionResult {
                name: "draft".into(),
                index: 1,
                output: "text".into(),
                duration_ms: 1,
                tokens_used: 1,
                success: true,
                error: None,
                model: None,
                skipped: false,
            },
            Utc::now(),
        );
        store.save(&mut done).await.unwrap();
        store.save(&mut sample(&RunId::generate())).await.unwrap();

        let completed = store
            .list_metadata(&RunFilter {
                status: Some(RunStatus::Completed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].run_id, done.run_id);

        let other_agent = store
            .list_metadata(&RunFilter {
                agent: Some("reviewer".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(other_agent.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired_runs() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();

        let stale_store =
            FilesystemCheckpointStore::new(dir.path()).with_clock(move || now - Duration::days(10));
        let fresh_store =
            FilesystemCheckpointStore::new(dir.path()).with_clock(move || now - Duration::days(3));

        let stale = RunId::generate();
        let fresh = RunId::generate();
        stale_store.save(&mut sample(&stale)).await.unwrap();
        fresh_store.save(&mut sample(&fresh)).await.unwrap();

        let store = FilesystemCheckpointStore::new(dir.path()).with_clock(move || now);
        assert_eq!(store.cleanup(7).await.unwrap(), 1);

        assert!(!store.exists(stale.as_str()).await.unwrap());
        assert!(store.exists(fresh.as_str()).await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_continues_past_failed_removal() {
        let dir = TempDir::new().unwrap();
        let now = Utc::now();

        let stale_store =
            FilesystemCheckpointStore::new(dir.path()).with_clock(move || now - Duration::days(30));
        let stuck = RunId::generate();
        let removable = RunId::generate();
        stale_store.save(&mut sample(&stuck)).await.unwrap();
        stale_store.save(&mut sample(&removable)).await.unwrap();

        let stuck_dir = dir.path().join(stuck.as_str());
        let store = FilesystemCheckpointStore::new(dir.path())
            .with_clock(move || now)
            .with_remove_dir(move |path| {
                if path == stuck_dir.as_path() {
                    Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "busy"))
                } else {
                    std::fs::remove_dir_all(path)
                }
            });

        assert_eq!(store.cleanup(7).await.unwrap(), 1);
        assert!(store.exists(stuck.as_str()).await.unwrap());
        assert!(!store.exists(removable.as_str()).await.unwrap());

        // The failed run is retried on the next sweep
        let store = FilesystemCheckpointStore::new(dir.path()).with_clock(move || now);
        assert_eq!(store.cleanup(7).await.unwrap(), 1);
        assert!(!store.exists(stuck.as_str()).await.unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cleanup_skips_run_it_cannot_delete() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let now = Utc::now();

        let stale_store =
            FilesystemCheckpointStore::new(dir.path()).with_clock(move || now - Duration::days(30));
        let locked = RunId::generate();
        let open = RunId::generate();
        stale_store.save(&mut sample(&locked)).await.unwrap();
        stale_store.save(&mut sample(&open)).await.unwrap();
        stale_store
            .write_artifact(locked.as_str(), "000-outline.md", b"keep")
            .await
            .unwrap();

        let artifacts = dir.path().join(locked.as_str()).join(ARTIFACTS_DIR);
        std::fs::set_permissions(&artifacts, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users ignore directory permissions
        let writable = std::fs::write(artifacts.join("write-check"), b"").is_ok();
        let store = FilesystemCheckpointStore::new(dir.path()).with_clock(move || now);
        let removed = store.cleanup(7).await.unwrap();
        std::fs::set_permissions(&artifacts, std::fs::Permissions::from_mode(0o755)).ok();

        if writable {
            assert_eq!(removed, 2);
            return;
        }

        assert_eq!(removed, 1);
        assert!(dir.path().join(locked.as_str()).is_dir());
        assert!(!dir.path().join(open.as_str()).exists());
    }

    #[tokio::test]
    async fn test_delete_removes_run_directory() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let id = RunId::generate();

        store.save(&mut sample(&id)).await.unwrap();
        store.write_artifact(id.as_str(), "000-outline.md", b"1. intro").await.unwrap();
        store.delete(id.as_str()).await.unwrap();

        assert!(!dir.path().join(id.as_str()).exists());
    }

    #[tokio::test]
    async fn test_artifacts_and_logs() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let id = RunId::generate();

        store.write_artifact(id.as_str(), "001-draft.md", b"b").await.unwrap();
        store.write_artifact(id.as_str(), "000-outline.md", b"a").await.unwrap();
        assert_eq!(
            store.list_artifacts(id.as_str()).await.unwrap(),
            vec!["000-outline.md".to_string(), "001-draft.md".to_string()]
        );

        for bad in ["", "..", "../x", "a/b", "a\\b"] {
            assert!(matches!(
                store.write_artifact(id.as_str(), bad, b"x").await,
                Err(AgentflowError::InvalidArtifactName { .. })
            ));
        }

        store.append_log(id.as_str(), "outline completed").await.unwrap();
        store.append_log(id.as_str(), "draft failed").await.unwrap();
        let log = store.read_log(id.as_str()).await.unwrap();
        assert_eq!(log.lines().count(), 2);
        assert!(log.lines().next().unwrap().ends_with("outline completed"));
    }
}
