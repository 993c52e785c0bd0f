//! Filesystem change detection against the content cache.
//!
//! Turns raw create/change/delete notifications into content deltas without
//! attributing them — actor classification is the engine's job. Excluded
//! paths are dropped before this module is reached; what arrives here is
//! read, size-gated and compared against the last known content so that
//! no-op notifications (editor temp churn, touch without change) vanish
//! silently. A background warm-up task pre-populates the cache at session
//! start so the first real change of each file still has a baseline.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::host::FsNotification;
use crate::model::event::FileChangeKind;

use super::content_cache::ContentCache;

/// A raw content delta for one on-disk change, before attribution.
#[derive(Debug, Clone)]
pub struct FileDelta {
    pub path: PathBuf,
    pub kind: FileChangeKind,
    pub old: Option<String>,
    pub new: Option<String>,
}

/// Detects content-level changes for workspace files.
#[derive(Debug)]
pub struct FsChangeDetector {
    root: PathBuf,
    max_file_bytes: u64,
}

impl FsChangeDetector {
    pub fn new(root: &Path, max_file_bytes: u64) -> Self {
        Self {
            root: root.to_path_buf(),
            max_file_bytes,
        }
    }

    /// Process one raw notification, returning a delta when the file's
    /// content actually changed. Unreadable files drop silently; the session
    /// must survive transient I/O trouble.
    pub async fn process(
        &self,
        cache: &mut ContentCache,
        notification: &FsNotification,
    ) -> Option<FileDelta> {
        match notification {
            FsNotification::Deleted(path) => {
                let old = cache.remove(path)?;
                Some(FileDelta {
                    path: path.clone(),
                    kind: FileChangeKind::Deleted,
                    old: Some(old),
                    new: None,
                })
            }
            FsNotification::Created(path) | FsNotification::Changed(path) => {
                let known = cache.contains(path);
                if !known && !self.is_workspace_file(path).await {
                    return None;
                }

                let new = self.read_tracked(path).await?;
                let old = cache.get(path).cloned();

                let fresh_create = !known && matches!(notification, FsNotification::Created(_));
                if old.as_deref() == Some(new.as_str()) && !fresh_create {
                    return None;
                }

                let kind = if known {
                    FileChangeKind::Modified
                } else {
                    FileChangeKind::Created
                };
                cache.insert(path.clone(), new.clone());
                Some(FileDelta {
                    path: path.clone(),
                    kind,
                    old,
                    new: Some(new),
                })
            }
        }
    }

    /// Confirm a previously unseen path is a regular file inside the workspace.
    async fn is_workspace_file(&self, path: &Path) -> bool {
        if path.strip_prefix(&self.root).is_err() {
            return false;
        }
        tokio::fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Read a file's content if it is trackable: within the size ceiling and
    /// valid UTF-8. Anything else returns `None`.
    pub async fn read_tracked(&self, path: &Path) -> Option<String> {
        let metadata = tokio::fs::metadata(path).await.ok()?;
        if !metadata.is_file() || metadata.len() > self.max_file_bytes {
            return None;
        }
        let bytes = tokio::fs::read(path).await.ok()?;
        String::from_utf8(bytes).ok()
    }
}

/// Eagerly warm the content cache: walk the workspace respecting ignore
/// rules, read every trackable file and send it back for the serialized
/// engine path to absorb, yielding between files so the walk never starves
/// notification delivery.
pub fn spawn_cache_warm(
    root: PathBuf,
    max_file_bytes: u64,
    tx: mpsc::UnboundedSender<(PathBuf, String)>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let walk_root = root.clone();
        let paths = tokio::task::spawn_blocking(move || {
            let mut paths = Vec::new();
            for entry in ignore::WalkBuilder::new(&walk_root).build().flatten() {
                if entry.file_type().is_some_and(|t| t.is_file()) {
                    paths.push(entry.into_path());
                }
            }
            paths
        })
        .await
        .unwrap_or_default();

        let detector = FsChangeDetector::new(&root, max_file_bytes);
        let mut warmed = 0usize;
        for path in paths {
            if let Some(content) = detector.read_tracked(&path).await {
                if tx.send((path, content)).is_err() {
                    // Engine gone; the session ended under us.
                    return;
                }
                warmed += 1;
            }
            tokio::task::yield_now().await;
        }
        tracing::debug!("Content cache warm-up finished: {} files", warmed);
    })
}
