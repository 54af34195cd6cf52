//! Filesystem-backed code host.
//!
//! [`SnapshotDirHost`] implements `CodeHostClient` over exported snapshot
//! files, so sessions can be opened by URL without network access. Layout:
//!
//! ```text
//! {root}/{host}/{owner}/{repo}/{number}.json           SessionSnapshot
//! {root}/{host}/{owner}/{repo}/{number}.comments.json  Vec<ReviewComment> (optional)
//! ```

use std::path::{Path, PathBuf};

use revlens_core::host::CodeHostClient;
use revlens_types::error::HostError;
use revlens_types::session::{ReviewComment, SessionIdentifier, SessionSnapshot};

/// Directory name of the snapshot root inside the data directory.
pub const SNAPSHOTS_DIR: &str = "snapshots";

pub struct SnapshotDirHost {
    root: PathBuf,
}

impl SnapshotDirHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Snapshot root inside `data_dir`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(SNAPSHOTS_DIR))
    }

    fn session_dir(&self, id: &SessionIdentifier) -> PathBuf {
        let mut dir = self.root.join(id.host.to_lowercase());
        // GitLab owners may be nested group paths.
        for segment in id.owner.split('/') {
            dir.push(segment);
        }
        dir.join(&id.repo)
    }

    pub fn snapshot_path(&self, id: &SessionIdentifier) -> PathBuf {
        self.session_dir(id).join(format!("{}.json", id.number))
    }

    pub fn comments_path(&self, id: &SessionIdentifier) -> PathBuf {
        self.session_dir(id).join(format!("{}.comments.json", id.number))
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, HostError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(HostError::Unavailable(format!(
            "failed to read {}: {err}",
            path.display()
        ))),
    }
}

impl SnapshotDirHost {
    async fn read_snapshot(&self, identifier: &SessionIdentifier) -> Result<SessionSnapshot, HostError> {
        let path = self.snapshot_path(identifier);
        let content = read_optional(&path)
            .await?
            .ok_or_else(|| HostError::NotFound(identifier.to_string()))?;

        let snapshot: SessionSnapshot = serde_json::from_str(&content)
            .map_err(|e| HostError::InvalidResponse(format!("{}: {e}", path.display())))?;
        if snapshot.identifier.key() != identifier.key() {
            return Err(HostError::InvalidResponse(format!(
                "{} holds {}, expected {}",
                path.display(),
                snapshot.identifier.key(),
                identifier.key()
            )));
        }
        Ok(snapshot)
    }
}

impl CodeHostClient for SnapshotDirHost {
    async fn fetch_session(
        &self,
        identifier: &SessionIdentifier,
    ) -> Result<SessionSnapshot, HostError> {
        let mut snapshot = self.read_snapshot(identifier).await?;
        // The URL the caller used is authoritative for host spelling.
        snapshot.identifier = identifier.clone();
        tracing::debug!(key = %identifier.key(), files = snapshot.files.len(), "loaded snapshot");
        Ok(snapshot)
    }

    /// Comments from the sidecar file, else those embedded in the snapshot.
    async fn fetch_review_comments(
        &self,
        identifier: &SessionIdentifier,
    ) -> Result<Vec<ReviewComment>, HostError> {
        let path = self.comments_path(identifier);
        match read_optional(&path).await? {
            Some(content) => serde_json::from_str(&content)
                .map_err(|e| HostError::InvalidResponse(format!("{}: {e}", path.display()))),
            None => Ok(self.read_snapshot(identifier).await?.review_comments),
        }
    }
}
