//! Review session types for revlens.
//!
//! A review session is one pull/merge request, identified by host,
//! organization, repository and change-request number. The fetched view of
//! that change is a [`SessionSnapshot`]; the cached unit is a
//! [`SessionRecord`] which layers optional AI analysis on top.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::AnalysisResult;

/// Opaque key joining a session across all cache collections.
///
/// Derived as `{host}/{owner}/{repo}/{number}` with the host lowercased.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(pub String);

impl SessionKey {
    /// Build a key from its parts.
    pub fn new(host: &str, owner: &str, repo: &str, number: u64) -> Self {
        Self(format!("{}/{owner}/{repo}/{number}", host.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which code host flavour a session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    GitHub,
    GitLab,
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostKind::GitHub => write!(f, "github"),
            HostKind::GitLab => write!(f, "gitlab"),
        }
    }
}

/// Structured identity of a review session.
///
/// Parsed from a change-request URL, e.g.
/// `https://github.com/acme/widgets/pull/42` or
/// `https://gitlab.example.com/group/sub/widgets/-/merge_requests/7`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentifier {
    pub kind: HostKind,
    pub host: String,
    /// Organization, user, or (for GitLab) the full group path.
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

impl SessionIdentifier {
    /// The cache key for this session.
    pub fn key(&self) -> SessionKey {
        SessionKey::new(&self.host, &self.owner, &self.repo, self.number)
    }
}

impl fmt::Display for SessionIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            HostKind::GitHub => write!(
                f,
                "https://{}/{}/{}/pull/{}",
                self.host, self.owner, self.repo, self.number
            ),
            HostKind::GitLab => write!(
                f,
                "https://{}/{}/{}/-/merge_requests/{}",
                self.host, self.owner, self.repo, self.number
            ),
        }
    }
}

impl FromStr for SessionIdentifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);
        let segments: Vec<&str> = without_scheme
            .split(['/', '?', '#'])
            .take_while(|seg| !seg.contains('='))
            .filter(|seg| !seg.is_empty())
            .collect();

        let invalid = || format!("not a pull or merge request URL: '{s}'");

        if segments.len() < 5 {
            return Err(invalid());
        }
        let host = segments[0].to_lowercase();

        // GitLab: host/<group path>/repo/-/merge_requests/N
        if let Some(pos) = segments.iter().position(|seg| *seg == "-") {
            if segments.get(pos + 1) != Some(&"merge_requests") || pos < 3 {
                return Err(invalid());
            }
            let number = segments
                .get(pos + 2)
                .and_then(|n| n.parse::<u64>().ok())
                .ok_or_else(invalid)?;
            return Ok(Self {
                kind: HostKind::GitLab,
                host,
                owner: segments[1..pos - 1].join("/"),
                repo: segments[pos - 1].to_string(),
                number,
            });
        }

        // GitHub: host/owner/repo/pull/N
        if segments[3] != "pull" && segments[3] != "pulls" {
            return Err(invalid());
        }
        let number = segments[4].parse::<u64>().map_err(|_| invalid())?;
        Ok(Self {
            kind: HostKind::GitHub,
            host,
            owner: segments[1].to_string(),
            repo: segments[2].to_string(),
            number,
        })
    }
}

/// Merge/close status of the reviewed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChangeState {
    #[default]
    Open,
    Merged,
    Closed,
}

impl fmt::Display for ChangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeState::Open => write!(f, "open"),
            ChangeState::Merged => write!(f, "merged"),
            ChangeState::Closed => write!(f, "closed"),
        }
    }
}

/// How a file changed in the reviewed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Added,
    #[default]
    Modified,
    Removed,
    Renamed,
}

/// One changed file with its unified diff and, when available, full content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    #[serde(default)]
    pub status: FileStatus,
    pub diff: String,
    /// Full post-change file content; absent for deleted or binary files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub additions: u32,
    #[serde(default)]
    pub deletions: u32,
}

/// A reviewer comment left on the change (general or inline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub author: String,
    pub body: String,
    /// File the comment is attached to; `None` for conversation comments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fetched, effectively-immutable view of a review session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub identifier: SessionIdentifier,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub author: String,
    #[serde(default)]
    pub state: ChangeState,
    #[serde(default)]
    pub files: Vec<FileChange>,
    #[serde(default)]
    pub review_comments: Vec<ReviewComment>,
    /// Repository-level review instructions, if the repository ships any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,
}

impl SessionSnapshot {
    pub fn key(&self) -> SessionKey {
        self.identifier.key()
    }

    /// Look up a changed file by path.
    pub fn file(&self, path: &str) -> Option<&FileChange> {
        self.files.iter().find(|f| f.path == path)
    }
}

/// The cached unit: a snapshot plus optional AI analysis.
///
/// `saved_at` is rewritten on every save, including analysis-only updates,
/// and is the only ordering key used for capacity eviction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub key: SessionKey,
    pub snapshot: SessionSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    pub saved_at: DateTime<Utc>,
}
