//! Code-host client port.
//!
//! A stateless request/response facade over GitHub/GitLab. The core only
//! needs the two reads below; concrete clients live outside this crate.

use revlens_types::error::HostError;
use revlens_types::session::{ReviewComment, SessionIdentifier, SessionSnapshot};

pub trait CodeHostClient: Send + Sync {
    /// Fetch title, metadata and per-file diffs of a change request.
    fn fetch_session(
        &self,
        identifier: &SessionIdentifier,
    ) -> impl std::future::Future<Output = Result<SessionSnapshot, HostError>> + Send;

    /// Fetch reviewer comments, general and inline.
    fn fetch_review_comments(
        &self,
        identifier: &SessionIdentifier,
    ) -> impl std::future::Future<Output = Result<Vec<ReviewComment>, HostError>> + Send;
}
