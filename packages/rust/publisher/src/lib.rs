//! Feed publishing.
//!
//! The pipeline hands each manifest's category groups to a [`FeedPublisher`]
//! exactly once. [`HttpPublisher`] uploads every artifact to its category's
//! feed; [`DryRunPublisher`] only reports what would be uploaded.

mod dry_run;
mod http;

use std::path::{Path, PathBuf};

use feedpublish_shared::{ArtifactKind, Category, CategoryGroups, FeedRegistry, Result};
use url::Url;

pub use dry_run::DryRunPublisher;
pub use http::{HttpPublisher, PublisherOptions};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Per-run inputs shared by every publish call.
#[derive(Clone)]
pub struct PublishContext {
    /// Numeric id of the build being published.
    pub build_id: u64,
    /// Build registry API endpoint. Published assets are recorded under
    /// `builds/<build_id>/assets`.
    pub api_endpoint: Url,
    /// Build registry access token.
    pub api_token: String,
    /// Directory blob artifact ids are resolved against.
    pub blob_assets_dir: PathBuf,
    /// Directory package artifact ids are resolved against.
    pub package_assets_dir: PathBuf,
}

impl PublishContext {
    /// The directory an artifact of `kind` is read from.
    pub fn assets_dir(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Package => &self.package_assets_dir,
            ArtifactKind::Blob => &self.blob_assets_dir,
        }
    }
}

impl std::fmt::Debug for PublishContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishContext")
            .field("build_id", &self.build_id)
            .field("api_endpoint", &self.api_endpoint.as_str())
            .field("api_token", &"<redacted>")
            .field("blob_assets_dir", &self.blob_assets_dir)
            .field("package_assets_dir", &self.package_assets_dir)
            .finish()
    }
}

/// Everything one publish call needs: a manifest's groups plus the feeds.
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    pub manifest_path: &'a Path,
    pub feeds: &'a FeedRegistry,
    pub groups: &'a CategoryGroups,
    pub context: &'a PublishContext,
}

/// Outcome for a single (kind, category) group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSummary {
    pub kind: ArtifactKind,
    pub category: Category,
    pub feed_url: String,
    pub artifacts: usize,
    pub bytes: u64,
}

/// Outcome of one publish call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishSummary {
    pub groups: Vec<GroupSummary>,
}

impl PublishSummary {
    pub fn artifact_count(&self) -> usize {
        self.groups.iter().map(|g| g.artifacts).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.groups.iter().map(|g| g.bytes).sum()
    }
}

// ---------------------------------------------------------------------------
// Publisher seam
// ---------------------------------------------------------------------------

/// Pushes a manifest's category groups to their configured feeds.
///
/// Called once per manifest. Implementations may assume every category in
/// `request.groups` has a feed in `request.feeds`.
#[allow(async_fn_in_trait)]
pub trait FeedPublisher {
    async fn publish(&self, request: &PublishRequest<'_>) -> Result<PublishSummary>;
}
