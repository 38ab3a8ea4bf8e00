//! End-to-end `publish` run: validate → load manifests → classify → route → publish.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use url::Url;

use feedpublish_publisher::{FeedPublisher, PublishContext, PublishRequest, PublishSummary};
use feedpublish_shared::{
    Category, CategoryGroups, FeedDescriptor, FeedPublishError, FeedRegistry, Result, RunId,
    UnmappedPolicy,
};

use crate::classify;
use crate::feeds::{self, InputPaths};
use crate::manifest::{self, LoadedManifest};

/// Configuration for a publish run.
#[derive(Debug, Clone)]
pub struct PublishRunConfig {
    /// Directory holding the manifest files.
    pub manifests_dir: PathBuf,
    /// Directory blob artifacts are read from.
    pub blob_assets_dir: PathBuf,
    /// Directory package artifacts are read from.
    pub package_assets_dir: PathBuf,
    /// Build being published.
    pub build_id: u64,
    /// Build registry endpoint.
    pub api_endpoint: Url,
    /// Build registry token.
    pub api_token: String,
    /// Raw feed descriptors, validated at the start of the run.
    pub feeds: Vec<FeedDescriptor>,
    /// Handling of categories with no feed.
    pub unmapped: UnmappedPolicy,
    /// Extension identifying manifest files.
    pub manifest_extension: String,
}

/// What happened to one manifest.
#[derive(Debug, Clone)]
pub struct ManifestReport {
    pub path: PathBuf,
    pub name: String,
    /// Categories dropped under [`UnmappedPolicy::Skip`].
    pub skipped: Vec<Category>,
    pub summary: PublishSummary,
}

/// Result of a publish run.
#[derive(Debug)]
pub struct PublishRunResult {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub manifests: Vec<ManifestReport>,
    pub elapsed: std::time::Duration,
}

impl PublishRunResult {
    pub fn artifact_count(&self) -> usize {
        self.manifests.iter().map(|m| m.summary.artifact_count()).sum()
    }
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once a manifest has been published.
    fn manifest_published(&self, path: &Path, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, result: &PublishRunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn manifest_published(&self, _path: &Path, _current: usize, _total: usize) {}
    fn done(&self, _result: &PublishRunResult) {}
}

/// A manifest classified and routed, ready for its publish call.
struct RoutedManifest {
    loaded: LoadedManifest,
    groups: CategoryGroups,
    skipped: Vec<Category>,
}

/// Run the full publish pipeline.
///
/// 1. Validate input directories and feed descriptors (all problems at once)
/// 2. Load every manifest (all parse failures at once)
/// 3. Classify artifacts into category groups
/// 4. Check every category has a feed, per the unmapped policy
/// 5. Publish once per manifest, in file-name order
///
/// Nothing is published unless steps 1–4 succeed for every manifest.
#[instrument(
    skip_all,
    fields(build_id = config.build_id, manifests = %config.manifests_dir.display())
)]
pub async fn publish_all<P: FeedPublisher>(
    config: &PublishRunConfig,
    publisher: &P,
    progress: &dyn ProgressReporter,
) -> Result<PublishRunResult> {
    let start = Instant::now();
    let started_at = Utc::now();
    let run_id = RunId::new();

    info!(%run_id, build_id = config.build_id, "starting publish run");

    // --- Phase 1: Validate inputs ---
    progress.phase("Validating inputs");
    let paths = InputPaths {
        manifests_dir: &config.manifests_dir,
        blob_assets_dir: &config.blob_assets_dir,
        package_assets_dir: &config.package_assets_dir,
    };
    let registry = feeds::validate_inputs(&paths, &config.feeds)?;

    // --- Phase 2: Load manifests ---
    progress.phase("Loading manifests");
    let loaded = manifest::load_all(&config.manifests_dir, &config.manifest_extension)?;

    // --- Phase 3 + 4: Classify and route ---
    progress.phase("Classifying artifacts");
    let routed = route(loaded, &registry, config.unmapped)?;

    // --- Phase 5: Publish ---
    let context = PublishContext {
        build_id: config.build_id,
        api_endpoint: config.api_endpoint.clone(),
        api_token: config.api_token.clone(),
        blob_assets_dir: config.blob_assets_dir.clone(),
        package_assets_dir: config.package_assets_dir.clone(),
    };

    let total = routed.len();
    let mut manifests = Vec::with_capacity(total);

    for (i, item) in routed.into_iter().enumerate() {
        progress.phase(&format!("Publishing {}", item.loaded.display_name()));

        let request = PublishRequest {
            manifest_path: &item.loaded.path,
            feeds: &registry,
            groups: &item.groups,
            context: &context,
        };
        let summary = publisher.publish(&request).await?;

        info!(
            manifest = %item.loaded.path.display(),
            artifacts = summary.artifact_count(),
            bytes = summary.total_bytes(),
            "manifest published"
        );
        progress.manifest_published(&item.loaded.path, i + 1, total);

        manifests.push(ManifestReport {
            name: item.loaded.display_name(),
            path: item.loaded.path,
            skipped: item.skipped,
            summary,
        });
    }

    let result = PublishRunResult {
        run_id,
        started_at,
        manifests,
        elapsed: start.elapsed(),
    };

    info!(
        run_id = %result.run_id,
        manifests = result.manifests.len(),
        artifacts = result.artifact_count(),
        elapsed_ms = result.elapsed.as_millis() as u64,
        "publish run complete"
    );

    progress.done(&result);
    Ok(result)
}

/// Classify every manifest and apply the unmapped-category policy.
fn route(
    loaded: Vec<LoadedManifest>,
    registry: &FeedRegistry,
    policy: UnmappedPolicy,
) -> Result<Vec<RoutedManifest>> {
    let mut routed = Vec::with_capacity(loaded.len());
    let mut problems = Vec::new();

    for item in loaded {
        let mut groups = classify::classify(&item.manifest);
        let unmapped: Vec<Category> = groups
            .categories()
            .into_iter()
            .filter(|c| !registry.contains(c))
            .cloned()
            .collect();

        let skipped = match policy {
            UnmappedPolicy::Fail => {
                for category in &unmapped {
                    problems.push(format!(
                        "category '{category}' in {} has no configured feed",
                        item.path.display()
                    ));
                }
                Vec::new()
            }
            UnmappedPolicy::Skip => {
                for category in &unmapped {
                    warn!(
                        %category,
                        manifest = %item.path.display(),
                        "no feed configured, skipping category"
                    );
                }
                groups.retain(|c| registry.contains(c));
                unmapped
            }
        };

        routed.push(RoutedManifest {
            loaded: item,
            groups,
            skipped,
        });
    }

    if !problems.is_empty() {
        for problem in &problems {
            tracing::error!("{problem}");
        }
        return Err(FeedPublishError::Invalid { problems });
    }

    Ok(routed)
}

/// Load and classify a single manifest file, without any feed checks.
pub fn classify_manifest_file(path: &Path) -> Result<CategoryGroups> {
    let manifest = manifest::load_manifest(path)?;
    Ok(classify::classify(&manifest))
}
