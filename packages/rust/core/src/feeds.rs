//! Feed configuration loading and run input validation.
//!
//! Problems are collected rather than returned on first failure, so a single
//! run reports every bad descriptor and missing directory at once.

use std::path::Path;

use tracing::{debug, error, warn};
use url::Url;

use feedpublish_shared::{
    Category, FeedConfig, FeedDescriptor, FeedPublishError, FeedRegistry, Result,
};

/// On-disk locations a publish run reads from.
#[derive(Debug, Clone, Copy)]
pub struct InputPaths<'a> {
    pub manifests_dir: &'a Path,
    pub blob_assets_dir: &'a Path,
    pub package_assets_dir: &'a Path,
}

/// Validate one descriptor, returning every problem with it.
pub fn check_feed(descriptor: &FeedDescriptor) -> std::result::Result<FeedConfig, Vec<String>> {
    let label = if descriptor.category.trim().is_empty() {
        "<unnamed>"
    } else {
        descriptor.category.trim()
    };
    let mut problems = Vec::new();

    if descriptor.category.trim().is_empty() {
        problems.push("feed has an empty category".to_string());
    }

    let url = match descriptor.url.trim() {
        "" => {
            problems.push(format!("feed '{label}' is missing a target URL"));
            None
        }
        raw => match Url::parse(raw) {
            Ok(url) => Some(url),
            Err(e) => {
                problems.push(format!("feed '{label}' has an invalid URL '{raw}': {e}"));
                None
            }
        },
    };

    if descriptor.feed_type.trim().is_empty() {
        problems.push(format!("feed '{label}' is missing a feed type"));
    }

    let token = descriptor.resolve_token();
    if token.trim().is_empty() {
        let hint = match &descriptor.token_env {
            Some(var) => format!(" (env var {var} is unset or empty)"),
            None => String::new(),
        };
        problems.push(format!("feed '{label}' is missing an access token{hint}"));
    }

    match url {
        Some(url) if problems.is_empty() => Ok(FeedConfig {
            category: Category::new(descriptor.category.as_str()),
            url,
            feed_type: descriptor.feed_type.trim().to_string(),
            token,
        }),
        _ => Err(problems),
    }
}

/// Collect problems for every descriptor and build the registry from the
/// valid ones.
fn collect_feeds(descriptors: &[FeedDescriptor], problems: &mut Vec<String>) -> FeedRegistry {
    let mut registry = FeedRegistry::new();

    for descriptor in descriptors {
        match check_feed(descriptor) {
            Ok(feed) => {
                if let Err(e) = registry.insert(feed) {
                    problems.push(e.to_string());
                }
            }
            Err(mut found) => problems.append(&mut found),
        }
    }

    if descriptors.is_empty() {
        warn!("no feeds configured");
    }

    registry
}

/// Validate feed descriptors on their own.
pub fn load_feeds(descriptors: &[FeedDescriptor]) -> Result<FeedRegistry> {
    let mut problems = Vec::new();
    let registry = collect_feeds(descriptors, &mut problems);
    finish(registry, problems)
}

/// Validate input directories and feed descriptors in one pass.
pub fn validate_inputs(
    paths: &InputPaths<'_>,
    descriptors: &[FeedDescriptor],
) -> Result<FeedRegistry> {
    let mut problems = Vec::new();

    for (what, dir) in [
        ("manifest directory", paths.manifests_dir),
        ("blob assets directory", paths.blob_assets_dir),
        ("package assets directory", paths.package_assets_dir),
    ] {
        if !dir.is_dir() {
            problems.push(format!("{what} '{}' does not exist", dir.display()));
        }
    }

    let registry = collect_feeds(descriptors, &mut problems);
    finish(registry, problems)
}

fn finish(registry: FeedRegistry, problems: Vec<String>) -> Result<FeedRegistry> {
    if problems.is_empty() {
        debug!(feeds = registry.len(), "feed configuration valid");
        return Ok(registry);
    }

    for problem in &problems {
        error!("{problem}");
    }
    Err(FeedPublishError::Invalid { problems })
}
