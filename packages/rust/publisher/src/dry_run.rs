//! Publisher that reports instead of uploading.

use feedpublish_shared::{FeedPublishError, Result};
use tracing::info;

use crate::http::registry_url;
use crate::{FeedPublisher, GroupSummary, PublishRequest, PublishSummary};

/// Logs each group it would push and returns the summary. Reads no files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunPublisher;

impl FeedPublisher for DryRunPublisher {
    async fn publish(&self, request: &PublishRequest<'_>) -> Result<PublishSummary> {
        let mut summary = PublishSummary::default();

        for (kind, category, artifacts) in request.groups.iter() {
            let feed = request.feeds.get(category).ok_or_else(|| {
                FeedPublishError::config(format!("no feed configured for category '{category}'"))
            })?;

            for artifact in artifacts {
                info!(
                    %kind,
                    %category,
                    id = %artifact.id,
                    feed = %feed.url,
                    "dry run: would publish"
                );
            }

            summary.groups.push(GroupSummary {
                kind,
                category: category.clone(),
                feed_url: feed.url.to_string(),
                artifacts: artifacts.len(),
                bytes: 0,
            });
        }

        let registry = registry_url(&request.context.api_endpoint, request.context.build_id)?;
        info!(
            %registry,
            assets = summary.artifact_count(),
            "dry run: would record build assets"
        );

        Ok(summary)
    }
}
