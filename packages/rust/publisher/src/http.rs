//! HTTP upload of artifacts to their category's feed.

use feedpublish_shared::{Artifact, ArtifactKind, FeedConfig, FeedPublishError, Result};
use reqwest::Client;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use url::Url;

use crate::{FeedPublisher, GroupSummary, PublishContext, PublishRequest, PublishSummary};

/// Default timeout in seconds for a single upload.
const DEFAULT_TIMEOUT_SECS: u64 = 100;

/// User-Agent string for feed requests.
const USER_AGENT: &str = concat!("feedpublish/", env!("CARGO_PKG_VERSION"));

/// Configuration for the HTTP publisher.
#[derive(Debug, Clone)]
pub struct PublisherOptions {
    /// Timeout for each upload request in seconds.
    pub timeout_secs: u64,
}

impl Default for PublisherOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Uploads each artifact with `PUT <feed url>/<artifact id>`, then records the
/// manifest's assets with `POST <api endpoint>/builds/<build id>/assets`.
///
/// Uploads carry the feed token as a bearer token along with
/// `X-Feed-Type`, `X-Build-Id` and `X-Content-Sha256` headers. The registry
/// call uses the API token.
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    client: Client,
}

impl HttpPublisher {
    pub fn new(opts: &PublisherOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| FeedPublishError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn upload(
        &self,
        feed: &FeedConfig,
        kind: ArtifactKind,
        artifact: &Artifact,
        context: &PublishContext,
    ) -> Result<u64> {
        if !artifact.has_contained_id() {
            return Err(FeedPublishError::validation(format!(
                "artifact id '{}' escapes the {kind} assets directory",
                artifact.id
            )));
        }
        let path = context.assets_dir(kind).join(&artifact.id);
        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| FeedPublishError::io(&path, e))?;
        let len = body.len() as u64;
        let digest = hex_digest(&body);
        let target = artifact_url(&feed.url, &artifact.id)?;

        debug!(%target, bytes = len, "uploading artifact");

        let response = self
            .client
            .put(target.clone())
            .bearer_auth(&feed.token)
            .header("X-Feed-Type", &feed.feed_type)
            .header("X-Build-Id", context.build_id.to_string())
            .header("X-Content-Sha256", digest)
            .body(body)
            .send()
            .await
            .map_err(|e| FeedPublishError::Network(format!("{}: {e}", artifact.id)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedPublishError::Network(format!(
                "{} -> {target}: HTTP {status}",
                artifact.id
            )));
        }

        Ok(len)
    }

    /// Tell the build registry which assets a manifest published.
    async fn record(&self, request: &PublishRequest<'_>, assets: &[AssetRecord<'_>]) -> Result<()> {
        let context = request.context;
        let target = registry_url(&context.api_endpoint, context.build_id)?;
        let record = BuildAssetsRecord {
            manifest: request.manifest_path.display().to_string(),
            assets,
        };

        debug!(%target, assets = assets.len(), "recording build assets");

        let response = self
            .client
            .post(target.clone())
            .bearer_auth(&context.api_token)
            .json(&record)
            .send()
            .await
            .map_err(|e| FeedPublishError::Network(format!("build registry: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedPublishError::Network(format!(
                "build registry {target}: HTTP {status}"
            )));
        }

        Ok(())
    }
}

/// Body of the build registry call.
#[derive(Debug, Serialize)]
struct BuildAssetsRecord<'a> {
    manifest: String,
    assets: &'a [AssetRecord<'a>],
}

#[derive(Debug, Serialize)]
struct AssetRecord<'a> {
    kind: ArtifactKind,
    category: &'a str,
    id: &'a str,
    feed: &'a str,
}

impl FeedPublisher for HttpPublisher {
    #[instrument(skip_all, fields(manifest = %request.manifest_path.display()))]
    async fn publish(&self, request: &PublishRequest<'_>) -> Result<PublishSummary> {
        let mut summary = PublishSummary::default();
        let mut assets = Vec::new();

        for (kind, category, artifacts) in request.groups.iter() {
            let feed = request.feeds.get(category).ok_or_else(|| {
                FeedPublishError::config(format!("no feed configured for category '{category}'"))
            })?;

            let mut bytes = 0;
            for artifact in artifacts {
                bytes += self.upload(feed, kind, artifact, request.context).await?;
                assets.push(AssetRecord {
                    kind,
                    category: category.as_str(),
                    id: &artifact.id,
                    feed: feed.url.as_str(),
                });
            }

            info!(
                %kind,
                %category,
                feed = %feed.url,
                artifacts = artifacts.len(),
                bytes,
                "group published"
            );

            summary.groups.push(GroupSummary {
                kind,
                category: category.clone(),
                feed_url: feed.url.to_string(),
                artifacts: artifacts.len(),
                bytes,
            });
        }

        if !assets.is_empty() {
            self.record(request, &assets).await?;
        }

        Ok(summary)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Copy of `url` whose path ends in `/`, so joins append rather than replace.
fn as_directory(url: &Url) -> Url {
    let mut base = url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

/// Append an artifact id to a feed URL, treating the feed URL as a directory.
fn artifact_url(feed_url: &Url, id: &str) -> Result<Url> {
    let relative = id.replace('\\', "/");
    as_directory(feed_url)
        .join(relative.trim_start_matches('/'))
        .map_err(|e| FeedPublishError::validation(format!("invalid artifact id '{id}': {e}")))
}

/// `<api endpoint>/builds/<build id>/assets`.
pub(crate) fn registry_url(api_endpoint: &Url, build_id: u64) -> Result<Url> {
    as_directory(api_endpoint)
        .join(&format!("builds/{build_id}/assets"))
        .map_err(|e| {
            FeedPublishError::config(format!("invalid API endpoint '{api_endpoint}': {e}"))
        })
}

/// Lowercase hex SHA-256 of the payload.
fn hex_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use feedpublish_shared::{Category, CategoryGroups, FeedRegistry};

    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fp-publisher-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn context(assets: &Path, registry_uri: &str) -> PublishContext {
        PublishContext {
            build_id: 42,
            api_endpoint: Url::parse(&format!("{registry_uri}/api")).unwrap(),
            api_token: "registry-token".into(),
            blob_assets_dir: assets.join("blobs"),
            package_assets_dir: assets.join("packages"),
        }
    }

    fn registry(server_uri: &str) -> FeedRegistry {
        let mut feeds = FeedRegistry::new();
        feeds
            .insert(FeedConfig {
                category: Category::new("NetCore"),
                url: Url::parse(&format!("{server_uri}/netcore")).unwrap(),
                feed_type: "NuGetFeed".into(),
                token: "feed-token".into(),
            })
            .unwrap();
        feeds
    }

    #[test]
    fn test_artifact_url_appends_id() {
        let base = Url::parse("https://feeds.example.com/netcore").unwrap();
        assert_eq!(
            artifact_url(&base, "Foo.1.0.0.nupkg").unwrap().as_str(),
            "https://feeds.example.com/netcore/Foo.1.0.0.nupkg"
        );

        let with_slash = Url::parse("https://feeds.example.com/osx/").unwrap();
        assert_eq!(
            artifact_url(&with_slash, "/installers\\foo.pkg").unwrap().as_str(),
            "https://feeds.example.com/osx/installers/foo.pkg"
        );
    }

    #[test]
    fn test_registry_url() {
        let endpoint = Url::parse("https://registry.example.com/api").unwrap();
        assert_eq!(
            registry_url(&endpoint, 7).unwrap().as_str(),
            "https://registry.example.com/api/builds/7/assets"
        );
    }

    #[test]
    fn test_hex_digest() {
        assert_eq!(
            hex_digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_publish_uploads_each_artifact() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("PUT"))
            .and(wiremock::matchers::path("/netcore/Foo.1.0.0.nupkg"))
            .and(wiremock::matchers::header("authorization", "Bearer feed-token"))
            .and(wiremock::matchers::header("x-feed-type", "NuGetFeed"))
            .and(wiremock::matchers::header("x-build-id", "42"))
            .respond_with(wiremock::ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("PUT"))
            .and(wiremock::matchers::path("/netcore/tools/readme.txt"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/api/builds/42/assets"))
            .respond_with(wiremock::ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = temp_dir();
        std::fs::create_dir_all(tmp.join("packages")).unwrap();
        std::fs::create_dir_all(tmp.join("blobs/tools")).unwrap();
        std::fs::write(tmp.join("packages/Foo.1.0.0.nupkg"), b"package-bytes").unwrap();
        std::fs::write(tmp.join("blobs/tools/readme.txt"), b"hello").unwrap();

        let mut groups = CategoryGroups::default();
        groups
            .packages
            .push("NetCore".into(), Artifact::new("Foo.1.0.0.nupkg"));
        groups
            .blobs
            .push("netcore".into(), Artifact::new("tools/readme.txt"));

        let feeds = registry(&server.uri());
        let ctx = context(&tmp, &server.uri());
        let manifest = tmp.join("manifest.json");
        let request = PublishRequest {
            manifest_path: &manifest,
            feeds: &feeds,
            groups: &groups,
            context: &ctx,
        };

        let publisher = HttpPublisher::new(&PublisherOptions::default()).unwrap();
        let summary = publisher.publish(&request).await.unwrap();

        assert_eq!(summary.groups.len(), 2);
        assert_eq!(summary.artifact_count(), 2);
        assert_eq!(summary.total_bytes(), 13 + 5);
        assert_eq!(summary.groups[0].kind, ArtifactKind::Package);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn test_publish_fails_on_http_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("PUT"))
            .respond_with(wiremock::ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let tmp = temp_dir();
        std::fs::create_dir_all(tmp.join("packages")).unwrap();
        std::fs::write(tmp.join("packages/a.nupkg"), b"x").unwrap();

        let mut groups = CategoryGroups::default();
        groups.packages.push("NetCore".into(), Artifact::new("a.nupkg"));

        let feeds = registry(&server.uri());
        let ctx = context(&tmp, &server.uri());
        let manifest = tmp.join("manifest.json");
        let request = PublishRequest {
            manifest_path: &manifest,
            feeds: &feeds,
            groups: &groups,
            context: &ctx,
        };

        let publisher = HttpPublisher::new(&PublisherOptions::default()).unwrap();
        let err = publisher.publish(&request).await.unwrap_err();
        assert!(err.to_string().contains("401"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn test_publish_missing_file_is_io_error() {
        let tmp = temp_dir();

        let mut groups = CategoryGroups::default();
        groups.blobs.push("NetCore".into(), Artifact::new("missing.zip"));

        let feeds = registry("http://127.0.0.1:9");
        let ctx = context(&tmp, "http://127.0.0.1:9");
        let manifest = tmp.join("manifest.json");
        let request = PublishRequest {
            manifest_path: &manifest,
            feeds: &feeds,
            groups: &groups,
            context: &ctx,
        };

        let publisher = HttpPublisher::new(&PublisherOptions::default()).unwrap();
        let err = publisher.publish(&request).await.unwrap_err();
        assert!(matches!(err, FeedPublishError::Io { .. }));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn test_publish_unknown_category_is_config_error() {
        let tmp = temp_dir();

        let mut groups = CategoryGroups::default();
        groups.blobs.push("OSX".into(), Artifact::new("a.pkg"));

        let feeds = registry("http://127.0.0.1:9");
        let ctx = context(&tmp, "http://127.0.0.1:9");
        let manifest = tmp.join("manifest.json");
        let request = PublishRequest {
            manifest_path: &manifest,
            feeds: &feeds,
            groups: &groups,
            context: &ctx,
        };

        let publisher = HttpPublisher::new(&PublisherOptions::default()).unwrap();
        let err = publisher.publish(&request).await.unwrap_err();
        assert!(err.to_string().contains("no feed configured for category 'OSX'"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn test_publish_records_assets_with_build_registry() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("PUT"))
            .respond_with(wiremock::ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let record = serde_json::json!({
            "assets": [
                { "kind": "package", "category": "NetCore", "id": "a.nupkg" }
            ]
        });
        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .and(wiremock::matchers::path("/api/builds/42/assets"))
            .and(wiremock::matchers::header("authorization", "Bearer registry-token"))
            .and(wiremock::matchers::body_partial_json(record))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = temp_dir();
        std::fs::create_dir_all(tmp.join("packages")).unwrap();
        std::fs::write(tmp.join("packages/a.nupkg"), b"x").unwrap();

        let mut groups = CategoryGroups::default();
        groups.packages.push("NetCore".into(), Artifact::new("a.nupkg"));

        let feeds = registry(&server.uri());
        let ctx = context(&tmp, &server.uri());
        let manifest = tmp.join("manifest.json");
        let request = PublishRequest {
            manifest_path: &manifest,
            feeds: &feeds,
            groups: &groups,
            context: &ctx,
        };

        let publisher = HttpPublisher::new(&PublisherOptions::default()).unwrap();
        let summary = publisher.publish(&request).await.unwrap();
        assert_eq!(summary.artifact_count(), 1);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn test_publish_fails_when_registry_rejects() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("PUT"))
            .respond_with(wiremock::ResponseTemplate::new(201))
            .mount(&server)
            .await;

        wiremock::Mock::given(wiremock::matchers::method("POST"))
            .respond_with(wiremock::ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let tmp = temp_dir();
        std::fs::create_dir_all(tmp.join("packages")).unwrap();
        std::fs::write(tmp.join("packages/a.nupkg"), b"x").unwrap();

        let mut groups = CategoryGroups::default();
        groups.packages.push("NetCore".into(), Artifact::new("a.nupkg"));

        let feeds = registry(&server.uri());
        let ctx = context(&tmp, &server.uri());
        let manifest = tmp.join("manifest.json");
        let request = PublishRequest {
            manifest_path: &manifest,
            feeds: &feeds,
            groups: &groups,
            context: &ctx,
        };

        let publisher = HttpPublisher::new(&PublisherOptions::default()).unwrap();
        let err = publisher.publish(&request).await.unwrap_err();
        assert!(err.to_string().contains("build registry"));
        assert!(err.to_string().contains("403"));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn test_publish_rejects_ids_outside_assets_dir() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::any())
            .respond_with(wiremock::ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let tmp = temp_dir();
        std::fs::create_dir_all(tmp.join("blobs")).unwrap();
        std::fs::write(tmp.join("secret.txt"), b"secret").unwrap();

        let feeds = registry(&server.uri());
        let ctx = context(&tmp, &server.uri());
        let manifest = tmp.join("manifest.json");
        let outside = tmp.join("secret.txt").display().to_string();

        for id in ["../secret.txt", outside.as_str()] {
            let mut groups = CategoryGroups::default();
            groups.blobs.push("NetCore".into(), Artifact::new(id));
            let request = PublishRequest {
                manifest_path: &manifest,
                feeds: &feeds,
                groups: &groups,
                context: &ctx,
            };

            let publisher = HttpPublisher::new(&PublisherOptions::default()).unwrap();
            let err = publisher.publish(&request).await.unwrap_err();
            assert!(matches!(err, FeedPublishError::Validation { .. }), "{id}");
            assert!(err.to_string().contains("escapes the blob assets directory"));
        }

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
