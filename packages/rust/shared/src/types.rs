//! Core domain types: categories, artifacts, manifests, feeds, groupings.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::path::{Component, Path};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{FeedPublishError, Result};

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one publish run (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// A feed category name, compared and hashed case-insensitively.
///
/// The spelling it was created with is kept for display, so `"NetCore"`
/// and `"NETCORE"` are the same key but print as given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Create a category from a name, trimming surrounding whitespace.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.len() == name.len() {
            Self(name)
        } else {
            Self(trimmed.to_string())
        }
    }

    /// The category name as originally spelled.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against a plain name.
    pub fn matches(&self, name: &str) -> bool {
        self.0.eq_ignore_ascii_case(name.trim())
    }
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Category {}

impl Hash for Category {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_uppercase());
        }
        state.write_u8(0xff);
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

// ---------------------------------------------------------------------------
// Artifacts & manifests
// ---------------------------------------------------------------------------

/// Which part of the manifest an artifact came from. Decides the assets
/// directory it is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Package,
    Blob,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Package => f.pad("package"),
            Self::Blob => f.pad("blob"),
        }
    }
}

/// Name of the attribute carrying explicit categories.
pub const CATEGORY_ATTRIBUTE: &str = "Category";

/// A single build output listed in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Path of the file relative to its assets directory.
    pub id: String,
    /// Free-form metadata; only `Category` is interpreted.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Artifact {
    /// Artifact with no attributes.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Artifact with an explicit `Category` attribute.
    pub fn with_category(id: impl Into<String>, categories: impl Into<String>) -> Self {
        let mut artifact = Self::new(id);
        artifact
            .attributes
            .insert(CATEGORY_ATTRIBUTE.to_string(), categories.into());
        artifact
    }

    /// Look up an attribute by name, ignoring case.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The raw `Category` attribute, if present.
    pub fn category_attribute(&self) -> Option<&str> {
        self.attribute(CATEGORY_ATTRIBUTE)
    }

    /// Whether the id stays inside its assets directory: relative, with no
    /// `..` segments, no root and no drive prefix. Both `/` and `\` count as
    /// separators since the id also becomes a feed URL path.
    pub fn has_contained_id(&self) -> bool {
        let id = self.id.trim();
        if id.is_empty() || id.starts_with(['/', '\\']) || Path::new(id).is_absolute() {
            return false;
        }
        let no_escape = Path::new(id)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        no_escape && id.split(['/', '\\']).all(|segment| segment != ".." && !segment.contains(':'))
    }
}

/// A parsed build manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Optional human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Build that produced the manifest, if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<u64>,
    /// Package artifacts, in manifest order.
    #[serde(default)]
    pub packages: Vec<Artifact>,
    /// Blob artifacts, in manifest order.
    #[serde(default)]
    pub blobs: Vec<Artifact>,
}

impl BuildManifest {
    /// The artifacts of one kind.
    pub fn artifacts(&self, kind: ArtifactKind) -> &[Artifact] {
        match kind {
            ArtifactKind::Package => &self.packages,
            ArtifactKind::Blob => &self.blobs,
        }
    }
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

/// A validated feed: every field is present and the URL is absolute.
#[derive(Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub category: Category,
    pub url: Url,
    pub feed_type: String,
    pub token: String,
}

// Tokens stay out of logs.
impl std::fmt::Debug for FeedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedConfig")
            .field("category", &self.category)
            .field("url", &self.url.as_str())
            .field("feed_type", &self.feed_type)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Validated feeds keyed by category, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct FeedRegistry {
    feeds: IndexMap<Category, FeedConfig>,
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feed. Fails if its category is already taken (case-insensitive).
    pub fn insert(&mut self, feed: FeedConfig) -> Result<()> {
        if let Some(existing) = self.feeds.get(&feed.category) {
            return Err(FeedPublishError::validation(format!(
                "duplicate feed for category '{}' (already configured as '{}')",
                feed.category, existing.category
            )));
        }
        self.feeds.insert(feed.category.clone(), feed);
        Ok(())
    }

    pub fn get(&self, category: &Category) -> Option<&FeedConfig> {
        self.feeds.get(category)
    }

    pub fn contains(&self, category: &Category) -> bool {
        self.feeds.contains_key(category)
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeedConfig> {
        self.feeds.values()
    }
}

// ---------------------------------------------------------------------------
// Category groupings
// ---------------------------------------------------------------------------

/// Category → artifacts, preserving first-seen category order and
/// manifest order within each category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CategoryMap(IndexMap<Category, Vec<Artifact>>);

impl CategoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an artifact to a category's group, creating it if needed.
    pub fn push(&mut self, category: Category, artifact: Artifact) {
        self.0.entry(category).or_default().push(artifact);
    }

    /// The group for a category name (case-insensitive).
    pub fn get(&self, category: &str) -> Option<&[Artifact]> {
        self.0.get(&Category::new(category)).map(Vec::as_slice)
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Category, &[Artifact])> {
        self.0.iter().map(|(c, a)| (c, a.as_slice()))
    }

    /// Keep only the categories for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&Category) -> bool) {
        self.0.retain(|c, _| keep(c));
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The groupings for one manifest, packages and blobs kept apart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryGroups {
    pub packages: CategoryMap,
    pub blobs: CategoryMap,
}

impl CategoryGroups {
    pub fn for_kind(&self, kind: ArtifactKind) -> &CategoryMap {
        match kind {
            ArtifactKind::Package => &self.packages,
            ArtifactKind::Blob => &self.blobs,
        }
    }

    pub fn for_kind_mut(&mut self, kind: ArtifactKind) -> &mut CategoryMap {
        match kind {
            ArtifactKind::Package => &mut self.packages,
            ArtifactKind::Blob => &mut self.blobs,
        }
    }

    /// Every group as `(kind, category, artifacts)`, packages first.
    pub fn iter(&self) -> impl Iterator<Item = (ArtifactKind, &Category, &[Artifact])> {
        self.packages
            .iter()
            .map(|(c, a)| (ArtifactKind::Package, c, a))
            .chain(self.blobs.iter().map(|(c, a)| (ArtifactKind::Blob, c, a)))
    }

    /// Distinct categories across both kinds, in first-seen order.
    pub fn categories(&self) -> Vec<&Category> {
        let mut seen: Vec<&Category> = Vec::new();
        for category in self.packages.categories().chain(self.blobs.categories()) {
            if !seen.contains(&category) {
                seen.push(category);
            }
        }
        seen
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Category) -> bool) {
        self.packages.retain(&mut keep);
        self.blobs.retain(&mut keep);
    }

    /// Total group memberships (an artifact in two categories counts twice).
    pub fn entry_count(&self) -> usize {
        self.iter().map(|(_, _, a)| a.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.blobs.is_empty()
    }
}
