//! Shared types, error model, and configuration for feedpublish.
//!
//! This crate is the foundation depended on by all other feedpublish crates.
//! It provides:
//! - [`FeedPublishError`] — the unified error type
//! - Domain types ([`Category`], [`Artifact`], [`BuildManifest`], [`FeedRegistry`],
//!   [`CategoryGroups`], [`RunId`])
//! - Configuration ([`AppConfig`], [`FeedDescriptor`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_CONFIG_FILE, DefaultsConfig, FeedDescriptor, UnmappedPolicy, init_config,
    load_config, load_config_from,
};
pub use error::{FeedPublishError, Result};
pub use types::{
    Artifact, ArtifactKind, BuildManifest, Category, CategoryGroups, CategoryMap, FeedConfig,
    FeedRegistry, RunId,
};
