//! Core classification, validation, and run orchestration for feedpublish.
//!
//! This crate ties feed validation, manifest loading, artifact
//! classification, and publishing into one run (`pipeline::publish_all`).

pub mod classify;
pub mod feeds;
pub mod manifest;
pub mod pipeline;
