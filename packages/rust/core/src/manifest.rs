//! Manifest discovery and loading.

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, instrument};

use feedpublish_shared::{ArtifactKind, BuildManifest, FeedPublishError, Result};

/// A manifest together with the file it was read from.
#[derive(Debug, Clone)]
pub struct LoadedManifest {
    pub path: PathBuf,
    pub manifest: BuildManifest,
}

impl LoadedManifest {
    /// Display name: the manifest's `name`, else its file name.
    pub fn display_name(&self) -> String {
        self.manifest.name.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.display().to_string())
        })
    }
}

/// List manifest files in `dir` with the given extension, sorted by name.
pub fn find_manifests(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| FeedPublishError::io(dir, e))?;
    let extension = extension.trim_start_matches('.');

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| FeedPublishError::io(dir, e))?.path();
        let matches = path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension));
        if path.is_file() && matches {
            paths.push(path);
        }
    }
    paths.sort();

    if paths.is_empty() {
        return Err(FeedPublishError::validation(format!(
            "no *.{extension} manifests found in '{}'",
            dir.display()
        )));
    }

    debug!(count = paths.len(), dir = %dir.display(), "manifests found");
    Ok(paths)
}

/// Read and parse a single manifest file.
pub fn load_manifest(path: &Path) -> Result<BuildManifest> {
    let content = std::fs::read_to_string(path).map_err(|e| FeedPublishError::io(path, e))?;

    let manifest: BuildManifest = serde_json::from_str(&content)
        .map_err(|e| FeedPublishError::parse(format!("{}: {e}", path.display())))?;

    for kind in [ArtifactKind::Package, ArtifactKind::Blob] {
        if let Some(pos) = manifest
            .artifacts(kind)
            .iter()
            .position(|a| a.id.trim().is_empty())
        {
            return Err(FeedPublishError::parse(format!(
                "{}: {kind} #{} has an empty id",
                path.display(),
                pos + 1
            )));
        }
        if let Some(artifact) = manifest
            .artifacts(kind)
            .iter()
            .find(|a| !a.has_contained_id())
        {
            return Err(FeedPublishError::parse(format!(
                "{}: {kind} id '{}' must be a relative path inside the assets directory",
                path.display(),
                artifact.id
            )));
        }
    }

    Ok(manifest)
}

/// Load every manifest in `dir`. Parse failures are collected so all bad
/// files are reported together.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn load_all(dir: &Path, extension: &str) -> Result<Vec<LoadedManifest>> {
    let paths = find_manifests(dir, extension)?;

    let mut loaded = Vec::with_capacity(paths.len());
    let mut problems = Vec::new();

    for path in paths {
        match load_manifest(&path) {
            Ok(manifest) => loaded.push(LoadedManifest { path, manifest }),
            Err(e) => {
                error!(error = %e, "failed to load manifest");
                problems.push(e.to_string());
            }
        }
    }

    if !problems.is_empty() {
        return Err(FeedPublishError::Invalid { problems });
    }

    info!(count = loaded.len(), "manifests loaded");
    Ok(loaded)
}
