//! Artifact classification and category grouping.
//!
//! An artifact's categories come from its `Category` attribute when present
//! (semicolon-separated), otherwise from its file extension. Every artifact
//! ends up in at least one group.

use tracing::{debug, instrument};

use feedpublish_shared::{
    Artifact, ArtifactKind, BuildManifest, Category, CategoryGroups, CategoryMap,
};

pub const NET_CORE: &str = "NetCore";
pub const OSX: &str = "OSX";
pub const DEB: &str = "DEB";
pub const RPM: &str = "RPM";
pub const NODE: &str = "NODE";
pub const BINARY_LAYOUT: &str = "BinaryLayout";
pub const INSTALLER: &str = "Installer";
pub const CHECKSUM: &str = "Checksum";
pub const MAVEN: &str = "Maven";
pub const VSIX: &str = "VSIX";

/// Category for identifiers no extension rule matches.
pub const DEFAULT_CATEGORY: &str = NET_CORE;

/// Extension rules, checked in order. Matching ignores case.
const EXTENSION_RULES: &[(&str, &str)] = &[
    (".nupkg", NET_CORE),
    (".pkg", OSX),
    (".deb", DEB),
    (".rpm", RPM),
    (".npm", NODE),
    (".zip", BINARY_LAYOUT),
    (".msi", INSTALLER),
    (".sha", CHECKSUM),
    (".pom", MAVEN),
    (".vsix", VSIX),
];

/// Infer a single category from an artifact identifier's extension.
pub fn infer_category(id: &str) -> Category {
    let name = EXTENSION_RULES
        .iter()
        .find(|(ext, _)| ends_with_ignore_case(id, ext))
        .map_or(DEFAULT_CATEGORY, |&(_, category)| category);
    Category::new(name)
}

/// The categories an artifact belongs to, without duplicates.
///
/// An explicit attribute naming no categories (empty, or only separators)
/// counts as absent.
pub fn categories_of(artifact: &Artifact) -> Vec<Category> {
    let mut categories: Vec<Category> = Vec::new();

    if let Some(raw) = artifact.category_attribute() {
        for name in raw.split(';').map(str::trim).filter(|n| !n.is_empty()) {
            let category = Category::new(name);
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
    }

    if categories.is_empty() {
        categories.push(infer_category(&artifact.id));
    }

    categories
}

/// Group artifacts by category in a single pass, keeping input order.
pub fn group_artifacts(artifacts: &[Artifact]) -> CategoryMap {
    let mut map = CategoryMap::new();
    for artifact in artifacts {
        for category in categories_of(artifact) {
            map.push(category, artifact.clone());
        }
    }
    map
}

/// Classify every package and blob in a manifest.
#[instrument(skip_all, fields(packages = manifest.packages.len(), blobs = manifest.blobs.len()))]
pub fn classify(manifest: &BuildManifest) -> CategoryGroups {
    let mut groups = CategoryGroups::default();
    for kind in [ArtifactKind::Package, ArtifactKind::Blob] {
        *groups.for_kind_mut(kind) = group_artifacts(manifest.artifacts(kind));
    }

    debug!(
        package_categories = groups.packages.len(),
        blob_categories = groups.blobs.len(),
        "manifest classified"
    );

    groups
}

fn ends_with_ignore_case(id: &str, suffix: &str) -> bool {
    let (id, suffix) = (id.as_bytes(), suffix.as_bytes());
    id.len() >= suffix.len() && id[id.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(map: &CategoryMap, category: &str) -> Vec<String> {
        map.get(category)
            .unwrap_or_default()
            .iter()
            .map(|a| a.id.clone())
            .collect()
    }

    #[test]
    fn infers_every_known_extension() {
        let cases = [
            ("Foo.1.0.0.nupkg", "NetCore"),
            ("installer.pkg", "OSX"),
            ("tool_1.0_amd64.deb", "DEB"),
            ("tool-1.0.x86_64.rpm", "RPM"),
            ("pkg.npm", "NODE"),
            ("layout.zip", "BinaryLayout"),
            ("setup.msi", "Installer"),
            ("layout.zip.sha", "Checksum"),
            ("lib-1.0.pom", "Maven"),
            ("ext.vsix", "VSIX"),
        ];
        for (id, expected) in cases {
            assert_eq!(infer_category(id).as_str(), expected, "{id}");
        }
    }

    #[test]
    fn inference_ignores_case() {
        assert_eq!(infer_category("SETUP.MSI").as_str(), "Installer");
        assert_eq!(infer_category("Foo.NuPkg").as_str(), "NetCore");
        assert_eq!(infer_category("dir/Layout.Zip").as_str(), "BinaryLayout");
    }

    #[test]
    fn unknown_extensions_default_to_netcore() {
        for id in ["readme.txt", "no-extension", "", "archive.tar.gz", "x.pkgs", "résumé.pdf"] {
            assert_eq!(infer_category(id).as_str(), DEFAULT_CATEGORY, "{id:?}");
        }
    }

    #[test]
    fn nupkg_is_not_mistaken_for_pkg() {
        assert_eq!(infer_category("a.nupkg").as_str(), "NetCore");
        assert_eq!(infer_category("a.pkg").as_str(), "OSX");
    }

    #[test]
    fn explicit_categories_win_over_inference() {
        let artifact = Artifact::with_category("setup.msi", "OSX");
        assert_eq!(categories_of(&artifact), vec![Category::new("OSX")]);
    }

    #[test]
    fn explicit_list_is_split_trimmed_and_deduplicated() {
        let artifact = Artifact::with_category("a.zip", " A ; B;a;;");
        let cats: Vec<_> = categories_of(&artifact)
            .iter()
            .map(|c| c.as_str().to_string())
            .collect();
        assert_eq!(cats, vec!["A", "B"]);
    }

    #[test]
    fn empty_explicit_attribute_falls_back_to_inference() {
        let artifact = Artifact::with_category("a.deb", " ; ");
        assert_eq!(categories_of(&artifact), vec![Category::new("DEB")]);
    }

    #[test]
    fn multi_category_artifact_lands_in_each_group_only() {
        let artifacts = vec![
            Artifact::with_category("shared.zip", "A;B"),
            Artifact::new("other.deb"),
        ];
        let map = group_artifacts(&artifacts);

        assert_eq!(ids(&map, "A"), vec!["shared.zip"]);
        assert_eq!(ids(&map, "B"), vec!["shared.zip"]);
        assert_eq!(ids(&map, "DEB"), vec!["other.deb"]);
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn netcore_group_keeps_manifest_order() {
        let artifacts = vec![
            Artifact::new("Zeta.1.0.0.nupkg"),
            Artifact::new("layout.zip"),
            Artifact::new("Alpha.1.0.0.nupkg"),
            Artifact::new("notes.txt"),
        ];
        let map = group_artifacts(&artifacts);
        assert_eq!(
            ids(&map, NET_CORE),
            vec!["Zeta.1.0.0.nupkg", "Alpha.1.0.0.nupkg", "notes.txt"]
        );
    }

    #[test]
    fn explicit_and_inferred_share_a_group_regardless_of_case() {
        let artifacts = vec![
            Artifact::new("a.nupkg"),
            Artifact::with_category("b.txt", "NETCORE"),
        ];
        let map = group_artifacts(&artifacts);
        assert_eq!(map.len(), 1);
        assert_eq!(ids(&map, "netcore"), vec!["a.nupkg", "b.txt"]);
    }

    #[test]
    fn classify_keeps_packages_and_blobs_apart() {
        let manifest = BuildManifest {
            name: Some("runtime".into()),
            build_id: Some(7),
            packages: vec![Artifact::new("Foo.1.0.0.nupkg")],
            blobs: vec![Artifact::new("Foo.1.0.0.nupkg.sha"), Artifact::new("foo.pkg")],
        };
        let groups = classify(&manifest);

        assert_eq!(ids(&groups.packages, NET_CORE), vec!["Foo.1.0.0.nupkg"]);
        assert!(groups.packages.get(CHECKSUM).is_none());
        assert_eq!(ids(&groups.blobs, CHECKSUM), vec!["Foo.1.0.0.nupkg.sha"]);
        assert_eq!(ids(&groups.blobs, OSX), vec!["foo.pkg"]);
        assert_eq!(groups.entry_count(), 3);
    }
}
