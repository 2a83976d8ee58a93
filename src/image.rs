//! Image identity and naming: fully-qualified references and the
//! `Dockerfile.<image>` / `Containerfile.<image>` naming convention.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tabled::Tabled;
use walkdir::WalkDir;

use crate::color::Logger;
use crate::errors::SkipperError;

/// Tag used for the layer cache image of every project image.
pub const CACHE_TAG: &str = "cache";

/// Recognized dockerfile prefixes, in order of preference.
pub const DOCKERFILE_PREFIXES: [&str; 2] = ["Dockerfile.", "Containerfile."];

/// Concatenate `[registry/][namespace/]name[:tag]`, omitting absent segments.
pub fn build_fqdn(
    registry: Option<&str>,
    namespace: Option<&str>,
    name: &str,
    tag: Option<&str>,
) -> String {
    let mut out = String::new();
    if let Some(r) = registry {
        out.push_str(r);
        out.push('/');
    }
    if let Some(ns) = namespace {
        out.push_str(ns);
        out.push('/');
    }
    out.push_str(name);
    if let Some(t) = tag {
        out.push(':');
        out.push_str(t);
    }
    out
}

/// One line of the `images` listing. `registry` is `none` for local images.
#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub struct ImageRow {
    #[tabled(rename = "REGISTRY")]
    pub registry: String,
    #[tabled(rename = "IMAGE")]
    pub name: String,
    #[tabled(rename = "TAG")]
    pub tag: String,
}

/// A container image reference. Immutable once built; derived names are memoized.
#[derive(Debug, Clone)]
pub struct ImageRef {
    name: String,
    tag: Option<String>,
    registry: Option<String>,
    namespace: Option<String>,
    dockerfile: Option<PathBuf>,
    fqdn: OnceCell<String>,
    cache_fqdn: OnceCell<String>,
}

impl ImageRef {
    pub fn new(name: impl Into<String>) -> Result<Self, SkipperError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SkipperError::EmptyImageName);
        }
        Ok(Self {
            name,
            tag: None,
            registry: None,
            namespace: None,
            dockerfile: None,
            fqdn: OnceCell::new(),
            cache_fqdn: OnceCell::new(),
        })
    }

    pub fn with_tag(mut self, tag: Option<impl Into<String>>) -> Self {
        self.tag = tag.map(Into::into);
        self.reset_memo();
        self
    }

    pub fn with_registry(mut self, registry: Option<impl Into<String>>) -> Self {
        self.registry = registry.map(Into::into);
        self.reset_memo();
        self
    }

    pub fn with_namespace(mut self, namespace: Option<impl Into<String>>) -> Self {
        self.namespace = namespace.map(Into::into);
        self.reset_memo();
        self
    }

    pub fn with_dockerfile(mut self, dockerfile: impl Into<PathBuf>) -> Self {
        self.dockerfile = Some(dockerfile.into());
        self
    }

    fn reset_memo(&mut self) {
        self.fqdn = OnceCell::new();
        self.cache_fqdn = OnceCell::new();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// `name[:tag]`
    pub fn local(&self) -> String {
        build_fqdn(None, None, &self.name, self.tag())
    }

    /// `[registry/][namespace/]name[:tag]`
    pub fn fqdn(&self) -> &str {
        self.fqdn.get_or_init(|| {
            build_fqdn(self.registry(), self.namespace(), &self.name, self.tag())
        })
    }

    /// The layer cache image: same repository, tag [`CACHE_TAG`].
    pub fn cache_fqdn(&self) -> &str {
        self.cache_fqdn.get_or_init(|| {
            build_fqdn(self.registry(), self.namespace(), &self.name, Some(CACHE_TAG))
        })
    }

    /// Explicit dockerfile, else the conventional `Dockerfile.<name>`.
    pub fn dockerfile(&self) -> PathBuf {
        self.dockerfile
            .clone()
            .unwrap_or_else(|| PathBuf::from(image_to_dockerfile(&self.name)))
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fqdn())
    }
}

impl PartialEq for ImageRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.tag == other.tag
            && self.registry == other.registry
            && self.namespace == other.namespace
            && self.dockerfile == other.dockerfile
    }
}

impl Eq for ImageRef {}

/// Conventional dockerfile name for an image.
pub fn image_to_dockerfile(image: &str) -> String {
    format!("{}{}", DOCKERFILE_PREFIXES[0], image)
}

/// Inverse of [`image_to_dockerfile`]: strip a recognized prefix from the file name.
pub fn dockerfile_to_image(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    DOCKERFILE_PREFIXES.iter().find_map(|prefix| {
        file_name
            .strip_prefix(prefix)
            .filter(|rest| !rest.is_empty())
            .map(str::to_string)
    })
}

/// Locate the dockerfile for `image` under `root`.
///
/// `Dockerfile.<image>` wins over `Containerfile.<image>`; a warning is logged when both exist.
/// When neither exists the conventional `Dockerfile.<image>` path is returned.
pub fn find_dockerfile(root: &Path, image: &str, logger: &Logger) -> PathBuf {
    let found: Vec<PathBuf> = DOCKERFILE_PREFIXES
        .iter()
        .map(|prefix| root.join(format!("{prefix}{image}")))
        .filter(|p| p.is_file())
        .collect();
    if found.len() > 1 {
        logger.warn(&format!(
            "multiple dockerfiles found for image {image}; using {}",
            found[0].display()
        ));
    }
    found
        .into_iter()
        .next()
        .unwrap_or_else(|| root.join(image_to_dockerfile(image)))
}

/// Discover project images from dockerfiles in `root` (non-recursive).
pub fn discover_images(root: &Path, logger: &Logger) -> BTreeMap<String, PathBuf> {
    let mut images: BTreeMap<String, PathBuf> = BTreeMap::new();
    let mut entries: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    // Dockerfile.* before Containerfile.* so the preferred prefix is seen first.
    entries.sort_by_key(|p| {
        let name = p.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let rank = DOCKERFILE_PREFIXES
            .iter()
            .position(|prefix| name.starts_with(prefix))
            .unwrap_or(DOCKERFILE_PREFIXES.len());
        (rank, name.to_string())
    });
    for path in entries {
        let Some(image) = dockerfile_to_image(&path) else {
            continue;
        };
        if let Some(existing) = images.get(&image) {
            logger.warn(&format!(
                "multiple dockerfiles found for image {image}; using {}",
                existing.display()
            ));
            continue;
        }
        images.insert(image, path);
    }
    images
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_fqdn_segments() {
        assert_eq!(
            build_fqdn(Some("registry.io:5000"), Some("ns"), "app", Some("abc")),
            "registry.io:5000/ns/app:abc"
        );
        assert_eq!(
            build_fqdn(Some("registry.io:5000"), None, "app", Some("abc")),
            "registry.io:5000/app:abc"
        );
        assert_eq!(build_fqdn(None, Some("ns"), "app", None), "ns/app");
        assert_eq!(build_fqdn(None, None, "app", None), "app");
    }

    #[test]
    fn test_image_ref_requires_name() {
        assert!(matches!(ImageRef::new(""), Err(SkipperError::EmptyImageName)));
        assert!(matches!(ImageRef::new("  "), Err(SkipperError::EmptyImageName)));
    }

    #[test]
    fn test_image_ref_local_and_cache() {
        let img = ImageRef::new("app")
            .unwrap()
            .with_tag(Some("abc123"))
            .with_registry(Some("registry.io:5000"));
        assert_eq!(img.local(), "app:abc123");
        assert_eq!(img.fqdn(), "registry.io:5000/app:abc123");
        assert_eq!(img.cache_fqdn(), "registry.io:5000/app:cache");
        assert_eq!(img.dockerfile(), PathBuf::from("Dockerfile.app"));
        assert_eq!(img.to_string(), "registry.io:5000/app:abc123");
    }

    #[test]
    fn test_builder_resets_memoized_fqdn() {
        let img = ImageRef::new("app").unwrap();
        assert_eq!(img.fqdn(), "app");
        let img = img.with_tag(Some("t"));
        assert_eq!(img.fqdn(), "app:t");
    }

    #[test]
    fn test_dockerfile_mapping_inverse() {
        for name in ["app", "build-container", "my_image"] {
            let df = image_to_dockerfile(name);
            assert_eq!(dockerfile_to_image(Path::new(&df)).as_deref(), Some(name));
        }
        assert_eq!(
            dockerfile_to_image(Path::new("/proj/Containerfile.tools")).as_deref(),
            Some("tools")
        );
        assert_eq!(dockerfile_to_image(Path::new("Dockerfile")), None);
        assert_eq!(dockerfile_to_image(Path::new("Dockerfile.")), None);
        assert_eq!(dockerfile_to_image(Path::new("README.md")), None);
    }

    #[test]
    fn test_discover_images_prefers_dockerfile() {
        let td = tempfile::tempdir().expect("tmpdir");
        for f in [
            "Dockerfile.app",
            "Containerfile.app",
            "Containerfile.tools",
            "Makefile",
        ] {
            std::fs::write(td.path().join(f), "FROM scratch\n").expect("write");
        }
        std::fs::create_dir(td.path().join("sub")).expect("mkdir");
        std::fs::write(td.path().join("sub").join("Dockerfile.nested"), "").expect("write");

        let images = discover_images(td.path(), &Logger::default());
        assert_eq!(images.len(), 2);
        assert_eq!(images["app"], td.path().join("Dockerfile.app"));
        assert_eq!(images["tools"], td.path().join("Containerfile.tools"));
    }

    #[test]
    fn test_find_dockerfile_fallbacks() {
        let td = tempfile::tempdir().expect("tmpdir");
        let logger = Logger::default();
        assert_eq!(
            find_dockerfile(td.path(), "app", &logger),
            td.path().join("Dockerfile.app")
        );
        std::fs::write(td.path().join("Containerfile.app"), "").expect("write");
        assert_eq!(
            find_dockerfile(td.path(), "app", &logger),
            td.path().join("Containerfile.app")
        );
    }
}
