//! Image builds on the host runtime, including the layer cache image, and resolution of the
//! build container used by `run`, `make` and `shell`.

use std::path::PathBuf;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::color::Logger;
use crate::docker::images::local_image_exists;
use crate::docker::run::ContainerRunner;
use crate::errors::SkipperError;
use crate::git;
use crate::image::{build_fqdn, ImageRef};
use crate::registry::{remote_image_exists, RegistryApi};
use crate::util::StdoutTarget;

/// Build context used when none is configured.
pub const DEFAULT_CONTEXT: &str = ".";

/// Everything needed to build one image.
#[derive(Debug, Clone)]
pub struct BuildSpec {
    pub image: ImageRef,
    pub context: Option<String>,
    pub build_contexts: Vec<String>,
    pub build_args: Vec<String>,
    pub use_layer_cache: bool,
}

impl BuildSpec {
    /// Empty build args and contexts are dropped.
    pub fn new(
        image: ImageRef,
        context: Option<String>,
        build_contexts: Vec<String>,
        build_args: Vec<String>,
        use_layer_cache: bool,
    ) -> Self {
        let keep = |v: Vec<String>| -> Vec<String> {
            v.into_iter().filter(|s| !s.trim().is_empty()).collect()
        };
        Self {
            image,
            context: context.filter(|c| !c.trim().is_empty()),
            build_contexts: keep(build_contexts),
            build_args: keep(build_args),
            use_layer_cache,
        }
    }

    /// Runtime `build` arguments (without the runtime program).
    pub fn build_args_vector(&self) -> Vec<String> {
        let mut cmd = vec!["build".to_string(), "--network=host".to_string()];
        if self.use_layer_cache {
            cmd.push("--cache-from".to_string());
            cmd.push(self.image.cache_fqdn().to_string());
        }
        for arg in &self.build_args {
            cmd.push("--build-arg".to_string());
            cmd.push(arg.clone());
        }
        for bctx in &self.build_contexts {
            cmd.push("--build-context".to_string());
            cmd.push(bctx.clone());
        }
        cmd.push("-f".to_string());
        cmd.push(self.image.dockerfile().display().to_string());
        cmd.push("-t".to_string());
        cmd.push(self.image.local());
        cmd.push(
            self.context
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTEXT.to_string()),
        );
        cmd
    }
}

fn args(words: &[&str]) -> Vec<String> {
    words.iter().map(|s| s.to_string()).collect()
}

/// Build `spec.image` through `run`, the host-direct runtime primitive.
///
/// A failed cache pull is tolerated. A non-zero build exit is logged and returned as is.
/// Cache tag/push failures are logged but do not change the result.
#[cfg_attr(feature = "tracing", instrument(skip_all, fields(image = %spec.image)))]
pub fn build<F>(spec: &BuildSpec, mut run: F, logger: &Logger) -> Result<i32, SkipperError>
where
    F: FnMut(&[String]) -> Result<i32, SkipperError>,
{
    let cache = spec.image.cache_fqdn().to_string();
    if spec.use_layer_cache && run(&args(&["pull", cache.as_str()]))? != 0 {
        logger.warn(&format!("could not pull cache image {cache}; building without it"));
    }

    let code = run(&spec.build_args_vector())?;
    if code != 0 {
        logger.error(&format!("failed to build image: {}", spec.image));
        return Ok(code);
    }

    if spec.use_layer_cache {
        let local = spec.image.local();
        if run(&args(&["tag", local.as_str(), cache.as_str()]))? != 0 {
            logger.warn(&format!("failed to tag {local} as {cache}"));
        } else if run(&args(&["push", cache.as_str()]))? != 0 {
            logger.warn(&format!("failed to push cache image {cache}"));
        }
    }
    Ok(0)
}

/// Where the build container comes from and how it may be built.
#[derive(Debug, Clone, Default)]
pub struct BuildContainer {
    pub image: String,
    /// Requested tag; with `git_revision` it is the resolved revision.
    pub tag: Option<String>,
    /// Allow building when the tagged image is found neither locally nor remotely.
    pub git_revision: bool,
    pub registry: Option<String>,
    pub dockerfile: Option<PathBuf>,
    pub context: Option<String>,
    pub build_contexts: Vec<String>,
    pub build_args: Vec<String>,
    pub use_layer_cache: bool,
}

/// Resolve the build container image, building it only when allowed.
///
/// With a tag: an existing local image wins, then an image in the registry. Without one of those
/// and outside revision mode this fails with [`SkipperError::ImageNotFound`]. Builds send their
/// output to stderr so stdout stays usable for command substitution.
pub fn prepare_build_container(
    req: &BuildContainer,
    runner: &ContainerRunner<'_>,
    registry: Option<&dyn RegistryApi>,
    logger: &Logger,
) -> Result<ImageRef, SkipperError> {
    let base = ImageRef::new(req.image.clone())?;

    if let Some(tag) = req.tag.as_deref() {
        let tagged = build_fqdn(None, None, &req.image, Some(tag));
        if local_image_exists(runner.process(), runner.runtime(), &req.image, tag)? {
            logger.info(&format!("using build container: {tagged}"));
            return Ok(base.with_tag(Some(tag)));
        }
        if let (Some(api), Some(reg)) = (registry, req.registry.as_deref()) {
            match remote_image_exists(api, &req.image, tag) {
                Ok(true) => {
                    let img = base.with_tag(Some(tag)).with_registry(Some(reg));
                    logger.info(&format!("using build container: {img}"));
                    return Ok(img);
                }
                Ok(false) => {}
                Err(e) => logger.warn(&format!("cannot query registry {reg}: {e}")),
            }
        }
        if !req.git_revision {
            return Err(SkipperError::ImageNotFound {
                image: req.image.clone(),
                tag: tag.to_string(),
            });
        }
    } else {
        logger.info("no build container tag was provided");
    }

    let mut target = base.clone().with_registry(req.registry.clone());
    if let Some(df) = &req.dockerfile {
        target = target.with_dockerfile(df.clone());
    }
    logger.info(&format!(
        "building image using dockerfile: {}",
        target.dockerfile().display()
    ));
    let spec = BuildSpec::new(
        target,
        req.context.clone(),
        req.build_contexts.clone(),
        req.build_args.clone(),
        req.use_layer_cache,
    );
    let code = build(
        &spec,
        |a| runner.run_runtime(a, StdoutTarget::Stderr),
        logger,
    )?;
    if code != 0 {
        return Err(SkipperError::BuildFailed {
            image: req.image.clone(),
            code,
        });
    }

    if let Some(tag) = req.tag.as_deref().filter(|_| req.git_revision) {
        if git::has_uncommitted_changes(runner.process(), &runner.host().cwd) {
            logger.warn("uncommitted changes present; not tagging build container with revision");
        } else {
            let tagged = build_fqdn(None, None, &req.image, Some(tag));
            logger.info(&format!("tagging image with git revision: {tag}"));
            runner.run_runtime(
                &args(&["tag", req.image.as_str(), tagged.as_str()]),
                StdoutTarget::Stderr,
            )?;
        }
    }
    Ok(base)
}
