//! Publishing a revision-tagged project image to the registry.

use crate::color::Logger;
use crate::docker::run::ContainerRunner;
use crate::errors::SkipperError;
use crate::image::build_fqdn;
use crate::registry::RegistryApi;
use crate::util::StdoutTarget;

#[derive(Debug, Clone)]
pub struct PushRequest {
    pub image: String,
    /// Local tag to publish (the current revision).
    pub tag: String,
    pub registry: String,
    pub namespace: Option<String>,
    /// Push even when the registry already lists the tag.
    pub force: bool,
}

/// Tag `image:tag` with its registry name, push unless already published, drop the extra tag.
///
/// Returns the failing runtime exit code when tagging or pushing fails. Failing to remove the
/// registry tag afterwards only warns.
pub fn push_image(
    req: &PushRequest,
    runner: &ContainerRunner<'_>,
    api: &dyn RegistryApi,
    logger: &Logger,
) -> Result<i32, SkipperError> {
    let local = build_fqdn(None, None, &req.image, Some(&req.tag));
    let fqdn = build_fqdn(
        Some(&req.registry),
        req.namespace.as_deref(),
        &req.image,
        Some(&req.tag),
    );
    let run = |words: &[&str]| -> Result<i32, SkipperError> {
        let argv: Vec<String> = words.iter().map(|s| s.to_string()).collect();
        runner.run_runtime(&argv, StdoutTarget::Inherit)
    };

    logger.debug(&format!("adding tag {fqdn}"));
    let code = run(&["tag", local.as_str(), fqdn.as_str()])?;
    if code != 0 {
        logger.error(&format!("failed to tag image {local} as {fqdn}"));
        return Ok(code);
    }

    let repo = build_fqdn(None, req.namespace.as_deref(), &req.image, None);
    let published = api.list_tags(&repo)?.iter().any(|t| *t == req.tag);
    let should_push = match (published, req.force) {
        (false, _) => true,
        (true, false) => {
            logger.info(&format!(
                "image {fqdn} is already in registry {}, not pushing",
                req.registry
            ));
            false
        }
        (true, true) => {
            logger.warn(&format!(
                "image {fqdn} is already in registry {}, pushing anyway",
                req.registry
            ));
            true
        }
    };
    if should_push {
        logger.debug(&format!("pushing to registry {}", req.registry));
        let code = run(&["push", fqdn.as_str()])?;
        if code != 0 {
            logger.error(&format!("failed to push image: {fqdn}"));
            return Ok(code);
        }
    }

    logger.debug(&format!("removing tag {fqdn}"));
    if run(&["rmi", fqdn.as_str()])? != 0 {
        logger.warn(&format!("failed to remove image tag: {fqdn}"));
    }
    Ok(0)
}
