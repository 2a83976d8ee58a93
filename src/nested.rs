//! `run`, `make` and `shell`: resolve the build container, then execute inside it.

use crate::builder::prepare_build_container;
use crate::context::Context;
use crate::docker::RunSpec;
use crate::errors::SkipperError;
use crate::util::env_flag;

pub const USE_CACHE_IMAGE_ENV: &str = "SKIPPER_USE_CACHE_IMAGE";
pub const INTERACTIVE_ENV: &str = "SKIPPER_INTERACTIVE";
pub const DEFAULT_MAKEFILE: &str = "Makefile";

/// Per-invocation options of the nested subcommands.
#[derive(Debug, Clone, Default)]
pub struct NestedRun {
    pub command: Vec<String>,
    pub interactive: bool,
    pub name: Option<String>,
    /// `-e KEY=VALUE` values, appended after the config environment.
    pub env: Vec<String>,
    pub publish: Vec<String>,
    pub use_layer_cache: bool,
}

impl NestedRun {
    /// Apply `SKIPPER_INTERACTIVE` and `SKIPPER_USE_CACHE_IMAGE`.
    pub fn with_env_toggles(mut self) -> Self {
        self.interactive |= env_flag(INTERACTIVE_ENV);
        self.use_layer_cache |= env_flag(USE_CACHE_IMAGE_ENV);
        self
    }
}

/// `make -f <makefile> targets...`
pub fn make_command(makefile: &str, targets: &[String]) -> Vec<String> {
    let mut cmd = vec!["make".to_string(), "-f".to_string(), makefile.to_string()];
    cmd.extend(targets.iter().cloned());
    cmd
}

/// Resolve (and if allowed build) the build container, then run `req.command` inside it.
pub fn run_nested(ctx: &Context, req: NestedRun) -> Result<i32, SkipperError> {
    let build = ctx.build_container(req.use_layer_cache)?;
    let runner = ctx.container_runner()?;
    let image = prepare_build_container(&build, &runner, ctx.registry_api()?, &ctx.logger)?;

    let settings = &ctx.settings;
    let mut environment = settings.environment.clone();
    environment.extend(req.env);
    let spec = RunSpec {
        command: req.command,
        target_image: Some(image),
        environment,
        interactive: req.interactive,
        container_name: req.name,
        network: settings.build_container_net.clone(),
        published_ports: req.publish,
        bind_mounts: settings.volumes.clone(),
        working_dir: settings.workdir.clone(),
        workspace_root: settings.workspace.clone(),
        use_layer_cache: req.use_layer_cache,
        env_files: settings.env_files.clone(),
    };
    runner.execute(&spec)
}
