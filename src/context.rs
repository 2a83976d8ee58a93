//! Invocation context: flags layered over `skipper.yaml`, plus lazily resolved collaborators.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use once_cell::unsync::OnceCell;

use crate::assets::{cache_dir, materialize_entrypoint};
use crate::builder::BuildContainer;
use crate::color::Logger;
use crate::config::FileConfig;
use crate::docker::{ContainerRunner, ContainerRuntime, HostEnv};
use crate::errors::SkipperError;
use crate::git;
use crate::image::{discover_images, find_dockerfile};
use crate::registry::{Credentials, RegistryApi, RegistryClient};
use crate::util::ProcessRunner;

/// Build container tag that means "the current git revision, built on demand".
pub const GIT_REVISION_TAG: &str = "git:revision";

/// Global options given on the command line. Unset values fall back to the config file.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub registry: Option<String>,
    pub build_container_image: Option<String>,
    pub build_container_tag: Option<String>,
    pub build_container_net: Option<String>,
    pub env_files: Vec<String>,
    pub build_args: Vec<String>,
    pub build_contexts: Vec<String>,
}

/// Effective settings for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub registry: Option<String>,
    pub build_container_image: Option<String>,
    /// As given; may be [`GIT_REVISION_TAG`].
    pub build_container_tag: Option<String>,
    pub build_container_net: Option<String>,
    pub env_files: Vec<String>,
    pub build_args: Vec<String>,
    pub build_contexts: Vec<String>,
    /// Config `env`, already resolved to `KEY=VALUE`.
    pub environment: Vec<String>,
    pub containers: Option<BTreeMap<String, String>>,
    pub volumes: Vec<String>,
    pub workdir: Option<String>,
    pub workspace: Option<String>,
    pub container_context: Option<String>,
    pub makefile: Option<String>,
    pub project_root: PathBuf,
}

fn either(cli: Vec<String>, cfg: Vec<String>) -> Vec<String> {
    if cli.is_empty() {
        cfg
    } else {
        cli
    }
}

impl Settings {
    pub fn resolve(opts: GlobalOptions, cfg: FileConfig, project_root: PathBuf) -> Self {
        let environment = cfg.env_entries();
        Self {
            registry: opts.registry.or(cfg.registry),
            build_container_image: opts.build_container_image.or(cfg.build_container_image),
            build_container_tag: opts.build_container_tag.or(cfg.build_container_tag),
            build_container_net: opts.build_container_net.or(cfg.build_container_net),
            env_files: either(opts.env_files, cfg.env_file),
            build_args: either(opts.build_args, cfg.build_args),
            build_contexts: either(opts.build_contexts, cfg.build_contexts),
            environment,
            containers: cfg.containers,
            volumes: cfg.volumes,
            workdir: cfg.workdir,
            workspace: cfg.workspace,
            container_context: cfg.container_context,
            makefile: cfg.make.makefile,
            project_root,
        }
    }

    pub fn git_revision_mode(&self) -> bool {
        self.build_container_tag.as_deref() == Some(GIT_REVISION_TAG)
    }

    /// Project images mapped to absolute dockerfile paths. A `containers:` map replaces discovery.
    pub fn project_images(&self, logger: &Logger) -> BTreeMap<String, PathBuf> {
        match &self.containers {
            Some(map) => map
                .iter()
                .map(|(image, df)| (image.clone(), absolutize(&self.project_root, df)))
                .collect(),
            None => discover_images(&self.project_root, logger),
        }
    }

    pub fn require_registry(&self) -> Result<&str, SkipperError> {
        self.registry
            .as_deref()
            .ok_or(SkipperError::MissingParameter("registry"))
    }

    pub fn require_build_container_image(&self) -> Result<&str, SkipperError> {
        self.build_container_image
            .as_deref()
            .ok_or(SkipperError::MissingParameter("build-container-image"))
    }
}

fn absolutize(root: &Path, p: &str) -> PathBuf {
    let path = Path::new(p);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Everything a subcommand handler needs. Runtime, host facts and the registry client are
/// resolved on first use.
pub struct Context {
    pub settings: Settings,
    pub logger: Logger,
    pub credentials: Option<Credentials>,
    runner: Box<dyn ProcessRunner>,
    runtime: OnceCell<ContainerRuntime>,
    host: OnceCell<HostEnv>,
    registry: OnceCell<Box<dyn RegistryApi>>,
}

impl Context {
    pub fn new(settings: Settings, logger: Logger, runner: Box<dyn ProcessRunner>) -> Self {
        let credentials = settings.registry.as_deref().and_then(|reg| {
            Credentials::default_config_path()
                .and_then(|path| Credentials::from_docker_config(&path, reg))
        });
        Self {
            settings,
            logger,
            credentials,
            runner,
            runtime: OnceCell::new(),
            host: OnceCell::new(),
            registry: OnceCell::new(),
        }
    }

    /// Use `runtime` instead of detecting one.
    pub fn with_runtime(self, runtime: ContainerRuntime) -> Self {
        let _ = self.runtime.set(runtime);
        self
    }

    /// Use `host` instead of inspecting the current process.
    pub fn with_host(self, host: HostEnv) -> Self {
        let _ = self.host.set(host);
        self
    }

    /// Use `api` instead of an HTTP client for the configured registry.
    pub fn with_registry_api(self, api: Box<dyn RegistryApi>) -> Self {
        let _ = self.registry.set(api);
        self
    }

    pub fn process(&self) -> &dyn ProcessRunner {
        self.runner.as_ref()
    }

    pub fn runtime(&self) -> Result<&ContainerRuntime, SkipperError> {
        self.runtime.get_or_try_init(|| {
            let rt = ContainerRuntime::detect()?;
            self.logger
                .debug(&format!("container runtime: {}", rt.program()));
            Ok(rt)
        })
    }

    pub fn host(&self) -> Result<&HostEnv, SkipperError> {
        self.host.get_or_try_init(|| {
            let entrypoint = materialize_entrypoint(&cache_dir())?;
            HostEnv::detect(entrypoint)
        })
    }

    pub fn container_runner(&self) -> Result<ContainerRunner<'_>, SkipperError> {
        Ok(ContainerRunner::new(
            self.process(),
            self.runtime()?,
            self.host()?,
            &self.logger,
        ))
    }

    /// Registry client for the configured registry; `None` when no registry is set.
    pub fn registry_api(&self) -> Result<Option<&dyn RegistryApi>, SkipperError> {
        if let Some(api) = self.registry.get() {
            return Ok(Some(api.as_ref()));
        }
        let Some(reg) = self.settings.registry.as_deref() else {
            return Ok(None);
        };
        let api = self.registry.get_or_try_init(|| {
            RegistryClient::new(reg, self.credentials.clone())
                .map(|c| Box::new(c) as Box<dyn RegistryApi>)
        })?;
        Ok(Some(api.as_ref()))
    }

    pub fn require_registry_api(&self) -> Result<&dyn RegistryApi, SkipperError> {
        self.settings.require_registry()?;
        self.registry_api()?
            .ok_or(SkipperError::MissingParameter("registry"))
    }

    /// Current full revision, or `none` outside a repository.
    pub fn revision(&self) -> Result<String, SkipperError> {
        git::revision_or_none(
            self.process(),
            &self.settings.project_root,
            false,
            &self.logger,
        )
    }

    /// Build container request for `run`, `make` and `shell`.
    pub fn build_container(&self, use_layer_cache: bool) -> Result<BuildContainer, SkipperError> {
        let image = self.settings.require_build_container_image()?.to_string();
        let git_revision = self.settings.git_revision_mode();
        let tag = if git_revision {
            Some(self.revision()?)
        } else {
            self.settings.build_container_tag.clone()
        };
        let dockerfile = find_dockerfile(&self.settings.project_root, &image, &self.logger);
        Ok(BuildContainer {
            image,
            tag,
            git_revision,
            registry: self.settings.registry.clone(),
            dockerfile: Some(dockerfile),
            context: self.settings.container_context.clone(),
            build_contexts: self.settings.build_contexts.clone(),
            build_args: self.settings.build_args.clone(),
            use_layer_cache,
        })
    }
}
