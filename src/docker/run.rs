#![allow(clippy::module_name_repetitions)]
//! Nested command runner: host-direct execution or a fully assembled `run` invocation.

use std::env;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use nix::unistd::{getuid, Group, User};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::color::Logger;
use crate::docker::env::{push_env, push_env_kv};
use crate::docker::mounts::{default_volumes, prepare_volume, HostPath, VolumeEntry, ETC_DOCKER};
use crate::docker::network::with_network;
use crate::docker::runtime::{ContainerRuntime, RuntimeKind};
use crate::errors::SkipperError;
use crate::image::ImageRef;
use crate::util::{shell_join, shell_preview, ProcessRunner, StdoutTarget};

/// Where the bootstrap script is mounted inside the build container.
pub const ENTRYPOINT_IN_CONTAINER: &str = "/opt/skipper/skipper-entrypoint.sh";

/// Environment toggle that keeps containers around after they exit.
pub const KEEP_CONTAINERS_ENV: &str = "KEEP_CONTAINERS";

/// One logical invocation. Without `target_image` the command runs directly on the host and
/// every container-only field is ignored.
#[derive(Debug, Clone, Default)]
pub struct RunSpec {
    pub command: Vec<String>,
    pub target_image: Option<ImageRef>,
    /// `KEY=VALUE` entries, in order.
    pub environment: Vec<String>,
    pub interactive: bool,
    pub container_name: Option<String>,
    pub network: Option<String>,
    pub published_ports: Vec<String>,
    /// Extra `host:container[:opts]` mounts, added before the defaults.
    pub bind_mounts: Vec<String>,
    pub working_dir: Option<String>,
    pub workspace_root: Option<String>,
    pub use_layer_cache: bool,
    pub env_files: Vec<String>,
}

/// Host facts injected into the container. Captured once so argv building stays deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnv {
    pub user: String,
    pub uid: u32,
    pub home: PathBuf,
    pub cwd: PathBuf,
    /// gid of the host `docker` group, when there is one.
    pub docker_gid: Option<u32>,
    pub keep_containers: bool,
    /// Rewrite `/etc` and `/var/lib` sources under `/private` (macOS).
    pub remap_private: bool,
    pub etc_docker_exists: bool,
    /// Host path of the materialized entrypoint script.
    pub entrypoint: PathBuf,
}

impl HostEnv {
    pub fn detect(entrypoint: PathBuf) -> Result<Self, SkipperError> {
        let cwd = env::current_dir()?;
        let home = home::home_dir()
            .or_else(|| env::var_os("HOME").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("/"));
        let (user, uid) = current_user();
        Ok(Self {
            user,
            uid,
            home,
            cwd,
            docker_gid: docker_group_id(),
            keep_containers: env::var(KEEP_CONTAINERS_ENV).is_ok_and(|v| !v.is_empty()),
            remap_private: cfg!(target_os = "macos"),
            etc_docker_exists: Path::new(ETC_DOCKER).exists(),
            entrypoint,
        })
    }
}

#[cfg(unix)]
fn current_user() -> (String, u32) {
    let uid = getuid();
    let name = User::from_uid(uid)
        .ok()
        .flatten()
        .map(|u| u.name)
        .or_else(|| env::var("USER").ok())
        .unwrap_or_else(|| uid.to_string());
    (name, uid.as_raw())
}

#[cfg(not(unix))]
fn current_user() -> (String, u32) {
    let name = env::var("USERNAME")
        .or_else(|_| env::var("USER"))
        .unwrap_or_default();
    (name, 0)
}

#[cfg(unix)]
fn docker_group_id() -> Option<u32> {
    Group::from_name("docker")
        .ok()
        .flatten()
        .map(|g| g.gid.as_raw())
}

#[cfg(not(unix))]
fn docker_group_id() -> Option<u32> {
    None
}

fn collect_lifecycle_flags(spec: &RunSpec, host: &HostEnv) -> Vec<String> {
    let mut flags = Vec::new();
    if spec.interactive {
        flags.push("-i".to_string());
    }
    if let Some(name) = &spec.container_name {
        flags.push("--name".to_string());
        flags.push(name.clone());
    }
    flags.push("-t".to_string());
    if host.keep_containers {
        push_env_kv(&mut flags, KEEP_CONTAINERS_ENV, "True");
    } else {
        flags.push("--rm".to_string());
    }
    flags.push("--privileged".to_string());
    flags
}

fn collect_network_flags(spec: &RunSpec) -> Vec<String> {
    let mut flags = Vec::new();
    for port in &spec.published_ports {
        flags.push("-p".to_string());
        flags.push(port.clone());
    }
    if let Some(net) = &spec.network {
        flags.push("--net".to_string());
        flags.push(net.clone());
    }
    flags
}

fn collect_env_flags(spec: &RunSpec, host: &HostEnv, kind: RuntimeKind) -> Vec<String> {
    let mut flags = Vec::new();
    for file in &spec.env_files {
        flags.push("--env-file".to_string());
        flags.push(file.clone());
    }
    for entry in &spec.environment {
        push_env(&mut flags, entry);
    }
    push_env_kv(&mut flags, "SKIPPER_USERNAME", &host.user);
    push_env_kv(&mut flags, "SKIPPER_UID", &host.uid.to_string());
    push_env_kv(&mut flags, "HOME", &host.home.display().to_string());
    if kind == RuntimeKind::Docker {
        if let Some(gid) = host.docker_gid {
            push_env_kv(&mut flags, "SKIPPER_DOCKER_GID", &gid.to_string());
        }
    }
    if spec.use_layer_cache {
        push_env_kv(&mut flags, "SKIPPER_USE_CACHE_IMAGE", "True");
    }
    flags
}

fn collect_volume_flags(
    spec: &RunSpec,
    host: &HostEnv,
    kind: RuntimeKind,
) -> Result<Vec<String>, SkipperError> {
    let workspace = match &spec.workspace_root {
        Some(ws) => PathBuf::from(ws),
        None => host
            .cwd
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| host.cwd.clone()),
    };
    let entries = spec
        .bind_mounts
        .iter()
        .map(|v| VolumeEntry::new(v.clone(), HostPath::Dir))
        .chain(default_volumes(
            &host.home,
            &workspace,
            &host.entrypoint,
            ENTRYPOINT_IN_CONTAINER,
            host.etc_docker_exists,
            kind,
        ));
    let mut flags = Vec::new();
    for entry in entries {
        flags.push("-v".to_string());
        flags.push(prepare_volume(&entry, host.remap_private)?);
    }
    Ok(flags)
}

/// Assemble the full `run` argv for a containerized spec.
///
/// Missing host mount sources are created as a side effect.
pub fn build_run_args(
    runtime: &ContainerRuntime,
    host: &HostEnv,
    spec: &RunSpec,
    image: &ImageRef,
) -> Result<Vec<String>, SkipperError> {
    let kind = runtime.kind();
    let mut argv = runtime.command(["run"]);
    argv.extend(collect_lifecycle_flags(spec, host));
    argv.extend(collect_network_flags(spec));
    argv.extend(collect_env_flags(spec, host, kind));
    argv.extend(collect_volume_flags(spec, host, kind)?);

    let workdir = spec
        .working_dir
        .clone()
        .unwrap_or_else(|| host.cwd.display().to_string());
    argv.push("-w".to_string());
    argv.push(workdir);
    argv.push("--entrypoint".to_string());
    argv.push(ENTRYPOINT_IN_CONTAINER.to_string());
    argv.push(image.fqdn().to_string());
    argv.push(shell_join(&spec.command));
    Ok(argv)
}

/// Executes [`RunSpec`]s against one container runtime.
pub struct ContainerRunner<'a> {
    runner: &'a dyn ProcessRunner,
    runtime: &'a ContainerRuntime,
    host: &'a HostEnv,
    logger: &'a Logger,
}

impl<'a> ContainerRunner<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        runtime: &'a ContainerRuntime,
        host: &'a HostEnv,
        logger: &'a Logger,
    ) -> Self {
        Self {
            runner,
            runtime,
            host,
            logger,
        }
    }

    pub fn runtime(&self) -> &ContainerRuntime {
        self.runtime
    }

    pub fn process(&self) -> &dyn ProcessRunner {
        self.runner
    }

    pub fn host(&self) -> &HostEnv {
        self.host
    }

    /// Run `spec` and return the subprocess exit code verbatim.
    #[cfg_attr(feature = "tracing", instrument(skip_all))]
    pub fn execute(&self, spec: &RunSpec) -> Result<i32, SkipperError> {
        let Some(image) = &spec.target_image else {
            return self.run_host(&spec.command, StdoutTarget::Inherit);
        };
        let argv = build_run_args(self.runtime, self.host, spec, image)?;
        match spec.network.as_deref() {
            Some(net) if self.runtime.manages_networks() => {
                with_network(self.runner, self.runtime, net, self.logger, || {
                    self.run_host(&argv, StdoutTarget::Inherit)
                })
            }
            _ => self.run_host(&argv, StdoutTarget::Inherit),
        }
    }

    /// Host-direct execution with inherited stdin/stderr.
    pub fn run_host(&self, argv: &[String], stdout: StdoutTarget) -> Result<i32, SkipperError> {
        self.logger.debug(&shell_preview(argv));
        Ok(self.runner.status(argv, stdout)?)
    }

    /// Host-direct execution of a runtime subcommand (`build`, `tag`, `push`, ...).
    pub fn run_runtime(&self, args: &[String], stdout: StdoutTarget) -> Result<i32, SkipperError> {
        self.run_host(&self.runtime.command(args.iter().cloned()), stdout)
    }
}
