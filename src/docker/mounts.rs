#![allow(clippy::module_name_repetitions)]
//! Bind-mount list for nested runs: defaults, validation, host path pre-creation.

use std::fs;
use std::path::Path;

use crate::docker::runtime::RuntimeKind;
use crate::errors::SkipperError;
use crate::util::fs::ensure_file_exists;

/// Host sources rewritten under `/private` on macOS.
const PRIVATE_PREFIXED: [&str; 2] = ["/etc/", "/var/lib/"];

pub const DOCKER_SOCKET: &str = "/var/run/docker.sock";
pub const ETC_DOCKER: &str = "/etc/docker";

/// How a missing host source is handled before mounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPath {
    /// Create as a directory (the runtime would otherwise create it as root).
    Dir,
    /// Create as an empty file so the runtime does not make a directory there.
    File,
    /// Never created here (sockets, generated files).
    Existing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeEntry {
    pub spec: String,
    pub host_path: HostPath,
}

impl VolumeEntry {
    pub fn new(spec: impl Into<String>, host_path: HostPath) -> Self {
        Self {
            spec: spec.into(),
            host_path,
        }
    }
}

/// Host side of `host:container[:opts]`.
pub fn volume_source(spec: &str) -> Result<&str, SkipperError> {
    spec.split_once(':')
        .map(|(src, _)| src.trim())
        .ok_or_else(|| SkipperError::InvalidVolumeSpec(spec.to_string()))
}

/// Prefix `/etc/...` and `/var/lib/...` sources with `/private`.
pub fn remap_private(spec: &str) -> String {
    if PRIVATE_PREFIXED.iter().any(|p| spec.starts_with(p)) {
        format!("/private{spec}")
    } else {
        spec.to_string()
    }
}

/// Default mounts, in order: home credentials, optional `/etc/docker`, workspace, entrypoint,
/// docker socket.
pub fn default_volumes(
    home: &Path,
    workspace: &Path,
    entrypoint_host: &Path,
    entrypoint_container: &str,
    etc_docker_exists: bool,
    kind: RuntimeKind,
) -> Vec<VolumeEntry> {
    let home = home.display();
    let workspace = workspace.display();
    let workspace_opts = match kind {
        RuntimeKind::Docker => "rw",
        RuntimeKind::Podman => "rw,shared",
    };
    let mut out = vec![
        VolumeEntry::new(format!("{home}/.netrc:{home}/.netrc:ro"), HostPath::Dir),
        VolumeEntry::new(
            format!("{home}/.gitconfig:{home}/.gitconfig:ro"),
            HostPath::File,
        ),
        VolumeEntry::new(
            format!("{home}/.docker/config.json:{home}/.docker/config.json:ro"),
            HostPath::File,
        ),
    ];
    if etc_docker_exists {
        out.push(VolumeEntry::new(
            format!("{ETC_DOCKER}:{ETC_DOCKER}:ro"),
            HostPath::Existing,
        ));
    }
    out.push(VolumeEntry::new(
        format!("{workspace}:{workspace}:{workspace_opts}"),
        HostPath::Dir,
    ));
    out.push(VolumeEntry::new(
        format!("{}:{entrypoint_container}:rw", entrypoint_host.display()),
        HostPath::Existing,
    ));
    out.push(VolumeEntry::new(
        format!("{DOCKER_SOCKET}:{DOCKER_SOCKET}:rw"),
        HostPath::Existing,
    ));
    out
}

/// Validate one entry, rewrite it for the host platform and pre-create its host source.
///
/// Failure to create the host path is ignored; the runtime then creates it itself.
pub fn prepare_volume(entry: &VolumeEntry, remap: bool) -> Result<String, SkipperError> {
    volume_source(&entry.spec)?;
    let spec = if remap {
        remap_private(&entry.spec)
    } else {
        entry.spec.clone()
    };
    let source = Path::new(volume_source(&spec)?);
    if !source.as_os_str().is_empty() && !source.exists() {
        match entry.host_path {
            HostPath::Dir => {
                let _ = fs::create_dir_all(source);
            }
            HostPath::File => {
                let _ = ensure_file_exists(source);
            }
            HostPath::Existing => {}
        }
    }
    Ok(spec)
}
