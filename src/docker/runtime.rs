#![allow(clippy::module_name_repetitions)]
//! Container runtime discovery.

use std::env;
use std::path::Path;

use which::which;

use crate::errors::SkipperError;

/// Environment override naming the runtime binary (`docker`, `podman` or a path to either).
pub const RUNTIME_ENV: &str = "CONTAINER_RUNTIME_COMMAND";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    Docker,
    Podman,
}

impl RuntimeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeKind::Docker => "docker",
            RuntimeKind::Podman => "podman",
        }
    }

    /// Classify a runtime program by its file name; anything not named podman is docker-compatible.
    pub fn from_program(program: &str) -> Self {
        let name = Path::new(program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(program);
        if name.starts_with("podman") {
            RuntimeKind::Podman
        } else {
            RuntimeKind::Docker
        }
    }
}

/// The runtime binary all container subcommands are issued against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRuntime {
    program: String,
    kind: RuntimeKind,
}

impl ContainerRuntime {
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        let kind = RuntimeKind::from_program(&program);
        Self { program, kind }
    }

    pub fn docker() -> Self {
        Self::new("docker")
    }

    pub fn podman() -> Self {
        Self::new("podman")
    }

    /// `CONTAINER_RUNTIME_COMMAND`, else the first of docker, podman on PATH.
    pub fn detect() -> Result<Self, SkipperError> {
        if let Ok(v) = env::var(RUNTIME_ENV) {
            let v = v.trim();
            if !v.is_empty() {
                return Ok(Self::new(v));
            }
        }
        for kind in [RuntimeKind::Docker, RuntimeKind::Podman] {
            if which(kind.as_str()).is_ok() {
                return Ok(Self::new(kind.as_str()));
            }
        }
        Err(SkipperError::RuntimeNotFound)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn kind(&self) -> RuntimeKind {
        self.kind
    }

    /// Podman has no docker-style network objects to manage.
    pub fn manages_networks(&self) -> bool {
        self.kind == RuntimeKind::Docker
    }

    /// Full argv for a runtime subcommand: `[program, args...]`.
    pub fn command<I, S>(&self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = vec![self.program.clone()];
        argv.extend(args.into_iter().map(Into::into));
        argv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_program() {
        assert_eq!(RuntimeKind::from_program("docker"), RuntimeKind::Docker);
        assert_eq!(RuntimeKind::from_program("/usr/bin/podman"), RuntimeKind::Podman);
        assert_eq!(RuntimeKind::from_program("podman-remote"), RuntimeKind::Podman);
        assert_eq!(RuntimeKind::from_program("/opt/bin/nerdctl"), RuntimeKind::Docker);
    }

    #[test]
    fn test_command_prefixes_program() {
        let rt = ContainerRuntime::new("/usr/bin/podman");
        assert_eq!(
            rt.command(["tag", "a:1", "b:1"]),
            vec!["/usr/bin/podman", "tag", "a:1", "b:1"]
        );
        assert!(!rt.manages_networks());
        assert!(ContainerRuntime::docker().manages_networks());
    }
}
