//! Skipper: build, run and push container images of a git repository, and run commands nested
//! inside a build container with the workspace mounted.
//!
//! Architecture
//! - Binary glue (src/main.rs, src/cli.rs, src/commands) parses flags, builds a [`Context`] and
//!   maps results to exit codes.
//! - [`docker::ContainerRunner::execute`] decides between host-direct and containerized execution
//!   and assembles the runtime `run` argv.
//! - [`builder`] builds images (with the optional layer cache image) and resolves the build
//!   container.
//! - [`registry`] talks to a v2 registry over HTTPS; [`git`] provides revision tags.
//!
//! Environment
//! - CONTAINER_RUNTIME_COMMAND: `docker` or `podman` (or a path to either).
//! - SKIPPER_USE_CACHE_IMAGE / SKIPPER_INTERACTIVE: truthy values enable `-c` / `-i`.
//! - KEEP_CONTAINERS: non-empty keeps containers after exit.
//! - SKIPPER_COLOR / NO_COLOR: stderr color control.

pub mod assets;
pub mod builder;
pub mod color;
pub mod config;
pub mod context;
pub mod docker;
pub mod errors;
pub mod git;
pub mod image;
pub mod nested;
pub mod push;
pub mod registry;
pub mod util;

pub use color::{ColorMode, Logger};
pub use config::{load_config, EnvSource, FileConfig};
pub use context::{Context, GlobalOptions, Settings};
pub use errors::{exit_code_for_error, exit_code_for_status, ConfigError, SkipperError};
pub use image::{build_fqdn, ImageRef};
pub use util::{ProcessRunner, StdoutTarget, SystemRunner};
