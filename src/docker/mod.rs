#![allow(clippy::module_name_repetitions)]
//! Container runtime integration, organized by responsibility:
//! runtime discovery, `-e`/`-v` flag helpers, local image queries, network lifecycle and the
//! `run` invocation builder.

pub mod env;
pub mod images;
pub mod mounts;
pub mod network;
pub mod run;
pub mod runtime;

pub use images::{delete_local_image, local_image_exists, local_images_info};
pub use network::with_network;
pub use run::{build_run_args, ContainerRunner, HostEnv, RunSpec, ENTRYPOINT_IN_CONTAINER};
pub use runtime::{ContainerRuntime, RuntimeKind};
