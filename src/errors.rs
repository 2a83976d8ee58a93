//! Error mapping guide:
//! - Subprocess exit codes are not errors; they propagate as plain `i32` values.
//! - io::ErrorKind::NotFound and a missing container runtime map to exit code 127.
//! - Bad parameters (missing global option, unknown project image) map to 2, like usage errors.
//! - Everything else maps to 1.
use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid 'env' in config: expected a mapping or a list of strings ({0})")]
    InvalidEnv(String),
    #[error("failed to evaluate '$({expr})': {reason}")]
    Interpolation { expr: String, reason: String },
}

#[derive(Debug, Error)]
pub enum SkipperError {
    #[error("not a git repository")]
    NotAVcsRepo,
    #[error("image name is required")]
    EmptyImageName,
    #[error("volume entry is badly-formatted - {0}")]
    InvalidVolumeSpec(String),
    #[error("failed to build image: {image}")]
    BuildFailed { image: String, code: i32 },
    #[error("couldn't find build image {image} with tag {tag}")]
    ImageNotFound { image: String, tag: String },
    #[error("'{image}' is not an image of this project, try {known:?}")]
    UnknownProjectImage { image: String, known: Vec<String> },
    #[error("missing required parameter: --{0}")]
    MissingParameter(&'static str),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("registry returned {status}: {body}")]
    Registry { status: u16, body: String },
    #[error("registry request failed: {0}")]
    RegistryHttp(#[from] reqwest::Error),
    #[error("neither docker nor podman is installed")]
    RuntimeNotFound,
    #[error("command failed with exit code {code}: {argv}")]
    Command { argv: String, code: i32 },
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Map an io::Error to a process exit code:
/// - 127 for NotFound (command not found)
/// - 1 for all other errors
pub fn exit_code_for_io_error(e: &io::Error) -> u8 {
    if e.kind() == io::ErrorKind::NotFound {
        127
    } else {
        1
    }
}

pub fn exit_code_for_error(e: &SkipperError) -> u8 {
    match e {
        SkipperError::RuntimeNotFound => 127,
        SkipperError::Io(ioe) => exit_code_for_io_error(ioe),
        SkipperError::BuildFailed { code, .. } => match exit_code_for_status(*code) {
            0 => 1,
            c => c,
        },
        SkipperError::MissingParameter(_) | SkipperError::UnknownProjectImage { .. } => 2,
        _ => 1,
    }
}

/// Clamp a subprocess exit code into the 0..=255 range a process can report.
pub fn exit_code_for_status(code: i32) -> u8 {
    (code & 0xff) as u8
}
