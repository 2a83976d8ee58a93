use clap::{Args, Parser, Subcommand};

use skipper::config::DEFAULT_CONFIG_FILE;
use skipper::{ColorMode, GlobalOptions};

/// Validate a `-p` value: `port:port` or `start-end:start-end`.
fn validate_publish(s: &str) -> Result<String, String> {
    const FORMAT: &str = "publish needs to be in format port:port or port-port:port-port";
    let (host, container) = s.split_once(':').ok_or_else(|| FORMAT.to_string())?;
    validate_port_spec(host).and_then(|_| validate_port_spec(container))?;
    Ok(s.to_string())
}

fn validate_port_spec(spec: &str) -> Result<(), String> {
    const FORMAT: &str = "publish needs to be in format port:port or port-port:port-port";
    let (start, end) = match spec.split_once('-') {
        Some((a, b)) => (a, Some(b)),
        None => (spec, None),
    };
    let start = parse_port(start).ok_or_else(|| FORMAT.to_string())??;
    if let Some(end) = end {
        let end = parse_port(end).ok_or_else(|| FORMAT.to_string())??;
        if end < start {
            return Err(format!(
                "invalid port range: {end} should be bigger than {start}"
            ));
        }
    }
    Ok(())
}

/// `None` when `s` is not a number; `Some(Err)` when it is outside 1..=65535.
fn parse_port(s: &str) -> Option<Result<u32, String>> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let out_of_range = || format!("invalid port number: port {s} is out of range");
    Some(match s.parse::<u32>() {
        Ok(p) if (1..=65535).contains(&p) => Ok(p),
        _ => Err(out_of_range()),
    })
}

#[derive(Parser, Debug)]
#[command(
    name = "skipper",
    version,
    about = "Easily dockerize your Git repository"
)]
pub(crate) struct Cli {
    /// Increase verbosity
    #[arg(short, long)]
    pub verbose: bool,

    /// URL of the docker registry
    #[arg(long)]
    pub registry: Option<String>,

    /// Image to use as build container
    #[arg(long = "build-container-image")]
    pub build_container_image: Option<String>,

    /// Tag of the build container (`git:revision` builds it from the current revision on demand)
    #[arg(long = "build-container-tag")]
    pub build_container_tag: Option<String>,

    /// Network to connect the build container
    #[arg(long = "build-container-net")]
    pub build_container_net: Option<String>,

    /// Environment variable file(s) to load
    #[arg(long = "env-file")]
    pub env_file: Vec<String>,

    /// Build argument(s) passed to image builds
    #[arg(long = "build-arg")]
    pub build_arg: Vec<String>,

    /// Additional build context(s) passed to image builds
    #[arg(long = "build-context")]
    pub build_context: Vec<String>,

    /// Path to the configuration file
    #[arg(long = "config-file", default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: String,

    /// Colorize output: auto|always|never
    #[arg(long, value_enum)]
    pub color: Option<ColorMode>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub(crate) fn global_options(&self) -> GlobalOptions {
        GlobalOptions {
            registry: self.registry.clone(),
            build_container_image: self.build_container_image.clone(),
            build_container_tag: self.build_container_tag.clone(),
            build_container_net: self.build_container_net.clone(),
            env_files: self.env_file.clone(),
            build_args: self.build_arg.clone(),
            build_contexts: self.build_context.clone(),
        }
    }
}

/// Options shared by `run`, `make` and `shell`.
#[derive(Args, Debug, Clone)]
pub(crate) struct ContainerOpts {
    /// Container name
    #[arg(short = 'n', long)]
    pub name: Option<String>,

    /// Environment variables to pass the container
    #[arg(short = 'e', long = "env")]
    pub env: Vec<String>,

    /// Use cache image
    #[arg(short = 'c', long)]
    pub cache: bool,

    /// Publish a port
    #[arg(short = 'p', long, value_parser = validate_publish)]
    pub publish: Vec<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Build a container
    Build {
        #[arg(value_name = "IMAGE")]
        images: Vec<String>,
        /// Container context path
        #[arg(long = "container-context")]
        container_context: Option<String>,
        /// Use cache image
        #[arg(short = 'c', long)]
        cache: bool,
    },

    /// Push a container
    Push {
        /// Namespace to push into
        #[arg(long)]
        namespace: Option<String>,
        /// Push image even if it's already in the registry
        #[arg(long)]
        force: bool,
        image: String,
    },

    /// List images
    Images {
        /// List also remote images
        #[arg(short = 'r', long)]
        remote: bool,
    },

    /// Delete an image from local docker or from registry
    Rmi {
        /// Delete image from registry
        #[arg(short = 'r', long)]
        remote: bool,
        image: String,
        tag: String,
    },

    /// Run arbitrary commands
    Run {
        /// Interactive mode
        #[arg(short = 'i', long)]
        interactive: bool,
        #[command(flatten)]
        opts: ContainerOpts,
        #[arg(
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            value_name = "COMMAND"
        )]
        command: Vec<String>,
    },

    /// Execute makefile target(s)
    Make {
        /// Interactive mode
        #[arg(short = 'i', long)]
        interactive: bool,
        /// Makefile to use
        #[arg(short = 'f', value_name = "MAKEFILE")]
        makefile: Option<String>,
        #[command(flatten)]
        opts: ContainerOpts,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "TARGET")]
        targets: Vec<String>,
    },

    /// Start a shell
    Shell {
        #[command(flatten)]
        opts: ContainerOpts,
    },

    /// Output skipper version
    Version {
        /// Include build metadata
        #[arg(long)]
        verbose: bool,
    },

    /// Output bash completion script
    Completion,
}
