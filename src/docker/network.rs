#![allow(clippy::module_name_repetitions)]
//! Ephemeral network lifecycle around a containerized run.
//!
//! A network that already exists is reused and left alone. A missing one is created before the
//! run and removed after it. The existence check and the create are not atomic: two concurrent
//! invocations can both decide to create, in which case the runtime rejects the second create.

use std::thread;
use std::time::Duration;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::color::Logger;
use crate::docker::runtime::ContainerRuntime;
use crate::errors::SkipperError;
use crate::util::{shell_preview, ProcessRunner};

/// Attempts made to remove a network this invocation created.
pub const DESTROY_ATTEMPTS: u32 = 10;
/// Pause between removal attempts.
pub const DESTROY_DELAY: Duration = Duration::from_millis(100);

fn run_checked(
    runner: &dyn ProcessRunner,
    argv: &[String],
    logger: &Logger,
) -> Result<String, SkipperError> {
    logger.debug(&shell_preview(argv));
    let out = runner.output(argv)?;
    if out.success() {
        Ok(out.stdout)
    } else {
        Err(SkipperError::Command {
            argv: shell_preview(argv),
            code: out.code,
        })
    }
}

/// True when `network ls` lists a network named exactly `name`.
///
/// The runtime's `NAME=` filter matches substrings, so its output is compared line by line.
pub fn network_exists(
    runner: &dyn ProcessRunner,
    runtime: &ContainerRuntime,
    name: &str,
    logger: &Logger,
) -> Result<bool, SkipperError> {
    let filter = format!("NAME={name}");
    let argv = runtime.command([
        "network",
        "ls",
        "-f",
        filter.as_str(),
        "--format",
        "{{.Name}}",
    ]);
    Ok(run_checked(runner, &argv, logger)?
        .lines()
        .any(|l| l.trim() == name))
}

pub fn create_network(
    runner: &dyn ProcessRunner,
    runtime: &ContainerRuntime,
    name: &str,
    logger: &Logger,
) -> Result<(), SkipperError> {
    logger.debug(&format!("creating network {name}"));
    run_checked(runner, &runtime.command(["network", "create", name]), logger).map(|_| ())
}

/// Remove a network, retrying while the runtime still tears down the last container on it.
pub fn destroy_network(
    runner: &dyn ProcessRunner,
    runtime: &ContainerRuntime,
    name: &str,
    logger: &Logger,
) -> Result<(), SkipperError> {
    logger.debug(&format!("deleting network {name}"));
    let argv = runtime.command(["network", "rm", name]);
    let mut attempt = 1;
    loop {
        match run_checked(runner, &argv, logger) {
            Ok(_) => return Ok(()),
            Err(e) if attempt >= DESTROY_ATTEMPTS => return Err(e),
            Err(e) => {
                logger.debug(&format!("network rm attempt {attempt} failed: {e}"));
                attempt += 1;
                thread::sleep(DESTROY_DELAY);
            }
        }
    }
}

/// Run `body` with network `name` available, destroying it afterwards only if it was created here.
#[cfg_attr(feature = "tracing", instrument(skip(runner, runtime, logger, body)))]
pub fn with_network<F>(
    runner: &dyn ProcessRunner,
    runtime: &ContainerRuntime,
    name: &str,
    logger: &Logger,
    body: F,
) -> Result<i32, SkipperError>
where
    F: FnOnce() -> Result<i32, SkipperError>,
{
    if network_exists(runner, runtime, name, logger)? {
        return body();
    }
    create_network(runner, runtime, name, logger)?;
    let result = body();
    if let Err(e) = destroy_network(runner, runtime, name, logger) {
        if result.is_ok() {
            return Err(e);
        }
        logger.warn(&format!("failed to remove network {name}: {e}"));
    }
    result
}
