//! Subprocess execution seam.
//!
//! Every external program (container runtime, git, `sh` for config interpolation) is started
//! through [`ProcessRunner`]. [`SystemRunner`] spawns real processes; tests substitute a
//! recording fake.

use std::ffi::OsString;
use std::io;
use std::process::{Command, ExitStatus, Stdio};

/// Where the child's standard output goes for [`ProcessRunner::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdoutTarget {
    /// Share the parent's stdout.
    #[default]
    Inherit,
    /// Send the child's stdout to the parent's stderr, keeping our stdout clean.
    Stderr,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

pub trait ProcessRunner {
    /// Run `argv` with inherited stdin/stderr, wait for it and return its exit code verbatim.
    fn status(&self, argv: &[String], stdout: StdoutTarget) -> io::Result<i32>;

    /// Run `argv` capturing stdout/stderr.
    fn output(&self, argv: &[String]) -> io::Result<CommandOutput>;
}

/// Spawns real host processes. Waits without a timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn status(&self, argv: &[String], stdout: StdoutTarget) -> io::Result<i32> {
        let req = ExecRequest::from_argv(argv)?.stdout(stdout);
        let status = req.command().status()?;
        Ok(exit_code(status))
    }

    fn output(&self, argv: &[String]) -> io::Result<CommandOutput> {
        let req = ExecRequest::from_argv(argv)?;
        let mut cmd = req.command();
        cmd.stdin(Stdio::null());
        let out = cmd.output()?;
        Ok(CommandOutput {
            code: exit_code(out.status),
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
        })
    }
}

#[derive(Debug, Default)]
struct ExecRequest {
    program: OsString,
    args: Vec<OsString>,
    stdout: StdoutTarget,
}

impl ExecRequest {
    fn from_argv(argv: &[String]) -> io::Result<Self> {
        let (program, rest) = argv
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
        Ok(Self {
            program: OsString::from(program),
            args: rest.iter().map(OsString::from).collect(),
            stdout: StdoutTarget::Inherit,
        })
    }

    fn stdout(mut self, target: StdoutTarget) -> Self {
        self.stdout = target;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if self.stdout == StdoutTarget::Stderr {
            cmd.stdout(Stdio::from(io::stderr()));
        }
        cmd
    }
}

/// Map an exit status to a shell-style exit code (128+N for signal N on unix).
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    1
}
