#![allow(clippy::module_name_repetitions)]
//! Color mode configuration, ANSI painting and the stderr [`Logger`].
//!
//! Logging policy (stderr one-liners):
//! - All diagnostics go to stderr; stdout is reserved for command output (tables, versions,
//!   completion scripts) so it can be captured by a calling shell.
//! - Messages are prefixed `[skipper] `; warnings additionally carry `warning: `.
//! - Debug lines are emitted only in verbose mode.

use clap::ValueEnum;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

fn parse_color_mode(s: &str) -> Option<ColorMode> {
    match s.trim().to_ascii_lowercase().as_str() {
        "auto" => Some(ColorMode::Auto),
        "always" | "on" | "true" | "yes" => Some(ColorMode::Always),
        "never" | "off" | "false" | "no" => Some(ColorMode::Never),
        _ => None,
    }
}

fn env_color_mode_pref() -> Option<ColorMode> {
    std::env::var("SKIPPER_COLOR")
        .ok()
        .and_then(|v| parse_color_mode(&v))
}

fn no_color_env() -> bool {
    // Per https://no-color.org/
    std::env::var("NO_COLOR").is_ok()
}

/// Decide whether to colorize a stream.
///
/// Precedence: NO_COLOR, then the explicit mode (CLI flag), then SKIPPER_COLOR, then TTY.
pub fn color_enabled_for(mode: Option<ColorMode>, is_tty: bool) -> bool {
    if no_color_env() {
        return false;
    }
    match mode.or_else(env_color_mode_pref) {
        Some(ColorMode::Always) => true,
        Some(ColorMode::Never) => false,
        Some(ColorMode::Auto) | None => is_tty,
    }
}

pub fn color_enabled_stderr(mode: Option<ColorMode>) -> bool {
    color_enabled_for(mode, atty::is(atty::Stream::Stderr))
}

/// Wrap string with ANSI color code when enabled; otherwise return unchanged.
pub fn paint(enabled: bool, code: &str, s: &str) -> String {
    if enabled {
        format!("{code}{s}\x1b[0m")
    } else {
        s.to_string()
    }
}

const PREFIX: &str = "[skipper] ";

/// Stderr logger carried by the command context.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger {
    verbose: bool,
    use_color: bool,
}

impl Logger {
    pub fn new(verbose: bool, use_color: bool) -> Self {
        Self { verbose, use_color }
    }

    /// Build a logger from the CLI color preference and the stderr TTY state.
    pub fn for_stderr(verbose: bool, mode: Option<ColorMode>) -> Self {
        Self::new(verbose, color_enabled_stderr(mode))
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn debug(&self, msg: &str) {
        if self.verbose {
            eprintln!("{}", paint(self.use_color, "\x1b[90m", &format!("{PREFIX}{msg}")));
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("{msg}");
    }

    pub fn info(&self, msg: &str) {
        eprintln!("{}", paint(self.use_color, "\x1b[36;1m", &format!("{PREFIX}{msg}")));
        #[cfg(feature = "tracing")]
        tracing::info!("{msg}");
    }

    pub fn warn(&self, msg: &str) {
        eprintln!(
            "{}",
            paint(self.use_color, "\x1b[33;1m", &format!("{PREFIX}warning: {msg}"))
        );
        #[cfg(feature = "tracing")]
        tracing::warn!("{msg}");
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{}", paint(self.use_color, "\x1b[31;1m", &format!("{PREFIX}{msg}")));
        #[cfg(feature = "tracing")]
        tracing::error!("{msg}");
    }
}
