//! Git plumbing: current revision and working tree state, via `git` subprocesses.

use std::path::Path;

use crate::color::Logger;
use crate::errors::SkipperError;
use crate::util::{shell_preview, ProcessRunner};

/// Placeholder revision used outside a repository.
pub const NO_REVISION: &str = "none";

fn git_argv(dir: &Path, args: &[&str]) -> Vec<String> {
    let mut argv = vec![
        "git".to_string(),
        "-C".to_string(),
        dir.display().to_string(),
    ];
    argv.extend(args.iter().map(|s| s.to_string()));
    argv
}

/// True when `dir` holds a `.git` entry or lies inside a work tree.
pub fn is_repository(runner: &dyn ProcessRunner, dir: &Path) -> bool {
    if dir.join(".git").exists() {
        return true;
    }
    runner
        .output(&git_argv(dir, &["rev-parse", "--is-inside-work-tree"]))
        .map(|out| out.success())
        .unwrap_or(false)
}

/// True when tracked files differ from HEAD.
pub fn has_uncommitted_changes(runner: &dyn ProcessRunner, dir: &Path) -> bool {
    runner
        .output(&git_argv(dir, &["diff", "--quiet", "HEAD"]))
        .map(|out| !out.success())
        .unwrap_or(true)
}

/// Resolve HEAD to a commit hash; warns (without failing) when the tree is dirty.
pub fn current_revision(
    runner: &dyn ProcessRunner,
    dir: &Path,
    short: bool,
    logger: &Logger,
) -> Result<String, SkipperError> {
    if !is_repository(runner, dir) {
        return Err(SkipperError::NotAVcsRepo);
    }
    let argv = if short {
        git_argv(dir, &["rev-parse", "--short", "HEAD"])
    } else {
        git_argv(dir, &["rev-parse", "HEAD"])
    };
    if has_uncommitted_changes(runner, dir) {
        logger.warn("uncommitted changes present - build container version might be outdated");
    }
    let out = runner.output(&argv)?;
    if !out.success() {
        return Err(SkipperError::Command {
            argv: shell_preview(&argv),
            code: out.code,
        });
    }
    Ok(out.stdout.trim().to_string())
}

/// Like [`current_revision`], but falls back to [`NO_REVISION`] with a warning outside a repository.
pub fn revision_or_none(
    runner: &dyn ProcessRunner,
    dir: &Path,
    short: bool,
    logger: &Logger,
) -> Result<String, SkipperError> {
    match current_revision(runner, dir, short, logger) {
        Err(SkipperError::NotAVcsRepo) => {
            logger.warn("not working in a git repository");
            Ok(NO_REVISION.to_string())
        }
        other => other,
    }
}
