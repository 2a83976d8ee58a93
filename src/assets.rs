//! Scripts compiled into the binary and their on-disk materialization.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use crate::util::fs::write_if_changed;

/// Bootstrap executed as the build container's entrypoint.
pub const ENTRYPOINT_SCRIPT: &str = include_str!("../data/skipper-entrypoint.sh");
/// Bash completion printed by `skipper completion`.
pub const COMPLETION_SCRIPT: &str = include_str!("../data/skipper-complete.sh");

const ENTRYPOINT_FILE: &str = "skipper-entrypoint.sh";

/// `$XDG_CACHE_HOME/skipper`, else `~/.cache/skipper`, else `<tmp>/skipper`.
pub fn cache_dir() -> PathBuf {
    if let Some(xdg) = env::var_os("XDG_CACHE_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join("skipper");
    }
    match home::home_dir() {
        Some(h) => h.join(".cache").join("skipper"),
        None => env::temp_dir().join("skipper"),
    }
}

/// Write the entrypoint script under `dir` (only when its content changed) and make it executable.
pub fn materialize_entrypoint(dir: &Path) -> io::Result<PathBuf> {
    let path = dir.join(ENTRYPOINT_FILE);
    write_if_changed(&path, ENTRYPOINT_SCRIPT.as_bytes())?;
    #[cfg(unix)]
    {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&path)?.permissions();
        if perms.mode() & 0o777 != 0o755 {
            perms.set_mode(0o755);
            fs::set_permissions(&path, perms)?;
        }
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_are_embedded() {
        assert!(ENTRYPOINT_SCRIPT.starts_with("#!"));
        assert!(COMPLETION_SCRIPT.contains("-F _skipper_completion skipper"));
    }

    #[test]
    fn test_materialize_entrypoint() {
        let td = tempfile::tempdir().expect("tmpdir");
        let p = materialize_entrypoint(td.path()).expect("write");
        assert_eq!(std::fs::read_to_string(&p).expect("read"), ENTRYPOINT_SCRIPT);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&p).expect("meta").permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
        // Second call is a no-op.
        assert_eq!(materialize_entrypoint(td.path()).expect("again"), p);
    }
}
