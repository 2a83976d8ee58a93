#![allow(clippy::module_name_repetitions)]
//! Small utilities: command-line joining/escaping and environment toggles.

pub mod exec;
pub mod fs;

pub use exec::{CommandOutput, ProcessRunner, StdoutTarget, SystemRunner};

/// Join a command into the single string handed to the container entrypoint.
///
/// Words are joined with plain spaces and are NOT escaped: the entrypoint re-invokes a shell,
/// so operators such as `&&`, pipes and redirects passed as separate words keep their meaning.
pub fn shell_join(args: &[String]) -> String {
    args.join(" ")
}

/// Render an argument vector as a copy-pasteable shell line (for debug output only).
pub fn shell_preview(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_escape(a))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        "''".to_string()
    } else if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_=./:@,".contains(c))
    {
        s.to_string()
    } else {
        let escaped = s.replace('\'', "'\"'\"'");
        format!("'{}'", escaped)
    }
}

/// Interpret a boolean-ish toggle value (`1`, `true`, `yes`, `on`; case-insensitive).
pub fn is_truthy(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Return true when the environment variable is set to a truthy value.
pub fn env_flag(key: &str) -> bool {
    std::env::var(key).map(|v| is_truthy(&v)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_join_keeps_operators_unquoted() {
        let args = vec![
            "make".to_string(),
            "all".to_string(),
            "&&".to_string(),
            "ls".to_string(),
            "-l".to_string(),
        ];
        assert_eq!(shell_join(&args), "make all && ls -l");
    }

    #[test]
    fn test_shell_escape_simple() {
        assert_eq!(shell_escape("abc-123_./:@"), "abc-123_./:@");
    }

    #[test]
    fn test_shell_escape_with_spaces_and_quotes() {
        assert_eq!(shell_escape("a b c"), "'a b c'");
        assert_eq!(shell_escape("O'Reilly"), "'O'\"'\"'Reilly'");
        assert_eq!(shell_escape(""), "''");
    }

    #[test]
    fn test_shell_preview() {
        let args = vec!["docker".to_string(), "run".to_string(), "ls -l".to_string()];
        assert_eq!(shell_preview(&args), "docker run 'ls -l'");
    }

    #[test]
    fn test_is_truthy_variants() {
        for v in ["1", "true", "TRUE", "Yes", " on "] {
            assert!(is_truthy(v), "{v} should be truthy");
        }
        for v in ["", "0", "false", "no", "off", "maybe"] {
            assert!(!is_truthy(v), "{v} should not be truthy");
        }
    }
}
