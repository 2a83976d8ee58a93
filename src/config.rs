#![allow(clippy::module_name_repetitions)]
//! `skipper.yaml` loading.
//!
//! Every string scalar is interpolated once at load time:
//! - `$(command)` runs `sh -c command` and is replaced by its trimmed stdout; a non-zero exit is
//!   an error. The command text is passed to the shell untouched.
//! - `$VAR` and `${VAR}` are replaced from the process environment (missing variables expand to
//!   an empty string).
//! - `$$` is a literal `$`.
//!
//! Keys may be written kebab-case or snake_case.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use crate::errors::ConfigError;
use crate::util::ProcessRunner;

pub const DEFAULT_CONFIG_FILE: &str = "skipper.yaml";

/// The `env:` key: a mapping or a list of `KEY=VALUE` / bare variable names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvSource {
    Mapping(BTreeMap<String, String>),
    List(Vec<String>),
}

fn scalar_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

impl EnvSource {
    /// Classify a raw `env:` value. `null` means no environment.
    pub fn from_value(v: Value) -> Result<Option<Self>, ConfigError> {
        match v {
            Value::Null => Ok(None),
            Value::Mapping(m) => {
                let mut out = BTreeMap::new();
                for (k, val) in &m {
                    let key = scalar_to_string(k)
                        .ok_or_else(|| ConfigError::InvalidEnv(format!("key {}", kind_of(k))))?;
                    let value = scalar_to_string(val).ok_or_else(|| {
                        ConfigError::InvalidEnv(format!("value of {key} is a {}", kind_of(val)))
                    })?;
                    out.insert(key, value);
                }
                Ok(Some(EnvSource::Mapping(out)))
            }
            Value::Sequence(items) => items
                .iter()
                .map(|item| {
                    scalar_to_string(item).ok_or_else(|| {
                        ConfigError::InvalidEnv(format!("list item is a {}", kind_of(item)))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|list| Some(EnvSource::List(list))),
            other => Err(ConfigError::InvalidEnv(format!("got a {}", kind_of(&other)))),
        }
    }

    /// Canonical `KEY=VALUE` entries. Bare names missing from `lookup` are skipped.
    pub fn resolve(&self, lookup: &dyn Fn(&str) -> Option<String>) -> Vec<String> {
        match self {
            EnvSource::Mapping(m) => m.iter().map(|(k, v)| format!("{k}={v}")).collect(),
            EnvSource::List(items) => items
                .iter()
                .filter_map(|item| {
                    if item.contains('=') {
                        Some(item.clone())
                    } else {
                        lookup(item).map(|v| format!("{item}={v}"))
                    }
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MakeConfig {
    pub makefile: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FileConfig {
    pub registry: Option<String>,
    #[serde(alias = "build_container_image")]
    pub build_container_image: Option<String>,
    #[serde(alias = "build_container_tag")]
    pub build_container_tag: Option<String>,
    #[serde(alias = "build_container_net")]
    pub build_container_net: Option<String>,
    /// Read separately so a bad shape maps to [`ConfigError::InvalidEnv`].
    #[serde(skip)]
    pub env: Option<EnvSource>,
    #[serde(alias = "env_file")]
    pub env_file: Vec<String>,
    /// Image name to dockerfile; replaces dockerfile discovery when present.
    pub containers: Option<BTreeMap<String, String>>,
    pub volumes: Vec<String>,
    pub workdir: Option<String>,
    pub workspace: Option<String>,
    #[serde(alias = "container_context")]
    pub container_context: Option<String>,
    #[serde(alias = "build_args")]
    pub build_args: Vec<String>,
    #[serde(alias = "build_contexts")]
    pub build_contexts: Vec<String>,
    pub make: MakeConfig,
}

impl FileConfig {
    /// Parse and interpolate YAML text. `origin` names the source in errors.
    pub fn parse(
        text: &str,
        origin: &str,
        runner: &dyn ProcessRunner,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut value: Value =
            serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
                path: origin.to_string(),
                source,
            })?;
        if value.is_null() {
            return Ok(Self::default());
        }
        interpolate_value(&mut value, runner, lookup)?;
        let env = match value.as_mapping_mut() {
            Some(m) => m.remove("env"),
            None => None,
        };
        let mut cfg: FileConfig =
            serde_yaml::from_value(value).map_err(|source| ConfigError::Parse {
                path: origin.to_string(),
                source,
            })?;
        if let Some(raw) = env {
            cfg.env = EnvSource::from_value(raw)?;
        }
        Ok(cfg)
    }

    /// Config environment as `KEY=VALUE` entries (host environment for bare names).
    pub fn env_entries(&self) -> Vec<String> {
        self.env
            .as_ref()
            .map(|e| e.resolve(&|k| std::env::var(k).ok()))
            .unwrap_or_default()
    }
}

/// Load `path` if it exists; a missing file yields the defaults.
pub fn load_config(path: &Path, runner: &dyn ProcessRunner) -> Result<FileConfig, ConfigError> {
    let origin = path.display().to_string();
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FileConfig::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: origin,
                source,
            })
        }
    };
    FileConfig::parse(&text, &origin, runner, &|k| std::env::var(k).ok())
}

fn interpolate_value(
    v: &mut Value,
    runner: &dyn ProcessRunner,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    match v {
        Value::String(s) => *s = interpolate(s, runner, lookup)?,
        Value::Sequence(items) => {
            for item in items {
                interpolate_value(item, runner, lookup)?;
            }
        }
        Value::Mapping(m) => {
            for (_, val) in m.iter_mut() {
                interpolate_value(val, runner, lookup)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn is_var_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_var_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn run_substitution(expr: &str, runner: &dyn ProcessRunner) -> Result<String, ConfigError> {
    let argv = vec!["sh".to_string(), "-c".to_string(), expr.to_string()];
    let out = runner.output(&argv).map_err(|e| ConfigError::Interpolation {
        expr: expr.to_string(),
        reason: e.to_string(),
    })?;
    if !out.success() {
        let detail = out.stderr.trim();
        return Err(ConfigError::Interpolation {
            expr: expr.to_string(),
            reason: if detail.is_empty() {
                format!("exit code {}", out.code)
            } else {
                format!("exit code {}: {detail}", out.code)
            },
        });
    }
    Ok(out.stdout.trim().to_string())
}

/// Expand `$(cmd)`, `${VAR}`, `$VAR` and `$$` in one left-to-right pass.
pub fn interpolate(
    input: &str,
    runner: &dyn ProcessRunner,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<String, ConfigError> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '$' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        match chars[i + 1] {
            '$' => {
                out.push('$');
                i += 2;
            }
            '(' => {
                let start = i + 2;
                let mut depth = 1;
                let mut j = start;
                while j < chars.len() {
                    match chars[j] {
                        '(' => depth += 1,
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    j += 1;
                }
                let expr: String = chars[start..j.min(chars.len())].iter().collect();
                if j >= chars.len() {
                    return Err(ConfigError::Interpolation {
                        expr,
                        reason: "missing closing parenthesis".to_string(),
                    });
                }
                out.push_str(&run_substitution(&expr, runner)?);
                i = j + 1;
            }
            '{' => {
                let start = i + 2;
                match chars[start..].iter().position(|c| *c == '}') {
                    Some(len) => {
                        let name: String = chars[start..start + len].iter().collect();
                        out.push_str(&lookup(&name).unwrap_or_default());
                        i = start + len + 1;
                    }
                    None => {
                        out.push('$');
                        i += 1;
                    }
                }
            }
            c if is_var_start(c) => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && is_var_char(chars[j]) {
                    j += 1;
                }
                let name: String = chars[start..j].iter().collect();
                out.push_str(&lookup(&name).unwrap_or_default());
                i = j;
            }
            _ => {
                out.push('$');
                i += 1;
            }
        }
    }
    Ok(out)
}
