#![allow(clippy::module_name_repetitions)]
//! Local image queries through the runtime CLI.

use serde::Deserialize;

use crate::docker::runtime::ContainerRuntime;
use crate::errors::SkipperError;
use crate::image::{build_fqdn, ImageRow};
use crate::util::{shell_preview, ProcessRunner};

/// Registry column value for images that only exist locally.
pub const LOCAL_REGISTRY: &str = "none";

const IMAGES_JSON_FORMAT: &str = r#"{"name":"{{.Repository}}","tag":"{{.Tag}}"}"#;

#[derive(Deserialize)]
struct ImageRecord {
    name: String,
    tag: String,
}

fn checked_stdout(runner: &dyn ProcessRunner, argv: &[String]) -> Result<String, SkipperError> {
    let out = runner.output(argv)?;
    if !out.success() {
        return Err(SkipperError::Command {
            argv: shell_preview(argv),
            code: out.code,
        });
    }
    Ok(out.stdout.trim().to_string())
}

/// Return true if `image:tag` exists locally (without pulling).
pub fn local_image_exists(
    runner: &dyn ProcessRunner,
    runtime: &ContainerRuntime,
    image: &str,
    tag: &str,
) -> Result<bool, SkipperError> {
    let name = build_fqdn(None, None, image, Some(tag));
    let argv = runtime.command(["images", "--format", "{{.ID}}", name.as_str()]);
    Ok(!checked_stdout(runner, &argv)?.is_empty())
}

/// Parse `images --format` JSON lines into rows; blank lines are skipped.
pub fn parse_images_output(output: &str) -> Result<Vec<ImageRow>, SkipperError> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|line| {
            let rec: ImageRecord = serde_json::from_str(line).map_err(|e| {
                SkipperError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unexpected images output '{line}': {e}"),
                ))
            })?;
            Ok(ImageRow {
                registry: LOCAL_REGISTRY.to_string(),
                name: rec.name,
                tag: rec.tag,
            })
        })
        .collect()
}

/// Local rows for each image repository name.
pub fn local_images_info(
    runner: &dyn ProcessRunner,
    runtime: &ContainerRuntime,
    images: &[String],
) -> Result<Vec<ImageRow>, SkipperError> {
    let mut rows = Vec::new();
    for image in images {
        let argv = runtime.command(["images", "--format", IMAGES_JSON_FORMAT, image.as_str()]);
        rows.extend(parse_images_output(&checked_stdout(runner, &argv)?)?);
    }
    Ok(rows)
}

/// `rmi image:tag`; returns the runtime's exit code.
pub fn delete_local_image(
    runner: &dyn ProcessRunner,
    runtime: &ContainerRuntime,
    image: &str,
    tag: &str,
) -> Result<i32, SkipperError> {
    let name = build_fqdn(None, None, image, Some(tag));
    let argv = runtime.command(["rmi", name.as_str()]);
    Ok(runner.status(&argv, Default::default())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_images_output() {
        let out = "{\"name\":\"app\",\"tag\":\"abc\"}\n\n{\"name\":\"app\",\"tag\":\"cache\"}\n";
        let rows = parse_images_output(out).expect("parse");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].registry, "none");
        assert_eq!(rows[0].name, "app");
        assert_eq!(rows[1].tag, "cache");
        assert!(parse_images_output("").expect("empty").is_empty());
        assert!(parse_images_output("not json").is_err());
    }
}
