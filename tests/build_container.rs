mod support;

use std::path::Path;

use skipper::docker::ContainerRuntime;
use skipper::nested::{run_nested, NestedRun};
use skipper::{Context, Logger, Settings, SkipperError, StdoutTarget};
use support::{argv, host_env, FakeRegistry, FakeRunner};

const IMAGE: &str = "build-container-image";
const TAG: &str = "build-container-tag";

fn settings(root: &Path, tag: &str, registry: Option<&str>) -> Settings {
    Settings {
        registry: registry.map(str::to_string),
        build_container_image: Some(IMAGE.to_string()),
        build_container_tag: Some(tag.to_string()),
        project_root: root.to_path_buf(),
        ..Default::default()
    }
}

fn context(root: &Path, settings: Settings, fake: &FakeRunner) -> Context {
    Context::new(settings, Logger::default(), Box::new(fake.clone()))
        .with_runtime(ContainerRuntime::docker())
        .with_host(host_env(root))
}

fn ls() -> NestedRun {
    NestedRun {
        command: argv(&["ls", "-l"]),
        ..Default::default()
    }
}

#[test]
fn test_missing_image_fails_after_lookups_only() {
    let td = tempfile::tempdir().expect("tmpdir");
    let fake = FakeRunner::new();
    let ctx = context(td.path(), settings(td.path(), TAG, Some("registry.io:5000")), &fake)
        .with_registry_api(Box::new(FakeRegistry::new()));

    match run_nested(&ctx, ls()) {
        Err(SkipperError::ImageNotFound { image, tag }) => {
            assert_eq!(image, IMAGE);
            assert_eq!(tag, TAG);
        }
        other => panic!("expected ImageNotFound, got {other:?}"),
    }
    assert_eq!(
        fake.calls(),
        vec![argv(&[
            "docker",
            "images",
            "--format",
            "{{.ID}}",
            "build-container-image:build-container-tag"
        ])]
    );
}

#[test]
fn test_unreachable_registry_still_reports_missing_image() {
    let td = tempfile::tempdir().expect("tmpdir");
    let fake = FakeRunner::new();
    let ctx = context(td.path(), settings(td.path(), TAG, Some("registry.io:5000")), &fake)
        .with_registry_api(Box::new(FakeRegistry::new().unavailable()));
    assert!(matches!(
        run_nested(&ctx, ls()),
        Err(SkipperError::ImageNotFound { .. })
    ));
    assert_eq!(fake.calls().len(), 1);
}

#[test]
fn test_remote_image_is_used_by_fqdn() {
    let td = tempfile::tempdir().expect("tmpdir");
    let fake = FakeRunner::new();
    let ctx = context(td.path(), settings(td.path(), TAG, Some("registry.io:5000")), &fake)
        .with_registry_api(Box::new(FakeRegistry::new().with_tags(IMAGE, &[TAG])));

    assert_eq!(run_nested(&ctx, ls()).expect("run"), 0);
    let calls = fake.calls();
    assert_eq!(fake.verbs(), vec!["docker images", "docker run"]);
    let run = &calls[1];
    assert_eq!(
        run[run.len() - 2],
        "registry.io:5000/build-container-image:build-container-tag"
    );
}

#[test]
fn test_git_revision_builds_and_tags_on_a_clean_tree() {
    let td = tempfile::tempdir().expect("tmpdir");
    let root = td.path().display().to_string();
    let fake = FakeRunner::new();
    fake.on(&["git", "-C", root.as_str(), "rev-parse", "HEAD"], 0, "deadbeef\n");
    let ctx = context(td.path(), settings(td.path(), "git:revision", None), &fake);

    assert_eq!(run_nested(&ctx, ls()).expect("run"), 0);

    let calls = fake.calls();
    let docker: Vec<(Vec<String>, Option<StdoutTarget>)> = calls
        .iter()
        .cloned()
        .zip(fake.targets())
        .filter(|(c, _)| c[0] == "docker")
        .collect();
    let verbs: Vec<&str> = docker.iter().map(|(c, _)| c[1].as_str()).collect();
    assert_eq!(verbs, vec!["images", "build", "tag", "run"]);

    let (lookup, _) = &docker[0];
    assert_eq!(lookup.last().map(String::as_str), Some("build-container-image:deadbeef"));

    let (build, build_target) = &docker[1];
    assert_eq!(*build_target, Some(StdoutTarget::Stderr));
    let dockerfile = td.path().join("Dockerfile.build-container-image");
    assert_eq!(
        build[2..],
        argv(&[
            "--network=host",
            "-f",
            &dockerfile.display().to_string(),
            "-t",
            "build-container-image",
            "."
        ])[..]
    );

    let (tag, tag_target) = &docker[2];
    assert_eq!(*tag_target, Some(StdoutTarget::Stderr));
    assert_eq!(
        tag[2..],
        argv(&["build-container-image", "build-container-image:deadbeef"])[..]
    );

    let (run, run_target) = &docker[3];
    assert_eq!(*run_target, Some(StdoutTarget::Inherit));
    assert_eq!(run[run.len() - 2], "build-container-image");
}

#[test]
fn test_git_revision_skips_tag_on_a_dirty_tree() {
    let td = tempfile::tempdir().expect("tmpdir");
    let root = td.path().display().to_string();
    let fake = FakeRunner::new();
    fake.on(&["git", "-C", root.as_str(), "rev-parse", "HEAD"], 0, "deadbeef\n");
    let cwd = host_env(td.path()).cwd.display().to_string();
    fake.on(&["git", "-C", cwd.as_str(), "diff"], 1, "");
    let ctx = context(td.path(), settings(td.path(), "git:revision", None), &fake);

    assert_eq!(run_nested(&ctx, ls()).expect("run"), 0);
    assert_eq!(fake.count(&["docker", "tag"]), 0);
    assert_eq!(fake.count(&["docker", "build"]), 1);
}

#[test]
fn test_failed_build_container_build_is_an_error() {
    let td = tempfile::tempdir().expect("tmpdir");
    let fake = FakeRunner::new();
    fake.on(&["docker", "build"], 2, "");
    let mut s = settings(td.path(), TAG, None);
    s.build_container_tag = None;
    let ctx = context(td.path(), s, &fake);

    match run_nested(&ctx, ls()) {
        Err(SkipperError::BuildFailed { image, code }) => {
            assert_eq!(image, IMAGE);
            assert_eq!(code, 2);
        }
        other => panic!("expected BuildFailed, got {other:?}"),
    }
    assert_eq!(fake.count(&["docker", "run"]), 0);
}

#[test]
fn test_missing_build_container_image_is_a_parameter_error() {
    let td = tempfile::tempdir().expect("tmpdir");
    let fake = FakeRunner::new();
    let mut s = settings(td.path(), TAG, None);
    s.build_container_image = None;
    let ctx = context(td.path(), s, &fake);
    assert!(matches!(
        run_nested(&ctx, ls()),
        Err(SkipperError::MissingParameter("build-container-image"))
    ));
    assert!(fake.calls().is_empty());
}
