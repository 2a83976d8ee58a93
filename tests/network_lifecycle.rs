mod support;

use skipper::docker::{ContainerRunner, ContainerRuntime, RunSpec};
use skipper::{ImageRef, Logger, SkipperError};
use support::{argv, host_env, FakeRunner};

fn spec(network: &str) -> RunSpec {
    RunSpec {
        command: argv(&["make", "test"]),
        target_image: Some(
            ImageRef::new("build-container-image")
                .expect("image")
                .with_tag(Some("build-container-tag")),
        ),
        network: Some(network.to_string()),
        ..Default::default()
    }
}

#[test]
fn test_missing_network_is_created_and_destroyed_once() {
    let td = tempfile::tempdir().expect("tmpdir");
    let host = host_env(td.path());
    let runtime = ContainerRuntime::docker();
    let logger = Logger::default();
    let fake = FakeRunner::new();
    fake.on(&["docker", "run"], 5, "");

    let runner = ContainerRunner::new(&fake, &runtime, &host, &logger);
    let code = runner.execute(&spec("skipper-net")).expect("execute");
    assert_eq!(code, 5);
    assert_eq!(fake.count(&["docker", "network", "create", "skipper-net"]), 1);
    assert_eq!(fake.count(&["docker", "network", "rm", "skipper-net"]), 1);
    let verbs: Vec<String> = fake
        .calls()
        .iter()
        .map(|c| c[1..3.min(c.len())].join(" "))
        .collect();
    assert_eq!(
        verbs,
        vec!["network ls", "network create", "run -t", "network rm"]
    );
}

#[test]
fn test_existing_network_is_left_alone() {
    let td = tempfile::tempdir().expect("tmpdir");
    let host = host_env(td.path());
    let runtime = ContainerRuntime::docker();
    let logger = Logger::default();
    let fake = FakeRunner::new();
    fake.on(&["docker", "network", "ls"], 0, "host\n");

    let runner = ContainerRunner::new(&fake, &runtime, &host, &logger);
    assert_eq!(runner.execute(&spec("host")).expect("execute"), 0);
    assert_eq!(fake.count(&["docker", "network", "create"]), 0);
    assert_eq!(fake.count(&["docker", "network", "rm"]), 0);
    let run = fake
        .calls()
        .into_iter()
        .find(|c| c[1] == "run")
        .expect("run call");
    let net = run.iter().position(|a| a == "--net").expect("--net");
    assert_eq!(run[net + 1], "host");
}

#[test]
fn test_network_with_a_longer_name_does_not_count_as_existing() {
    let td = tempfile::tempdir().expect("tmpdir");
    let host = host_env(td.path());
    let runtime = ContainerRuntime::docker();
    let logger = Logger::default();
    let fake = FakeRunner::new();
    fake.on(&["docker", "network", "ls"], 0, "mynet\n");

    let runner = ContainerRunner::new(&fake, &runtime, &host, &logger);
    assert_eq!(runner.execute(&spec("net")).expect("execute"), 0);
    assert_eq!(fake.count(&["docker", "network", "create", "net"]), 1);
    assert_eq!(fake.count(&["docker", "network", "rm", "net"]), 1);
}

#[test]
fn test_podman_never_manages_networks() {
    let td = tempfile::tempdir().expect("tmpdir");
    let host = host_env(td.path());
    let runtime = ContainerRuntime::podman();
    let logger = Logger::default();
    let fake = FakeRunner::new();

    let runner = ContainerRunner::new(&fake, &runtime, &host, &logger);
    assert_eq!(runner.execute(&spec("skipper-net")).expect("execute"), 0);
    let calls = fake.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(&calls[0][..2], &argv(&["podman", "run"])[..]);
    assert!(calls[0].iter().any(|a| a == "--net"));
}

#[test]
fn test_destroy_is_retried_then_surfaces_the_error() {
    let td = tempfile::tempdir().expect("tmpdir");
    let host = host_env(td.path());
    let runtime = ContainerRuntime::docker();
    let logger = Logger::default();
    let fake = FakeRunner::new();
    fake.on(&["docker", "network", "rm"], 1, "");

    let runner = ContainerRunner::new(&fake, &runtime, &host, &logger);
    match runner.execute(&spec("skipper-net")) {
        Err(SkipperError::Command { code, .. }) => assert_eq!(code, 1),
        other => panic!("expected a command error, got {other:?}"),
    }
    assert_eq!(fake.count(&["docker", "network", "rm"]), 10);
}

#[test]
fn test_host_direct_run_ignores_container_fields() {
    let td = tempfile::tempdir().expect("tmpdir");
    let host = host_env(td.path());
    let runtime = ContainerRuntime::docker();
    let logger = Logger::default();
    let fake = FakeRunner::new();
    fake.on(&["echo"], 3, "");

    let runner = ContainerRunner::new(&fake, &runtime, &host, &logger);
    let spec = RunSpec {
        command: argv(&["echo", "hi"]),
        network: Some("skipper-net".to_string()),
        published_ports: vec!["80:80".to_string()],
        ..Default::default()
    };
    assert_eq!(runner.execute(&spec).expect("execute"), 3);
    assert_eq!(fake.calls(), vec![argv(&["echo", "hi"])]);
}
