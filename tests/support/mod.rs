/*!
Test support helpers shared across integration tests.

- FakeRunner: records every argv and answers from scripted prefix rules (default: exit 0, no output)
- FakeRegistry: in-memory tag lists with recorded manifest deletions
- host_env(dir): deterministic host facts rooted in a scratch directory
- have_git(): check git availability on PATH
*/

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::process::Command;
use std::rc::Rc;

use skipper::docker::HostEnv;
use skipper::registry::RegistryApi;
use skipper::util::CommandOutput;
use skipper::{ProcessRunner, SkipperError, StdoutTarget};

#[derive(Debug, Clone)]
struct Rule {
    prefix: Vec<String>,
    output: CommandOutput,
}

#[derive(Debug, Default)]
struct RunnerState {
    rules: Vec<Rule>,
    calls: Vec<(Vec<String>, Option<StdoutTarget>)>,
}

/// Recording process runner. Clones share state, so a clone can be handed to a `Context`.
#[derive(Debug, Clone, Default)]
pub struct FakeRunner {
    state: Rc<RefCell<RunnerState>>,
}

#[allow(dead_code)]
impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer argvs starting with `prefix` with `code` and `stdout`. Later rules win.
    pub fn on(&self, prefix: &[&str], code: i32, stdout: &str) -> &Self {
        self.state.borrow_mut().rules.push(Rule {
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            output: CommandOutput {
                code,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
        });
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.state
            .borrow()
            .calls
            .iter()
            .map(|(argv, _)| argv.clone())
            .collect()
    }

    /// Stdout routing of each `status` call (`None` for captured `output` calls).
    pub fn targets(&self) -> Vec<Option<StdoutTarget>> {
        self.state.borrow().calls.iter().map(|(_, t)| *t).collect()
    }

    /// First two words of each call, e.g. `docker build` or `git -C`.
    pub fn verbs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.iter().take(2).cloned().collect::<Vec<_>>().join(" "))
            .collect()
    }

    pub fn count(&self, prefix: &[&str]) -> usize {
        self.calls()
            .iter()
            .filter(|c| starts_with(c, prefix))
            .count()
    }

    fn answer(&self, argv: &[String], target: Option<StdoutTarget>) -> CommandOutput {
        let mut state = self.state.borrow_mut();
        state.calls.push((argv.to_vec(), target));
        state
            .rules
            .iter()
            .rev()
            .find(|r| r.prefix.len() <= argv.len() && r.prefix.iter().zip(argv).all(|(a, b)| a == b))
            .map(|r| r.output.clone())
            .unwrap_or_default()
    }
}

fn starts_with(argv: &[String], prefix: &[&str]) -> bool {
    prefix.len() <= argv.len() && prefix.iter().zip(argv).all(|(a, b)| a == b)
}

impl ProcessRunner for FakeRunner {
    fn status(&self, argv: &[String], stdout: StdoutTarget) -> io::Result<i32> {
        Ok(self.answer(argv, Some(stdout)).code)
    }

    fn output(&self, argv: &[String]) -> io::Result<CommandOutput> {
        Ok(self.answer(argv, None))
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    tags: BTreeMap<String, Vec<String>>,
    deleted: Vec<(String, String)>,
    unavailable: bool,
}

/// In-memory registry keyed by repository name.
#[derive(Debug, Clone, Default)]
pub struct FakeRegistry {
    state: Rc<RefCell<RegistryState>>,
}

#[allow(dead_code)]
impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(self, image: &str, tags: &[&str]) -> Self {
        self.state.borrow_mut().tags.insert(
            image.to_string(),
            tags.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    /// Every request fails with a 503.
    pub fn unavailable(self) -> Self {
        self.state.borrow_mut().unavailable = true;
        self
    }

    pub fn deleted(&self) -> Vec<(String, String)> {
        self.state.borrow().deleted.clone()
    }

    fn check(&self) -> Result<(), SkipperError> {
        if self.state.borrow().unavailable {
            return Err(SkipperError::Registry {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

impl RegistryApi for FakeRegistry {
    fn list_tags(&self, image: &str) -> Result<Vec<String>, SkipperError> {
        self.check()?;
        Ok(self
            .state
            .borrow()
            .tags
            .get(image)
            .cloned()
            .unwrap_or_default())
    }

    fn manifest_digest(&self, image: &str, tag: &str) -> Result<String, SkipperError> {
        self.check()?;
        Ok(format!("sha256:{image}-{tag}"))
    }

    fn delete_manifest(&self, image: &str, digest: &str) -> Result<(), SkipperError> {
        self.check()?;
        self.state
            .borrow_mut()
            .deleted
            .push((image.to_string(), digest.to_string()));
        Ok(())
    }
}

/// Host facts under `dir`: home in `dir/home`, cwd in `dir/ws/proj`, docker gid 999.
#[allow(dead_code)]
pub fn host_env(dir: &Path) -> HostEnv {
    HostEnv {
        user: "dev".to_string(),
        uid: 1000,
        home: dir.join("home"),
        cwd: dir.join("ws").join("proj"),
        docker_gid: Some(999),
        keep_containers: false,
        remap_private: false,
        etc_docker_exists: false,
        entrypoint: dir.join("skipper-entrypoint.sh"),
    }
}

#[allow(dead_code)]
pub fn argv(words: &[&str]) -> Vec<String> {
    words.iter().map(|s| s.to_string()).collect()
}

/// Return true if `git` is available on PATH.
#[allow(dead_code)]
pub fn have_git() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
