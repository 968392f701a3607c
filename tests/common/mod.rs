// Shared test helpers for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use scenario_runner::core::environment::{EnvironmentError, EnvironmentInitializer, StepResult};
use scenario_runner::core::models::{Location, Scenario, Step, StepKeyword};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::{TempDir, tempdir};

pub const RESOURCE_PREFIX: &str = "resource:";

/// Builds an in-memory scenario. Step texts are interpreted by [`MockEnvironment`].
pub fn scenario(name: &str, tags: &[&str], steps: &[&str]) -> Scenario {
    let steps = steps
        .iter()
        .enumerate()
        .map(|(i, text)| Step::new(StepKeyword::Given, *text, i + 2))
        .collect();
    Scenario::new(name, Location::new("features/mock.feature", 1))
        .with_tags(tags)
        .with_steps(steps)
}

/// The catalog used by the selection examples: `{perf, docker}`, `{perf, ebpf}`, `{smoke}`.
pub fn three_scenario_catalog() -> Vec<Scenario> {
    vec![
        scenario("perf on docker", &["perf", "docker"], &["it passes"]),
        scenario("perf on ebpf", &["perf", "ebpf"], &["it passes"]),
        scenario("smoke", &["smoke"], &["it passes"]),
    ]
}

pub fn write_file(dir: &Path, relative: &str, content: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create fixture directory");
    }
    fs::write(&path, content).expect("Failed to write fixture file");
    path
}

/// Creates a suite directory with a config file and the feature files of the
/// docker-compose performance profile.
pub fn setup_suite_project(config: &str) -> TempDir {
    let temp_dir = tempdir().expect("Failed to create temporary directory");
    write_file(temp_dir.path(), "Scenarios.toml", config);
    write_file(
        temp_dir.path(),
        "test_cases/ingest.feature",
        r#"@e2e-performance @docker-compose
Feature: Log ingestion

  Scenario: Ingest at full speed
    Given the command `true` succeeds

  @ebpf
  Scenario: Ingest through ebpf
    Given the command `true` succeeds
"#,
    );
    write_file(
        temp_dir.path(),
        "test_cases/smoke.feature",
        r#"@smoke
Feature: Smoke

  Scenario: Binary starts
    Given the command `true` succeeds
"#,
    );
    temp_dir
}

/// A config whose steps run through `sh -c`.
pub fn shell_config(extra: &str) -> String {
    format!(
        r#"language = "en"
name = "TestSuite"
agent_env = ""

{extra}

[[steps]]
pattern = '^the command `(?P<cmd>.+)` succeeds$'
command = "sh -c {{cmd}}"
"#
    )
}

/// An environment driven by step texts:
/// `it passes`, `it fails`, `it sleeps <ms>`, `it panics`; anything else is undefined.
#[derive(Default)]
pub struct MockEnvironment {
    pub fail_start: bool,
    pub fail_setup_for: HashSet<String>,
    pub panic_setup_for: HashSet<String>,
    /// How long every setup takes before it provisions anything.
    pub setup_delay: Option<Duration>,
    pub fail_teardown_for: HashSet<String>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub setups: AtomicUsize,
    pub teardowns: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub resource_conflicts: AtomicUsize,
    pub active_resources: Mutex<HashSet<String>>,
    pub executed: Mutex<Vec<String>>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_setup(names: &[&str]) -> Self {
        Self {
            fail_setup_for: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

pub struct MockContext {
    scenario: String,
    resources: Vec<String>,
}

#[async_trait]
impl EnvironmentInitializer for MockEnvironment {
    type Context = MockContext;

    async fn start(&self) -> Result<(), EnvironmentError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(EnvironmentError::Setup("compose stack did not come up".into()));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), EnvironmentError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn setup(&self, scenario: &Scenario) -> Result<MockContext, EnvironmentError> {
        self.setups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.setup_delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_setup_for.contains(&scenario.name) {
            panic!("setup of {} panicked", scenario.name);
        }
        if self.fail_setup_for.contains(&scenario.name) {
            return Err(EnvironmentError::Setup(format!("cannot prepare {}", scenario.name)));
        }

        let resources: Vec<String> = scenario
            .resource_tags(RESOURCE_PREFIX)
            .map(str::to_string)
            .collect();
        {
            let mut active = self.active_resources.lock().unwrap();
            for resource in &resources {
                if !active.insert(resource.clone()) {
                    self.resource_conflicts.fetch_add(1, Ordering::SeqCst);
                }
            }
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.executed.lock().unwrap().push(scenario.name.clone());

        Ok(MockContext {
            scenario: scenario.name.clone(),
            resources,
        })
    }

    async fn run_step(&self, _context: &mut MockContext, step: &Step) -> StepResult {
        let text = step.text.as_str();
        if text == "it passes" {
            return StepResult::Passed;
        }
        if text == "it fails" {
            return StepResult::Failed {
                message: "boom".to_string(),
            };
        }
        if text == "it panics" {
            panic!("step panicked");
        }
        if let Some(ms) = text.strip_prefix("it sleeps ").and_then(|ms| ms.parse().ok()) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            return StepResult::Passed;
        }
        StepResult::Undefined
    }

    async fn teardown(&self, context: MockContext) -> Result<(), EnvironmentError> {
        self.teardowns.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        {
            let mut active = self.active_resources.lock().unwrap();
            for resource in &context.resources {
                active.remove(resource);
            }
        }
        if self.fail_teardown_for.contains(&context.scenario) {
            return Err(EnvironmentError::Teardown(format!(
                "cannot clean up {}",
                context.scenario
            )));
        }
        Ok(())
    }
}
