//! # Suite Configuration Module / 套件配置模块
//!
//! Loads the `Scenarios.toml` file that describes which scenarios to run,
//! how to select them, and how to prepare the environment they run in.
//!
//! 加载 `Scenarios.toml` 文件，它描述了要运行哪些场景、如何选择这些场景，
//! 以及如何准备它们运行的环境。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::execution::ExecutorOptions;

/// Tag expression of the built-in docker-compose performance profile.
/// 内置 docker-compose 性能配置的标签表达式。
pub const DEFAULT_TAGS: &str = "@e2e-performance && @docker-compose && ~@ebpf";

/// Environment variable whose value narrows the selection to one agent.
pub const DEFAULT_AGENT_ENV: &str = "AGENT";

pub const DEFAULT_CONFIG_FILE: &str = "Scenarios.toml";

/// Commands that manage the shared environment the scenarios run against.
/// 管理场景运行所依赖的共享环境的命令。
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct EnvironmentConfig {
    /// Run once before the first scenario, e.g. `docker compose up -d`.
    /// 在第一个场景之前运行一次，例如 `docker compose up -d`。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Run once after the last scenario, even when scenarios failed.
    /// 在最后一个场景之后运行一次，即使场景失败也会运行。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<String>,
    /// Run before each scenario.
    /// 在每个场景之前运行。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
    /// Run after each scenario whose setup succeeded.
    /// 在每个 setup 成功的场景之后运行。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teardown: Option<String>,
    /// Working directory for every command, relative to the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
    /// Extra variables exported to every command.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Maps step text to a shell command.
/// The pattern is a regular expression; `{1}` or `{name}` placeholders in the
/// command are replaced by the corresponding capture group.
///
/// 将步骤文本映射到 shell 命令。
/// pattern 是正则表达式；命令中的 `{1}` 或 `{name}` 占位符会被相应的捕获组替换。
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct StepDefinition {
    pub pattern: String,
    pub command: String,
}

/// The whole suite configuration, loaded from a TOML file.
/// 从 TOML 文件加载的完整套件配置。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SuiteConfig {
    /// The language for the runner's output messages (e.g., "en", "zh-CN").
    /// 运行器输出消息的语言（例如 "en", "zh-CN"）。
    #[serde(default = "default_language")]
    pub language: String,

    /// Suite name shown in reports.
    #[serde(default = "default_name")]
    pub name: String,

    /// Files or directories scanned for `.feature` files, relative to the config file.
    /// 扫描 `.feature` 文件的文件或目录，相对于配置文件。
    #[serde(default = "default_paths")]
    pub paths: Vec<PathBuf>,

    /// Base tag expression.
    /// 基础标签表达式。
    #[serde(default = "default_tags")]
    pub tags: String,

    /// Name of the environment variable that appends `&& @<value>` when non-empty.
    /// An empty name disables narrowing.
    ///
    /// 当值非空时追加 `&& @<value>` 的环境变量名。名称为空则禁用收窄。
    #[serde(default = "default_agent_env")]
    pub agent_env: String,

    /// How many scenario groups may run at once. 1 means strictly sequential.
    /// 可同时运行的场景组数量。1 表示严格顺序执行。
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Stop dispatching new scenarios after the first failure.
    /// 第一次失败后停止调度新场景。
    #[serde(default)]
    pub fail_fast: bool,

    /// Per-scenario timeout in seconds; `@timeout:<secs>` overrides it.
    /// 每个场景的超时时间（秒）；`@timeout:<secs>` 会覆盖它。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Consecutive setup failures that cancel the run. 0 disables the check.
    /// 导致运行被取消的连续 setup 失败次数。0 表示禁用该检查。
    #[serde(default = "default_setup_failure_threshold")]
    pub setup_failure_threshold: u32,

    /// Tags starting with this prefix declare shared resources.
    #[serde(default = "default_resource_prefix")]
    pub resource_prefix: String,

    #[serde(default)]
    pub environment: EnvironmentConfig,

    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_name() -> String {
    "E2EOnDockerCompose".to_string()
}

fn default_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("test_cases")]
}

fn default_tags() -> String {
    DEFAULT_TAGS.to_string()
}

fn default_agent_env() -> String {
    DEFAULT_AGENT_ENV.to_string()
}

fn default_concurrency() -> usize {
    1
}

fn default_setup_failure_threshold() -> u32 {
    3
}

fn default_resource_prefix() -> String {
    "resource:".to_string()
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            name: default_name(),
            paths: default_paths(),
            tags: default_tags(),
            agent_env: default_agent_env(),
            concurrency: default_concurrency(),
            fail_fast: false,
            timeout_secs: None,
            setup_failure_threshold: default_setup_failure_threshold(),
            resource_prefix: default_resource_prefix(),
            environment: EnvironmentConfig::default(),
            steps: Vec::new(),
        }
    }
}

impl SuiteConfig {
    /// Options for the suite executor derived from this configuration.
    pub fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            concurrency: self.concurrency.max(1),
            fail_fast: self.fail_fast,
            timeout: self.timeout_secs.map(Duration::from_secs),
            setup_failure_threshold: self.setup_failure_threshold,
            resource_prefix: self.resource_prefix.clone(),
        }
    }

    /// Resolves the scenario source paths against `base_dir`, expanding `~`
    /// and environment variables.
    ///
    /// 相对于 `base_dir` 解析场景源路径，并展开 `~` 和环境变量。
    pub fn resolve_paths(&self, base_dir: &Path) -> Result<Vec<PathBuf>> {
        self.paths
            .iter()
            .map(|path| resolve_path(base_dir, path))
            .collect()
    }

    /// The working directory for environment commands.
    pub fn resolve_working_dir(&self, base_dir: &Path) -> Result<PathBuf> {
        match &self.environment.working_dir {
            Some(dir) => resolve_path(base_dir, dir),
            None => Ok(base_dir.to_path_buf()),
        }
    }
}

fn resolve_path(base_dir: &Path, path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw)
        .with_context(|| format!("Failed to expand path: {raw}"))?;
    let expanded = PathBuf::from(expanded.into_owned());
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(base_dir.join(expanded))
    }
}

/// Reads and parses a suite configuration file.
/// 读取并解析套件配置文件。
pub fn load_suite_config(path: &Path) -> Result<SuiteConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_suite_config(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parses a suite configuration from TOML text.
pub fn parse_suite_config(content: &str) -> Result<SuiteConfig> {
    let config: SuiteConfig = toml::from_str(content)?;
    Ok(config)
}
