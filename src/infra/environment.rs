//! # Command Environment Module / 命令环境模块
//!
//! A configuration-driven [`EnvironmentInitializer`]: the shared environment is
//! managed with shell commands (for example `docker compose up -d`) and steps
//! are dispatched to commands through regular-expression step definitions.
//!
//! 一个配置驱动的 [`EnvironmentInitializer`]：共享环境通过 shell 命令管理
//! （例如 `docker compose up -d`），步骤通过正则表达式步骤定义分派给命令。

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::core::config::{SuiteConfig, StepDefinition};
use crate::core::environment::{EnvironmentError, EnvironmentInitializer, StepResult};
use crate::core::models::{Scenario, Step};
use crate::infra::{command, fs};

/// Variable holding the scenario name, exported to every scenario command.
pub const SCENARIO_NAME_VAR: &str = "SCENARIO_NAME";
/// Variable holding the scenario's private scratch directory.
pub const SCENARIO_WORKDIR_VAR: &str = "SCENARIO_WORKDIR";
/// Variable holding the doc string attached to the step being run.
pub const STEP_DOC_STRING_VAR: &str = "STEP_DOC_STRING";

struct CompiledStep {
    pattern: Regex,
    command: String,
}

/// Runs environment lifecycle commands and step commands.
/// 运行环境生命周期命令和步骤命令。
pub struct CommandEnvironment {
    start: Option<String>,
    stop: Option<String>,
    setup: Option<String>,
    teardown: Option<String>,
    working_dir: PathBuf,
    env: BTreeMap<String, String>,
    steps: Vec<CompiledStep>,
}

/// Per-scenario state: exported variables and a scratch directory that is
/// removed when the context is dropped after teardown.
///
/// 每个场景的状态：导出的变量，以及在 teardown 之后上下文被丢弃时删除的临时目录。
pub struct CommandContext {
    vars: Vec<(String, String)>,
    workdir: TempDir,
}

impl CommandContext {
    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    fn lookup(&self, var: &str) -> Option<String> {
        self.vars
            .iter()
            .find(|(name, _)| name == var)
            .map(|(_, value)| value.clone())
    }
}

impl CommandEnvironment {
    /// Builds the environment from a suite configuration.
    /// Fails if a step pattern is not a valid regular expression.
    ///
    /// 根据套件配置构建环境。如果某个步骤模式不是有效的正则表达式，则失败。
    pub fn from_config(config: &SuiteConfig, base_dir: &Path) -> Result<Self> {
        let steps = config
            .steps
            .iter()
            .map(compile_step)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            start: config.environment.start.clone(),
            stop: config.environment.stop.clone(),
            setup: config.environment.setup.clone(),
            teardown: config.environment.teardown.clone(),
            working_dir: config.resolve_working_dir(base_dir)?,
            env: config.environment.env.clone(),
            steps,
        })
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Finds the first step definition whose pattern matches `text`.
    fn match_step<'a>(&'a self, text: &'a str) -> Option<(&'a CompiledStep, Captures<'a>)> {
        self.steps
            .iter()
            .find_map(|step| step.pattern.captures(text).map(|caps| (step, caps)))
    }

    fn base_envs(&self) -> Vec<(String, String)> {
        self.env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    async fn run_shared(&self, command_line: &str) -> Result<String> {
        let envs = self.base_envs();
        command::run_command_line(command_line, &self.working_dir, &envs, |var| {
            self.env.get(var).cloned()
        })
        .await
    }

    /// Resolves a variable for a scenario command: scenario variables first,
    /// then the configured `env` table.
    fn lookup(&self, context: &CommandContext, var: &str) -> Option<String> {
        context.lookup(var).or_else(|| self.env.get(var).cloned())
    }

    fn context_envs(&self, context: &CommandContext, extra: &[(String, String)]) -> Vec<(String, String)> {
        let mut envs = self.base_envs();
        envs.extend(context.vars.iter().cloned());
        envs.extend(extra.iter().cloned());
        envs
    }

    async fn run_in_context(&self, command_line: &str, context: &CommandContext) -> Result<String> {
        let envs = self.context_envs(context, &[]);
        command::run_command_line(command_line, &self.working_dir, &envs, |var| {
            self.lookup(context, var)
        })
        .await
    }
}

fn compile_step(definition: &StepDefinition) -> Result<CompiledStep> {
    let pattern = Regex::new(&definition.pattern)
        .with_context(|| format!("Invalid step pattern: {}", definition.pattern))?;
    Ok(CompiledStep {
        pattern,
        command: definition.command.clone(),
    })
}

/// Replaces `{1}` and `{name}` placeholders in an already expanded template
/// with the step's captures, each quoted as a single literal shell word.
///
/// 用步骤的捕获组替换已展开模板中的 `{1}` 和 `{name}` 占位符，
/// 每个值都被引用为单个字面 shell 单词。
fn render_command(step: &CompiledStep, template: &str, caps: &Captures<'_>) -> String {
    let quote = |value: &str| {
        shlex::try_quote(value)
            .map(|q| q.into_owned())
            .unwrap_or_else(|_| value.to_string())
    };

    let mut rendered = template.to_string();
    for (index, name) in step.pattern.capture_names().enumerate().skip(1) {
        let value = caps.get(index).map(|m| m.as_str()).unwrap_or_default();
        rendered = rendered.replace(&format!("{{{index}}}"), &quote(value));
        if let Some(name) = name {
            rendered = rendered.replace(&format!("{{{name}}}"), &quote(value));
        }
    }
    rendered
}

#[async_trait]
impl EnvironmentInitializer for CommandEnvironment {
    type Context = CommandContext;

    async fn start(&self) -> Result<(), EnvironmentError> {
        match &self.start {
            Some(cmd) => self
                .run_shared(cmd)
                .await
                .map(|_| ())
                .map_err(|e| EnvironmentError::Setup(format!("{e:#}"))),
            None => Ok(()),
        }
    }

    async fn stop(&self) -> Result<(), EnvironmentError> {
        match &self.stop {
            Some(cmd) => self
                .run_shared(cmd)
                .await
                .map(|_| ())
                .map_err(|e| EnvironmentError::Teardown(format!("{e:#}"))),
            None => Ok(()),
        }
    }

    async fn setup(&self, scenario: &Scenario) -> Result<CommandContext, EnvironmentError> {
        let workdir = fs::create_scenario_dir(&scenario.name)
            .map_err(|e| EnvironmentError::Setup(format!("{e:#}")))?;
        let context = CommandContext {
            vars: vec![
                (SCENARIO_NAME_VAR.to_string(), scenario.name.clone()),
                (
                    SCENARIO_WORKDIR_VAR.to_string(),
                    workdir.path().display().to_string(),
                ),
            ],
            workdir,
        };

        if let Some(cmd) = &self.setup {
            self.run_in_context(cmd, &context)
                .await
                .map_err(|e| EnvironmentError::Setup(format!("{e:#}")))?;
        }
        Ok(context)
    }

    async fn run_step(&self, context: &mut CommandContext, step: &Step) -> StepResult {
        let Some((definition, caps)) = self.match_step(&step.text) else {
            return StepResult::Undefined;
        };
        // Captures are substituted after expansion so step text stays literal.
        let template = command::expand(&definition.command, |var| self.lookup(context, var));
        let command_line = render_command(definition, &template, &caps);

        let extra: Vec<(String, String)> = step
            .doc_string
            .iter()
            .map(|doc| (STEP_DOC_STRING_VAR.to_string(), doc.clone()))
            .collect();
        let envs = self.context_envs(context, &extra);

        match command::run_expanded(&command_line, &self.working_dir, &envs).await {
            Ok(_) => StepResult::Passed,
            Err(e) => StepResult::Failed {
                message: format!("{e:#}"),
            },
        }
    }

    async fn teardown(&self, context: CommandContext) -> Result<(), EnvironmentError> {
        let result = match &self.teardown {
            Some(cmd) => self
                .run_in_context(cmd, &context)
                .await
                .map(|_| ())
                .map_err(|e| EnvironmentError::Teardown(format!("{e:#}"))),
            None => Ok(()),
        };
        drop(context);
        result
    }
}
