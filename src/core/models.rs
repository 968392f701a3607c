//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures used throughout the scenario runner.
//! It includes models for scenarios, their steps and locations, and the outcome
//! recorded for every executed scenario.
//!
//! 此模块定义了整个场景运行器中使用的核心数据结构。
//! 它包括场景、步骤和位置的模型，以及为每个已执行场景记录的结果。

use crate::infra::t;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// The set of tags attached to a scenario, stored without the `@` marker.
/// 附加在场景上的标签集合，存储时不带 `@` 标记。
pub type TagSet = BTreeSet<String>;

/// Tag prefix that overrides the suite timeout for a single scenario, e.g. `@timeout:30`.
pub const TIMEOUT_TAG_PREFIX: &str = "timeout:";

/// Where a scenario or step was defined.
/// 场景或步骤的定义位置。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub path: PathBuf,
    pub line: usize,
}

impl Location {
    pub fn new(path: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

/// The Gherkin keyword that introduced a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKeyword {
    Given,
    When,
    Then,
    And,
    But,
    Star,
}

impl StepKeyword {
    /// Splits a step line into its keyword and text, if the line is a step.
    /// 如果该行是步骤，则将其拆分为关键字和文本。
    pub fn split_line(line: &str) -> Option<(StepKeyword, &str)> {
        const KEYWORDS: [(&str, StepKeyword); 6] = [
            ("Given ", StepKeyword::Given),
            ("When ", StepKeyword::When),
            ("Then ", StepKeyword::Then),
            ("And ", StepKeyword::And),
            ("But ", StepKeyword::But),
            ("* ", StepKeyword::Star),
        ];
        KEYWORDS.iter().find_map(|(prefix, keyword)| {
            line.strip_prefix(prefix)
                .map(|text| (*keyword, text.trim()))
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKeyword::Given => "Given",
            StepKeyword::When => "When",
            StepKeyword::Then => "Then",
            StepKeyword::And => "And",
            StepKeyword::But => "But",
            StepKeyword::Star => "*",
        }
    }
}

/// A single step of a scenario. Steps are opaque to the runner and are
/// handed to the environment for execution.
///
/// 场景中的单个步骤。步骤对运行器是不透明的，会交给环境执行。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub keyword: StepKeyword,
    pub text: String,
    pub line: usize,
    #[serde(default)]
    pub doc_string: Option<String>,
    #[serde(default)]
    pub table: Vec<Vec<String>>,
}

impl Step {
    pub fn new(keyword: StepKeyword, text: impl Into<String>, line: usize) -> Self {
        Self {
            keyword,
            text: text.into(),
            line,
            doc_string: None,
            table: Vec::new(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.keyword.as_str(), self.text)
    }
}

/// Whether a discovered scenario can be executed.
/// 已发现的场景是否可以执行。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioStatus {
    Ready,
    /// The scenario source was malformed; it is reported instead of run.
    /// 场景源格式错误；它会被报告而不是运行。
    Undefined { reason: String },
}

/// A named end-to-end test case discovered from a feature file.
/// Scenarios are read-only after discovery.
///
/// 从 feature 文件中发现的命名端到端测试用例。
/// 场景在发现后是只读的。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub feature: String,
    pub location: Location,
    pub tags: TagSet,
    pub steps: Vec<Step>,
    pub status: ScenarioStatus,
}

impl Scenario {
    pub fn new(name: impl Into<String>, location: Location) -> Self {
        Self {
            name: name.into(),
            feature: String::new(),
            location,
            tags: TagSet::new(),
            steps: Vec::new(),
            status: ScenarioStatus::Ready,
        }
    }

    /// Adds tags, accepting either `@tag` or `tag` notation.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags.extend(
            tags.into_iter()
                .map(|t| crate::core::tags::normalize_tag(t.as_ref()).to_string()),
        );
        self
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = steps;
        self
    }

    /// Builds a placeholder for a source that could not be parsed.
    pub fn malformed(name: impl Into<String>, location: Location, reason: impl Into<String>) -> Self {
        let mut scenario = Scenario::new(name, location);
        scenario.status = ScenarioStatus::Undefined {
            reason: reason.into(),
        };
        scenario
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.status, ScenarioStatus::Ready)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(crate::core::tags::normalize_tag(tag))
    }

    /// The per-scenario timeout declared with a `@timeout:<secs>` tag, if any.
    /// 通过 `@timeout:<secs>` 标签声明的单场景超时（如有）。
    pub fn timeout_override(&self) -> Option<Duration> {
        self.tags
            .iter()
            .filter_map(|tag| tag.strip_prefix(TIMEOUT_TAG_PREFIX))
            .find_map(|secs| secs.parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Tags naming shared resources, i.e. those carrying `prefix`.
    pub fn resource_tags<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .iter()
            .filter(move |tag| !prefix.is_empty() && tag.starts_with(prefix))
            .map(String::as_str)
    }
}

/// The terminal status of one executed scenario.
/// 单个已执行场景的最终状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Passed,
    Failed,
    Skipped,
    Undefined,
}

impl OutcomeStatus {
    /// Stable lowercase name used in machine-readable output.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Passed => "passed",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::Skipped => "skipped",
            OutcomeStatus::Undefined => "undefined",
        }
    }

    /// Gets the status as a localized string for display.
    /// 以本地化字符串形式获取状态以供显示。
    pub fn get_status_str(&self, locale: &str) -> String {
        match self {
            OutcomeStatus::Passed => t!("report.status_passed", locale = locale).to_string(),
            OutcomeStatus::Failed => t!("report.status_failed", locale = locale).to_string(),
            OutcomeStatus::Skipped => t!("report.status_skipped", locale = locale).to_string(),
            OutcomeStatus::Undefined => t!("report.status_undefined", locale = locale).to_string(),
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enumerates why a scenario did not pass.
/// This helps in categorizing errors for reporting.
/// 枚举场景未通过的原因。
/// 这有助于对错误进行分类，以便报告。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// A step ran and reported failure.
    /// 某个步骤运行并报告失败。
    StepFailed,
    /// The scenario exceeded its configured timeout.
    /// 场景超出了其配置的超时时间。
    Timeout,
    /// A step had no matching implementation.
    /// 某个步骤没有匹配的实现。
    UndefinedStep,
    /// The scenario source could not be parsed.
    /// 场景源无法解析。
    MalformedScenario,
    /// Preparing the environment failed.
    /// 准备环境失败。
    EnvironmentSetup,
    /// Releasing the environment failed.
    /// 释放环境失败。
    EnvironmentTeardown,
    /// The scenario was never dispatched because the run was cancelled.
    /// 由于运行被取消，场景从未被调度。
    Cancelled,
    /// The executor itself failed while running the scenario.
    Internal,
}

impl FailureKind {
    /// Gets the failure kind as a localized string for display.
    /// 以本地化字符串形式获取失败类型以供显示。
    pub fn get_kind_str(&self, locale: &str) -> String {
        match self {
            FailureKind::StepFailed => t!("report.kind_step_failed", locale = locale).to_string(),
            FailureKind::Timeout => t!("report.kind_timeout", locale = locale).to_string(),
            FailureKind::UndefinedStep => t!("report.kind_undefined_step", locale = locale).to_string(),
            FailureKind::MalformedScenario => {
                t!("report.kind_malformed_scenario", locale = locale).to_string()
            }
            FailureKind::EnvironmentSetup => {
                t!("report.kind_environment_setup", locale = locale).to_string()
            }
            FailureKind::EnvironmentTeardown => {
                t!("report.kind_environment_teardown", locale = locale).to_string()
            }
            FailureKind::Cancelled => t!("report.kind_cancelled", locale = locale).to_string(),
            FailureKind::Internal => t!("report.kind_internal", locale = locale).to_string(),
        }
    }
}

/// Why a scenario did not pass, and where.
/// 场景未通过的原因及位置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub kind: FailureKind,
    pub message: String,
    pub location: Option<Location>,
}

impl FailureDetail {
    pub fn new(kind: FailureKind, message: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            kind,
            message: message.into(),
            location,
        }
    }
}

/// The recorded result of one scenario. Immutable once created.
///
/// 单个场景的记录结果。创建后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub location: Location,
    pub status: OutcomeStatus,
    pub detail: Option<FailureDetail>,
    pub duration: Duration,
}

impl ScenarioOutcome {
    pub fn passed(scenario: &Scenario, duration: Duration) -> Self {
        Self {
            name: scenario.name.clone(),
            location: scenario.location.clone(),
            status: OutcomeStatus::Passed,
            detail: None,
            duration,
        }
    }

    pub fn failed(scenario: &Scenario, detail: FailureDetail, duration: Duration) -> Self {
        Self {
            name: scenario.name.clone(),
            location: scenario.location.clone(),
            status: OutcomeStatus::Failed,
            detail: Some(detail),
            duration,
        }
    }

    pub fn undefined(scenario: &Scenario, detail: FailureDetail, duration: Duration) -> Self {
        Self {
            name: scenario.name.clone(),
            location: scenario.location.clone(),
            status: OutcomeStatus::Undefined,
            detail: Some(detail),
            duration,
        }
    }

    /// A scenario that was never dispatched.
    pub fn skipped(scenario: &Scenario, message: impl Into<String>) -> Self {
        Self {
            name: scenario.name.clone(),
            location: scenario.location.clone(),
            status: OutcomeStatus::Skipped,
            detail: Some(FailureDetail::new(FailureKind::Cancelled, message, None)),
            duration: Duration::ZERO,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == OutcomeStatus::Passed
    }

    /// Failed or Undefined; both make the suite fail.
    /// Failed 或 Undefined；两者都会导致整个套件失败。
    pub fn is_failure(&self) -> bool {
        matches!(self.status, OutcomeStatus::Failed | OutcomeStatus::Undefined)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(&self.detail, Some(d) if d.kind == FailureKind::Timeout)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.detail.as_ref().map(|d| d.kind)
    }
}
