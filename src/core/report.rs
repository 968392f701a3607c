//! # Result Aggregation Module / 结果聚合模块
//!
//! Reduces per-scenario outcomes to one suite status while keeping every
//! outcome, in selection order, for diagnostics.
//!
//! 将每个场景的结果归约为一个套件状态，同时按选择顺序保留每个结果以供诊断。

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::core::models::{OutcomeStatus, ScenarioOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    /// Nothing ran. Usually the tag expression matched no scenario.
    /// 没有任何场景运行。通常是标签表达式没有匹配任何场景。
    #[error("no scenario outcomes to aggregate; the selection was empty")]
    EmptyOutcomes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuiteStatus {
    Pass,
    Fail,
}

/// The final report of a suite run.
/// 套件运行的最终报告。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub name: String,
    pub status: SuiteStatus,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub undefined: usize,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub duration: Duration,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    pub fn is_pass(&self) -> bool {
        self.status == SuiteStatus::Pass
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Outcomes that made the suite fail, in selection order.
    pub fn failures(&self) -> impl Iterator<Item = &ScenarioOutcome> {
        self.outcomes.iter().filter(|o| !o.is_passed())
    }
}

/// Aggregates outcomes into a [`SuiteReport`].
///
/// The suite passes only if every outcome passed. Any Failed, Undefined or
/// Skipped outcome fails it. An empty sequence is a configuration error.
///
/// 将结果聚合为 [`SuiteReport`]。
/// 只有所有结果都通过时套件才通过。任何 Failed、Undefined 或 Skipped 结果都会使其失败。
/// 空序列是配置错误。
pub fn aggregate(
    name: &str,
    outcomes: Vec<ScenarioOutcome>,
    started_at: DateTime<Local>,
) -> Result<SuiteReport, ReportError> {
    if outcomes.is_empty() {
        return Err(ReportError::EmptyOutcomes);
    }

    let count = |status: OutcomeStatus| outcomes.iter().filter(|o| o.status == status).count();
    let passed = count(OutcomeStatus::Passed);
    let failed = count(OutcomeStatus::Failed);
    let skipped = count(OutcomeStatus::Skipped);
    let undefined = count(OutcomeStatus::Undefined);

    let status = if passed == outcomes.len() {
        SuiteStatus::Pass
    } else {
        SuiteStatus::Fail
    };

    let finished_at = Local::now();
    let duration = (finished_at - started_at).to_std().unwrap_or_default();

    Ok(SuiteReport {
        name: name.to_string(),
        status,
        passed,
        failed,
        skipped,
        undefined,
        started_at,
        finished_at,
        duration,
        outcomes,
    })
}
