//! # JSON Reporting Module / JSON 报告模块
//!
//! Serializes the suite report for CI tooling and for diffing runs.
//!
//! 序列化套件报告，供 CI 工具使用以及对比不同运行。

use anyhow::{Context, Result};
use std::path::Path;

use crate::core::report::SuiteReport;
use crate::infra::fs;

pub fn to_json(report: &SuiteReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize suite report")
}

/// Writes the report as pretty-printed JSON.
/// 将报告写为格式化的 JSON。
pub fn write_json_report(report: &SuiteReport, output_path: &Path) -> Result<()> {
    let json = to_json(report)?;
    fs::write_file(output_path, &json)
}
