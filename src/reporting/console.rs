//! # Console Reporting Module / 控制台报告模块
//!
//! This module handles the display of suite reports in the console.
//! It prints a colorful summary table, the failure details, and a plain
//! tab-separated status list meant for other tools to parse.
//!
//! 此模块处理控制台中套件报告的显示。
//! 它打印彩色摘要表、失败详情，以及供其他工具解析的制表符分隔状态列表。

use colored::*;

use crate::core::models::{OutcomeStatus, ScenarioOutcome};
use crate::core::report::SuiteReport;
use crate::infra::t;

/// Marker line that precedes the machine-readable status list.
pub const STATUS_LIST_HEADER: &str = "--- scenario-status ---";

/// Prints a formatted summary of the suite report to the console.
///
/// 在控制台打印格式化的套件报告摘要。
///
/// # Output Format / 输出格式
/// ```text
/// --- Scenario Summary ---
///   - Passed     | Ingest 10k lines per second              | features/perf.feature:4  |     1.23s
///   - Failed     | Ingest with slow disk                    | features/perf.feature:12 |     0.45s
///   - Undefined  | Relabel metrics                          | features/prom.feature:3  |     0.00s
/// ```
pub fn print_summary(report: &SuiteReport, locale: &str) {
    println!("\n{}", t!("summary.banner", locale = locale).bold());

    for outcome in &report.outcomes {
        let status_str = outcome.status.get_status_str(locale);
        let status_colored = match outcome.status {
            OutcomeStatus::Passed => status_str.green(),
            OutcomeStatus::Failed => status_str.red(),
            OutcomeStatus::Undefined => status_str.yellow(),
            OutcomeStatus::Skipped => status_str.dimmed(),
        };

        println!(
            "  - {:<10} | {:<40} | {:<32} | {:>9}",
            status_colored,
            outcome.name,
            outcome.location.to_string(),
            format!("{:.2}s", outcome.duration.as_secs_f64())
        );
    }

    println!(
        "\n{}",
        t!(
            "summary.counts",
            locale = locale,
            total = report.total(),
            passed = report.passed,
            failed = report.failed,
            undefined = report.undefined,
            skipped = report.skipped,
            duration = format!("{:.2}", report.duration.as_secs_f64())
        )
    );
}

/// Prints detailed information for every outcome that did not pass.
///
/// 打印每个未通过结果的详细信息。
pub fn print_failure_details(report: &SuiteReport, locale: &str) {
    let failures: Vec<&ScenarioOutcome> = report
        .failures()
        .filter(|o| o.status != OutcomeStatus::Skipped)
        .collect();
    if failures.is_empty() {
        return;
    }

    println!("\n{}", t!("summary.failure_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));

    for (i, outcome) in failures.iter().enumerate() {
        println!(
            "[{}/{}] {} '{}' ({})",
            i + 1,
            failures.len(),
            outcome.status.get_status_str(locale).red(),
            outcome.name.cyan(),
            outcome.location
        );
        if let Some(detail) = &outcome.detail {
            if let Some(location) = &detail.location {
                println!("  {} {}", t!("summary.at", locale = locale).yellow(), location);
            }
            println!("  {}", detail.kind.get_kind_str(locale));
            println!("\n{}", detail.message);
        }
        println!("\n{}", "-".repeat(80));
    }
}

/// Formats one outcome as `<status>\t<location>\t<name>`.
pub fn status_line(outcome: &ScenarioOutcome) -> String {
    format!("{}\t{}\t{}", outcome.status.as_str(), outcome.location, outcome.name)
}

/// Prints the machine-readable status list: a header line followed by one
/// `<status>\t<location>\t<name>` line per scenario, in selection order.
///
/// 打印机器可读的状态列表：一个标题行，后跟每个场景一行
/// `<status>\t<location>\t<name>`，按选择顺序排列。
pub fn print_status_list(report: &SuiteReport) {
    println!("\n{STATUS_LIST_HEADER}");
    for outcome in &report.outcomes {
        println!("{}", status_line(outcome));
    }
}
