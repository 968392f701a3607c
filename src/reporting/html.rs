//! # HTML Reporting Module / HTML 报告模块
//!
//! This module handles the generation of HTML suite reports.
//! It creates styled HTML files with run statistics, a per-scenario results
//! table, and collapsible failure details.
//!
//! 此模块处理 HTML 套件报告的生成。
//! 它创建带有运行统计、逐场景结果表格和可折叠失败详情的样式化 HTML 文件。

use anyhow::Result;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::path::Path;

use crate::core::report::SuiteReport;
use crate::infra::{fs, t};

/// Embedded CSS styles for HTML reports / HTML 报告的嵌入式 CSS 样式
const HTML_STYLE: &str = include_str!("assets/report.css");

/// Embedded JavaScript for HTML report interactivity / HTML 报告交互性的嵌入式 JavaScript
const HTML_SCRIPT: &str = include_str!("assets/report.js");

/// Renders the report as a standalone HTML document.
/// 将报告渲染为独立的 HTML 文档。
pub fn render_html_report(report: &SuiteReport, locale: &str) -> Markup {
    let (suite_class, suite_status) = if report.is_pass() {
        ("suite-pass", t!("html_report.suite_pass", locale = locale))
    } else {
        ("suite-fail", t!("html_report.suite_fail", locale = locale))
    };

    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (t!("html_report.title", locale = locale)) " - " (report.name) }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { (report.name) " " span class=(suite_class) { (suite_status) } }
                div class="meta" {
                    (report.started_at.format("%Y-%m-%d %H:%M:%S").to_string())
                    " · "
                    (format!("{:.2}s", report.duration.as_secs_f64()))
                }
                div class="summary-container" {
                    (summary_item("", report.total(), &t!("html_report.summary.total", locale = locale)))
                    (summary_item("passed-text", report.passed, &t!("html_report.summary.passed", locale = locale)))
                    (summary_item("failed-text", report.failed, &t!("html_report.summary.failed", locale = locale)))
                    (summary_item("undefined-text", report.undefined, &t!("html_report.summary.undefined", locale = locale)))
                    (summary_item("skipped-text", report.skipped, &t!("html_report.summary.skipped", locale = locale)))
                }
                table {
                    thead {
                        tr {
                            th { (t!("html_report.table.name", locale = locale)) }
                            th { (t!("html_report.table.location", locale = locale)) }
                            th { (t!("html_report.table.status", locale = locale)) }
                            th class="duration-cell" { (t!("html_report.table.duration", locale = locale)) }
                        }
                    }
                    tbody {
                        @for (i, outcome) in report.outcomes.iter().enumerate() {
                            @let output_id = format!("output-{i}");
                            tr {
                                td { (outcome.name) }
                                td { (outcome.location.to_string()) }
                                td {
                                    div class=(format!("status-cell status-{}", outcome.status.as_str())) {
                                        (outcome.status.get_status_str(locale))
                                    }
                                    @if outcome.detail.is_some() {
                                        div class="output-toggle" onclick=(format!("toggleOutput('{output_id}')")) {
                                            (t!("html_report.toggle_output", locale = locale))
                                        }
                                    }
                                }
                                td class="duration-cell" { (format!("{:.2}s", outcome.duration.as_secs_f64())) }
                            }
                            @if let Some(detail) = &outcome.detail {
                                tr id=(output_id) style="display:none;" {
                                    td colspan="4" {
                                        pre class="output-content" {
                                            (detail.kind.get_kind_str(locale))
                                            @if let Some(location) = &detail.location {
                                                " @ " (location.to_string())
                                            }
                                            "\n\n"
                                            (detail.message)
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
                script { (PreEscaped(HTML_SCRIPT)) }
            }
        }
    }
}

fn summary_item(class: &str, count: usize, label: &str) -> Markup {
    html! {
        div class="summary-item" {
            span class=(format!("count {class}")) { (count) }
            span class="label" { (label) }
        }
    }
}

/// Generates an HTML report file from a suite report.
///
/// 从套件报告生成 HTML 报告文件。
///
/// # Errors / 错误
/// Returns an error if the file cannot be written.
/// 如果无法写入文件，则返回错误。
pub fn generate_html_report(report: &SuiteReport, output_path: &Path, locale: &str) -> Result<()> {
    let markup = render_html_report(report, locale);
    fs::write_file(output_path, &markup.into_string())
}
