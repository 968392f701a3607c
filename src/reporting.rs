//! # Reporting Module / 报告模块
//!
//! This module handles the generation and display of suite reports in multiple formats.
//! It prints colorful, formatted summaries and a machine-readable status list to the
//! console, and writes JSON and styled HTML reports, with internationalization support.
//!
//! 此模块处理多种格式的套件报告生成和显示。
//! 它在控制台打印彩色格式化摘要和机器可读的状态列表，并写入 JSON 和样式化 HTML 报告，支持国际化。

pub mod console;
pub mod html;
pub mod json;

// Re-export common reporting functions
pub use console::{print_failure_details, print_status_list, print_summary};
pub use html::generate_html_report;
pub use json::write_json_report;
