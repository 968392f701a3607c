//! # Scenario Runner Library / Scenario Runner 库
//!
//! This library provides the core functionality for the Scenario Runner tool,
//! a configuration-driven executor for tagged, Gherkin-style end-to-end scenarios.
//! A boolean tag expression selects the scenarios to run, and the selection is
//! executed against a shared environment such as a docker-compose stack.
//!
//! 此库为 Scenario Runner 工具提供核心功能，
//! 这是一个配置驱动的、针对带标签的 Gherkin 风格端到端场景的执行器。
//! 布尔标签表达式选择要运行的场景，选中的场景在共享环境（例如 docker-compose 栈）中执行。
//!
//! ## Modules / 模块
//!
//! - `core` - Tag expressions, scenario discovery, selection, execution and aggregation
//! - `infra` - Infrastructure services like command execution and file system operations
//! - `reporting` - Suite report output for the console, JSON and HTML
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 标签表达式、场景发现、选择、执行和聚合
//! - `infra` - 基础设施服务，如命令执行和文件系统操作
//! - `reporting` - 控制台、JSON 和 HTML 的套件报告输出
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use core::config;
pub use core::execution;
pub use core::models;
pub use core::tags;

/// Initializes the application's internationalization (i18n).
///
/// An explicit `language` wins; otherwise the system locale is detected.
/// It attempts to match the full locale (e.g., "zh-CN"), then just the
/// language code (e.g., "en"), and finally falls back to the default
/// language ("en"). Returns the locale that was set.
pub fn init(language: Option<&str>) -> String {
    let locale = language
        .map(str::to_string)
        .or_else(sys_locale::get_locale)
        .unwrap_or_else(|| "en".to_string());
    let available_locales = rust_i18n::available_locales!();

    let lang = if available_locales.contains(&locale.as_str()) {
        locale.as_str()
    } else {
        locale
            .split(['-', '_'])
            .next()
            .and_then(|code| available_locales.iter().copied().find(|l| *l == code))
            .unwrap_or("en")
    };

    rust_i18n::set_locale(lang);
    lang.to_string()
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
