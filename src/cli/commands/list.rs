//! # List Command Module / 列表命令模块
//!
//! Prints the scenarios a `run` would execute, without touching the environment.
//!
//! 打印 `run` 将会执行的场景，而不触及环境。

use anyhow::Result;
use colored::*;
use std::path::PathBuf;

use crate::cli::commands::run::{load_suite, plan_suite};
use crate::core::models::ScenarioStatus;
use crate::infra::t;

/// Arguments of the `list` command.
#[derive(Debug, Clone, Default)]
pub struct ListArgs {
    pub config: PathBuf,
    pub tags: Option<String>,
    pub agent_tag: Option<String>,
    pub lang: Option<String>,
}

/// Executes the list command.
/// An empty selection is reported as an error, the same as for `run`.
///
/// 执行 list 命令。与 `run` 一样，空选择会作为错误报告。
pub fn execute(args: ListArgs) -> Result<()> {
    let suite = load_suite(&args.config, args.lang.as_deref())?;
    let locale = suite.locale.as_str();
    let concurrency = suite.config.executor_options().concurrency;
    let plan = plan_suite(
        &suite,
        args.tags.as_deref(),
        args.agent_tag.as_deref(),
        concurrency,
    )?;

    println!();
    for scenario in &plan.scenarios {
        let tags = scenario
            .tags
            .iter()
            .map(|tag| format!("@{tag}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "  - {} ({}) {}",
            scenario.name.cyan(),
            scenario.location,
            tags.dimmed()
        );
        if let ScenarioStatus::Undefined { reason } = &scenario.status {
            println!(
                "    {}",
                t!("list.undefined", locale = locale, reason = reason).yellow()
            );
        }
    }

    Ok(())
}
