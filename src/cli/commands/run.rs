//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command for the Scenario Runner CLI,
//! which selects scenarios with the configured tag expression and executes
//! them against the configured environment.
//!
//! 此模块实现了 Scenario Runner CLI 的 `run` 命令，
//! 它使用配置的标签表达式选择场景，并在配置的环境中执行它们。

use anyhow::{Context, Result};
use chrono::Local;
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        catalog::discover,
        config::{SuiteConfig, load_suite_config},
        execution::SuiteExecutor,
        planner::{ExecutionPlan, TagFilter, plan_execution},
        report::aggregate,
    },
    infra::{environment::CommandEnvironment, fs, t},
    reporting::{
        console::{print_failure_details, print_status_list, print_summary},
        html::generate_html_report,
        json::write_json_report,
    },
};

/// Arguments of the `run` command.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub config: PathBuf,
    /// Overrides the configured tag expression.
    pub tags: Option<String>,
    /// Overrides the narrowing tag read from the environment.
    pub agent_tag: Option<String>,
    /// Overrides the configured concurrency; 0 means one job per CPU.
    pub jobs: Option<usize>,
    pub fail_fast: bool,
    pub timeout_secs: Option<u64>,
    pub json: Option<PathBuf>,
    pub html: Option<PathBuf>,
    /// Language given on the command line; wins over the config file.
    pub lang: Option<String>,
}

/// A loaded configuration together with the directory its paths are relative to.
pub(crate) struct LoadedSuite {
    pub config: SuiteConfig,
    pub config_path: PathBuf,
    pub base_dir: PathBuf,
    pub locale: String,
}

/// Loads the suite configuration and switches to its language unless one
/// was given on the command line.
///
/// 加载套件配置，并切换到其语言（除非命令行指定了语言）。
pub(crate) fn load_suite(config: &Path, lang: Option<&str>) -> Result<LoadedSuite> {
    // The locale is not known before the config is read.
    let config_path = fs::absolute_path(config)
        .with_context(|| t!("cli.config_not_found", path = config.display()).to_string())?;
    let suite_config = load_suite_config(&config_path)?;
    let locale = crate::init(Some(lang.unwrap_or(&suite_config.language)));

    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    println!(
        "{}",
        t!("plan.loading_config", locale = &locale, path = config_path.display())
    );

    Ok(LoadedSuite {
        config: suite_config,
        config_path,
        base_dir,
        locale,
    })
}

/// Discovers the catalog and selects the scenarios to run.
///
/// `tags` overrides the configured expression and `agent_tag` overrides the
/// configured environment variable.
///
/// 发现场景目录并选择要运行的场景。
/// `tags` 覆盖配置的表达式，`agent_tag` 覆盖配置的环境变量。
pub(crate) fn plan_suite(
    suite: &LoadedSuite,
    tags: Option<&str>,
    agent_tag: Option<&str>,
    concurrency: usize,
) -> Result<ExecutionPlan> {
    let locale = suite.locale.as_str();
    let source = tags.unwrap_or(&suite.config.tags);
    let filter = TagFilter::new(source)
        .with_context(|| t!("plan.invalid_expression", locale = locale, expression = source).to_string())?;
    let filter = match agent_tag {
        Some(tag) => filter.with_agent_tag(Some(tag)),
        None => filter.from_env(&suite.config.agent_env),
    };

    if let Some(tag) = filter.narrowing_tag() {
        println!(
            "{}",
            t!("plan.narrowing", locale = locale, tag = tag).cyan()
        );
    }

    let sources = suite.config.resolve_paths(&suite.base_dir)?;
    let catalog = discover(&sources)
        .with_context(|| t!("plan.discovery_failed", locale = locale).to_string())?;
    println!(
        "{}",
        t!("plan.discovered", locale = locale, count = catalog.len())
    );

    let plan = plan_execution(
        &catalog,
        filter.expression(),
        concurrency,
        &suite.config.resource_prefix,
    )?;

    println!(
        "{}",
        t!("plan.expression", locale = locale, expression = &plan.expression).cyan()
    );
    println!(
        "{}",
        t!(
            "plan.selected",
            locale = locale,
            selected = plan.scenarios.len(),
            filtered = plan.filtered_count
        )
        .bold()
    );

    Ok(plan)
}

/// Executes the run command with the provided arguments.
///
/// # Returns
/// `Ok` only when the suite passed. A failed suite, an invalid expression,
/// a discovery problem or an empty selection are all errors.
///
/// 只有套件通过时才返回 `Ok`。套件失败、表达式无效、发现问题或空选择都是错误。
pub async fn execute(args: RunArgs) -> Result<()> {
    let suite = load_suite(&args.config, args.lang.as_deref())?;
    let locale = suite.locale.clone();

    let mut options = suite.config.executor_options();
    if let Some(jobs) = args.jobs {
        options.concurrency = if jobs == 0 { num_cpus::get() } else { jobs };
    }
    if args.fail_fast {
        options.fail_fast = true;
    }
    if let Some(secs) = args.timeout_secs {
        options.timeout = Some(Duration::from_secs(secs));
    }

    let plan = plan_suite(
        &suite,
        args.tags.as_deref(),
        args.agent_tag.as_deref(),
        options.concurrency,
    )?;

    if options.concurrency > 1 {
        println!(
            "{}",
            t!(
                "plan.parallel_groups",
                locale = &locale,
                groups = plan.groups.len(),
                jobs = options.concurrency
            )
            .cyan()
        );
    } else {
        println!("{}", t!("plan.sequential", locale = &locale).cyan());
    }

    let environment = Arc::new(
        CommandEnvironment::from_config(&suite.config, &suite.base_dir).with_context(|| {
            t!("run.environment_config_invalid", locale = &locale, path = suite.config_path.display())
                .to_string()
        })?,
    );

    let stop_token = setup_signal_handler(&locale);
    let executor = SuiteExecutor::new(options).with_cancellation(stop_token);

    let started_at = Local::now();
    let outcomes = executor.run_plan(&plan, environment).await;
    let report = aggregate(&suite.config.name, outcomes, started_at)?;

    print_summary(&report, &locale);
    print_failure_details(&report, &locale);
    print_status_list(&report);

    if let Some(path) = &args.json {
        println!("\n{}", t!("run.writing_json", locale = &locale, path = path.display()));
        if let Err(e) = write_json_report(&report, path) {
            eprintln!("{} {:#}", t!("run.report_failed", locale = &locale).red(), e);
        }
    }

    if let Some(path) = &args.html {
        println!("\n{}", t!("run.writing_html", locale = &locale, path = path.display()));
        if let Err(e) = generate_html_report(&report, path, &locale) {
            eprintln!("{} {:#}", t!("run.report_failed", locale = &locale).red(), e);
        }
    }

    if report.is_pass() {
        println!("\n{}", t!("run.suite_passed", locale = &locale).green().bold());
        Ok(())
    } else {
        anyhow::bail!(
            t!(
                "run.suite_failed",
                locale = &locale,
                name = &report.name,
                failed = report.total() - report.passed
            )
            .to_string()
        )
    }
}

/// Sets up a signal handler for graceful shutdown.
/// Ctrl-C stops dispatching; scenarios in flight finish and are torn down.
fn setup_signal_handler(locale: &str) -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();
    let locale = locale.to_string();

    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            println!("\n{}", t!("run.shutdown_signal", locale = &locale).yellow());
            token_clone.cancel();
        }
    });

    token
}
