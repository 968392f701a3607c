//! # Suite Initialization Module / 套件初始化模块
//!
//! This module implements the `init` command, which writes a starter
//! `Scenarios.toml` either with defaults or through an interactive wizard.
//!
//! 此模块实现 `init` 命令，它使用默认值或通过交互式向导写入初始的 `Scenarios.toml`。
//!
//! ## Features / 功能特性
//!
//! - **Interactive Wizard**: Step-by-step prompts for the suite name, scenario paths,
//!   tag expression, concurrency and docker-compose lifecycle commands
//! - **Overwrite Protection**: Confirmation prompts before overwriting existing configurations
//!
//! - **交互式向导**: 逐步提示套件名称、场景路径、标签表达式、并发度和 docker-compose 生命周期命令
//! - **覆盖保护**: 覆盖现有配置前的确认提示

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{Confirm, Input, theme::ColorfulTheme};
use std::path::{Path, PathBuf};

use crate::core::config::{EnvironmentConfig, StepDefinition, SuiteConfig};
use crate::core::tags::TagExpression;
use crate::infra::{fs, t};

/// Arguments of the `init` command.
#[derive(Debug, Clone)]
pub struct InitArgs {
    pub output: PathBuf,
    pub force: bool,
    pub non_interactive: bool,
}

const DEFAULT_START_COMMAND: &str = "docker compose up -d --wait";
const DEFAULT_STOP_COMMAND: &str = "docker compose down -v";

/// The configuration written by `init --non-interactive`.
/// `init --non-interactive` 写入的配置。
pub fn starter_config(language: &str) -> SuiteConfig {
    SuiteConfig {
        language: language.to_string(),
        environment: EnvironmentConfig {
            start: Some(DEFAULT_START_COMMAND.to_string()),
            stop: Some(DEFAULT_STOP_COMMAND.to_string()),
            ..EnvironmentConfig::default()
        },
        steps: vec![
            StepDefinition {
                pattern: r"^the command `(?P<cmd>.+)` succeeds$".to_string(),
                command: "sh -c {cmd}".to_string(),
            },
            StepDefinition {
                pattern: r#"^service "(?P<service>[\w-]+)" is running$"#.to_string(),
                command: "docker compose exec -T {service} true".to_string(),
            },
        ],
        ..SuiteConfig::default()
    }
}

/// Runs the `init` command.
///
/// 运行 `init` 命令。
pub fn execute(args: InitArgs, language: &str) -> Result<()> {
    let theme = ColorfulTheme::default();

    if !args.non_interactive {
        println!("\n{}", t!("init.welcome", locale = language).cyan().bold());
        println!("{}", t!("init.description", locale = language));
    }

    if args.output.exists() && !args.force {
        if args.non_interactive {
            println!(
                "{}",
                t!("init.file_exists", locale = language, path = args.output.display()).red()
            );
            println!("{}", t!("init.use_force", locale = language).yellow());
            return Ok(());
        }

        let confirmation = Confirm::with_theme(&theme)
            .with_prompt(t!("init.overwrite_prompt", locale = language, path = args.output.display()))
            .default(false)
            .interact()
            .context(t!("init.user_confirmation_failed", locale = language).to_string())?;
        if !confirmation {
            println!("{}", t!("init.aborted", locale = language));
            return Ok(());
        }
    }

    let config = if args.non_interactive {
        starter_config(language)
    } else {
        run_wizard(&theme, language)?
    };

    write_config(&args.output, &config, language)
}

fn run_wizard(theme: &ColorfulTheme, language: &str) -> Result<SuiteConfig> {
    let mut config = starter_config(language);

    config.name = Input::with_theme(theme)
        .with_prompt(t!("init.name_prompt", locale = language))
        .default(config.name.clone())
        .interact_text()
        .context(t!("init.user_confirmation_failed", locale = language).to_string())?;

    let paths: String = Input::with_theme(theme)
        .with_prompt(t!("init.paths_prompt", locale = language))
        .default("test_cases".to_string())
        .interact_text()
        .context(t!("init.user_confirmation_failed", locale = language).to_string())?;
    config.paths = paths
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect();

    config.tags = Input::with_theme(theme)
        .with_prompt(t!("init.tags_prompt", locale = language))
        .default(config.tags.clone())
        .validate_with(|input: &String| -> Result<(), String> {
            TagExpression::parse(input)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })
        .interact_text()
        .context(t!("init.user_confirmation_failed", locale = language).to_string())?;

    config.concurrency = Input::with_theme(theme)
        .with_prompt(t!("init.concurrency_prompt", locale = language))
        .default(config.concurrency)
        .interact_text()
        .context(t!("init.user_confirmation_failed", locale = language).to_string())?;

    let use_compose = Confirm::with_theme(theme)
        .with_prompt(t!("init.compose_prompt", locale = language))
        .default(true)
        .interact()
        .context(t!("init.user_confirmation_failed", locale = language).to_string())?;
    if !use_compose {
        config.environment = EnvironmentConfig::default();
    }

    Ok(config)
}

fn write_config(path: &Path, config: &SuiteConfig, language: &str) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .context(t!("init.serialize_failed", locale = language).to_string())?;
    let header = t!("init.file_header", locale = language);
    fs::write_file(path, &format!("# {header}\n\n{content}"))?;

    println!(
        "{}",
        t!("init.success", locale = language, path = path.display()).green()
    );
    println!("{}", t!("init.next_steps", locale = language));
    Ok(())
}
