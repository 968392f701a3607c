//! # Command-Line Interface / 命令行接口
//!
//! Builds the `scenario-runner` command tree with clap's builder API so that
//! every help text can be localized before parsing.
//!
//! 使用 clap 的构建器 API 构建 `scenario-runner` 命令树，以便在解析之前本地化所有帮助文本。

pub mod commands;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{env, path::PathBuf};

use crate::core::config::DEFAULT_CONFIG_FILE;
use crate::infra::t;
use commands::{init::InitArgs, list::ListArgs, run::RunArgs};

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for a `--lang <VALUE>` or `--lang=<VALUE>` argument.
fn pre_parse_language() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    if let Some(pos) = args.iter().position(|arg| arg == "--lang") {
        return args.get(pos + 1).cloned();
    }
    args.iter()
        .find_map(|arg| arg.strip_prefix("--lang="))
        .map(str::to_string)
}

fn config_arg(locale: &str) -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .help(t!("cli.arg_config", locale = locale).to_string())
        .value_name("CONFIG")
        .default_value(DEFAULT_CONFIG_FILE)
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

fn selection_args(locale: &str) -> [Arg; 2] {
    [
        Arg::new("tags")
            .short('t')
            .long("tags")
            .help(t!("cli.arg_tags", locale = locale).to_string())
            .value_name("EXPRESSION")
            .allow_hyphen_values(true)
            .action(ArgAction::Set),
        Arg::new("agent-tag")
            .long("agent-tag")
            .help(t!("cli.arg_agent_tag", locale = locale).to_string())
            .value_name("TAG")
            .action(ArgAction::Set),
    ]
}

fn build_cli(locale: &str) -> Command {
    Command::new("scenario-runner")
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli.about", locale = locale).to_string())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli.lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("run")
                .about(t!("cli.run_about", locale = locale).to_string())
                .arg(config_arg(locale))
                .args(selection_args(locale))
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .help(t!("cli.arg_jobs", locale = locale).to_string())
                        .value_name("JOBS")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("fail-fast")
                        .long("fail-fast")
                        .help(t!("cli.arg_fail_fast", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .help(t!("cli.arg_timeout", locale = locale).to_string())
                        .value_name("SECONDS")
                        .value_parser(clap::value_parser!(u64))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help(t!("cli.arg_json", locale = locale).to_string())
                        .value_name("JSON")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .help(t!("cli.arg_html", locale = locale).to_string())
                        .value_name("HTML")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("list")
                .about(t!("cli.list_about", locale = locale).to_string())
                .arg(config_arg(locale))
                .args(selection_args(locale)),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cli.init_about", locale = locale).to_string())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help(t!("cli.arg_output", locale = locale).to_string())
                        .value_name("OUTPUT")
                        .default_value(DEFAULT_CONFIG_FILE)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help(t!("cli.arg_force", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("non-interactive")
                        .long("non-interactive")
                        .help(t!("cli.arg_non_interactive", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn path_arg(matches: &ArgMatches, id: &str) -> PathBuf {
    matches
        .get_one::<PathBuf>(id)
        .cloned()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

fn string_arg(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.get_one::<String>(id).cloned()
}

/// Parses the command line and dispatches to the selected command.
pub async fn run() -> Result<()> {
    // Pre-parse language and initialize i18n first.
    let requested_language = pre_parse_language();
    let language = crate::init(requested_language.as_deref());

    let matches = build_cli(&language).get_matches();

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            let args = RunArgs {
                config: path_arg(run_matches, "config"),
                tags: string_arg(run_matches, "tags"),
                agent_tag: string_arg(run_matches, "agent-tag"),
                jobs: run_matches.get_one::<usize>("jobs").copied(),
                fail_fast: run_matches.get_flag("fail-fast"),
                timeout_secs: run_matches.get_one::<u64>("timeout").copied(),
                json: run_matches.get_one::<PathBuf>("json").cloned(),
                html: run_matches.get_one::<PathBuf>("html").cloned(),
                lang: requested_language,
            };
            commands::run::execute(args).await?;
        }
        Some(("list", list_matches)) => {
            let args = ListArgs {
                config: path_arg(list_matches, "config"),
                tags: string_arg(list_matches, "tags"),
                agent_tag: string_arg(list_matches, "agent-tag"),
                lang: requested_language,
            };
            commands::list::execute(args)?;
        }
        Some(("init", init_matches)) => {
            // Show language detection message if it was auto-detected
            if requested_language.is_none() {
                println!(
                    "{}",
                    t!("cli.system_language_detected", locale = &language, lang = &language)
                );
            }
            let args = InitArgs {
                output: path_arg(init_matches, "output"),
                force: init_matches.get_flag("force"),
                non_interactive: init_matches.get_flag("non-interactive"),
            };
            commands::init::execute(args, &language)?;
        }
        _ => {
            // Clap has already printed the help text.
        }
    }
    Ok(())
}
