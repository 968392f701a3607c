//! # Command Execution Module / 命令执行模块
//!
//! Builds shell-like commands from configuration strings and runs them with
//! their output captured.
//!
//! 根据配置字符串构建类 shell 命令，并在捕获输出的情况下运行它们。

use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::infra::t;

/// Maximum number of output lines kept in a failure message.
pub const OUTPUT_TAIL_LINES: usize = 50;

/// Expands `~` and `$VAR` references in a command line.
///
/// `lookup` resolves variables before the process environment is consulted.
/// Unknown variables are left in place for the shell.
///
/// 展开命令行中的 `~` 和 `$VAR` 引用。
/// `lookup` 在查询进程环境之前解析变量；未知变量保持原样交给 shell。
pub fn expand<F>(command_line: &str, mut lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let tilde = shellexpand::tilde(command_line);
    shellexpand::env_with_context_no_errors(&*tilde, |var| {
        lookup(var).or_else(|| std::env::var(var).ok())
    })
    .into_owned()
}

/// Splits an already expanded command line into a ready-to-spawn [`Command`].
/// 将已展开的命令行拆分为可直接派生的 [`Command`]。
pub fn split_command(expanded: &str, working_dir: &Path) -> Result<Command> {
    let parts = shlex::split(expanded)
        .ok_or_else(|| anyhow!("Failed to parse command: {}", expanded))?;
    let (program, args) = parts
        .split_first()
        .ok_or_else(|| anyhow!("Empty command after parsing: '{}'", expanded))?;

    let mut cmd = Command::new(program);
    cmd.args(args).kill_on_drop(true).current_dir(working_dir);
    Ok(cmd)
}

/// Expands a command line and splits it into a [`Command`].
/// Returns the command together with the expanded line.
///
/// 展开命令行并将其拆分为 [`Command`]，同时返回展开后的命令行。
pub fn build_command<F>(command_line: &str, working_dir: &Path, lookup: F) -> Result<(Command, String)>
where
    F: FnMut(&str) -> Option<String>,
{
    let expanded = expand(command_line, lookup);
    let cmd = split_command(&expanded, working_dir)?;
    Ok((cmd, expanded))
}

/// Spawns a command and captures stdout and stderr into one string.
/// Both streams are read concurrently so neither pipe can fill up and block.
///
/// 派生一个命令，并将 stdout 和 stderr 捕获到一个字符串中。
/// 两个流被并发读取，因此任何一个管道都不会被填满而阻塞。
pub async fn spawn_and_capture(mut cmd: Command) -> (std::io::Result<ExitStatus>, String) {
    let mut child = match cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn() {
        Ok(child) => child,
        Err(e) => return (Err(e), String::new()),
    };

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return (
            Err(std::io::Error::other(t!("command.capture_failed").to_string())),
            String::new(),
        );
    };

    let output = Arc::new(Mutex::new(String::new()));
    let stdout_task = tokio::spawn(collect_lines(stdout, Arc::clone(&output)));
    let stderr_task = tokio::spawn(collect_lines(stderr, Arc::clone(&output)));

    let status = child.wait().await;

    for task in [stdout_task, stderr_task] {
        if let Err(e) = task.await {
            eprintln!("Failed to join output reader task: {}", e);
        }
    }

    let captured = output.lock().await.clone();
    (status, captured)
}

async fn collect_lines<R>(reader: R, output: Arc<Mutex<String>>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let mut output = output.lock().await;
        output.push_str(&line);
        output.push('\n');
    }
}

/// Runs a command line to completion and returns its output, or an error
/// carrying the exit status and the tail of the output.
///
/// 运行命令行直至完成并返回其输出；失败时返回包含退出状态和输出末尾的错误。
pub async fn run_command_line<F>(command_line: &str, working_dir: &Path, envs: &[(String, String)], lookup: F) -> Result<String>
where
    F: FnMut(&str) -> Option<String>,
{
    let expanded = expand(command_line, lookup);
    run_expanded(&expanded, working_dir, envs).await
}

/// Runs a command line that needs no further expansion.
/// 运行无需再展开的命令行。
pub async fn run_expanded(expanded: &str, working_dir: &Path, envs: &[(String, String)]) -> Result<String> {
    let mut cmd = split_command(expanded, working_dir)?;
    cmd.envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    let (status, output) = spawn_and_capture(cmd).await;
    let status = status.with_context(|| format!("Failed to run command: {expanded}"))?;

    if status.success() {
        Ok(output)
    } else {
        Err(anyhow!(
            "command `{}` exited with {}\n{}",
            expanded,
            status,
            tail(&output, OUTPUT_TAIL_LINES)
        ))
    }
}

/// Keeps the last `max_lines` lines of `output`.
pub fn tail(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
