//! Subcommands of the `scenario-runner` binary.
//! `scenario-runner` 二进制程序的子命令。

pub mod init;
pub mod list;
pub mod run;
