//! # File System Operations Module / 文件系统操作模块
//!
//! This module provides utilities for file system operations,
//! such as creating per-scenario scratch directories and writing reports.
//!
//! 此模块提供文件系统操作的实用功能，
//! 如创建每个场景的临时目录和写入报告。

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Creates a unique, temporary scratch directory for a scenario.
/// The directory is deleted when the returned guard is dropped.
///
/// # Arguments
/// * `scenario_name` - Name of the scenario, used in the directory prefix
pub fn create_scenario_dir(scenario_name: &str) -> Result<TempDir> {
    let sanitized_name: String = scenario_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .take(40)
        .collect();

    tempfile::Builder::new()
        .prefix(&format!("scenario_runner_{}_", sanitized_name))
        .tempdir()
        .with_context(|| {
            format!("Failed to create scratch directory for scenario '{scenario_name}'")
        })
}

/// Writes `content` to `path`, creating missing parent directories.
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write file: {}", path.display()))
}

/// Gets the absolute path from a potentially relative path.
///
/// # Returns
/// Canonicalized absolute path, or an error if the path doesn't exist
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).with_context(|| format!("Failed to resolve path: {}", path.display()))
}
