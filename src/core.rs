//! # Core Module / 核心模块
//!
//! This module contains the core functionality of Scenario Runner:
//! tag expressions, scenario discovery and selection, suite execution,
//! and result aggregation.
//!
//! 此模块包含 Scenario Runner 的核心功能：
//! 标签表达式、场景发现与选择、套件执行以及结果聚合。

pub mod catalog;
pub mod config;
pub mod environment;
pub mod execution;
pub mod models;
pub mod planner;
pub mod report;
pub mod tags;

// Re-exports
pub use catalog::discover;
pub use config::SuiteConfig;
pub use environment::{EnvironmentInitializer, StepResult};
pub use execution::{ExecutorOptions, SuiteExecutor};
pub use models::{Scenario, ScenarioOutcome};
pub use planner::{TagFilter, select};
pub use report::{SuiteReport, aggregate};
pub use tags::TagExpression;
