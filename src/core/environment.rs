//! # Environment Capability Module / 环境能力模块
//!
//! The suite executor never provisions infrastructure or interprets steps itself.
//! It drives an [`EnvironmentInitializer`], which owns the shared environment
//! (for example a docker-compose deployment), prepares a context per scenario,
//! and executes steps inside that context.
//!
//! 套件执行器自身从不配置基础设施或解释步骤。
//! 它驱动一个 [`EnvironmentInitializer`]，后者拥有共享环境（例如 docker-compose 部署），
//! 为每个场景准备上下文，并在该上下文中执行步骤。

use async_trait::async_trait;
use thiserror::Error;

use crate::core::models::{Scenario, Step};

/// Errors raised while acquiring or releasing environment resources.
/// 获取或释放环境资源时引发的错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentError {
    #[error("environment setup failed: {0}")]
    Setup(String),
    #[error("environment teardown failed: {0}")]
    Teardown(String),
}

/// The result of executing one step.
/// 执行单个步骤的结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    Passed,
    Failed { message: String },
    /// No step implementation matched the step text.
    /// 没有步骤实现与步骤文本匹配。
    Undefined,
}

/// Capability that provisions infrastructure for scenarios and runs their steps.
///
/// The executor guarantees:
/// - `stop` is awaited once after `start` was attempted, on every exit path;
/// - `teardown` is awaited exactly once for every context returned by `setup`,
///   including after a failed step, a timeout, or run cancellation.
///
/// 为场景配置基础设施并运行其步骤的能力。
///
/// 执行器保证：
/// - 只要尝试过 `start`，无论以何种路径退出，`stop` 都会被等待一次；
/// - 对 `setup` 返回的每个上下文，`teardown` 恰好被等待一次，
///   包括步骤失败、超时或运行取消之后。
#[async_trait]
pub trait EnvironmentInitializer: Send + Sync + 'static {
    /// Per-scenario state handed to every step of that scenario.
    type Context: Send + 'static;

    /// Brings up the environment shared by the whole run.
    async fn start(&self) -> Result<(), EnvironmentError> {
        Ok(())
    }

    /// Releases the shared environment.
    async fn stop(&self) -> Result<(), EnvironmentError> {
        Ok(())
    }

    async fn setup(&self, scenario: &Scenario) -> Result<Self::Context, EnvironmentError>;

    async fn run_step(&self, context: &mut Self::Context, step: &Step) -> StepResult;

    async fn teardown(&self, context: Self::Context) -> Result<(), EnvironmentError>;
}
