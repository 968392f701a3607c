//! # Suite Execution Engine Module / 套件执行引擎模块
//!
//! This module runs selected scenarios against an [`EnvironmentInitializer`].
//! It handles the complete scenario lifecycle from setup to teardown,
//! including timeouts, fail-fast cancellation and outcome collection.
//!
//! 此模块针对 [`EnvironmentInitializer`] 运行选定的场景。
//! 它处理从 setup 到 teardown 的完整场景生命周期，
//! 包括超时、快速失败取消和结果收集。

use colored::*;
use futures::{FutureExt, StreamExt, stream};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        environment::{EnvironmentError, EnvironmentInitializer, StepResult},
        models::{
            FailureDetail, FailureKind, Location, OutcomeStatus, Scenario, ScenarioOutcome,
            ScenarioStatus,
        },
        planner::{ExecutionPlan, partition_groups},
    },
    infra::t,
};

/// Scheduling and failure policy for a run.
/// 一次运行的调度和失败策略。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Maximum number of scenario groups running at once.
    /// 同时运行的场景组的最大数量。
    pub concurrency: usize,
    /// Stop dispatching after the first Failed or Undefined outcome.
    /// 在第一个 Failed 或 Undefined 结果之后停止调度。
    pub fail_fast: bool,
    /// Default per-scenario timeout, covering setup and steps.
    /// 默认的单场景超时，覆盖 setup 和步骤。
    pub timeout: Option<Duration>,
    /// Consecutive setup failures that cancel the run; 0 disables it.
    pub setup_failure_threshold: u32,
    /// Prefix of tags that declare shared resources.
    pub resource_prefix: String,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            fail_fast: false,
            timeout: None,
            setup_failure_threshold: 3,
            resource_prefix: "resource:".to_string(),
        }
    }
}

/// State shared by every group of a single run.
struct RunState {
    options: ExecutorOptions,
    cancel: CancellationToken,
    consecutive_setup_failures: AtomicU32,
    /// Setups that outlived their deadline; each task tears down what it produced.
    late_setups: Mutex<Vec<JoinHandle<()>>>,
}

impl RunState {
    fn record_setup_failure(&self) {
        let failures = self.consecutive_setup_failures.fetch_add(1, Ordering::SeqCst) + 1;
        let threshold = self.options.setup_failure_threshold;
        if threshold > 0 && failures >= threshold && !self.cancel.is_cancelled() {
            println!(
                "{}",
                t!("run.setup_failure_threshold", count = failures).red().bold()
            );
            self.cancel.cancel();
        }
    }

    fn record_setup_success(&self) {
        self.consecutive_setup_failures.store(0, Ordering::SeqCst);
    }
}

/// Runs scenarios and captures one outcome per scenario.
///
/// Scenarios run sequentially unless `concurrency > 1`, in which case groups of
/// scenarios with disjoint resource tags run concurrently. Per-scenario errors
/// are captured into outcomes and never returned as errors.
///
/// 运行场景并为每个场景捕获一个结果。
///
/// 除非 `concurrency > 1`，否则场景按顺序运行；在并行模式下，资源标签互不相交的
/// 场景组会并发运行。单个场景的错误会被捕获到结果中，从不作为错误返回。
pub struct SuiteExecutor {
    options: ExecutorOptions,
    cancel: CancellationToken,
}

impl SuiteExecutor {
    pub fn new(options: ExecutorOptions) -> Self {
        Self {
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses an externally owned token, e.g. one cancelled on Ctrl-C.
    /// 使用外部持有的令牌，例如在 Ctrl-C 时被取消的令牌。
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Runs `scenarios` in order and returns their outcomes in the same order.
    ///
    /// The shared environment is started before the first scenario and stopped
    /// after the last one, whatever happened in between.
    ///
    /// 按顺序运行 `scenarios`，并以相同顺序返回它们的结果。
    ///
    /// 共享环境在第一个场景之前启动，在最后一个场景之后停止，无论期间发生了什么。
    pub async fn run<E: EnvironmentInitializer>(
        &self,
        scenarios: &[Scenario],
        environment: Arc<E>,
    ) -> Vec<ScenarioOutcome> {
        let groups = if self.options.concurrency <= 1 {
            vec![(0..scenarios.len()).collect::<Vec<_>>()]
        } else {
            partition_groups(scenarios, &self.options.resource_prefix)
        };
        self.run_grouped(scenarios, groups, environment).await
    }

    /// Runs the scenarios of a plan with the groups the planner computed.
    /// 使用规划器计算出的组运行计划中的场景。
    pub async fn run_plan<E: EnvironmentInitializer>(
        &self,
        plan: &ExecutionPlan,
        environment: Arc<E>,
    ) -> Vec<ScenarioOutcome> {
        self.run_grouped(&plan.scenarios, plan.groups.clone(), environment)
            .await
    }

    async fn run_grouped<E: EnvironmentInitializer>(
        &self,
        scenarios: &[Scenario],
        groups: Vec<Vec<usize>>,
        environment: Arc<E>,
    ) -> Vec<ScenarioOutcome> {
        if scenarios.is_empty() {
            return Vec::new();
        }

        println!("{}", t!("run.environment_starting").blue());
        let outcomes = match environment.start().await {
            Ok(()) => {
                self.dispatch(scenarios, groups, Arc::clone(&environment))
                    .await
            }
            Err(e) => {
                println!(
                    "{}",
                    t!("run.environment_start_failed", error = &e).red()
                );
                scenarios
                    .iter()
                    .map(|scenario| {
                        ScenarioOutcome::failed(
                            scenario,
                            FailureDetail::new(FailureKind::EnvironmentSetup, e.to_string(), None),
                            Duration::ZERO,
                        )
                    })
                    .collect()
            }
        };

        println!("{}", t!("run.environment_stopping").blue());
        if let Err(e) = environment.stop().await {
            println!("{}", t!("run.environment_stop_failed", error = &e).red());
        }

        outcomes
    }

    async fn dispatch<E: EnvironmentInitializer>(
        &self,
        scenarios: &[Scenario],
        groups: Vec<Vec<usize>>,
        environment: Arc<E>,
    ) -> Vec<ScenarioOutcome> {
        let state = Arc::new(RunState {
            options: self.options.clone(),
            cancel: self.cancel.clone(),
            consecutive_setup_failures: AtomicU32::new(0),
            late_setups: Mutex::new(Vec::new()),
        });

        let results = stream::iter(groups.into_iter().map(|indices| {
            let members: Vec<(usize, Scenario)> = indices
                .into_iter()
                .filter_map(|i| scenarios.get(i).map(|scenario| (i, scenario.clone())))
                .collect();
            let fallback = members.clone();
            let environment = Arc::clone(&environment);
            let state = Arc::clone(&state);

            async move {
                match tokio::spawn(run_group(members, environment, state)).await {
                    Ok(outcomes) => outcomes,
                    Err(e) => fallback
                        .iter()
                        .map(|(i, scenario)| {
                            let detail = FailureDetail::new(
                                FailureKind::Internal,
                                format!("Critical error during scenario execution: {e}"),
                                None,
                            );
                            (*i, ScenarioOutcome::failed(scenario, detail, Duration::ZERO))
                        })
                        .collect(),
                }
            }
        }))
        .buffer_unordered(self.options.concurrency.max(1))
        .collect::<Vec<Vec<(usize, ScenarioOutcome)>>>()
        .await;

        // Setups abandoned at their deadline are torn down before the environment stops.
        let late_setups = std::mem::take(&mut *state.late_setups.lock().await);
        for handle in late_setups {
            if let Err(e) = handle.await {
                eprintln!("Failed to join late teardown task: {}", e);
            }
        }

        let mut outcomes: Vec<(usize, ScenarioOutcome)> = results.into_iter().flatten().collect();
        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }
}

/// Runs one group of scenarios sequentially.
async fn run_group<E: EnvironmentInitializer>(
    members: Vec<(usize, Scenario)>,
    environment: Arc<E>,
    state: Arc<RunState>,
) -> Vec<(usize, ScenarioOutcome)> {
    let mut outcomes = Vec::with_capacity(members.len());

    for (index, scenario) in members {
        if state.cancel.is_cancelled() {
            outcomes.push((
                index,
                ScenarioOutcome::skipped(&scenario, t!("run.scenario_not_dispatched")),
            ));
            continue;
        }

        let outcome = run_scenario(&scenario, &environment, &state).await;

        if state.options.fail_fast && outcome.is_failure() && !state.cancel.is_cancelled() {
            println!(
                "{}",
                t!("run.fail_fast_triggered", name = &scenario.name).yellow()
            );
            state.cancel.cancel();
        }
        outcomes.push((index, outcome));
    }

    outcomes
}

enum StepsOutcome {
    Passed,
    Failed(FailureDetail),
    Undefined(FailureDetail),
}

async fn with_deadline<F: Future>(
    deadline: Option<tokio::time::Instant>,
    future: F,
) -> Result<F::Output, tokio::time::error::Elapsed> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, future).await,
        None => Ok(future.await),
    }
}

fn timeout_secs(timeout: Option<Duration>) -> String {
    format!("{:.1}", timeout.unwrap_or_default().as_secs_f64())
}

fn timeout_detail(scenario: &Scenario, timeout: Option<Duration>) -> FailureDetail {
    FailureDetail::new(
        FailureKind::Timeout,
        t!("run.scenario_timeout_message", timeout = timeout_secs(timeout)).to_string(),
        Some(scenario.location.clone()),
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_default();
    t!("run.scenario_panicked", message = message).to_string()
}

/// Lets a setup that missed its deadline finish in the background and tears
/// down the context it eventually produces.
async fn defer_late_setup<E: EnvironmentInitializer>(
    setup: JoinHandle<Result<E::Context, EnvironmentError>>,
    environment: Arc<E>,
    scenario_name: String,
    state: &RunState,
) {
    let handle = tokio::spawn(async move {
        if let Ok(Ok(context)) = setup.await {
            if let Err(e) = environment.teardown(context).await {
                println!(
                    "{}",
                    t!("run.scenario_teardown_failed", name = &scenario_name, error = &e).red()
                );
            }
        }
    });
    state.late_setups.lock().await.push(handle);
}

/// Executes a single scenario: setup, steps, teardown.
/// Teardown is awaited whenever setup produced a context. A panic inside the
/// environment fails only this scenario.
///
/// 执行单个场景：setup、步骤、teardown。
/// 只要 setup 产生了上下文，就会等待 teardown。环境中的 panic 只会使此场景失败。
async fn run_scenario<E: EnvironmentInitializer>(
    scenario: &Scenario,
    environment: &Arc<E>,
    state: &RunState,
) -> ScenarioOutcome {
    if let ScenarioStatus::Undefined { reason } = &scenario.status {
        println!(
            "{}",
            t!("run.scenario_malformed", name = &scenario.name, reason = reason).yellow()
        );
        let detail = FailureDetail::new(
            FailureKind::MalformedScenario,
            reason.clone(),
            Some(scenario.location.clone()),
        );
        return ScenarioOutcome::undefined(scenario, detail, Duration::ZERO);
    }

    println!(
        "{}",
        t!("run.running_scenario", name = &scenario.name, location = &scenario.location).blue()
    );

    let started = Instant::now();
    let timeout = scenario.timeout_override().or(state.options.timeout);
    let deadline = timeout.map(|t| tokio::time::Instant::now() + t);

    let mut setup = tokio::spawn({
        let environment = Arc::clone(environment);
        let scenario = scenario.clone();
        async move { environment.setup(&scenario).await }
    });

    let mut context = match with_deadline(deadline, &mut setup).await {
        Ok(Ok(Ok(context))) => {
            state.record_setup_success();
            context
        }
        Ok(Ok(Err(e))) => {
            println!(
                "{}",
                t!("run.scenario_setup_failed", name = &scenario.name, error = &e).red()
            );
            state.record_setup_failure();
            let detail = FailureDetail::new(
                FailureKind::EnvironmentSetup,
                e.to_string(),
                Some(scenario.location.clone()),
            );
            return ScenarioOutcome::failed(scenario, detail, started.elapsed());
        }
        Ok(Err(join_error)) => {
            let message = match join_error.try_into_panic() {
                Ok(payload) => panic_message(payload.as_ref()),
                Err(e) => e.to_string(),
            };
            println!(
                "{}",
                t!("run.scenario_setup_failed", name = &scenario.name, error = &message).red()
            );
            state.record_setup_failure();
            let detail = FailureDetail::new(
                FailureKind::Internal,
                message,
                Some(scenario.location.clone()),
            );
            return ScenarioOutcome::failed(scenario, detail, started.elapsed());
        }
        Err(_) => {
            println!(
                "{}",
                t!("run.scenario_timeout", name = &scenario.name, timeout = timeout_secs(timeout)).red()
            );
            state.record_setup_failure();
            defer_late_setup(setup, Arc::clone(environment), scenario.name.clone(), state).await;
            return ScenarioOutcome::failed(scenario, timeout_detail(scenario, timeout), started.elapsed());
        }
    };

    let body = AssertUnwindSafe(with_deadline(
        deadline,
        run_steps(environment.as_ref(), &mut context, scenario),
    ))
    .catch_unwind()
    .await;
    let teardown = match AssertUnwindSafe(environment.teardown(context))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(payload) => Err(EnvironmentError::Teardown(panic_message(payload.as_ref()))),
    };
    let duration = started.elapsed();

    let (mut status, mut detail) = match body {
        Ok(Ok(StepsOutcome::Passed)) => (OutcomeStatus::Passed, None),
        Ok(Ok(StepsOutcome::Failed(detail))) => (OutcomeStatus::Failed, Some(detail)),
        Ok(Ok(StepsOutcome::Undefined(detail))) => (OutcomeStatus::Undefined, Some(detail)),
        Ok(Err(_)) => {
            println!(
                "{}",
                t!("run.scenario_timeout", name = &scenario.name, timeout = timeout_secs(timeout)).red()
            );
            (OutcomeStatus::Failed, Some(timeout_detail(scenario, timeout)))
        }
        Err(payload) => (
            OutcomeStatus::Failed,
            Some(FailureDetail::new(
                FailureKind::Internal,
                panic_message(payload.as_ref()),
                Some(scenario.location.clone()),
            )),
        ),
    };

    if let Err(e) = teardown {
        println!(
            "{}",
            t!("run.scenario_teardown_failed", name = &scenario.name, error = &e).red()
        );
        match detail.as_mut() {
            Some(existing) => {
                existing.message.push('\n');
                existing.message.push_str(&e.to_string());
            }
            None => {
                status = OutcomeStatus::Failed;
                detail = Some(FailureDetail::new(
                    FailureKind::EnvironmentTeardown,
                    e.to_string(),
                    Some(scenario.location.clone()),
                ));
            }
        }
    }

    let secs = format!("{:.2}", duration.as_secs_f64());
    match status {
        OutcomeStatus::Passed => println!(
            "{}",
            t!("run.scenario_passed", name = &scenario.name, duration = &secs).green()
        ),
        OutcomeStatus::Undefined => println!(
            "{}",
            t!("run.scenario_undefined", name = &scenario.name, duration = &secs).yellow()
        ),
        _ => println!(
            "{}",
            t!("run.scenario_failed", name = &scenario.name, duration = &secs).red()
        ),
    }

    ScenarioOutcome {
        name: scenario.name.clone(),
        location: scenario.location.clone(),
        status,
        detail,
        duration,
    }
}

async fn run_steps<E: EnvironmentInitializer>(
    environment: &E,
    context: &mut E::Context,
    scenario: &Scenario,
) -> StepsOutcome {
    for step in &scenario.steps {
        let location = Location::new(scenario.location.path.clone(), step.line);
        match environment.run_step(context, step).await {
            StepResult::Passed => {}
            StepResult::Failed { message } => {
                return StepsOutcome::Failed(FailureDetail::new(
                    FailureKind::StepFailed,
                    format!("{step}: {message}"),
                    Some(location),
                ));
            }
            StepResult::Undefined => {
                return StepsOutcome::Undefined(FailureDetail::new(
                    FailureKind::UndefinedStep,
                    t!("run.undefined_step", step = step).to_string(),
                    Some(location),
                ));
            }
        }
    }
    StepsOutcome::Passed
}
