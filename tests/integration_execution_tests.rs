//! # Suite Execution Integration Tests / 套件执行集成测试
//!
//! Runs the suite executor against an in-memory environment and checks the
//! lifecycle guarantees: teardown after every successful setup, timeouts,
//! fail-fast, cancellation and resource-disjoint parallelism.
//!
//! 针对内存中的环境运行套件执行器，并检查生命周期保证：每次成功 setup 之后的
//! teardown、超时、快速失败、取消以及资源互不相交的并行执行。

mod common;

use chrono::Local;
use common::{MockEnvironment, scenario};
use scenario_runner::core::execution::{ExecutorOptions, SuiteExecutor};
use scenario_runner::core::models::{FailureKind, Location, OutcomeStatus, Scenario};
use scenario_runner::core::planner::plan_execution;
use scenario_runner::core::tags::TagExpression;
use scenario_runner::core::report::{SuiteStatus, aggregate};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn statuses(outcomes: &[scenario_runner::core::models::ScenarioOutcome]) -> Vec<OutcomeStatus> {
    outcomes.iter().map(|o| o.status).collect()
}

fn sequential() -> ExecutorOptions {
    ExecutorOptions::default()
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_passing_suite() {
        let env = Arc::new(MockEnvironment::new());
        let scenarios = vec![
            scenario("a", &[], &["it passes", "it passes"]),
            scenario("b", &[], &["it passes"]),
        ];
        let outcomes = SuiteExecutor::new(sequential())
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(statuses(&outcomes), vec![OutcomeStatus::Passed; 2]);
        assert_eq!(MockEnvironment::count(&env.starts), 1);
        assert_eq!(MockEnvironment::count(&env.stops), 1);
        assert_eq!(MockEnvironment::count(&env.setups), 2);
        assert_eq!(MockEnvironment::count(&env.teardowns), 2);
        assert_eq!(env.executed(), vec!["a", "b"]);

        let report = aggregate("Suite", outcomes, Local::now()).unwrap();
        assert_eq!(report.status, SuiteStatus::Pass);
    }

    #[tokio::test]
    async fn test_empty_selection_runs_nothing() {
        let env = Arc::new(MockEnvironment::new());
        let outcomes = SuiteExecutor::new(sequential()).run(&[], Arc::clone(&env)).await;
        assert!(outcomes.is_empty());
        assert_eq!(MockEnvironment::count(&env.starts), 0);
        assert!(aggregate("Suite", outcomes, Local::now()).is_err());
    }

    #[tokio::test]
    async fn test_failed_step_records_location_and_continues() {
        let env = Arc::new(MockEnvironment::new());
        let scenarios = vec![
            scenario("a", &[], &["it passes", "it fails", "it passes"]),
            scenario("b", &[], &["it passes"]),
        ];
        let outcomes = SuiteExecutor::new(sequential())
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(
            statuses(&outcomes),
            vec![OutcomeStatus::Failed, OutcomeStatus::Passed]
        );
        let detail = outcomes[0].detail.as_ref().unwrap();
        assert_eq!(detail.kind, FailureKind::StepFailed);
        assert!(detail.message.contains("boom"));
        assert_eq!(detail.location.as_ref().map(|l| l.line), Some(3));
        assert_eq!(MockEnvironment::count(&env.teardowns), 2);
    }

    #[tokio::test]
    async fn test_undefined_step() {
        let env = Arc::new(MockEnvironment::new());
        let scenarios = vec![
            scenario("a", &[], &["it passes", "something nobody implemented"]),
            scenario("b", &[], &["it passes"]),
        ];
        let outcomes = SuiteExecutor::new(sequential())
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(outcomes[0].status, OutcomeStatus::Undefined);
        assert_eq!(outcomes[0].failure_kind(), Some(FailureKind::UndefinedStep));
        assert_eq!(outcomes[1].status, OutcomeStatus::Passed);
        assert_eq!(MockEnvironment::count(&env.teardowns), 2);

        let report = aggregate("Suite", outcomes, Local::now()).unwrap();
        assert_eq!(report.status, SuiteStatus::Fail);
    }

    #[tokio::test]
    async fn test_malformed_scenario_is_undefined_without_setup() {
        let env = Arc::new(MockEnvironment::new());
        let scenarios = vec![Scenario::malformed(
            "broken",
            Location::new("broken.feature", 3),
            "scenario outlines are not supported",
        )];
        let outcomes = SuiteExecutor::new(sequential())
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(outcomes[0].status, OutcomeStatus::Undefined);
        assert_eq!(outcomes[0].failure_kind(), Some(FailureKind::MalformedScenario));
        assert_eq!(MockEnvironment::count(&env.setups), 0);
    }

    #[tokio::test]
    async fn test_setup_failure_skips_teardown() {
        let env = Arc::new(MockEnvironment::failing_setup(&["a"]));
        let scenarios = vec![
            scenario("a", &[], &["it passes"]),
            scenario("b", &[], &["it passes"]),
        ];
        let outcomes = SuiteExecutor::new(sequential())
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(outcomes[0].failure_kind(), Some(FailureKind::EnvironmentSetup));
        assert_eq!(outcomes[1].status, OutcomeStatus::Passed);
        assert_eq!(MockEnvironment::count(&env.setups), 2);
        assert_eq!(MockEnvironment::count(&env.teardowns), 1);
    }

    #[tokio::test]
    async fn test_teardown_failure_fails_passing_scenario() {
        let env = Arc::new(MockEnvironment {
            fail_teardown_for: HashSet::from(["a".to_string(), "b".to_string()]),
            ..MockEnvironment::default()
        });
        let scenarios = vec![
            scenario("a", &[], &["it passes"]),
            scenario("b", &[], &["it fails"]),
        ];
        let outcomes = SuiteExecutor::new(sequential())
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
        assert_eq!(outcomes[0].failure_kind(), Some(FailureKind::EnvironmentTeardown));

        // The step failure stays the primary cause.
        let detail = outcomes[1].detail.as_ref().unwrap();
        assert_eq!(detail.kind, FailureKind::StepFailed);
        assert!(detail.message.contains("cannot clean up b"));
    }

    #[tokio::test]
    async fn test_start_failure_fails_every_scenario_and_still_stops() {
        let env = Arc::new(MockEnvironment {
            fail_start: true,
            ..MockEnvironment::default()
        });
        let scenarios = vec![
            scenario("a", &[], &["it passes"]),
            scenario("b", &[], &["it passes"]),
        ];
        let outcomes = SuiteExecutor::new(sequential())
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert!(
            outcomes
                .iter()
                .all(|o| o.failure_kind() == Some(FailureKind::EnvironmentSetup))
        );
        assert_eq!(MockEnvironment::count(&env.setups), 0);
        assert_eq!(MockEnvironment::count(&env.stops), 1);
    }
}

#[cfg(test)]
mod timeout_tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_fails_scenario_and_tears_down_once() {
        let env = Arc::new(MockEnvironment::new());
        let scenarios = vec![scenario("slow", &[], &["it sleeps 5000"])];
        let options = ExecutorOptions {
            timeout: Some(Duration::from_millis(100)),
            ..ExecutorOptions::default()
        };
        let outcomes = SuiteExecutor::new(options)
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(outcomes[0].status, OutcomeStatus::Failed);
        assert!(outcomes[0].is_timeout());
        assert!(outcomes[0].duration < Duration::from_secs(5));
        assert_eq!(MockEnvironment::count(&env.teardowns), 1);

        let report = aggregate("Suite", outcomes, Local::now()).unwrap();
        assert_eq!(report.status, SuiteStatus::Fail);
    }

    #[tokio::test]
    async fn test_timeout_tag_overrides_default() {
        let env = Arc::new(MockEnvironment::new());
        let scenarios = vec![
            scenario("patient", &["timeout:10"], &["it sleeps 200"]),
            scenario("impatient", &["@timeout:1"], &["it sleeps 5000"]),
        ];
        let options = ExecutorOptions {
            timeout: Some(Duration::from_millis(50)),
            ..ExecutorOptions::default()
        };
        let outcomes = SuiteExecutor::new(options)
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(outcomes[0].status, OutcomeStatus::Passed);
        assert!(outcomes[1].is_timeout());
        assert_eq!(MockEnvironment::count(&env.teardowns), 2);
    }
}

#[cfg(test)]
mod setup_timeout_tests {
    use super::*;

    fn hanging_setup() -> Arc<MockEnvironment> {
        Arc::new(MockEnvironment {
            setup_delay: Some(Duration::from_millis(300)),
            ..MockEnvironment::default()
        })
    }

    #[tokio::test]
    async fn test_setup_timeouts_count_toward_failure_threshold() {
        let env = hanging_setup();
        let scenarios: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .map(|name| scenario(name, &[], &["it passes"]))
            .collect();
        let options = ExecutorOptions {
            timeout: Some(Duration::from_millis(50)),
            setup_failure_threshold: 2,
            ..ExecutorOptions::default()
        };
        let outcomes = SuiteExecutor::new(options)
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(
            statuses(&outcomes),
            vec![
                OutcomeStatus::Failed,
                OutcomeStatus::Failed,
                OutcomeStatus::Skipped,
                OutcomeStatus::Skipped
            ]
        );
        assert!(outcomes[0].is_timeout());
        assert!(outcomes[1].is_timeout());
        assert_eq!(MockEnvironment::count(&env.setups), 2);
    }

    #[tokio::test]
    async fn test_late_setup_is_torn_down_before_run_returns() {
        let env = hanging_setup();
        let scenarios = vec![scenario("slow start", &[], &["it passes"])];
        let options = ExecutorOptions {
            timeout: Some(Duration::from_millis(50)),
            ..ExecutorOptions::default()
        };
        let outcomes = SuiteExecutor::new(options)
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert!(outcomes[0].is_timeout());
        assert_eq!(env.executed(), vec!["slow start"]);
        assert_eq!(MockEnvironment::count(&env.teardowns), 1);
        assert_eq!(MockEnvironment::count(&env.in_flight), 0);
        assert_eq!(MockEnvironment::count(&env.stops), 1);
    }
}

#[cfg(test)]
mod panic_isolation_tests {
    use super::*;

    #[tokio::test]
    async fn test_panicking_step_fails_only_its_scenario() {
        let env = Arc::new(MockEnvironment::new());
        let scenarios = vec![
            scenario("a", &[], &["it passes"]),
            scenario("b", &[], &["it panics", "it passes"]),
            scenario("c", &[], &["it passes"]),
        ];
        let outcomes = SuiteExecutor::new(sequential())
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(
            statuses(&outcomes),
            vec![OutcomeStatus::Passed, OutcomeStatus::Failed, OutcomeStatus::Passed]
        );
        assert_eq!(outcomes[1].failure_kind(), Some(FailureKind::Internal));
        assert!(outcomes[1].detail.as_ref().unwrap().message.contains("step panicked"));
        assert_eq!(MockEnvironment::count(&env.teardowns), 3);
    }

    #[tokio::test]
    async fn test_panicking_setup_fails_only_its_scenario() {
        let env = Arc::new(MockEnvironment {
            panic_setup_for: ["b".to_string()].into_iter().collect(),
            ..MockEnvironment::default()
        });
        let scenarios = vec![
            scenario("a", &[], &["it passes"]),
            scenario("b", &[], &["it passes"]),
            scenario("c", &[], &["it passes"]),
        ];
        let outcomes = SuiteExecutor::new(sequential())
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(
            statuses(&outcomes),
            vec![OutcomeStatus::Passed, OutcomeStatus::Failed, OutcomeStatus::Passed]
        );
        assert_eq!(outcomes[1].failure_kind(), Some(FailureKind::Internal));
        assert_eq!(MockEnvironment::count(&env.teardowns), 2);
    }

    #[tokio::test]
    async fn test_panic_in_parallel_group_keeps_other_outcomes() {
        let env = Arc::new(MockEnvironment::new());
        let scenarios = vec![
            scenario("db-1", &["resource:db"], &["it passes"]),
            scenario("db-2", &["resource:db"], &["it panics"]),
            scenario("db-3", &["resource:db"], &["it passes"]),
        ];
        let options = ExecutorOptions {
            concurrency: 2,
            ..ExecutorOptions::default()
        };
        let outcomes = SuiteExecutor::new(options)
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(
            statuses(&outcomes),
            vec![OutcomeStatus::Passed, OutcomeStatus::Failed, OutcomeStatus::Passed]
        );
    }
}

#[cfg(test)]
mod fail_fast_tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_fast_skips_remaining_scenarios() {
        let env = Arc::new(MockEnvironment::new());
        let scenarios = vec![
            scenario("a", &[], &["it passes"]),
            scenario("b", &[], &["it fails"]),
            scenario("c", &[], &["it passes"]),
            scenario("d", &[], &["it passes"]),
        ];
        let options = ExecutorOptions {
            fail_fast: true,
            ..ExecutorOptions::default()
        };
        let outcomes = SuiteExecutor::new(options)
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(
            statuses(&outcomes),
            vec![
                OutcomeStatus::Passed,
                OutcomeStatus::Failed,
                OutcomeStatus::Skipped,
                OutcomeStatus::Skipped
            ]
        );
        assert_eq!(outcomes[2].failure_kind(), Some(FailureKind::Cancelled));
        assert_eq!(env.executed(), vec!["a", "b"]);
        assert_eq!(MockEnvironment::count(&env.stops), 1);
    }

    #[tokio::test]
    async fn test_without_fail_fast_everything_runs() {
        let env = Arc::new(MockEnvironment::new());
        let scenarios = vec![
            scenario("a", &[], &["it fails"]),
            scenario("b", &[], &["it passes"]),
        ];
        let outcomes = SuiteExecutor::new(sequential())
            .run(&scenarios, Arc::clone(&env))
            .await;
        assert_eq!(
            statuses(&outcomes),
            vec![OutcomeStatus::Failed, OutcomeStatus::Passed]
        );
    }

    #[tokio::test]
    async fn test_consecutive_setup_failures_cancel_the_run() {
        let env = Arc::new(MockEnvironment::failing_setup(&["a", "b", "c", "d"]));
        let scenarios = vec![
            scenario("a", &[], &["it passes"]),
            scenario("b", &[], &["it passes"]),
            scenario("c", &[], &["it passes"]),
            scenario("d", &[], &["it passes"]),
        ];
        let options = ExecutorOptions {
            setup_failure_threshold: 2,
            ..ExecutorOptions::default()
        };
        let outcomes = SuiteExecutor::new(options)
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(
            statuses(&outcomes),
            vec![
                OutcomeStatus::Failed,
                OutcomeStatus::Failed,
                OutcomeStatus::Skipped,
                OutcomeStatus::Skipped
            ]
        );
        assert_eq!(MockEnvironment::count(&env.setups), 2);
    }

    #[tokio::test]
    async fn test_successful_setup_resets_failure_streak() {
        let env = Arc::new(MockEnvironment::failing_setup(&["a", "c"]));
        let scenarios = vec![
            scenario("a", &[], &["it passes"]),
            scenario("b", &[], &["it passes"]),
            scenario("c", &[], &["it passes"]),
            scenario("d", &[], &["it passes"]),
        ];
        let options = ExecutorOptions {
            setup_failure_threshold: 2,
            ..ExecutorOptions::default()
        };
        let outcomes = SuiteExecutor::new(options)
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(
            statuses(&outcomes),
            vec![
                OutcomeStatus::Failed,
                OutcomeStatus::Passed,
                OutcomeStatus::Failed,
                OutcomeStatus::Passed
            ]
        );
    }

    #[tokio::test]
    async fn test_external_cancellation_skips_everything() {
        let env = Arc::new(MockEnvironment::new());
        let scenarios = vec![
            scenario("a", &[], &["it passes"]),
            scenario("b", &[], &["it passes"]),
        ];
        let token = CancellationToken::new();
        token.cancel();
        let outcomes = SuiteExecutor::new(sequential())
            .with_cancellation(token)
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(statuses(&outcomes), vec![OutcomeStatus::Skipped; 2]);
        assert_eq!(MockEnvironment::count(&env.setups), 0);
        assert_eq!(MockEnvironment::count(&env.stops), 1);
    }
}

#[cfg(test)]
mod parallel_tests {
    use super::*;

    fn parallel(jobs: usize) -> ExecutorOptions {
        ExecutorOptions {
            concurrency: jobs,
            ..ExecutorOptions::default()
        }
    }

    #[tokio::test]
    async fn test_shared_resources_never_overlap() {
        let env = Arc::new(MockEnvironment::new());
        let scenarios = vec![
            scenario("db-1", &["resource:db"], &["it sleeps 50"]),
            scenario("db-2", &["resource:db"], &["it sleeps 50"]),
            scenario("kafka-1", &["resource:kafka"], &["it sleeps 50"]),
            scenario("both", &["resource:db", "resource:kafka"], &["it sleeps 50"]),
            scenario("free", &[], &["it sleeps 50"]),
        ];
        let outcomes = SuiteExecutor::new(parallel(4))
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(statuses(&outcomes), vec![OutcomeStatus::Passed; 5]);
        assert_eq!(MockEnvironment::count(&env.resource_conflicts), 0);
        assert_eq!(MockEnvironment::count(&env.teardowns), 5);
    }

    #[tokio::test]
    async fn test_independent_scenarios_run_concurrently() {
        let env = Arc::new(MockEnvironment::new());
        let scenarios: Vec<_> = (0..4)
            .map(|i| scenario(&format!("s{i}"), &[], &["it sleeps 100"]))
            .collect();
        let outcomes = SuiteExecutor::new(parallel(4))
            .run(&scenarios, Arc::clone(&env))
            .await;

        assert_eq!(statuses(&outcomes), vec![OutcomeStatus::Passed; 4]);
        assert!(MockEnvironment::count(&env.max_in_flight) > 1);
        assert!(MockEnvironment::count(&env.max_in_flight) <= 4);
    }

    #[tokio::test]
    async fn test_outcomes_follow_selection_order() {
        let env = Arc::new(MockEnvironment::new());
        let scenarios = vec![
            scenario("slow", &[], &["it sleeps 150"]),
            scenario("fast", &[], &["it passes"]),
            scenario("medium", &[], &["it sleeps 50"]),
        ];
        let outcomes = SuiteExecutor::new(parallel(3))
            .run(&scenarios, Arc::clone(&env))
            .await;

        let names: Vec<&str> = outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["slow", "fast", "medium"]);
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_respected() {
        let env = Arc::new(MockEnvironment::new());
        let scenarios: Vec<_> = (0..6)
            .map(|i| scenario(&format!("s{i}"), &[], &["it sleeps 30"]))
            .collect();
        SuiteExecutor::new(parallel(2))
            .run(&scenarios, Arc::clone(&env))
            .await;
        assert!(MockEnvironment::count(&env.max_in_flight) <= 2);
    }

    #[tokio::test]
    async fn test_run_plan_uses_the_planned_groups() {
        let catalog: Vec<_> = (0..4)
            .map(|i| scenario(&format!("s{i}"), &["perf"], &["it sleeps 50"]))
            .collect();
        let expression = TagExpression::parse("@perf").unwrap();

        // A sequential plan keeps one group even when the executor allows more.
        let plan = plan_execution(&catalog, expression.clone(), 1, "resource:").unwrap();
        assert_eq!(plan.groups.len(), 1);
        let env = Arc::new(MockEnvironment::new());
        let outcomes = SuiteExecutor::new(parallel(4))
            .run_plan(&plan, Arc::clone(&env))
            .await;
        assert_eq!(statuses(&outcomes), vec![OutcomeStatus::Passed; 4]);
        assert_eq!(MockEnvironment::count(&env.max_in_flight), 1);

        let plan = plan_execution(&catalog, expression, 4, "resource:").unwrap();
        assert_eq!(plan.groups.len(), 4);
        let env = Arc::new(MockEnvironment::new());
        SuiteExecutor::new(parallel(4))
            .run_plan(&plan, Arc::clone(&env))
            .await;
        assert!(MockEnvironment::count(&env.max_in_flight) > 1);
    }
}
