//! # Catalog Unit Tests / 场景目录单元测试
//!
//! Tests for feature-file parsing and scenario discovery.
//!
//! 测试 feature 文件解析和场景发现。

mod common;

use common::write_file;
use scenario_runner::core::catalog::{CatalogError, discover, parse_feature};
use scenario_runner::core::models::{ScenarioStatus, StepKeyword};
use std::path::Path;
use tempfile::tempdir;

const INGEST_FEATURE: &str = r#"# Performance of the ingestion path
@e2e-performance @docker-compose
Feature: Log ingestion
  Measures throughput of the agent running in docker compose.

  Background:
    Given the stack is running

  @resource:kafka
  Scenario: Ingest at full speed
    When 10000 lines are written
    Then the agent reports 10000 lines

  @ebpf @timeout:30
  Example: Ingest through ebpf
    * the ebpf program is loaded
"#;

#[cfg(test)]
mod parse_feature_tests {
    use super::*;

    #[test]
    fn test_scenarios_inherit_feature_tags() {
        let scenarios = parse_feature(Path::new("ingest.feature"), INGEST_FEATURE);
        assert_eq!(scenarios.len(), 2);

        let first = &scenarios[0];
        assert_eq!(first.name, "Ingest at full speed");
        assert_eq!(first.feature, "Log ingestion");
        assert!(first.has_tag("e2e-performance"));
        assert!(first.has_tag("@docker-compose"));
        assert!(first.has_tag("resource:kafka"));
        assert!(!first.has_tag("ebpf"));

        let second = &scenarios[1];
        assert!(second.has_tag("ebpf"));
        assert!(!second.has_tag("resource:kafka"));
        assert_eq!(second.timeout_override().map(|d| d.as_secs()), Some(30));
    }

    #[test]
    fn test_background_steps_are_prepended() {
        let scenarios = parse_feature(Path::new("ingest.feature"), INGEST_FEATURE);
        let texts: Vec<&str> = scenarios[0].steps.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "the stack is running",
                "10000 lines are written",
                "the agent reports 10000 lines"
            ]
        );
        assert_eq!(scenarios[1].steps[0].text, "the stack is running");
        assert_eq!(scenarios[1].steps[1].keyword, StepKeyword::Star);
    }

    #[test]
    fn test_locations_point_at_scenario_lines() {
        let scenarios = parse_feature(Path::new("ingest.feature"), INGEST_FEATURE);
        assert_eq!(scenarios[0].location.line, 10);
        assert_eq!(scenarios[1].location.line, 15);
        assert_eq!(scenarios[0].location.to_string(), "ingest.feature:10");
        assert_eq!(scenarios[0].steps[1].line, 11);
    }

    #[test]
    fn test_doc_strings_and_tables() {
        let content = r#"Feature: Config
  Scenario: Write a config
    Given a file "agent.yaml" with
      """
      sources:
        - journald
      """
    And the following limits
      | name   | value |
      | cpu    | 2     |
"#;
        let scenarios = parse_feature(Path::new("config.feature"), content);
        assert_eq!(scenarios.len(), 1);
        assert!(scenarios[0].is_ready());
        let steps = &scenarios[0].steps;
        assert_eq!(
            steps[0].doc_string.as_deref(),
            Some("sources:\n  - journald")
        );
        assert_eq!(
            steps[1].table,
            vec![
                vec!["name".to_string(), "value".to_string()],
                vec!["cpu".to_string(), "2".to_string()],
            ]
        );
    }

    #[test]
    fn test_missing_feature_yields_single_undefined_placeholder() {
        let scenarios = parse_feature(Path::new("broken.feature"), "Scenario: orphan\n  Given x\n");
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].name, "broken");
        assert!(matches!(scenarios[0].status, ScenarioStatus::Undefined { .. }));
    }

    #[test]
    fn test_scenario_outline_is_undefined_but_siblings_are_ready() {
        let content = r#"@perf
Feature: Mixed
  Scenario Outline: Parametrised
    Given <count> lines

    Examples:
      | count |
      | 1     |

  Scenario: Plain
    Given 1 lines
"#;
        let scenarios = parse_feature(Path::new("mixed.feature"), content);
        assert_eq!(scenarios.len(), 2);
        assert!(matches!(scenarios[0].status, ScenarioStatus::Undefined { .. }));
        assert!(scenarios[0].has_tag("perf"));
        assert!(scenarios[1].is_ready());
    }

    #[test]
    fn test_unterminated_doc_string_marks_scenario() {
        let content = "Feature: F\n  Scenario: S\n    Given text\n      \"\"\"\n      never closed\n";
        let scenarios = parse_feature(Path::new("f.feature"), content);
        assert_eq!(scenarios.len(), 1);
        match &scenarios[0].status {
            ScenarioStatus::Undefined { reason } => assert!(reason.contains("unterminated")),
            other => panic!("expected undefined, got {other:?}"),
        }
    }

    #[test]
    fn test_rule_blocks_are_rejected() {
        let content = "Feature: F\n  Rule: R\n    Scenario: S\n      Given x\n";
        let scenarios = parse_feature(Path::new("rule.feature"), content);
        assert_eq!(scenarios.len(), 1);
        assert_eq!(scenarios[0].name, "F");
        assert!(!scenarios[0].is_ready());
    }
}

#[cfg(test)]
mod discover_tests {
    use super::*;

    #[test]
    fn test_discovery_is_stable_and_sorted() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "b/second.feature", "Feature: B\n  Scenario: b1\n    Given x\n");
        write_file(dir.path(), "a/first.feature", "Feature: A\n  Scenario: a1\n    Given x\n  Scenario: a2\n    Given y\n");
        write_file(dir.path(), "a/notes.txt", "not a feature");

        let sources = vec![dir.path().to_path_buf()];
        let first = discover(&sources).unwrap();
        let names: Vec<&str> = first.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a1", "a2", "b1"]);

        let second = discover(&sources).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = discover(&[missing.clone()]).unwrap_err();
        assert_eq!(err, CatalogError::SourceNotFound(missing));
    }

    #[test]
    fn test_duplicate_names_in_one_file_are_rejected() {
        let dir = tempdir().unwrap();
        write_file(
            dir.path(),
            "dup.feature",
            "Feature: D\n  Scenario: same\n    Given x\n  Scenario: same\n    Given y\n",
        );
        let err = discover(&[dir.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateScenario { ref name, .. } if name == "same"));
    }

    #[test]
    fn test_same_name_in_different_files_is_allowed() {
        let dir = tempdir().unwrap();
        write_file(dir.path(), "one.feature", "Feature: One\n  Scenario: same\n    Given x\n");
        write_file(dir.path(), "two.feature", "Feature: Two\n  Scenario: same\n    Given x\n");
        let scenarios = discover(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(scenarios.len(), 2);
    }

    #[test]
    fn test_overlapping_sources_are_duplicates() {
        let dir = tempdir().unwrap();
        let file = write_file(dir.path(), "one.feature", "Feature: One\n  Scenario: s\n    Given x\n");
        let err = discover(&[dir.path().to_path_buf(), file]).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateScenario { .. }));
    }
}
