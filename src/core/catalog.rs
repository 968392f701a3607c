//! # Scenario Catalog Module / 场景目录模块
//!
//! Discovers scenarios from `.feature` files. Sources are visited in the order
//! given and directories are walked in file-name order, so repeated discovery
//! over unchanged inputs always yields the same sequence.
//!
//! 从 `.feature` 文件中发现场景。按给定顺序访问源，并按文件名顺序遍历目录，
//! 因此对未改变的输入重复发现总是产生相同的序列。
//!
//! ## Supported Gherkin subset / 支持的 Gherkin 子集
//!
//! `Feature:`, `Background:`, `Scenario:`/`Example:`, `@tag` lines, steps
//! (`Given`/`When`/`Then`/`And`/`But`/`*`), doc strings and data tables.
//! Malformed sources are reported as scenarios with an `Undefined` status
//! instead of aborting discovery.
//!
//! 支持 `Feature:`、`Background:`、`Scenario:`/`Example:`、`@tag` 行、步骤、
//! 文档字符串和数据表。格式错误的源会被报告为状态为 `Undefined` 的场景，
//! 而不是中止发现过程。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::core::models::{Location, Scenario, ScenarioStatus, Step, StepKeyword, TagSet};
use crate::core::tags::normalize_tag;

pub const FEATURE_EXTENSION: &str = "feature";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Two scenarios share the same name in the same feature file.
    /// 两个场景在同一个 feature 文件中同名。
    #[error("duplicate scenario '{name}' at {location}")]
    DuplicateScenario { name: String, location: Location },
    #[error("scenario source not found: {}", .0.display())]
    SourceNotFound(PathBuf),
}

/// Discovers every scenario under `sources`.
///
/// # Errors
/// - [`CatalogError::SourceNotFound`] if a configured source does not exist.
/// - [`CatalogError::DuplicateScenario`] if a (file, name) identity repeats,
///   including when overlapping sources reach the same file twice.
///
/// 发现 `sources` 下的所有场景。
pub fn discover(sources: &[PathBuf]) -> Result<Vec<Scenario>, CatalogError> {
    let mut scenarios = Vec::new();
    let mut seen: HashSet<(PathBuf, String)> = HashSet::new();

    for source in sources {
        if !source.exists() {
            return Err(CatalogError::SourceNotFound(source.clone()));
        }

        for file in feature_files(source) {
            let discovered = match file {
                Ok(path) => match fs::read_to_string(&path) {
                    Ok(content) => parse_feature(&path, &content),
                    Err(e) => vec![unreadable(&path, &e.to_string())],
                },
                Err((path, message)) => vec![unreadable(&path, &message)],
            };

            for scenario in discovered {
                let identity_path = fs::canonicalize(&scenario.location.path)
                    .unwrap_or_else(|_| scenario.location.path.clone());
                if !seen.insert((identity_path, scenario.name.clone())) {
                    return Err(CatalogError::DuplicateScenario {
                        name: scenario.name,
                        location: scenario.location,
                    });
                }
                scenarios.push(scenario);
            }
        }
    }

    Ok(scenarios)
}

fn unreadable(path: &Path, message: &str) -> Scenario {
    Scenario::malformed(
        file_label(path),
        Location::new(path, 0),
        format!("cannot read feature file: {message}"),
    )
}

fn file_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Lists feature files under a source in a stable order.
fn feature_files(source: &Path) -> Vec<Result<PathBuf, (PathBuf, String)>> {
    if source.is_file() {
        return vec![Ok(source.to_path_buf())];
    }

    WalkDir::new(source)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => {
                let is_feature = entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == FEATURE_EXTENSION);
                is_feature.then(|| Ok(entry.into_path()))
            }
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| source.to_path_buf());
                Some(Err((path, e.to_string())))
            }
        })
        .collect()
}

/// A scenario under construction.
struct Draft {
    name: String,
    line: usize,
    tags: TagSet,
    steps: Vec<Step>,
    problem: Option<String>,
}

struct DocString {
    delimiter: &'static str,
    indent: usize,
    start_line: usize,
    lines: Vec<String>,
}

#[derive(Default)]
struct FeatureParser {
    feature: Option<String>,
    feature_tags: TagSet,
    pending_tags: TagSet,
    background: Option<Vec<Step>>,
    in_background: bool,
    current: Option<Draft>,
    doc: Option<DocString>,
    scenarios: Vec<Scenario>,
}

/// A problem that invalidates the whole file.
struct FileProblem {
    line: usize,
    reason: String,
}

/// Parses one feature file's content into scenarios.
///
/// Problems local to a scenario mark only that scenario `Undefined`; problems
/// that make the file unusable yield a single `Undefined` placeholder.
///
/// 将一个 feature 文件的内容解析为场景。
/// 局部于某个场景的问题只会把该场景标记为 `Undefined`；
/// 使整个文件不可用的问题会产生单个 `Undefined` 占位场景。
pub fn parse_feature(path: &Path, content: &str) -> Vec<Scenario> {
    let mut parser = FeatureParser::default();
    match parser.run(path, content) {
        Ok(()) => parser.scenarios,
        Err(problem) => {
            let name = parser.feature.clone().unwrap_or_else(|| file_label(path));
            let mut scenario =
                Scenario::malformed(name, Location::new(path, problem.line), problem.reason);
            scenario.tags = parser.feature_tags.clone();
            scenario.feature = parser.feature.unwrap_or_default();
            vec![scenario]
        }
    }
}

fn keyword_rest<'a>(line: &'a str, keywords: &[&str]) -> Option<&'a str> {
    keywords
        .iter()
        .find_map(|kw| line.strip_prefix(*kw))
        .map(str::trim)
}

fn parse_table_row(line: &str) -> Vec<String> {
    let inner = line.trim().trim_start_matches('|').trim_end_matches('|');
    inner.split('|').map(|cell| cell.trim().to_string()).collect()
}

impl FeatureParser {
    fn run(&mut self, path: &Path, content: &str) -> Result<(), FileProblem> {
        for (index, raw) in content.lines().enumerate() {
            let line_no = index + 1;
            if self.doc.is_some() {
                self.doc_line(raw);
                continue;
            }

            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('@') {
                for token in line.split_whitespace() {
                    if token.starts_with('#') {
                        break;
                    }
                    self.pending_tags.insert(normalize_tag(token).to_string());
                }
                continue;
            }

            if let Some(name) = keyword_rest(line, &["Feature:"]) {
                if self.feature.is_some() {
                    return Err(FileProblem {
                        line: line_no,
                        reason: "a feature file may contain only one 'Feature:'".to_string(),
                    });
                }
                self.feature = Some(name.to_string());
                self.feature_tags = std::mem::take(&mut self.pending_tags);
                continue;
            }

            if self.feature.is_none() {
                return Err(FileProblem {
                    line: line_no,
                    reason: format!("expected 'Feature:', found '{line}'"),
                });
            }

            if keyword_rest(line, &["Rule:"]).is_some() {
                return Err(FileProblem {
                    line: line_no,
                    reason: "'Rule:' blocks are not supported".to_string(),
                });
            }

            if keyword_rest(line, &["Background:"]).is_some() {
                self.finish_scenario(path);
                self.pending_tags.clear();
                self.background = Some(Vec::new());
                self.in_background = true;
                continue;
            }

            if let Some(name) = keyword_rest(line, &["Scenario Outline:", "Scenario Template:"]) {
                self.start_scenario(path, name, line_no);
                if let Some(draft) = self.current.as_mut() {
                    draft.problem = Some("scenario outlines are not supported".to_string());
                }
                continue;
            }

            if let Some(name) = keyword_rest(line, &["Scenario:", "Example:"]) {
                self.start_scenario(path, name, line_no);
                continue;
            }

            if keyword_rest(line, &["Examples:", "Scenarios:"]).is_some() {
                self.mark_problem(line_no, "'Examples:' outside of a scenario outline")?;
                continue;
            }

            if let Some((keyword, text)) = StepKeyword::split_line(line) {
                let step = Step::new(keyword, text, line_no);
                match self.current.as_mut() {
                    Some(draft) => draft.steps.push(step),
                    None if self.in_background => {
                        self.background.get_or_insert_with(Vec::new).push(step);
                    }
                    None => {
                        return Err(FileProblem {
                            line: line_no,
                            reason: format!("step outside of a scenario: '{line}'"),
                        });
                    }
                }
                continue;
            }

            if line.starts_with("\"\"\"") || line.starts_with("```") {
                let delimiter = if line.starts_with("\"\"\"") { "\"\"\"" } else { "```" };
                if self.last_step_mut().is_none() {
                    self.mark_problem(line_no, "doc string without a preceding step")?;
                }
                self.doc = Some(DocString {
                    delimiter,
                    indent: raw.len() - raw.trim_start().len(),
                    start_line: line_no,
                    lines: Vec::new(),
                });
                continue;
            }

            if line.starts_with('|') {
                let row = parse_table_row(line);
                match self.last_step_mut() {
                    Some(step) => step.table.push(row),
                    None => self.mark_problem(line_no, "table row without a preceding step")?,
                }
                continue;
            }

            // Free text: allowed as a description before the first step.
            let has_steps = match self.current.as_ref() {
                Some(draft) => !draft.steps.is_empty(),
                None if self.in_background => {
                    self.background.as_ref().is_some_and(|steps| !steps.is_empty())
                }
                None => false,
            };
            if has_steps {
                self.mark_problem(line_no, &format!("unrecognised line: '{line}'"))?;
            }
        }

        if let Some(doc) = self.doc.take() {
            self.mark_problem(
                doc.start_line,
                &format!("unterminated doc string opened at line {}", doc.start_line),
            )?;
        }

        if self.feature.is_none() {
            return Err(FileProblem {
                line: 1,
                reason: "missing 'Feature:'".to_string(),
            });
        }

        self.finish_scenario(path);
        Ok(())
    }

    fn doc_line(&mut self, raw: &str) {
        let Some(doc) = self.doc.as_mut() else {
            return;
        };
        if raw.trim().starts_with(doc.delimiter) {
            let text = doc.lines.join("\n");
            self.doc = None;
            if let Some(step) = self.last_step_mut() {
                step.doc_string = Some(text);
            }
            return;
        }
        let strip: usize = raw
            .chars()
            .take(doc.indent)
            .take_while(|c| c.is_whitespace())
            .map(char::len_utf8)
            .sum();
        doc.lines.push(raw[strip..].to_string());
    }

    fn last_step_mut(&mut self) -> Option<&mut Step> {
        match self.current.as_mut() {
            Some(draft) => draft.steps.last_mut(),
            None if self.in_background => self.background.as_mut().and_then(|s| s.last_mut()),
            None => None,
        }
    }

    /// Marks the scenario being parsed as malformed, or fails the whole file
    /// when the problem is outside any scenario.
    fn mark_problem(&mut self, line: usize, reason: &str) -> Result<(), FileProblem> {
        match self.current.as_mut() {
            Some(draft) => {
                if draft.problem.is_none() {
                    draft.problem = Some(format!("line {line}: {reason}"));
                }
                Ok(())
            }
            None => Err(FileProblem {
                line,
                reason: reason.to_string(),
            }),
        }
    }

    fn start_scenario(&mut self, path: &Path, name: &str, line: usize) {
        self.finish_scenario(path);
        self.in_background = false;
        let mut tags = self.feature_tags.clone();
        tags.extend(std::mem::take(&mut self.pending_tags));
        self.current = Some(Draft {
            name: name.to_string(),
            line,
            tags,
            steps: Vec::new(),
            problem: None,
        });
    }

    fn finish_scenario(&mut self, path: &Path) {
        let Some(draft) = self.current.take() else {
            return;
        };
        let mut steps = self.background.clone().unwrap_or_default();
        steps.extend(draft.steps);
        self.scenarios.push(Scenario {
            name: draft.name,
            feature: self.feature.clone().unwrap_or_default(),
            location: Location::new(path, draft.line),
            tags: draft.tags,
            steps,
            status: match draft.problem {
                Some(reason) => ScenarioStatus::Undefined { reason },
                None => ScenarioStatus::Ready,
            },
        });
    }
}
