//! # Scenario Selection Planner Module / 场景选择计划模块
//!
//! This module turns a catalog of discovered scenarios into an execution plan:
//! it builds the run's tag predicate (including the environment-provided
//! narrowing tag), filters the catalog with it, and partitions the selection
//! into resource-disjoint groups for the parallel mode.
//!
//! 此模块将已发现场景的目录转换为执行计划：
//! 构建本次运行的标签谓词（包括由环境变量提供的收窄标签），用它过滤目录，
//! 并为并行模式将选择结果划分为资源互不相交的组。

use std::collections::HashMap;
use std::env;
use thiserror::Error;

use crate::core::models::Scenario;
use crate::core::tags::{SyntaxError, TagExpression, normalize_tag};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// The predicate matched no scenario. This is a configuration problem,
    /// never a successful run.
    /// 谓词没有匹配任何场景。这是配置问题，绝不是一次成功的运行。
    #[error("tag expression '{expression}' matched none of the {catalog_size} discovered scenarios")]
    EmptySelection {
        expression: String,
        catalog_size: usize,
    },
}

/// Builds the predicate for a run from a base expression and an optional
/// narrowing tag. Fragments are always combined with AND, so the narrowing tag
/// can only shrink the selection.
///
/// 根据基础表达式和可选的收窄标签构建本次运行的谓词。
/// 片段总是用 AND 组合，因此收窄标签只能缩小选择范围。
#[derive(Debug, Clone)]
pub struct TagFilter {
    base: TagExpression,
    narrowing: Option<String>,
}

impl TagFilter {
    pub fn new(base: &str) -> Result<Self, SyntaxError> {
        Ok(Self {
            base: TagExpression::parse(base)?,
            narrowing: None,
        })
    }

    /// Adds `&& @<tag>` when `tag` is non-empty after trimming.
    /// 当 `tag` 去除空白后非空时，追加 `&& @<tag>`。
    pub fn with_agent_tag(mut self, tag: Option<&str>) -> Self {
        self.narrowing = tag
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| normalize_tag(t).to_string());
        self
    }

    /// Reads the narrowing tag from the environment variable `var`.
    /// An unset or empty variable means no narrowing.
    ///
    /// 从环境变量 `var` 读取收窄标签。变量未设置或为空表示不收窄。
    pub fn from_env(self, var: &str) -> Self {
        if var.is_empty() {
            return self;
        }
        let value = env::var(var).ok();
        self.with_agent_tag(value.as_deref())
    }

    pub fn narrowing_tag(&self) -> Option<&str> {
        self.narrowing.as_deref()
    }

    /// The combined predicate.
    pub fn expression(&self) -> TagExpression {
        match &self.narrowing {
            Some(tag) => self.base.clone().and(TagExpression::Tag(tag.clone())),
            None => self.base.clone(),
        }
    }
}

/// Filters the catalog, preserving order. Nothing is duplicated or dropped
/// except by the predicate.
///
/// 过滤目录并保持顺序。除谓词结果外，不会重复或丢弃任何场景。
pub fn select(catalog: &[Scenario], predicate: &TagExpression) -> Vec<Scenario> {
    catalog
        .iter()
        .filter(|scenario| predicate.evaluate(&scenario.tags))
        .cloned()
        .collect()
}

/// Represents a complete execution plan for a suite run.
/// 表示一次套件运行的完整执行计划。
#[derive(Debug)]
pub struct ExecutionPlan {
    /// The selected scenarios, in catalog order.
    /// 选中的场景，按目录顺序排列。
    pub scenarios: Vec<Scenario>,
    /// The predicate used for the selection.
    pub expression: TagExpression,
    /// The number of catalog entries the predicate rejected.
    /// 被谓词拒绝的目录条目数量。
    pub filtered_count: usize,
    /// Resource-disjoint groups (indices into `scenarios`); one group when sequential.
    /// 资源互不相交的组（`scenarios` 的索引）；顺序执行时只有一个组。
    pub groups: Vec<Vec<usize>>,
}

/// Creates an execution plan. An empty selection is an error.
///
/// 创建执行计划。空选择是一个错误。
pub fn plan_execution(
    catalog: &[Scenario],
    expression: TagExpression,
    concurrency: usize,
    resource_prefix: &str,
) -> Result<ExecutionPlan, PlanError> {
    let scenarios = select(catalog, &expression);
    if scenarios.is_empty() {
        return Err(PlanError::EmptySelection {
            expression: expression.to_string(),
            catalog_size: catalog.len(),
        });
    }

    let groups = if concurrency > 1 {
        partition_groups(&scenarios, resource_prefix)
    } else {
        vec![(0..scenarios.len()).collect()]
    };

    Ok(ExecutionPlan {
        filtered_count: catalog.len() - scenarios.len(),
        scenarios,
        expression,
        groups,
    })
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Partitions scenarios into groups whose resource tags are disjoint.
///
/// Scenarios that share a resource tag, directly or through other scenarios,
/// end up in the same group. Scenarios without resource tags form their own
/// group. Groups are ordered by their first member and list members in
/// selection order, so the result only depends on the input.
///
/// 将场景划分为资源标签互不相交的组。
///
/// 直接或通过其他场景间接共享资源标签的场景会落在同一组中。没有资源标签的场景
/// 各自成组。组按其第一个成员排序，成员按选择顺序排列，因此结果只取决于输入。
pub fn partition_groups(scenarios: &[Scenario], resource_prefix: &str) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..scenarios.len()).collect();
    let mut owners: HashMap<&str, usize> = HashMap::new();

    for (i, scenario) in scenarios.iter().enumerate() {
        for resource in scenario.resource_tags(resource_prefix) {
            match owners.get(resource) {
                Some(&owner) => {
                    let a = find(&mut parent, i);
                    let b = find(&mut parent, owner);
                    if a != b {
                        // Keep the smaller index as root.
                        let (root, child) = if a < b { (a, b) } else { (b, a) };
                        parent[child] = root;
                    }
                }
                None => {
                    owners.insert(resource, i);
                }
            }
        }
    }

    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for i in 0..scenarios.len() {
        let root = find(&mut parent, i);
        let slot = *group_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(i);
    }
    groups
}
