//! Intent and risk scoring of call paths.
//!
//! Calculators are pure: they combine [`PathFacts`] gathered from a
//! [`GraphQueryService`] with a [`GitChangeContext`]. The [`Analyzer`] does
//! the gathering, with retry, and records which queries failed so a degraded
//! score is never mistaken for a complete one.

pub mod git;
pub mod intent;
pub mod risk;
mod tables;

use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::AnalysisConfig;
use crate::error::{CoreError, CoreResult};
use crate::graph::model::Layer;
use crate::graph::KnowledgeGraph;
use crate::query::model::{
    BlastRadius, CallPathChain, CallSite, ClassArchitecture, MethodCalls, MethodKey,
};
use crate::query::{with_retry, GraphQueryService, QueryKind, RetryPolicy};

pub use git::{ChangedFile, FileStatus, GitChangeContext};
pub use intent::IntentCalculator;
pub use risk::RiskCalculator;

const STRUCTURAL_WEIGHT: f64 = 0.8;
const GIT_WEIGHT: f64 = 0.2;

/// Ordered method chain, caller first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallPath {
    pub steps: Vec<MethodKey>,
}

impl CallPath {
    pub fn new(steps: Vec<MethodKey>) -> Self {
        Self { steps }
    }

    pub fn hops(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn first(&self) -> Option<&MethodKey> {
        self.steps.first()
    }

    pub fn last(&self) -> Option<&MethodKey> {
        self.steps.last()
    }
}

impl std::fmt::Display for CallPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self.steps.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", rendered.join(" -> "))
    }
}

/// Query results for one method on a path. `None` means the query failed.
#[derive(Debug, Clone, Default)]
pub struct MethodFacts {
    pub callers: Option<MethodCalls>,
    pub callees: Option<MethodCalls>,
    pub architecture: Option<ClassArchitecture>,
    pub blast_radius: Option<BlastRadius>,
}

/// Everything the calculators know about a path.
#[derive(Debug, Clone)]
pub struct PathFacts {
    pub path: CallPath,
    /// One entry per path step, in path order.
    pub methods: Vec<MethodFacts>,
    /// Chain from the first to the last step; `None` for single-step paths
    /// or when the query failed.
    pub chain: Option<CallPathChain>,
}

impl PathFacts {
    /// Union of all call sites, merged by class and method.
    fn merge_sites<'a>(sites: impl Iterator<Item = &'a MethodCalls>) -> Vec<CallSite> {
        let mut merged: BTreeMap<(String, String), CallSite> = BTreeMap::new();
        for site in sites.flat_map(|calls| calls.calls.iter()) {
            merged
                .entry((site.class_name.clone(), site.method_name.clone()))
                .and_modify(|s| s.call_count += site.call_count)
                .or_insert_with(|| site.clone());
        }
        merged.into_values().collect()
    }

    pub fn callers(&self) -> Vec<CallSite> {
        Self::merge_sites(self.methods.iter().filter_map(|m| m.callers.as_ref()))
    }

    pub fn callees(&self) -> Vec<CallSite> {
        Self::merge_sites(self.methods.iter().filter_map(|m| m.callees.as_ref()))
    }

    pub fn architectures(&self) -> impl Iterator<Item = &ClassArchitecture> {
        self.methods
            .iter()
            .filter_map(|m| m.architecture.as_ref())
            .filter(|a| a.found)
    }

    pub fn blast_radii(&self) -> impl Iterator<Item = &BlastRadius> {
        self.methods.iter().filter_map(|m| m.blast_radius.as_ref())
    }

    /// Layer of each step, when known, with the step's class name.
    ///
    /// Architecture results come first; a found chain fills the gaps.
    pub fn step_layers(&self) -> Vec<Option<(String, Layer)>> {
        self.path
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let from_arch = self
                    .methods
                    .get(i)
                    .and_then(|m| m.architecture.as_ref())
                    .filter(|a| a.found)
                    .map(|a| a.layer);
                let from_chain = self
                    .chain
                    .as_ref()
                    .filter(|c| c.found && c.steps.len() == self.path.steps.len())
                    .and_then(|c| c.steps.get(i))
                    .map(|s| s.layer);
                from_arch.or(from_chain).map(|layer| (step.class_name.clone(), layer))
            })
            .collect()
    }

    /// Known layers in path order.
    pub fn layers(&self) -> Vec<Layer> {
        self.step_layers().into_iter().flatten().map(|(_, layer)| layer).collect()
    }
}

/// A bounded score with every named sub-score that went into it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeightBreakdown {
    pub score: f64,
    pub structural: f64,
    pub git: f64,
    pub components: BTreeMap<String, f64>,
}

impl WeightBreakdown {
    pub fn new(structural: f64, git: f64, components: BTreeMap<String, f64>) -> Self {
        let raw = structural * STRUCTURAL_WEIGHT + git * GIT_WEIGHT;
        Self {
            score: round2(raw.clamp(0.0, 100.0)),
            structural,
            git,
            components,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Pure scoring function over gathered facts.
pub trait WeightCalculator: Send + Sync {
    fn name(&self) -> &'static str;

    fn calculate(&self, facts: &PathFacts, git: &GitChangeContext) -> WeightBreakdown;
}

/// A structural query that failed after retries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradedQuery {
    pub kind: QueryKind,
    pub method: MethodKey,
    pub error: String,
}

/// Scores for one call path.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCallPath {
    pub path: CallPath,
    pub intent: WeightBreakdown,
    pub risk: WeightBreakdown,
    pub degraded: Vec<DegradedQuery>,
}

impl ScoredCallPath {
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }
}

/// Gathers facts for call paths and scores them.
pub struct Analyzer {
    service: Arc<dyn GraphQueryService>,
    policy: RetryPolicy,
    deadline: Duration,
    intent: IntentCalculator,
    risk: RiskCalculator,
}

impl Analyzer {
    pub fn new(
        service: Arc<dyn GraphQueryService>,
        policy: RetryPolicy,
        deadline: Duration,
    ) -> Self {
        Self {
            service,
            policy,
            deadline,
            intent: IntentCalculator,
            risk: RiskCalculator,
        }
    }

    pub fn from_config(service: Arc<dyn GraphQueryService>, config: &AnalysisConfig) -> Self {
        Self::new(service, config.retry_policy(), config.run_deadline())
    }

    /// Run one query with retry; a final failure is recorded, not returned.
    async fn fetch<T, F, Fut>(
        &self,
        kind: QueryKind,
        method: &MethodKey,
        degraded: &mut Vec<DegradedQuery>,
        op: F,
    ) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = CoreResult<T>>,
    {
        match with_retry(&self.policy, kind.as_str(), op).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    query = kind.as_str(),
                    method = %method,
                    error = %e,
                    "Structural query failed, scoring degraded"
                );
                degraded.push(DegradedQuery {
                    kind,
                    method: method.clone(),
                    error: e.to_string(),
                });
                None
            }
        }
    }

    /// Query the graph for every step of a path.
    pub async fn collect_facts(&self, path: &CallPath) -> (PathFacts, Vec<DegradedQuery>) {
        let service = self.service.as_ref();
        let mut degraded = Vec::new();
        let mut architectures: BTreeMap<String, Option<ClassArchitecture>> = BTreeMap::new();
        let mut methods = Vec::with_capacity(path.steps.len());

        for step in &path.steps {
            let (class, method) = (step.class_name.as_str(), step.method_name.as_str());

            let callers = self
                .fetch(QueryKind::Callers, step, &mut degraded, move || {
                    service.query_method_callers(class, method)
                })
                .await;
            let callees = self
                .fetch(QueryKind::Callees, step, &mut degraded, move || {
                    service.query_method_callees(class, method)
                })
                .await;
            let blast_radius = self
                .fetch(QueryKind::BlastRadius, step, &mut degraded, move || {
                    service.query_blast_radius(class, method)
                })
                .await;

            let architecture = match architectures.get(class) {
                Some(cached) => cached.clone(),
                None => {
                    let fetched = self
                        .fetch(QueryKind::Architecture, step, &mut degraded, move || {
                            service.query_class_architecture(class)
                        })
                        .await;
                    architectures.insert(class.to_string(), fetched.clone());
                    fetched
                }
            };

            methods.push(MethodFacts {
                callers,
                callees,
                architecture,
                blast_radius,
            });
        }

        let chain = match (path.first(), path.last()) {
            (Some(first), Some(last)) if path.steps.len() > 1 => {
                self.fetch(QueryKind::CallPathChain, first, &mut degraded, move || {
                    service.query_call_path_chain(
                        &first.class_name,
                        &first.method_name,
                        &last.class_name,
                        &last.method_name,
                    )
                })
                .await
            }
            _ => None,
        };

        let facts = PathFacts {
            path: path.clone(),
            methods,
            chain,
        };
        (facts, degraded)
    }

    /// Score one path. Query failures lower the structural score and are
    /// listed in `degraded`.
    pub async fn score_path(&self, path: CallPath, git: &GitChangeContext) -> ScoredCallPath {
        let (facts, degraded) = self.collect_facts(&path).await;
        let intent = self.intent.calculate(&facts, git);
        let risk = self.risk.calculate(&facts, git);
        debug!(
            path = %path,
            intent = intent.score,
            risk = risk.score,
            degraded = degraded.len(),
            "Scored call path"
        );
        ScoredCallPath {
            path,
            intent,
            risk,
            degraded,
        }
    }

    /// Score paths concurrently under the run deadline. Results keep input
    /// order.
    pub async fn score_paths(
        &self,
        paths: Vec<CallPath>,
        git: &GitChangeContext,
    ) -> CoreResult<Vec<ScoredCallPath>> {
        let count = paths.len();
        let run_id = Uuid::new_v4();
        let work = join_all(paths.into_iter().map(|path| self.score_path(path, git)));
        let scored = tokio::time::timeout(self.deadline, work)
            .instrument(info_span!("score_run", %run_id))
            .await
            .map_err(|_| CoreError::DeadlineExceeded(self.deadline.as_secs()))?;

        let degraded = scored.iter().filter(|s| s.is_degraded()).count();
        info!(
            %run_id,
            paths = count,
            degraded,
            backend = self.service.backend(),
            "Scored call paths"
        );
        Ok(scored)
    }
}

/// Every core path of the graph as a call path, root first.
pub fn paths_from_core_paths(graph: &KnowledgeGraph) -> Vec<CallPath> {
    graph
        .core_paths()
        .iter()
        .filter_map(|core| {
            let steps: Option<Vec<MethodKey>> = core
                .method_ids
                .iter()
                .map(|id| {
                    let method = graph.method(id)?;
                    let class = graph.class(&method.class_id)?;
                    Some(MethodKey::new(&class.name, &method.name))
                })
                .collect();
            steps.map(CallPath::new)
        })
        .collect()
}
