//! Graph Query Service.
//!
//! Five bounded structural queries consumed by tree building and scoring.
//! Any backend implementing [`GraphQueryService`] is interchangeable: the
//! in-memory one here answers from a frozen [`KnowledgeGraph`], the Neo4j one
//! in `callscope-graph` answers with Cypher.
//!
//! [`KnowledgeGraph`]: crate::graph::KnowledgeGraph

pub mod memory;
pub mod model;
pub mod retry;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CoreResult;
use model::{BlastRadius, CallPathChain, ClassArchitecture, MethodCalls};

pub use memory::InMemoryQueryService;
pub use retry::{with_retry, RetryPolicy};

/// Hop bound for call path queries.
pub const MAX_PATH_HOPS: usize = 5;

/// The five structural queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Callers,
    Callees,
    Architecture,
    CallPathChain,
    BlastRadius,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Callers => "method_callers",
            Self::Callees => "method_callees",
            Self::Architecture => "class_architecture",
            Self::CallPathChain => "call_path_chain",
            Self::BlastRadius => "blast_radius",
        }
    }
}

/// Structural queries against a graph backend.
///
/// Classes are named by qualified or simple name; a method name covers all
/// of its overloads. Unknown classes or methods yield empty results, not
/// errors. Errors mean the backend itself failed.
#[async_trait]
pub trait GraphQueryService: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Direct callers of a method (one hop, in-edges).
    async fn query_method_callers(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> CoreResult<MethodCalls>;

    /// Direct callees of a method (one hop, out-edges).
    async fn query_method_callees(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> CoreResult<MethodCalls>;

    /// Layer, ancestry, interfaces and one-hop class dependencies.
    async fn query_class_architecture(&self, class_name: &str) -> CoreResult<ClassArchitecture>;

    /// Shortest call path, bounded to [`MAX_PATH_HOPS`].
    async fn query_call_path_chain(
        &self,
        source_class: &str,
        source_method: &str,
        target_class: &str,
        target_method: &str,
    ) -> CoreResult<CallPathChain>;

    /// Callers and callees within two hops.
    async fn query_blast_radius(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> CoreResult<BlastRadius>;
}
