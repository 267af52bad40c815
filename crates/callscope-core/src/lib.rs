//! Callscope Core Library
//!
//! Knowledge graph model, structural queries, call tree derivation and
//! intent/risk scoring of call paths.

pub mod config;
pub mod error;
pub mod graph;
pub mod query;
pub mod scoring;
pub mod tree;

pub use config::AnalysisConfig;
pub use error::{CoreError, CoreResult};
pub use graph::model::GraphFacts;
pub use graph::KnowledgeGraph;
pub use query::{GraphQueryService, InMemoryQueryService};
pub use scoring::{Analyzer, GitChangeContext, ScoredCallPath};
pub use tree::CallTreeBuilder;
