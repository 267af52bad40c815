//! # Callscope Graph
//!
//! Neo4j side of Callscope.
//!
//! Renders a [`KnowledgeGraph`](callscope_core::KnowledgeGraph) as a Cypher
//! load script, runs that script against a database, and answers the
//! structural queries with Cypher.

pub mod client;
pub mod error;
pub mod export;
pub mod load;
pub mod queries;
pub mod schema;

pub use client::{GraphClient, GraphConfig, GraphCounts};
pub use error::{GraphError, GraphResult};
pub use export::{CypherExporter, ExportScript};
pub use load::{load_script, LoadResult};
pub use queries::Neo4jQueryService;
