//! Errors raised by the graph store layer.

use callscope_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Neo4j connection failed: {0}")]
    Connection(String),

    #[error("Neo4j query failed: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Failed to read field '{field}': {message}")]
    Field { field: String, message: String },
}

pub type GraphResult<T> = Result<T, GraphError>;

impl GraphError {
    pub fn field(field: &str, message: impl std::fmt::Debug) -> Self {
        Self::Field {
            field: field.to_string(),
            message: format!("{:?}", message),
        }
    }
}

/// Store failures are backend failures to the query layer, so they are
/// eligible for retry.
impl From<GraphError> for CoreError {
    fn from(err: GraphError) -> Self {
        CoreError::backend(err.to_string())
    }
}
