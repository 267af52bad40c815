//! Neo4j connection client.

use neo4rs::{ConfigBuilder, Graph, Query};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use callscope_core::graph::model::{EdgeKind, NodeKind};

use crate::error::{GraphError, GraphResult};

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "neo4j".to_string(),
            database: "neo4j".to_string(),
            max_connections: 4,
        }
    }
}

impl GraphConfig {
    /// Apply `NEO4J_URI`, `NEO4J_USER` and `NEO4J_PASSWORD` when set.
    pub fn with_env_overrides(mut self) -> Self {
        for (key, slot) in [
            ("NEO4J_URI", &mut self.uri),
            ("NEO4J_USER", &mut self.user),
            ("NEO4J_PASSWORD", &mut self.password),
        ] {
            if let Ok(value) = std::env::var(key) {
                if !value.is_empty() {
                    *slot = value;
                }
            }
        }
        self
    }
}

/// Client for Neo4j operations.
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect and ping.
    ///
    /// `Graph::connect` only builds the pool, so a `RETURN 1` forces the bolt
    /// handshake and an unreachable server fails here instead of on first use.
    pub async fn connect(config: &GraphConfig) -> GraphResult<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .db(config.database.as_str())
            .max_connections(config.max_connections)
            .fetch_size(200)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo4j_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        graph
            .run(Query::new("RETURN 1".to_string()))
            .await
            .map_err(|e| {
                GraphError::Connection(format!("{} is not responding: {}", config.uri, e))
            })?;

        Ok(Self { graph })
    }

    /// Execute a Cypher statement that returns no results.
    pub async fn execute(&self, query: Query) -> GraphResult<()> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Execute raw Cypher text.
    pub async fn execute_raw(&self, statement: &str) -> GraphResult<()> {
        self.execute(Query::new(statement.to_string())).await
    }

    /// Execute a Cypher query and collect its rows.
    pub async fn query(&self, query: Query) -> GraphResult<Vec<neo4rs::Row>> {
        let mut result = self.graph.execute(query).await?;

        let mut rows = Vec::new();
        while let Some(row) = result.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a Cypher query and read one field of the first row.
    pub async fn query_scalar<T: DeserializeOwned>(
        &self,
        query: Query,
        field: &str,
    ) -> GraphResult<Option<T>> {
        let rows = self.query(query).await?;
        match rows.into_iter().next() {
            Some(row) => {
                let value: T = row.get(field).map_err(|e| GraphError::field(field, e))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Node and relationship counts for status display.
    pub async fn get_counts(&self) -> GraphResult<GraphCounts> {
        let count = |cypher: String| Query::new(cypher);
        let nodes_of =
            |kind: NodeKind| format!("MATCH (n:{}) RETURN count(n) AS count", kind.label());

        let classes: i64 = self
            .query_scalar(count(nodes_of(NodeKind::Class)), "count")
            .await?
            .unwrap_or(0);
        let methods: i64 = self
            .query_scalar(count(nodes_of(NodeKind::Method)), "count")
            .await?
            .unwrap_or(0);
        let nodes: i64 = self
            .query_scalar(count("MATCH (n) RETURN count(n) AS count".to_string()), "count")
            .await?
            .unwrap_or(0);
        let calls: i64 = self
            .query_scalar(
                count(format!(
                    "MATCH ()-[r:{}]->() RETURN count(r) AS count",
                    EdgeKind::Calls.rel_type()
                )),
                "count",
            )
            .await?
            .unwrap_or(0);
        let relationships: i64 = self
            .query_scalar(count("MATCH ()-[r]->() RETURN count(r) AS count".to_string()), "count")
            .await?
            .unwrap_or(0);

        Ok(GraphCounts {
            nodes: nodes as usize,
            relationships: relationships as usize,
            classes: classes as usize,
            methods: methods as usize,
            calls: calls as usize,
        })
    }
}

/// Node and relationship counts.
#[derive(Debug, Clone, Default)]
pub struct GraphCounts {
    pub nodes: usize,
    pub relationships: usize,
    pub classes: usize,
    pub methods: usize,
    pub calls: usize,
}
