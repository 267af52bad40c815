//! Structural queries answered by Neo4j.
//!
//! Works against a graph loaded from an export script. Set operations (call
//! grouping, two-hop expansion) happen here so results match the in-memory
//! backend; Neo4j supplies adjacency, class facts and shortest paths.

pub mod cypher;

use async_trait::async_trait;
use neo4rs::{Query, Row};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use callscope_core::graph::model::{CallType, Layer};
use callscope_core::query::model::{
    BlastRadius, CallPathChain, CallSite, ClassArchitecture, MethodCalls, MethodKey, PathStep,
};
use callscope_core::query::{GraphQueryService, MAX_PATH_HOPS};
use callscope_core::CoreResult;

use crate::error::{GraphError, GraphResult};
use crate::GraphClient;

const MAX_ANCESTORS: usize = 16;

#[derive(Clone, Copy)]
enum Direction {
    Incoming,
    Outgoing,
}

/// Class-side facts about one method.
struct Described {
    key: MethodKey,
    class_id: String,
    layer: Layer,
}

fn field<T: DeserializeOwned>(row: &Row, name: &str) -> GraphResult<T> {
    row.get(name).map_err(|e| GraphError::field(name, e))
}

/// Query Service over a Neo4j database.
#[derive(Clone)]
pub struct Neo4jQueryService {
    client: GraphClient,
    max_hops: usize,
}

impl Neo4jQueryService {
    pub fn new(client: GraphClient) -> Self {
        Self {
            client,
            max_hops: MAX_PATH_HOPS,
        }
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    async fn method_ids(&self, class_name: &str, method_name: &str) -> GraphResult<Vec<String>> {
        let query = Query::new(cypher::RESOLVE_METHODS.to_string())
            .param("class", class_name)
            .param("method", method_name);
        self.client
            .query(query)
            .await?
            .iter()
            .map(|row| field(row, "id"))
            .collect()
    }

    async fn call_pairs(
        &self,
        ids: &[String],
        direction: Direction,
    ) -> GraphResult<Vec<(String, String)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let text = match direction {
            Direction::Incoming => cypher::INCOMING_CALLS,
            Direction::Outgoing => cypher::OUTGOING_CALLS,
        };
        let query = Query::new(text.to_string()).param("ids", ids.to_vec());
        self.client
            .query(query)
            .await?
            .iter()
            .map(|row| -> GraphResult<(String, String)> {
                Ok((field(row, "fromId")?, field(row, "toId")?))
            })
            .collect()
    }

    async fn describe(&self, ids: &[String]) -> GraphResult<HashMap<String, Described>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = Query::new(cypher::DESCRIBE_METHODS.to_string()).param("ids", ids.to_vec());
        let mut described = HashMap::new();
        for row in self.client.query(query).await? {
            let id: String = field(&row, "id")?;
            let layer: Option<String> = field(&row, "layer")?;
            let class_name: String = field(&row, "className")?;
            let method_name: String = field(&row, "method")?;
            described.insert(
                id,
                Described {
                    key: MethodKey::new(class_name, method_name),
                    class_id: field(&row, "classId")?,
                    layer: layer.as_deref().map(Layer::from_str).unwrap_or(Layer::Unknown),
                },
            );
        }
        Ok(described)
    }

    /// Methods one hop away from any of `from`, excluding `exclude`.
    async fn neighbors(
        &self,
        from: &BTreeSet<String>,
        direction: Direction,
        exclude: &[&BTreeSet<String>],
    ) -> GraphResult<BTreeSet<String>> {
        let ids: Vec<String> = from.iter().cloned().collect();
        let pairs = self.call_pairs(&ids, direction).await?;
        Ok(pairs
            .into_iter()
            .map(|(from_id, to_id)| match direction {
                Direction::Incoming => from_id,
                Direction::Outgoing => to_id,
            })
            .filter(|id| !exclude.iter().any(|set| set.contains(id)))
            .collect())
    }

    async fn collect_calls(
        &self,
        class_name: &str,
        method_name: &str,
        direction: Direction,
    ) -> GraphResult<MethodCalls> {
        let ids = self.method_ids(class_name, method_name).await?;
        let pairs = self.call_pairs(&ids, direction).await?;

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for (from_id, to_id) in pairs {
            let other = match direction {
                Direction::Incoming => from_id,
                Direction::Outgoing => to_id,
            };
            *counts.entry(other).or_default() += 1;
        }

        let others: Vec<String> = counts.keys().cloned().collect();
        let described = self.describe(&others).await?;

        let mut grouped: BTreeMap<MethodKey, (Layer, usize)> = BTreeMap::new();
        for (id, count) in counts {
            if let Some(d) = described.get(&id) {
                grouped.entry(d.key.clone()).or_insert((d.layer, 0)).1 += count;
            }
        }

        let sites = grouped
            .into_iter()
            .map(|(key, (layer, call_count))| CallSite {
                class_name: key.class_name,
                method_name: key.method_name,
                layer,
                call_count,
            })
            .collect();
        Ok(MethodCalls::from_sites(sites))
    }

    pub async fn callers(&self, class_name: &str, method_name: &str) -> GraphResult<MethodCalls> {
        self.collect_calls(class_name, method_name, Direction::Incoming).await
    }

    pub async fn callees(&self, class_name: &str, method_name: &str) -> GraphResult<MethodCalls> {
        self.collect_calls(class_name, method_name, Direction::Outgoing).await
    }

    pub async fn architecture(&self, class_name: &str) -> GraphResult<ClassArchitecture> {
        let query = Query::new(cypher::CLASS_INFO.to_string()).param("class", class_name);
        let Some(row) = self.client.query(query).await?.into_iter().next() else {
            return Ok(ClassArchitecture::missing(class_name));
        };

        let id: String = field(&row, "id")?;
        let name: String = field(&row, "name")?;
        let layer: Option<String> = field(&row, "layer")?;
        let interfaces: Option<Vec<String>> = field(&row, "interfaces")?;
        let is_abstract: Option<bool> = field(&row, "isAbstract")?;
        let is_interface: Option<bool> = field(&row, "isInterface")?;

        let ancestors = Query::new(cypher::ANCESTORS.to_string()).param("id", id.as_str());
        let raw_parents: Vec<String> = self
            .client
            .query_scalar(ancestors, "parents")
            .await?
            .unwrap_or_default();
        let mut parent_types: Vec<String> = Vec::new();
        for parent in raw_parents {
            if parent_types.len() >= MAX_ANCESTORS
                || parent_types.contains(&parent)
                || parent == name
            {
                break;
            }
            parent_types.push(parent);
        }

        let deps = Query::new(cypher::DEPENDENCIES.to_string()).param("id", id.as_str());
        let dependencies: Vec<String> = self
            .client
            .query_scalar(deps, "dependencies")
            .await?
            .unwrap_or_default();

        Ok(ClassArchitecture {
            found: true,
            class_name: name,
            layer: layer.as_deref().map(Layer::from_str).unwrap_or(Layer::Unknown),
            parent_types,
            interfaces: interfaces.unwrap_or_default(),
            dependencies: dependencies.into_iter().collect(),
            is_abstract: is_abstract.unwrap_or(false),
            is_interface: is_interface.unwrap_or(false),
        })
    }

    async fn chain_from_ids(
        &self,
        ids: &[String],
        edge_types: Vec<CallType>,
    ) -> GraphResult<CallPathChain> {
        let described = self.describe(ids).await?;
        let mut steps = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(d) = described.get(id) else {
                return Ok(CallPathChain::not_found());
            };
            steps.push(PathStep {
                class_name: d.key.class_name.clone(),
                method_name: d.key.method_name.clone(),
                layer: d.layer,
            });
        }
        Ok(CallPathChain::from_steps(steps, edge_types))
    }

    pub async fn call_path_chain(
        &self,
        source_class: &str,
        source_method: &str,
        target_class: &str,
        target_method: &str,
    ) -> GraphResult<CallPathChain> {
        let sources = self.method_ids(source_class, source_method).await?;
        let targets = self.method_ids(target_class, target_method).await?;
        if sources.is_empty() || targets.is_empty() {
            return Ok(CallPathChain::not_found());
        }
        if let Some(shared) = sources.iter().find(|id| targets.contains(id)) {
            return self.chain_from_ids(std::slice::from_ref(shared), Vec::new()).await;
        }

        let query = Query::new(cypher::SHORTEST_CHAIN.to_string())
            .param("sources", sources)
            .param("targets", targets);
        let Some(row) = self.client.query(query).await?.into_iter().next() else {
            return Ok(CallPathChain::not_found());
        };
        let ids: Vec<String> = field(&row, "ids")?;
        let rel_types: Vec<String> = field(&row, "relTypes")?;
        let call_types: Vec<String> = field(&row, "callTypes")?;

        // An interface method followed by IMPLEMENTED_BY is dispatch, not a hop.
        let step_ids: Vec<String> = ids
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                *i == 0 || rel_types.get(*i).map(String::as_str) != Some("IMPLEMENTED_BY")
            })
            .map(|(_, id)| id.clone())
            .collect();
        let edge_types: Vec<CallType> = rel_types
            .iter()
            .zip(&call_types)
            .filter(|(rel, _)| rel.as_str() == "CALLS")
            .map(|(_, call_type)| CallType::from_str(call_type))
            .collect();

        if step_ids.len().saturating_sub(1) > self.max_hops {
            debug!(
                hops = step_ids.len() - 1,
                max = self.max_hops,
                "Shortest chain exceeds hop bound"
            );
            return Ok(CallPathChain::not_found());
        }
        self.chain_from_ids(&step_ids, edge_types).await
    }

    pub async fn blast_radius(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> GraphResult<BlastRadius> {
        let origin: BTreeSet<String> =
            self.method_ids(class_name, method_name).await?.into_iter().collect();
        if origin.is_empty() {
            return Ok(BlastRadius::default());
        }

        let direct_callers = self.neighbors(&origin, Direction::Incoming, &[&origin]).await?;
        let indirect_callers = self
            .neighbors(&direct_callers, Direction::Incoming, &[&origin, &direct_callers])
            .await?;
        let direct_callees = self.neighbors(&origin, Direction::Outgoing, &[&origin]).await?;
        let indirect_callees = self
            .neighbors(&direct_callees, Direction::Outgoing, &[&origin, &direct_callees])
            .await?;

        let all: Vec<String> = origin
            .iter()
            .chain(&direct_callers)
            .chain(&indirect_callers)
            .chain(&direct_callees)
            .chain(&indirect_callees)
            .cloned()
            .collect();
        let described = self.describe(&all).await?;

        let keys = |ids: &BTreeSet<String>| -> BTreeSet<MethodKey> {
            ids.iter().filter_map(|id| described.get(id)).map(|d| d.key.clone()).collect()
        };
        let layers_touched = described.values().map(|d| d.layer).collect();
        let classes: BTreeSet<&str> = described.values().map(|d| d.class_id.as_str()).collect();

        Ok(BlastRadius {
            direct_callers: keys(&direct_callers),
            direct_callees: keys(&direct_callees),
            indirect_callers: keys(&indirect_callers),
            indirect_callees: keys(&indirect_callees),
            layers_touched,
            total_classes: classes.len(),
        })
    }
}

#[async_trait]
impl GraphQueryService for Neo4jQueryService {
    fn backend(&self) -> &'static str {
        "neo4j"
    }

    async fn query_method_callers(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> CoreResult<MethodCalls> {
        Ok(self.callers(class_name, method_name).await?)
    }

    async fn query_method_callees(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> CoreResult<MethodCalls> {
        Ok(self.callees(class_name, method_name).await?)
    }

    async fn query_class_architecture(&self, class_name: &str) -> CoreResult<ClassArchitecture> {
        Ok(self.architecture(class_name).await?)
    }

    async fn query_call_path_chain(
        &self,
        source_class: &str,
        source_method: &str,
        target_class: &str,
        target_method: &str,
    ) -> CoreResult<CallPathChain> {
        Ok(self
            .call_path_chain(source_class, source_method, target_class, target_method)
            .await?)
    }

    async fn query_blast_radius(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> CoreResult<BlastRadius> {
        Ok(self.blast_radius(class_name, method_name).await?)
    }
}
