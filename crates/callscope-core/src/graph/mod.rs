//! In-memory knowledge graph of one project's structural facts.
//!
//! Entities live in insertion-ordered vectors so that serialization is
//! deterministic; every collection also carries an id index, and call edges
//! are indexed by both endpoints. Upserts replace in place and keep the
//! original position.

pub mod model;
pub mod rules;
pub mod stats;

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use model::{
    CallEdge, CallTree, ClassBlock, CorePath, GraphFacts, InterfaceImplementationMapping,
    MethodNode, TreeNodeRelation,
};

pub use stats::GraphStatistics;

/// Outcome of ingesting a facts document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub classes: usize,
    pub methods: usize,
    pub edges: usize,
    pub implementations: usize,
    pub rejected: Vec<String>,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// A problem found by [`KnowledgeGraph::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub entity: &'static str,
    pub id: String,
    pub message: String,
}

/// Insert or replace `item` under `id`, returning the previous value.
fn upsert<T>(
    items: &mut Vec<T>,
    index: &mut HashMap<String, usize>,
    id: String,
    item: T,
) -> (usize, Option<T>) {
    match index.get(&id) {
        Some(&pos) => {
            let old = std::mem::replace(&mut items[pos], item);
            (pos, Some(old))
        }
        None => {
            let pos = items.len();
            items.push(item);
            index.insert(id, pos);
            (pos, None)
        }
    }
}

fn unlink(map: &mut HashMap<String, Vec<usize>>, key: &str, pos: usize) {
    if let Some(list) = map.get_mut(key) {
        list.retain(|&p| p != pos);
    }
}

/// The knowledge graph.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    project: String,

    classes: Vec<ClassBlock>,
    class_index: HashMap<String, usize>,
    class_names: HashMap<String, Vec<usize>>,

    methods: Vec<MethodNode>,
    method_index: HashMap<String, usize>,
    class_methods: HashMap<String, Vec<usize>>,

    edges: Vec<CallEdge>,
    edge_index: HashMap<String, usize>,
    outgoing: HashMap<String, Vec<usize>>,
    incoming: HashMap<String, Vec<usize>>,

    implementations: Vec<InterfaceImplementationMapping>,
    implementation_index: HashMap<String, usize>,
    implementations_by_interface: HashMap<String, Vec<usize>>,

    trees: Vec<CallTree>,
    tree_index: HashMap<String, usize>,
    tree_relations: Vec<TreeNodeRelation>,
    relation_index: HashMap<String, usize>,
    core_paths: Vec<CorePath>,
    core_path_index: HashMap<String, usize>,
}

impl KnowledgeGraph {
    /// Create an empty graph for a project.
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Default::default()
        }
    }

    /// Build a graph from a facts document.
    pub fn from_facts(facts: GraphFacts, strict: bool) -> CoreResult<(Self, IngestReport)> {
        let mut graph = Self::new(facts.project.clone());
        let report = graph.ingest(facts, strict)?;
        Ok((graph, report))
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.methods.is_empty() && self.edges.is_empty()
    }

    // ------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------

    /// Insert or replace a class.
    pub fn add_class(&mut self, mut class: ClassBlock) {
        class.normalize();
        let id = class.id.clone();
        let names = [class.name.clone(), class.simple_name.clone()];
        let (pos, old) = upsert(&mut self.classes, &mut self.class_index, id, class);

        if let Some(old) = old {
            unlink(&mut self.class_names, &old.name, pos);
            unlink(&mut self.class_names, &old.simple_name, pos);
        }
        for name in names {
            let list = self.class_names.entry(name).or_default();
            if !list.contains(&pos) {
                list.push(pos);
            }
        }
    }

    /// Insert or replace a method. The owning class must already exist.
    pub fn add_method(&mut self, method: MethodNode) -> CoreResult<()> {
        if !self.class_index.contains_key(&method.class_id) {
            let missing = format!("class {}", method.class_id);
            return Err(CoreError::dangling("method", &method.id, missing));
        }

        let id = method.id.clone();
        let class_id = method.class_id.clone();
        let (pos, old) = upsert(&mut self.methods, &mut self.method_index, id, method);

        if let Some(old) = old {
            unlink(&mut self.class_methods, &old.class_id, pos);
        }
        self.class_methods.entry(class_id).or_default().push(pos);
        Ok(())
    }

    /// Insert or replace a call edge. Both endpoints must already exist.
    ///
    /// The denormalized class ids are taken from the owning methods, and the
    /// confidence is clamped to `[0, 1]`.
    pub fn add_edge(&mut self, mut edge: CallEdge) -> CoreResult<()> {
        let from_class = self
            .method(&edge.from_method_id)
            .map(|m| m.class_id.clone())
            .ok_or_else(|| {
                CoreError::dangling("edge", &edge.id, format!("method {}", edge.from_method_id))
            })?;
        let to_class = self
            .method(&edge.to_method_id)
            .map(|m| m.class_id.clone())
            .ok_or_else(|| {
                CoreError::dangling("edge", &edge.id, format!("method {}", edge.to_method_id))
            })?;

        edge.from_class_id = from_class;
        edge.to_class_id = to_class;
        edge.confidence = if edge.confidence.is_nan() {
            0.0
        } else {
            edge.confidence.clamp(0.0, 1.0)
        };

        let id = edge.id.clone();
        let from = edge.from_method_id.clone();
        let to = edge.to_method_id.clone();
        let (pos, old) = upsert(&mut self.edges, &mut self.edge_index, id, edge);

        if let Some(old) = old {
            unlink(&mut self.outgoing, &old.from_method_id, pos);
            unlink(&mut self.incoming, &old.to_method_id, pos);
        }
        self.outgoing.entry(from).or_default().push(pos);
        self.incoming.entry(to).or_default().push(pos);
        Ok(())
    }

    /// Insert or replace an interface-to-implementation mapping.
    pub fn add_implementation(
        &mut self,
        mut mapping: InterfaceImplementationMapping,
    ) -> CoreResult<()> {
        let dangling = |method_id: &str| {
            CoreError::dangling("implementation", mapping.id(), format!("method {}", method_id))
        };
        let interface_class = self
            .method(&mapping.interface_method_id)
            .map(|m| m.class_id.clone())
            .ok_or_else(|| dangling(&mapping.interface_method_id))?;
        let impl_class = self
            .method(&mapping.implementation_method_id)
            .map(|m| m.class_id.clone())
            .ok_or_else(|| dangling(&mapping.implementation_method_id))?;
        mapping.interface_class_id = interface_class;
        mapping.implementation_class_id = impl_class;

        let interface_method = mapping.interface_method_id.clone();
        let id = mapping.id();
        let (pos, old) = upsert(
            &mut self.implementations,
            &mut self.implementation_index,
            id,
            mapping,
        );
        if old.is_none() {
            self.implementations_by_interface.entry(interface_method).or_default().push(pos);
        }
        Ok(())
    }

    /// Insert or replace a call tree.
    pub fn add_tree(&mut self, tree: CallTree) -> CoreResult<()> {
        if !self.method_index.contains_key(&tree.root_method_id) {
            let missing = format!("method {}", tree.root_method_id);
            return Err(CoreError::dangling("tree", &tree.id, missing));
        }
        let id = tree.id.clone();
        upsert(&mut self.trees, &mut self.tree_index, id, tree);
        Ok(())
    }

    /// Insert or replace a tree membership relation.
    pub fn add_tree_relation(&mut self, relation: TreeNodeRelation) -> CoreResult<()> {
        if !self.tree_index.contains_key(&relation.tree_id) {
            let missing = format!("tree {}", relation.tree_id);
            return Err(CoreError::dangling("tree relation", relation.id(), missing));
        }
        for method_id in [&relation.parent_method_id, &relation.child_method_id] {
            if !self.method_index.contains_key(method_id) {
                let missing = format!("method {}", method_id);
                return Err(CoreError::dangling("tree relation", relation.id(), missing));
            }
        }
        upsert(&mut self.tree_relations, &mut self.relation_index, relation.id(), relation);
        Ok(())
    }

    /// Insert or replace a core path.
    pub fn add_core_path(&mut self, path: CorePath) -> CoreResult<()> {
        if !self.tree_index.contains_key(&path.tree_id) {
            let missing = format!("tree {}", path.tree_id);
            return Err(CoreError::dangling("core path", &path.id, missing));
        }
        if let Some(missing) = path
            .method_ids
            .iter()
            .find(|id| !self.method_index.contains_key(*id))
        {
            return Err(CoreError::dangling("core path", &path.id, format!("method {}", missing)));
        }
        let id = path.id.clone();
        upsert(&mut self.core_paths, &mut self.core_path_index, id, path);
        Ok(())
    }

    /// Ingest a facts document in dependency order.
    ///
    /// Rejected facts are collected in the report; with `strict` the first
    /// rejection aborts ingestion instead.
    pub fn ingest(&mut self, facts: GraphFacts, strict: bool) -> CoreResult<IngestReport> {
        let mut report = IngestReport::default();
        if self.project.is_empty() {
            self.project = facts.project;
        }

        for class in facts.classes {
            self.add_class(class);
            report.classes += 1;
        }

        for method in facts.methods {
            match self.add_method(method) {
                Ok(()) => report.methods += 1,
                Err(e) => reject(&mut report, e, strict)?,
            }
        }

        for edge in facts.edges {
            match self.add_edge(edge) {
                Ok(()) => report.edges += 1,
                Err(e) => reject(&mut report, e, strict)?,
            }
        }

        for mapping in facts.implementations {
            match self.add_implementation(mapping) {
                Ok(()) => report.implementations += 1,
                Err(e) => reject(&mut report, e, strict)?,
            }
        }

        debug!(
            classes = report.classes,
            methods = report.methods,
            edges = report.edges,
            rejected = report.rejected.len(),
            "Ingested graph facts"
        );
        Ok(report)
    }

    /// Drop all derived tree data and reset membership annotations.
    pub fn clear_trees(&mut self) {
        self.trees.clear();
        self.tree_index.clear();
        self.tree_relations.clear();
        self.relation_index.clear();
        self.core_paths.clear();
        self.core_path_index.clear();

        for class in &mut self.classes {
            class.cross_count = 0;
            class.weight = 0.0;
        }
        for method in &mut self.methods {
            method.cross_count = 0;
            method.weight = 0.0;
            method.is_root_node = false;
            method.depth = -1;
            method.tree_ids.clear();
        }
        for edge in &mut self.edges {
            edge.cross_count = 0;
            edge.tree_ids.clear();
        }
    }

    pub fn class_mut(&mut self, id: &str) -> Option<&mut ClassBlock> {
        let pos = *self.class_index.get(id)?;
        self.classes.get_mut(pos)
    }

    pub fn method_mut(&mut self, id: &str) -> Option<&mut MethodNode> {
        let pos = *self.method_index.get(id)?;
        self.methods.get_mut(pos)
    }

    pub fn edge_mut(&mut self, id: &str) -> Option<&mut CallEdge> {
        let pos = *self.edge_index.get(id)?;
        self.edges.get_mut(pos)
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn class(&self, id: &str) -> Option<&ClassBlock> {
        self.class_index.get(id).map(|&pos| &self.classes[pos])
    }

    pub fn method(&self, id: &str) -> Option<&MethodNode> {
        self.method_index.get(id).map(|&pos| &self.methods[pos])
    }

    pub fn edge(&self, id: &str) -> Option<&CallEdge> {
        self.edge_index.get(id).map(|&pos| &self.edges[pos])
    }

    pub fn tree(&self, id: &str) -> Option<&CallTree> {
        self.tree_index.get(id).map(|&pos| &self.trees[pos])
    }

    pub fn core_path(&self, id: &str) -> Option<&CorePath> {
        self.core_path_index.get(id).map(|&pos| &self.core_paths[pos])
    }

    pub fn classes(&self) -> &[ClassBlock] {
        &self.classes
    }

    pub fn methods(&self) -> &[MethodNode] {
        &self.methods
    }

    pub fn edges(&self) -> &[CallEdge] {
        &self.edges
    }

    pub fn implementations(&self) -> &[InterfaceImplementationMapping] {
        &self.implementations
    }

    pub fn trees(&self) -> &[CallTree] {
        &self.trees
    }

    pub fn tree_relations(&self) -> &[TreeNodeRelation] {
        &self.tree_relations
    }

    pub fn core_paths(&self) -> &[CorePath] {
        &self.core_paths
    }

    /// Find a class by qualified name, falling back to the simple name.
    pub fn class_by_name(&self, name: &str) -> Option<&ClassBlock> {
        let candidates = self.class_names.get(name)?;
        candidates
            .iter()
            .map(|&pos| &self.classes[pos])
            .find(|c| c.name == name)
            .or_else(|| candidates.first().map(|&pos| &self.classes[pos]))
    }

    /// The class owning a method.
    pub fn class_of(&self, method_id: &str) -> Option<&ClassBlock> {
        self.method(method_id).and_then(|m| self.class(&m.class_id))
    }

    /// Methods declared by a class, in insertion order.
    pub fn methods_of_class<'a>(
        &'a self,
        class_id: &str,
    ) -> impl Iterator<Item = &'a MethodNode> + 'a {
        self.class_methods
            .get(class_id)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.methods[pos])
    }

    /// Methods named `method_name` on the class named `class_name` (all overloads).
    pub fn find_methods(&self, class_name: &str, method_name: &str) -> Vec<&MethodNode> {
        match self.class_by_name(class_name) {
            Some(class) => self
                .methods_of_class(&class.id)
                .filter(|m| m.name == method_name)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Call edges leaving a method.
    pub fn outgoing_edges<'a>(
        &'a self,
        method_id: &str,
    ) -> impl Iterator<Item = &'a CallEdge> + 'a {
        self.outgoing
            .get(method_id)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.edges[pos])
    }

    /// Call edges arriving at a method.
    pub fn incoming_edges<'a>(
        &'a self,
        method_id: &str,
    ) -> impl Iterator<Item = &'a CallEdge> + 'a {
        self.incoming
            .get(method_id)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.edges[pos])
    }

    /// Implementations registered for an interface method.
    pub fn implementations_of<'a>(
        &'a self,
        interface_method_id: &str,
    ) -> impl Iterator<Item = &'a InterfaceImplementationMapping> + 'a {
        self.implementations_by_interface
            .get(interface_method_id)
            .into_iter()
            .flatten()
            .map(move |&pos| &self.implementations[pos])
    }

    /// Methods a call may dispatch to: the declared target, plus its
    /// registered implementations when the target is an interface method or
    /// the call was resolved through an interface.
    pub fn dispatch_targets<'a>(&'a self, edge: &'a CallEdge) -> Vec<&'a str> {
        let mut targets = vec![edge.to_method_id.as_str()];
        let via_interface = edge.call_type == model::CallType::Interface
            || self.class(&edge.to_class_id).is_some_and(|c| c.is_interface);
        if via_interface {
            for mapping in self.implementations_of(&edge.to_method_id) {
                let id = mapping.implementation_method_id.as_str();
                if !targets.contains(&id) {
                    targets.push(id);
                }
            }
        }
        targets
    }

    /// Compute distribution counts and derived metrics.
    pub fn statistics(&self) -> GraphStatistics {
        GraphStatistics::compute(self)
    }

    /// Re-check every reference and the tree-membership invariant.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let mut issue = |entity: &'static str, id: &str, message: String| {
            issues.push(ValidationIssue {
                entity,
                id: id.to_string(),
                message,
            })
        };

        for method in &self.methods {
            if self.class(&method.class_id).is_none() {
                issue("method", &method.id, format!("missing class {}", method.class_id));
            }
            if (method.depth >= 0) == method.tree_ids.is_empty() {
                issue(
                    "method",
                    &method.id,
                    format!(
                        "depth {} inconsistent with {} tree(s)",
                        method.depth,
                        method.tree_ids.len()
                    ),
                );
            }
        }

        for edge in &self.edges {
            for endpoint in [&edge.from_method_id, &edge.to_method_id] {
                if self.method(endpoint).is_none() {
                    issue("edge", &edge.id, format!("missing method {}", endpoint));
                }
            }
            if !(0.0..=1.0).contains(&edge.confidence) {
                issue("edge", &edge.id, format!("confidence {} out of range", edge.confidence));
            }
        }

        for relation in &self.tree_relations {
            if self.tree(&relation.tree_id).is_none() {
                let message = format!("missing tree {}", relation.tree_id);
                issue("tree relation", &relation.id(), message);
            }
        }

        if !issues.is_empty() {
            warn!(issues = issues.len(), "Knowledge graph failed validation");
        }
        issues
    }

    /// Validate and turn any issue into an error.
    pub fn ensure_valid(&self) -> CoreResult<()> {
        match self.validate().len() {
            0 => Ok(()),
            n => Err(CoreError::InvalidGraph(n)),
        }
    }
}

fn reject(report: &mut IngestReport, error: CoreError, strict: bool) -> CoreResult<()> {
    warn!(error = %error, "Rejected graph fact");
    if strict {
        return Err(error);
    }
    report.rejected.push(error.to_string());
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::model::*;
    use super::KnowledgeGraph;

    /// OrderController.placeOrder -> OrderService.createOrder -> OrderRepository.save
    pub fn order_graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new("shop");
        graph.add_class(ClassBlock::new(
            "c-ctl",
            "com.shop.web.OrderController",
            Layer::Controller,
        ));
        graph.add_class(ClassBlock::new("c-svc", "com.shop.service.OrderService", Layer::Service));
        graph.add_class(ClassBlock::new(
            "c-repo",
            "com.shop.repo.OrderRepository",
            Layer::Repository,
        ));

        let place = MethodNode::new("m-place", "c-ctl", "placeOrder");
        let create = MethodNode::new("m-create", "c-svc", "createOrder");
        let save = MethodNode::new("m-save", "c-repo", "save");
        graph.add_method(place.clone()).unwrap();
        graph.add_method(create.clone()).unwrap();
        graph.add_method(save.clone()).unwrap();

        graph.add_edge(CallEdge::new(&place, &create)).unwrap();
        graph.add_edge(CallEdge::new(&create, &save)).unwrap();
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::order_graph;
    use super::model::*;
    use super::*;

    #[test]
    fn test_lookup_by_id_and_name() {
        let graph = order_graph();
        assert_eq!(graph.class("c-svc").unwrap().simple_name, "OrderService");
        assert_eq!(graph.class_by_name("OrderService").unwrap().id, "c-svc");
        assert_eq!(graph.class_by_name("com.shop.service.OrderService").unwrap().id, "c-svc");
        assert_eq!(graph.find_methods("OrderRepository", "save").len(), 1);
        assert!(graph.find_methods("Missing", "save").is_empty());
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut graph = order_graph();
        let mut replacement = MethodNode::new("m-create", "c-svc", "createOrder");
        replacement.return_type = "Order".to_string();
        graph.add_method(replacement).unwrap();

        assert_eq!(graph.methods().len(), 3);
        assert_eq!(graph.methods()[1].return_type, "Order");
        assert_eq!(graph.methods_of_class("c-svc").count(), 1);
    }

    #[test]
    fn test_edge_upsert_keeps_adjacency_consistent() {
        let mut graph = order_graph();
        let place = graph.method("m-place").unwrap().clone();
        let save = graph.method("m-save").unwrap().clone();

        // Same id, new target.
        let mut edge = CallEdge::new(&place, &save);
        edge.id = "m-place->m-create".to_string();
        graph.add_edge(edge).unwrap();

        assert_eq!(graph.edges().len(), 2);
        assert_eq!(graph.incoming_edges("m-create").count(), 0);
        assert_eq!(graph.incoming_edges("m-save").count(), 2);
        assert_eq!(graph.outgoing_edges("m-place").count(), 1);
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let mut graph = order_graph();
        let place = graph.method("m-place").unwrap().clone();
        let ghost = MethodNode::new("m-ghost", "c-svc", "ghost");
        let err = graph.add_edge(CallEdge::new(&place, &ghost)).unwrap_err();
        assert!(matches!(err, CoreError::DanglingReference { .. }));
        assert_eq!(graph.edges().len(), 2);
    }

    #[test]
    fn test_dangling_method_rejected() {
        let mut graph = KnowledgeGraph::new("p");
        let err = graph.add_method(MethodNode::new("m", "nope", "run")).unwrap_err();
        assert!(err.to_string().contains("class nope"));
    }

    #[test]
    fn test_ingest_collects_rejections() {
        let facts: GraphFacts = serde_json::from_str(
            r#"{
                "project": "demo",
                "classes": [{"id": "c1", "name": "a.UserService", "layer": "SERVICE"}],
                "methods": [
                    {"id": "m1", "class_id": "c1", "name": "find"},
                    {"id": "m2", "class_id": "missing", "name": "lost"}
                ],
                "edges": [
                    {"id": "e1", "from_method_id": "m1", "to_method_id": "m1",
                     "from_class_id": "", "to_class_id": "", "confidence": 1.7},
                    {"id": "e2", "from_method_id": "m1", "to_method_id": "m2",
                     "from_class_id": "c1", "to_class_id": "c1"}
                ]
            }"#,
        )
        .unwrap();

        let (graph, report) = KnowledgeGraph::from_facts(facts.clone(), false).unwrap();
        assert_eq!(graph.project(), "demo");
        assert_eq!(report.methods, 1);
        assert_eq!(report.edges, 1);
        assert_eq!(report.rejected.len(), 2);
        assert_eq!(graph.edge("e1").unwrap().confidence, 1.0);
        assert_eq!(graph.edge("e1").unwrap().from_class_id, "c1");
        assert!(graph.edge("e1").unwrap().is_self_loop());

        assert!(KnowledgeGraph::from_facts(facts, true).is_err());
    }

    #[test]
    fn test_validate_clean_graph() {
        let graph = order_graph();
        assert!(graph.validate().is_empty());
        assert!(graph.ensure_valid().is_ok());
    }

    #[test]
    fn test_validate_flags_depth_invariant() {
        let mut graph = order_graph();
        graph.method_mut("m-save").unwrap().depth = 2;
        let issues = graph.validate();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].id, "m-save");
        assert!(matches!(graph.ensure_valid(), Err(CoreError::InvalidGraph(1))));
    }

    #[test]
    fn test_implementation_index() {
        let mut graph = order_graph();
        graph.add_class(ClassBlock::new(
            "c-impl",
            "com.shop.service.OrderServiceImpl",
            Layer::Service,
        ));
        graph.add_method(MethodNode::new("m-impl", "c-impl", "createOrder")).unwrap();
        let mapping = InterfaceImplementationMapping {
            interface_method_id: "m-create".to_string(),
            implementation_method_id: "m-impl".to_string(),
            interface_class_id: String::new(),
            implementation_class_id: String::new(),
        };
        graph.add_implementation(mapping.clone()).unwrap();
        graph.add_implementation(mapping).unwrap();

        let impls: Vec<_> = graph.implementations_of("m-create").collect();
        assert_eq!(impls.len(), 1);
        assert_eq!(impls[0].implementation_class_id, "c-impl");
    }
}
