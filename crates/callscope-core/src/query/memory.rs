//! Query Service backed by an in-memory knowledge graph.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::model::{
    BlastRadius, CallPathChain, CallSite, ClassArchitecture, MethodCalls, MethodKey, PathStep,
};
use super::{GraphQueryService, MAX_PATH_HOPS};
use crate::error::CoreResult;
use crate::graph::model::{CallType, Layer};
use crate::graph::KnowledgeGraph;

/// Bound on ancestor-chain walks; super-class names can form cycles in bad input.
const MAX_ANCESTORS: usize = 16;

#[derive(Clone, Copy)]
enum Direction {
    Incoming,
    Outgoing,
}

/// Answers structural queries from a frozen graph.
///
/// Holding the graph behind an `Arc` is the build/query barrier: once a
/// graph is shared here nothing can mutate it.
#[derive(Debug, Clone)]
pub struct InMemoryQueryService {
    graph: Arc<KnowledgeGraph>,
    max_hops: usize,
}

impl InMemoryQueryService {
    pub fn new(graph: Arc<KnowledgeGraph>) -> Self {
        Self {
            graph,
            max_hops: MAX_PATH_HOPS,
        }
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    fn method_ids(&self, class_name: &str, method_name: &str) -> Vec<&str> {
        self.graph
            .find_methods(class_name, method_name)
            .into_iter()
            .map(|m| m.id.as_str())
            .collect()
    }

    fn key_of(&self, method_id: &str) -> Option<(MethodKey, Layer)> {
        let method = self.graph.method(method_id)?;
        let class = self.graph.class(&method.class_id)?;
        Some((MethodKey::new(&class.name, &method.name), class.layer))
    }

    fn neighbors<'a>(&'a self, method_id: &str, direction: Direction) -> Vec<&'a str> {
        match direction {
            Direction::Incoming => self
                .graph
                .incoming_edges(method_id)
                .map(|e| e.from_method_id.as_str())
                .collect(),
            Direction::Outgoing => self
                .graph
                .outgoing_edges(method_id)
                .map(|e| e.to_method_id.as_str())
                .collect(),
        }
    }

    fn collect_calls(
        &self,
        class_name: &str,
        method_name: &str,
        direction: Direction,
    ) -> MethodCalls {
        let mut grouped: BTreeMap<MethodKey, (Layer, usize)> = BTreeMap::new();
        for id in self.method_ids(class_name, method_name) {
            for other in self.neighbors(id, direction) {
                if let Some((key, layer)) = self.key_of(other) {
                    grouped.entry(key).or_insert((layer, 0)).1 += 1;
                }
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
        MethodCalls::from_sites(sites)
    }

    /// Direct callers of a method.
    pub fn callers(&self, class_name: &str, method_name: &str) -> MethodCalls {
        self.collect_calls(class_name, method_name, Direction::Incoming)
    }

    /// Direct callees of a method.
    pub fn callees(&self, class_name: &str, method_name: &str) -> MethodCalls {
        self.collect_calls(class_name, method_name, Direction::Outgoing)
    }

    /// Architectural facts about a class.
    pub fn architecture(&self, class_name: &str) -> ClassArchitecture {
        let Some(class) = self.graph.class_by_name(class_name) else {
            return ClassArchitecture::missing(class_name);
        };

        let mut parent_types = Vec::new();
        let mut next = class.super_class.clone();
        while let Some(parent) = next.take() {
            if parent_types.len() >= MAX_ANCESTORS
                || parent_types.contains(&parent)
                || parent == class.name
            {
                break;
            }
            next = self.graph.class_by_name(&parent).and_then(|p| p.super_class.clone());
            parent_types.push(parent);
        }

        let dependencies = self
            .graph
            .methods_of_class(&class.id)
            .flat_map(|m| self.graph.outgoing_edges(&m.id))
            .filter(|e| e.to_class_id != class.id)
            .filter_map(|e| self.graph.class(&e.to_class_id))
            .map(|c| c.name.clone())
            .collect();

        ClassArchitecture {
            found: true,
            class_name: class.name.clone(),
            layer: class.layer,
            parent_types,
            interfaces: class.interfaces.clone(),
            dependencies,
            is_abstract: class.is_abstract,
            is_interface: class.is_interface,
        }
    }

    /// Breadth-first shortest path over call edges, bounded by `max_hops`.
    pub fn call_path_chain(
        &self,
        source_class: &str,
        source_method: &str,
        target_class: &str,
        target_method: &str,
    ) -> CallPathChain {
        let sources = self.method_ids(source_class, source_method);
        let targets: HashSet<&str> = self
            .method_ids(target_class, target_method)
            .into_iter()
            .collect();
        if sources.is_empty() || targets.is_empty() {
            return CallPathChain::not_found();
        }

        if let Some(id) = sources.iter().find(|id| targets.contains(*id)) {
            return self.chain_from_ids(&[*id], Vec::new());
        }

        let mut parent: HashMap<&str, (&str, CallType)> = HashMap::new();
        let mut visited: HashSet<&str> = sources.iter().copied().collect();
        let mut queue: VecDeque<(&str, usize)> = sources.iter().map(|id| (*id, 0)).collect();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= self.max_hops {
                continue;
            }
            for edge in self.graph.outgoing_edges(current) {
                for next in self.graph.dispatch_targets(edge) {
                    if !visited.insert(next) {
                        continue;
                    }
                    parent.insert(next, (current, edge.call_type));
                    if targets.contains(next) {
                        let mut ids = vec![next];
                        let mut types = Vec::new();
                        let mut cursor = next;
                        while let Some(&(prev, call_type)) = parent.get(cursor) {
                            ids.push(prev);
                            types.push(call_type);
                            cursor = prev;
                        }
                        ids.reverse();
                        types.reverse();
                        return self.chain_from_ids(&ids, types);
                    }
                    queue.push_back((next, depth + 1));
                }
            }
        }

        CallPathChain::not_found()
    }

    fn chain_from_ids(&self, ids: &[&str], edge_types: Vec<CallType>) -> CallPathChain {
        let steps = ids
            .iter()
            .filter_map(|id| self.key_of(id))
            .map(|(key, layer)| PathStep {
                class_name: key.class_name,
                method_name: key.method_name,
                layer,
            })
            .collect();
        CallPathChain::from_steps(steps, edge_types)
    }

    /// One- and two-hop callers and callees of a method.
    pub fn blast_radius(&self, class_name: &str, method_name: &str) -> BlastRadius {
        let origin: BTreeSet<&str> = self.method_ids(class_name, method_name).into_iter().collect();
        if origin.is_empty() {
            return BlastRadius::default();
        }

        let direct_callers = self.expand(&origin, Direction::Incoming, &[&origin]);
        let indirect_callers =
            self.expand(&direct_callers, Direction::Incoming, &[&origin, &direct_callers]);
        let direct_callees = self.expand(&origin, Direction::Outgoing, &[&origin]);
        let indirect_callees =
            self.expand(&direct_callees, Direction::Outgoing, &[&origin, &direct_callees]);

        let mut layers_touched = BTreeSet::new();
        let mut classes = BTreeSet::new();
        for id in origin
            .iter()
            .chain(&direct_callers)
            .chain(&indirect_callers)
            .chain(&direct_callees)
            .chain(&indirect_callees)
        {
            if let Some(class) = self.graph.class_of(id) {
                layers_touched.insert(class.layer);
                classes.insert(class.id.as_str());
            }
        }

        BlastRadius {
            direct_callers: self.keys(&direct_callers),
            direct_callees: self.keys(&direct_callees),
            indirect_callers: self.keys(&indirect_callers),
            indirect_callees: self.keys(&indirect_callees),
            layers_touched,
            total_classes: classes.len(),
        }
    }

    /// Neighbors of every method in `from`, minus anything in `exclude`.
    fn expand<'a>(
        &'a self,
        from: &BTreeSet<&'a str>,
        direction: Direction,
        exclude: &[&BTreeSet<&'a str>],
    ) -> BTreeSet<&'a str> {
        from.iter()
            .flat_map(|id| self.neighbors(id, direction))
            .filter(|id| !exclude.iter().any(|set| set.contains(id)))
            .collect()
    }

    fn keys(&self, ids: &BTreeSet<&str>) -> BTreeSet<MethodKey> {
        ids.iter().filter_map(|id| self.key_of(id)).map(|(key, _)| key).collect()
    }
}

#[async_trait]
impl GraphQueryService for InMemoryQueryService {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn query_method_callers(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> CoreResult<MethodCalls> {
        Ok(self.callers(class_name, method_name))
    }

    async fn query_method_callees(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> CoreResult<MethodCalls> {
        Ok(self.callees(class_name, method_name))
    }

    async fn query_class_architecture(&self, class_name: &str) -> CoreResult<ClassArchitecture> {
        Ok(self.architecture(class_name))
    }

    async fn query_call_path_chain(
        &self,
        source_class: &str,
        source_method: &str,
        target_class: &str,
        target_method: &str,
    ) -> CoreResult<CallPathChain> {
        Ok(self.call_path_chain(source_class, source_method, target_class, target_method))
    }

    async fn query_blast_radius(
        &self,
        class_name: &str,
        method_name: &str,
    ) -> CoreResult<BlastRadius> {
        Ok(self.blast_radius(class_name, method_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::order_graph;
    use crate::graph::model::{CallEdge, ClassBlock, InterfaceImplementationMapping, MethodNode};
    use pretty_assertions::assert_eq;

    fn service(graph: KnowledgeGraph) -> InMemoryQueryService {
        InMemoryQueryService::new(Arc::new(graph))
    }

    #[test]
    fn test_callers_and_callees() {
        let svc = service(order_graph());
        let callers = svc.callers("OrderService", "createOrder");
        assert_eq!(callers.total_count, 1);
        assert_eq!(callers.calls[0].class_name, "com.shop.web.OrderController");
        assert_eq!(callers.calls[0].layer, Layer::Controller);

        let callees = svc.callees("OrderService", "createOrder");
        assert_eq!(callees.calls.len(), 1);
        assert_eq!(callees.calls[0].method_name, "save");
        assert_eq!(callees.layer_distribution[&Layer::Repository], 1);
    }

    #[test]
    fn test_unknown_method_yields_empty_result() {
        let svc = service(order_graph());
        assert_eq!(svc.callers("OrderService", "nope"), MethodCalls::default());
        assert!(!svc.architecture("Nope").found);
        assert!(!svc.call_path_chain("Nope", "a", "OrderService", "createOrder").found);
        assert_eq!(svc.blast_radius("Nope", "a"), BlastRadius::default());
    }

    #[test]
    fn test_architecture_dependencies_and_ancestors() {
        let mut graph = order_graph();
        let mut base = ClassBlock::new("c-base", "com.shop.service.BaseService", Layer::Service);
        base.is_abstract = true;
        base.super_class = Some("com.shop.service.OrderService".to_string());
        graph.add_class(base);
        let mut svc = graph.class("c-svc").unwrap().clone();
        svc.super_class = Some("com.shop.service.BaseService".to_string());
        svc.interfaces = vec!["com.shop.service.OrderApi".to_string()];
        graph.add_class(svc);

        let arch = service(graph).architecture("OrderService");
        assert!(arch.found);
        assert_eq!(arch.layer, Layer::Service);
        // The cycle back to OrderService stops the walk.
        assert_eq!(arch.parent_types, vec!["com.shop.service.BaseService".to_string()]);
        assert_eq!(arch.interfaces.len(), 1);
        assert_eq!(
            arch.dependencies.into_iter().collect::<Vec<_>>(),
            vec!["com.shop.repo.OrderRepository".to_string()]
        );
    }

    #[test]
    fn test_call_path_chain_for_order_flow() {
        let svc = service(order_graph());
        let chain = svc.call_path_chain("OrderController", "placeOrder", "OrderRepository", "save");
        assert!(chain.found);
        assert_eq!(chain.hops, 2);
        assert_eq!(chain.layers(), vec![Layer::Controller, Layer::Service, Layer::Repository]);
        assert_eq!(chain.edge_types, vec![CallType::Direct, CallType::Direct]);
        assert!(!chain.has_layer_violation);
    }

    #[test]
    fn test_call_path_chain_respects_hop_bound() {
        let mut graph = KnowledgeGraph::new("long");
        graph.add_class(ClassBlock::new("c", "a.ChainUtil", Layer::Util));
        let methods: Vec<MethodNode> = (0..8)
            .map(|i| MethodNode::new(format!("m{i}"), "c", format!("step{i}")))
            .collect();
        for m in &methods {
            graph.add_method(m.clone()).unwrap();
        }
        for pair in methods.windows(2) {
            graph.add_edge(CallEdge::new(&pair[0], &pair[1])).unwrap();
        }
        let svc = service(graph);
        assert_eq!(svc.call_path_chain("ChainUtil", "step0", "ChainUtil", "step5").hops, 5);
        assert!(!svc.call_path_chain("ChainUtil", "step0", "ChainUtil", "step6").found);
    }

    #[test]
    fn test_repository_to_controller_is_violation() {
        let mut graph = order_graph();
        let save = graph.method("m-save").unwrap().clone();
        let place = graph.method("m-place").unwrap().clone();
        graph.add_edge(CallEdge::new(&save, &place)).unwrap();
        let chain = service(graph).call_path_chain(
            "OrderRepository",
            "save",
            "OrderController",
            "placeOrder",
        );
        assert!(chain.found);
        assert_eq!(chain.hops, 1);
        assert!(chain.has_layer_violation);
    }

    #[test]
    fn test_chain_dispatches_through_interface() {
        let mut graph = order_graph();
        let mut api = ClassBlock::new("c-api", "com.shop.service.PaymentApi", Layer::Service);
        api.is_interface = true;
        graph.add_class(api);
        graph.add_class(ClassBlock::new(
            "c-pay",
            "com.shop.service.PaymentServiceImpl",
            Layer::Service,
        ));
        let charge = MethodNode::new("m-charge", "c-api", "charge");
        let charge_impl = MethodNode::new("m-charge-impl", "c-pay", "charge");
        graph.add_method(charge.clone()).unwrap();
        graph.add_method(charge_impl.clone()).unwrap();
        let create = graph.method("m-create").unwrap().clone();
        graph
            .add_edge(CallEdge::new(&create, &charge).with_call_type(CallType::Interface))
            .unwrap();
        graph
            .add_implementation(InterfaceImplementationMapping {
                interface_method_id: "m-charge".to_string(),
                implementation_method_id: "m-charge-impl".to_string(),
                interface_class_id: String::new(),
                implementation_class_id: String::new(),
            })
            .unwrap();

        let chain = service(graph).call_path_chain(
            "OrderService",
            "createOrder",
            "PaymentServiceImpl",
            "charge",
        );
        assert!(chain.found);
        assert_eq!(chain.hops, 1);
        assert_eq!(chain.edge_types, vec![CallType::Interface]);
    }

    #[test]
    fn test_blast_radius_two_hops() {
        let svc = service(order_graph());
        let radius = svc.blast_radius("OrderService", "createOrder");
        assert_eq!(radius.direct_callers.len(), 1);
        assert_eq!(radius.direct_callees.len(), 1);
        assert!(radius.indirect_callers.is_empty());
        assert_eq!(radius.layers_touched.len(), 3);
        assert_eq!(radius.total_classes, 3);

        let from_repo = svc.blast_radius("OrderRepository", "save");
        assert_eq!(from_repo.direct_callers.len(), 1);
        assert_eq!(
            from_repo.indirect_callers.iter().next().unwrap(),
            &MethodKey::new("com.shop.web.OrderController", "placeOrder")
        );
        assert_eq!(from_repo.influence(), 2);
    }

    #[test]
    fn test_self_loop_not_counted_as_own_caller() {
        let mut graph = order_graph();
        let save = graph.method("m-save").unwrap().clone();
        graph.add_edge(CallEdge::new(&save, &save)).unwrap();
        let svc = service(graph);
        assert_eq!(svc.blast_radius("OrderRepository", "save").direct_callers.len(), 1);
        assert_eq!(svc.callers("OrderRepository", "save").total_count, 2);
    }

    fn random_graph(edges: &[(usize, usize)]) -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new("prop");
        graph.add_class(ClassBlock::new("c-a", "com.prop.AService", Layer::Service));
        graph.add_class(ClassBlock::new("c-b", "com.prop.BRepository", Layer::Repository));
        let methods: Vec<MethodNode> = (0..8)
            .map(|i| {
                let class_id = if i % 2 == 0 { "c-a" } else { "c-b" };
                MethodNode::new(format!("m{i}"), class_id, format!("op{i}"))
            })
            .collect();
        for method in &methods {
            graph.add_method(method.clone()).unwrap();
        }
        for &(from, to) in edges {
            graph.add_edge(CallEdge::new(&methods[from], &methods[to])).unwrap();
        }
        graph
    }

    proptest::proptest! {
        #[test]
        fn prop_extra_call_never_shrinks_blast_radius(
            edges in proptest::collection::vec((0..8usize, 0..8usize), 0..20),
            extra in (0..8usize, 0..8usize),
        ) {
            let before = service(random_graph(&edges)).blast_radius("AService", "op0").influence();
            let mut more = edges.clone();
            more.push(extra);
            let after = service(random_graph(&more)).blast_radius("AService", "op0").influence();
            proptest::prop_assert!(after >= before);
        }
    }

    #[tokio::test]
    async fn test_trait_dispatch() {
        let svc: Arc<dyn GraphQueryService> = Arc::new(service(order_graph()));
        assert_eq!(svc.backend(), "memory");
        let callers = svc.query_method_callers("OrderService", "createOrder").await.unwrap();
        assert_eq!(callers.total_count, 1);
    }
}
