//! End to end: facts document, call trees, in-memory queries, scoring.

use std::sync::Arc;

use callscope_core::graph::model::{CallType, Layer};
use callscope_core::query::model::MethodKey;
use callscope_core::scoring::paths_from_core_paths;
use callscope_core::{
    AnalysisConfig, Analyzer, CallTreeBuilder, GitChangeContext, GraphFacts, GraphQueryService,
    InMemoryQueryService, KnowledgeGraph,
};

const FACTS: &str = include_str!("../../../demos/shop-facts.json");
const CHANGES: &str = include_str!("../../../demos/shop-changes.json");

const CONTROLLER: &str = "com.shop.web.OrderController";
const SERVICE_IMPL: &str = "com.shop.service.impl.OrderServiceImpl";
const REPOSITORY: &str = "com.shop.repo.OrderRepository";

fn built_graph() -> KnowledgeGraph {
    let facts: GraphFacts = serde_json::from_str(FACTS).unwrap();
    let (mut graph, report) = KnowledgeGraph::from_facts(facts, true).unwrap();
    assert!(report.is_clean());
    assert_eq!(
        (report.classes, report.methods, report.edges, report.implementations),
        (6, 10, 6, 1)
    );

    let build = CallTreeBuilder::default().build(&mut graph).unwrap();
    assert_eq!(build.entry_points, 2);
    assert_eq!(build.trees, 2);
    assert_eq!(build.depth_limited_trees, 0);
    graph
}

#[test]
fn test_trees_follow_interface_dispatch() {
    let graph = built_graph();

    let place = graph.tree("tree:m-place").unwrap();
    assert_eq!(place.depth, 2);
    // placeOrder, the interface method, its implementation, validate, save, total
    assert_eq!(place.node_count, 6);

    let get = graph.tree("tree:m-get").unwrap();
    assert_eq!(get.node_count, 3);

    assert!(graph.method("m-save").unwrap().tree_ids.contains("tree:m-place"));
    assert!(!graph.method("m-ctl-init").unwrap().is_root_node);
}

#[test]
fn test_core_paths_become_call_paths() {
    let graph = built_graph();
    let rendered: Vec<String> = paths_from_core_paths(&graph)
        .iter()
        .map(|p| p.to_string())
        .collect();

    let expected = format!(
        "{CONTROLLER}.placeOrder -> {SERVICE_IMPL}.createOrder -> {REPOSITORY}.save"
    );
    assert!(rendered.contains(&expected), "missing {expected} in {rendered:?}");
}

#[tokio::test]
async fn test_queries_over_frozen_graph() {
    let service = InMemoryQueryService::new(Arc::new(built_graph()));

    let callers = service.query_method_callers(REPOSITORY, "save").await.unwrap();
    assert_eq!(callers.total_count, 1);
    assert_eq!(callers.calls[0].class_name, SERVICE_IMPL);

    let chain = service
        .query_call_path_chain("OrderController", "placeOrder", "OrderRepository", "save")
        .await
        .unwrap();
    assert!(chain.found);
    assert_eq!(chain.hops, 2);
    assert_eq!(chain.edge_types, vec![CallType::Interface, CallType::Direct]);
    assert_eq!(chain.layers(), vec![Layer::Controller, Layer::Service, Layer::Repository]);
    assert!(!chain.has_layer_violation);

    let arch = service.query_class_architecture("OrderServiceImpl").await.unwrap();
    assert!(arch.found);
    assert_eq!(arch.parent_types, vec!["com.shop.service.BaseService".to_string()]);
    assert!(arch.dependencies.contains(REPOSITORY));

    let blast = service.query_blast_radius(SERVICE_IMPL, "createOrder").await.unwrap();
    assert!(blast.direct_callees.contains(&MethodKey::new(REPOSITORY, "save")));

    let missing = service.query_method_callers("Nowhere", "nothing").await.unwrap();
    assert_eq!(missing.total_count, 0);
}

#[tokio::test]
async fn test_scores_every_core_path() {
    let graph = built_graph();
    let paths = paths_from_core_paths(&graph);
    let service = Arc::new(InMemoryQueryService::new(Arc::new(graph)));
    let analyzer = Analyzer::from_config(service, &AnalysisConfig::default());

    let git: GitChangeContext = serde_json::from_str(CHANGES).unwrap();
    let scored = analyzer.score_paths(paths.clone(), &git).await.unwrap();

    assert_eq!(scored.len(), paths.len());
    for result in &scored {
        assert!(!result.is_degraded());
        assert!((0.0..=100.0).contains(&result.intent.score));
        assert!((0.0..=100.0).contains(&result.risk.score));
        assert!(result.intent.git > 0.0);
    }

    let full = scored
        .iter()
        .find(|s| s.path.hops() == 2 && s.path.last().is_some_and(|k| k.method_name == "save"))
        .unwrap();
    assert_eq!(full.intent.components.get("full_chain_bonus"), Some(&20.0));
}
