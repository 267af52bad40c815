//! Graph-wide distribution counts.

use serde::Serialize;
use std::collections::BTreeMap;

use super::model::{BusinessDomain, CallType, Layer};
use super::KnowledgeGraph;

/// Summary statistics over a knowledge graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStatistics {
    pub class_count: usize,
    pub method_count: usize,
    pub edge_count: usize,
    pub tree_count: usize,
    pub core_path_count: usize,
    pub layer_distribution: BTreeMap<Layer, usize>,
    pub call_type_distribution: BTreeMap<CallType, usize>,
    pub domain_distribution: BTreeMap<BusinessDomain, usize>,
    pub avg_methods_per_class: f64,
    pub avg_tree_depth: f64,
    /// Methods that belong to more than one tree.
    pub cross_node_count: usize,
}

impl GraphStatistics {
    pub(crate) fn compute(graph: &KnowledgeGraph) -> Self {
        let mut stats = Self {
            class_count: graph.classes().len(),
            method_count: graph.methods().len(),
            edge_count: graph.edges().len(),
            tree_count: graph.trees().len(),
            core_path_count: graph.core_paths().len(),
            ..Default::default()
        };

        for class in graph.classes() {
            *stats.layer_distribution.entry(class.layer).or_default() += 1;
            *stats.domain_distribution.entry(class.business_domain).or_default() += 1;
        }

        for edge in graph.edges() {
            *stats.call_type_distribution.entry(edge.call_type).or_default() += 1;
        }

        stats.cross_node_count = graph.methods().iter().filter(|m| m.cross_count > 1).count();

        if stats.class_count > 0 {
            stats.avg_methods_per_class = stats.method_count as f64 / stats.class_count as f64;
        }
        if stats.tree_count > 0 {
            let total_depth: usize = graph.trees().iter().map(|t| t.depth).sum();
            stats.avg_tree_depth = total_depth as f64 / stats.tree_count as f64;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::order_graph;

    #[test]
    fn test_statistics_for_order_graph() {
        let stats = order_graph().statistics();
        assert_eq!(stats.class_count, 3);
        assert_eq!(stats.method_count, 3);
        assert_eq!(stats.edge_count, 2);
        assert_eq!(stats.layer_distribution[&Layer::Controller], 1);
        assert_eq!(stats.call_type_distribution[&CallType::Direct], 2);
        assert_eq!(stats.domain_distribution[&BusinessDomain::Order], 3);
        assert!((stats.avg_methods_per_class - 1.0).abs() < f64::EPSILON);
        assert_eq!(stats.avg_tree_depth, 0.0);
        assert_eq!(stats.cross_node_count, 0);
    }

    #[test]
    fn test_statistics_empty_graph() {
        let stats = KnowledgeGraph::new("empty").statistics();
        assert_eq!(stats, GraphStatistics::default());
    }
}
