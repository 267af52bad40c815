//! Core path derivation over tree-local adjacency.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::graph::model::{CorePath, Layer, TreeNodeRelation};
use crate::graph::KnowledgeGraph;

/// One shortest root-to-member path for every non-root member of a tree.
///
/// Only the tree's own relations are followed, so a shortcut that exists in
/// the full graph but was never part of this tree is ignored. Children are
/// visited in `path_index` order, which keeps ties deterministic.
pub fn derive_core_paths(
    graph: &KnowledgeGraph,
    tree_id: &str,
    root_method_id: &str,
    relations: &[TreeNodeRelation],
) -> Vec<CorePath> {
    let mut children: BTreeMap<&str, Vec<&TreeNodeRelation>> = BTreeMap::new();
    for relation in relations.iter().filter(|r| r.tree_id == tree_id) {
        children.entry(relation.parent_method_id.as_str()).or_default().push(relation);
    }
    for list in children.values_mut() {
        list.sort_by_key(|r| r.path_index);
    }

    let mut parent: HashMap<&str, &str> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    let mut queue = VecDeque::from([root_method_id]);
    let mut seen = BTreeSet::from([root_method_id]);

    while let Some(current) = queue.pop_front() {
        for relation in children.get(current).into_iter().flatten() {
            let child = relation.child_method_id.as_str();
            if seen.insert(child) {
                parent.insert(child, current);
                order.push(child);
                queue.push_back(child);
            }
        }
    }

    order
        .into_iter()
        .map(|member| {
            let mut method_ids = vec![member.to_string()];
            let mut cursor = member;
            while let Some(&up) = parent.get(cursor) {
                method_ids.push(up.to_string());
                cursor = up;
            }
            method_ids.reverse();

            let layers: BTreeSet<Layer> = method_ids
                .iter()
                .filter_map(|id| graph.class_of(id).map(|c| c.layer))
                .collect();

            CorePath {
                id: format!("{}#{}", tree_id, member),
                tree_id: tree_id.to_string(),
                source_method_id: member.to_string(),
                path_length: method_ids.len() - 1,
                layer_cross_count: layers.len(),
                method_ids,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::order_graph;
    use crate::graph::model::{CallEdge, ClassBlock, MethodNode};
    use crate::tree::CallTreeBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_order_flow_paths() {
        let mut graph = order_graph();
        CallTreeBuilder::default().build(&mut graph).unwrap();

        let save = graph.core_path("tree:m-place#m-save").unwrap();
        assert_eq!(save.method_ids, vec!["m-place", "m-create", "m-save"]);
        assert_eq!(save.path_length, 2);
        assert_eq!(save.layer_cross_count, 3);

        let create = graph.core_path("tree:m-place#m-create").unwrap();
        assert_eq!(create.path_length, 1);
        assert_eq!(create.layer_cross_count, 2);
    }

    #[test]
    fn test_shortest_route_wins() {
        // place -> create -> save and place -> save directly.
        let mut graph = order_graph();
        let place = graph.method("m-place").unwrap().clone();
        let save = graph.method("m-save").unwrap().clone();
        graph.add_edge(CallEdge::new(&place, &save)).unwrap();

        CallTreeBuilder::default().build(&mut graph).unwrap();
        let path = graph.core_path("tree:m-place#m-save").unwrap();
        assert_eq!(path.method_ids, vec!["m-place", "m-save"]);
        assert_eq!(path.path_length, 1);
    }

    #[test]
    fn test_ignores_relations_of_other_trees() {
        let graph = order_graph();
        let relations = vec![TreeNodeRelation {
            tree_id: "tree:other".to_string(),
            parent_method_id: "m-place".to_string(),
            child_method_id: "m-create".to_string(),
            depth: 1,
            path_index: 0,
        }];
        assert!(derive_core_paths(&graph, "tree:m-place", "m-place", &relations).is_empty());
    }

    #[test]
    fn test_same_layer_counts_once() {
        let mut graph = KnowledgeGraph::new("t");
        graph.add_class(ClassBlock::new("a", "x.AController", Layer::Controller));
        graph.add_class(ClassBlock::new("b", "x.BController", Layer::Controller));
        let a = MethodNode::new("a1", "a", "run");
        let b = MethodNode::new("b1", "b", "run");
        graph.add_method(a.clone()).unwrap();
        graph.add_method(b.clone()).unwrap();
        graph.add_edge(CallEdge::new(&a, &b)).unwrap();

        CallTreeBuilder::default().build(&mut graph).unwrap();
        let path = graph.core_path("tree:a1#b1").unwrap();
        assert_eq!(path.layer_cross_count, 1);
    }
}
