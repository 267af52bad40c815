//! Call tree construction.
//!
//! Entry points are public, non-constructor methods of CONTROLLER classes.
//! Each one roots a depth-bounded walk over outgoing calls; the walks only
//! read the graph, and their membership annotations are written back in one
//! pass afterwards.

pub mod core_path;

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

use crate::config::DEFAULT_MAX_DEPTH;
use crate::error::CoreResult;
use crate::graph::model::{CallTree, Layer, MethodNode, TreeNodeRelation, Visibility};
use crate::graph::KnowledgeGraph;

/// Summary of one build run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub entry_points: usize,
    pub trees: usize,
    pub relations: usize,
    pub core_paths: usize,
    pub depth_limited_trees: usize,
}

/// Builds call trees and core paths into a knowledge graph.
#[derive(Debug, Clone, Copy)]
pub struct CallTreeBuilder {
    max_depth: usize,
}

impl Default for CallTreeBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

/// Result of walking one tree, before it is applied to the graph.
struct TreeWalk {
    tree_id: String,
    root_method_id: String,
    /// Minimum depth per member, in discovery order.
    members: Vec<(String, usize)>,
    relations: Vec<TreeNodeRelation>,
    edge_ids: BTreeSet<String>,
    path_count: usize,
    depth_limited: bool,
}

impl CallTreeBuilder {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Methods that root a call tree, sorted by id.
    pub fn entry_points<'a>(&self, graph: &'a KnowledgeGraph) -> Vec<&'a MethodNode> {
        let mut entries: Vec<&MethodNode> = graph
            .methods()
            .iter()
            .filter(|m| {
                let Some(class) = graph.class(&m.class_id) else {
                    return false;
                };
                class.layer == Layer::Controller
                    && m.visibility() == Visibility::Public
                    && !m.is_constructor
                    && m.name != class.simple_name
                    && m.name != "<init>"
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    /// Rebuild every tree, relation and core path in the graph.
    pub fn build(&self, graph: &mut KnowledgeGraph) -> CoreResult<BuildReport> {
        graph.clear_trees();

        let walks: Vec<TreeWalk> = self
            .entry_points(graph)
            .into_iter()
            .map(|root| self.walk(graph, root))
            .collect();

        let mut report = BuildReport {
            entry_points: walks.len(),
            ..Default::default()
        };

        for walk in &walks {
            apply_membership(graph, walk);
        }
        finalize_cross_counts(graph, walks.len());

        for walk in walks {
            let tree = self.make_tree(graph, &walk);
            if tree.depth_limited {
                report.depth_limited_trees += 1;
            }
            debug!(
                tree_id = %tree.id,
                nodes = tree.node_count,
                depth = tree.depth,
                "Built call tree"
            );
            graph.add_tree(tree)?;

            for relation in &walk.relations {
                graph.add_tree_relation(relation.clone())?;
            }
            report.relations += walk.relations.len();

            let paths = core_path::derive_core_paths(
                graph,
                &walk.tree_id,
                &walk.root_method_id,
                &walk.relations,
            );
            report.core_paths += paths.len();
            for path in paths {
                graph.add_core_path(path)?;
            }
            report.trees += 1;
        }

        info!(
            trees = report.trees,
            relations = report.relations,
            core_paths = report.core_paths,
            depth_limited = report.depth_limited_trees,
            "Call trees built"
        );
        Ok(report)
    }

    fn walk(&self, graph: &KnowledgeGraph, root: &MethodNode) -> TreeWalk {
        let mut walk = TreeWalk {
            tree_id: CallTree::id_for(&root.id),
            root_method_id: root.id.clone(),
            members: vec![(root.id.clone(), 0)],
            relations: Vec::new(),
            edge_ids: BTreeSet::new(),
            path_count: 0,
            depth_limited: false,
        };
        let mut depths: HashMap<String, usize> = HashMap::from([(root.id.clone(), 0)]);
        let mut seen_relations: HashSet<(String, String)> = HashSet::new();
        let mut on_path: HashSet<String> = HashSet::new();

        self.visit(graph, &root.id, 0, &mut walk, &mut depths, &mut seen_relations, &mut on_path);

        for (id, depth) in walk.members.iter_mut() {
            *depth = depths[id.as_str()];
        }
        walk
    }

    #[allow(clippy::too_many_arguments)]
    fn visit(
        &self,
        graph: &KnowledgeGraph,
        method_id: &str,
        depth: usize,
        walk: &mut TreeWalk,
        depths: &mut HashMap<String, usize>,
        seen_relations: &mut HashSet<(String, String)>,
        on_path: &mut HashSet<String>,
    ) {
        on_path.insert(method_id.to_string());
        let mut descended = false;

        for edge in graph.outgoing_edges(method_id) {
            for target in graph.dispatch_targets(edge) {
                if on_path.contains(target) {
                    // Recursive or mutual call: stop this route here.
                    walk.depth_limited = true;
                    continue;
                }
                let child_depth = depth + 1;
                if child_depth > self.max_depth {
                    walk.depth_limited = true;
                    continue;
                }

                walk.edge_ids.insert(edge.id.clone());
                if seen_relations.insert((method_id.to_string(), target.to_string())) {
                    walk.relations.push(TreeNodeRelation {
                        tree_id: walk.tree_id.clone(),
                        parent_method_id: method_id.to_string(),
                        child_method_id: target.to_string(),
                        depth: child_depth,
                        path_index: walk.relations.len(),
                    });
                }

                match depths.get(target) {
                    Some(&known) if known <= child_depth => continue,
                    Some(_) => {}
                    None => walk.members.push((target.to_string(), child_depth)),
                }
                depths.insert(target.to_string(), child_depth);
                descended = true;
                self.visit(graph, target, child_depth, walk, depths, seen_relations, on_path);
            }
        }

        if !descended {
            walk.path_count += 1;
        }
        on_path.remove(method_id);
    }

    fn make_tree(&self, graph: &KnowledgeGraph, walk: &TreeWalk) -> CallTree {
        let root = graph.method(&walk.root_method_id);
        let class = graph.class_of(&walk.root_method_id);
        CallTree {
            id: walk.tree_id.clone(),
            root_method_id: walk.root_method_id.clone(),
            root_class_id: root.map(|m| m.class_id.clone()).unwrap_or_default(),
            name: match (class, root) {
                (Some(c), Some(m)) => format!("{}.{}", c.simple_name, m.name),
                _ => walk.root_method_id.clone(),
            },
            depth: walk.members.iter().map(|(_, d)| *d).max().unwrap_or(0),
            node_count: walk.members.len(),
            cross_node_count: walk
                .members
                .iter()
                .filter(|(id, _)| graph.method(id).is_some_and(|m| m.cross_count > 1))
                .count(),
            path_count: walk.path_count,
            depth_limited: walk.depth_limited,
        }
    }
}

fn apply_membership(graph: &mut KnowledgeGraph, walk: &TreeWalk) {
    for (id, depth) in &walk.members {
        if let Some(method) = graph.method_mut(id) {
            method.tree_ids.insert(walk.tree_id.clone());
            let depth = *depth as i32;
            method.depth = if method.depth < 0 { depth } else { method.depth.min(depth) };
            if *id == walk.root_method_id {
                method.is_root_node = true;
            }
        }
    }
    for edge_id in &walk.edge_ids {
        if let Some(edge) = graph.edge_mut(edge_id) {
            edge.tree_ids.insert(walk.tree_id.clone());
        }
    }
}

/// Cross counts are the number of trees an entity belongs to; weights are
/// that count relative to all trees.
fn finalize_cross_counts(graph: &mut KnowledgeGraph, tree_count: usize) {
    let mut class_trees: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut class_weight: BTreeMap<String, f64> = BTreeMap::new();

    let method_ids: Vec<String> = graph.methods().iter().map(|m| m.id.clone()).collect();
    for id in &method_ids {
        let Some(method) = graph.method_mut(id) else { continue };
        method.cross_count = method.tree_ids.len();
        method.weight = if tree_count == 0 {
            0.0
        } else {
            method.cross_count as f64 / tree_count as f64
        };
        class_trees
            .entry(method.class_id.clone())
            .or_default()
            .extend(method.tree_ids.iter().cloned());
        let weight = class_weight.entry(method.class_id.clone()).or_insert(0.0);
        *weight = weight.max(method.weight);
    }

    let edge_ids: Vec<String> = graph.edges().iter().map(|e| e.id.clone()).collect();
    for id in &edge_ids {
        if let Some(edge) = graph.edge_mut(id) {
            edge.cross_count = edge.tree_ids.len();
        }
    }

    for (class_id, trees) in class_trees {
        if let Some(class) = graph.class_mut(&class_id) {
            class.cross_count = trees.len();
            class.weight = class_weight.get(&class_id).copied().unwrap_or(0.0);
        }
    }
}
