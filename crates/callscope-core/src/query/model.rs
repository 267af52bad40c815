//! Result shapes of the structural queries.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::graph::model::{CallType, Layer};

/// Identifies a method by class and method name (overloads collapse).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodKey {
    pub class_name: String,
    pub method_name: String,
}

impl MethodKey {
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
        }
    }
}

impl std::fmt::Display for MethodKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.class_name, self.method_name)
    }
}

/// One caller or callee of a method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSite {
    pub class_name: String,
    pub method_name: String,
    pub layer: Layer,
    pub call_count: usize,
}

/// Direct callers or callees of a method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodCalls {
    /// Sum of `call_count` over all call sites.
    pub total_count: usize,
    /// Calls per layer of the other endpoint.
    pub layer_distribution: BTreeMap<Layer, usize>,
    /// Sorted by class name, then method name.
    pub calls: Vec<CallSite>,
}

impl MethodCalls {
    /// Build from unsorted call sites.
    pub fn from_sites(mut calls: Vec<CallSite>) -> Self {
        calls.sort_by(|a, b| {
            a.class_name
                .cmp(&b.class_name)
                .then_with(|| a.method_name.cmp(&b.method_name))
        });

        let mut layer_distribution = BTreeMap::new();
        let mut total_count = 0;
        for site in &calls {
            *layer_distribution.entry(site.layer).or_default() += site.call_count;
            total_count += site.call_count;
        }

        Self {
            total_count,
            layer_distribution,
            calls,
        }
    }
}

/// Architectural position of a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassArchitecture {
    pub found: bool,
    pub class_name: String,
    pub layer: Layer,
    /// Ancestor chain, nearest first.
    pub parent_types: Vec<String>,
    pub interfaces: Vec<String>,
    /// Other classes reachable in one call hop from any method of the class.
    pub dependencies: BTreeSet<String>,
    pub is_abstract: bool,
    pub is_interface: bool,
}

impl ClassArchitecture {
    /// Result for a class the backend does not know.
    pub fn missing(class_name: &str) -> Self {
        Self {
            found: false,
            class_name: class_name.to_string(),
            layer: Layer::Unknown,
            parent_types: Vec::new(),
            interfaces: Vec::new(),
            dependencies: BTreeSet::new(),
            is_abstract: false,
            is_interface: false,
        }
    }
}

/// One step of a call path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub class_name: String,
    pub method_name: String,
    pub layer: Layer,
}

/// Shortest call path between two methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallPathChain {
    pub found: bool,
    pub hops: usize,
    pub steps: Vec<PathStep>,
    pub edge_types: Vec<CallType>,
    pub has_layer_violation: bool,
}

impl CallPathChain {
    /// Build a found chain and compute its violation flag.
    pub fn from_steps(steps: Vec<PathStep>, edge_types: Vec<CallType>) -> Self {
        let has_layer_violation = steps.windows(2).any(|w| {
            w[0].class_name != w[1].class_name
                && crate::graph::rules::is_violation(w[0].layer, w[1].layer)
        });
        Self {
            found: true,
            hops: steps.len().saturating_sub(1),
            steps,
            edge_types,
            has_layer_violation,
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }

    pub fn layers(&self) -> Vec<Layer> {
        self.steps.iter().map(|s| s.layer).collect()
    }
}

/// Methods within two call hops of a method, in both directions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlastRadius {
    pub direct_callers: BTreeSet<MethodKey>,
    pub direct_callees: BTreeSet<MethodKey>,
    pub indirect_callers: BTreeSet<MethodKey>,
    pub indirect_callees: BTreeSet<MethodKey>,
    pub layers_touched: BTreeSet<Layer>,
    /// Distinct classes touched, including the method's own class.
    pub total_classes: usize,
}

impl BlastRadius {
    /// Total number of influenced methods across all four sets.
    pub fn influence(&self) -> usize {
        self.direct_callers.len()
            + self.direct_callees.len()
            + self.indirect_callers.len()
            + self.indirect_callees.len()
    }
}
