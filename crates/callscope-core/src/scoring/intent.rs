//! Intent: how much business value a call path carries.

use std::collections::{BTreeMap, BTreeSet};

use super::git::{intent_git_score, GitChangeContext};
use super::tables::{self, tier};
use super::{PathFacts, WeightBreakdown, WeightCalculator};
use crate::graph::model::Layer;
use crate::query::model::{CallSite, ClassArchitecture};

#[derive(Debug, Clone, Copy, Default)]
pub struct IntentCalculator;

fn has_business_keyword(method_name: &str) -> bool {
    let name = method_name.to_lowercase();
    tables::BUSINESS_METHOD_KEYWORDS.iter().any(|k| name.contains(k))
}

/// Value of what the path calls into.
pub(crate) fn downstream_value(callees: &[CallSite]) -> f64 {
    callees
        .iter()
        .map(|site| {
            let bonus = if has_business_keyword(&site.method_name) { 5.0 } else { 0.0 };
            tables::downstream_layer_score(site.layer) + bonus
        })
        .sum::<f64>()
        .min(50.0)
}

/// Value of who calls into the path, with a bonus for busy methods.
pub(crate) fn upstream_value(callers: &[CallSite]) -> f64 {
    let per_caller: f64 = callers.iter().map(|site| tables::upstream_layer_score(site.layer)).sum();
    let frequency: usize = callers.iter().map(|site| site.call_count).sum();
    (per_caller + tier(frequency, tables::CALLER_FREQUENCY)).min(40.0)
}

pub(crate) fn position_value(arch: &ClassArchitecture) -> f64 {
    let mut value = tables::position_layer_score(arch.layer)
        + tier(arch.dependencies.len(), tables::DEPENDENCY_BONUS);
    if !arch.interfaces.is_empty() {
        value += 5.0;
    }
    if !arch.parent_types.is_empty() {
        value += 3.0;
    }
    value.min(30.0)
}

/// Whether CONTROLLER, SERVICE and a persistence layer appear in that order.
pub(crate) fn is_full_chain(layers: &[Layer]) -> bool {
    let mut stage = 0;
    for layer in layers {
        stage = match (stage, layer) {
            (0, Layer::Controller) => 1,
            (1, Layer::Service) => 2,
            (2, Layer::Repository | Layer::Mapper) => return true,
            _ => stage,
        };
    }
    false
}

fn max_of(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, f64::max)
}

impl WeightCalculator for IntentCalculator {
    fn name(&self) -> &'static str {
        "intent"
    }

    fn calculate(&self, facts: &PathFacts, git: &GitChangeContext) -> WeightBreakdown {
        let mut components = BTreeMap::new();

        let downstream = downstream_value(&facts.callees());
        let upstream = upstream_value(&facts.callers());
        let business_impact = (downstream + upstream).min(90.0);

        let layers = facts.layers();
        let position = max_of(facts.architectures().map(position_value));
        let distinct: BTreeSet<Layer> = layers.iter().copied().collect();
        let cross_layer = tables::cross_layer_score(distinct.len());
        let complexity = max_of(
            facts
                .architectures()
                .map(|a| tables::dependency_complexity_score(a.dependencies.len())),
        );
        let architecture_value = (position + cross_layer + complexity).min(65.0);

        let path_length = tables::path_length_score(facts.path.hops());
        let influence = facts.blast_radii().map(|b| b.influence()).max().unwrap_or(0);
        let blast = tier(influence, tables::BLAST_INFLUENCE);
        let full_chain = if is_full_chain(&layers) { 20.0 } else { 0.0 };
        let chain_completeness = (path_length + blast + full_chain).min(80.0);

        for (name, value) in [
            ("downstream_value", downstream),
            ("upstream_value", upstream),
            ("business_impact", business_impact),
            ("position_value", position),
            ("cross_layer_value", cross_layer),
            ("dependency_complexity", complexity),
            ("architecture_value", architecture_value),
            ("path_length_value", path_length),
            ("blast_radius_value", blast),
            ("full_chain_bonus", full_chain),
            ("chain_completeness", chain_completeness),
        ] {
            components.insert(name.to_string(), value);
        }

        let git_score = intent_git_score(git);
        components.extend(git_score.components);

        let structural = business_impact + architecture_value + chain_completeness;
        WeightBreakdown::new(structural, git_score.total, components)
    }
}
