//! Risk: how much architectural danger a call path carries.

use std::collections::BTreeMap;

use super::git::{risk_git_score, GitChangeContext};
use super::tables::{self, tier};
use super::{PathFacts, WeightBreakdown, WeightCalculator};
use crate::graph::rules;
use crate::query::model::{BlastRadius, ClassArchitecture};

#[derive(Debug, Clone, Copy, Default)]
pub struct RiskCalculator;

pub(crate) fn architecture_risk(arch: &ClassArchitecture) -> f64 {
    let dependency = tier(arch.dependencies.len(), tables::DEPENDENCY_RISK);

    let mut interface = tier(arch.interfaces.len(), tables::INTERFACE_RISK);
    if arch.is_interface {
        interface += 10.0;
    }
    let interface = interface.min(25.0);

    let mut inheritance = 0.0;
    if !arch.parent_types.is_empty() {
        inheritance += 15.0;
    }
    if arch.is_abstract {
        inheritance += 15.0;
    }

    (dependency + interface + inheritance).min(95.0)
}

pub(crate) fn blast_risk(blast: &BlastRadius) -> f64 {
    let risk = tier(blast.direct_callers.len(), tables::DIRECT_CALLER_RISK)
        + tier(blast.indirect_callers.len(), tables::INDIRECT_CALLER_RISK)
        + tier(blast.layers_touched.len(), tables::LAYERS_TOUCHED_RISK)
        + tier(blast.total_classes, tables::TOTAL_CLASSES_RISK);
    risk.min(80.0)
}

/// Steps between consecutive methods of different classes that break the
/// layering. Steps with an unknown layer are skipped.
pub(crate) fn invalid_transitions(facts: &PathFacts) -> usize {
    facts
        .step_layers()
        .windows(2)
        .filter(|pair| match (&pair[0], &pair[1]) {
            (Some((from_class, from)), Some((to_class, to))) => {
                from_class != to_class && rules::is_violation(*from, *to)
            }
            _ => false,
        })
        .count()
}

pub(crate) fn violation_risk(facts: &PathFacts) -> f64 {
    let (base, length) = match facts.chain.as_ref().filter(|c| c.found) {
        Some(chain) => (
            if chain.has_layer_violation { 50.0 } else { 0.0 },
            tier(chain.hops, tables::CHAIN_LENGTH_RISK),
        ),
        None => (0.0, 0.0),
    };
    let transitions = (invalid_transitions(facts) as f64 * 15.0).min(30.0);
    (base + length + transitions).min(105.0)
}

impl WeightCalculator for RiskCalculator {
    fn name(&self) -> &'static str {
        "risk"
    }

    fn calculate(&self, facts: &PathFacts, git: &GitChangeContext) -> WeightBreakdown {
        let architecture = facts.architectures().map(architecture_risk).fold(0.0, f64::max);
        let blast = facts.blast_radii().map(blast_risk).fold(0.0, f64::max);
        let violation = violation_risk(facts);

        let mut components: BTreeMap<String, f64> = [
            ("architecture_risk", architecture),
            ("blast_radius_risk", blast),
            ("violation_risk", violation),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect();

        let git_score = risk_git_score(git);
        components.extend(git_score.components);

        WeightBreakdown::new(architecture + blast + violation, git_score.total, components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::{CallType, Layer};
    use crate::query::model::{CallPathChain, MethodKey};
    use crate::scoring::testing::{architecture, order_facts, step};
    use crate::scoring::{ChangedFile, FileStatus, IntentCalculator, MethodFacts};
    use proptest::prelude::*;

    fn keys(prefix: &str, n: usize) -> std::collections::BTreeSet<MethodKey> {
        (0..n).map(|i| MethodKey::new(format!("{prefix}{i}"), "m")).collect()
    }

    #[test]
    fn test_architecture_risk_parts() {
        let mut arch = architecture("PaymentGateway", Layer::Service, 12);
        arch.interfaces = vec!["A".into(), "B".into(), "C".into()];
        arch.is_interface = true;
        arch.parent_types = vec!["Base".into()];
        arch.is_abstract = true;
        // 30 + 25 (capped) + 30
        assert_eq!(architecture_risk(&arch), 85.0);
    }

    #[test]
    fn test_blast_risk_tiers() {
        let blast = BlastRadius {
            direct_callers: keys("c", 5),
            indirect_callers: keys("i", 3),
            layers_touched: [Layer::Controller, Layer::Service, Layer::Repository]
                .into_iter()
                .collect(),
            total_classes: 8,
            ..Default::default()
        };
        assert_eq!(blast_risk(&blast), 18.0 + 10.0 + 15.0 + 10.0);
    }

    #[test]
    fn test_order_flow_is_low_risk() {
        let breakdown = RiskCalculator.calculate(&order_facts(), &GitChangeContext::default());
        assert_eq!(breakdown.components["architecture_risk"], 10.0);
        assert_eq!(breakdown.components["blast_radius_risk"], 0.0);
        assert_eq!(breakdown.components["violation_risk"], 0.0);
        assert_eq!(breakdown.score, 8.0);
    }

    #[test]
    fn test_upward_call_is_penalized() {
        let mut facts = order_facts();
        facts.methods.reverse();
        facts.path.steps.reverse();
        let mut steps = facts.chain.take().unwrap().steps;
        steps.reverse();
        facts.chain = Some(CallPathChain::from_steps(steps, vec![CallType::Direct; 2]));

        // repo -> service and service -> controller both climb.
        assert_eq!(invalid_transitions(&facts), 2);
        assert_eq!(violation_risk(&facts), 50.0 + 30.0);
    }

    #[test]
    fn test_long_chain_penalty() {
        let mut facts = order_facts();
        let chain = CallPathChain::from_steps(
            vec![
                step("A", "a", Layer::Controller),
                step("B", "b", Layer::Service),
                step("C", "c", Layer::Util),
                step("D", "d", Layer::Util),
                step("E", "e", Layer::Util),
            ],
            vec![CallType::Direct; 4],
        );
        facts.chain = Some(chain);
        assert_eq!(violation_risk(&facts), 20.0);
    }

    #[test]
    fn test_sensitive_change_raises_score() {
        let git = GitChangeContext {
            files: vec![
                ChangedFile::new("src/main/java/auth/TokenService.java", FileStatus::Modified)
                    .with_added(&[
                        "@PreAuthorize(\"hasRole('ADMIN')\")",
                        "String secret = load();",
                    ]),
            ],
            commit_messages: vec![],
        };
        let quiet = RiskCalculator.calculate(&order_facts(), &GitChangeContext::default());
        let loud = RiskCalculator.calculate(&order_facts(), &git);
        assert!(loud.score > quiet.score);
        assert_eq!(loud.components["git.sensitive_keywords"], 18.0);
    }

    fn arb_blast() -> impl Strategy<Value = BlastRadius> {
        (0usize..30, 0usize..30, 0usize..30, 0usize..30, 0usize..6, 0usize..25).prop_map(
            |(dc, de, ic, ie, layers, classes)| BlastRadius {
                direct_callers: keys("dc", dc),
                direct_callees: keys("de", de),
                indirect_callers: keys("ic", ic),
                indirect_callees: keys("ie", ie),
                layers_touched: Layer::ALL.into_iter().take(layers).collect(),
                total_classes: classes,
            },
        )
    }

    fn arb_arch() -> impl Strategy<Value = ClassArchitecture> {
        (0usize..30, 0usize..5, 0usize..4, any::<bool>(), any::<bool>(), 0usize..9).prop_map(
            |(deps, ifaces, parents, is_abstract, is_interface, layer)| {
                let mut arch = architecture("X", Layer::ALL[layer], deps);
                arch.interfaces = (0..ifaces).map(|i| format!("I{i}")).collect();
                arch.parent_types = (0..parents).map(|i| format!("P{i}")).collect();
                arch.is_abstract = is_abstract;
                arch.is_interface = is_interface;
                arch
            },
        )
    }

    proptest! {
        #[test]
        fn prop_scores_stay_in_range(
            arch in arb_arch(),
            blast in arb_blast(),
            added in 0usize..3000,
            deleted in 0usize..3000,
        ) {
            let mut facts = order_facts();
            for m in facts.methods.iter_mut() {
                m.architecture = Some(arch.clone());
                m.blast_radius = Some(blast.clone());
            }
            let mut file = ChangedFile::new("db/migration/V1__init.sql", FileStatus::Deleted);
            file.added_lines = added;
            file.deleted_lines = deleted;
            let git = GitChangeContext {
                files: vec![file],
                commit_messages: vec!["feat: order api".into()],
            };

            let risk = RiskCalculator.calculate(&facts, &git);
            let intent = IntentCalculator.calculate(&facts, &git);
            for breakdown in [risk, intent] {
                prop_assert!((0.0..=100.0).contains(&breakdown.score));
                prop_assert!((0.0..=100.0).contains(&breakdown.git));
            }
        }

        #[test]
        fn prop_more_callers_never_lowers_blast_risk(blast in arb_blast(), extra in 1usize..15) {
            let mut bigger = blast.clone();
            bigger.direct_callers.extend(keys("extra", extra));
            prop_assert!(blast_risk(&bigger) >= blast_risk(&blast));
        }

        #[test]
        fn prop_degraded_facts_never_raise_risk(arch in arb_arch(), blast in arb_blast()) {
            let mut facts = order_facts();
            for m in facts.methods.iter_mut() {
                m.architecture = Some(arch.clone());
                m.blast_radius = Some(blast.clone());
            }
            let full = RiskCalculator.calculate(&facts, &GitChangeContext::default());
            for m in facts.methods.iter_mut() {
                *m = MethodFacts::default();
            }
            let degraded = RiskCalculator.calculate(&facts, &GitChangeContext::default());
            prop_assert!(degraded.score <= full.score);
        }
    }
}
