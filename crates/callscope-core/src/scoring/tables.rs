//! Tier tables shared by the calculators.
//!
//! Threshold tables are ordered from the highest threshold down; the first
//! threshold the value reaches wins, and a value below all of them scores 0.

use crate::graph::model::Layer;

pub(crate) type Tiers = &'static [(usize, f64)];

/// Score of the first tier whose threshold `value` reaches.
pub(crate) fn tier(value: usize, tiers: Tiers) -> f64 {
    tiers
        .iter()
        .find(|(threshold, _)| value >= *threshold)
        .map(|(_, score)| *score)
        .unwrap_or(0.0)
}

/// Whether `text` contains `term` as a whole word, ignoring ASCII case.
///
/// Word edges are non-alphanumeric characters and camel-case humps, so
/// `OrderDto` holds `dto` while `capital` does not hold `api`. A trailing
/// plural `s` is allowed.
pub(crate) fn contains_term(text: &str, term: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let term: Vec<char> = term.chars().map(|c| c.to_ascii_lowercase()).collect();
    if term.is_empty() || term.len() > chars.len() {
        return false;
    }

    let starts_word = |at: usize| {
        at == 0
            || !chars[at - 1].is_alphanumeric()
            || (chars[at].is_uppercase() && !chars[at - 1].is_uppercase())
    };
    let ends_word = |at: usize| {
        let hump = || {
            chars[at - 1].is_lowercase() || chars.get(at + 1).is_some_and(|c| c.is_lowercase())
        };
        at == chars.len() || !chars[at].is_alphanumeric() || (chars[at].is_uppercase() && hump())
    };
    let plural_end = |at: usize| {
        at < chars.len() && chars[at].eq_ignore_ascii_case(&'s') && ends_word(at + 1)
    };

    (0..=chars.len() - term.len()).any(|start| {
        let end = start + term.len();
        let matched = chars[start..end]
            .iter()
            .zip(&term)
            .all(|(c, t)| c.to_ascii_lowercase() == *t);
        matched && starts_word(start) && (ends_word(end) || plural_end(end))
    })
}

// Intent

pub(crate) const CALLER_FREQUENCY: Tiers = &[(10, 15.0), (5, 10.0), (2, 5.0)];
pub(crate) const DEPENDENCY_BONUS: Tiers = &[(5, 5.0), (2, 3.0), (1, 1.0)];
pub(crate) const BLAST_INFLUENCE: Tiers = &[(20, 30.0), (10, 20.0), (5, 15.0), (1, 8.0)];
pub(crate) const INTENT_CHANGE_SIZE: Tiers =
    &[(500, 20.0), (200, 15.0), (50, 10.0), (10, 5.0), (1, 2.0)];

pub(crate) const BUSINESS_METHOD_KEYWORDS: &[&str] = &[
    "create", "update", "delete", "save", "submit", "process", "pay", "order", "register", "login",
    "checkout", "refund", "cancel", "approve",
];

pub(crate) const BUSINESS_CHANGE_KEYWORDS: &[&str] = &[
    "order", "payment", "user", "product", "auth", "checkout", "feature", "feat", "implement",
    "support",
];

pub(crate) const ENDPOINT_ANNOTATIONS: &[&str] = &[
    "@GetMapping",
    "@PostMapping",
    "@PutMapping",
    "@DeleteMapping",
    "@PatchMapping",
    "@RequestMapping",
];

pub(crate) const API_KEYWORDS: &[&str] =
    &["api", "endpoint", "rest", "dto", "request", "response", "public"];

pub(crate) fn downstream_layer_score(layer: Layer) -> f64 {
    match layer {
        Layer::Service => 15.0,
        Layer::Repository | Layer::Mapper => 12.0,
        Layer::Component => 8.0,
        Layer::Util => 5.0,
        _ => 3.0,
    }
}

pub(crate) fn upstream_layer_score(layer: Layer) -> f64 {
    match layer {
        Layer::Controller => 15.0,
        Layer::Service => 10.0,
        Layer::Component => 8.0,
        _ => 5.0,
    }
}

pub(crate) fn position_layer_score(layer: Layer) -> f64 {
    match layer {
        Layer::Service => 20.0,
        Layer::Controller => 15.0,
        Layer::Repository | Layer::Mapper => 12.0,
        Layer::Component => 10.0,
        Layer::Util | Layer::Config => 5.0,
        Layer::Entity => 3.0,
        Layer::Unknown => 0.0,
    }
}

pub(crate) fn cross_layer_score(distinct_layers: usize) -> f64 {
    match distinct_layers {
        0 => 0.0,
        1 => 5.0,
        2 => 10.0,
        3 => 15.0,
        _ => 20.0,
    }
}

/// Peaks for moderately connected classes.
pub(crate) fn dependency_complexity_score(dependencies: usize) -> f64 {
    match dependencies {
        5..=10 => 15.0,
        3..=4 | 11..=15 => 10.0,
        1..=2 | 16..=20 => 5.0,
        _ => 0.0,
    }
}

/// Peaks for two-hop paths.
pub(crate) fn path_length_score(hops: usize) -> f64 {
    match hops {
        2 => 30.0,
        1 | 3 => 20.0,
        4 => 10.0,
        _ => 5.0,
    }
}

// Risk

pub(crate) const DEPENDENCY_RISK: Tiers = &[(20, 40.0), (10, 30.0), (5, 20.0), (1, 10.0)];
pub(crate) const INTERFACE_RISK: Tiers = &[(3, 25.0), (1, 15.0)];
pub(crate) const DIRECT_CALLER_RISK: Tiers = &[(10, 25.0), (5, 18.0), (2, 12.0), (1, 6.0)];
pub(crate) const INDIRECT_CALLER_RISK: Tiers = &[(20, 20.0), (10, 15.0), (3, 10.0), (1, 5.0)];
pub(crate) const LAYERS_TOUCHED_RISK: Tiers = &[(4, 20.0), (3, 15.0), (2, 8.0)];
pub(crate) const TOTAL_CLASSES_RISK: Tiers = &[(15, 15.0), (8, 10.0), (3, 5.0)];
pub(crate) const CHAIN_LENGTH_RISK: Tiers = &[(5, 25.0), (4, 20.0), (3, 10.0)];
pub(crate) const RISK_CHANGE_SIZE: Tiers = &[(1000, 20.0), (500, 15.0), (200, 10.0), (50, 5.0)];
pub(crate) const DELETION_VOLUME: Tiers = &[(500, 15.0), (200, 10.0), (50, 5.0)];

/// Matched as whole words, case-insensitively; each keyword counts once per
/// change.
pub(crate) const SENSITIVE_KEYWORDS: &[(&str, f64)] = &[
    ("drop table", 15.0),
    ("truncate", 15.0),
    ("delete from", 12.0),
    ("alter table", 10.0),
    ("@transactional", 8.0),
    ("@preauthorize", 8.0),
    ("@secured", 8.0),
    ("password", 10.0),
    ("secret", 10.0),
    ("credential", 10.0),
    ("private_key", 12.0),
    ("token", 6.0),
];
