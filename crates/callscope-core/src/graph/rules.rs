//! Layer transition rules used for violation detection.

use super::model::Layer;

/// Layers each source layer may call. Layers absent from the table are not
/// constrained by it.
const ALLOWED_TRANSITIONS: &[(Layer, &[Layer])] = &[
    (Layer::Controller, &[Layer::Service]),
    (Layer::Service, &[Layer::Repository, Layer::Util]),
    (Layer::Repository, &[]),
    (Layer::Util, &[]),
];

/// Allowed targets for a source layer, if the layer is in the table.
pub fn allowed_targets(from: Layer) -> Option<&'static [Layer]> {
    ALLOWED_TRANSITIONS
        .iter()
        .find(|(layer, _)| *layer == from)
        .map(|(_, targets)| *targets)
}

/// Position in the CONTROLLER > SERVICE > REPOSITORY/UTIL ordering.
fn rank(layer: Layer) -> Option<u8> {
    match layer {
        Layer::Controller => Some(0),
        Layer::Service => Some(1),
        Layer::Repository | Layer::Util => Some(2),
        _ => None,
    }
}

/// Whether a call from `from` to `to` breaks the layering.
///
/// A source with a non-empty allowed set may only call into that set. Calls
/// that climb back up the ordering are violations for every ranked source,
/// which is what flags REPOSITORY -> CONTROLLER.
pub fn is_violation(from: Layer, to: Layer) -> bool {
    if let Some(targets) = allowed_targets(from) {
        if !targets.is_empty() && !targets.contains(&to) {
            return true;
        }
    }
    matches!((rank(from), rank(to)), (Some(f), Some(t)) if t < f)
}

/// Count violating transitions along a layer sequence.
pub fn count_violations(layers: &[Layer]) -> usize {
    layers.windows(2).filter(|w| is_violation(w[0], w[1])).count()
}
