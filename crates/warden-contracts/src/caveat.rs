//! Caveats: typed constraints attached to a capability.
//!
//! A caveat names an enforcer in the caveat registry (`type`) and carries
//! opaque data for it (`value`). The registry turns each stored caveat into
//! a pipeline stage around the restricted method it constrains.
//!
//! Caveat lists are kept in a canonical order so that two lists which are
//! equal as multisets compare equal element-wise: ascending by `type`, ties
//! broken by the canonical JSON serialization of `value`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caveat type name for the built-in request-params filter.
pub const FILTER_PARAMS: &str = "filterParams";

/// Caveat type name for the built-in response-result filter.
pub const FILTER_RESPONSE: &str = "filterResponse";

/// A single constraint stored on a capability.
///
/// Two caveats are equal iff their `type` names are equal and their `value`
/// payloads are structurally deep-equal (the derived `PartialEq`;
/// `serde_json::Value` equality is structural).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caveat {
    /// Names the enforcer in the caveat registry.
    #[serde(rename = "type")]
    pub kind: String,

    /// Opaque payload consumed by the enforcer.
    pub value: Value,
}

impl Caveat {
    /// Construct a caveat of the given type with the given payload.
    pub fn new(kind: impl Into<String>, value: Value) -> Self {
        Self {
            kind: kind.into(),
            value,
        }
    }
}

/// Stable serialization used to order caveat payloads.
///
/// serde_json's default map is key-sorted, so two structurally equal values
/// always produce identical strings.
fn canonical_value(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Sort `caveats` into canonical order, in place.
///
/// Ascending by `type`, ties broken by the canonical serialization of
/// `value`. Idempotent; two lists that are equal as multisets sort to
/// identical sequences.
pub fn sort_caveats(caveats: &mut [Caveat]) {
    caveats.sort_by(|a, b| match a.kind.cmp(&b.kind) {
        Ordering::Equal => canonical_value(&a.value).cmp(&canonical_value(&b.value)),
        other => other,
    });
}

/// Multiset equality for optional caveat lists.
///
/// Precondition: both lists are already in canonical order, under which
/// multiset equality reduces to element-wise equality. Absent on both sides
/// counts as equal; one-sided absence or a length mismatch fails.
pub fn caveats_equal(a: Option<&[Caveat]>, b: Option<&[Caveat]>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}
