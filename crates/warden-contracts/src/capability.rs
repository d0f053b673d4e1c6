//! Capability records granted to domains.
//!
//! A capability is the unit of authorization: one origin, one restricted
//! method, an optional list of caveats constraining how the method may be
//! called. Capabilities are created by the grant workflow and are never
//! mutated afterwards — revocation or re-grant replaces the whole record.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::caveat::{sort_caveats, Caveat};

/// The JSON-LD context URI stamped on every emitted capability object.
pub const CAPABILITY_CONTEXT: &str = "https://w3id.org/ocap/v1";

/// An immutable record granting one origin the right to invoke one method.
///
/// Serialization produces exactly the fields below (with `caveats` omitted
/// when absent); there is no hidden state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    /// JSON-LD framing tag: a constant one-element list of context URIs.
    #[serde(rename = "@context")]
    pub context: Vec<String>,

    /// The method name this capability authorizes.
    pub parent_capability: String,

    /// The origin the capability was granted to.
    pub invoker: String,

    /// Fresh opaque identifier assigned at creation.
    pub id: String,

    /// Creation time, in milliseconds since the Unix epoch.
    pub date: i64,

    /// Constraints applied around every invocation, kept in canonical order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caveats: Option<Vec<Caveat>>,
}

impl Capability {
    /// Construct a capability for `method`, granted to `invoker`.
    ///
    /// Stamps a fresh UUID `id`, the current wall-clock `date`, and the fixed
    /// `@context`. Supplied caveats are brought into canonical order, so
    /// every stored capability satisfies the ordering invariant at the
    /// source.
    pub fn new(
        method: impl Into<String>,
        invoker: impl Into<String>,
        caveats: Option<Vec<Caveat>>,
    ) -> Self {
        let caveats = caveats.map(|mut list| {
            sort_caveats(&mut list);
            list
        });

        Self {
            context: vec![CAPABILITY_CONTEXT.to_string()],
            parent_capability: method.into(),
            invoker: invoker.into(),
            id: uuid::Uuid::new_v4().to_string(),
            date: Utc::now().timestamp_millis(),
            caveats,
        }
    }
}
