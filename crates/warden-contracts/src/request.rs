//! Permission-request payloads and origin identity.
//!
//! A [`PermissionRequest`] is a pending interactive proposal to grant one or
//! more capabilities to one origin. It lives in the store's pending queue
//! while the user-approval future is outstanding and is removed on every
//! terminal outcome.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::caveat::Caveat;

/// The identity of a requester as seen by the middleware host.
///
/// The host supplies this when it curries the middleware for a connection;
/// requesters never choose their own origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginMetadata {
    /// String uniquely identifying the requester.
    pub origin: String,

    /// Request-correlation token; assigned when missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl OriginMetadata {
    /// Metadata for `origin` with no pre-assigned correlation id.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            id: None,
        }
    }
}

/// What a domain asks for: method name → requested constraints.
pub type RequestedPermissions = BTreeMap<String, PermissionDescriptor>;

/// The per-method body of a permission request.
///
/// Unknown extra fields supplied by callers are ignored; only the caveats
/// carry meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionDescriptor {
    /// Constraints the requester proposes for the capability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caveats: Option<Vec<Caveat>>,
}

/// Correlation metadata attached to a pending permission request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Unique token keying the pending queue.
    pub id: String,

    /// The requesting origin, always host-assigned.
    pub origin: String,

    /// Extra caller-supplied metadata, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A pending interactive proposal to grant capabilities to one origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRequest {
    /// The origin that would receive the capabilities.
    pub origin: String,

    /// Correlation metadata; `metadata.id` keys the pending queue.
    pub metadata: RequestMetadata,

    /// The requested method → descriptor mapping, caveats canonicalized.
    pub permissions: RequestedPermissions,
}
