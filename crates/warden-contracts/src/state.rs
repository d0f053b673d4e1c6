//! The published permissions state shape.
//!
//! This is the complete snapshot handed to the external state container on
//! every mutation, and the shape a host restores domains from. The wire
//! format is exactly the serde field names below.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{capability::Capability, request::PermissionRequest};

/// All capabilities held by one domain.
///
/// Invariants maintained by the store: at most one capability per
/// `parentCapability`, and no entry with an empty `permissions` list is ever
/// kept (the domain key is deleted instead).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainEntry {
    /// The domain's capabilities, one per authorized method.
    pub permissions: Vec<Capability>,
}

/// Complete snapshot of the middleware's state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsState {
    /// origin → capabilities held.
    pub domains: BTreeMap<String, DomainEntry>,

    /// Permission requests awaiting user approval, in arrival order.
    pub permissions_requests: Vec<PermissionRequest>,

    /// method name → human-readable description, derived from the
    /// restricted-method table at construction. Read-only thereafter.
    pub permissions_descriptions: BTreeMap<String, String>,
}
