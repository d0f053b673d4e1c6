//! The per-origin capability store and pending-request queue.
//!
//! `PermissionStore` keeps the complete [`PermissionsState`] behind a
//! `Mutex` and publishes a snapshot through [`StateListener`] after every
//! mutation — the external state container's `update` operation. All
//! operations are synchronous; the store never suspends.
//!
//! # Invariants
//!
//! - At most one capability per (origin, method).
//! - No empty domain entry persists: removing a domain's last capability
//!   deletes the domain key.
//! - Every stored caveat list is in canonical order.
//!
//! # Thread safety
//!
//! All operations acquire the mutex internally. A poisoned lock surfaces as
//! `WardenError::StateAccess` rather than a panic.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use warden_contracts::{
    capability::Capability,
    caveat::{caveats_equal, sort_caveats},
    error::{WardenError, WardenResult},
    request::{PermissionRequest, RequestedPermissions},
    state::{DomainEntry, PermissionsState},
};

/// Receives every published snapshot of the permissions state.
///
/// The external state container implements this to persist or observe the
/// store; the store itself owns no persistence.
pub trait StateListener: Send + Sync {
    /// Called with the full state after each mutation (and once at
    /// construction with the initial state).
    fn on_update(&self, state: &PermissionsState);
}

/// The in-memory permission registry.
pub struct PermissionStore {
    state: Mutex<PermissionsState>,
    listener: Option<Arc<dyn StateListener>>,
}

impl PermissionStore {
    /// Create a store over `initial`, publishing it immediately.
    pub fn new(initial: PermissionsState, listener: Option<Arc<dyn StateListener>>) -> Self {
        if let Some(listener) = &listener {
            listener.on_update(&initial);
        }
        Self {
            state: Mutex::new(initial),
            listener,
        }
    }

    fn read<T>(&self, f: impl FnOnce(&PermissionsState) -> T) -> WardenResult<T> {
        let state = self.state.lock().map_err(|e| WardenError::StateAccess {
            reason: format!("state lock poisoned: {e}"),
        })?;
        Ok(f(&state))
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut PermissionsState) -> T) -> WardenResult<T> {
        let mut state = self.state.lock().map_err(|e| WardenError::StateAccess {
            reason: format!("state lock poisoned: {e}"),
        })?;
        let out = f(&mut state);
        if let Some(listener) = &self.listener {
            listener.on_update(&state);
        }
        Ok(out)
    }

    /// A snapshot of the complete current state.
    pub fn current(&self) -> WardenResult<PermissionsState> {
        self.read(Clone::clone)
    }

    // ── Domain capabilities ───────────────────────────────────────────────────

    /// All domain entries, keyed by origin.
    pub fn get_domains(&self) -> WardenResult<BTreeMap<String, DomainEntry>> {
        self.read(|s| s.domains.clone())
    }

    /// Every capability the domain currently holds. Empty for unknown
    /// origins.
    pub fn get_permissions_for_domain(&self, origin: &str) -> WardenResult<Vec<Capability>> {
        self.read(|s| {
            s.domains
                .get(origin)
                .map(|entry| entry.permissions.clone())
                .unwrap_or_default()
        })
    }

    /// The first capability on the domain authorizing `method`, if any.
    pub fn get_permission(&self, origin: &str, method: &str) -> WardenResult<Option<Capability>> {
        self.read(|s| {
            s.domains.get(origin).and_then(|entry| {
                entry
                    .permissions
                    .iter()
                    .find(|cap| cap.parent_capability == method)
                    .cloned()
            })
        })
    }

    /// Multiset subset check: true iff for every requested method the domain
    /// holds a capability whose caveats are multiset-equal to the requested
    /// ones.
    ///
    /// Precondition: the requested caveat lists are already in canonical
    /// order — the store compares element-wise and does not re-sort input.
    pub fn has_permissions(
        &self,
        origin: &str,
        requested: &RequestedPermissions,
    ) -> WardenResult<bool> {
        self.read(|s| {
            let Some(entry) = s.domains.get(origin) else {
                return requested.is_empty();
            };
            requested.iter().all(|(method, descriptor)| {
                entry.permissions.iter().any(|cap| {
                    cap.parent_capability == *method
                        && caveats_equal(cap.caveats.as_deref(), descriptor.caveats.as_deref())
                })
            })
        })
    }

    /// Grant a fresh capability for each method in `permissions`, replacing
    /// any existing capability for the same method. Other capabilities are
    /// untouched.
    pub fn add_permissions_for(
        &self,
        origin: &str,
        permissions: &RequestedPermissions,
    ) -> WardenResult<()> {
        if permissions.is_empty() {
            return Ok(());
        }
        self.mutate(|state| {
            let entry = state.domains.entry(origin.to_string()).or_default();
            for (method, descriptor) in permissions {
                entry
                    .permissions
                    .retain(|cap| cap.parent_capability != *method);
                entry.permissions.push(Capability::new(
                    method.clone(),
                    origin.to_string(),
                    descriptor.caveats.clone(),
                ));
                info!(origin = %origin, method = %method, "capability granted");
            }
        })
    }

    /// Remove every capability whose method appears in `methods`. A domain
    /// left with no capabilities is deleted entirely.
    pub fn remove_permissions_for(&self, origin: &str, methods: &[String]) -> WardenResult<()> {
        self.mutate(|state| {
            if let Some(entry) = state.domains.get_mut(origin) {
                entry
                    .permissions
                    .retain(|cap| !methods.contains(&cap.parent_capability));
                if entry.permissions.is_empty() {
                    state.domains.remove(origin);
                }
                debug!(origin = %origin, removed = methods.len(), "capabilities removed");
            }
        })
    }

    /// Store `entry` for `origin`, or delete the origin's key entirely when
    /// `entry.permissions` is empty. Host-supplied caveat lists are brought
    /// into canonical order on the way in.
    pub fn set_domain(&self, origin: &str, mut entry: DomainEntry) -> WardenResult<()> {
        self.mutate(|state| {
            if entry.permissions.is_empty() {
                state.domains.remove(origin);
            } else {
                for cap in &mut entry.permissions {
                    if let Some(caveats) = cap.caveats.as_mut() {
                        sort_caveats(caveats);
                    }
                }
                state.domains.insert(origin.to_string(), entry);
            }
        })
    }

    /// Replace the domain registry with the empty mapping.
    pub fn clear_domains(&self) -> WardenResult<()> {
        self.mutate(|state| {
            state.domains.clear();
            info!("all domains cleared");
        })
    }

    // ── Pending permission requests ───────────────────────────────────────────

    /// The pending queue, in arrival order.
    pub fn get_permissions_requests(&self) -> WardenResult<Vec<PermissionRequest>> {
        self.read(|s| s.permissions_requests.clone())
    }

    /// Enqueue a pending request.
    pub fn add_permissions_request(&self, request: PermissionRequest) -> WardenResult<()> {
        self.mutate(|state| {
            debug!(
                origin = %request.origin,
                request_id = %request.metadata.id,
                "permission request enqueued"
            );
            state.permissions_requests.push(request);
        })
    }

    /// Drop the pending request keyed by `id`. A no-op when absent — the
    /// request may already have been finalized or cancelled by the host.
    pub fn remove_permissions_request(&self, id: &str) -> WardenResult<()> {
        self.mutate(|state| {
            state.permissions_requests.retain(|r| r.metadata.id != id);
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use warden_contracts::{
        capability::Capability,
        caveat::{Caveat, FILTER_PARAMS, FILTER_RESPONSE},
        request::{PermissionDescriptor, PermissionRequest, RequestMetadata, RequestedPermissions},
        state::{DomainEntry, PermissionsState},
    };

    use super::{PermissionStore, StateListener};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn store() -> PermissionStore {
        PermissionStore::new(PermissionsState::default(), None)
    }

    fn requested(entries: &[(&str, Option<Vec<Caveat>>)]) -> RequestedPermissions {
        entries
            .iter()
            .map(|(method, caveats)| {
                (
                    method.to_string(),
                    PermissionDescriptor {
                        caveats: caveats.clone(),
                    },
                )
            })
            .collect()
    }

    fn pending(origin: &str, id: &str) -> PermissionRequest {
        PermissionRequest {
            origin: origin.to_string(),
            metadata: RequestMetadata {
                id: id.to_string(),
                origin: origin.to_string(),
                extra: serde_json::Map::new(),
            },
            permissions: requested(&[("readContacts", None)]),
        }
    }

    /// Counts published snapshots and remembers the last one.
    struct RecordingListener {
        snapshots: Arc<Mutex<Vec<PermissionsState>>>,
    }

    impl StateListener for RecordingListener {
        fn on_update(&self, state: &PermissionsState) {
            self.snapshots.lock().unwrap().push(state.clone());
        }
    }

    // ── Domain CRUD ───────────────────────────────────────────────────────────

    #[test]
    fn grant_then_lookup() {
        let store = store();
        store
            .add_permissions_for("o1", &requested(&[("readContacts", None)]))
            .unwrap();

        let caps = store.get_permissions_for_domain("o1").unwrap();
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].parent_capability, "readContacts");
        assert_eq!(caps[0].invoker, "o1");

        let found = store.get_permission("o1", "readContacts").unwrap();
        assert!(found.is_some());
        assert!(store.get_permission("o1", "writeContacts").unwrap().is_none());
        assert!(store.get_permission("o2", "readContacts").unwrap().is_none());
    }

    #[test]
    fn regrant_replaces_the_existing_capability() {
        let store = store();
        store
            .add_permissions_for("o1", &requested(&[("readContacts", None)]))
            .unwrap();
        let first_id = store.get_permission("o1", "readContacts").unwrap().unwrap().id;

        store
            .add_permissions_for(
                "o1",
                &requested(&[(
                    "readContacts",
                    Some(vec![Caveat::new(FILTER_PARAMS, json!([]))]),
                )]),
            )
            .unwrap();

        let caps = store.get_permissions_for_domain("o1").unwrap();
        assert_eq!(caps.len(), 1, "re-grant must leave exactly one capability");
        assert_ne!(caps[0].id, first_id, "the replacement is a fresh record");
        assert!(caps[0].caveats.is_some());
    }

    #[test]
    fn grant_leaves_other_capabilities_untouched() {
        let store = store();
        store
            .add_permissions_for("o1", &requested(&[("readContacts", None)]))
            .unwrap();
        store
            .add_permissions_for("o1", &requested(&[("readAccounts", None)]))
            .unwrap();

        let caps = store.get_permissions_for_domain("o1").unwrap();
        assert_eq!(caps.len(), 2);
    }

    #[test]
    fn empty_grant_creates_no_domain_entry() {
        let store = store();
        store
            .add_permissions_for("o1", &RequestedPermissions::new())
            .unwrap();
        assert!(store.get_domains().unwrap().is_empty());
    }

    #[test]
    fn remove_permissions_drops_emptied_domains() {
        let store = store();
        store
            .add_permissions_for(
                "o1",
                &requested(&[("readContacts", None), ("readAccounts", None)]),
            )
            .unwrap();

        store
            .remove_permissions_for("o1", &["readContacts".to_string()])
            .unwrap();
        assert_eq!(store.get_permissions_for_domain("o1").unwrap().len(), 1);

        store
            .remove_permissions_for("o1", &["readAccounts".to_string()])
            .unwrap();
        assert!(
            !store.get_domains().unwrap().contains_key("o1"),
            "a domain with no capabilities must not persist"
        );
    }

    #[test]
    fn set_domain_with_empty_permissions_deletes_the_key() {
        let store = store();
        store
            .add_permissions_for("o1", &requested(&[("readContacts", None)]))
            .unwrap();

        store
            .set_domain("o1", DomainEntry { permissions: vec![] })
            .unwrap();

        assert!(!store.get_domains().unwrap().contains_key("o1"));
    }

    #[test]
    fn set_domain_canonicalizes_host_supplied_caveats() {
        let store = store();
        // Build a capability whose caveats are deliberately out of order.
        let mut cap = Capability::new("m", "o1", None);
        cap.caveats = Some(vec![
            Caveat::new(FILTER_RESPONSE, json!([1])),
            Caveat::new(FILTER_PARAMS, json!([2])),
        ]);

        store
            .set_domain("o1", DomainEntry { permissions: vec![cap] })
            .unwrap();

        let stored = store.get_permission("o1", "m").unwrap().unwrap();
        let kinds: Vec<&str> = stored
            .caveats
            .as_ref()
            .unwrap()
            .iter()
            .map(|c| c.kind.as_str())
            .collect();
        assert_eq!(kinds, vec![FILTER_PARAMS, FILTER_RESPONSE]);
    }

    #[test]
    fn clear_domains_empties_the_registry() {
        let store = store();
        store
            .add_permissions_for("o1", &requested(&[("a", None)]))
            .unwrap();
        store
            .add_permissions_for("o2", &requested(&[("b", None)]))
            .unwrap();

        store.clear_domains().unwrap();
        assert!(store.get_domains().unwrap().is_empty());
    }

    // ── has_permissions ───────────────────────────────────────────────────────

    #[test]
    fn has_permissions_exact_match() {
        let store = store();
        store
            .add_permissions_for("o1", &requested(&[("readContacts", None)]))
            .unwrap();

        assert!(store
            .has_permissions("o1", &requested(&[("readContacts", None)]))
            .unwrap());
        assert!(!store
            .has_permissions("o1", &requested(&[("writeContacts", None)]))
            .unwrap());
        assert!(!store
            .has_permissions("o2", &requested(&[("readContacts", None)]))
            .unwrap());
    }

    #[test]
    fn has_permissions_requires_every_requested_method() {
        let store = store();
        store
            .add_permissions_for("o1", &requested(&[("readContacts", None)]))
            .unwrap();

        assert!(!store
            .has_permissions(
                "o1",
                &requested(&[("readContacts", None), ("readAccounts", None)]),
            )
            .unwrap());
    }

    #[test]
    fn has_permissions_compares_caveats_as_multisets() {
        let a = Caveat::new(FILTER_PARAMS, json!([1]));
        let b = Caveat::new(FILTER_RESPONSE, json!(["x"]));

        let store = store();
        // Stored via Capability::new, which canonicalizes.
        store
            .add_permissions_for(
                "o1",
                &requested(&[("m", Some(vec![b.clone(), a.clone()]))]),
            )
            .unwrap();

        // Same multiset, supplied pre-sorted (the caller's obligation).
        assert!(store
            .has_permissions("o1", &requested(&[("m", Some(vec![a.clone(), b.clone()]))]))
            .unwrap());

        // Different caveat payload fails.
        let other = Caveat::new(FILTER_PARAMS, json!([2]));
        assert!(!store
            .has_permissions("o1", &requested(&[("m", Some(vec![other, b.clone()]))]))
            .unwrap());

        // Length mismatch fails.
        assert!(!store
            .has_permissions("o1", &requested(&[("m", Some(vec![a]))]))
            .unwrap());

        // One-sided absence fails.
        assert!(!store.has_permissions("o1", &requested(&[("m", None)])).unwrap());
    }

    // ── Pending queue ─────────────────────────────────────────────────────────

    #[test]
    fn pending_requests_are_kept_in_arrival_order() {
        let store = store();
        store.add_permissions_request(pending("o1", "r1")).unwrap();
        store.add_permissions_request(pending("o2", "r2")).unwrap();

        let queue = store.get_permissions_requests().unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].metadata.id, "r1");
        assert_eq!(queue[1].metadata.id, "r2");
    }

    #[test]
    fn remove_request_by_id_is_a_noop_when_absent() {
        let store = store();
        store.add_permissions_request(pending("o1", "r1")).unwrap();

        store.remove_permissions_request("r1").unwrap();
        assert!(store.get_permissions_requests().unwrap().is_empty());

        // Removing again must not fail.
        store.remove_permissions_request("r1").unwrap();
        assert!(store.get_permissions_requests().unwrap().is_empty());
    }

    // ── Publish-on-update ─────────────────────────────────────────────────────

    #[test]
    fn every_mutation_publishes_a_snapshot() {
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let listener = Arc::new(RecordingListener {
            snapshots: snapshots.clone(),
        });
        let store = PermissionStore::new(PermissionsState::default(), Some(listener));

        // Construction publishes the initial state.
        assert_eq!(snapshots.lock().unwrap().len(), 1);

        store
            .add_permissions_for("o1", &requested(&[("readContacts", None)]))
            .unwrap();
        store
            .remove_permissions_for("o1", &["readContacts".to_string()])
            .unwrap();

        let published = snapshots.lock().unwrap();
        assert_eq!(published.len(), 3);
        assert!(published[1].domains.contains_key("o1"));
        assert!(!published[2].domains.contains_key("o1"));
    }

    #[test]
    fn reads_do_not_publish() {
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let listener = Arc::new(RecordingListener {
            snapshots: snapshots.clone(),
        });
        let store = PermissionStore::new(PermissionsState::default(), Some(listener));

        store.get_domains().unwrap();
        store.get_permissions_for_domain("o1").unwrap();
        store.current().unwrap();

        assert_eq!(snapshots.lock().unwrap().len(), 1, "only construction published");
    }
}
