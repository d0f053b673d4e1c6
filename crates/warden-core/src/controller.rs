//! The controller façade: wiring for store, registry, router and workflow.
//!
//! `PermissionsController` is the single entry point a host embeds. It owns
//! the permission store, the caveat registry, the restricted-method table
//! and the approval seam, and exposes:
//!
//! - the middleware entry point ([`PermissionsController::handle_request`]),
//! - a curried per-origin handle ([`PermissionsController::for_origin`]),
//! - the host-side admin surface (grants, revocations, queue management).

use std::collections::BTreeMap;
use std::sync::Arc;

use jsonschema::Validator;
use serde_json::json;
use tracing::{debug, warn};

use warden_caveats::CaveatRegistry;
use warden_contracts::{
    capability::Capability,
    error::{WardenError, WardenResult},
    request::{OriginMetadata, PermissionRequest, RequestedPermissions},
    rpc::{RpcError, RpcRequest, RpcResponse},
    state::{DomainEntry, PermissionsState},
};
use warden_store::{PermissionStore, StateListener};

use crate::executor;
use crate::router::{classify, get_method_key_for, MethodClass};
use crate::traits::{ApprovalHandler, RestrictedMethod};

/// What the transport should do with the response after the middleware ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// The method is safe: forward the untouched request downstream.
    Continue,

    /// The middleware produced a result or error; do not forward.
    End,
}

/// Configuration consumed by [`PermissionsController::new`].
#[derive(Default)]
pub struct ControllerConfig {
    /// Method names always passed through without authorization.
    pub safe_methods: Vec<String>,

    /// The restricted-method table: name → description + implementation.
    pub restricted_methods: BTreeMap<String, RestrictedMethod>,

    /// Prefix for the `getPermissions` / `requestPermissions` internal
    /// method names.
    pub method_prefix: String,

    /// Presents pending requests to the user. Required — construction fails
    /// without it.
    pub request_user_approval: Option<Arc<dyn ApprovalHandler>>,

    /// Caveat enforcers. Defaults to the built-in filters.
    pub caveat_registry: Option<CaveatRegistry>,

    /// Receives every published state snapshot.
    pub state_listener: Option<Arc<dyn StateListener>>,

    /// Domains restored from a previous run. The pending queue always starts
    /// empty and descriptions are re-derived from the method table.
    pub restored_domains: Option<BTreeMap<String, DomainEntry>>,
}

/// The capability-based permissions middleware.
pub struct PermissionsController {
    pub(crate) safe_methods: Vec<String>,
    pub(crate) restricted_methods: BTreeMap<String, RestrictedMethod>,
    pub(crate) method_prefix: String,
    pub(crate) approval: Arc<dyn ApprovalHandler>,
    pub(crate) caveats: CaveatRegistry,
    pub(crate) store: PermissionStore,
    pub(crate) request_validator: Validator,
}

/// Shape of `params[0]` for `requestPermissions`: a non-empty object mapping
/// method names to permission descriptors.
fn request_payload_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "minProperties": 1,
        "additionalProperties": { "type": "object" }
    })
}

impl PermissionsController {
    /// Build the controller and publish the initial state.
    ///
    /// # Errors
    ///
    /// Returns `WardenError::ConfigError` when `request_user_approval` is
    /// absent.
    pub fn new(config: ControllerConfig) -> WardenResult<Self> {
        let approval = config
            .request_user_approval
            .ok_or_else(|| WardenError::ConfigError {
                reason: "request_user_approval is required".to_string(),
            })?;

        let request_validator =
            jsonschema::validator_for(&request_payload_schema()).map_err(|e| {
                WardenError::ConfigError {
                    reason: format!("failed to compile permission-request schema: {e}"),
                }
            })?;

        let permissions_descriptions = config
            .restricted_methods
            .iter()
            .map(|(name, method)| (name.clone(), method.description.clone()))
            .collect();

        let initial = PermissionsState {
            domains: config.restored_domains.unwrap_or_default(),
            permissions_requests: Vec::new(),
            permissions_descriptions,
        };

        Ok(Self {
            safe_methods: config.safe_methods,
            restricted_methods: config.restricted_methods,
            method_prefix: config.method_prefix,
            approval,
            caveats: config.caveat_registry.unwrap_or_default(),
            store: PermissionStore::new(initial, config.state_listener),
            request_validator,
        })
    }

    /// The middleware entry point.
    ///
    /// Routing priority: safe pass-through, then the internal methods under
    /// the configured prefix, then restricted-method authorization. The only
    /// suspension point is the user-approval future inside
    /// `requestPermissions`; every other path completes synchronously.
    pub async fn handle_request(
        &self,
        origin: &OriginMetadata,
        req: &RpcRequest,
        res: &mut RpcResponse,
    ) -> Flow {
        match classify(&req.method, &self.safe_methods, &self.method_prefix) {
            MethodClass::Safe => {
                debug!(origin = %origin.origin, method = %req.method, "safe method passed through");
                Flow::Continue
            }
            MethodClass::GetPermissions => {
                self.handle_get_permissions(origin, res);
                Flow::End
            }
            MethodClass::RequestPermissions => {
                self.handle_request_permissions(origin, req, res).await;
                Flow::End
            }
            MethodClass::Restricted => {
                self.handle_restricted(origin, req, res);
                Flow::End
            }
        }
    }

    /// Bind this controller to one origin, yielding the standard middleware
    /// form with the origin argument curried away.
    pub fn for_origin(self: &Arc<Self>, origin: OriginMetadata) -> DomainMiddleware {
        DomainMiddleware {
            controller: Arc::clone(self),
            origin,
        }
    }

    // ── Restricted dispatch ───────────────────────────────────────────────────

    fn handle_restricted(&self, origin: &OriginMetadata, req: &RpcRequest, res: &mut RpcResponse) {
        let method_key = get_method_key_for(&req.method, &self.restricted_methods)
            .unwrap_or_default();

        let permission = match self.store.get_permission(&origin.origin, &method_key) {
            Ok(permission) => permission,
            Err(err) => {
                warn!(origin = %origin.origin, method = %req.method, error = %err, "permission lookup failed");
                res.error = Some(RpcError::internal(err.to_string()));
                return;
            }
        };

        let Some(permission) = permission else {
            debug!(origin = %origin.origin, method = %req.method, "no capability held; call refused");
            res.error = Some(RpcError::unauthorized(req));
            return;
        };

        // The capability references a restricted key; a missing table entry
        // means the host's method table and the stored state disagree.
        let Some(target) = self.restricted_methods.get(&method_key) else {
            warn!(method_key = %method_key, "capability held for a method with no implementation");
            res.error = Some(RpcError::method_not_found());
            return;
        };

        executor::execute(&self.caveats, target, &permission, req, res);
    }

    // ── Admin surface (host-callable, not over the wire) ─────────────────────

    /// Every capability the domain currently holds.
    pub fn get_permissions_for_domain(&self, origin: &str) -> WardenResult<Vec<Capability>> {
        self.store.get_permissions_for_domain(origin)
    }

    /// The first capability on the domain authorizing `method`, if any.
    pub fn get_permission(&self, origin: &str, method: &str) -> WardenResult<Option<Capability>> {
        self.store.get_permission(origin, method)
    }

    /// Multiset subset check over pre-canonicalized requested permissions.
    pub fn has_permissions(
        &self,
        origin: &str,
        requested: &RequestedPermissions,
    ) -> WardenResult<bool> {
        self.store.has_permissions(origin, requested)
    }

    /// All domain entries, keyed by origin.
    pub fn get_domains(&self) -> WardenResult<BTreeMap<String, DomainEntry>> {
        self.store.get_domains()
    }

    /// Store or delete a domain entry wholesale.
    pub fn set_domain(&self, origin: &str, entry: DomainEntry) -> WardenResult<()> {
        self.store.set_domain(origin, entry)
    }

    /// Grant fresh capabilities, replacing per method.
    pub fn add_permissions_for(
        &self,
        origin: &str,
        permissions: &RequestedPermissions,
    ) -> WardenResult<()> {
        self.store.add_permissions_for(origin, permissions)
    }

    /// Remove the listed methods' capabilities from a domain.
    pub fn remove_permissions_for(&self, origin: &str, methods: &[String]) -> WardenResult<()> {
        self.store.remove_permissions_for(origin, methods)
    }

    /// Drop every domain.
    pub fn clear_domains(&self) -> WardenResult<()> {
        self.store.clear_domains()
    }

    /// The pending permission-request queue.
    pub fn get_permissions_requests(&self) -> WardenResult<Vec<PermissionRequest>> {
        self.store.get_permissions_requests()
    }

    /// Cancel a pending request by id. The in-flight approval future is not
    /// aborted; its own cleanup becomes a no-op.
    pub fn remove_permissions_request(&self, id: &str) -> WardenResult<()> {
        self.store.remove_permissions_request(id)
    }

    /// A snapshot of the complete published state.
    pub fn current_state(&self) -> WardenResult<PermissionsState> {
        self.store.current()
    }

    /// Host-side grant: validate that every approved method resolves to a
    /// restricted method, then grant. Returns the domain's resulting
    /// capability list.
    ///
    /// Also the grant step of the approval workflow — an approved method the
    /// table does not know fails the whole grant with `METHOD_NOT_FOUND` and
    /// grants nothing.
    pub fn grant_new_permissions(
        &self,
        origin: &str,
        approved: RequestedPermissions,
    ) -> Result<Vec<Capability>, RpcError> {
        for method in approved.keys() {
            if get_method_key_for(method, &self.restricted_methods).is_none() {
                warn!(origin = %origin, method = %method, "approval names an unknown method; granting nothing");
                return Err(WardenError::UnknownMethod {
                    method: method.clone(),
                }
                .into());
            }
        }

        self.store
            .add_permissions_for(origin, &approved)
            .map_err(|e| RpcError::internal(e.to_string()))?;
        self.store
            .get_permissions_for_domain(origin)
            .map_err(|e| RpcError::internal(e.to_string()))
    }
}

/// A controller handle bound to one origin — the curried middleware form.
pub struct DomainMiddleware {
    controller: Arc<PermissionsController>,
    origin: OriginMetadata,
}

impl DomainMiddleware {
    /// Handle one request on behalf of the bound origin.
    pub async fn handle(&self, req: &RpcRequest, res: &mut RpcResponse) -> Flow {
        self.controller.handle_request(&self.origin, req, res).await
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
