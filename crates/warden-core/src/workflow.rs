//! The permission-request workflow: the two internal method handlers.
//!
//! `getPermissions` is a pure read. `requestPermissions` is the interactive
//! handshake: validate, canonicalize, dedup against held permissions, then
//! suspend on the user-approval future and grant what comes back. The
//! pending queue entry is removed on *every* exit path — approval, user
//! rejection, unknown approved method, and handler failure alike — before
//! the outcome is turned into a response.

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use warden_contracts::{
    caveat::sort_caveats,
    request::{OriginMetadata, PermissionRequest, RequestMetadata, RequestedPermissions},
    rpc::{RpcError, RpcRequest, RpcResponse},
};

use crate::controller::PermissionsController;

impl PermissionsController {
    /// `getPermissions`: answer with every capability the domain holds.
    /// No side effects.
    pub(crate) fn handle_get_permissions(&self, origin: &OriginMetadata, res: &mut RpcResponse) {
        match self.current_permissions_value(&origin.origin) {
            Ok(value) => res.result = Some(value),
            Err(err) => res.error = Some(err),
        }
    }

    /// `requestPermissions`: the grant handshake.
    pub(crate) async fn handle_request_permissions(
        &self,
        origin: &OriginMetadata,
        req: &RpcRequest,
        res: &mut RpcResponse,
    ) {
        // 1. Validate. params[0] must be a non-empty object mapping method
        //    names to permission descriptors.
        let Some(raw) = req.params.first() else {
            res.error = Some(RpcError::invalid_request(Some(req)));
            return;
        };
        if !self.request_validator.is_valid(raw) {
            debug!(origin = %origin.origin, "malformed permission-request payload");
            res.error = Some(RpcError::invalid_request(Some(req)));
            return;
        }
        let mut requested: RequestedPermissions = match serde_json::from_value(raw.clone()) {
            Ok(requested) => requested,
            Err(err) => {
                debug!(origin = %origin.origin, error = %err, "permission-request payload failed to deserialize");
                res.error = Some(RpcError::invalid_request(Some(req)));
                return;
            }
        };

        // 2. Canonicalize before any equality check touches the caveats.
        for descriptor in requested.values_mut() {
            if let Some(caveats) = descriptor.caveats.as_mut() {
                sort_caveats(caveats);
            }
        }

        // 3. Correlation metadata: caller extras preserved, host identity wins.
        let metadata = build_metadata(origin, req.params.get(1));

        // 4. Fast-path: the domain already holds exactly this set.
        match self.store.has_permissions(&origin.origin, &requested) {
            Ok(true) => {
                debug!(origin = %origin.origin, "requested permissions already held; skipping approval");
                match self.current_permissions_value(&origin.origin) {
                    Ok(value) => res.result = Some(value),
                    Err(err) => res.error = Some(err),
                }
                return;
            }
            Ok(false) => {}
            Err(err) => {
                res.error = Some(RpcError::internal(err.to_string()));
                return;
            }
        }

        // 5. Enqueue the pending request.
        let pending = PermissionRequest {
            origin: origin.origin.clone(),
            metadata,
            permissions: requested,
        };
        let request_id = pending.metadata.id.clone();
        if let Err(err) = self.store.add_permissions_request(pending.clone()) {
            res.error = Some(RpcError::internal(err.to_string()));
            return;
        }

        info!(
            origin = %pending.origin,
            request_id = %request_id,
            methods = pending.permissions.len(),
            "permission request awaiting user approval"
        );

        // 6. Prompt. The await is the workflow's only suspension point; the
        //    queue entry is dropped before the outcome is acted on, whatever
        //    the outcome is.
        let outcome = self.approval.request_approval(&pending).await;
        if let Err(err) = self.store.remove_permissions_request(&request_id) {
            warn!(request_id = %request_id, error = %err, "failed to drop pending permission request");
        }

        match outcome {
            Ok(approved) if approved.is_empty() => {
                info!(origin = %pending.origin, request_id = %request_id, "user rejected the permission request");
                res.error = Some(RpcError::user_rejected());
            }
            Ok(approved) => match self.grant_new_permissions(&pending.origin, approved) {
                Ok(capabilities) => {
                    info!(
                        origin = %pending.origin,
                        request_id = %request_id,
                        held = capabilities.len(),
                        "permission request approved and granted"
                    );
                    match serde_json::to_value(capabilities) {
                        Ok(value) => res.result = Some(value),
                        Err(err) => res.error = Some(RpcError::internal(err.to_string())),
                    }
                }
                Err(err) => res.error = Some(err),
            },
            Err(err) => {
                warn!(
                    origin = %pending.origin,
                    request_id = %request_id,
                    code = err.code,
                    "approval handler rejected the permission request"
                );
                res.error = Some(err);
            }
        }
    }

    /// The domain's capability list as a response value.
    pub(crate) fn current_permissions_value(&self, origin: &str) -> Result<Value, RpcError> {
        let capabilities = self
            .store
            .get_permissions_for_domain(origin)
            .map_err(|e| RpcError::internal(e.to_string()))?;
        serde_json::to_value(capabilities).map_err(|e| RpcError::internal(e.to_string()))
    }
}

/// Merge caller-supplied metadata under the host-supplied origin identity.
///
/// `params[1].metadata` keys are preserved verbatim; the host's `origin`
/// always wins, and for `id` the precedence is host-assigned, then
/// caller-supplied, then a fresh UUID.
fn build_metadata(origin: &OriginMetadata, extra_param: Option<&Value>) -> RequestMetadata {
    let mut extra = extra_param
        .and_then(|param| param.get("metadata"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let id = origin
        .id
        .clone()
        .or_else(|| extra.get("id").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // Lifted into typed fields; keeping them in `extra` would duplicate them
    // through the flattened serialization.
    extra.remove("id");
    extra.remove("origin");

    RequestMetadata {
        id,
        origin: origin.origin.clone(),
        extra,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use warden_contracts::request::OriginMetadata;

    use super::build_metadata;

    #[test]
    fn metadata_gets_a_fresh_id_when_none_supplied() {
        let origin = OriginMetadata::new("o1");
        let first = build_metadata(&origin, None);
        let second = build_metadata(&origin, None);

        assert_eq!(first.origin, "o1");
        assert!(!first.id.is_empty());
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn host_assigned_id_wins_over_caller_metadata() {
        let origin = OriginMetadata {
            origin: "o1".to_string(),
            id: Some("host-id".to_string()),
        };
        let param = json!({ "metadata": { "id": "caller-id" } });

        let metadata = build_metadata(&origin, Some(&param));
        assert_eq!(metadata.id, "host-id");
    }

    #[test]
    fn caller_id_is_used_when_host_has_none() {
        let origin = OriginMetadata::new("o1");
        let param = json!({ "metadata": { "id": "caller-id" } });

        let metadata = build_metadata(&origin, Some(&param));
        assert_eq!(metadata.id, "caller-id");
    }

    #[test]
    fn host_origin_overrides_caller_metadata() {
        let origin = OriginMetadata::new("real-origin");
        let param = json!({ "metadata": { "origin": "spoofed", "site": "news" } });

        let metadata = build_metadata(&origin, Some(&param));
        assert_eq!(metadata.origin, "real-origin");
        assert_eq!(metadata.extra.get("site"), Some(&json!("news")));
        assert!(metadata.extra.get("origin").is_none());
    }

    #[test]
    fn non_object_second_param_is_ignored() {
        let origin = OriginMetadata::new("o1");
        let param = json!("not an object");

        let metadata = build_metadata(&origin, Some(&param));
        assert_eq!(metadata.origin, "o1");
        assert!(metadata.extra.is_empty());
    }
}
