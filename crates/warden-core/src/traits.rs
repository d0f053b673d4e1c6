//! Seam traits and method-table types for the permissions runtime.
//!
//! The trust boundary has two sides:
//!
//! - `ApprovalHandler` — trusted UI seam; the only asynchronous collaborator
//!   in the runtime and the only point at which a request may suspend.
//! - `MethodFn` — the restricted-method implementations; opaque to the
//!   runtime, invoked only after authorization has succeeded and every
//!   request-phase caveat has passed.

use std::sync::Arc;

use async_trait::async_trait;

use warden_contracts::request::{PermissionRequest, RequestedPermissions};
use warden_contracts::rpc::{RpcError, RpcRequest, RpcResponse};

/// A restricted-method implementation.
///
/// Receives the request and writes its outcome into `res`; a returned error
/// becomes the response error verbatim. Implementations may complete their
/// work before returning or hand the response off elsewhere — the runtime
/// only inspects `res` after the call.
pub type MethodFn = Arc<dyn Fn(&RpcRequest, &mut RpcResponse) -> Result<(), RpcError> + Send + Sync>;

/// One entry in the restricted-method table.
#[derive(Clone)]
pub struct RestrictedMethod {
    /// Human-readable summary, published in the permissions descriptions.
    pub description: String,

    /// The terminal pipeline stage for authorized calls.
    pub method: MethodFn,
}

impl RestrictedMethod {
    /// Build a table entry from a description and an implementation.
    pub fn new(description: impl Into<String>, method: MethodFn) -> Self {
        Self {
            description: description.into(),
            method,
        }
    }
}

/// Presents a pending permission request to the user and reports what they
/// approved.
///
/// Returning an empty mapping means the user declined everything — the
/// workflow answers with the user-rejected error. Returning `Err` propagates
/// the rejection reason to the caller as the response error. The pending
/// request is removed from the queue on every outcome.
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    /// Resolve with the subset of `request.permissions` the user approved.
    async fn request_approval(
        &self,
        request: &PermissionRequest,
    ) -> Result<RequestedPermissions, RpcError>;
}
