//! Authorized-call execution: the caveat pipeline around a terminal method.
//!
//! The executor runs one authorized call. The security ordering is strict:
//! every caveat's enforcer is resolved before anything runs (an unknown type
//! fails the whole dispatch), request-phase filters run in stored order
//! before the terminal method, and response-phase filters run in the same
//! order afterwards with the terminal result visible for mutation. The
//! terminal method is never invoked when a request-phase stage fails.

use tracing::{debug, warn};

use warden_caveats::CaveatRegistry;
use warden_contracts::{
    capability::Capability,
    rpc::{RpcError, RpcRequest, RpcResponse},
};

use crate::traits::RestrictedMethod;

/// Run one authorized call through the capability's caveat pipeline.
///
/// With no caveats the terminal method is invoked directly. Any failing
/// stage short-circuits with its error in `res.error`; response-phase
/// filters only run when the terminal stage succeeded.
pub fn execute(
    registry: &CaveatRegistry,
    target: &RestrictedMethod,
    permission: &Capability,
    req: &RpcRequest,
    res: &mut RpcResponse,
) {
    let caveats = permission.caveats.as_deref().unwrap_or_default();

    // Resolve every enforcer up front: an unregistered caveat type fails the
    // dispatch before any stage runs. Unknown caveats are never a no-op.
    let mut stages = Vec::with_capacity(caveats.len());
    for caveat in caveats {
        match registry.get(&caveat.kind) {
            Some(enforcer) => stages.push((caveat, enforcer)),
            None => {
                warn!(
                    caveat_type = %caveat.kind,
                    method = %req.method,
                    "caveat type has no registered enforcer; failing dispatch"
                );
                res.error = Some(RpcError::invalid_params());
                return;
            }
        }
    }

    // Request phase, in stored (canonical) order.
    for (caveat, enforcer) in &stages {
        if let Err(err) = enforcer.filter_request(&caveat.value, req) {
            debug!(
                caveat_type = %caveat.kind,
                method = %req.method,
                "request-phase caveat rejected the call"
            );
            res.error = Some(err);
            return;
        }
    }

    // Terminal stage: the restricted method itself.
    if let Err(err) = (target.method)(req, res) {
        res.error = Some(err);
    }
    if res.error.is_some() {
        return;
    }

    // Response phase, same order, observing (and mutating) the result.
    for (caveat, enforcer) in &stages {
        if let Err(err) = enforcer.filter_response(&caveat.value, res) {
            res.error = Some(err);
            return;
        }
    }
}
