//! Built-in caveat filters.
//!
//! `filterParams` gates the request phase: the call proceeds only when its
//! params are structurally included in the caveat value. `filterResponse`
//! rewrites the response phase: the result is intersected with the caveat
//! value before control returns upstream. Both operate on plain
//! `serde_json::Value` trees — caveat payloads are opaque to the rest of the
//! runtime.

use serde_json::Value;
use tracing::debug;

use warden_contracts::rpc::{RpcError, RpcRequest, RpcResponse};

use crate::registry::CaveatEnforcer;

/// Admits a request iff its `params` are structurally included in the
/// caveat value.
///
/// The caveat value must itself be an array (it bounds the positional
/// params); anything else rejects every call.
pub struct ParamsFilter;

impl CaveatEnforcer for ParamsFilter {
    fn filter_request(&self, value: &Value, req: &RpcRequest) -> Result<(), RpcError> {
        let Value::Array(bounds) = value else {
            debug!(method = %req.method, "params caveat value is not an array; rejecting");
            return Err(RpcError::invalid_params());
        };

        let admitted = req.params.len() <= bounds.len()
            && req
                .params
                .iter()
                .zip(bounds)
                .all(|(param, bound)| is_included(param, bound));

        if admitted {
            Ok(())
        } else {
            debug!(method = %req.method, "request params outside caveat bounds");
            Err(RpcError::invalid_params())
        }
    }
}

/// Replaces `res.result` with its structural intersection with the caveat
/// value after the restricted method has produced it.
pub struct ResponseFilter;

impl CaveatEnforcer for ResponseFilter {
    fn filter_response(&self, value: &Value, res: &mut RpcResponse) -> Result<(), RpcError> {
        if let Some(result) = res.result.as_mut() {
            intersect(result, value);
        }
        Ok(())
    }
}

/// Structural inclusion of `candidate` in `allowed`.
///
/// Arrays: element-wise inclusion at matching indices; the candidate may be
/// shorter than the bound, never longer. Objects: every candidate key must
/// be present in the bound with an included sub-value. Everything else —
/// primitives and mismatched shapes — compares by strict equality.
fn is_included(candidate: &Value, allowed: &Value) -> bool {
    match (candidate, allowed) {
        (Value::Array(items), Value::Array(bounds)) => {
            items.len() <= bounds.len()
                && items
                    .iter()
                    .zip(bounds)
                    .all(|(item, bound)| is_included(item, bound))
        }
        (Value::Object(entries), Value::Object(bounds)) => entries
            .iter()
            .all(|(key, sub)| bounds.get(key).is_some_and(|bound| is_included(sub, bound))),
        _ => candidate == allowed,
    }
}

/// Intersect `result` with `allowed`, in place.
///
/// Arrays retain the members that appear in `allowed`; objects drop the keys
/// not present in `allowed`. Other shapes (and shape mismatches) are left
/// untouched.
fn intersect(result: &mut Value, allowed: &Value) {
    match (result, allowed) {
        (Value::Array(items), Value::Array(keep)) => {
            items.retain(|item| keep.contains(item));
        }
        (Value::Object(entries), Value::Object(keep)) => {
            entries.retain(|key, _| keep.contains_key(key));
        }
        _ => {}
    }
}
