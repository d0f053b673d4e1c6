//! The caveat registry: named enforcers applied around restricted methods.
//!
//! A stored caveat names its enforcer by `type`; the registry turns that
//! name into a pipeline stage. The registry is process-wide in spirit but
//! owned by the controller, which accepts a replacement at construction —
//! hosting applications register their own caveat types next to the
//! built-ins.
//!
//! Lookup of an unregistered type returns `None` and the dispatch must fail:
//! an unknown caveat is never treated as a no-op.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use warden_contracts::caveat::{FILTER_PARAMS, FILTER_RESPONSE};
use warden_contracts::rpc::{RpcError, RpcRequest, RpcResponse};

use crate::filters::{ParamsFilter, ResponseFilter};

/// A pipeline stage generated from one stored caveat.
///
/// `filter_request` runs before the restricted method, in stored caveat
/// order; `filter_response` runs after the method has produced a result, in
/// the same order. An enforcer participates in whichever phases it
/// overrides — the defaults pass through.
pub trait CaveatEnforcer: Send + Sync {
    /// Request-phase gate: reject the call before the method runs.
    fn filter_request(&self, _value: &Value, _req: &RpcRequest) -> Result<(), RpcError> {
        Ok(())
    }

    /// Response-phase rewrite: adjust `res.result` in place.
    fn filter_response(&self, _value: &Value, _res: &mut RpcResponse) -> Result<(), RpcError> {
        Ok(())
    }
}

/// Mapping from caveat type name to its enforcer.
pub struct CaveatRegistry {
    enforcers: HashMap<String, Arc<dyn CaveatEnforcer>>,
}

impl CaveatRegistry {
    /// A registry with no enforcers at all. Every caveat fails closed.
    pub fn empty() -> Self {
        Self {
            enforcers: HashMap::new(),
        }
    }

    /// Register `enforcer` under `kind`. Registering the same name twice
    /// replaces the previous enforcer.
    pub fn register(&mut self, kind: impl Into<String>, enforcer: Arc<dyn CaveatEnforcer>) {
        self.enforcers.insert(kind.into(), enforcer);
    }

    /// Look up the enforcer for a caveat type. `None` means the type is
    /// unrecognized and the dispatch must fail with `invalid params`.
    pub fn get(&self, kind: &str) -> Option<Arc<dyn CaveatEnforcer>> {
        self.enforcers.get(kind).cloned()
    }
}

impl Default for CaveatRegistry {
    /// The built-in registry: `filterParams` and `filterResponse`.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(FILTER_PARAMS, Arc::new(ParamsFilter));
        registry.register(FILTER_RESPONSE, Arc::new(ResponseFilter));
        registry
    }
}
