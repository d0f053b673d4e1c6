//! Request/response wire shapes and the protocol error taxonomy.
//!
//! Errors crossing the middleware boundary are *values* placed in
//! `RpcResponse::error`, never panics or propagated `Err`s. The constructors
//! on [`RpcError`] are the complete taxonomy; every code the middleware can
//! surface is minted here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WardenError;

/// An incoming call: a method name, positional params, and an optional
/// correlation id assigned by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// The method being invoked.
    pub method: String,

    /// Positional arguments. Absent params deserialize to an empty list.
    #[serde(default)]
    pub params: Vec<Value>,

    /// Transport-assigned correlation token, echoed back verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl RpcRequest {
    /// Build a request with no correlation id.
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            id: None,
        }
    }
}

/// The response under construction for one request.
///
/// Exactly one of `result` and `error` is populated by the time the
/// middleware finishes with a request it handled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcResponse {
    /// The successful outcome, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// The failure outcome, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// Error codes surfaced by the middleware.
pub mod codes {
    /// The requested method cannot be resolved to a restricted method.
    pub const METHOD_NOT_FOUND: i64 = -32601;

    /// Malformed permission-request payload.
    pub const INVALID_REQUEST: i64 = -32600;

    /// Request params rejected by a caveat, or an unrecognized caveat type.
    pub const INVALID_PARAMS: i64 = -32602;

    /// Recognized restricted method with no matching capability.
    pub const UNAUTHORIZED: i64 = 4100;

    /// The user declined the permission request.
    pub const USER_REJECTED: i64 = 4001;

    /// An internal failure while resolving a permission.
    pub const INTERNAL: i64 = 1;
}

/// A protocol-shaped error value: `{code, message, data?}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric code from [`codes`].
    pub code: i64,

    /// Human-readable summary.
    pub message: String,

    /// Optional context, typically the offending request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Method key unresolved, or an approved method is unknown.
    pub fn method_not_found() -> Self {
        Self {
            code: codes::METHOD_NOT_FOUND,
            message: "Method not found.".to_string(),
            data: None,
        }
    }

    /// Recognized restricted method, but the origin holds no capability for
    /// it. Echoes the request so callers can see what was refused.
    pub fn unauthorized(req: &RpcRequest) -> Self {
        Self {
            code: codes::UNAUTHORIZED,
            message: "Unauthorized to perform action. Try requesting the required permission(s) first.".to_string(),
            data: serde_json::to_value(req).ok(),
        }
    }

    /// Malformed permission-request payload.
    pub fn invalid_request(req: Option<&RpcRequest>) -> Self {
        Self {
            code: codes::INVALID_REQUEST,
            message: "Invalid request.".to_string(),
            data: req.and_then(|r| serde_json::to_value(r).ok()),
        }
    }

    /// Request params rejected by a caveat filter, or a caveat type with no
    /// registered enforcer.
    pub fn invalid_params() -> Self {
        Self {
            code: codes::INVALID_PARAMS,
            message: "Invalid parameters.".to_string(),
            data: None,
        }
    }

    /// The user-approval step resolved with nothing approved.
    pub fn user_rejected() -> Self {
        Self {
            code: codes::USER_REJECTED,
            message: "User rejected the request.".to_string(),
            data: None,
        }
    }

    /// Generic internal failure while resolving a permission.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: codes::INTERNAL,
            message: message.into(),
            data: None,
        }
    }
}

impl From<WardenError> for RpcError {
    /// Collapse internal errors onto the wire taxonomy. Unknown-method
    /// failures keep their protocol identity; everything else is the generic
    /// internal error.
    fn from(err: WardenError) -> Self {
        match err {
            WardenError::UnknownMethod { .. } => Self::method_not_found(),
            other => Self::internal(other.to_string()),
        }
    }
}
