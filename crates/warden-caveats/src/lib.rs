//! # warden-caveats
//!
//! Caveat enforcement for the Warden permissions middleware.
//!
//! A caveat stored on a capability names an enforcer by `type`; this crate
//! provides the [`registry::CaveatEnforcer`] trait, the
//! [`registry::CaveatRegistry`] that resolves names to enforcers, and the
//! two built-in filters:
//!
//! - **`filterParams`** — request-phase gate: the call proceeds only when
//!   its params are structurally included in the caveat value.
//! - **`filterResponse`** — response-phase rewrite: the result is replaced
//!   by its structural intersection with the caveat value.
//!
//! Unknown caveat types fail closed: a lookup miss must abort the dispatch
//! rather than pass the stage through.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warden_caveats::{CaveatEnforcer, CaveatRegistry};
//!
//! let mut registry = CaveatRegistry::default();
//! registry.register("requireSuffix", Arc::new(MySuffixEnforcer));
//! // Pass `registry` to the controller at construction.
//! ```

pub mod filters;
pub mod registry;

pub use filters::{ParamsFilter, ResponseFilter};
pub use registry::{CaveatEnforcer, CaveatRegistry};
