//! # warden-core
//!
//! The authorization middleware runtime for Warden.
//!
//! This crate provides:
//! - The seam traits ([`traits::ApprovalHandler`]) and the restricted-method
//!   table types ([`traits::RestrictedMethod`], [`traits::MethodFn`])
//! - The method router (safe / internal / restricted classification and
//!   namespaced key resolution)
//! - The restricted-method executor (caveat pipeline around a terminal
//!   method)
//! - The permission-request workflow (validation, dedup, user-approval
//!   handshake, granting)
//! - The [`PermissionsController`] façade that wires it all together
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_core::{ControllerConfig, PermissionsController};
//!
//! let controller = PermissionsController::new(ControllerConfig {
//!     restricted_methods,
//!     method_prefix: "wallet_".to_string(),
//!     request_user_approval: Some(approval),
//!     ..ControllerConfig::default()
//! })?;
//!
//! let flow = controller.handle_request(&origin, &req, &mut res).await;
//! ```

pub mod controller;
pub mod executor;
pub mod router;
pub mod traits;

mod workflow;

pub use controller::{ControllerConfig, DomainMiddleware, Flow, PermissionsController};
pub use traits::{ApprovalHandler, MethodFn, RestrictedMethod};
