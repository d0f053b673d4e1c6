//! # warden-contracts
//!
//! Shared types, wire shapes, and error contracts for the Warden
//! permissions middleware.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate — only data definitions, canonical-ordering helpers, and error
//! types.

pub mod capability;
pub mod caveat;
pub mod error;
pub mod request;
pub mod rpc;
pub mod state;
