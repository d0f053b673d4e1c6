//! # warden-store
//!
//! The in-memory permission store for the Warden middleware.
//!
//! ## Overview
//!
//! [`PermissionStore`] owns the complete permissions state — per-origin
//! capability tables, the pending permission-request queue, and the derived
//! method descriptions — behind a `Mutex`, and publishes a full snapshot
//! through the [`StateListener`] seam after every mutation. Persistence and
//! observation live entirely on the listener side; the store itself never
//! touches disk.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use warden_store::{PermissionStore, StateListener};
//!
//! let store = PermissionStore::new(initial_state, Some(listener));
//! store.add_permissions_for("https://site.one", &granted)?;
//! let caps = store.get_permissions_for_domain("https://site.one")?;
//! ```

pub mod store;

pub use store::{PermissionStore, StateListener};
