//! KVDB Module
//!
//! Named logical databases on top of one store, shared by many scopes.
//!
//! ## Components
//! - `HandlerRegistry`: live handler counts per (database, scope)
//! - `KvdbManager`: database lifecycle (create, delete, list, load) and
//!   handler issue
//! - `KvdbHandler`: scope-bound read/write access to one database
//!
//! ## Flow
//! ```text
//! initialize ─► get_handler(db, scope) ─► registry.acquire
//!                     │
//!                     ▼
//!               handler.get/set/remove   (no manager lock)
//!                     │
//!                     ▼
//!               release / drop ─► registry.release
//!
//! delete_db(db) succeeds only while registry usage of db is zero
//! ```

mod handler;
mod manager;
mod registry;

pub use handler::KvdbHandler;
pub use manager::{KvdbManager, LOAD_SCOPE};
pub use registry::{HandlerRegistry, RefInfo};
