//! Shared data types for all transactional backends
//!
//! Row types used by both the PostgreSQL and in-memory stores so the
//! domain layer never sees backend-specific shapes.

mod identity;
mod permission;

pub use identity::{NewUser, Role, UserRow};
pub use permission::{PermissionRow, PermissionSource, UserOverrideRow};
