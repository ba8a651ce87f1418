//! Permission catalog, role grant and user override types

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Permission row from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PermissionRow {
    pub id: String,
    /// Globally unique name, e.g. `orders:write`
    pub name: String,
    pub description: String,
    pub category: String,
}

/// Explicit per-user grant or denial of one permission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserOverrideRow {
    pub permission: PermissionRow,
    pub granted: bool,
}

/// Where an effective permission entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PermissionSource {
    Role,
    User,
}
