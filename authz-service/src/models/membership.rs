//! Organization membership model.
//!
//! At most one row exists per (user_id, organization_id); grants go through
//! an upsert on that unique pair. Memberships are soft-deactivated, never
//! deleted, so the audit history keeps its referents.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::Role;

/// Membership row as stored. The role travels as its canonical lowercase
/// string and is parsed into [`Role`] at the decision boundary.
#[derive(Debug, Clone, FromRow)]
pub struct OrgMembership {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: String,
    pub is_active: bool,
    pub invited_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrgMembership {
    pub fn parsed_role(&self) -> Option<Role> {
        self.role.parse().ok()
    }
}

/// One row of the combined organization-existence + active-membership query.
///
/// `membership_role` is `None` when the organization exists but the caller
/// holds no active membership in it.
#[derive(Debug, Clone, FromRow)]
pub struct OrgAccessRow {
    pub organization_id: Uuid,
    pub organization_active: bool,
    pub membership_role: Option<String>,
}

/// Member listing row (membership joined with the user).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MemberRow {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
    pub invited_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
