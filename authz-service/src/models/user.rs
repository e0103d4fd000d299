//! Application user model.
//!
//! This row, not the identity provider's claims, is the source of truth for
//! authorization decisions. The identity provider only vouches for the
//! subject id; everything else is loaded fresh from `users` per request.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// User entity. `id` equals the identity provider's subject id.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    /// Global application role (display/administration axis). Distinct from
    /// org-scoped membership roles and never consulted when gating access to
    /// an organization; only `is_super_admin` bypasses membership.
    pub role: String,
    pub organization_id: Option<Uuid>,
    pub is_super_admin: bool,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User response for API (no metadata blob).
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub role: String,
    pub organization_id: Option<Uuid>,
    pub is_super_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            full_name: u.full_name,
            role: u.role,
            organization_id: u.organization_id,
            is_super_admin: u.is_super_admin,
            created_at: u.created_at,
        }
    }
}
