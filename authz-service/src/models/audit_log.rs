//! Durable audit record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Operation category of an audited request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Read,
    Update,
    Delete,
    Cancel,
    Export,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "create",
            OperationKind::Read => "read",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Cancel => "cancel",
            OperationKind::Export => "export",
        }
    }

    /// Mutating categories are persisted even when the route is not marked
    /// sensitive.
    pub fn is_persisted(&self) -> bool {
        matches!(
            self,
            OperationKind::Create
                | OperationKind::Update
                | OperationKind::Delete
                | OperationKind::Cancel
        )
    }
}

/// Audit record, one per completed audited request. Append-only: written
/// after the handler finishes, never updated, never deleted.
#[derive(Debug, Clone, FromRow)]
pub struct AuditLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub operation: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub request_method: String,
    pub request_path: String,
    pub status_code: i32,
    pub success: bool,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        organization_id: Option<Uuid>,
        operation: OperationKind,
        entity_type: impl Into<String>,
        entity_id: Option<String>,
        request_method: impl Into<String>,
        request_path: impl Into<String>,
        status_code: u16,
        ip_address: impl Into<String>,
        user_agent: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            organization_id,
            operation: operation.as_str().to_string(),
            entity_type: entity_type.into(),
            entity_id,
            request_method: request_method.into(),
            request_path: request_path.into(),
            status_code: i32::from(status_code),
            success: status_code < 400,
            ip_address: ip_address.into(),
            user_agent,
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// Audit record response for API.
#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub operation: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub request_method: String,
    pub request_path: String,
    pub status_code: i32,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

impl From<AuditLog> for AuditLogResponse {
    fn from(a: AuditLog) -> Self {
        Self {
            id: a.id,
            user_id: a.user_id,
            organization_id: a.organization_id,
            operation: a.operation,
            entity_type: a.entity_type,
            entity_id: a.entity_id,
            request_method: a.request_method,
            request_path: a.request_path,
            status_code: a.status_code,
            success: a.success,
            created_at: a.created_at,
        }
    }
}
