//! Audit-log query handlers.

use axum::extract::{Extension, Json, Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::AuditLogResponse;
use crate::services::authorizer::OrgAccess;
use crate::services::database::AuditLogFilter;
use crate::AppState;
use service_core::error::AppError;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 1000;

/// Query parameters for the audit-log listing.
#[derive(Debug, Deserialize, Default)]
pub struct AuditLogQuery {
    pub user_id: Option<Uuid>,
    pub operation: Option<String>,
    pub entity_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AuditLogListResponse {
    pub logs: Vec<AuditLogResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// List an organization's audit records, newest first.
///
/// GET /orgs/:id/audit-logs
pub async fn list_audit_logs(
    State(state): State<AppState>,
    Extension(access): Extension<OrgAccess>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<AuditLogListResponse>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0).max(0);

    let filter = AuditLogFilter {
        user_id: query.user_id,
        operation: query.operation,
        entity_type: query.entity_type,
        from: query.from,
        to: query.to,
        limit,
        offset,
    };

    let (records, total) = state
        .store
        .list_audit_logs(access.organization_id, &filter)
        .await?;

    Ok(Json(AuditLogListResponse {
        logs: records.into_iter().map(AuditLogResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}
