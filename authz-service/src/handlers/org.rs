//! Organization and membership handlers.
//!
//! Every org-scoped handler here runs behind the org guard, so the
//! membership decision is already made; handlers consume the [`OrgAccess`]
//! proof from extensions and only enforce the grant-ceiling rule (nobody
//! assigns or removes a role above their own).

use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::middleware::auth::CurrentUser;
use crate::models::{MemberRow, Organization, OrganizationResponse, OrgMembership, Role};
use crate::services::authorizer::OrgAccess;
use crate::AppState;
use service_core::error::AppError;

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to create an organization.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: String,
}

/// Request to grant a membership.
#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    #[validate(length(min = 1, message = "user_id is required"))]
    pub user_id: String,
    #[validate(length(min = 1, message = "role is required"))]
    pub role: String,
}

/// Request to change a member's role.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMemberRequest {
    #[validate(length(min = 1, message = "role is required"))]
    pub role: String,
}

/// Membership response.
#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role: String,
    pub is_active: bool,
    pub invited_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<OrgMembership> for MembershipResponse {
    fn from(m: OrgMembership) -> Self {
        Self {
            user_id: m.user_id,
            organization_id: m.organization_id,
            role: m.role,
            is_active: m.is_active,
            invited_by: m.invited_by,
            created_at: m.created_at,
        }
    }
}

/// Member listing response.
#[derive(Debug, Serialize)]
pub struct MemberListResponse {
    pub members: Vec<MemberRow>,
    pub total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create an organization. The creator becomes its owner in the same
/// transaction.
///
/// POST /orgs
pub async fn create_organization(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<OrganizationResponse>), AppError> {
    req.validate()?;

    let org = Organization::new(req.name.trim().to_string());
    state.store.create_organization(&org, user.id).await?;

    tracing::info!(
        organization_id = %org.id,
        owner_id = %user.id,
        "organization created"
    );

    Ok((StatusCode::CREATED, Json(OrganizationResponse::from(org))))
}

/// Get an organization.
///
/// GET /orgs/:id
pub async fn get_organization(
    State(state): State<AppState>,
    Extension(access): Extension<OrgAccess>,
) -> Result<Json<OrganizationResponse>, AppError> {
    let org = state
        .store
        .find_organization_by_id(access.organization_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Organization not found")))?;

    Ok(Json(OrganizationResponse::from(org)))
}

/// List an organization's active members.
///
/// GET /orgs/:id/members
pub async fn list_members(
    State(state): State<AppState>,
    Extension(access): Extension<OrgAccess>,
) -> Result<Json<MemberListResponse>, AppError> {
    let members = state.store.list_members(access.organization_id).await?;
    let total = members.len();

    Ok(Json(MemberListResponse { members, total }))
}

/// Grant a membership (or re-role an existing one).
///
/// POST /orgs/:id/members
pub async fn add_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Extension(access): Extension<OrgAccess>,
    Json(req): Json<AddMemberRequest>,
) -> Result<(StatusCode, Json<MembershipResponse>), AppError> {
    req.validate()?;

    let role = parse_role(&req.role)?;
    check_grant_ceiling(&access, role)?;

    let membership = state
        .authorizer
        .add_membership(
            &req.user_id,
            &access.organization_id.to_string(),
            role,
            Some(user.id),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(MembershipResponse::from(membership))))
}

/// Change a member's role.
///
/// PATCH /orgs/:id/members/:user_id
pub async fn update_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Extension(access): Extension<OrgAccess>,
    Path((_, member_id)): Path<(String, String)>,
    Json(req): Json<UpdateMemberRequest>,
) -> Result<Json<MembershipResponse>, AppError> {
    req.validate()?;

    let role = parse_role(&req.role)?;
    check_grant_ceiling(&access, role)?;

    let member_id = member_id
        .parse::<Uuid>()
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid user id")))?;

    // Re-roling an owner is itself an owner-level action.
    let existing = state
        .store
        .find_membership(member_id, access.organization_id)
        .await?
        .filter(|m| m.is_active)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Membership not found")))?;
    if let Some(current) = existing.parsed_role() {
        check_grant_ceiling(&access, current)?;
    }

    let membership = state
        .authorizer
        .add_membership(
            &member_id.to_string(),
            &access.organization_id.to_string(),
            role,
            Some(user.id),
        )
        .await?;

    Ok(Json(MembershipResponse::from(membership)))
}

/// Deactivate a membership. Soft delete: the row stays for audit history.
///
/// DELETE /orgs/:id/members/:user_id
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(access): Extension<OrgAccess>,
    Path((_, member_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let member_id = member_id
        .parse::<Uuid>()
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid user id")))?;

    let existing = state
        .store
        .find_membership(member_id, access.organization_id)
        .await?
        .filter(|m| m.is_active)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Membership not found")))?;
    if let Some(current) = existing.parsed_role() {
        check_grant_ceiling(&access, current)?;
    }

    let removed = state
        .store
        .deactivate_membership(member_id, access.organization_id)
        .await?;
    if !removed {
        return Err(AppError::NotFound(anyhow::anyhow!("Membership not found")));
    }

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Helper Functions
// ============================================================================

fn parse_role(raw: &str) -> Result<Role, AppError> {
    raw.parse::<Role>()
        .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Unknown role '{}'", raw)))
}

/// Nobody assigns or removes a role above their own membership role. Super
/// admins have no ceiling.
fn check_grant_ceiling(access: &OrgAccess, target: Role) -> Result<(), AppError> {
    if access.via_super_admin {
        return Ok(());
    }
    match access.role {
        Some(own) if own.satisfies(target) => Ok(()),
        _ => Err(AppError::Forbidden(anyhow::anyhow!(
            "Insufficient permissions for this organization"
        ))),
    }
}
