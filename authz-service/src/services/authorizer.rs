//! Membership authorization.
//!
//! Single choke point for every organization-scoped route. Outcomes are
//! values, not exceptions: the guard converts a `Deny` into the structured
//! error response, and a store failure is always a denial (fail closed).

use service_core::error::AppError;
use service_core::middleware::tracing::RequestContext;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{OrgMembership, Role, User};
use crate::services::database::AuthzStore;
use crate::services::security_events::{
    Decision, SecurityEvent, SecurityEventKind, SecurityEventLogger,
};

/// Proof of a granted organization access, inserted into request extensions
/// for the downstream handler.
#[derive(Debug, Clone)]
pub struct OrgAccess {
    pub organization_id: Uuid,
    /// The caller's membership role. `None` when access came through the
    /// super-admin bypass, which consults no membership row.
    pub role: Option<Role>,
    pub via_super_admin: bool,
}

#[derive(Clone)]
pub struct MembershipAuthorizer {
    store: Arc<dyn AuthzStore>,
    events: SecurityEventLogger,
}

impl MembershipAuthorizer {
    pub fn new(store: Arc<dyn AuthzStore>, events: SecurityEventLogger) -> Self {
        Self { store, events }
    }

    /// Decides whether `user` may act on the organization named by
    /// `org_ref` at `required` privilege.
    ///
    /// Every terminal outcome emits a security event carrying the request's
    /// correlation id. Store failures map to a 500 and never fall through
    /// to the handler.
    pub async fn authorize(
        &self,
        user: &User,
        org_ref: Option<&str>,
        required: Role,
        allow_super_admin_bypass: bool,
        ctx: &RequestContext,
    ) -> Result<OrgAccess, AppError> {
        let base_event = |event: SecurityEvent| {
            event
                .request_id(&ctx.request_id)
                .user_id(user.id)
                .required_role(required)
                .path(&ctx.path)
                .method(&ctx.method)
                .ip_address(&ctx.ip_address)
        };

        let org_ref = match org_ref {
            Some(r) => r,
            None => {
                self.events.log(
                    SecurityEventKind::OrgAccessDenied,
                    base_event(SecurityEvent::new())
                        .decision(Decision::Deny)
                        .reason("organization id missing from request"),
                );
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Organization id is required"
                )));
            }
        };

        let organization_id = match org_ref.parse::<Uuid>() {
            Ok(id) => id,
            Err(_) => {
                self.events.log(
                    SecurityEventKind::OrgAccessDenied,
                    base_event(SecurityEvent::new())
                        .organization_id(org_ref)
                        .decision(Decision::Deny)
                        .reason("organization id is not a valid key"),
                );
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Invalid organization id"
                )));
            }
        };

        if allow_super_admin_bypass && user.is_super_admin {
            self.events.log(
                SecurityEventKind::OrgAccessSuperAdmin,
                base_event(SecurityEvent::new())
                    .organization_id(organization_id)
                    .decision(Decision::Grant)
                    .reason("super admin bypass"),
            );
            return Ok(OrgAccess {
                organization_id,
                role: None,
                via_super_admin: true,
            });
        }

        // Organization existence and active membership in one round trip.
        let access = match self.store.find_org_access(organization_id, user.id).await {
            Ok(access) => access,
            Err(err) => {
                // Fail closed: an unreachable store is a denial, logged
                // distinctly from an active deny.
                self.events.log(
                    SecurityEventKind::OrgAccessError,
                    base_event(SecurityEvent::new())
                        .organization_id(organization_id)
                        .decision(Decision::Error)
                        .reason(err.to_string()),
                );
                return Err(err);
            }
        };

        let row = match access {
            Some(row) if row.organization_active => row,
            Some(_) => {
                self.events.log(
                    SecurityEventKind::OrgAccessDenied,
                    base_event(SecurityEvent::new())
                        .organization_id(organization_id)
                        .decision(Decision::Deny)
                        .reason("organization is deactivated"),
                );
                return Err(AppError::NotFound(anyhow::anyhow!("Organization not found")));
            }
            None => {
                self.events.log(
                    SecurityEventKind::OrgAccessDenied,
                    base_event(SecurityEvent::new())
                        .organization_id(organization_id)
                        .decision(Decision::Deny)
                        .reason("organization does not exist"),
                );
                return Err(AppError::NotFound(anyhow::anyhow!("Organization not found")));
            }
        };

        let actual = match row.membership_role.as_deref() {
            None => {
                self.events.log(
                    SecurityEventKind::OrgAccessDenied,
                    base_event(SecurityEvent::new())
                        .organization_id(organization_id)
                        .decision(Decision::Deny)
                        .reason("not a member"),
                );
                return Err(AppError::Forbidden(anyhow::anyhow!(
                    "Insufficient permissions for this organization"
                )));
            }
            Some(raw) => match raw.parse::<Role>() {
                Ok(role) => role,
                Err(_) => {
                    // A membership row carrying an unknown role is treated
                    // like a store fault, not a grant.
                    self.events.log(
                        SecurityEventKind::OrgAccessError,
                        base_event(SecurityEvent::new())
                            .organization_id(organization_id)
                            .decision(Decision::Error)
                            .reason(format!("membership has unknown role '{}'", raw)),
                    );
                    return Err(AppError::InternalError(anyhow::anyhow!(
                        "invalid membership role"
                    )));
                }
            },
        };

        if !actual.satisfies(required) {
            self.events.log(
                SecurityEventKind::OrgAccessDenied,
                base_event(SecurityEvent::new())
                    .organization_id(organization_id)
                    .actual_role(Some(actual))
                    .decision(Decision::Deny)
                    .reason("insufficient role"),
            );
            return Err(AppError::Forbidden(anyhow::anyhow!(
                "Insufficient permissions for this organization"
            )));
        }

        self.events.log(
            SecurityEventKind::OrgAccessGranted,
            base_event(SecurityEvent::new())
                .organization_id(organization_id)
                .actual_role(Some(actual))
                .decision(Decision::Grant)
                .reason("membership satisfies required role"),
        );

        Ok(OrgAccess {
            organization_id,
            role: Some(actual),
            via_super_admin: false,
        })
    }

    /// Grants or updates a membership. Upsert on the (user, organization)
    /// unique pair: calling this twice leaves one active row with the
    /// latest role.
    pub async fn add_membership(
        &self,
        user_id: &str,
        organization_id: &str,
        role: Role,
        invited_by: Option<Uuid>,
    ) -> Result<OrgMembership, AppError> {
        let user_id = user_id
            .parse::<Uuid>()
            .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid user id")))?;
        let organization_id = organization_id
            .parse::<Uuid>()
            .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid organization id")))?;

        // Resolve the canonical organization before touching memberships.
        let org = self
            .store
            .find_organization_by_id(organization_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Organization not found")))?;

        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

        self.store
            .upsert_membership(user_id, org.id, role, invited_by)
            .await
    }

    /// Display accessor for a caller's membership role. Intentionally
    /// conflates every failure into `None`: this is never used for gating.
    pub async fn membership_role(&self, user_id: Uuid, organization_id: Uuid) -> Option<Role> {
        match self.store.find_membership(user_id, organization_id).await {
            Ok(Some(m)) if m.is_active => m.parsed_role(),
            _ => None,
        }
    }
}
