//! Audit middleware.
//!
//! Wraps audited routes: records a security event before and after the
//! handler, then enqueues a durable [`AuditLog`] for mutating or sensitive
//! operations. The record is written for failed requests too, with the
//! response status it actually returned. Persistence is best effort and
//! asynchronous; the response never waits on the audit table.

use axum::{
    body::Body,
    extract::{FromRequestParts, RawPathParams, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use service_core::error::AppError;
use service_core::middleware::tracing::RequestContext;

use crate::middleware::auth::CurrentUser;
use crate::models::{AuditLog, OperationKind};
use crate::services::authorizer::OrgAccess;
use crate::services::security_events::{SecurityEvent, SecurityEventKind};
use crate::AppState;

/// Path parameters treated as the audited entity's id, in lookup order.
const ENTITY_ID_PARAMS: [&str; 3] = ["user_id", "member_id", "entity_id"];

/// Per-route audit configuration, passed to the middleware as state.
#[derive(Clone)]
pub struct AuditGuard {
    pub state: AppState,
    pub operation: OperationKind,
    pub entity_type: &'static str,
    /// Sensitive routes are always persisted and never record request or
    /// response payloads.
    pub sensitive: bool,
}

impl AuditGuard {
    pub fn new(state: AppState, operation: OperationKind, entity_type: &'static str) -> Self {
        Self {
            state,
            operation,
            entity_type,
            sensitive: false,
        }
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

pub async fn audit_middleware(
    State(guard): State<AuditGuard>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let user = parts
        .extensions
        .get::<CurrentUser>()
        .cloned()
        .ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!(
                "audit guard reached without an authenticated user; is auth_middleware applied?"
            ))
        })?;

    let ctx = parts
        .extensions
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(|| RequestContext {
            request_id: "-".to_string(),
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            query: None,
            ip_address: "unknown".to_string(),
            user_agent: None,
        });

    // The guard runs inside the org guard, so a granted access proof is
    // already in extensions for org-scoped routes.
    let organization_id = parts
        .extensions
        .get::<OrgAccess>()
        .map(|access| access.organization_id);

    let raw_params = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .map_err(|err| AppError::InternalError(anyhow::anyhow!("path params: {}", err)))?;
    let entity_id = ENTITY_ID_PARAMS.iter().find_map(|name| {
        raw_params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.to_string())
    });

    // The request body goes into the record's metadata, except on sensitive
    // routes where only a marker is kept.
    let (body, request_body) = if guard.sensitive {
        (body, Some(serde_json::Value::String("[REDACTED]".to_string())))
    } else if parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/json"))
        .unwrap_or(false)
    {
        let bytes = body
            .collect()
            .await
            .map_err(|err| AppError::BadRequest(anyhow::anyhow!("failed to read body: {}", err)))?
            .to_bytes();
        let json = serde_json::from_slice::<serde_json::Value>(&bytes).ok();
        (Body::from(bytes), json)
    } else {
        (body, None)
    };

    let base_event = || {
        SecurityEvent::new()
            .request_id(&ctx.request_id)
            .user_id(user.0.id)
            .path(&ctx.path)
            .query(ctx.query.as_deref())
            .method(&ctx.method)
            .ip_address(&ctx.ip_address)
            .entity_id(entity_id.as_deref())
            .payload(request_body.clone())
    };

    let mut attempt = base_event().reason(format!(
        "{} {} attempt",
        guard.operation.as_str(),
        guard.entity_type
    ));
    if let Some(org_id) = organization_id {
        attempt = attempt.organization_id(org_id);
    }
    guard
        .state
        .security_events
        .log(SecurityEventKind::AuditOperationAttempt, attempt);

    let response = next.run(Request::from_parts(parts, body)).await;
    let status = response.status();
    let persist = guard.sensitive || guard.operation.is_persisted();

    // The response body goes into the record too, redacted on sensitive
    // routes, and is restored unchanged for the caller.
    let (response, response_body) = if guard.sensitive {
        (
            response,
            Some(serde_json::Value::String("[REDACTED]".to_string())),
        )
    } else if persist {
        let (resp_parts, resp_body) = response.into_parts();
        let bytes = resp_body
            .collect()
            .await
            .map_err(|err| {
                AppError::InternalError(anyhow::anyhow!("failed to read response body: {}", err))
            })?
            .to_bytes();
        let json = serde_json::from_slice::<serde_json::Value>(&bytes).ok();
        (
            axum::response::Response::from_parts(resp_parts, Body::from(bytes)),
            json,
        )
    } else {
        (response, None)
    };

    let mut result = base_event().reason(format!(
        "{} {} finished with {}",
        guard.operation.as_str(),
        guard.entity_type,
        status.as_u16()
    ));
    if let Some(org_id) = organization_id {
        result = result.organization_id(org_id);
    }
    guard
        .state
        .security_events
        .log(SecurityEventKind::AuditOperationResult, result);

    if persist {
        let metadata = Some(serde_json::json!({
            "request_id": ctx.request_id,
            "request_body": request_body,
            "response_body": response_body,
        }));

        guard.state.audit.enqueue(AuditLog::new(
            user.0.id,
            organization_id,
            guard.operation,
            guard.entity_type,
            entity_id,
            ctx.method.as_str(),
            ctx.path.as_str(),
            status.as_u16(),
            ctx.ip_address.as_str(),
            ctx.user_agent.clone(),
            metadata,
        ));
    }

    Ok(response)
}
