//! Organization guard middleware.
//!
//! Resolves which organization the request is about (path, then JSON body,
//! then query string), asks the [`MembershipAuthorizer`] whether the
//! authenticated user clears the route's required role, and inserts the
//! resulting [`OrgAccess`] proof into request extensions. Handlers behind
//! this guard never re-check membership.

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
use crate::models::Role;
use crate::services::org_resolver::resolve_org_id;
use crate::AppState;

/// Per-route authorization requirement, passed to the middleware as state.
#[derive(Clone)]
pub struct RoleGuard {
    pub state: AppState,
    pub required: Role,
    pub allow_super_admin_bypass: bool,
}

impl RoleGuard {
    pub fn new(state: AppState, required: Role) -> Self {
        Self {
            state,
            required,
            allow_super_admin_bypass: true,
        }
    }

    /// A guard that ignores `is_super_admin` and requires a real membership.
    pub fn without_bypass(state: AppState, required: Role) -> Self {
        Self {
            state,
            required,
            allow_super_admin_bypass: false,
        }
    }
}

pub async fn org_guard_middleware(
    State(guard): State<RoleGuard>,
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
                "org guard reached without an authenticated user; is auth_middleware applied?"
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

    let raw_params = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .map_err(|err| AppError::InternalError(anyhow::anyhow!("path params: {}", err)))?;
    let path_params: Vec<(String, String)> = raw_params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    // Path parameters win outright, so the body is only buffered when they
    // miss. The buffered bytes are put back so extractors downstream still
    // see the full body.
    let mut org_ref = resolve_org_id(&path_params, None, None);

    let body = if org_ref.is_none() {
        let is_json = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/json"))
            .unwrap_or(false);

        let bytes = body
            .collect()
            .await
            .map_err(|err| AppError::BadRequest(anyhow::anyhow!("failed to read body: {}", err)))?
            .to_bytes();

        let json = if is_json && !bytes.is_empty() {
            serde_json::from_slice::<serde_json::Value>(&bytes).ok()
        } else {
            None
        };

        org_ref = resolve_org_id(&[], json.as_ref(), parts.uri.query());

        Body::from(bytes)
    } else {
        body
    };

    let access = guard
        .state
        .authorizer
        .authorize(
            &user.0,
            org_ref.as_deref(),
            guard.required,
            guard.allow_super_admin_bypass,
            &ctx,
        )
        .await?;

    parts.extensions.insert(access);

    Ok(next.run(Request::from_parts(parts, body)).await)
}
