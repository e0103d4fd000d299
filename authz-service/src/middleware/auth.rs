//! Authentication middleware: bearer credential to application user.
//!
//! Resolves the caller's identity with the identity provider, then loads the
//! application's own user row, which is what every downstream authorization
//! decision is based on. Requests without a usable identity never reach the
//! user loader, and requests without a user row never reach a handler.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use service_core::middleware::tracing::RequestContext;

use crate::models::User;
use crate::services::identity::IdentityError;
use crate::services::security_events::{SecurityEvent, SecurityEventKind};
use crate::AppState;

/// The authenticated application user for the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(|| RequestContext {
            request_id: "-".to_string(),
            method: req.method().to_string(),
            path: req.uri().path().to_string(),
            query: None,
            ip_address: "unknown".to_string(),
            user_agent: None,
        });

    let event = || {
        SecurityEvent::new()
            .request_id(&ctx.request_id)
            .path(&ctx.path)
            .method(&ctx.method)
            .ip_address(&ctx.ip_address)
    };

    // An absent or malformed header is the common case, answered without
    // any identity-provider or store round trip.
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.trim().is_empty());

    let token = match token {
        Some(token) => token,
        None => {
            state
                .security_events
                .log(SecurityEventKind::AuthMissingToken, event());
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "missing or malformed Authorization header"
            )));
        }
    };

    let subject = match state.identity.verify(token).await {
        Ok(subject) => subject,
        Err(IdentityError::InvalidToken) => {
            state
                .security_events
                .log(SecurityEventKind::AuthInvalidToken, event());
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "identity provider rejected token"
            )));
        }
        Err(IdentityError::Unavailable(detail)) => {
            // No decision could be made; fail closed with a 500 rather
            // than interpreting provider downtime as a deny or a grant.
            state
                .security_events
                .log(SecurityEventKind::AuthInvalidToken, event().reason(&detail));
            return Err(AppError::InternalError(anyhow::anyhow!(
                "identity provider unavailable: {}",
                detail
            )));
        }
    };

    // The subject can exist at the identity provider without a provisioned
    // application user. That is a legitimate 401, distinct from the store
    // being unreachable.
    let user = match state.store.find_user_by_id(subject.id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            state
                .security_events
                .log(SecurityEventKind::AuthUserNotFound, event().user_id(subject.id));
            return Err(AppError::IdentityNotProvisioned(anyhow::anyhow!(
                "no application user for subject {}",
                subject.id
            )));
        }
        Err(err) => {
            state.security_events.log(
                SecurityEventKind::AuthDbError,
                event().user_id(subject.id).reason(err.to_string()),
            );
            return Err(err);
        }
    };

    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "CurrentUser missing from request extensions; is auth_middleware applied?"
                ))
            })
    }
}
