pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use service_core::error::AppError;
use service_core::middleware::security_headers::security_headers_middleware;
use service_core::middleware::tracing::request_context_middleware;

use crate::config::AuthzConfig;
use crate::middleware::{
    audit::{audit_middleware, AuditGuard},
    auth::auth_middleware,
    org_guard::{org_guard_middleware, RoleGuard},
};
use crate::models::{OperationKind, Role};
use crate::services::{
    AuditWriter, AuthzStore, IdentityProvider, MembershipAuthorizer, SecurityEventLogger,
};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: AuthzConfig,
    pub store: Arc<dyn AuthzStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub authorizer: MembershipAuthorizer,
    pub security_events: SecurityEventLogger,
    pub audit: AuditWriter,
}

pub fn build_router(state: AppState) -> Result<Router, AppError> {
    // Each path is registered once; role guards are layered per method
    // router. Audit guards wrap the handler inside the role guard, so a
    // request denied by the role guard is never audited, and an audited
    // handler always sees the access proof.
    let authenticated = Router::new()
        .route("/users/me", get(handlers::user::get_me))
        .route(
            "/orgs",
            post(handlers::org::create_organization).layer(from_fn_with_state(
                AuditGuard::new(state.clone(), OperationKind::Create, "organization"),
                audit_middleware,
            )),
        )
        .route(
            "/orgs/:id",
            get(handlers::org::get_organization).layer(from_fn_with_state(
                RoleGuard::new(state.clone(), Role::Readonly),
                org_guard_middleware,
            )),
        )
        .route(
            "/orgs/:id/members",
            get(handlers::org::list_members)
                .layer(from_fn_with_state(
                    RoleGuard::new(state.clone(), Role::Member),
                    org_guard_middleware,
                ))
                .merge(
                    post(handlers::org::add_member)
                        .layer(from_fn_with_state(
                            AuditGuard::new(state.clone(), OperationKind::Create, "membership"),
                            audit_middleware,
                        ))
                        .layer(from_fn_with_state(
                            RoleGuard::new(state.clone(), Role::Admin),
                            org_guard_middleware,
                        )),
                ),
        )
        .route(
            "/orgs/:id/members/:user_id",
            patch(handlers::org::update_member)
                .layer(from_fn_with_state(
                    AuditGuard::new(state.clone(), OperationKind::Update, "membership"),
                    audit_middleware,
                ))
                .merge(delete(handlers::org::remove_member).layer(from_fn_with_state(
                    AuditGuard::new(state.clone(), OperationKind::Delete, "membership"),
                    audit_middleware,
                )))
                .layer(from_fn_with_state(
                    RoleGuard::new(state.clone(), Role::Admin),
                    org_guard_middleware,
                )),
        )
        .route(
            "/orgs/:id/audit-logs",
            get(handlers::audit::list_audit_logs)
                .layer(from_fn_with_state(
                    AuditGuard::new(state.clone(), OperationKind::Export, "audit_log")
                        .sensitive(),
                    audit_middleware,
                ))
                .layer(from_fn_with_state(
                    RoleGuard::new(state.clone(), Role::Admin),
                    org_guard_middleware,
                )),
        )
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config
                .security
                .allowed_origins
                .iter()
                .filter_map(|origin| {
                    origin
                        .parse::<HeaderValue>()
                        .map_err(|e| {
                            tracing::error!("Invalid CORS origin '{}': {}", origin, e);
                            e
                        })
                        .ok()
                })
                .collect::<Vec<HeaderValue>>(),
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .merge(authenticated)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(service_core::middleware::tracing::REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(request_context_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors);

    Ok(app)
}
