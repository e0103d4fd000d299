use axum::extract::ConnectInfo;
use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use std::net::SocketAddr;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request-scoped metadata captured once and threaded through extensions.
///
/// The request id doubles as the correlation id on every authorization
/// decision and audit record emitted while handling the request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub ip_address: String,
    pub user_agent: Option<String>,
}

impl RequestContext {
    fn from_request(request_id: String, req: &Request) -> Self {
        let ip_address = req
            .headers()
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|s| s.trim().to_string())
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ci| ci.0.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());

        let user_agent = req
            .headers()
            .get(axum::http::header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        Self {
            request_id,
            method: req.method().to_string(),
            path: req.uri().path().to_string(),
            query: req.uri().query().map(|q| q.to_string()),
            ip_address,
            user_agent,
        }
    }
}

/// Assigns a request id (honoring an inbound `x-request-id`), captures the
/// request metadata into a [`RequestContext`] extension, and echoes the id
/// back on the response.
pub async fn request_context_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    let context = RequestContext::from_request(request_id.clone(), &req);
    req.extensions_mut().insert(context);

    let mut response = next.run(req).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER, header_value);
    }

    response
}
