//! Security event log.
//!
//! Structured, append-only record of every authentication and authorization
//! decision, emitted to the configured tracing sink under the `security`
//! target. This is an observability channel only: it never influences a
//! decision, never fails the request, and is independent of the durable
//! audit table.

use serde::Serialize;

use crate::models::Role;

/// Security event categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SecurityEventKind {
    /// No Authorization header, or one that is not `Bearer <token>`.
    AuthMissingToken,
    /// The identity provider rejected the presented token.
    AuthInvalidToken,
    /// Verified subject with no application user row.
    AuthUserNotFound,
    /// Store failure while resolving the application user.
    AuthDbError,
    /// Membership check passed.
    OrgAccessGranted,
    /// Membership check failed (not a member, insufficient role, missing or
    /// invalid org id, organization absent).
    OrgAccessDenied,
    /// Access granted through the super-admin bypass, without a membership
    /// lookup.
    OrgAccessSuperAdmin,
    /// Store failure during the membership check; request was denied.
    OrgAccessError,
    /// An audited handler is about to run.
    AuditOperationAttempt,
    /// An audited handler finished.
    AuditOperationResult,
    /// Best-effort audit persistence failed.
    AuditWriteFailed,
}

impl SecurityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventKind::AuthMissingToken => "AUTH_MISSING_TOKEN",
            SecurityEventKind::AuthInvalidToken => "AUTH_INVALID_TOKEN",
            SecurityEventKind::AuthUserNotFound => "AUTH_USER_NOT_FOUND",
            SecurityEventKind::AuthDbError => "AUTH_DB_ERROR",
            SecurityEventKind::OrgAccessGranted => "ORG_ACCESS_GRANTED",
            SecurityEventKind::OrgAccessDenied => "ORG_ACCESS_DENIED",
            SecurityEventKind::OrgAccessSuperAdmin => "ORG_ACCESS_SUPER_ADMIN",
            SecurityEventKind::OrgAccessError => "ORG_ACCESS_ERROR",
            SecurityEventKind::AuditOperationAttempt => "AUDIT_OPERATION_ATTEMPT",
            SecurityEventKind::AuditOperationResult => "AUDIT_OPERATION_RESULT",
            SecurityEventKind::AuditWriteFailed => "AUDIT_WRITE_FAILED",
        }
    }
}

/// Outcome of an authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    Grant,
    Deny,
    Error,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Grant => "GRANT",
            Decision::Deny => "DENY",
            Decision::Error => "ERROR",
        }
    }
}

/// One security event. Unset fields are simply omitted from the log line.
#[derive(Debug, Clone, Default)]
pub struct SecurityEvent {
    pub request_id: Option<String>,
    pub user_id: Option<String>,
    pub organization_id: Option<String>,
    pub required_role: Option<Role>,
    pub actual_role: Option<Role>,
    pub decision: Option<Decision>,
    pub reason: Option<String>,
    pub path: Option<String>,
    pub query: Option<String>,
    pub method: Option<String>,
    pub ip_address: Option<String>,
    pub entity_id: Option<String>,
    /// Request payload as observed by the audit pipeline; sensitive routes
    /// substitute a redaction marker before the event is built.
    pub payload: Option<serde_json::Value>,
}

impl SecurityEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn user_id(mut self, id: impl ToString) -> Self {
        self.user_id = Some(id.to_string());
        self
    }

    pub fn organization_id(mut self, id: impl ToString) -> Self {
        self.organization_id = Some(id.to_string());
        self
    }

    pub fn required_role(mut self, role: Role) -> Self {
        self.required_role = Some(role);
        self
    }

    pub fn actual_role(mut self, role: Option<Role>) -> Self {
        self.actual_role = role;
        self
    }

    pub fn decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn query(mut self, query: Option<impl Into<String>>) -> Self {
        self.query = query.map(Into::into);
        self
    }

    pub fn entity_id(mut self, id: Option<impl Into<String>>) -> Self {
        self.entity_id = id.map(Into::into);
        self
    }

    pub fn payload(mut self, payload: Option<serde_json::Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }
}

/// Fire-and-forget sink for security events.
///
/// `log` is infallible and synchronous; the tracing subscriber owns any
/// buffering and I/O, so the request pipeline never blocks on it.
#[derive(Debug, Clone, Default)]
pub struct SecurityEventLogger;

impl SecurityEventLogger {
    pub fn new() -> Self {
        Self
    }

    // Emits every populated field; callers pre-redact payloads on
    // sensitive routes, so nothing here decides what is safe to log.
    pub fn log(&self, kind: SecurityEventKind, event: SecurityEvent) {
        let payload = event.payload.as_ref().map(|p| p.to_string());
        tracing::warn!(
            target: "security",
            category = kind.as_str(),
            request_id = event.request_id.as_deref(),
            user_id = event.user_id.as_deref(),
            organization_id = event.organization_id.as_deref(),
            required_role = event.required_role.map(|r| r.as_str()),
            actual_role = event.actual_role.map(|r| r.as_str()),
            decision = event.decision.map(|d| d.as_str()),
            reason = event.reason.as_deref(),
            path = event.path.as_deref(),
            query = event.query.as_deref(),
            method = event.method.as_deref(),
            ip_address = event.ip_address.as_deref(),
            entity_id = event.entity_id.as_deref(),
            payload = payload.as_deref(),
            "security event"
        );
    }
}
