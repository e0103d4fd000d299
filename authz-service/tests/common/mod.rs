//! Shared fakes and router harness for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

use authz_service::config::{
    AuditConfig, AuthzConfig, DatabaseConfig, Environment, IdentityProviderConfig, SecurityConfig,
};
use authz_service::models::{
    AuditLog, MemberRow, OrgAccessRow, Organization, OrgMembership, Role, User,
};
use authz_service::services::{
    AuditLogFilter, AuditWriter, AuthzStore, IdentityError, IdentityProvider,
    MembershipAuthorizer, SecurityEventLogger, Subject,
};
use authz_service::{build_router, AppState};
use service_core::error::AppError;

pub const GOOD_TOKEN: &str = "good-token";

/// In-memory store with per-method failure injection and call counters.
#[derive(Default)]
pub struct FakeStore {
    pub users: Mutex<HashMap<Uuid, User>>,
    pub organizations: Mutex<HashMap<Uuid, Organization>>,
    pub memberships: Mutex<HashMap<(Uuid, Uuid), OrgMembership>>,
    pub audit_logs: Mutex<Vec<AuditLog>>,
    /// When set, every store method returns a database error.
    pub fail: Mutex<bool>,
    pub access_calls: AtomicUsize,
    pub user_lookup_calls: AtomicUsize,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        *self.fail.lock().unwrap() = failing;
    }

    fn check_fail(&self) -> Result<(), AppError> {
        if *self.fail.lock().unwrap() {
            Err(AppError::DatabaseError(anyhow::anyhow!(
                "injected store failure"
            )))
        } else {
            Ok(())
        }
    }

    pub fn add_user(&self, user: User) {
        self.users.lock().unwrap().insert(user.id, user);
    }

    pub fn add_organization(&self, org: Organization) {
        self.organizations.lock().unwrap().insert(org.id, org);
    }

    pub fn add_membership(&self, user_id: Uuid, organization_id: Uuid, role: Role) {
        let now = Utc::now();
        self.memberships.lock().unwrap().insert(
            (user_id, organization_id),
            OrgMembership {
                user_id,
                organization_id,
                role: role.as_str().to_string(),
                is_active: true,
                invited_by: None,
                created_at: now,
                updated_at: now,
            },
        );
    }

    pub fn audit_log_count(&self) -> usize {
        self.audit_logs.lock().unwrap().len()
    }
}

#[async_trait]
impl AuthzStore for FakeStore {
    async fn health_check(&self) -> Result<(), AppError> {
        self.check_fail()
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        self.user_lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fail()?;
        Ok(self.users.lock().unwrap().get(&user_id).cloned())
    }

    async fn find_organization_by_id(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, AppError> {
        self.check_fail()?;
        Ok(self
            .organizations
            .lock()
            .unwrap()
            .get(&organization_id)
            .cloned())
    }

    async fn find_org_access(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<OrgAccessRow>, AppError> {
        self.access_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fail()?;

        let org = match self
            .organizations
            .lock()
            .unwrap()
            .get(&organization_id)
            .cloned()
        {
            Some(org) => org,
            None => return Ok(None),
        };

        let membership_role = self
            .memberships
            .lock()
            .unwrap()
            .get(&(user_id, organization_id))
            .filter(|m| m.is_active)
            .map(|m| m.role.clone());

        Ok(Some(OrgAccessRow {
            organization_id: org.id,
            organization_active: org.is_active,
            membership_role,
        }))
    }

    async fn create_organization(
        &self,
        org: &Organization,
        owner_id: Uuid,
    ) -> Result<(), AppError> {
        self.check_fail()?;
        self.add_organization(org.clone());
        self.add_membership(owner_id, org.id, Role::Owner);
        Ok(())
    }

    async fn upsert_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        role: Role,
        invited_by: Option<Uuid>,
    ) -> Result<OrgMembership, AppError> {
        self.check_fail()?;
        let now = Utc::now();
        let mut memberships = self.memberships.lock().unwrap();
        let membership = memberships
            .entry((user_id, organization_id))
            .and_modify(|m| {
                m.role = role.as_str().to_string();
                m.is_active = true;
                m.updated_at = now;
            })
            .or_insert(OrgMembership {
                user_id,
                organization_id,
                role: role.as_str().to_string(),
                is_active: true,
                invited_by,
                created_at: now,
                updated_at: now,
            });
        Ok(membership.clone())
    }

    async fn find_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<OrgMembership>, AppError> {
        self.check_fail()?;
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .get(&(user_id, organization_id))
            .cloned())
    }

    async fn deactivate_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<bool, AppError> {
        self.check_fail()?;
        let mut memberships = self.memberships.lock().unwrap();
        match memberships.get_mut(&(user_id, organization_id)) {
            Some(m) if m.is_active => {
                m.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_members(&self, organization_id: Uuid) -> Result<Vec<MemberRow>, AppError> {
        self.check_fail()?;
        let users = self.users.lock().unwrap();
        let members = self
            .memberships
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.organization_id == organization_id && m.is_active)
            .map(|m| {
                let (email, full_name) = users
                    .get(&m.user_id)
                    .map(|u| (u.email.clone(), u.full_name.clone()))
                    .unwrap_or_else(|| (String::new(), None));
                MemberRow {
                    user_id: m.user_id,
                    email,
                    full_name,
                    role: m.role.clone(),
                    invited_by: m.invited_by,
                    created_at: m.created_at,
                }
            })
            .collect();
        Ok(members)
    }

    async fn insert_audit_log(&self, record: &AuditLog) -> Result<(), AppError> {
        self.check_fail()?;
        self.audit_logs.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn list_audit_logs(
        &self,
        organization_id: Uuid,
        filter: &AuditLogFilter,
    ) -> Result<(Vec<AuditLog>, i64), AppError> {
        self.check_fail()?;
        let logs: Vec<AuditLog> = self
            .audit_logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.organization_id == Some(organization_id))
            .filter(|l| filter.user_id.map_or(true, |u| l.user_id == u))
            .filter(|l| {
                filter
                    .operation
                    .as_deref()
                    .map_or(true, |op| l.operation == op)
            })
            .cloned()
            .collect();
        let total = logs.len() as i64;
        Ok((logs, total))
    }
}

/// Fake identity provider: one known token per subject, plus a call counter
/// so tests can assert it was never consulted.
#[derive(Default)]
pub struct FakeIdentityProvider {
    pub subjects: Mutex<HashMap<String, Subject>>,
    pub verify_calls: AtomicUsize,
}

impl FakeIdentityProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, token: &str, subject: Subject) {
        self.subjects
            .lock()
            .unwrap()
            .insert(token.to_string(), subject);
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Subject, IdentityError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.subjects
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or(IdentityError::InvalidToken)
    }
}

pub fn test_config() -> AuthzConfig {
    AuthzConfig {
        common: service_core::config::Config {
            port: 8080,
            otlp_endpoint: None,
        },
        environment: Environment::Dev,
        service_name: "authz-service".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
        },
        identity_provider: IdentityProviderConfig {
            base_url: "http://identity.invalid".to_string(),
            api_key: "test-key".to_string(),
            timeout_ms: 1000,
        },
        audit: AuditConfig { queue_capacity: 64 },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    }
}

/// Full router over fakes, plus handles for inspection. The state is
/// exposed so tests can layer the middleware onto purpose-built routes.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<FakeStore>,
    pub identity: Arc<FakeIdentityProvider>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = FakeStore::new();
        let identity = FakeIdentityProvider::new();
        let events = SecurityEventLogger::new();
        let authorizer = MembershipAuthorizer::new(store.clone(), events.clone());
        let (audit, _worker) = AuditWriter::spawn(store.clone(), events.clone(), 64);

        let state = AppState {
            config: test_config(),
            store: store.clone(),
            identity: identity.clone(),
            authorizer,
            security_events: events,
            audit,
        };

        let router = build_router(state.clone()).expect("router");

        Self {
            router,
            state,
            store,
            identity,
        }
    }

    /// Seeds a user and registers `GOOD_TOKEN` for it.
    pub fn seed_user(&self, is_super_admin: bool) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: "caller@example.com".to_string(),
            full_name: Some("Test Caller".to_string()),
            role: "user".to_string(),
            organization_id: None,
            is_super_admin,
            metadata: None,
            created_at: now,
            updated_at: now,
        };
        self.store.add_user(user.clone());
        self.identity.register(
            GOOD_TOKEN,
            Subject {
                id: user.id,
                email: user.email.clone(),
            },
        );
        user
    }

    pub fn seed_org(&self) -> Organization {
        let org = Organization::new("Acme".to_string());
        self.store.add_organization(org.clone());
        org
    }

    pub async fn request(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.expect("response")
    }
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn get(path: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).expect("request")
}

pub fn json_request(method: &str, path: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}
