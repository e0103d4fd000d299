//! PostgreSQL store.
//!
//! The store is consumed through the [`AuthzStore`] trait so the guards and
//! the authorizer can be exercised against in-memory fakes; [`Database`] is
//! the production implementation over a sqlx pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::PgPool;
use uuid::Uuid;

use crate::models::{
    AuditLog, MemberRow, OrgAccessRow, Organization, OrgMembership, Role, User,
};

/// Filters for the audit-log listing.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub user_id: Option<Uuid>,
    pub operation: Option<String>,
    pub entity_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
}

/// Everything the authorization and audit pipeline needs from the store.
#[async_trait]
pub trait AuthzStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_organization_by_id(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, AppError>;

    /// Organization existence and the caller's active membership, resolved
    /// in a single round trip. `None` when the organization does not exist;
    /// `Some` with `membership_role: None` when the caller is not an active
    /// member.
    async fn find_org_access(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<OrgAccessRow>, AppError>;

    /// Creates the organization together with the creator's owner
    /// membership, in one transaction.
    async fn create_organization(
        &self,
        org: &Organization,
        owner_id: Uuid,
    ) -> Result<(), AppError>;

    /// Insert-or-update on the (user_id, organization_id) unique pair,
    /// reactivating and re-roling any existing row.
    async fn upsert_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        role: Role,
        invited_by: Option<Uuid>,
    ) -> Result<OrgMembership, AppError>;

    async fn find_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<OrgMembership>, AppError>;

    /// Soft-deactivate. Returns false when no active row existed.
    async fn deactivate_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<bool, AppError>;

    async fn list_members(&self, organization_id: Uuid) -> Result<Vec<MemberRow>, AppError>;

    async fn insert_audit_log(&self, record: &AuditLog) -> Result<(), AppError>;

    async fn list_audit_logs(
        &self,
        organization_id: Uuid,
        filter: &AuditLogFilter,
    ) -> Result<(Vec<AuditLog>, i64), AppError>;
}

/// PostgreSQL implementation of [`AuthzStore`].
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }
}

#[async_trait]
impl AuthzStore for Database {
    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Database health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
            })?;
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn find_organization_by_id(
        &self,
        organization_id: Uuid,
    ) -> Result<Option<Organization>, AppError> {
        sqlx::query_as::<_, Organization>("SELECT * FROM organizations WHERE id = $1")
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn find_org_access(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<OrgAccessRow>, AppError> {
        sqlx::query_as::<_, OrgAccessRow>(
            r#"
            SELECT o.id AS organization_id,
                   o.is_active AS organization_active,
                   m.role AS membership_role
            FROM organizations o
            LEFT JOIN organization_memberships m
              ON m.organization_id = o.id
             AND m.user_id = $2
             AND m.is_active = true
            WHERE o.id = $1
            "#,
        )
        .bind(organization_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn create_organization(
        &self,
        org: &Organization,
        owner_id: Uuid,
    ) -> Result<(), AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(org.id)
        .bind(&org.name)
        .bind(org.is_active)
        .bind(org.created_at)
        .bind(org.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        sqlx::query(
            r#"
            INSERT INTO organization_memberships
                (user_id, organization_id, role, is_active, invited_by, created_at, updated_at)
            VALUES ($1, $2, $3, true, NULL, NOW(), NOW())
            "#,
        )
        .bind(owner_id)
        .bind(org.id)
        .bind(Role::Owner.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn upsert_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
        role: Role,
        invited_by: Option<Uuid>,
    ) -> Result<OrgMembership, AppError> {
        sqlx::query_as::<_, OrgMembership>(
            r#"
            INSERT INTO organization_memberships
                (user_id, organization_id, role, is_active, invited_by, created_at, updated_at)
            VALUES ($1, $2, $3, true, $4, NOW(), NOW())
            ON CONFLICT (user_id, organization_id) DO UPDATE
            SET role = EXCLUDED.role,
                is_active = true,
                invited_by = COALESCE(organization_memberships.invited_by, EXCLUDED.invited_by),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .bind(role.as_str())
        .bind(invited_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn find_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<Option<OrgMembership>, AppError> {
        sqlx::query_as::<_, OrgMembership>(
            "SELECT * FROM organization_memberships WHERE user_id = $1 AND organization_id = $2",
        )
        .bind(user_id)
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn deactivate_membership(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE organization_memberships
            SET is_active = false, updated_at = NOW()
            WHERE user_id = $1 AND organization_id = $2 AND is_active = true
            "#,
        )
        .bind(user_id)
        .bind(organization_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_members(&self, organization_id: Uuid) -> Result<Vec<MemberRow>, AppError> {
        sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT u.id AS user_id, u.email, u.full_name,
                   m.role, m.invited_by, m.created_at
            FROM organization_memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.organization_id = $1 AND m.is_active = true
            ORDER BY m.created_at
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))
    }

    async fn insert_audit_log(&self, record: &AuditLog) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs
                (id, user_id, organization_id, operation, entity_type, entity_id,
                 request_method, request_path, status_code, success,
                 ip_address, user_agent, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.organization_id)
        .bind(&record.operation)
        .bind(&record.entity_type)
        .bind(&record.entity_id)
        .bind(&record.request_method)
        .bind(&record.request_path)
        .bind(record.status_code)
        .bind(record.success)
        .bind(&record.ip_address)
        .bind(&record.user_agent)
        .bind(&record.metadata)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;
        Ok(())
    }

    async fn list_audit_logs(
        &self,
        organization_id: Uuid,
        filter: &AuditLogFilter,
    ) -> Result<(Vec<AuditLog>, i64), AppError> {
        // Dynamic WHERE clause; bind order must match condition order below.
        let mut conditions = vec!["organization_id = $1".to_string()];
        let mut param_idx = 2;

        if filter.user_id.is_some() {
            conditions.push(format!("user_id = ${}", param_idx));
            param_idx += 1;
        }
        if filter.operation.is_some() {
            conditions.push(format!("operation = ${}", param_idx));
            param_idx += 1;
        }
        if filter.entity_type.is_some() {
            conditions.push(format!("entity_type = ${}", param_idx));
            param_idx += 1;
        }
        if filter.from.is_some() {
            conditions.push(format!("created_at >= ${}", param_idx));
            param_idx += 1;
        }
        if filter.to.is_some() {
            conditions.push(format!("created_at <= ${}", param_idx));
            param_idx += 1;
        }

        let where_clause = conditions.join(" AND ");

        let count_query = format!("SELECT COUNT(*) FROM audit_logs WHERE {}", where_clause);
        let data_query = format!(
            "SELECT * FROM audit_logs WHERE {} ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            where_clause,
            param_idx,
            param_idx + 1
        );

        let mut count_q = sqlx::query_as::<_, (i64,)>(&count_query).bind(organization_id);
        if let Some(user_id) = filter.user_id {
            count_q = count_q.bind(user_id);
        }
        if let Some(operation) = &filter.operation {
            count_q = count_q.bind(operation);
        }
        if let Some(entity_type) = &filter.entity_type {
            count_q = count_q.bind(entity_type);
        }
        if let Some(from) = filter.from {
            count_q = count_q.bind(from);
        }
        if let Some(to) = filter.to {
            count_q = count_q.bind(to);
        }

        let (total,) = count_q
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        let mut data_q = sqlx::query_as::<_, AuditLog>(&data_query).bind(organization_id);
        if let Some(user_id) = filter.user_id {
            data_q = data_q.bind(user_id);
        }
        if let Some(operation) = &filter.operation {
            data_q = data_q.bind(operation);
        }
        if let Some(entity_type) = &filter.entity_type {
            data_q = data_q.bind(entity_type);
        }
        if let Some(from) = filter.from {
            data_q = data_q.bind(from);
        }
        if let Some(to) = filter.to {
            data_q = data_q.bind(to);
        }
        data_q = data_q.bind(filter.limit).bind(filter.offset);

        let records = data_q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

        Ok((records, total))
    }
}
