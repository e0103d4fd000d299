//! Background audit persistence.
//!
//! The request path only enqueues records onto a bounded channel; a single
//! background task drains it and writes to the store. A full queue drops the
//! record with a warning rather than blocking or buffering without bound,
//! and an insert failure is logged but never surfaces to any request.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::models::AuditLog;
use crate::services::database::AuthzStore;
use crate::services::security_events::{SecurityEvent, SecurityEventKind, SecurityEventLogger};

#[derive(Clone)]
pub struct AuditWriter {
    tx: mpsc::Sender<AuditLog>,
    events: SecurityEventLogger,
}

impl AuditWriter {
    /// Spawns the writer task. The task ends once every handle has been
    /// dropped and the queue has drained, so records already enqueued are
    /// written even when the originating request is long gone.
    pub fn spawn(
        store: Arc<dyn AuthzStore>,
        events: SecurityEventLogger,
        queue_capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<AuditLog>(queue_capacity);

        let worker_events = events.clone();
        let handle = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = store.insert_audit_log(&record).await {
                    tracing::error!(
                        error = %e,
                        operation = %record.operation,
                        entity_type = %record.entity_type,
                        "failed to persist audit record"
                    );
                    worker_events.log(
                        SecurityEventKind::AuditWriteFailed,
                        SecurityEvent::new()
                            .user_id(record.user_id)
                            .reason(e.to_string())
                            .path(record.request_path.clone())
                            .method(record.request_method.clone()),
                    );
                }
            }
            tracing::info!("audit writer drained and stopped");
        });

        (Self { tx, events }, handle)
    }

    /// Non-blocking enqueue. Dropping on a full queue is the backpressure
    /// policy: audit durability is best-effort and must not add latency to
    /// the request path.
    pub fn enqueue(&self, record: AuditLog) {
        if let Err(err) = self.tx.try_send(record) {
            let record = match err {
                mpsc::error::TrySendError::Full(r) => {
                    tracing::warn!(
                        operation = %r.operation,
                        entity_type = %r.entity_type,
                        "audit queue full, dropping record"
                    );
                    r
                }
                mpsc::error::TrySendError::Closed(r) => {
                    tracing::error!(
                        operation = %r.operation,
                        "audit writer stopped, dropping record"
                    );
                    r
                }
            };
            self.events.log(
                SecurityEventKind::AuditWriteFailed,
                SecurityEvent::new()
                    .user_id(record.user_id)
                    .reason("audit record dropped before persistence")
                    .path(record.request_path)
                    .method(record.request_method),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AuditLog, MemberRow, OperationKind, OrgAccessRow, Organization, OrgMembership, Role, User,
    };
    use crate::services::database::AuditLogFilter;
    use async_trait::async_trait;
    use service_core::error::AppError;
    use std::sync::Mutex;
    use std::time::Duration;
    use uuid::Uuid;

    /// Store that records inserted audit rows; optionally fails every
    /// insert.
    struct RecordingStore {
        records: Mutex<Vec<AuditLog>>,
        fail_inserts: bool,
    }

    impl RecordingStore {
        fn new(fail_inserts: bool) -> Self {
            Self {
                records: Mutex::new(vec![]),
                fail_inserts,
            }
        }
    }

    #[async_trait]
    impl AuthzStore for RecordingStore {
        async fn health_check(&self) -> Result<(), AppError> {
            Ok(())
        }
        async fn find_user_by_id(&self, _user_id: Uuid) -> Result<Option<User>, AppError> {
            Ok(None)
        }
        async fn find_organization_by_id(
            &self,
            _organization_id: Uuid,
        ) -> Result<Option<Organization>, AppError> {
            Ok(None)
        }
        async fn find_org_access(
            &self,
            _organization_id: Uuid,
            _user_id: Uuid,
        ) -> Result<Option<OrgAccessRow>, AppError> {
            Ok(None)
        }
        async fn create_organization(
            &self,
            _org: &Organization,
            _owner_id: Uuid,
        ) -> Result<(), AppError> {
            Ok(())
        }
        async fn upsert_membership(
            &self,
            _user_id: Uuid,
            _organization_id: Uuid,
            _role: Role,
            _invited_by: Option<Uuid>,
        ) -> Result<OrgMembership, AppError> {
            Err(AppError::InternalError(anyhow::anyhow!("unused")))
        }
        async fn find_membership(
            &self,
            _user_id: Uuid,
            _organization_id: Uuid,
        ) -> Result<Option<OrgMembership>, AppError> {
            Ok(None)
        }
        async fn deactivate_membership(
            &self,
            _user_id: Uuid,
            _organization_id: Uuid,
        ) -> Result<bool, AppError> {
            Ok(false)
        }
        async fn list_members(&self, _organization_id: Uuid) -> Result<Vec<MemberRow>, AppError> {
            Ok(vec![])
        }
        async fn insert_audit_log(&self, record: &AuditLog) -> Result<(), AppError> {
            if self.fail_inserts {
                return Err(AppError::DatabaseError(anyhow::anyhow!("disk full")));
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
        async fn list_audit_logs(
            &self,
            _organization_id: Uuid,
            _filter: &AuditLogFilter,
        ) -> Result<(Vec<AuditLog>, i64), AppError> {
            Ok((vec![], 0))
        }
    }

    fn record(path: &str) -> AuditLog {
        AuditLog::new(
            Uuid::new_v4(),
            None,
            OperationKind::Delete,
            "order",
            Some("5".to_string()),
            "DELETE",
            path,
            200,
            "127.0.0.1",
            None,
            None,
        )
    }

    #[tokio::test]
    async fn enqueued_records_are_persisted_after_writer_drains() {
        let store = Arc::new(RecordingStore::new(false));
        let (writer, handle) =
            AuditWriter::spawn(store.clone(), SecurityEventLogger::new(), 16);

        writer.enqueue(record("/orders/1"));
        writer.enqueue(record("/orders/2"));
        drop(writer);

        handle.await.unwrap();
        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn insert_failure_does_not_stop_the_writer() {
        let store = Arc::new(RecordingStore::new(true));
        let (writer, handle) =
            AuditWriter::spawn(store.clone(), SecurityEventLogger::new(), 16);

        writer.enqueue(record("/orders/1"));
        writer.enqueue(record("/orders/2"));
        drop(writer);

        // Worker must survive both failed inserts and terminate cleanly.
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("writer task hung")
            .unwrap();
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        // A closed channel exercises the same non-blocking drop path
        // without racing the worker.
        let store = Arc::new(RecordingStore::new(false));
        let (writer, handle) = AuditWriter::spawn(store, SecurityEventLogger::new(), 1);
        handle.abort();
        let _ = handle.await;

        // Must return immediately even though nothing will consume it.
        writer.enqueue(record("/orders/1"));
        writer.enqueue(record("/orders/2"));
    }
}
