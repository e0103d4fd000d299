pub mod audit_writer;
pub mod authorizer;
pub mod database;
pub mod identity;
pub mod org_resolver;
pub mod security_events;

pub use audit_writer::AuditWriter;
pub use authorizer::{MembershipAuthorizer, OrgAccess};
pub use database::{AuditLogFilter, AuthzStore, Database};
pub use identity::{HttpIdentityProvider, IdentityError, IdentityProvider, Subject};
pub use org_resolver::resolve_org_id;
pub use security_events::{Decision, SecurityEvent, SecurityEventKind, SecurityEventLogger};
