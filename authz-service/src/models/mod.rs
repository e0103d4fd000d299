pub mod audit_log;
pub mod membership;
pub mod organization;
pub mod role;
pub mod user;

pub use audit_log::{AuditLog, AuditLogResponse, OperationKind};
pub use membership::{MemberRow, OrgAccessRow, OrgMembership};
pub use organization::{Organization, OrganizationResponse};
pub use role::Role;
pub use user::{User, UserResponse};
