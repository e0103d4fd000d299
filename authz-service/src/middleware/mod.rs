pub mod audit;
pub mod auth;
pub mod org_guard;

pub use audit::{audit_middleware, AuditGuard};
pub use auth::{auth_middleware, CurrentUser};
pub use org_guard::{org_guard_middleware, RoleGuard};
