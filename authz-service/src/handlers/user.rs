//! Current-user handlers.

use axum::extract::Json;

use crate::middleware::auth::CurrentUser;
use crate::models::UserResponse;
use service_core::error::AppError;

/// Return the authenticated caller's own user record.
///
/// GET /users/me
pub async fn get_me(CurrentUser(user): CurrentUser) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(UserResponse::from(user)))
}
