use actix_web::{web, HttpResponse};
use uuid::Uuid;

use super::ApiResponse;
use crate::auth::AuthenticatedUser;
use crate::error::{AppError, ValidationError};
use crate::users::UserService;

/// GET /api/v1/accounts/profile
///
/// The caller's own account, resolved from the identity the JWT middleware
/// injected.
pub async fn profile(
    identity: web::ReqData<AuthenticatedUser>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AppError> {
    let user = users.get_user(identity.user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("Profile retrieved successfully", user)))
}

/// GET /api/v1/accounts/list (admin only)
pub async fn list_users(users: web::Data<UserService>) -> Result<HttpResponse, AppError> {
    let all = users.list_users().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("Users retrieved successfully", all)))
}

/// GET /api/v1/accounts/{id} (admin only)
pub async fn get_user_by_id(
    path: web::Path<String>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AppError> {
    let id = Uuid::parse_str(&path)
        .map_err(|_| ValidationError::InvalidFormat("user id".to_string()))?;

    let user = users.get_user(id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new("User retrieved successfully", user)))
}
