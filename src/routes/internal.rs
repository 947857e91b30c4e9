/// Calls for sibling services
///
/// Token validation (the same check the authorization gate performs) and
/// account lookup, so other services can authenticate their callers and
/// resolve the accounts they refer to.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{SessionManager, TokenValidation};
use crate::error::{AppError, ErrorContext, ValidationError};
use crate::logger::RequestId;
use crate::users::{User, UserService};

#[derive(Deserialize)]
pub struct ValidateTokenRequest {
    pub token: String,
}

#[derive(Serialize, Default)]
pub struct ValidateTokenResponse {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// POST /internal/auth/validate
///
/// - 200 with the identity for a valid token
/// - 401 with `is_valid: false` and a reason for any rejected token
/// - 500 when the blacklist cannot be consulted
pub async fn validate_token(
    form: web::Json<ValidateTokenRequest>,
    sessions: web::Data<SessionManager>,
    request_id: RequestId,
) -> HttpResponse {
    let context = ErrorContext::new("token_validation").with_request_id(request_id.0);

    let outcome = match sessions.validator().validate(&form.token).await {
        Ok(outcome) => outcome,
        Err(e) => {
            context.log_error(&AppError::from(e));
            return HttpResponse::InternalServerError().json(ValidateTokenResponse {
                is_valid: false,
                error_message: Some("token validation unavailable".to_string()),
                ..Default::default()
            });
        }
    };

    match outcome {
        TokenValidation::Valid(identity) => HttpResponse::Ok().json(ValidateTokenResponse {
            is_valid: true,
            user_id: Some(identity.user_id.to_string()),
            username: Some(identity.username),
            role: Some(identity.role),
            error_message: None,
        }),
        TokenValidation::Rejected(rejection) => {
            tracing::debug!(
                request_id = %context.request_id,
                reason = %rejection.message(),
                "Token rejected"
            );
            HttpResponse::Unauthorized().json(ValidateTokenResponse {
                is_valid: false,
                error_message: Some(rejection.message()),
                ..Default::default()
            })
        }
    }
}

#[derive(Serialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

/// GET /internal/accounts/{id}
///
/// - 200 with the account
/// - 400 for a blank or malformed id
/// - 404 when no such account exists
pub async fn get_account(
    path: web::Path<String>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AppError> {
    let raw = path.trim();
    if raw.is_empty() {
        return Err(ValidationError::EmptyField("user id".to_string()).into());
    }
    let id = Uuid::parse_str(raw)
        .map_err(|_| ValidationError::InvalidFormat("user id".to_string()))?;

    let user = users.get_user(id).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// GET /internal/accounts
pub async fn list_accounts(users: web::Data<UserService>) -> Result<HttpResponse, AppError> {
    let all = users.list_users().await?;
    Ok(HttpResponse::Ok().json(UsersResponse { users: all }))
}

