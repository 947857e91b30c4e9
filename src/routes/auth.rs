/// Authentication Routes
///
/// Registration, login, refresh token rotation and logout.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::auth::{AuthenticatedUser, SessionManager};
use crate::error::{AppError, ErrorContext, ValidationError};
use crate::logger::RequestId;
use crate::middleware::bearer_token;
use crate::users::{LoginRequest, RegisterRequest, User, UserService};

/// Token refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Optional logout body
#[derive(Deserialize, Default)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Login response payload
#[derive(Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// POST /api/v1/accounts/register
///
/// Creates an account with the default `user` role.
///
/// # Errors
/// - 400: Validation errors (name/username/email/password)
/// - 409: Username or email already registered
/// - 500: Internal server error
pub async fn register(
    form: web::Json<RegisterRequest>,
    users: web::Data<UserService>,
    request_id: RequestId,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration").with_request_id(request_id.0);

    let user = users.register(form.into_inner()).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(ApiResponse::new("User registered successfully", user)))
}

/// POST /api/v1/accounts/login
///
/// # Errors
/// - 400: Empty username or password
/// - 401: Invalid credentials (unknown username or wrong password)
/// - 500: Token signing or session store failure
pub async fn login(
    form: web::Json<LoginRequest>,
    users: web::Data<UserService>,
    sessions: web::Data<SessionManager>,
    request_id: RequestId,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login").with_request_id(request_id.0);

    let user = users.login(&form).await?;
    let tokens = sessions.login(&user).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user.id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::new(
        "Login successful",
        LoginResponse {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
        },
    )))
}

/// POST /api/v1/accounts/refresh
///
/// Exchanges a refresh token for a new access/refresh pair. The presented
/// token is consumed and never works again.
///
/// # Errors
/// - 401: Unknown, expired or already used refresh token
/// - 500: Token signing or session store failure
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    sessions: web::Data<SessionManager>,
    request_id: RequestId,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh").with_request_id(request_id.0);

    let tokens = sessions.refresh(&form.refresh_token).await?;

    tracing::info!(request_id = %context.request_id, "Token refreshed successfully");

    Ok(HttpResponse::Ok().json(ApiResponse::new("Token refreshed successfully", tokens)))
}

/// POST /api/v1/accounts/logout
///
/// **Requires a valid access token.** Blacklists it for the rest of its
/// lifetime and, if the body carries one, drops the refresh token too.
///
/// # Errors
/// - 400: Body present but not valid JSON
/// - 401: Token missing, invalid or already revoked (middleware)
/// - 500: Blacklist write failed
pub async fn logout(
    req: HttpRequest,
    body: web::Bytes,
    identity: web::ReqData<AuthenticatedUser>,
    sessions: web::Data<SessionManager>,
    request_id: RequestId,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_logout")
        .with_request_id(request_id.0)
        .with_user_id(identity.user_id.to_string());

    let payload: LogoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ValidationError::MalformedPayload(e.to_string()))?
    };

    let access_token = bearer_token(req.headers())?;
    sessions
        .logout(access_token, payload.refresh_token.as_deref())
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = ?context.user_id,
        "User logged out successfully"
    );

    Ok(HttpResponse::Ok().json(ApiResponse::new("Logged out successfully", ())))
}
