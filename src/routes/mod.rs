mod auth;
mod health_check;
mod internal;
mod users;

use serde::Serialize;

pub use auth::{login, logout, refresh, register};
pub use health_check::health_check;
pub use internal::{get_account, list_accounts, validate_token};
pub use users::{get_user_by_id, list_users, profile};

/// Success envelope shared by the account endpoints
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}
