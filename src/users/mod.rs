//! User accounts
//!
//! The credential store the token core looks users up through, its
//! Postgres and in-memory implementations, and the registration/login service.

mod memory;
mod postgres;
mod service;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

pub use memory::InMemoryUserRepository;
pub use postgres::PgUserRepository;
pub use service::{LoginRequest, RegisterRequest, UserService};

pub const DEFAULT_ROLE: &str = "user";

/// Canonical user record, without credentials
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[cfg(test)]
    pub(crate) fn test_fixture(username: &str, role: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: username.to_string(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            role: role.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A user together with the stored password hash, only used for login
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Validated input for a new account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

/// Credential store adapter.
///
/// Lookups return `Ok(None)` for a missing user; `Err` is reserved for the
/// store itself failing.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError>;

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    async fn get_user_by_username(&self, username: &str)
        -> Result<Option<UserCredentials>, AppError>;

    async fn list_users(&self) -> Result<Vec<User>, AppError>;
}
