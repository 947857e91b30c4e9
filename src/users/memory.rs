use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::{NewUser, User, UserCredentials, UserRepository};
use crate::error::{AppError, DatabaseError};

/// Process-local user store for tests and local runs without Postgres.
///
/// Username and email stay unique like the `users` table constraints.
#[derive(Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<DashMap<Uuid, UserCredentials>>,
    // Serializes inserts so the uniqueness check and the insert happen together
    write_lock: Arc<Mutex<()>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AppError::Internal("user store lock poisoned".to_string()))?;

        for entry in self.users.iter() {
            let existing = &entry.value().user;
            if existing.username == new_user.username {
                return Err(DatabaseError::UniqueConstraintViolation(
                    "users_username_key".to_string(),
                )
                .into());
            }
            if existing.email == new_user.email {
                return Err(
                    DatabaseError::UniqueConstraintViolation("users_email_key".to_string()).into(),
                );
            }
        }

        let now = Utc::now();
        let user = User {
            id: new_user.id,
            name: new_user.name,
            username: new_user.username,
            email: new_user.email,
            role: new_user.role,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(
            user.id,
            UserCredentials {
                user: user.clone(),
                password_hash: new_user.password_hash,
            },
        );

        Ok(user)
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.get(&id).map(|entry| entry.user.clone()))
    }

    async fn get_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, AppError> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.user.username == username)
            .map(|entry| entry.value().clone()))
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        let mut users: Vec<User> = self.users.iter().map(|entry| entry.user.clone()).collect();
        users.sort_by_key(|user| user.created_at);
        Ok(users)
    }
}
