use std::sync::Arc;

use serde::Deserialize;
use uuid::Uuid;

use super::{NewUser, User, UserRepository, DEFAULT_ROLE};
use crate::auth::{hash_password, verify_against_dummy, verify_password};
use crate::error::{AppError, AuthError, DatabaseError, ValidationError};
use crate::events::{EventPublisher, UserRegisteredEvent};
use crate::validators::{is_valid_email, is_valid_name, is_valid_username};

/// User registration request
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// User login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Account operations on top of the credential store
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    events: EventPublisher,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, events: EventPublisher) -> Self {
        Self { users, events }
    }

    /// Create an account with the default role.
    ///
    /// # Errors
    /// - `ValidationError` for malformed fields or a weak password
    /// - `DatabaseError::UniqueConstraintViolation` for a taken username or email
    pub async fn register(&self, request: RegisterRequest) -> Result<User, AppError> {
        let name = is_valid_name(&request.name)?;
        let username = is_valid_username(&request.username)?;
        let email = is_valid_email(&request.email)?;
        let password_hash = hash_password(&request.password)?;

        let user = self
            .users
            .create_user(NewUser {
                id: Uuid::new_v4(),
                name,
                username,
                email,
                password_hash,
                role: DEFAULT_ROLE.to_string(),
            })
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");

        self.events.publish_user_registered(UserRegisteredEvent {
            user_id: user.id.to_string(),
            email: user.email.clone(),
            username: user.username.clone(),
            created_at: user.created_at,
        });

        Ok(user)
    }

    /// Check credentials and return the account.
    ///
    /// An unknown username and a wrong password are indistinguishable to the
    /// caller.
    pub async fn login(&self, request: &LoginRequest) -> Result<User, AppError> {
        let username = request.username.trim();
        if username.is_empty() {
            return Err(ValidationError::EmptyField("username".to_string()).into());
        }
        if request.password.is_empty() {
            return Err(ValidationError::EmptyField("password".to_string()).into());
        }

        let credentials = match self.users.get_user_by_username(username).await? {
            Some(credentials) => credentials,
            None => {
                tracing::debug!(username = %username, "Login for unknown username");
                verify_against_dummy(&request.password);
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        verify_password(&request.password, &credentials.password_hash)?;

        Ok(credentials.user)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, AppError> {
        self.users
            .get_user_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("user".to_string()).into())
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.users.list_users().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LogEventSink;
    use crate::users::memory::InMemoryUserRepository;

    fn service() -> UserService {
        let (events, _handle) = EventPublisher::start(Arc::new(LogEventSink), 16);
        UserService::new(Arc::new(InMemoryUserRepository::new()), events)
    }

    fn alice() -> RegisterRequest {
        RegisterRequest {
            name: "Alice Liddell".to_string(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "Wonderland123".to_string(),
        }
    }

    fn credentials(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_assigns_default_role() {
        let service = service();
        let user = service.register(alice()).await.unwrap();

        assert_eq!(user.username, "alice");
        assert_eq!(user.role, DEFAULT_ROLE);
        assert_eq!(service.get_user(user.id).await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let mut request = alice();
        request.password = "password".to_string();

        assert!(matches!(
            service().register(request).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_username() {
        let service = service();
        service.register(alice()).await.unwrap();

        let mut again = alice();
        again.email = "alice2@example.com".to_string();
        assert!(matches!(
            service.register(again).await,
            Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_)))
        ));
    }

    #[tokio::test]
    async fn test_login() {
        let service = service();
        let registered = service.register(alice()).await.unwrap();

        let user = service
            .login(&credentials("alice", "Wonderland123"))
            .await
            .unwrap();
        assert_eq!(user.id, registered.id);
    }

    #[tokio::test]
    async fn test_login_failures_look_the_same() {
        let service = service();
        service.register(alice()).await.unwrap();

        for attempt in [
            credentials("alice", "WrongPassword1"),
            credentials("nobody", "Wonderland123"),
        ] {
            assert!(matches!(
                service.login(&attempt).await,
                Err(AppError::Auth(AuthError::InvalidCredentials))
            ));
        }
    }

    #[tokio::test]
    async fn test_get_unknown_user_is_not_found() {
        assert!(matches!(
            service().get_user(Uuid::new_v4()).await,
            Err(AppError::Database(DatabaseError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_unknown_username_costs_a_hash_verification() {
        let service = service();
        service.register(alice()).await.unwrap();
        // Warm up the lazily computed dummy hash
        let _ = service.login(&credentials("nobody", "Wonderland123")).await;

        let started = std::time::Instant::now();
        let _ = service.login(&credentials("alice", "WrongPassword1")).await;
        let mismatch = started.elapsed();

        let started = std::time::Instant::now();
        let _ = service.login(&credentials("nobody", "WrongPassword1")).await;
        let miss = started.elapsed();

        assert!(
            miss * 4 >= mismatch,
            "unknown username answered in {:?}, wrong password in {:?}",
            miss,
            mismatch
        );
    }
}
