#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use accounts::auth::hash_password;
use accounts::configuration::JwtSettings;
use accounts::error::StoreError;
use accounts::events::{EventPublisher, LogEventSink};
use accounts::startup::{run, AppState};
use accounts::store::{KeyValueStore, MemoryStore};
use accounts::telemetry::try_init_test_telemetry;
use accounts::users::{InMemoryUserRepository, NewUser, UserRepository};
use serde_json::{json, Value};
use uuid::Uuid;

pub const PASSWORD: &str = "SecurePass123";

/// In-memory store that can be taken offline to simulate an outage.
#[derive(Clone, Default)]
pub struct SwitchableStore {
    inner: MemoryStore,
    offline: Arc<AtomicBool>,
}

impl SwitchableStore {
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Connection("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for SwitchableStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        self.inner.take(key).await
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
        self.check()?;
        self.inner.ttl(key).await
    }
}

pub struct TestApp {
    pub address: String,
    pub users: InMemoryUserRepository,
    pub store: SwitchableStore,
    pub jwt: JwtSettings,
    pub client: reqwest::Client,
}

pub fn test_jwt_settings() -> JwtSettings {
    JwtSettings {
        secret: "integration-test-secret-at-least-32-bytes".to_string(),
        issuer: "accounts-test".to_string(),
        audience: "cashier-app".to_string(),
        access_token_expiry: 3600,
        refresh_token_expiry: 604800,
    }
}

/// Start the server on a random port, backed by in-memory stores.
pub async fn spawn_app() -> TestApp {
    spawn_app_with_store(SwitchableStore::default()).await
}

pub async fn spawn_app_with_store(store: SwitchableStore) -> TestApp {
    try_init_test_telemetry();

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let users = InMemoryUserRepository::new();
    let jwt = test_jwt_settings();
    let (events, _dispatcher) = EventPublisher::start(Arc::new(LogEventSink), 64);

    let server = run(
        listener,
        AppState {
            users: Arc::new(users.clone()),
            store: Arc::new(store.clone()),
            events,
            jwt: jwt.clone(),
        },
    )
    .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        users,
        store,
        jwt,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn register(&self, username: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/v1/accounts/register"))
            .json(&json!({
                "name": "Test User",
                "username": username,
                "email": format!("{}@example.com", username),
                "password": PASSWORD,
            }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/v1/accounts/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Log in and return the `data` object of the response
    pub async fn login_ok(&self, username: &str) -> Value {
        let response = self.login(username, PASSWORD).await;
        assert_eq!(200, response.status().as_u16());
        let body: Value = response.json().await.expect("Failed to parse response");
        body["data"].clone()
    }

    /// Insert an account with `role` directly into the credential store.
    pub async fn seed_user(&self, username: &str, role: &str) {
        self.users
            .create_user(NewUser {
                id: Uuid::new_v4(),
                name: username.to_string(),
                username: username.to_string(),
                email: format!("{}@example.com", username),
                password_hash: hash_password(PASSWORD).expect("Failed to hash password"),
                role: role.to_string(),
            })
            .await
            .expect("Failed to seed user");
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}
