use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::SessionManager;
use crate::configuration::JwtSettings;
use crate::error::json_error_handler;
use crate::events::EventPublisher;
use crate::logger::LoggerMiddleware;
use crate::middleware::{JwtMiddleware, RequireRoles};
use crate::routes::{
    get_account, get_user_by_id, health_check, list_accounts, list_users, login, logout, profile,
    refresh, register, validate_token,
};
use crate::store::KeyValueStore;
use crate::users::{UserRepository, UserService};

const ADMIN_ROLE: &str = "admin";

/// Everything the HTTP layer needs, already connected.
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub store: Arc<dyn KeyValueStore>,
    pub events: EventPublisher,
    pub jwt: JwtSettings,
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let sessions = SessionManager::new(&state.jwt, state.store, state.users.clone());
    let validator = sessions.validator().clone();

    let sessions = web::Data::new(sessions);
    let user_service = web::Data::new(UserService::new(state.users, state.events));

    let server = HttpServer::new(move || {
        App::new()
            .wrap(LoggerMiddleware)
            // Shared state
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(sessions.clone())
            .app_data(user_service.clone())
            .route("/health_check", web::get().to(health_check))
            // Sibling services
            .route("/internal/auth/validate", web::post().to(validate_token))
            .route("/internal/accounts", web::get().to(list_accounts))
            .route("/internal/accounts/{id}", web::get().to(get_account))
            .service(
                web::scope("/api/v1/accounts")
                    // Public
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    // Authenticated. The JWT gate is wrapped last so it runs
                    // before the role gate.
                    .service(
                        web::resource("/logout")
                            .route(web::post().to(logout))
                            .wrap(JwtMiddleware::new(validator.clone())),
                    )
                    .service(
                        web::resource("/profile")
                            .route(web::get().to(profile))
                            .wrap(JwtMiddleware::new(validator.clone())),
                    )
                    .service(
                        web::resource("/list")
                            .route(web::get().to(list_users))
                            .wrap(RequireRoles::new([ADMIN_ROLE]))
                            .wrap(JwtMiddleware::new(validator.clone())),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(get_user_by_id))
                            .wrap(RequireRoles::new([ADMIN_ROLE]))
                            .wrap(JwtMiddleware::new(validator.clone())),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
