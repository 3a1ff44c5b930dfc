pub mod auth;
pub mod health;
pub mod notes;

use crate::config::{AppConfig, ConfigError};
use crate::db::Repositories;
use crate::errors::json_error_handler;
use crate::middleware::auth::AuthMiddleware;
use crate::middleware::rate_limit::RateLimitMiddleware;
use crate::utils::auth::TokenService;
use actix_web::web;
use health::HealthInfo;

/// Everything the route table needs, built once and cloned per worker.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub tokens: web::Data<TokenService>,
    pub health: web::Data<HealthInfo>,
    pub auth_limiter: RateLimitMiddleware,
}

impl AppState {
    pub fn new(config: &AppConfig, repos: Repositories) -> Result<Self, ConfigError> {
        let auth_limiter = RateLimitMiddleware::per_minute(config.auth_rate_limit)
            .ok_or(ConfigError::InvalidRateLimit)?;

        Ok(AppState {
            repos,
            tokens: web::Data::new(TokenService::from_config(config)),
            health: web::Data::new(HealthInfo {
                insecure_secret: config.uses_insecure_secret(),
            }),
            auth_limiter,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.app_data(web::Data::from(state.repos.users.clone()))
        .app_data(web::Data::from(state.repos.notes.clone()))
        .app_data(state.tokens.clone())
        .app_data(state.health.clone())
        .app_data(web::JsonConfig::default().error_handler(json_error_handler))
        // Public
        .route("/health", web::get().to(health::health))
        // Credential endpoints share one rate limit budget
        .service(
            web::resource("/register")
                .wrap(state.auth_limiter.clone())
                .route(web::post().to(auth::register)),
        )
        .service(
            web::resource("/login")
                .wrap(state.auth_limiter.clone())
                .route(web::post().to(auth::login)),
        )
        // Protected
        .service(
            web::resource("/notes")
                .wrap(AuthMiddleware::new(state.tokens.clone()))
                .route(web::get().to(notes::list_notes))
                .route(web::post().to(notes::create_note)),
        );
}
