mod config;
mod db;
mod errors;
mod handlers;
mod middleware;
mod models;
mod utils;

use actix_cors::Cors;
use actix_web::{middleware::NormalizePath, web, App, HttpServer};
use clap::Parser;
use config::{AppConfig, Cli, Command};
use dotenv::dotenv;
use handlers::AppState;
use std::env;
use std::time::Duration;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::auth::register,
        handlers::auth::login,
        handlers::notes::list_notes,
        handlers::notes::create_note,
    ),
    components(
        schemas(
            handlers::health::HealthResponse,
            handlers::health::HealthChecks,
            handlers::auth::RegisterRequest,
            handlers::auth::LoginRequest,
            handlers::auth::UserResponse,
            handlers::auth::TokenResponse,
            handlers::notes::CreateNoteRequest,
            models::note::Note,
            errors::ErrorResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Authentication", description = "Registration and token issue"),
        (name = "Notes", description = "Per-user notes, bearer token required")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token from POST /login"))
                        .build(),
                ),
            );
        }
    }
}

const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

fn init_tracing() {
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .json()
        .init();
}

async fn serve(config: AppConfig, state: AppState) -> std::io::Result<()> {
    let bind_address = config.bind_address();

    if state.health.insecure_secret {
        tracing::warn!("SECRET_KEY is a placeholder value - NOT SECURE FOR PRODUCTION");
    }

    info!(bind_address = %bind_address, "Starting notes API server");
    info!("Available endpoints:");
    info!("   GET  /health    - Health check (public)");
    info!("   POST /register  - Register new user (public)");
    info!("   POST /login     - Obtain bearer token (public)");
    info!("   GET  /notes     - List own notes (protected)");
    info!("   POST /notes     - Create note (protected)");
    info!(
        swagger_url = format!("http://{}/swagger-ui/", bind_address),
        "Swagger UI available"
    );

    let limiter = state.auth_limiter.clone();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(RATE_LIMIT_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            limiter.prune();
        }
    });

    let openapi = ApiDoc::openapi();

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        let state = state.clone();

        App::new()
            .wrap(NormalizePath::trim())
            .wrap(TracingLogger::default())
            .wrap(cors)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
            .configure(|cfg| handlers::configure(cfg, &state))
            .default_service(web::to(errors::not_found))
    })
    .bind(&bind_address)?
    .run()
    .await
}

async fn seed(state: &AppState, username: &str, password: String) -> Result<(), errors::ApiError> {
    if state.repos.users.get_by_username(username).await?.is_some() {
        info!(username = %username, "Seed user already exists");
        return Ok(());
    }
    let user = handlers::auth::create_account(state.repos.users.as_ref(), username, password).await?;
    info!(user_id = %user.id, username = %user.username, "Seed user created");
    Ok(())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = cli.config;

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        std::process::exit(2);
    }

    let repos = match db::connect(&config.database).await {
        Ok(repos) => repos,
        Err(e) => {
            error!(error = %e, "Failed to initialize database");
            std::process::exit(1);
        }
    };

    let state = match AppState::new(&config, repos) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(2);
        }
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, state).await,
        Command::Seed { username, password } => {
            if let Err(e) = seed(&state, username.trim(), password).await {
                error!(error = %e, "Seeding failed");
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
