use crate::db::user_repository::UserRepository;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

/// Facts about the running process the health check needs.
pub struct HealthInfo {
    pub insecure_secret: bool,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthChecks {
    pub database: bool,
    pub secret_is_placeholder: bool,
}

/// Public health check endpoint with dependency checks
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is degraded", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health(
    users: web::Data<dyn UserRepository>,
    info: web::Data<HealthInfo>,
) -> HttpResponse {
    let database = match users.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Health check: database unreachable");
            false
        }
    };

    if info.insecure_secret {
        warn!("Health check: SECRET_KEY is a placeholder - NOT SECURE FOR PRODUCTION");
    }

    let healthy = database && !info.insecure_secret;
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database,
            secret_is_placeholder: info.insecure_secret,
        },
    };

    if healthy {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
