use crate::db::user_repository::UserRepository;
use crate::errors::ApiError;
use crate::models::user::User;
use crate::utils::auth::{hash_password, verify_login, TokenService};
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub const MAX_USERNAME_LEN: usize = 64;

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Seconds until the token expires
    pub expires_in: i64,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            created_at: user.created_at,
        }
    }
}

/// Trimmed username, or a validation error.
fn validate_username(username: &str) -> Result<&str, ApiError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(ApiError::validation(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }
    Ok(username)
}

/// Validate, hash off the worker thread and create the account.
/// Every path that creates users goes through here.
pub async fn create_account(
    users: &dyn UserRepository,
    username: &str,
    password: String,
) -> Result<User, ApiError> {
    let username = validate_username(username)?;
    if password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let password_hash = web::block(move || hash_password(&password))
        .await?
        .map_err(|e| ApiError::internal("Failed to hash password", e))?;

    let user = users
        .create(User::new(username.to_string(), password_hash))
        .await?;
    Ok(user)
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = UserResponse),
        (status = 400, description = "Missing or invalid fields", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username already registered", body = crate::errors::ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = crate::errors::ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    users: web::Data<dyn UserRepository>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let RegisterRequest { username, password } = payload.into_inner();
    info!(username = %username, "Registration attempt");

    let user = create_account(users.get_ref(), &username, password)
        .await
        .inspect_err(|e| match e {
            ApiError::Validation(_) => {
                warn!(username = %username, error = %e, "Registration failed: invalid input");
            }
            ApiError::Conflict(_) => {
                warn!(username = %username, "Registration failed: username already exists");
            }
            _ => {}
        })?;

    info!(user_id = %user.id, username = %user.username, "User registered successfully");

    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Missing fields", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = crate::errors::ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    users: web::Data<dyn UserRepository>,
    tokens: web::Data<TokenService>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let LoginRequest { username, password } = payload.into_inner();
    let username = username.trim().to_string();
    info!(username = %username, "Login attempt");

    let user = users.get_by_username(&username).await?;

    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let verified = web::block(move || verify_login(&password, stored_hash.as_deref())).await?;

    // Unknown user and wrong password must look identical to the client.
    let user = match user {
        Some(user) if verified => user,
        _ => {
            warn!(username = %username, "Login failed: invalid credentials");
            return Err(ApiError::unauthorized("Invalid credentials"));
        }
    };

    let access_token = tokens
        .issue(&user)
        .map_err(|e| ApiError::internal("Failed to generate JWT", e))?;

    info!(user_id = %user.id, username = %user.username, "User logged in successfully");

    Ok(HttpResponse::Ok().json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: tokens.ttl_seconds(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Repositories;

    #[test]
    fn test_validate_username() {
        assert_eq!(validate_username("  alice ").unwrap(), "alice");
        assert!(matches!(validate_username("   "), Err(ApiError::Validation(_))));

        let long = "x".repeat(MAX_USERNAME_LEN + 1);
        assert!(matches!(validate_username(&long), Err(ApiError::Validation(_))));
        assert!(validate_username(&long[1..]).is_ok());
    }

    #[actix_web::test]
    async fn test_create_account_enforces_user_rules() {
        let repos = Repositories::in_memory();
        let users = repos.users.as_ref();
        let long = "x".repeat(MAX_USERNAME_LEN + 1);

        for (username, password) in [("", "pw"), ("   ", "pw"), (long.as_str(), "pw"), ("bob", "")] {
            let result = create_account(users, username, password.to_string()).await;
            assert!(
                matches!(result, Err(ApiError::Validation(_))),
                "{:?} / {:?}",
                username,
                password
            );
        }
        assert!(users.get_by_username("").await.unwrap().is_none());
        assert!(users.get_by_username("bob").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn test_create_account_stores_trimmed_username() {
        let repos = Repositories::in_memory();
        let user = create_account(repos.users.as_ref(), "  seeded ", "pw".to_string())
            .await
            .unwrap();

        assert_eq!(user.username, "seeded");
        assert_ne!(user.password_hash, "pw");
        assert!(repos.users.get_by_username("seeded").await.unwrap().is_some());
    }
}
