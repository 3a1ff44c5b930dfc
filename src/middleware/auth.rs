use crate::errors::ApiError;
use crate::models::user::AuthenticatedUser;
use crate::utils::auth::TokenService;
use actix_web::{
    body::{BoxBody, EitherBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    web, Error, HttpMessage, ResponseError,
};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use tracing::debug;

/// Rejects requests without a valid bearer token and exposes the
/// caller as `web::ReqData<AuthenticatedUser>`.
pub struct AuthMiddleware {
    tokens: web::Data<TokenService>,
}

impl AuthMiddleware {
    pub fn new(tokens: web::Data<TokenService>) -> Self {
        AuthMiddleware { tokens }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B, BoxBody>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            tokens: self.tokens.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    tokens: web::Data<TokenService>,
}

/// Token from `Authorization: Bearer <token>`; the scheme is case-insensitive.
fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

fn authenticate(tokens: &TokenService, req: &ServiceRequest) -> Result<AuthenticatedUser, ApiError> {
    let token = bearer_token(req)
        .ok_or_else(|| ApiError::unauthorized("Authorization token required"))?;

    let claims = tokens.verify(token).map_err(|e| {
        debug!(error = %e, "Rejected bearer token");
        ApiError::unauthorized("Invalid or expired token")
    })?;

    AuthenticatedUser::try_from(claims).map_err(|_| ApiError::unauthorized("Invalid or expired token"))
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B, BoxBody>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let user = match authenticate(&self.tokens, &req) {
            Ok(user) => user,
            Err(err) => {
                let (req, _pl) = req.into_parts();
                let res = err.error_response();
                return Box::pin(async move {
                    Ok(ServiceResponse::new(req, res).map_into_right_body())
                });
            }
        };

        req.extensions_mut().insert(user);

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::User;
    use actix_web::{http::StatusCode, test, App, HttpResponse};

    async fn whoami(user: web::ReqData<AuthenticatedUser>) -> HttpResponse {
        HttpResponse::Ok().body(user.username.clone())
    }

    fn tokens() -> web::Data<TokenService> {
        web::Data::new(TokenService::new("middleware-secret", 15))
    }

    #[actix_web::test]
    async fn test_valid_token_passes_identity() {
        let tokens = tokens();
        let user = User::new("carol".to_string(), "hash".to_string());
        let token = tokens.issue(&user).unwrap();

        let app = test::init_service(
            App::new().service(
                web::resource("/me")
                    .wrap(AuthMiddleware::new(tokens.clone()))
                    .route(web::get().to(whoami)),
            ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/me")
            .insert_header((header::AUTHORIZATION, format!("Bearer {}", token)))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(test::read_body(res).await, "carol");
    }

    #[actix_web::test]
    async fn test_scheme_is_case_insensitive() {
        let tokens = tokens();
        let user = User::new("dave".to_string(), "hash".to_string());
        let token = tokens.issue(&user).unwrap();

        let app = test::init_service(
            App::new().service(
                web::resource("/me")
                    .wrap(AuthMiddleware::new(tokens.clone()))
                    .route(web::get().to(whoami)),
            ),
        )
        .await;

        for scheme in ["bearer", "BEARER", "Bearer"] {
            let req = test::TestRequest::get()
                .uri("/me")
                .insert_header((header::AUTHORIZATION, format!("{}  {}", scheme, token)))
                .to_request();
            let res = test::call_service(&app, req).await;
            assert_eq!(res.status(), StatusCode::OK, "{}", scheme);
        }
    }

    #[actix_web::test]
    async fn test_rejects_missing_and_malformed_headers() {
        let tokens = tokens();
        let app = test::init_service(
            App::new().service(
                web::resource("/me")
                    .wrap(AuthMiddleware::new(tokens.clone()))
                    .route(web::get().to(whoami)),
            ),
        )
        .await;

        let cases = [
            None,
            Some("Basic dXNlcjpwYXNz"),
            Some("Bearer "),
            Some("Bearer"),
            Some("Bearertoken"),
            Some("Bearer garbage"),
        ];
        for header_value in cases {
            let mut req = test::TestRequest::get().uri("/me");
            if let Some(value) = header_value {
                req = req.insert_header((header::AUTHORIZATION, value));
            }
            let res = test::call_service(&app, req.to_request()).await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{:?}", header_value);
            assert_eq!(
                res.headers().get(header::WWW_AUTHENTICATE).unwrap(),
                "Bearer"
            );
        }
    }
}
