use crate::errors::ApiError;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, ResponseError,
};
use futures_util::future::LocalBoxFuture;
use governor::{clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter};
use std::future::{ready, Ready};
use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, warn};

type KeyedLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>;

/// Per-client-IP request quota. Clones share one limiter, so wrapping
/// several resources with the same instance gives them a common budget.
#[derive(Clone)]
pub struct RateLimitMiddleware {
    limiter: Arc<KeyedLimiter>,
}

impl RateLimitMiddleware {
    /// Returns `None` when `requests_per_minute` is zero.
    pub fn per_minute(requests_per_minute: u32) -> Option<Self> {
        let quota = Quota::per_minute(NonZeroU32::new(requests_per_minute)?);
        Some(Self::with_quota(quota))
    }

    fn with_quota(quota: Quota) -> Self {
        RateLimitMiddleware {
            limiter: Arc::new(RateLimiter::dashmap(quota)),
        }
    }

    /// Forget clients whose budget has fully refilled.
    pub fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        debug!(tracked_clients = self.limiter.len(), "Pruned rate limiter state");
    }

    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service,
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: S,
    limiter: Arc<KeyedLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let ip = req
            .peer_addr()
            .map(|addr| addr.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

        if self.limiter.check_key(&ip).is_err() {
            warn!(ip = %ip, path = %req.path(), "Rate limit exceeded");
            let (req, _pl) = req.into_parts();
            let res = ApiError::TooManyRequests.error_response();
            return Box::pin(
                async move { Ok(ServiceResponse::new(req, res).map_into_boxed_body()) },
            );
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, web, App, HttpResponse};
    use std::time::Duration;

    #[actix_web::test]
    async fn test_zero_quota_rejected() {
        assert!(RateLimitMiddleware::per_minute(0).is_none());
    }

    #[actix_web::test]
    async fn test_prune_drops_idle_clients() {
        let quota = Quota::with_period(Duration::from_millis(5)).unwrap();
        let limiter = RateLimitMiddleware::with_quota(quota);

        for last_octet in 1..=3u8 {
            let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet));
            assert!(limiter.limiter.check_key(&ip).is_ok());
        }
        assert_eq!(limiter.tracked_clients(), 3);

        actix_web::rt::time::sleep(Duration::from_millis(50)).await;
        limiter.prune();
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[actix_web::test]
    async fn test_prune_keeps_active_clients() {
        let limiter = RateLimitMiddleware::per_minute(5).unwrap();
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9));
        assert!(limiter.limiter.check_key(&ip).is_ok());

        limiter.prune();
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[actix_web::test]
    async fn test_shared_budget_across_resources() {
        let limiter = RateLimitMiddleware::per_minute(2).unwrap();
        let app = test::init_service(
            App::new()
                .service(
                    web::resource("/a")
                        .wrap(limiter.clone())
                        .route(web::post().to(HttpResponse::Ok)),
                )
                .service(
                    web::resource("/b")
                        .wrap(limiter)
                        .route(web::post().to(HttpResponse::Ok)),
                ),
        )
        .await;

        for uri in ["/a", "/b"] {
            let res = test::call_service(&app, test::TestRequest::post().uri(uri).to_request()).await;
            assert_eq!(res.status(), StatusCode::OK);
        }

        let res = test::call_service(&app, test::TestRequest::post().uri("/a").to_request()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
