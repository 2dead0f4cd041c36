use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use log::{info, warn};
use std::rc::Rc;
use std::time::Instant;

use crate::auth::AuthenticatedUser;

/// Request logging middleware
///
/// Logs method, path, status and latency. Query strings and headers are left
/// out so credentials and tokens never reach the logs.
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = LoggerMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();

        let service = self.service.clone();

        Box::pin(async move {
            let result = service.call(req).await;
            let elapsed = start_time.elapsed();

            // Middleware rejections (401/403) arrive as `Err`, not as a response.
            let (status, user_id) = match &result {
                Ok(res) => {
                    let user_id = res
                        .request()
                        .extensions()
                        .get::<AuthenticatedUser>()
                        .map(|identity| identity.user_id.clone());
                    (res.status(), user_id)
                }
                Err(e) => (e.as_response_error().status_code(), None),
            };
            let user_id = user_id.unwrap_or_else(|| "-".to_string());

            if status.is_client_error() || status.is_server_error() {
                warn!(
                    "Request failed: {} {} - Status: {} user={} ({}ms)",
                    method,
                    path,
                    status.as_u16(),
                    user_id,
                    elapsed.as_millis()
                );
            } else {
                info!(
                    "Request completed: {} {} - Status: {} user={} ({}ms)",
                    method,
                    path,
                    status.as_u16(),
                    user_id,
                    elapsed.as_millis()
                );
            }

            result
        })
    }
}
