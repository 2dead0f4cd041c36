/// Role Guard Middleware
///
/// Restricts a scope to users whose current role is on a static allow-list.
/// Must sit inside `JwtMiddleware`, which supplies the `AuthenticatedUser`.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::{authorize_role, AuthenticatedUser};
use crate::error::{AppError, AuthError};
use crate::users::UserStore;

pub struct RoleGuard {
    store: Arc<dyn UserStore>,
    allowed_roles: Rc<Vec<String>>,
}

impl RoleGuard {
    pub fn new(store: Arc<dyn UserStore>, allowed_roles: &[&str]) -> Self {
        Self {
            store,
            allowed_roles: Rc::new(allowed_roles.iter().map(|role| role.to_string()).collect()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RoleGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RoleGuardService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RoleGuardService {
            service: Rc::new(service),
            store: self.store.clone(),
            allowed_roles: self.allowed_roles.clone(),
        }))
    }
}

pub struct RoleGuardService<S> {
    service: Rc<S>,
    store: Arc<dyn UserStore>,
    allowed_roles: Rc<Vec<String>>,
}

impl<S, B> Service<ServiceRequest> for RoleGuardService<S>
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
        let identity = req.extensions().get::<AuthenticatedUser>().cloned();
        let service = self.service.clone();
        let store = self.store.clone();
        let allowed_roles = self.allowed_roles.clone();

        Box::pin(async move {
            let identity = identity.ok_or_else(|| {
                tracing::error!("Role guard reached without an authenticated user");
                AppError::from(AuthError::Unauthenticated("missing authorization token"))
            })?;

            authorize_role(store.as_ref(), &identity, &allowed_roles).await?;

            service.call(req).await
        })
    }
}
