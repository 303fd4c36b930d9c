/// Role middleware
///
/// Sits behind `JwtMiddleware` and admits only accounts whose current role is
/// in the allowed set. The account is read from storage on every request, so
/// a ban or a role change applies to access tokens that are already out. The
/// loaded `User` is injected into request extensions.
///
/// Wrap order matters: `.wrap(RequireRole::new(..)).wrap(JwtMiddleware::new(..))`
/// runs the bearer check first.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::{AuthCoordinator, Claims};
use crate::error::{AppError, AuthError};
use crate::users::UserRole;

pub struct RequireRole {
    coordinator: Arc<AuthCoordinator>,
    allowed: Rc<[UserRole]>,
}

impl RequireRole {
    pub fn new(coordinator: Arc<AuthCoordinator>, allowed: &[UserRole]) -> Self {
        Self {
            coordinator,
            allowed: Rc::from(allowed),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireRole
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireRoleService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequireRoleService {
            service: Rc::new(service),
            coordinator: Arc::clone(&self.coordinator),
            allowed: Rc::clone(&self.allowed),
        }))
    }
}

pub struct RequireRoleService<S> {
    service: Rc<S>,
    coordinator: Arc<AuthCoordinator>,
    allowed: Rc<[UserRole]>,
}

impl<S, B> Service<ServiceRequest> for RequireRoleService<S>
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
        let claims = req.extensions().get::<Claims>().cloned();
        let service = Rc::clone(&self.service);
        let coordinator = Arc::clone(&self.coordinator);
        let allowed = Rc::clone(&self.allowed);

        Box::pin(async move {
            let claims = claims.ok_or(AppError::Auth(AuthError::MissingToken))?;
            let user = coordinator
                .credentials()
                .find_by_id(claims.user_id()?)
                .await?
                .filter(|user| user.is_active())
                .ok_or(AppError::Auth(AuthError::TokenInvalid))?;

            if !allowed.contains(&user.role) {
                tracing::warn!(
                    user_id = %user.id,
                    role = user.role.as_str(),
                    path = %req.path(),
                    "Role not permitted"
                );
                return Err(AppError::Forbidden.into());
            }

            req.extensions_mut().insert(user);
            service.call(req).await
        })
    }
}
