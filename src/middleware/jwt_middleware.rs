/// Bearer-token middleware
///
/// Verifies `Authorization: Bearer <access token>` with the process-wide
/// `TokenSigner` and injects the claims into request extensions for the
/// handlers behind it.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::TokenSigner;
use crate::error::{AppError, AuthError};

pub struct JwtMiddleware {
    signer: Arc<TokenSigner>,
}

impl JwtMiddleware {
    pub fn new(signer: Arc<TokenSigner>) -> Self {
        Self { signer }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            signer: Arc::clone(&self.signer),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    signer: Arc<TokenSigner>,
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
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
        let token = match bearer_token(&req) {
            Some(token) => token,
            None => {
                tracing::warn!(path = %req.path(), "Missing or invalid Authorization header");
                return Box::pin(async { Err(AppError::Auth(AuthError::MissingToken).into()) });
            }
        };

        match self.signer.verify(&token) {
            Ok(claims) => {
                tracing::debug!(user_id = %claims.sub, "Access token accepted");
                req.extensions_mut().insert(claims);

                let service = Rc::clone(&self.service);
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => Box::pin(async move { Err(e.into()) }),
        }
    }
}
