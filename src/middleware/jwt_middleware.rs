/// JWT Authentication Middleware
///
/// Validates the bearer token from the Authorization header and injects the
/// resulting `AuthenticatedUser` into request extensions for route handlers
/// (`web::ReqData<AuthenticatedUser>`). Rejected requests never reach the
/// handler.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, AUTHORIZATION},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{TokenValidation, TokenValidator};
use crate::error::{AppError, AuthError};

const BEARER_PREFIX: &str = "Bearer ";

/// Extract the token after a literal `Bearer ` prefix.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidTokenFormat)?;

    match value.strip_prefix(BEARER_PREFIX) {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AuthError::InvalidTokenFormat),
    }
}

/// JWT middleware for protecting routes
///
/// Must be the outermost wrap of a protected resource so the identity is in
/// place before any role check runs.
pub struct JwtMiddleware {
    validator: TokenValidator,
}

impl JwtMiddleware {
    pub fn new(validator: TokenValidator) -> Self {
        Self { validator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            validator: Rc::new(self.validator.clone()),
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    validator: Rc<TokenValidator>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let validator = self.validator.clone();

        Box::pin(async move {
            let token = match bearer_token(req.headers()) {
                Ok(token) => token.to_string(),
                Err(reason) => {
                    tracing::warn!(path = %req.path(), error = %reason, "Missing or invalid Authorization header");
                    return Ok(reject(req, reason.into()));
                }
            };

            match validator.validate(&token).await {
                Ok(TokenValidation::Valid(identity)) => {
                    tracing::debug!(
                        user_id = %identity.user_id,
                        role = %identity.role,
                        "JWT validated successfully"
                    );
                    req.extensions_mut().insert(identity);

                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Ok(TokenValidation::Rejected(rejection)) => {
                    tracing::warn!(
                        path = %req.path(),
                        reason = %rejection.message(),
                        "JWT validation failed"
                    );
                    Ok(reject(req, rejection.reason.into()))
                }
                Err(e) => {
                    // Fail closed, but keep an outage distinguishable from a bad token
                    tracing::error!(path = %req.path(), error = %e, "Token blacklist unavailable");
                    Ok(reject(req, e.into()))
                }
            }
        })
    }
}

fn reject<B>(req: ServiceRequest, error: AppError) -> ServiceResponse<EitherBody<B>> {
    req.error_response(error).map_into_right_body()
}
