/// Role gate
///
/// Admits a request only if the identity established by `JwtMiddleware`
/// carries one of the allowed roles. Needs that identity, so it has to be
/// wrapped inside the JWT middleware.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::collections::HashSet;
use std::rc::Rc;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AuthError};

pub struct RequireRoles {
    allowed: Rc<HashSet<String>>,
}

impl RequireRoles {
    pub fn new<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        Self {
            allowed: Rc::new(roles.into_iter().map(Into::into).collect()),
        }
    }
}

/// Set membership check against the allow-list.
///
/// No identity means the gate in front did not run; that is an
/// authentication failure, not a permission one.
fn check_role(
    identity: Option<&AuthenticatedUser>,
    allowed: &HashSet<String>,
) -> Result<(), AuthError> {
    match identity {
        None => Err(AuthError::MissingToken),
        Some(user) if allowed.contains(&user.role) => Ok(()),
        Some(_) => Err(AuthError::Forbidden),
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireRoles
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireRolesService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequireRolesService {
            service: Rc::new(service),
            allowed: self.allowed.clone(),
        }))
    }
}

pub struct RequireRolesService<S> {
    service: Rc<S>,
    allowed: Rc<HashSet<String>>,
}

impl<S, B> Service<ServiceRequest> for RequireRolesService<S>
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
        let verdict = check_role(req.extensions().get::<AuthenticatedUser>(), &self.allowed);

        match verdict {
            Ok(()) => {
                let service = self.service.clone();
                Box::pin(async move { Ok(service.call(req).await?.map_into_left_body()) })
            }
            Err(reason) => {
                tracing::warn!(path = %req.path(), error = %reason, "Role check failed");
                let res = req.error_response(AppError::from(reason));
                Box::pin(async move { Ok(res.map_into_right_body()) })
            }
        }
    }
}
