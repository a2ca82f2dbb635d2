use super::jwt::{JwtError, JwtService};
use super::models::Identity;
use actix_web::http::header::{Header, AUTHORIZATION};
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, HttpResponse,
};
use actix_web::{FromRequest, HttpRequest};
use actix_web_httpauth::headers::authorization::{Authorization, Bearer};
use futures::future::{err, ok, Ready};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Attaches the caller's `Identity` to the request when a bearer token is present.
///
/// Requests without an `Authorization` header pass through anonymously; a header that
/// is present but malformed, expired, or forged is answered with 401 on every route.
#[derive(Clone)]
pub struct IdentityMiddleware {
    jwt_service: Arc<JwtService>,
}

impl IdentityMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self {
            jwt_service: Arc::new(jwt_service),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for IdentityMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<actix_web::body::EitherBody<B>>;
    type Error = Error;
    type Transform = IdentityMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(IdentityMiddlewareService {
            service: Arc::new(service),
            jwt_service: self.jwt_service.clone(),
        })
    }
}

pub struct IdentityMiddlewareService<S> {
    service: Arc<S>,
    jwt_service: Arc<JwtService>,
}

#[derive(Debug)]
enum AuthError {
    NotBearerToken,
    VerificationFailed(JwtError),
}

impl AuthError {
    fn log_message(&self, path: &str) -> String {
        match self {
            AuthError::NotBearerToken => format!(
                "Authorization header for path {} is not a valid Bearer credential",
                path
            ),
            AuthError::VerificationFailed(e) => {
                format!("JWT token verification failed for path {}: {}", path, e)
            }
        }
    }

    fn client_error_json(&self) -> serde_json::Value {
        let error_message = match self {
            AuthError::VerificationFailed(JwtError::TokenExpired) => "Token expired",
            AuthError::VerificationFailed(_) => "Token verification failed",
            AuthError::NotBearerToken => "Missing or invalid authorization token",
        };
        serde_json::json!({"error": error_message})
    }
}

/// `Ok(None)` when no credentials were sent at all.
fn identify_request(
    req: &ServiceRequest,
    jwt_service: &JwtService,
) -> Result<Option<Identity>, AuthError> {
    if !req.headers().contains_key(AUTHORIZATION) {
        return Ok(None);
    }

    let bearer = Authorization::<Bearer>::parse(req)
        .map_err(|_| AuthError::NotBearerToken)?
        .into_scheme();

    log::debug!("Found Bearer token, verifying...");
    let identity = jwt_service
        .identify(bearer.token())
        .map_err(AuthError::VerificationFailed)?;

    log::debug!("JWT token verified for user: {}", identity.user_id);
    Ok(Some(identity))
}

impl<S, B> Service<ServiceRequest> for IdentityMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<actix_web::body::EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let jwt_service = self.jwt_service.clone();

        Box::pin(async move {
            let path_str = req.path().to_string();

            match identify_request(&req, &jwt_service) {
                Ok(identity) => {
                    if let Some(identity) = identity {
                        req.extensions_mut().insert(identity);
                    }
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(auth_error) => {
                    log::warn!("{}", auth_error.log_message(&path_str));

                    let (http_req, _payload) = req.into_parts();
                    let response = HttpResponse::Unauthorized()
                        .json(auth_error.client_error_json())
                        .map_into_right_body();
                    Ok(ServiceResponse::new(http_req, response))
                }
            }
        })
    }
}

/// The caller's identity if one was established; anonymous requests yield `None`.
pub struct MaybeIdentity(pub Option<Identity>);

impl FromRequest for MaybeIdentity {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        ok(MaybeIdentity(req.extensions().get::<Identity>().cloned()))
    }
}

/// Rejects the request with 401 unless an identity was established.
pub struct AuthenticatedUser(pub Identity);

impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        match req.extensions().get::<Identity>() {
            Some(identity) => ok(AuthenticatedUser(identity.clone())),
            None => {
                log::warn!("No identity for protected path: {}", req.path());
                let response = HttpResponse::Unauthorized()
                    .json(serde_json::json!({"error": "Authentication required"}));
                err(actix_web::error::InternalError::from_response(
                    "authentication required",
                    response,
                )
                .into())
            }
        }
    }
}
