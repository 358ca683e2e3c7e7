use std::future::{ready, Ready};

use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};

use super::jwt::validate_token;
use super::model::ActorContext;
use crate::error::CoreError;

/// Extract token from Authorization header
fn extract_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Validate token from HttpRequest and return the caller's context
pub fn validate_request_token(req: &HttpRequest) -> Result<ActorContext, CoreError> {
    let token = extract_token(req)
        .ok_or_else(|| CoreError::Unauthenticated("Missing authorization token".into()))?;

    let claims = validate_token(&token).map_err(|e| {
        log::warn!("Token validation failed: {:?}", e);
        CoreError::Unauthenticated("Invalid or expired token".into())
    })?;

    Ok(ActorContext::from(claims))
}

impl FromRequest for ActorContext {
    type Error = CoreError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(validate_request_token(req))
    }
}
