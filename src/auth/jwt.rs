use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::env;

use super::model::{ActorContext, Claims};

const DEFAULT_JWT_SECRET: &str = "mira-jwt-secret-change-in-production";
const SESSION_TOKEN_EXPIRY_SECONDS: i64 = 60 * 60; // 1 hour

fn get_jwt_secret() -> String {
    env::var("JWT_SECRET").unwrap_or_else(|_| {
        log::warn!("JWT_SECRET not set, using default secret. SET THIS IN PRODUCTION!");
        DEFAULT_JWT_SECRET.to_string()
    })
}

/// Mint a session token for an actor. The identity provider does this in
/// production; the server uses it for local tooling and tests.
pub fn generate_session_token(actor: &ActorContext) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: actor.uid.clone(),
        account_type: actor.account_type,
        name: actor.name.clone(),
        email: actor.email.clone(),
        exp: now + SESSION_TOKEN_EXPIRY_SECONDS as usize,
        iat: now,
    };

    let secret = get_jwt_secret();
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Validate and decode a token
pub fn validate_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let secret = get_jwt_secret();
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}
