use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};

use gridhold_types::api::Claims;

use crate::error::{ApiError, AuthRejection};
use crate::state::AppState;

/// Cookie set at login and read as a fallback to the bearer header.
pub const AUTH_COOKIE: &str = "auth_token";

/// Pull the raw token from `Authorization: Bearer <token>`, falling back to
/// the `auth_token` cookie. The scheme name is matched case-insensitively.
pub fn extract_token(headers: &HeaderMap) -> Result<String, AuthRejection> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim_start().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|t| !t.is_empty());

    if let Some(token) = bearer {
        return Ok(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(AUTH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(AuthRejection::MissingToken)
}

/// Check signature and expiry.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AuthRejection> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthRejection::Expired,
        _ => AuthRejection::InvalidToken,
    })?;

    Ok(token_data.claims)
}

pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<Claims, AuthRejection> {
    let token = extract_token(headers)?;
    verify_token(&token, secret)
}

/// Rejects the request with 401 unless it carries a valid token; otherwise
/// makes the `Claims` available to handlers as an extension.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = authenticate(req.headers(), &state.jwt_secret)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
