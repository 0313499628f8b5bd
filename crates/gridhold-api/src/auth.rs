use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};
use uuid::Uuid;

use gridhold_db::is_constraint_violation;
use gridhold_types::api::{
    AckResponse, Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
    UserSummary, VerifyResponse,
};
use gridhold_types::events::{MapEvent, PointAction};

use crate::error::{ApiError, AuthRejection};
use crate::middleware::{AUTH_COOKIE, authenticate};
use crate::state::{AppState, run_db};

/// Tokens and the auth cookie live for 7 days.
pub const TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;
const MIN_PASSWORD_LEN: usize = 6;

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let username = req.username.trim().to_string();

    // Validate input
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Username and password are required"));
    }
    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Err(ApiError::validation("Username must be 3-32 characters"));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation("Password must be at least 6 characters"));
    }

    // Check if username is taken
    let lookup = username.clone();
    if run_db(&state, move |db| db.get_user_by_username(&lookup)).await?.is_some() {
        return Err(ApiError::validation("Username already exists"));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?
        .to_string();

    let user_id = Uuid::new_v4();

    let (id, name) = (user_id.to_string(), username.clone());
    match run_db(&state, move |db| db.create_user(&id, &name, &password_hash)).await {
        Ok(()) => {}
        // Lost a race with a concurrent registration of the same name
        Err(ApiError::Internal(e)) if is_constraint_violation(&e) => {
            return Err(ApiError::validation("Username already exists"));
        }
        Err(e) => return Err(e),
    }

    info!("Registered user {} ({})", username, user_id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: UserSummary {
                id: user_id,
                username,
            },
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let username = req.username.trim().to_string();
    if username.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("Username and password are required"));
    }

    let user = run_db(&state, move |db| db.get_user_by_username(&username))
        .await?
        .ok_or(AuthRejection::InvalidCredentials)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored hash for {} unreadable: {}", user.id, e)))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthRejection::InvalidCredentials)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id '{}': {}", user.id, e)))?;

    let token = create_token(&state.jwt_secret, user_id, &user.username, Some(user.role.as_str()))?;
    let cookie = auth_cookie(&token, TOKEN_TTL_SECS, state.environment.is_development())?;

    info!("User {} logged in", user.username);

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            user: UserSummary {
                id: user_id,
                username: user.username,
            },
            token,
        }),
    ))
}

/// Never fails: a bad or missing token is reported as `valid: false`.
pub async fn verify(State(state): State<AppState>, headers: HeaderMap) -> Json<VerifyResponse> {
    let invalid = Json(VerifyResponse {
        valid: false,
        user: None,
    });

    let Ok(claims) = authenticate(&headers, &state.jwt_secret) else {
        return invalid;
    };

    let id = claims.sub.to_string();
    match run_db(&state, move |db| db.get_user_by_id(&id)).await {
        Ok(Some(user)) => Json(VerifyResponse {
            valid: true,
            user: Some(UserSummary {
                id: claims.sub,
                username: user.username,
            }),
        }),
        Ok(None) => invalid,
        Err(e) => {
            warn!("verify lookup failed for {}: {}", claims.sub, e);
            invalid
        }
    }
}

/// Tokens are stateless, so logging out only clears the cookie.
pub async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let cookie = auth_cookie("", 0, state.environment.is_development())?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(AckResponse {
            success: true,
            message: "Logged out".into(),
        }),
    ))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let id = claims.sub.to_string();
    let points = run_db(&state, move |db| db.delete_user(&id))
        .await?
        .ok_or(AuthRejection::UnknownUser)?;

    info!("Deleted account {} ({}) with {} base points", claims.username, claims.sub, points);
    if points > 0 {
        state.events.publish(MapEvent::BasePointsChanged {
            action: PointAction::AccountDeleted,
            user_id: Some(claims.sub.to_string()),
            count: points,
        });
    }

    let cookie = auth_cookie("", 0, state.environment.is_development())?;
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(AckResponse {
            success: true,
            message: "Account deleted".into(),
        }),
    ))
}

pub fn create_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
    role: Option<&str>,
) -> anyhow::Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        role: role.map(str::to_string),
        iat: now as usize,
        exp: (now + TOKEN_TTL_SECS) as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// `Set-Cookie` value for the auth cookie. `max_age = 0` expires it.
fn auth_cookie(token: &str, max_age: i64, insecure: bool) -> Result<HeaderValue, ApiError> {
    let secure = if insecure { "" } else { "; Secure" };
    let value = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        AUTH_COOKIE, token, max_age, secure
    );
    HeaderValue::from_str(&value)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("bad cookie value: {}", e)))
}
