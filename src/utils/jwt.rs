// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sqlx::SqlitePool;

use crate::{config::Config, error::AppError, models::user::Role};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "session";

/// Session token claims.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    pub username: String,
    pub role: Role,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))
    }

    pub fn is_admin(&self) -> bool {
        self.role.can_administer()
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Admin role required".to_string()))
        }
    }

    /// Owners see their own records; admins see everyone's.
    pub fn can_view(&self, owner_id: i64) -> bool {
        self.is_admin() || self.user_id().is_ok_and(|id| id == owner_id)
    }

    pub fn require_view(&self, owner_id: i64) -> Result<(), AppError> {
        if self.can_view(owner_id) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Not allowed to view this record".to_string()))
        }
    }
}

/// Claims of the token handed out when a quiz is started.
/// Pins the questions that were presented so the submission grades the same set.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AttemptClaims {
    pub sub: String,
    pub quiz_id: i64,
    pub question_ids: Vec<i64>,
    pub exp: usize,
}

fn expires_at(ttl_seconds: u64) -> Result<usize, AppError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .as_secs() as usize
        + ttl_seconds as usize)
}

fn sign<T: Serialize>(claims: &T, secret: &str) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

fn verify<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, AppError> {
    decode::<T>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::AuthError("Invalid token".to_string()))
}

/// Signs a new session token for the user.
pub fn sign_jwt(
    id: i64,
    username: &str,
    role: Role,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: id.to_string(),
        username: username.to_owned(),
        role,
        exp: expires_at(expiration_seconds)?,
    };

    sign(&claims, secret)
}

/// Verifies and decodes a session token.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    verify(token, secret)
}

pub fn sign_attempt(
    user_id: i64,
    quiz_id: i64,
    question_ids: Vec<i64>,
    secret: &str,
    expiration_seconds: u64,
) -> Result<String, AppError> {
    let claims = AttemptClaims {
        sub: user_id.to_string(),
        quiz_id,
        question_ids,
        exp: expires_at(expiration_seconds)?,
    };

    sign(&claims, secret)
}

/// Returns the pinned question ids if the token is valid and was issued to
/// this user for this quiz.
pub fn verify_attempt(token: &str, secret: &str, user_id: i64, quiz_id: i64) -> Option<Vec<i64>> {
    let claims: AttemptClaims = verify(token, secret).ok()?;
    if claims.sub != user_id.to_string() || claims.quiz_id != quiz_id {
        return None;
    }
    Some(claims.question_ids)
}

/// Finds the session token in the `Authorization: Bearer` header or, failing
/// that, the session cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned);

    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_owned())
    })
}

/// Axum Middleware: Authentication.
///
/// Validates the session token and injects `Claims` into the request
/// extensions for handlers to use. Missing or invalid tokens get 401.
pub async fn auth_middleware(
    State(config): State<Config>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = token_from_headers(req.headers())
        .ok_or_else(|| AppError::AuthError("Login required".to_string()))?;

    let claims = verify_jwt(&token, &config.secret_key)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Axum Middleware: Admin Authorization.
///
/// Must be used AFTER `auth_middleware`. The role is read from the users
/// table on every request, so a demoted admin loses access while their token
/// is still valid and a deleted account gets 401.
pub async fn admin_middleware(
    State(pool): State<SqlitePool>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .cloned()
        .ok_or_else(|| AppError::AuthError("Login required".to_string()))?;

    let role = sqlx::query_scalar::<_, Role>("SELECT role FROM users WHERE id = ?")
        .bind(claims.user_id()?)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::AuthError("Account no longer exists".to_string()))?;

    let claims = Claims { role, ..claims };
    claims.require_admin()?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
