use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    Json, Router,
    extract::{FromRequestParts, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    routing::{get, post},
};
use time::OffsetDateTime;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::constants::*;
use crate::database::{StoreError, UserStore};
use crate::models::{AuthResponse, LoginPayload, PublicUser, RegisterPayload, User};
use crate::server::AppState;
use crate::token::Claims;
use crate::utils::{
    Payload, normalize_email, validate_email, validate_password, validate_string_length,
};

/// The route group mounted under `/api/auth`.
pub fn router<S>() -> Router<AppState<S>>
where
    S: UserStore + Clone + Sync + 'static,
{
    Router::new()
        .route("/register", post(register::<S>))
        .route("/login", post(login::<S>))
        .route("/me", get(me::<S>))
}

fn unauthorized(message: &str) -> (StatusCode, String) {
    (StatusCode::UNAUTHORIZED, message.to_string())
}

fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    error!(error = %e, "auth request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ERR_DATABASE_OPERATION.to_string(),
    )
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn issue_response<S>(state: &AppState<S>, user: &User) -> Result<AuthResponse, (StatusCode, String)> {
    let token = state.tokens.issue(&user.id).map_err(internal_error)?;
    Ok(AuthResponse {
        token,
        user: PublicUser::from(user),
    })
}

pub async fn register<S>(
    State(state): State<AppState<S>>,
    Payload(payload): Payload<RegisterPayload>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)>
where
    S: UserStore + Clone + Sync + 'static,
{
    let name = payload.name.trim().to_string();
    validate_string_length(&name, "Name", MAX_NAME_LENGTH)?;
    let email = normalize_email(&payload.email);
    validate_email(&email)?;
    validate_password(&payload.password)?;

    let user = User {
        id: Uuid::new_v4().to_string(),
        name,
        email,
        password_hash: hash_password(&payload.password).map_err(internal_error)?,
        created_at: OffsetDateTime::now_utc().unix_timestamp(),
    };

    state.users.insert(&user).await.map_err(|e| match e {
        StoreError::Duplicate => (StatusCode::CONFLICT, ERR_EMAIL_TAKEN.to_string()),
        StoreError::Other(e) => internal_error(e),
    })?;

    info!(user_id = %user.id, "registered user");
    Ok((StatusCode::CREATED, Json(issue_response(&state, &user)?)))
}

pub async fn login<S>(
    State(state): State<AppState<S>>,
    Payload(payload): Payload<LoginPayload>,
) -> Result<(StatusCode, Json<AuthResponse>), (StatusCode, String)>
where
    S: UserStore + Clone + Sync + 'static,
{
    let email = normalize_email(&payload.email);
    if email.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Email cannot be empty".to_string()));
    }
    if payload.password.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Password cannot be empty".to_string(),
        ));
    }

    let user = match state
        .users
        .find_by_email(&email)
        .await
        .map_err(internal_error)?
    {
        Some(user) => user,
        None => return Err(unauthorized(ERR_INVALID_CREDENTIALS)),
    };

    if !verify_password(&payload.password, &user.password_hash).map_err(internal_error)? {
        return Err(unauthorized(ERR_INVALID_CREDENTIALS));
    }

    Ok((StatusCode::OK, Json(issue_response(&state, &user)?)))
}

pub async fn me<S>(
    State(state): State<AppState<S>>,
    AuthUser(claims): AuthUser,
) -> Result<(StatusCode, Json<PublicUser>), (StatusCode, String)>
where
    S: UserStore + Clone + Sync + 'static,
{
    let user = state
        .users
        .find_by_id(&claims.sub)
        .await
        .map_err(internal_error)?
        .ok_or_else(|| unauthorized(ERR_UNAUTHORIZED))?;

    Ok((StatusCode::OK, Json(PublicUser::from(&user))))
}

/// Claims of a request carrying a valid `Authorization: Bearer` token.
pub struct AuthUser(pub Claims);

impl<S> FromRequestParts<AppState<S>> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| unauthorized(ERR_UNAUTHORIZED))?;

        let claims = state.tokens.verify(token).map_err(|e| {
            debug!(error = %e, "rejected bearer token");
            unauthorized(ERR_UNAUTHORIZED)
        })?;

        Ok(AuthUser(claims))
    }
}
