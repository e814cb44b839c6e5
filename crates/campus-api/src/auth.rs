use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};
use uuid::Uuid;

use campus_db::Database;
use campus_db::models::UserRow;
use campus_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use campus_types::models::User;

use crate::is_constraint_violation;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    // Validate input
    let login = req.login.trim();
    if login.len() < 3 || login.len() > 32 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.password.len() < 8 {
        return Err(StatusCode::BAD_REQUEST);
    }
    if req.name.trim().is_empty() || req.surname.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    // Check if login is taken
    if state
        .db
        .get_user_by_login(login)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .is_some()
    {
        return Err(StatusCode::CONFLICT);
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .to_string();

    let user_id = Uuid::new_v4();
    let role = req.role.unwrap_or_default();

    state
        .db
        .create_user(
            &user_id.to_string(),
            req.name.trim(),
            req.surname.trim(),
            login,
            &password_hash,
            role.as_str(),
        )
        .map_err(|e| {
            // Lost a race with another registration for the same login.
            if is_constraint_violation(&e) {
                StatusCode::CONFLICT
            } else {
                error!("Failed to create user '{}': {}", login, e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    info!("Registered user {} ({})", login, role);
    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let row = state
        .db
        .get_user_by_login(req.login.trim())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Verify password
    let parsed_hash =
        PasswordHash::new(&row.password).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let user = user_from_row(row).map_err(|e| {
        error!("Corrupt user row: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let token = create_token(&state.jwt_secret, user.id, &user.login)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(LoginResponse { user, token }))
}

pub(crate) fn user_from_row(row: UserRow) -> anyhow::Result<User> {
    Ok(User {
        id: row.id.parse()?,
        name: row.name,
        surname: row.surname,
        login: row.login,
        role: row.role.parse().map_err(anyhow::Error::msg)?,
    })
}

fn create_token(secret: &str, user_id: Uuid, login: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        login: login.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
