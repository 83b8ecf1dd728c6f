use std::sync::LazyLock;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand_core::OsRng;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{info, warn};
use uuid::Uuid;

use pigeon_db::models::NewUser;
use pigeon_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use pigeon_types::models::User;

use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::create_token;
use crate::{AppState, blocking};

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_NAME_LEN: usize = 64;

/// Verified against when the identifier matches no account, so an unknown
/// user costs the same Argon2 work as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"pigeon-no-such-account", &salt)
        .map(|hash| hash.to_string())
        .ok()
});

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_registration(&req)?;

    let username = req.username.trim().to_string();
    let email = req.email.trim().to_lowercase();
    let first_name = non_blank(req.first_name);
    let last_name = non_blank(req.last_name);
    let password = req.password;
    let user_id = Uuid::new_v4();

    {
        let (username, email) = (username.clone(), email.clone());
        blocking(&state, move |db| {
            if db.username_or_email_taken(&username, &email)? {
                return Err(ApiError::DuplicateUser);
            }

            // Hash password with Argon2id
            let salt = SaltString::generate(&mut OsRng);
            let password_hash = Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
                .to_string();

            let id = user_id.to_string();
            let created = db.create_user(&NewUser {
                id: &id,
                username: &username,
                email: &email,
                first_name: first_name.as_deref(),
                last_name: last_name.as_deref(),
                password_hash: &password_hash,
            })?;

            // Lost a race against a concurrent registration
            if !created {
                return Err(ApiError::DuplicateUser);
            }
            Ok(())
        })
        .await?;
    }

    info!("Registered user {} ({})", username, user_id);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered".into(),
            user_id,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identifier = req.identifier.trim().to_string();
    let password = req.password;

    let user = blocking(&state, move |db| {
        let Some(row) = db.get_user_by_identifier(&identifier)? else {
            verify_dummy(&password);
            warn!("Failed login for unknown identifier {}", identifier);
            return Err(ApiError::InvalidCredentials);
        };

        let parsed_hash = PasswordHash::new(&row.password)
            .map_err(|e| anyhow::anyhow!("stored hash for user {} is unreadable: {}", row.id, e))?;

        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_err()
        {
            warn!("Failed login for {}", identifier);
            return Err(ApiError::InvalidCredentials);
        }

        Ok(User::try_from(row)?)
    })
    .await?;

    let token = create_token(&state.jwt_secret, state.token_ttl, user.id, &user.username)?;

    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        token,
        user_id: user.id,
        user,
    }))
}

fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    let username = req.username.trim();
    if !USERNAME_LEN.contains(&username.len()) {
        return Err(ApiError::Validation("Username must be 3 to 32 characters".into()));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(ApiError::Validation(
            "Username may only contain letters, digits, '_', '.' and '-'".into(),
        ));
    }

    let email = req.email.trim();
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty() && !domain.contains('@'));
    if !valid_email {
        return Err(ApiError::Validation("Invalid email address".into()));
    }

    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation("Password must be at least 8 characters".into()));
    }

    for name in [&req.first_name, &req.last_name].into_iter().flatten() {
        if name.trim().chars().count() > MAX_NAME_LEN {
            return Err(ApiError::Validation("Names must be at most 64 characters".into()));
        }
    }

    Ok(())
}

fn verify_dummy(password: &str) {
    if let Some(hash) = DUMMY_HASH.as_deref().and_then(|h| PasswordHash::new(h).ok()) {
        let _ = Argon2::default().verify_password(password.as_bytes(), &hash);
    }
}

/// Trim an optional field, treating blank as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
