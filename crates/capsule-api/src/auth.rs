use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use tracing::info;
use uuid::Uuid;

use capsule_db::StoreError;
use capsule_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiError;
use crate::state::{AppState, blocking};

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_credentials(&req.username, &req.password)?;

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))?
        .to_string();

    let user_id = Uuid::new_v4();
    let username = req.username.clone();

    // The UNIQUE constraint catches a name taken concurrently.
    blocking(&state, move |s| {
        if s.db.get_user_by_username(&username)?.is_some() {
            return Err(StoreError::Conflict("username is already taken".into()).into());
        }
        s.db.create_user(&user_id.to_string(), &username, &password_hash)
            .map_err(|e| match e {
                StoreError::Conflict(_) => StoreError::Conflict("username is already taken".into()),
                other => other,
            })?;
        Ok(())
    })
    .await?;

    info!("Registered user {} ({})", req.username, user_id);

    let token = create_token(&state.jwt_secret, state.token_ttl, user_id, &req.username)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

/// Username length is counted in characters, not bytes.
fn check_credentials(username: &str, password: &str) -> Result<(), ApiError> {
    if !(3..=32).contains(&username.chars().count()) {
        return Err(ApiError::BadRequest(
            "username must be 3 to 32 characters".into(),
        ));
    }
    if password.chars().count() < 8 {
        return Err(ApiError::BadRequest(
            "password must be at least 8 characters".into(),
        ));
    }
    Ok(())
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.clone();
    let user = blocking(&state, move |s| Ok(s.db.get_user_by_username(&username)?))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(format!("stored password hash unreadable: {}", e)))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(format!("corrupt user id '{}': {}", user.id, e)))?;

    let token = create_token(&state.jwt_secret, state.token_ttl, user_id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

pub fn create_token(
    secret: &str,
    ttl: chrono::Duration,
    user_id: Uuid,
    username: &str,
) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token encoding failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::decode_token;

    #[test]
    fn token_round_trips_through_middleware_decoder() {
        let id = Uuid::new_v4();
        let token = create_token("s3cret", chrono::Duration::days(1), id, "ana").unwrap();

        let claims = decode_token("s3cret", &token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.username, "ana");
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let token = create_token("one", chrono::Duration::days(1), Uuid::new_v4(), "ana").unwrap();
        assert!(matches!(decode_token("two", &token), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn username_length_counts_characters() {
        assert!(check_credentials("zoë", "long enough").is_ok());
        assert!(check_credentials(&"é".repeat(32), "long enough").is_ok());
        assert!(check_credentials(&"é".repeat(33), "long enough").is_err());
        assert!(check_credentials("jo", "long enough").is_err());
        assert!(check_credentials("zoë", "short").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // Well past the decoder's default 60 s leeway.
        let token =
            create_token("s3cret", chrono::Duration::hours(-1), Uuid::new_v4(), "ana").unwrap();
        assert!(matches!(decode_token("s3cret", &token), Err(ApiError::Unauthorized)));
    }
}
