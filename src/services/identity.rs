//! Registration, login and logout over the store's profile and session
//! collections.

use argon2::password_hash::{SaltString, rand_core::OsRng as PHOsRng};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ServiceError;
use crate::middleware::auth_context::AuthContext;
use crate::models::{NewAccount, Role, UserProfile};
use crate::store::Store;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginOutcome {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

/* -------------------------
   Credentials
--------------------------*/

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Argon2id PHC string with a fresh salt.
pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut PHOsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| ServiceError::Backend(format!("argon2 hash error: {e}")))
}

/// Opaque bearer token handed to the client; only its hash is stored.
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn hash_access_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/* -------------------------
   Validation
--------------------------*/

/// Lower-cased address if it sits under `domain`.
pub fn normalize_email(raw: &str, domain: &str) -> Result<String, ServiceError> {
    let email = raw.trim().to_ascii_lowercase();
    let Some((local, host)) = email.split_once('@') else {
        return Err(ServiceError::validation("VALIDATION_ERROR", "email is not valid"));
    };
    if local.is_empty() || host.contains('@') || local.chars().any(char::is_whitespace) {
        return Err(ServiceError::validation("VALIDATION_ERROR", "email is not valid"));
    }
    if !host.eq_ignore_ascii_case(domain) {
        return Err(ServiceError::validation(
            "EMAIL_DOMAIN_NOT_ALLOWED",
            format!("email must be an @{domain} address"),
        ));
    }
    Ok(email)
}

/* -------------------------
   Operations
--------------------------*/

pub async fn register(
    store: &dyn Store,
    email_domain: &str,
    req: RegisterRequest,
) -> Result<UserProfile, ServiceError> {
    let email = normalize_email(&req.email, email_domain)?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("VALIDATION_ERROR", "name is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::validation(
            "WEAK_PASSWORD",
            format!("password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }

    let password_hash = hash_password(&req.password)?;
    let profile = store
        .create_account(NewAccount {
            name: name.to_string(),
            email,
            role: req.role,
            password_hash,
        })
        .await?;

    tracing::info!(user_id = %profile.id, role = %profile.role, "account registered");
    Ok(profile)
}

pub async fn login(
    store: &dyn Store,
    ttl_hours: i64,
    req: LoginRequest,
) -> Result<LoginOutcome, ServiceError> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(ServiceError::validation(
            "VALIDATION_ERROR",
            "email and password are required",
        ));
    }

    let account = store
        .find_account_by_email(email)
        .await?
        .ok_or(ServiceError::Unauthorized)?;

    if !verify_password(&req.password, &account.password_hash) {
        tracing::warn!(user_id = %account.profile.id, "login rejected: bad password");
        return Err(ServiceError::Unauthorized);
    }

    let access_token = generate_access_token();
    let expires_at = Utc::now() + Duration::hours(ttl_hours);
    store
        .create_session(account.profile.id, &hash_access_token(&access_token), expires_at)
        .await?;

    tracing::info!(user_id = %account.profile.id, "session opened");
    Ok(LoginOutcome {
        access_token,
        expires_at,
        user: account.profile,
    })
}

pub async fn logout(store: &dyn Store, auth: &AuthContext) -> Result<(), ServiceError> {
    if store.revoke_session(auth.session_id).await? {
        tracing::info!(user_id = %auth.user_id, "session closed");
        Ok(())
    } else {
        Err(ServiceError::Unauthorized)
    }
}

pub async fn current_profile(
    store: &dyn Store,
    auth: &AuthContext,
) -> Result<UserProfile, ServiceError> {
    store
        .get_profile(auth.user_id)
        .await?
        .ok_or(ServiceError::NotFound("profile"))
}
