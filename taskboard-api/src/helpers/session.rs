//! Password login and stateless JWT sessions.
//!
//! A session token is an HS256 JWT carrying the user id and role. Nothing is
//! stored server side; a token stays valid until it expires.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared_types::{LoginResponse, User, UserRole};

use crate::database::{users, AsyncDbConnection, StoreError};
use crate::helpers::password::verify_password;
use crate::policy::Actor;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub id: String,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,
    #[error("could not sign session token: {0}")]
    Signing(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Signing and verification keys for session tokens
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("ttl_hours", &self.ttl.num_hours())
            .finish()
    }
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, SessionError> {
        let now = Utc::now().timestamp();
        self.issue_at(user, now)
    }

    fn issue_at(&self, user: &User, issued_at: i64) -> Result<String, SessionError> {
        let claims = Claims {
            id: user.id.clone(),
            role: user.role,
            iat: issued_at,
            exp: issued_at + self.ttl.num_seconds(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SessionError::Signing(e.to_string()))
    }

    /// Check signature and expiry, returning who the token speaks for
    pub fn verify(&self, token: &str) -> Result<Actor, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            tracing::debug!("Rejected session token: {}", e);
            SessionError::InvalidOrExpiredToken
        })?;

        Ok(Actor::new(data.claims.id, data.claims.role))
    }
}

/// Check a username/password pair and open a session.
///
/// An unknown username and a wrong password fail the same way.
pub async fn authenticate(
    conn: &AsyncDbConnection,
    keys: &SessionKeys,
    username: &str,
    password: &str,
) -> Result<LoginResponse, SessionError> {
    let (user, password_hash) = users::find_credentials(conn, username)
        .await?
        .ok_or(SessionError::InvalidCredentials)?;

    if !verify_password(password, &password_hash) {
        tracing::info!(username, "Failed login attempt");
        return Err(SessionError::InvalidCredentials);
    }

    let token = keys.issue(&user)?;
    tracing::info!(user_id = %user.id, "User logged in");

    Ok(LoginResponse { token, user })
}
