pub mod password;
pub mod signed_token;

pub use password::{hash_password, verify_password};
pub use signed_token::{TokenError, TokenPurpose, TokenSigner};

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::entities::UserModel;

/// JWT claims carried by access tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Account email
    pub email: String,
    /// Staff accounts may manage the catalog and read reports
    pub staff: bool,
    /// Issued-at (unix seconds)
    pub iat: usize,
    /// Expiry (unix seconds)
    pub exp: usize,
}

/// The authenticated principal, attached to request extensions by
/// `auth_middleware` and read by handlers through `Extension<CurrentUser>`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub is_staff: bool,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token has expired")]
    ExpiredToken,
    #[error("Token creation failed: {0}")]
    TokenCreation(String),
    #[error("Hash error: {0}")]
    HashError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::ExpiredToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::TokenCreation(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_TOKEN_CREATION_FAILED",
                msg.clone(),
            ),
            Self::HashError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_HASH_ERROR",
                msg.clone(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Issues and validates JWT access tokens.
#[derive(Clone)]
pub struct AuthService {
    secret: String,
    token_ttl: Duration,
}

impl AuthService {
    pub fn new(secret: String, token_ttl: Duration) -> Self {
        Self { secret, token_ttl }
    }

    /// Issues an access token for the given account.
    pub fn issue_token(&self, user: &UserModel) -> Result<String, AuthError> {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            staff: user.is_staff,
            iat: now,
            exp: now + self.token_ttl.as_secs() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validates a token and returns its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::InvalidToken,
        })
    }
}

/// Extracts the bearer token, validates it and attaches `CurrentUser` to the
/// request. Routes behind this middleware can rely on the extension being
/// present.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    let token = match token {
        Some(token) if !token.is_empty() => token,
        _ => return AuthError::MissingAuth.into_response(),
    };

    let claims = match state.auth.validate_token(token) {
        Ok(claims) => claims,
        Err(e) => return e.into_response(),
    };

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return AuthError::InvalidToken.into_response(),
    };

    request.extensions_mut().insert(CurrentUser {
        id: user_id,
        email: claims.email,
        is_staff: claims.staff,
    });

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> UserModel {
        UserModel {
            id: Uuid::new_v4(),
            email: "shopper@example.com".to_string(),
            first_name: "Pat".to_string(),
            last_name: "Doe".to_string(),
            password_hash: "unused".to_string(),
            is_active: true,
            is_staff: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn issue_and_validate_roundtrip() {
        let service = AuthService::new("secret".repeat(8), Duration::from_secs(3600));
        let user = test_user();

        let token = service.issue_token(&user).unwrap();
        let claims = service.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, user.email);
        assert!(!claims.staff);
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let issuer = AuthService::new("a".repeat(64), Duration::from_secs(3600));
        let verifier = AuthService::new("b".repeat(64), Duration::from_secs(3600));
        let token = issuer.issue_token(&test_user()).unwrap();

        assert!(matches!(
            verifier.validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let service = AuthService::new("secret".repeat(8), Duration::from_secs(3600));
        assert!(matches!(
            service.validate_token("not.a.jwt"),
            Err(AuthError::InvalidToken)
        ));
    }
}
