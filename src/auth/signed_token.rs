use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// What a signed token authorizes. The purpose is part of the MAC input, so
/// an activation token can never pass as a reset token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Activation,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Activation => "activation",
            TokenPurpose::PasswordReset => "password-reset",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token signature is invalid")]
    InvalidSignature,
}

/// Issues and verifies signed, time-boxed, single-purpose tokens.
///
/// A token is `base64(issued_at).base64(mac)` where the MAC covers the user
/// id, the purpose, the issue timestamp and a caller-supplied context string.
/// Binding the context to mutable account state (the active flag for
/// activation, the password hash for resets) makes each token single-use:
/// consuming it changes the state and the MAC no longer verifies.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn issue(&self, user_id: Uuid, purpose: TokenPurpose, context: &str) -> String {
        self.issue_at(user_id, purpose, context, Utc::now())
    }

    fn issue_at(
        &self,
        user_id: Uuid,
        purpose: TokenPurpose,
        context: &str,
        issued_at: DateTime<Utc>,
    ) -> String {
        let ts = issued_at.timestamp();
        let mac = self.mac(user_id, purpose, context, ts);
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(ts.to_string()),
            URL_SAFE_NO_PAD.encode(mac)
        )
    }

    pub fn verify(
        &self,
        token: &str,
        user_id: Uuid,
        purpose: TokenPurpose,
        context: &str,
        max_age: Duration,
    ) -> Result<(), TokenError> {
        self.verify_at(token, user_id, purpose, context, max_age, Utc::now())
    }

    fn verify_at(
        &self,
        token: &str,
        user_id: Uuid,
        purpose: TokenPurpose,
        context: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<(), TokenError> {
        let (ts_part, sig_part) = token.split_once('.').ok_or(TokenError::Malformed)?;

        let ts: i64 = String::from_utf8(
            URL_SAFE_NO_PAD
                .decode(ts_part)
                .map_err(|_| TokenError::Malformed)?,
        )
        .map_err(|_| TokenError::Malformed)?
        .parse()
        .map_err(|_| TokenError::Malformed)?;

        let sig = URL_SAFE_NO_PAD
            .decode(sig_part)
            .map_err(|_| TokenError::Malformed)?;

        // Reject both stale and future-dated timestamps.
        let age = now.timestamp() - ts;
        if age < 0 || age > max_age.num_seconds() {
            return Err(TokenError::Expired);
        }

        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(Self::payload(user_id, purpose, context, ts).as_bytes());
        mac.verify_slice(&sig)
            .map_err(|_| TokenError::InvalidSignature)
    }

    fn mac(&self, user_id: Uuid, purpose: TokenPurpose, context: &str, ts: i64) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key size");
        mac.update(Self::payload(user_id, purpose, context, ts).as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    fn payload(user_id: Uuid, purpose: TokenPurpose, context: &str, ts: i64) -> String {
        format!("{}:{}:{}:{}", user_id, purpose.as_str(), ts, context)
    }
}
