//! Signed, expiring claim sets shared by the access and confirmation flows.
//!
//! Both token kinds use one codec and one claim shape; the `type` claim is
//! the whole boundary between a session credential and an email-confirmation
//! link, so it is checked explicitly on every redeem.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ACCESS_TOKEN_EXPIRE_MINUTES: i64 = 30;
pub const CONFIRM_TOKEN_EXPIRE_MINUTES: i64 = 1440;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    Access,
    Confirmation,
}

impl std::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Confirmation => write!(f, "confirmation"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    exp: i64,
    #[serde(rename = "type")]
    purpose: TokenPurpose,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Invalid token")]
    Invalid,

    #[error("Token has expired")]
    Expired,

    #[error("Token is missing 'sub' field")]
    MissingSubject,

    #[error("Token has incorrect type, expected '{0}'")]
    WrongPurpose(TokenPurpose),

    #[error("Token encoding failed")]
    Encoding,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Invalid,
        }
    }
}

/// HS256 codec for access and confirmation tokens.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_minutes: i64,
    confirmation_ttl_minutes: i64,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            access_ttl_minutes: ACCESS_TOKEN_EXPIRE_MINUTES,
            confirmation_ttl_minutes: CONFIRM_TOKEN_EXPIRE_MINUTES,
        }
    }

    #[must_use]
    pub fn with_access_ttl_minutes(mut self, minutes: i64) -> Self {
        self.access_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_confirmation_ttl_minutes(mut self, minutes: i64) -> Self {
        self.confirmation_ttl_minutes = minutes;
        self
    }

    /// Issue a signed token for `subject` with the TTL of `purpose`.
    ///
    /// # Errors
    /// Returns `TokenError::Encoding` if signing fails.
    pub fn issue(&self, subject: &str, purpose: TokenPurpose) -> Result<String, TokenError> {
        let ttl = match purpose {
            TokenPurpose::Access => self.access_ttl_minutes,
            TokenPurpose::Confirmation => self.confirmation_ttl_minutes,
        };
        let expire = Utc::now() + Duration::minutes(ttl);

        let claims = Claims {
            sub: Some(subject.to_string()),
            exp: expire.timestamp(),
            purpose,
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|_| TokenError::Encoding)
    }

    /// Verify a token and return its subject.
    ///
    /// Checks run in order: signature + expiry, then subject presence, then
    /// purpose equality. Each failure maps to a distinct message.
    ///
    /// # Errors
    /// Returns the matching `TokenError` variant on any failed check.
    pub fn redeem(&self, token: &str, expected: TokenPurpose) -> Result<String, TokenError> {
        let mut validation = Validation::default();
        // Zero leeway so a non-positive TTL always redeems as expired.
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        let subject = data.claims.sub.ok_or(TokenError::MissingSubject)?;

        if data.claims.purpose != expected {
            return Err(TokenError::WrongPurpose(expected));
        }

        Ok(subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_codec() -> TokenCodec {
        TokenCodec::new(&SecretString::from("test-secret-key-for-tokens"))
    }

    #[test]
    fn test_default_ttls() {
        let codec = test_codec();
        assert_eq!(codec.access_ttl_minutes, 30);
        assert_eq!(codec.confirmation_ttl_minutes, 1440);
    }

    #[test]
    fn test_round_trip_access() {
        let codec = test_codec();
        let token = codec.issue("test@example.com", TokenPurpose::Access).unwrap();
        let subject = codec.redeem(&token, TokenPurpose::Access).unwrap();
        assert_eq!(subject, "test@example.com");
    }

    #[test]
    fn test_round_trip_confirmation() {
        let codec = test_codec();
        let token = codec
            .issue("test@example.com", TokenPurpose::Confirmation)
            .unwrap();
        let subject = codec.redeem(&token, TokenPurpose::Confirmation).unwrap();
        assert_eq!(subject, "test@example.com");
    }

    #[test]
    fn test_confirmation_token_rejected_as_access() {
        let codec = test_codec();
        let token = codec
            .issue("test@example.com", TokenPurpose::Confirmation)
            .unwrap();
        let result = codec.redeem(&token, TokenPurpose::Access);
        assert_eq!(result, Err(TokenError::WrongPurpose(TokenPurpose::Access)));
        assert_eq!(
            result.unwrap_err().to_string(),
            "Token has incorrect type, expected 'access'"
        );
    }

    #[test]
    fn test_access_token_rejected_as_confirmation() {
        let codec = test_codec();
        let token = codec.issue("test@example.com", TokenPurpose::Access).unwrap();
        let result = codec.redeem(&token, TokenPurpose::Confirmation);
        assert_eq!(
            result,
            Err(TokenError::WrongPurpose(TokenPurpose::Confirmation))
        );
    }

    #[test]
    fn test_expired_token() {
        let codec = test_codec().with_access_ttl_minutes(-1);
        let token = codec.issue("test@example.com", TokenPurpose::Access).unwrap();
        let result = codec.redeem(&token, TokenPurpose::Access);
        assert_eq!(result, Err(TokenError::Expired));
        assert_eq!(result.unwrap_err().to_string(), "Token has expired");
    }

    #[test]
    fn test_zero_ttl_is_expired() {
        let codec = test_codec().with_confirmation_ttl_minutes(0);
        let token = codec
            .issue("test@example.com", TokenPurpose::Confirmation)
            .unwrap();
        assert_eq!(
            codec.redeem(&token, TokenPurpose::Confirmation),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_invalid_token() {
        let codec = test_codec();
        let result = codec.redeem("invalid token", TokenPurpose::Access);
        assert_eq!(result, Err(TokenError::Invalid));
        assert_eq!(result.unwrap_err().to_string(), "Invalid token");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let codec = test_codec();
        let other = TokenCodec::new(&SecretString::from("a-different-secret"));
        let token = codec.issue("test@example.com", TokenPurpose::Access).unwrap();
        assert_eq!(
            other.redeem(&token, TokenPurpose::Access),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_missing_subject() {
        let codec = test_codec();
        // Hand-craft a valid signed token without a `sub` claim.
        let exp = (Utc::now() + Duration::minutes(5)).timestamp();
        let token = encode(
            &Header::default(),
            &json!({ "exp": exp, "type": "access" }),
            &codec.encoding_key,
        )
        .unwrap();

        let result = codec.redeem(&token, TokenPurpose::Access);
        assert_eq!(result, Err(TokenError::MissingSubject));
        assert_eq!(
            result.unwrap_err().to_string(),
            "Token is missing 'sub' field"
        );
    }

    #[test]
    fn test_missing_purpose_is_invalid() {
        let codec = test_codec();
        let exp = (Utc::now() + Duration::minutes(5)).timestamp();
        let token = encode(
            &Header::default(),
            &json!({ "sub": "test@example.com", "exp": exp }),
            &codec.encoding_key,
        )
        .unwrap();

        assert_eq!(
            codec.redeem(&token, TokenPurpose::Access),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_purpose_serialization() {
        assert_eq!(
            serde_json::to_string(&TokenPurpose::Access).unwrap(),
            r#""access""#
        );
        assert_eq!(
            serde_json::to_string(&TokenPurpose::Confirmation).unwrap(),
            r#""confirmation""#
        );
    }
}
