//! Dependency-injected authentication state shared across handlers.

use secrecy::SecretString;

use super::token::TokenCodec;

/// Token codec plus the public base URL used to build outbound links.
/// Constructed once at startup and handed to handlers via an `Extension`
/// layer instead of living in process-global state.
#[derive(Clone)]
pub struct AuthState {
    codec: TokenCodec,
    base_url: String,
}

impl AuthState {
    #[must_use]
    pub fn new(jwt_secret: &SecretString, base_url: String) -> Self {
        Self {
            codec: TokenCodec::new(jwt_secret),
            base_url,
        }
    }

    #[must_use]
    pub fn with_codec(mut self, codec: TokenCodec) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    #[must_use]
    pub fn confirmation_url(&self, token: &str) -> String {
        format!("{}/confirm/{token}", self.base_url)
    }

    #[must_use]
    pub fn post_url(&self, post_id: i64) -> String {
        format!("{}/post/{post_id}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::handlers::auth::token::TokenPurpose;

    #[test]
    fn test_link_building() {
        let state = AuthState::new(
            &SecretString::from("secret"),
            "https://api.socialite.dev".to_string(),
        );
        assert_eq!(
            state.confirmation_url("abc"),
            "https://api.socialite.dev/confirm/abc"
        );
        assert_eq!(state.post_url(7), "https://api.socialite.dev/post/7");
    }

    #[test]
    fn test_codec_override_for_short_ttls() {
        let state = AuthState::new(
            &SecretString::from("secret"),
            "https://api.socialite.dev".to_string(),
        )
        .with_codec(TokenCodec::new(&SecretString::from("secret")).with_access_ttl_minutes(-1));

        let token = state
            .codec()
            .issue("test@example.net", TokenPurpose::Access)
            .unwrap();
        assert!(state.codec().redeem(&token, TokenPurpose::Access).is_err());
    }
}
