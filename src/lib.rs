//! # Socialite (Social network REST API)
//!
//! `socialite` is a small social-network backend: user registration with
//! email confirmation, JWT bearer authentication, posts, comments, likes,
//! file upload to Backblaze B2, and asynchronous email / image-generation
//! side tasks.
//!
//! ## Accounts & tokens
//!
//! - Registration stores a bcrypt digest and an unconfirmed account, then
//!   emails a confirmation link. Login is refused until the link is redeemed.
//! - Tokens are HS256 JWTs carrying a `type` claim; confirmation tokens are
//!   never accepted as session credentials and vice versa.
//!
//! ## Resources
//!
//! Posts, comments and likes are owned by the authenticated caller; reads
//! are public. Post listing supports `new`, `old` and `most_likes`
//! orderings, the latter computed from the `likes` table at read time.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
