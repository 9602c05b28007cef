//! API handlers and shared utilities.

pub mod auth;
pub mod comments;
pub mod health;
pub mod likes;
pub mod posts;
pub mod upload;
pub mod user_login;
pub mod user_register;

use regex::Regex;

/// Lightweight email sanity check used before persisting data.
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Emails are compared and stored in trimmed, lowercased form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(valid_email("test@example.net"));
        assert!(valid_email("a.b+c@sub.example.com"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing@tld"));
        assert!(!valid_email("spaces in@example.com"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Test@Example.NET "), "test@example.net");
    }
}
