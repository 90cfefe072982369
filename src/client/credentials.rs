//! Session credentials shared by every request of one client: the anti-forgery
//! token and, inside an embedding host, a bearer token. Values are kept as
//! `SecretString` and never logged.

use secrecy::{ExposeSecret, SecretString};
use std::sync::{PoisonError, RwLock};

#[derive(Default)]
pub struct Credentials {
    csrf_token: RwLock<Option<SecretString>>,
    bearer_token: RwLock<Option<SecretString>>,
}

impl Credentials {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn csrf_token(&self) -> Option<SecretString> {
        self.csrf_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the cached CSRF token; last write wins.
    pub fn set_csrf_token(&self, token: SecretString) {
        *self
            .csrf_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    #[must_use]
    pub fn bearer_token(&self) -> Option<SecretString> {
        self.bearer_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_bearer_token(&self, token: SecretString) {
        *self
            .bearer_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Drops both tokens so the next request fetches fresh ones.
    pub fn clear(&self) {
        *self
            .csrf_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        *self
            .bearer_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// True when the cached CSRF token equals `candidate`.
    #[must_use]
    pub fn csrf_matches(&self, candidate: &str) -> bool {
        self.csrf_token()
            .is_some_and(|token| token.expose_secret() == candidate)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |present: bool| if present { "***" } else { "<none>" };
        f.debug_struct("Credentials")
            .field("csrf_token", &mask(self.csrf_token().is_some()))
            .field("bearer_token", &mask(self.bearer_token().is_some()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let credentials = Credentials::new();
        assert!(credentials.csrf_token().is_none());
        assert!(credentials.bearer_token().is_none());
    }

    #[test]
    fn csrf_token_last_write_wins() {
        let credentials = Credentials::new();
        credentials.set_csrf_token(SecretString::from("first".to_string()));
        credentials.set_csrf_token(SecretString::from("second".to_string()));
        assert!(credentials.csrf_matches("second"));
        assert!(!credentials.csrf_matches("first"));
    }

    #[test]
    fn clear_drops_both_tokens() {
        let credentials = Credentials::new();
        credentials.set_csrf_token(SecretString::from("csrf".to_string()));
        credentials.set_bearer_token(SecretString::from("bearer".to_string()));
        credentials.clear();
        assert!(credentials.csrf_token().is_none());
        assert!(credentials.bearer_token().is_none());
    }

    #[test]
    fn debug_masks_values() {
        let credentials = Credentials::new();
        credentials.set_bearer_token(SecretString::from("super-secret".to_string()));
        let rendered = format!("{credentials:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("***"));
        assert!(rendered.contains("<none>"));
    }
}
