//! Seams between the client and whatever hosts it.
//!
//! - [`BearerTokenProvider`]: an embedding host that hands out delegated
//!   bearer tokens. When one is configured, every request carries
//!   `Authorization: Bearer` and a plain `401` refreshes the token.
//! - [`SessionNavigator`]: what to do when the session is gone and there is
//!   no host to refresh it, typically "go to the sign-in page".

use super::error::BoxError;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::process::Command;
use tracing::{debug, warn};

/// Source of bearer tokens provided by an embedding host.
///
/// Implementations must never log or expose token values in errors.
#[async_trait]
pub trait BearerTokenProvider: Send + Sync {
    /// Returns a currently valid bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot provide a token. The error is
    /// surfaced to the request that needed it; the client does not retry.
    async fn token(&self) -> Result<SecretString, BoxError>;
}

/// Hands out the same token every time.
pub struct StaticTokenProvider {
    token: SecretString,
}

impl StaticTokenProvider {
    #[must_use]
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

#[async_trait]
impl BearerTokenProvider for StaticTokenProvider {
    async fn token(&self) -> Result<SecretString, BoxError> {
        if self.token.expose_secret().trim().is_empty() {
            return Err("bearer token is empty".into());
        }
        Ok(self.token.clone())
    }
}

/// Runs a shell command (for example `oc whoami -t`) and uses its trimmed
/// stdout as the token. The command runs again on every refresh.
pub struct CommandTokenProvider {
    command: String,
}

impl CommandTokenProvider {
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[async_trait]
impl BearerTokenProvider for CommandTokenProvider {
    async fn token(&self) -> Result<SecretString, BoxError> {
        debug!("running token command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(format!("token command exited with {}", output.status).into());
        }

        let token = String::from_utf8(output.stdout)?.trim().to_string();
        if token.is_empty() {
            return Err("token command printed nothing".into());
        }

        Ok(SecretString::from(token))
    }
}

/// Receives the location the user should be sent to when the session expired.
pub trait SessionNavigator: Send + Sync {
    fn redirect(&self, location: &str);
}

/// Default navigator for headless use: there is no page to leave, so it only
/// records where the user should sign in again.
#[derive(Debug, Default)]
pub struct LogNavigator;

impl SessionNavigator for LogNavigator {
    fn redirect(&self, location: &str) {
        warn!("session expired, sign in again at {}", location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_returns_token() -> Result<(), BoxError> {
        let provider = StaticTokenProvider::new(SecretString::from("abc".to_string()));
        let token = provider.token().await?;
        assert_eq!(token.expose_secret(), "abc");
        Ok(())
    }

    #[tokio::test]
    async fn static_provider_rejects_empty_token() {
        let provider = StaticTokenProvider::new(SecretString::from("  ".to_string()));
        assert!(provider.token().await.is_err());
    }

    #[tokio::test]
    async fn command_provider_trims_stdout() -> Result<(), BoxError> {
        let provider = CommandTokenProvider::new("printf '  sha256~token\\n'");
        let token = provider.token().await?;
        assert_eq!(token.expose_secret(), "sha256~token");
        Ok(())
    }

    #[tokio::test]
    async fn command_provider_fails_on_exit_status() {
        let provider = CommandTokenProvider::new("exit 3");
        let err = provider.token().await.err();
        assert!(err.is_some_and(|err| err.to_string().contains("exited")));
    }

    #[tokio::test]
    async fn command_provider_fails_on_empty_output() {
        let provider = CommandTokenProvider::new("true");
        let err = provider.token().await.err();
        assert!(err.is_some_and(|err| err.to_string().contains("printed nothing")));
    }
}
