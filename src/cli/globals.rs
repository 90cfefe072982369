use crate::client::{
    CommandTokenProvider, ConsoleClient, ConsoleClientBuilder, FreshLoginListener,
    StaticTokenProvider,
};
use anyhow::Result;
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};

/// Connection settings shared by every action.
#[derive(Clone)]
pub struct GlobalArgs {
    pub url: String,
    pub timeout: Duration,
    pub bearer_token: Option<SecretString>,
    pub token_command: Option<String>,
    pub password: Option<SecretString>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(url: String) -> Self {
        Self {
            url,
            timeout: crate::client::DEFAULT_TIMEOUT,
            bearer_token: None,
            token_command: None,
            password: None,
        }
    }

    /// True when a bearer-token source is configured (embedded mode).
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.bearer_token.is_some() || self.token_command.is_some()
    }

    fn builder(&self) -> ConsoleClientBuilder {
        let builder = ConsoleClient::builder(&self.url).timeout(self.timeout);

        if let Some(command) = &self.token_command {
            builder.bearer_token_provider(Arc::new(CommandTokenProvider::new(command.clone())))
        } else if let Some(token) = &self.bearer_token {
            builder.bearer_token_provider(Arc::new(StaticTokenProvider::new(token.clone())))
        } else {
            builder
        }
    }

    /// Build a client wired to `listener` for fresh-login prompts.
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn client(&self, listener: Arc<dyn FreshLoginListener>) -> Result<ConsoleClient> {
        Ok(self.builder().fresh_login_listener(listener).build()?)
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "***"))
            .field("token_command", &self.token_command)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::client::FreshLoginRequired;
    use tokio::sync::mpsc;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new("https://quay.example.com".to_string());
        assert_eq!(args.url, "https://quay.example.com");
        assert_eq!(args.timeout, crate::client::DEFAULT_TIMEOUT);
        assert!(!args.is_embedded());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut args = GlobalArgs::new("https://quay.example.com".to_string());
        args.bearer_token = Some(SecretString::from("sha256~secret".to_string()));
        args.password = Some(SecretString::from("hunter2".to_string()));
        let rendered = format!("{args:?}");
        assert!(!rendered.contains("sha256~secret"));
        assert!(!rendered.contains("hunter2"));
        assert!(args.is_embedded());
    }

    #[test]
    fn test_client_embedded_with_token_command() {
        let mut args = GlobalArgs::new("https://quay.example.com".to_string());
        args.token_command = Some("oc whoami -t".to_string());
        let (sender, _events) = mpsc::unbounded_channel::<FreshLoginRequired>();
        let client = args.client(Arc::new(sender)).unwrap();
        assert!(client.is_embedded());
    }

    #[test]
    fn test_client_rejects_invalid_url() {
        let args = GlobalArgs::new("quay.example.com".to_string());
        let (sender, _events) = mpsc::unbounded_channel::<FreshLoginRequired>();
        assert!(args.client(Arc::new(sender)).is_err());
    }
}
