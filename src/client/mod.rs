//! Authenticated HTTP client for the registry console API.
//!
//! Request path:
//! - make sure a CSRF token is cached (`GET /csrf_token` otherwise);
//! - with an embedding host, make sure a bearer token is cached;
//! - attach `X-CSRF-Token` and `Authorization: Bearer`.
//!
//! Response path:
//! - 2xx with `x-next-csrf-token`: rotate the cached CSRF token;
//! - 401 + `fresh_login_required`: park the request until the queue is drained;
//! - plain 401: refresh the host token, or redirect to `/signin`;
//! - anything else goes back to the caller untouched.
//!
//! Concurrent requests issued before the first CSRF token arrives each fetch
//! their own; the last response wins.

pub mod credentials;
pub mod error;
pub mod fresh_login;
pub mod host;
pub mod request;

pub use self::credentials::Credentials;
pub use self::error::{ClientError, HttpFailure};
pub use self::fresh_login::{FreshLoginListener, FreshLoginRequired};
pub use self::host::{
    BearerTokenProvider, CommandTokenProvider, LogNavigator, SessionNavigator,
    StaticTokenProvider,
};
pub use self::request::{ApiResponse, HttpMethod, RequestDescriptor};

use self::{
    error::{INVALID_VERIFICATION, VERIFICATION_CANCELED},
    fresh_login::{PendingRequest, PendingRequests},
    request::{collect_headers, decode_body},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{sync::Arc, time::Duration};
use tokio::runtime::Handle;
use tracing::{Instrument, debug, info_span, warn};
use url::Url;

pub const CSRF_TOKEN_PATH: &str = "/csrf_token";
pub const SIGNIN_PATH: &str = "/signin";
pub const VERIFY_USER_PATH: &str = "/api/v1/signin/verify";

pub const CSRF_HEADER: &str = "X-CSRF-Token";
pub const NEXT_CSRF_HEADER: &str = "x-next-csrf-token";

/// Default request timeout applied to every call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Deserialize)]
struct CsrfTokenResponse {
    csrf_token: String,
}

#[derive(Serialize)]
struct VerifyUserRequest<'a> {
    password: &'a str,
}

/// Cheap to clone; clones share credentials and the pending queue.
#[derive(Clone)]
pub struct ConsoleClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    pending: PendingRequests,
    token_provider: Option<Arc<dyn BearerTokenProvider>>,
    navigator: Arc<dyn SessionNavigator>,
}

pub struct ConsoleClientBuilder {
    base_url: String,
    user_agent: String,
    timeout: Duration,
    token_provider: Option<Arc<dyn BearerTokenProvider>>,
    navigator: Option<Arc<dyn SessionNavigator>>,
    listener: Option<Arc<dyn FreshLoginListener>>,
}

impl ConsoleClientBuilder {
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs the client as if embedded in a host that hands out bearer tokens.
    #[must_use]
    pub fn bearer_token_provider(mut self, provider: Arc<dyn BearerTokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn SessionNavigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    #[must_use]
    pub fn fresh_login_listener(mut self, listener: Arc<dyn FreshLoginListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// # Errors
    /// Returns an error if the base URL is not http(s) or the HTTP client cannot be built.
    pub fn build(self) -> Result<ConsoleClient, ClientError> {
        let base_url = parse_base_url(&self.base_url)?;

        let http = reqwest::Client::builder()
            .user_agent(self.user_agent)
            .cookie_store(true)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(self.timeout)
            .build()?;

        Ok(ConsoleClient {
            inner: Arc::new(Inner {
                http,
                base_url,
                credentials: Credentials::new(),
                pending: PendingRequests::new(self.listener),
                token_provider: self.token_provider,
                navigator: self.navigator.unwrap_or_else(|| Arc::new(LogNavigator)),
            }),
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw.trim()).map_err(|err| ClientError::InvalidUrl(format!("{raw}: {err}")))?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(ClientError::InvalidUrl(format!(
                "{raw}: unsupported scheme {scheme}"
            )));
        }
    }

    if url.host().is_none() {
        return Err(ClientError::InvalidUrl(format!("{raw}: no host specified")));
    }

    Ok(url)
}

/// Joins the base URL and an API path, keeping any path prefix on the base.
fn build_url(base_url: &Url, path: &str) -> Result<Url, ClientError> {
    let base = base_url.as_str().trim_end_matches('/');
    let path = path.trim();

    let joined = if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    };

    Url::parse(&joined).map_err(|err| ClientError::InvalidUrl(format!("{joined}: {err}")))
}

impl ConsoleClient {
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> ConsoleClientBuilder {
        ConsoleClientBuilder {
            base_url: base_url.into(),
            user_agent: crate::APP_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            token_provider: None,
            navigator: None,
            listener: None,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.inner.token_provider.is_some()
    }

    /// Number of requests waiting for a fresh login.
    #[must_use]
    pub fn pending_fresh_login(&self) -> usize {
        self.inner.pending.len()
    }

    /// Sends `request` with session credentials attached.
    ///
    /// A `401 fresh_login_required` does not fail the call: the request is
    /// parked and this future resolves once [`Self::replay_all`] re-sends it
    /// (or [`Self::cancel_all`] rejects it).
    ///
    /// # Errors
    /// Returns the HTTP failure or transport error for the request, a
    /// credential fetch error, or `FreshLoginCancelled` if the user cancelled.
    pub async fn send(&self, request: RequestDescriptor) -> Result<ApiResponse, ClientError> {
        match self.dispatch(&request).await {
            Err(ClientError::Http(failure)) if failure.is_fresh_login_required() => {
                warn!(
                    "fresh login required for {} {}",
                    request.method, request.path
                );
                self.defer(request).await
            }
            Err(ClientError::Http(failure)) if failure.is_unauthorized() => {
                self.session_expired().await?;
                Err(ClientError::Http(failure))
            }
            result => result,
        }
    }

    async fn defer(&self, request: RequestDescriptor) -> Result<ApiResponse, ClientError> {
        let receiver = self.inner.pending.enqueue(request);
        receiver.await.map_err(|_| ClientError::ReplayDropped)?
    }

    async fn session_expired(&self) -> Result<(), ClientError> {
        if let Some(provider) = &self.inner.token_provider {
            debug!("session expired, refreshing bearer token");
            let token = provider.token().await.map_err(ClientError::BearerToken)?;
            self.inner.credentials.set_bearer_token(token);
        } else {
            // The server-side session is gone, its tokens with it.
            self.inner.credentials.clear();
            self.inner.navigator.redirect(SIGNIN_PATH);
        }
        Ok(())
    }

    /// Re-sends every parked request; each result goes to its original caller.
    /// Replays run on the runtime the caller was parked from, so this may be
    /// called from any thread. Returns how many requests were replayed.
    pub fn replay_all(&self) -> usize {
        let entries = self.inner.pending.drain();
        let count = entries.len();

        for entry in entries {
            let PendingRequest {
                id,
                request,
                responder,
                runtime,
            } = entry;

            // May be called from a thread outside any runtime.
            let Some(runtime) = runtime.or_else(|| Handle::try_current().ok()) else {
                warn!("no runtime available to replay queued request {id}");
                let _ = responder.send(Err(ClientError::ReplayDropped));
                continue;
            };

            let client = self.clone();
            debug!("replaying queued request {id}");
            runtime.spawn(async move {
                let result = client.send(request).await;
                // The caller may have given up already.
                let _ = responder.send(result);
            });
        }

        count
    }

    /// Rejects every parked request with a cancellation error.
    /// Returns how many requests were rejected.
    pub fn cancel_all(&self) -> usize {
        self.inner.pending.reject_all(VERIFICATION_CANCELED)
    }

    /// Verifies the user's password, then replays the queue. When the
    /// password is rejected the queue is cancelled instead.
    ///
    /// # Errors
    /// Returns the verification failure after rejecting the queue.
    pub async fn verify_fresh_login(&self, password: &SecretString) -> Result<usize, ClientError> {
        let body = serde_json::to_value(VerifyUserRequest {
            password: password.expose_secret(),
        })
        .map_err(|err| ClientError::Decode(err.to_string()))?;

        match self
            .dispatch(&RequestDescriptor::post(VERIFY_USER_PATH, body))
            .await
        {
            Ok(_) => Ok(self.replay_all()),
            Err(err) => {
                warn!("fresh login verification failed: {}", err);
                self.inner.pending.reject_all(INVALID_VERIFICATION);
                Err(err)
            }
        }
    }

    /// Fetches a new CSRF token and caches it.
    ///
    /// # Errors
    /// Returns `ClientError::CsrfToken` if the endpoint fails or answers without a token.
    pub async fn refresh_csrf_token(&self) -> Result<(), ClientError> {
        let url = build_url(&self.inner.base_url, CSRF_TOKEN_PATH)?;

        let span = info_span!("console.csrf_token", http.method = "GET", url = %url);
        let response = self
            .inner
            .http
            .get(url)
            .send()
            .instrument(span)
            .await
            .map_err(|err| ClientError::CsrfToken(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::CsrfToken(format!("unexpected status {status}")));
        }

        let token: CsrfTokenResponse = response
            .json()
            .await
            .map_err(|err| ClientError::CsrfToken(err.to_string()))?;

        debug!("fetched CSRF token");
        self.inner
            .credentials
            .set_csrf_token(SecretString::from(token.csrf_token));

        Ok(())
    }

    async fn ensure_credentials(&self) -> Result<(), ClientError> {
        if self.inner.credentials.csrf_token().is_none() {
            self.refresh_csrf_token().await?;
        }

        if let Some(provider) = &self.inner.token_provider {
            if self.inner.credentials.bearer_token().is_none() {
                debug!("fetching bearer token from host");
                let token = provider.token().await.map_err(ClientError::BearerToken)?;
                self.inner.credentials.set_bearer_token(token);
            }
        }

        Ok(())
    }

    /// One round trip: credentials in, rotation out, no queueing.
    async fn dispatch(&self, request: &RequestDescriptor) -> Result<ApiResponse, ClientError> {
        self.ensure_credentials().await?;

        let url = build_url(&self.inner.base_url, &request.path)?;
        let mut builder = self
            .inner
            .http
            .request(request.method.as_reqwest(), url.clone());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(token) = self.inner.credentials.csrf_token() {
            builder = builder.header(CSRF_HEADER, token.expose_secret());
        }

        if let Some(token) = self.inner.credentials.bearer_token() {
            builder = builder.bearer_auth(token.expose_secret());
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let span = info_span!(
            "console.request",
            http.method = %request.method,
            url = %url
        );
        let response = builder.send().instrument(span).await?;

        let status = response.status();
        let headers = collect_headers(response.headers());
        let raw = response.text().await?;
        let body = decode_body(&raw);

        debug!("{} {} -> {}", request.method, request.path, status);

        if !status.is_success() {
            return Err(ClientError::Http(HttpFailure {
                status: status.as_u16(),
                headers,
                body,
            }));
        }

        // An empty rotation header keeps the current token.
        if let Some(next) = headers
            .get(NEXT_CSRF_HEADER)
            .filter(|next| !next.trim().is_empty())
        {
            debug!("rotating CSRF token");
            self.inner
                .credentials
                .set_csrf_token(SecretString::from(next.clone()));
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }

    /// # Errors
    /// See [`Self::send`]; also fails if the body does not decode into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(RequestDescriptor::get(path)).await?.json()
    }

    /// # Errors
    /// See [`Self::send`]; also fails if the body does not decode into `T`.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = serde_json::to_value(body).map_err(|err| ClientError::Decode(err.to_string()))?;
        self.send(RequestDescriptor::post(path, body)).await?.json()
    }

    /// # Errors
    /// See [`Self::send`]; also fails if the body does not decode into `T`.
    pub async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let body = serde_json::to_value(body).map_err(|err| ClientError::Decode(err.to_string()))?;
        self.send(RequestDescriptor::put(path, body)).await?.json()
    }

    /// # Errors
    /// See [`Self::send`].
    pub async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send(RequestDescriptor::delete(path)).await.map(|_| ())
    }
}

impl std::fmt::Debug for ConsoleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("credentials", &self.inner.credentials)
            .field("embedded", &self.is_embedded())
            .field("pending_fresh_login", &self.pending_fresh_login())
            .finish_non_exhaustive()
    }
}
