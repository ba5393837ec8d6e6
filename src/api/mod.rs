// API client module: a small blocking HTTP client for the VM backend. All
// calls go through one request helper that turns transport failures and
// non-2xx answers into an `HttpFailure`; each resource module then maps that
// failure to its own error variant.

mod auth;
pub mod retry;
mod users;
mod vms;

pub use auth::AuthApi;
pub use retry::RetryPolicy;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, HttpFailure, Result};

/// Blocking API client holding the HTTP client, the base URL and an optional
/// bearer token for authenticated calls.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.has_token())
            .finish()
    }
}

/// A successful answer: status plus raw body text.
struct Answer {
    status: StatusCode,
    body: String,
}

impl ApiClient {
    /// Build a client from the shared configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(Error::HttpClient)?;
        debug!(base_url = %config.base_url, timeout_secs = config.timeout.as_secs(), "API client ready");
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    /// Replace the retry policy, e.g. to shorten delays.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Store a token for subsequent authenticated requests.
    pub fn set_token(&mut self, token: &str) {
        debug!(token_length = token.len(), "token set on API client");
        self.token = Some(token.to_string());
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub(crate) fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The token, or a token error naming the operation that needed it.
    pub(crate) fn require_token(&self, operation: &str) -> Result<&str> {
        self.token()
            .ok_or_else(|| Error::Token(format!("{operation} requires an authentication token")))
    }

    /// Send one request, retrying on 429, and return the raw success body.
    fn send<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        bearer: Option<&str>,
    ) -> std::result::Result<Answer, HttpFailure>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let label = format!("{method} {path}");
        self.retry.run(&label, || {
            debug!(%method, %url, authenticated = bearer.is_some(), "API request");
            let mut req = self.client.request(method.clone(), &url);
            if let Some(token) = bearer {
                req = req.bearer_auth(token);
            }
            if let Some(body) = body {
                req = req.json(body);
            }
            let res = req.send().map_err(|e| HttpFailure::transport(&e))?;
            let status = res.status();
            let text = res.text().map_err(|e| HttpFailure::transport(&e))?;
            if !status.is_success() {
                debug!(%method, %url, %status, "API request rejected");
                return Err(HttpFailure::from_status(status, &text));
            }
            Ok(Answer { status, body: text })
        })
    }

    /// Send and decode a JSON body.
    fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        bearer: Option<&str>,
    ) -> std::result::Result<T, HttpFailure>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let answer = self.send(method, path, body, bearer)?;
        decode(&answer)
    }
}

fn decode<T: DeserializeOwned>(answer: &Answer) -> std::result::Result<T, HttpFailure> {
    serde_json::from_str(&answer.body).map_err(|e| {
        let mut failure = HttpFailure::from_status(answer.status, &answer.body);
        failure.reason = format!("unexpected response body: {e}");
        failure
    })
}

/// Stand-in body type for requests without a payload.
type NoBody = serde_json::Value;

const NO_BODY: Option<&NoBody> = None;
