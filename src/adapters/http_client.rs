use {
    crate::domain::error::CheckoutError,
    reqwest::{Client, Method, StatusCode},
    serde::de::DeserializeOwned,
    std::time::Duration,
};

/// Thin JSON client shared by the HTTP-based rails.
///
/// Sends exactly once. Retrying is the caller's business: the confirmation
/// poller already spends attempts on transient failures, and an initiation
/// must never be replayed behind the shopper's back.
#[derive(Clone)]
pub struct ProviderHttpClient {
    client: Client,
    provider: &'static str,
}

impl ProviderHttpClient {
    pub fn new(provider: &'static str, timeout: Duration) -> Result<Self, CheckoutError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            CheckoutError::provider(provider, format!("failed to build HTTP client: {e}"), false)
        })?;
        Ok(Self { client, provider })
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        bearer_token: Option<&str>,
        body: Option<&serde_json::Value>,
    ) -> Result<T, CheckoutError> {
        let mut request = self.client.request(method, url);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(|e| {
            // Connect errors and timeouts never reached the provider's logic.
            CheckoutError::provider(self.provider, format!("request failed: {e}"), true)
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            CheckoutError::provider(self.provider, format!("reading body failed: {e}"), true)
        })?;

        if !status.is_success() {
            return Err(CheckoutError::provider(
                self.provider,
                format!("HTTP {status}: {}", truncate(&text, 512)),
                is_retryable_status(status),
            ));
        }

        serde_json::from_str::<T>(&text).map_err(|e| {
            CheckoutError::provider(
                self.provider,
                format!("invalid JSON response: {e}"),
                false,
            )
        })
    }

    /// Form-encoded POST with basic auth, for APIs that predate JSON bodies.
    pub async fn post_form(
        &self,
        url: &str,
        basic_auth: (&str, &str),
        form: &[(&str, &str)],
    ) -> Result<serde_json::Value, CheckoutError> {
        let response = self
            .client
            .post(url)
            .basic_auth(basic_auth.0, Some(basic_auth.1))
            .form(form)
            .send()
            .await
            .map_err(|e| {
                CheckoutError::provider(self.provider, format!("request failed: {e}"), true)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CheckoutError::provider(
                self.provider,
                format!("HTTP {status}: {}", truncate(&text, 512)),
                is_retryable_status(status),
            ));
        }
        response.json().await.map_err(|e| {
            CheckoutError::provider(self.provider, format!("invalid JSON response: {e}"), false)
        })
    }
}

pub fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
