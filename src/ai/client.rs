use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ai::request::ChatRequest;
use crate::ai::response::{self, AiOutcome, ChatCompletion};
use crate::config::AiConfig;

/// Classified outbound failure. Timeouts, connection failures (reqwest folds
/// DNS resolution into these) and 5xx statuses are transient; everything
/// else propagates immediately.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to read upstream response: {0}")]
    Body(String),

    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connect(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Body(_) | Self::Other(_) => false,
        }
    }

    pub fn kind(&self) -> String {
        match self {
            Self::Timeout(_) => "API_TIMEOUT".into(),
            Self::Connect(_) => "API_CONNECTION".into(),
            Self::Status { status, .. } => format!("HTTP_{status}"),
            Self::Body(_) => "API_BAD_RESPONSE".into(),
            Self::Other(_) => "UNKNOWN_ERROR".into(),
        }
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(
        &self,
        request: &ChatRequest,
        api_key: &str,
    ) -> Result<ChatCompletion, TransportError>;
}

pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client should build");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(
        &self,
        request: &ChatRequest,
        api_key: &str,
    ) -> Result<ChatCompletion, TransportError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(classify_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<ChatCompletion>()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))
    }
}

fn classify_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

/// Exponential backoff with jitter. Delay before retry `n` (1-indexed) is
/// `min(base * 2^n + uniform(0, base), cap)`; a zero base therefore yields
/// zero delays, which is what the tests run with.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let exp = base_ms.saturating_mul(2u64.saturating_pow(retry));
        let jitter = match base_ms {
            0 => 0,
            ms => rand::thread_rng().gen_range(0..ms),
        };
        let capped = (exp.saturating_add(jitter)).min(self.max_delay.as_millis() as u64);
        Duration::from_millis(capped)
    }
}

#[derive(Debug, Error)]
pub enum AiError {
    #[error("no AI API key available; supply one in the Authorization header or set AI_API_KEY")]
    MissingKey,

    #[error("{kind}: {message}")]
    Upstream { kind: String, message: String },
}

/// Chat-completion client: resolves credentials, sends through the
/// transport with bounded retries, and normalizes the result. Constructed
/// once at startup and injected through `AppState`.
pub struct AiClient {
    transport: Arc<dyn ChatTransport>,
    default_key: Option<String>,
    default_model: String,
    retry: RetryPolicy,
}

impl AiClient {
    pub fn new(config: &AiConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(
            &config.base_url,
            Duration::from_secs(config.request_timeout_secs),
        ));
        Self {
            transport,
            default_key: config.api_key.clone(),
            default_model: config.default_model.clone(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_transport(
        transport: Arc<dyn ChatTransport>,
        default_key: Option<String>,
        default_model: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            default_key,
            default_model: default_model.into(),
            retry,
        }
    }

    /// A per-request key overrides the configured default; with neither
    /// available the call fails closed before anything is sent.
    pub fn resolve_key(&self, override_key: Option<&str>) -> Result<String, AiError> {
        override_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_owned)
            .or_else(|| {
                self.default_key
                    .as_deref()
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_owned)
            })
            .ok_or(AiError::MissingKey)
    }

    pub fn resolve_model(&self, override_model: Option<&str>) -> String {
        override_model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.default_model)
            .to_string()
    }

    pub async fn chat(
        &self,
        request: &ChatRequest,
        api_key_override: Option<&str>,
    ) -> Result<AiOutcome, AiError> {
        let key = self.resolve_key(api_key_override)?;

        let mut attempt: u32 = 0;
        loop {
            match self.transport.send(request, &key).await {
                Ok(completion) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "AI request succeeded after retries");
                    }
                    return Ok(response::normalize(completion));
                }
                Err(err) => {
                    attempt += 1;
                    if !err.is_transient() || attempt > self.retry.max_retries {
                        return Err(AiError::Upstream {
                            kind: err.kind(),
                            message: err.to_string(),
                        });
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        attempt,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient AI request failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl std::fmt::Debug for AiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiClient")
            .field("default_key", &"[REDACTED]")
            .field("default_model", &self.default_model)
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::response::{Choice, ChoiceMessage};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn ok_completion(content: &str) -> ChatCompletion {
        ChatCompletion {
            choices: vec![Choice {
                message: ChoiceMessage {
                    content: Some(content.to_string()),
                },
                finish_reason: Some("stop".to_string()),
            }],
            error: None,
        }
    }

    /// Pops scripted failures in order, then succeeds.
    struct FlakyTransport {
        failures: Mutex<Vec<TransportError>>,
        calls: AtomicU32,
    }

    impl FlakyTransport {
        fn new(failures: Vec<TransportError>) -> Self {
            Self {
                failures: Mutex::new(failures),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatTransport for FlakyTransport {
        async fn send(
            &self,
            _request: &ChatRequest,
            _api_key: &str,
        ) -> Result<ChatCompletion, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut failures = self.failures.lock().unwrap();
            if failures.is_empty() {
                Ok(ok_completion(r#"{"ok": true}"#))
            } else {
                Err(failures.remove(0))
            }
        }
    }

    fn zero_delay_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn client_with(
        transport: Arc<dyn ChatTransport>,
        default_key: Option<&str>,
    ) -> AiClient {
        AiClient::with_transport(
            transport,
            default_key.map(str::to_owned),
            "test-model",
            zero_delay_policy(),
        )
    }

    fn status(status: u16) -> TransportError {
        TransportError::Status {
            status,
            body: "err".into(),
        }
    }

    #[tokio::test]
    async fn retries_503_three_times_then_succeeds() {
        let transport = Arc::new(FlakyTransport::new(vec![
            status(503),
            status(503),
            status(503),
        ]));
        let client = client_with(transport.clone(), Some("key"));
        let request = ChatRequest::itinerary("3 days in Oslo", "test-model");

        let outcome = client.chat(&request, None).await.expect("should succeed");
        assert_eq!(
            outcome,
            AiOutcome::Success(serde_json::json!({ "ok": true }))
        );
        assert_eq!(transport.calls(), 4);
    }

    #[tokio::test]
    async fn exhausts_retries_and_surfaces_last_error() {
        let transport = Arc::new(FlakyTransport::new(vec![
            status(500),
            status(502),
            status(503),
            status(504),
        ]));
        let client = client_with(transport.clone(), Some("key"));
        let request = ChatRequest::question("anything", None, "test-model");

        let err = client.chat(&request, None).await.unwrap_err();
        assert_eq!(transport.calls(), 4);
        match err {
            AiError::Upstream { kind, message } => {
                assert_eq!(kind, "HTTP_504");
                assert!(message.contains("504"));
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let transport = Arc::new(FlakyTransport::new(vec![status(400)]));
        let client = client_with(transport.clone(), Some("key"));
        let request = ChatRequest::question("anything", None, "test-model");

        let err = client.chat(&request, None).await.unwrap_err();
        assert_eq!(transport.calls(), 1);
        assert!(matches!(err, AiError::Upstream { kind, .. } if kind == "HTTP_400"));
    }

    #[tokio::test]
    async fn timeouts_are_retried() {
        let transport = Arc::new(FlakyTransport::new(vec![
            TransportError::Timeout("deadline".into()),
            TransportError::Connect("refused".into()),
        ]));
        let client = client_with(transport.clone(), Some("key"));
        let request = ChatRequest::question("anything", None, "test-model");

        client.chat(&request, None).await.expect("should succeed");
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn missing_key_fails_closed_without_sending() {
        let transport = Arc::new(FlakyTransport::new(vec![]));
        let client = client_with(transport.clone(), None);
        let request = ChatRequest::question("anything", None, "test-model");

        let err = client.chat(&request, None).await.unwrap_err();
        assert!(matches!(err, AiError::MissingKey));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn key_resolution_prefers_request_override() {
        let client = client_with(Arc::new(FlakyTransport::new(vec![])), Some("env-key"));
        assert_eq!(client.resolve_key(Some("header-key")).unwrap(), "header-key");
        assert_eq!(client.resolve_key(None).unwrap(), "env-key");
        // Blank overrides fall through to the default
        assert_eq!(client.resolve_key(Some("  ")).unwrap(), "env-key");
    }

    #[test]
    fn model_resolution_prefers_request_override() {
        let client = client_with(Arc::new(FlakyTransport::new(vec![])), Some("k"));
        assert_eq!(client.resolve_model(Some("qwen-max")), "qwen-max");
        assert_eq!(client.resolve_model(None), "test-model");
        assert_eq!(client.resolve_model(Some("")), "test-model");
    }

    #[test]
    fn backoff_grows_exponentially_with_bounded_jitter() {
        let policy = RetryPolicy::default();
        for retry in 1..=3u32 {
            let expected_base = 1000u64 * 2u64.pow(retry);
            let delay = policy.delay_for(retry).as_millis() as u64;
            assert!(delay >= expected_base.min(10_000));
            assert!(delay <= (expected_base + 1000).min(10_000));
        }
        // Three scheduled delays stay under the ~19s envelope
        let worst: u64 = (1..=3u32)
            .map(|r| (1000u64 * 2u64.pow(r) + 1000).min(10_000))
            .sum();
        assert!(worst < 19_000);
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert!(policy.delay_for(10) <= Duration::from_millis(10_000));
    }

    #[test]
    fn transient_classification() {
        assert!(TransportError::Timeout("t".into()).is_transient());
        assert!(TransportError::Connect("c".into()).is_transient());
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(!status(400).is_transient());
        assert!(!status(401).is_transient());
        assert!(!TransportError::Body("b".into()).is_transient());
    }
}
