use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::{PipelineError, TransportError};
use crate::model::RawDocument;
use crate::resilience::{retry, RetryPolicy};

/// One request/response exchange with an upstream source.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String, TransportError>;
}

/// reqwest-backed transport. Sends the configured User-Agent on every request.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(HttpTransport { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        // Drop the URL from transport errors; weather URLs carry the API key.
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.without_url()))
    }
}

#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Fetcher { transport, policy }
    }

    /// Retrieve one document, retrying with linear backoff.
    pub async fn fetch(&self, url: &str) -> Result<RawDocument, PipelineError> {
        let label = redact(url);
        let body = retry(&self.policy, label, |_| self.transport.get_text(url))
            .await
            .map_err(|cause| PipelineError::FetchFailure {
                url: label.to_string(),
                attempts: self.policy.attempts(),
                cause,
            })?;

        info!("Fetched {} ({} bytes)", label, body.len());
        Ok(RawDocument::new(label, body))
    }
}

/// Strip the query string so credentials never reach logs or errors.
pub fn redact(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn exhausts_attempts_then_reports_last_cause() {
        let transport = Arc::new(ScriptedTransport::failing(503));
        let fetcher = Fetcher::new(transport.clone(), instant_policy());
        let err = fetcher.fetch("https://example.test/").await.unwrap_err();
        assert_eq!(transport.calls(), 3);
        match err {
            PipelineError::FetchFailure { attempts, cause, .. } => {
                assert_eq!(attempts, 3);
                assert!(matches!(cause, TransportError::Status(503)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn success_returns_document_with_redacted_source() {
        let transport = Arc::new(ScriptedTransport::serving("<table></table>"));
        let fetcher = Fetcher::new(transport.clone(), instant_policy());
        let doc = fetcher
            .fetch("https://api.example.test/weather?q=Pokhara&appid=secret")
            .await
            .unwrap();
        assert_eq!(transport.calls(), 1);
        assert_eq!(doc.body, "<table></table>");
        assert_eq!(doc.source, "https://api.example.test/weather");
    }

    async fn local_upstream() -> std::net::SocketAddr {
        use axum::http::{HeaderMap, StatusCode};
        use axum::routing::get;

        let app = axum::Router::new()
            .route(
                "/ua",
                get(|headers: HeaderMap| async move {
                    headers
                        .get("user-agent")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string()
                }),
            )
            .route("/down", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }

    #[tokio::test]
    async fn http_transport_sends_user_agent() {
        let addr = local_upstream().await;
        let transport = HttpTransport::new("agro-feeds-test/1.0", Duration::from_secs(5)).unwrap();
        let body = transport.get_text(&format!("http://{addr}/ua")).await.unwrap();
        assert_eq!(body, "agro-feeds-test/1.0");
    }

    #[tokio::test]
    async fn http_transport_maps_status_and_hides_query() {
        let addr = local_upstream().await;
        let transport = Arc::new(HttpTransport::new("agro-feeds-test/1.0", Duration::from_secs(5)).unwrap());
        let url = format!("http://{addr}/down?appid=secret-key");

        let err = transport.get_text(&url).await.unwrap_err();
        assert!(matches!(err, TransportError::Status(503)));

        let err = Fetcher::new(transport, instant_policy()).fetch(&url).await.unwrap_err();
        let shown = err.to_string();
        assert!(shown.contains("/down"), "{shown}");
        assert!(!shown.contains("secret-key"), "{shown}");
    }

    #[tokio::test]
    async fn http_transport_connect_error_hides_query() {
        // Bind then drop to get a port nothing listens on.
        let addr = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let transport = HttpTransport::new("agro-feeds-test/1.0", Duration::from_secs(5)).unwrap();
        let err = transport
            .get_text(&format!("http://{addr}/weather?appid=secret-key"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Request(_)));
        assert!(!err.to_string().contains("secret-key"));
        assert!(!format!("{err:?}").contains("secret-key"));
    }

    #[test]
    fn redact_keeps_plain_urls() {
        assert_eq!(redact("https://kalimatimarket.gov.np/"), "https://kalimatimarket.gov.np/");
        assert_eq!(redact("https://x.test/a?key=1"), "https://x.test/a");
    }
}
