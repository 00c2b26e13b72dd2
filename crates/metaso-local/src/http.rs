use std::sync::Arc;
use std::time::Instant;

use metaso_core::payload::{ACCEPT_JSON, ACCEPT_TEXT};
use metaso_core::{mask_secret, Config, Error, Result, StatusError, Upstream, UpstreamPayload};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;

use crate::retry::{run_with_retry, RetryPolicy, Sleep, TokioSleep};

/// Authenticated client for the Metaso API.
///
/// Holds no per-call state: clones share the connection pool and the immutable config, so one
/// instance can serve any number of concurrent tool calls.
#[derive(Clone)]
pub struct MetasoHttpClient {
    client: reqwest::Client,
    config: Arc<Config>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleep>,
}

impl MetasoHttpClient {
    pub fn new(config: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("metaso-mcp/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Setup(e.to_string()))?;
        Ok(Self {
            client,
            config: Arc::new(config),
            policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleep),
        })
    }

    pub fn with_sleep(mut self, sleeper: Arc<dyn Sleep>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn post(&self, path: &str, body: &Value, accept: &str) -> Result<Value> {
        self.send(Method::POST, path, Some(body), accept).await
    }

    pub async fn get(&self, path: &str, accept: &str) -> Result<Value> {
        self.send(Method::GET, path, None, accept).await
    }

    /// Send with retry. See [`RetryPolicy`] for the schedule; 4xx other than 429 is final.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        accept: &str,
    ) -> Result<Value> {
        let url = self.url_for(path);
        run_with_retry(&self.policy, self.sleeper.as_ref(), |attempt| {
            self.send_once(&method, &url, body, accept, attempt)
        })
        .await
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.config.base_url, path)
        } else {
            format!("{}/{}", self.config.base_url, path)
        }
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
        accept: &str,
        attempt: u32,
    ) -> Result<Value> {
        let mut rb = self
            .client
            .request(method.clone(), url)
            .bearer_auth(&self.config.api_key)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, accept);
        if let Some(b) = body {
            rb = rb.json(b);
        }
        let req = match rb.build() {
            Ok(r) => r,
            Err(e) => {
                self.log_failure(method, url, None, &e.to_string());
                return Err(Error::Setup(e.to_string()));
            }
        };

        if self.config.debug {
            tracing::debug!(
                attempt,
                method = %method,
                url,
                accept,
                authorization = %format!("Bearer {}", mask_secret(&self.config.api_key)),
                "HTTP request"
            );
        }

        let t0 = Instant::now();
        let resp = match self.client.execute(req).await {
            Ok(r) => r,
            Err(e) => {
                self.log_failure(method, url, None, &e.to_string());
                return Err(if e.is_builder() {
                    Error::Setup(e.to_string())
                } else {
                    Error::Network(e.to_string())
                });
            }
        };

        let status = resp.status();
        let reason = status.canonical_reason().unwrap_or("");
        if self.config.debug {
            tracing::debug!(
                status = status.as_u16(),
                reason,
                url,
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "HTTP response"
            );
        }

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            self.log_failure(method, url, Some((status.as_u16(), reason)), &text);
            return Err(Error::Status(StatusError::new(status.as_u16(), reason)));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_ascii_lowercase());
        let text = match resp.text().await {
            Ok(t) => t,
            Err(e) => {
                self.log_failure(method, url, None, &e.to_string());
                return Err(Error::Network(e.to_string()));
            }
        };
        Ok(parse_body(text, content_type.as_deref(), accept))
    }

    fn log_failure(&self, method: &Method, url: &str, status: Option<(u16, &str)>, detail: &str) {
        if self.config.debug {
            tracing::debug!(
                method = %method,
                url,
                status = status.map(|s| s.0),
                reason = status.map(|s| s.1),
                detail = %truncate_for_log(detail, 500),
                "HTTP error details"
            );
            return;
        }
        match status {
            Some((code, reason)) => {
                tracing::warn!("HTTP error: {} {} - {} {}", method, url, code, reason)
            }
            None => tracing::warn!("HTTP error: {} {} - no response", method, url),
        }
    }
}

#[async_trait::async_trait]
impl Upstream for MetasoHttpClient {
    async fn execute(&self, payload: &UpstreamPayload) -> Result<Value> {
        self.post(payload.path, &payload.body, payload.accept).await
    }
}

/// JSON when the body is JSON; otherwise the raw text as a JSON string.
///
/// A text `Accept` keeps the body as text unless the server explicitly labelled it JSON.
fn parse_body(text: String, content_type: Option<&str>, accept: &str) -> Value {
    let declared_json = content_type.is_some_and(|ct| ct.contains("json"));
    if !declared_json && accept == ACCEPT_TEXT {
        return Value::String(text);
    }
    if declared_json || accept == ACCEPT_JSON {
        if let Ok(v) = serde_json::from_str::<Value>(&text) {
            return v;
        }
    }
    Value::String(text)
}

fn truncate_for_log(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(base: &str) -> MetasoHttpClient {
        let cfg = Config::new(
            Some("mk-0123456789ABCDEFGHIJKLMNOPQRSTUV".into()),
            Some(base.into()),
            Some(1_000),
            false,
        )
        .unwrap();
        MetasoHttpClient::new(cfg).unwrap()
    }

    #[test]
    fn joins_base_and_path() {
        let c = client("https://metaso.cn/");
        assert_eq!(c.url_for("/api/v1/search"), "https://metaso.cn/api/v1/search");
        assert_eq!(c.url_for("api/v1/reader"), "https://metaso.cn/api/v1/reader");
    }

    #[test]
    fn json_bodies_parse_and_text_bodies_stay_text() {
        assert_eq!(
            parse_body(r#"{"a":1}"#.into(), Some("application/json; charset=utf-8"), ACCEPT_JSON),
            json!({"a": 1})
        );
        assert_eq!(
            parse_body("# Heading".into(), Some("text/plain"), ACCEPT_TEXT),
            json!("# Heading")
        );
        // Text requested and the body happens to be valid JSON: still text.
        assert_eq!(parse_body("42".into(), None, ACCEPT_TEXT), json!("42"));
        // JSON requested, garbage returned: keep the text rather than failing.
        assert_eq!(parse_body("oops".into(), None, ACCEPT_JSON), json!("oops"));
        // Server labelled it JSON even though text was requested.
        assert_eq!(
            parse_body(r#"{"content":"x"}"#.into(), Some("application/json"), ACCEPT_TEXT),
            json!({"content": "x"})
        );
    }

    #[test]
    fn log_truncation_is_char_safe() {
        assert_eq!(truncate_for_log("héllo", 2), "hé...");
        assert_eq!(truncate_for_log("hi", 10), "hi");
    }
}
