//! HTTP readiness.
//!
//! A wait expression is either a bare URL or a JSON object:
//!
//! ```json
//! {
//!   "url": "http://localhost:8080/health",
//!   "method": "GET",
//!   "body": "",
//!   "headers": {"Accept": "application/json"},
//!   "expect": {"code": 200, "body": "ok", "headers": {"X-Ready": "yes"}}
//! }
//! ```
//!
//! Without an `expect` block the check expects status 200. Every
//! expectation given must hold; an empty header value only requires the
//! header to be present.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::Deserialize;

use crate::deps::{Broker, CheckOutcome, Depender, StringMap};
use crate::error::{CynoError, Result};

pub const KIND: &str = "http";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub fn create(_config: &StringMap) -> Result<Arc<dyn Broker>> {
    let client = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    Ok(Arc::new(HttpBroker { client }))
}

struct HttpBroker {
    client: Client,
}

impl Broker for HttpBroker {
    fn kind(&self) -> &str {
        KIND
    }

    fn dep(&self, wait: &str) -> Result<Arc<dyn Depender>> {
        let condition = Condition::parse(wait)?;
        Ok(Arc::new(HttpCheck {
            client: self.client.clone(),
            condition,
        }))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Expectation {
    code: Option<u16>,
    body: String,
    headers: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    url: String,
    #[serde(default)]
    method: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    expect: Option<Expectation>,
}

#[derive(Debug)]
struct Condition {
    url: Url,
    method: Method,
    body: String,
    headers: BTreeMap<String, String>,
    expect: Expectation,
}

impl Condition {
    fn parse(wait: &str) -> Result<Self> {
        let wait = wait.trim();
        let raw = if wait.starts_with('{') {
            serde_json::from_str::<RawCondition>(wait).map_err(|e| {
                CynoError::Config(format!("failed to parse dependency condition JSON: {}", e))
            })?
        } else {
            RawCondition {
                url: wait.to_string(),
                method: String::new(),
                body: String::new(),
                headers: BTreeMap::new(),
                expect: None,
            }
        };

        let url = Url::parse(&raw.url)
            .map_err(|e| CynoError::Config(format!("invalid url '{}': {}", raw.url, e)))?;

        let method = if raw.method.is_empty() {
            Method::GET
        } else {
            Method::from_bytes(raw.method.to_ascii_uppercase().as_bytes()).map_err(|_| {
                CynoError::Config(format!("invalid http method '{}'", raw.method))
            })?
        };

        let expect = raw.expect.unwrap_or(Expectation {
            code: Some(200),
            ..Expectation::default()
        });

        Ok(Self {
            url,
            method,
            body: raw.body,
            headers: raw.headers,
            expect,
        })
    }

    fn host(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }
}

struct HttpCheck {
    client: Client,
    condition: Condition,
}

impl HttpCheck {
    /// Returns the unmet expectations, or the transport error.
    async fn unmet(&self) -> std::result::Result<Vec<String>, reqwest::Error> {
        let condition = &self.condition;
        let mut request = self
            .client
            .request(condition.method.clone(), condition.url.clone());
        for (name, value) in &condition.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !condition.body.is_empty() {
            request = request.body(condition.body.clone());
        }

        let response = request.send().await?;
        let mut waiting = Vec::new();

        let status = response.status().as_u16();
        if let Some(code) = condition.expect.code {
            if status != code {
                waiting.push(format!("code {}", code));
            }
        }

        for (name, expected) in &condition.expect.headers {
            let actual = response
                .headers()
                .get(name.as_str())
                .and_then(|v| v.to_str().ok());
            let matched = match actual {
                Some(value) => expected.is_empty() || value.contains(expected.as_str()),
                None => false,
            };
            if !matched {
                waiting.push(format!("header {}", name));
            }
        }

        if !condition.expect.body.is_empty() {
            let text = response.text().await?;
            if !text.contains(&condition.expect.body) {
                waiting.push("body text".to_string());
            }
        }

        Ok(waiting)
    }
}

#[async_trait]
impl Depender for HttpCheck {
    async fn check(&self) -> CheckOutcome {
        let message = format!("{} {}", KIND, self.condition.host());
        match self.unmet().await {
            Err(e) => CheckOutcome::waiting(format!("{} {}", message, e)),
            Ok(waiting) if waiting.is_empty() => CheckOutcome::ready(format!("{} good", message)),
            Ok(waiting) => CheckOutcome::waiting(format!(
                "{} waiting for {}",
                message,
                waiting.join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response per connection.
    async fn serve(response: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        port
    }

    const READY: &str = "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nX-Mode: ready-now\r\nConnection: close\r\n\r\nalive";
    const UNAVAILABLE: &str =
        "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\nbusy";

    #[test]
    fn test_parse_bare_url() {
        let condition = Condition::parse("http://localhost:8080/health").unwrap();
        assert_eq!(condition.method, Method::GET);
        assert_eq!(condition.expect.code, Some(200));
        assert_eq!(condition.host(), "localhost:8080");
    }

    #[test]
    fn test_parse_json() {
        let condition = Condition::parse(
            r#"{"url": "http://svc/ready", "method": "post", "body": "ping",
                "headers": {"Accept": "text/plain"},
                "expect": {"body": "pong", "headers": {"X-Ready": ""}}}"#,
        )
        .unwrap();
        assert_eq!(condition.method, Method::POST);
        assert_eq!(condition.body, "ping");
        assert_eq!(condition.headers["Accept"], "text/plain");
        assert_eq!(condition.expect.code, None);
        assert_eq!(condition.expect.body, "pong");
        assert_eq!(condition.host(), "svc");
    }

    #[test]
    fn test_parse_errors() {
        assert!(Condition::parse("{not json").is_err());
        assert!(Condition::parse("not a url").is_err());
        assert!(Condition::parse(r#"{"url": "http://a", "method": "GE T"}"#).is_err());
    }

    #[tokio::test]
    async fn test_good_response() {
        let port = serve(READY).await;
        let broker = create(&StringMap::new()).unwrap();
        let dep = broker
            .dep(&format!("http://127.0.0.1:{}/health", port))
            .unwrap();

        let outcome = dep.check().await;
        assert!(outcome.satisfied, "{}", outcome.message);
        assert_eq!(outcome.message, format!("http 127.0.0.1:{} good", port));
    }

    #[tokio::test]
    async fn test_all_expectations_combined() {
        let port = serve(READY).await;
        let broker = create(&StringMap::new()).unwrap();
        let wait = format!(
            r#"{{"url": "http://127.0.0.1:{}/", "expect": {{"code": 200, "body": "alive", "headers": {{"X-Mode": "ready"}}}}}}"#,
            port
        );
        assert!(broker.dep(&wait).unwrap().check().await.satisfied);

        let wait = format!(
            r#"{{"url": "http://127.0.0.1:{}/", "expect": {{"code": 200, "body": "dead", "headers": {{"X-Other": ""}}}}}}"#,
            port
        );
        let outcome = broker.dep(&wait).unwrap().check().await;
        assert!(!outcome.satisfied);
        assert_eq!(
            outcome.message,
            format!(
                "http 127.0.0.1:{} waiting for header X-Other, body text",
                port
            )
        );
    }

    #[tokio::test]
    async fn test_wrong_status() {
        let port = serve(UNAVAILABLE).await;
        let broker = create(&StringMap::new()).unwrap();
        let outcome = broker
            .dep(&format!("http://127.0.0.1:{}/", port))
            .unwrap()
            .check()
            .await;
        assert!(!outcome.satisfied);
        assert!(outcome.message.ends_with("waiting for code 200"));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let broker = create(&StringMap::new()).unwrap();
        let outcome = broker
            .dep(&format!("http://127.0.0.1:{}/", port))
            .unwrap()
            .check()
            .await;
        assert!(!outcome.satisfied);
        assert!(outcome.message.starts_with("http 127.0.0.1:"));
    }
}
