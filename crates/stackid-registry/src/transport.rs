//! HTTP transport
//!
//! Every component talks to the network through [`HttpTransport`], so the
//! resolver, proof checker and broadcaster can run against an in-memory
//! transport in tests.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
}

/// Outgoing request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: vec![("Accept".into(), "application/json".into())],
            body: None,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
            ..Self::get(url)
        }
    }

    pub fn put_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Put,
            body: Some(body),
            ..Self::get(url)
        }
    }

    /// Core API authorization header
    pub fn bearer(mut self, password: &str) -> Self {
        self.headers
            .push(("Authorization".into(), format!("bearer {}", password)));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response status and body text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self, url: &str) -> Result<T, TransportError> {
        serde_json::from_str(&self.body).map_err(|e| TransportError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// `error` field of a JSON error body, falling back to the raw text
    pub fn error_message(&self) -> String {
        serde_json::from_str::<Value>(&self.body)
            .ok()
            .and_then(|v| v.get("error").map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }))
            .unwrap_or_else(|| self.body.clone())
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        log::debug!("{:?} {}", request.method, request.url);
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    url: request.url.clone(),
                }
            } else {
                TransportError::Request {
                    url: request.url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Decode {
                url: request.url.clone(),
                reason: e.to_string(),
            })?;
        Ok(HttpResponse { status, body })
    }
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    //! In-memory transport with canned responses

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    type Route = Result<HttpResponse, TransportError>;

    /// Unrouted requests answer 404
    #[derive(Default)]
    pub struct MockTransport {
        routes: Mutex<HashMap<(Method, String), Route>>,
        requests: Mutex<Vec<HttpRequest>>,
        delays: Mutex<HashMap<String, Duration>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, method: Method, url: &str, status: u16, body: impl Into<String>) {
            self.routes
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert((method, url.to_string()), Ok(HttpResponse::new(status, body)));
        }

        pub fn on_get(&self, url: &str, body: Value) {
            self.respond(Method::Get, url, 200, body.to_string());
        }

        pub fn on_get_text(&self, url: &str, body: &str) {
            self.respond(Method::Get, url, 200, body);
        }

        pub fn fail(&self, method: Method, url: &str, reason: &str) {
            self.routes.lock().unwrap_or_else(|e| e.into_inner()).insert(
                (method, url.to_string()),
                Err(TransportError::Request {
                    url: url.to_string(),
                    reason: reason.to_string(),
                }),
            );
        }

        /// Hold responses for `url` to exercise concurrent completion order
        pub fn delay(&self, url: &str, delay: Duration) {
            self.delays
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(url.to_string(), delay);
        }

        /// Every request sent so far, in arrival order
        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let delay = self
                .delays
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get(&request.url)
                .copied();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let route = self
                .routes
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .get(&(request.method, request.url.clone()))
                .cloned();
            self.requests
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(request);
            route.unwrap_or_else(|| Ok(HttpResponse::new(404, r#"{"error":"not found"}"#)))
        }
    }
}
