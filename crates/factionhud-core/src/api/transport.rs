//! HTTP transport seam.
//!
//! `NetworkClient` and `StatsClient` only need "GET this URL, give me JSON".
//! Keeping that behind a trait lets tests script responses without a server.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::debug;

use super::ApiError;

pub trait Transport: Send + Sync {
    /// Perform a GET and parse the body as JSON.
    ///
    /// Non-2xx statuses and unparseable bodies are transport errors; a 2xx
    /// body carrying an API error envelope is returned as-is for the caller
    /// to classify.
    fn get_json<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value, ApiError>>;
}

/// reqwest-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("factionhud/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get_json<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value, ApiError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .header(header::ACCEPT, "application/json")
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;
            debug!(status = %status, bytes = text.len(), "Response received");

            if !status.is_success() {
                return Err(ApiError::from_status(status, &text));
            }

            serde_json::from_str(&text)
                .map_err(|e| ApiError::InvalidResponse(format!("malformed JSON body: {}", e)))
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Scripted transport: answers by URL substring, records every request.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        routes: Mutex<Vec<(String, VecDeque<Result<Value, String>>, Option<Value>)>>,
        requests: Mutex<Vec<(tokio::time::Instant, String)>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Always answer requests containing `pattern` with `body`.
        pub(crate) fn respond(&self, pattern: &str, body: Value) {
            let mut routes = self.routes.lock().unwrap();
            routes.push((pattern.to_string(), VecDeque::new(), Some(body)));
        }

        /// Answer the next requests containing `pattern` with `bodies` in
        /// order, then fall back to the route's fixed body (if any).
        pub(crate) fn respond_sequence(&self, pattern: &str, bodies: Vec<Value>, then: Option<Value>) {
            let mut routes = self.routes.lock().unwrap();
            routes.push((pattern.to_string(), bodies.into_iter().map(Ok).collect(), then));
        }

        /// Fail requests containing `pattern` with a transport error.
        pub(crate) fn fail(&self, pattern: &str, message: &str) {
            let mut routes = self.routes.lock().unwrap();
            routes.push((
                pattern.to_string(),
                VecDeque::from(vec![Err(message.to_string())]),
                None,
            ));
        }

        pub(crate) fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().iter().map(|(_, url)| url.clone()).collect()
        }

        /// When each request was dispatched, in order.
        pub(crate) fn request_times(&self) -> Vec<tokio::time::Instant> {
            self.requests.lock().unwrap().iter().map(|(at, _)| *at).collect()
        }

        pub(crate) fn count(&self, pattern: &str) -> usize {
            self.requests.lock().unwrap().iter().filter(|(_, u)| u.contains(pattern)).count()
        }

        fn answer(&self, url: &str) -> Result<Value, ApiError> {
            self.requests
                .lock()
                .unwrap()
                .push((tokio::time::Instant::now(), url.to_string()));
            let mut routes = self.routes.lock().unwrap();
            for (pattern, queue, fixed) in routes.iter_mut() {
                if !url.contains(pattern.as_str()) {
                    continue;
                }
                if let Some(next) = queue.pop_front() {
                    return next.map_err(ApiError::InvalidResponse);
                }
                if let Some(body) = fixed {
                    return Ok(body.clone());
                }
            }
            Err(ApiError::Http {
                status: 404,
                body: format!("no scripted response for {}", url),
            })
        }
    }

    impl Transport for ScriptedTransport {
        fn get_json<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Value, ApiError>> {
            let result = self.answer(url);
            Box::pin(async move { result })
        }
    }
}
