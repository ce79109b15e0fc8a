#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use sonar_mcp::client::{Auth, HttpResponse, HttpTransport, SonarClient};
use sonar_mcp::config::SonarConfig;
use sonar_mcp::errors::Result;

/// One request seen by `FakeTransport`.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub auth: Auth,
}

impl RecordedRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

type Responder = Box<dyn Fn(&str) -> Result<HttpResponse> + Send + Sync>;

/// Transport that records requests and answers from a closure keyed on URL.
pub struct FakeTransport {
    requests: Mutex<Vec<RecordedRequest>>,
    closes: AtomicUsize,
    responder: Responder,
}

impl FakeTransport {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&str) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
            responder: Box::new(responder),
        })
    }

    /// Answers every request with 200 and `body`.
    pub fn json(body: Value) -> Arc<Self> {
        let text = body.to_string();
        Self::new(move |_| {
            Ok(HttpResponse {
                status: 200,
                body: text.clone(),
            })
        })
    }

    /// Answers every request with `status` and `body`.
    pub fn status(status: u16, body: &str) -> Arc<Self> {
        let body = body.to_string();
        Self::new(move |_| {
            Ok(HttpResponse {
                status,
                body: body.clone(),
            })
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl HttpTransport for FakeTransport {
    fn get(&self, url: &str, query: &[(&str, String)], auth: &Auth) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            auth: auth.clone(),
        });
        (self.responder)(url)
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn test_config() -> SonarConfig {
    SonarConfig {
        base_url: "http://sonar.test".to_string(),
        ..SonarConfig::default()
    }
}

pub fn client_with(transport: &Arc<FakeTransport>) -> SonarClient {
    SonarClient::with_transport(&test_config(), transport.clone())
}

/// A measures response for component `key` with the given (metric, value) pairs.
pub fn measures_body(key: &str, measures: &[(&str, &str)]) -> Value {
    let measures: Vec<Value> = measures
        .iter()
        .map(|(metric, value)| serde_json::json!({"metric": metric, "value": value}))
        .collect();
    serde_json::json!({
        "component": {
            "key": key,
            "name": format!("{} name", key),
            "qualifier": "TRK",
            "measures": measures
        }
    })
}
