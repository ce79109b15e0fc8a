//! HTTP plumbing for the SonarQube client: authentication, the transport
//! seam, and the pooled `ureq` agent used in production.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine;
use tracing::debug;

use crate::config::SonarConfig;
use crate::errors::{Result, SonarError};

/// Credentials attached to every request.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// No `Authorization` header.
    Anonymous,
    /// HTTP basic auth. A user token is sent as the username with an
    /// empty password.
    Basic { username: String, password: String },
}

impl Auth {
    /// Picks credentials from the config: token first, then a complete
    /// username/password pair, else anonymous.
    pub fn from_config(config: &SonarConfig) -> Self {
        if !config.token.is_empty() {
            Self::Basic {
                username: config.token.clone(),
                password: String::new(),
            }
        } else if !config.username.is_empty() && !config.password.is_empty() {
            Self::Basic {
                username: config.username.clone(),
                password: config.password.clone(),
            }
        } else {
            Self::Anonymous
        }
    }

    /// Value for the `Authorization` header, if any.
    pub fn header_value(&self) -> Option<String> {
        match self {
            Self::Anonymous => None,
            Self::Basic { username, password } => {
                let raw = format!("{}:{}", username, password);
                let encoded = base64::prelude::BASE64_STANDARD.encode(raw);
                Some(format!("Basic {}", encoded))
            }
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Basic { .. } => f.write_str("Basic(<redacted>)"),
        }
    }
}

/// Status and body of a completed HTTP exchange, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking GET transport.
///
/// Implementations return `Ok` for every response that arrived, including
/// non-2xx ones; only transport failures are errors.
pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str, query: &[(&str, String)], auth: &Auth) -> Result<HttpResponse>;

    /// Releases pooled connections. Later calls to `get` must fail.
    fn close(&self) {}
}

/// Agent construction settings, taken from `SonarConfig`.
#[derive(Debug, Clone, Copy)]
struct AgentSettings {
    timeout: Duration,
    max_idle_connections: usize,
    max_idle_connections_per_host: usize,
    max_redirects: u32,
}

enum AgentState {
    Unopened,
    Open(ureq::Agent),
    Closed,
}

/// Production transport backed by a keep-alive `ureq::Agent`.
///
/// The agent (and its connection pool) is built on first use and dropped
/// by `close`.
pub struct UreqTransport {
    settings: AgentSettings,
    state: Mutex<AgentState>,
}

impl UreqTransport {
    pub fn new(config: &SonarConfig) -> Self {
        Self {
            settings: AgentSettings {
                timeout: Duration::from_secs(config.timeout_secs),
                max_idle_connections: config.max_idle_connections,
                max_idle_connections_per_host: config.max_idle_connections_per_host,
                max_redirects: config.max_redirects,
            },
            state: Mutex::new(AgentState::Unopened),
        }
    }

    fn agent(&self) -> Result<ureq::Agent> {
        let mut state = self.state.lock().map_err(|_| SonarError::Internal {
            message: "http agent lock poisoned".to_string(),
        })?;
        match &*state {
            AgentState::Open(agent) => Ok(agent.clone()),
            AgentState::Closed => Err(SonarError::Internal {
                message: "http client is closed".to_string(),
            }),
            AgentState::Unopened => {
                debug!(settings = ?self.settings, "opening http connection pool");
                let agent = build_agent(&self.settings);
                *state = AgentState::Open(agent.clone());
                Ok(agent)
            }
        }
    }

    /// Whether the connection pool has been created and not yet closed.
    pub fn is_open(&self) -> bool {
        matches!(self.state.lock().as_deref(), Ok(AgentState::Open(_)))
    }
}

fn build_agent(settings: &AgentSettings) -> ureq::Agent {
    let config = ureq::Agent::config_builder()
        .timeout_global(Some(settings.timeout))
        .max_redirects(settings.max_redirects)
        .max_idle_connections(settings.max_idle_connections)
        .max_idle_connections_per_host(settings.max_idle_connections_per_host)
        .http_status_as_error(false)
        .build();
    ureq::Agent::new_with_config(config)
}

impl HttpTransport for UreqTransport {
    fn get(&self, url: &str, query: &[(&str, String)], auth: &Auth) -> Result<HttpResponse> {
        let agent = self.agent()?;

        let mut request = agent.get(url);
        for (key, value) in query {
            request = request.query(*key, value);
        }
        if let Some(header) = auth.header_value() {
            request = request.header("Authorization", header);
        }

        let mut response = request.call().map_err(map_ureq_error)?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(map_ureq_error)?;

        Ok(HttpResponse { status, body })
    }

    fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            if matches!(*state, AgentState::Open(_)) {
                debug!("closing http connection pool");
            }
            *state = AgentState::Closed;
        }
    }
}

/// Sorts `ureq` failures into transport-level and everything else.
fn map_ureq_error(err: ureq::Error) -> SonarError {
    match err {
        ureq::Error::Io(_)
        | ureq::Error::Timeout(_)
        | ureq::Error::HostNotFound
        | ureq::Error::ConnectionFailed => SonarError::Connection {
            message: err.to_string(),
        },
        other => SonarError::Internal {
            message: other.to_string(),
        },
    }
}
