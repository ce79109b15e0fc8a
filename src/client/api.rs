use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::SonarConfig;
use crate::errors::{Result, SonarError};
use crate::types::*;

use super::http::{Auth, HttpResponse, HttpTransport, UreqTransport};

/// Largest page size the component search endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Client for the SonarQube web API.
///
/// Cheap to clone; clones share one transport and therefore one
/// connection pool.
#[derive(Clone)]
pub struct SonarClient {
    base_url: String,
    auth: Auth,
    transport: Arc<dyn HttpTransport>,
}

impl SonarClient {
    /// Creates a client that talks HTTP through a pooled `ureq` agent.
    pub fn new(config: &SonarConfig) -> Self {
        Self::with_transport(config, Arc::new(UreqTransport::new(config)))
    }

    /// Creates a client over an arbitrary transport.
    pub fn with_transport(config: &SonarConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth: Auth::from_config(config),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Releases the connection pool. Requests made afterwards fail.
    pub fn close(&self) {
        self.transport.close();
    }

    // -----------------------------------------------------------------------
    // Endpoints
    // -----------------------------------------------------------------------

    /// Lists projects, returning the search envelope (components + paging)
    /// as the platform sent it.
    pub async fn list_projects(&self, page: u32, page_size: u32) -> Result<Value> {
        let query = vec![
            ("qualifiers", QUALIFIER_PROJECT.to_string()),
            ("p", page.max(1).to_string()),
            ("ps", page_size.clamp(1, MAX_PAGE_SIZE).to_string()),
        ];
        self.get_json("/api/components/search", query, None).await
    }

    /// Fetches the given metrics of one component in a single request.
    pub async fn get_measures(
        &self,
        component_key: &str,
        metric_keys: &[&str],
        branch: Option<&str>,
        pull_request: Option<&str>,
    ) -> Result<MeasuresResponse> {
        let mut query = vec![
            ("component", component_key.to_string()),
            ("metricKeys", metric_keys.join(",")),
        ];
        if let Some(branch) = branch {
            query.push(("branch", branch.to_string()));
        }
        if let Some(pr) = pull_request {
            query.push(("pullRequest", pr.to_string()));
        }

        let value = self
            .get_json("/api/measures/component", query, Some(component_key))
            .await?;
        decode(value, "measures")
    }

    /// Fetches coverage, new-code coverage, duplication and uncovered lines.
    pub async fn get_coverage_metrics(&self, component_key: &str) -> Result<CoverageMetrics> {
        let response = self
            .get_measures(component_key, &COVERAGE_METRIC_KEYS, None, None)
            .await?;
        Ok(CoverageMetrics::from_component(&response.component))
    }

    pub async fn get_single_metric(
        &self,
        component_key: &str,
        metric_key: &str,
    ) -> Result<SingleMetric> {
        let response = self
            .get_measures(component_key, &[metric_key], None, None)
            .await?;
        Ok(SingleMetric::from_component(&response.component, metric_key))
    }

    pub async fn get_overall_coverage(&self, component_key: &str) -> Result<SingleMetric> {
        self.get_single_metric(component_key, METRIC_COVERAGE).await
    }

    pub async fn get_new_code_coverage(&self, component_key: &str) -> Result<SingleMetric> {
        self.get_single_metric(component_key, METRIC_NEW_COVERAGE)
            .await
    }

    pub async fn get_duplication_rate(&self, component_key: &str) -> Result<SingleMetric> {
        self.get_single_metric(component_key, METRIC_DUPLICATION).await
    }

    pub async fn get_uncovered_lines(&self, component_key: &str) -> Result<SingleMetric> {
        self.get_single_metric(component_key, METRIC_UNCOVERED_LINES)
            .await
    }

    /// Searches issues of a component. The response is passed through
    /// untouched.
    pub async fn get_issues(&self, component_key: &str, filter: &IssueFilter) -> Result<Value> {
        let mut query = vec![("componentKeys", component_key.to_string())];
        query.extend(filter.query_params());
        self.get_json("/api/issues/search", query, Some(component_key))
            .await
    }

    /// Lists the metric definitions known to the server.
    pub async fn get_available_metrics(&self) -> Result<Value> {
        self.get_json("/api/metrics/search", Vec::new(), None).await
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    /// Performs a GET on the blocking pool and decodes a 2xx body as JSON.
    ///
    /// `component` is the key a 404 refers to; without one, 404 is reported
    /// like any other upstream failure.
    async fn get_json(
        &self,
        path: &str,
        query: Vec<(&'static str, String)>,
        component: Option<&str>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, ?query, "sonarqube request");

        let transport = Arc::clone(&self.transport);
        let auth = self.auth.clone();
        let request_url = url.clone();
        let response = tokio::task::spawn_blocking(move || {
            transport.get(&request_url, &query, &auth)
        })
        .await
        .map_err(|e| SonarError::Internal {
            message: format!("http task failed: {}", e),
        })??;

        debug!(%url, status = response.status, "sonarqube response");
        check_status(response, component)
    }
}

/// Maps a response to the error taxonomy, or parses its JSON body.
fn check_status(response: HttpResponse, component: Option<&str>) -> Result<Value> {
    if response.is_success() {
        return serde_json::from_str(&response.body).map_err(|e| SonarError::Internal {
            message: format!("malformed JSON from SonarQube: {}", e),
        });
    }

    warn!(status = response.status, "sonarqube returned an error status");
    match (response.status, component) {
        (404, Some(component)) => Err(SonarError::NotFound {
            component: component.to_string(),
        }),
        (401, _) => Err(SonarError::Unauthorized),
        (status, _) => Err(SonarError::Upstream {
            status,
            body: response.body,
        }),
    }
}

fn decode<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| SonarError::Internal {
        message: format!("unexpected {} response shape: {}", what, e),
    })
}
