use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Metric keys
// ---------------------------------------------------------------------------

/// Overall line/condition coverage percentage.
pub const METRIC_COVERAGE: &str = "coverage";
/// Coverage on new code.
pub const METRIC_NEW_COVERAGE: &str = "new_coverage";
/// Duplicated lines density percentage.
pub const METRIC_DUPLICATION: &str = "duplicated_lines_density";
/// Number of lines not covered by tests.
pub const METRIC_UNCOVERED_LINES: &str = "uncovered_lines";

/// The four metrics fetched together by a coverage report.
pub const COVERAGE_METRIC_KEYS: [&str; 4] = [
    METRIC_COVERAGE,
    METRIC_NEW_COVERAGE,
    METRIC_DUPLICATION,
    METRIC_UNCOVERED_LINES,
];

/// Component qualifier for projects.
pub const QUALIFIER_PROJECT: &str = "TRK";

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

/// A project as returned by the component search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub key: String,
    pub name: String,
    pub qualifier: String,
    #[serde(default)]
    pub visibility: String,
    #[serde(default)]
    pub last_analysis_date: Option<String>,
}

/// Paging metadata attached to search responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    pub page_index: u32,
    pub page_size: u32,
    pub total: u64,
}

/// Typed view over a project listing envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectsPage {
    #[serde(default)]
    pub components: Vec<Project>,
    pub paging: Paging,
}

impl ProjectsPage {
    /// Parses the raw envelope returned by `SonarClient::list_projects`.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }
}

// ---------------------------------------------------------------------------
// Measures
// ---------------------------------------------------------------------------

/// A single metric value attached to a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    pub metric: String,
    /// Textual value; metrics measured only on the new-code period have none.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_value: Option<bool>,
}

/// A component together with the measures requested for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub qualifier: String,
    #[serde(default)]
    pub measures: Vec<Measure>,
}

impl Component {
    /// Returns the measure for `metric`, if the platform reported one.
    pub fn measure(&self, metric: &str) -> Option<&Measure> {
        self.measures.iter().find(|m| m.metric == metric)
    }

    /// Returns the value of `metric`. `None` covers both a missing measure
    /// and a measure reported without a value.
    pub fn value_of(&self, metric: &str) -> Option<String> {
        self.measure(metric).and_then(|m| m.value.clone())
    }
}

/// Envelope of the measures endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasuresResponse {
    pub component: Component,
}

/// Coverage, duplication and uncovered lines of one component.
///
/// A `None` field means the platform did not report that metric; it is
/// never defaulted to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageMetrics {
    pub overall_coverage: Option<String>,
    pub new_code_coverage: Option<String>,
    pub duplication_rate: Option<String>,
    pub uncovered_lines: Option<String>,
    pub component_key: String,
    pub component_name: String,
}

impl CoverageMetrics {
    pub fn from_component(component: &Component) -> Self {
        Self {
            overall_coverage: component.value_of(METRIC_COVERAGE),
            new_code_coverage: component.value_of(METRIC_NEW_COVERAGE),
            duplication_rate: component.value_of(METRIC_DUPLICATION),
            uncovered_lines: component.value_of(METRIC_UNCOVERED_LINES),
            component_key: component.key.clone(),
            component_name: component.name.clone(),
        }
    }
}

/// One metric of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleMetric {
    pub component_key: String,
    pub component_name: String,
    pub metric: String,
    pub value: Option<String>,
}

impl SingleMetric {
    pub fn from_component(component: &Component, metric: &str) -> Self {
        Self {
            component_key: component.key.clone(),
            component_name: component.name.clone(),
            metric: metric.to_string(),
            value: component.value_of(metric),
        }
    }
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// Error returned when parsing an unknown enum name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Issue category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    Bug,
    Vulnerability,
    CodeSmell,
    SecurityHotspot,
}

impl IssueType {
    pub const ALL: [IssueType; 4] = [
        Self::Bug,
        Self::Vulnerability,
        Self::CodeSmell,
        Self::SecurityHotspot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bug => "BUG",
            Self::Vulnerability => "VULNERABILITY",
            Self::CodeSmell => "CODE_SMELL",
            Self::SecurityHotspot => "SECURITY_HOTSPOT",
        }
    }
}

impl FromStr for IssueType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "issue type",
                value: s.to_string(),
            })
    }
}

/// Issue severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Blocker,
    Critical,
    Major,
    Minor,
    Info,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Self::Blocker,
        Self::Critical,
        Self::Major,
        Self::Minor,
        Self::Info,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocker => "BLOCKER",
            Self::Critical => "CRITICAL",
            Self::Major => "MAJOR",
            Self::Minor => "MINOR",
            Self::Info => "INFO",
        }
    }
}

impl FromStr for Severity {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownVariant {
                kind: "severity",
                value: s.to_string(),
            })
    }
}

/// Typed view of an issue record. The client itself hands issues through
/// as raw JSON; this is for callers that want to inspect them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
    pub component: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Optional filters for an issue search. Empty lists are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueFilter {
    pub types: Vec<IssueType>,
    pub severities: Vec<Severity>,
    pub statuses: Vec<String>,
}

impl IssueFilter {
    /// Query parameters for the filters that are set, each comma-joined.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !self.types.is_empty() {
            let joined: Vec<&str> = self.types.iter().map(|t| t.as_str()).collect();
            params.push(("types", joined.join(",")));
        }
        if !self.severities.is_empty() {
            let joined: Vec<&str> = self.severities.iter().map(|s| s.as_str()).collect();
            params.push(("severities", joined.join(",")));
        }
        if !self.statuses.is_empty() {
            params.push(("statuses", self.statuses.join(",")));
        }
        params
    }
}

/// Parses the `issues` array of an issue search response.
pub fn parse_issues(response: &Value) -> serde_json::Result<Vec<Issue>> {
    match response.get("issues") {
        Some(issues) => serde_json::from_value(issues.clone()),
        None => Ok(Vec::new()),
    }
}
