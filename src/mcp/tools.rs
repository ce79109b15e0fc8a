//! MCP tool definitions and dispatch for the SonarQube client.
//!
//! The tool set is closed: `Tool` enumerates it, `ToolCall` is the validated
//! form of an invocation, and only `Tool::from_name` ever sees raw strings.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::client::SonarClient;
use crate::errors::{SonarError, ToolError};
use crate::types::{parse_issues, IssueFilter, IssueType, ProjectsPage, Severity};

/// Default page size for project listings.
const DEFAULT_PAGE_SIZE: u32 = 100;

/// A tool definition exposed by the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema describing the tool's input parameters.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Every tool the server offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    GetAllProjects,
    GetCoverageMetrics,
    GetOverallCoverage,
    GetNewCodeCoverage,
    GetDuplicationRate,
    GetUncoveredLines,
    GetProjectIssues,
    HealthCheck,
}

impl Tool {
    pub const ALL: [Tool; 8] = [
        Self::GetAllProjects,
        Self::GetCoverageMetrics,
        Self::GetOverallCoverage,
        Self::GetNewCodeCoverage,
        Self::GetDuplicationRate,
        Self::GetUncoveredLines,
        Self::GetProjectIssues,
        Self::HealthCheck,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::GetAllProjects => "get_all_projects",
            Self::GetCoverageMetrics => "get_coverage_metrics",
            Self::GetOverallCoverage => "get_overall_coverage",
            Self::GetNewCodeCoverage => "get_new_code_coverage",
            Self::GetDuplicationRate => "get_duplication_rate",
            Self::GetUncoveredLines => "get_uncovered_lines",
            Self::GetProjectIssues => "get_project_issues",
            Self::HealthCheck => "health_check",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    fn description(self) -> &'static str {
        match self {
            Self::GetAllProjects => "Get all projects from SonarQube",
            Self::GetCoverageMetrics => "Get all coverage metrics for a SonarQube component",
            Self::GetOverallCoverage => "Get overall coverage for a SonarQube component",
            Self::GetNewCodeCoverage => "Get new code coverage for a SonarQube component",
            Self::GetDuplicationRate => "Get duplication rate for a SonarQube component",
            Self::GetUncoveredLines => "Get uncovered lines for a SonarQube component",
            Self::GetProjectIssues => "Get issues for a SonarQube component",
            Self::HealthCheck => {
                "Check if the SonarQube MCP server is healthy and SonarQube is reachable"
            }
        }
    }

    fn input_schema(self) -> Value {
        let component_key = json!({
            "type": "string",
            "description": "The SonarQube component key"
        });

        match self {
            Self::GetAllProjects => json!({
                "type": "object",
                "properties": {
                    "page": {
                        "type": "integer",
                        "description": "Page number (default: 1)",
                        "minimum": 1
                    },
                    "page_size": {
                        "type": "integer",
                        "description": "Number of projects per page (default: 100, max: 500)",
                        "minimum": 1,
                        "maximum": 500
                    }
                }
            }),
            Self::GetCoverageMetrics
            | Self::GetOverallCoverage
            | Self::GetNewCodeCoverage
            | Self::GetDuplicationRate
            | Self::GetUncoveredLines => json!({
                "type": "object",
                "properties": { "component_key": component_key },
                "required": ["component_key"]
            }),
            Self::GetProjectIssues => {
                let types: Vec<&str> = IssueType::ALL.iter().map(|t| t.as_str()).collect();
                let severities: Vec<&str> = Severity::ALL.iter().map(|s| s.as_str()).collect();
                json!({
                    "type": "object",
                    "properties": {
                        "component_key": component_key,
                        "types": {
                            "type": "array",
                            "items": { "type": "string", "enum": types },
                            "description": "Issue types to filter (CODE_SMELL, BUG, VULNERABILITY, SECURITY_HOTSPOT)"
                        },
                        "severities": {
                            "type": "array",
                            "items": { "type": "string", "enum": severities },
                            "description": "Severities to filter (INFO, MINOR, MAJOR, CRITICAL, BLOCKER)"
                        },
                        "statuses": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Statuses to filter (OPEN, CONFIRMED, REOPENED, RESOLVED, CLOSED)"
                        }
                    },
                    "required": ["component_key"]
                })
            }
            Self::HealthCheck => json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    pub fn definition(self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Returns the list of all tool definitions exposed by this MCP server.
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    Tool::ALL.into_iter().map(Tool::definition).collect()
}

/// A tool invocation whose arguments have been validated.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    ListProjects { page: u32, page_size: u32 },
    CoverageMetrics { component_key: String },
    OverallCoverage { component_key: String },
    NewCodeCoverage { component_key: String },
    DuplicationRate { component_key: String },
    UncoveredLines { component_key: String },
    ProjectIssues {
        component_key: String,
        filter: IssueFilter,
    },
    HealthCheck,
}

impl ToolCall {
    /// Validates `args` for `tool`. Fails with `InvalidParams` when a
    /// required argument is missing or an argument has the wrong shape.
    pub fn parse(tool: Tool, args: &Value) -> Result<Self, ToolError> {
        let call = match tool {
            Tool::GetAllProjects => Self::ListProjects {
                page: int_arg(args, "page", 1)?.max(1),
                page_size: int_arg(args, "page_size", DEFAULT_PAGE_SIZE)?
                    .clamp(1, crate::client::MAX_PAGE_SIZE),
            },
            Tool::GetCoverageMetrics => Self::CoverageMetrics {
                component_key: component_key(args)?,
            },
            Tool::GetOverallCoverage => Self::OverallCoverage {
                component_key: component_key(args)?,
            },
            Tool::GetNewCodeCoverage => Self::NewCodeCoverage {
                component_key: component_key(args)?,
            },
            Tool::GetDuplicationRate => Self::DuplicationRate {
                component_key: component_key(args)?,
            },
            Tool::GetUncoveredLines => Self::UncoveredLines {
                component_key: component_key(args)?,
            },
            Tool::GetProjectIssues => {
                let component_key = component_key(args)?;
                let filter = IssueFilter {
                    types: parse_list(string_list(args, "types")?)?,
                    severities: parse_list(string_list(args, "severities")?)?,
                    statuses: string_list(args, "statuses")?,
                };
                Self::ProjectIssues {
                    component_key,
                    filter,
                }
            }
            Tool::HealthCheck => Self::HealthCheck,
        };
        Ok(call)
    }
}

// ---------------------------------------------------------------------------
// Argument helpers
// ---------------------------------------------------------------------------

fn component_key(args: &Value) -> Result<String, ToolError> {
    match args.get("component_key") {
        None | Some(Value::Null) => Err(ToolError::InvalidParams(
            "component_key is required".to_string(),
        )),
        Some(Value::String(s)) if s.is_empty() => Err(ToolError::InvalidParams(
            "component_key is required".to_string(),
        )),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ToolError::InvalidParams(
            "component_key must be a string".to_string(),
        )),
    }
}

/// Reads an optional integer argument. Values below zero read as zero.
fn int_arg(args: &Value, name: &str, default: u32) -> Result<u32, ToolError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => match v.as_i64() {
            Some(n) => Ok(n.clamp(0, i64::from(u32::MAX)) as u32),
            None => Err(ToolError::InvalidParams(format!(
                "{} must be an integer",
                name
            ))),
        },
    }
}

fn string_list(args: &Value, name: &str) -> Result<Vec<String>, ToolError> {
    let invalid = || ToolError::InvalidParams(format!("{} must be an array of strings", name));
    match args.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
            .collect(),
        Some(_) => Err(invalid()),
    }
}

fn parse_list<T>(items: Vec<String>) -> Result<Vec<T>, ToolError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    items
        .iter()
        .map(|s| s.parse().map_err(|e: T::Err| ToolError::InvalidParams(e.to_string())))
        .collect()
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Resolves tool calls and runs them against a `SonarClient`.
pub struct ToolRegistry {
    client: SonarClient,
}

impl ToolRegistry {
    pub fn new(client: SonarClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &SonarClient {
        &self.client
    }

    /// Resolves `name`, validates `args`, runs the tool and wraps its
    /// payload in a text content envelope.
    pub async fn call(&self, name: &str, args: &Value) -> Result<Value, ToolError> {
        let tool = Tool::from_name(name).ok_or_else(|| {
            warn!(tool = name, "unknown tool requested");
            ToolError::UnknownTool(name.to_string())
        })?;
        let call = ToolCall::parse(tool, args).inspect_err(|e| {
            warn!(tool = name, error = %e, "invalid tool arguments");
        })?;

        let payload = self.execute(call).await?;
        Ok(text_content(&payload))
    }

    /// Runs an already validated call and returns the bare payload.
    pub async fn execute(&self, call: ToolCall) -> Result<Value, ToolError> {
        let payload = match call {
            ToolCall::ListProjects { page, page_size } => {
                info!(page, page_size, "fetching projects");
                let result = self.client.list_projects(page, page_size).await?;
                match ProjectsPage::from_value(result.clone()) {
                    Ok(listing) => info!(
                        count = listing.components.len(),
                        total = listing.paging.total,
                        "fetched projects"
                    ),
                    Err(e) => debug!(error = %e, "project listing has an unexpected shape"),
                }
                result
            }
            ToolCall::CoverageMetrics { component_key } => {
                info!(%component_key, "fetching coverage metrics");
                to_payload(self.client.get_coverage_metrics(&component_key).await?)?
            }
            ToolCall::OverallCoverage { component_key } => {
                info!(%component_key, "fetching overall coverage");
                to_payload(self.client.get_overall_coverage(&component_key).await?)?
            }
            ToolCall::NewCodeCoverage { component_key } => {
                info!(%component_key, "fetching new code coverage");
                to_payload(self.client.get_new_code_coverage(&component_key).await?)?
            }
            ToolCall::DuplicationRate { component_key } => {
                info!(%component_key, "fetching duplication rate");
                to_payload(self.client.get_duplication_rate(&component_key).await?)?
            }
            ToolCall::UncoveredLines { component_key } => {
                info!(%component_key, "fetching uncovered lines");
                to_payload(self.client.get_uncovered_lines(&component_key).await?)?
            }
            ToolCall::ProjectIssues {
                component_key,
                filter,
            } => {
                info!(%component_key, ?filter, "fetching issues");
                let result = self.client.get_issues(&component_key, &filter).await?;
                match parse_issues(&result) {
                    Ok(issues) => info!(%component_key, count = issues.len(), "fetched issues"),
                    Err(e) => debug!(error = %e, "issue records have an unexpected shape"),
                }
                result
            }
            ToolCall::HealthCheck => self.health_check().await,
        };
        Ok(payload)
    }

    /// Checks SonarQube with a one-item project listing.
    ///
    /// Always produces a payload; a failed check is reported as
    /// `"status": "unhealthy"` with the error text.
    pub async fn health_check(&self) -> Value {
        let url = self.client.base_url();
        match self.client.list_projects(1, 1).await {
            Ok(_) => {
                info!(url, "health check passed");
                json!({
                    "status": "healthy",
                    "message": "SonarQube MCP server is running and SonarQube is reachable",
                    "url": url,
                })
            }
            Err(e) => {
                warn!(url, error = %e, "health check failed");
                json!({
                    "status": "unhealthy",
                    "message": "SonarQube MCP server is running but SonarQube is not reachable",
                    "url": url,
                    "error": e.to_string(),
                })
            }
        }
    }
}

fn to_payload<T: Serialize>(value: T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| {
        ToolError::Client(SonarError::Internal {
            message: format!("failed to serialize tool result: {}", e),
        })
    })
}

/// Wraps a payload as a single pretty-printed text content item.
pub fn text_content(payload: &Value) -> Value {
    json!({
        "content": [
            {
                "type": "text",
                "text": serde_json::to_string_pretty(payload).unwrap_or_default()
            }
        ]
    })
}
