//! Client for the SonarQube web API.
//!
//! `SonarClient` performs authenticated GET requests against the component
//! search, measures, issues and metrics endpoints, decodes the responses
//! and maps failures onto `SonarError`.

/// Typed endpoint operations.
pub mod api;

/// Authentication, the transport seam, and the pooled HTTP agent.
pub mod http;

pub use api::{SonarClient, MAX_PAGE_SIZE};
pub use http::{Auth, HttpResponse, HttpTransport, UreqTransport};
