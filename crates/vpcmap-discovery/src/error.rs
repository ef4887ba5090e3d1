//! Error taxonomy for a discovery run.
//!
//! Only organization-level failures abort a run ([`DiscoveryError`]). Everything else is
//! recorded as a [`Diagnostic`] and the walk continues elsewhere.

use crate::api::CloudError;
use serde::Serialize;
use std::fmt;

/// Fatal errors: the run produces no graph.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("organization {org_id} is not accessible: {source}")]
    Organization {
        org_id: String,
        #[source]
        source: CloudError,
    },
    #[error("run cancelled before organization {org_id} could be read")]
    Cancelled { org_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A folder or project listing failed; that branch was skipped.
    BranchFailure,
    /// The compute API is unavailable for a project; its network enrichment was skipped.
    FeatureUnavailable,
    /// A peering referenced a network path that does not parse.
    MalformedReference,
    /// An edge pointed at a node that never materialized and was dropped.
    DanglingEdge,
    /// The deadline passed or the run was cancelled before this subtree finished.
    Cancelled,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BranchFailure => "branch_failure",
            Self::FeatureUnavailable => "feature_unavailable",
            Self::MalformedReference => "malformed_reference",
            Self::DanglingEdge => "dangling_edge",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A non-fatal problem recorded during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Resource the problem is about (`folders/123`, a project id, an edge).
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// A failed `listing` ("folder" or "project") under `subject`.
    pub fn branch_failure(subject: impl Into<String>, listing: &str, err: &CloudError) -> Self {
        Self::new(
            DiagnosticKind::BranchFailure,
            subject,
            format!("{listing} listing failed: {err}"),
        )
    }

    pub fn feature_unavailable(project_id: impl Into<String>, err: &CloudError) -> Self {
        Self::new(DiagnosticKind::FeatureUnavailable, project_id, err.to_string())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind.as_str(), self.subject, self.message)
    }
}
