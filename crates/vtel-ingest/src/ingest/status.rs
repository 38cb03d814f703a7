//! Aggregate outcome of one ingest call

use serde::{Deserialize, Serialize};

/// Overall result of an ingest call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Success,
    Failure,
}

impl IngestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::Success => "success",
            IngestStatus::Failure => "failure",
        }
    }
}

impl std::fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status accumulated across both sub-batches of a payload.
///
/// `reports_saved` and `detections_saved` count rows staged in their
/// sub-batch transaction. A sub-batch that later rolls back keeps its count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: IngestStatus,
    pub errors: Vec<String>,
    pub reports_saved: u64,
    pub detections_saved: u64,
}

impl Default for StatusReport {
    fn default() -> Self {
        Self {
            status: IngestStatus::Success,
            errors: Vec::new(),
            reports_saved: 0,
            detections_saved: 0,
        }
    }
}

impl StatusReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A failed report carrying a single error and zero counters
    pub fn failed(message: impl Into<String>) -> Self {
        let mut status = Self::new();
        status.fail(message);
        status
    }

    /// Mark the call failed and record why.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = IngestStatus::Failure;
        self.errors.push(message.into());
    }

    pub fn is_success(&self) -> bool {
        self.status == IngestStatus::Success
    }
}
