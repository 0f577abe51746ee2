//! Subprocess output contract
//!
//! Every extractor prints exactly one JSON object to stdout:
//!
//! ```json
//! { "success": true, ...payload..., "method": "pymupdf" }
//! { "success": false, "error": "...", "method": "pymupdf" }
//! ```
//!
//! and exits 0 on success, 1 on failure.

use std::process::ExitCode;

use serde::{Serialize, Serializer};

/// Tag callers key on; kept from the PyMuPDF scripts this replaces
pub const METHOD: &str = "pymupdf";

/// Payload wrapper that adds the `success` and `method` keys
#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    success: bool,
    #[serde(flatten)]
    body: &'a T,
    method: &'static str,
}

/// Serialize `body` inside the envelope
pub fn serialize_enveloped<S, T>(success: bool, body: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Serialize,
{
    Envelope {
        success,
        body,
        method: METHOD,
    }
    .serialize(serializer)
}

/// Failure payload shared by both extractors
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub error: String,
    /// Reported when the document opened but extraction came up short
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<usize>,
}

impl Failure {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            page_count: None,
        }
    }
}

/// A result that maps onto a process exit code
pub trait Outcome: Serialize {
    fn is_success(&self) -> bool;

    fn exit_code(&self) -> ExitCode {
        if self.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

/// Render the JSON line for `outcome`
pub fn render<O: Outcome>(outcome: &O) -> String {
    serde_json::to_string(outcome).unwrap_or_else(|e| {
        // Only reachable if a payload refuses to serialize
        serde_json::json!({
            "success": false,
            "error": format!("Failed to serialize result: {}", e),
            "method": METHOD,
        })
        .to_string()
    })
}

/// Print `outcome` to stdout and return the matching exit code
pub fn emit<O: Outcome>(outcome: &O) -> ExitCode {
    println!("{}", render(outcome));
    outcome.exit_code()
}

/// Usage error reported before any document is touched
#[derive(Debug, Clone, PartialEq)]
pub struct UsageError(pub Failure);

impl UsageError {
    pub fn new(usage: &str) -> Self {
        Self(Failure::new(format!("Usage: {}", usage)))
    }
}

impl Serialize for UsageError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_enveloped(false, &self.0, serializer)
    }
}

impl Outcome for UsageError {
    fn is_success(&self) -> bool {
        false
    }
}
