//! Structured descriptions of captured faults.

use crate::host::Viewport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Immutable description of one captured fault.
///
/// Serializes with camelCase field names and `type` for
/// [`error_type`](ErrorRecord::error_type), the shape remote collectors and
/// `error:occurred` listeners receive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// `err_<unix millis>_<9 lowercase alphanumerics>`.
    pub id: String,
    /// Classified type name.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Extracted message.
    pub message: String,
    /// Caller-supplied description of where the fault happened.
    pub context: String,
    /// Caller-supplied extra fields.
    pub metadata: Map<String, Value>,
    /// Stack or cause chain, if any.
    pub stack: Option<String>,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    /// Page URL at capture time.
    pub url: String,
    /// Client user agent.
    pub user_agent: String,
    /// Viewport at capture time.
    pub viewport: Viewport,
    /// Set for faults routed through `handle_network_error`.
    #[serde(default)]
    pub is_network_error: bool,
}

/// Generates a record id: `err_<unix millis>_<9 lowercase alphanumerics>`.
pub(crate) fn generate_id(now: DateTime<Utc>) -> String {
    let entropy = uuid::Uuid::new_v4().simple().to_string();
    format!("err_{}_{}", now.timestamp_millis(), &entropy[..9])
}

/// Details of the request behind a network fault.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    /// Request URL.
    pub url: Option<String>,
    /// HTTP method.
    pub method: Option<String>,
    /// Response status code.
    pub status: Option<u16>,
    /// Response status text.
    pub status_text: Option<String>,
}

impl RequestInfo {
    /// Request info with a method and URL.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            method: Some(method.into()),
            ..Self::default()
        }
    }

    /// Adds a response status.
    #[must_use]
    pub fn with_status(mut self, status: u16, status_text: impl Into<String>) -> Self {
        self.status = Some(status);
        self.status_text = Some(status_text.into());
        self
    }

    /// Present fields as record metadata; absent ones are omitted.
    pub(crate) fn into_metadata(self) -> Map<String, Value> {
        let mut metadata = Map::new();
        if let Some(url) = self.url {
            metadata.insert("url".into(), Value::String(url));
        }
        if let Some(method) = self.method {
            metadata.insert("method".into(), Value::String(method));
        }
        if let Some(status) = self.status {
            metadata.insert("status".into(), Value::from(status));
        }
        if let Some(status_text) = self.status_text {
            metadata.insert("statusText".into(), Value::String(status_text));
        }
        metadata
    }
}

/// Payload sent to a [`Reporter`](super::Reporter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    /// The captured fault.
    pub error: ErrorRecord,
    /// Application version tag.
    pub app_version: String,
    /// Deployment environment tag.
    pub environment: String,
}

/// Diagnostic snapshot returned by
/// [`ErrorHandler::get_stats`](super::ErrorHandler::get_stats).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStats {
    /// Records currently queued (at most the queue capacity).
    pub total_errors: usize,
    /// Occurrences per type since the last reset, including evicted records.
    pub errors_by_type: BTreeMap<String, u64>,
    /// Up to the 10 most recent records, newest last.
    pub recent_errors: Vec<ErrorRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_has_expected_shape() {
        let now = Utc::now();
        let id = generate_id(now);
        let parts: Vec<&str> = id.split('_').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "err");
        assert_eq!(parts[1], now.timestamp_millis().to_string());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn request_metadata_skips_missing_fields() {
        let metadata = RequestInfo::new("GET", "/api/items")
            .with_status(503, "Service Unavailable")
            .into_metadata();
        assert_eq!(metadata["status"], Value::from(503));
        assert_eq!(metadata["statusText"], "Service Unavailable");

        let partial = RequestInfo {
            url: Some("/x".into()),
            ..RequestInfo::default()
        }
        .into_metadata();
        assert_eq!(partial.len(), 1);
    }
}
