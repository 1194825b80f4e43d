//! Stack event model and the query trait.
//!
//! Events are returned in control-plane order (newest first for
//! CloudFormation). Nothing here reorders them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Reason CloudFormation attaches to resources aborted because a sibling failed.
pub const CASCADE_CANCELLATION_REASON: &str = "Resource creation cancelled";

/// Resource type of a nested stack.
pub const NESTED_STACK_RESOURCE_TYPE: &str = "AWS::CloudFormation::Stack";

const TERMINAL_FAILURE_STATUSES: &[&str] = &["CREATE_FAILED", "UPDATE_FAILED"];

/// One resource state transition within a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEvent {
    /// Logical id from the template (e.g. `UploadsBucket`).
    pub logical_id: String,

    /// Physical id; for nested stacks this is the nested stack's ARN.
    pub physical_id: String,

    /// Resource type (e.g. `AWS::S3::Bucket`), empty when unknown.
    #[serde(default)]
    pub resource_type: String,

    /// Raw status string (e.g. `CREATE_FAILED`).
    pub status: String,

    /// Status reason, if the control plane supplied one.
    #[serde(default)]
    pub status_reason: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl StackEvent {
    /// Whether the status is `CREATE_FAILED` or `UPDATE_FAILED`.
    pub fn is_terminal_failure(&self) -> bool {
        TERMINAL_FAILURE_STATUSES.contains(&self.status.as_str())
    }

    /// Whether the failure reason is exactly the cascade sentinel.
    pub fn is_cascade_cancellation(&self) -> bool {
        self.status_reason.as_deref() == Some(CASCADE_CANCELLATION_REASON)
    }

    /// Whether this resource is itself a nested stack.
    pub fn is_nested_stack(&self) -> bool {
        self.resource_type == NESTED_STACK_RESOURCE_TYPE
    }
}

/// Read access to a stack's event history.
#[async_trait]
pub trait StackEventSource: Send + Sync {
    /// List events for the stack identified by `stack` (name or ARN), in
    /// control-plane order.
    async fn describe_stack_events(&self, stack: &str) -> Result<Vec<StackEvent>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(status: &str, reason: Option<&str>) -> StackEvent {
        StackEvent {
            logical_id: "Bucket".to_string(),
            physical_id: "acme-bucket".to_string(),
            resource_type: "AWS::S3::Bucket".to_string(),
            status: status.to_string(),
            status_reason: reason.map(str::to_string),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_terminal_failure_statuses() {
        assert!(event("CREATE_FAILED", None).is_terminal_failure());
        assert!(event("UPDATE_FAILED", None).is_terminal_failure());
        assert!(!event("UPDATE_IN_PROGRESS", None).is_terminal_failure());
        assert!(!event("CREATE_COMPLETE", None).is_terminal_failure());
        assert!(!event("UPDATE_ROLLBACK_COMPLETE", None).is_terminal_failure());
        assert!(!event("DELETE_FAILED", None).is_terminal_failure());
    }

    #[test]
    fn test_cascade_cancellation_is_exact_match() {
        assert!(event("CREATE_FAILED", Some("Resource creation cancelled")).is_cascade_cancellation());
        assert!(!event("CREATE_FAILED", Some("Resource creation cancelled.")).is_cascade_cancellation());
        assert!(!event("CREATE_FAILED", Some("disk quota exceeded")).is_cascade_cancellation());
        assert!(!event("CREATE_FAILED", None).is_cascade_cancellation());
    }

    #[test]
    fn test_nested_stack_detection() {
        let mut e = event("CREATE_FAILED", None);
        assert!(!e.is_nested_stack());
        e.resource_type = NESTED_STACK_RESOURCE_TYPE.to_string();
        assert!(e.is_nested_stack());
    }

    #[test]
    fn test_missing_optional_fields_deserialize() {
        let json = r#"{"logical_id":"Api","physical_id":"","status":"CREATE_FAILED","timestamp":"2026-01-01T00:00:00Z"}"#;
        let e: StackEvent = serde_json::from_str(json).expect("deserialize");
        assert_eq!(e.resource_type, "");
        assert!(e.status_reason.is_none());
    }
}
