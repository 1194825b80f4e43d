//! Integration tests for failure diagnosis and error logging.

use cdkctl_core::{ErrorLogWriter, FailureDiagnostician, StackEvent};
use cfn_events::fakes::MemoryStackEvents;
use cfn_events::NESTED_STACK_RESOURCE_TYPE;
use chrono::{TimeZone, Utc};

const NESTED: &str = "arn:aws:cloudformation:us-east-1:222222222222:stack/shop-prod-Data-XYZ/1";

fn event(logical: &str, physical: &str, kind: &str, status: &str, reason: &str, minute: u32) -> StackEvent {
    StackEvent {
        logical_id: logical.to_string(),
        physical_id: physical.to_string(),
        resource_type: kind.to_string(),
        status: status.to_string(),
        status_reason: (!reason.is_empty()).then(|| reason.to_string()),
        timestamp: Utc.with_ymd_and_hms(2026, 6, 1, 12, minute, 0).unwrap(),
    }
}

fn failing_source() -> MemoryStackEvents {
    MemoryStackEvents::new()
        .with_stack(
            "shop-prod",
            vec![
                event("shop-prod", "shop-prod", NESTED_STACK_RESOURCE_TYPE, "UPDATE_ROLLBACK_IN_PROGRESS", "", 9),
                event("DataStack", NESTED, NESTED_STACK_RESOURCE_TYPE, "UPDATE_FAILED", "Embedded stack failed", 8),
                event("WebStack", "shop-prod-Web", NESTED_STACK_RESOURCE_TYPE, "UPDATE_COMPLETE", "", 7),
                event("shop-prod", "shop-prod", NESTED_STACK_RESOURCE_TYPE, "UPDATE_IN_PROGRESS", "", 1),
            ],
        )
        .with_stack(
            NESTED,
            vec![
                event("Cache", "", "AWS::ElastiCache::CacheCluster", "CREATE_FAILED", "Resource creation cancelled", 6),
                event("Table", "orders", "AWS::DynamoDB::Table", "UPDATE_FAILED", "Table already exists: orders", 5),
                event("Queue", "q", "AWS::SQS::Queue", "UPDATE_COMPLETE", "", 4),
            ],
        )
}

/// Test: diagnosis output lands in a single error log, genuine failures only
#[tokio::test]
async fn test_diagnosis_to_error_log() {
    let source = failing_source();
    let report = FailureDiagnostician::new(&source).diagnose("shop-prod").await;
    assert_eq!(report.len(), 1);

    let dir = tempfile::tempdir().unwrap();
    let path = ErrorLogWriter::new(dir.path(), false)
        .flush(&report.blocks())
        .unwrap()
        .expect("log written outside CI");

    let content = std::fs::read_to_string(path).unwrap();
    assert!(content.contains("Status: UPDATE_FAILED"));
    assert!(content.contains("Resource: Table"));
    assert!(content.contains("Table already exists: orders"));
    assert!(!content.contains("Resource creation cancelled"));
}

/// Test: the first failing nested stack is the only one followed
#[tokio::test]
async fn test_only_first_failing_nested_stack_is_followed() {
    let second = "arn:aws:cloudformation:us-east-1:222222222222:stack/shop-prod-Web-ABC/2";
    let source = MemoryStackEvents::new()
        .with_stack(
            "shop-prod",
            vec![
                event("DataStack", NESTED, NESTED_STACK_RESOURCE_TYPE, "CREATE_FAILED", "Embedded stack failed", 8),
                event("WebStack", second, NESTED_STACK_RESOURCE_TYPE, "CREATE_FAILED", "Embedded stack failed", 7),
            ],
        )
        .with_stack(NESTED, vec![event("Table", "orders", "AWS::DynamoDB::Table", "CREATE_FAILED", "boom", 5)])
        .with_stack(second, vec![]);

    FailureDiagnostician::new(&source).diagnose("shop-prod").await;
    assert_eq!(source.queries(), vec!["shop-prod".to_string(), NESTED.to_string()]);
}

/// Test: CI suppresses the error log entirely
#[tokio::test]
async fn test_ci_suppresses_error_log() {
    let source = failing_source();
    let report = FailureDiagnostician::new(&source).diagnose("shop-prod").await;

    let dir = tempfile::tempdir().unwrap();
    let written = ErrorLogWriter::new(dir.path(), true).flush(&report.blocks()).unwrap();
    assert!(written.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
