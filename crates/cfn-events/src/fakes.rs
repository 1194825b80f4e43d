//! In-memory fakes for the event source (testing only)
//!
//! `MemoryStackEvents` serves canned event lists per stack and records every
//! query so tests can assert which stacks were drilled into.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::EventSourceError;
use crate::events::{StackEvent, StackEventSource};
use crate::Result;

/// In-memory event source backed by a `HashMap<stack, events>`.
#[derive(Debug, Default)]
pub struct MemoryStackEvents {
    stacks: Mutex<HashMap<String, Vec<StackEvent>>>,
    failing: Mutex<HashMap<String, String>>,
    queries: Mutex<Vec<String>>,
}

impl MemoryStackEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the events returned for `stack`.
    pub fn with_stack(self, stack: &str, events: Vec<StackEvent>) -> Self {
        self.stacks
            .lock()
            .unwrap()
            .insert(stack.to_string(), events);
        self
    }

    /// Make queries for `stack` fail with a request error carrying `message`.
    pub fn with_failure(self, stack: &str, message: &str) -> Self {
        self.failing
            .lock()
            .unwrap()
            .insert(stack.to_string(), message.to_string());
        self
    }

    /// Stacks queried so far, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl StackEventSource for MemoryStackEvents {
    async fn describe_stack_events(&self, stack: &str) -> Result<Vec<StackEvent>> {
        self.queries.lock().unwrap().push(stack.to_string());

        if let Some(message) = self.failing.lock().unwrap().get(stack) {
            return Err(EventSourceError::request(stack, message.clone()));
        }

        self.stacks
            .lock()
            .unwrap()
            .get(stack)
            .cloned()
            .ok_or_else(|| EventSourceError::StackNotFound(stack.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_returns_registered_events_and_records_queries() {
        let event = StackEvent {
            logical_id: "Queue".to_string(),
            physical_id: "q-1".to_string(),
            resource_type: "AWS::SQS::Queue".to_string(),
            status: "CREATE_COMPLETE".to_string(),
            status_reason: None,
            timestamp: Utc::now(),
        };
        let source = MemoryStackEvents::new().with_stack("acme-dev", vec![event.clone()]);

        let events = source.describe_stack_events("acme-dev").await.unwrap();
        assert_eq!(events, vec![event]);
        assert_eq!(source.queries(), vec!["acme-dev".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_stack_is_not_found() {
        let source = MemoryStackEvents::new();
        match source.describe_stack_events("missing").await {
            Err(EventSourceError::StackNotFound(name)) => assert_eq!(name, "missing"),
            other => panic!("expected StackNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_configured_failure() {
        let source = MemoryStackEvents::new()
            .with_stack("acme-dev", vec![])
            .with_failure("acme-dev", "AccessDenied");
        let err = source.describe_stack_events("acme-dev").await.unwrap_err();
        assert!(err.to_string().contains("AccessDenied"));
    }
}
