//! Failure diagnosis after a deployment exits non-zero.
//!
//! Failures inside nested stacks only surface in the parent as a generic
//! "embedded stack failed" event. The diagnostician follows the first
//! failing nested stack down a bounded frontier and reports the failures
//! found at the deepest level it reaches.
//!
//! Diagnosis is best-effort: any control-plane error is logged and yields
//! an empty report, so the original deployment failure is never masked.

use std::collections::VecDeque;

use cfn_events::{StackEvent, StackEventSource};
use tracing::{debug, warn};

/// Stacks queried per diagnosis: the top-level stack plus one nested level.
pub const DEFAULT_MAX_DEPTH: usize = 2;

/// Terminal failures found for one failed deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureReport {
    /// Stack the reported events belong to.
    pub stack: Option<String>,

    /// Failure events in control-plane order, cascade cancellations removed.
    pub events: Vec<StackEvent>,
}

impl FailureReport {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// One formatted text block per event.
    pub fn blocks(&self) -> Vec<String> {
        self.events.iter().map(format_event).collect()
    }
}

/// Render an event as the block written to the console and error log.
pub fn format_event(event: &StackEvent) -> String {
    format!(
        "Status: {}\nResource: {}\nReason: {}\nTimestamp: {}\n",
        event.status,
        event.logical_id,
        event.status_reason.as_deref().unwrap_or("(no reason given)"),
        event.timestamp.to_rfc3339(),
    )
}

/// Walks the nested-stack hierarchy of a failed deployment.
pub struct FailureDiagnostician<'a> {
    source: &'a dyn StackEventSource,
    max_depth: usize,
}

impl<'a> FailureDiagnostician<'a> {
    pub fn new(source: &'a dyn StackEventSource) -> Self {
        Self {
            source,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Bound the number of stack levels queried (at least one).
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Diagnose the failed deployment of `root_stack`.
    ///
    /// Only the first failing nested stack in control-plane order is
    /// followed. If the top-level stack has no terminal failure, the report
    /// is empty and nothing else is queried.
    pub async fn diagnose(&self, root_stack: &str) -> FailureReport {
        let mut frontier = VecDeque::from([(root_stack.to_string(), 1usize)]);

        while let Some((stack, depth)) = frontier.pop_front() {
            let events = match self.source.describe_stack_events(&stack).await {
                Ok(events) => events,
                Err(e) => {
                    warn!(stack = %stack, error = %e, "Could not query stack events, skipping diagnosis");
                    return FailureReport::empty();
                }
            };

            let failures: Vec<StackEvent> = events
                .into_iter()
                .filter(StackEvent::is_terminal_failure)
                .collect();
            debug!(stack = %stack, depth, failures = failures.len(), "Scanned stack events");

            let Some(first) = failures.first() else {
                return FailureReport {
                    stack: Some(stack),
                    events: Vec::new(),
                };
            };

            if depth < self.max_depth && drills_into(first) {
                debug!(stack = %stack, nested = %first.physical_id, "Following failing nested stack");
                frontier.push_back((first.physical_id.clone(), depth + 1));
                continue;
            }

            return FailureReport {
                stack: Some(stack),
                events: failures
                    .into_iter()
                    .filter(|e| !e.is_cascade_cancellation())
                    .collect(),
            };
        }

        FailureReport::empty()
    }
}

/// Whether a failing event points at a nested stack worth querying. Events
/// without a resource type are treated as nested stacks.
fn drills_into(event: &StackEvent) -> bool {
    !event.physical_id.is_empty() && (event.resource_type.is_empty() || event.is_nested_stack())
}
