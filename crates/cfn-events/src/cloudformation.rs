//! CloudFormation-backed event source.
//!
//! The SDK client is built on first use and cached for the lifetime of the
//! value, so a deployment that never fails never loads AWS configuration.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudformation::error::DisplayErrorContext;
use aws_sdk_cloudformation::primitives::DateTime as SmithyDateTime;
use aws_sdk_cloudformation::types::StackEvent as SdkStackEvent;
use aws_sdk_cloudformation::Client;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::EventSourceError;
use crate::events::{StackEvent, StackEventSource};
use crate::Result;

/// Pages of `DescribeStackEvents` read per query. The newest events come
/// first, so failures of the latest deployment sit on the first pages.
pub const DEFAULT_PAGE_LIMIT: usize = 2;

/// Stack event source talking to the CloudFormation API.
pub struct CloudFormationEvents {
    profile: Option<String>,
    region: Option<String>,
    page_limit: usize,
    client: OnceCell<Client>,
}

impl CloudFormationEvents {
    /// Create a source for the given credential profile and region. `None`
    /// falls back to the default AWS provider chain for that setting.
    pub fn new(profile: Option<String>, region: Option<String>) -> Self {
        CloudFormationEvents {
            profile,
            region,
            page_limit: DEFAULT_PAGE_LIMIT,
            client: OnceCell::new(),
        }
    }

    /// Wrap an already configured client (LocalStack, custom endpoints).
    pub fn from_client(client: Client) -> Self {
        CloudFormationEvents {
            profile: None,
            region: None,
            page_limit: DEFAULT_PAGE_LIMIT,
            client: OnceCell::new_with(Some(client)),
        }
    }

    /// Set how many result pages a single query may read (at least one).
    pub fn with_page_limit(mut self, pages: usize) -> Self {
        self.page_limit = pages.max(1);
        self
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async {
                let mut loader = aws_config::defaults(BehaviorVersion::latest());
                if let Some(profile) = &self.profile {
                    loader = loader.profile_name(profile);
                }
                if let Some(region) = &self.region {
                    loader = loader.region(Region::new(region.clone()));
                }
                let config = loader.load().await;
                debug!(
                    profile = ?self.profile,
                    region = ?config.region().map(|r| r.as_ref().to_string()),
                    "Built CloudFormation client"
                );
                Client::new(&config)
            })
            .await
    }
}

#[async_trait]
impl StackEventSource for CloudFormationEvents {
    async fn describe_stack_events(&self, stack: &str) -> Result<Vec<StackEvent>> {
        let client = self.client().await;
        let mut events = Vec::new();
        let mut next_token: Option<String> = None;

        for page in 0..self.page_limit {
            let output = client
                .describe_stack_events()
                .stack_name(stack)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify_error(stack, DisplayErrorContext(&e).to_string()))?;

            events.extend(output.stack_events().iter().map(convert_event));
            debug!(stack, page, total = events.len(), "Read stack events page");

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(events)
    }
}

fn classify_error(stack: &str, message: String) -> EventSourceError {
    if message.contains("does not exist") {
        EventSourceError::StackNotFound(stack.to_string())
    } else {
        EventSourceError::request(stack, message)
    }
}

fn convert_event(event: &SdkStackEvent) -> StackEvent {
    let timestamp: Option<&SmithyDateTime> = event.timestamp().into();

    StackEvent {
        logical_id: event.logical_resource_id().unwrap_or_default().to_string(),
        physical_id: event.physical_resource_id().unwrap_or_default().to_string(),
        resource_type: event.resource_type().unwrap_or_default().to_string(),
        status: event
            .resource_status()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        status_reason: event.resource_status_reason().map(str::to_string),
        timestamp: to_utc(timestamp),
    }
}

fn to_utc(timestamp: Option<&SmithyDateTime>) -> DateTime<Utc> {
    timestamp
        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_default()
}
