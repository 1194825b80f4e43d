//! cfn-events: CloudFormation event access for cdkctl
//!
//! This crate is the boundary between cdkctl and the AWS control plane.
//! It exposes stack events as plain values and hides the SDK behind the
//! [`StackEventSource`] trait.
//!
//! ## Key Components
//!
//! - `StackEvent`: one resource state transition inside a stack
//! - `StackEventSource`: async query interface (`describe_stack_events`)
//! - `CloudFormationEvents`: SDK-backed implementation with a lazily built client
//! - `fakes::MemoryStackEvents`: in-memory source for tests

mod cloudformation;
mod error;
pub mod events;
pub mod fakes;

pub use cloudformation::{CloudFormationEvents, DEFAULT_PAGE_LIMIT};
pub use error::EventSourceError;
pub use events::{
    StackEvent, StackEventSource, CASCADE_CANCELLATION_REASON, NESTED_STACK_RESOURCE_TYPE,
};

/// Result type for event source operations
pub type Result<T> = std::result::Result<T, EventSourceError>;
