//! Serialization boundary between concurrent callers and the allocator.
//!
//! Any number of callers enqueue a request carrying a private one-shot reply
//! channel onto a shared intake. A single worker thread, the only owner of the
//! [`Allocator`](crate::Allocator), drains the intake in arrival order and
//! answers each request exactly once.
//!
//! ## Structure
//!
//! - [`Dispatcher`] - cloneable caller-facing handle.
//! - `request` - messages sent over the intake.
//! - `worker` - the worker loop that owns the allocator.

mod dispatcher;
mod request;
mod worker;

pub use dispatcher::*;
