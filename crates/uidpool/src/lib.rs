//! Durable, strictly monotonic 64-bit identifier allocation.
//!
//! `uidpool` hands out `u64` identifiers that are unique for the lifetime of a
//! pool, including across process restarts. Three pieces cooperate:
//!
//! - [`Store`] - durable storage for the last issued identifier
//!   ([`FileStore`] in production).
//! - [`Allocator`] - owns the counter and checkpoints every identifier to the
//!   store *before* returning it.
//! - [`Dispatcher`] - serializes any number of concurrent callers onto a single
//!   worker thread that exclusively owns the [`Allocator`].
//!
//! ```no_run
//! use uidpool::{Allocator, Dispatcher, DispatcherOptions, FileStore};
//!
//! # async fn run() -> uidpool::Result<()> {
//! let allocator = Allocator::new(FileStore::new("last-used-id.txt"))?;
//! let dispatcher = Dispatcher::spawn(allocator, DispatcherOptions::default())?;
//!
//! let id = dispatcher.allocate().await?;
//! println!("issued {id}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `tracing`: emit `tracing` events from the store, allocator and worker.

mod allocator;
mod dispatcher;
mod error;
mod id;
mod store;
#[cfg(test)]
mod testing;

pub use crate::allocator::*;
pub use crate::dispatcher::*;
pub use crate::error::*;
pub use crate::id::*;
pub use crate::store::*;
