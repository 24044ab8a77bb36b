//! Error types for identifier allocation.
//!
//! Errors fall into three groups:
//!
//! - **Fatal at startup**: [`Error::StoreInit`] and [`Error::Corrupted`]. The
//!   pool cannot guarantee uniqueness without its durable state, so the caller
//!   must not start serving. [`Error::WorkerSpawn`] likewise leaves nothing to
//!   serve requests.
//! - **Per request**: [`Error::Persist`], [`Error::PoolDepleted`],
//!   [`Error::Timeout`]. The worker stays alive and keeps serving.
//! - **Lifecycle**: [`Error::ServiceShutdown`] and [`Error::Channel`].

use crate::UniqueId;
use core::time::Duration;
use std::{io, path::PathBuf};

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the allocation engine.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The backing store could not be created, opened, chmod-ed or read.
    #[error("cannot initialize store at {}: {source}", path.display())]
    StoreInit {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The store holds something other than a decimal `u64`.
    #[error("store at {} is corrupted: {contents:?} is not a valid identifier", path.display())]
    Corrupted { path: PathBuf, contents: String },

    /// Durably recording `id` failed. The counter was not advanced, so the
    /// same `id` is attempted again by the next allocation.
    #[error("failed to persist id {id}: {source}")]
    Persist {
        id: u64,
        #[source]
        source: io::Error,
    },

    /// The counter reached `u64::MAX`.
    ///
    /// `last_issued` is `Some` on the allocation that exhausted the pool: that
    /// identifier was persisted and is valid. Every later call carries `None`.
    #[error("unique ID pool is depleted")]
    PoolDepleted { last_issued: Option<UniqueId> },

    /// The OS refused to start the thread that owns the allocator.
    #[error("failed to spawn allocator worker thread: {0}")]
    WorkerSpawn(#[source] io::Error),

    /// A request arrived while the dispatcher was shutting down.
    #[error("service is shutting down")]
    ServiceShutdown,

    /// The caller gave up waiting for its reply.
    #[error("no reply within {after:?}")]
    Timeout { after: Duration },

    /// Internal channel failure between callers and the worker.
    #[error("channel error: {context}")]
    Channel { context: String },
}

impl Error {
    /// Returns `true` for errors that must abort startup.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StoreInit { .. } | Self::Corrupted { .. } | Self::WorkerSpawn(_)
        )
    }

    pub(crate) fn store_init(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::StoreInit {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_errors_are_fatal() {
        let spawn = Error::WorkerSpawn(io::Error::from(io::ErrorKind::OutOfMemory));
        assert!(spawn.is_fatal());
        assert!(spawn.to_string().starts_with("failed to spawn allocator worker thread"));

        assert!(Error::store_init("state", io::ErrorKind::PermissionDenied.into()).is_fatal());
        assert!(!Error::ServiceShutdown.is_fatal());
        assert!(
            !Error::Channel {
                context: "worker gone".to_string()
            }
            .is_fatal()
        );
    }
}
