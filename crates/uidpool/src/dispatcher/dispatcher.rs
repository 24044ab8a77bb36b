use crate::{Allocator, Error, Result, Store, UniqueId, dispatcher::request::WorkRequest};
use core::time::Duration;
use std::thread;
use tokio::{
    sync::{mpsc, oneshot},
    time::timeout,
};
use tokio_util::sync::CancellationToken;

use super::worker::worker_loop;

/// Name of the thread that owns the allocator.
pub const WORKER_THREAD_NAME: &str = "uidpool-allocator";

/// Tuning for a [`Dispatcher`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherOptions {
    /// Upper bound on how long [`Dispatcher::allocate`] waits for its reply.
    ///
    /// `None` (the default) waits indefinitely. When set, an expired caller
    /// gets [`Error::Timeout`]; its queued request is skipped by the worker
    /// if still pending, or its id is discarded if already issued.
    pub request_timeout: Option<Duration>,
}

/// Cloneable handle that funnels concurrent allocation requests to a single
/// worker owning the [`Allocator`].
///
/// ```no_run
/// use uidpool::{Allocator, Dispatcher, DispatcherOptions, FileStore};
///
/// # async fn run() -> uidpool::Result<()> {
/// let allocator = Allocator::new(FileStore::new("last-used-id.txt"))?;
/// let dispatcher = Dispatcher::spawn(allocator, DispatcherOptions::default())?;
///
/// let handles: Vec<_> = (0..8)
///     .map(|_| {
///         let dispatcher = dispatcher.clone();
///         tokio::spawn(async move { dispatcher.allocate().await })
///     })
///     .collect();
/// for handle in handles {
///     println!("{}", handle.await.expect("task panicked")?);
/// }
///
/// dispatcher.shutdown(std::time::Duration::from_secs(3)).await
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Dispatcher {
    intake: mpsc::UnboundedSender<WorkRequest>,
    shutdown_token: CancellationToken,
    request_timeout: Option<Duration>,
}

impl Dispatcher {
    /// Moves `allocator` onto a dedicated worker thread and returns a handle
    /// to it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WorkerSpawn`] if the worker thread could not be spawned.
    pub fn spawn<S>(allocator: Allocator<S>, options: DispatcherOptions) -> Result<Self>
    where
        S: Store + Send + 'static,
    {
        let (intake, rx) = mpsc::unbounded_channel();

        thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker_loop(rx, allocator))
            .map_err(Error::WorkerSpawn)?;

        Ok(Self {
            intake,
            shutdown_token: CancellationToken::new(),
            request_timeout: options.request_timeout,
        })
    }

    /// Allocates one identifier.
    ///
    /// Suspends until the worker has persisted the identifier and replied.
    ///
    /// # Errors
    ///
    /// - Allocation failures from the worker ([`Error::Persist`],
    ///   [`Error::PoolDepleted`]).
    /// - [`Error::ServiceShutdown`] once [`shutdown`](Self::shutdown) began.
    /// - [`Error::Timeout`] if a request timeout is configured and expired.
    /// - [`Error::Channel`] if the worker is gone.
    pub async fn allocate(&self) -> Result<UniqueId> {
        let reply = self.enqueue()?;

        let reply = match self.request_timeout {
            None => reply.await,
            Some(after) => timeout(after, reply)
                .await
                .map_err(|_| Error::Timeout { after })?,
        };

        reply.map_err(|_| self.worker_gone("allocator worker dropped the request"))?
    }

    /// Places an allocation request on the intake and returns its reply
    /// channel.
    pub(crate) fn enqueue(&self) -> Result<oneshot::Receiver<Result<UniqueId>>> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        let (reply, rx) = oneshot::channel();
        self.intake
            .send(WorkRequest::Allocate { reply })
            .map_err(|_| self.worker_gone("allocator worker is not running"))?;
        Ok(rx)
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has been called on
    /// any clone of this handle.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Gracefully stops the worker.
    ///
    /// - Refuses new requests on every clone of this handle.
    /// - Queues a stop message behind every request already admitted, so
    ///   those are still answered.
    /// - Waits up to `ack_timeout` for the worker to acknowledge.
    ///
    /// Calling this more than once is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if the worker did not acknowledge in time,
    /// which means it is stalled on the store.
    pub async fn shutdown(&self, ack_timeout: Duration) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::info!("Dispatcher refusing new requests");
        self.shutdown_token.cancel();

        let (response, ack) = oneshot::channel();
        if self
            .intake
            .send(WorkRequest::Shutdown { response })
            .is_err()
        {
            #[cfg(feature = "tracing")]
            tracing::debug!("Allocator worker already stopped");
            return Ok(());
        }

        match timeout(ack_timeout, ack).await {
            Ok(Ok(())) => {
                #[cfg(feature = "tracing")]
                tracing::info!("Allocator worker shut down");
                Ok(())
            }
            // An earlier shutdown stopped the worker before it reached ours.
            Ok(Err(_)) => Ok(()),
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Allocator worker did not acknowledge shutdown within {ack_timeout:?}"
                );
                Err(Error::Timeout { after: ack_timeout })
            }
        }
    }

    fn worker_gone(&self, context: &str) -> Error {
        if self.shutdown_token.is_cancelled() {
            Error::ServiceShutdown
        } else {
            Error::Channel {
                context: context.to_string(),
            }
        }
    }
}
