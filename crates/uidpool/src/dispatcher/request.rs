use crate::{Result, UniqueId};
use tokio::sync::oneshot;

/// A message sent from a [`Dispatcher`](crate::Dispatcher) handle to the
/// worker.
#[derive(Debug)]
pub(crate) enum WorkRequest {
    /// Allocate one identifier.
    ///
    /// - `reply`: Single-use channel for the result. Sending consumes it, so
    ///   a request can never be answered twice.
    Allocate {
        reply: oneshot::Sender<Result<UniqueId>>,
    },

    /// Stop the worker once every request queued ahead of this one has been
    /// answered.
    ///
    /// - `response`: One-shot channel acknowledging the worker stopped.
    Shutdown { response: oneshot::Sender<()> },
}
