use crate::{Allocator, Result, Store, UniqueId, dispatcher::request::WorkRequest};
use tokio::sync::{mpsc, oneshot};

/// Worker loop that exclusively owns the [`Allocator`].
///
/// Runs on a dedicated thread and blocks on the intake between requests, so
/// the store's synchronous I/O never stalls an async runtime. Requests are
/// served strictly in arrival order.
///
/// Per-request errors are delivered to the requester and never end the loop.
/// The loop exits on [`WorkRequest::Shutdown`] or once every
/// [`Dispatcher`](crate::Dispatcher) handle has been dropped.
pub(crate) fn worker_loop<S>(
    mut rx: mpsc::UnboundedReceiver<WorkRequest>,
    mut allocator: Allocator<S>,
) where
    S: Store,
{
    #[cfg(feature = "tracing")]
    tracing::debug!("Allocator worker started, next id is {}", allocator.peek_next());

    while let Some(work) = rx.blocking_recv() {
        match work {
            WorkRequest::Allocate { reply } => handle_allocate(&mut allocator, reply),
            WorkRequest::Shutdown { response } => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Allocator worker received shutdown signal");

                if response.send(()).is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Allocator worker failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("Allocator worker stopped, next id is {}", allocator.peek_next());
}

fn handle_allocate<S>(allocator: &mut Allocator<S>, reply: oneshot::Sender<Result<UniqueId>>)
where
    S: Store,
{
    // Nobody is listening, so don't spend an id on this request.
    if reply.is_closed() {
        #[cfg(feature = "tracing")]
        tracing::debug!("Skipping abandoned request");
        return;
    }

    let result = allocator.allocate();

    #[cfg(feature = "tracing")]
    if let Err(e) = &result {
        tracing::warn!("Allocation failed: {e}");
    }

    if let Err(_unsent) = reply.send(result) {
        // The caller left between the check above and now. Its id is
        // persisted, so it is lost rather than ever reissued.
        #[cfg(feature = "tracing")]
        if let Ok(id) = _unsent {
            tracing::warn!("Caller dropped before receiving id {id}");
        }
    }
}
