//! Serving loop and graceful shutdown.
//!
//! Once `signal` resolves:
//!
//! 1. axum stops accepting connections and finishes the requests it already
//!    admitted, which may still allocate.
//! 2. The allocation worker is stopped with whatever is left of the grace
//!    period.
//!
//! A single deadline bounds both steps.

use crate::server::service::handler::IdService;
use anyhow::Context;
use core::time::Duration;
use tokio::{
    net::TcpListener,
    time::{Instant, timeout_at},
};
use tokio_util::sync::CancellationToken;

/// Serves `service` on `listener` until `signal` resolves, then shuts down
/// within `grace`.
///
/// # Errors
///
/// Returns an error only if the HTTP server fails before `signal` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    service: IdService,
    grace: Duration,
    signal: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    let stop_accepting = CancellationToken::new();
    let server = axum::serve(listener, service.clone().router())
        .with_graceful_shutdown(stop_accepting.clone().cancelled_owned())
        .into_future();
    tokio::pin!(server);

    tracing::info!("Server is ready");

    tokio::select! {
        res = &mut server => {
            tracing::error!("Server stopped unexpectedly");
            stop_worker(&service, grace).await;
            return res.context("HTTP server failed");
        }
        () = signal => {}
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
    let deadline = Instant::now() + grace;

    stop_accepting.cancel();
    match timeout_at(deadline, &mut server).await {
        Ok(Ok(())) => tracing::info!("HTTP connections drained"),
        Ok(Err(e)) => tracing::error!("Server error during shutdown: {e}"),
        Err(_) => tracing::warn!(
            "Grace period of {grace:?} elapsed, abandoning in-flight requests"
        ),
    }

    stop_worker(&service, deadline.saturating_duration_since(Instant::now())).await;
    Ok(())
}

async fn stop_worker(service: &IdService, ack_timeout: Duration) {
    if let Err(e) = service.shutdown(ack_timeout).await {
        tracing::error!("Error during allocator shutdown: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
        sync::oneshot,
    };
    use uidpool::{Allocator, Dispatcher, DispatcherOptions, Store};

    /// Reports each persist, then holds it until the gate opens.
    struct GatedStore {
        entered: mpsc::Sender<u64>,
        gate: mpsc::Receiver<()>,
    }

    impl Store for GatedStore {
        fn initialize(&mut self) -> uidpool::Result<Option<u64>> {
            Ok(None)
        }

        fn persist(&mut self, id: u64) -> uidpool::Result<()> {
            let _ = self.entered.send(id);
            let _ = self.gate.recv();
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn in_flight_request_completes_before_worker_stops() {
        let (entered_tx, entered) = mpsc::channel();
        let (gate, gate_rx) = mpsc::channel();
        let store = GatedStore {
            entered: entered_tx,
            gate: gate_rx,
        };
        let dispatcher =
            Dispatcher::spawn(Allocator::new(store).unwrap(), DispatcherOptions::default())
                .unwrap();
        let service = IdService::from_dispatcher(dispatcher);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(
            listener,
            service.clone(),
            Duration::from_secs(5),
            async {
                let _ = stopped.await;
            },
        ));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                b"POST /uid HTTP/1.1\r\nhost: localhost\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
            )
            .await
            .unwrap();

        let id = tokio::task::spawn_blocking(move || entered.recv_timeout(Duration::from_secs(5)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(id, 1);

        // The request is mid-allocation when the signal arrives.
        stop.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!service.is_shutting_down());

        drop(gate);
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 201"), "{response}");
        assert!(response.ends_with(r#"{"value":1}"#), "{response}");

        server.await.unwrap().unwrap();
        assert!(service.is_shutting_down());
    }
}
