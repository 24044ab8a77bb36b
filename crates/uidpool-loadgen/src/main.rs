//! Fires concurrent `POST` requests at a `uidpool-server` and fails on the
//! first duplicate, zero, or error response.
//!
//! ```bash
//! cargo run -p uidpool-loadgen -- --requests 500 --concurrency 50
//! ```

use anyhow::{Context, bail, ensure};
use clap::Parser;
use futures::stream::{FuturesUnordered, StreamExt};
use http_body_util::{BodyExt, Empty};
use hyper::{Method, Request, StatusCode, Uri, body::Bytes};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use serde::Deserialize;
use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Semaphore;

type HttpClient = Client<HttpConnector, Empty<Bytes>>;

#[derive(Parser, Debug)]
#[command(
    name = "uidpool-loadgen",
    version,
    about = "Checks a uidpool server for duplicate IDs under concurrent load"
)]
struct Args {
    /// Allocation endpoint.
    #[arg(long, env = "UIDPOOL_URL", default_value = "http://127.0.0.1:8080/uid")]
    url: Uri,

    /// Total number of IDs to request.
    #[arg(long, default_value_t = 500)]
    requests: usize,

    /// Maximum requests in flight at once. `0` sends everything at once.
    #[arg(long, default_value_t = 50)]
    concurrency: usize,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    value: u64,
}

#[derive(Debug)]
struct LoadResult {
    count: usize,
    duration: Duration,
    min: u64,
    max: u64,
}

impl LoadResult {
    fn throughput(&self) -> f64 {
        self.count as f64 / self.duration.as_secs_f64()
    }

    fn report(&self) {
        println!(
            "{:>10} | {:>10} | {:>12} | {:>15}",
            "Count", "Time (ms)", "Throughput/s", "ID range"
        );
        println!("{}", "-".repeat(56));
        println!(
            "{:>10} | {:>10.2} | {:>12.2} | {:>7}..={}",
            self.count,
            self.duration.as_secs_f64() * 1000.0,
            self.throughput(),
            self.min,
            self.max
        );
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    ensure!(args.requests > 0, "--requests must be greater than 0");

    println!(
        "Sending {} requests to {} (concurrency: {})",
        args.requests,
        args.url,
        if args.concurrency == 0 {
            "unbounded".to_string()
        } else {
            args.concurrency.to_string()
        }
    );

    let result = run(&args).await?;
    println!("All responses received. No duplicates!\n");
    result.report();
    Ok(())
}

async fn run(args: &Args) -> anyhow::Result<LoadResult> {
    let client: HttpClient = Client::builder(TokioExecutor::new()).build_http();
    let permits = match args.concurrency {
        0 => args.requests,
        n => n,
    };
    let limiter = Arc::new(Semaphore::new(permits));

    let start = Instant::now();
    let mut tasks = FuturesUnordered::new();
    for _ in 0..args.requests {
        let client = client.clone();
        let url = args.url.clone();
        let limiter = Arc::clone(&limiter);
        tasks.push(tokio::spawn(async move {
            let _permit = limiter.acquire_owned().await?;
            request_id(&client, url).await
        }));
    }

    let mut seen = HashSet::with_capacity(args.requests);
    while let Some(joined) = tasks.next().await {
        let id = joined.context("request task panicked")??;
        ensure!(id != 0, "server returned the failure sentinel as an ID");
        if !seen.insert(id) {
            bail!("duplicate ID detected: {id}");
        }
    }
    let duration = start.elapsed();

    Ok(LoadResult {
        count: seen.len(),
        duration,
        min: seen.iter().copied().min().unwrap_or_default(),
        max: seen.iter().copied().max().unwrap_or_default(),
    })
}

async fn request_id(client: &HttpClient, url: Uri) -> anyhow::Result<u64> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(url)
        .body(Empty::<Bytes>::new())?;

    let response = client.request(request).await.context("request failed")?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();

    if status != StatusCode::CREATED {
        bail!(
            "unexpected status {status}: {}",
            String::from_utf8_lossy(&body)
        );
    }

    let id: IdResponse = serde_json::from_slice(&body).context("malformed response body")?;
    Ok(id.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults() {
        let args = Args::try_parse_from(["uidpool-loadgen"]).unwrap();
        assert_eq!(args.requests, 500);
        assert_eq!(args.concurrency, 50);
        assert_eq!(args.url.path(), "/uid");
    }

    #[test]
    fn decodes_response_body() {
        let id: IdResponse = serde_json::from_slice(br#"{"value":18446744073709551614}"#).unwrap();
        assert_eq!(id.value, u64::MAX - 1);
    }

    #[test]
    fn reports_throughput() {
        let result = LoadResult {
            count: 500,
            duration: Duration::from_millis(250),
            min: 1,
            max: 500,
        };
        assert!((result.throughput() - 2000.0).abs() < f64::EPSILON);
    }
}
