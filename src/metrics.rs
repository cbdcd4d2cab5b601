//! Prometheus metrics for the eraser.
//!
//! Exposes:
//! - `tgeraser_run_duration_seconds` (histogram)
//! - `tgeraser_run_total` (counter with status)
//! - `tgeraser_messages_found_total` / `tgeraser_messages_deleted_total` (counters)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram, register_int_counter, register_int_counter_vec,
    Encoder, Histogram, IntCounter, IntCounterVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static RUN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    // Exponential buckets from 1s up to ~4.5 hours.
    let buckets =
        prometheus::exponential_buckets(1.0, 2.0, 15).expect("failed to create histogram buckets");
    register_histogram!(
        "tgeraser_run_duration_seconds",
        "Duration of one erase cycle in seconds",
        buckets
    )
    .expect("failed to register run duration histogram")
});

static RUN_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "tgeraser_run_total",
        "Erase cycles by status",
        &["status"]
    )
    .expect("failed to register run counter")
});

static MESSAGES_FOUND: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tgeraser_messages_found_total",
        "Own messages found for deletion"
    )
    .expect("failed to register found counter")
});

static MESSAGES_DELETED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "tgeraser_messages_deleted_total",
        "Messages the server reported as deleted"
    )
    .expect("failed to register deleted counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&RUN_DURATION);
    Lazy::force(&RUN_TOTAL);
    Lazy::force(&MESSAGES_FOUND);
    Lazy::force(&MESSAGES_DELETED);
}

/// Record one erased conversation.
pub fn record_target(found: usize, deleted: usize) {
    init_collectors();
    MESSAGES_FOUND.inc_by(found as u64);
    MESSAGES_DELETED.inc_by(deleted as u64);
}

/// Record a finished erase cycle.
pub fn record_run(duration: Duration, success: bool) {
    init_collectors();
    RUN_DURATION.observe(duration.as_secs_f64());
    RUN_TOTAL
        .with_label_values(&[if success { "ok" } else { "error" }])
        .inc();
}

fn plain_response(status: StatusCode, body: Full<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        return Ok(plain_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            Full::from("encode error"),
        ));
    }

    let mut response = plain_response(StatusCode::OK, Full::from(buffer));
    if let Ok(value) = hyper::header::HeaderValue::from_str(encoder.format_type()) {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, value);
    }
    Ok(response)
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => Ok(plain_response(StatusCode::NOT_FOUND, Full::new(Bytes::new()))),
    }
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}
