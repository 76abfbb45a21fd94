//! Prometheus metrics for the channel parser.
//!
//! Exposes:
//! - `telegram_parser_pages_total` (counter per channel)
//! - `telegram_parser_messages_total` (counter per channel, exported/skipped)
//! - `telegram_parser_channels_total` (counter by status)
//! - `telegram_parser_run_duration_seconds` (histogram)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram, register_int_counter_vec, Encoder, Histogram,
    IntCounterVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static PAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "telegram_parser_pages_total",
        "History pages fetched per channel",
        &["channel"]
    )
    .expect("failed to register pages counter")
});

static MESSAGES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "telegram_parser_messages_total",
        "Messages per channel by outcome",
        &["channel", "outcome"]
    )
    .expect("failed to register messages counter")
});

static CHANNELS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "telegram_parser_channels_total",
        "Processed channels by status",
        &["status"]
    )
    .expect("failed to register channels counter")
});

static RUN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    // Exponential buckets from 0.5s up to ~2 hours.
    let buckets =
        prometheus::exponential_buckets(0.5, 2.0, 15).expect("failed to create histogram buckets");
    register_histogram!(
        "telegram_parser_run_duration_seconds",
        "Whole run duration in seconds",
        buckets
    )
    .expect("failed to register run duration histogram")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&PAGES_TOTAL);
    Lazy::force(&MESSAGES_TOTAL);
    Lazy::force(&CHANNELS_TOTAL);
    Lazy::force(&RUN_DURATION);
}

/// Record a channel whose export was written.
pub fn record_channel_export(channel: &str, pages: usize, exported: usize, skipped: usize) {
    init_collectors();
    PAGES_TOTAL
        .with_label_values(&[channel])
        .inc_by(pages as u64);
    MESSAGES_TOTAL
        .with_label_values(&[channel, "exported"])
        .inc_by(exported as u64);
    MESSAGES_TOTAL
        .with_label_values(&[channel, "skipped"])
        .inc_by(skipped as u64);
    CHANNELS_TOTAL.with_label_values(&["ok"]).inc();
}

/// Record a channel that failed before its export was written.
pub fn record_channel_failure() {
    init_collectors();
    CHANNELS_TOTAL.with_label_values(&["error"]).inc();
}

pub fn record_run(duration: Duration) {
    init_collectors();
    RUN_DURATION.observe(duration.as_secs_f64());
}

fn plain_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
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
            "encode error",
        ));
    }

    let mut response = plain_response(StatusCode::OK, buffer);
    if let Ok(content_type) = HeaderValue::from_str(encoder.format_type()) {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    Ok(response)
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => Ok(plain_response(StatusCode::NOT_FOUND, Bytes::new())),
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
