//! HTTP API - event ingestion, status queries, and metrics exposition
//!
//! Routes:
//! - `POST /events/location` - ingest a position report, returns the transition
//! - `GET /vehicles/{id}/status` - latest committed state for one vehicle
//! - `GET /zones` - the loaded zone registry
//! - `GET /health` - liveness probe
//! - `GET /metrics` - Prometheus text exposition
//!
//! Uses hyper for the HTTP server.

use crate::domain::types::{VehicleId, VehicleStatus};
use crate::infra::metrics::{Metrics, MetricsSummary, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS};
use crate::services::engine::TransitionEngine;
use crate::services::registry::ZoneRegistry;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Shared handles the request handler needs
struct AppState {
    engine: Arc<TransitionEngine>,
    registry: Arc<ZoneRegistry>,
    metrics: Arc<Metrics>,
    site_id: String,
}

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with site label
fn write_metric(
    output: &mut String,
    name: &str,
    help: &str,
    typ: MetricType,
    site: &str,
    val: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{site=\"{site}\"}} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    site: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    bounds: &[u64; 10],
    avg: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in bounds.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"+Inf\"}} {cumulative}");

    let count: u64 = buckets.iter().sum();
    let sum = avg * count;
    let _ = writeln!(output, "{name}_sum{{site=\"{site}\"}} {sum}");
    let _ = writeln!(output, "{name}_count{{site=\"{site}\"}} {count}");
}

/// Format metrics in Prometheus text exposition format
fn format_prometheus_metrics(metrics: &Metrics, active_vehicles: usize, site_id: &str) -> String {
    let summary = metrics.report(active_vehicles);
    let mut output = String::with_capacity(4096);

    write_event_metrics(&mut output, site_id, &summary);
    write_latency_metrics(&mut output, site_id, &summary);
    write_zone_metrics(&mut output, site_id, &summary, metrics);

    output
}

fn write_event_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "geofence_events_total",
        "Total location events accepted",
        MetricType::Counter,
        site,
        summary.events_total,
    );
    let _ = writeln!(output, "# HELP geofence_events_per_sec Events processed per second");
    let _ = writeln!(output, "# TYPE geofence_events_per_sec gauge");
    let _ =
        writeln!(output, "geofence_events_per_sec{{site=\"{site}\"}} {:.2}", summary.events_per_sec);
    write_metric(
        output,
        "geofence_events_rejected_total",
        "Location events rejected by validation",
        MetricType::Counter,
        site,
        summary.events_rejected,
    );
    write_metric(
        output,
        "geofence_events_duplicate_total",
        "Duplicate deliveries suppressed by event id",
        MetricType::Counter,
        site,
        summary.events_duplicate,
    );
    write_metric(
        output,
        "geofence_events_debounced_total",
        "Events inside the per-vehicle debounce window",
        MetricType::Counter,
        site,
        summary.events_debounced,
    );
    write_metric(
        output,
        "geofence_active_vehicles",
        "Vehicles observed so far",
        MetricType::Gauge,
        site,
        summary.active_vehicles as u64,
    );
}

fn write_latency_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_histogram(
        output,
        "geofence_event_latency_us",
        "Event processing latency in microseconds",
        site,
        &summary.lat_buckets,
        &METRICS_BUCKET_BOUNDS,
        summary.avg_latency_us,
    );
    write_metric(
        output,
        "geofence_event_latency_p50_us",
        "50th percentile event latency",
        MetricType::Gauge,
        site,
        summary.lat_p50_us,
    );
    write_metric(
        output,
        "geofence_event_latency_p95_us",
        "95th percentile event latency",
        MetricType::Gauge,
        site,
        summary.lat_p95_us,
    );
    write_metric(
        output,
        "geofence_event_latency_p99_us",
        "99th percentile event latency",
        MetricType::Gauge,
        site,
        summary.lat_p99_us,
    );
}

fn write_zone_metrics(output: &mut String, site: &str, summary: &MetricsSummary, metrics: &Metrics) {
    write_metric(
        output,
        "geofence_transitions_total",
        "Accepted events that changed zone membership",
        MetricType::Counter,
        site,
        summary.transitions_total,
    );
    write_metric(
        output,
        "geofence_zone_enters_total",
        "Zone enters emitted",
        MetricType::Counter,
        site,
        summary.zone_enters_total,
    );
    write_metric(
        output,
        "geofence_zone_exits_total",
        "Zone exits emitted",
        MetricType::Counter,
        site,
        summary.zone_exits_total,
    );

    let _ = writeln!(output, "# HELP geofence_zone_occupancy Number of vehicles in each zone");
    let _ = writeln!(output, "# TYPE geofence_zone_occupancy gauge");
    for (zone_id, count) in metrics.zone_occupancy() {
        let _ = writeln!(
            output,
            "geofence_zone_occupancy{{site=\"{site}\",zone_id=\"{zone_id}\"}} {count}"
        );
    }
}

fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .expect("static response should not fail")
}

fn detail_response(status: StatusCode, detail: &str) -> Response<Full<Bytes>> {
    // FastAPI-style error envelope kept for client compatibility
    let body = serde_json::json!({ "detail": detail }).to_string();
    json_response(status, body)
}

/// Ingest one location event: parse, process, return the transition
async fn handle_location_event(
    body: hyper::body::Incoming,
    state: &AppState,
) -> Response<Full<Bytes>> {
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => return detail_response(StatusCode::BAD_REQUEST, &format!("body read: {e}")),
    };

    let event = match serde_json::from_slice(&bytes) {
        Ok(event) => event,
        Err(e) => return detail_response(StatusCode::BAD_REQUEST, &format!("invalid event: {e}")),
    };

    match state.engine.process_event(&event) {
        Ok(transition) => match serde_json::to_string(&transition) {
            Ok(body) => json_response(StatusCode::OK, body),
            Err(e) => {
                error!(error = %e, "transition_serialize_error");
                detail_response(StatusCode::INTERNAL_SERVER_ERROR, "serialization failure")
            }
        },
        Err(e) => detail_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

/// Extract the vehicle id from a `/vehicles/{id}/status` path.
///
/// Empty and nested ids do not match and fall through to 404.
fn vehicle_status_path(path: &str) -> Option<&str> {
    let vehicle_id = path.strip_prefix("/vehicles/")?.strip_suffix("/status")?;
    if vehicle_id.is_empty() || vehicle_id.contains('/') {
        return None;
    }
    Some(vehicle_id)
}

fn handle_vehicle_status(vehicle_id: &str, state: &AppState) -> Response<Full<Bytes>> {
    let vehicle_id = VehicleId::from(vehicle_id);
    match state.engine.status(&vehicle_id) {
        Some(status) => status_response(&status),
        None => detail_response(StatusCode::NOT_FOUND, "vehicle not found"),
    }
}

fn status_response(status: &VehicleStatus) -> Response<Full<Bytes>> {
    match serde_json::to_string(status) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "status_serialize_error");
            detail_response(StatusCode::INTERNAL_SERVER_ERROR, "serialization failure")
        }
    }
}

/// Zone listing as a bare JSON array, in registry load order
fn handle_zones(state: &AppState) -> Response<Full<Bytes>> {
    match serde_json::to_string(state.registry.all()) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(e) => {
            error!(error = %e, "zones_serialize_error");
            detail_response(StatusCode::INTERNAL_SERVER_ERROR, "serialization failure")
        }
    }
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    match (req.method(), path.as_str()) {
        (&Method::POST, "/events/location") => {
            Ok(handle_location_event(req.into_body(), &state).await)
        }
        (&Method::GET, "/zones") => Ok(handle_zones(&state)),
        (&Method::GET, "/health") => {
            let body = serde_json::json!({
                "status": "ok",
                "zones": state.registry.len(),
            })
            .to_string();
            Ok(json_response(StatusCode::OK, body))
        }
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(
                &state.metrics,
                state.engine.active_vehicles(),
                &state.site_id,
            );
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail"))
        }
        (&Method::GET, p) => match vehicle_status_path(p) {
            Some(vehicle_id) => Ok(handle_vehicle_status(vehicle_id, &state)),
            None => Ok(detail_response(StatusCode::NOT_FOUND, "not found")),
        },
        _ => Ok(detail_response(StatusCode::NOT_FOUND, "not found")),
    }
}

/// Start the HTTP API server, serving until shutdown is signalled
pub async fn start_http_server(
    bind_address: &str,
    port: u16,
    engine: Arc<TransitionEngine>,
    registry: Arc<ZoneRegistry>,
    metrics: Arc<Metrics>,
    site_id: String,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!("{bind_address}:{port}").parse()?;
    let listener = TcpListener::bind(addr).await?;
    let state = Arc::new(AppState { engine, registry, metrics, site_id });

    info!(addr = %addr, site = %state.site_id, "http_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let state = state.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let state = state.clone();
                                async move { handle_request(req, state).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "http_connection_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "http_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("http_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
