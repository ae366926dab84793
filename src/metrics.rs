use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use axum::{Router, routing::get};
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
use opentelemetry_sdk::metrics::{MetricError, SdkMeterProvider};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<prometheus::Registry>,
    _provider: SdkMeterProvider,
    pub workspace: String,

    // Sync metrics
    pub sync_requests: Counter<u64>,
    pub sync_errors: Counter<u64>,
    pub sync_latency: Histogram<f64>,
    pub blocks_processed: Counter<u64>,
    pub transactions_skipped: Counter<u64>,
    pub traces_synced: Counter<u64>,

    // RPC metrics
    pub rpc_requests: Counter<u64>,
    pub rpc_errors: Counter<u64>,
    pub rpc_latency: Histogram<f64>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("workspace", &self.workspace)
            .finish_non_exhaustive()
    }
}

impl Metrics {
    pub fn new(workspace: String) -> Result<Self, MetricError> {
        // Create a new prometheus registry
        let registry = prometheus::Registry::new();

        // Configure OpenTelemetry to use this registry
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        // Set up a meter to create instruments
        let provider = SdkMeterProvider::builder().with_reader(exporter).build();
        let meter = provider.meter("ethernal_metrics");

        let sync_requests = meter
            .u64_counter("ethernal_sync_requests")
            .with_description("Number of sync calls issued to the backend")
            .build();

        let sync_errors = meter
            .u64_counter("ethernal_sync_errors")
            .with_description("Number of sync calls that failed")
            .build();

        let sync_latency = meter
            .f64_histogram("ethernal_sync_latency")
            .with_description("Backend sync call latency")
            .with_boundaries(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
            .with_unit("s")
            .build();

        let blocks_processed = meter
            .u64_counter("ethernal_blocks_processed")
            .with_description("Total number of block notifications processed")
            .build();

        let transactions_skipped = meter
            .u64_counter("ethernal_transactions_skipped")
            .with_description("Transactions skipped because their receipt was unavailable")
            .build();

        let traces_synced = meter
            .u64_counter("ethernal_traces_synced")
            .with_description("Number of transaction traces pushed")
            .build();

        let rpc_requests = meter
            .u64_counter("ethernal_rpc_requests")
            .with_description("Number of chain client requests made")
            .build();

        let rpc_errors = meter
            .u64_counter("ethernal_rpc_errors")
            .with_description("Number of chain client errors encountered")
            .build();

        let rpc_latency = meter
            .f64_histogram("ethernal_rpc_latency")
            .with_description("Chain client request latency")
            .with_boundaries(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.2, 0.5, 1.0, 5.0,
            ])
            .with_unit("s")
            .build();

        Ok(Self {
            registry: Arc::new(registry),
            _provider: provider,
            workspace,
            sync_requests,
            sync_errors,
            sync_latency,
            blocks_processed,
            transactions_skipped,
            traces_synced,
            rpc_requests,
            rpc_errors,
            rpc_latency,
        })
    }

    fn labels(&self, method: &'static str) -> [KeyValue; 2] {
        [
            KeyValue::new("workspace", self.workspace.clone()),
            KeyValue::new("method", method),
        ]
    }

    pub fn record_sync(&self, operation: &'static str, start: Instant, failed: bool) {
        let labels = self.labels(operation);
        self.sync_requests.add(1, &labels);
        self.sync_latency.record(start.elapsed().as_secs_f64(), &labels);
        if failed {
            self.sync_errors.add(1, &labels);
        }
    }

    pub fn record_rpc(&self, method: &'static str, start: Instant, failed: bool) {
        let labels = self.labels(method);
        self.rpc_requests.add(1, &labels);
        self.rpc_latency.record(start.elapsed().as_secs_f64(), &labels);
        if failed {
            self.rpc_errors.add(1, &labels);
        }
    }

    pub fn count(&self, counter: &Counter<u64>) {
        counter.add(1, &[KeyValue::new("workspace", self.workspace.clone())]);
    }

    pub async fn start_metrics_server(&self, addr: &str, port: u16) -> anyhow::Result<()> {
        let addr = format!("{addr}:{port}").parse::<SocketAddr>()?;
        let registry = self.registry.clone();

        let app = Router::new().route("/metrics", get(move || metrics_handler(registry.clone())));

        // Determine the access URL based on the binding address. Only used for logging.
        let access_url = if addr.ip().is_unspecified() {
            format!("http://localhost:{port}/metrics")
        } else {
            format!("http://{}:{port}/metrics", addr.ip())
        };

        info!(
            "Starting metrics server - binding to {} (accessible at {})",
            addr, access_url
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;

        // Spawn the server in a separate task
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Metrics server stopped: {}", e);
            }
        });

        Ok(())
    }
}

async fn metrics_handler(registry: Arc<prometheus::Registry>) -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
