//! Client metrics
//!
//! OpenTelemetry instruments describing connection health, request traffic
//! and event delivery. Instruments are created from the global meter
//! provider, so they export wherever
//! [`init_observability`](kms_rpc_core::init_observability) sent them, and
//! are no-ops when nothing is installed.
//!
//! # Metrics Collected
//!
//! - **kms.client.connection.state**: current state code (gauge)
//! - **kms.client.requests.total**: requests by method and status (counter)
//! - **kms.client.request.duration**: request latency in seconds (histogram)
//! - **kms.client.errors.total**: failures by error kind (counter)
//! - **kms.client.reconnection.attempts** / **.success** (counters)
//! - **kms.client.notifications.received**: events by type (counter)
//! - **kms.client.notifications.dropped**: events lost to backlog overflow (counter)
//! - **kms.client.frames.malformed**: inbound frames of no known shape (counter)

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};
use std::fmt;

const METER_NAME: &str = "kms-rpc-client";

/// Client metrics for monitoring
pub struct ClientMetrics {
    /// See [`ConnectionState::as_metric`](crate::ConnectionState::as_metric)
    pub connection_state: Gauge<i64>,
    pub requests_total: Counter<u64>,
    pub request_duration: Histogram<f64>,
    pub errors_total: Counter<u64>,
    pub reconnection_attempts: Counter<u64>,
    pub reconnection_success: Counter<u64>,
    pub notifications_received: Counter<u64>,
    pub notifications_dropped: Counter<u64>,
    pub malformed_frames: Counter<u64>,
}

impl ClientMetrics {
    /// Instruments from the global meter provider
    pub fn new() -> Self {
        Self::new_with_meter(&global::meter(METER_NAME))
    }

    /// Instruments from a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            connection_state: meter
                .i64_gauge("kms.client.connection.state")
                .with_description(
                    "Connection state (0=disconnected, 1=connecting, 2=connected, 3=reconnecting, 4=closed)",
                )
                .build(),
            requests_total: meter
                .u64_counter("kms.client.requests.total")
                .with_description("Total number of requests sent")
                .build(),
            request_duration: meter
                .f64_histogram("kms.client.request.duration")
                .with_description("Request duration in seconds")
                .with_unit("s")
                .build(),
            errors_total: meter
                .u64_counter("kms.client.errors.total")
                .with_description("Total number of failed requests by error kind")
                .build(),
            reconnection_attempts: meter
                .u64_counter("kms.client.reconnection.attempts")
                .with_description("Total number of reconnection attempts")
                .build(),
            reconnection_success: meter
                .u64_counter("kms.client.reconnection.success")
                .with_description("Total number of successful reconnections")
                .build(),
            notifications_received: meter
                .u64_counter("kms.client.notifications.received")
                .with_description("Total number of server events received")
                .build(),
            notifications_dropped: meter
                .u64_counter("kms.client.notifications.dropped")
                .with_description("Events dropped because a listener's backlog overflowed")
                .build(),
            malformed_frames: meter
                .u64_counter("kms.client.frames.malformed")
                .with_description("Inbound frames matching no known shape")
                .build(),
        }
    }

    pub fn update_connection_state(&self, state: i64) {
        self.connection_state.record(state, &[]);
    }

    /// Record a completed request
    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    pub fn record_error(&self, kind: &str) {
        self.errors_total
            .add(1, &[KeyValue::new("kind", kind.to_string())]);
    }

    pub fn record_reconnection_attempt(&self) {
        self.reconnection_attempts.add(1, &[]);
    }

    pub fn record_reconnection_success(&self) {
        self.reconnection_success.add(1, &[]);
    }

    pub fn record_notification(&self, event_type: &str) {
        self.notifications_received
            .add(1, &[KeyValue::new("event_type", event_type.to_string())]);
    }

    pub fn record_dropped_events(&self, event_type: &str, count: u64) {
        self.notifications_dropped
            .add(count, &[KeyValue::new("event_type", event_type.to_string())]);
    }

    pub fn record_malformed_frame(&self) {
        self.malformed_frames.add(1, &[]);
    }
}

impl Default for ClientMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClientMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientMetrics")
            .field("meter", &METER_NAME)
            .finish_non_exhaustive()
    }
}
