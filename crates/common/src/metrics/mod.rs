//! Metrics and observability utilities
//!
//! Prometheus-style counters for the lesson lifecycle and HTTP requests,
//! with standardized naming under a common prefix.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

use crate::db::models::{EventKind, Role};

/// Metrics prefix for all classroom metrics
pub const METRICS_PREFIX: &str = "classroom";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,
    0.005,
    0.010,
    0.025,
    0.050,
    0.100,
    0.250,
    0.500,
    1.000,
    2.500,
    5.000,
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Lesson metrics
    describe_counter!(
        format!("{}_lessons_started_total", METRICS_PREFIX),
        Unit::Count,
        "Lessons created by a teacher join"
    );

    describe_counter!(
        format!("{}_lessons_ended_total", METRICS_PREFIX),
        Unit::Count,
        "Lessons closed, by trigger"
    );

    // Participant metrics
    describe_counter!(
        format!("{}_joins_total", METRICS_PREFIX),
        Unit::Count,
        "Successful joins, by effective role"
    );

    describe_counter!(
        format!("{}_join_rejections_total", METRICS_PREFIX),
        Unit::Count,
        "Rejected joins, by error code"
    );

    describe_counter!(
        format!("{}_teacher_downgrades_total", METRICS_PREFIX),
        Unit::Count,
        "Teacher claims without a valid proof, joined as student"
    );

    describe_counter!(
        format!("{}_leaves_total", METRICS_PREFIX),
        Unit::Count,
        "Participant leaves that changed presence"
    );

    // Collaborator failures
    describe_counter!(
        format!("{}_token_issue_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Media access token failures"
    );

    describe_counter!(
        format!("{}_event_append_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Lifecycle events that could not be recorded"
    );

    describe_counter!(
        format!("{}_roster_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Presence updates swallowed during join"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

pub fn record_lesson_started() {
    counter!(format!("{}_lessons_started_total", METRICS_PREFIX)).increment(1);
}

/// `trigger` is `explicit` or `last_teacher_left`
pub fn record_lesson_ended(trigger: &'static str) {
    counter!(
        format!("{}_lessons_ended_total", METRICS_PREFIX),
        "trigger" => trigger
    )
    .increment(1);
}

pub fn record_join(role: Role) {
    counter!(
        format!("{}_joins_total", METRICS_PREFIX),
        "role" => role.as_str()
    )
    .increment(1);
}

pub fn record_join_rejected(code: &'static str) {
    counter!(
        format!("{}_join_rejections_total", METRICS_PREFIX),
        "code" => code
    )
    .increment(1);
}

pub fn record_teacher_downgrade() {
    counter!(format!("{}_teacher_downgrades_total", METRICS_PREFIX)).increment(1);
}

pub fn record_leave() {
    counter!(format!("{}_leaves_total", METRICS_PREFIX)).increment(1);
}

pub fn record_token_failure() {
    counter!(format!("{}_token_issue_errors_total", METRICS_PREFIX)).increment(1);
}

pub fn record_event_append_failure(kind: EventKind) {
    counter!(
        format!("{}_event_append_errors_total", METRICS_PREFIX),
        "kind" => kind.as_str()
    )
    .increment(1);
}

pub fn record_roster_failure() {
    counter!(format!("{}_roster_errors_total", METRICS_PREFIX)).increment(1);
}
