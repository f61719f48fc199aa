//! Prometheus metrics collection for gradecast.
//!
//! Exposed on the internal HTTP listener at `/metrics`:
//!
//! - `gradecast_connections_open` - WebSocket connections currently open
//! - `gradecast_sessions{role}` - authenticated sessions by role
//! - `gradecast_auth_failures_total{reason}` - refused or timed-out handshakes
//! - `gradecast_notifications_delivered_total{route}` - direct / broadcast / drained
//! - `gradecast_notifications_queued_total` - events parked for an offline recipient
//! - `gradecast_delivery_misses_total{kind}` - events that never reached a socket
//! - `gradecast_pending_notifications` - events currently parked

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

pub static AUTH_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

pub static NOTIFICATIONS_DELIVERED: OnceLock<IntCounterVec> = OnceLock::new();

pub static NOTIFICATIONS_QUEUED: OnceLock<IntCounter> = OnceLock::new();

pub static DELIVERY_MISSES: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

pub static CONNECTIONS_OPEN: OnceLock<IntGauge> = OnceLock::new();

pub static SESSIONS: OnceLock<IntGaugeVec> = OnceLock::new();

pub static PENDING_NOTIFICATIONS: OnceLock<IntGauge> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at server startup before any metrics are recorded.
/// Until then every recording helper is a no-op.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::error!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(CONNECTIONS_OPEN, IntGauge::new("gradecast_connections_open", "WebSocket connections currently open"));
    register!(SESSIONS, IntGaugeVec::new(Opts::new("gradecast_sessions", "Authenticated sessions by role"), &["role"]));
    register!(AUTH_FAILURES, IntCounterVec::new(Opts::new("gradecast_auth_failures_total", "Failed authentications by reason"), &["reason"]));
    register!(NOTIFICATIONS_DELIVERED, IntCounterVec::new(Opts::new("gradecast_notifications_delivered_total", "Notifications handed to a live connection"), &["route"]));
    register!(NOTIFICATIONS_QUEUED, IntCounter::new("gradecast_notifications_queued_total", "Notifications parked for an offline recipient"));
    register!(DELIVERY_MISSES, IntCounterVec::new(Opts::new("gradecast_delivery_misses_total", "Notifications that did not reach a connection"), &["kind"]));
    register!(PENDING_NOTIFICATIONS, IntGauge::new("gradecast_pending_notifications", "Notifications currently parked"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Recording helpers
// ============================================================================

#[inline]
pub fn connection_opened() {
    if let Some(g) = CONNECTIONS_OPEN.get() {
        g.inc();
    }
}

#[inline]
pub fn connection_closed() {
    if let Some(g) = CONNECTIONS_OPEN.get() {
        g.dec();
    }
}

#[inline]
pub fn session_opened(role: &str) {
    if let Some(g) = SESSIONS.get() {
        g.with_label_values(&[role]).inc();
    }
}

#[inline]
pub fn session_closed(role: &str) {
    if let Some(g) = SESSIONS.get() {
        g.with_label_values(&[role]).dec();
    }
}

#[inline]
pub fn record_auth_failure(reason: &str) {
    if let Some(c) = AUTH_FAILURES.get() {
        c.with_label_values(&[reason]).inc();
    }
}

/// `route` is `direct`, `broadcast` or `drained`.
#[inline]
pub fn record_delivered(route: &str, count: usize) {
    if let Some(c) = NOTIFICATIONS_DELIVERED.get() {
        c.with_label_values(&[route]).inc_by(count as u64);
    }
}

#[inline]
pub fn record_queued() {
    if let Some(c) = NOTIFICATIONS_QUEUED.get() {
        c.inc();
    }
}

/// `kind` is `stale` (registered but the socket was gone), `broadcast`
/// (an admin's socket was gone) or `unroutable` (no recipient named).
#[inline]
pub fn record_miss(kind: &str) {
    if let Some(c) = DELIVERY_MISSES.get() {
        c.with_label_values(&[kind]).inc();
    }
}

#[inline]
pub fn set_pending(total: usize) {
    if let Some(g) = PENDING_NOTIFICATIONS.get() {
        g.set(total as i64);
    }
}
