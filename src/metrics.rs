//! Metric helpers for `chatnet`.
//!
//! This module defines metric names and thin helpers over the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to nothing.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking established sessions.
pub const CONNECTIONS_ACTIVE: &str = "chatnet_connections_active";
/// Name of the counter tracking lines moved over the wire.
pub const LINES_TOTAL: &str = "chatnet_lines_total";
/// Name of the counter tracking events handed to handlers.
pub const EVENTS_DISPATCHED: &str = "chatnet_events_dispatched_total";
/// Name of the counter tracking queued messages dropped on disconnect.
pub const THROTTLE_DROPPED: &str = "chatnet_throttle_dropped_total";

/// Direction of a line relative to this client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Received from the server.
    Inbound,
    /// Sent to the server.
    Outbound,
}

impl Direction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the active sessions gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active sessions gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a line moved in `direction`.
pub fn inc_lines(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(LINES_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record one event dispatch.
pub fn inc_events_dispatched() {
    #[cfg(feature = "metrics")]
    counter!(EVENTS_DISPATCHED).increment(1);
}

/// Record `count` queued messages dropped by the throttle.
pub fn add_throttle_dropped(count: usize) {
    #[cfg(feature = "metrics")]
    counter!(THROTTLE_DROPPED).increment(u64::try_from(count).unwrap_or(u64::MAX));
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}
