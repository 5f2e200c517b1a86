// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Server limits and defaults. Configuration can tighten most of these; the constants are the
//! out-of-the-box values.

/// Maximum number of simultaneous sessions
pub const MAX_SESSIONS: usize = 50;
/// Maximum time in ms that a session can live for before timing out
pub const MAX_SESSION_TIMEOUT: f64 = 60_000f64;
/// Minimum time in ms a session timeout can be revised down to
pub const MIN_SESSION_TIMEOUT: f64 = 1_000f64;
/// Cap on the cadence of the session expiry sweep in ms
pub const SESSION_EXPIRY_CHECK_CAP: u64 = 5_000;

/// Maximum number of subscriptions per session
pub const MAX_SUBSCRIPTIONS: usize = 100;
/// Maximum number of monitored items per subscription
pub const MAX_MONITORED_ITEMS_PER_SUB: usize = 1_000;
/// Maximum queue size of a monitored item
pub const MAX_MONITORED_ITEM_QUEUE_SIZE: usize = 10;
/// Maximum number of publish requests the server will queue per session
pub const MAX_PENDING_PUBLISH_REQUESTS: usize = 20;
/// Time in ms after which a queued publish request is failed back with a timeout
pub const PUBLISH_REQUEST_TIMEOUT: i64 = 30_000;
/// Maximum number of unacknowledged notifications retained per subscription for republish
pub const MAX_RETRANSMISSION_QUEUE_SIZE: usize = 100;
/// Maximum number of notification messages a subscription will hold ready for transmission
pub const MAX_QUEUED_NOTIFICATIONS: usize = 100;

/// Minimum publishing interval of a subscription in ms
pub const MIN_PUBLISHING_INTERVAL_MS: f64 = 100f64;
/// Minimum sampling interval of a monitored item in ms
pub const MIN_SAMPLING_INTERVAL_MS: f64 = 100f64;
/// Default keep alive count when the client requests 0
pub const DEFAULT_KEEP_ALIVE_COUNT: u32 = 10;
/// Maximum keep alive count
pub const MAX_KEEP_ALIVE_COUNT: u32 = 30_000;
/// Maximum lifetime count (3 times as large as max keep alive)
pub const MAX_LIFETIME_COUNT: u32 = MAX_KEEP_ALIVE_COUNT * 3;

/// Interval in ms between subscription timer ticks. Publishing and sampling intervals are
/// quantized to this rate.
pub const SUBSCRIPTION_TIMER_RATE_MS: u64 = 50;

/// Maximum number of continuation points held per session
pub const MAX_BROWSE_CONTINUATION_POINTS: usize = 10;
/// Default max references returned per browsed node
pub const DEFAULT_MAX_REFERENCES_PER_NODE: u32 = 255;

// Operational limits - the largest request arrays each service accepts
pub const MAX_NODES_PER_READ: usize = 50;
pub const MAX_NODES_PER_WRITE: usize = 50;
pub const MAX_NODES_PER_BROWSE: usize = 50;
pub const MAX_NODES_PER_TRANSLATE_BROWSE_PATHS_TO_NODE_IDS: usize = 50;
pub const MAX_NODES_PER_REGISTER_NODES: usize = 50;
pub const MAX_NODES_PER_METHOD_CALL: usize = 10;
pub const MAX_MONITORED_ITEMS_PER_CALL: usize = 500;
