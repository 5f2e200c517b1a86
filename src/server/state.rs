// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Provides server state information, such as status, configuration and the limits individual
//! sessions consult when revising requested parameters.

use std::sync::Arc;

use chrono::Utc;

use crate::core::handle::AtomicHandle;
use crate::sync::*;
use crate::types::{DateTimeUtc, Duration};

use super::{
    config::{OperationalLimits, ServerConfig},
    constants,
    diagnostics::ServerDiagnostics,
};

/// Server state is any state associated with the server as a whole that individual sessions
/// might be interested in. That includes configuration, limits and diagnostics.
pub struct ServerState {
    /// The application URI
    pub application_uri: String,
    /// The application name
    pub application_name: String,
    /// The time the server started
    pub start_time: DateTimeUtc,
    /// Server configuration
    pub config: Arc<RwLock<ServerConfig>>,
    /// The next subscription id - subscriptions are shared across the whole server.
    subscription_ids: AtomicHandle,
    /// Maximum number of sessions, 0 means no limit (danger)
    pub max_sessions: usize,
    /// Maximum session timeout in ms
    pub max_session_timeout_ms: f64,
    /// Maximum number of subscriptions per session, 0 means no limit (danger)
    pub max_subscriptions: usize,
    /// Maximum number of monitored items per subscription, 0 means no limit (danger)
    pub max_monitored_items_per_sub: usize,
    /// Maximum number of queued values in a monitored item, 0 means no limit (danger)
    pub max_monitored_item_queue_size: usize,
    /// Maximum number of publish requests queued per session
    pub max_pending_publish_requests: usize,
    /// Minimum publishing interval (in millis)
    pub min_publishing_interval_ms: Duration,
    /// Minimum sampling interval (in millis)
    pub min_sampling_interval_ms: Duration,
    /// Default keep alive count
    pub default_keep_alive_count: u32,
    /// Maximum keep alive count
    pub max_keep_alive_count: u32,
    /// Maximum lifetime count (3 times as large as max keep alive)
    pub max_lifetime_count: u32,
    /// Operational limits
    pub operational_limits: OperationalLimits,
    /// Diagnostics of the server
    pub diagnostics: Arc<RwLock<ServerDiagnostics>>,
    /// Sets the abort flag that terminates the server's scheduled tasks
    abort: bool,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> ServerState {
        let limits = config.limits.clone();
        let application_uri = config.application_uri.clone();
        let application_name = config.application_name.clone();
        ServerState {
            application_uri,
            application_name,
            start_time: Utc::now(),
            config: Arc::new(RwLock::new(config)),
            subscription_ids: AtomicHandle::new(1),
            max_sessions: limits.max_sessions,
            max_session_timeout_ms: limits.max_session_timeout_ms,
            max_subscriptions: limits.max_subscriptions,
            max_monitored_items_per_sub: limits.max_monitored_items_per_sub,
            max_monitored_item_queue_size: limits.max_monitored_item_queue_size,
            max_pending_publish_requests: limits.max_pending_publish_requests,
            min_publishing_interval_ms: limits.min_publishing_interval_ms,
            min_sampling_interval_ms: limits.min_sampling_interval_ms,
            default_keep_alive_count: constants::DEFAULT_KEEP_ALIVE_COUNT,
            max_keep_alive_count: constants::MAX_KEEP_ALIVE_COUNT,
            max_lifetime_count: constants::MAX_LIFETIME_COUNT,
            operational_limits: limits.operational,
            diagnostics: Arc::new(RwLock::new(ServerDiagnostics::default())),
            abort: false,
        }
    }

    pub fn create_subscription_id(&self) -> u32 {
        self.subscription_ids.next()
    }

    /// Revises a requested session timeout to the server's bounds.
    pub fn revise_session_timeout(&self, requested_timeout_ms: f64) -> f64 {
        if requested_timeout_ms > self.max_session_timeout_ms {
            self.max_session_timeout_ms
        } else if requested_timeout_ms <= 0.0 {
            constants::MIN_SESSION_TIMEOUT
        } else {
            requested_timeout_ms.max(constants::MIN_SESSION_TIMEOUT)
        }
    }

    pub fn is_abort(&self) -> bool {
        self.abort
    }

    pub fn abort(&mut self) {
        info!("Server has been told to abort");
        self.abort = true;
    }
}
