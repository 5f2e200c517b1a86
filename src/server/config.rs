// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Provides configuration settings for the server including serialization and deserialization
//! from file.

use std::collections::BTreeMap;

use crate::core::config::Config;

use super::constants;

pub const ANONYMOUS_USER_TOKEN_ID: &str = "ANONYMOUS";

/// A username / password pair a client may activate a session with.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ServerUserToken {
    /// User name
    pub user: String,
    /// Password
    pub pass: String,
}

impl ServerUserToken {
    /// Create a user pass token
    pub fn user_pass<T>(user: T, pass: T) -> Self
    where
        T: Into<String>,
    {
        ServerUserToken {
            user: user.into(),
            pass: pass.into(),
        }
    }

    /// Test if the token is valid.
    pub fn is_valid(&self, id: &str) -> bool {
        let mut valid = true;
        if id == ANONYMOUS_USER_TOKEN_ID {
            error!(
                "User token {} is invalid because id is a reserved value, use another value.",
                id
            );
            valid = false;
        }
        if self.user.is_empty() {
            error!("User token {} has an empty user name.", id);
            valid = false;
        }
        valid
    }
}

/// The largest request arrays each batched service accepts. Requests above a limit fail whole
/// with `BadTooManyOperations`.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct OperationalLimits {
    pub max_nodes_per_read: usize,
    pub max_nodes_per_write: usize,
    pub max_nodes_per_browse: usize,
    pub max_nodes_per_translate_browse_paths_to_node_ids: usize,
    pub max_nodes_per_register_nodes: usize,
    pub max_nodes_per_method_call: usize,
    pub max_monitored_items_per_call: usize,
}

impl Default for OperationalLimits {
    fn default() -> Self {
        Self {
            max_nodes_per_read: constants::MAX_NODES_PER_READ,
            max_nodes_per_write: constants::MAX_NODES_PER_WRITE,
            max_nodes_per_browse: constants::MAX_NODES_PER_BROWSE,
            max_nodes_per_translate_browse_paths_to_node_ids:
                constants::MAX_NODES_PER_TRANSLATE_BROWSE_PATHS_TO_NODE_IDS,
            max_nodes_per_register_nodes: constants::MAX_NODES_PER_REGISTER_NODES,
            max_nodes_per_method_call: constants::MAX_NODES_PER_METHOD_CALL,
            max_monitored_items_per_call: constants::MAX_MONITORED_ITEMS_PER_CALL,
        }
    }
}

/// Server limits on sessions, subscriptions and monitored items.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct Limits {
    /// Maximum number of simultaneous sessions, 0 means no limit (danger)
    pub max_sessions: usize,
    /// Maximum session timeout in ms a client can request
    pub max_session_timeout_ms: f64,
    /// Maximum number of subscriptions per session, 0 means no limit (danger)
    pub max_subscriptions: usize,
    /// Maximum number of monitored items per subscription, 0 means no limit (danger)
    pub max_monitored_items_per_sub: usize,
    /// Maximum number of queued values in a monitored item, 0 means no limit (danger)
    pub max_monitored_item_queue_size: usize,
    /// Maximum number of publish requests queued per session before new ones are rejected
    pub max_pending_publish_requests: usize,
    /// Minimum publishing interval (in millis)
    pub min_publishing_interval_ms: f64,
    /// Minimum sampling interval (in millis)
    pub min_sampling_interval_ms: f64,
    /// Operational limits
    pub operational: OperationalLimits,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_sessions: constants::MAX_SESSIONS,
            max_session_timeout_ms: constants::MAX_SESSION_TIMEOUT,
            max_subscriptions: constants::MAX_SUBSCRIPTIONS,
            max_monitored_items_per_sub: constants::MAX_MONITORED_ITEMS_PER_SUB,
            max_monitored_item_queue_size: constants::MAX_MONITORED_ITEM_QUEUE_SIZE,
            max_pending_publish_requests: constants::MAX_PENDING_PUBLISH_REQUESTS,
            min_publishing_interval_ms: constants::MIN_PUBLISHING_INTERVAL_MS,
            min_sampling_interval_ms: constants::MIN_SAMPLING_INTERVAL_MS,
            operational: OperationalLimits::default(),
        }
    }
}

/// The server configuration - identity, users and limits.
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// A name for the application
    pub application_name: String,
    /// An application uri
    pub application_uri: String,
    /// Product uri
    pub product_uri: String,
    /// Allow clients to activate sessions anonymously
    pub allow_anonymous: bool,
    /// User tokens keyed by their id
    pub users: BTreeMap<String, ServerUserToken>,
    /// Server limits
    pub limits: Limits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("OPCUA Server")
    }
}

impl Config for ServerConfig {
    fn is_valid(&self) -> bool {
        let mut valid = true;
        if self.application_name.is_empty() {
            warn!("Server configuration contains an empty application name");
        }
        if self.application_uri.is_empty() {
            error!("Server configuration contains an empty application uri");
            valid = false;
        }
        for (id, token) in &self.users {
            if !token.is_valid(id) {
                valid = false;
            }
        }
        if self.limits.max_monitored_item_queue_size == 0 {
            error!("Server configuration monitored item queue size must be at least 1");
            valid = false;
        }
        if self.limits.min_publishing_interval_ms <= 0.0
            || self.limits.min_sampling_interval_ms <= 0.0
        {
            error!("Server configuration minimum intervals must be positive");
            valid = false;
        }
        valid
    }
}

impl ServerConfig {
    pub fn new<T>(application_name: T) -> Self
    where
        T: Into<String>,
    {
        let application_name = application_name.into();
        let application_uri = format!("urn:{}", application_name);
        ServerConfig {
            application_name,
            application_uri,
            product_uri: String::new(),
            allow_anonymous: true,
            users: BTreeMap::new(),
            limits: Limits::default(),
        }
    }

    pub fn add_user<T>(&mut self, id: T, token: ServerUserToken)
    where
        T: Into<String>,
    {
        self.users.insert(id.into(), token);
    }
}
