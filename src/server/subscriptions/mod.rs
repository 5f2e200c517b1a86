// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{PublishRequest, PublishResponse, ServiceFault, StatusCode};

pub mod monitored_item;
pub mod publish_engine;
pub mod sampling;
pub mod subscription;

/// The publish request entry preserves the request id assigned by the layer above. Publish
/// requests are answered asynchronously, so the id is carried along until the response is
/// formed and the caller can match it back up.
#[derive(Debug, Clone)]
pub struct PublishRequestEntry {
    /// The request id
    pub request_id: u32,
    /// The request itself
    pub request: PublishRequest,
    /// The result of clearing acknowledgments when the request was received.
    pub results: Option<Vec<StatusCode>>,
}

/// What a queued publish request eventually resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishServiceResponse {
    Response(PublishResponse),
    Fault(ServiceFault),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishResponseEntry {
    pub request_id: u32,
    pub response: PublishServiceResponse,
}

/// This converts an OPC UA Duration (floating point millis) into a chrono duration used for
/// testing whether intervals have elapsed.
pub(crate) fn duration_from_ms(d: f64) -> chrono::Duration {
    // Duration is a floating point number in millis so turn to microseconds for greater accuracy
    chrono::Duration::microseconds((d * 1000f64) as i64)
}
