// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{
    data_value::DataValue,
    node_id::NodeId,
    service::{RequestHeader, ResponseHeader, TimestampsToReturn},
    status_code::StatusCode,
    Duration,
};

/// Identifies a node + attribute pair to read or monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadValueId {
    pub node_id: NodeId,
    pub attribute_id: u32,
}

impl Default for ReadValueId {
    fn default() -> Self {
        ReadValueId {
            node_id: NodeId::null(),
            attribute_id: crate::types::AttributeId::Value as u32,
        }
    }
}

impl ReadValueId {
    pub fn value_of(node_id: NodeId) -> Self {
        ReadValueId {
            node_id,
            attribute_id: crate::types::AttributeId::Value as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub request_header: RequestHeader,
    /// Maximum acceptable age of the values in ms; must not be negative.
    pub max_age: Duration,
    pub timestamps_to_return: TimestampsToReturn,
    pub nodes_to_read: Option<Vec<ReadValueId>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<DataValue>>,
}

/// One node + attribute + value to write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteValue {
    pub node_id: NodeId,
    pub attribute_id: u32,
    pub value: DataValue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub request_header: RequestHeader,
    pub nodes_to_write: Option<Vec<WriteValue>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<StatusCode>>,
}
