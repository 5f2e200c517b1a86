// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{
    node_id::NodeId,
    service::{RequestHeader, ResponseHeader},
    status_code::StatusCode,
    variant::Variant,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CallMethodRequest {
    pub object_id: NodeId,
    pub method_id: NodeId,
    pub input_arguments: Option<Vec<Variant>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallMethodResult {
    pub status_code: StatusCode,
    pub input_argument_results: Option<Vec<StatusCode>>,
    pub output_arguments: Option<Vec<Variant>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub request_header: RequestHeader,
    pub methods_to_call: Option<Vec<CallMethodRequest>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<CallMethodResult>>,
}
