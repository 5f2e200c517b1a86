// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{
    node_id::NodeId,
    service::{RequestHeader, ResponseHeader},
    status_code::StatusCode,
    Duration,
};

/// The identity a client presents on ActivateSession. A closed set; the full stack's encrypted
/// and certificate token kinds live above this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IdentityToken {
    Anonymous,
    UserName { user: String, password: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSessionRequest {
    pub request_header: RequestHeader,
    pub session_name: String,
    /// Requested session timeout in milliseconds; revised to the server's bounds.
    pub requested_session_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSessionResponse {
    pub response_header: ResponseHeader,
    pub session_id: NodeId,
    /// Opaque token quoted on subsequent requests to identify the session.
    pub authentication_token: NodeId,
    pub revised_session_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivateSessionRequest {
    pub request_header: RequestHeader,
    pub user_identity_token: IdentityToken,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivateSessionResponse {
    pub response_header: ResponseHeader,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseSessionRequest {
    pub request_header: RequestHeader,
    /// Also delete the session's subscriptions rather than leaving them for transfer.
    pub delete_subscriptions: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloseSessionResponse {
    pub response_header: ResponseHeader,
}

/// Result entry for TransferSubscriptions.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferResult {
    pub status_code: StatusCode,
    pub available_sequence_numbers: Option<Vec<u32>>,
}
