// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{
    notification::NotificationMessage,
    service::{RequestHeader, ResponseHeader, TransferResult},
    status_code::StatusCode,
    Duration,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSubscriptionRequest {
    pub request_header: RequestHeader,
    pub requested_publishing_interval: Duration,
    pub requested_lifetime_count: u32,
    pub requested_max_keep_alive_count: u32,
    pub max_notifications_per_publish: u32,
    pub publishing_enabled: bool,
    pub priority: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateSubscriptionResponse {
    pub response_header: ResponseHeader,
    pub subscription_id: u32,
    pub revised_publishing_interval: Duration,
    pub revised_lifetime_count: u32,
    pub revised_max_keep_alive_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModifySubscriptionRequest {
    pub request_header: RequestHeader,
    pub subscription_id: u32,
    pub requested_publishing_interval: Duration,
    pub requested_lifetime_count: u32,
    pub requested_max_keep_alive_count: u32,
    pub max_notifications_per_publish: u32,
    pub priority: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModifySubscriptionResponse {
    pub response_header: ResponseHeader,
    pub revised_publishing_interval: Duration,
    pub revised_lifetime_count: u32,
    pub revised_max_keep_alive_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteSubscriptionsRequest {
    pub request_header: RequestHeader,
    pub subscription_ids: Option<Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteSubscriptionsResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<StatusCode>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetPublishingModeRequest {
    pub request_header: RequestHeader,
    pub publishing_enabled: bool,
    pub subscription_ids: Option<Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetPublishingModeResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<StatusCode>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferSubscriptionsRequest {
    pub request_header: RequestHeader,
    pub subscription_ids: Option<Vec<u32>>,
    /// Re-deliver each item's last known value on the new session so it can catch up.
    pub send_initial_values: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferSubscriptionsResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<TransferResult>>,
}

/// Acknowledges receipt of a previously published notification so the server can release it
/// from its retransmission cache.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionAcknowledgement {
    pub subscription_id: u32,
    pub sequence_number: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    pub request_header: RequestHeader,
    pub subscription_acknowledgements: Option<Vec<SubscriptionAcknowledgement>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublishResponse {
    pub response_header: ResponseHeader,
    pub subscription_id: u32,
    /// Sequence numbers still held for republish.
    pub available_sequence_numbers: Option<Vec<u32>>,
    /// More notifications are queued for this subscription beyond this message.
    pub more_notifications: bool,
    pub notification_message: NotificationMessage,
    /// One status per acknowledgement in the request, in order.
    pub results: Option<Vec<StatusCode>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepublishRequest {
    pub request_header: RequestHeader,
    pub subscription_id: u32,
    pub retransmit_sequence_number: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepublishResponse {
    pub response_header: ResponseHeader,
    pub notification_message: NotificationMessage,
}
