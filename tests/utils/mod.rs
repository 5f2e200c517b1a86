// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Test harness - builds a server with a small populated address space and drives the
//! service API the way a connected client would.

#![allow(dead_code)]

use chrono::Utc;

use opcua_server_core::server::config::{ServerConfig, ServerUserToken};
use opcua_server_core::server::prelude::*;
use opcua_server_core::types::*;

/// A variable the tests monitor and write
pub fn test_var() -> NodeId {
    NodeId::new(2, "TestVariable")
}

/// A variable with an engineering unit range, for deadband tests
pub fn ranged_var() -> NodeId {
    NodeId::new(2, "RangedVariable")
}

/// A read-only variable, for access denied tests
pub fn read_only_var() -> NodeId {
    NodeId::new(2, "ReadOnlyVariable")
}

pub fn objects_folder() -> NodeId {
    NodeId::new(2, "TestFolder")
}

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::new("test-server");
    config.add_user("sample", ServerUserToken::user_pass("sample", "sample1"));
    config
}

/// Builds a server and populates its address space with the test nodes.
pub fn new_server(config: ServerConfig) -> Server {
    let server = Server::new(config);
    {
        let address_space = server.address_space();
        let mut address_space = address_space.write();
        let objects = NodeId::new(0, AddressSpace::OBJECTS_FOLDER);
        address_space.insert_object(
            opcua_server_core::server::address_space::ObjectNode {
                node_id: objects_folder(),
                browse_name: "TestFolder".to_string(),
                subscribe_to_events: true,
            },
            Some((objects, ReferenceTypeId::Organizes)),
        );
        let now = Utc::now();
        address_space.add_variable(
            &objects_folder(),
            test_var(),
            "TestVariable",
            DataValue::new_at(0i32, now),
        );
        address_space.add_variable(
            &objects_folder(),
            ranged_var(),
            "RangedVariable",
            DataValue::new_at(50.0f64, now),
        );
        address_space.set_eu_range(&ranged_var(), Some((0.0, 100.0)));
        address_space.insert_variable(
            opcua_server_core::server::address_space::VariableNode {
                node_id: read_only_var(),
                browse_name: "ReadOnlyVariable".to_string(),
                value: DataValue::new_at(1i32, now),
                eu_range: None,
                access_level: AccessLevel::CURRENT_READ,
            },
            Some((objects_folder(), ReferenceTypeId::HasComponent)),
        );
    }
    server
}

pub fn default_server() -> Server {
    new_server(test_config())
}

pub fn request_header(authentication_token: &NodeId) -> RequestHeader {
    RequestHeader::new(authentication_token, Utc::now(), 1)
}

/// Creates and activates an anonymous session, returning its authentication token.
pub fn connect(server: &Server) -> NodeId {
    let response = server
        .create_session(&CreateSessionRequest {
            request_header: RequestHeader::default(),
            session_name: "test".to_string(),
            requested_session_timeout: 30_000.0,
        })
        .unwrap();
    let token = response.authentication_token;
    server
        .activate_session(&ActivateSessionRequest {
            request_header: request_header(&token),
            user_identity_token: IdentityToken::Anonymous,
        })
        .unwrap();
    token
}

/// Creates a subscription with a 100ms publishing interval.
pub fn create_subscription(server: &Server, token: &NodeId) -> u32 {
    let response = server
        .create_subscription(&CreateSubscriptionRequest {
            request_header: request_header(token),
            requested_publishing_interval: 100.0,
            requested_lifetime_count: 100,
            requested_max_keep_alive_count: 20,
            max_notifications_per_publish: 0,
            publishing_enabled: true,
            priority: 0,
        })
        .unwrap();
    response.subscription_id
}

/// Creates one reporting monitored item for the value of a node, sampling at the publishing
/// interval.
pub fn create_monitored_item(
    server: &Server,
    token: &NodeId,
    subscription_id: u32,
    node_id: NodeId,
    client_handle: u32,
) -> MonitoredItemCreateResult {
    create_monitored_item_with_filter(
        server,
        token,
        subscription_id,
        node_id,
        client_handle,
        MonitoringFilter::None,
    )
}

pub fn create_monitored_item_with_filter(
    server: &Server,
    token: &NodeId,
    subscription_id: u32,
    node_id: NodeId,
    client_handle: u32,
    filter: MonitoringFilter,
) -> MonitoredItemCreateResult {
    let response = server
        .create_monitored_items(&CreateMonitoredItemsRequest {
            request_header: request_header(token),
            subscription_id,
            timestamps_to_return: TimestampsToReturn::Both,
            items_to_create: Some(vec![MonitoredItemCreateRequest {
                item_to_monitor: ReadValueId::value_of(node_id),
                monitoring_mode: MonitoringMode::Reporting,
                requested_parameters: MonitoringParameters {
                    client_handle,
                    sampling_interval: -1.0,
                    filter,
                    queue_size: 10,
                    discard_oldest: true,
                },
            }]),
        })
        .unwrap();
    response.results.unwrap().remove(0)
}

/// Sends a publish request with optional acknowledgements.
pub fn publish(
    server: &Server,
    token: &NodeId,
    request_id: u32,
    acks: Option<Vec<SubscriptionAcknowledgement>>,
) {
    server
        .publish(
            request_id,
            &PublishRequest {
                request_header: request_header(token),
                subscription_acknowledgements: acks,
            },
        )
        .unwrap();
}

/// Writes a value to a node through the write service.
pub fn write_value<V>(server: &Server, token: &NodeId, node_id: NodeId, value: V)
where
    V: Into<Variant>,
{
    let response = server
        .write(&WriteRequest {
            request_header: request_header(token),
            nodes_to_write: Some(vec![WriteValue {
                node_id,
                attribute_id: AttributeId::Value as u32,
                value: DataValue::new_now(value.into()),
            }]),
        })
        .unwrap();
    assert_eq!(response.results.unwrap()[0], StatusCode::Good);
}

/// Reads the value of a node through the read service.
pub fn read_value(server: &Server, token: &NodeId, node_id: NodeId) -> DataValue {
    let mut response = server
        .read(&ReadRequest {
            request_header: request_header(token),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: Some(vec![ReadValueId::value_of(node_id)]),
        })
        .unwrap();
    response.results.take().unwrap().remove(0)
}

/// Ticks the subscription timer at `ms_from_now` milliseconds into the future and returns
/// whatever publish responses became ready for the session.
pub fn tick_and_take(
    server: &Server,
    token: &NodeId,
    ms_from_now: i64,
) -> Vec<opcua_server_core::server::subscriptions::PublishResponseEntry> {
    let now = Utc::now() + chrono::Duration::milliseconds(ms_from_now);
    server.tick_subscriptions(&now);
    server.take_publish_responses(token).into_iter().collect()
}

/// Unwraps a publish response entry that is expected to hold a proper publish response.
pub fn expect_publish_response(
    entry: &opcua_server_core::server::subscriptions::PublishResponseEntry,
) -> &PublishResponse {
    match &entry.response {
        opcua_server_core::server::subscriptions::PublishServiceResponse::Response(r) => r,
        opcua_server_core::server::subscriptions::PublishServiceResponse::Fault(fault) => {
            panic!("expected a publish response, got fault {}", fault.status())
        }
    }
}
