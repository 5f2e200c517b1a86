// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

mod utils;

use opcua_server_core::server::address_space::AddressSpace;
use opcua_server_core::types::*;

use utils::*;

fn browse_description(node_id: NodeId) -> BrowseDescription {
    BrowseDescription {
        node_id,
        browse_direction: BrowseDirection::Forward,
        reference_type_id: None,
    }
}

#[test]
fn read_returns_per_item_statuses() {
    let server = default_server();
    let token = connect(&server);
    let response = server
        .read(&ReadRequest {
            request_header: request_header(&token),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: Some(vec![
                ReadValueId::value_of(test_var()),
                ReadValueId::value_of(NodeId::new(5, "does-not-exist")),
            ]),
        })
        .unwrap();
    let results = response.results.unwrap();
    assert_eq!(results[0].status(), StatusCode::Good);
    assert_eq!(results[0].value, Some(Variant::Int32(0)));
    assert_eq!(results[1].status(), StatusCode::BadNodeIdUnknown);
}

#[test]
fn negative_max_age_fails_whole_request() {
    let server = default_server();
    let token = connect(&server);
    let err = server
        .read(&ReadRequest {
            request_header: request_header(&token),
            max_age: -1.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: Some(vec![ReadValueId::value_of(test_var())]),
        })
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BadMaxAgeInvalid);
}

#[test]
fn write_access_denied_is_per_item() {
    let server = default_server();
    let token = connect(&server);
    let response = server
        .write(&WriteRequest {
            request_header: request_header(&token),
            nodes_to_write: Some(vec![
                WriteValue {
                    node_id: test_var(),
                    attribute_id: AttributeId::Value as u32,
                    value: DataValue::new_now(7i32),
                },
                WriteValue {
                    node_id: read_only_var(),
                    attribute_id: AttributeId::Value as u32,
                    value: DataValue::new_now(7i32),
                },
            ]),
        })
        .unwrap();
    assert_eq!(
        response.results.unwrap(),
        vec![StatusCode::Good, StatusCode::BadUserAccessDenied]
    );
    // The good write took effect, the denied one did not
    assert_eq!(read_value(&server, &token, test_var()).value, Some(Variant::Int32(7)));
    assert_eq!(
        read_value(&server, &token, read_only_var()).value,
        Some(Variant::Int32(1))
    );
}

#[test]
fn too_many_read_operations_fails_whole_request() {
    let mut config = test_config();
    config.limits.operational.max_nodes_per_read = 2;
    let server = new_server(config);
    let token = connect(&server);
    let nodes: Vec<ReadValueId> = (0..5).map(|_| ReadValueId::value_of(test_var())).collect();
    let err = server
        .read(&ReadRequest {
            request_header: request_header(&token),
            max_age: 0.0,
            timestamps_to_return: TimestampsToReturn::Both,
            nodes_to_read: Some(nodes),
        })
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BadTooManyOperations);
}

#[test]
fn browse_limit_enforced_and_fragmented_requests_pass() {
    let mut config = test_config();
    config.limits.operational.max_nodes_per_browse = 2;
    let server = new_server(config);
    let token = connect(&server);

    // Five descriptions fail whole-request
    let five: Vec<BrowseDescription> = (0..5)
        .map(|_| browse_description(objects_folder()))
        .collect();
    let err = server
        .browse(&BrowseRequest {
            request_header: request_header(&token),
            requested_max_references_per_node: 0,
            nodes_to_browse: Some(five),
        })
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BadTooManyOperations);

    // Two succeed - a bulk consumer fragments its requests to stay under the limit
    let two: Vec<BrowseDescription> = (0..2)
        .map(|_| browse_description(objects_folder()))
        .collect();
    let response = server
        .browse(&BrowseRequest {
            request_header: request_header(&token),
            requested_max_references_per_node: 0,
            nodes_to_browse: Some(two),
        })
        .unwrap();
    let results = response.results.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].status_code, StatusCode::Good);
    // The folder holds the three test variables
    assert_eq!(results[0].references.len(), 3);
}

#[test]
fn browse_continuation_points_page_through_references() {
    let server = default_server();
    let token = connect(&server);

    // Cap references per node below the folder's reference count
    let response = server
        .browse(&BrowseRequest {
            request_header: request_header(&token),
            requested_max_references_per_node: 2,
            nodes_to_browse: Some(vec![browse_description(objects_folder())]),
        })
        .unwrap();
    let mut results = response.results.unwrap();
    let result = results.remove(0);
    assert_eq!(result.status_code, StatusCode::Good);
    assert_eq!(result.references.len(), 2);
    let continuation_point = result.continuation_point.expect("expected a continuation point");

    // BrowseNext picks up the remainder
    let response = server
        .browse_next(&BrowseNextRequest {
            request_header: request_header(&token),
            release_continuation_points: false,
            continuation_points: Some(vec![continuation_point.clone()]),
        })
        .unwrap();
    let mut results = response.results.unwrap();
    let result = results.remove(0);
    assert_eq!(result.status_code, StatusCode::Good);
    assert_eq!(result.references.len(), 1);
    assert!(result.continuation_point.is_none());

    // The point was consumed; using it again is a per-item error
    let response = server
        .browse_next(&BrowseNextRequest {
            request_header: request_header(&token),
            release_continuation_points: false,
            continuation_points: Some(vec![continuation_point]),
        })
        .unwrap();
    let results = response.results.unwrap();
    assert_eq!(
        results[0].status_code,
        StatusCode::BadContinuationPointInvalid
    );
}

#[test]
fn translate_browse_path_resolves_and_reports_no_match() {
    let server = default_server();
    let token = connect(&server);
    let response = server
        .translate_browse_paths_to_node_ids(&TranslateBrowsePathsToNodeIdsRequest {
            request_header: request_header(&token),
            browse_paths: Some(vec![
                BrowsePath {
                    starting_node: objects_folder(),
                    relative_path: vec![RelativePathElement {
                        reference_type_id: None,
                        target_name: "TestVariable".to_string(),
                    }],
                },
                BrowsePath {
                    starting_node: objects_folder(),
                    relative_path: vec![RelativePathElement {
                        reference_type_id: None,
                        target_name: "NoSuchNode".to_string(),
                    }],
                },
            ]),
        })
        .unwrap();
    let results = response.results.unwrap();
    assert_eq!(results[0].status_code, StatusCode::Good);
    assert_eq!(results[0].targets[0].target_id, test_var());
    assert_eq!(results[1].status_code, StatusCode::BadNoMatch);
    assert!(results[1].targets.is_empty());
}

#[test]
fn register_nodes_round_trips_ids_and_enforces_limits() {
    let mut config = test_config();
    config.limits.operational.max_nodes_per_register_nodes = 2;
    let server = new_server(config);
    let token = connect(&server);

    let response = server
        .register_nodes(&RegisterNodesRequest {
            request_header: request_header(&token),
            nodes_to_register: Some(vec![test_var(), ranged_var()]),
        })
        .unwrap();
    assert_eq!(
        response.registered_node_ids,
        Some(vec![test_var(), ranged_var()])
    );

    let err = server
        .register_nodes(&RegisterNodesRequest {
            request_header: request_header(&token),
            nodes_to_register: Some(vec![test_var(), ranged_var(), read_only_var()]),
        })
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::BadTooManyOperations);

    server
        .unregister_nodes(&UnregisterNodesRequest {
            request_header: request_header(&token),
            nodes_to_unregister: Some(vec![test_var()]),
        })
        .unwrap();
}

#[test]
fn diagnostics_counters_are_browsable_variables() {
    let server = default_server();
    let token = connect(&server);
    // The summary object hangs off the server object and its counters browse as properties
    let response = server
        .browse(&BrowseRequest {
            request_header: request_header(&token),
            requested_max_references_per_node: 0,
            nodes_to_browse: Some(vec![browse_description(NodeId::new(
                0,
                AddressSpace::SERVER_DIAGNOSTICS_SUMMARY,
            ))]),
        })
        .unwrap();
    let results = response.results.unwrap();
    assert_eq!(results[0].status_code, StatusCode::Good);
    assert!(results[0]
        .references
        .iter()
        .any(|r| r.browse_name == "CurrentSessionCount"));
}
