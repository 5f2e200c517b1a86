// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::sync::Arc;

use crate::sync::*;
use crate::types::{
    BrowseDescription, BrowseNextRequest, BrowseNextResponse, BrowsePath, BrowsePathResult,
    BrowsePathTarget, BrowseRequest, BrowseResponse, BrowseResult, RegisterNodesRequest,
    RegisterNodesResponse, ResponseHeader, ServiceResult, StatusCode,
    TranslateBrowsePathsToNodeIdsRequest, TranslateBrowsePathsToNodeIdsResponse,
    UnregisterNodesRequest, UnregisterNodesResponse,
};

use crate::server::{
    address_space::AddressSpace, constants, continuation_point::BrowseContinuationPoint,
    services::Service, session::Session, state::ServerState,
};

/// The view service. Allows the client to browse the address space of the server.
pub(crate) struct ViewService;

impl Service for ViewService {
    fn name(&self) -> String {
        String::from("ViewService")
    }
}

impl ViewService {
    pub fn new() -> ViewService {
        ViewService {}
    }

    pub fn browse(
        &self,
        server_state: Arc<RwLock<ServerState>>,
        session: Arc<RwLock<Session>>,
        address_space: Arc<RwLock<AddressSpace>>,
        request: &BrowseRequest,
    ) -> ServiceResult<BrowseResponse> {
        if is_empty_option_vec!(request.nodes_to_browse) {
            return Err(self.service_fault(&request.request_header, StatusCode::BadNothingToDo));
        }
        let server_state = trace_read_lock!(server_state);
        let mut session = trace_write_lock!(session);
        let address_space = trace_read_lock!(address_space);

        let nodes_to_browse = request.nodes_to_browse.as_ref().unwrap();
        if nodes_to_browse.len() > server_state.operational_limits.max_nodes_per_browse {
            error!(
                "Browse request too many nodes to browse {}",
                nodes_to_browse.len()
            );
            return Err(
                self.service_fault(&request.request_header, StatusCode::BadTooManyOperations)
            );
        }
        // Max references per node, adapted to the client's own limit
        let max_references_per_node = if request.requested_max_references_per_node == 0 {
            constants::DEFAULT_MAX_REFERENCES_PER_NODE
        } else if request.requested_max_references_per_node
            > constants::DEFAULT_MAX_REFERENCES_PER_NODE
        {
            constants::DEFAULT_MAX_REFERENCES_PER_NODE
        } else {
            request.requested_max_references_per_node
        };
        let results = nodes_to_browse
            .iter()
            .map(|node_to_browse| {
                Self::browse_node(
                    &mut session,
                    &address_space,
                    node_to_browse,
                    max_references_per_node as usize,
                )
            })
            .collect();
        Ok(BrowseResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    pub fn browse_next(
        &self,
        session: Arc<RwLock<Session>>,
        address_space: Arc<RwLock<AddressSpace>>,
        request: &BrowseNextRequest,
    ) -> ServiceResult<BrowseNextResponse> {
        if is_empty_option_vec!(request.continuation_points) {
            return Err(self.service_fault(&request.request_header, StatusCode::BadNothingToDo));
        }
        let mut session = trace_write_lock!(session);
        let address_space = trace_read_lock!(address_space);

        let continuation_points = request.continuation_points.as_ref().unwrap();
        let results = if request.release_continuation_points {
            session.remove_browse_continuation_points(continuation_points);
            None
        } else {
            session.remove_expired_browse_continuation_points(&address_space);
            let results = continuation_points
                .iter()
                .map(|continuation_point| {
                    Self::browse_from_continuation_point(&mut session, continuation_point)
                })
                .collect();
            Some(results)
        };
        Ok(BrowseNextResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results,
        })
    }

    pub fn translate_browse_paths_to_node_ids(
        &self,
        server_state: Arc<RwLock<ServerState>>,
        address_space: Arc<RwLock<AddressSpace>>,
        request: &TranslateBrowsePathsToNodeIdsRequest,
    ) -> ServiceResult<TranslateBrowsePathsToNodeIdsResponse> {
        if is_empty_option_vec!(request.browse_paths) {
            return Err(self.service_fault(&request.request_header, StatusCode::BadNothingToDo));
        }
        let server_state = trace_read_lock!(server_state);
        let address_space = trace_read_lock!(address_space);
        let browse_paths = request.browse_paths.as_ref().unwrap();
        if browse_paths.len()
            > server_state
                .operational_limits
                .max_nodes_per_translate_browse_paths_to_node_ids
        {
            return Err(
                self.service_fault(&request.request_header, StatusCode::BadTooManyOperations)
            );
        }
        let results = browse_paths
            .iter()
            .map(|browse_path| Self::translate_browse_path(&address_space, browse_path))
            .collect();
        Ok(TranslateBrowsePathsToNodeIdsResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    /// The lite address space has no alias table, so registration hands the same ids back -
    /// which the contract permits - after enforcing the operation limit.
    pub fn register_nodes(
        &self,
        server_state: Arc<RwLock<ServerState>>,
        request: &RegisterNodesRequest,
    ) -> ServiceResult<RegisterNodesResponse> {
        if is_empty_option_vec!(request.nodes_to_register) {
            return Err(self.service_fault(&request.request_header, StatusCode::BadNothingToDo));
        }
        let server_state = trace_read_lock!(server_state);
        let nodes_to_register = request.nodes_to_register.as_ref().unwrap();
        if nodes_to_register.len() > server_state.operational_limits.max_nodes_per_register_nodes {
            return Err(
                self.service_fault(&request.request_header, StatusCode::BadTooManyOperations)
            );
        }
        Ok(RegisterNodesResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            registered_node_ids: Some(nodes_to_register.clone()),
        })
    }

    pub fn unregister_nodes(
        &self,
        server_state: Arc<RwLock<ServerState>>,
        request: &UnregisterNodesRequest,
    ) -> ServiceResult<UnregisterNodesResponse> {
        if is_empty_option_vec!(request.nodes_to_unregister) {
            return Err(self.service_fault(&request.request_header, StatusCode::BadNothingToDo));
        }
        let server_state = trace_read_lock!(server_state);
        let nodes_to_unregister = request.nodes_to_unregister.as_ref().unwrap();
        if nodes_to_unregister.len() > server_state.operational_limits.max_nodes_per_register_nodes
        {
            return Err(
                self.service_fault(&request.request_header, StatusCode::BadTooManyOperations)
            );
        }
        Ok(UnregisterNodesResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
        })
    }

    fn browse_node(
        session: &mut Session,
        address_space: &AddressSpace,
        node_to_browse: &BrowseDescription,
        max_references_per_node: usize,
    ) -> BrowseResult {
        if address_space.find_node(&node_to_browse.node_id).is_none() {
            return BrowseResult {
                status_code: StatusCode::BadNodeIdUnknown,
                continuation_point: None,
                references: Vec::new(),
            };
        }
        let mut references = address_space.browse_references(
            &node_to_browse.node_id,
            node_to_browse.browse_direction,
            node_to_browse.reference_type_id,
        );
        if references.len() <= max_references_per_node {
            BrowseResult {
                status_code: StatusCode::Good,
                continuation_point: None,
                references,
            }
        } else {
            // Split off the overflow into a continuation point
            let remaining = references.split_off(max_references_per_node);
            let id = session.next_continuation_point_id();
            let continuation_point = BrowseContinuationPoint::new(
                id.clone(),
                address_space,
                max_references_per_node,
                remaining,
            );
            match session.add_browse_continuation_point(continuation_point) {
                Ok(()) => BrowseResult {
                    status_code: StatusCode::Good,
                    continuation_point: Some(id),
                    references,
                },
                Err(status_code) => BrowseResult {
                    status_code,
                    continuation_point: None,
                    references: Vec::new(),
                },
            }
        }
    }

    fn browse_from_continuation_point(
        session: &mut Session,
        continuation_point: &[u8],
    ) -> BrowseResult {
        // An unknown or expired continuation point is a per-item error
        let Some(point) = session.find_browse_continuation_point(continuation_point) else {
            return BrowseResult {
                status_code: StatusCode::BadContinuationPointInvalid,
                continuation_point: None,
                references: Vec::new(),
            };
        };
        let mut references = point.remaining;
        if references.len() <= point.max_references_per_node {
            BrowseResult {
                status_code: StatusCode::Good,
                continuation_point: None,
                references,
            }
        } else {
            let remaining = references.split_off(point.max_references_per_node);
            let id = session.next_continuation_point_id();
            let new_point = BrowseContinuationPoint {
                id: id.clone(),
                address_space_last_modified: point.address_space_last_modified,
                max_references_per_node: point.max_references_per_node,
                remaining,
            };
            match session.add_browse_continuation_point(new_point) {
                Ok(()) => BrowseResult {
                    status_code: StatusCode::Good,
                    continuation_point: Some(id),
                    references,
                },
                Err(status_code) => BrowseResult {
                    status_code,
                    continuation_point: None,
                    references: Vec::new(),
                },
            }
        }
    }

    fn translate_browse_path(
        address_space: &AddressSpace,
        browse_path: &BrowsePath,
    ) -> BrowsePathResult {
        if browse_path.relative_path.is_empty() {
            return BrowsePathResult {
                status_code: StatusCode::BadNothingToDo,
                targets: Vec::new(),
            };
        }
        if address_space.find_node(&browse_path.starting_node).is_none() {
            return BrowsePathResult {
                status_code: StatusCode::BadNodeIdUnknown,
                targets: Vec::new(),
            };
        }
        let mut current = browse_path.starting_node.clone();
        for element in &browse_path.relative_path {
            match address_space.find_forward_target_by_browse_name(
                &current,
                element.reference_type_id,
                &element.target_name,
            ) {
                Some(target) => current = target,
                None => {
                    return BrowsePathResult {
                        status_code: StatusCode::BadNoMatch,
                        targets: Vec::new(),
                    }
                }
            }
        }
        BrowsePathResult {
            status_code: StatusCode::Good,
            targets: vec![BrowsePathTarget { target_id: current }],
        }
    }
}
