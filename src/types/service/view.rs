// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{
    node_id::NodeId,
    service::{RequestHeader, ResponseHeader},
    status_code::StatusCode,
};

/// The reference types the lite address space models between nodes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceTypeId {
    Organizes,
    HasComponent,
    HasProperty,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrowseDirection {
    Forward,
    Inverse,
    Both,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowseDescription {
    pub node_id: NodeId,
    pub browse_direction: BrowseDirection,
    /// None browses all reference types.
    pub reference_type_id: Option<ReferenceTypeId>,
}

/// One reference discovered by browse.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDescription {
    pub reference_type_id: ReferenceTypeId,
    pub is_forward: bool,
    pub node_id: NodeId,
    pub browse_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowseResult {
    pub status_code: StatusCode,
    /// Present when the result set was truncated; quote it to BrowseNext to continue.
    pub continuation_point: Option<Vec<u8>>,
    pub references: Vec<ReferenceDescription>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowseRequest {
    pub request_header: RequestHeader,
    /// Maximum references returned per browsed node; 0 means no client limit.
    pub requested_max_references_per_node: u32,
    pub nodes_to_browse: Option<Vec<BrowseDescription>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowseResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<BrowseResult>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowseNextRequest {
    pub request_header: RequestHeader,
    pub release_continuation_points: bool,
    pub continuation_points: Option<Vec<Vec<u8>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowseNextResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<BrowseResult>>,
}

/// One element of a relative browse path - follow references of the given type to a target
/// with the given browse name.
#[derive(Debug, Clone, PartialEq)]
pub struct RelativePathElement {
    pub reference_type_id: Option<ReferenceTypeId>,
    pub target_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowsePath {
    pub starting_node: NodeId,
    pub relative_path: Vec<RelativePathElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowsePathTarget {
    pub target_id: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowsePathResult {
    pub status_code: StatusCode,
    pub targets: Vec<BrowsePathTarget>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslateBrowsePathsToNodeIdsRequest {
    pub request_header: RequestHeader,
    pub browse_paths: Option<Vec<BrowsePath>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranslateBrowsePathsToNodeIdsResponse {
    pub response_header: ResponseHeader,
    pub results: Option<Vec<BrowsePathResult>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterNodesRequest {
    pub request_header: RequestHeader,
    pub nodes_to_register: Option<Vec<NodeId>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisterNodesResponse {
    pub response_header: ResponseHeader,
    pub registered_node_ids: Option<Vec<NodeId>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnregisterNodesRequest {
    pub request_header: RequestHeader,
    pub nodes_to_unregister: Option<Vec<NodeId>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnregisterNodesResponse {
    pub response_header: ResponseHeader,
}
