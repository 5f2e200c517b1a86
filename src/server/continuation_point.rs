// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Continuation points for browse results that exceed the per-node reference cap.

use crate::types::{DateTimeUtc, ReferenceDescription};

use super::address_space::AddressSpace;

/// A browse continuation point. Holds the references that did not fit into the first result
/// so BrowseNext can carry on from where browse stopped. The point becomes invalid if the
/// address space changes underneath it.
#[derive(Debug)]
pub struct BrowseContinuationPoint {
    pub id: Vec<u8>,
    /// The address space modification time the point was captured at.
    pub address_space_last_modified: DateTimeUtc,
    pub max_references_per_node: usize,
    /// Remaining references, oldest first.
    pub remaining: Vec<ReferenceDescription>,
}

impl BrowseContinuationPoint {
    pub fn new(
        id: Vec<u8>,
        address_space: &AddressSpace,
        max_references_per_node: usize,
        remaining: Vec<ReferenceDescription>,
    ) -> Self {
        BrowseContinuationPoint {
            id,
            address_space_last_modified: address_space.last_modified(),
            max_references_per_node,
            remaining,
        }
    }

    /// Tests that the continuation point is still valid against the address space.
    pub fn is_valid_browse_continuation_point(&self, address_space: &AddressSpace) -> bool {
        self.address_space_last_modified >= address_space.last_modified()
    }
}
