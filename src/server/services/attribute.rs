// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::sync::Arc;

use chrono::Utc;

use crate::sync::*;
use crate::types::{
    AttributeId, DataValue, ReadRequest, ReadResponse, ReadValueId, ResponseHeader,
    ServiceResult, StatusCode, TimestampsToReturn, WriteRequest, WriteResponse, WriteValue,
};

use crate::server::{
    address_space::AddressSpace, services::Service, state::ServerState,
};

/// The attribute service. Allows the client to read and write attributes of nodes.
pub(crate) struct AttributeService;

impl Service for AttributeService {
    fn name(&self) -> String {
        String::from("AttributeService")
    }
}

impl AttributeService {
    pub fn new() -> AttributeService {
        AttributeService {}
    }

    /// Used to read one or more attributes of one or more nodes. Access failures come back as
    /// per-item statuses; the batch fails whole only for an invalid header field or an
    /// oversized request array.
    pub fn read(
        &self,
        server_state: Arc<RwLock<ServerState>>,
        address_space: Arc<RwLock<AddressSpace>>,
        request: &ReadRequest,
    ) -> ServiceResult<ReadResponse> {
        if is_empty_option_vec!(request.nodes_to_read) {
            return Err(self.service_fault(&request.request_header, StatusCode::BadNothingToDo));
        }
        if request.max_age < 0f64 {
            warn!("ReadRequest max age is invalid");
            return Err(self.service_fault(&request.request_header, StatusCode::BadMaxAgeInvalid));
        }
        let server_state = trace_read_lock!(server_state);
        let nodes_to_read = request.nodes_to_read.as_ref().unwrap();
        if nodes_to_read.len() > server_state.operational_limits.max_nodes_per_read {
            warn!("ReadRequest too many nodes to read {}", nodes_to_read.len());
            return Err(
                self.service_fault(&request.request_header, StatusCode::BadTooManyOperations)
            );
        }
        let address_space = trace_read_lock!(address_space);
        let timestamps_to_return = request.timestamps_to_return;
        let results = nodes_to_read
            .iter()
            .map(|node_to_read| {
                Self::read_node_value(&address_space, node_to_read, timestamps_to_return)
            })
            .collect();
        Ok(ReadResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    /// Used to write values to one or more attributes of one or more nodes. One status per
    /// write; an access-denied node does not fail its siblings.
    pub fn write(
        &self,
        server_state: Arc<RwLock<ServerState>>,
        address_space: Arc<RwLock<AddressSpace>>,
        request: &WriteRequest,
    ) -> ServiceResult<WriteResponse> {
        if is_empty_option_vec!(request.nodes_to_write) {
            debug!("Empty list passed to write {:?}", request);
            return Err(self.service_fault(&request.request_header, StatusCode::BadNothingToDo));
        }
        let server_state = trace_read_lock!(server_state);
        let nodes_to_write = request.nodes_to_write.as_ref().unwrap();
        if nodes_to_write.len() > server_state.operational_limits.max_nodes_per_write {
            warn!("WriteRequest too many nodes to write {}", nodes_to_write.len());
            return Err(
                self.service_fault(&request.request_header, StatusCode::BadTooManyOperations)
            );
        }
        let mut address_space = trace_write_lock!(address_space);
        let results = nodes_to_write
            .iter()
            .map(|node_to_write| Self::write_node_value(&mut address_space, node_to_write))
            .collect();
        Ok(WriteResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    fn read_node_value(
        address_space: &AddressSpace,
        node_to_read: &ReadValueId,
        timestamps_to_return: TimestampsToReturn,
    ) -> DataValue {
        let now = Utc::now();
        if address_space.find_node(&node_to_read.node_id).is_none() {
            return DataValue::new_status_at(StatusCode::BadNodeIdUnknown, now);
        }
        if node_to_read.attribute_id == AttributeId::Value as u32
            && !address_space.is_readable(&node_to_read.node_id)
        {
            return DataValue::new_status_at(StatusCode::BadUserAccessDenied, now);
        }
        let mut data_value =
            address_space.read_attribute(&node_to_read.node_id, node_to_read.attribute_id);
        match timestamps_to_return {
            TimestampsToReturn::Neither => {
                data_value.source_timestamp = None;
                data_value.server_timestamp = None;
            }
            TimestampsToReturn::Server => {
                data_value.source_timestamp = None;
            }
            TimestampsToReturn::Source => {
                data_value.server_timestamp = None;
            }
            TimestampsToReturn::Both => {}
        }
        data_value
    }

    fn write_node_value(
        address_space: &mut AddressSpace,
        node_to_write: &WriteValue,
    ) -> StatusCode {
        if address_space.find_node(&node_to_write.node_id).is_none() {
            return StatusCode::BadNodeIdUnknown;
        }
        if node_to_write.attribute_id != AttributeId::Value as u32 {
            // Only the value attribute is writable in this address space
            return StatusCode::BadNotWritable;
        }
        if !address_space.is_writable(&node_to_write.node_id) {
            return StatusCode::BadUserAccessDenied;
        }
        let mut value = node_to_write.value.clone();
        if value.source_timestamp.is_none() {
            value.set_timestamps(Utc::now());
        }
        if address_space.set_variable_data_value(&node_to_write.node_id, value) {
            StatusCode::Good
        } else {
            StatusCode::BadNotWritable
        }
    }
}
