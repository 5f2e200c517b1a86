// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::sync::Arc;

use chrono::Utc;

use crate::sync::*;
use crate::types::{
    CreateMonitoredItemsRequest, CreateMonitoredItemsResponse, DeleteMonitoredItemsRequest,
    DeleteMonitoredItemsResponse, ModifyMonitoredItemsRequest, ModifyMonitoredItemsResponse,
    ResponseHeader, ServiceResult, SetMonitoringModeRequest, SetMonitoringModeResponse,
    SetTriggeringRequest, SetTriggeringResponse, StatusCode,
};

use crate::server::{
    address_space::AddressSpace, services::Service, session::Session, state::ServerState,
};

/// The monitored item service. Allows the client to create, modify and delete monitored items
/// on a subscription.
pub(crate) struct MonitoredItemService;

impl Service for MonitoredItemService {
    fn name(&self) -> String {
        String::from("MonitoredItemService")
    }
}

impl MonitoredItemService {
    pub fn new() -> MonitoredItemService {
        MonitoredItemService {}
    }

    /// Implementation of CreateMonitoredItems service. See OPC Unified Architecture, Part 4
    /// 5.12.2. One status per item; a bad item never fails its siblings.
    pub fn create_monitored_items(
        &self,
        server_state: Arc<RwLock<ServerState>>,
        session: Arc<RwLock<Session>>,
        address_space: Arc<RwLock<AddressSpace>>,
        request: &CreateMonitoredItemsRequest,
    ) -> ServiceResult<CreateMonitoredItemsResponse> {
        if is_empty_option_vec!(request.items_to_create) {
            return Err(self.service_fault(&request.request_header, StatusCode::BadNothingToDo));
        }
        let server_state = trace_read_lock!(server_state);
        let mut session = trace_write_lock!(session);
        let address_space = trace_read_lock!(address_space);

        let items_to_create = request.items_to_create.as_ref().unwrap();
        if items_to_create.len() > server_state.operational_limits.max_monitored_items_per_call {
            return Err(
                self.service_fault(&request.request_header, StatusCode::BadTooManyOperations)
            );
        }
        let Some(subscription) = session.publish_engine_mut().get_mut(request.subscription_id)
        else {
            return Err(self.service_fault(
                &request.request_header,
                StatusCode::BadSubscriptionIdInvalid,
            ));
        };
        let now = Utc::now();
        let results = subscription.create_monitored_items(
            &server_state,
            &address_space,
            &now,
            request.timestamps_to_return,
            items_to_create,
        );
        Ok(CreateMonitoredItemsResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    /// Implementation of ModifyMonitoredItems service. See OPC Unified Architecture, Part 4
    /// 5.12.3
    pub fn modify_monitored_items(
        &self,
        server_state: Arc<RwLock<ServerState>>,
        session: Arc<RwLock<Session>>,
        address_space: Arc<RwLock<AddressSpace>>,
        request: &ModifyMonitoredItemsRequest,
    ) -> ServiceResult<ModifyMonitoredItemsResponse> {
        if is_empty_option_vec!(request.items_to_modify) {
            return Err(self.service_fault(&request.request_header, StatusCode::BadNothingToDo));
        }
        let server_state = trace_read_lock!(server_state);
        let mut session = trace_write_lock!(session);
        let address_space = trace_read_lock!(address_space);

        let items_to_modify = request.items_to_modify.as_ref().unwrap();
        if items_to_modify.len() > server_state.operational_limits.max_monitored_items_per_call {
            return Err(
                self.service_fault(&request.request_header, StatusCode::BadTooManyOperations)
            );
        }
        let Some(subscription) = session.publish_engine_mut().get_mut(request.subscription_id)
        else {
            return Err(self.service_fault(
                &request.request_header,
                StatusCode::BadSubscriptionIdInvalid,
            ));
        };
        let results = subscription.modify_monitored_items(
            &server_state,
            &address_space,
            request.timestamps_to_return,
            items_to_modify,
        );
        Ok(ModifyMonitoredItemsResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    /// Implementation of SetMonitoringMode service. See OPC Unified Architecture, Part 4
    /// 5.12.4
    pub fn set_monitoring_mode(
        &self,
        session: Arc<RwLock<Session>>,
        request: &SetMonitoringModeRequest,
    ) -> ServiceResult<SetMonitoringModeResponse> {
        if is_empty_option_vec!(request.monitored_item_ids) {
            return Err(self.service_fault(&request.request_header, StatusCode::BadNothingToDo));
        }
        let mut session = trace_write_lock!(session);
        let monitored_item_ids = request.monitored_item_ids.as_ref().unwrap();
        let Some(subscription) = session.publish_engine_mut().get_mut(request.subscription_id)
        else {
            return Err(self.service_fault(
                &request.request_header,
                StatusCode::BadSubscriptionIdInvalid,
            ));
        };
        let monitoring_mode = request.monitoring_mode;
        let results = monitored_item_ids
            .iter()
            .map(|i| subscription.set_monitoring_mode(*i, monitoring_mode))
            .collect();
        Ok(SetMonitoringModeResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    /// Implementation of SetTriggering service. See OPC Unified Architecture, Part 4 5.12.5
    pub fn set_triggering(
        &self,
        session: Arc<RwLock<Session>>,
        request: &SetTriggeringRequest,
    ) -> ServiceResult<SetTriggeringResponse> {
        if is_empty_option_vec!(request.links_to_add) && is_empty_option_vec!(request.links_to_remove)
        {
            return Err(self.service_fault(&request.request_header, StatusCode::BadNothingToDo));
        }
        let mut session = trace_write_lock!(session);
        let links_to_add = match request.links_to_add {
            Some(ref links_to_add) => &links_to_add[..],
            None => &[],
        };
        let links_to_remove = match request.links_to_remove {
            Some(ref links_to_remove) => &links_to_remove[..],
            None => &[],
        };
        let Some(subscription) = session.publish_engine_mut().get_mut(request.subscription_id)
        else {
            return Err(self.service_fault(
                &request.request_header,
                StatusCode::BadSubscriptionIdInvalid,
            ));
        };
        match subscription.set_triggering(request.triggering_item_id, links_to_add, links_to_remove)
        {
            Ok((add_results, remove_results)) => Ok(SetTriggeringResponse {
                response_header: ResponseHeader::new_good(&request.request_header),
                add_results: request.links_to_add.is_some().then_some(add_results),
                remove_results: request.links_to_remove.is_some().then_some(remove_results),
            }),
            Err(status) => Err(self.service_fault(&request.request_header, status)),
        }
    }

    /// Implementation of DeleteMonitoredItems service. See OPC Unified Architecture, Part 4
    /// 5.12.6
    pub fn delete_monitored_items(
        &self,
        session: Arc<RwLock<Session>>,
        request: &DeleteMonitoredItemsRequest,
    ) -> ServiceResult<DeleteMonitoredItemsResponse> {
        if is_empty_option_vec!(request.monitored_item_ids) {
            return Err(self.service_fault(&request.request_header, StatusCode::BadNothingToDo));
        }
        let mut session = trace_write_lock!(session);
        let monitored_item_ids = request.monitored_item_ids.as_ref().unwrap();
        let Some(subscription) = session.publish_engine_mut().get_mut(request.subscription_id)
        else {
            return Err(self.service_fault(
                &request.request_header,
                StatusCode::BadSubscriptionIdInvalid,
            ));
        };
        let results = subscription.delete_monitored_items(monitored_item_ids);
        Ok(DeleteMonitoredItemsResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }
}
