// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::sync::Arc;

use chrono::Utc;

use crate::sync::*;
use crate::types::{
    CallMethodRequest, CallMethodResult, CallRequest, CallResponse, NodeId, ResponseHeader,
    ServiceResult, StatusCode, Variant,
};

use crate::server::{
    address_space::AddressSpace, services::Service, session::Session, state::ServerState,
    subscriptions::subscription::TickReason,
};

/// Node id of the server object's ResendData method.
pub const SERVER_RESEND_DATA: u32 = 12871;

/// The method service. Exposes the server methods the engine implements - currently
/// `ResendData(subscriptionId)`.
pub(crate) struct MethodService;

impl Service for MethodService {
    fn name(&self) -> String {
        String::from("MethodService")
    }
}

impl MethodService {
    pub fn new() -> MethodService {
        MethodService {}
    }

    pub fn call(
        &self,
        server_state: Arc<RwLock<ServerState>>,
        session: Arc<RwLock<Session>>,
        address_space: Arc<RwLock<AddressSpace>>,
        request: &CallRequest,
    ) -> ServiceResult<CallResponse> {
        if is_empty_option_vec!(request.methods_to_call) {
            return Err(self.service_fault(&request.request_header, StatusCode::BadNothingToDo));
        }
        let methods_to_call = request.methods_to_call.as_ref().unwrap();
        {
            let server_state = trace_read_lock!(server_state);
            if methods_to_call.len() > server_state.operational_limits.max_nodes_per_method_call {
                return Err(
                    self.service_fault(&request.request_header, StatusCode::BadTooManyOperations)
                );
            }
        }
        let results = methods_to_call
            .iter()
            .map(|method_to_call| {
                Self::call_method(session.clone(), address_space.clone(), method_to_call)
            })
            .collect();
        Ok(CallResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    fn call_method(
        session: Arc<RwLock<Session>>,
        address_space: Arc<RwLock<AddressSpace>>,
        method_to_call: &CallMethodRequest,
    ) -> CallMethodResult {
        let server = NodeId::new(0, AddressSpace::SERVER);
        let resend_data = NodeId::new(0, SERVER_RESEND_DATA);
        if method_to_call.object_id == server && method_to_call.method_id == resend_data {
            Self::resend_data(session, address_space, method_to_call)
        } else {
            CallMethodResult {
                status_code: StatusCode::BadMethodInvalid,
                input_argument_results: None,
                output_arguments: None,
            }
        }
    }

    /// ResendData(subscriptionId) - re-enqueues the last known value of every reporting
    /// monitored item under the subscription and forces an immediate publish cycle.
    fn resend_data(
        session: Arc<RwLock<Session>>,
        address_space: Arc<RwLock<AddressSpace>>,
        method_to_call: &CallMethodRequest,
    ) -> CallMethodResult {
        let Some(arguments) = method_to_call.input_arguments.as_ref() else {
            return CallMethodResult {
                status_code: StatusCode::BadArgumentsMissing,
                input_argument_results: None,
                output_arguments: None,
            };
        };
        let subscription_id = match arguments.first() {
            Some(Variant::UInt32(subscription_id)) if arguments.len() == 1 => *subscription_id,
            Some(_) => {
                return CallMethodResult {
                    status_code: StatusCode::BadInvalidArgument,
                    input_argument_results: Some(vec![StatusCode::BadTypeMismatch]),
                    output_arguments: None,
                }
            }
            None => {
                return CallMethodResult {
                    status_code: StatusCode::BadArgumentsMissing,
                    input_argument_results: None,
                    output_arguments: None,
                }
            }
        };
        let mut session = trace_write_lock!(session);
        let address_space = trace_read_lock!(address_space);
        let now = Utc::now();
        let engine = session.publish_engine_mut();
        let found = match engine.get_mut(subscription_id) {
            Some(subscription) => {
                subscription.resend_data_now(&now);
                true
            }
            None => false,
        };
        if found {
            // Pair the re-delivered values with any queued publish request right away
            engine.tick(&now, &address_space, TickReason::ReceivePublishRequest);
            CallMethodResult {
                status_code: StatusCode::Good,
                input_argument_results: Some(vec![StatusCode::Good]),
                output_arguments: None,
            }
        } else {
            CallMethodResult {
                status_code: StatusCode::BadSubscriptionIdInvalid,
                input_argument_results: Some(vec![StatusCode::Good]),
                output_arguments: None,
            }
        }
    }
}
