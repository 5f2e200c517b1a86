// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::sync::Arc;

use chrono::Utc;

use crate::sync::*;
use crate::types::{
    CreateSubscriptionRequest, CreateSubscriptionResponse, DateTimeUtc,
    DeleteSubscriptionsRequest, DeleteSubscriptionsResponse, Duration,
    ModifySubscriptionRequest, ModifySubscriptionResponse, PublishRequest, RepublishRequest,
    RepublishResponse, ResponseHeader, ServiceFault, ServiceResult, SetPublishingModeRequest,
    SetPublishingModeResponse, StatusCode, TransferResult, TransferSubscriptionsRequest,
    TransferSubscriptionsResponse,
};

use crate::server::{
    address_space::AddressSpace,
    services::Service,
    session::{Session, SessionManager},
    state::ServerState,
    subscriptions::subscription::Subscription,
};

use crate::server::constants;

/// The subscription service. Allows the client to create, modify and delete subscriptions of
/// monitored items on the server and to request publish of notifications.
pub(crate) struct SubscriptionService;

impl Service for SubscriptionService {
    fn name(&self) -> String {
        String::from("SubscriptionService")
    }
}

impl SubscriptionService {
    pub fn new() -> SubscriptionService {
        SubscriptionService {}
    }

    /// Handles a CreateSubscriptionRequest
    pub fn create_subscription(
        &self,
        server_state: Arc<RwLock<ServerState>>,
        session: Arc<RwLock<Session>>,
        request: &CreateSubscriptionRequest,
    ) -> ServiceResult<CreateSubscriptionResponse> {
        let server_state = trace_read_lock!(server_state);
        let mut session = trace_write_lock!(session);

        if server_state.max_subscriptions > 0
            && session.publish_engine().len() >= server_state.max_subscriptions
        {
            return Err(
                self.service_fault(&request.request_header, StatusCode::BadTooManySubscriptions)
            );
        }
        let subscription_id = server_state.create_subscription_id();
        let (revised_publishing_interval, revised_max_keep_alive_count, revised_lifetime_count) =
            Self::revise_subscription_values(
                &server_state,
                request.requested_publishing_interval,
                request.requested_max_keep_alive_count,
                request.requested_lifetime_count,
            );

        let subscription = Subscription::new(
            subscription_id,
            request.publishing_enabled,
            revised_publishing_interval,
            revised_lifetime_count,
            revised_max_keep_alive_count,
            request.priority,
            constants::MAX_QUEUED_NOTIFICATIONS,
            request.max_notifications_per_publish,
            constants::MAX_RETRANSMISSION_QUEUE_SIZE,
            Utc::now(),
        );
        session.publish_engine_mut().insert(subscription_id, subscription);

        Ok(CreateSubscriptionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            subscription_id,
            revised_publishing_interval,
            revised_lifetime_count,
            revised_max_keep_alive_count,
        })
    }

    /// Handles a ModifySubscriptionRequest
    pub fn modify_subscription(
        &self,
        server_state: Arc<RwLock<ServerState>>,
        session: Arc<RwLock<Session>>,
        request: &ModifySubscriptionRequest,
    ) -> ServiceResult<ModifySubscriptionResponse> {
        let server_state = trace_read_lock!(server_state);
        let mut session = trace_write_lock!(session);
        let publish_engine = session.publish_engine_mut();

        let Some(subscription) = publish_engine.get_mut(request.subscription_id) else {
            return Err(self.service_fault(
                &request.request_header,
                StatusCode::BadSubscriptionIdInvalid,
            ));
        };
        let (revised_publishing_interval, revised_max_keep_alive_count, revised_lifetime_count) =
            Self::revise_subscription_values(
                &server_state,
                request.requested_publishing_interval,
                request.requested_max_keep_alive_count,
                request.requested_lifetime_count,
            );
        subscription.set_publishing_interval(revised_publishing_interval);
        subscription.set_max_keep_alive_counter(revised_max_keep_alive_count);
        subscription.set_max_lifetime_counter(revised_lifetime_count);
        subscription.set_priority(request.priority);
        subscription.set_max_notifications_per_publish(request.max_notifications_per_publish);
        subscription.reset_lifetime_counter();
        subscription.reset_keep_alive_counter();

        Ok(ModifySubscriptionResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            revised_publishing_interval,
            revised_lifetime_count,
            revised_max_keep_alive_count,
        })
    }

    /// Implementation of SetPublishingModeRequest service. See OPC Unified Architecture,
    /// Part 4 5.13.4
    pub fn set_publishing_mode(
        &self,
        session: Arc<RwLock<Session>>,
        request: &SetPublishingModeRequest,
    ) -> ServiceResult<SetPublishingModeResponse> {
        if is_empty_option_vec!(request.subscription_ids) {
            return Err(self.service_fault(&request.request_header, StatusCode::BadNothingToDo));
        }
        let mut session = trace_write_lock!(session);
        let subscription_ids = request.subscription_ids.as_ref().unwrap();
        let publishing_enabled = request.publishing_enabled;
        let results = subscription_ids
            .iter()
            .map(|subscription_id| {
                match session.publish_engine_mut().get_mut(*subscription_id) {
                    Some(subscription) => {
                        subscription.set_publishing_enabled(publishing_enabled);
                        subscription.reset_lifetime_counter();
                        StatusCode::Good
                    }
                    None => StatusCode::BadSubscriptionIdInvalid,
                }
            })
            .collect();
        Ok(SetPublishingModeResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    /// Handles a TransferSubscriptionsRequest. Moves each subscription to the requesting
    /// session, preserving its id, sequence-number continuity, queued notifications and
    /// retransmission cache. Counters are not reset by the move.
    pub fn transfer_subscriptions(
        &self,
        session_manager: Arc<RwLock<SessionManager>>,
        session: Arc<RwLock<Session>>,
        request: &TransferSubscriptionsRequest,
    ) -> ServiceResult<TransferSubscriptionsResponse> {
        if is_empty_option_vec!(request.subscription_ids) {
            return Err(self.service_fault(&request.request_header, StatusCode::BadNothingToDo));
        }
        let subscription_ids = request.subscription_ids.as_ref().unwrap();
        let target_session_id = {
            let session = trace_read_lock!(session);
            session.session_id().clone()
        };
        let results = subscription_ids
            .iter()
            .map(|subscription_id| {
                // Already owned by the requesting session - nothing to move
                {
                    let session = trace_read_lock!(session);
                    if let Some(subscription) = session.publish_engine().get(*subscription_id) {
                        return TransferResult {
                            status_code: StatusCode::Good,
                            available_sequence_numbers: subscription.available_sequence_numbers(),
                        };
                    }
                }
                // Find the session that owns the subscription and detach it
                let owner = {
                    let session_manager = trace_read_lock!(session_manager);
                    session_manager
                        .sessions
                        .values()
                        .find(|s| {
                            let s = trace_read_lock!(s);
                            s.session_id() != &target_session_id
                                && s.publish_engine().contains(*subscription_id)
                        })
                        .cloned()
                };
                let Some(owner) = owner else {
                    return TransferResult {
                        status_code: StatusCode::BadSubscriptionIdInvalid,
                        available_sequence_numbers: None,
                    };
                };
                let detached = {
                    let mut owner = trace_write_lock!(owner);
                    owner.publish_engine_mut().detach(*subscription_id)
                };
                match detached {
                    Some(mut subscription) => {
                        if request.send_initial_values {
                            subscription.set_resend_data();
                        }
                        let available_sequence_numbers =
                            subscription.available_sequence_numbers();
                        let mut session = trace_write_lock!(session);
                        session.publish_engine_mut().attach(subscription);
                        info!(
                            "Subscription {} transferred to session {}",
                            subscription_id, target_session_id
                        );
                        TransferResult {
                            status_code: StatusCode::Good,
                            available_sequence_numbers,
                        }
                    }
                    None => TransferResult {
                        status_code: StatusCode::BadSubscriptionIdInvalid,
                        available_sequence_numbers: None,
                    },
                }
            })
            .collect();
        Ok(TransferSubscriptionsResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    /// Handles a DeleteSubscriptionsRequest
    pub fn delete_subscriptions(
        &self,
        session: Arc<RwLock<Session>>,
        request: &DeleteSubscriptionsRequest,
    ) -> ServiceResult<DeleteSubscriptionsResponse> {
        if is_empty_option_vec!(request.subscription_ids) {
            return Err(self.service_fault(&request.request_header, StatusCode::BadNothingToDo));
        }
        let mut session = trace_write_lock!(session);
        let subscription_ids = request.subscription_ids.as_ref().unwrap();
        let results = subscription_ids
            .iter()
            .map(|subscription_id| {
                if session.publish_engine_mut().remove(*subscription_id) {
                    StatusCode::Good
                } else {
                    StatusCode::BadSubscriptionIdInvalid
                }
            })
            .collect();
        Ok(DeleteSubscriptionsResponse {
            response_header: ResponseHeader::new_good(&request.request_header),
            results: Some(results),
        })
    }

    /// Handles a PublishRequest. This is asynchronous - the response is formed later, when a
    /// subscription has something to deliver, and is picked up from the session's publish
    /// response queue.
    pub fn async_publish(
        &self,
        now: &DateTimeUtc,
        session: Arc<RwLock<Session>>,
        address_space: Arc<RwLock<AddressSpace>>,
        request_id: u32,
        request: &PublishRequest,
    ) -> Result<(), ServiceFault> {
        trace!("--> Receive a PublishRequest {:?}", request);
        let mut session = trace_write_lock!(session);
        if session.publish_engine().is_empty() {
            return Err(self.service_fault(&request.request_header, StatusCode::BadNoSubscription));
        }
        let address_space = trace_read_lock!(address_space);
        let request_header = request.request_header.clone();
        session
            .publish_engine_mut()
            .enqueue_publish_request(now, request_id, request.clone(), &address_space)
            .map_err(|status| self.service_fault(&request_header, status))
    }

    /// Handles a RepublishRequest
    pub fn republish(
        &self,
        session: Arc<RwLock<Session>>,
        request: &RepublishRequest,
    ) -> ServiceResult<RepublishResponse> {
        trace!("Republish {:?}", request);
        let mut session = trace_write_lock!(session);
        let result = session
            .publish_engine()
            .find_notification_message(request.subscription_id, request.retransmit_sequence_number);
        match result {
            Ok(notification_message) => {
                session.reset_subscription_lifetime_counter(request.subscription_id);
                Ok(RepublishResponse {
                    response_header: ResponseHeader::new_good(&request.request_header),
                    notification_message,
                })
            }
            Err(status) => Err(self.service_fault(&request.request_header, status)),
        }
    }

    /// This function takes the requested values passed in a create / modify and returns
    /// revised values that conform to the server's limits. For simplicity the return type is
    /// a tuple
    fn revise_subscription_values(
        server_state: &ServerState,
        requested_publishing_interval: Duration,
        requested_max_keep_alive_count: u32,
        requested_lifetime_count: u32,
    ) -> (Duration, u32, u32) {
        let revised_publishing_interval = f64::max(
            requested_publishing_interval,
            server_state.min_publishing_interval_ms,
        );
        let revised_max_keep_alive_count =
            if requested_max_keep_alive_count > server_state.max_keep_alive_count {
                server_state.max_keep_alive_count
            } else if requested_max_keep_alive_count == 0 {
                server_state.default_keep_alive_count
            } else {
                requested_max_keep_alive_count
            };
        // Lifetime count must exceed keep alive count by at least a multiple of 3
        let min_lifetime_count = revised_max_keep_alive_count * 3;
        let revised_lifetime_count = if requested_lifetime_count < min_lifetime_count {
            min_lifetime_count
        } else if requested_lifetime_count > server_state.max_lifetime_count {
            server_state.max_lifetime_count
        } else {
            requested_lifetime_count
        };
        (
            revised_publishing_interval,
            revised_max_keep_alive_count,
            revised_lifetime_count,
        )
    }
}
