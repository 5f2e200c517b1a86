// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The publish engine owns a session's subscriptions and pairs the publish requests queued by
//! the client with the subscriptions that have notifications ready. It therefore has an
//! incoming queue of publish requests and an outgoing queue of publish responses; the layer
//! above adds to the one and removes from the other.
//!
//! Subscriptions are processed inside `tick()`, called periodically from a timer and on
//! arrival of every publish request. Ready subscriptions are served oldest-ready first, with
//! the priority field breaking ties among equally ready subscriptions. Once a notification is
//! published it is retained by its subscription until acknowledged or evicted.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use crate::sync::*;
use crate::types::{
    DateTimeUtc, NotificationMessage, PublishRequest, PublishResponse, ResponseHeader,
    ServiceFault, StatusCode,
};

use crate::server::{
    address_space::AddressSpace,
    diagnostics::ServerDiagnostics,
    subscriptions::{
        subscription::{Subscription, TickReason, TickResult},
        PublishRequestEntry, PublishResponseEntry, PublishServiceResponse,
    },
};

pub struct PublishEngine {
    /// The publish request queue (requests by the client on the session)
    publish_request_queue: VecDeque<PublishRequestEntry>,
    /// The publish response queue arranged oldest to latest
    publish_response_queue: VecDeque<PublishResponseEntry>,
    /// Default timeout period for requests in ms; a request's own timeout hint can lower it
    publish_request_timeout: i64,
    /// The server-protective cap on queued publish requests
    max_pending_publish_requests: usize,
    /// Subscriptions associated with the session
    subscriptions: BTreeMap<u32, Subscription>,
    /// Notifications paired with a publish request, waiting to be turned into responses.
    /// Always drained to empty before a tick completes.
    transmission_queue: VecDeque<(u32, PublishRequestEntry, NotificationMessage)>,
    /// Diagnostics updated when subscriptions are created and destroyed
    diagnostics: Arc<RwLock<ServerDiagnostics>>,
}

impl PublishEngine {
    pub fn new(
        max_pending_publish_requests: usize,
        publish_request_timeout: i64,
        diagnostics: Arc<RwLock<ServerDiagnostics>>,
    ) -> PublishEngine {
        PublishEngine {
            publish_request_queue: VecDeque::with_capacity(max_pending_publish_requests),
            publish_response_queue: VecDeque::with_capacity(max_pending_publish_requests),
            publish_request_timeout,
            max_pending_publish_requests,
            subscriptions: BTreeMap::new(),
            transmission_queue: VecDeque::new(),
            diagnostics,
        }
    }

    /// Tests if there are no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Returns the number of subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn contains(&self, subscription_id: u32) -> bool {
        self.subscriptions.contains_key(&subscription_id)
    }

    pub fn subscription_ids(&self) -> Vec<u32> {
        self.subscriptions.keys().copied().collect()
    }

    pub fn get(&self, subscription_id: u32) -> Option<&Subscription> {
        self.subscriptions.get(&subscription_id)
    }

    pub fn get_mut(&mut self, subscription_id: u32) -> Option<&mut Subscription> {
        self.subscriptions.get_mut(&subscription_id)
    }

    pub fn insert(&mut self, subscription_id: u32, subscription: Subscription) {
        self.subscriptions.insert(subscription_id, subscription);
        trace_write_lock!(self.diagnostics).on_create_subscription();
    }

    /// Removes a subscription, terminating it. Returns whether it existed.
    pub fn remove(&mut self, subscription_id: u32) -> bool {
        match self.subscriptions.remove(&subscription_id) {
            Some(mut subscription) => {
                subscription.terminate(StatusCode::Good);
                trace_write_lock!(self.diagnostics).on_destroy_subscription();
                true
            }
            None => false,
        }
    }

    /// Detaches a subscription for transfer to another session. The subscription is *not*
    /// terminated - its sequence numbers, queued notifications and retransmission cache move
    /// with it. Subscription counts are unaffected since the subscription lives on.
    pub fn detach(&mut self, subscription_id: u32) -> Option<Subscription> {
        self.subscriptions.remove(&subscription_id)
    }

    /// Attaches a subscription transferred from another session.
    pub fn attach(&mut self, subscription: Subscription) {
        self.subscriptions
            .insert(subscription.subscription_id(), subscription);
    }

    /// Terminates every subscription, e.g. because the owning session is being torn down.
    pub fn terminate_all(&mut self, status: StatusCode) {
        let mut diagnostics = trace_write_lock!(self.diagnostics);
        for (_, mut subscription) in std::mem::take(&mut self.subscriptions) {
            subscription.terminate(status);
            diagnostics.on_destroy_subscription();
        }
    }

    /// Places a new publish request onto the queue of publish requests.
    ///
    /// If the queue is full the engine ticks first in the hope of consuming one; if it is
    /// still full the request is rejected with `BadTooManyPublishRequests`.
    pub fn enqueue_publish_request(
        &mut self,
        now: &DateTimeUtc,
        request_id: u32,
        request: PublishRequest,
        address_space: &AddressSpace,
    ) -> Result<(), StatusCode> {
        if self.publish_request_queue.len() >= self.max_pending_publish_requests {
            // Tick to trigger publish, maybe remove a request to make space for a new one
            self.tick(now, address_space, TickReason::ReceivePublishRequest);
        }
        if self.publish_request_queue.len() >= self.max_pending_publish_requests {
            error!(
                "Too many publish requests {} for capacity {}",
                self.publish_request_queue.len(),
                self.max_pending_publish_requests
            );
            Err(StatusCode::BadTooManyPublishRequests)
        } else {
            // Acknowledgements are processed when the request is accepted
            let results = self.process_subscription_acknowledgements(&request);
            // Add to the front of the queue - older items are popped from the back
            self.publish_request_queue.push_front(PublishRequestEntry {
                request_id,
                request,
                results,
            });
            self.tick(now, address_space, TickReason::ReceivePublishRequest);
            Ok(())
        }
    }

    /// Deletes the acknowledged notifications, returning a status for each acknowledgement:
    /// `Good` for a deleted notification, `BadSubscriptionIdInvalid` if the subscription is
    /// unknown, `BadSequenceNumberUnknown` if the sequence number is not retained.
    fn process_subscription_acknowledgements(
        &mut self,
        request: &PublishRequest,
    ) -> Option<Vec<StatusCode>> {
        trace!("Processing subscription acknowledgements");
        let acknowledgements = request.subscription_acknowledgements.as_ref()?;
        let results = acknowledgements
            .iter()
            .map(|ack| match self.subscriptions.get_mut(&ack.subscription_id) {
                Some(subscription) => subscription.acknowledge(ack.sequence_number),
                None => {
                    error!(
                        "Cannot find acknowledged notification subscription id {}",
                        ack.subscription_id
                    );
                    StatusCode::BadSubscriptionIdInvalid
                }
            })
            .collect();
        Some(results)
    }

    /// The subscription ids in the order they should be offered publish requests:
    /// oldest-ready first, higher priority breaking ties, id as the final tie break.
    fn pairing_order(&self) -> Vec<u32> {
        let mut order: Vec<(Option<DateTimeUtc>, u8, u32)> = self
            .subscriptions
            .values()
            .map(|s| (s.ready_since(), s.priority(), s.subscription_id()))
            .collect();
        order.sort_by(|a, b| {
            match (a.0, b.0) {
                // Both ready - oldest first
                (Some(x), Some(y)) => x
                    .cmp(&y)
                    .then_with(|| b.1.cmp(&a.1))
                    .then_with(|| a.2.cmp(&b.2)),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => b.1.cmp(&a.1).then_with(|| a.2.cmp(&b.2)),
            }
        });
        order.into_iter().map(|(_, _, id)| id).collect()
    }

    /// Iterates through the subscriptions in pairing order, ticking each. Notifications
    /// paired with a publish request become publish responses on the outgoing queue.
    pub fn tick(
        &mut self,
        now: &DateTimeUtc,
        address_space: &AddressSpace,
        tick_reason: TickReason,
    ) {
        let subscription_ids = self.pairing_order();

        for subscription_id in subscription_ids {
            let publishing_req_queued = !self.publish_request_queue.is_empty();
            let subscription = self.subscriptions.get_mut(&subscription_id).unwrap();

            let tick_result =
                subscription.tick(now, address_space, tick_reason, publishing_req_queued);
            if tick_result == TickResult::Expired {
                trace_write_lock!(self.diagnostics).on_destroy_subscription();
            }

            // Pair queued notifications with queued publish requests
            while !self.publish_request_queue.is_empty() {
                let subscription = self.subscriptions.get_mut(&subscription_id).unwrap();
                if let Some(notification_message) = subscription.take_notification() {
                    let publish_request = self.publish_request_queue.pop_back().unwrap();
                    self.transmission_queue.push_front((
                        subscription_id,
                        publish_request,
                        notification_message,
                    ));
                } else {
                    break;
                }
            }

            // Remove the subscription if it expired and has nothing left to deliver
            let subscription = self.subscriptions.get(&subscription_id).unwrap();
            if subscription.ready_to_remove() {
                self.subscriptions.remove(&subscription_id);
            }
        }

        // Turn the paired notifications into publish responses, oldest first
        while let Some((subscription_id, publish_request, notification_message)) =
            self.transmission_queue.pop_back()
        {
            // Are there more notifications pending for this same subscription?
            let more_notifications = self
                .transmission_queue
                .iter()
                .any(|v| v.0 == subscription_id)
                || self
                    .subscriptions
                    .get(&subscription_id)
                    .map(|s| s.more_notifications())
                    .unwrap_or(false);

            // The notification is retained by its subscription until acknowledged
            let available_sequence_numbers =
                match self.subscriptions.get_mut(&subscription_id) {
                    Some(subscription) => {
                        subscription.retain_for_republish(&notification_message);
                        subscription.available_sequence_numbers()
                    }
                    None => None,
                };

            let response = Self::make_publish_response(
                publish_request,
                subscription_id,
                notification_message,
                more_notifications,
                available_sequence_numbers,
            );
            self.publish_response_queue.push_back(response);
        }
    }

    fn make_publish_response(
        publish_request: PublishRequestEntry,
        subscription_id: u32,
        notification_message: NotificationMessage,
        more_notifications: bool,
        available_sequence_numbers: Option<Vec<u32>>,
    ) -> PublishResponseEntry {
        PublishResponseEntry {
            request_id: publish_request.request_id,
            response: PublishServiceResponse::Response(PublishResponse {
                response_header: ResponseHeader::new_good(
                    &publish_request.request.request_header,
                ),
                subscription_id,
                available_sequence_numbers,
                more_notifications,
                notification_message,
                results: publish_request.results,
            }),
        }
    }

    /// Iterates through the queued publish requests and creates a timeout response for any
    /// that have sat longer than their timeout hint (bounded by the server default). Other
    /// pending requests are unaffected.
    pub fn expire_stale_publish_requests(&mut self, now: &DateTimeUtc) {
        if self.publish_request_queue.is_empty() {
            return;
        }
        let publish_request_timeout = self.publish_request_timeout;
        let mut expired_publish_responses =
            VecDeque::with_capacity(self.publish_request_queue.len());

        self.publish_request_queue.retain(|request| {
            let request_header = &request.request.request_header;
            let timeout = if request_header.timeout_hint > 0
                && (request_header.timeout_hint as i64) < publish_request_timeout
            {
                request_header.timeout_hint as i64
            } else {
                publish_request_timeout
            };
            let timeout = chrono::Duration::milliseconds(timeout);
            if now.signed_duration_since(request_header.timestamp) > timeout {
                debug!(
                    "Publish request {} has expired - timestamp = {:?}, timeout = {:?}, time now = {:?}",
                    request_header.request_handle, request_header.timestamp, timeout, now
                );
                expired_publish_responses.push_front(PublishResponseEntry {
                    request_id: request.request_id,
                    response: PublishServiceResponse::Fault(ServiceFault::new(
                        request_header,
                        StatusCode::BadTimeout,
                    )),
                });
                false
            } else {
                true
            }
        });
        self.publish_response_queue
            .append(&mut expired_publish_responses);
    }

    /// Takes the publish responses which are queued for the client, or None if there are
    /// none to process.
    pub fn take_publish_responses(&mut self) -> Option<VecDeque<PublishResponseEntry>> {
        if self.publish_response_queue.is_empty() {
            None
        } else {
            let mut publish_responses = VecDeque::with_capacity(self.publish_response_queue.len());
            publish_responses.append(&mut self.publish_response_queue);
            Some(publish_responses)
        }
    }

    /// Finds a notification message in a subscription's retransmission cache. Returns
    /// `BadSubscriptionIdInvalid` or `BadMessageNotAvailable` if not found.
    pub fn find_notification_message(
        &self,
        subscription_id: u32,
        sequence_number: u32,
    ) -> Result<NotificationMessage, StatusCode> {
        match self.subscriptions.get(&subscription_id) {
            Some(subscription) => subscription.find_retransmission(sequence_number),
            None => Err(StatusCode::BadSubscriptionIdInvalid),
        }
    }

    #[cfg(test)]
    pub(crate) fn publish_request_queue_len(&self) -> usize {
        self.publish_request_queue.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::server::subscriptions::monitored_item::tests::{
        create_request, test_server_state,
    };
    use crate::types::{
        DataValue, NodeId, RequestHeader, SubscriptionAcknowledgement, TimestampsToReturn,
    };

    use super::*;

    fn test_engine() -> (PublishEngine, AddressSpace, NodeId) {
        let diagnostics = Arc::new(RwLock::new(ServerDiagnostics::default()));
        let engine = PublishEngine::new(10, 30_000, diagnostics);
        let mut space = AddressSpace::new();
        let node_id = NodeId::new(2, "v1");
        let objects = NodeId::new(0, AddressSpace::OBJECTS_FOLDER);
        space.add_variable(&objects, node_id.clone(), "v1", DataValue::new_now(1));
        (engine, space, node_id)
    }

    fn add_subscription(
        engine: &mut PublishEngine,
        space: &AddressSpace,
        node_id: &NodeId,
        subscription_id: u32,
        priority: u8,
        now: DateTimeUtc,
    ) {
        let mut subscription =
            Subscription::new(subscription_id, true, 100.0, 100, 20, priority, 100, 1000, 100, now);
        // First tick moves it out of Creating
        subscription.tick(&now, space, TickReason::TickTimerFired, false);
        let state = test_server_state();
        let results = subscription.create_monitored_items(
            &state,
            space,
            &now,
            TimestampsToReturn::Both,
            &[create_request(node_id.clone(), subscription_id * 100, 10, true)],
        );
        assert_eq!(results[0].status_code, StatusCode::Good);
        engine.insert(subscription_id, subscription);
    }

    fn publish_request(now: DateTimeUtc, acks: Option<Vec<SubscriptionAcknowledgement>>) -> PublishRequest {
        PublishRequest {
            request_header: RequestHeader {
                authentication_token: NodeId::null(),
                timestamp: now,
                request_handle: 1,
                timeout_hint: 0,
            },
            subscription_acknowledgements: acks,
        }
    }

    #[test]
    fn pair_publish_request_with_notification() {
        let (mut engine, space, node_id) = test_engine();
        let start = Utc::now();
        add_subscription(&mut engine, &space, &node_id, 1, 0, start);

        // Publish request arrives before anything is ready
        engine
            .enqueue_publish_request(&start, 1, publish_request(start, None), &space)
            .unwrap();
        assert!(engine.take_publish_responses().is_none());

        // The publishing interval elapses and the initial value pairs with the request
        let now = start + chrono::Duration::milliseconds(100);
        engine.tick(&now, &space, TickReason::TickTimerFired);
        let responses = engine.take_publish_responses().unwrap();
        assert_eq!(responses.len(), 1);
        let entry = &responses[0];
        assert_eq!(entry.request_id, 1);
        let PublishServiceResponse::Response(response) = &entry.response else {
            panic!("expected a publish response");
        };
        assert_eq!(response.subscription_id, 1);
        assert_eq!(response.notification_message.sequence_number, 1);
        assert!(!response.more_notifications);
        assert_eq!(response.available_sequence_numbers, Some(vec![1]));
    }

    #[test]
    fn too_many_publish_requests_rejected() {
        let (mut engine, space, node_id) = test_engine();
        let start = Utc::now();
        add_subscription(&mut engine, &space, &node_id, 1, 0, start);
        for i in 0..10 {
            engine
                .enqueue_publish_request(&start, i, publish_request(start, None), &space)
                .unwrap();
        }
        let result = engine.enqueue_publish_request(&start, 11, publish_request(start, None), &space);
        assert_eq!(result.unwrap_err(), StatusCode::BadTooManyPublishRequests);
    }

    #[test]
    fn acknowledgement_results_are_per_item() {
        let (mut engine, space, node_id) = test_engine();
        let start = Utc::now();
        add_subscription(&mut engine, &space, &node_id, 1, 0, start);

        // Produce and deliver sequence number 1
        engine
            .enqueue_publish_request(&start, 1, publish_request(start, None), &space)
            .unwrap();
        let now = start + chrono::Duration::milliseconds(100);
        engine.tick(&now, &space, TickReason::TickTimerFired);
        let _ = engine.take_publish_responses().unwrap();

        // Acknowledge seq 1 (good), seq 99 (unknown) and a bogus subscription in one request
        let acks = vec![
            SubscriptionAcknowledgement {
                subscription_id: 1,
                sequence_number: 1,
            },
            SubscriptionAcknowledgement {
                subscription_id: 1,
                sequence_number: 99,
            },
            SubscriptionAcknowledgement {
                subscription_id: 55,
                sequence_number: 1,
            },
        ];
        engine
            .enqueue_publish_request(&now, 2, publish_request(now, Some(acks)), &space)
            .unwrap();
        // The request is pending; deliver something so the results come back
        let now = now + chrono::Duration::milliseconds(100);
        let mut space = space;
        space.set_variable_value(&node_id, 2, now);
        engine.tick(&now, &space, TickReason::TickTimerFired);
        let responses = engine.take_publish_responses().unwrap();
        let PublishServiceResponse::Response(response) = &responses[0].response else {
            panic!("expected a publish response");
        };
        assert_eq!(
            response.results,
            Some(vec![
                StatusCode::Good,
                StatusCode::BadSequenceNumberUnknown,
                StatusCode::BadSubscriptionIdInvalid
            ])
        );
    }

    #[test]
    fn expired_publish_request_fails_locally() {
        let (mut engine, space, node_id) = test_engine();
        let start = Utc::now();
        add_subscription(&mut engine, &space, &node_id, 1, 0, start);

        let mut request = publish_request(start, None);
        request.request_header.timeout_hint = 1_000;
        engine.enqueue_publish_request(&start, 7, request, &space).unwrap();

        // Not yet expired
        let now = start + chrono::Duration::milliseconds(500);
        engine.expire_stale_publish_requests(&now);
        assert!(engine.take_publish_responses().is_none());
        assert_eq!(engine.publish_request_queue_len(), 1);

        // Expired - the caller gets a timeout fault for exactly that request
        let now = start + chrono::Duration::milliseconds(1_500);
        engine.expire_stale_publish_requests(&now);
        let responses = engine.take_publish_responses().unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].request_id, 7);
        let PublishServiceResponse::Fault(fault) = &responses[0].response else {
            panic!("expected a fault");
        };
        assert_eq!(fault.status(), StatusCode::BadTimeout);
        assert_eq!(engine.publish_request_queue_len(), 0);
    }

    #[test]
    fn priority_breaks_ties_between_ready_subscriptions() {
        let (mut engine, mut space, node_id) = test_engine();
        let start = Utc::now();
        let node2 = NodeId::new(2, "v2");
        let objects = NodeId::new(0, AddressSpace::OBJECTS_FOLDER);
        space.add_variable(&objects, node2.clone(), "v2", DataValue::new_now(2));
        // Subscription 1 low priority, subscription 2 high priority
        add_subscription(&mut engine, &space, &node_id, 1, 0, start);
        add_subscription(&mut engine, &space, &node2, 2, 200, start);

        // One publish request, two subscriptions become ready on the same tick
        engine
            .enqueue_publish_request(&start, 1, publish_request(start, None), &space)
            .unwrap();
        let now = start + chrono::Duration::milliseconds(100);
        engine.tick(&now, &space, TickReason::TickTimerFired);
        let responses = engine.take_publish_responses().unwrap();
        assert_eq!(responses.len(), 1);
        let PublishServiceResponse::Response(response) = &responses[0].response else {
            panic!("expected a publish response");
        };
        // The higher priority subscription won the only available request
        assert_eq!(response.subscription_id, 2);
    }

    #[test]
    fn republish_unknown_and_known() {
        let (mut engine, space, node_id) = test_engine();
        let start = Utc::now();
        add_subscription(&mut engine, &space, &node_id, 1, 0, start);
        engine
            .enqueue_publish_request(&start, 1, publish_request(start, None), &space)
            .unwrap();
        let now = start + chrono::Duration::milliseconds(100);
        engine.tick(&now, &space, TickReason::TickTimerFired);
        let responses = engine.take_publish_responses().unwrap();
        let PublishServiceResponse::Response(response) = &responses[0].response else {
            panic!("expected a publish response");
        };

        // Republish returns the identical message
        let republished = engine.find_notification_message(1, 1).unwrap();
        assert_eq!(republished, response.notification_message);
        assert_eq!(
            engine.find_notification_message(1, 2).unwrap_err(),
            StatusCode::BadMessageNotAvailable
        );
        assert_eq!(
            engine.find_notification_message(99, 1).unwrap_err(),
            StatusCode::BadSubscriptionIdInvalid
        );
    }
}
