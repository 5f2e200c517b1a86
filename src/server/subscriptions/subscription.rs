// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::core::handle::Handle;
use crate::server::{address_space::AddressSpace, state::ServerState};
use crate::types::{
    DateTimeUtc, Duration, EventFieldList, MonitoredItemCreateRequest,
    MonitoredItemCreateResult, MonitoredItemModifyRequest, MonitoredItemModifyResult,
    MonitoredItemNotification, MonitoringMode, NotificationMessage, StatusCode,
    TimestampsToReturn,
};

use super::monitored_item::{MonitoredItem, Notification};

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SubscriptionState {
    Closed,
    Creating,
    Normal,
    Late,
    KeepAlive,
}

/// Listener invoked exactly once when the subscription terminates, carrying the id and the
/// status that terminated it (e.g. `BadTimeout` for lifetime expiry).
pub type SubscriptionTerminatedListener = Box<dyn FnOnce(u32, StatusCode) + Send + Sync>;

#[derive(Debug)]
pub(crate) struct SubscriptionStateParams {
    pub notifications_available: bool,
    pub more_notifications: bool,
    pub publishing_req_queued: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum UpdateStateAction {
    None,
    // Return a keep alive
    ReturnKeepAlive,
    // Return notifications
    ReturnNotifications,
    // The subscription was created normally
    SubscriptionCreated,
    // The subscription has expired and must be closed
    SubscriptionExpired,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum TickResult {
    Expired,
    Enqueued,
    None,
}

/// Why the subscription is being ticked - the periodic publishing timer fired, or a publish
/// request just arrived and queued notifications may now be deliverable.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TickReason {
    ReceivePublishRequest,
    TickTimerFired,
}

/// This is for debugging purposes. It allows the caller to validate the output state if
/// required.
///
/// Values correspond to the state table in OPC UA Part 4 5.13.1.2, restricted to the
/// publishing-enabled case - a disabled subscription skips its tick entirely without touching
/// any counter.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) enum HandledState {
    None0 = 0,
    Create3 = 3,
    Normal4 = 4,
    Normal5 = 5,
    IntervalElapsed6 = 6,
    IntervalElapsed7 = 7,
    IntervalElapsed8 = 8,
    IntervalElapsed9 = 9,
    Late10 = 10,
    Late11 = 11,
    Late12 = 12,
    KeepAlive13 = 13,
    KeepAlive14 = 14,
    KeepAlive15 = 15,
    KeepAlive16 = 16,
    KeepAlive17 = 17,
    Closed27 = 27,
}

pub struct Subscription {
    subscription_id: u32,
    /// Publishing interval in ms
    publishing_interval: Duration,
    max_lifetime_counter: u32,
    max_keep_alive_counter: u32,
    priority: u8,
    monitored_items: HashMap<u32, MonitoredItem>,
    /// Ids for new monitored items
    monitored_item_ids: Handle,
    /// State of the subscription
    state: SubscriptionState,
    /// Number of consecutive publishing intervals that may elapse without a Publish request
    /// being available to deliver on, before the subscription terminates itself.
    lifetime_counter: u32,
    /// Keep alive counter counts down when there are no notifications to publish; when it
    /// runs out an empty keep-alive message proves the subscription is alive.
    keep_alive_counter: u32,
    /// Set once either a notification or a keep-alive has been sent on the subscription, to
    /// ensure something goes out the first time the publishing timer expires.
    first_message_sent: bool,
    /// The parameter that requests publishing to be enabled or disabled.
    publishing_enabled: bool,
    /// Tells the subscription to re-deliver the latest value of every reporting monitored
    /// item on the next publish cycle.
    resend_data: bool,
    /// The next sequence number to assign. Only data-bearing messages consume one.
    sequence_number: Handle,
    /// Last data-bearing notification's sequence number, a sanity check that sequence numbers
    /// go out strictly sequentially.
    last_sequence_number: u32,
    // The time that the publishing interval last elapsed
    last_time_publishing_interval_elapsed: DateTimeUtc,
    /// Notification messages ready to be transmitted, oldest first.
    notifications: VecDeque<NotificationMessage>,
    /// The time the subscription first had a notification ready while the queue was empty,
    /// for oldest-ready-first pairing against publish requests.
    ready_since: Option<DateTimeUtc>,
    /// Sent but not yet acknowledged data-bearing messages, by sequence number. Bounded;
    /// cache pressure evicts the oldest.
    retransmission_queue: BTreeMap<u32, NotificationMessage>,
    max_queued_notifications: usize,
    max_notifications_per_publish: usize,
    max_retransmission_queue: usize,
    terminated: bool,
    terminated_listeners: Vec<SubscriptionTerminatedListener>,
}

impl Subscription {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subscription_id: u32,
        publishing_enabled: bool,
        publishing_interval: Duration,
        lifetime_counter: u32,
        keep_alive_counter: u32,
        priority: u8,
        max_queued_notifications: usize,
        max_notifications_per_publish: u32,
        max_retransmission_queue: usize,
        now: DateTimeUtc,
    ) -> Self {
        Self {
            subscription_id,
            publishing_interval,
            max_lifetime_counter: lifetime_counter,
            max_keep_alive_counter: keep_alive_counter,
            priority,
            monitored_items: HashMap::new(),
            monitored_item_ids: Handle::new(1),
            state: SubscriptionState::Creating,
            lifetime_counter,
            keep_alive_counter,
            first_message_sent: false,
            publishing_enabled,
            resend_data: false,
            sequence_number: Handle::new(1),
            last_sequence_number: 0,
            last_time_publishing_interval_elapsed: now,
            notifications: VecDeque::new(),
            ready_since: None,
            retransmission_queue: BTreeMap::new(),
            max_queued_notifications,
            max_notifications_per_publish: max_notifications_per_publish as usize,
            max_retransmission_queue,
            terminated: false,
            terminated_listeners: Vec::new(),
        }
    }

    // --- Monitored item management

    /// Creates the monitored items in the batch, one result per request. A bad item never
    /// fails its siblings.
    pub fn create_monitored_items(
        &mut self,
        server_state: &ServerState,
        address_space: &AddressSpace,
        now: &DateTimeUtc,
        timestamps_to_return: TimestampsToReturn,
        items_to_create: &[MonitoredItemCreateRequest],
    ) -> Vec<MonitoredItemCreateResult> {
        items_to_create
            .iter()
            .map(|request| {
                if server_state.max_monitored_items_per_sub > 0
                    && self.monitored_items.len() >= server_state.max_monitored_items_per_sub
                {
                    return MonitoredItemCreateResult {
                        status_code: StatusCode::BadTooManyMonitoredItems,
                        monitored_item_id: 0,
                        revised_sampling_interval: 0.0,
                        revised_queue_size: 0,
                        filter_result: None,
                    };
                }
                let monitored_item_id = self.monitored_item_ids.next();
                match MonitoredItem::new(
                    now,
                    monitored_item_id,
                    timestamps_to_return,
                    server_state,
                    address_space,
                    request,
                ) {
                    Ok(monitored_item) => {
                        let result = MonitoredItemCreateResult {
                            status_code: StatusCode::Good,
                            monitored_item_id,
                            revised_sampling_interval: monitored_item.sampling_interval(),
                            revised_queue_size: monitored_item.queue_size() as u32,
                            filter_result: Some(monitored_item.filter().clone()),
                        };
                        self.monitored_items.insert(monitored_item_id, monitored_item);
                        result
                    }
                    Err(status_code) => MonitoredItemCreateResult {
                        status_code,
                        monitored_item_id: 0,
                        revised_sampling_interval: 0.0,
                        revised_queue_size: 0,
                        filter_result: None,
                    },
                }
            })
            .collect()
    }

    /// Modifies monitored items in the batch, one result per request.
    pub fn modify_monitored_items(
        &mut self,
        server_state: &ServerState,
        address_space: &AddressSpace,
        timestamps_to_return: TimestampsToReturn,
        items_to_modify: &[MonitoredItemModifyRequest],
    ) -> Vec<MonitoredItemModifyResult> {
        items_to_modify
            .iter()
            .map(|request| {
                match self.monitored_items.get_mut(&request.monitored_item_id) {
                    Some(monitored_item) => match monitored_item.modify(
                        server_state,
                        address_space,
                        timestamps_to_return,
                        request,
                    ) {
                        Ok(filter) => MonitoredItemModifyResult {
                            status_code: StatusCode::Good,
                            revised_sampling_interval: monitored_item.sampling_interval(),
                            revised_queue_size: monitored_item.queue_size() as u32,
                            filter_result: Some(filter),
                        },
                        Err(status_code) => MonitoredItemModifyResult {
                            status_code,
                            revised_sampling_interval: 0.0,
                            revised_queue_size: 0,
                            filter_result: None,
                        },
                    },
                    None => MonitoredItemModifyResult {
                        status_code: StatusCode::BadMonitoredItemIdInvalid,
                        revised_sampling_interval: 0.0,
                        revised_queue_size: 0,
                        filter_result: None,
                    },
                }
            })
            .collect()
    }

    /// Deletes monitored items, terminating each one found.
    pub fn delete_monitored_items(&mut self, monitored_item_ids: &[u32]) -> Vec<StatusCode> {
        monitored_item_ids
            .iter()
            .map(|id| match self.monitored_items.remove(id) {
                Some(mut monitored_item) => {
                    monitored_item.terminate();
                    StatusCode::Good
                }
                None => StatusCode::BadMonitoredItemIdInvalid,
            })
            .collect()
    }

    pub fn set_monitoring_mode(
        &mut self,
        monitored_item_id: u32,
        monitoring_mode: MonitoringMode,
    ) -> StatusCode {
        match self.monitored_items.get_mut(&monitored_item_id) {
            Some(monitored_item) => {
                monitored_item.set_monitoring_mode(monitoring_mode);
                StatusCode::Good
            }
            None => StatusCode::BadMonitoredItemIdInvalid,
        }
    }

    /// Sets the items triggered by a triggering item. Links are validated individually.
    pub fn set_triggering(
        &mut self,
        triggering_item_id: u32,
        links_to_add: &[u32],
        links_to_remove: &[u32],
    ) -> Result<(Vec<StatusCode>, Vec<StatusCode>), StatusCode> {
        if !self.monitored_items.contains_key(&triggering_item_id) {
            return Err(StatusCode::BadMonitoredItemIdInvalid);
        }
        let remove_results: Vec<StatusCode> = links_to_remove
            .iter()
            .map(|id| {
                if self.monitored_items.contains_key(id) {
                    StatusCode::Good
                } else {
                    StatusCode::BadMonitoredItemIdInvalid
                }
            })
            .collect();
        let add_results: Vec<StatusCode> = links_to_add
            .iter()
            .map(|id| {
                if self.monitored_items.contains_key(id) {
                    StatusCode::Good
                } else {
                    StatusCode::BadMonitoredItemIdInvalid
                }
            })
            .collect();
        let valid_removes: Vec<u32> = links_to_remove
            .iter()
            .zip(remove_results.iter())
            .filter(|(_, s)| s.is_good())
            .map(|(id, _)| *id)
            .collect();
        let valid_adds: Vec<u32> = links_to_add
            .iter()
            .zip(add_results.iter())
            .filter(|(_, s)| s.is_good())
            .map(|(id, _)| *id)
            .collect();
        let triggering_item = self.monitored_items.get_mut(&triggering_item_id).unwrap();
        triggering_item.set_triggering(&valid_adds, &valid_removes);
        Ok((add_results, remove_results))
    }

    pub fn get(&self, monitored_item_id: &u32) -> Option<&MonitoredItem> {
        self.monitored_items.get(monitored_item_id)
    }

    pub fn get_mut(&mut self, monitored_item_id: &u32) -> Option<&mut MonitoredItem> {
        self.monitored_items.get_mut(monitored_item_id)
    }

    pub fn contains_monitored_item(&self, monitored_item_id: u32) -> bool {
        self.monitored_items.contains_key(&monitored_item_id)
    }

    pub fn len(&self) -> usize {
        self.monitored_items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitored_items.is_empty()
    }

    // --- Publishing state machine

    /// Tests if the publishing interval has elapsed since the last time this function was
    /// called, in which case it returns `true` and updates its internal state.
    fn test_and_set_publishing_interval_elapsed(&mut self, now: &DateTimeUtc) -> bool {
        let elapsed = now.signed_duration_since(self.last_time_publishing_interval_elapsed);
        if elapsed >= super::duration_from_ms(self.publishing_interval) {
            self.last_time_publishing_interval_elapsed = *now;
            true
        } else {
            false
        }
    }

    fn notifications_available(&self) -> bool {
        let queued = self
            .monitored_items
            .values()
            .any(|item| item.is_reporting() && item.has_notifications());
        if queued {
            true
        } else if self.resend_data {
            self.monitored_items
                .values()
                .any(|item| item.is_reporting() && item.has_last_value())
        } else {
            false
        }
    }

    /// The tick causes the subscription to sample its monitored items, then run the
    /// publishing state table. Any notifications produced are queued for the publish engine
    /// to pair against publish requests.
    pub(crate) fn tick(
        &mut self,
        now: &DateTimeUtc,
        address_space: &AddressSpace,
        tick_reason: TickReason,
        publishing_req_queued: bool,
    ) -> TickResult {
        if self.state == SubscriptionState::Closed {
            return TickResult::None;
        }
        // Publishing disabled skips the tick entirely; no counter moves, no keep-alives.
        if !self.publishing_enabled {
            return TickResult::None;
        }

        let publishing_interval_elapsed = match tick_reason {
            TickReason::ReceivePublishRequest => false,
            TickReason::TickTimerFired => {
                if self.state == SubscriptionState::Creating {
                    true
                } else {
                    self.test_and_set_publishing_interval_elapsed(now)
                }
            }
        };

        // Monitored items sample on every timer tick; each item gates itself on its own
        // sampling interval.
        if tick_reason == TickReason::TickTimerFired {
            self.tick_monitored_items(now, address_space, publishing_interval_elapsed);
        }

        // Unless the publishing interval elapsed, a timer tick does nothing further.
        if tick_reason == TickReason::TickTimerFired && !publishing_interval_elapsed {
            return TickResult::None;
        }

        let transition = self.get_state_transition(
            tick_reason,
            SubscriptionStateParams {
                notifications_available: self.notifications_available(),
                more_notifications: !self.notifications.is_empty(),
                publishing_req_queued,
            },
        );
        let action = self.handle_state_transition(transition);

        match action {
            UpdateStateAction::None => TickResult::None,
            UpdateStateAction::SubscriptionCreated => TickResult::None,
            UpdateStateAction::ReturnKeepAlive => {
                // A keep-alive advertises the next sequence number without consuming it
                let notification =
                    NotificationMessage::keep_alive(self.sequence_number.peek(), *now);
                self.enqueue_notification(notification);
                TickResult::Enqueued
            }
            UpdateStateAction::ReturnNotifications => {
                let resend_data = std::mem::take(&mut self.resend_data);
                if resend_data {
                    for item in self.monitored_items.values_mut() {
                        if item.is_reporting() {
                            item.resend_last_value();
                        }
                    }
                }
                let messages = self.drain_monitored_items(now);
                for message in messages {
                    self.enqueue_notification(message);
                }
                TickResult::Enqueued
            }
            UpdateStateAction::SubscriptionExpired => {
                debug!(
                    "Subscription {} expired, status change to closed / timeout",
                    self.subscription_id
                );
                let notification =
                    NotificationMessage::status_change(self.sequence_number.next(), *now, StatusCode::BadTimeout);
                self.enqueue_notification(notification);
                self.finish_terminate(StatusCode::BadTimeout);
                TickResult::Expired
            }
        }
    }

    fn get_state_transition(
        &self,
        tick_reason: TickReason,
        p: SubscriptionStateParams,
    ) -> HandledState {
        // The layout follows the state transition table in Part 4 5.13.1, restricted to the
        // publishing-enabled case. Avoid "cleaning it up" - keeping the rows recognizable
        // against the table is worth the redundancy.
        match (self.state, tick_reason) {
            (SubscriptionState::Creating, _) => HandledState::Create3,
            (SubscriptionState::Normal, TickReason::ReceivePublishRequest)
                if !p.more_notifications =>
            {
                HandledState::Normal4
            }
            (SubscriptionState::Normal, TickReason::ReceivePublishRequest)
                if p.more_notifications =>
            {
                HandledState::Normal5
            }
            (SubscriptionState::Normal, TickReason::TickTimerFired)
                if p.publishing_req_queued && p.notifications_available =>
            {
                HandledState::IntervalElapsed6
            }
            (SubscriptionState::Normal, TickReason::TickTimerFired)
                if p.publishing_req_queued
                    && !p.notifications_available
                    && !self.first_message_sent =>
            {
                HandledState::IntervalElapsed7
            }
            (SubscriptionState::Normal, TickReason::TickTimerFired)
                if !p.publishing_req_queued
                    && (!self.first_message_sent || p.notifications_available) =>
            {
                HandledState::IntervalElapsed8
            }
            (SubscriptionState::Normal, TickReason::TickTimerFired)
                if self.first_message_sent && !p.notifications_available =>
            {
                HandledState::IntervalElapsed9
            }
            (SubscriptionState::Late, TickReason::ReceivePublishRequest)
                if p.notifications_available || p.more_notifications =>
            {
                HandledState::Late10
            }
            (SubscriptionState::Late, TickReason::ReceivePublishRequest)
                if !p.notifications_available && !p.more_notifications =>
            {
                HandledState::Late11
            }
            // This check is not in the spec, but without it the lifetime counter won't behave
            // properly. This is probably an error in the standard.
            (SubscriptionState::Late, TickReason::TickTimerFired) if self.lifetime_counter > 1 => {
                HandledState::Late12
            }
            (SubscriptionState::KeepAlive, TickReason::ReceivePublishRequest) => {
                HandledState::KeepAlive13
            }
            (SubscriptionState::KeepAlive, TickReason::TickTimerFired)
                if p.notifications_available && p.publishing_req_queued =>
            {
                HandledState::KeepAlive14
            }
            (SubscriptionState::KeepAlive, TickReason::TickTimerFired)
                if p.publishing_req_queued
                    && self.keep_alive_counter == 1
                    && !p.notifications_available =>
            {
                HandledState::KeepAlive15
            }
            (SubscriptionState::KeepAlive, TickReason::TickTimerFired)
                if self.keep_alive_counter > 1 && !p.notifications_available =>
            {
                HandledState::KeepAlive16
            }
            (SubscriptionState::KeepAlive, TickReason::TickTimerFired)
                if !p.publishing_req_queued
                    && (self.keep_alive_counter == 1
                        || self.keep_alive_counter > 1 && p.notifications_available) =>
            {
                HandledState::KeepAlive17
            }
            (
                SubscriptionState::Normal | SubscriptionState::Late | SubscriptionState::KeepAlive,
                TickReason::TickTimerFired,
            ) if self.lifetime_counter <= 1 => HandledState::Closed27,
            _ => HandledState::None0,
        }
    }

    fn handle_state_transition(&mut self, transition: HandledState) -> UpdateStateAction {
        match transition {
            HandledState::None0 => UpdateStateAction::None,
            HandledState::Create3 => {
                self.state = SubscriptionState::Normal;
                self.first_message_sent = false;
                UpdateStateAction::SubscriptionCreated
            }
            HandledState::Normal4 => {
                // Publish request gets queued at the session level.
                UpdateStateAction::None
            }
            HandledState::Normal5 => {
                self.reset_lifetime_counter();
                UpdateStateAction::None
            }
            HandledState::IntervalElapsed6 => {
                self.reset_lifetime_counter();
                self.reset_keep_alive_counter();
                self.first_message_sent = true;
                UpdateStateAction::ReturnNotifications
            }
            HandledState::IntervalElapsed7 => {
                self.reset_lifetime_counter();
                self.first_message_sent = true;
                UpdateStateAction::ReturnKeepAlive
            }
            HandledState::IntervalElapsed8 => {
                // Notifications ready but nothing to deliver them on - starved.
                self.decrement_lifetime_counter();
                self.state = SubscriptionState::Late;
                UpdateStateAction::None
            }
            HandledState::IntervalElapsed9 => {
                self.reset_keep_alive_counter();
                self.state = SubscriptionState::KeepAlive;
                UpdateStateAction::None
            }
            HandledState::Late10 => {
                self.reset_lifetime_counter();
                self.first_message_sent = true;
                self.state = SubscriptionState::Normal;
                UpdateStateAction::ReturnNotifications
            }
            HandledState::Late11 => {
                self.reset_lifetime_counter();
                self.first_message_sent = true;
                self.state = SubscriptionState::KeepAlive;
                UpdateStateAction::ReturnKeepAlive
            }
            HandledState::Late12 => {
                self.decrement_lifetime_counter();
                self.state = SubscriptionState::Late;
                UpdateStateAction::None
            }
            HandledState::KeepAlive13 => {
                // No-op, publish req gets queued at the session level.
                UpdateStateAction::None
            }
            HandledState::KeepAlive14 => {
                self.reset_lifetime_counter();
                self.reset_keep_alive_counter();
                self.first_message_sent = true;
                self.state = SubscriptionState::Normal;
                UpdateStateAction::ReturnNotifications
            }
            HandledState::KeepAlive15 => {
                // The keep-alive is a successful publish, so the lifetime resets too
                self.reset_lifetime_counter();
                self.reset_keep_alive_counter();
                UpdateStateAction::ReturnKeepAlive
            }
            HandledState::KeepAlive16 => {
                self.keep_alive_counter -= 1;
                UpdateStateAction::None
            }
            HandledState::KeepAlive17 => {
                // Something is due but there is no publish request to deliver it on
                self.decrement_lifetime_counter();
                self.state = SubscriptionState::Late;
                UpdateStateAction::None
            }
            HandledState::Closed27 => {
                self.state = SubscriptionState::Closed;
                UpdateStateAction::SubscriptionExpired
            }
        }
    }

    /// Samples every monitored item. Items gate themselves on their own sampling intervals.
    fn tick_monitored_items(
        &mut self,
        now: &DateTimeUtc,
        address_space: &AddressSpace,
        publishing_interval_elapsed: bool,
    ) {
        for monitored_item in self.monitored_items.values_mut() {
            let _ = monitored_item.tick(now, address_space, publishing_interval_elapsed);
        }
    }

    /// Drains every reporting monitored item (and the sampling items their triggers link to)
    /// into notification messages, each assigned the next sequence number. Messages are split
    /// so none carries more than `max_notifications_per_publish` notifications.
    fn drain_monitored_items(&mut self, now: &DateTimeUtc) -> Vec<NotificationMessage> {
        let mut notifications: Vec<Notification> = Vec::new();
        let mut triggers: Vec<(u32, u32)> = Vec::new();

        for monitored_item in self.monitored_items.values_mut() {
            // A triggering item with queued notifications makes its linked items report too
            if monitored_item.monitoring_mode() != MonitoringMode::Disabled
                && monitored_item.has_notifications()
            {
                triggers.extend(
                    monitored_item
                        .triggered_items()
                        .iter()
                        .copied()
                        .map(|id| (monitored_item.monitored_item_id(), id)),
                );
            }
            notifications.extend(monitored_item.drain());
        }

        for (triggering_item, item_id) in triggers {
            if self.monitored_items.contains_key(&item_id) {
                if let Some(item) = self.monitored_items.get_mut(&item_id) {
                    notifications.extend(item.drain_triggered());
                }
            } else if let Some(item) = self.monitored_items.get_mut(&triggering_item) {
                item.remove_dead_trigger(item_id);
            }
        }

        if notifications.is_empty() {
            return Vec::new();
        }

        let chunk_size = if self.max_notifications_per_publish > 0 {
            self.max_notifications_per_publish
        } else {
            notifications.len()
        };
        let mut messages = Vec::new();
        let mut remaining = notifications;
        while !remaining.is_empty() {
            let rest = if remaining.len() > chunk_size {
                remaining.split_off(chunk_size)
            } else {
                Vec::new()
            };
            let mut data_change_notifications: Vec<MonitoredItemNotification> = Vec::new();
            let mut event_notifications: Vec<EventFieldList> = Vec::new();
            for notification in remaining {
                match notification {
                    Notification::MonitoredItemNotification(n) => {
                        data_change_notifications.push(n)
                    }
                    Notification::Event(n) => event_notifications.push(n),
                }
            }
            messages.push(NotificationMessage::data_change(
                self.sequence_number.next(),
                *now,
                data_change_notifications,
                event_notifications,
            ));
            remaining = rest;
        }
        messages
    }

    fn enqueue_notification(&mut self, notification: NotificationMessage) {
        // For sanity, check data-bearing sequence numbers go out strictly sequentially.
        // Keep-alives don't consume a sequence number and are exempt.
        if !notification.is_keep_alive() {
            let expected_sequence_number = if self.last_sequence_number == u32::MAX {
                1
            } else {
                self.last_sequence_number + 1
            };
            if notification.sequence_number != expected_sequence_number {
                panic!(
                    "Notification's sequence number is not sequential, expecting {}, got {}",
                    expected_sequence_number, notification.sequence_number
                );
            }
            self.last_sequence_number = notification.sequence_number;
        }
        if self.notifications.len() >= self.max_queued_notifications {
            warn!(
                "Maximum number of queued notifications exceeded, dropping oldest. Subscription id: {}",
                self.subscription_id
            );
            self.notifications.pop_front();
        }
        if self.notifications.is_empty() {
            self.ready_since = Some(notification.publish_time);
        }
        self.notifications.push_back(notification);
    }

    pub(crate) fn take_notification(&mut self) -> Option<NotificationMessage> {
        let notification = self.notifications.pop_front();
        if self.notifications.is_empty() {
            self.ready_since = None;
        }
        notification
    }

    pub(crate) fn more_notifications(&self) -> bool {
        !self.notifications.is_empty()
    }

    pub(crate) fn ready_since(&self) -> Option<DateTimeUtc> {
        self.ready_since
    }

    pub(crate) fn ready_to_remove(&self) -> bool {
        self.state == SubscriptionState::Closed && self.notifications.is_empty()
    }

    // --- Retransmission / republish

    /// Retains a sent data-bearing message until it is acknowledged. Cache pressure evicts
    /// the oldest retained message.
    pub(crate) fn retain_for_republish(&mut self, notification: &NotificationMessage) {
        if notification.is_keep_alive() {
            return;
        }
        while self.retransmission_queue.len() >= self.max_retransmission_queue {
            let oldest = *self.retransmission_queue.keys().next().unwrap();
            debug!(
                "Retransmission queue of subscription {} is full, evicting sequence number {}",
                self.subscription_id, oldest
            );
            self.retransmission_queue.remove(&oldest);
        }
        self.retransmission_queue
            .insert(notification.sequence_number, notification.clone());
    }

    /// Releases an acknowledged message. An unknown or already acknowledged sequence number
    /// yields a localized bad status without failing anything else.
    pub(crate) fn acknowledge(&mut self, sequence_number: u32) -> StatusCode {
        if self.retransmission_queue.remove(&sequence_number).is_some() {
            trace!(
                "Removing subscription {} sequence number {} from retransmission queue",
                self.subscription_id,
                sequence_number
            );
            StatusCode::Good
        } else {
            error!(
                "Cannot find acknowledged notification with sequence number {}",
                sequence_number
            );
            StatusCode::BadSequenceNumberUnknown
        }
    }

    /// Finds a retained message for republish. `BadMessageNotAvailable` if it was never sent,
    /// already acknowledged, or evicted from the retention window.
    pub(crate) fn find_retransmission(
        &self,
        sequence_number: u32,
    ) -> Result<NotificationMessage, StatusCode> {
        self.retransmission_queue
            .get(&sequence_number)
            .cloned()
            .ok_or(StatusCode::BadMessageNotAvailable)
    }

    /// The sequence numbers still held for republish, oldest first.
    pub(crate) fn available_sequence_numbers(&self) -> Option<Vec<u32>> {
        if self.retransmission_queue.is_empty() {
            None
        } else {
            Some(self.retransmission_queue.keys().copied().collect())
        }
    }

    // --- Lifecycle

    /// Registers a listener fired exactly once when the subscription terminates.
    pub fn on_terminated(&mut self, listener: SubscriptionTerminatedListener) {
        if self.terminated {
            listener(self.subscription_id, StatusCode::Good);
        } else {
            self.terminated_listeners.push(listener);
        }
    }

    /// Terminates the subscription - explicit deletion, session teardown or lifetime expiry
    /// all come through here. Fires the terminated signal exactly once; already-assembled
    /// notification messages stay queued for delivery.
    pub(crate) fn terminate(&mut self, status: StatusCode) {
        self.state = SubscriptionState::Closed;
        self.finish_terminate(status);
    }

    fn finish_terminate(&mut self, status: StatusCode) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        for monitored_item in self.monitored_items.values_mut() {
            monitored_item.terminate();
        }
        self.monitored_items.clear();
        let subscription_id = self.subscription_id;
        for listener in self.terminated_listeners.drain(..) {
            listener(subscription_id, status);
        }
    }

    /// Reset the keep-alive counter to the maximum keep-alive count of the Subscription.
    /// The maximum keep-alive count is set by the Client when the Subscription is created
    /// and may be modified using the ModifySubscription Service
    pub(crate) fn reset_keep_alive_counter(&mut self) {
        self.keep_alive_counter = self.max_keep_alive_counter;
    }

    /// Reset the lifetime counter to the value specified for the lifetime of the subscription
    /// in the create subscription service
    pub(crate) fn reset_lifetime_counter(&mut self) {
        self.lifetime_counter = self.max_lifetime_counter;
    }

    /// Decrements the lifetime counter because a publishing interval elapsed without a
    /// publish request available to deliver on.
    fn decrement_lifetime_counter(&mut self) {
        self.lifetime_counter = self.lifetime_counter.saturating_sub(1);
        trace!("Decrementing life time counter {}", self.lifetime_counter);
    }

    /// Tells the subscription to re-deliver the latest value of every reporting item on the
    /// next publish cycle, bypassing deadband suppression.
    pub(crate) fn set_resend_data(&mut self) {
        self.resend_data = true;
    }

    /// ResendData - re-enqueues every reporting item's last known value and forces a publish
    /// cycle immediately, regardless of the publishing timer.
    pub(crate) fn resend_data_now(&mut self, now: &DateTimeUtc) {
        if self.state == SubscriptionState::Closed || !self.publishing_enabled {
            return;
        }
        self.resend_data = false;
        for item in self.monitored_items.values_mut() {
            if item.is_reporting() {
                item.resend_last_value();
            }
        }
        let messages = self.drain_monitored_items(now);
        for message in messages {
            self.enqueue_notification(message);
        }
    }

    // --- Accessors

    pub fn subscription_id(&self) -> u32 {
        self.subscription_id
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn publishing_interval(&self) -> Duration {
        self.publishing_interval
    }

    pub fn publishing_enabled(&self) -> bool {
        self.publishing_enabled
    }

    pub(crate) fn set_publishing_enabled(&mut self, publishing_enabled: bool) {
        self.publishing_enabled = publishing_enabled;
    }

    pub(crate) fn set_publishing_interval(&mut self, publishing_interval: Duration) {
        self.publishing_interval = publishing_interval;
        self.reset_lifetime_counter();
    }

    pub(crate) fn set_max_lifetime_counter(&mut self, max_lifetime_counter: u32) {
        self.max_lifetime_counter = max_lifetime_counter;
    }

    pub(crate) fn set_max_keep_alive_counter(&mut self, max_keep_alive_counter: u32) {
        self.max_keep_alive_counter = max_keep_alive_counter;
    }

    pub(crate) fn set_priority(&mut self, priority: u8) {
        self.priority = priority;
    }

    pub(crate) fn set_max_notifications_per_publish(&mut self, max_notifications_per_publish: u32) {
        self.max_notifications_per_publish = max_notifications_per_publish as usize;
    }

    #[cfg(test)]
    pub(crate) fn lifetime_counter(&self) -> u32 {
        self.lifetime_counter
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::Utc;

    use crate::server::subscriptions::monitored_item::tests::{
        create_request, test_server_state,
    };
    use crate::types::{DataValue, NodeId, NotificationData, Variant};

    use super::*;

    fn test_subscription(now: DateTimeUtc) -> Subscription {
        // publishing interval 100ms, lifetime 100, keep alive 20
        Subscription::new(1, true, 100.0, 100, 20, 0, 100, 1000, 100, now)
    }

    fn test_address_space() -> (AddressSpace, NodeId) {
        let mut space = AddressSpace::new();
        let node_id = NodeId::new(2, "v1");
        let objects = NodeId::new(0, AddressSpace::OBJECTS_FOLDER);
        space.add_variable(&objects, node_id.clone(), "v1", DataValue::new_now(123));
        (space, node_id)
    }

    fn add_item(sub: &mut Subscription, space: &AddressSpace, node_id: NodeId) -> u32 {
        let state = test_server_state();
        let results = sub.create_monitored_items(
            &state,
            space,
            &Utc::now(),
            TimestampsToReturn::Both,
            &[create_request(node_id, 55, 10, true)],
        );
        assert_eq!(results[0].status_code, StatusCode::Good);
        results[0].monitored_item_id
    }

    fn first_value(message: &NotificationMessage) -> Variant {
        let notifications = message.data_change_notifications();
        assert!(!notifications.is_empty());
        notifications[0].value.value.clone().unwrap()
    }

    #[test]
    fn tick_through_states() {
        let start = Utc::now();
        let mut sub = test_subscription(start);
        let (mut space, node_id) = test_address_space();

        // Subscription is creating, handle the first tick.
        assert_eq!(sub.state(), SubscriptionState::Creating);
        sub.tick(&start, &space, TickReason::TickTimerFired, true);
        assert_eq!(sub.state(), SubscriptionState::Normal);
        assert!(!sub.first_message_sent);

        // Tick again before the publishing interval has elapsed, should change nothing.
        sub.tick(&start, &space, TickReason::TickTimerFired, true);
        assert_eq!(sub.state(), SubscriptionState::Normal);
        assert!(!sub.first_message_sent);

        add_item(&mut sub, &space, node_id.clone());

        // New tick at the next publishing interval produces the initial value
        let now = start + chrono::Duration::milliseconds(100);
        sub.tick(&now, &space, TickReason::TickTimerFired, true);
        assert_eq!(sub.state(), SubscriptionState::Normal);
        assert!(sub.first_message_sent);
        let message = sub.take_notification().unwrap();
        assert_eq!(message.sequence_number, 1);
        assert_eq!(first_value(&message), Variant::Int32(123));
        assert!(sub.take_notification().is_none());

        // Next tick produces nothing; state transitions to keep alive
        let now = start + chrono::Duration::milliseconds(200);
        sub.tick(&now, &space, TickReason::TickTimerFired, true);
        assert_eq!(sub.state(), SubscriptionState::KeepAlive);
        assert!(sub.take_notification().is_none());

        // A value change produces a data message with the next sequence number
        let now = start + chrono::Duration::milliseconds(300);
        space.set_variable_value(&node_id, 321, now);
        sub.tick(&now, &space, TickReason::TickTimerFired, true);
        assert_eq!(sub.state(), SubscriptionState::Normal);
        let message = sub.take_notification().unwrap();
        assert_eq!(message.sequence_number, 2);
        assert_eq!(first_value(&message), Variant::Int32(321));
    }

    #[test]
    fn keep_alive_does_not_consume_sequence_number() {
        let start = Utc::now();
        let mut sub = test_subscription(start);
        let (mut space, node_id) = test_address_space();
        sub.tick(&start, &space, TickReason::TickTimerFired, true);
        add_item(&mut sub, &space, node_id.clone());

        // First data message takes sequence number 1
        let now = start + chrono::Duration::milliseconds(100);
        sub.tick(&now, &space, TickReason::TickTimerFired, true);
        let message = sub.take_notification().unwrap();
        assert_eq!(message.sequence_number, 1);

        // Run the subscription into keep alive and through a full keep alive count
        let mut now = now;
        let mut keep_alive = None;
        for i in 0..21 {
            now = now + chrono::Duration::milliseconds(100);
            sub.tick(&now, &space, TickReason::TickTimerFired, true);
            if let Some(message) = sub.take_notification() {
                assert!(message.is_keep_alive(), "unexpected data message at tick {}", i);
                keep_alive = Some(message);
            }
        }
        // The keep alive advertises the *next* sequence number without consuming it
        let keep_alive = keep_alive.expect("no keep alive was produced");
        assert_eq!(keep_alive.sequence_number, 2);

        // The next data-bearing message takes exactly the advertised number
        now = now + chrono::Duration::milliseconds(100);
        space.set_variable_value(&node_id, 999, now);
        sub.tick(&now, &space, TickReason::TickTimerFired, true);
        let message = sub.take_notification().unwrap();
        assert!(!message.is_keep_alive());
        assert_eq!(message.sequence_number, 2);
    }

    #[test]
    fn lifetime_expiry_emits_status_change() {
        let start = Utc::now();
        // lifetime of 3 for a fast expiry
        let mut sub = Subscription::new(1, true, 100.0, 3, 20, 0, 100, 1000, 100, start);
        let (space, node_id) = test_address_space();
        sub.tick(&start, &space, TickReason::TickTimerFired, false);
        add_item(&mut sub, &space, node_id);

        let terminated = Arc::new(AtomicUsize::new(0));
        let terminated2 = terminated.clone();
        sub.on_terminated(Box::new(move |_, status| {
            assert_eq!(status, StatusCode::BadTimeout);
            terminated2.fetch_add(1, Ordering::SeqCst);
        }));

        // Starve the subscription of publish requests until the lifetime runs out
        let mut now = start;
        let mut result = TickResult::None;
        for _ in 0..4 {
            now = now + chrono::Duration::milliseconds(100);
            result = sub.tick(&now, &space, TickReason::TickTimerFired, false);
            if result == TickResult::Expired {
                break;
            }
        }
        assert_eq!(result, TickResult::Expired);
        assert_eq!(sub.state(), SubscriptionState::Closed);
        assert_eq!(terminated.load(Ordering::SeqCst), 1);
        // The status change message is queued for delivery and carries BadTimeout
        let message = sub.take_notification().unwrap();
        let NotificationData::StatusChange(status_change) = &message.notification_data[0] else {
            panic!("expected a status change");
        };
        assert_eq!(status_change.status, StatusCode::BadTimeout);
        // Terminating again does not fire the listener a second time
        sub.terminate(StatusCode::Good);
        assert_eq!(terminated.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn publishing_disabled_skips_ticks_entirely() {
        let start = Utc::now();
        let mut sub = test_subscription(start);
        let (space, node_id) = test_address_space();
        sub.tick(&start, &space, TickReason::TickTimerFired, true);
        add_item(&mut sub, &space, node_id);
        sub.set_publishing_enabled(false);

        let lifetime = sub.lifetime_counter();
        let mut now = start;
        for _ in 0..10 {
            now = now + chrono::Duration::milliseconds(100);
            // No publish requests available either; the lifetime must not move
            assert_eq!(sub.tick(&now, &space, TickReason::TickTimerFired, false), TickResult::None);
        }
        assert_eq!(sub.lifetime_counter(), lifetime);
        assert!(sub.take_notification().is_none());
    }

    #[test]
    fn resend_data_redelivers_last_value() {
        let start = Utc::now();
        let mut sub = test_subscription(start);
        let (space, node_id) = test_address_space();
        sub.tick(&start, &space, TickReason::TickTimerFired, true);
        add_item(&mut sub, &space, node_id);

        let now = start + chrono::Duration::milliseconds(100);
        sub.tick(&now, &space, TickReason::TickTimerFired, true);
        let first = sub.take_notification().unwrap();
        assert_eq!(first_value(&first), Variant::Int32(123));

        // No value change, but resend data forces a re-delivery of the same content
        sub.set_resend_data();
        let now = now + chrono::Duration::milliseconds(100);
        sub.tick(&now, &space, TickReason::TickTimerFired, true);
        let resent = sub.take_notification().unwrap();
        assert_eq!(resent.sequence_number, 2);
        assert_eq!(first_value(&resent), Variant::Int32(123));
    }

    #[test]
    fn retransmission_queue_acknowledge_and_republish() {
        let start = Utc::now();
        let mut sub = test_subscription(start);
        let message = NotificationMessage::data_change(
            1,
            start,
            vec![crate::types::MonitoredItemNotification {
                client_handle: 1,
                value: DataValue::new_at(1, start),
            }],
            vec![],
        );
        sub.retain_for_republish(&message);
        assert_eq!(sub.available_sequence_numbers(), Some(vec![1]));
        // Republish returns identical content
        assert_eq!(sub.find_retransmission(1).unwrap(), message);
        // Acknowledge releases it
        assert_eq!(sub.acknowledge(1), StatusCode::Good);
        // A duplicate acknowledge is a localized error
        assert_eq!(sub.acknowledge(1), StatusCode::BadSequenceNumberUnknown);
        assert_eq!(
            sub.find_retransmission(1).unwrap_err(),
            StatusCode::BadMessageNotAvailable
        );
    }

    #[test]
    fn retransmission_queue_bounded() {
        let start = Utc::now();
        let mut sub = Subscription::new(1, true, 100.0, 100, 20, 0, 100, 1000, 3, start);
        for seq in 1..=5u32 {
            let message = NotificationMessage::data_change(
                seq,
                start,
                vec![crate::types::MonitoredItemNotification {
                    client_handle: 1,
                    value: DataValue::new_at(seq as i32, start),
                }],
                vec![],
            );
            // Bypass enqueue_notification's sequencing; retention is what's under test
            sub.retain_for_republish(&message);
        }
        assert_eq!(sub.available_sequence_numbers(), Some(vec![3, 4, 5]));
        assert_eq!(
            sub.find_retransmission(1).unwrap_err(),
            StatusCode::BadMessageNotAvailable
        );
    }

    #[test]
    fn triggered_sampling_items_report_with_trigger() {
        let start = Utc::now();
        let mut sub = test_subscription(start);
        let (mut space, node_id) = test_address_space();
        let node2 = NodeId::new(2, "v2");
        let objects = NodeId::new(0, AddressSpace::OBJECTS_FOLDER);
        space.add_variable(&objects, node2.clone(), "v2", DataValue::new_now(7));
        sub.tick(&start, &space, TickReason::TickTimerFired, true);

        let trigger_id = add_item(&mut sub, &space, node_id.clone());
        let state = test_server_state();
        let mut sampling_request = create_request(node2.clone(), 56, 10, true);
        sampling_request.monitoring_mode = MonitoringMode::Sampling;
        let results = sub.create_monitored_items(
            &state,
            &space,
            &start,
            TimestampsToReturn::Both,
            &[sampling_request],
        );
        let sampled_id = results[0].monitored_item_id;
        sub.set_triggering(trigger_id, &[sampled_id], &[]).unwrap();

        // Both values change; the sampling item's queue only reports because of the trigger
        let now = start + chrono::Duration::milliseconds(100);
        space.set_variable_value(&node_id, 124, now);
        space.set_variable_value(&node2, 8, now);
        sub.tick(&now, &space, TickReason::TickTimerFired, true);
        let message = sub.take_notification().unwrap();
        let handles: Vec<u32> = message
            .data_change_notifications()
            .iter()
            .map(|n| n.client_handle)
            .collect();
        assert!(handles.contains(&55));
        assert!(handles.contains(&56));
    }
}
