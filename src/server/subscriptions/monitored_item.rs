// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::collections::{BTreeSet, VecDeque};

use crate::server::{
    address_space::AddressSpace,
    events,
    state::ServerState,
};
use crate::types::{
    DataValue, DateTimeUtc, Duration, EventFieldList, MonitoredItemCreateRequest,
    MonitoredItemModifyRequest, MonitoredItemNotification, MonitoringFilter, MonitoringMode,
    ReadValueId, StatusCode, TimestampsToReturn,
};

use super::sampling::SamplingEngine;

/// A queued notification of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    MonitoredItemNotification(MonitoredItemNotification),
    Event(EventFieldList),
}

impl From<MonitoredItemNotification> for Notification {
    fn from(v: MonitoredItemNotification) -> Self {
        Notification::MonitoredItemNotification(v)
    }
}

impl From<EventFieldList> for Notification {
    fn from(v: EventFieldList) -> Self {
        Notification::Event(v)
    }
}

/// Listener invoked exactly once when the item terminates, whether the termination was
/// explicit or implicit through subscription teardown.
pub type ItemTerminatedListener = Box<dyn FnOnce(u32) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TickResult {
    /// The value changed and it should be reported
    ReportValueChanged,
    /// The value changed and it should not be reported (sampling)
    ValueChanged,
    /// The value did not change
    NoChange,
}

pub struct MonitoredItem {
    monitored_item_id: u32,
    item_to_monitor: ReadValueId,
    monitoring_mode: MonitoringMode,
    // Triggered items are other monitored items in the same subscription which are reported if
    // this monitored item changes.
    triggered_items: BTreeSet<u32>,
    client_handle: u32,
    sampler: SamplingEngine,
    discard_oldest: bool,
    queue_size: usize,
    /// The notification queue is arranged from oldest to newest, i.e. pop front gets the
    /// oldest message, pop back gets the most recent.
    notification_queue: VecDeque<Notification>,
    queue_overflow: bool,
    timestamps_to_return: TimestampsToReturn,
    terminated: bool,
    terminated_listeners: Vec<ItemTerminatedListener>,
}

impl MonitoredItem {
    pub(crate) fn new(
        now: &DateTimeUtc,
        monitored_item_id: u32,
        timestamps_to_return: TimestampsToReturn,
        server_state: &ServerState,
        address_space: &AddressSpace,
        request: &MonitoredItemCreateRequest,
    ) -> Result<MonitoredItem, StatusCode> {
        let filter = Self::validate_filter(
            &request.requested_parameters.filter,
            &request.item_to_monitor,
            address_space,
        )?;
        let sampling_interval = Self::sanitize_sampling_interval(
            server_state,
            request.requested_parameters.sampling_interval,
        );
        let queue_size = Self::sanitize_queue_size(
            server_state,
            request.requested_parameters.queue_size as usize,
        );
        let initial_eu_range = address_space.eu_range(&request.item_to_monitor.node_id);
        Ok(MonitoredItem {
            monitored_item_id,
            item_to_monitor: request.item_to_monitor.clone(),
            monitoring_mode: request.monitoring_mode,
            triggered_items: BTreeSet::new(),
            client_handle: request.requested_parameters.client_handle,
            sampler: SamplingEngine::new(filter, sampling_interval, *now, initial_eu_range),
            discard_oldest: request.requested_parameters.discard_oldest,
            timestamps_to_return,
            queue_size,
            notification_queue: VecDeque::with_capacity(queue_size),
            queue_overflow: false,
            terminated: false,
            terminated_listeners: Vec::new(),
        })
    }

    /// Modifies the existing item with the values of the modify request.
    pub(crate) fn modify(
        &mut self,
        server_state: &ServerState,
        address_space: &AddressSpace,
        timestamps_to_return: TimestampsToReturn,
        request: &MonitoredItemModifyRequest,
    ) -> Result<MonitoringFilter, StatusCode> {
        let filter = Self::validate_filter(
            &request.requested_parameters.filter,
            &self.item_to_monitor,
            address_space,
        )?;
        self.timestamps_to_return = timestamps_to_return;
        self.sampler.set_filter(filter.clone());
        self.sampler.set_sampling_interval(Self::sanitize_sampling_interval(
            server_state,
            request.requested_parameters.sampling_interval,
        ));
        self.queue_size = Self::sanitize_queue_size(
            server_state,
            request.requested_parameters.queue_size as usize,
        );
        self.client_handle = request.requested_parameters.client_handle;
        self.discard_oldest = request.requested_parameters.discard_oldest;

        // Shrink the notification queue to the new threshold, discarding the oldest entries
        if self.notification_queue.len() > self.queue_size {
            let discard = self.notification_queue.len() - self.queue_size;
            let _ = self.notification_queue.drain(0..discard);
        }
        Ok(filter)
    }

    /// Validates the filter a create or modify request carries. A percent deadband requires
    /// an engineering unit range on the monitored node; without one the filter is unsupported,
    /// reported to the caller rather than silently ignored.
    fn validate_filter(
        filter: &MonitoringFilter,
        item_to_monitor: &ReadValueId,
        address_space: &AddressSpace,
    ) -> Result<MonitoringFilter, StatusCode> {
        match filter {
            MonitoringFilter::None => Ok(MonitoringFilter::None),
            MonitoringFilter::DataChange(f) => {
                match f.deadband {
                    crate::types::Deadband::None => {}
                    crate::types::Deadband::Absolute(v) => {
                        if v < 0.0 {
                            return Err(StatusCode::BadDeadbandFilterInvalid);
                        }
                    }
                    crate::types::Deadband::Percent(v) => {
                        if v < 0.0 {
                            return Err(StatusCode::BadDeadbandFilterInvalid);
                        }
                        match address_space.eu_range(&item_to_monitor.node_id) {
                            None => {
                                error!(
                                    "Percent deadband on node {} which has no EU range",
                                    item_to_monitor.node_id
                                );
                                return Err(StatusCode::BadMonitoredItemFilterUnsupported);
                            }
                            Some((low, high)) if low >= high => {
                                return Err(StatusCode::BadDeadbandFilterInvalid);
                            }
                            Some(_) => {}
                        }
                    }
                }
                Ok(MonitoringFilter::DataChange(*f))
            }
            MonitoringFilter::Event(f) => {
                let f = events::validate(f)?;
                Ok(MonitoringFilter::Event(f))
            }
        }
    }

    /// Called repeatedly on the monitored item as the owning subscription ticks.
    ///
    /// If the monitored item has a negative interval and the subscription interval has
    /// elapsed, the value is tested immediately. Otherwise the monitored item's own sampling
    /// interval controls the rate.
    pub(crate) fn tick(
        &mut self,
        now: &DateTimeUtc,
        address_space: &AddressSpace,
        publishing_interval_elapsed: bool,
    ) -> TickResult {
        if self.monitoring_mode == MonitoringMode::Disabled {
            return TickResult::NoChange;
        }
        if !self.sampler.sample_due(now, publishing_interval_elapsed) {
            return TickResult::NoChange;
        }
        let is_event = matches!(self.sampler.filter(), MonitoringFilter::Event(_));
        let changed = if is_event {
            self.check_for_events(now, address_space)
        } else {
            self.check_for_data_change(now, address_space)
        };
        if changed || !self.notification_queue.is_empty() {
            if self.monitoring_mode == MonitoringMode::Reporting {
                TickResult::ReportValueChanged
            } else {
                TickResult::ValueChanged
            }
        } else {
            TickResult::NoChange
        }
    }

    /// Checks for events raised against the monitored node since the last sample. Only
    /// relevant when monitoring the EventNotifier attribute of a notifying node.
    fn check_for_events(&mut self, now: &DateTimeUtc, address_space: &AddressSpace) -> bool {
        if self.item_to_monitor.attribute_id != crate::types::AttributeId::EventNotifier as u32 {
            return false;
        }
        if !address_space.is_event_notifier(&self.item_to_monitor.node_id) {
            return false;
        }
        let happened_since = self.sampler.last_sample_time();
        let MonitoringFilter::Event(filter) = self.sampler.filter().clone() else {
            return false;
        };
        let notifications: Vec<EventFieldList> = address_space
            .events_since(&self.item_to_monitor.node_id, &happened_since)
            .into_iter()
            .map(|event| events::evaluate(&filter, event, self.client_handle))
            .collect();
        self.sampler.mark_sampled(now);
        if notifications.is_empty() {
            false
        } else {
            for n in notifications {
                self.enqueue_notification(n);
            }
            true
        }
    }

    /// Fetches the most recent value of the monitored item from the address space and runs it
    /// through the sampler. A failed read enqueues the error status rather than erroring out.
    fn check_for_data_change(&mut self, now: &DateTimeUtc, address_space: &AddressSpace) -> bool {
        let data_value = address_space
            .read_attribute(&self.item_to_monitor.node_id, self.item_to_monitor.attribute_id);
        let eu_range = address_space.eu_range(&self.item_to_monitor.node_id);
        match self.sampler.evaluate(now, data_value, eu_range) {
            Some(data_value) => {
                trace!(
                    "Data change on item {}, node {}",
                    self.monitored_item_id,
                    self.item_to_monitor.node_id
                );
                let data_value = self.strip_timestamps(data_value);
                let client_handle = self.client_handle;
                self.enqueue_notification(MonitoredItemNotification {
                    client_handle,
                    value: data_value,
                });
                true
            }
            None => false,
        }
    }

    /// Strips out the timestamps the subscriber is not interested in.
    fn strip_timestamps(&self, mut data_value: DataValue) -> DataValue {
        match self.timestamps_to_return {
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
            TimestampsToReturn::Both => {
                // DO NOTHING
            }
        }
        data_value
    }

    /// Enqueues a notification. On overflow the queue keeps its bound: under discard-oldest
    /// the head is evicted and the overflow flag lands on the new boundary (oldest retained)
    /// entry; under discard-newest the incoming value is dropped and the retained tail gets
    /// the flag. At most one entry carries the flag, and queues of size 1 never flag.
    pub(crate) fn enqueue_notification<T>(&mut self, notification: T)
    where
        T: Into<Notification>,
    {
        let notification = notification.into();
        if self.notification_queue.len() < self.queue_size {
            self.notification_queue.push_back(notification);
            return;
        }
        trace!("Queue overflow on item {}", self.monitored_item_id);
        // Overflow only affects queues > 1 element
        let overflow = self.queue_size > 1;
        if self.discard_oldest {
            // Throw away the oldest item to make space at the end
            let _ = self.notification_queue.pop_front();
            self.notification_queue.push_back(notification);
            if overflow {
                if let Some(boundary) = self.notification_queue.front_mut() {
                    Self::set_overflow_flag(boundary);
                }
                self.queue_overflow = true;
            }
        } else {
            // The incoming notification is dropped and the most recent retained entry is
            // flagged instead
            if overflow {
                if let Some(boundary) = self.notification_queue.back_mut() {
                    Self::set_overflow_flag(boundary);
                }
                self.queue_overflow = true;
            }
        }
    }

    fn set_overflow_flag(notification: &mut Notification) {
        if let Notification::MonitoredItemNotification(ref mut notification) = notification {
            notification.value.status = Some(notification.value.status() | StatusCode::OVERFLOW);
        }
    }

    /// Re-enqueues the last known value and status without waiting for a new sample,
    /// bypassing deadband suppression. Does not advance the sample clock.
    pub(crate) fn resend_last_value(&mut self) -> bool {
        if let Some(value) = self.sampler.last_value() {
            let value = self.strip_timestamps(value);
            let client_handle = self.client_handle;
            self.enqueue_notification(MonitoredItemNotification {
                client_handle,
                value,
            });
            true
        } else {
            false
        }
    }

    /// Used by the subscription on a publish tick. Returns and clears all currently queued
    /// items in FIFO order, or nothing at all unless the item is in Reporting mode.
    pub(crate) fn drain(&mut self) -> Vec<Notification> {
        if self.monitoring_mode != MonitoringMode::Reporting {
            return Vec::new();
        }
        self.take_all()
    }

    /// Drains the queue of a Sampling mode item that was triggered by another item.
    pub(crate) fn drain_triggered(&mut self) -> Vec<Notification> {
        if self.monitoring_mode != MonitoringMode::Sampling {
            return Vec::new();
        }
        self.take_all()
    }

    fn take_all(&mut self) -> Vec<Notification> {
        self.queue_overflow = false;
        self.notification_queue.drain(..).collect()
    }

    /// Changes the monitoring mode. Disabling clears the queue without delivering; enabling
    /// reporting re-arms sampling but does not re-deliver historical samples.
    pub(crate) fn set_monitoring_mode(&mut self, monitoring_mode: MonitoringMode) {
        if monitoring_mode == MonitoringMode::Disabled {
            self.notification_queue.clear();
            self.queue_overflow = false;
        }
        self.monitoring_mode = monitoring_mode;
    }

    /// Adds or removes other monitored items which will be triggered when this monitored item
    /// changes. Removals are processed before additions.
    pub(crate) fn set_triggering(&mut self, items_to_add: &[u32], items_to_remove: &[u32]) {
        items_to_remove.iter().for_each(|i| {
            self.triggered_items.remove(i);
        });
        items_to_add.iter().for_each(|i| {
            self.triggered_items.insert(*i);
        });
    }

    pub(crate) fn remove_dead_trigger(&mut self, item_id: u32) {
        self.triggered_items.remove(&item_id);
    }

    /// Registers a listener fired exactly once when the item terminates.
    pub fn on_terminated(&mut self, listener: ItemTerminatedListener) {
        if self.terminated {
            // Already past the terminal state; fire immediately to preserve exactly-once
            listener(self.monitored_item_id);
        } else {
            self.terminated_listeners.push(listener);
        }
    }

    /// Emits the terminal lifecycle signal. Fires the listeners exactly once no matter how
    /// many paths lead here.
    pub(crate) fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        let id = self.monitored_item_id;
        for listener in self.terminated_listeners.drain(..) {
            listener(id);
        }
    }

    /// Takes the requested sampling interval value supplied by client and ensures it is
    /// within the range supported by the server
    fn sanitize_sampling_interval(
        server_state: &ServerState,
        requested_sampling_interval: f64,
    ) -> f64 {
        if requested_sampling_interval < 0.0 {
            // From spec "any negative number is interpreted as -1" - meaning the monitored
            // item's sampling interval defaults to the subscription's publishing interval
            -1.0
        } else if requested_sampling_interval == 0.0
            || requested_sampling_interval < server_state.min_sampling_interval_ms
        {
            server_state.min_sampling_interval_ms
        } else {
            requested_sampling_interval
        }
    }

    /// Takes the requested queue size and ensures it is within the range supported by the
    /// server
    fn sanitize_queue_size(server_state: &ServerState, requested_queue_size: usize) -> usize {
        if requested_queue_size == 0 || requested_queue_size == 1 {
            1
        } else if server_state.max_monitored_item_queue_size > 0
            && requested_queue_size > server_state.max_monitored_item_queue_size
        {
            server_state.max_monitored_item_queue_size
        } else {
            requested_queue_size
        }
    }

    pub fn monitored_item_id(&self) -> u32 {
        self.monitored_item_id
    }

    pub fn client_handle(&self) -> u32 {
        self.client_handle
    }

    pub fn sampling_interval(&self) -> Duration {
        self.sampler.sampling_interval()
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub fn monitoring_mode(&self) -> MonitoringMode {
        self.monitoring_mode
    }

    pub fn is_reporting(&self) -> bool {
        self.monitoring_mode == MonitoringMode::Reporting
    }

    pub fn is_sampling(&self) -> bool {
        self.monitoring_mode == MonitoringMode::Sampling
    }

    pub fn has_notifications(&self) -> bool {
        !self.notification_queue.is_empty()
    }

    pub fn has_last_value(&self) -> bool {
        self.sampler.has_last_value()
    }

    pub fn triggered_items(&self) -> &BTreeSet<u32> {
        &self.triggered_items
    }

    pub fn filter(&self) -> &MonitoringFilter {
        self.sampler.filter()
    }

    #[cfg(test)]
    pub fn queue_overflow(&self) -> bool {
        self.queue_overflow
    }

    #[cfg(test)]
    pub fn notification_queue(&self) -> &VecDeque<Notification> {
        &self.notification_queue
    }
}
