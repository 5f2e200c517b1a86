// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Helpers for NotificationMessage types

use crate::types::{
    data_value::DataValue, date_time::DateTimeUtc, status_code::StatusCode, variant::Variant,
};

/// A single monitored item data change, keyed by the client handle the caller supplied when the
/// item was created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitoredItemNotification {
    pub client_handle: u32,
    pub value: DataValue,
}

/// The selected fields of an event, keyed by client handle. Fields appear in select clause
/// order; fields the event did not carry are `Variant::Empty`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventFieldList {
    pub client_handle: u32,
    pub event_fields: Vec<Variant>,
}

/// Notifies the subscriber that the subscription itself changed state, e.g. timed out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChangeNotification {
    pub status: StatusCode,
}

/// One batch of notifications of a single kind inside a notification message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NotificationData {
    DataChange(Vec<MonitoredItemNotification>),
    Events(Vec<EventFieldList>),
    StatusChange(StatusChangeNotification),
}

/// The message a publish response carries: a sequence number, the publish time and zero or
/// more notification batches. A keep-alive carries no batches and advertises the sequence
/// number the next data-bearing message will use without consuming it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationMessage {
    pub sequence_number: u32,
    pub publish_time: DateTimeUtc,
    pub notification_data: Vec<NotificationData>,
}

impl NotificationMessage {
    /// Create a notification message which contains data changes AND / OR events. Calling this
    /// with neither will panic. There can be up to 2 batches to cover the case where a
    /// subscription holds monitored items for both values and events.
    pub fn data_change(
        sequence_number: u32,
        publish_time: DateTimeUtc,
        data_change_notifications: Vec<MonitoredItemNotification>,
        event_notifications: Vec<EventFieldList>,
    ) -> NotificationMessage {
        if data_change_notifications.is_empty() && event_notifications.is_empty() {
            panic!("No notifications supplied to data_change()");
        }
        let mut notification_data = Vec::with_capacity(2);
        if !data_change_notifications.is_empty() {
            notification_data.push(NotificationData::DataChange(data_change_notifications));
        }
        if !event_notifications.is_empty() {
            notification_data.push(NotificationData::Events(event_notifications));
        }
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data,
        }
    }

    /// Create a status change notification message
    pub fn status_change(
        sequence_number: u32,
        publish_time: DateTimeUtc,
        status: StatusCode,
    ) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: vec![NotificationData::StatusChange(StatusChangeNotification {
                status,
            })],
        }
    }

    /// Create a keep-alive notification message
    pub fn keep_alive(sequence_number: u32, publish_time: DateTimeUtc) -> NotificationMessage {
        NotificationMessage {
            sequence_number,
            publish_time,
            notification_data: Vec::new(),
        }
    }

    pub fn is_keep_alive(&self) -> bool {
        self.notification_data.is_empty()
    }

    /// All the data change notifications in the message, oldest batch first.
    pub fn data_change_notifications(&self) -> Vec<&MonitoredItemNotification> {
        self.notification_data
            .iter()
            .filter_map(|d| match d {
                NotificationData::DataChange(v) => Some(v.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// All the event notifications in the message.
    pub fn event_notifications(&self) -> Vec<&EventFieldList> {
        self.notification_data
            .iter()
            .filter_map(|d| match d {
                NotificationData::Events(v) => Some(v.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}
