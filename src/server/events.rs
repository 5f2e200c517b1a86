// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Events and event filter evaluation. An event is a bag of named fields raised against a
//! source node; an event filter projects the fields a monitored item selected into the
//! notification it receives.

use std::collections::BTreeMap;

use crate::types::{
    DateTimeUtc, EventFieldList, EventFilter, NodeId, StatusCode, Variant,
};

/// An event raised against a node in the address space.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// The type of the event
    pub event_type: NodeId,
    /// The node the event was raised against
    pub source_node: NodeId,
    /// The time the event happened
    pub time: DateTimeUtc,
    /// Fields by name, projected by select clauses
    pub fields: BTreeMap<String, Variant>,
}

impl Event {
    pub fn new<T>(event_type: NodeId, source_node: NodeId, time: DateTimeUtc, message: T) -> Event
    where
        T: Into<String>,
    {
        let mut fields = BTreeMap::new();
        fields.insert("Message".to_string(), Variant::from(message.into()));
        Event {
            event_type,
            source_node,
            time,
            fields,
        }
    }

    pub fn field<T>(mut self, name: &str, value: T) -> Event
    where
        T: Into<Variant>,
    {
        self.fields.insert(name.to_string(), value.into());
        self
    }
}

/// Validates an event filter at monitored item creation time. A filter selecting nothing can
/// never produce a notification, so it is rejected rather than silently accepted.
pub(crate) fn validate(filter: &EventFilter) -> Result<EventFilter, StatusCode> {
    if filter.select_clauses.is_empty() {
        error!("Event filter has no select clauses");
        Err(StatusCode::BadEventFilterInvalid)
    } else {
        Ok(filter.clone())
    }
}

/// Projects an event's fields through the filter's select clauses. Fields the event does not
/// carry come back as `Variant::Empty` so the field positions always line up with the clauses.
pub(crate) fn evaluate(filter: &EventFilter, event: &Event, client_handle: u32) -> EventFieldList {
    let event_fields = filter
        .select_clauses
        .iter()
        .map(|clause| {
            event
                .fields
                .get(clause)
                .cloned()
                .unwrap_or(Variant::Empty)
        })
        .collect();
    EventFieldList {
        client_handle,
        event_fields,
    }
}
