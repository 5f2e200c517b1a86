// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The types module holds the data types exchanged between the engine and its callers - node
//! identifiers, variant values, status codes, data values, notifications and the typed service
//! request / response structures. There is no wire encoding here; requests and responses are
//! plain structs handed across the API boundary.

mod attribute;
mod data_value;
mod date_time;
mod node_id;
mod notification;
mod status_code;
mod variant;

pub mod service;

pub use attribute::AttributeId;
pub use data_value::DataValue;
pub use date_time::DateTimeUtc;
pub use node_id::{Identifier, NodeId};
pub use notification::{
    EventFieldList, MonitoredItemNotification, NotificationData, NotificationMessage,
    StatusChangeNotification,
};
pub use service::*;
pub use status_code::StatusCode;
pub use variant::Variant;

/// Durations in service parameters are expressed as floating point milliseconds, the way the
/// protocol carries them.
pub type Duration = f64;
