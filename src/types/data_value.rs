// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use chrono::Utc;

use crate::types::{date_time::DateTimeUtc, status_code::StatusCode, variant::Variant};

/// A `DataValue` is a value read from a node attribute together with its status and the
/// timestamps at which it was sourced and observed. A read always yields one coherent
/// value + status + timestamp triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValue {
    /// The value. None means the value has never been set.
    pub value: Option<Variant>,
    /// The status associated with the value. None is equivalent to Good.
    pub status: Option<StatusCode>,
    /// The time the value originated at its source.
    pub source_timestamp: Option<DateTimeUtc>,
    /// The time the server observed the value.
    pub server_timestamp: Option<DateTimeUtc>,
}

impl Default for DataValue {
    fn default() -> Self {
        Self::null()
    }
}

impl DataValue {
    /// A data value with no value and no status.
    pub fn null() -> DataValue {
        DataValue {
            value: None,
            status: None,
            source_timestamp: None,
            server_timestamp: None,
        }
    }

    /// Creates a data value stamped with the current time.
    pub fn new_now<V>(value: V) -> DataValue
    where
        V: Into<Variant>,
    {
        let now = Utc::now();
        Self::new_at(value, now)
    }

    /// Creates a data value stamped with the supplied time.
    pub fn new_at<V>(value: V, time: DateTimeUtc) -> DataValue
    where
        V: Into<Variant>,
    {
        DataValue {
            value: Some(value.into()),
            status: Some(StatusCode::Good),
            source_timestamp: Some(time),
            server_timestamp: Some(time),
        }
    }

    /// A data value carrying only an error status, e.g. when a refresh of the underlying
    /// value failed.
    pub fn new_status_at(status: StatusCode, time: DateTimeUtc) -> DataValue {
        DataValue {
            value: None,
            status: Some(status),
            source_timestamp: Some(time),
            server_timestamp: Some(time),
        }
    }

    /// The status of the value; an absent status means Good.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::Good)
    }

    /// Tests if the value is valid, i.e. present with a good or uncertain status.
    pub fn is_valid(&self) -> bool {
        !self.status().is_bad()
    }

    pub fn set_timestamps(&mut self, time: DateTimeUtc) {
        self.source_timestamp = Some(time);
        self.server_timestamp = Some(time);
    }
}
