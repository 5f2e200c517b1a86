// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Typed request / response structures for the services the engine implements, plus the
//! request and response headers they all share. Filters and identity tokens are closed enums,
//! validated at construction - there are no dynamically shaped parameter objects.

mod attribute;
mod method;
mod monitored_item;
mod session;
mod subscription;
mod view;

pub use attribute::*;
pub use method::*;
pub use monitored_item::*;
pub use session::*;
pub use subscription::*;
pub use view::*;

use chrono::Utc;

use crate::types::{
    data_value::DataValue, date_time::DateTimeUtc, node_id::NodeId, status_code::StatusCode,
    variant::Variant, Duration,
};

/// The header common to every service request. The authentication token identifies the session
/// the request executes under; `timeout_hint` bounds how long the caller is prepared to wait,
/// which matters for queued publish requests.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestHeader {
    pub authentication_token: NodeId,
    pub timestamp: DateTimeUtc,
    pub request_handle: u32,
    pub timeout_hint: u32,
}

impl Default for RequestHeader {
    fn default() -> Self {
        RequestHeader {
            authentication_token: NodeId::null(),
            timestamp: Utc::now(),
            request_handle: 0,
            timeout_hint: 0,
        }
    }
}

impl RequestHeader {
    pub fn new(authentication_token: &NodeId, timestamp: DateTimeUtc, request_handle: u32) -> Self {
        RequestHeader {
            authentication_token: authentication_token.clone(),
            timestamp,
            request_handle,
            timeout_hint: 0,
        }
    }
}

/// The header common to every service response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHeader {
    pub timestamp: DateTimeUtc,
    pub request_handle: u32,
    pub service_result: StatusCode,
}

impl ResponseHeader {
    pub fn new_good(request_header: &RequestHeader) -> ResponseHeader {
        Self::new_service_result(request_header, StatusCode::Good)
    }

    pub fn new_service_result(
        request_header: &RequestHeader,
        service_result: StatusCode,
    ) -> ResponseHeader {
        ResponseHeader {
            timestamp: Utc::now(),
            request_handle: request_header.request_handle,
            service_result,
        }
    }
}

/// The whole-request failure response. Per-operation failures inside batches are reported
/// through the per-item status codes, never through a fault.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceFault {
    pub response_header: ResponseHeader,
}

impl ServiceFault {
    pub fn new(request_header: &RequestHeader, service_result: StatusCode) -> ServiceFault {
        ServiceFault {
            response_header: ResponseHeader::new_service_result(request_header, service_result),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.response_header.service_result
    }
}

/// Every service handler returns either its typed response or a whole-request fault.
pub type ServiceResult<T> = std::result::Result<T, ServiceFault>;

/// Which timestamps the caller wants returned on data values.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampsToReturn {
    Source,
    Server,
    Both,
    Neither,
}

/// The monitoring mode of a monitored item. Disabled items do not sample; Sampling items
/// sample and queue but their queue is not reported; Reporting items are included in the next
/// publish cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitoringMode {
    Disabled,
    Sampling,
    Reporting,
}

/// Which parts of a data value participate in the change test of a data change filter.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataChangeTrigger {
    Status,
    StatusValue,
    StatusValueTimestamp,
}

/// The deadband applied to numeric value changes. Absolute compares raw magnitudes, Percent
/// compares against the node's engineering unit range.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum Deadband {
    None,
    Absolute(f64),
    Percent(f64),
}

/// Decides whether a new data value differs from the last reported one.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataChangeFilter {
    pub trigger: DataChangeTrigger,
    pub deadband: Deadband,
}

impl Default for DataChangeFilter {
    fn default() -> Self {
        DataChangeFilter {
            trigger: DataChangeTrigger::StatusValue,
            deadband: Deadband::None,
        }
    }
}

impl DataChangeFilter {
    /// Compares one data value to another according to the filter's trigger and deadband.
    /// Returns true if the values are considered the "same" within the filter's limits, i.e.
    /// the change should be suppressed.
    pub fn compare(&self, v1: &DataValue, v2: &DataValue, eu_range: Option<(f64, f64)>) -> bool {
        match self.trigger {
            DataChangeTrigger::Status => v1.status() == v2.status(),
            DataChangeTrigger::StatusValue => {
                v1.status() == v2.status() && self.compare_value_option(&v1.value, &v2.value, eu_range)
            }
            DataChangeTrigger::StatusValueTimestamp => {
                v1.status() == v2.status()
                    && self.compare_value_option(&v1.value, &v2.value, eu_range)
                    && v1.server_timestamp == v2.server_timestamp
            }
        }
    }

    /// Compares two optional variant values to each other. Returns true if they are considered
    /// the "same".
    pub fn compare_value_option(
        &self,
        v1: &Option<Variant>,
        v2: &Option<Variant>,
        eu_range: Option<(f64, f64)>,
    ) -> bool {
        match (v1, v2) {
            (Some(_), None) | (None, Some(_)) => false,
            // If it's always none then it hasn't changed
            (None, None) => true,
            (Some(v1), Some(v2)) => self.compare_value(v1, v2, eu_range).unwrap_or(true),
        }
    }

    /// Compares two values, either a straight value compare or a numeric comparison against the
    /// deadband settings. If a deadband is asked for and the values are not convertible into a
    /// numeric value, the result is false. The result is true if the values are the same within
    /// the limits set.
    ///
    /// The `eu_range` is the engineering unit range the value typically operates between. It's
    /// required for percent deadband comparison and ignored otherwise.
    ///
    /// # Errors
    ///
    /// `BadDeadbandFilterInvalid` indicates the deadband settings were invalid, e.g. a negative
    /// threshold, or a percent compare without a usable (low, high) range.
    pub fn compare_value(
        &self,
        v1: &Variant,
        v2: &Variant,
        eu_range: Option<(f64, f64)>,
    ) -> std::result::Result<bool, StatusCode> {
        match self.deadband {
            Deadband::None => Ok(v1 == v2),
            Deadband::Absolute(threshold) => match (v1.as_f64(), v2.as_f64()) {
                (None, _) | (_, None) => Ok(false),
                (Some(v1), Some(v2)) => {
                    if threshold < 0f64 {
                        Err(StatusCode::BadDeadbandFilterInvalid)
                    } else {
                        Ok(Self::abs_compare(v1, v2, threshold))
                    }
                }
            },
            Deadband::Percent(threshold) => match (v1.as_f64(), v2.as_f64()) {
                (None, _) | (_, None) => Ok(false),
                (Some(v1), Some(v2)) => {
                    if threshold < 0f64 {
                        Err(StatusCode::BadDeadbandFilterInvalid)
                    } else {
                        match eu_range {
                            None => Err(StatusCode::BadDeadbandFilterInvalid),
                            Some((low, high)) => {
                                if low >= high {
                                    Err(StatusCode::BadDeadbandFilterInvalid)
                                } else {
                                    Ok(Self::pct_compare(v1, v2, low, high, threshold))
                                }
                            }
                        }
                    }
                }
            },
        }
    }

    /// Compares the difference between v1 and v2 to the threshold. The two values are
    /// considered equal if their difference is less than or equal to the threshold.
    pub fn abs_compare(v1: f64, v2: f64, threshold_diff: f64) -> bool {
        (v1 - v2).abs() <= threshold_diff
    }

    /// Compares the percentage difference between v1 and v2 using the low-high range as the
    /// comparison. The two values are considered equal if their percentage difference is less
    /// than or equal to the threshold.
    pub fn pct_compare(v1: f64, v2: f64, low: f64, high: f64, threshold_pct_change: f64) -> bool {
        let v1_pct = 100f64 * (v1 - low) / (high - low);
        let v2_pct = 100f64 * (v2 - low) / (high - low);
        (v1_pct - v2_pct).abs() <= threshold_pct_change
    }
}

/// Selects event fields by their name. An event notification carries the selected fields in
/// clause order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    pub select_clauses: Vec<String>,
}

/// The closed set of filters a monitored item can carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MonitoringFilter {
    None,
    DataChange(DataChangeFilter),
    Event(EventFilter),
}

/// The sampling / queueing parameters requested for a monitored item.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringParameters {
    /// Caller-chosen correlation id carried back on every notification for the item.
    pub client_handle: u32,
    /// Requested sampling interval in ms. Negative means "use the publishing interval",
    /// zero means fastest supported rate. Revised to the server's capability.
    pub sampling_interval: Duration,
    pub filter: MonitoringFilter,
    /// Requested queue depth; revised to the server's capability, minimum 1.
    pub queue_size: u32,
    /// true - on overflow evict the oldest entry; false - discard the incoming value.
    pub discard_oldest: bool,
}

impl Default for MonitoringParameters {
    fn default() -> Self {
        MonitoringParameters {
            client_handle: 0,
            sampling_interval: -1.0,
            filter: MonitoringFilter::None,
            queue_size: 1,
            discard_oldest: true,
        }
    }
}
