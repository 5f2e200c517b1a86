// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The sampling engine decides, for one monitored item, whether a freshly observed value
//! constitutes a reportable change. It owns the comparison state - the last retained value,
//! the last observed engineering unit range and the sample clock - and applies the item's
//! filter including deadband suppression and the semantic-change flag.

use crate::types::{
    DataValue, DateTimeUtc, Duration, MonitoringFilter, StatusCode,
};

use super::duration_from_ms;

#[derive(Debug)]
pub(crate) struct SamplingEngine {
    filter: MonitoringFilter,
    /// Sampling interval in ms. Negative means sample at the subscription's publishing
    /// interval, zero means the fastest rate the server ticks at.
    sampling_interval: Duration,
    last_sample_time: DateTimeUtc,
    /// The value retained for comparison. This is the raw observed value, without any info
    /// bits the notification path may have added.
    last_data_value: Option<DataValue>,
    /// The engineering unit range as of the last observation.
    last_eu_range: Option<(f64, f64)>,
    /// Set when the range moved; the next enqueued value carries SEMANTICS_CHANGED and the
    /// flag clears again.
    semantics_changed_pending: bool,
}

impl SamplingEngine {
    /// `initial_eu_range` seeds the range comparison with the node's range as of creation, so
    /// that only later range movement raises the semantic-change flag.
    pub fn new(
        filter: MonitoringFilter,
        sampling_interval: Duration,
        now: DateTimeUtc,
        initial_eu_range: Option<(f64, f64)>,
    ) -> Self {
        SamplingEngine {
            filter,
            sampling_interval,
            last_sample_time: now,
            last_data_value: None,
            last_eu_range: initial_eu_range,
            semantics_changed_pending: false,
        }
    }

    pub fn filter(&self) -> &MonitoringFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: MonitoringFilter) {
        self.filter = filter;
    }

    pub fn sampling_interval(&self) -> Duration {
        self.sampling_interval
    }

    pub fn set_sampling_interval(&mut self, sampling_interval: Duration) {
        self.sampling_interval = sampling_interval;
    }

    pub fn last_sample_time(&self) -> DateTimeUtc {
        self.last_sample_time
    }

    /// Tests whether the item is due another sample at `now`.
    pub fn sample_due(&self, now: &DateTimeUtc, publishing_interval_elapsed: bool) -> bool {
        if self.sampling_interval < 0f64 {
            // Negative means use the subscription publishing interval, so the item is
            // evaluated when the publishing interval elapses and not otherwise.
            publishing_interval_elapsed
        } else if self.sampling_interval == 0f64 {
            // 0 means fastest practical rate, i.e. the tick quantum itself
            true
        } else {
            let elapsed = now.signed_duration_since(self.last_sample_time);
            elapsed >= duration_from_ms(self.sampling_interval)
        }
    }

    /// Marks a sample as taken without evaluating a value, used by the event path which has
    /// its own happened-since bookkeeping.
    pub fn mark_sampled(&mut self, now: &DateTimeUtc) {
        self.last_sample_time = *now;
    }

    /// Observes a freshly read value and range. If the value counts as changed under the
    /// filter, returns the value to enqueue - with SEMANTICS_CHANGED applied when the range
    /// moved since the previous retained sample. Returns None when the change is suppressed.
    pub fn evaluate(
        &mut self,
        now: &DateTimeUtc,
        data_value: DataValue,
        eu_range: Option<(f64, f64)>,
    ) -> Option<DataValue> {
        self.last_sample_time = *now;
        if eu_range != self.last_eu_range {
            self.semantics_changed_pending = true;
            self.last_eu_range = eu_range;
        }
        let changed = match (&self.filter, &self.last_data_value) {
            // There is no previous data value so consider it changed
            (_, None) => true,
            (MonitoringFilter::None, Some(last)) => {
                // No filter means a straight status + value comparison
                data_value.status() != last.status() || data_value.value != last.value
            }
            (MonitoringFilter::DataChange(filter), Some(last)) => {
                !filter.compare(&data_value, last, eu_range)
            }
            // Events do not flow through value sampling
            (MonitoringFilter::Event(_), Some(_)) => false,
        };
        if !changed {
            trace!("No reportable change on sampled value");
            return None;
        }
        // Retain the raw value for the next comparison
        self.last_data_value = Some(data_value.clone());
        let mut data_value = data_value;
        if self.semantics_changed_pending {
            data_value.status = Some(data_value.status() | StatusCode::SEMANTICS_CHANGED);
            self.semantics_changed_pending = false;
        }
        Some(data_value)
    }

    /// The last retained value, for resend-data. Bypasses the change test entirely and does
    /// not advance the sample clock.
    pub fn last_value(&self) -> Option<DataValue> {
        self.last_data_value.clone()
    }

    pub fn has_last_value(&self) -> bool {
        self.last_data_value.is_some()
    }
}
