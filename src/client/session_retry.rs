// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::DateTimeUtc;

#[derive(PartialEq, Debug)]
pub enum Answer {
    /// Retry immediately
    Retry,
    /// Wait this many milliseconds before trying again
    WaitFor(i64),
    /// The policy has run out of retries
    GiveUp,
}

/// The session retry policy determines what a client session does when its connection drops
/// or it suffers connectivity issues. Retries back off exponentially from the base interval
/// up to a cap, and the policy gives up after the retry limit.
#[derive(PartialEq, Debug, Clone)]
pub struct SessionRetryPolicy {
    /// The number of attempts so far
    retry_count: u32,
    /// The last retry attempt
    last_attempt: Option<DateTimeUtc>,
    /// The maximum retry limit. A value of 0 means no retries, i.e. give up on first fail,
    /// None means no limit
    retry_limit: Option<u32>,
    /// Base interval between retries in ms; doubles on each consecutive failure
    base_retry_interval: i64,
    /// Ceiling the backoff will not exceed, in ms
    max_retry_interval: i64,
}

impl Default for SessionRetryPolicy {
    fn default() -> Self {
        SessionRetryPolicy {
            retry_count: 0,
            last_attempt: None,
            retry_limit: Some(Self::DEFAULT_RETRY_LIMIT),
            base_retry_interval: Self::DEFAULT_RETRY_INTERVAL_MS,
            max_retry_interval: Self::DEFAULT_MAX_RETRY_INTERVAL_MS,
        }
    }
}

impl SessionRetryPolicy {
    /// The default retry policy will attempt to reconnect up to this many times.
    pub const DEFAULT_RETRY_LIMIT: u32 = 10;
    /// The default retry policy starts waiting this long between reconnect attempts.
    pub const DEFAULT_RETRY_INTERVAL_MS: i64 = 1_000;
    /// The default backoff ceiling.
    pub const DEFAULT_MAX_RETRY_INTERVAL_MS: i64 = 30_000;

    /// Create a `SessionRetryPolicy` that retries forever with backoff from the specified
    /// base interval.
    pub fn infinity(base_retry_interval: i64, max_retry_interval: i64) -> SessionRetryPolicy {
        SessionRetryPolicy {
            retry_count: 0,
            last_attempt: None,
            retry_limit: None,
            base_retry_interval,
            max_retry_interval,
        }
    }

    /// Create a `SessionRetryPolicy` that never tries again.
    pub fn never() -> SessionRetryPolicy {
        SessionRetryPolicy {
            retry_count: 0,
            last_attempt: None,
            retry_limit: Some(0),
            base_retry_interval: 0,
            max_retry_interval: 0,
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// The backoff interval that applies after `retry_count` consecutive failures.
    fn current_interval(&self) -> i64 {
        let doublings = self.retry_count.saturating_sub(1).min(30);
        (self.base_retry_interval << doublings).min(self.max_retry_interval)
    }

    /// A connection attempt failed; note it so the next `should_retry_connect` backs off.
    pub fn increment_retry_count(&mut self, now: DateTimeUtc) {
        self.retry_count += 1;
        self.last_attempt = Some(now);
    }

    /// The connection succeeded; the policy starts fresh.
    pub fn reset_retry_count(&mut self) {
        self.retry_count = 0;
        self.last_attempt = None;
    }

    /// Asks the policy what to do about reconnecting at time `now`.
    pub fn should_retry_connect(&self, now: DateTimeUtc) -> Answer {
        if let Some(retry_limit) = self.retry_limit {
            if self.retry_count >= retry_limit {
                return Answer::GiveUp;
            }
        }
        match self.last_attempt {
            None => Answer::Retry,
            Some(last_attempt) => {
                let interval = self.current_interval();
                let elapsed = now.signed_duration_since(last_attempt).num_milliseconds();
                if elapsed >= interval {
                    Answer::Retry
                } else {
                    Answer::WaitFor(interval - elapsed)
                }
            }
        }
    }
}
