// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

/// Decides how many publish requests a client keeps outstanding against a server.
///
/// The pacer aims for one request per subscription plus one spare, so a subscription tick is
/// never starved waiting for the client. The server caps how many requests it will queue per
/// session but does not advertise the cap, so the pacer discovers it: every
/// `BadTooManyPublishRequests` rejection lowers the discovered maximum to just below the
/// number that was in flight, and it stays there until the subscription count calls for less
/// anyway.
#[derive(Debug)]
pub struct PublishRequestPacer {
    /// Publish requests currently awaiting a response
    in_flight: usize,
    /// Subscriptions the client currently holds on the connection
    subscription_count: usize,
    /// Hard ceiling configured by the application
    configured_max: usize,
    /// Maximum the server has been observed to accept
    discovered_max: usize,
}

impl PublishRequestPacer {
    pub fn new(configured_max: usize) -> PublishRequestPacer {
        PublishRequestPacer {
            in_flight: 0,
            subscription_count: 0,
            configured_max,
            discovered_max: configured_max,
        }
    }

    pub fn set_subscription_count(&mut self, subscription_count: usize) {
        self.subscription_count = subscription_count;
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// The number of requests the pacer wants outstanding right now.
    pub fn target(&self) -> usize {
        if self.subscription_count == 0 {
            0
        } else {
            (self.subscription_count + 1)
                .min(self.discovered_max)
                .min(self.configured_max)
        }
    }

    /// Whether another publish request should be sent now.
    pub fn should_send(&self) -> bool {
        self.in_flight < self.target()
    }

    pub fn on_sent(&mut self) {
        self.in_flight += 1;
    }

    /// A publish response (or any terminal outcome other than a too-many rejection) came
    /// back for one outstanding request.
    pub fn on_response(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// The server rejected a publish request with `BadTooManyPublishRequests`. The accepted
    /// maximum is evidently below what was in flight.
    pub fn on_too_many_publish_requests(&mut self) {
        self.discovered_max = self.in_flight.saturating_sub(1).max(1);
        self.in_flight = self.in_flight.saturating_sub(1);
        debug!(
            "Server publish request limit discovered to be {}",
            self.discovered_max
        );
    }
}
