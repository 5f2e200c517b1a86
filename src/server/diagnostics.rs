// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Provides diagnostics structures and functions for gathering information about the running
//! state of a server.

use super::address_space::AddressSpace;

/// The server diagnostics summary counters, as found under the server object in a full
/// address space. Every counter reflects creation / destruction of the corresponding entity
/// with no drift - the mutators are called under the same lock as the state transition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerDiagnosticsSummary {
    pub current_session_count: u32,
    pub cumulated_session_count: u32,
    /// Sessions rejected for any reason, including security reasons.
    pub rejected_session_count: u32,
    /// Sessions rejected specifically for security reasons (bad credentials). An unknown
    /// authentication token is *not* a security rejection.
    pub security_rejected_session_count: u32,
    pub session_timeout_count: u32,
    pub session_abort_count: u32,
    pub current_subscription_count: u32,
    pub cumulated_subscription_count: u32,
    pub publishing_interval_count: u32,
}

/// Structure that captures diagnostics information for the server
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerDiagnostics {
    /// This is a live summary of the server diagnostics
    server_diagnostics_summary: ServerDiagnosticsSummary,
}

impl ServerDiagnostics {
    /// Return a completed summary of the server diagnostics as they stand.
    pub fn server_diagnostics_summary(&self) -> &ServerDiagnosticsSummary {
        &self.server_diagnostics_summary
    }

    /// Increment the number of requests that were rejected due to security constraints since
    /// the server was started (or restarted).
    pub(crate) fn on_rejected_security_session(&mut self) {
        self.server_diagnostics_summary
            .security_rejected_session_count += 1;
    }

    /// Increment the number of requests that were rejected since the server was started
    /// (or restarted). This number includes the security rejected sessions.
    pub(crate) fn on_rejected_session(&mut self) {
        self.server_diagnostics_summary.rejected_session_count += 1;
    }

    /// Increment the number of client sessions currently established in the server.
    pub(crate) fn on_create_session(&mut self) {
        self.server_diagnostics_summary.current_session_count += 1;
        self.server_diagnostics_summary.cumulated_session_count += 1;
        debug!(
            "Incrementing current session count to {}",
            self.server_diagnostics_summary.current_session_count
        );
    }

    /// Decrement the number of client sessions currently established in the server.
    pub(crate) fn on_destroy_session(&mut self) {
        self.server_diagnostics_summary.current_session_count -= 1;
        debug!(
            "Decrementing current session count to {}",
            self.server_diagnostics_summary.current_session_count
        );
    }

    /// Increment the number of subscriptions currently established in the server.
    pub(crate) fn on_create_subscription(&mut self) {
        self.server_diagnostics_summary.current_subscription_count += 1;
        self.server_diagnostics_summary.cumulated_subscription_count += 1;
        self.server_diagnostics_summary.publishing_interval_count += 1;
    }

    /// Decrement the number of subscriptions currently established in the server.
    pub(crate) fn on_destroy_subscription(&mut self) {
        self.server_diagnostics_summary.current_subscription_count -= 1;
        self.server_diagnostics_summary.publishing_interval_count -= 1;
    }

    /// Increment the number of client sessions that were closed due to timeout since the
    /// server was started (or restarted).
    pub(crate) fn on_session_timeout(&mut self) {
        self.server_diagnostics_summary.session_timeout_count += 1;
    }

    /// Increment the number of client sessions that were closed due to errors.
    pub(crate) fn on_session_abort(&mut self) {
        self.server_diagnostics_summary.session_abort_count += 1;
    }

    /// Writes the counters into the diagnostics variables of the address space so they are
    /// observable through the ordinary read / subscribe path.
    pub(crate) fn export(&self, address_space: &mut AddressSpace) {
        let s = &self.server_diagnostics_summary;
        address_space.set_diagnostics_counters(&[
            (AddressSpace::CURRENT_SESSION_COUNT, s.current_session_count),
            (
                AddressSpace::CUMULATED_SESSION_COUNT,
                s.cumulated_session_count,
            ),
            (
                AddressSpace::REJECTED_SESSION_COUNT,
                s.rejected_session_count,
            ),
            (
                AddressSpace::SECURITY_REJECTED_SESSION_COUNT,
                s.security_rejected_session_count,
            ),
            (AddressSpace::SESSION_TIMEOUT_COUNT, s.session_timeout_count),
            (AddressSpace::SESSION_ABORT_COUNT, s.session_abort_count),
            (
                AddressSpace::CURRENT_SUBSCRIPTION_COUNT,
                s.current_subscription_count,
            ),
            (
                AddressSpace::CUMULATED_SUBSCRIPTION_COUNT,
                s.cumulated_subscription_count,
            ),
            (
                AddressSpace::PUBLISHING_INTERVAL_COUNT,
                s.publishing_interval_count,
            ),
        ]);
    }
}
