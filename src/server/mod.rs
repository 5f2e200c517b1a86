// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The server side of the engine - sessions, subscriptions, monitored items, the service
//! implementations that drive them and the reduced address space they observe.

pub mod address_space;
pub mod config;
pub mod constants;
pub mod continuation_point;
pub mod diagnostics;
pub mod events;
pub mod identity;
pub mod server;
pub mod services;
pub mod session;
pub mod state;
pub mod subscriptions;
pub mod util;

pub mod prelude {
    pub use super::address_space::{AccessLevel, AddressSpace};
    pub use super::config::{Limits, OperationalLimits, ServerConfig, ServerUserToken};
    pub use super::events::Event;
    pub use super::server::Server;
    pub use super::session::{Session, SessionManager};
    pub use super::state::ServerState;
    pub use super::subscriptions::subscription::SubscriptionState;
    pub use super::util::ScheduledTask;
}
