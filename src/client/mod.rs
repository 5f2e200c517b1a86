// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The client-side halves of the engine that do not depend on a transport: keeping enough
//! publish requests in flight that no subscription tick is starved, and the backoff policy a
//! session follows when its connection drops.

pub mod publish_pacer;
pub mod session_retry;

pub use publish_pacer::PublishRequestPacer;
pub use session_retry::{Answer, SessionRetryPolicy};
