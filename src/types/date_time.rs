// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

/// The UTC timestamp type used throughout the engine. All interval arithmetic (publishing
/// intervals, sampling intervals, timeouts) is done on this one clock so that tests can drive
/// the engine with explicit times.
pub type DateTimeUtc = chrono::DateTime<chrono::Utc>;
