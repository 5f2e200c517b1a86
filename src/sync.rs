// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! Re-exports the lock types used throughout the crate so that call sites do not care which
//! implementation backs them.

pub use parking_lot::{Mutex, RwLock};
