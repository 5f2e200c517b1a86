// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The server core implements the session, subscription and monitored item machinery of an
//! OPC UA server - the publish / notify state machine, sampling and deadband filtering, bounded
//! notification queues, republish and session lifetime management.
//!
//! The transport and security layers are expected to live above this crate. Service calls are
//! plain typed requests and responses; the address space is reduced to the variable / reference
//! store that sampling, browsing and diagnostics need.

#![allow(clippy::bool_assert_comparison)]
#![allow(clippy::float_cmp)]
// Status codes mix named codes and info bits in one bit mask, named as in the standard
#![allow(non_upper_case_globals)]

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;
#[macro_use]
extern crate bitflags;
#[macro_use]
extern crate serde_derive;
#[cfg(test)]
extern crate serde_json;
#[cfg(test)]
extern crate tempdir;

/// Tracing macro for obtaining a lock on a `Mutex`. Sometimes deadlocks can happen in code,
/// and if they do, this macro is useful for finding out where they happened.
#[macro_export]
macro_rules! trace_lock {
    ( $x:expr ) => {{
        let v = $x.lock();
        v
    }};
}

/// Tracing macro for obtaining a read lock on a `RwLock`.
#[macro_export]
macro_rules! trace_read_lock {
    ( $x:expr ) => {{
        let v = $x.read();
        v
    }};
}

/// Tracing macro for obtaining a write lock on a `RwLock`.
#[macro_export]
macro_rules! trace_write_lock {
    ( $x:expr ) => {{
        let v = $x.write();
        v
    }};
}

/// Tests if a `Option<Vec<T>>` is `None` or contains an empty `Vec`. Service implementations
/// use this to reject requests that carry nothing to do.
#[macro_export]
macro_rules! is_empty_option_vec {
    ( $v: expr ) => {
        $v.is_none() || $v.as_ref().unwrap().is_empty()
    };
}

pub mod client;
pub mod core;
pub mod server;
pub mod sync;
pub mod types;

pub mod prelude {
    pub use crate::core::prelude::*;
    pub use crate::server::prelude::*;
    pub use crate::types::*;
}
