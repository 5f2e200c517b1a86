// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use crate::types::{RequestHeader, ServiceFault, StatusCode};

/// The implementation of a service, or a set of services will implement this trait
pub(crate) trait Service {
    fn name(&self) -> String;

    fn service_fault(&self, request_header: &RequestHeader, service_result: StatusCode) -> ServiceFault {
        warn!(
            "Service {}, request handle {} generated a service fault with status code {}",
            self.name(),
            request_header.request_handle,
            service_result
        );
        ServiceFault::new(request_header, service_result)
    }
}

pub mod attribute;
pub mod method;
pub mod monitored_item;
pub mod session;
pub mod subscription;
pub mod view;
