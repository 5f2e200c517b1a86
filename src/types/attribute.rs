// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

/// The attributes of a node that can be addressed by read, write and monitoring operations.
/// Numeric values follow OPC UA Part 6.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeId {
    NodeId = 1,
    BrowseName = 3,
    DisplayName = 4,
    Value = 13,
    AccessLevel = 17,
    UserAccessLevel = 18,
    EventNotifier = 12,
}

impl AttributeId {
    pub fn from_u32(attribute_id: u32) -> Result<AttributeId, ()> {
        match attribute_id {
            1 => Ok(AttributeId::NodeId),
            3 => Ok(AttributeId::BrowseName),
            4 => Ok(AttributeId::DisplayName),
            12 => Ok(AttributeId::EventNotifier),
            13 => Ok(AttributeId::Value),
            17 => Ok(AttributeId::AccessLevel),
            18 => Ok(AttributeId::UserAccessLevel),
            _ => Err(()),
        }
    }
}
