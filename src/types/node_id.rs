// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::fmt;

/// The kind of identifier held within a [`NodeId`]. The engine only deals in numeric and
/// string identifiers; guid / bytestring identifiers belong to the full stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Identifier {
    Numeric(u32),
    String(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Identifier::Numeric(v) => write!(f, "i={}", v),
            Identifier::String(v) => write!(f, "s={}", v),
        }
    }
}

impl From<u32> for Identifier {
    fn from(v: u32) -> Self {
        Identifier::Numeric(v)
    }
}

impl From<&str> for Identifier {
    fn from(v: &str) -> Self {
        Identifier::String(v.to_string())
    }
}

impl From<String> for Identifier {
    fn from(v: String) -> Self {
        Identifier::String(v)
    }
}

/// An OPC UA node id - a namespace index plus an identifier. Used to reference nodes in the
/// address space and also as the type of session ids and authentication tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub namespace: u16,
    pub identifier: Identifier,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.namespace != 0 {
            write!(f, "ns={};{}", self.namespace, self.identifier)
        } else {
            write!(f, "{}", self.identifier)
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::null()
    }
}

impl NodeId {
    pub fn new<T>(namespace: u16, identifier: T) -> NodeId
    where
        T: Into<Identifier>,
    {
        NodeId {
            namespace,
            identifier: identifier.into(),
        }
    }

    /// The null node id, `ns=0;i=0`.
    pub fn null() -> NodeId {
        NodeId::new(0, 0u32)
    }

    pub fn is_null(&self) -> bool {
        self.namespace == 0 && self.identifier == Identifier::Numeric(0)
    }

    /// Returns the numeric identifier if the node id holds one.
    pub fn as_u32(&self) -> Option<u32> {
        match self.identifier {
            Identifier::Numeric(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display() {
        assert_eq!(NodeId::new(0, 2253u32).to_string(), "i=2253");
        assert_eq!(NodeId::new(2, "Machine/Speed").to_string(), "ns=2;s=Machine/Speed");
    }

    #[test]
    fn node_id_null() {
        assert!(NodeId::null().is_null());
        assert!(!NodeId::new(1, 0u32).is_null());
        assert!(!NodeId::new(0, 1u32).is_null());
    }
}
