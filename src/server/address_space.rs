// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The reduced address space the engine works against - a store of object and variable nodes
//! with browse references, engineering unit ranges, access levels and raised events. This is
//! the "ValueSource" collaborator of the sampling machinery: values may be written at any time
//! by services or by server code, and reads always return one coherent value snapshot.

use std::collections::HashMap;

use chrono::Utc;

use crate::types::{
    AttributeId, BrowseDirection, DataValue, DateTimeUtc, NodeId, ReferenceDescription,
    ReferenceTypeId, StatusCode, Variant,
};

use super::events::Event;

bitflags! {
    /// Access level bits of a variable node.
    pub struct AccessLevel: u8 {
        const CURRENT_READ = 1;
        const CURRENT_WRITE = 2;
    }
}

/// A variable node - a value with status, timestamps and the metadata used to interpret it.
#[derive(Debug, Clone)]
pub struct VariableNode {
    pub node_id: NodeId,
    pub browse_name: String,
    pub value: DataValue,
    /// Engineering unit range (low, high). Required for percent deadband filters; changing it
    /// flags the next notification of the value with SEMANTICS_CHANGED.
    pub eu_range: Option<(f64, f64)>,
    pub access_level: AccessLevel,
}

/// An object / folder node. Objects may notify events.
#[derive(Debug, Clone)]
pub struct ObjectNode {
    pub node_id: NodeId,
    pub browse_name: String,
    pub subscribe_to_events: bool,
}

#[derive(Debug, Clone)]
pub enum NodeType {
    Object(ObjectNode),
    Variable(VariableNode),
}

impl NodeType {
    pub fn node_id(&self) -> &NodeId {
        match self {
            NodeType::Object(n) => &n.node_id,
            NodeType::Variable(n) => &n.node_id,
        }
    }

    pub fn browse_name(&self) -> &str {
        match self {
            NodeType::Object(n) => &n.browse_name,
            NodeType::Variable(n) => &n.browse_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Reference {
    reference_type: ReferenceTypeId,
    source: NodeId,
    target: NodeId,
}

/// How long raised events are kept around for monitored items to pick up.
const EVENT_RETENTION_MS: i64 = 5 * 60 * 1000;

pub struct AddressSpace {
    nodes: HashMap<NodeId, NodeType>,
    references: Vec<Reference>,
    /// Raised events, oldest first, pruned by retention.
    events: Vec<Event>,
    /// Time of the last structural change, used to invalidate continuation points.
    last_modified: DateTimeUtc,
}

impl AddressSpace {
    /// The root objects folder
    pub const OBJECTS_FOLDER: u32 = 85;
    /// The server object
    pub const SERVER: u32 = 2253;
    // Well known ids of the server diagnostics summary variables
    pub const SERVER_DIAGNOSTICS_SUMMARY: u32 = 2275;
    pub const CURRENT_SESSION_COUNT: u32 = 2277;
    pub const CUMULATED_SESSION_COUNT: u32 = 2278;
    pub const SECURITY_REJECTED_SESSION_COUNT: u32 = 2279;
    pub const REJECTED_SESSION_COUNT: u32 = 2280;
    pub const SESSION_TIMEOUT_COUNT: u32 = 2281;
    pub const SESSION_ABORT_COUNT: u32 = 2282;
    pub const PUBLISHING_INTERVAL_COUNT: u32 = 2284;
    pub const CURRENT_SUBSCRIPTION_COUNT: u32 = 2285;
    pub const CUMULATED_SUBSCRIPTION_COUNT: u32 = 2286;

    pub fn new() -> AddressSpace {
        let mut address_space = AddressSpace {
            nodes: HashMap::new(),
            references: Vec::new(),
            events: Vec::new(),
            last_modified: Utc::now(),
        };
        address_space.build_server_nodes();
        address_space
    }

    /// Creates the objects folder, the server object and the diagnostics summary variables.
    fn build_server_nodes(&mut self) {
        self.insert_object(
            ObjectNode {
                node_id: NodeId::new(0, Self::OBJECTS_FOLDER),
                browse_name: "Objects".to_string(),
                subscribe_to_events: false,
            },
            None,
        );
        self.insert_object(
            ObjectNode {
                node_id: NodeId::new(0, Self::SERVER),
                browse_name: "Server".to_string(),
                subscribe_to_events: true,
            },
            Some((
                NodeId::new(0, Self::OBJECTS_FOLDER),
                ReferenceTypeId::Organizes,
            )),
        );
        self.insert_object(
            ObjectNode {
                node_id: NodeId::new(0, Self::SERVER_DIAGNOSTICS_SUMMARY),
                browse_name: "ServerDiagnosticsSummary".to_string(),
                subscribe_to_events: false,
            },
            Some((NodeId::new(0, Self::SERVER), ReferenceTypeId::HasComponent)),
        );
        let summary = NodeId::new(0, Self::SERVER_DIAGNOSTICS_SUMMARY);
        let counters = [
            (Self::CURRENT_SESSION_COUNT, "CurrentSessionCount"),
            (Self::CUMULATED_SESSION_COUNT, "CumulatedSessionCount"),
            (
                Self::SECURITY_REJECTED_SESSION_COUNT,
                "SecurityRejectedSessionCount",
            ),
            (Self::REJECTED_SESSION_COUNT, "RejectedSessionCount"),
            (Self::SESSION_TIMEOUT_COUNT, "SessionTimeoutCount"),
            (Self::SESSION_ABORT_COUNT, "SessionAbortCount"),
            (Self::PUBLISHING_INTERVAL_COUNT, "PublishingIntervalCount"),
            (Self::CURRENT_SUBSCRIPTION_COUNT, "CurrentSubscriptionCount"),
            (
                Self::CUMULATED_SUBSCRIPTION_COUNT,
                "CumulatedSubscriptionCount",
            ),
        ];
        for (id, name) in counters {
            self.insert_variable(
                VariableNode {
                    node_id: NodeId::new(0, id),
                    browse_name: name.to_string(),
                    value: DataValue::new_now(0u32),
                    eu_range: None,
                    access_level: AccessLevel::CURRENT_READ,
                },
                Some((summary.clone(), ReferenceTypeId::HasProperty)),
            );
        }
    }

    pub fn insert_object(
        &mut self,
        node: ObjectNode,
        parent: Option<(NodeId, ReferenceTypeId)>,
    ) -> &mut Self {
        let node_id = node.node_id.clone();
        self.nodes.insert(node_id.clone(), NodeType::Object(node));
        if let Some((parent, reference_type)) = parent {
            self.insert_reference(parent, node_id, reference_type);
        }
        self.last_modified = Utc::now();
        self
    }

    pub fn insert_variable(
        &mut self,
        node: VariableNode,
        parent: Option<(NodeId, ReferenceTypeId)>,
    ) -> &mut Self {
        let node_id = node.node_id.clone();
        self.nodes.insert(node_id.clone(), NodeType::Variable(node));
        if let Some((parent, reference_type)) = parent {
            self.insert_reference(parent, node_id, reference_type);
        }
        self.last_modified = Utc::now();
        self
    }

    /// Convenience for tests and server code - a readable / writable variable organized under
    /// a parent folder.
    pub fn add_variable<T>(
        &mut self,
        parent: &NodeId,
        node_id: NodeId,
        browse_name: T,
        value: DataValue,
    ) -> &mut Self
    where
        T: Into<String>,
    {
        self.insert_variable(
            VariableNode {
                node_id,
                browse_name: browse_name.into(),
                value,
                eu_range: None,
                access_level: AccessLevel::CURRENT_READ | AccessLevel::CURRENT_WRITE,
            },
            Some((parent.clone(), ReferenceTypeId::HasComponent)),
        )
    }

    pub fn insert_reference(
        &mut self,
        source: NodeId,
        target: NodeId,
        reference_type: ReferenceTypeId,
    ) {
        let reference = Reference {
            reference_type,
            source,
            target,
        };
        if !self.references.contains(&reference) {
            self.references.push(reference);
            self.last_modified = Utc::now();
        }
    }

    pub fn find_node(&self, node_id: &NodeId) -> Option<&NodeType> {
        self.nodes.get(node_id)
    }

    pub fn find_variable(&self, node_id: &NodeId) -> Option<&VariableNode> {
        match self.nodes.get(node_id) {
            Some(NodeType::Variable(v)) => Some(v),
            _ => None,
        }
    }

    fn find_variable_mut(&mut self, node_id: &NodeId) -> Option<&mut VariableNode> {
        match self.nodes.get_mut(node_id) {
            Some(NodeType::Variable(v)) => Some(v),
            _ => None,
        }
    }

    pub fn last_modified(&self) -> DateTimeUtc {
        self.last_modified
    }

    /// Reads an attribute of a node. Failures come back as a data value carrying the error
    /// status so the caller (and a sampling monitored item) always has something to enqueue.
    pub fn read_attribute(&self, node_id: &NodeId, attribute_id: u32) -> DataValue {
        let now = Utc::now();
        let Some(node) = self.find_node(node_id) else {
            return DataValue::new_status_at(StatusCode::BadNodeIdUnknown, now);
        };
        let Ok(attribute_id) = AttributeId::from_u32(attribute_id) else {
            return DataValue::new_status_at(StatusCode::BadAttributeIdInvalid, now);
        };
        match (node, attribute_id) {
            (NodeType::Variable(v), AttributeId::Value) => v.value.clone(),
            (NodeType::Variable(v), AttributeId::AccessLevel)
            | (NodeType::Variable(v), AttributeId::UserAccessLevel) => {
                DataValue::new_at(v.access_level.bits(), now)
            }
            (NodeType::Object(o), AttributeId::EventNotifier) => {
                DataValue::new_at(o.subscribe_to_events as u8, now)
            }
            (node, AttributeId::NodeId) => {
                DataValue::new_at(node.node_id().to_string(), now)
            }
            (node, AttributeId::BrowseName) | (node, AttributeId::DisplayName) => {
                DataValue::new_at(node.browse_name().to_string(), now)
            }
            _ => DataValue::new_status_at(StatusCode::BadAttributeIdInvalid, now),
        }
    }

    /// Whether the node's value can be read by a client.
    pub fn is_readable(&self, node_id: &NodeId) -> bool {
        self.find_variable(node_id)
            .map(|v| v.access_level.contains(AccessLevel::CURRENT_READ))
            .unwrap_or(true)
    }

    /// Whether the node's value can be written by a client.
    pub fn is_writable(&self, node_id: &NodeId) -> bool {
        self.find_variable(node_id)
            .map(|v| v.access_level.contains(AccessLevel::CURRENT_WRITE))
            .unwrap_or(false)
    }

    /// Sets the value of a variable from server code, bypassing access checks. The whole
    /// value + status + timestamps triple is replaced in one step so readers never observe a
    /// torn combination.
    pub fn set_variable_value<V>(&mut self, node_id: &NodeId, value: V, now: DateTimeUtc) -> bool
    where
        V: Into<Variant>,
    {
        if let Some(v) = self.find_variable_mut(node_id) {
            v.value = DataValue::new_at(value.into(), now);
            true
        } else {
            false
        }
    }

    /// Replaces the whole data value of a variable.
    pub fn set_variable_data_value(&mut self, node_id: &NodeId, value: DataValue) -> bool {
        if let Some(v) = self.find_variable_mut(node_id) {
            v.value = value;
            true
        } else {
            false
        }
    }

    pub fn eu_range(&self, node_id: &NodeId) -> Option<(f64, f64)> {
        self.find_variable(node_id).and_then(|v| v.eu_range)
    }

    /// Changes the engineering unit range of a variable. Sampling picks the change up as a
    /// semantic change on the next notification.
    pub fn set_eu_range(&mut self, node_id: &NodeId, eu_range: Option<(f64, f64)>) -> bool {
        if let Some(v) = self.find_variable_mut(node_id) {
            v.eu_range = eu_range;
            true
        } else {
            false
        }
    }

    /// Whether events can be subscribed to on this node.
    pub fn is_event_notifier(&self, node_id: &NodeId) -> bool {
        matches!(self.find_node(node_id), Some(NodeType::Object(o)) if o.subscribe_to_events)
    }

    /// Raises an event. Monitored items with event filters pick it up on their next sample.
    pub fn raise_event(&mut self, event: Event) {
        let cutoff = event.time - chrono::Duration::milliseconds(EVENT_RETENTION_MS);
        self.events.retain(|e| e.time >= cutoff);
        self.events.push(event);
    }

    /// The events raised against a source node strictly after the given time.
    pub fn events_since(&self, source_node: &NodeId, happened_since: &DateTimeUtc) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| e.source_node == *source_node && e.time > *happened_since)
            .collect()
    }

    /// References from / to a node, filtered by direction and optionally by reference type.
    pub fn browse_references(
        &self,
        node_id: &NodeId,
        browse_direction: BrowseDirection,
        reference_type: Option<ReferenceTypeId>,
    ) -> Vec<ReferenceDescription> {
        self.references
            .iter()
            .filter_map(|r| {
                if let Some(reference_type) = reference_type {
                    if r.reference_type != reference_type {
                        return None;
                    }
                }
                let (target, is_forward) = if r.source == *node_id {
                    (&r.target, true)
                } else if r.target == *node_id {
                    (&r.source, false)
                } else {
                    return None;
                };
                let direction_ok = match browse_direction {
                    BrowseDirection::Forward => is_forward,
                    BrowseDirection::Inverse => !is_forward,
                    BrowseDirection::Both => true,
                };
                if !direction_ok {
                    return None;
                }
                let node = self.find_node(target)?;
                Some(ReferenceDescription {
                    reference_type_id: r.reference_type,
                    is_forward,
                    node_id: target.clone(),
                    browse_name: node.browse_name().to_string(),
                })
            })
            .collect()
    }

    /// Follows a forward reference by browse name, for TranslateBrowsePathsToNodeIds.
    pub fn find_forward_target_by_browse_name(
        &self,
        node_id: &NodeId,
        reference_type: Option<ReferenceTypeId>,
        browse_name: &str,
    ) -> Option<NodeId> {
        self.browse_references(node_id, BrowseDirection::Forward, reference_type)
            .into_iter()
            .find(|r| r.browse_name == browse_name)
            .map(|r| r.node_id)
    }

    /// Bulk update of the diagnostics variables.
    pub(crate) fn set_diagnostics_counters(&mut self, counters: &[(u32, u32)]) {
        let now = Utc::now();
        for (id, count) in counters {
            let node_id = NodeId::new(0, *id);
            self.set_variable_value(&node_id, *count, now);
        }
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}
