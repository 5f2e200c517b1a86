// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

use std::fmt;

/// A `Variant` holds the value of an attribute. This is the scalar subset of the OPC UA
/// variant type - enough for monitored values, method arguments and diagnostics counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variant {
    Empty,
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Variant::Empty => write!(f, "Empty"),
            Variant::Boolean(v) => write!(f, "{}", v),
            Variant::SByte(v) => write!(f, "{}", v),
            Variant::Byte(v) => write!(f, "{}", v),
            Variant::Int16(v) => write!(f, "{}", v),
            Variant::UInt16(v) => write!(f, "{}", v),
            Variant::Int32(v) => write!(f, "{}", v),
            Variant::UInt32(v) => write!(f, "{}", v),
            Variant::Int64(v) => write!(f, "{}", v),
            Variant::UInt64(v) => write!(f, "{}", v),
            Variant::Float(v) => write!(f, "{}", v),
            Variant::Double(v) => write!(f, "{}", v),
            Variant::String(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! variant_from {
    ($t:ty, $v:ident) => {
        impl From<$t> for Variant {
            fn from(v: $t) -> Self {
                Variant::$v(v)
            }
        }
    };
}

variant_from!(bool, Boolean);
variant_from!(i8, SByte);
variant_from!(u8, Byte);
variant_from!(i16, Int16);
variant_from!(u16, UInt16);
variant_from!(i32, Int32);
variant_from!(u32, UInt32);
variant_from!(i64, Int64);
variant_from!(u64, UInt64);
variant_from!(f32, Float);
variant_from!(f64, Double);
variant_from!(String, String);

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_string())
    }
}

impl Variant {
    /// Converts the numeric variants to an `f64` for deadband arithmetic. Non numeric variants
    /// yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Variant::SByte(v) => Some(*v as f64),
            Variant::Byte(v) => Some(*v as f64),
            Variant::Int16(v) => Some(*v as f64),
            Variant::UInt16(v) => Some(*v as f64),
            Variant::Int32(v) => Some(*v as f64),
            Variant::UInt32(v) => Some(*v as f64),
            Variant::Int64(v) => Some(*v as f64),
            Variant::UInt64(v) => Some(*v as f64),
            Variant::Float(v) => Some(*v as f64),
            Variant::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }
}
