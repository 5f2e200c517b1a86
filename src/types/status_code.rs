// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The `StatusCode` type. Status codes are a combination of a code in the upper 16 bits and
//! info bits in the lower 16, so the type is a bit mask with well known constants rather than
//! an enum.

use std::{error::Error, fmt};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    pub struct StatusCode: u32 {
        // Severity bits 30:31
        const IS_ERROR            = 0x8000_0000;
        const IS_UNCERTAIN        = 0x4000_0000;

        // Mask for the status code section
        const STATUS_MASK         = 0xffff_0000;
        // Mask for the info bits section
        const BIT_MASK            = 0x0000_ffff;

        // Overflow bit 7 - set on the boundary item of an overflowed monitored item queue
        const OVERFLOW            = 0b0000_0000_1000_0000;
        // Semantics changed bit 14 - the metadata used to interpret the value has changed
        const SEMANTICS_CHANGED   = 0b0100_0000_0000_0000;
        // Structure changed bit 15
        const STRUCTURE_CHANGED   = 0b1000_0000_0000_0000;

        const Good                              = 0x0000_0000;
        const GoodSubscriptionTransferred       = 0x002D_0000;

        const BadUnexpectedError                = 0x8001_0000;
        const BadInternalError                  = 0x8002_0000;
        const BadTimeout                        = 0x800A_0000;
        const BadServiceUnsupported             = 0x800B_0000;
        const BadNothingToDo                    = 0x800F_0000;
        const BadTooManyOperations              = 0x8010_0000;
        const BadUserAccessDenied               = 0x801F_0000;
        const BadIdentityTokenInvalid           = 0x8020_0000;
        const BadIdentityTokenRejected          = 0x8021_0000;
        const BadSessionIdInvalid               = 0x8025_0000;
        const BadSessionClosed                  = 0x8026_0000;
        const BadSessionNotActivated            = 0x8027_0000;
        const BadSubscriptionIdInvalid          = 0x8028_0000;
        const BadTimestampsToReturnInvalid      = 0x802B_0000;
        const BadNodeIdInvalid                  = 0x8033_0000;
        const BadNodeIdUnknown                  = 0x8034_0000;
        const BadAttributeIdInvalid             = 0x8035_0000;
        const BadNotReadable                    = 0x803A_0000;
        const BadNotWritable                    = 0x803B_0000;
        const BadOutOfRange                     = 0x803C_0000;
        const BadNotSupported                   = 0x803D_0000;
        const BadNotFound                       = 0x803E_0000;
        const BadMonitoringModeInvalid          = 0x8041_0000;
        const BadMonitoredItemIdInvalid         = 0x8042_0000;
        const BadMonitoredItemFilterInvalid     = 0x8043_0000;
        const BadMonitoredItemFilterUnsupported = 0x8044_0000;
        const BadFilterNotAllowed               = 0x8045_0000;
        const BadEventFilterInvalid             = 0x8047_0000;
        const BadContinuationPointInvalid       = 0x804A_0000;
        const BadNoContinuationPoints           = 0x804B_0000;
        const BadTooManySessions                = 0x8056_0000;
        const BadViewIdUnknown                  = 0x806B_0000;
        const BadNoMatch                        = 0x806F_0000;
        const BadMaxAgeInvalid                  = 0x8070_0000;
        const BadTypeMismatch                   = 0x8074_0000;
        const BadMethodInvalid                  = 0x8075_0000;
        const BadArgumentsMissing               = 0x8076_0000;
        const BadTooManySubscriptions           = 0x8077_0000;
        const BadNoSubscription                 = 0x8079_0000;
        const BadSequenceNumberUnknown          = 0x807A_0000;
        const BadMessageNotAvailable            = 0x807B_0000;
        const BadTooManyPublishRequests         = 0x807D_0000;
        const BadInvalidArgument                = 0x80AB_0000;
        const BadInvalidState                   = 0x80AF_0000;
        const BadTooManyMonitoredItems          = 0x80DB_0000;
        const BadDeadbandFilterInvalid          = 0x80E4_0000;
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::Good
    }
}

impl StatusCode {
    /// Returns the info bits of the status code, i.e. it masks out the actual status code value
    pub fn bitflags(&self) -> StatusCode {
        *self & StatusCode::BIT_MASK
    }

    /// Returns the status only, i.e. it masks out any info bits that come with the status code
    pub fn status(&self) -> StatusCode {
        *self & StatusCode::STATUS_MASK
    }

    /// Tests if the status code is bad
    pub fn is_bad(&self) -> bool {
        self.contains(StatusCode::IS_ERROR)
    }

    /// Tests if the status code is uncertain
    pub fn is_uncertain(&self) -> bool {
        self.contains(StatusCode::IS_UNCERTAIN)
    }

    /// Tests if the status code is good (i.e. not bad or uncertain)
    pub fn is_good(&self) -> bool {
        !self.is_bad() && !self.is_uncertain()
    }

    /// The name of the status section of the code, ignoring info bits.
    pub fn name(&self) -> &'static str {
        match self.status() {
            StatusCode::Good => "Good",
            StatusCode::GoodSubscriptionTransferred => "GoodSubscriptionTransferred",
            StatusCode::BadUnexpectedError => "BadUnexpectedError",
            StatusCode::BadInternalError => "BadInternalError",
            StatusCode::BadTimeout => "BadTimeout",
            StatusCode::BadServiceUnsupported => "BadServiceUnsupported",
            StatusCode::BadNothingToDo => "BadNothingToDo",
            StatusCode::BadTooManyOperations => "BadTooManyOperations",
            StatusCode::BadUserAccessDenied => "BadUserAccessDenied",
            StatusCode::BadIdentityTokenInvalid => "BadIdentityTokenInvalid",
            StatusCode::BadIdentityTokenRejected => "BadIdentityTokenRejected",
            StatusCode::BadSessionIdInvalid => "BadSessionIdInvalid",
            StatusCode::BadSessionClosed => "BadSessionClosed",
            StatusCode::BadSessionNotActivated => "BadSessionNotActivated",
            StatusCode::BadSubscriptionIdInvalid => "BadSubscriptionIdInvalid",
            StatusCode::BadTimestampsToReturnInvalid => "BadTimestampsToReturnInvalid",
            StatusCode::BadNodeIdInvalid => "BadNodeIdInvalid",
            StatusCode::BadNodeIdUnknown => "BadNodeIdUnknown",
            StatusCode::BadAttributeIdInvalid => "BadAttributeIdInvalid",
            StatusCode::BadNotReadable => "BadNotReadable",
            StatusCode::BadNotWritable => "BadNotWritable",
            StatusCode::BadOutOfRange => "BadOutOfRange",
            StatusCode::BadNotSupported => "BadNotSupported",
            StatusCode::BadNotFound => "BadNotFound",
            StatusCode::BadMonitoringModeInvalid => "BadMonitoringModeInvalid",
            StatusCode::BadMonitoredItemIdInvalid => "BadMonitoredItemIdInvalid",
            StatusCode::BadMonitoredItemFilterInvalid => "BadMonitoredItemFilterInvalid",
            StatusCode::BadMonitoredItemFilterUnsupported => "BadMonitoredItemFilterUnsupported",
            StatusCode::BadFilterNotAllowed => "BadFilterNotAllowed",
            StatusCode::BadEventFilterInvalid => "BadEventFilterInvalid",
            StatusCode::BadContinuationPointInvalid => "BadContinuationPointInvalid",
            StatusCode::BadNoContinuationPoints => "BadNoContinuationPoints",
            StatusCode::BadTooManySessions => "BadTooManySessions",
            StatusCode::BadViewIdUnknown => "BadViewIdUnknown",
            StatusCode::BadNoMatch => "BadNoMatch",
            StatusCode::BadMaxAgeInvalid => "BadMaxAgeInvalid",
            StatusCode::BadTypeMismatch => "BadTypeMismatch",
            StatusCode::BadMethodInvalid => "BadMethodInvalid",
            StatusCode::BadArgumentsMissing => "BadArgumentsMissing",
            StatusCode::BadTooManySubscriptions => "BadTooManySubscriptions",
            StatusCode::BadNoSubscription => "BadNoSubscription",
            StatusCode::BadSequenceNumberUnknown => "BadSequenceNumberUnknown",
            StatusCode::BadMessageNotAvailable => "BadMessageNotAvailable",
            StatusCode::BadTooManyPublishRequests => "BadTooManyPublishRequests",
            StatusCode::BadInvalidArgument => "BadInvalidArgument",
            StatusCode::BadInvalidState => "BadInvalidState",
            StatusCode::BadTooManyMonitoredItems => "BadTooManyMonitoredItems",
            StatusCode::BadDeadbandFilterInvalid => "BadDeadbandFilterInvalid",
            _ => "Unknown",
        }
    }
}

// The bitflags! macro implements Debug for StatusCode but it fouls the display because status
// codes are a combination of bits and unique values.
impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let bits = self.bitflags();
        if bits.is_empty() {
            write!(f, "{}", self.name())
        } else {
            write!(f, "{}+{:?}", self.name(), bits)
        }
    }
}

impl Error for StatusCode {}

// Serialize / Deserialize are manually implemented because bitflags! doesn't do it.
impl Serialize for StatusCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for StatusCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u32::deserialize(deserializer)?;
        Ok(StatusCode::from_bits_truncate(bits))
    }
}
