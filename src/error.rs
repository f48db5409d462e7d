//! Error types returned by the encode, decode, and locate operations.
//!
//! One [`Snafu`]-derived enum per direction, split the way an
//! encode/decode error module commonly is, `#[non_exhaustive]` so new
//! wire situations can be added without breaking callers, carrying a
//! stable error-code taxonomy (`ELEMENT_NOT_FOUND`, `DER_ERROR`,
//! `TAG_ERROR`, `MEM_ERROR`, `GENERIC_ERROR`, `TYPE_ANY`).

use alloc::string::String;
use snafu::Snafu;

/// Failure of an [`crate::encode`] call.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum EncodeError {
    /// The named element does not exist in the schema tree (`ELEMENT_NOT_FOUND`).
    #[snafu(display("element not found: {name}"))]
    ElementNotFound {
        /// The dotted path that was looked up.
        name: String,
    },

    /// The caller-provided output buffer is too small (`MEM_ERROR`).
    #[snafu(display("output buffer too small: needed {needed}, have {available}"))]
    BufferTooSmall {
        /// Bytes required to complete the write that failed.
        needed: usize,
        /// Total capacity of the caller-provided buffer.
        available: usize,
    },

    /// A node was in a state the encoder cannot emit (`GENERIC_ERROR`), such
    /// as a leaf marked optional passed as the root of an encode, or a
    /// malformed OBJECT IDENTIFIER string.
    #[snafu(display("{detail}"))]
    Generic {
        /// Human-readable description of the programming error.
        detail: String,
    },
}

/// Failure of a [`crate::decode`] or [`crate::locate`] call.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum DecodeError {
    /// The named element does not exist in the schema tree (`ELEMENT_NOT_FOUND`).
    #[snafu(display("element not found: {name}"))]
    ElementNotFound {
        /// The dotted path that was looked up.
        name: String,
    },

    /// Malformed DER: truncated input, stray trailing bytes, a length that
    /// overruns its container, or an indefinite length where DER forbids
    /// one (`DER_ERROR`).
    #[snafu(display("DER error: {detail}"))]
    Der {
        /// Human-readable description of the malformed structure.
        detail: String,
    },

    /// The tag found on the wire does not match what the schema expects,
    /// and the node is neither optional nor defaulted (`TAG_ERROR`).
    #[snafu(display("tag mismatch: expected {expected}, found {found}"))]
    Tag {
        /// The tag the schema required, formatted as `class:number`.
        expected: String,
        /// The tag actually present on the wire, formatted the same way.
        found: String,
    },

    /// A node was in a state the decoder cannot populate (`GENERIC_ERROR`),
    /// such as a leaf marked optional passed as the root of a decode.
    #[snafu(display("{detail}"))]
    Generic {
        /// Human-readable description of the programming error.
        detail: String,
    },

    /// A `CHOICE` alternative resolved to an `ANY` node whose inner type the
    /// caller must resolve out of band (`TYPE_ANY`): this codec surfaces
    /// that condition as an error rather than silently treating the ANY
    /// alternative as a successful match.
    #[snafu(display("CHOICE resolved to an unresolved ANY alternative"))]
    TypeAny,
}

impl DecodeError {
    pub(crate) fn der(detail: impl Into<String>) -> Self {
        Self::Der {
            detail: detail.into(),
        }
    }

    pub(crate) fn generic(detail: impl Into<String>) -> Self {
        Self::Generic {
            detail: detail.into(),
        }
    }
}

impl EncodeError {
    pub(crate) fn generic(detail: impl Into<String>) -> Self {
        Self::Generic {
            detail: detail.into(),
        }
    }
}
