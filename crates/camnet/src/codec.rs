// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire codec: one beacon to and from one UTF-8 JSON datagram payload.
//!
//! The payload is self-contained; framing comes from the datagram boundary.
//! No versioning or negotiation beyond the `protocolVersion` field itself.

use crate::cam::CamMessage;

/// Codec failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Inbound payload is not a complete, valid beacon.
    MalformedPayload(String),
    /// Outbound beacon failed to serialize.
    EncodeFailed(String),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::MalformedPayload(e) => write!(f, "malformed payload: {}", e),
            CodecError::EncodeFailed(e) => write!(f, "encode failed: {}", e),
        }
    }
}

impl std::error::Error for CodecError {}

/// Encode a beacon into one datagram payload (compact JSON).
///
/// Enumerated fields are written by symbolic name so the wire stays stable
/// across renumbering. The platoon profile is local-only and never appears
/// in the output.
pub fn encode(message: &CamMessage) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(message).map_err(|e| CodecError::EncodeFailed(e.to_string()))
}

/// Decode one datagram payload into a beacon.
///
/// Rejects anything short of a complete, well-typed message: invalid UTF-8,
/// missing keys, non-numeric values, out-of-range `generationDeltaTime`, and
/// unrecognized enum names. Never yields a partially populated message.
pub fn decode(payload: &[u8]) -> Result<CamMessage, CodecError> {
    serde_json::from_slice(payload).map_err(|e| CodecError::MalformedPayload(e.to_string()))
}
