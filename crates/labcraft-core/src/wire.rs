//! Binary encoding for everything that crosses the transport.
//!
//! Frames are `bitcode` with a header carrying a magic number and format
//! version, checked before the payload is trusted.

use crate::event::Replicated;
use crate::intent::Intent;
use crate::snapshot::WorldSnapshot;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a labcraft wire frame.
pub const WIRE_MAGIC: u32 = 0x1ABC_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", WIRE_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// What travels between the authority and its observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireMessage {
    /// Full state for a joining or resynchronising observer.
    Snapshot(WorldSnapshot),
    /// One step's worth of change events, in sequence order.
    Batch(Vec<Replicated>),
    /// A participant request. The sender is attached by the transport on
    /// receipt, never read from the payload.
    Intent(Intent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FrameHeader {
    magic: u32,
    version: u32,
}

impl FrameHeader {
    fn current() -> Self {
        Self {
            magic: WIRE_MAGIC,
            version: FORMAT_VERSION,
        }
    }

    fn validate(&self) -> Result<(), WireError> {
        if self.magic != WIRE_MAGIC {
            return Err(WireError::InvalidMagic(self.magic));
        }
        if self.version != FORMAT_VERSION {
            return Err(WireError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct FrameRef<'a> {
    header: FrameHeader,
    message: &'a WireMessage,
}

#[derive(Deserialize)]
struct Frame {
    header: FrameHeader,
    message: WireMessage,
}

// ---------------------------------------------------------------------------
// Encode / decode
// ---------------------------------------------------------------------------

pub fn encode(message: &WireMessage) -> Result<Vec<u8>, WireError> {
    let frame = FrameRef {
        header: FrameHeader::current(),
        message,
    };
    bitcode::serialize(&frame).map_err(|e| WireError::Encode(e.to_string()))
}

pub fn decode(data: &[u8]) -> Result<WireMessage, WireError> {
    let frame: Frame =
        bitcode::deserialize(data).map_err(|e| WireError::Decode(e.to_string()))?;
    frame.header.validate()?;
    Ok(frame.message)
}
