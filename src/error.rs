//! Error types for the membership engine

use crate::membership::types::PeerId;
use thiserror::Error;

/// Result type for membership operations
pub type Result<T> = std::result::Result<T, SwimError>;

/// Errors surfaced by the tracker, the transport and node construction.
///
/// Probe timeouts are not errors: they are reported as `false` outcomes by the
/// failure detector.
#[derive(Debug, Error)]
pub enum SwimError {
    // ==================== Membership Errors ====================
    #[error("member not found: {0}")]
    MemberNotFound(PeerId),

    // ==================== Transport Errors ====================
    #[error("failed to resolve address {addr}: {reason}")]
    Resolve { addr: String, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== Codec Errors ====================
    #[error("failed to encode packet: {0}")]
    Encode(String),

    #[error("failed to decode packet: {0}")]
    Decode(String),

    #[error("packet too large: {size} bytes (max {max})")]
    PacketTooLarge { size: usize, max: usize },

    // ==================== Configuration Errors ====================
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SwimError {
    /// Whether the error is the "unknown peer" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SwimError::MemberNotFound(_))
    }
}
