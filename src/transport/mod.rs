//! Transport Module
//!
//! - **`protocol`**: packet layout and the bincode wire codec.
//! - **`router`**: the UDP send/receive paths, reply correlation, handler
//!   dispatch and gossip piggybacking.

pub mod protocol;
pub mod router;
