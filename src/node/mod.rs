//! SWIM Node
//!
//! Wires the tracker, the dissemination buffer, the router and the failure
//! detector together and runs the two long-lived tasks of a member:
//! - **`start`**: the receive loop (plus the outstanding-request sweep).
//! - **`probe_loop`**: one probe round every `period`, feeding outcomes back
//!   into the tracker and the buffer.

pub mod config;
pub mod service;
