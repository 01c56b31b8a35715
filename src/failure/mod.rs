//! Failure Detection Module
//!
//! Implements the SWIM probe cycle: a direct `Ping` to one random member, then,
//! if no `Ack` arrives in time, `PingRequest`s through a random group of other
//! members that probe the target on our behalf.
//!
//! The detector only reports outcomes. Deciding what a failed probe means for
//! the membership view is left to the node's probe loop.

pub mod detector;
pub mod types;
