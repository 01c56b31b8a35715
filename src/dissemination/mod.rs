//! Gossip Dissemination Module
//!
//! Membership changes are not broadcast. They are queued in a
//! [`DisseminationBuffer`](buffer::DisseminationBuffer) and piggybacked on
//! ordinary probe traffic, least-disseminated first, until each event has been
//! sent `ceil(lambda * ln(N))` times.

pub mod buffer;
pub mod types;
