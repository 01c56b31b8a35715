//! Membership Tracker Module
//!
//! Holds the local view of the cluster: one [`MemberRecord`](types::MemberRecord)
//! per known remote peer, keyed by a [`PeerId`](types::PeerId) derived from the
//! peer's address.
//!
//! ## State Model
//! - **Alive**: the last probe (or gossip) says the peer responds.
//! - **Suspicious**: a direct probe timed out and an indirect probe is pending.
//! - **Dead**: no probe path reached the peer, or a `Failure` event said so.
//!
//! Transitions are not strictly ordered: a later probe or a re-join can move a
//! `Dead` member back to `Alive`.

pub mod tracker;
pub mod types;

#[cfg(test)]
mod tests;
