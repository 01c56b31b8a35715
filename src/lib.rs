//! SWIM Membership Library
//!
//! A decentralized failure detector and membership dissemination protocol for
//! a cluster of peers talking over UDP. Every node probes one random peer per
//! period, falls back to indirect probes through other peers when the direct
//! probe times out, and gossips membership changes piggybacked on its probe
//! traffic.
//!
//! ## Architecture Modules
//! - **`util`**: message-id counter and sampling without replacement.
//! - **`membership`**: the tracker holding the local view of the cluster.
//! - **`dissemination`**: the decaying buffer of membership events awaiting gossip.
//! - **`transport`**: wire format, UDP router, reply correlation and piggybacking.
//! - **`failure`**: the direct/indirect probe cycle and its inbound handlers.
//! - **`node`**: configuration and the top-level orchestrator.

pub mod dissemination;
pub mod error;
pub mod failure;
pub mod membership;
pub mod node;
pub mod transport;
pub mod util;

pub use error::{Result, SwimError};
pub use node::config::Config;
pub use node::service::SwimNode;
