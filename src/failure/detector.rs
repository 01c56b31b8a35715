//! Failure Detector
//!
//! One probe attempt moves through:
//! `Probing -> (Acked | direct timeout) -> Indirect-Probing -> (Alive | Dead)`.
//!
//! Indirect probes fan out `PingRequest`s to a random group of other members;
//! the first relayed `Ack` wins and the rest are abandoned. Their late replies
//! find no outstanding request in the router and are dropped.

use super::types::FailureDetectorConfig;
use crate::membership::tracker::Tracker;
use crate::membership::types::{MemberState, PeerId};
use crate::transport::protocol::{MessageType, Packet};
use crate::transport::router::Router;
use crate::util;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct FailureDetector {
    config: FailureDetectorConfig,
    router: Arc<Router>,
    tracker: Arc<Tracker>,
}

impl FailureDetector {
    pub fn new(config: FailureDetectorConfig, router: Arc<Router>, tracker: Arc<Tracker>) -> Self {
        Self {
            config,
            router,
            tracker,
        }
    }

    pub fn config(&self) -> &FailureDetectorConfig {
        &self.config
    }

    /// Installs the inbound `Ping` and `PingRequest` handlers on the router.
    pub fn register_handlers(self: &Arc<Self>) {
        let detector = self.clone();
        self.router.add_handler(
            |message| message.kind == MessageType::Ping,
            move |packet| {
                let detector = detector.clone();
                async move { detector.handle_ping(packet).await }
            },
        );

        let detector = self.clone();
        self.router.add_handler(
            |message| message.kind == MessageType::PingRequest,
            move |packet| {
                let detector = detector.clone();
                async move { detector.handle_ping_req(packet).await }
            },
        );
    }

    /// Sends one request and waits up to `timeout` for its `Ack`.
    async fn ping_peer(&self, peer: PeerId, kind: MessageType, forward: Option<PeerId>) -> bool {
        debug!("[PingPeer] Sending {:?} to {}", kind, peer);

        let waiter = match self.router.request(peer, kind, forward).await {
            Ok(waiter) => waiter,
            Err(e) => {
                warn!("[PingPeer] Could not send {:?} to {}: {}", kind, peer, e);
                return false;
            }
        };

        match tokio::time::timeout(self.config.timeout, waiter).await {
            Ok(Ok(reply)) => reply.kind == MessageType::Ack,
            Ok(Err(_)) => false,
            Err(_) => {
                debug!("[PingPeer] {:?} to {} timed out", kind, peer);
                false
            }
        }
    }

    /// Probes a member picked uniformly at random from `members`.
    ///
    /// Returns `None` when there is nobody to probe.
    pub async fn ping(&self, members: &[PeerId]) -> Option<(PeerId, bool)> {
        let target = util::choose(members)?;
        debug!("[Ping] Probing {}", target);
        let alive = self.probe(target, members).await;
        Some((target, alive))
    }

    /// Direct probe of `target`, falling back to an indirect round through
    /// up to `group_size` other entries of `members`.
    pub async fn probe(&self, target: PeerId, members: &[PeerId]) -> bool {
        // 1. Direct ping
        if self.ping_peer(target, MessageType::Ping, None).await {
            debug!("[Ping] {} is alive", target);
            return true;
        }

        if self.tracker.update(target, MemberState::Suspicious).is_err() {
            debug!("[Ping] {} vanished while being probed", target);
        }

        // 2. Indirect ping
        let local_id = self.router.local_id();
        let others: Vec<PeerId> = members
            .iter()
            .copied()
            .filter(|&id| id != target && id != local_id)
            .collect();
        let helpers: Vec<PeerId> = util::sample(self.config.group_size, others.len())
            .into_iter()
            .map(|idx| others[idx])
            .collect();

        if helpers.is_empty() {
            debug!("[Ping] No members available to probe {} indirectly", target);
            return false;
        }

        debug!(
            "[Ping] Direct ping to {} timed out, asking {} members",
            target,
            helpers.len()
        );

        let mut probes: FuturesUnordered<_> = helpers
            .iter()
            .map(|&helper| self.ping_peer(helper, MessageType::PingRequest, Some(target)))
            .collect();

        let first_ack = async {
            while let Some(alive) = probes.next().await {
                if alive {
                    return true;
                }
            }
            false
        };

        let alive = tokio::time::timeout(self.config.timeout, first_ack)
            .await
            .unwrap_or(false);

        if alive {
            debug!("[Ping] {} confirmed alive indirectly", target);
        } else {
            debug!("[Ping] {} unreachable", target);
        }
        alive
    }

    async fn handle_ping(&self, packet: Packet) -> anyhow::Result<()> {
        debug!("[PingHandler] Responding to {}", packet.header.from);
        self.router
            .reply(packet.header.from, packet.header.message_id, MessageType::Ack)
            .await?;
        Ok(())
    }

    /// Probes `forward` for the requester; answers only on success.
    async fn handle_ping_req(&self, packet: Packet) -> anyhow::Result<()> {
        let Some(target) = packet.message.forward else {
            warn!("[PingRequestHandler] Request from {} names no target", packet.header.from);
            return Ok(());
        };

        debug!(
            "[PingRequestHandler] Probing {} for {}",
            target, packet.header.from
        );

        if self.ping_peer(target, MessageType::Ping, None).await {
            if self.tracker.update(target, MemberState::Alive).is_err() {
                debug!("[PingRequestHandler] {} is not a local member", target);
            }
            self.router
                .reply(packet.header.from, packet.header.message_id, MessageType::Ack)
                .await?;
        }
        Ok(())
    }
}
