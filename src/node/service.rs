use super::config::Config;
use crate::dissemination::buffer::DisseminationBuffer;
use crate::dissemination::types::Update;
use crate::error::{Result, SwimError};
use crate::failure::detector::FailureDetector;
use crate::membership::tracker::Tracker;
use crate::membership::types::{MemberState, MemberView, PeerId};
use crate::transport::protocol::MessageType;
use crate::transport::router::Router;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};

pub struct SwimNode {
    pub local_id: PeerId,
    pub address: SocketAddr,
    tracker: Arc<Tracker>,
    buffer: Arc<DisseminationBuffer>,
    router: Arc<Router>,
    detector: Arc<FailureDetector>,
    config: Config,
    left: AtomicBool,
}

impl SwimNode {
    /// Resolves and binds the configured address and seeds the tracker with
    /// the bootstrap peers.
    ///
    /// Fails if the configuration is invalid or the bind address cannot be
    /// resolved or bound.
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        config.validate()?;

        let bind = config.bind_address();
        let bind_addr = tokio::net::lookup_host(&bind)
            .await
            .map_err(|e| SwimError::Resolve {
                addr: bind.clone(),
                reason: e.to_string(),
            })?
            .next()
            .ok_or_else(|| SwimError::Resolve {
                addr: bind.clone(),
                reason: "no addresses found".to_string(),
            })?;

        let socket = UdpSocket::bind(bind_addr).await?;
        let tracker = Arc::new(Tracker::new());
        let buffer = Arc::new(DisseminationBuffer::new(config.dissemination.clone()));
        let router = Arc::new(Router::new(socket, tracker.clone(), buffer.clone())?);

        let local_id = router.local_id();
        let address = router.address();

        for peer in &config.bootstrap_peers {
            if *peer != address {
                tracker.add_member(PeerId::from_addr(peer), *peer);
            }
        }
        if !config.bootstrap_peers.is_empty() {
            info!("Joining cluster via {} bootstrap peer(s)", tracker.len());
        }

        // Announce ourselves on the first packets we send.
        buffer.add(Update::join(local_id, address));

        let detector = Arc::new(FailureDetector::new(
            config.failure_detector.clone(),
            router.clone(),
            tracker.clone(),
        ));
        detector.register_handlers();

        info!("Node {} bound to {}", local_id, address);

        Ok(Arc::new(Self {
            local_id,
            address,
            tracker,
            buffer,
            router,
            detector,
            config,
            left: AtomicBool::new(false),
        }))
    }

    pub fn tracker(&self) -> &Arc<Tracker> {
        &self.tracker
    }

    pub fn buffer(&self) -> &Arc<DisseminationBuffer> {
        &self.buffer
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the receive loop. Does not return.
    pub async fn start(self: Arc<Self>) {
        info!("Starting node {}...", self.local_id);

        let _sweep_handle = {
            let node = self.clone();
            tokio::spawn(async move {
                node.sweep_loop().await;
            })
        };

        self.router.clone().listen().await;
    }

    async fn sweep_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.sweep_interval);

        loop {
            interval.tick().await;
            let removed = self.router.sweep_expired(self.config.request_ttl);
            if removed > 0 {
                trace!("Swept {} expired requests", removed);
            }

            let reaped = self.tracker.reap_dead(self.config.dead_member_ttl);
            if !reaped.is_empty() {
                self.buffer.set_member_count(self.tracker.len() + 1);
            }
        }
    }

    /// Runs one probe round every `period`. Does not return.
    pub async fn probe_loop(self: Arc<Self>) {
        info!(
            "Probing every {:?} (timeout {:?}, group {})",
            self.config.failure_detector.period,
            self.config.failure_detector.timeout,
            self.config.failure_detector.group_size
        );

        loop {
            if !self.has_left() {
                self.probe_once().await;
            }
            tokio::time::sleep(self.config.failure_detector.period).await;
        }
    }

    /// Probes one random member and records the outcome.
    ///
    /// A member that failed is marked `Dead` and a `Failure` event is queued
    /// the first time. A `Dead` member that answers again is re-announced with
    /// a `Join`.
    pub async fn probe_once(&self) -> Option<(PeerId, bool)> {
        let members = self.tracker.list_ids();
        if members.is_empty() {
            debug!("No members to probe");
            return None;
        }

        let (peer, alive) = self.detector.ping(&members).await?;
        let previous = self.tracker.state_of(peer);

        if alive {
            if self.tracker.update(peer, MemberState::Alive).is_ok()
                && previous == Some(MemberState::Dead)
                && let Some(address) = self.tracker.address_of(peer)
            {
                info!("Member {} is alive again", peer);
                self.buffer.add(Update::join(peer, address));
            }
        } else {
            match self.tracker.update(peer, MemberState::Dead) {
                Ok(()) => {
                    if previous != Some(MemberState::Dead) {
                        warn!("Member {} declared dead", peer);
                        self.buffer.add(Update::failure(peer));
                    }
                }
                Err(e) => debug!("Probe outcome for {} dropped: {}", peer, e),
            }
        }

        Some((peer, alive))
    }

    /// Announces a graceful departure and stops probing.
    ///
    /// The `Leave` event is pushed out with one ping to every known member.
    pub async fn leave(&self) {
        info!("Node {} leaving the cluster", self.local_id);
        self.left.store(true, Ordering::SeqCst);
        self.buffer.add(Update::leave(self.local_id));

        for peer in self.tracker.list_ids() {
            if let Err(e) = self.router.send(peer, MessageType::Ping, None, None).await {
                debug!("Failed to notify {} of leave: {}", peer, e);
            }
        }
    }

    pub fn has_left(&self) -> bool {
        self.left.load(Ordering::SeqCst)
    }

    pub fn members(&self) -> Vec<MemberView> {
        self.tracker.views()
    }

    pub fn alive_members(&self) -> Vec<MemberView> {
        self.tracker
            .views()
            .into_iter()
            .filter(|view| view.state == MemberState::Alive)
            .collect()
    }
}
