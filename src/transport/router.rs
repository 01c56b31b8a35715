//! Packet Router
//!
//! Request/response semantics on top of a single UDP socket:
//! - **Correlation**: outgoing requests may register a one-shot waiter keyed by
//!   message id; the matching `Ack` is delivered to it at most once.
//! - **Dispatch**: every inbound message is offered to the registered handlers.
//! - **Piggybacking**: outgoing packets carry pending dissemination events and
//!   inbound events are folded into the buffer and the tracker.

use super::protocol::{
    Header, MAX_PACKET_SIZE, Message, MessageType, Packet, decode_packet, encode_packet,
    update_capacity,
};
use crate::dissemination::buffer::DisseminationBuffer;
use crate::dissemination::types::{EventKind, Update};
use crate::error::{Result, SwimError};
use crate::membership::tracker::Tracker;
use crate::membership::types::PeerId;
use crate::util::AtomicCounter;

use dashmap::DashMap;
use parking_lot::RwLock;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};

pub type Predicate = Arc<dyn Fn(&Message) -> bool + Send + Sync>;

/// Type-erased asynchronous handler invoked with the full inbound packet.
pub type HandlerFn =
    Arc<dyn Fn(Packet) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> + Send + Sync>;

struct Handler {
    applies: Predicate,
    handle: HandlerFn,
}

struct PendingRequest {
    target: PeerId,
    target_addr: SocketAddr,
    sent_at: Instant,
    waiter: oneshot::Sender<Message>,
}

pub struct Router {
    local_id: PeerId,
    address: SocketAddr,
    socket: Arc<UdpSocket>,
    tracker: Arc<Tracker>,
    buffer: Arc<DisseminationBuffer>,
    handlers: RwLock<Vec<Handler>>,
    /// Outstanding requests: `message id -> waiter`.
    outstanding: DashMap<u64, PendingRequest>,
    next_message_id: AtomicCounter,
}

impl Router {
    /// Wraps an already bound socket. The local peer id is derived from the
    /// socket's actual address.
    pub fn new(
        socket: UdpSocket,
        tracker: Arc<Tracker>,
        buffer: Arc<DisseminationBuffer>,
    ) -> Result<Self> {
        let address = socket.local_addr()?;

        Ok(Self {
            local_id: PeerId::from_addr(&address),
            address,
            socket: Arc::new(socket),
            tracker,
            buffer,
            handlers: RwLock::new(Vec::new()),
            outstanding: DashMap::new(),
            next_message_id: AtomicCounter::new(),
        })
    }

    pub fn local_id(&self) -> PeerId {
        self.local_id
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn tracker(&self) -> &Arc<Tracker> {
        &self.tracker
    }

    pub fn buffer(&self) -> &Arc<DisseminationBuffer> {
        &self.buffer
    }

    /// Registers an inbound handler.
    ///
    /// Every matching handler is spawned on its own task, in registration
    /// order, so a handler that waits on a reply never stalls the receive loop.
    /// Spawn order does not order execution: handlers for the same packet may
    /// run concurrently and finish in any order.
    pub fn add_handler<P, F, Fut>(&self, applies: P, handle: F)
    where
        P: Fn(&Message) -> bool + Send + Sync + 'static,
        F: Fn(Packet) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handle: HandlerFn = Arc::new(move |packet: Packet| {
            Box::pin(handle(packet)) as Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        });

        self.handlers.write().push(Handler {
            applies: Arc::new(applies),
            handle,
        });
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Sends a fresh message to `target`.
    ///
    /// With a `waiter`, the next `Ack` from `target` that echoes the returned
    /// message id is delivered to it. Unknown targets and socket failures are
    /// returned to the caller and never retried here.
    pub async fn send(
        &self,
        target: PeerId,
        kind: MessageType,
        forward: Option<PeerId>,
        waiter: Option<oneshot::Sender<Message>>,
    ) -> Result<u64> {
        let address = self
            .tracker
            .address_of(target)
            .ok_or(SwimError::MemberNotFound(target))?;

        let message_id = self.next_message_id.get_and_add();
        let packet = self.build_packet(message_id, kind, forward);
        let encoded = encode_packet(&packet)?;

        // Registered before transmitting so a fast reply cannot race past it.
        if let Some(waiter) = waiter {
            self.outstanding.insert(
                message_id,
                PendingRequest {
                    target,
                    target_addr: address,
                    sent_at: Instant::now(),
                    waiter,
                },
            );
        }

        if let Err(e) = self.socket.send_to(&encoded, address).await {
            self.outstanding.remove(&message_id);
            return Err(e.into());
        }

        trace!(
            "Sent {:?} #{} to {} with {} updates",
            kind,
            message_id,
            target,
            packet.updates.len()
        );
        Ok(message_id)
    }

    /// Sends a request and returns the receiving half of its waiter.
    pub async fn request(
        &self,
        target: PeerId,
        kind: MessageType,
        forward: Option<PeerId>,
    ) -> Result<oneshot::Receiver<Message>> {
        let (tx, rx) = oneshot::channel();
        self.send(target, kind, forward, Some(tx)).await?;
        Ok(rx)
    }

    /// Answers the request `request_id` received from `target`.
    pub async fn reply(&self, target: PeerId, request_id: u64, kind: MessageType) -> Result<()> {
        let address = self
            .tracker
            .address_of(target)
            .ok_or(SwimError::MemberNotFound(target))?;

        let packet = self.build_packet(request_id, kind, None);
        let encoded = encode_packet(&packet)?;
        self.socket.send_to(&encoded, address).await?;

        trace!("Sent {:?} #{} to {}", kind, request_id, target);
        Ok(())
    }

    fn build_packet(&self, message_id: u64, kind: MessageType, forward: Option<PeerId>) -> Packet {
        self.buffer.set_member_count(self.tracker.len() + 1);
        let max = self
            .buffer
            .config()
            .max_updates_per_packet
            .min(update_capacity());
        let updates = self.buffer.get(max);

        Packet {
            header: Header {
                message_id,
                from: self.local_id,
                update_count: updates.len() as u32,
                address: self.address,
            },
            message: Message {
                from: self.local_id,
                kind,
                forward,
            },
            updates,
        }
    }

    /// Receive loop. Never returns; bad packets are logged and skipped.
    pub async fn listen(self: Arc<Self>) {
        info!("[Router] Listening on {} as {}", self.address, self.local_id);

        // One extra byte so oversize datagrams are detected rather than truncated.
        let mut buf = vec![0u8; MAX_PACKET_SIZE + 1];

        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, src)) => match decode_packet(&buf[..len]) {
                    Ok(packet) => self.dispatch(packet, src),
                    Err(e) => {
                        warn!("[Router] Dropping packet from {}: {}", src, e);
                    }
                },
                Err(e) => {
                    error!("[Router] Failed to receive UDP packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    /// Processes one decoded packet received from `src`.
    pub fn dispatch(&self, packet: Packet, src: SocketAddr) {
        let from = packet.header.from;
        if from == self.local_id {
            trace!("[Router] Ignoring packet from self");
            return;
        }

        // 1. Learn about the sender so replies can be routed back.
        self.discover(from, advertised_addr(packet.header.address, src));

        // 2. Hand acks to the waiting request, if any.
        if packet.message.kind == MessageType::Ack {
            self.correlate(&packet, src);
        }

        // 3. Run matching handlers.
        let matching: Vec<HandlerFn> = self
            .handlers
            .read()
            .iter()
            .filter(|handler| (handler.applies)(&packet.message))
            .map(|handler| handler.handle.clone())
            .collect();

        for handle in matching {
            let packet = packet.clone();
            tokio::spawn(async move {
                if let Err(e) = handle(packet).await {
                    warn!("[Router] Handler failed: {}", e);
                }
            });
        }

        // 4. Fold in piggybacked updates.
        for update in packet.updates {
            self.apply_update(update, src);
        }
    }

    /// Records an unknown sender, unless a pending `Leave` says it is gone.
    fn discover(&self, from: PeerId, address: SocketAddr) {
        if self.tracker.contains(from) {
            return;
        }
        if !self.buffer.add(Update::join(from, address)) {
            trace!("[Router] Not rediscovering {}: leave pending", from);
            return;
        }
        self.tracker.add_member(from, address);
    }

    fn correlate(&self, packet: &Packet, src: SocketAddr) {
        let from = packet.header.from;
        let removed = self
            .outstanding
            .remove_if(&packet.header.message_id, |_, pending| {
                pending.target == from || pending.target_addr == src
            });

        match removed {
            Some((message_id, pending)) => {
                if pending.waiter.send(packet.message.clone()).is_err() {
                    trace!("[Router] Waiter for #{} already gone", message_id);
                }
            }
            None => {
                trace!(
                    "[Router] No outstanding request #{} for {}",
                    packet.header.message_id,
                    from
                );
            }
        }
    }

    fn apply_update(&self, update: Update, src: SocketAddr) {
        if update.member == self.local_id {
            if update.kind == EventKind::Failure {
                debug!("[Router] Refuting failure report about self");
                self.buffer.add(Update::join(self.local_id, self.address));
            }
            return;
        }

        if self.buffer.add(update.clone()) {
            self.tracker.apply_event(&update, src);
        }
        self.buffer.set_member_count(self.tracker.len() + 1);
    }

    /// Drops outstanding requests older than `ttl` or whose waiter is gone.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        let before = self.outstanding.len();
        self.outstanding
            .retain(|_, pending| !pending.waiter.is_closed() && pending.sent_at.elapsed() < ttl);
        before.saturating_sub(self.outstanding.len())
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }
}

/// A sender bound to a wildcard address advertises e.g. `0.0.0.0:port`; the
/// datagram's source ip is used instead in that case.
fn advertised_addr(advertised: SocketAddr, src: SocketAddr) -> SocketAddr {
    if advertised.ip().is_unspecified() {
        SocketAddr::new(src.ip(), advertised.port())
    } else {
        advertised
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advertised_addr_replaces_wildcard() {
        let src: SocketAddr = "10.0.0.7:40000".parse().unwrap();

        let wildcard: SocketAddr = "0.0.0.0:5000".parse().unwrap();
        assert_eq!(advertised_addr(wildcard, src), "10.0.0.7:5000".parse().unwrap());

        let concrete: SocketAddr = "10.0.0.8:5000".parse().unwrap();
        assert_eq!(advertised_addr(concrete, src), concrete);
    }
}
