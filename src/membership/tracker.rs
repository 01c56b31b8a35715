//! Membership Tracker
//!
//! The local source of truth for which peers exist and whether they are
//! believed alive. All state transitions go through [`Tracker::update`]; gossip
//! is folded in through [`Tracker::apply_event`].

use super::types::{MemberRecord, MemberState, MemberView, PeerId};
use crate::dissemination::types::{EventKind, Update};
use crate::error::{Result, SwimError};

use dashmap::DashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct Tracker {
    /// Remote members only; the local node is never stored here.
    /// Each shard lock guards structural changes and the records it holds.
    members: DashMap<PeerId, MemberRecord>,
}

impl Tracker {
    pub fn new() -> Self {
        Self {
            members: DashMap::new(),
        }
    }

    /// Inserts an `Alive` record, or does nothing if `id` is already known.
    ///
    /// Returns `true` when a new record was created.
    pub fn add_member(&self, id: PeerId, address: SocketAddr) -> bool {
        let mut inserted = false;
        self.members.entry(id).or_insert_with(|| {
            inserted = true;
            MemberRecord::new(id, address)
        });

        if inserted {
            info!("Member {} joined at {} (cluster size {})", id, address, self.len() + 1);
        }
        inserted
    }

    /// Sets the state of a known member and refreshes its `last_ack`.
    pub fn update(&self, id: PeerId, state: MemberState) -> Result<()> {
        match self.members.get_mut(&id) {
            Some(mut record) => {
                let now = Instant::now();
                if record.state != state {
                    debug!("Member {}: {:?} -> {:?}", id, record.state, state);
                    record.state_since = now;
                }
                record.state = state;
                record.last_ack = now;
                Ok(())
            }
            None => Err(SwimError::MemberNotFound(id)),
        }
    }

    pub fn get(&self, id: PeerId) -> Option<MemberRecord> {
        self.members.get(&id).map(|entry| entry.value().clone())
    }

    pub fn address_of(&self, id: PeerId) -> Option<SocketAddr> {
        self.members.get(&id).map(|entry| entry.address)
    }

    pub fn state_of(&self, id: PeerId) -> Option<MemberState> {
        self.members.get(&id).map(|entry| entry.state)
    }

    /// Removes a member; returns `true` if it was present.
    pub fn delete(&self, id: PeerId) -> bool {
        let removed = self.members.remove(&id).is_some();
        if removed {
            info!("Member {} removed (cluster size {})", id, self.len() + 1);
        }
        removed
    }

    pub fn contains(&self, id: PeerId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn list_ids(&self) -> Vec<PeerId> {
        self.members.iter().map(|entry| *entry.key()).collect()
    }

    pub fn views(&self) -> Vec<MemberView> {
        let mut views: Vec<MemberView> = self
            .members
            .iter()
            .map(|entry| entry.value().view())
            .collect();
        views.sort_by_key(|view| view.id);
        views
    }

    /// Forgets members that have been `Dead` for at least `ttl`.
    ///
    /// Returns the removed ids.
    pub fn reap_dead(&self, ttl: Duration) -> Vec<PeerId> {
        let mut reaped = Vec::new();
        self.members.retain(|id, record| {
            let expired =
                record.state == MemberState::Dead && record.state_since.elapsed() >= ttl;
            if expired {
                reaped.push(*id);
            }
            !expired
        });

        for id in &reaped {
            info!("Member {} forgotten after {:?} dead", id, ttl);
        }
        reaped
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Folds one gossiped event into the local view.
    ///
    /// A `Join` without an address is attributed to `origin`, the address the
    /// carrying packet came from; a `Join` for a known `Suspicious` or `Dead`
    /// member brings it back to `Alive`. Events are applied without checking
    /// who issued them.
    pub fn apply_event(&self, update: &Update, origin: SocketAddr) {
        match update.kind {
            EventKind::Join => {
                let address = update.address.unwrap_or(origin);
                if self.add_member(update.member, address) {
                    return;
                }
                // A known member announcing itself again refutes earlier suspicion
                if self
                    .state_of(update.member)
                    .is_some_and(|state| state != MemberState::Alive)
                {
                    info!("Member {} rejoined", update.member);
                    if let Err(e) = self.update(update.member, MemberState::Alive) {
                        debug!("Ignoring join event: {}", e);
                    }
                }
            }
            EventKind::Failure => {
                if let Err(e) = self.update(update.member, MemberState::Dead) {
                    debug!("Ignoring failure event: {}", e);
                }
            }
            EventKind::Leave => {
                self.delete(update.member);
            }
        }
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}
