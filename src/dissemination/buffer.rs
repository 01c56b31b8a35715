//! Dissemination Buffer
//!
//! Bounded, self-pruning store of pending membership events. Every read for an
//! outgoing packet counts as one dissemination of the events it returns.

use super::types::{DisseminationConfig, EventKind, Update};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;

pub struct DisseminationBuffer {
    config: DisseminationConfig,
    /// Cluster size (including the local node) used by the decay bound.
    member_count: AtomicUsize,
    buffer: Mutex<Vec<Update>>,
}

impl DisseminationBuffer {
    pub fn new(config: DisseminationConfig) -> Self {
        Self {
            config,
            member_count: AtomicUsize::new(1),
            buffer: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &DisseminationConfig {
        &self.config
    }

    pub fn set_member_count(&self, count: usize) {
        self.member_count.store(count, Ordering::Relaxed);
    }

    pub fn member_count(&self) -> usize {
        self.member_count.load(Ordering::Relaxed)
    }

    /// Number of disseminations after which an event is dropped.
    ///
    /// `ceil(lambda * ln(N))`, never below 1 so that a lone node still sends
    /// each event once.
    pub fn limit(&self) -> u32 {
        let members = self.member_count().max(1) as f64;
        let limit = (self.config.lambda * members.ln()).ceil();
        if limit.is_finite() && limit >= 1.0 {
            limit as u32
        } else {
            1
        }
    }

    /// Queues an event, returning `false` if it was superseded.
    ///
    /// An event for the same member and kind already in the buffer is merged:
    /// whichever copy has been disseminated fewer times is kept. A pending
    /// `Leave` supersedes every other event for that member, so stale joins
    /// still in circulation cannot resurrect it. A `Join` retires any pending
    /// `Failure` for the same member.
    pub fn add(&self, update: Update) -> bool {
        let mut buffer = self.buffer.lock();

        if update.kind == EventKind::Leave {
            buffer.retain(|existing| {
                existing.member != update.member || existing.kind == EventKind::Leave
            });
        } else if buffer
            .iter()
            .any(|existing| existing.member == update.member && existing.kind == EventKind::Leave)
        {
            trace!("Dropping {:?} for {}: leave pending", update.kind, update.member);
            return false;
        }

        if update.kind == EventKind::Join {
            buffer.retain(|existing| {
                existing.member != update.member || existing.kind != EventKind::Failure
            });
        }

        match buffer
            .iter_mut()
            .find(|existing| existing.member == update.member && existing.kind == update.kind)
        {
            Some(existing) => {
                if update.count < existing.count {
                    *existing = update;
                }
            }
            None => buffer.push(update),
        }
        true
    }

    /// Returns up to `max` events for piggybacking, least-disseminated first.
    ///
    /// Saturated events are pruned before selection. The returned events carry
    /// their incremented dissemination count.
    pub fn get(&self, max: usize) -> Vec<Update> {
        let limit = self.limit();
        let mut buffer = self.buffer.lock();

        let before = buffer.len();
        buffer.retain(|update| update.count < limit);
        if buffer.len() < before {
            trace!(
                "Pruned {} saturated events (limit {})",
                before - buffer.len(),
                limit
            );
        }

        buffer.sort_by_key(|update| update.count);

        buffer
            .iter_mut()
            .take(max)
            .map(|update| {
                update.count += 1;
                update.clone()
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }
}
