//! Small shared primitives: message-id generation and random sampling.

use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically increasing id generator.
///
/// Every value handed out by one counter is unique for the lifetime of the
/// counter.
#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicU64,
}

impl AtomicCounter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    /// Returns the current value and advances the counter by one.
    pub fn get_and_add(&self) -> u64 {
        self.value.fetch_add(1, Ordering::Relaxed)
    }

    pub fn current(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Samples `amount` distinct indices in `0..population` without replacement.
///
/// Returns exactly `min(amount, population)` indices, in random order.
pub fn sample(amount: usize, population: usize) -> Vec<usize> {
    let amount = amount.min(population);
    let mut rng = rand::thread_rng();
    rand::seq::index::sample(&mut rng, population, amount).into_vec()
}

/// Picks one element uniformly at random, `None` for an empty slice.
pub fn choose<T: Copy>(items: &[T]) -> Option<T> {
    if items.is_empty() {
        return None;
    }
    let idx = rand::thread_rng().gen_range(0..items.len());
    Some(items[idx])
}
