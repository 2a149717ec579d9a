/// Loop protection for linked on-disk chains

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use tracing::warn;

/// Tracks the addresses a chain walk has visited
///
/// Catalog sectors, T/S list sectors, directory blocks and index blocks all
/// link to each other by address. A damaged image can link back into itself;
/// every walk asks the guard before following a link and stops on the first
/// revisit. Walks are therefore bounded by the number of distinct addresses
/// (560 DOS sectors, 65536 ProDOS blocks).
#[derive(Debug)]
pub struct ChainGuard<A> {
    chain: &'static str,
    visited: HashSet<A>,
}

impl<A: Copy + Eq + Hash + Debug> ChainGuard<A> {
    /// Create a guard for a named chain (used in diagnostics)
    pub fn new(chain: &'static str) -> Self {
        Self {
            chain,
            visited: HashSet::new(),
        }
    }

    /// Record a visit; returns false if the address was already seen
    pub fn visit(&mut self, address: A) -> bool {
        if self.visited.insert(address) {
            true
        } else {
            warn!(chain = self.chain, ?address, "cycle detected, stopping walk");
            false
        }
    }

    /// Number of distinct addresses visited
    pub fn steps(&self) -> usize {
        self.visited.len()
    }
}
