//! Canonical transaction store
//!
//! Holds the most recently seen transactions, newest first, capped at
//! [`CAPACITY`](crate::constants::store::CAPACITY). `upsert` is the only mutation path.

use crate::constants::store::CAPACITY;
use crate::types::Transaction;

#[derive(Debug, Clone)]
pub struct TransactionStore {
    items: Vec<Transaction>,
    cap: usize,
}

impl Default for TransactionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionStore {
    pub fn new() -> Self {
        Self::with_capacity(CAPACITY)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            items: Vec::with_capacity(cap + 1),
            cap: cap.max(1),
        }
    }

    /// Insert or replace by id and promote to the front, then trim to the cap.
    ///
    /// Returns the ids evicted by the trim (never the upserted one).
    pub fn upsert(&mut self, txn: Transaction) -> Vec<String> {
        self.items.retain(|t| t.id != txn.id);
        self.items.insert(0, txn);
        if self.items.len() > self.cap {
            self.items
                .drain(self.cap..)
                .map(|t| t.id)
                .collect()
        } else {
            Vec::new()
        }
    }

    /// Ordered view, most-recent-first
    pub fn items(&self) -> &[Transaction] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.items.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Distinct cities seen so far, sorted; feeds the city choices in forms
    pub fn cities(&self) -> Vec<String> {
        let mut cities: Vec<String> = self
            .items
            .iter()
            .map(|t| t.city.clone())
            .filter(|c| !c.is_empty())
            .collect();
        cities.sort();
        cities.dedup();
        cities
    }
}
