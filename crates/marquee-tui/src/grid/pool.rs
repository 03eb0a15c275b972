use std::collections::{HashMap, VecDeque};

use super::cell::GridCell;

pub type CellFactory<C> = Box<dyn FnMut() -> C + Send>;

/// Detached cells waiting to be bound again, keyed by reuse identifier.
pub struct ReusePool<C> {
    factories: HashMap<&'static str, CellFactory<C>>,
    queues: HashMap<&'static str, VecDeque<C>>,
}

impl<C> Default for ReusePool<C> {
    fn default() -> Self {
        Self {
            factories: HashMap::new(),
            queues: HashMap::new(),
        }
    }
}

impl<C: GridCell> ReusePool<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, identifier: &'static str, factory: CellFactory<C>) {
        self.factories.insert(identifier, factory);
    }

    /// Oldest pooled cell first, then a fresh one from the factory.
    /// `None` for identifiers that were never registered.
    pub fn dequeue(&mut self, identifier: &str) -> Option<C> {
        if let Some(mut cell) = self.queues.get_mut(identifier).and_then(VecDeque::pop_front) {
            cell.prepare_for_reuse();
            return Some(cell);
        }
        match self.factories.get_mut(identifier) {
            Some(factory) => Some(factory()),
            None => {
                tracing::debug!("grid: dequeue for unregistered identifier {}", identifier);
                None
            }
        }
    }

    pub fn enqueue(&mut self, mut cell: C) {
        cell.cache_for_reuse();
        cell.cancel_pending();
        cell.set_index(None);
        self.queues
            .entry(cell.reuse_identifier())
            .or_default()
            .push_back(cell);
    }

    pub fn pooled(&self, identifier: &str) -> usize {
        self.queues.get(identifier).map_or(0, VecDeque::len)
    }

    pub fn drain(&mut self) {
        self.queues.clear();
    }
}
