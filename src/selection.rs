//! Selection & navigation coordinator
//!
//! Tracks which transaction is being inspected and keeps it consistent with the
//! navigation history (`/` and `/item/{id}`) and with store mutations.
//!
//! A selection is a weak reference: it names a transaction id and is resolved against
//! the store on every read. The one exception is a transaction fetched from the backend
//! for a path that is no longer in the store; that snapshot is held detached until the
//! operator navigates elsewhere.

use crate::router::Route;
use crate::store::TransactionStore;
use crate::types::Transaction;

#[derive(Debug, Clone, PartialEq)]
enum Selected {
    Live(String),
    Detached(Box<Transaction>),
}

impl Selected {
    fn id(&self) -> &str {
        match self {
            Selected::Live(id) => id,
            Selected::Detached(t) => &t.id,
        }
    }
}

/// Outcome of arriving at a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Route resolved locally (selection set or cleared)
    Resolved,
    /// The id is not in the store; the caller should fetch it from the backend
    /// and report back through [`SelectionCoordinator::lookup_resolved`]
    NeedsLookup(String),
}

#[derive(Debug, Clone)]
pub struct SelectionCoordinator {
    selected: Option<Selected>,
    history: Vec<Route>,
    cursor: usize,
    pending_lookup: Option<String>,
}

impl Default for SelectionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionCoordinator {
    pub fn new() -> Self {
        Self {
            selected: None,
            history: vec![Route::Feed],
            cursor: 0,
            pending_lookup: None,
        }
    }

    pub fn route(&self) -> &Route {
        &self.history[self.cursor]
    }

    pub fn path(&self) -> String {
        self.route().path()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_ref().map(|s| s.id())
    }

    pub fn pending_lookup(&self) -> Option<&str> {
        self.pending_lookup.as_deref()
    }

    pub fn can_go_back(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.cursor + 1 < self.history.len()
    }

    /// Resolve the selection against the store. A live selection whose id has left the
    /// store resolves to `None`; call [`revalidate`](Self::revalidate) to drop it for good.
    pub fn resolve<'a>(&'a self, store: &'a TransactionStore) -> Option<&'a Transaction> {
        match self.selected.as_ref()? {
            Selected::Live(id) => store.get(id),
            Selected::Detached(t) => store.get(&t.id).or(Some(t.as_ref())),
        }
    }

    fn push(&mut self, route: Route) {
        if *self.route() == route {
            return;
        }
        self.history.truncate(self.cursor + 1);
        self.history.push(route);
        self.cursor = self.history.len() - 1;
    }

    /// Operator opens a transaction: select it and push `/item/{id}`
    pub fn open(&mut self, txn: &Transaction) {
        self.pending_lookup = None;
        self.selected = Some(Selected::Live(txn.id.clone()));
        self.push(Route::item(txn.id.clone()));
    }

    /// Operator closes the detail view: clear and push `/`
    pub fn close(&mut self) {
        self.pending_lookup = None;
        self.selected = None;
        self.push(Route::Feed);
    }

    /// A streamed transaction always takes focus. The path is left alone.
    pub fn focus_latest(&mut self, txn: &Transaction) {
        self.pending_lookup = None;
        self.selected = Some(Selected::Live(txn.id.clone()));
    }

    /// The alert was dismissed after a successful verification
    pub fn dismiss(&mut self) {
        let was = self.selected.take();
        self.pending_lookup = None;
        if let (Some(sel), Some(route_id)) = (was, self.route().item_id()) {
            if sel.id() == route_id {
                self.push(Route::Feed);
            }
        }
    }

    /// Programmatic navigation to an arbitrary path (deep link, typed path)
    pub fn navigate(&mut self, route: Route, store: &TransactionStore) -> Resolution {
        self.push(route);
        self.arrive(store)
    }

    /// History back. `None` when already at the oldest entry.
    pub fn back(&mut self, store: &TransactionStore) -> Option<Resolution> {
        if !self.can_go_back() {
            return None;
        }
        self.cursor -= 1;
        Some(self.arrive(store))
    }

    /// History forward. `None` when already at the newest entry.
    pub fn forward(&mut self, store: &TransactionStore) -> Option<Resolution> {
        if !self.can_go_forward() {
            return None;
        }
        self.cursor += 1;
        Some(self.arrive(store))
    }

    /// Resolve the current route the way an external navigation would
    fn arrive(&mut self, store: &TransactionStore) -> Resolution {
        self.pending_lookup = None;
        match self.route().clone() {
            Route::Feed => {
                self.selected = None;
                Resolution::Resolved
            }
            Route::Item { id } => {
                if store.contains(&id) {
                    self.selected = Some(Selected::Live(id));
                    Resolution::Resolved
                } else {
                    self.selected = None;
                    self.pending_lookup = Some(id.clone());
                    Resolution::NeedsLookup(id)
                }
            }
        }
    }

    /// Apply the backend lookup for `id`. Ignored unless that lookup is still the one
    /// the coordinator is waiting for. Returns whether anything was applied.
    pub fn lookup_resolved(
        &mut self,
        id: &str,
        found: Option<Transaction>,
        store: &TransactionStore,
    ) -> bool {
        if self.pending_lookup.as_deref() != Some(id) || self.route().item_id() != Some(id) {
            log::debug!("[selection] stale lookup for {id} ignored");
            return false;
        }
        self.pending_lookup = None;
        self.selected = if store.contains(id) {
            Some(Selected::Live(id.to_string()))
        } else {
            found
                .filter(|t| t.id == id)
                .map(|t| Selected::Detached(Box::new(t)))
        };
        true
    }

    /// Drop a live selection whose id is no longer anywhere in the (unfiltered) store.
    /// Returns true when the selection was cleared.
    pub fn revalidate(&mut self, store: &TransactionStore) -> bool {
        if let Some(Selected::Live(id)) = &self.selected {
            if !store.contains(id) {
                log::debug!("[selection] {id} left the store, clearing selection");
                self.selected = None;
                return true;
            }
        }
        false
    }
}
