use crate::fingerprint::{Fingerprint, Fingerprinter, Sha256Fingerprinter};
use crate::render::{ColumnRenderer, RowRenderer};
use crate::stage::{StageRecord, StageSnapshot};
use std::collections::BTreeMap;
use std::fmt;

/// The rendering side of the dashboard. The reconciler only ever touches
/// nodes it created itself; anything else the view shows is left alone.
pub trait StageView {
    type Node: Clone + PartialEq + fmt::Debug;

    /// Creates a node for `record` and appends it after every existing row.
    fn insert(&mut self, record: &StageRecord, representation: &str) -> Self::Node;

    /// Builds a fresh node for `record` and puts it where `node` was.
    fn replace(
        &mut self,
        node: &Self::Node,
        record: &StageRecord,
        representation: &str,
    ) -> Self::Node;

    fn remove(&mut self, node: &Self::Node);

    fn bind_actions(&mut self, node: &Self::Node);

    fn unbind_actions(&mut self, node: &Self::Node);

    fn mark_broken(&mut self, _node: &Self::Node, _message: &str) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowState<N> {
    pub content_hash: Fingerprint,
    pub node: N,
}

pub type RowSet<N> = BTreeMap<String, RowState<N>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub inserted: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
    pub removed: Vec<String>,
}

impl ReconcileReport {
    pub fn mutation_count(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.removed.len()
    }

    pub fn is_noop(&self) -> bool {
        self.mutation_count() == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct StageSetReconciler<R = ColumnRenderer, F = Sha256Fingerprinter> {
    renderer: R,
    fingerprinter: F,
}

impl<R: RowRenderer, F: Fingerprinter> StageSetReconciler<R, F> {
    pub fn new(renderer: R, fingerprinter: F) -> Self {
        Self {
            renderer,
            fingerprinter,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Merges `snapshot` into `previous`, applying the minimal set of view
    /// calls. The returned row set holds exactly the snapshot's names.
    pub fn reconcile<V: StageView>(
        &self,
        mut previous: RowSet<V::Node>,
        snapshot: &StageSnapshot,
        view: &mut V,
    ) -> (RowSet<V::Node>, ReconcileReport) {
        let mut next = RowSet::new();
        let mut report = ReconcileReport::default();

        for record in snapshot.records() {
            let representation = self.renderer.render(record);
            let content_hash = self.fingerprinter.fingerprint(&representation);

            let state = match previous.remove(&record.name) {
                None => {
                    let node = view.insert(record, &representation);
                    view.bind_actions(&node);
                    report.inserted.push(record.name.clone());
                    RowState { content_hash, node }
                }
                Some(prior) if prior.content_hash != content_hash => {
                    view.unbind_actions(&prior.node);
                    let node = view.replace(&prior.node, record, &representation);
                    view.bind_actions(&node);
                    report.updated.push(record.name.clone());
                    RowState { content_hash, node }
                }
                Some(prior) => {
                    report.unchanged.push(record.name.clone());
                    prior
                }
            };
            next.insert(record.name.clone(), state);
        }

        for (name, stale) in previous {
            view.unbind_actions(&stale.node);
            view.remove(&stale.node);
            report.removed.push(name);
        }

        (next, report)
    }
}

/// Owns the tracked rows and the view they are drawn into.
pub struct DashboardController<V: StageView, R = ColumnRenderer, F = Sha256Fingerprinter> {
    reconciler: StageSetReconciler<R, F>,
    rows: RowSet<V::Node>,
    view: V,
    last_error: Option<String>,
    passes: u64,
}

impl<V: StageView> DashboardController<V> {
    pub fn new(view: V) -> Self {
        Self::with_reconciler(view, StageSetReconciler::default())
    }
}

impl<V, R, F> DashboardController<V, R, F>
where
    V: StageView,
    R: RowRenderer,
    F: Fingerprinter,
{
    pub fn with_reconciler(view: V, reconciler: StageSetReconciler<R, F>) -> Self {
        Self {
            reconciler,
            rows: RowSet::new(),
            view,
            last_error: None,
            passes: 0,
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: &StageSnapshot) -> ReconcileReport {
        let previous = std::mem::take(&mut self.rows);
        let (rows, report) = self.reconciler.reconcile(previous, snapshot, &mut self.view);
        self.rows = rows;
        self.last_error = None;
        self.passes += 1;
        report
    }

    /// Keeps the current rows; only remembers what went wrong.
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Returns false when the stage is not tracked.
    pub fn mark_broken(&mut self, stage: &str, message: &str) -> bool {
        match self.rows.get(stage) {
            Some(state) => {
                self.view.mark_broken(&state.node, message);
                true
            }
            None => false,
        }
    }

    pub fn rows(&self) -> &RowSet<V::Node> {
        &self.rows
    }

    pub fn tracked_names(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn node(&self, stage: &str) -> Option<&V::Node> {
        self.rows.get(stage).map(|state| &state.node)
    }

    pub fn reconciler(&self) -> &StageSetReconciler<R, F> {
        &self.reconciler
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }
}
