pub mod backend;
pub mod config;
pub mod invoke;
pub mod scheduler;
pub mod tail;
pub mod view;

#[cfg(test)]
mod testing;

pub use backend::{BackendError, HttpBackend, StageBackend};
pub use config::{ConfigOverrides, DashboardConfig};
pub use invoke::{ActionInvoker, ActionOutcome};
pub use scheduler::{refresh_once, PollScheduler, SchedulerHandle};
pub use tail::{LogSink, LogTailer, TailOutcome, TailSession, TailSettings};
pub use view::{LogPane, RowId, TableRow, TableView};

use std::sync::Arc;
use stool_core::{ColumnRenderer, DashboardController, Sha256Fingerprinter, StageSetReconciler};
use tokio::sync::Mutex;

pub type SharedController = Arc<Mutex<DashboardController<TableView>>>;

/// Controller whose change detection and table cells use the same
/// configured columns.
pub fn new_controller(config: &DashboardConfig) -> SharedController {
    let renderer = ColumnRenderer::new(config.columns.iter().cloned());
    let reconciler = StageSetReconciler::new(renderer.clone(), Sha256Fingerprinter);
    Arc::new(Mutex::new(DashboardController::with_reconciler(
        TableView::new(renderer),
        reconciler,
    )))
}
