pub mod action;
pub mod category;
pub mod fingerprint;
pub mod log_tail;
pub mod reconcile;
pub mod render;
pub mod stage;

pub use action::{ActionRequest, ActionSequence, ArgumentStyle, SequenceState, StageAction};
pub use category::{CategoryCounts, StageCategory, ORIGIN_FIELDS};
pub use fingerprint::{Fingerprint, Fingerprinter, Fnv1aFingerprinter, Sha256Fingerprinter};
pub use log_tail::{LogBuffer, LogChunk, LogCursor, TailState, TailStep, DEFAULT_LOG_CAP_CHARS};
pub use reconcile::{DashboardController, ReconcileReport, RowSet, RowState, StageSetReconciler, StageView};
pub use render::{ColumnRenderer, RowRenderer, DEFAULT_COLUMNS};
pub use stage::{display_value, SnapshotError, StageRecord, StageSnapshot};
