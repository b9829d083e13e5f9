//! Playbook replay: parameter overrides, sequential tool dispatch, and the
//! report with its delta against the previous run.

mod diff;
mod model;
mod overrides;
mod progress;
mod report;
mod run;

pub use diff::{compute_changes, EVIDENCE_PATH_CHANGED, NEW_TASK_OR_RENAMED, REMOVED_SINCE_LAST_RUN};
pub use model::{ChangeEntry, ReplayOutcome, ReplaySummary, TaskResultRecord, TaskTotals};
pub use overrides::ReplayOverrides;
pub use progress::ReplayProgress;
pub use report::{build_summary, format_text};
pub use run::PlaybookReplayer;
