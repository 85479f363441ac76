//! Domain model (IDs, targets, tasks, outcomes, events, errors).

pub mod errors;
pub mod events;
pub mod ids;
pub mod outcome;
pub mod schedule;
pub mod state;
pub mod target;
pub mod task;

pub use self::errors::{ErrorKind, StoreError, SyncError};
pub use self::events::{EventKind, SyncEvent};
pub use self::ids::{AttemptId, ContentId, OwnerId, SessionId, SyncTaskId, TargetId};
pub use self::outcome::{AttemptOutcome, AttemptRecord, TargetResult, TargetStatus};
pub use self::schedule::{Priority, Schedule, Strategy};
pub use self::state::TaskStatus;
pub use self::target::{AffectedTarget, ChangeKind, ContentChange, TargetKind};
pub use self::task::{QueueCounts, SyncTask, TaskSnapshot};
