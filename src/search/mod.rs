pub mod annealer;
pub mod energy;
pub mod initial;
pub mod orchestrator;
pub mod timetable;

pub use self::annealer::{AnnealStats, Annealer};
pub use self::energy::{Cost, Ledger};
pub use self::orchestrator::{
    AttemptOutcome, AttemptProgress, ObjectiveBreakdown, Orchestrator, ProgressCallback,
    RunContext, RunResult, SearchOutcome,
};
pub use self::timetable::{AssignmentEntry, Session, Timetable, TimetableDocument};
