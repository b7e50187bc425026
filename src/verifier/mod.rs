//! Independent audit of a timetable against every rule category.

mod checks;
pub mod report;

pub use self::report::{Category, CategoryReport, VerificationReport, Violation};

use crate::model::TimetableModel;
use crate::search::timetable::Timetable;
use tracing::debug;

/// Scores `tt` against `model`. Pure: the same inputs always give the same
/// report.
pub fn verify(model: &TimetableModel, tt: &Timetable) -> VerificationReport {
    let mut audit = checks::Audit::new(model, tt, VerificationReport::blank_categories());

    checks::volume(&mut audit);
    checks::availability(&mut audit);
    checks::double_booking(&mut audit);
    checks::calendar_blocking(&mut audit);
    checks::cafeteria(&mut audit);
    checks::sub_groups(&mut audit);
    checks::synchronization(&mut audit);
    checks::rooms(&mut audit);
    checks::equity(&mut audit);
    checks::teacher_load(&mut audit);
    let idle = checks::class_rules(&mut audit);

    let report = VerificationReport::from_categories(audit.finish(), idle);
    debug!(
        "Verification: {:.2}% global, {} violations, {} idle periods",
        report.global_score,
        report.violation_count(),
        report.idle_periods
    );
    report
}
