use super::write_json;
use crate::reports;
use clap::Args;
use std::path::PathBuf;
use timeforge::api;
use timeforge::model::TimetableModel;
use timeforge::TfResult;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// A timetable.json produced by `solve`.
    #[arg(short, long)]
    pub timetable: PathBuf,

    /// Also write the report to this directory.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    #[arg(long, default_value_t = 5)]
    pub max_violations: usize,
}

/// Returns whether every mandatory category is fully satisfied.
pub fn run(args: VerifyArgs, model: &TimetableModel) -> TfResult<bool> {
    info!("🔎 Auditing {}", args.timetable.display());
    let doc = api::load_timetable(&args.timetable)?;
    let report = api::verify_document(model, &doc)?;

    reports::print_verification_report(&report);
    reports::print_violations(&report, args.max_violations);

    if let Some(dir) = &args.out {
        let path = write_json(dir, "report.json", &report)?;
        info!("📂 Wrote {}", path.display());
    }

    Ok(report.mandatory_violations() == 0)
}
