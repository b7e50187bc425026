use super::write_json;
use crate::reports;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use timeforge::config::SolverConfig;
use timeforge::model::TimetableModel;
use timeforge::search::{AttemptOutcome, AttemptProgress, Orchestrator, ProgressCallback, RunContext};
use timeforge::TfResult;
use tracing::{error, info, warn};

#[derive(Args, Debug, Clone)]
pub struct SolveArgs {
    #[command(flatten)]
    pub config: SolverConfig,

    /// Directory receiving schedule.json, report.json and timetable.json.
    #[arg(short, long, default_value = "out")]
    pub out: PathBuf,

    /// Print the fused grid of this group only.
    #[arg(short, long)]
    pub group: Option<String>,

    #[arg(long, default_value_t = 5)]
    pub max_violations: usize,
}

struct CliLogger;
impl ProgressCallback for CliLogger {
    fn on_progress(&self, p: &AttemptProgress) -> bool {
        let outcome = match &p.outcome {
            AttemptOutcome::Feasible { score } => format!("feasible {:.2}%", score),
            AttemptOutcome::Infeasible { hard_violations } => {
                format!("infeasible ({} hard)", hard_violations)
            }
            AttemptOutcome::Skipped => "skipped".to_string(),
        };
        let best = p
            .best_score
            .map_or_else(|| "-".to_string(), |s| format!("{:.2}%", s));
        info!(
            "Attempt #{:<3} {:>3}/{} | {} | Best: {} | {:.1?} elapsed, ~{:.1?} left",
            p.attempt, p.completed, p.total, outcome, best, p.elapsed, p.estimated_remaining
        );
        true
    }
}

pub fn run(args: SolveArgs, config: SolverConfig, model: Arc<TimetableModel>) -> TfResult<()> {
    let keep_all = config.search.keep_all_runs;
    let orchestrator = Orchestrator::new(model.clone(), config);
    let ctx = RunContext::with_callback(CliLogger);
    let outcome = orchestrator.run(&ctx)?;
    let best = &outcome.best;

    info!("\n=== 🏆 FINAL RESULT ===");
    info!(
        "Attempt #{} (seed {}) | Score: {:.2}% | Idle: {}",
        best.attempt, best.seed, best.score, best.objective.idle_periods
    );
    if !best.inconsistencies.is_empty() {
        error!(
            "❌ {} enforced rule(s) broken in the selected timetable",
            best.inconsistencies.len()
        );
    }

    let schedule = write_json(&args.out, "schedule.json", &best.schedule)?;
    let report = write_json(&args.out, "report.json", &best.report)?;
    let timetable = write_json(&args.out, "timetable.json", &best.timetable)?;
    info!(
        "📂 Wrote {}, {} and {}",
        schedule.display(),
        report.display(),
        timetable.display()
    );
    if keep_all {
        let runs = write_json(&args.out, "runs.json", &outcome.runs)?;
        info!("📂 Wrote {} ({} runs)", runs.display(), outcome.runs.len());
    }

    reports::print_runs(&outcome);
    reports::print_verification_report(&best.report);
    reports::print_violations(&best.report, args.max_violations);

    let fused = &best.schedule.fused.groups;
    match &args.group {
        Some(name) => match fused.get(name) {
            Some(grid) => reports::print_schedule_grid(name, grid),
            None => warn!("⚠️  Group '{}' not found in the schedule.", name),
        },
        None => {
            for class in model.institution.base_classes() {
                let name = &model.institution.group(class).name;
                if let Some(grid) = fused.get(name) {
                    reports::print_schedule_grid(name, grid);
                }
            }
        }
    }

    Ok(())
}
