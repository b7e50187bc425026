use super::annealer::Annealer;
use super::energy::Cost;
use super::initial;
use super::timetable::{Timetable, TimetableDocument};
use crate::config::SolverConfig;
use crate::error::{TfResult, TimeForgeError};
use crate::model::{TimetableModel, WeekTargets};
use crate::projector::{self, ScheduleProjection, WeekTargetEntry};
use crate::verifier::{self, VerificationReport};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Feasible { score: f64 },
    Infeasible { hard_violations: u32 },
    /// Not started because the run was cancelled.
    Skipped,
}

#[derive(Debug, Clone)]
pub struct AttemptProgress {
    pub attempt: usize,
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
    pub estimated_remaining: Duration,
    pub best_score: Option<f64>,
    pub outcome: AttemptOutcome,
}

/// Receives an update after every attempt.
/// Returning `false` cancels the attempts that have not started yet.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, progress: &AttemptProgress) -> bool;
}

/// Per-run collaborators: an optional progress sink and a cancellation token
/// that may be shared with another thread.
#[derive(Default)]
pub struct RunContext {
    pub callback: Option<Box<dyn ProgressCallback>>,
    pub cancel: Arc<AtomicBool>,
}

impl RunContext {
    pub fn with_callback<CB: ProgressCallback + 'static>(callback: CB) -> Self {
        Self {
            callback: Some(Box::new(callback)),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveBreakdown {
    pub hard: u32,
    pub soft: f64,
    pub energy: f64,
    pub idle_periods: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub attempt: usize,
    pub seed: u64,
    pub week_targets: Vec<WeekTargetEntry>,
    pub timetable: TimetableDocument,
    pub schedule: ScheduleProjection,
    pub report: VerificationReport,
    pub score: f64,
    pub objective: ObjectiveBreakdown,
    /// Enforced rules the audit found broken on a feasible attempt.
    pub inconsistencies: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best: RunResult,
    /// Every feasible run in attempt order; empty unless `keep_all_runs`.
    pub runs: Vec<RunResult>,
    pub feasible: usize,
    pub infeasible: usize,
    pub cancelled: usize,
}

#[derive(Default)]
struct ProgressState {
    completed: usize,
    best_score: Option<f64>,
}

pub struct Orchestrator {
    model: Arc<TimetableModel>,
    config: SolverConfig,
}

impl Orchestrator {
    pub fn new(model: Arc<TimetableModel>, config: SolverConfig) -> Self {
        Self { model, config }
    }

    pub fn model(&self) -> &TimetableModel {
        &self.model
    }

    /// Runs every attempt on a dedicated thread pool and keeps the run with
    /// the highest global score, ties going to the lowest attempt index.
    pub fn run(&self, ctx: &RunContext) -> TfResult<SearchOutcome> {
        let params = &self.config.search;
        params.validate()?;

        let total = params.attempts;
        let base_seed = params.seed.unwrap_or_else(|| fastrand::u64(..));
        info!(
            "Running {} attempts (base seed {}, {} threads)",
            total,
            base_seed,
            if params.threads == 0 {
                "all".to_string()
            } else {
                params.threads.to_string()
            }
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(params.threads)
            .build()
            .map_err(|e| TimeForgeError::ThreadPool(e.to_string()))?;

        let start = Instant::now();
        let progress = Mutex::new(ProgressState::default());

        let results: Vec<Option<TfResult<RunResult>>> = pool.install(|| {
            (0..total)
                .into_par_iter()
                .map(|attempt| {
                    if ctx.is_cancelled() {
                        return None;
                    }
                    let seed = base_seed.wrapping_add(attempt as u64);
                    let result = self.run_attempt(attempt, seed);
                    self.report_progress(ctx, &progress, start, attempt, total, &result);
                    Some(result)
                })
                .collect()
        });

        let mut outcome_runs = Vec::new();
        let mut best: Option<RunResult> = None;
        let (mut infeasible, mut cancelled) = (0, 0);

        for result in results {
            let run = match result {
                None => {
                    cancelled += 1;
                    continue;
                }
                Some(Err(TimeForgeError::InfeasibleAttempt {
                    attempt,
                    hard_violations,
                })) => {
                    warn!(
                        "Attempt #{} discarded: {} hard violations left",
                        attempt, hard_violations
                    );
                    infeasible += 1;
                    continue;
                }
                Some(Err(e)) => return Err(e),
                Some(Ok(run)) => run,
            };

            if best.as_ref().map_or(true, |b| run.score > b.score) {
                best = Some(run.clone());
            }
            outcome_runs.push(run);
        }

        let feasible = outcome_runs.len();
        let Some(best) = best else {
            if cancelled > 0 {
                return Err(TimeForgeError::Cancelled);
            }
            return Err(TimeForgeError::NoFeasibleSchedule { attempts: total });
        };

        info!(
            "Selected attempt #{} (score {:.2}%, {} feasible / {} infeasible / {} cancelled) in {:.2?}",
            best.attempt,
            best.score,
            feasible,
            infeasible,
            cancelled,
            start.elapsed()
        );

        if !params.keep_all_runs {
            outcome_runs.clear();
        }

        Ok(SearchOutcome {
            best,
            runs: outcome_runs,
            feasible,
            infeasible,
            cancelled,
        })
    }

    /// One independent attempt: week split, initial placement, annealing.
    /// Fails with `InfeasibleAttempt` when hard violations remain.
    pub fn run_attempt(&self, attempt: usize, seed: u64) -> TfResult<RunResult> {
        let model = self.model.as_ref();
        let weights = &self.config.weights;
        let mut rng = fastrand::Rng::with_seed(seed);

        let targets = WeekTargets::split(model, &mut rng);
        let tt = initial::place(model, &targets, &mut rng, attempt)?;

        let mut annealer = Annealer::new(model, weights, tt, rng);
        let start_cost = annealer.ledger.total();
        let stats = annealer.run(&self.config.search);
        debug!(
            "Attempt #{}: {} steps, {} accepted, hard {} -> {}, soft {:.2} -> {:.2}",
            attempt,
            stats.steps,
            stats.accepted,
            start_cost.hard,
            stats.best.hard,
            start_cost.soft,
            stats.best.soft
        );

        if stats.best.hard > 0 {
            return Err(TimeForgeError::InfeasibleAttempt {
                attempt,
                hard_violations: stats.best.hard,
            });
        }

        Ok(self.finish_run(attempt, seed, &targets, &annealer.timetable, stats.best))
    }

    fn finish_run(
        &self,
        attempt: usize,
        seed: u64,
        targets: &WeekTargets,
        tt: &Timetable,
        cost: Cost,
    ) -> RunResult {
        let model = self.model.as_ref();
        let report = verifier::verify(model, tt);

        let inconsistencies: Vec<String> = report
            .enforced_violations()
            .map(|(category, v)| format!("{}: {}", category, v.message))
            .collect();
        for msg in &inconsistencies {
            error!("Verification inconsistency in attempt #{}: {}", attempt, msg);
        }

        info!(
            "Attempt #{} feasible: score {:.2}%, {} idle periods",
            attempt, report.global_score, report.idle_periods
        );

        RunResult {
            attempt,
            seed,
            week_targets: projector::project_targets(model, targets),
            timetable: tt.to_document(model),
            schedule: projector::project(model, tt),
            score: report.global_score,
            objective: ObjectiveBreakdown {
                hard: cost.hard,
                soft: cost.soft,
                energy: cost.energy(&self.config.weights),
                idle_periods: report.idle_periods,
            },
            report,
            inconsistencies,
        }
    }

    fn report_progress(
        &self,
        ctx: &RunContext,
        progress: &Mutex<ProgressState>,
        start: Instant,
        attempt: usize,
        total: usize,
        result: &TfResult<RunResult>,
    ) {
        let outcome = match result {
            Ok(run) => AttemptOutcome::Feasible { score: run.score },
            Err(TimeForgeError::InfeasibleAttempt {
                hard_violations, ..
            }) => AttemptOutcome::Infeasible {
                hard_violations: *hard_violations,
            },
            Err(_) => AttemptOutcome::Skipped,
        };

        let mut state = match progress.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.completed += 1;
        if let AttemptOutcome::Feasible { score } = outcome {
            if state.best_score.map_or(true, |b| score > b) {
                state.best_score = Some(score);
            }
        }

        let elapsed = start.elapsed();
        let per_attempt = elapsed.div_f64(state.completed as f64);
        let update = AttemptProgress {
            attempt,
            completed: state.completed,
            total,
            elapsed,
            estimated_remaining: per_attempt.mul_f64(total.saturating_sub(state.completed) as f64),
            best_score: state.best_score,
            outcome,
        };

        if let Some(cb) = &ctx.callback {
            if !cb.on_progress(&update) {
                info!("Cancellation requested after attempt #{}", attempt);
                ctx.cancel.store(true, Ordering::Relaxed);
            }
        }
    }
}
