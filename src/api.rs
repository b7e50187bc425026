//! Service facade for embedding the engine (CLI, desktop shell, server).

use crate::config::SolverConfig;
use crate::domain::Institution;
use crate::error::{TfResult, TimeForgeError};
use crate::model::{self, TimetableModel};
use crate::search::{Orchestrator, RunContext, SearchOutcome, Timetable, TimetableDocument};
use crate::verifier::{self, VerificationReport};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Shared state of a long-lived host: the model built from the last loaded
/// institution.
#[derive(Default)]
pub struct TimeForgeState {
    pub model: RwLock<Option<Arc<TimetableModel>>>,
}

impl TimeForgeState {
    fn current_model(&self) -> TfResult<Arc<TimetableModel>> {
        let guard = self
            .model
            .read()
            .map_err(|e| TimeForgeError::State(e.to_string()))?;
        guard.clone().ok_or_else(|| {
            TimeForgeError::State("No institution loaded. Load one first.".to_string())
        })
    }
}

/// Loads and resolves an institution document, then derives its model.
pub fn build_model<P: AsRef<Path>>(path: P) -> TfResult<Arc<TimetableModel>> {
    let path = path.as_ref();
    info!("Loading institution from {}", path.display());
    let institution = Institution::load_from_file(path)?;
    build_model_from(institution)
}

pub fn build_model_from(institution: Institution) -> TfResult<Arc<TimetableModel>> {
    let model = model::build(institution)?;
    info!(
        "Model ready: {} groups, {} demands, {} pools, {} sync clusters",
        model.group_count(),
        model.demands.len(),
        model.pools.len(),
        model.clusters.len()
    );
    Ok(Arc::new(model))
}

/// Service: load an institution into the shared state.
pub fn load_institution<P: AsRef<Path>>(state: &TimeForgeState, path: P) -> TfResult<String> {
    let model = build_model(path)?;
    let summary = format!(
        "Institution loaded: {} groups, {} teachers, {} rooms",
        model.institution.groups.len(),
        model.institution.teachers.len(),
        model.institution.rooms.len()
    );

    let mut guard = state
        .model
        .write()
        .map_err(|e| TimeForgeError::State(e.to_string()))?;
    *guard = Some(model);
    Ok(summary)
}

/// Service: run the configured attempts against the loaded institution.
pub fn solve(
    state: &TimeForgeState,
    config: SolverConfig,
    ctx: &RunContext,
) -> TfResult<SearchOutcome> {
    let model = state.current_model()?;
    Orchestrator::new(model, config).run(ctx)
}

/// Service: audit a previously produced timetable.
pub fn verify_timetable(
    state: &TimeForgeState,
    doc: &TimetableDocument,
) -> TfResult<VerificationReport> {
    let model = state.current_model()?;
    verify_document(&model, doc)
}

pub fn verify_document(model: &TimetableModel, doc: &TimetableDocument) -> TfResult<VerificationReport> {
    let tt = Timetable::from_document(doc, model)?;
    Ok(verifier::verify(model, &tt))
}

pub fn load_timetable<P: AsRef<Path>>(path: P) -> TfResult<TimetableDocument> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
