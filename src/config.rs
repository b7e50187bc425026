use crate::error::{TfResult, TimeForgeError};
use clap::{parser::ValueSource, ArgMatches, Args};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Args, Debug, Clone, Serialize, Deserialize, Default)]
pub struct SolverConfig {
    #[command(flatten)]
    #[serde(default)]
    pub search: SearchParams,
    #[command(flatten)]
    #[serde(default)]
    pub weights: PenaltyWeights,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Independent solver attempts; the best-scoring one is kept.
    #[arg(long, default_value_t = 8)]
    pub attempts: usize,
    #[arg(long, default_value_t = 200_000)]
    pub search_steps: usize,
    /// Steps without improvement (once feasible) before an attempt stops.
    #[arg(long, default_value_t = 50_000)]
    pub search_patience: usize,
    #[arg(long, default_value_t = 8.0)]
    pub temp_max: f64,
    #[arg(long, default_value_t = 0.05)]
    pub temp_min: f64,
    /// Worker threads, 0 = all cores.
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
    /// Base seed; attempt `i` uses `seed + i`. Random when absent.
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long, default_value_t = false)]
    pub keep_all_runs: bool,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            attempts: 8,
            search_steps: 200_000,
            search_patience: 50_000,
            temp_max: 8.0,
            temp_min: 0.05,
            threads: 0,
            seed: None,
            keep_all_runs: false,
        }
    }
}

impl SearchParams {
    pub fn validate(&self) -> TfResult<()> {
        if self.attempts == 0 {
            return Err(TimeForgeError::config("attempts must be at least 1"));
        }
        if !(self.temp_max > 0.0 && self.temp_min > 0.0 && self.temp_min <= self.temp_max) {
            return Err(TimeForgeError::config(format!(
                "invalid temperature range {}..{}",
                self.temp_min, self.temp_max
            )));
        }
        Ok(())
    }

    pub fn merge_from_cli(&mut self, cli_params: &SearchParams, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($field:ident) => {
                if matches.value_source(stringify!($field)) == Some(ValueSource::CommandLine) {
                    self.$field = cli_params.$field.clone();
                }
            };
        }

        update_if_present!(attempts);
        update_if_present!(search_steps);
        update_if_present!(search_patience);
        update_if_present!(temp_max);
        update_if_present!(temp_min);
        update_if_present!(threads);
        update_if_present!(seed);
        update_if_present!(keep_all_runs);
    }
}

/// Objective weights. Hard violations are scaled by `hard`, which must stay
/// well above any plausible sum of soft terms.
#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyWeights {
    #[arg(long, default_value_t = 1000.0)]
    pub hard: f64,

    // === OBJECTIVE ===
    #[arg(long, default_value_t = 1.0)]
    pub idle: f64,
    #[arg(long, default_value_t = 1.0)]
    pub preference: f64,
    #[arg(long, default_value_t = 0.5)]
    pub bag_excess: f64,
    #[arg(long, default_value_t = 0.5)]
    pub room_preference: f64,

    // === RULES ===
    #[arg(long, default_value_t = 3.0)]
    pub sequencing_moderate: f64,
    #[arg(long, default_value_t = 1.0)]
    pub sequencing_weak: f64,
    #[arg(long, default_value_t = 2.0)]
    pub soft_cap: f64,
    #[arg(long, default_value_t = 2.0)]
    pub soft_exclusion: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            hard: 1000.0,
            idle: 1.0,
            preference: 1.0,
            bag_excess: 0.5,
            room_preference: 0.5,
            sequencing_moderate: 3.0,
            sequencing_weak: 1.0,
            soft_cap: 2.0,
            soft_exclusion: 2.0,
        }
    }
}

impl PenaltyWeights {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> TfResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Copies every weight explicitly given on the command line over `self`.
    pub fn merge_from_cli(&mut self, cli_weights: &PenaltyWeights, matches: &ArgMatches) {
        macro_rules! update_if_present {
            ($field:ident) => {
                if matches.value_source(stringify!($field)) == Some(ValueSource::CommandLine) {
                    self.$field = cli_weights.$field;
                }
            };
        }

        update_if_present!(hard);
        update_if_present!(idle);
        update_if_present!(preference);
        update_if_present!(bag_excess);
        update_if_present!(room_preference);
        update_if_present!(sequencing_moderate);
        update_if_present!(sequencing_weak);
        update_if_present!(soft_cap);
        update_if_present!(soft_exclusion);
    }
}

impl SolverConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> TfResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn merge_from_cli(&mut self, cli: &SolverConfig, matches: &ArgMatches) {
        self.search.merge_from_cli(&cli.search, matches);
        self.weights.merge_from_cli(&cli.weights, matches);
    }
}
