use super::{DemandId, TimetableModel};
use crate::consts::HALF_HOUR_EPSILON;
use crate::domain::{LevelId, WeekVariant};
use crate::error::{TfResult, TimeForgeError};
use serde::{Deserialize, Serialize};

/// Entities that must receive identical A/B targets: a `(level, subject)`
/// pair or a whole sync cluster.
#[derive(Debug, Clone)]
pub struct SplitKey {
    pub level: LevelId,
    pub two_week_total: u32,
}

/// Number of sessions per week variant for every demand of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekTargets {
    per_demand: Vec<[u32; 2]>,
}

/// Sessions over the two-week cycle for `hours` nominal weekly hours.
/// A + B carries the nominal hours; a trailing half hour adds one session to
/// one variant, so 5 gives 5 and 1.5 gives 2.
pub fn two_week_total(hours: f64) -> TfResult<u32> {
    let doubled = hours * 2.0;
    if hours < 0.0 || (doubled - doubled.round()).abs() > HALF_HOUR_EPSILON {
        return Err(TimeForgeError::config(format!(
            "{} weekly hours is not a multiple of half an hour",
            hours
        )));
    }
    Ok((doubled.round() as u32).div_ceil(2))
}

impl WeekTargets {
    /// Splits every two-week total as evenly as possible. Odd remainders
    /// alternate between A and B inside each level, in an order drawn from
    /// `rng`, so both weeks of a level carry the same load within one session.
    pub fn split(model: &TimetableModel, rng: &mut fastrand::Rng) -> Self {
        let mut extra_in_a = vec![false; model.split_keys.len()];

        for level in 0..model.institution.levels.len() {
            let level = LevelId::from_index(level);
            let mut odd: Vec<usize> = model
                .split_keys
                .iter()
                .enumerate()
                .filter(|(_, k)| k.level == level && k.two_week_total % 2 == 1)
                .map(|(i, _)| i)
                .collect();
            rng.shuffle(&mut odd);
            let start_with_a = rng.bool();
            for (n, key) in odd.into_iter().enumerate() {
                extra_in_a[key] = (n % 2 == 0) == start_with_a;
            }
        }

        let per_demand = model
            .demands
            .iter()
            .map(|d| {
                let key = &model.split_keys[d.split_key];
                let half = key.two_week_total / 2;
                let a = if key.two_week_total % 2 == 1 && extra_in_a[d.split_key] {
                    half + 1
                } else {
                    half
                };
                [a, key.two_week_total - a]
            })
            .collect();

        Self { per_demand }
    }

    #[inline(always)]
    pub fn get(&self, demand: DemandId, week: WeekVariant) -> u32 {
        self.per_demand[demand.index()][week.index()]
    }

    pub fn pair(&self, demand: DemandId) -> [u32; 2] {
        self.per_demand[demand.index()]
    }

    pub fn len(&self) -> usize {
        self.per_demand.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_demand.is_empty()
    }
}
