use super::{Demand, DemandId};
use crate::domain::{EquityScope, Institution, LevelId, SubjectId, TeacherId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Interchangeable teachers sharing every session of their demands. Within a
/// pool the two-week session counts of two teachers differ by at most one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pool {
    pub subject: SubjectId,
    /// `None` for school-wide pools.
    pub level: Option<LevelId>,
    pub teachers: Vec<TeacherId>,
    pub demands: Vec<DemandId>,
    pub total_sessions: u32,
}

impl Pool {
    /// Per-teacher two-week quotas. The `total % k` extra sessions go to the
    /// first teachers of `order`.
    pub fn quotas(&self, order: &[usize]) -> Vec<u32> {
        let k = self.teachers.len() as u32;
        let base = self.total_sessions / k;
        let extra = (self.total_sessions % k) as usize;
        let mut quotas = vec![base; self.teachers.len()];
        for &i in order.iter().take(extra) {
            quotas[i] += 1;
        }
        quotas
    }
}

/// Groups demands by (subject, teacher set[, level]) and links each demand
/// to its pool.
pub fn build(institution: &Institution, demands: &mut [Demand]) -> Vec<Pool> {
    let mut keyed: BTreeMap<(SubjectId, Vec<TeacherId>, Option<LevelId>), usize> = BTreeMap::new();
    let mut pools: Vec<Pool> = Vec::new();

    for (i, d) in demands.iter_mut().enumerate() {
        let teachers = institution.teachers_for(d.subject, d.level).to_vec();
        if teachers.is_empty() {
            continue;
        }
        let mut sorted = teachers.clone();
        sorted.sort_unstable();
        let level = match institution.subjects[d.subject.index()].equity_scope {
            EquityScope::Level => Some(d.level),
            EquityScope::School => None,
        };
        let idx = *keyed.entry((d.subject, sorted, level)).or_insert_with(|| {
            pools.push(Pool {
                subject: d.subject,
                level,
                teachers,
                demands: Vec::new(),
                total_sessions: 0,
            });
            pools.len() - 1
        });
        pools[idx].demands.push(DemandId::from_index(i));
        pools[idx].total_sessions += d.two_week_total;
        d.pool = Some(idx);
    }

    warn_weekly_caps(institution, &pools);
    pools
}

/// Logs teachers whose worst-case quota already exceeds their weekly cap.
fn warn_weekly_caps(institution: &Institution, pools: &[Pool]) {
    let mut worst = vec![0u32; institution.teachers.len()];
    for pool in pools {
        let k = pool.teachers.len() as u32;
        let ceil = pool.total_sessions.div_ceil(k);
        for t in &pool.teachers {
            worst[t.index()] += ceil;
        }
    }
    for (i, teacher) in institution.teachers.iter().enumerate() {
        if let Some(max) = teacher.max_weekly_hours {
            let hours = worst[i] as f64;
            if hours > max {
                warn!(
                    "Teacher '{}' may receive {:.1} weekly hours, above the cap of {:.1}",
                    teacher.name, hours, max
                );
            }
        }
    }
}
