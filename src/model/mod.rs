//! The immutable constraint model shared by every attempt.

pub mod builder;
pub mod cafeteria;
pub mod pools;
pub mod volume;

pub use self::builder::build;
pub use self::cafeteria::{CafeteriaDay, CafeteriaPlan};
pub use self::pools::Pool;
pub use self::volume::{SplitKey, WeekTargets};

use crate::domain::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DemandId(pub u32);

impl DemandId {
    #[inline(always)]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn from_index(idx: usize) -> Self {
        DemandId(idx as u32)
    }
}

/// Every session a group must hold for one subject over the two weeks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Demand {
    pub group: GroupId,
    pub subject: SubjectId,
    pub level: LevelId,
    pub two_week_total: u32,
    /// Index into `TimetableModel::pools`; `None` when nobody teaches it.
    pub pool: Option<usize>,
    /// Candidate rooms by capacity and affinity; empty when the institution
    /// declares no rooms.
    pub rooms: Vec<RoomId>,
    pub cluster: Option<usize>,
    pub split_key: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterKind {
    SubGroup,
    LevelSync,
}

/// Demands whose sessions always occupy the same cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncCluster {
    pub label: String,
    pub kind: ClusterKind,
    pub level: LevelId,
    pub members: Vec<DemandId>,
}

#[derive(Debug, Clone)]
pub struct CapRule {
    /// Index into `Institution::rules`; `None` for the implicit default cap.
    pub rule: Option<usize>,
    /// Empty means every subject.
    pub subjects: Vec<SubjectId>,
    pub max: u8,
    pub span: CapSpan,
    pub strength: Strength,
}

impl CapRule {
    pub fn covers(&self, subject: SubjectId) -> bool {
        self.subjects.is_empty() || self.subjects.contains(&subject)
    }
}

#[derive(Debug, Clone)]
pub struct ExclusionRule {
    pub rule: usize,
    pub first: SubjectId,
    pub then: SubjectId,
    pub strength: Strength,
}

#[derive(Debug, Clone)]
pub struct InclusionRule {
    pub rule: usize,
    pub first: SubjectId,
    pub then: SubjectId,
    pub mode: InclusionMode,
}

#[derive(Debug, Clone)]
pub struct FixedSlotRule {
    pub rule: usize,
    pub subjects: Vec<SubjectId>,
    pub window: Vec<usize>,
    pub count: u8,
}

/// Rules evaluated on one base class's merged view.
#[derive(Debug, Clone, Default)]
pub struct ClassRules {
    pub caps: Vec<CapRule>,
    pub exclusions: Vec<ExclusionRule>,
    pub inclusions: Vec<InclusionRule>,
    pub fixed: Vec<FixedSlotRule>,
}

impl ClassRules {
    /// Whether any rule needs a whole week to be evaluated.
    pub fn has_week_terms(&self) -> bool {
        !self.fixed.is_empty()
            || self
                .inclusions
                .iter()
                .any(|r| !matches!(r.mode, InclusionMode::Always))
    }
}

#[derive(Debug, Clone)]
pub struct GroupModel {
    /// Calendar blocking plus the alternate lunch when shifted.
    pub blocked: CellMask,
    pub demands: Vec<DemandId>,
    /// Base classes whose day rows include this group's sessions.
    pub row_classes: Vec<GroupId>,
    pub children: Vec<GroupId>,
    pub rules: ClassRules,
}

#[derive(Debug, Clone)]
pub struct TimetableModel {
    pub institution: Institution,
    pub demands: Vec<Demand>,
    pub groups: Vec<GroupModel>,
    pub pools: Vec<Pool>,
    pub clusters: Vec<SyncCluster>,
    pub split_keys: Vec<SplitKey>,
    pub level_synced: BTreeSet<(LevelId, SubjectId)>,
    pub cafeteria: CafeteriaPlan,
}

impl TimetableModel {
    #[inline(always)]
    pub fn calendar(&self) -> &Calendar {
        &self.institution.calendar
    }

    #[inline(always)]
    pub fn cell_count(&self) -> usize {
        self.institution.calendar.cell_count()
    }

    #[inline(always)]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    #[inline(always)]
    pub fn demand(&self, id: DemandId) -> &Demand {
        &self.demands[id.index()]
    }

    #[inline(always)]
    pub fn is_blocked(&self, group: GroupId, cell: usize) -> bool {
        self.groups[group.index()].blocked.contains(cell)
    }

    /// At most one base class of `level` may hold `subject` at a time.
    pub fn is_level_exclusive(&self, level: LevelId, subject: SubjectId) -> bool {
        !self.institution.subjects[subject.index()].parallel_track
            && !self.level_synced.contains(&(level, subject))
    }

    pub fn pool_teachers(&self, demand: DemandId) -> &[TeacherId] {
        match self.demand(demand).pool {
            Some(p) => &self.pools[p].teachers,
            None => &[],
        }
    }

    /// The candidate room a teacher prefers for this demand, if any.
    pub fn preferred_room(&self, demand: DemandId, teacher: TeacherId) -> Option<RoomId> {
        let room = self.institution.teachers[teacher.index()].preferred_room?;
        self.demand(demand).rooms.contains(&room).then_some(room)
    }

    pub fn demand_label(&self, demand: DemandId) -> String {
        let d = self.demand(demand);
        format!(
            "{}/{}",
            self.institution.group(d.group).name,
            self.institution.subjects[d.subject.index()].name
        )
    }
}
