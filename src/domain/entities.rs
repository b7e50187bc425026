use super::ids::{FamilyId, GroupId, LevelId, RoomId, SubjectId, TeacherId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    pub name: String,
    /// Weekly hours per subject, multiples of 0.5.
    pub hours: BTreeMap<SubjectId, f64>,
    pub bag_weights: BTreeMap<SubjectId, f64>,
    pub bag_ceiling: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EquityScope {
    #[default]
    Level,
    School,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub equity_scope: EquityScope,
    /// Recognized parallel language track: exempt from same-level exclusion.
    pub parallel_track: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FamilyMode {
    #[default]
    Exclusive,
    Parallel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Family {
    pub name: String,
    pub mode: FamilyMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubGroupInfo {
    pub parents: Vec<GroupId>,
    pub subject: SubjectId,
    pub family: Option<FamilyId>,
    pub sync_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GroupKind {
    Base,
    Sub(SubGroupInfo),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeachingGroup {
    pub name: String,
    pub level: LevelId,
    pub size: u32,
    pub kind: GroupKind,
}

impl TeachingGroup {
    pub fn is_base(&self) -> bool {
        matches!(self.kind, GroupKind::Base)
    }

    pub fn sub_info(&self) -> Option<&SubGroupInfo> {
        match &self.kind {
            GroupKind::Base => None,
            GroupKind::Sub(info) => Some(info),
        }
    }

    pub fn parents(&self) -> &[GroupId] {
        match &self.kind {
            GroupKind::Base => &[],
            GroupKind::Sub(info) => &info.parents,
        }
    }
}

/// Per-cell availability mask over the weekly grid (same for both weeks).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CellMask {
    cells: Vec<bool>,
}

impl CellMask {
    pub fn empty(cell_count: usize) -> Self {
        Self {
            cells: vec![false; cell_count],
        }
    }

    pub fn set(&mut self, cell: usize) {
        if let Some(c) = self.cells.get_mut(cell) {
            *c = true;
        }
    }

    #[inline(always)]
    pub fn contains(&self, cell: usize) -> bool {
        self.cells.get(cell).copied().unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        !self.cells.iter().any(|&c| c)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
    pub name: String,
    pub unavailable: CellMask,
    pub soft_unavailable: CellMask,
    pub max_weekly_hours: Option<f64>,
    pub preferred_room: Option<RoomId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoomAffinity {
    pub subjects: Vec<SubjectId>,
    pub teachers: Vec<TeacherId>,
}

impl RoomAffinity {
    pub fn is_general(&self) -> bool {
        self.subjects.is_empty() && self.teachers.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    pub capacity: u32,
    pub affinity: RoomAffinity,
    pub unavailable: CellMask,
}

impl Room {
    /// Whether this room may host `subject` for a group of `size` taught by
    /// one of `pool`.
    pub fn can_host(&self, subject: SubjectId, size: u32, pool: &[TeacherId]) -> bool {
        if self.capacity < size {
            return false;
        }
        self.affinity.is_general()
            || self.affinity.subjects.contains(&subject)
            || pool.iter().any(|t| self.affinity.teachers.contains(t))
    }

    /// Teacher-only affine rooms are restricted to their teachers.
    pub fn accepts_teacher(&self, subject: SubjectId, teacher: Option<TeacherId>) -> bool {
        if self.affinity.is_general() || self.affinity.subjects.contains(&subject) {
            return true;
        }
        teacher.is_some_and(|t| self.affinity.teachers.contains(&t))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CafeteriaPriority {
    #[default]
    Level,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CafeteriaSettings {
    pub capacity: u32,
    pub boarding_ratio: f64,
    pub priority: CafeteriaPriority,
}
