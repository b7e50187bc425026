use super::ids::{GroupId, LevelId, SubjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    #[default]
    Hard,
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CapSpan {
    #[default]
    Day,
    HalfDay,
}

/// How often "X immediately followed by Y" must happen per week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InclusionMode {
    /// Soft, moderate weight: shortfall below the count is penalized.
    AtLeast(u8),
    /// Hard: every X must be immediately followed by Y.
    Always,
    /// Soft, weak weight: occurrences above the count are penalized.
    AtMost(u8),
}

/// A resolved institutional rule. Targets are always explicit base classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ConstraintRule {
    DailyCap {
        /// Empty means every subject.
        subjects: Vec<SubjectId>,
        targets: Vec<GroupId>,
        max: u8,
        span: CapSpan,
        strength: Strength,
    },
    Exclusion {
        first: SubjectId,
        then: SubjectId,
        targets: Vec<GroupId>,
        strength: Strength,
    },
    Inclusion {
        first: SubjectId,
        then: SubjectId,
        targets: Vec<GroupId>,
        mode: InclusionMode,
    },
    FixedSlot {
        subjects: Vec<SubjectId>,
        targets: Vec<GroupId>,
        /// Cell indices of the window, sorted.
        window: Vec<usize>,
        count: u8,
    },
    LevelSync {
        level: LevelId,
        subject: SubjectId,
    },
}

impl ConstraintRule {
    pub fn targets(&self) -> &[GroupId] {
        match self {
            ConstraintRule::DailyCap { targets, .. }
            | ConstraintRule::Exclusion { targets, .. }
            | ConstraintRule::Inclusion { targets, .. }
            | ConstraintRule::FixedSlot { targets, .. } => targets,
            ConstraintRule::LevelSync { .. } => &[],
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ConstraintRule::DailyCap { .. } => "daily_cap",
            ConstraintRule::Exclusion { .. } => "exclusion",
            ConstraintRule::Inclusion { .. } => "inclusion",
            ConstraintRule::FixedSlot { .. } => "fixed_slot",
            ConstraintRule::LevelSync { .. } => "level_sync",
        }
    }
}
