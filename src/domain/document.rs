//! Serde shapes of the institution document. These are name-keyed and loose;
//! `loader` resolves them into the id-keyed `Institution`.

use super::entities::{CafeteriaPriority, EquityScope, FamilyMode};
use super::rules::{CapSpan, Strength};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstitutionDocument {
    pub calendar: CalendarDocument,
    pub levels: Vec<LevelDocument>,
    #[serde(default)]
    pub subjects: Vec<SubjectDocument>,
    pub groups: Vec<GroupDocument>,
    #[serde(default)]
    pub teachers: Vec<TeacherDocument>,
    #[serde(default)]
    pub rooms: Vec<RoomDocument>,
    #[serde(default)]
    pub rules: Vec<RuleDocument>,
    #[serde(default)]
    pub cafeteria: Option<CafeteriaDocument>,
    #[serde(default = "default_daily_cap")]
    pub default_daily_cap: Option<u8>,
}

fn default_daily_cap() -> Option<u8> {
    Some(crate::consts::DEFAULT_DAILY_CAP)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarDocument {
    pub days: Vec<String>,
    #[serde(default)]
    pub short_days: Vec<String>,
    pub periods: Vec<String>,
    pub lunch_period: String,
    #[serde(default)]
    pub alternate_lunch_period: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelDocument {
    pub name: String,
    pub hours: BTreeMap<String, f64>,
    #[serde(default)]
    pub bag_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub bag_ceiling: Option<f64>,
}

/// Who teaches a subject. Accepts a bare name, a list of interchangeable
/// names, or a per-level map of either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TeacherBinding {
    Single(String),
    Pool(Vec<String>),
    PerLevel(BTreeMap<String, TeacherBinding>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectDocument {
    pub name: String,
    #[serde(default)]
    pub teachers: Option<TeacherBinding>,
    #[serde(default)]
    pub equity_scope: EquityScope,
    #[serde(default)]
    pub parallel_track: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDocument {
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
    pub size: u32,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub family_mode: Option<FamilyMode>,
    #[serde(default)]
    pub sync_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowDocument {
    pub day: String,
    /// Empty means the whole day.
    #[serde(default)]
    pub periods: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherDocument {
    pub name: String,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub levels: Vec<String>,
    #[serde(default)]
    pub max_weekly_hours: Option<f64>,
    #[serde(default)]
    pub preferred_room: Option<String>,
    #[serde(default)]
    pub unavailable: Vec<WindowDocument>,
    #[serde(default)]
    pub soft_unavailable: Vec<WindowDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDocument {
    pub name: String,
    pub capacity: u32,
    #[serde(default)]
    pub subjects: Vec<String>,
    #[serde(default)]
    pub teachers: Vec<String>,
    #[serde(default)]
    pub unavailable: Vec<WindowDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CafeteriaDocument {
    pub capacity: u32,
    pub boarding_ratio: f64,
    #[serde(default)]
    pub priority: CafeteriaPriority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionKind {
    AtLeast,
    Always,
    AtMost,
}

/// Rule entries, tagged by `kind`. `targets` name classes or levels; an empty
/// list targets every base class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleDocument {
    DailyCap {
        #[serde(default)]
        subjects: Vec<String>,
        #[serde(default)]
        targets: Vec<String>,
        max: u8,
        #[serde(default)]
        span: CapSpan,
        #[serde(default)]
        strength: Strength,
    },
    Exclusion {
        first: String,
        then: String,
        #[serde(default)]
        targets: Vec<String>,
        #[serde(default)]
        strength: Strength,
    },
    Inclusion {
        first: String,
        then: String,
        #[serde(default)]
        targets: Vec<String>,
        mode: InclusionKind,
        #[serde(default)]
        count: Option<u8>,
    },
    FixedSlot {
        subjects: Vec<String>,
        #[serde(default)]
        targets: Vec<String>,
        window: Vec<WindowDocument>,
        count: u8,
    },
    LevelSync {
        level: String,
        subject: String,
    },
}
