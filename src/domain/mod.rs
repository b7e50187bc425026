pub mod calendar;
pub mod document;
pub mod entities;
pub mod ids;
pub mod loader;
pub mod rules;

pub use self::calendar::{Calendar, HalfDay};
pub use self::document::{InstitutionDocument, TeacherBinding};
pub use self::entities::*;
pub use self::ids::*;
pub use self::rules::{CapSpan, ConstraintRule, InclusionMode, Strength};

use crate::error::TfResult;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// The normalized, id-keyed institution. Every name reference has been
/// resolved; nothing downstream looks entities up by string.
#[derive(Debug, Clone)]
pub struct Institution {
    pub calendar: Calendar,
    pub levels: Vec<Level>,
    pub subjects: Vec<Subject>,
    pub families: Vec<Family>,
    pub groups: Vec<TeachingGroup>,
    pub teachers: Vec<Teacher>,
    pub rooms: Vec<Room>,
    /// Uniform resolution of every `TeacherBinding`.
    pub bindings: BTreeMap<(SubjectId, LevelId), Vec<TeacherId>>,
    pub rules: Vec<ConstraintRule>,
    pub cafeteria: Option<CafeteriaSettings>,
    pub default_daily_cap: Option<u8>,
}

impl Institution {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> TfResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> TfResult<Self> {
        let doc: InstitutionDocument = serde_json::from_str(content)?;
        loader::resolve(doc)
    }

    pub fn group(&self, id: GroupId) -> &TeachingGroup {
        &self.groups[id.index()]
    }

    pub fn group_ids(&self) -> impl Iterator<Item = GroupId> + '_ {
        (0..self.groups.len()).map(GroupId::from_index)
    }

    pub fn base_classes(&self) -> impl Iterator<Item = GroupId> + '_ {
        self.group_ids().filter(|g| self.group(*g).is_base())
    }

    pub fn base_classes_of_level(&self, level: LevelId) -> Vec<GroupId> {
        self.base_classes()
            .filter(|g| self.group(*g).level == level)
            .collect()
    }

    /// Sub-groups having `parent` among their parents.
    pub fn children_of(&self, parent: GroupId) -> Vec<GroupId> {
        self.group_ids()
            .filter(|g| self.group(*g).parents().contains(&parent))
            .collect()
    }

    pub fn find_group(&self, name: &str) -> Option<GroupId> {
        self.groups
            .iter()
            .position(|g| g.name == name)
            .map(GroupId::from_index)
    }

    pub fn find_subject(&self, name: &str) -> Option<SubjectId> {
        self.subjects
            .iter()
            .position(|s| s.name == name)
            .map(SubjectId::from_index)
    }

    pub fn find_teacher(&self, name: &str) -> Option<TeacherId> {
        self.teachers
            .iter()
            .position(|t| t.name == name)
            .map(TeacherId::from_index)
    }

    pub fn find_room(&self, name: &str) -> Option<RoomId> {
        self.rooms
            .iter()
            .position(|r| r.name == name)
            .map(RoomId::from_index)
    }

    pub fn find_level(&self, name: &str) -> Option<LevelId> {
        self.levels
            .iter()
            .position(|l| l.name == name)
            .map(LevelId::from_index)
    }

    pub fn teachers_for(&self, subject: SubjectId, level: LevelId) -> &[TeacherId] {
        self.bindings
            .get(&(subject, level))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}
