#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use timeforge::config::{SearchParams, SolverConfig};
use timeforge::domain::document::{
    CafeteriaDocument, CalendarDocument, GroupDocument, InstitutionDocument, LevelDocument,
    RoomDocument, RuleDocument, SubjectDocument, TeacherDocument, WindowDocument,
};
use timeforge::domain::{loader, CafeteriaPriority, EquityScope, Institution, TeacherBinding};
use timeforge::model::{self, TimetableModel};
use timeforge::search::{Orchestrator, RunContext, RunResult, SearchOutcome, Timetable};

pub const DAYS: [&str; 5] = ["Mon", "Tue", "Wed", "Thu", "Fri"];
pub const PERIODS: [&str; 8] = [
    "08:00", "09:00", "10:00", "11:00", "12:00", "13:00", "14:00", "15:00",
];

/// Builder over the institution document to keep fixtures short.
pub struct InstitutionBuilder {
    doc: InstitutionDocument,
}

impl InstitutionBuilder {
    /// Five days of eight periods, lunch at 12:00, Wednesday afternoon off.
    pub fn new() -> Self {
        Self {
            doc: InstitutionDocument {
                calendar: CalendarDocument {
                    days: DAYS.iter().map(|d| d.to_string()).collect(),
                    short_days: vec!["Wed".to_string()],
                    periods: PERIODS.iter().map(|p| p.to_string()).collect(),
                    lunch_period: "12:00".to_string(),
                    alternate_lunch_period: None,
                },
                levels: Vec::new(),
                subjects: Vec::new(),
                groups: Vec::new(),
                teachers: Vec::new(),
                rooms: Vec::new(),
                rules: Vec::new(),
                cafeteria: None,
                default_daily_cap: Some(2),
            },
        }
    }

    pub fn alternate_lunch(mut self, period: &str) -> Self {
        self.doc.calendar.alternate_lunch_period = Some(period.to_string());
        self
    }

    pub fn no_short_days(mut self) -> Self {
        self.doc.calendar.short_days.clear();
        self
    }

    pub fn level(mut self, name: &str, hours: &[(&str, f64)]) -> Self {
        self.doc.levels.push(LevelDocument {
            name: name.to_string(),
            hours: hours.iter().map(|(s, h)| (s.to_string(), *h)).collect(),
            bag_weights: BTreeMap::new(),
            bag_ceiling: None,
        });
        self
    }

    pub fn bag(mut self, level: &str, weights: &[(&str, f64)], ceiling: f64) -> Self {
        if let Some(l) = self.doc.levels.iter_mut().find(|l| l.name == level) {
            l.bag_weights = weights.iter().map(|(s, w)| (s.to_string(), *w)).collect();
            l.bag_ceiling = Some(ceiling);
        }
        self
    }

    pub fn subject(mut self, name: &str, teachers: Option<TeacherBinding>) -> Self {
        self.doc.subjects.push(SubjectDocument {
            name: name.to_string(),
            teachers,
            equity_scope: EquityScope::Level,
            parallel_track: false,
        });
        self
    }

    pub fn subject_doc(mut self, subject: SubjectDocument) -> Self {
        self.doc.subjects.push(subject);
        self
    }

    pub fn class(mut self, name: &str, level: &str, size: u32) -> Self {
        self.doc.groups.push(GroupDocument {
            name: name.to_string(),
            level: Some(level.to_string()),
            size,
            parents: Vec::new(),
            subject: None,
            family: None,
            family_mode: None,
            sync_key: None,
        });
        self
    }

    pub fn sub_group(mut self, name: &str, parents: &[&str], subject: &str, size: u32) -> Self {
        self.doc.groups.push(GroupDocument {
            name: name.to_string(),
            level: None,
            size,
            parents: parents.iter().map(|p| p.to_string()).collect(),
            subject: Some(subject.to_string()),
            family: None,
            family_mode: None,
            sync_key: None,
        });
        self
    }

    pub fn group_doc(mut self, group: GroupDocument) -> Self {
        self.doc.groups.push(group);
        self
    }

    /// Mutates the last declared group.
    pub fn with_sync_key(mut self, key: &str) -> Self {
        if let Some(g) = self.doc.groups.last_mut() {
            g.sync_key = Some(key.to_string());
        }
        self
    }

    pub fn teacher(mut self, name: &str) -> Self {
        self.doc.teachers.push(teacher_doc(name));
        self
    }

    pub fn teacher_doc(mut self, teacher: TeacherDocument) -> Self {
        self.doc.teachers.push(teacher);
        self
    }

    pub fn room(mut self, name: &str, capacity: u32) -> Self {
        self.doc.rooms.push(RoomDocument {
            name: name.to_string(),
            capacity,
            subjects: Vec::new(),
            teachers: Vec::new(),
            unavailable: Vec::new(),
        });
        self
    }

    pub fn room_doc(mut self, room: RoomDocument) -> Self {
        self.doc.rooms.push(room);
        self
    }

    pub fn rule(mut self, rule: RuleDocument) -> Self {
        self.doc.rules.push(rule);
        self
    }

    pub fn cafeteria(mut self, capacity: u32, boarding_ratio: f64, priority: CafeteriaPriority) -> Self {
        self.doc.cafeteria = Some(CafeteriaDocument {
            capacity,
            boarding_ratio,
            priority,
        });
        self
    }

    pub fn daily_cap(mut self, cap: Option<u8>) -> Self {
        self.doc.default_daily_cap = cap;
        self
    }

    pub fn document(self) -> InstitutionDocument {
        self.doc
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.doc).unwrap()
    }

    pub fn resolve(self) -> timeforge::TfResult<Institution> {
        loader::resolve(self.doc)
    }

    pub fn institution(self) -> Institution {
        self.resolve().expect("fixture should resolve")
    }

    pub fn model(self) -> Arc<TimetableModel> {
        Arc::new(model::build(self.institution()).expect("fixture should build"))
    }
}

pub fn teacher_doc(name: &str) -> TeacherDocument {
    TeacherDocument {
        name: name.to_string(),
        subjects: Vec::new(),
        levels: Vec::new(),
        max_weekly_hours: None,
        preferred_room: None,
        unavailable: Vec::new(),
        soft_unavailable: Vec::new(),
    }
}

pub fn window(day: &str, periods: &[&str]) -> WindowDocument {
    WindowDocument {
        day: day.to_string(),
        periods: periods.iter().map(|p| p.to_string()).collect(),
    }
}

pub fn single(name: &str) -> Option<TeacherBinding> {
    Some(TeacherBinding::Single(name.to_string()))
}

pub fn pool(names: &[&str]) -> Option<TeacherBinding> {
    Some(TeacherBinding::Pool(names.iter().map(|n| n.to_string()).collect()))
}

/// Two classes of one level with a shared math pool.
pub fn small_school() -> InstitutionBuilder {
    InstitutionBuilder::new()
        .level(
            "6e",
            &[("Math", 4.0), ("French", 4.5), ("English", 3.0), ("Art", 1.5)],
        )
        .subject("Math", pool(&["Curie", "Noether"]))
        .subject("French", single("Hugo"))
        .subject("English", single("Austen"))
        .subject("Art", single("Monet"))
        .class("6A", "6e", 24)
        .class("6B", "6e", 26)
        .teacher("Curie")
        .teacher("Noether")
        .teacher("Hugo")
        .teacher("Austen")
        .teacher("Monet")
        .room("R1", 30)
        .room("R2", 30)
        .room("R3", 30)
}

/// Small, fast search settings for tests.
pub fn quick_config(attempts: usize, seed: u64) -> SolverConfig {
    SolverConfig {
        search: SearchParams {
            attempts,
            search_steps: 30_000,
            search_patience: 5_000,
            threads: 2,
            seed: Some(seed),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn solve(model: &Arc<TimetableModel>, config: SolverConfig) -> SearchOutcome {
    Orchestrator::new(model.clone(), config)
        .run(&RunContext::default())
        .expect("search should find a feasible timetable")
}

pub fn timetable_of(model: &TimetableModel, run: &RunResult) -> Timetable {
    Timetable::from_document(&run.timetable, model).expect("timetable document should resolve")
}
