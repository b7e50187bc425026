//! Presentation-neutral views of a timetable: by group, by teacher and by
//! room, per week and fused over the A/B cycle.

use crate::domain::{GroupId, WeekVariant};
use crate::model::{DemandId, TimetableModel, WeekTargets};
use crate::search::timetable::{Session, Timetable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContent {
    pub subjects: Vec<String>,
    pub teachers: Vec<String>,
    pub rooms: Vec<String>,
    pub groups: Vec<String>,
}

impl SessionContent {
    fn push_unique(list: &mut Vec<String>, value: &str) {
        if !list.iter().any(|v| v == value) {
            list.push(value.to_string());
        }
    }

    fn add(&mut self, model: &TimetableModel, group: GroupId, s: &Session) {
        let inst = &model.institution;
        Self::push_unique(
            &mut self.subjects,
            &inst.subjects[model.demand(s.demand).subject.index()].name,
        );
        if let Some(t) = s.teacher {
            Self::push_unique(&mut self.teachers, &inst.teachers[t.index()].name);
        }
        if let Some(r) = s.room {
            Self::push_unique(&mut self.rooms, &inst.rooms[r.index()].name);
        }
        Self::push_unique(&mut self.groups, &inst.group(group).name);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusedCell {
    /// Identical in both weeks.
    Full(SessionContent),
    Split {
        a: Option<SessionContent>,
        b: Option<SessionContent>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodEntry<T> {
    pub period: String,
    pub content: Option<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayColumn<T> {
    pub day: String,
    pub periods: Vec<PeriodEntry<T>>,
}

pub type Grid<T> = Vec<DayColumn<T>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Views<T> {
    pub groups: BTreeMap<String, Grid<T>>,
    pub teachers: BTreeMap<String, Grid<T>>,
    pub rooms: BTreeMap<String, Grid<T>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleProjection {
    pub week_a: Views<SessionContent>,
    pub week_b: Views<SessionContent>,
    pub fused: Views<FusedCell>,
}

impl ScheduleProjection {
    pub fn week(&self, week: WeekVariant) -> &Views<SessionContent> {
        match week {
            WeekVariant::A => &self.week_a,
            WeekVariant::B => &self.week_b,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekTargetEntry {
    pub group: String,
    pub subject: String,
    pub week_a: u32,
    pub week_b: u32,
}

/// Entity key of a view.
#[derive(Clone, Copy)]
enum Axis {
    Group,
    Teacher,
    Room,
}

fn build_grid<T, F>(model: &TimetableModel, mut cell_content: F) -> Grid<T>
where
    F: FnMut(usize) -> Option<T>,
{
    let calendar = model.calendar();
    calendar
        .days
        .iter()
        .enumerate()
        .map(|(d, day)| DayColumn {
            day: day.clone(),
            periods: calendar
                .periods
                .iter()
                .enumerate()
                .map(|(p, period)| PeriodEntry {
                    period: period.clone(),
                    content: cell_content(calendar.cell(d, p)),
                })
                .collect(),
        })
        .collect()
}

fn content_at(
    model: &TimetableModel,
    tt: &Timetable,
    axis: Axis,
    entity: usize,
    week: WeekVariant,
    cell: usize,
) -> Option<SessionContent> {
    let inst = &model.institution;
    let mut content = SessionContent::default();
    let mut any = false;

    match axis {
        Axis::Group => {
            let g = GroupId::from_index(entity);
            if let Some(s) = tt.get(g, week, cell) {
                content.add(model, g, s);
                any = true;
            }
            for child in &model.groups[entity].children {
                if let Some(s) = tt.get(*child, week, cell) {
                    content.add(model, *child, s);
                    any = true;
                }
            }
        }
        Axis::Teacher | Axis::Room => {
            for g in inst.group_ids() {
                let Some(s) = tt.get(g, week, cell) else {
                    continue;
                };
                let hit = match axis {
                    Axis::Teacher => s.teacher.is_some_and(|t| t.index() == entity),
                    _ => s.room.is_some_and(|r| r.index() == entity),
                };
                if hit {
                    content.add(model, g, s);
                    any = true;
                }
            }
        }
    }

    any.then_some(content)
}

fn entity_names(model: &TimetableModel, axis: Axis) -> Vec<String> {
    let inst = &model.institution;
    match axis {
        Axis::Group => inst.groups.iter().map(|g| g.name.clone()).collect(),
        Axis::Teacher => inst.teachers.iter().map(|t| t.name.clone()).collect(),
        Axis::Room => inst.rooms.iter().map(|r| r.name.clone()).collect(),
    }
}

fn week_views(model: &TimetableModel, tt: &Timetable, week: WeekVariant) -> Views<SessionContent> {
    let view = |axis: Axis| -> BTreeMap<String, Grid<SessionContent>> {
        entity_names(model, axis)
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                (name, build_grid(model, |cell| content_at(model, tt, axis, i, week, cell)))
            })
            .collect()
    };
    Views {
        groups: view(Axis::Group),
        teachers: view(Axis::Teacher),
        rooms: view(Axis::Room),
    }
}

fn fuse_grid(a: &Grid<SessionContent>, b: &Grid<SessionContent>) -> Grid<FusedCell> {
    a.iter()
        .zip(b)
        .map(|(da, db)| DayColumn {
            day: da.day.clone(),
            periods: da
                .periods
                .iter()
                .zip(&db.periods)
                .map(|(pa, pb)| PeriodEntry {
                    period: pa.period.clone(),
                    content: fuse(pa.content.clone(), pb.content.clone()),
                })
                .collect(),
        })
        .collect()
}

pub fn fuse(a: Option<SessionContent>, b: Option<SessionContent>) -> Option<FusedCell> {
    match (a, b) {
        (None, None) => None,
        (Some(a), Some(b)) if a == b => Some(FusedCell::Full(a)),
        (a, b) => Some(FusedCell::Split { a, b }),
    }
}

fn fuse_views(a: &Views<SessionContent>, b: &Views<SessionContent>) -> Views<FusedCell> {
    let fuse_map = |ma: &BTreeMap<String, Grid<SessionContent>>,
                    mb: &BTreeMap<String, Grid<SessionContent>>|
     -> BTreeMap<String, Grid<FusedCell>> {
        ma.iter()
            .filter_map(|(name, ga)| mb.get(name).map(|gb| (name.clone(), fuse_grid(ga, gb))))
            .collect()
    };
    Views {
        groups: fuse_map(&a.groups, &b.groups),
        teachers: fuse_map(&a.teachers, &b.teachers),
        rooms: fuse_map(&a.rooms, &b.rooms),
    }
}

pub fn project(model: &TimetableModel, tt: &Timetable) -> ScheduleProjection {
    let week_a = week_views(model, tt, WeekVariant::A);
    let week_b = week_views(model, tt, WeekVariant::B);
    let fused = fuse_views(&week_a, &week_b);
    ScheduleProjection {
        week_a,
        week_b,
        fused,
    }
}

pub fn project_targets(model: &TimetableModel, targets: &WeekTargets) -> Vec<WeekTargetEntry> {
    let inst = &model.institution;
    model
        .demands
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let [week_a, week_b] = targets.pair(DemandId::from_index(i));
            WeekTargetEntry {
                group: inst.group(d.group).name.clone(),
                subject: inst.subjects[d.subject.index()].name.clone(),
                week_a,
                week_b,
            }
        })
        .collect()
}
