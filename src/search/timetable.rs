use crate::domain::{GroupId, RoomId, TeacherId, WeekVariant};
use crate::error::{TfResult, TimeForgeError};
use crate::model::{DemandId, TimetableModel};
use serde::{Deserialize, Serialize};

/// One taught period: the demand it serves plus the resources it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub demand: DemandId,
    pub teacher: Option<TeacherId>,
    pub room: Option<RoomId>,
}

/// The decision surface: an optional session per (group, week, cell).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timetable {
    cell_count: usize,
    group_count: usize,
    cells: Vec<Option<Session>>,
}

impl Timetable {
    pub fn new(group_count: usize, cell_count: usize) -> Self {
        Self {
            cell_count,
            group_count,
            cells: vec![None; group_count * 2 * cell_count],
        }
    }

    pub fn empty_for(model: &TimetableModel) -> Self {
        Self::new(model.group_count(), model.cell_count())
    }

    #[inline(always)]
    fn idx(&self, group: GroupId, week: WeekVariant, cell: usize) -> usize {
        (group.index() * 2 + week.index()) * self.cell_count + cell
    }

    #[inline(always)]
    pub fn get(&self, group: GroupId, week: WeekVariant, cell: usize) -> Option<&Session> {
        self.cells[self.idx(group, week, cell)].as_ref()
    }

    #[inline(always)]
    pub fn get_mut(&mut self, group: GroupId, week: WeekVariant, cell: usize) -> Option<&mut Session> {
        let i = self.idx(group, week, cell);
        self.cells[i].as_mut()
    }

    pub fn set(&mut self, group: GroupId, week: WeekVariant, cell: usize, session: Option<Session>) {
        let i = self.idx(group, week, cell);
        self.cells[i] = session;
    }

    pub fn swap_cells(&mut self, group: GroupId, week: WeekVariant, a: usize, b: usize) {
        let (ia, ib) = (self.idx(group, week, a), self.idx(group, week, b));
        self.cells.swap(ia, ib);
    }

    /// All cells of one group in one week.
    pub fn row(&self, group: GroupId, week: WeekVariant) -> &[Option<Session>] {
        let start = self.idx(group, week, 0);
        &self.cells[start..start + self.cell_count]
    }

    pub fn cell_count(&self) -> usize {
        self.cell_count
    }

    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// Every placed session with its position.
    pub fn sessions(&self) -> impl Iterator<Item = (GroupId, WeekVariant, usize, &Session)> + '_ {
        self.cells.iter().enumerate().filter_map(move |(i, s)| {
            let s = s.as_ref()?;
            let cell = i % self.cell_count;
            let gw = i / self.cell_count;
            Some((
                GroupId::from_index(gw / 2),
                WeekVariant::from_index(gw % 2),
                cell,
                s,
            ))
        })
    }

    pub fn to_document(&self, model: &TimetableModel) -> TimetableDocument {
        let inst = &model.institution;
        let calendar = &inst.calendar;
        let assignments = self
            .sessions()
            .map(|(g, week, cell, s)| {
                let slot = calendar.slot_of(cell);
                AssignmentEntry {
                    group: inst.group(g).name.clone(),
                    week,
                    day: calendar.days[slot.day as usize].clone(),
                    period: calendar.periods[slot.period as usize].clone(),
                    subject: inst.subjects[model.demand(s.demand).subject.index()].name.clone(),
                    teacher: s.teacher.map(|t| inst.teachers[t.index()].name.clone()),
                    room: s.room.map(|r| inst.rooms[r.index()].name.clone()),
                }
            })
            .collect();
        TimetableDocument { assignments }
    }

    /// Rebuilds a timetable from its named form. Every name must resolve
    /// against `model` and every (class, subject) pair must be a demand.
    pub fn from_document(doc: &TimetableDocument, model: &TimetableModel) -> TfResult<Self> {
        let inst = &model.institution;
        let calendar = &inst.calendar;
        let mut tt = Timetable::empty_for(model);

        for entry in &doc.assignments {
            let context = format!("assignment {}/{}", entry.group, entry.subject);
            let unknown = |what: &str, name: &str| {
                TimeForgeError::config(format!("{}: unknown {} '{}'", context, what, name))
            };

            let group = inst
                .find_group(&entry.group)
                .ok_or_else(|| unknown("class", &entry.group))?;
            let subject = inst
                .find_subject(&entry.subject)
                .ok_or_else(|| unknown("subject", &entry.subject))?;
            let day = calendar
                .days
                .iter()
                .position(|d| d == &entry.day)
                .ok_or_else(|| unknown("day", &entry.day))?;
            let period = calendar
                .periods
                .iter()
                .position(|p| p == &entry.period)
                .ok_or_else(|| unknown("period", &entry.period))?;
            let teacher = match &entry.teacher {
                Some(name) => Some(inst.find_teacher(name).ok_or_else(|| unknown("teacher", name))?),
                None => None,
            };
            let room = match &entry.room {
                Some(name) => Some(inst.find_room(name).ok_or_else(|| unknown("room", name))?),
                None => None,
            };

            let demand = model.groups[group.index()]
                .demands
                .iter()
                .copied()
                .find(|d| model.demand(*d).subject == subject)
                .ok_or_else(|| {
                    TimeForgeError::config(format!("{}: class does not take this subject", context))
                })?;

            let cell = calendar.cell(day, period);
            if tt.get(group, entry.week, cell).is_some() {
                return Err(TimeForgeError::config(format!(
                    "{}: week {} {} holds two sessions",
                    context,
                    entry.week,
                    calendar.label(cell)
                )));
            }
            tt.set(
                group,
                entry.week,
                cell,
                Some(Session {
                    demand,
                    teacher,
                    room,
                }),
            );
        }
        Ok(tt)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentEntry {
    pub group: String,
    pub week: WeekVariant,
    pub day: String,
    pub period: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
}

/// The raw assignment by name; `timeforge verify` re-audits it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimetableDocument {
    pub assignments: Vec<AssignmentEntry>,
}
