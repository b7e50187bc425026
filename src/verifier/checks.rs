//! Category checks. These recompute everything from the timetable and the
//! model and share no code with the search energy.

use super::report::{Category, CategoryReport, Violation};
use crate::consts::BAG_TOLERANCE;
use crate::domain::*;
use crate::model::{ClusterKind, DemandId, TimetableModel};
use crate::search::timetable::{Session, Timetable};
use std::collections::BTreeMap;

pub struct Audit<'a> {
    pub model: &'a TimetableModel,
    pub tt: &'a Timetable,
    reports: Vec<CategoryReport>,
}

impl<'a> Audit<'a> {
    pub fn new(model: &'a TimetableModel, tt: &'a Timetable, reports: Vec<CategoryReport>) -> Self {
        Self { model, tt, reports }
    }

    pub fn finish(self) -> Vec<CategoryReport> {
        self.reports
    }

    fn record<F: FnOnce() -> String>(&mut self, category: Category, ok: bool, enforced: bool, message: F) {
        let Some(report) = self.reports.iter_mut().find(|r| r.category == category) else {
            return;
        };
        report.checked += 1;
        if ok {
            report.satisfied += 1;
        } else {
            report.violations.push(Violation {
                message: message(),
                enforced,
            });
        }
    }

    fn inst(&self) -> &'a Institution {
        &self.model.institution
    }

    fn at(&self, week: WeekVariant, cell: usize) -> String {
        format!("week {} {}", week, self.inst().calendar.label(cell))
    }

    fn subject_of(&self, s: &Session) -> SubjectId {
        self.model.demand(s.demand).subject
    }

    fn subject_name(&self, s: SubjectId) -> &'a str {
        &self.inst().subjects[s.index()].name
    }

    /// Subjects present at a cell for a class: own plus sub-group sessions.
    fn merged(&self, class: GroupId, week: WeekVariant, cell: usize) -> Vec<SubjectId> {
        let mut out = Vec::new();
        if let Some(s) = self.tt.get(class, week, cell) {
            out.push(self.subject_of(s));
        }
        for child in self.inst().children_of(class) {
            if let Some(s) = self.tt.get(child, week, cell) {
                let subject = self.subject_of(s);
                if !out.contains(&subject) {
                    out.push(subject);
                }
            }
        }
        out
    }

    fn merged_day(&self, class: GroupId, week: WeekVariant, day: usize) -> Vec<Vec<SubjectId>> {
        let calendar = &self.inst().calendar;
        (0..calendar.period_count())
            .map(|p| self.merged(class, week, calendar.cell(day, p)))
            .collect()
    }
}

pub fn volume(audit: &mut Audit) {
    let model = audit.model;
    for (i, d) in model.demands.iter().enumerate() {
        let mut counts = [0u32; 2];
        for week in WeekVariant::ALL {
            counts[week.index()] = audit
                .tt
                .row(d.group, week)
                .iter()
                .filter(|s| s.is_some_and(|s| s.demand.index() == i))
                .count() as u32;
        }
        let ok = counts[0] + counts[1] == d.two_week_total && counts[0].abs_diff(counts[1]) <= 1;
        audit.record(Category::Volume, ok, true, || {
            format!(
                "{}: {} + {} sessions in weeks A + B for a target of {}",
                model.demand_label(DemandId::from_index(i)),
                counts[0],
                counts[1],
                d.two_week_total
            )
        });
    }
}

pub fn availability(audit: &mut Audit) {
    let inst = audit.inst();
    let sessions: Vec<_> = audit.tt.sessions().map(|(g, w, c, s)| (g, w, c, *s)).collect();
    for (g, week, cell, s) in sessions {
        if let Some(t) = s.teacher {
            let teacher = &inst.teachers[t.index()];
            let ok = !teacher.unavailable.contains(cell);
            let at = audit.at(week, cell);
            audit.record(Category::TeacherAvailability, ok, true, || {
                format!("{} teaches {} while unavailable ({})", teacher.name, audit_name(inst, g), at)
            });
            if !teacher.soft_unavailable.is_empty() {
                let ok = !teacher.soft_unavailable.contains(cell);
                audit.record(Category::TeacherPreference, ok, false, || {
                    format!("{} teaches {} in a disliked period ({})", teacher.name, audit_name(inst, g), at)
                });
            }
        }
        if let Some(r) = s.room {
            let room = &inst.rooms[r.index()];
            let ok = !room.unavailable.contains(cell);
            let at = audit.at(week, cell);
            audit.record(Category::RoomAvailability, ok, true, || {
                format!("{} uses {} while it is unavailable ({})", audit_name(inst, g), room.name, at)
            });
        }
    }
}

fn audit_name(inst: &Institution, g: GroupId) -> &str {
    &inst.groups[g.index()].name
}

pub fn double_booking(audit: &mut Audit) {
    let inst = audit.inst();
    let mut teachers: BTreeMap<(TeacherId, WeekVariant, usize), Vec<GroupId>> = BTreeMap::new();
    let mut rooms: BTreeMap<(RoomId, WeekVariant, usize), Vec<GroupId>> = BTreeMap::new();
    for (g, week, cell, s) in audit.tt.sessions() {
        if let Some(t) = s.teacher {
            teachers.entry((t, week, cell)).or_default().push(g);
        }
        if let Some(r) = s.room {
            rooms.entry((r, week, cell)).or_default().push(g);
        }
    }

    let names = |gs: &[GroupId]| {
        gs.iter()
            .map(|g| audit_name(inst, *g))
            .collect::<Vec<_>>()
            .join(", ")
    };
    for ((t, week, cell), groups) in teachers {
        let at = audit.at(week, cell);
        audit.record(Category::TeacherDoubleBooking, groups.len() == 1, true, || {
            format!("{} teaches {} at once ({})", inst.teachers[t.index()].name, names(&groups), at)
        });
    }
    for ((r, week, cell), groups) in rooms {
        let at = audit.at(week, cell);
        audit.record(Category::RoomDoubleBooking, groups.len() == 1, true, || {
            format!("{} hosts {} at once ({})", inst.rooms[r.index()].name, names(&groups), at)
        });
    }
}

pub fn calendar_blocking(audit: &mut Audit) {
    let inst = audit.inst();
    let calendar = &inst.calendar;
    for g in inst.group_ids() {
        for week in WeekVariant::ALL {
            for cell in 0..calendar.cell_count() {
                if !calendar.is_globally_blocked(cell) {
                    continue;
                }
                let ok = audit.tt.get(g, week, cell).is_none();
                let at = audit.at(week, cell);
                audit.record(Category::CalendarBlocking, ok, true, || {
                    format!("{} has a session in a blocked period ({})", audit_name(inst, g), at)
                });
            }
        }
    }
}

pub fn cafeteria(audit: &mut Audit) {
    let model = audit.model;
    let inst = audit.inst();
    let calendar = &inst.calendar;
    let plan = &model.cafeteria;
    if !plan.is_active() {
        return;
    }

    for (day, entry) in plan.days.iter().enumerate() {
        if calendar.is_short_day(day) {
            continue;
        }
        // The primary sitting fits by construction; shifted classes may still
        // overflow the alternate one.
        if !entry.shifted.is_empty() {
            audit.record(Category::Cafeteria, entry.alternate_load <= plan.capacity, false, || {
                format!(
                    "{}: {} seats needed at the alternate lunch for {} available",
                    calendar.days[day], entry.alternate_load, plan.capacity
                )
            });
        }

        let Some(alt) = calendar.alternate_lunch_period else {
            continue;
        };
        let cell = calendar.cell(day, alt as usize);
        for &class in &entry.shifted {
            for week in WeekVariant::ALL {
                let busy: Vec<GroupId> = std::iter::once(class)
                    .chain(inst.children_of(class))
                    .filter(|g| audit.tt.get(*g, week, cell).is_some())
                    .collect();
                let at = audit.at(week, cell);
                audit.record(Category::Cafeteria, busy.is_empty(), true, || {
                    format!(
                        "{} eats at the alternate lunch but has a session ({})",
                        audit_name(inst, class),
                        at
                    )
                });
            }
        }
    }
}

pub fn sub_groups(audit: &mut Audit) {
    let inst = audit.inst();
    let sessions: Vec<_> = audit
        .tt
        .sessions()
        .filter(|(g, ..)| !inst.group(*g).is_base())
        .map(|(g, w, c, _)| (g, w, c))
        .collect();

    for (g, week, cell) in sessions {
        let Some(info) = inst.group(g).sub_info() else {
            continue;
        };
        let busy_parents: Vec<GroupId> = info
            .parents
            .iter()
            .copied()
            .filter(|p| audit.tt.get(*p, week, cell).is_some())
            .collect();
        let clashing_siblings: Vec<GroupId> = match info.family {
            Some(f) if inst.families[f.index()].mode == FamilyMode::Exclusive => inst
                .group_ids()
                .filter(|o| *o != g)
                .filter(|o| inst.group(*o).sub_info().is_some_and(|i| i.family == Some(f)))
                .filter(|o| audit.tt.get(*o, week, cell).is_some())
                .collect(),
            _ => Vec::new(),
        };
        let ok = busy_parents.is_empty() && clashing_siblings.is_empty();
        let at = audit.at(week, cell);
        audit.record(Category::SubGroupExclusivity, ok, true, || {
            let others: Vec<&str> = busy_parents
                .iter()
                .chain(&clashing_siblings)
                .map(|o| audit_name(inst, *o))
                .collect();
            format!("{} overlaps {} ({})", audit_name(inst, g), others.join(", "), at)
        });
    }
}

pub fn synchronization(audit: &mut Audit) {
    let model = audit.model;
    let inst = audit.inst();
    let cells = inst.calendar.cell_count();

    for cluster in model.clusters.iter().filter(|c| c.kind == ClusterKind::SubGroup) {
        for week in WeekVariant::ALL {
            for cell in 0..cells {
                let present: Vec<bool> = cluster
                    .members
                    .iter()
                    .map(|m| {
                        audit
                            .tt
                            .get(model.demand(*m).group, week, cell)
                            .is_some_and(|s| s.demand == *m)
                    })
                    .collect();
                if !present.iter().any(|p| *p) {
                    continue;
                }
                let ok = present.iter().all(|p| *p);
                let at = audit.at(week, cell);
                audit.record(Category::SubGroupSync, ok, true, || {
                    format!("sync group '{}' is only partly in session ({})", cluster.label, at)
                });
            }
        }
    }

    // Same-level rules: synchronized subjects move together, the others
    // never run in two classes of a level at once.
    for (li, _) in inst.levels.iter().enumerate() {
        let level = LevelId::from_index(li);
        let classes = inst.base_classes_of_level(level);
        for week in WeekVariant::ALL {
            for cell in 0..cells {
                let mut by_subject: BTreeMap<SubjectId, Vec<GroupId>> = BTreeMap::new();
                for &c in &classes {
                    if let Some(s) = audit.tt.get(c, week, cell) {
                        by_subject.entry(audit.subject_of(s)).or_default().push(c);
                    }
                }
                for (subject, holders) in by_subject {
                    let at = audit.at(week, cell);
                    let label = format!("{}/{}", inst.levels[li].name, audit.subject_name(subject));
                    if model.level_synced.contains(&(level, subject)) {
                        let expected: Vec<GroupId> = classes
                            .iter()
                            .copied()
                            .filter(|c| {
                                model.groups[c.index()]
                                    .demands
                                    .iter()
                                    .any(|d| model.demand(*d).subject == subject)
                            })
                            .collect();
                        let ok = expected.iter().all(|c| holders.contains(c));
                        audit.record(Category::LevelSync, ok, true, || {
                            format!("{} is not taught to every class at once ({})", label, at)
                        });
                    } else if model.is_level_exclusive(level, subject) {
                        let ok = holders.len() == 1;
                        audit.record(Category::LevelSync, ok, true, || {
                            format!("{} runs in {} classes at once ({})", label, holders.len(), at)
                        });
                    }
                }
            }
        }
    }
}

pub fn rooms(audit: &mut Audit) {
    let model = audit.model;
    let inst = audit.inst();
    let sessions: Vec<_> = audit.tt.sessions().map(|(g, w, c, s)| (g, w, c, *s)).collect();
    for (g, week, cell, s) in sessions {
        let subject = audit.subject_of(&s);
        let at = audit.at(week, cell);

        if let Some(r) = s.room {
            let room = &inst.rooms[r.index()];
            let group = inst.group(g);
            let pool = model.pool_teachers(s.demand);
            let ok = room.can_host(subject, group.size, pool) && room.accepts_teacher(subject, s.teacher);
            audit.record(Category::RoomSuitability, ok, true, || {
                format!(
                    "{} ({} students, {}) cannot use {} (capacity {}) ({})",
                    group.name,
                    group.size,
                    audit_name_subject(inst, subject),
                    room.name,
                    room.capacity,
                    at
                )
            });
        }

        if let Some(t) = s.teacher {
            if let Some(pref) = model.preferred_room(s.demand, t) {
                audit.record(Category::RoomPreference, s.room == Some(pref), false, || {
                    format!(
                        "{} teaches {} outside {} ({})",
                        inst.teachers[t.index()].name,
                        audit_name(inst, g),
                        inst.rooms[pref.index()].name,
                        at
                    )
                });
            }
        }
    }
}

fn audit_name_subject(inst: &Institution, s: SubjectId) -> &str {
    &inst.subjects[s.index()].name
}

pub fn equity(audit: &mut Audit) {
    let model = audit.model;
    let inst = audit.inst();
    for pool in model.pools.iter().filter(|p| p.teachers.len() > 1) {
        let mut counts: BTreeMap<TeacherId, u32> = pool.teachers.iter().map(|t| (*t, 0)).collect();
        let mut outsiders = 0u32;
        for (_, _, _, s) in audit.tt.sessions() {
            if !pool.demands.contains(&s.demand) {
                continue;
            }
            match s.teacher.and_then(|t| counts.get_mut(&t)) {
                Some(c) => *c += 1,
                None => outsiders += 1,
            }
        }
        let max = counts.values().copied().max().unwrap_or(0);
        let min = counts.values().copied().min().unwrap_or(0);
        let ok = max - min <= 1 && outsiders == 0;
        audit.record(Category::TeachingEquity, ok, true, || {
            let detail: Vec<String> = counts
                .iter()
                .map(|(t, c)| format!("{} {}", inst.teachers[t.index()].name, c))
                .collect();
            format!(
                "{} pool is unbalanced over two weeks: {}{}",
                audit_name_subject(inst, pool.subject),
                detail.join(", "),
                if outsiders > 0 {
                    format!(" ({} sessions outside the pool)", outsiders)
                } else {
                    String::new()
                }
            )
        });
    }
}

pub fn teacher_load(audit: &mut Audit) {
    let inst = audit.inst();
    let mut sessions = vec![0u32; inst.teachers.len()];
    for (_, _, _, s) in audit.tt.sessions() {
        if let Some(t) = s.teacher {
            sessions[t.index()] += 1;
        }
    }
    for (i, teacher) in inst.teachers.iter().enumerate() {
        let Some(max) = teacher.max_weekly_hours else {
            continue;
        };
        // A + B together carry the nominal weekly hours.
        let hours = sessions[i] as f64;
        audit.record(Category::TeacherLoad, hours <= max + 1e-9, false, || {
            format!("{} teaches {:.1} hours a week for a cap of {:.1}", teacher.name, hours, max)
        });
    }
}

/// Daily caps, sequencing, fixed slots, bag weight and idle periods on the
/// merged view of every base class. Returns the idle period count.
pub fn class_rules(audit: &mut Audit) -> u32 {
    let model = audit.model;
    let inst = audit.inst();
    let calendar = &inst.calendar;
    let mut idle_total = 0;

    for class in inst.base_classes() {
        let rules = &model.groups[class.index()].rules;
        let level = &inst.levels[inst.group(class).level.index()];
        let name = audit_name(inst, class);

        for week in WeekVariant::ALL {
            let days: Vec<Vec<Vec<SubjectId>>> = (0..calendar.day_count())
                .map(|d| audit.merged_day(class, week, d))
                .collect();

            for (day, periods) in days.iter().enumerate() {
                idle_total += count_idle(model, class, day, periods);
                let day_name = &calendar.days[day];

                for cap in &rules.caps {
                    let spans: Vec<(&str, Vec<usize>)> = match cap.span {
                        CapSpan::Day => vec![("day", (0..periods.len()).collect())],
                        CapSpan::HalfDay => vec![
                            (
                                "morning",
                                (0..periods.len())
                                    .filter(|p| calendar.half_of(*p) == HalfDay::Morning)
                                    .collect(),
                            ),
                            (
                                "afternoon",
                                (0..periods.len())
                                    .filter(|p| calendar.half_of(*p) == HalfDay::Afternoon)
                                    .collect(),
                            ),
                        ],
                    };
                    for (span_name, span) in spans {
                        let mut counts: BTreeMap<SubjectId, u32> = BTreeMap::new();
                        for p in span {
                            for s in &periods[p] {
                                if cap.covers(*s) {
                                    *counts.entry(*s).or_default() += 1;
                                }
                            }
                        }
                        let over: Vec<(SubjectId, u32)> =
                            counts.into_iter().filter(|(_, c)| *c > cap.max as u32).collect();
                        audit.record(Category::DailyCap, over.is_empty(), cap.strength == Strength::Hard, || {
                            let detail: Vec<String> = over
                                .iter()
                                .map(|(s, c)| format!("{} x{}", audit_name_subject(inst, *s), c))
                                .collect();
                            format!(
                                "{} exceeds {} per {} in week {} {}: {}",
                                name,
                                cap.max,
                                span_name,
                                week,
                                day_name,
                                detail.join(", ")
                            )
                        });
                    }
                }

                for rule in &rules.exclusions {
                    let hits: Vec<usize> = (0..periods.len().saturating_sub(1))
                        .filter(|p| periods[*p].contains(&rule.first) && periods[p + 1].contains(&rule.then))
                        .collect();
                    audit.record(
                        Category::SequencingExclusion,
                        hits.is_empty(),
                        rule.strength == Strength::Hard,
                        || {
                            format!(
                                "{}: {} is followed by {} in week {} {} at {}",
                                name,
                                audit_name_subject(inst, rule.first),
                                audit_name_subject(inst, rule.then),
                                week,
                                day_name,
                                hits.iter()
                                    .map(|p| calendar.periods[*p].as_str())
                                    .collect::<Vec<_>>()
                                    .join(", ")
                            )
                        },
                    );
                }

                if let Some(ceiling) = level.bag_ceiling {
                    let load: f64 = periods
                        .iter()
                        .flatten()
                        .map(|s| level.bag_weights.get(s).copied().unwrap_or(0.0))
                        .sum();
                    let limit = ceiling * (1.0 + BAG_TOLERANCE);
                    audit.record(Category::BagWeight, load <= limit + 1e-9, false, || {
                        format!(
                            "{} carries {:.2} in week {} {} for a ceiling of {:.2}",
                            name, load, week, day_name, ceiling
                        )
                    });
                }
            }

            for rule in &rules.inclusions {
                let mut pairs = 0u32;
                let mut firsts = 0u32;
                for periods in &days {
                    for p in 0..periods.len() {
                        if !periods[p].contains(&rule.first) {
                            continue;
                        }
                        firsts += 1;
                        if periods.get(p + 1).is_some_and(|n| n.contains(&rule.then)) {
                            pairs += 1;
                        }
                    }
                }
                let (ok, enforced, expectation) = match rule.mode {
                    InclusionMode::Always => (pairs == firsts, true, "every time".to_string()),
                    InclusionMode::AtLeast(k) => (pairs >= k as u32, false, format!("at least {} times", k)),
                    InclusionMode::AtMost(k) => (pairs <= k as u32, false, format!("at most {} times", k)),
                };
                audit.record(Category::SequencingInclusion, ok, enforced, || {
                    format!(
                        "{}: {} is followed by {} {} of {} times in week {}, expected {}",
                        name,
                        audit_name_subject(inst, rule.first),
                        audit_name_subject(inst, rule.then),
                        pairs,
                        firsts,
                        week,
                        expectation
                    )
                });
            }

            for rule in &rules.fixed {
                let count = rule
                    .window
                    .iter()
                    .filter(|cell| {
                        let slot = calendar.slot_of(**cell);
                        days[slot.day as usize][slot.period as usize]
                            .iter()
                            .any(|s| rule.subjects.contains(s))
                    })
                    .count() as u32;
                audit.record(Category::FixedSlot, count == rule.count as u32, true, || {
                    format!(
                        "{} holds {} of {} required window periods in week {}",
                        name, count, rule.count, week
                    )
                });
            }
        }
    }

    idle_total
}

fn count_idle(model: &TimetableModel, class: GroupId, day: usize, periods: &[Vec<SubjectId>]) -> u32 {
    let calendar = model.calendar();
    let busy: Vec<usize> = (0..periods.len()).filter(|p| !periods[*p].is_empty()).collect();
    let (Some(&first), Some(&last)) = (busy.first(), busy.last()) else {
        return 0;
    };
    (first + 1..last)
        .filter(|p| periods[*p].is_empty() && !model.is_blocked(class, calendar.cell(day, *p)))
        .count() as u32
}
