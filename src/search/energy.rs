//! Incremental penalty ledger.
//!
//! The energy of a timetable is split into cached terms:
//! - slot terms per (week, cell): resource clashes, overlaps, availability,
//! - row terms per (base class, week, day): idle periods, caps, sequencing, bag weight,
//! - week terms per (base class, week): fixed slots and weekly inclusion counts.
//!
//! A move only recomputes the terms it touches.

use super::timetable::{Session, Timetable};
use crate::config::PenaltyWeights;
use crate::consts::BAG_TOLERANCE;
use crate::domain::{CapSpan, FamilyMode, GroupId, HalfDay, InclusionMode, Strength, SubjectId, WeekVariant};
use crate::model::TimetableModel;
use std::ops::AddAssign;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cost {
    pub hard: u32,
    pub soft: f64,
}

impl Cost {
    pub const ZERO: Cost = Cost { hard: 0, soft: 0.0 };

    #[inline(always)]
    pub fn energy(self, weights: &PenaltyWeights) -> f64 {
        self.hard as f64 * weights.hard + self.soft
    }

    fn add_strength(&mut self, strength: Strength, count: u32, soft_weight: f64) {
        match strength {
            Strength::Hard => self.hard += count,
            Strength::Soft => self.soft += count as f64 * soft_weight,
        }
    }
}

impl AddAssign for Cost {
    fn add_assign(&mut self, rhs: Cost) {
        self.hard += rhs.hard;
        self.soft += rhs.soft;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermKey {
    Slot(usize),
    Row(usize),
    Week(usize),
}

/// Term keys touched by a move, without duplicates.
#[derive(Debug, Default)]
pub struct Touched {
    keys: Vec<TermKey>,
}

impl Touched {
    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn push(&mut self, key: TermKey) {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    pub fn keys(&self) -> &[TermKey] {
        &self.keys
    }
}

/// Values replaced by the last `refresh`, for rollback.
#[derive(Debug, Default)]
pub struct Undo {
    saved: Vec<(TermKey, Cost)>,
    total: Cost,
}

pub struct Ledger {
    slot: Vec<Cost>,
    row: Vec<Cost>,
    week: Vec<Cost>,
    total: Cost,
    cells: usize,
    days: usize,
}

impl Ledger {
    pub fn new(model: &TimetableModel, tt: &Timetable, weights: &PenaltyWeights) -> Self {
        let cells = model.cell_count();
        let days = model.calendar().day_count();
        let groups = model.group_count();
        let mut ledger = Ledger {
            slot: vec![Cost::ZERO; 2 * cells],
            row: vec![Cost::ZERO; groups * 2 * days],
            week: vec![Cost::ZERO; groups * 2],
            total: Cost::ZERO,
            cells,
            days,
        };

        for i in 0..ledger.slot.len() {
            let cost = ledger.compute(model, tt, weights, TermKey::Slot(i));
            ledger.slot[i] = cost;
        }
        for g in model.institution.base_classes() {
            for week in WeekVariant::ALL {
                for day in 0..days {
                    let key = ledger.row_key(g, week, day);
                    let cost = ledger.compute(model, tt, weights, TermKey::Row(key));
                    ledger.row[key] = cost;
                }
                let key = ledger.week_key(g, week);
                let cost = ledger.compute(model, tt, weights, TermKey::Week(key));
                ledger.week[key] = cost;
            }
        }

        let mut total = Cost::ZERO;
        for c in ledger.slot.iter().chain(&ledger.row).chain(&ledger.week) {
            total += *c;
        }
        ledger.total = total;
        ledger
    }

    #[inline(always)]
    pub fn total(&self) -> Cost {
        self.total
    }

    #[inline(always)]
    pub fn energy(&self, weights: &PenaltyWeights) -> f64 {
        self.total.energy(weights)
    }

    #[inline(always)]
    pub fn slot_key(&self, week: WeekVariant, cell: usize) -> usize {
        week.index() * self.cells + cell
    }

    #[inline(always)]
    pub fn row_key(&self, group: GroupId, week: WeekVariant, day: usize) -> usize {
        (group.index() * 2 + week.index()) * self.days + day
    }

    #[inline(always)]
    pub fn week_key(&self, group: GroupId, week: WeekVariant) -> usize {
        group.index() * 2 + week.index()
    }

    /// Marks every term a change of `group` at (`week`, `cell`) can affect.
    pub fn touch_cell(
        &self,
        model: &TimetableModel,
        touched: &mut Touched,
        group: GroupId,
        week: WeekVariant,
        cell: usize,
    ) {
        touched.push(TermKey::Slot(self.slot_key(week, cell)));
        let day = model.calendar().slot_of(cell).day as usize;
        for class in &model.groups[group.index()].row_classes {
            touched.push(TermKey::Row(self.row_key(*class, week, day)));
            if model.groups[class.index()].rules.has_week_terms() {
                touched.push(TermKey::Week(self.week_key(*class, week)));
            }
        }
    }

    /// Recomputes the touched terms against the current timetable.
    pub fn refresh(
        &mut self,
        model: &TimetableModel,
        tt: &Timetable,
        weights: &PenaltyWeights,
        touched: &Touched,
        undo: &mut Undo,
    ) {
        undo.saved.clear();
        undo.total = self.total;
        for &key in touched.keys() {
            let new = self.compute(model, tt, weights, key);
            let slot = match key {
                TermKey::Slot(i) => &mut self.slot[i],
                TermKey::Row(i) => &mut self.row[i],
                TermKey::Week(i) => &mut self.week[i],
            };
            let old = std::mem::replace(slot, new);
            undo.saved.push((key, old));
            self.total.hard = self.total.hard + new.hard - old.hard;
            self.total.soft += new.soft - old.soft;
        }
    }

    pub fn rollback(&mut self, undo: &Undo) {
        for &(key, old) in undo.saved.iter().rev() {
            match key {
                TermKey::Slot(i) => self.slot[i] = old,
                TermKey::Row(i) => self.row[i] = old,
                TermKey::Week(i) => self.week[i] = old,
            }
        }
        self.total = undo.total;
    }

    fn compute(&self, model: &TimetableModel, tt: &Timetable, weights: &PenaltyWeights, key: TermKey) -> Cost {
        match key {
            TermKey::Slot(i) => {
                let week = WeekVariant::from_index(i / self.cells);
                slot_cost(model, tt, weights, week, i % self.cells)
            }
            TermKey::Row(i) => {
                let gw = i / self.days;
                let group = GroupId::from_index(gw / 2);
                if !model.institution.group(group).is_base() {
                    return Cost::ZERO;
                }
                row_cost(model, tt, weights, group, WeekVariant::from_index(gw % 2), i % self.days)
            }
            TermKey::Week(i) => {
                let group = GroupId::from_index(i / 2);
                if !model.institution.group(group).is_base() {
                    return Cost::ZERO;
                }
                week_cost(model, tt, weights, group, WeekVariant::from_index(i % 2))
            }
        }
    }
}

/// Counts surplus occurrences: `len - distinct`.
fn surplus<T: Ord>(items: &mut [T]) -> u32 {
    if items.len() < 2 {
        return 0;
    }
    items.sort_unstable();
    let mut dupes = 0;
    for i in 1..items.len() {
        if items[i] == items[i - 1] {
            dupes += 1;
        }
    }
    dupes
}

pub fn slot_cost(
    model: &TimetableModel,
    tt: &Timetable,
    weights: &PenaltyWeights,
    week: WeekVariant,
    cell: usize,
) -> Cost {
    let inst = &model.institution;
    let mut cost = Cost::ZERO;
    let mut teachers = Vec::new();
    let mut rooms = Vec::new();
    let mut families = Vec::new();
    let mut level_subjects = Vec::new();

    for g in inst.group_ids() {
        let Some(s) = tt.get(g, week, cell) else {
            continue;
        };
        let demand = model.demand(s.demand);
        let group = inst.group(g);

        match group.sub_info() {
            Some(info) => {
                for parent in &info.parents {
                    if tt.get(*parent, week, cell).is_some() {
                        cost.hard += 1;
                    }
                }
                if let Some(f) = info.family {
                    if inst.families[f.index()].mode == FamilyMode::Exclusive {
                        families.push(f);
                    }
                }
            }
            None => {
                if model.is_level_exclusive(group.level, demand.subject) {
                    level_subjects.push((group.level, demand.subject));
                }
            }
        }

        if let Some(t) = s.teacher {
            teachers.push(t);
            let teacher = &inst.teachers[t.index()];
            if teacher.unavailable.contains(cell) {
                cost.hard += 1;
            }
            if teacher.soft_unavailable.contains(cell) {
                cost.soft += weights.preference;
            }
            if let Some(pref) = model.preferred_room(s.demand, t) {
                if s.room != Some(pref) {
                    cost.soft += weights.room_preference;
                }
            }
        }

        if let Some(r) = s.room {
            rooms.push(r);
            let room = &inst.rooms[r.index()];
            if room.unavailable.contains(cell) {
                cost.hard += 1;
            }
            if !room.accepts_teacher(demand.subject, s.teacher) {
                cost.hard += 1;
            }
        }
    }

    cost.hard += surplus(&mut teachers);
    cost.hard += surplus(&mut rooms);
    cost.hard += surplus(&mut families);
    cost.hard += surplus(&mut level_subjects);
    cost
}

/// Calls `f` for the class's own session and each active sub-group session.
#[inline]
pub fn for_each_merged<F: FnMut(&Session)>(
    model: &TimetableModel,
    tt: &Timetable,
    class: GroupId,
    week: WeekVariant,
    cell: usize,
    mut f: F,
) {
    if let Some(s) = tt.get(class, week, cell) {
        f(s);
    }
    for child in &model.groups[class.index()].children {
        if let Some(s) = tt.get(*child, week, cell) {
            f(s);
        }
    }
}

/// Distinct (period, subject) pairs of a class day, merged view, sorted.
pub fn merged_day(
    model: &TimetableModel,
    tt: &Timetable,
    class: GroupId,
    week: WeekVariant,
    day: usize,
) -> Vec<(usize, SubjectId)> {
    let calendar = model.calendar();
    let mut entries = Vec::new();
    for period in 0..calendar.period_count() {
        let cell = calendar.cell(day, period);
        for_each_merged(model, tt, class, week, cell, |s| {
            let pair = (period, model.demand(s.demand).subject);
            if !entries.contains(&pair) {
                entries.push(pair);
            }
        });
    }
    entries.sort_unstable();
    entries
}

/// Empty unblocked periods between the first and last busy period of a day.
pub fn idle_periods(model: &TimetableModel, class: GroupId, day: usize, entries: &[(usize, SubjectId)]) -> u32 {
    let (Some(first), Some(last)) = (entries.first(), entries.last()) else {
        return 0;
    };
    let calendar = model.calendar();
    let mut idle = 0;
    for period in first.0 + 1..last.0 {
        let cell = calendar.cell(day, period);
        if model.is_blocked(class, cell) {
            continue;
        }
        if !entries.iter().any(|(p, _)| *p == period) {
            idle += 1;
        }
    }
    idle
}

/// Occurrences of `first` at a period immediately followed by `then`.
pub fn count_followed(entries: &[(usize, SubjectId)], first: SubjectId, then: SubjectId) -> u32 {
    entries
        .iter()
        .filter(|(p, s)| *s == first && entries.contains(&(p + 1, then)))
        .count() as u32
}

/// Surplus occurrences over a cap, per subject covered, within `periods`.
pub fn cap_excess<P: Fn(usize) -> bool>(
    entries: &[(usize, SubjectId)],
    covers: impl Fn(SubjectId) -> bool,
    max: u8,
    in_span: P,
) -> u32 {
    let mut subjects: Vec<SubjectId> = entries
        .iter()
        .filter(|(p, s)| in_span(*p) && covers(*s))
        .map(|(_, s)| *s)
        .collect();
    subjects.sort_unstable();
    let mut excess = 0;
    let mut i = 0;
    while i < subjects.len() {
        let mut j = i;
        while j < subjects.len() && subjects[j] == subjects[i] {
            j += 1;
        }
        excess += ((j - i) as u32).saturating_sub(max as u32);
        i = j;
    }
    excess
}

pub fn row_cost(
    model: &TimetableModel,
    tt: &Timetable,
    weights: &PenaltyWeights,
    class: GroupId,
    week: WeekVariant,
    day: usize,
) -> Cost {
    let entries = merged_day(model, tt, class, week, day);
    if entries.is_empty() {
        return Cost::ZERO;
    }
    let calendar = model.calendar();
    let rules = &model.groups[class.index()].rules;
    let mut cost = Cost::ZERO;

    cost.soft += idle_periods(model, class, day, &entries) as f64 * weights.idle;

    for cap in &rules.caps {
        let excess = match cap.span {
            CapSpan::Day => cap_excess(&entries, |s| cap.covers(s), cap.max, |_| true),
            CapSpan::HalfDay => {
                cap_excess(&entries, |s| cap.covers(s), cap.max, |p| {
                    calendar.half_of(p) == HalfDay::Morning
                }) + cap_excess(&entries, |s| cap.covers(s), cap.max, |p| {
                    calendar.half_of(p) == HalfDay::Afternoon
                })
            }
        };
        cost.add_strength(cap.strength, excess, weights.soft_cap);
    }

    for rule in &rules.exclusions {
        let n = count_followed(&entries, rule.first, rule.then);
        cost.add_strength(rule.strength, n, weights.soft_exclusion);
    }

    for rule in &rules.inclusions {
        if rule.mode == InclusionMode::Always {
            let firsts = entries.iter().filter(|(_, s)| *s == rule.first).count() as u32;
            cost.hard += firsts - count_followed(&entries, rule.first, rule.then);
        }
    }

    let level = &model.institution.levels[model.institution.group(class).level.index()];
    if let Some(ceiling) = level.bag_ceiling {
        let load: f64 = entries
            .iter()
            .map(|(_, s)| level.bag_weights.get(s).copied().unwrap_or(0.0))
            .sum();
        let limit = ceiling * (1.0 + BAG_TOLERANCE);
        if load > limit {
            cost.soft += (load - limit) * weights.bag_excess;
        }
    }

    cost
}

pub fn week_cost(
    model: &TimetableModel,
    tt: &Timetable,
    weights: &PenaltyWeights,
    class: GroupId,
    week: WeekVariant,
) -> Cost {
    let rules = &model.groups[class.index()].rules;
    if !rules.has_week_terms() {
        return Cost::ZERO;
    }
    let mut cost = Cost::ZERO;

    for rule in &rules.fixed {
        let mut count = 0u32;
        for &cell in &rule.window {
            let mut hit = false;
            for_each_merged(model, tt, class, week, cell, |s| {
                hit |= rule.subjects.contains(&model.demand(s.demand).subject);
            });
            if hit {
                count += 1;
            }
        }
        cost.hard += count.abs_diff(rule.count as u32);
    }

    let weekly: Vec<_> = rules
        .inclusions
        .iter()
        .filter(|r| r.mode != InclusionMode::Always)
        .collect();
    if !weekly.is_empty() {
        let days: Vec<_> = (0..model.calendar().day_count())
            .map(|d| merged_day(model, tt, class, week, d))
            .collect();
        for rule in weekly {
            let pairs: u32 = days
                .iter()
                .map(|e| count_followed(e, rule.first, rule.then))
                .sum();
            match rule.mode {
                InclusionMode::AtLeast(k) => {
                    cost.soft += (k as u32).saturating_sub(pairs) as f64 * weights.sequencing_moderate;
                }
                InclusionMode::AtMost(k) => {
                    cost.soft += pairs.saturating_sub(k as u32) as f64 * weights.sequencing_weak;
                }
                InclusionMode::Always => {}
            }
        }
    }

    cost
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surplus_counts_duplicates() {
        let mut v = vec![3, 1, 3, 3, 2];
        assert_eq!(surplus(&mut v), 2);
        let mut single = vec![7];
        assert_eq!(surplus(&mut single), 0);
    }

    #[test]
    fn test_count_followed_uses_adjacent_periods() {
        let x = SubjectId(0);
        let y = SubjectId(1);
        let entries = vec![(0, x), (1, y), (3, x), (5, y)];
        assert_eq!(count_followed(&entries, x, y), 1);
        assert_eq!(count_followed(&entries, y, x), 0);
    }

    #[test]
    fn test_cap_excess_per_subject() {
        let a = SubjectId(0);
        let b = SubjectId(1);
        let entries = vec![(0, a), (1, a), (2, a), (3, b), (4, b)];
        assert_eq!(cap_excess(&entries, |_| true, 2, |_| true), 1);
        assert_eq!(cap_excess(&entries, |s| s == b, 1, |_| true), 1);
        assert_eq!(cap_excess(&entries, |_| true, 2, |p| p < 2), 0);
    }
}
