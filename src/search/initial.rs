use super::timetable::{Session, Timetable};
use crate::domain::{GroupId, RoomId, TeacherId, WeekVariant};
use crate::error::{TfResult, TimeForgeError};
use crate::model::{DemandId, TimetableModel, WeekTargets};

/// Sessions that must be placed together.
enum Unit {
    Cluster(usize),
    Single(DemandId),
}

/// Builds a starting timetable that honours every structural constraint:
/// exact week volumes, blocked cells, identical cells for sync clusters and
/// per-pool teacher quotas. Remaining conflicts are left to the annealer.
pub fn place(
    model: &TimetableModel,
    targets: &WeekTargets,
    rng: &mut fastrand::Rng,
    attempt: usize,
) -> TfResult<Timetable> {
    let mut tt = Timetable::empty_for(model);

    for unit in placement_order(model, rng) {
        let members: Vec<DemandId> = match unit {
            Unit::Cluster(c) => model.clusters[c].members.clone(),
            Unit::Single(d) => vec![d],
        };
        for week in WeekVariant::ALL {
            let needed = targets.get(members[0], week);
            for placed in 0..needed {
                let Some(cell) = best_cell(model, &tt, &members, week, rng) else {
                    return Err(TimeForgeError::InfeasibleAttempt {
                        attempt,
                        hard_violations: needed - placed,
                    });
                };
                for m in &members {
                    let session = Session {
                        demand: *m,
                        teacher: None,
                        room: None,
                    };
                    tt.set(model.demand(*m).group, week, cell, Some(session));
                }
            }
        }
    }

    assign_teachers(model, &mut tt, rng);
    assign_rooms(model, &mut tt, rng);
    Ok(tt)
}

fn placement_order(model: &TimetableModel, rng: &mut fastrand::Rng) -> Vec<Unit> {
    let mut order: Vec<Unit> = (0..model.clusters.len()).map(Unit::Cluster).collect();

    let mut subs = Vec::new();
    let mut bases = Vec::new();
    for (i, d) in model.demands.iter().enumerate() {
        if d.cluster.is_some() {
            continue;
        }
        if model.institution.group(d.group).is_base() {
            bases.push(DemandId::from_index(i));
        } else {
            subs.push(DemandId::from_index(i));
        }
    }
    for list in [&mut subs, &mut bases] {
        rng.shuffle(list);
        list.sort_by_key(|d| std::cmp::Reverse(model.demand(*d).two_week_total));
    }
    order.extend(subs.into_iter().map(Unit::Single));
    order.extend(bases.into_iter().map(Unit::Single));
    order
}

/// Cheapest cell free for every member, or `None` when there is none.
fn best_cell(
    model: &TimetableModel,
    tt: &Timetable,
    members: &[DemandId],
    week: WeekVariant,
    rng: &mut fastrand::Rng,
) -> Option<usize> {
    let calendar = model.calendar();
    let inst = &model.institution;
    let mut best: Option<(f64, usize)> = None;

    for cell in 0..model.cell_count() {
        let free = members.iter().all(|m| {
            let g = model.demand(*m).group;
            !model.is_blocked(g, cell) && tt.get(g, week, cell).is_none()
        });
        if !free {
            continue;
        }

        let day = calendar.slot_of(cell).day as usize;
        let mut score = rng.f64();
        for m in members {
            let demand = model.demand(*m);
            let g = demand.group;
            let group = inst.group(g);

            let overlaps = if group.is_base() {
                model.groups[g.index()]
                    .children
                    .iter()
                    .filter(|c| tt.get(**c, week, cell).is_some())
                    .count()
            } else {
                group
                    .parents()
                    .iter()
                    .filter(|p| tt.get(**p, week, cell).is_some())
                    .count()
            };
            score += overlaps as f64 * 10.0;

            let same_day = (0..calendar.period_count())
                .filter(|p| {
                    tt.get(g, week, calendar.cell(day, *p))
                        .is_some_and(|s| s.demand == *m)
                })
                .count();
            score += same_day as f64 * 4.0;

            if group.is_base() && model.is_level_exclusive(group.level, demand.subject) {
                let clash = inst
                    .base_classes_of_level(group.level)
                    .into_iter()
                    .filter(|o| *o != g)
                    .any(|o| {
                        tt.get(o, week, cell)
                            .is_some_and(|s| model.demand(s.demand).subject == demand.subject)
                    });
                if clash {
                    score += 6.0;
                }
            }
        }

        if best.map_or(true, |(b, _)| score < b) {
            best = Some((score, cell));
        }
    }

    best.map(|(_, cell)| cell)
}

fn positions_of(tt: &Timetable, demand: DemandId, group: GroupId) -> Vec<(WeekVariant, usize)> {
    let mut out = Vec::new();
    for week in WeekVariant::ALL {
        for (cell, s) in tt.row(group, week).iter().enumerate() {
            if s.is_some_and(|s| s.demand == demand) {
                out.push((week, cell));
            }
        }
    }
    out
}

/// Hands out every pool's sessions by quota, keeping a class with the same
/// teacher where the quota allows. The `total % k` extras go to teachers that
/// still have headroom under their weekly cap.
fn assign_teachers(model: &TimetableModel, tt: &mut Timetable, rng: &mut fastrand::Rng) {
    let cells = model.cell_count();
    let teachers = &model.institution.teachers;
    let mut busy = vec![false; teachers.len() * 2 * cells];
    let busy_idx = |t: TeacherId, w: WeekVariant, c: usize| (t.index() * 2 + w.index()) * cells + c;
    let mut load = vec![0u32; teachers.len()];

    for pool in &model.pools {
        let mut order: Vec<usize> = (0..pool.teachers.len()).collect();
        rng.shuffle(&mut order);
        let base = pool.total_sessions / pool.teachers.len() as u32;
        order.sort_by_key(|i| {
            let t = pool.teachers[*i];
            teachers[t.index()]
                .max_weekly_hours
                .is_some_and(|max| (load[t.index()] + base + 1) as f64 > max + 1e-9)
        });
        let mut remaining = pool.quotas(&order);
        for (i, q) in remaining.iter().enumerate() {
            load[pool.teachers[i].index()] += q;
        }

        for &d in &pool.demands {
            let group = model.demand(d).group;
            let mut current: Option<usize> = None;
            for (week, cell) in positions_of(tt, d, group) {
                let pick = order
                    .iter()
                    .copied()
                    .filter(|i| remaining[*i] > 0)
                    .min_by_key(|i| {
                        let t = pool.teachers[*i];
                        let teacher = &teachers[t.index()];
                        let mut rank = 0;
                        if busy[busy_idx(t, week, cell)] {
                            rank += 2;
                        }
                        if teacher.unavailable.contains(cell) {
                            rank += 2;
                        }
                        if current != Some(*i) {
                            rank += 1;
                        }
                        rank
                    });
                let Some(i) = pick else {
                    continue;
                };
                let t = pool.teachers[i];
                remaining[i] -= 1;
                busy[busy_idx(t, week, cell)] = true;
                current = Some(i);
                if let Some(s) = tt.get_mut(group, week, cell) {
                    s.teacher = Some(t);
                }
            }
        }
    }
}

fn assign_rooms(model: &TimetableModel, tt: &mut Timetable, rng: &mut fastrand::Rng) {
    let cells = model.cell_count();
    let inst = &model.institution;
    let mut busy = vec![false; inst.rooms.len() * 2 * cells];
    let busy_idx = |r: RoomId, w: WeekVariant, c: usize| (r.index() * 2 + w.index()) * cells + c;

    let placed: Vec<_> = tt
        .sessions()
        .map(|(g, w, c, s)| (g, w, c, *s))
        .collect();

    for (g, week, cell, s) in placed {
        let demand = model.demand(s.demand);
        if demand.rooms.is_empty() {
            continue;
        }
        let fits = |r: RoomId| inst.rooms[r.index()].accepts_teacher(demand.subject, s.teacher);
        let free = |r: RoomId| {
            !busy[busy_idx(r, week, cell)] && !inst.rooms[r.index()].unavailable.contains(cell)
        };

        let preferred = s
            .teacher
            .and_then(|t| model.preferred_room(s.demand, t))
            .filter(|r| fits(*r) && free(*r));

        let room = match preferred {
            Some(r) => r,
            None => {
                let open: Vec<RoomId> = demand.rooms.iter().copied().filter(|r| fits(*r) && free(*r)).collect();
                let suitable: Vec<RoomId> = demand.rooms.iter().copied().filter(|r| fits(*r)).collect();
                let pool = if !open.is_empty() {
                    open
                } else if !suitable.is_empty() {
                    suitable
                } else {
                    demand.rooms.clone()
                };
                pool[rng.usize(0..pool.len())]
            }
        };

        busy[busy_idx(room, week, cell)] = true;
        if let Some(slot) = tt.get_mut(g, week, cell) {
            slot.room = Some(room);
        }
    }
}
