use super::energy::{Cost, Ledger, TermKey, Touched, Undo};
use super::timetable::Timetable;
use crate::config::{PenaltyWeights, SearchParams};
use crate::consts::MOVE_DRAW_RETRIES;
use crate::domain::{GroupId, RoomId, WeekVariant};
use crate::model::TimetableModel;

#[inline(always)]
fn fast_exp(x: f64) -> f64 {
    if x < -64.0 {
        return 0.0;
    }
    let x = 1.0 + x / 256.0;
    let x = x * x * x * x * x * x * x * x; // (1+x/256)^256 approx exp(x)
    x * x
}

enum Move {
    /// Exchange two cells of a closed set of groups.
    Swap {
        week: WeekVariant,
        a: usize,
        b: usize,
        groups: Vec<GroupId>,
    },
    /// Exchange the teachers of two sessions of one pool.
    Teacher {
        first: (GroupId, WeekVariant, usize),
        second: (GroupId, WeekVariant, usize),
    },
    Room {
        at: (GroupId, WeekVariant, usize),
        room: Option<RoomId>,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnnealStats {
    pub steps: usize,
    pub accepted: usize,
    pub best: Cost,
}

/// One simulated-annealing walk over a single timetable.
pub struct Annealer<'a> {
    model: &'a TimetableModel,
    weights: &'a PenaltyWeights,
    pub timetable: Timetable,
    pub ledger: Ledger,
    pub temperature: f64,
    rng: fastrand::Rng,

    movable: Vec<GroupId>,
    free_cells: Vec<Vec<usize>>,
    multi_pools: Vec<usize>,
    touched: Touched,
    undo: Undo,
    previous_room: Option<RoomId>,
}

impl<'a> Annealer<'a> {
    pub fn new(
        model: &'a TimetableModel,
        weights: &'a PenaltyWeights,
        timetable: Timetable,
        rng: fastrand::Rng,
    ) -> Self {
        let ledger = Ledger::new(model, &timetable, weights);
        let free_cells = (0..model.group_count())
            .map(|g| {
                (0..model.cell_count())
                    .filter(|c| !model.is_blocked(GroupId::from_index(g), *c))
                    .collect()
            })
            .collect();
        let movable = model
            .institution
            .group_ids()
            .filter(|g| !model.groups[g.index()].demands.is_empty())
            .collect();
        let multi_pools = model
            .pools
            .iter()
            .enumerate()
            .filter(|(_, p)| p.teachers.len() > 1)
            .map(|(i, _)| i)
            .collect();

        Self {
            model,
            weights,
            timetable,
            ledger,
            temperature: 0.0,
            rng,
            movable,
            free_cells,
            multi_pools,
            touched: Touched::default(),
            undo: Undo::default(),
            previous_room: None,
        }
    }

    #[inline(always)]
    pub fn energy(&self) -> f64 {
        self.ledger.energy(self.weights)
    }

    /// Runs the geometric cooling schedule and leaves the best state found
    /// in `self.timetable`.
    pub fn run(&mut self, params: &SearchParams) -> AnnealStats {
        let mut stats = AnnealStats::default();
        let mut best_energy = self.energy();
        let mut best_tt = self.timetable.clone();
        let mut best_cost = self.ledger.total();
        let mut since_improvement = 0usize;

        let steps = params.search_steps.max(1);
        let ratio = params.temp_min / params.temp_max;

        for step in 0..steps {
            if best_energy <= 0.0 {
                break;
            }
            if best_cost.hard == 0 && since_improvement >= params.search_patience {
                break;
            }
            self.temperature = params.temp_max * ratio.powf(step as f64 / steps as f64);
            stats.steps += 1;
            since_improvement += 1;

            let Some(mv) = self.draw_move() else {
                continue;
            };

            let before = self.energy();
            self.apply(&mv);
            let delta = self.energy() - before;

            // Metropolis Criterion
            if delta <= 0.0 || self.rng.f64() < fast_exp(-delta / self.temperature) {
                stats.accepted += 1;
                let current = self.energy();
                if current < best_energy - 1e-9 {
                    best_energy = current;
                    best_cost = self.ledger.total();
                    best_tt.clone_from(&self.timetable);
                    since_improvement = 0;
                }
            } else {
                self.revert(&mv);
            }
        }

        if self.timetable != best_tt {
            self.timetable = best_tt;
            self.ledger = Ledger::new(self.model, &self.timetable, self.weights);
        }
        stats.best = self.ledger.total();
        stats
    }

    fn draw_move(&mut self) -> Option<Move> {
        for _ in 0..MOVE_DRAW_RETRIES {
            let roll = self.rng.f64();
            let mv = if roll < 0.60 || (self.multi_pools.is_empty() && roll < 0.85) {
                self.draw_swap()
            } else if roll < 0.85 {
                self.draw_teacher_exchange()
            } else {
                self.draw_room_change()
            };
            if mv.is_some() {
                return mv;
            }
        }
        None
    }

    fn occupied_cell(&mut self, g: GroupId, week: WeekVariant) -> Option<usize> {
        let row = self.timetable.row(g, week);
        let busy: Vec<usize> = self.free_cells[g.index()]
            .iter()
            .copied()
            .filter(|c| row[*c].is_some())
            .collect();
        if busy.is_empty() {
            None
        } else {
            Some(busy[self.rng.usize(0..busy.len())])
        }
    }

    fn draw_swap(&mut self) -> Option<Move> {
        if self.movable.is_empty() {
            return None;
        }
        let g = self.movable[self.rng.usize(0..self.movable.len())];
        let week = if self.rng.bool() { WeekVariant::A } else { WeekVariant::B };
        let a = self.occupied_cell(g, week)?;
        let free = &self.free_cells[g.index()];
        let b = free[self.rng.usize(0..free.len())];
        if a == b {
            return None;
        }

        // Close the group set over every cluster touched at either cell.
        let mut groups = vec![g];
        let mut i = 0;
        while i < groups.len() {
            let h = groups[i];
            for cell in [a, b] {
                let Some(s) = self.timetable.get(h, week, cell) else {
                    continue;
                };
                if let Some(c) = self.model.demand(s.demand).cluster {
                    for m in &self.model.clusters[c].members {
                        let mg = self.model.demand(*m).group;
                        if !groups.contains(&mg) {
                            groups.push(mg);
                        }
                    }
                }
            }
            i += 1;
        }

        if groups
            .iter()
            .any(|h| self.model.is_blocked(*h, a) || self.model.is_blocked(*h, b))
        {
            return None;
        }
        Some(Move::Swap { week, a, b, groups })
    }

    fn random_session_of_pool(&mut self, pool: usize) -> Option<(GroupId, WeekVariant, usize)> {
        let demands = &self.model.pools[pool].demands;
        let d = demands[self.rng.usize(0..demands.len())];
        let g = self.model.demand(d).group;
        let week = if self.rng.bool() { WeekVariant::A } else { WeekVariant::B };
        let row = self.timetable.row(g, week);
        let cells: Vec<usize> = row
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_some_and(|s| s.demand == d))
            .map(|(c, _)| c)
            .collect();
        if cells.is_empty() {
            return None;
        }
        Some((g, week, cells[self.rng.usize(0..cells.len())]))
    }

    fn draw_teacher_exchange(&mut self) -> Option<Move> {
        if self.multi_pools.is_empty() {
            return None;
        }
        let pool = self.multi_pools[self.rng.usize(0..self.multi_pools.len())];
        let first = self.random_session_of_pool(pool)?;
        let second = self.random_session_of_pool(pool)?;
        let t1 = self.timetable.get(first.0, first.1, first.2)?.teacher;
        let t2 = self.timetable.get(second.0, second.1, second.2)?.teacher;
        if t1 == t2 {
            return None;
        }
        Some(Move::Teacher { first, second })
    }

    fn draw_room_change(&mut self) -> Option<Move> {
        if self.movable.is_empty() {
            return None;
        }
        let g = self.movable[self.rng.usize(0..self.movable.len())];
        let week = if self.rng.bool() { WeekVariant::A } else { WeekVariant::B };
        let cell = self.occupied_cell(g, week)?;
        let s = *self.timetable.get(g, week, cell)?;
        let rooms = &self.model.demand(s.demand).rooms;
        if rooms.len() < 2 {
            return None;
        }
        let room = rooms[self.rng.usize(0..rooms.len())];
        if Some(room) == s.room {
            return None;
        }
        Some(Move::Room {
            at: (g, week, cell),
            room: Some(room),
        })
    }

    fn touch(&mut self, mv: &Move) {
        self.touched.clear();
        match mv {
            Move::Swap { week, a, b, groups } => {
                for g in groups {
                    self.ledger.touch_cell(self.model, &mut self.touched, *g, *week, *a);
                    self.ledger.touch_cell(self.model, &mut self.touched, *g, *week, *b);
                }
            }
            Move::Teacher { first, second } => {
                for (_, week, cell) in [first, second] {
                    self.touched
                        .push(TermKey::Slot(self.ledger.slot_key(*week, *cell)));
                }
            }
            Move::Room { at, .. } => {
                self.touched
                    .push(TermKey::Slot(self.ledger.slot_key(at.1, at.2)));
            }
        }
    }

    fn mutate(&mut self, mv: &Move) -> Option<RoomId> {
        match mv {
            Move::Swap { week, a, b, groups } => {
                for g in groups {
                    self.timetable.swap_cells(*g, *week, *a, *b);
                }
                None
            }
            Move::Teacher { first, second } => {
                let t1 = self.timetable.get(first.0, first.1, first.2).and_then(|s| s.teacher);
                let t2 = self.timetable.get(second.0, second.1, second.2).and_then(|s| s.teacher);
                if let Some(s) = self.timetable.get_mut(first.0, first.1, first.2) {
                    s.teacher = t2;
                }
                if let Some(s) = self.timetable.get_mut(second.0, second.1, second.2) {
                    s.teacher = t1;
                }
                None
            }
            Move::Room { at, room } => {
                let s = self.timetable.get_mut(at.0, at.1, at.2)?;
                std::mem::replace(&mut s.room, *room)
            }
        }
    }

    fn apply(&mut self, mv: &Move) {
        self.touch(mv);
        self.previous_room = self.mutate(mv);
        self.ledger
            .refresh(self.model, &self.timetable, self.weights, &self.touched, &mut self.undo);
    }

    fn revert(&mut self, mv: &Move) {
        match mv {
            Move::Room { at, .. } => {
                let previous = self.previous_room;
                if let Some(s) = self.timetable.get_mut(at.0, at.1, at.2) {
                    s.room = previous;
                }
            }
            // Swaps and exchanges are their own inverse.
            other => {
                self.mutate(other);
            }
        }
        self.ledger.rollback(&self.undo);
    }
}
