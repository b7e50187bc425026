use crate::domain::{CafeteriaPriority, GroupId, Institution};
use crate::error::{TfResult, TimeForgeError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Lunch sitting of every base class on one day.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CafeteriaDay {
    pub primary: Vec<GroupId>,
    pub shifted: Vec<GroupId>,
    pub primary_load: u32,
    pub alternate_load: u32,
}

/// Per-day lunch allocation. Empty when the institution has no cafeteria
/// settings; short days have an empty entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CafeteriaPlan {
    pub capacity: u32,
    pub days: Vec<CafeteriaDay>,
}

impl CafeteriaPlan {
    pub fn is_shifted(&self, group: GroupId, day: usize) -> bool {
        self.days
            .get(day)
            .is_some_and(|d| d.shifted.contains(&group))
    }

    pub fn is_active(&self) -> bool {
        !self.days.is_empty()
    }
}

/// Seats needed by one class.
pub fn seat_demand(size: u32, ratio: f64) -> u32 {
    (size as f64 * ratio).ceil() as u32
}

pub fn plan(institution: &Institution) -> TfResult<CafeteriaPlan> {
    let Some(settings) = &institution.cafeteria else {
        return Ok(CafeteriaPlan::default());
    };
    let calendar = &institution.calendar;
    let level_count = institution.levels.len().max(1);

    let mut days = Vec::with_capacity(calendar.day_count());
    for day in 0..calendar.day_count() {
        if calendar.is_short_day(day) {
            days.push(CafeteriaDay::default());
            continue;
        }

        let mut order: Vec<GroupId> = institution.base_classes().collect();
        order.sort_by(|a, b| {
            let (ga, gb) = (institution.group(*a), institution.group(*b));
            let rank = |level: usize| match settings.priority {
                CafeteriaPriority::Level => level,
                CafeteriaPriority::None => (level + level_count - day % level_count) % level_count,
            };
            rank(ga.level.index())
                .cmp(&rank(gb.level.index()))
                .then_with(|| ga.name.cmp(&gb.name))
        });

        let mut entry = CafeteriaDay::default();
        let mut full = false;
        for g in order {
            let seats = seat_demand(institution.group(g).size, settings.boarding_ratio);
            if !full && entry.primary_load + seats <= settings.capacity {
                entry.primary_load += seats;
                entry.primary.push(g);
            } else {
                full = true;
                entry.alternate_load += seats;
                entry.shifted.push(g);
            }
        }

        if !entry.shifted.is_empty() {
            if calendar.alternate_lunch_period.is_none() {
                return Err(TimeForgeError::config(format!(
                    "cafeteria demand on {} exceeds {} seats and no alternate lunch period is set",
                    calendar.days[day], settings.capacity
                )));
            }
            if entry.alternate_load > settings.capacity {
                warn!(
                    "Alternate lunch on {} needs {} seats for a capacity of {}",
                    calendar.days[day], entry.alternate_load, settings.capacity
                );
            }
            debug!(
                "{}: {} classes shifted to the alternate lunch",
                calendar.days[day],
                entry.shifted.len()
            );
        }
        days.push(entry);
    }

    Ok(CafeteriaPlan {
        capacity: settings.capacity,
        days,
    })
}
