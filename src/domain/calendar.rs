use super::ids::TimeSlot;
use serde::{Deserialize, Serialize};

/// The weekly grid shared by both week variants.
///
/// Cells are flattened as `day * period_count + period`. The primary lunch
/// period splits every day into a morning (before) and an afternoon (after).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calendar {
    pub days: Vec<String>,
    pub periods: Vec<String>,
    pub short_days: Vec<bool>,
    pub lunch_period: u8,
    pub alternate_lunch_period: Option<u8>,
}

/// Which part of a day a period belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalfDay {
    Morning,
    Lunch,
    Afternoon,
}

impl Calendar {
    #[inline(always)]
    pub fn day_count(&self) -> usize {
        self.days.len()
    }

    #[inline(always)]
    pub fn period_count(&self) -> usize {
        self.periods.len()
    }

    #[inline(always)]
    pub fn cell_count(&self) -> usize {
        self.days.len() * self.periods.len()
    }

    #[inline(always)]
    pub fn cell(&self, day: usize, period: usize) -> usize {
        day * self.periods.len() + period
    }

    #[inline(always)]
    pub fn slot_of(&self, cell: usize) -> TimeSlot {
        let n = self.periods.len();
        TimeSlot::new((cell / n) as u8, (cell % n) as u8)
    }

    pub fn is_short_day(&self, day: usize) -> bool {
        self.short_days.get(day).copied().unwrap_or(false)
    }

    pub fn half_of(&self, period: usize) -> HalfDay {
        let lunch = self.lunch_period as usize;
        match period.cmp(&lunch) {
            std::cmp::Ordering::Less => HalfDay::Morning,
            std::cmp::Ordering::Equal => HalfDay::Lunch,
            std::cmp::Ordering::Greater => HalfDay::Afternoon,
        }
    }

    /// Cells that no group may ever use: the primary lunch period and the
    /// afternoons of short days.
    pub fn is_globally_blocked(&self, cell: usize) -> bool {
        let slot = self.slot_of(cell);
        let period = slot.period as usize;
        if period == self.lunch_period as usize {
            return true;
        }
        self.is_short_day(slot.day as usize) && self.half_of(period) == HalfDay::Afternoon
    }

    /// Human label such as `Mon 09:00`, used in violation messages.
    pub fn label(&self, cell: usize) -> String {
        let slot = self.slot_of(cell);
        format!(
            "{} {}",
            self.days[slot.day as usize], self.periods[slot.period as usize]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Calendar {
        Calendar {
            days: vec!["Mon".into(), "Wed".into()],
            periods: vec!["8h".into(), "9h".into(), "12h".into(), "14h".into()],
            short_days: vec![false, true],
            lunch_period: 2,
            alternate_lunch_period: None,
        }
    }

    #[test]
    fn test_short_day_afternoon_is_blocked() {
        let cal = sample();
        assert!(!cal.is_globally_blocked(cal.cell(0, 3)));
        assert!(cal.is_globally_blocked(cal.cell(1, 3)));
        assert!(cal.is_globally_blocked(cal.cell(0, 2)));
        assert!(!cal.is_globally_blocked(cal.cell(1, 0)));
    }

    #[test]
    fn test_cell_round_trip() {
        let cal = sample();
        let cell = cal.cell(1, 2);
        assert_eq!(cal.slot_of(cell), TimeSlot::new(1, 2));
        assert_eq!(cal.label(cell), "Wed 12h");
    }
}
