use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Category {
    Volume,
    TeacherAvailability,
    RoomAvailability,
    TeacherDoubleBooking,
    RoomDoubleBooking,
    CalendarBlocking,
    Cafeteria,
    SubGroupExclusivity,
    SubGroupSync,
    LevelSync,
    RoomSuitability,
    TeachingEquity,
    DailyCap,
    FixedSlot,
    BagWeight,
    SequencingExclusion,
    SequencingInclusion,
    TeacherPreference,
    RoomPreference,
    TeacherLoad,
}

impl Category {
    pub fn is_mandatory(self) -> bool {
        !matches!(
            self,
            Category::BagWeight
                | Category::SequencingExclusion
                | Category::SequencingInclusion
                | Category::TeacherPreference
                | Category::RoomPreference
                | Category::TeacherLoad
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub message: String,
    /// Whether the search treats this unit as a hard constraint.
    pub enforced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub category: Category,
    pub mandatory: bool,
    pub checked: u32,
    pub satisfied: u32,
    pub violations: Vec<Violation>,
}

impl CategoryReport {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            mandatory: category.is_mandatory(),
            checked: 0,
            satisfied: 0,
            violations: Vec::new(),
        }
    }

    pub fn percentage(&self) -> f64 {
        percentage(self.satisfied, self.checked)
    }
}

fn percentage(satisfied: u32, checked: u32) -> f64 {
    if checked == 0 {
        100.0
    } else {
        satisfied as f64 / checked as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub categories: Vec<CategoryReport>,
    pub global_score: f64,
    pub mandatory_score: f64,
    pub optional_score: f64,
    pub idle_periods: u32,
}

impl VerificationReport {
    pub fn from_categories(categories: Vec<CategoryReport>, idle_periods: u32) -> Self {
        let sum = |filter: &dyn Fn(&CategoryReport) -> bool| {
            categories
                .iter()
                .filter(|c| filter(c))
                .fold((0, 0), |(s, c), r| (s + r.satisfied, c + r.checked))
        };
        let (s_all, c_all) = sum(&|_| true);
        let (s_mand, c_mand) = sum(&|c| c.mandatory);
        let (s_opt, c_opt) = sum(&|c| !c.mandatory);

        Self {
            global_score: percentage(s_all, c_all),
            mandatory_score: percentage(s_mand, c_mand),
            optional_score: percentage(s_opt, c_opt),
            categories,
            idle_periods,
        }
    }

    pub fn category(&self, category: Category) -> Option<&CategoryReport> {
        self.categories.iter().find(|c| c.category == category)
    }

    pub fn violation_count(&self) -> usize {
        self.categories.iter().map(|c| c.violations.len()).sum()
    }

    /// Violations of units the search enforces as hard constraints.
    pub fn enforced_violations(&self) -> impl Iterator<Item = (Category, &Violation)> + '_ {
        self.categories
            .iter()
            .flat_map(|c| c.violations.iter().map(move |v| (c.category, v)))
            .filter(|(_, v)| v.enforced)
    }

    pub fn mandatory_violations(&self) -> usize {
        self.categories
            .iter()
            .filter(|c| c.mandatory)
            .map(|c| c.violations.len())
            .sum()
    }

    /// An empty report for every category, in declaration order.
    pub fn blank_categories() -> Vec<CategoryReport> {
        Category::iter().map(CategoryReport::new).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_names_are_kebab_case() {
        assert_eq!(Category::TeacherDoubleBooking.to_string(), "teacher-double-booking");
        assert_eq!(Category::SubGroupSync.to_string(), "sub-group-sync");
    }

    #[test]
    fn test_empty_report_scores_full() {
        let report = VerificationReport::from_categories(VerificationReport::blank_categories(), 0);
        assert_eq!(report.global_score, 100.0);
        assert_eq!(report.categories.len(), Category::iter().count());
    }

    #[test]
    fn test_scores_split_by_tag() {
        let mut cats = VerificationReport::blank_categories();
        for c in cats.iter_mut() {
            match c.category {
                Category::Volume => {
                    c.checked = 4;
                    c.satisfied = 4;
                }
                Category::BagWeight => {
                    c.checked = 4;
                    c.satisfied = 2;
                }
                _ => {}
            }
        }
        let report = VerificationReport::from_categories(cats, 0);
        assert_eq!(report.mandatory_score, 100.0);
        assert_eq!(report.optional_score, 50.0);
        assert_eq!(report.global_score, 75.0);
    }
}
