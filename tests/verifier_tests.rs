mod common;

use common::*;
use rstest::rstest;
use timeforge::api;
use timeforge::domain::document::{
    GroupDocument, InclusionKind, RuleDocument, SubjectDocument, TeacherDocument,
};
use timeforge::domain::{
    CafeteriaPriority, CapSpan, EquityScope, FamilyMode, GroupId, Strength, WeekVariant,
};
use timeforge::model::TimetableModel;
use timeforge::search::{Session, Timetable};
use timeforge::verifier::{verify, Category};

/// Week A: Mon 08-09, Tue 08. Week B: Tue 09, Thu 08.
const MATH_CELLS: [(WeekVariant, usize); 5] = [
    (WeekVariant::A, 0),
    (WeekVariant::A, 1),
    (WeekVariant::A, 8),
    (WeekVariant::B, 9),
    (WeekVariant::B, 24),
];

fn math_school(curie: TeacherDocument) -> InstitutionBuilder {
    InstitutionBuilder::new()
        .level("6e", &[("Math", 5.0)])
        .subject("Math", single("Curie"))
        .class("6A", "6e", 25)
        .teacher_doc(curie)
        .room("R1", 30)
}

fn single_class() -> (std::sync::Arc<TimetableModel>, Timetable) {
    place_math(math_school(teacher_doc("Curie")).model())
}

fn place_math(model: std::sync::Arc<TimetableModel>) -> (std::sync::Arc<TimetableModel>, Timetable) {
    let inst = &model.institution;
    let class = inst.find_group("6A").unwrap();
    let session = Session {
        demand: model.groups[class.index()].demands[0],
        teacher: inst.find_teacher("Curie"),
        room: inst.find_room("R1"),
    };
    let mut tt = Timetable::empty_for(&model);
    for (week, cell) in MATH_CELLS {
        tt.set(class, week, cell, Some(session));
    }
    (model, tt)
}

/// Sets the session of `group` for `subject`, taught by `teacher`.
fn put(
    model: &TimetableModel,
    tt: &mut Timetable,
    group: &str,
    subject: &str,
    teacher: &str,
    week: WeekVariant,
    cell: usize,
) {
    let inst = &model.institution;
    let g = inst.find_group(group).unwrap();
    let s = inst.find_subject(subject).unwrap();
    let demand = model.groups[g.index()]
        .demands
        .iter()
        .copied()
        .find(|d| model.demand(*d).subject == s)
        .unwrap();
    let session = Session {
        demand,
        teacher: inst.find_teacher(teacher),
        room: None,
    };
    tt.set(g, week, cell, Some(session));
}

fn family_member(name: &str, subject: &str, mode: FamilyMode) -> GroupDocument {
    GroupDocument {
        name: name.to_string(),
        level: None,
        size: 12,
        parents: vec!["6A".to_string()],
        subject: Some(subject.to_string()),
        family: Some("ancient".to_string()),
        family_mode: Some(mode),
        sync_key: None,
    }
}

#[test]
fn test_clean_timetable_scores_full() {
    let (model, tt) = single_class();
    let report = verify(&model, &tt);
    assert_eq!(report.violation_count(), 0);
    assert_eq!(report.global_score, 100.0);
    assert_eq!(report.idle_periods, 0);
    assert_eq!(report.category(Category::Volume).unwrap().checked, 1);
}

#[test]
fn test_session_at_lunch_breaks_calendar_blocking() {
    let (model, mut tt) = single_class();
    let class = GroupId::from_index(0);
    tt.swap_cells(class, WeekVariant::A, 1, 4);

    let report = verify(&model, &tt);
    let blocking = report.category(Category::CalendarBlocking).unwrap();
    assert_eq!(blocking.violations.len(), 1);
    assert!(blocking.violations[0].enforced);
    assert!(blocking.violations[0].message.contains("week A Mon 12:00"));
    // 09:00, 10:00 and 11:00 are now empty between two busy periods.
    assert_eq!(report.idle_periods, 3);
    assert!(report.global_score < 100.0);
}

#[test]
fn test_missing_session_breaks_volume() {
    let (model, mut tt) = single_class();
    tt.set(GroupId::from_index(0), WeekVariant::B, 24, None);

    let report = verify(&model, &tt);
    let volume = report.category(Category::Volume).unwrap();
    assert_eq!(volume.violations.len(), 1);
    assert!(volume.violations[0].message.contains("3 + 1"));
    assert!(volume.violations[0].message.contains("target of 5"));
}

#[test]
fn test_third_session_in_a_day_breaks_default_cap() {
    let (model, mut tt) = single_class();
    // Tue 08:00 -> Mon 10:00 in week A.
    tt.swap_cells(GroupId::from_index(0), WeekVariant::A, 8, 2);

    let report = verify(&model, &tt);
    let caps = report.category(Category::DailyCap).unwrap();
    assert_eq!(caps.violations.len(), 1);
    assert!(caps.violations[0].message.contains("Math x3"));
}

#[test]
fn test_fixed_slot_counts_window_cells() {
    let model = math_school(teacher_doc("Curie"))
        .rule(RuleDocument::FixedSlot {
            subjects: vec!["Math".to_string()],
            targets: Vec::new(),
            window: vec![window("Tue", &["08:00", "09:00"])],
            count: 1,
        })
        .model();
    let (model, mut tt) = place_math(model);
    let clean = verify(&model, &tt);
    let fixed = clean.category(Category::FixedSlot).unwrap();
    assert_eq!(fixed.checked, 2);
    assert!(fixed.violations.is_empty());

    // Tue 09:00 -> Fri 08:00 in week B.
    tt.swap_cells(GroupId::from_index(0), WeekVariant::B, 9, 32);
    let report = verify(&model, &tt);
    let fixed = report.category(Category::FixedSlot).unwrap();
    assert_eq!(fixed.violations.len(), 1);
    assert!(fixed.violations[0].message.contains("0 of 1"));
    assert!(fixed.violations[0].message.contains("week B"));
}

#[test]
fn test_heavy_days_exceed_bag_ceiling() {
    let model = math_school(teacher_doc("Curie"))
        .bag("6e", &[("Math", 1.0)], 1.5)
        .model();
    let (model, tt) = place_math(model);

    let report = verify(&model, &tt);
    let bag = report.category(Category::BagWeight).unwrap();
    // Only Monday of week A carries two sessions.
    assert_eq!(bag.checked, 10);
    assert_eq!(bag.violations.len(), 1);
    assert!(bag.violations[0].message.contains("week A Mon"));
    assert!(!bag.mandatory);
    assert_eq!(report.mandatory_score, 100.0);
}

#[test]
fn test_weekly_cap_is_reported_as_optional() {
    let curie = TeacherDocument {
        max_weekly_hours: Some(4.0),
        ..teacher_doc("Curie")
    };
    let (model, tt) = place_math(math_school(curie).model());

    let report = verify(&model, &tt);
    let load = report.category(Category::TeacherLoad).unwrap();
    assert_eq!(load.violations.len(), 1);
    assert!(load.violations[0].message.contains("5.0 hours"));
    assert_eq!(report.enforced_violations().count(), 0);
}

#[test]
fn test_shared_teacher_at_once_is_double_booked() {
    let model = InstitutionBuilder::new()
        .level("6e", &[("Math", 1.0)])
        .subject("Math", single("Curie"))
        .class("6A", "6e", 25)
        .class("6B", "6e", 25)
        .teacher("Curie")
        .model();
    let inst = &model.institution;
    let curie = inst.find_teacher("Curie");

    let mut tt = Timetable::empty_for(&model);
    for class in inst.base_classes() {
        let session = Session {
            demand: model.groups[class.index()].demands[0],
            teacher: curie,
            room: None,
        };
        tt.set(class, WeekVariant::A, 0, Some(session));
    }

    let report = verify(&model, &tt);
    assert_eq!(
        report.category(Category::TeacherDoubleBooking).unwrap().violations.len(),
        1
    );
    // Two classes of one level hold the same subject at once.
    assert_eq!(report.category(Category::LevelSync).unwrap().violations.len(), 1);
    assert_eq!(report.enforced_violations().count(), 2);
}

#[test]
fn test_verification_is_idempotent() {
    let model = small_school().sub_group("Art-6A", &["6A"], "Art", 12).model();
    let outcome = solve(&model, quick_config(1, 8));
    let tt = timetable_of(&model, &outcome.best);

    let first = verify(&model, &tt);
    let second = verify(&model, &tt);
    assert_eq!(first, second);
    assert_eq!(first, outcome.best.report);
}

#[test]
fn test_document_reverification_matches_run_report() {
    let model = small_school().model();
    let outcome = solve(&model, quick_config(1, 12));
    let report = api::verify_document(&model, &outcome.best.timetable).unwrap();
    assert_eq!(report, outcome.best.report);
}

#[test]
fn test_unknown_names_in_document_are_rejected() {
    let model = small_school().model();
    let outcome = solve(&model, quick_config(1, 13));
    let mut doc = outcome.best.timetable.clone();
    doc.assignments[0].teacher = Some("Nobody".to_string());
    assert!(api::verify_document(&model, &doc).is_err());
}

#[test]
fn test_report_serializes_kebab_case_categories() {
    let (model, tt) = single_class();
    let json = serde_json::to_string(&verify(&model, &tt)).unwrap();
    assert!(json.contains("\"teacher-double-booking\""));
    assert!(json.contains("\"global_score\""));
}

fn synced_math(sync: bool) -> std::sync::Arc<TimetableModel> {
    let mut builder = InstitutionBuilder::new()
        .level("6e", &[("Math", 1.0)])
        .subject("Math", pool(&["Curie", "Noether"]))
        .class("6A", "6e", 25)
        .class("6B", "6e", 25)
        .teacher("Curie")
        .teacher("Noether");
    if sync {
        builder = builder.rule(RuleDocument::LevelSync {
            level: "6e".to_string(),
            subject: "Math".to_string(),
        });
    }
    builder.model()
}

#[test]
fn test_level_sync_flags_classes_out_of_step() {
    let model = synced_math(true);
    let mut tt = Timetable::empty_for(&model);
    put(&model, &mut tt, "6A", "Math", "Curie", WeekVariant::A, 0);
    put(&model, &mut tt, "6B", "Math", "Noether", WeekVariant::A, 1);

    let report = verify(&model, &tt);
    let sync = report.category(Category::LevelSync).unwrap();
    assert_eq!(sync.violations.len(), 2);
    assert!(sync.violations[0].message.contains("not taught to every class at once"));
    assert!(sync.violations.iter().all(|v| v.enforced));
}

#[test]
fn test_level_sync_accepts_classes_in_step() {
    let model = synced_math(true);
    let mut tt = Timetable::empty_for(&model);
    put(&model, &mut tt, "6A", "Math", "Curie", WeekVariant::A, 0);
    put(&model, &mut tt, "6B", "Math", "Noether", WeekVariant::A, 0);

    let report = verify(&model, &tt);
    let sync = report.category(Category::LevelSync).unwrap();
    assert_eq!(sync.checked, 1);
    assert!(sync.violations.is_empty());
    assert_eq!(report.enforced_violations().count(), 0);

    // Without the rule the same placement breaks same-level exclusivity.
    let plain = synced_math(false);
    let mut tt = Timetable::empty_for(&plain);
    put(&plain, &mut tt, "6A", "Math", "Curie", WeekVariant::A, 0);
    put(&plain, &mut tt, "6B", "Math", "Noether", WeekVariant::A, 0);
    let report = verify(&plain, &tt);
    let sync = report.category(Category::LevelSync).unwrap();
    assert_eq!(sync.violations.len(), 1);
    assert!(sync.violations[0].message.contains("runs in 2 classes at once"));
}

#[rstest]
#[case(FamilyMode::Exclusive, 2)]
#[case(FamilyMode::Parallel, 0)]
fn test_sibling_overlap_follows_family_mode(#[case] mode: FamilyMode, #[case] expected: usize) {
    let model = InstitutionBuilder::new()
        .level("6e", &[("Latin", 1.0), ("Greek", 1.0)])
        .subject("Latin", single("Seneca"))
        .subject("Greek", single("Homer"))
        .class("6A", "6e", 25)
        .group_doc(family_member("Lat-6A", "Latin", mode))
        .group_doc(family_member("Grk-6A", "Greek", mode))
        .teacher("Seneca")
        .teacher("Homer")
        .model();
    let mut tt = Timetable::empty_for(&model);
    put(&model, &mut tt, "Lat-6A", "Latin", "Seneca", WeekVariant::A, 0);
    put(&model, &mut tt, "Grk-6A", "Greek", "Homer", WeekVariant::A, 0);

    let report = verify(&model, &tt);
    let exclusivity = report.category(Category::SubGroupExclusivity).unwrap();
    assert_eq!(exclusivity.checked, 2);
    assert_eq!(exclusivity.violations.len(), expected);
    if expected > 0 {
        assert!(exclusivity.violations[0].message.contains("overlaps"));
        assert!(exclusivity.violations[0].enforced);
    }
}

#[rstest]
#[case(InclusionKind::Always, None, "week B", true)]
#[case(InclusionKind::AtLeast, Some(1), "week B", false)]
#[case(InclusionKind::AtMost, Some(0), "week A", false)]
fn test_inclusion_modes_count_pairs_per_week(
    #[case] mode: InclusionKind,
    #[case] count: Option<u8>,
    #[case] failing_week: &str,
    #[case] enforced: bool,
) {
    let model = InstitutionBuilder::new()
        .level("6e", &[("Math", 2.0), ("French", 2.0)])
        .subject("Math", single("Curie"))
        .subject("French", single("Hugo"))
        .class("6A", "6e", 25)
        .teacher("Curie")
        .teacher("Hugo")
        .rule(RuleDocument::Inclusion {
            first: "Math".to_string(),
            then: "French".to_string(),
            targets: Vec::new(),
            mode,
            count,
        })
        .model();
    let mut tt = Timetable::empty_for(&model);
    // Week A pairs Math with French; week B leaves a gap.
    put(&model, &mut tt, "6A", "Math", "Curie", WeekVariant::A, 0);
    put(&model, &mut tt, "6A", "French", "Hugo", WeekVariant::A, 1);
    put(&model, &mut tt, "6A", "Math", "Curie", WeekVariant::B, 0);
    put(&model, &mut tt, "6A", "French", "Hugo", WeekVariant::B, 2);

    let report = verify(&model, &tt);
    let inclusion = report.category(Category::SequencingInclusion).unwrap();
    assert_eq!(inclusion.checked, 2);
    assert_eq!(inclusion.violations.len(), 1);
    let violation = &inclusion.violations[0];
    assert!(violation.message.contains(failing_week), "{}", violation.message);
    assert_eq!(violation.enforced, enforced);
}

#[test]
fn test_half_day_cap_counts_morning_and_afternoon_apart() {
    let model = InstitutionBuilder::new()
        .level("6e", &[("Math", 4.0)])
        .subject("Math", single("Curie"))
        .class("6A", "6e", 25)
        .teacher("Curie")
        .rule(RuleDocument::DailyCap {
            subjects: vec!["Math".to_string()],
            targets: Vec::new(),
            max: 1,
            span: CapSpan::HalfDay,
            strength: Strength::Hard,
        })
        .model();
    let mut tt = Timetable::empty_for(&model);
    // Two in the morning of week A, split around lunch in week B.
    put(&model, &mut tt, "6A", "Math", "Curie", WeekVariant::A, 0);
    put(&model, &mut tt, "6A", "Math", "Curie", WeekVariant::A, 1);
    put(&model, &mut tt, "6A", "Math", "Curie", WeekVariant::B, 0);
    put(&model, &mut tt, "6A", "Math", "Curie", WeekVariant::B, 5);

    let report = verify(&model, &tt);
    let caps = report.category(Category::DailyCap).unwrap();
    assert_eq!(caps.violations.len(), 1);
    let violation = &caps.violations[0];
    assert!(violation.message.contains("per morning in week A Mon"), "{}", violation.message);
    assert!(violation.message.contains("Math x2"));
    assert!(violation.enforced);
}

#[test]
fn test_disliked_period_is_an_optional_preference() {
    let curie = TeacherDocument {
        soft_unavailable: vec![window("Mon", &["08:00"])],
        ..teacher_doc("Curie")
    };
    let (model, tt) = place_math(math_school(curie).model());

    let report = verify(&model, &tt);
    let preference = report.category(Category::TeacherPreference).unwrap();
    assert!(!preference.mandatory);
    assert_eq!(preference.checked, 5);
    assert_eq!(preference.violations.len(), 1);
    assert!(preference.violations[0].message.contains("week A Mon 08:00"));
    assert!(!preference.violations[0].enforced);
    assert_eq!(report.mandatory_score, 100.0);
    assert!(report.category(Category::TeacherAvailability).unwrap().violations.is_empty());
}

#[test]
fn test_parallel_track_is_exempt_from_level_exclusivity() {
    let model = InstitutionBuilder::new()
        .level("6e", &[("Math", 1.0), ("Sport", 1.0)])
        .subject("Math", pool(&["Curie", "Noether"]))
        .subject_doc(SubjectDocument {
            name: "Sport".to_string(),
            teachers: pool(&["Coubertin", "Jordan"]),
            equity_scope: EquityScope::Level,
            parallel_track: true,
        })
        .class("6A", "6e", 25)
        .class("6B", "6e", 25)
        .teacher("Curie")
        .teacher("Noether")
        .teacher("Coubertin")
        .teacher("Jordan")
        .model();
    let mut tt = Timetable::empty_for(&model);
    put(&model, &mut tt, "6A", "Sport", "Coubertin", WeekVariant::A, 0);
    put(&model, &mut tt, "6B", "Sport", "Jordan", WeekVariant::A, 0);
    put(&model, &mut tt, "6A", "Math", "Curie", WeekVariant::A, 1);
    put(&model, &mut tt, "6B", "Math", "Noether", WeekVariant::A, 1);

    let report = verify(&model, &tt);
    let sync = report.category(Category::LevelSync).unwrap();
    assert_eq!(sync.violations.len(), 1);
    assert!(sync.violations[0].message.starts_with("6e/Math"));
}

#[rstest]
#[case(20, 4)]
#[case(30, 0)]
fn test_alternate_lunch_overflow_is_reported(#[case] capacity: u32, #[case] expected: usize) {
    let model = InstitutionBuilder::new()
        .alternate_lunch("13:00")
        .level("6e", &[("Math", 1.0)])
        .level("3e", &[("Math", 1.0)])
        .class("6A", "6e", 15)
        .class("3A", "3e", 25)
        .cafeteria(capacity, 1.0, CafeteriaPriority::Level)
        .model();
    let tt = Timetable::empty_for(&model);

    let report = verify(&model, &tt);
    let cafeteria = report.category(Category::Cafeteria).unwrap();
    // Four full days: one sitting check each plus one per week for 3A.
    assert_eq!(cafeteria.checked, 12);
    assert_eq!(cafeteria.violations.len(), expected);
    for v in &cafeteria.violations {
        assert!(v.message.contains("25 seats needed at the alternate lunch"));
        assert!(!v.enforced);
    }
}
