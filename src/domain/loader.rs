//! Resolves a name-keyed `InstitutionDocument` into an id-keyed `Institution`.
//!
//! Every reference is checked here. An unknown subject, teacher, class, level,
//! room, day or period fails with `TimeForgeError::Config` naming the culprit;
//! nothing is skipped silently.

use super::calendar::Calendar;
use super::document::*;
use super::entities::*;
use super::ids::*;
use super::rules::{ConstraintRule, InclusionMode};
use super::Institution;
use crate::consts::HALF_HOUR_EPSILON;
use crate::error::{TfResult, TimeForgeError};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

struct Names {
    days: HashMap<String, usize>,
    periods: HashMap<String, usize>,
    subjects: HashMap<String, SubjectId>,
    levels: HashMap<String, LevelId>,
    teachers: HashMap<String, TeacherId>,
    rooms: HashMap<String, RoomId>,
    groups: HashMap<String, GroupId>,
}

impl Names {
    fn subject(&self, name: &str, context: &str) -> TfResult<SubjectId> {
        self.subjects.get(name).copied().ok_or_else(|| {
            TimeForgeError::config(format!("{}: unknown subject '{}'", context, name))
        })
    }

    fn level(&self, name: &str, context: &str) -> TfResult<LevelId> {
        self.levels.get(name).copied().ok_or_else(|| {
            TimeForgeError::config(format!("{}: unknown level '{}'", context, name))
        })
    }

    fn teacher(&self, name: &str, context: &str) -> TfResult<TeacherId> {
        self.teachers.get(name).copied().ok_or_else(|| {
            TimeForgeError::config(format!("{}: unknown teacher '{}'", context, name))
        })
    }

    fn room(&self, name: &str, context: &str) -> TfResult<RoomId> {
        self.rooms.get(name).copied().ok_or_else(|| {
            TimeForgeError::config(format!("{}: unknown room '{}'", context, name))
        })
    }

    fn group(&self, name: &str, context: &str) -> TfResult<GroupId> {
        self.groups.get(name).copied().ok_or_else(|| {
            TimeForgeError::config(format!("{}: unknown class '{}'", context, name))
        })
    }

    fn day(&self, name: &str, context: &str) -> TfResult<usize> {
        self.days.get(name).copied().ok_or_else(|| {
            TimeForgeError::config(format!("{}: unknown day '{}'", context, name))
        })
    }

    fn period(&self, name: &str, context: &str) -> TfResult<usize> {
        self.periods.get(name).copied().ok_or_else(|| {
            TimeForgeError::config(format!("{}: unknown period '{}'", context, name))
        })
    }
}

fn index_names<T, F>(items: &[String], kind: &str, make: F) -> TfResult<HashMap<String, T>>
where
    F: Fn(usize) -> T,
{
    // Ids are u16 indices.
    let limit = usize::from(u16::MAX) + 1;
    if items.len() > limit {
        return Err(TimeForgeError::config(format!(
            "{} {} entries exceed the limit of {}",
            items.len(),
            kind,
            limit
        )));
    }
    let mut map = HashMap::with_capacity(items.len());
    for (i, name) in items.iter().enumerate() {
        if name.trim().is_empty() {
            return Err(TimeForgeError::config(format!("{} #{} has an empty name", kind, i)));
        }
        if map.insert(name.clone(), make(i)).is_some() {
            return Err(TimeForgeError::config(format!(
                "duplicate {} '{}'",
                kind, name
            )));
        }
    }
    Ok(map)
}

pub fn resolve(doc: InstitutionDocument) -> TfResult<Institution> {
    let calendar = resolve_calendar(&doc.calendar)?;

    // Subject catalog: declared subjects first, then anything a level schedules.
    let mut subject_names: Vec<String> = doc.subjects.iter().map(|s| s.name.clone()).collect();
    let declared: HashSet<&str> = doc.subjects.iter().map(|s| s.name.as_str()).collect();
    if declared.len() != doc.subjects.len() {
        return Err(TimeForgeError::config("duplicate subject declaration"));
    }
    for level in &doc.levels {
        for name in level.hours.keys() {
            if !subject_names.contains(name) {
                subject_names.push(name.clone());
            }
        }
    }

    let level_names: Vec<String> = doc.levels.iter().map(|l| l.name.clone()).collect();
    let teacher_names: Vec<String> = doc.teachers.iter().map(|t| t.name.clone()).collect();
    let room_names: Vec<String> = doc.rooms.iter().map(|r| r.name.clone()).collect();
    let group_names: Vec<String> = doc.groups.iter().map(|g| g.name.clone()).collect();

    let names = Names {
        days: index_names(&calendar.days, "day", |i| i)?,
        periods: index_names(&calendar.periods, "period", |i| i)?,
        subjects: index_names(&subject_names, "subject", SubjectId::from_index)?,
        levels: index_names(&level_names, "level", LevelId::from_index)?,
        teachers: index_names(&teacher_names, "teacher", TeacherId::from_index)?,
        rooms: index_names(&room_names, "room", RoomId::from_index)?,
        groups: index_names(&group_names, "class", GroupId::from_index)?,
    };

    let subjects = subject_names
        .iter()
        .map(|name| match doc.subjects.iter().find(|s| &s.name == name) {
            Some(s) => Subject {
                name: name.clone(),
                equity_scope: s.equity_scope,
                parallel_track: s.parallel_track,
            },
            None => Subject {
                name: name.clone(),
                equity_scope: EquityScope::default(),
                parallel_track: false,
            },
        })
        .collect::<Vec<_>>();

    let levels = doc
        .levels
        .iter()
        .map(|l| resolve_level(l, &names))
        .collect::<TfResult<Vec<_>>>()?;

    let rooms = doc
        .rooms
        .iter()
        .map(|r| resolve_room(r, &names, &calendar))
        .collect::<TfResult<Vec<_>>>()?;

    let teachers = doc
        .teachers
        .iter()
        .map(|t| resolve_teacher(t, &names, &calendar))
        .collect::<TfResult<Vec<_>>>()?;

    let (groups, families) = resolve_groups(&doc.groups, &names, &levels)?;

    let bindings = resolve_bindings(&doc, &names, &subject_names, &levels)?;

    let base_classes: Vec<GroupId> = groups
        .iter()
        .enumerate()
        .filter(|(_, g)| g.is_base())
        .map(|(i, _)| GroupId::from_index(i))
        .collect();

    let rules = doc
        .rules
        .iter()
        .map(|r| resolve_rule(r, &names, &calendar, &groups, &base_classes))
        .collect::<TfResult<Vec<_>>>()?;

    let cafeteria = match &doc.cafeteria {
        Some(c) => {
            if !(0.0..=1.0).contains(&c.boarding_ratio) {
                return Err(TimeForgeError::config(format!(
                    "cafeteria boarding ratio {} is outside [0, 1]",
                    c.boarding_ratio
                )));
            }
            Some(CafeteriaSettings {
                capacity: c.capacity,
                boarding_ratio: c.boarding_ratio,
                priority: c.priority,
            })
        }
        None => None,
    };

    debug!(
        "Resolved institution: {} levels, {} subjects, {} groups, {} teachers, {} rooms, {} rules",
        levels.len(),
        subjects.len(),
        groups.len(),
        teachers.len(),
        rooms.len(),
        rules.len()
    );

    Ok(Institution {
        calendar,
        levels,
        subjects,
        families,
        groups,
        teachers,
        rooms,
        bindings,
        rules,
        cafeteria,
        default_daily_cap: doc.default_daily_cap,
    })
}

fn resolve_calendar(doc: &CalendarDocument) -> TfResult<Calendar> {
    if doc.days.is_empty() {
        return Err(TimeForgeError::config("calendar has no teaching days"));
    }
    if doc.periods.is_empty() {
        return Err(TimeForgeError::config("calendar has no periods"));
    }
    if doc.periods.len() > u8::MAX as usize || doc.days.len() > u8::MAX as usize {
        return Err(TimeForgeError::config("calendar grid is too large"));
    }

    let find_period = |name: &str| {
        doc.periods.iter().position(|p| p == name).ok_or_else(|| {
            TimeForgeError::config(format!("calendar: unknown period '{}'", name))
        })
    };

    let lunch_period = find_period(&doc.lunch_period)? as u8;
    let alternate_lunch_period = match &doc.alternate_lunch_period {
        Some(name) => {
            let idx = find_period(name)? as u8;
            if idx == lunch_period {
                return Err(TimeForgeError::config(
                    "calendar: alternate lunch period equals the primary lunch period",
                ));
            }
            Some(idx)
        }
        None => None,
    };

    let mut short_days = vec![false; doc.days.len()];
    for name in &doc.short_days {
        let idx = doc.days.iter().position(|d| d == name).ok_or_else(|| {
            TimeForgeError::config(format!("calendar: unknown short day '{}'", name))
        })?;
        short_days[idx] = true;
    }

    Ok(Calendar {
        days: doc.days.clone(),
        periods: doc.periods.clone(),
        short_days,
        lunch_period,
        alternate_lunch_period,
    })
}

fn resolve_windows(
    windows: &[WindowDocument],
    names: &Names,
    calendar: &Calendar,
    context: &str,
) -> TfResult<CellMask> {
    let mut mask = CellMask::empty(calendar.cell_count());
    for cell in window_cells(windows, names, calendar, context)? {
        mask.set(cell);
    }
    Ok(mask)
}

fn window_cells(
    windows: &[WindowDocument],
    names: &Names,
    calendar: &Calendar,
    context: &str,
) -> TfResult<Vec<usize>> {
    let mut cells = Vec::new();
    for w in windows {
        let day = names.day(&w.day, context)?;
        if w.periods.is_empty() {
            cells.extend((0..calendar.period_count()).map(|p| calendar.cell(day, p)));
        } else {
            for p in &w.periods {
                let period = names.period(p, context)?;
                cells.push(calendar.cell(day, period));
            }
        }
    }
    cells.sort_unstable();
    cells.dedup();
    Ok(cells)
}

fn resolve_level(doc: &LevelDocument, names: &Names) -> TfResult<Level> {
    let context = format!("level '{}'", doc.name);
    let mut hours = BTreeMap::new();
    for (subject, &h) in &doc.hours {
        let id = names.subject(subject, &context)?;
        let doubled = h * 2.0;
        if h < 0.0 || (doubled - doubled.round()).abs() > HALF_HOUR_EPSILON {
            return Err(TimeForgeError::config(format!(
                "{}: {} hours for '{}' is not a non-negative multiple of 0.5",
                context, h, subject
            )));
        }
        hours.insert(id, h);
    }

    let mut bag_weights = BTreeMap::new();
    for (subject, &w) in &doc.bag_weights {
        bag_weights.insert(names.subject(subject, &context)?, w);
    }

    Ok(Level {
        name: doc.name.clone(),
        hours,
        bag_weights,
        bag_ceiling: doc.bag_ceiling,
    })
}

fn resolve_room(doc: &RoomDocument, names: &Names, calendar: &Calendar) -> TfResult<Room> {
    let context = format!("room '{}'", doc.name);
    let subjects = doc
        .subjects
        .iter()
        .map(|s| names.subject(s, &context))
        .collect::<TfResult<Vec<_>>>()?;
    let teachers = doc
        .teachers
        .iter()
        .map(|t| names.teacher(t, &context))
        .collect::<TfResult<Vec<_>>>()?;

    Ok(Room {
        name: doc.name.clone(),
        capacity: doc.capacity,
        affinity: RoomAffinity { subjects, teachers },
        unavailable: resolve_windows(&doc.unavailable, names, calendar, &context)?,
    })
}

fn resolve_teacher(doc: &TeacherDocument, names: &Names, calendar: &Calendar) -> TfResult<Teacher> {
    let context = format!("teacher '{}'", doc.name);
    for s in &doc.subjects {
        names.subject(s, &context)?;
    }
    for l in &doc.levels {
        names.level(l, &context)?;
    }
    let preferred_room = match &doc.preferred_room {
        Some(r) => Some(names.room(r, &context)?),
        None => None,
    };

    Ok(Teacher {
        name: doc.name.clone(),
        unavailable: resolve_windows(&doc.unavailable, names, calendar, &context)?,
        soft_unavailable: resolve_windows(&doc.soft_unavailable, names, calendar, &context)?,
        max_weekly_hours: doc.max_weekly_hours,
        preferred_room,
    })
}

fn resolve_groups(
    docs: &[GroupDocument],
    names: &Names,
    levels: &[Level],
) -> TfResult<(Vec<TeachingGroup>, Vec<Family>)> {
    let mut families: Vec<Family> = Vec::new();
    let mut groups = Vec::with_capacity(docs.len());

    for doc in docs {
        let context = format!("class '{}'", doc.name);
        if doc.size == 0 {
            return Err(TimeForgeError::config(format!("{}: size must be positive", context)));
        }

        if doc.parents.is_empty() {
            if doc.subject.is_some() || doc.family.is_some() || doc.sync_key.is_some() {
                return Err(TimeForgeError::config(format!(
                    "{}: subject/family/sync_key require parents",
                    context
                )));
            }
            let level_name = doc.level.as_ref().ok_or_else(|| {
                TimeForgeError::config(format!("{}: a base class needs a level", context))
            })?;
            groups.push(TeachingGroup {
                name: doc.name.clone(),
                level: names.level(level_name, &context)?,
                size: doc.size,
                kind: GroupKind::Base,
            });
            continue;
        }

        let mut parents = Vec::with_capacity(doc.parents.len());
        for p in &doc.parents {
            let id = names.group(p, &context)?;
            let parent_doc = &docs[id.index()];
            if !parent_doc.parents.is_empty() {
                return Err(TimeForgeError::config(format!(
                    "{}: parent '{}' is itself a sub-group",
                    context, p
                )));
            }
            parents.push(id);
        }

        let subject_name = doc.subject.as_ref().ok_or_else(|| {
            TimeForgeError::config(format!("{}: a sub-group needs a subject", context))
        })?;
        let subject = names.subject(subject_name, &context)?;

        let level = match &doc.level {
            Some(l) => names.level(l, &context)?,
            None => {
                let first = &docs[parents[0].index()];
                let l = first.level.as_ref().ok_or_else(|| {
                    TimeForgeError::config(format!("{}: parent has no level", context))
                })?;
                names.level(l, &context)?
            }
        };
        if !levels[level.index()].hours.contains_key(&subject) {
            return Err(TimeForgeError::config(format!(
                "{}: subject '{}' has no hours at level '{}'",
                context,
                subject_name,
                levels[level.index()].name
            )));
        }

        let family = match &doc.family {
            Some(name) => {
                let mode = doc.family_mode.unwrap_or_default();
                match families.iter().position(|f| &f.name == name) {
                    Some(idx) => {
                        if families[idx].mode != mode && doc.family_mode.is_some() {
                            return Err(TimeForgeError::config(format!(
                                "{}: family '{}' declared with conflicting modes",
                                context, name
                            )));
                        }
                        Some(FamilyId::from_index(idx))
                    }
                    None => {
                        families.push(Family {
                            name: name.clone(),
                            mode,
                        });
                        Some(FamilyId::from_index(families.len() - 1))
                    }
                }
            }
            None => None,
        };

        groups.push(TeachingGroup {
            name: doc.name.clone(),
            level,
            size: doc.size,
            kind: GroupKind::Sub(SubGroupInfo {
                parents,
                subject,
                family,
                sync_key: doc.sync_key.clone(),
            }),
        });
    }

    Ok((groups, families))
}

fn resolve_binding_list(
    binding: &TeacherBinding,
    names: &Names,
    context: &str,
) -> TfResult<Vec<TeacherId>> {
    match binding {
        TeacherBinding::Single(name) => Ok(vec![names.teacher(name, context)?]),
        TeacherBinding::Pool(list) => {
            let mut ids = Vec::with_capacity(list.len());
            for name in list {
                let id = names.teacher(name, context)?;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            Ok(ids)
        }
        TeacherBinding::PerLevel(_) => Err(TimeForgeError::config(format!(
            "{}: per-level bindings cannot be nested",
            context
        ))),
    }
}

fn resolve_bindings(
    doc: &InstitutionDocument,
    names: &Names,
    subject_names: &[String],
    levels: &[Level],
) -> TfResult<BTreeMap<(SubjectId, LevelId), Vec<TeacherId>>> {
    let mut bindings = BTreeMap::new();

    for subject_doc in &doc.subjects {
        let Some(binding) = &subject_doc.teachers else {
            continue;
        };
        let context = format!("subject '{}'", subject_doc.name);
        let subject = names.subject(&subject_doc.name, &context)?;

        match binding {
            TeacherBinding::PerLevel(map) => {
                for (level_name, inner) in map {
                    let level = names.level(level_name, &context)?;
                    bindings.insert((subject, level), resolve_binding_list(inner, names, &context)?);
                }
            }
            flat => {
                let ids = resolve_binding_list(flat, names, &context)?;
                for (li, level) in levels.iter().enumerate() {
                    if level.hours.contains_key(&subject) {
                        bindings.insert((subject, LevelId::from_index(li)), ids.clone());
                    }
                }
            }
        }
    }

    // Pairs without an explicit binding fall back to teachers' declarations.
    for (li, level) in levels.iter().enumerate() {
        let level_id = LevelId::from_index(li);
        for &subject in level.hours.keys() {
            if bindings.contains_key(&(subject, level_id)) {
                continue;
            }
            let subject_name = &subject_names[subject.index()];
            let pool: Vec<TeacherId> = doc
                .teachers
                .iter()
                .enumerate()
                .filter(|(_, t)| {
                    t.subjects.iter().any(|s| s == subject_name)
                        && (t.levels.is_empty() || t.levels.iter().any(|l| l == &level.name))
                })
                .map(|(i, _)| TeacherId::from_index(i))
                .collect();
            if pool.is_empty() {
                warn!(
                    "No teacher teaches '{}' at level '{}'; sessions will have no teacher",
                    subject_name, level.name
                );
            } else {
                bindings.insert((subject, level_id), pool);
            }
        }
    }

    Ok(bindings)
}

fn resolve_targets(
    targets: &[String],
    names: &Names,
    groups: &[TeachingGroup],
    base_classes: &[GroupId],
    context: &str,
) -> TfResult<Vec<GroupId>> {
    if targets.is_empty() {
        return Ok(base_classes.to_vec());
    }
    let mut out = Vec::new();
    for name in targets {
        if let Some(&g) = names.groups.get(name) {
            if !groups[g.index()].is_base() {
                return Err(TimeForgeError::config(format!(
                    "{}: target '{}' is a sub-group; rules target classes or levels",
                    context, name
                )));
            }
            out.push(g);
        } else if let Some(&level) = names.levels.get(name) {
            out.extend(
                base_classes
                    .iter()
                    .copied()
                    .filter(|g| groups[g.index()].level == level),
            );
        } else {
            return Err(TimeForgeError::config(format!(
                "{}: unknown class or level '{}'",
                context, name
            )));
        }
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

fn resolve_rule(
    doc: &RuleDocument,
    names: &Names,
    calendar: &Calendar,
    groups: &[TeachingGroup],
    base_classes: &[GroupId],
) -> TfResult<ConstraintRule> {
    match doc {
        RuleDocument::DailyCap {
            subjects,
            targets,
            max,
            span,
            strength,
        } => {
            let context = "daily_cap rule";
            Ok(ConstraintRule::DailyCap {
                subjects: subjects
                    .iter()
                    .map(|s| names.subject(s, context))
                    .collect::<TfResult<Vec<_>>>()?,
                targets: resolve_targets(targets, names, groups, base_classes, context)?,
                max: *max,
                span: *span,
                strength: *strength,
            })
        }
        RuleDocument::Exclusion {
            first,
            then,
            targets,
            strength,
        } => {
            let context = "exclusion rule";
            Ok(ConstraintRule::Exclusion {
                first: names.subject(first, context)?,
                then: names.subject(then, context)?,
                targets: resolve_targets(targets, names, groups, base_classes, context)?,
                strength: *strength,
            })
        }
        RuleDocument::Inclusion {
            first,
            then,
            targets,
            mode,
            count,
        } => {
            let context = "inclusion rule";
            let need_count = || {
                count.ok_or_else(|| {
                    TimeForgeError::config(format!("{}: mode requires a count", context))
                })
            };
            let mode = match mode {
                InclusionKind::AtLeast => InclusionMode::AtLeast(need_count()?),
                InclusionKind::Always => InclusionMode::Always,
                InclusionKind::AtMost => InclusionMode::AtMost(need_count()?),
            };
            Ok(ConstraintRule::Inclusion {
                first: names.subject(first, context)?,
                then: names.subject(then, context)?,
                targets: resolve_targets(targets, names, groups, base_classes, context)?,
                mode,
            })
        }
        RuleDocument::FixedSlot {
            subjects,
            targets,
            window,
            count,
        } => {
            let context = "fixed_slot rule";
            let window = window_cells(window, names, calendar, context)?;
            if (*count as usize) > window.len() {
                return Err(TimeForgeError::config(format!(
                    "{}: count {} exceeds the {} cells of the window",
                    context,
                    count,
                    window.len()
                )));
            }
            Ok(ConstraintRule::FixedSlot {
                subjects: subjects
                    .iter()
                    .map(|s| names.subject(s, context))
                    .collect::<TfResult<Vec<_>>>()?,
                targets: resolve_targets(targets, names, groups, base_classes, context)?,
                window,
                count: *count,
            })
        }
        RuleDocument::LevelSync { level, subject } => {
            let context = "level_sync rule";
            Ok(ConstraintRule::LevelSync {
                level: names.level(level, context)?,
                subject: names.subject(subject, context)?,
            })
        }
    }
}
