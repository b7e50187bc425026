use super::volume::{two_week_total, SplitKey};
use super::*;
use crate::error::{TfResult, TimeForgeError};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Derives the constraint model from a resolved institution. Deterministic:
/// the same institution always yields the same model.
pub fn build(institution: Institution) -> TfResult<TimetableModel> {
    let cafeteria = cafeteria::plan(&institution)?;
    let mut groups = build_groups(&institution, &cafeteria);
    let mut demands = build_demands(&institution, &mut groups)?;
    let pools = pools::build(&institution, &mut demands);
    let (clusters, level_synced) = build_clusters(&institution, &mut demands)?;
    let split_keys = build_split_keys(&clusters, &mut demands);
    compile_rules(&institution, &mut groups);
    check_room_for_volume(&institution, &groups, &demands)?;

    info!(
        "Model: {} demands, {} pools, {} sync clusters, {} split keys",
        demands.len(),
        pools.len(),
        clusters.len(),
        split_keys.len()
    );

    Ok(TimetableModel {
        institution,
        demands,
        groups,
        pools,
        clusters,
        split_keys,
        level_synced,
        cafeteria,
    })
}

fn build_groups(institution: &Institution, cafeteria: &CafeteriaPlan) -> Vec<GroupModel> {
    let calendar = &institution.calendar;
    institution
        .group_ids()
        .map(|g| {
            let group = institution.group(g);
            let row_classes = if group.is_base() {
                vec![g]
            } else {
                group.parents().to_vec()
            };

            let mut blocked = CellMask::empty(calendar.cell_count());
            for cell in 0..calendar.cell_count() {
                if calendar.is_globally_blocked(cell) {
                    blocked.set(cell);
                }
            }
            if let Some(alt) = calendar.alternate_lunch_period {
                for day in 0..calendar.day_count() {
                    if row_classes.iter().any(|c| cafeteria.is_shifted(*c, day)) {
                        blocked.set(calendar.cell(day, alt as usize));
                    }
                }
            }

            GroupModel {
                blocked,
                demands: Vec::new(),
                row_classes,
                children: institution.children_of(g),
                rules: ClassRules::default(),
            }
        })
        .collect()
}

fn build_demands(institution: &Institution, groups: &mut [GroupModel]) -> TfResult<Vec<Demand>> {
    let mut demands = Vec::new();

    for g in institution.group_ids() {
        let group = institution.group(g);
        let level = &institution.levels[group.level.index()];

        let subjects: Vec<(SubjectId, f64)> = match group.sub_info() {
            Some(info) => vec![(info.subject, level.hours.get(&info.subject).copied().unwrap_or(0.0))],
            None => {
                let delegated: Vec<SubjectId> = groups[g.index()]
                    .children
                    .iter()
                    .filter_map(|c| institution.group(*c).sub_info().map(|i| i.subject))
                    .collect();
                level
                    .hours
                    .iter()
                    .filter(|(s, _)| !delegated.contains(s))
                    .map(|(s, h)| (*s, *h))
                    .collect()
            }
        };

        for (subject, hours) in subjects {
            let total = two_week_total(hours).map_err(|e| {
                TimeForgeError::config(format!("class '{}': {}", group.name, e))
            })?;
            if total == 0 {
                continue;
            }

            let rooms = if institution.rooms.is_empty() {
                Vec::new()
            } else {
                let pool = institution.teachers_for(subject, group.level);
                let candidates: Vec<RoomId> = institution
                    .rooms
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| r.can_host(subject, group.size, pool))
                    .map(|(i, _)| RoomId::from_index(i))
                    .collect();
                if candidates.is_empty() {
                    return Err(TimeForgeError::config(format!(
                        "no room can host '{}' for class '{}' ({} students)",
                        institution.subjects[subject.index()].name,
                        group.name,
                        group.size
                    )));
                }
                candidates
            };

            let id = DemandId::from_index(demands.len());
            groups[g.index()].demands.push(id);
            demands.push(Demand {
                group: g,
                subject,
                level: group.level,
                two_week_total: total,
                pool: None,
                rooms,
                cluster: None,
                split_key: 0,
            });
        }
    }

    Ok(demands)
}

fn build_clusters(
    institution: &Institution,
    demands: &mut [Demand],
) -> TfResult<(Vec<SyncCluster>, BTreeSet<(LevelId, SubjectId)>)> {
    let mut clusters = Vec::new();

    let mut by_key: BTreeMap<String, Vec<DemandId>> = BTreeMap::new();
    for (i, d) in demands.iter().enumerate() {
        if let Some(key) = institution.group(d.group).sub_info().and_then(|s| s.sync_key.clone()) {
            by_key.entry(key).or_default().push(DemandId::from_index(i));
        }
    }
    for (key, members) in by_key {
        if members.len() < 2 {
            continue;
        }
        let total = demands[members[0].index()].two_week_total;
        if members.iter().any(|m| demands[m.index()].two_week_total != total) {
            return Err(TimeForgeError::config(format!(
                "sync group '{}' mixes sub-groups with different volumes",
                key
            )));
        }
        clusters.push(SyncCluster {
            label: key,
            kind: ClusterKind::SubGroup,
            level: demands[members[0].index()].level,
            members,
        });
    }

    let mut level_synced = BTreeSet::new();
    for rule in &institution.rules {
        let ConstraintRule::LevelSync { level, subject } = rule else {
            continue;
        };
        if !level_synced.insert((*level, *subject)) {
            continue;
        }
        let members: Vec<DemandId> = demands
            .iter()
            .enumerate()
            .filter(|(_, d)| {
                d.level == *level
                    && d.subject == *subject
                    && d.cluster.is_none()
                    && institution.group(d.group).is_base()
            })
            .map(|(i, _)| DemandId::from_index(i))
            .collect();
        if members.len() < 2 {
            continue;
        }
        clusters.push(SyncCluster {
            label: format!(
                "{}/{}",
                institution.levels[level.index()].name,
                institution.subjects[subject.index()].name
            ),
            kind: ClusterKind::LevelSync,
            level: *level,
            members,
        });
    }

    for (ci, cluster) in clusters.iter().enumerate() {
        for m in &cluster.members {
            demands[m.index()].cluster = Some(ci);
        }
        debug!("Sync cluster '{}': {} members", cluster.label, cluster.members.len());
    }

    Ok((clusters, level_synced))
}

fn build_split_keys(clusters: &[SyncCluster], demands: &mut [Demand]) -> Vec<SplitKey> {
    let mut keys: Vec<SplitKey> = clusters
        .iter()
        .map(|c| SplitKey {
            level: c.level,
            two_week_total: demands[c.members[0].index()].two_week_total,
        })
        .collect();

    let mut by_pair: BTreeMap<(LevelId, SubjectId, u32), usize> = BTreeMap::new();
    for d in demands.iter_mut() {
        d.split_key = match d.cluster {
            Some(c) => c,
            None => *by_pair
                .entry((d.level, d.subject, d.two_week_total))
                .or_insert_with(|| {
                    keys.push(SplitKey {
                        level: d.level,
                        two_week_total: d.two_week_total,
                    });
                    keys.len() - 1
                }),
        };
    }
    keys
}

fn compile_rules(institution: &Institution, groups: &mut [GroupModel]) {
    for g in institution.base_classes() {
        let rules = &mut groups[g.index()].rules;
        if let Some(max) = institution.default_daily_cap {
            rules.caps.push(CapRule {
                rule: None,
                subjects: Vec::new(),
                max,
                span: CapSpan::Day,
                strength: Strength::Hard,
            });
        }
    }

    for (idx, rule) in institution.rules.iter().enumerate() {
        for target in rule.targets() {
            let rules = &mut groups[target.index()].rules;
            match rule {
                ConstraintRule::DailyCap {
                    subjects,
                    max,
                    span,
                    strength,
                    ..
                } => rules.caps.push(CapRule {
                    rule: Some(idx),
                    subjects: subjects.clone(),
                    max: *max,
                    span: *span,
                    strength: *strength,
                }),
                ConstraintRule::Exclusion {
                    first,
                    then,
                    strength,
                    ..
                } => rules.exclusions.push(ExclusionRule {
                    rule: idx,
                    first: *first,
                    then: *then,
                    strength: *strength,
                }),
                ConstraintRule::Inclusion {
                    first, then, mode, ..
                } => rules.inclusions.push(InclusionRule {
                    rule: idx,
                    first: *first,
                    then: *then,
                    mode: *mode,
                }),
                ConstraintRule::FixedSlot {
                    subjects,
                    window,
                    count,
                    ..
                } => rules.fixed.push(FixedSlotRule {
                    rule: idx,
                    subjects: subjects.clone(),
                    window: window.clone(),
                    count: *count,
                }),
                ConstraintRule::LevelSync { .. } => {}
            }
        }
    }
}

/// Rejects groups whose weekly load cannot fit in their free periods.
fn check_room_for_volume(
    institution: &Institution,
    groups: &[GroupModel],
    demands: &[Demand],
) -> TfResult<()> {
    let cells = institution.calendar.cell_count();
    for (gi, gm) in groups.iter().enumerate() {
        let free = (0..cells).filter(|c| !gm.blocked.contains(*c)).count() as u32;
        let needed: u32 = gm
            .demands
            .iter()
            .map(|d| demands[d.index()].two_week_total.div_ceil(2))
            .sum();
        if needed > free {
            return Err(TimeForgeError::config(format!(
                "class '{}' needs up to {} sessions a week but has only {} free periods",
                institution.groups[gi].name, needed, free
            )));
        }
    }
    Ok(())
}
