use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate};
use tracing::debug;

use crate::config::ReconcileConfig;
use crate::labels;
use crate::models::{
    AssignmentMap, AssignmentOption, AssignmentRecord, AssignmentStatus, ChartPoint, CheckIn,
    HistoryEntry, MappedStudent, MentorProfile, MentorRef, ProgressProfile, StudentRef, TierCode,
};
use crate::tiers;

pub const AWAITING_UPDATE: &str = "Awaiting update";
pub const INTENSIVE_FOCUS: &str = "Intensive Support";
pub const DEFAULT_FOCUS: &str = "Literacy & SEL";
const CHECK_IN_FALLBACK_NOTE: &str = "Check-in recorded";
const NO_SPOTLIGHT: &str = "No active interventions";

struct StudentIdentity {
    name: String,
    grade: String,
    class_name: String,
}

impl StudentIdentity {
    fn from_ref(student: &StudentRef) -> Self {
        let mut identity = StudentIdentity {
            name: String::new(),
            grade: String::new(),
            class_name: String::new(),
        };
        identity.fill_from(student);
        identity
    }

    /// Later references may carry fields an earlier bare id did not.
    fn fill_from(&mut self, student: &StudentRef) {
        let StudentRef::Profile(profile) = student else {
            return;
        };
        if self.name.is_empty() {
            self.name = profile.name.clone().unwrap_or_default();
        }
        let first_class = profile.classes.first();
        if self.grade.is_empty() {
            let grade_source = first_class
                .and_then(|c| c.grade().or(c.class_name()))
                .or(profile.unit.as_deref())
                .unwrap_or("");
            self.grade = labels::normalize_grade(grade_source);
        }
        if self.class_name.is_empty() {
            let class_source = first_class.and_then(|c| c.class_name()).unwrap_or("");
            self.class_name = labels::normalize_class(class_source);
        }
    }
}

struct Accumulated {
    identity: StudentIdentity,
    plan: AssignmentOption,
    options: Vec<AssignmentOption>,
}

pub fn map_assignments(
    records: &[AssignmentRecord],
    mentors: &[MentorProfile],
    viewer_name: &str,
    config: &ReconcileConfig,
) -> AssignmentMap {
    let mentor_names: HashMap<&str, &str> = mentors
        .iter()
        .filter_map(|m| Some((m.key()?, m.name.as_deref()?)))
        .collect();

    let mut order: Vec<String> = Vec::new();
    let mut by_student: HashMap<String, Accumulated> = HashMap::new();

    for (index, record) in records.iter().enumerate() {
        let option = build_option(record, index, &mentor_names, viewer_name, config);
        for student in &record.student_ids {
            let Some(id) = student.id() else {
                continue;
            };
            match by_student.get_mut(id) {
                Some(entry) => {
                    if outranks(&option, &entry.plan) {
                        entry.plan = option.clone();
                    }
                    if !entry.options.iter().any(|o| o.assignment_id == option.assignment_id) {
                        entry.options.push(option.clone());
                    }
                    entry.identity.fill_from(student);
                }
                None => {
                    order.push(id.to_string());
                    by_student.insert(
                        id.to_string(),
                        Accumulated {
                            identity: StudentIdentity::from_ref(student),
                            plan: option.clone(),
                            options: vec![option.clone()],
                        },
                    );
                }
            }
        }
    }

    let students: Vec<MappedStudent> = order
        .into_iter()
        .filter_map(|id| {
            let entry = by_student.remove(&id)?;
            let mut options = entry.options;
            options.sort_by(|a, b| tiers::compare_urgency((a.tier, a.status), (b.tier, b.status)));
            let name = if entry.identity.name.is_empty() {
                "-".to_string()
            } else {
                entry.identity.name
            };
            Some(MappedStudent {
                id,
                name,
                grade: entry.identity.grade,
                class_name: entry.identity.class_name,
                plan: entry.plan,
                assignment_options: options,
            })
        })
        .collect();

    let spotlight = students.iter().fold(None::<&MappedStudent>, |best, student| match best {
        Some(best) if best.plan.status.rank() >= student.plan.status.rank() => Some(best),
        _ => Some(student),
    });
    let spotlight_chart = spotlight
        .map(|s| s.plan.profile.chart.clone())
        .unwrap_or_default();
    let focus_label = spotlight
        .map(|s| s.plan.focus.clone())
        .unwrap_or_else(|| NO_SPOTLIGHT.to_string());

    debug!(
        assignments = records.len(),
        students = students.len(),
        "mapped assignment records"
    );

    AssignmentMap {
        students,
        spotlight_chart,
        focus_label,
    }
}

fn outranks(candidate: &AssignmentOption, current: &AssignmentOption) -> bool {
    (candidate.status.rank(), candidate.tier.rank()) > (current.status.rank(), current.tier.rank())
}

fn build_option(
    record: &AssignmentRecord,
    index: usize,
    mentor_names: &HashMap<&str, &str>,
    viewer_name: &str,
    config: &ReconcileConfig,
) -> AssignmentOption {
    let tier = tiers::assignment_tier(record.tier.as_deref());
    let status = AssignmentStatus::parse(record.status.as_deref());
    let goals_total = record.goals.len();
    let goals_completed = record
        .goals
        .iter()
        .filter(|g| g.completed.unwrap_or(false))
        .count();

    let current = record
        .check_ins
        .iter()
        .rev()
        .find_map(|c| c.value)
        .or_else(|| (goals_total > 0).then(|| percent(goals_completed, goals_total)));

    AssignmentOption {
        assignment_id: record
            .key()
            .map(str::to_string)
            .unwrap_or_else(|| format!("assignment-{}", index + 1)),
        mentor: mentor_name(record.mentor_id.as_ref(), mentor_names, viewer_name),
        tier,
        status,
        focus: focus_for(record, tier),
        focus_areas: record.focus_areas.clone(),
        strategies: record
            .goals
            .iter()
            .filter_map(|g| g.description.clone())
            .collect(),
        progress: status.label().to_string(),
        next_update: next_update(record, config.follow_up_days),
        profile: ProgressProfile {
            chart: progress_chart(record, status),
            history: history(&record.check_ins, config.history_limit),
            current,
            goals_completed,
            goals_total,
            start_date: record.start_date.as_deref().map(display_or_raw),
            end_date: record.end_date.as_deref().map(display_or_raw),
        },
    }
}

fn mentor_name(mentor: Option<&MentorRef>, directory: &HashMap<&str, &str>, viewer_name: &str) -> String {
    let resolved = match mentor {
        Some(MentorRef::Profile(profile)) => profile.name.clone(),
        Some(MentorRef::Id(id)) => directory.get(id.trim()).map(|name| name.to_string()),
        None => None,
    };
    resolved
        .or_else(|| (!viewer_name.trim().is_empty()).then(|| viewer_name.trim().to_string()))
        .unwrap_or_else(|| "-".to_string())
}

fn focus_for(record: &AssignmentRecord, tier: TierCode) -> String {
    match record.focus_areas.first() {
        Some(focus) => focus.clone(),
        None if tier == TierCode::Tier3 => INTENSIVE_FOCUS.to_string(),
        None => DEFAULT_FOCUS.to_string(),
    }
}

pub fn progress_chart(record: &AssignmentRecord, status: AssignmentStatus) -> Vec<ChartPoint> {
    if !record.check_ins.is_empty() {
        let total = record.check_ins.len();
        return record
            .check_ins
            .iter()
            .enumerate()
            .map(|(i, check_in)| ChartPoint {
                label: check_in
                    .date
                    .as_deref()
                    .and_then(parse_date)
                    .map(display_date)
                    .unwrap_or_else(|| format!("Check-in {}", i + 1)),
                value: percent(i + 1, total),
            })
            .collect();
    }

    if !record.goals.is_empty() {
        let total = record.goals.len();
        let mut completed = 0;
        return record
            .goals
            .iter()
            .enumerate()
            .map(|(i, goal)| {
                if goal.completed.unwrap_or(false) {
                    completed += 1;
                }
                ChartPoint {
                    label: format!("Goal {}", i + 1),
                    value: percent(completed, total),
                }
            })
            .collect();
    }

    let value = if status == AssignmentStatus::Completed { 100.0 } else { 0.0 };
    vec![ChartPoint {
        label: "Current".to_string(),
        value,
    }]
}

/// Most recent check-ins first.
pub fn history(check_ins: &[CheckIn], limit: usize) -> Vec<HistoryEntry> {
    check_ins
        .iter()
        .rev()
        .take(limit)
        .map(|check_in| HistoryEntry {
            date: check_in
                .date
                .as_deref()
                .map(display_or_raw)
                .unwrap_or_else(|| "-".to_string()),
            notes: check_in
                .summary
                .clone()
                .or_else(|| check_in.next_steps.clone())
                .unwrap_or_else(|| CHECK_IN_FALLBACK_NOTE.to_string()),
        })
        .collect()
}

pub fn next_update(record: &AssignmentRecord, follow_up_days: i64) -> String {
    let anchor = record
        .check_ins
        .last()
        .and_then(|c| c.date.as_deref())
        .and_then(parse_date)
        .or_else(|| record.start_date.as_deref().and_then(parse_date));

    anchor
        .and_then(|date| date.checked_add_signed(Duration::days(follow_up_days)))
        .map(display_date)
        .unwrap_or_else(|| AWAITING_UPDATE.to_string())
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok())
}

pub fn display_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

fn display_or_raw(raw: &str) -> String {
    parse_date(raw)
        .map(display_date)
        .unwrap_or_else(|| raw.to_string())
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let value = part as f64 / total as f64 * 100.0;
    (value * 10.0).round() / 10.0
}
