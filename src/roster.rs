//! Combines the roster with mapped assignments under a viewer's segment.
//!
//! Assignments may escalate a student's displayed tier but a lower-ranked
//! assignment never downgrades a higher roster-declared tier. On equal tiers the
//! roster's own fields are kept.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::assignments::AWAITING_UPDATE;
use crate::interventions::{apply_assignment_options, ensure_student_interventions};
use crate::labels;
use crate::models::{AssignmentMap, MappedStudent, RosterEntry, Segment, Student, StudentOrigin, TierCode};
use crate::tiers;

const MISSING: &str = "-";

pub fn merge_roster(roster: &[RosterEntry], assignments: &AssignmentMap, segment: &Segment) -> Vec<Student> {
    let by_id: HashMap<&str, &MappedStudent> = assignments
        .students
        .iter()
        .map(|student| (student.id.as_str(), student))
        .collect();

    let mut merged = Vec::with_capacity(roster.len());
    let mut dropped = 0usize;

    for entry in roster {
        let grade = labels::normalize_grade(roster_grade_source(entry));
        let class_name = labels::normalize_class(entry.class_name.as_deref().unwrap_or(""));
        if !segment.admits(&grade, &class_name) {
            dropped += 1;
            continue;
        }

        let id = entry.key().map(str::to_string).unwrap_or_default();
        let mapped = by_id.get(id.as_str()).copied().filter(|_| !id.is_empty());
        merged.push(merge_entry(entry, id, grade, class_name, mapped));
    }

    debug!(
        roster = roster.len(),
        kept = merged.len(),
        dropped,
        "merged roster against segment"
    );

    if merged.is_empty() && !assignments.students.is_empty() {
        warn!(
            roster = roster.len(),
            assignment_students = assignments.students.len(),
            "segment filtering left no roster students, showing assignment students instead"
        );
        return assignments.students.iter().map(student_from_assignment).collect();
    }

    merged
}

/// Legacy rosters put the grade in whichever of these fields they had.
fn roster_grade_source(entry: &RosterEntry) -> &str {
    entry
        .grade
        .as_deref()
        .or(entry.current_grade.as_deref())
        .or(entry.class_name.as_deref())
        .or(entry.unit.as_deref())
        .unwrap_or("")
}

fn merge_entry(
    entry: &RosterEntry,
    id: String,
    grade: String,
    class_name: String,
    mapped: Option<&MappedStudent>,
) -> Student {
    let roster_rank = tiers::declared_rank(entry.tier.as_deref());
    let options = mapped.map(|m| m.assignment_options.clone()).unwrap_or_default();
    let interventions = apply_assignment_options(ensure_student_interventions(&entry.interventions), &options);
    let name = entry
        .name
        .clone()
        .or_else(|| mapped.map(|m| m.name.clone()))
        .unwrap_or_else(|| MISSING.to_string());

    match mapped {
        Some(mapped) if roster_rank == 0 || mapped.plan.tier.rank() > roster_rank => {
            let plan = &mapped.plan;
            Student {
                id,
                name,
                grade,
                class_name,
                tier: plan.tier.label().to_string(),
                tier_code: plan.tier,
                focus: plan.focus.clone(),
                progress: plan.progress.clone(),
                next_update: plan.next_update.clone(),
                interventions,
                assignment_options: options,
                profile: Some(plan.profile.clone()),
                origin: StudentOrigin::Roster,
            }
        }
        _ => {
            let tier_code = tiers::declared_tier(entry.tier.as_deref()).unwrap_or(TierCode::Tier1);
            Student {
                id,
                name,
                grade,
                class_name,
                tier: tier_code.label().to_string(),
                tier_code,
                focus: entry.focus.clone().unwrap_or_else(|| MISSING.to_string()),
                progress: entry.progress.clone().unwrap_or_else(|| MISSING.to_string()),
                next_update: entry
                    .next_update
                    .clone()
                    .unwrap_or_else(|| AWAITING_UPDATE.to_string()),
                interventions,
                assignment_options: options,
                profile: None,
                origin: StudentOrigin::Roster,
            }
        }
    }
}

fn student_from_assignment(mapped: &MappedStudent) -> Student {
    let plan = &mapped.plan;
    Student {
        id: mapped.id.clone(),
        name: mapped.name.clone(),
        grade: mapped.grade.clone(),
        class_name: mapped.class_name.clone(),
        tier: plan.tier.label().to_string(),
        tier_code: plan.tier,
        focus: plan.focus.clone(),
        progress: plan.progress.clone(),
        next_update: plan.next_update.clone(),
        interventions: apply_assignment_options(
            ensure_student_interventions(&[]),
            &mapped.assignment_options,
        ),
        assignment_options: mapped.assignment_options.clone(),
        profile: Some(plan.profile.clone()),
        origin: StudentOrigin::Assignment,
    }
}
