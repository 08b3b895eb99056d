use crate::models::{
    AssignmentOption, CriticalIntervention, FocusedIntervention, InterventionRef, InterventionSlot,
    InterventionType, ProgressProfile, RawInterventionSlot, SlotStatus, Student, TierCode,
};
use crate::tiers;

/// Progress assumed for a slot with no measurement: "fine", so it never wins a tie.
const ASSUMED_CURRENT: f64 = 100.0;

const FOCUS_KEYWORDS: [(InterventionType, &[&str]); 5] = [
    (InterventionType::Sel, &["sel", "social", "emotion", "wellbeing", "counsel"]),
    (
        InterventionType::English,
        &["english", "read", "literacy", "writ", "language", "phonic", "esl"],
    ),
    (InterventionType::Math, &["math", "numeracy", "arithmetic"]),
    (InterventionType::Behavior, &["behav", "conduct"]),
    (InterventionType::Attendance, &["attend", "absen", "tardi"]),
];

/// Always exactly one slot per type. Duplicates keep the populated, higher-tier
/// entry (first seen on a tie); unknown types are ignored.
pub fn ensure_student_interventions(raw: &[RawInterventionSlot]) -> [InterventionSlot; 5] {
    InterventionType::ALL.map(|kind| {
        raw.iter()
            .filter(|slot| slot.kind.as_deref().and_then(InterventionType::parse) == Some(kind))
            .map(|slot| slot_from_raw(kind, slot))
            .fold(None::<InterventionSlot>, |best, slot| match best {
                Some(best) if slot_key(&best) >= slot_key(&slot) => Some(best),
                _ => Some(slot),
            })
            .unwrap_or_else(|| InterventionSlot::universal(kind))
    })
}

fn slot_key(slot: &InterventionSlot) -> (bool, u8) {
    (slot.has_data, slot.tier_code.rank())
}

fn slot_from_raw(kind: InterventionType, raw: &RawInterventionSlot) -> InterventionSlot {
    let tier_code = tiers::declared_tier(raw.reported_tier()).unwrap_or(TierCode::Tier1);
    let inferred = tier_code.is_escalated()
        || !raw.strategies.is_empty()
        || !raw.history.is_empty()
        || raw.reported_current().is_some();
    InterventionSlot {
        kind,
        tier_code,
        status: SlotStatus::parse(raw.status.as_deref()),
        strategies: raw.strategies.clone(),
        history: raw.history.clone(),
        has_data: raw.has_data.unwrap_or(inferred),
        current_value: raw.reported_current(),
    }
}

pub fn classify_focus(focus: &str) -> Vec<InterventionType> {
    let lowered = focus.to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    FOCUS_KEYWORDS
        .iter()
        .filter(|(_, keywords)| {
            tokens
                .iter()
                .any(|token| keywords.iter().any(|keyword| keyword_matches(token, keyword)))
        })
        .map(|(kind, _)| *kind)
        .collect()
}

fn keyword_matches(token: &str, keyword: &str) -> bool {
    if keyword.len() <= 3 {
        token == keyword
    } else {
        token.starts_with(keyword)
    }
}

fn option_covers(option: &AssignmentOption, kind: InterventionType) -> bool {
    option
        .focus_areas
        .iter()
        .any(|focus| classify_focus(focus).contains(&kind))
}

fn slot_from_option(kind: InterventionType, option: &AssignmentOption) -> InterventionSlot {
    InterventionSlot {
        kind,
        tier_code: option.tier,
        status: option.status.slot_status(),
        strategies: option.strategies.clone(),
        history: option.profile.history.clone(),
        has_data: true,
        current_value: option.profile.current,
    }
}

/// Overlays assignment plans on stored slots. `options` must be most urgent first;
/// a plan replaces a stored slot only when that slot is empty or the plan's tier is higher.
pub fn apply_assignment_options(
    slots: [InterventionSlot; 5],
    options: &[AssignmentOption],
) -> [InterventionSlot; 5] {
    slots.map(|slot| {
        let Some(option) = options.iter().find(|option| option_covers(option, slot.kind)) else {
            return slot;
        };
        if !slot.has_data || option.tier.rank() > slot.tier_code.rank() {
            slot_from_option(slot.kind, option)
        } else {
            slot
        }
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyFallback<'a> {
    pub tier: Option<&'a str>,
    pub focus: Option<&'a str>,
}

impl<'a> LegacyFallback<'a> {
    pub fn from_student(student: &'a Student) -> Self {
        Self {
            tier: Some(student.tier.as_str()),
            focus: Some(student.focus.as_str()),
        }
    }

    fn escalated(&self) -> Option<(TierCode, &'a str)> {
        let tier = tiers::declared_tier(self.tier).filter(|t| t.is_escalated())?;
        let focus = self.focus.map(str::trim).filter(|f| !f.is_empty() && *f != "-")?;
        Some((tier, focus))
    }
}

pub fn select_most_critical(
    slots: &[InterventionSlot],
    profile: Option<&ProgressProfile>,
    fallback: &LegacyFallback<'_>,
) -> CriticalIntervention {
    let default_current = profile.and_then(|p| p.current).unwrap_or(ASSUMED_CURRENT);
    let current = |slot: &InterventionSlot| slot.current_value.unwrap_or(default_current);

    let mut escalated: Vec<&InterventionSlot> = slots
        .iter()
        .filter(|slot| slot.has_data && slot.tier_code.is_escalated())
        .collect();
    escalated.sort_by(|a, b| {
        tiers::compare_tiers_desc(a.tier_code, b.tier_code).then_with(|| current(a).total_cmp(&current(b)))
    });

    match (escalated.first(), fallback.escalated()) {
        (None, None) => CriticalIntervention::Universal,
        (None, Some((tier, focus))) => legacy_result(tier, focus),
        (Some(top), Some((tier, focus))) if tier.rank() > top.tier_code.rank() => legacy_result(tier, focus),
        (Some(top), _) => CriticalIntervention::Focused(FocusedIntervention {
            intervention: InterventionRef::Slot(top.kind),
            tier: top.tier_code.label().to_string(),
            tier_code: top.tier_code,
            label: top.kind.label().to_string(),
            strategy: top.strategies.first().cloned(),
        }),
    }
}

fn legacy_result(tier: TierCode, focus: &str) -> CriticalIntervention {
    CriticalIntervention::Focused(FocusedIntervention {
        intervention: InterventionRef::Legacy(focus.to_string()),
        tier: tier.label().to_string(),
        tier_code: tier,
        label: focus.to_string(),
        strategy: None,
    })
}

pub fn critical_for(student: &Student) -> CriticalIntervention {
    select_most_critical(
        &student.interventions,
        student.profile.as_ref(),
        &LegacyFallback::from_student(student),
    )
}

/// Students paired with their critical intervention, most urgent first:
/// tier, then lowest progress, then name and id for a stable table order.
pub fn rank_by_urgency(students: &[Student]) -> Vec<(&Student, CriticalIntervention)> {
    let mut ranked: Vec<(&Student, CriticalIntervention, f64)> = students
        .iter()
        .map(|student| {
            let critical = critical_for(student);
            let current = urgency_value(student, &critical);
            (student, critical, current)
        })
        .collect();

    ranked.sort_by(|a, b| {
        tiers::compare_tiers_desc(a.1.tier_code(), b.1.tier_code())
            .then_with(|| a.2.total_cmp(&b.2))
            .then_with(|| a.0.name.cmp(&b.0.name))
            .then_with(|| a.0.id.cmp(&b.0.id))
    });
    ranked.into_iter().map(|(student, critical, _)| (student, critical)).collect()
}

fn urgency_value(student: &Student, critical: &CriticalIntervention) -> f64 {
    let profile_current = student.profile.as_ref().and_then(|p| p.current);
    let slot_current = match critical {
        CriticalIntervention::Focused(FocusedIntervention {
            intervention: InterventionRef::Slot(kind),
            ..
        }) => student
            .interventions
            .iter()
            .find(|slot| slot.kind == *kind)
            .and_then(|slot| slot.current_value),
        _ => None,
    };
    slot_current.or(profile_current).unwrap_or(ASSUMED_CURRENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssignmentStatus, HistoryEntry};

    fn slot(kind: InterventionType, tier: TierCode, current: Option<f64>) -> InterventionSlot {
        InterventionSlot {
            kind,
            tier_code: tier,
            status: SlotStatus::Active,
            strategies: Vec::new(),
            history: Vec::new(),
            has_data: true,
            current_value: current,
        }
    }

    fn raw(kind: &str, tier: Option<&str>) -> RawInterventionSlot {
        RawInterventionSlot {
            kind: Some(kind.to_string()),
            tier_code: tier.map(str::to_string),
            ..RawInterventionSlot::default()
        }
    }

    fn profile(current: Option<f64>) -> ProgressProfile {
        ProgressProfile {
            chart: Vec::new(),
            history: Vec::new(),
            current,
            goals_completed: 0,
            goals_total: 0,
            start_date: None,
            end_date: None,
        }
    }

    fn option(focus: &[&str], tier: TierCode) -> AssignmentOption {
        AssignmentOption {
            assignment_id: "a1".to_string(),
            mentor: "Mr. Okafor".to_string(),
            tier,
            status: AssignmentStatus::Active,
            focus: focus.first().unwrap_or(&"").to_string(),
            focus_areas: focus.iter().map(|f| f.to_string()).collect(),
            strategies: vec!["Small-group phonics".to_string()],
            progress: "Active".to_string(),
            next_update: "Mar 8, 2026".to_string(),
            profile: ProgressProfile {
                history: vec![HistoryEntry {
                    date: "Mar 1, 2026".to_string(),
                    notes: "Baseline".to_string(),
                }],
                ..profile(Some(30.0))
            },
        }
    }

    #[test]
    fn slot_set_is_always_complete() {
        let empty = ensure_student_interventions(&[]);
        let kinds: Vec<InterventionType> = empty.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, InterventionType::ALL.to_vec());
        assert!(empty.iter().all(|s| !s.has_data && s.tier_code == TierCode::Tier1));

        let messy = vec![
            raw("math", Some("tier2")),
            raw("MATH", Some("tier3")),
            raw("Art", Some("tier3")),
            raw("sel", None),
            raw("behaviour", Some("Tier 2")),
            raw("math", Some("tier3")),
        ];
        let slots = ensure_student_interventions(&messy);
        assert_eq!(slots.len(), 5);
        assert_eq!(slots[2].kind, InterventionType::Math);
        assert_eq!(slots[2].tier_code, TierCode::Tier3);
        assert!(!slots[0].has_data);
        assert_eq!(slots[3].tier_code, TierCode::Tier2);
        assert_eq!(slots[4], InterventionSlot::universal(InterventionType::Attendance));
    }

    #[test]
    fn focus_areas_map_to_slot_types() {
        assert_eq!(classify_focus("Reading Fluency"), vec![InterventionType::English]);
        assert_eq!(
            classify_focus("Literacy & SEL"),
            vec![InterventionType::Sel, InterventionType::English]
        );
        assert_eq!(classify_focus("Baseline numeracy"), vec![InterventionType::Math]);
        assert!(classify_focus("Intensive Support").is_empty());
    }

    #[test]
    fn assignment_plans_escalate_but_never_downgrade_slots() {
        let stored = ensure_student_interventions(&[raw("ENGLISH", Some("tier3")), raw("MATH", Some("tier2"))]);
        let options = vec![
            option(&["Reading Fluency"], TierCode::Tier2),
            option(&["Math facts"], TierCode::Tier3),
            option(&["Attendance check"], TierCode::Tier2),
        ];
        let slots = apply_assignment_options(stored, &options);
        assert_eq!(slots[1].tier_code, TierCode::Tier3);
        assert!(slots[1].strategies.is_empty());
        assert_eq!(slots[2].tier_code, TierCode::Tier3);
        assert_eq!(slots[2].current_value, Some(30.0));
        assert_eq!(slots[4].tier_code, TierCode::Tier2);
        assert_eq!(slots[4].history.len(), 1);
        assert!(!slots[0].has_data);
    }

    #[test]
    fn lower_current_value_breaks_tier_ties() {
        let slots = vec![
            slot(InterventionType::Math, TierCode::Tier2, Some(40.0)),
            slot(InterventionType::Behavior, TierCode::Tier2, Some(20.0)),
        ];
        let result = select_most_critical(&slots, None, &LegacyFallback::default());
        let CriticalIntervention::Focused(focused) = result else {
            panic!("expected a focused result");
        };
        assert_eq!(focused.intervention, InterventionRef::Slot(InterventionType::Behavior));
        assert_eq!(focused.tier, "Tier 2");
    }

    #[test]
    fn higher_tier_beats_lower_progress() {
        let slots = vec![
            slot(InterventionType::Math, TierCode::Tier2, Some(5.0)),
            slot(InterventionType::Sel, TierCode::Tier3, Some(90.0)),
        ];
        let result = select_most_critical(&slots, None, &LegacyFallback::default());
        assert_eq!(result.label(), "SEL");
        assert_eq!(result.tier_code(), TierCode::Tier3);
    }

    #[test]
    fn missing_measurements_assume_fine() {
        let slots = vec![
            slot(InterventionType::Attendance, TierCode::Tier2, None),
            slot(InterventionType::English, TierCode::Tier2, Some(80.0)),
        ];
        let result = select_most_critical(&slots, None, &LegacyFallback::default());
        assert_eq!(result.label(), "English");

        // The profile's current value stands in for unmeasured slots.
        let result = select_most_critical(&slots, Some(&profile(Some(10.0))), &LegacyFallback::default());
        assert_eq!(result.label(), "Attendance");
    }

    #[test]
    fn universal_when_nothing_is_escalated() {
        let slots = ensure_student_interventions(&[raw("MATH", Some("tier1"))]);
        let result = select_most_critical(&slots, None, &LegacyFallback::default());
        assert_eq!(result, CriticalIntervention::Universal);
        assert_eq!(result.label(), "Universal");
        assert_eq!(result.tier_code(), TierCode::Tier1);

        let tier1_fallback = LegacyFallback {
            tier: Some("Tier 1"),
            focus: Some("Reading"),
        };
        assert_eq!(
            select_most_critical(&slots, None, &tier1_fallback),
            CriticalIntervention::Universal
        );
    }

    #[test]
    fn legacy_fallback_fills_in_and_overrides_only_when_higher() {
        let fallback = LegacyFallback {
            tier: Some("Tier 3"),
            focus: Some("Intensive Support"),
        };
        let none_escalated = ensure_student_interventions(&[]);
        let result = select_most_critical(&none_escalated, None, &fallback);
        assert_eq!(result.label(), "Intensive Support");
        assert_eq!(result.strategy(), None);

        let tier2 = vec![slot(InterventionType::Math, TierCode::Tier2, Some(50.0))];
        assert_eq!(select_most_critical(&tier2, None, &fallback).label(), "Intensive Support");

        let tier3 = vec![slot(InterventionType::Math, TierCode::Tier3, Some(50.0))];
        assert_eq!(select_most_critical(&tier3, None, &fallback).label(), "Math");
    }

    #[test]
    fn selection_is_deterministic() {
        let mut first = slot(InterventionType::Math, TierCode::Tier2, Some(40.0));
        first.strategies = vec!["Number talks".to_string(), "Fact fluency".to_string()];
        let slots = vec![first, slot(InterventionType::Sel, TierCode::Tier2, Some(40.0))];
        let fallback = LegacyFallback::default();
        let a = select_most_critical(&slots, None, &fallback);
        let b = select_most_critical(&slots, None, &fallback);
        assert_eq!(a, b);
        assert_eq!(a.label(), "Math");
        assert_eq!(a.strategy(), Some("Number talks"));
    }

    fn student(id: &str, name: &str, slots: [InterventionSlot; 5]) -> Student {
        Student {
            id: id.to_string(),
            name: name.to_string(),
            grade: "Grade 5".to_string(),
            class_name: String::new(),
            tier: "Tier 1".to_string(),
            tier_code: TierCode::Tier1,
            focus: "-".to_string(),
            progress: "-".to_string(),
            next_update: "Awaiting update".to_string(),
            interventions: slots,
            assignment_options: Vec::new(),
            profile: None,
            origin: crate::models::StudentOrigin::Roster,
        }
    }

    #[test]
    fn urgency_orders_by_tier_then_progress_then_name() {
        let with = |kind: InterventionType, tier: TierCode, current: f64| {
            let mut slots = ensure_student_interventions(&[]);
            for s in slots.iter_mut().filter(|s| s.kind == kind) {
                *s = slot(kind, tier, Some(current));
            }
            slots
        };
        let students = vec![
            student("s1", "Zane", ensure_student_interventions(&[])),
            student("s2", "Bea", with(InterventionType::Math, TierCode::Tier2, 60.0)),
            student("s3", "Ada", with(InterventionType::Sel, TierCode::Tier2, 60.0)),
            student("s4", "Cy", with(InterventionType::English, TierCode::Tier2, 20.0)),
            student("s5", "Dee", with(InterventionType::Behavior, TierCode::Tier3, 90.0)),
        ];

        let order: Vec<&str> = rank_by_urgency(&students)
            .iter()
            .map(|(student, _)| student.id.as_str())
            .collect();
        assert_eq!(order, vec!["s5", "s4", "s3", "s2", "s1"]);
    }
}
