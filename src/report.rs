use std::fmt::Write;

use crate::dashboard::Dashboard;
use crate::interventions;
use crate::models::{CriticalIntervention, SegmentSource, Student, TierCode, TierSummary};
use crate::sources::SourceReport;

pub fn summarize_by_tier(students: &[Student]) -> Vec<TierSummary> {
    let mut summaries: Vec<TierSummary> = [TierCode::Tier3, TierCode::Tier2, TierCode::Tier1]
        .into_iter()
        .map(|tier| {
            let members: Vec<&Student> = students.iter().filter(|s| s.tier_code == tier).collect();
            let measured: Vec<f64> = members
                .iter()
                .filter_map(|s| s.profile.as_ref().and_then(|p| p.current))
                .collect();
            TierSummary {
                tier,
                count: members.len(),
                avg_current: if measured.is_empty() {
                    None
                } else {
                    Some(measured.iter().sum::<f64>() / measured.len() as f64)
                },
            }
        })
        .collect();

    summaries.retain(|summary| summary.count > 0);
    summaries
}

fn segment_label(dashboard: &Dashboard) -> String {
    let segment = &dashboard.segment;
    if segment.source == SegmentSource::All {
        return "all grades".to_string();
    }
    let mut label = segment.allowed_grades.join(", ");
    if segment.strict_class_filter && !segment.allowed_classes.is_empty() {
        let _ = write!(label, " (classes: {})", segment.allowed_classes.join(", "));
    }
    label
}

pub fn build_report(dashboard: &Dashboard, sources: &SourceReport, limit: usize) -> String {
    let summaries = summarize_by_tier(&dashboard.students);
    let ranked = interventions::rank_by_urgency(&dashboard.students);

    let mut output = String::new();
    let viewer_label = if dashboard.viewer_name.is_empty() {
        "all staff"
    } else {
        dashboard.viewer_name.as_str()
    };

    let _ = writeln!(output, "# MTSS Intervention Report");
    let _ = writeln!(
        output,
        "Generated for {} (scope: {})",
        viewer_label,
        segment_label(dashboard)
    );

    if !sources.is_complete() {
        let _ = writeln!(output);
        for (name, reason) in &sources.failures {
            let _ = writeln!(output, "> {name} data unavailable: {reason}");
        }
    }
    if dashboard.degraded {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "> No roster students matched this scope; showing students from assignments instead."
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Tier Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No students in scope.");
    } else {
        for summary in summaries.iter() {
            match summary.avg_current {
                Some(avg) => {
                    let _ = writeln!(
                        output,
                        "- {}: {} students (avg progress {:.1})",
                        summary.tier.label(),
                        summary.count,
                        avg
                    );
                }
                None => {
                    let _ = writeln!(output, "- {}: {} students", summary.tier.label(), summary.count);
                }
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Most Critical Interventions");

    let focused: Vec<_> = ranked
        .iter()
        .filter(|(_, critical)| matches!(critical, CriticalIntervention::Focused(_)))
        .take(limit)
        .collect();
    if focused.is_empty() {
        let _ = writeln!(output, "All students are on universal supports.");
    } else {
        for (student, critical) in focused {
            let placement = if student.class_name.is_empty() {
                student.grade.clone()
            } else {
                format!("{}, {}", student.grade, student.class_name)
            };
            let _ = write!(
                output,
                "- {} ({}): {} at {}",
                student.name,
                placement,
                critical.label(),
                critical.tier_code().label()
            );
            if let Some(strategy) = critical.strategy() {
                let _ = write!(output, ", strategy: {strategy}");
            }
            let _ = writeln!(output, ", next update {}", student.next_update);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Spotlight: {}", dashboard.focus_label);
    if dashboard.spotlight_chart.is_empty() {
        let _ = writeln!(output, "No progress recorded yet.");
    } else {
        for point in dashboard.spotlight_chart.iter() {
            let _ = writeln!(output, "- {}: {:.1}%", point.label, point.value);
        }
    }

    let mut recent: Vec<(&Student, &str, &str)> = dashboard
        .students
        .iter()
        .filter_map(|s| s.profile.as_ref().map(|p| (s, p)))
        .flat_map(|(s, p)| p.history.iter().map(move |h| (s, h.date.as_str(), h.notes.as_str())))
        .collect();
    recent.truncate(5);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Check-ins");

    if recent.is_empty() {
        let _ = writeln!(output, "No check-ins recorded.");
    } else {
        for (student, date, notes) in recent {
            let _ = writeln!(output, "- {} on {}: {}", student.name, date, notes);
        }
    }

    output
}
