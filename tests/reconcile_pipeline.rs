use std::path::{Path, PathBuf};
use std::time::Duration;

use mtss_reconcile::config::ReconcileConfig;
use mtss_reconcile::dashboard::reconcile;
use mtss_reconcile::interventions::rank_by_urgency;
use mtss_reconcile::models::{CriticalIntervention, SegmentSource, StudentOrigin, TierCode};
use mtss_reconcile::report::build_report;
use mtss_reconcile::sources::{load_sources, load_viewer, SourcePaths};

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[tokio::test]
async fn escalated_assignment_overrides_roster_tier() {
    let dir = tempfile::tempdir().unwrap();
    let paths = SourcePaths {
        roster: Some(write(
            dir.path(),
            "roster.json",
            r#"[{"id": "s1", "name": "Avery Lee", "grade": "grade 7", "tier": "Tier 1"}]"#,
        )),
        assignments: Some(write(
            dir.path(),
            "assignments.json",
            r#"[{"_id": "a1", "studentIds": [{"_id": "s1"}], "tier": "tier3",
                 "status": "active", "focusAreas": ["Reading Fluency"]}]"#,
        )),
        mentors: None,
    };

    let (sources, report) = load_sources(&paths, Duration::from_secs(5)).await;
    assert!(report.is_complete());

    let viewer = load_viewer(None).await.unwrap();
    let dashboard = reconcile(&sources, &viewer, &ReconcileConfig::default());

    assert_eq!(dashboard.segment.source, SegmentSource::All);
    assert!(!dashboard.degraded);
    assert_eq!(dashboard.students.len(), 1);
    let student = &dashboard.students[0];
    assert_eq!(student.id, "s1");
    assert_eq!(student.grade, "Grade 7");
    assert_eq!(student.tier, "Tier 3");
    assert_eq!(student.tier_code, TierCode::Tier3);
    assert_eq!(student.focus, "Reading Fluency");
    assert_eq!(student.origin, StudentOrigin::Roster);
}

#[tokio::test]
async fn out_of_scope_roster_falls_back_to_assignment_students() {
    let dir = tempfile::tempdir().unwrap();
    let viewer_path = write(
        dir.path(),
        "viewer.json",
        r#"{"name": "Ms. Rivera", "classes": [{"grade": "Grade 2"}]}"#,
    );
    let paths = SourcePaths {
        roster: Some(write(
            dir.path(),
            "roster.json",
            r#"{"data": [{"_id": "s1", "name": "Avery Lee", "grade": "Grade 7"}]}"#,
        )),
        assignments: Some(write(
            dir.path(),
            "assignments.json",
            r#"{"data": [{"_id": "a1", "studentIds": [{"_id": "s9", "name": "Noor Haddad"}],
                          "tier": "tier2", "status": "active", "focusAreas": ["Math"]}]}"#,
        )),
        mentors: None,
    };

    let (sources, _) = load_sources(&paths, Duration::from_secs(5)).await;
    let viewer = load_viewer(Some(&viewer_path)).await.unwrap();
    let dashboard = reconcile(&sources, &viewer, &ReconcileConfig::default());

    assert_eq!(dashboard.segment.allowed_grades, vec!["Grade 2".to_string()]);
    assert!(dashboard.segment.strict_class_filter);
    assert!(dashboard.degraded);
    assert_eq!(dashboard.students.len(), 1);
    assert_eq!(dashboard.students[0].id, "s9");
    assert_eq!(dashboard.students[0].name, "Noor Haddad");
    assert_eq!(dashboard.students[0].origin, StudentOrigin::Assignment);
}

#[tokio::test]
async fn csv_roster_with_mentor_directory_and_a_broken_source() {
    let dir = tempfile::tempdir().unwrap();
    let paths = SourcePaths {
        roster: Some(write(
            dir.path(),
            "roster.csv",
            "id,name,grade,className,tier,type\n\
             s1,Avery Lee,Grade 7,Helix,Tier 2,Reading\n\
             s2,Jules Moreno,Grade 7,Helix,,\n",
        )),
        assignments: Some(write(
            dir.path(),
            "assignments.json",
            r#"[
                {"_id": "a1", "mentorId": "m1", "studentIds": ["s2"], "tier": "tier3",
                 "status": "paused", "focusAreas": ["Attendance"]},
                {"_id": "a2", "mentorId": "m1", "studentIds": ["s2"], "tier": "tier2",
                 "status": "active", "focusAreas": ["Math"]}
            ]"#,
        )),
        mentors: Some(write(dir.path(), "mentors.json", "{ broken")),
    };

    let (sources, report) = load_sources(&paths, Duration::from_secs(5)).await;
    assert_eq!(sources.roster.len(), 2);
    assert_eq!(sources.assignments.len(), 2);
    assert!(sources.mentors.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "mentors");

    let dashboard = reconcile(&sources, &Default::default(), &ReconcileConfig::default());
    assert_eq!(dashboard.students.len(), 2);

    let jules = dashboard.students.iter().find(|s| s.id == "s2").unwrap();
    // active outranks paused even though the paused plan is tier 3
    assert_eq!(jules.tier_code, TierCode::Tier2);
    assert_eq!(jules.focus, "Math");
    assert_eq!(jules.assignment_options.len(), 2);
    assert_eq!(jules.assignment_options[0].mentor, "-");

    let avery = dashboard.students.iter().find(|s| s.id == "s1").unwrap();
    assert_eq!(avery.tier, "Tier 2");
    assert_eq!(avery.focus, "Reading");
    assert!(avery.profile.is_none());

    let text = build_report(&dashboard, &report, 5);
    assert!(text.contains("> mentors data unavailable"));
    assert!(text.contains("## Tier Mix"));
}

#[tokio::test]
async fn urgency_ranking_puts_escalated_students_first() {
    let dir = tempfile::tempdir().unwrap();
    let paths = SourcePaths {
        roster: Some(write(
            dir.path(),
            "roster.json",
            r#"[
                {"id": "s1", "name": "Avery Lee", "grade": "Grade 5"},
                {"id": "s2", "name": "Jules Moreno", "grade": "Grade 5"}
            ]"#,
        )),
        assignments: Some(write(
            dir.path(),
            "assignments.json",
            r#"[{"_id": "a1", "studentIds": ["s2"], "tier": "tier3",
                 "status": "active", "focusAreas": ["Behavior"]}]"#,
        )),
        mentors: None,
    };

    let (sources, _) = load_sources(&paths, Duration::from_secs(5)).await;
    let dashboard = reconcile(&sources, &Default::default(), &ReconcileConfig::default());
    let ranked = rank_by_urgency(&dashboard.students);

    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].0.id, "s2");
    assert_eq!(ranked[0].1.tier_code(), TierCode::Tier3);
    assert_eq!(ranked[0].1.label(), "Behavior");
    assert_eq!(ranked[1].1, CriticalIntervention::Universal);
}

#[tokio::test]
async fn malformed_viewer_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let viewer_path = write(dir.path(), "viewer.json", "[not a viewer");
    assert!(load_viewer(Some(&viewer_path)).await.is_err());
}
