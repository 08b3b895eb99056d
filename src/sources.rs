use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Result, SourceError};
use crate::models::{AssignmentRecord, MentorProfile, RosterEntry, Viewer};

#[derive(Debug, Clone, Default)]
pub struct SourcePaths {
    pub roster: Option<PathBuf>,
    pub assignments: Option<PathBuf>,
    pub mentors: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct Sources {
    pub roster: Vec<RosterEntry>,
    pub assignments: Vec<AssignmentRecord>,
    pub mentors: Vec<MentorProfile>,
}

/// Which sources were replaced by an empty array, and why.
#[derive(Debug, Clone, Default)]
pub struct SourceReport {
    pub failures: Vec<(&'static str, String)>,
}

impl SourceReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn settle<T>(&mut self, name: &'static str, result: Result<Vec<T>>) -> Vec<T> {
        match result {
            Ok(items) => {
                info!(source = name, count = items.len(), "loaded source");
                items
            }
            Err(err) => {
                warn!(source = name, error = %err, "source unavailable, continuing without it");
                self.failures.push((name, err.to_string()));
                Vec::new()
            }
        }
    }
}

/// REST payloads arrive either as a bare array or wrapped in `{"data": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Payload<T> {
    List(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> Payload<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Payload::List(items) => items,
            Payload::Wrapped { data } => data,
        }
    }
}

pub async fn load_sources(paths: &SourcePaths, timeout: Duration) -> (Sources, SourceReport) {
    let (roster, assignments, mentors) = tokio::join!(
        fetch("roster", paths.roster.as_deref(), timeout, read_roster),
        fetch("assignments", paths.assignments.as_deref(), timeout, read_json::<AssignmentRecord>),
        fetch("mentors", paths.mentors.as_deref(), timeout, read_json::<MentorProfile>),
    );

    let mut report = SourceReport::default();
    let sources = Sources {
        roster: report.settle("roster", roster),
        assignments: report.settle("assignments", assignments),
        mentors: report.settle("mentors", mentors),
    };
    (sources, report)
}

/// A missing viewer file means an unscoped viewer; a malformed one is an error.
pub async fn load_viewer(path: Option<&Path>) -> Result<Viewer> {
    let Some(path) = path else {
        return Ok(Viewer::default());
    };
    let text = read_text(path).await?;
    serde_json::from_str(&text).map_err(|source| SourceError::Json {
        path: path.to_path_buf(),
        source,
    })
}

async fn fetch<T, F, Fut>(
    name: &'static str,
    path: Option<&Path>,
    timeout: Duration,
    read: F,
) -> Result<Vec<T>>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    match tokio::time::timeout(timeout, read(path.to_path_buf())).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::TimedOut {
            source_name: name,
            millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })
}

async fn read_json<T: DeserializeOwned>(path: PathBuf) -> Result<Vec<T>> {
    let text = read_text(&path).await?;
    let records = match serde_json::from_str::<Payload<Value>>(&text) {
        Ok(payload) => payload.into_vec(),
        Err(source) => return Err(SourceError::Json { path, source }),
    };
    Ok(decode_records(&path, records))
}

/// One bad record is skipped, not the whole source.
fn decode_records<T: DeserializeOwned>(path: &Path, records: Vec<Value>) -> Vec<T> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value(record) {
            Ok(item) => Some(item),
            Err(err) => {
                warn!(path = %path.display(), index, error = %err, "skipping malformed record");
                None
            }
        })
        .collect()
}

async fn read_roster(path: PathBuf) -> Result<Vec<RosterEntry>> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    if !is_csv {
        return read_json(path).await;
    }

    let text = read_text(&path).await?;
    parse_roster_csv(&text).map_err(|source| SourceError::Csv { path, source })
}

fn parse_roster_csv(text: &str) -> std::result::Result<Vec<RosterEntry>, csv::Error> {
    #[derive(Deserialize)]
    struct CsvRow {
        id: Option<String>,
        #[serde(rename = "_id")]
        object_id: Option<String>,
        name: Option<String>,
        grade: Option<String>,
        #[serde(alias = "currentGrade")]
        current_grade: Option<String>,
        #[serde(alias = "className")]
        class_name: Option<String>,
        unit: Option<String>,
        tier: Option<String>,
        #[serde(alias = "type")]
        focus: Option<String>,
        progress: Option<String>,
        #[serde(alias = "nextUpdate")]
        next_update: Option<String>,
    }

    let clean = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut entries = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        let row = row?;
        entries.push(RosterEntry {
            id: clean(row.object_id).or(clean(row.id)),
            object_id: None,
            name: clean(row.name),
            grade: clean(row.grade),
            current_grade: clean(row.current_grade),
            class_name: clean(row.class_name),
            unit: clean(row.unit),
            tier: clean(row.tier),
            focus: clean(row.focus),
            progress: clean(row.progress),
            next_update: clean(row.next_update),
            interventions: Vec::new(),
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_roster_prefers_object_id_column() {
        let csv = "_id,id,name\ns1,legacy-1,Avery Lee\n,legacy-2,Jules Moreno\n";
        let entries = parse_roster_csv(csv).unwrap();
        assert_eq!(entries[0].key(), Some("s1"));
        assert_eq!(entries[1].key(), Some("legacy-2"));
    }

    #[test]
    fn csv_roster_accepts_camel_case_headers() {
        let csv = "_id,name,currentGrade,className,tier,type\n\
                   s1,Avery Lee,grade 7,Grade 7 - Helix,Tier 2,Reading\n\
                   s2,Jules Moreno,,, ,\n";
        let entries = parse_roster_csv(csv).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id.as_deref(), Some("s1"));
        assert_eq!(entries[0].current_grade.as_deref(), Some("grade 7"));
        assert_eq!(entries[0].focus.as_deref(), Some("Reading"));
        assert!(entries[1].tier.is_none());
        assert!(entries[1].class_name.is_none());
    }

    #[tokio::test]
    async fn missing_and_malformed_sources_degrade_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let roster = dir.path().join("roster.json");
        let assignments = dir.path().join("assignments.json");
        std::fs::write(&roster, r#"{"data": [{"_id": "s1", "name": "Avery"}]}"#).unwrap();
        std::fs::write(&assignments, "[{ not json").unwrap();

        let paths = SourcePaths {
            roster: Some(roster),
            assignments: Some(assignments),
            mentors: Some(dir.path().join("missing.json")),
        };
        let (sources, report) = load_sources(&paths, Duration::from_secs(5)).await;

        assert_eq!(sources.roster.len(), 1);
        assert!(sources.assignments.is_empty());
        assert!(sources.mentors.is_empty());
        let failed: Vec<&str> = report.failures.iter().map(|(name, _)| *name).collect();
        assert_eq!(failed, vec!["assignments", "mentors"]);
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_individually() {
        let dir = tempfile::tempdir().unwrap();
        let assignments = dir.path().join("assignments.json");
        std::fs::write(
            &assignments,
            r#"[
                {"_id": "a1", "id": "a1", "studentIds": ["s1"], "tier": "tier2"},
                {"_id": "a2", "mentorId": 7, "studentIds": [99]},
                {"_id": "a3", "checkIns": "soon"}
            ]"#,
        )
        .unwrap();

        let paths = SourcePaths {
            assignments: Some(assignments),
            ..SourcePaths::default()
        };
        let (sources, report) = load_sources(&paths, Duration::from_secs(5)).await;

        assert!(report.is_complete());
        let ids: Vec<&str> = sources.assignments.iter().filter_map(|a| a.key()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
        let student: Vec<&str> = sources.assignments[1].student_ids.iter().filter_map(|s| s.id()).collect();
        assert_eq!(student, vec!["99"]);
    }

    #[tokio::test]
    async fn unset_sources_are_empty_without_failures() {
        let (sources, report) = load_sources(&SourcePaths::default(), Duration::from_secs(1)).await;
        assert!(sources.roster.is_empty());
        assert!(report.is_complete());
        let viewer = load_viewer(None).await.unwrap();
        assert!(viewer.classes.is_empty());
    }
}
