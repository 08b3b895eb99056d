use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::labels::{self, KINDERGARTEN_GRADES};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ViewerScope {
    #[serde(default)]
    pub grades: Vec<String>,
    #[serde(default)]
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Days added to the last check-in (or start date) to schedule the next update.
    pub follow_up_days: i64,
    /// Check-ins kept in a student's history log, most recent first.
    pub history_limit: usize,
    pub kindergarten_classes: Vec<String>,
    pub unit_grades: BTreeMap<String, Vec<String>>,
    pub legacy_viewers: BTreeMap<String, ViewerScope>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        let kindergarten: Vec<String> = KINDERGARTEN_GRADES.iter().map(|g| g.to_string()).collect();
        let grades = |range: std::ops::RangeInclusive<u32>| -> Vec<String> {
            range.map(|n| format!("Grade {n}")).collect()
        };

        let mut unit_grades = BTreeMap::new();
        unit_grades.insert("kindergarten".to_string(), kindergarten.clone());
        unit_grades.insert("pelangi".to_string(), kindergarten);
        unit_grades.insert("elementary".to_string(), grades(1..=6));
        unit_grades.insert("primary".to_string(), grades(1..=6));
        unit_grades.insert("junior high".to_string(), grades(7..=9));
        unit_grades.insert("senior high".to_string(), grades(10..=12));

        Self {
            follow_up_days: 7,
            history_limit: 6,
            kindergarten_classes: vec![
                "Kindergarten - Pre-K".to_string(),
                "Kindergarten - K1".to_string(),
                "Kindergarten - K2".to_string(),
            ],
            unit_grades,
            legacy_viewers: BTreeMap::new(),
        }
    }
}

impl ReconcileConfig {
    pub fn from_toml(text: &str) -> std::result::Result<Self, toml::de::Error> {
        let parsed: ReconcileConfig = toml::from_str(text)?;
        Ok(parsed.normalized())
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            debug!("no config file given, using built-in directory defaults");
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|e| SourceError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(
            path = %path.display(),
            units = config.unit_grades.len(),
            legacy_viewers = config.legacy_viewers.len(),
            "loaded directory config"
        );
        Ok(config)
    }

    /// Default grades for a viewer's unit, if the unit is known.
    pub fn unit_default(&self, unit: Option<&str>) -> Option<&[String]> {
        let key = labels::normalize_key(unit?);
        self.unit_grades
            .get(&key)
            .map(Vec::as_slice)
            .filter(|grades| !grades.is_empty())
    }

    pub fn legacy_scope(&self, key: &str) -> Option<&ViewerScope> {
        self.legacy_viewers
            .get(&labels::normalize_key(key))
            .filter(|scope| !scope.grades.is_empty())
    }

    /// Lookup keys are stored normalized so files can use any spelling.
    fn normalized(self) -> Self {
        Self {
            follow_up_days: self.follow_up_days.clamp(0, 365),
            history_limit: self.history_limit,
            kindergarten_classes: self
                .kindergarten_classes
                .iter()
                .map(|c| labels::normalize_class(c))
                .filter(|c| !c.is_empty())
                .collect(),
            unit_grades: self
                .unit_grades
                .into_iter()
                .map(|(unit, grades)| {
                    let grades = grades.iter().map(|g| labels::normalize_grade(g)).collect();
                    (labels::normalize_key(&unit), grades)
                })
                .collect(),
            legacy_viewers: self
                .legacy_viewers
                .into_iter()
                .map(|(key, scope)| {
                    let scope = ViewerScope {
                        grades: scope.grades.iter().map(|g| labels::normalize_grade(g)).collect(),
                        classes: scope.classes.iter().map(|c| labels::normalize_class(c)).collect(),
                    };
                    (labels::normalize_key(&key), scope)
                })
                .collect(),
        }
    }
}
