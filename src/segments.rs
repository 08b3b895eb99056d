//! Viewer scoping: which grades and classes a staff member may see.
//!
//! Signals are tried in priority order and the first one that yields grades wins
//! outright; nothing is merged across signals. Failure to resolve anything means
//! "unrestricted", not "show nothing".

use tracing::debug;

use crate::config::ReconcileConfig;
use crate::labels::{self, KINDERGARTEN, KINDERGARTEN_GRADES};
use crate::models::{Segment, SegmentSource, Viewer};

const SPLIT_SECTION_GRADES: [&str; 4] = ["Grade 1", "Grade 2", "Grade 3", "Grade 4"];

struct Candidate {
    grades: Vec<String>,
    classes: Vec<String>,
    source: SegmentSource,
}

impl Candidate {
    fn new(source: SegmentSource) -> Self {
        Self {
            grades: Vec::new(),
            classes: Vec::new(),
            source,
        }
    }

    fn into_option(self) -> Option<Self> {
        (!self.grades.is_empty()).then_some(self)
    }
}

pub fn derive_segments(viewer: &Viewer, config: &ReconcileConfig) -> Segment {
    let unit_default = config.unit_default(viewer.unit.as_deref());
    let candidate = from_classes(viewer, config)
        .or_else(|| from_job_position(viewer))
        .or_else(|| from_legacy_lookup(viewer, config));

    let (grades, classes, source) = match (candidate, unit_default) {
        (Some(found), _) if found.grades.iter().any(|g| labels::is_specific_grade(g)) => {
            (found.grades, found.classes, found.source)
        }
        // A job title or unit name alone must not scope the viewer to nothing.
        (Some(found), Some(defaults)) => (defaults.to_vec(), found.classes, SegmentSource::Unit),
        (Some(found), None) => (found.grades, found.classes, found.source),
        (None, Some(defaults)) => (defaults.to_vec(), Vec::new(), SegmentSource::Unit),
        (None, None) => {
            debug!(viewer = viewer.display_name(), "no segment signal matched, viewer is unrestricted");
            return Segment::unrestricted();
        }
    };

    let strict_class_filter = is_kindergarten_unit(viewer.unit.as_deref())
        || grades
            .iter()
            .any(|g| g.starts_with(KINDERGARTEN) || SPLIT_SECTION_GRADES.contains(&g.as_str()));

    debug!(
        viewer = viewer.display_name(),
        ?source,
        grades = grades.len(),
        classes = classes.len(),
        strict_class_filter,
        "resolved viewer segment"
    );

    Segment {
        allowed_grades: grades,
        allowed_classes: classes,
        strict_class_filter,
        source,
    }
}

fn from_classes(viewer: &Viewer, config: &ReconcileConfig) -> Option<Candidate> {
    let mut found = Candidate::new(SegmentSource::Classes);
    for class in &viewer.classes {
        let grade_raw = class.grade().unwrap_or("");
        let class_raw = class.class_name().unwrap_or("");
        let class_label = labels::normalize_class(class_raw);
        let sectioned = class_label.contains(" - ");

        if labels::in_kindergarten_band(&format!("{grade_raw} {class_raw}")) && !sectioned {
            for grade in KINDERGARTEN_GRADES {
                push_unique(&mut found.grades, grade.to_string());
            }
            for kindergarten_class in &config.kindergarten_classes {
                push_unique(&mut found.classes, kindergarten_class.clone());
            }
            continue;
        }

        let grade_source = if grade_raw.trim().is_empty() { class_raw } else { grade_raw };
        push_unique(&mut found.grades, labels::normalize_grade(grade_source));
        push_unique(&mut found.classes, class_label);
    }
    found.into_option()
}

fn from_job_position(viewer: &Viewer) -> Option<Candidate> {
    let job = viewer.job_position.as_deref()?;
    let mut found = Candidate::new(SegmentSource::Job);
    for grade in labels::grade_mentions(job) {
        push_unique(&mut found.grades, grade);
    }
    if labels::mentions_kindergarten(job) {
        match labels::kindergarten_variant(job) {
            Some(variant) => push_unique(&mut found.grades, variant.to_string()),
            None => {
                for grade in KINDERGARTEN_GRADES {
                    push_unique(&mut found.grades, grade.to_string());
                }
            }
        }
    }
    found.into_option()
}

fn from_legacy_lookup(viewer: &Viewer, config: &ReconcileConfig) -> Option<Candidate> {
    let email_local = viewer
        .email
        .as_deref()
        .and_then(|email| email.split('@').next());
    let scope = [viewer.username.as_deref(), viewer.name.as_deref(), email_local]
        .into_iter()
        .flatten()
        .find_map(|key| config.legacy_scope(key))?;

    let mut found = Candidate::new(SegmentSource::Fallback);
    for grade in &scope.grades {
        push_unique(&mut found.grades, grade.clone());
    }
    for class in &scope.classes {
        push_unique(&mut found.classes, class.clone());
    }
    found.into_option()
}

fn is_kindergarten_unit(unit: Option<&str>) -> bool {
    let key = labels::normalize_key(unit.unwrap_or(""));
    key.contains("kindergarten") || key.contains("pelangi")
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !value.is_empty() && !values.contains(&value) {
        values.push(value);
    }
}

impl Segment {
    /// Grade match is exact or a whole-token prefix in either direction.
    pub fn allows_grade(&self, grade: &str) -> bool {
        if self.allowed_grades.is_empty() {
            return true;
        }
        let grade = grade.to_lowercase();
        if grade.is_empty() {
            return false;
        }
        self.allowed_grades.iter().any(|allowed| {
            let allowed = allowed.to_lowercase();
            grade == allowed || token_prefix(&grade, &allowed) || token_prefix(&allowed, &grade)
        })
    }

    /// Only enforced under a strict class filter; otherwise every class passes.
    pub fn allows_class(&self, class_name: &str) -> bool {
        if !self.strict_class_filter || self.allowed_classes.is_empty() {
            return true;
        }
        let class_name = class_name.to_lowercase();
        if class_name.is_empty() {
            return false;
        }
        self.allowed_classes.iter().any(|allowed| {
            let allowed = allowed.to_lowercase();
            class_name == allowed
                || class_name.ends_with(&allowed)
                || allowed.ends_with(&format!("- {class_name}"))
        })
    }

    pub fn admits(&self, grade: &str, class_name: &str) -> bool {
        self.allows_grade(grade) && self.allows_class(class_name)
    }
}

/// `text` starts with `prefix` and the match does not split a number ("Grade 1" vs "Grade 10").
fn token_prefix(text: &str, prefix: &str) -> bool {
    text.strip_prefix(prefix)
        .map(|rest| !rest.starts_with(|c: char| c.is_ascii_digit()))
        .unwrap_or(false)
}
