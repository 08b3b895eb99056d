use serde::Serialize;
use tracing::info;

use crate::assignments::map_assignments;
use crate::config::ReconcileConfig;
use crate::models::{ChartPoint, Segment, Student, StudentOrigin, Viewer};
use crate::roster::merge_roster;
use crate::segments::derive_segments;
use crate::sources::Sources;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub viewer_name: String,
    pub segment: Segment,
    pub students: Vec<Student>,
    pub spotlight_chart: Vec<ChartPoint>,
    pub focus_label: String,
    /// True when the roster was filtered to nothing and assignment students are shown instead.
    pub degraded: bool,
}

pub fn reconcile(sources: &Sources, viewer: &Viewer, config: &ReconcileConfig) -> Dashboard {
    let viewer_name = viewer.display_name().to_string();
    let segment = derive_segments(viewer, config);
    let mapped = map_assignments(&sources.assignments, &sources.mentors, &viewer_name, config);
    let students = merge_roster(&sources.roster, &mapped, &segment);
    let degraded = students
        .iter()
        .any(|student| student.origin == StudentOrigin::Assignment);

    info!(
        viewer = %viewer_name,
        students = students.len(),
        degraded,
        "reconciled dashboard"
    );

    Dashboard {
        viewer_name,
        segment,
        students,
        spotlight_chart: mapped.spotlight_chart,
        focus_label: mapped.focus_label,
        degraded,
    }
}
