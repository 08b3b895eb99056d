use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------- Shared vocabulary ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierCode {
    Tier1,
    Tier2,
    Tier3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Active,
    Paused,
    Completed,
    Closed,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Monitoring,
    Active,
    Paused,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InterventionType {
    Sel,
    English,
    Math,
    Behavior,
    Attendance,
}

impl InterventionType {
    pub const ALL: [InterventionType; 5] = [
        InterventionType::Sel,
        InterventionType::English,
        InterventionType::Math,
        InterventionType::Behavior,
        InterventionType::Attendance,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SEL" => Some(Self::Sel),
            "ENGLISH" => Some(Self::English),
            "MATH" => Some(Self::Math),
            "BEHAVIOR" | "BEHAVIOUR" => Some(Self::Behavior),
            "ATTENDANCE" => Some(Self::Attendance),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Sel => "SEL",
            Self::English => "English",
            Self::Math => "Math",
            Self::Behavior => "Behavior",
            Self::Attendance => "Attendance",
        }
    }
}

// ---------- Inputs (loosely typed upstream shapes) ----------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "loose_string")]
    pub object_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub grade: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub current_grade: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub class_name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub tier: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "loose_string")]
    pub focus: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub progress: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub next_update: Option<String>,
    #[serde(default, deserialize_with = "loose_list")]
    pub interventions: Vec<RawInterventionSlot>,
}

impl RosterEntry {
    /// Mongo `_id` wins over the `id` virtual when both are sent.
    pub fn key(&self) -> Option<&str> {
        self.object_id.as_deref().or(self.id.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInterventionSlot {
    #[serde(default, rename = "type", deserialize_with = "loose_string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub tier_code: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub tier: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "loose_strings")]
    pub strategies: Vec<String>,
    #[serde(default, deserialize_with = "loose_list")]
    pub history: Vec<HistoryEntry>,
    #[serde(default, deserialize_with = "loose_bool")]
    pub has_data: Option<bool>,
    #[serde(default, deserialize_with = "loose_f64")]
    pub current_value: Option<f64>,
    #[serde(default, deserialize_with = "loose_f64")]
    pub current: Option<f64>,
}

impl RawInterventionSlot {
    pub fn reported_tier(&self) -> Option<&str> {
        self.tier_code.as_deref().or(self.tier.as_deref())
    }

    pub fn reported_current(&self) -> Option<f64> {
        self.current_value.or(self.current)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDetail {
    #[serde(default, deserialize_with = "loose_string")]
    pub grade: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ClassRef {
    Label(String),
    Detail(ClassDetail),
}

impl ClassRef {
    pub fn grade(&self) -> Option<&str> {
        match self {
            ClassRef::Label(label) => Some(label.as_str()),
            ClassRef::Detail(detail) => detail.grade.as_deref(),
        }
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            ClassRef::Label(label) => Some(label.as_str()),
            ClassRef::Detail(detail) => detail.class_name.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    #[serde(default, deserialize_with = "loose_string")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub job_position: Option<String>,
    #[serde(default, deserialize_with = "loose_list")]
    pub classes: Vec<ClassRef>,
}

impl Viewer {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.username.as_deref())
            .or(self.email.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorProfile {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "loose_string")]
    pub object_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub job_position: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub role: Option<String>,
}

impl MentorProfile {
    pub fn key(&self) -> Option<&str> {
        self.object_id.as_deref().or(self.id.as_deref())
    }
}

#[derive(Debug, Clone)]
pub enum MentorRef {
    Id(String),
    Profile(MentorProfile),
}

impl<'de> Deserialize<'de> for MentorRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            value @ Value::Object(_) => MentorProfile::deserialize(value)
                .map(MentorRef::Profile)
                .map_err(serde::de::Error::custom),
            other => Ok(MentorRef::Id(value_to_string(&other).unwrap_or_default())),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "loose_string")]
    pub object_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "loose_list")]
    pub classes: Vec<ClassRef>,
    #[serde(default, deserialize_with = "loose_string")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub slug: Option<String>,
}

impl StudentProfile {
    pub fn key(&self) -> Option<&str> {
        self.object_id.as_deref().or(self.id.as_deref())
    }
}

#[derive(Debug, Clone)]
pub enum StudentRef {
    Id(String),
    Profile(StudentProfile),
}

impl<'de> Deserialize<'de> for StudentRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            value @ Value::Object(_) => StudentProfile::deserialize(value)
                .map(StudentRef::Profile)
                .map_err(serde::de::Error::custom),
            other => Ok(StudentRef::Id(value_to_string(&other).unwrap_or_default())),
        }
    }
}

impl StudentRef {
    pub fn id(&self) -> Option<&str> {
        let id = match self {
            StudentRef::Id(id) => Some(id.as_str()),
            StudentRef::Profile(profile) => profile.key(),
        };
        id.map(str::trim).filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    #[serde(default, deserialize_with = "loose_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "loose_bool")]
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckIn {
    #[serde(default, deserialize_with = "loose_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub next_steps: Option<String>,
    #[serde(default, deserialize_with = "loose_f64")]
    pub value: Option<f64>,
    #[serde(default, deserialize_with = "loose_string")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRecord {
    #[serde(default, deserialize_with = "loose_string")]
    pub id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "loose_string")]
    pub object_id: Option<String>,
    #[serde(default)]
    pub mentor_id: Option<MentorRef>,
    #[serde(default, deserialize_with = "loose_list")]
    pub student_ids: Vec<StudentRef>,
    #[serde(default, deserialize_with = "loose_string")]
    pub tier: Option<String>,
    #[serde(default, deserialize_with = "loose_strings")]
    pub focus_areas: Vec<String>,
    #[serde(default, deserialize_with = "loose_list")]
    pub goals: Vec<Goal>,
    #[serde(default, deserialize_with = "loose_list")]
    pub check_ins: Vec<CheckIn>,
    #[serde(default, deserialize_with = "loose_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub end_date: Option<String>,
}

impl AssignmentRecord {
    pub fn key(&self) -> Option<&str> {
        self.object_id.as_deref().or(self.id.as_deref())
    }
}

// ---------- Outputs (view objects) ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentSource {
    Classes,
    Job,
    Fallback,
    Unit,
    All,
}

/// The grades and classes a viewer is allowed to see. Empty `allowed_grades` means unrestricted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub allowed_grades: Vec<String>,
    pub allowed_classes: Vec<String>,
    pub strict_class_filter: bool,
    pub source: SegmentSource,
}

impl Segment {
    pub fn unrestricted() -> Self {
        Self {
            allowed_grades: Vec::new(),
            allowed_classes: Vec::new(),
            strict_class_filter: false,
            source: SegmentSource::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressProfile {
    pub chart: Vec<ChartPoint>,
    pub history: Vec<HistoryEntry>,
    pub current: Option<f64>,
    pub goals_completed: usize,
    pub goals_total: usize,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentOption {
    pub assignment_id: String,
    pub mentor: String,
    pub tier: TierCode,
    pub status: AssignmentStatus,
    pub focus: String,
    pub focus_areas: Vec<String>,
    pub strategies: Vec<String>,
    pub progress: String,
    pub next_update: String,
    pub profile: ProgressProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedStudent {
    pub id: String,
    pub name: String,
    pub grade: String,
    pub class_name: String,
    /// The winning assignment after status-rank deduplication.
    pub plan: AssignmentOption,
    /// Every assignment touching this student, most urgent first.
    pub assignment_options: Vec<AssignmentOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentMap {
    pub students: Vec<MappedStudent>,
    pub spotlight_chart: Vec<ChartPoint>,
    pub focus_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionSlot {
    #[serde(rename = "type")]
    pub kind: InterventionType,
    pub tier_code: TierCode,
    pub status: SlotStatus,
    pub strategies: Vec<String>,
    pub history: Vec<HistoryEntry>,
    pub has_data: bool,
    pub current_value: Option<f64>,
}

impl InterventionSlot {
    /// Inactive Tier 1 "universal" state.
    pub fn universal(kind: InterventionType) -> Self {
        Self {
            kind,
            tier_code: TierCode::Tier1,
            status: SlotStatus::Monitoring,
            strategies: Vec::new(),
            history: Vec::new(),
            has_data: false,
            current_value: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentOrigin {
    Roster,
    Assignment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub grade: String,
    pub class_name: String,
    pub tier: String,
    pub tier_code: TierCode,
    #[serde(rename = "type")]
    pub focus: String,
    pub progress: String,
    pub next_update: String,
    pub interventions: [InterventionSlot; 5],
    pub assignment_options: Vec<AssignmentOption>,
    pub profile: Option<ProgressProfile>,
    pub origin: StudentOrigin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TierSummary {
    pub tier: TierCode,
    pub count: usize,
    pub avg_current: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InterventionRef {
    Slot(InterventionType),
    Legacy(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusedIntervention {
    pub intervention: InterventionRef,
    pub tier: String,
    pub tier_code: TierCode,
    pub label: String,
    pub strategy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum CriticalIntervention {
    Universal,
    Focused(FocusedIntervention),
}

impl CriticalIntervention {
    pub fn tier_code(&self) -> TierCode {
        match self {
            CriticalIntervention::Universal => TierCode::Tier1,
            CriticalIntervention::Focused(focused) => focused.tier_code,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            CriticalIntervention::Universal => "Universal",
            CriticalIntervention::Focused(focused) => &focused.label,
        }
    }

    pub fn strategy(&self) -> Option<&str> {
        match self {
            CriticalIntervention::Universal => None,
            CriticalIntervention::Focused(focused) => focused.strategy.as_deref(),
        }
    }
}

// ---------- Loose field decoding ----------

fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_string))
}

fn loose_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items.iter().filter_map(value_to_string).collect(),
        Some(other) => value_to_string(&other).into_iter().collect(),
        None => Vec::new(),
    })
}

fn loose_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite()))
}

fn loose_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0),
        _ => None,
    })
}

/// `null` or a missing field decodes to an empty list.
fn loose_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn value_to_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
