use crate::collection::{Collection, Keyed, Patchable};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub const MONTHS_PER_YEAR: u8 = 12;
pub const MAX_WEEK: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Department {
    Safety,
    Lease,
    Asset,
    Infra,
}

impl Department {
    pub const ALL: [Department; 4] = [Self::Safety, Self::Lease, Self::Asset, Self::Infra];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safety => "safety",
            Self::Lease => "lease",
            Self::Asset => "asset",
            Self::Infra => "infra",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "kebab-case")]
pub enum KpiScope {
    Department(Department),
    Custom(String),
}

impl fmt::Display for KpiScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Department(department) => f.write_str(department.as_str()),
            Self::Custom(key) => write!(f, "custom:{}", key),
        }
    }
}

impl From<Department> for KpiScope {
    fn from(value: Department) -> Self {
        Self::Department(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Ongoing,
    Completed,
    Delayed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Occupied,
    Vacant,
    Public,
}

impl TenantStatus {
    pub fn is_rentable(self) -> bool {
        !matches!(self, Self::Public)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabColor {
    Orange,
    Blue,
    Emerald,
    Purple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Urgent,
}

// ─── KPI hierarchy ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kpi {
    pub id: String,
    pub name: String,
    pub target: f64,
    pub current: f64,
    pub unit: String,
    #[serde(default)]
    pub activities: Collection<BusinessActivity>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_headline: bool,
}

impl Kpi {
    pub fn with_activities(&self, activities: Collection<BusinessActivity>) -> Self {
        Self {
            activities,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessActivity {
    pub id: String,
    pub content: String,
    pub status: ActivityStatus,
    pub date: NaiveDate,
    #[serde(default = "full_year", deserialize_with = "deserialize_year")]
    pub monthly_records: Collection<MonthlyRecord>,
}

impl BusinessActivity {
    pub fn new(id: String, content: String, date: NaiveDate) -> Self {
        Self {
            id,
            content,
            status: ActivityStatus::Ongoing,
            date,
            monthly_records: full_year(),
        }
    }

    pub fn month(&self, month: u8) -> Option<&MonthlyRecord> {
        self.monthly_records.get(&month)
    }

    pub fn with_records(&self, monthly_records: Collection<MonthlyRecord>) -> Self {
        Self {
            monthly_records,
            ..self.clone()
        }
    }

    pub fn with_status_from_plans(self) -> Self {
        let any_executed = self
            .monthly_records
            .iter()
            .any(|record| record.plans.iter().any(|plan| plan.is_executed));
        if any_executed && self.status != ActivityStatus::Ongoing {
            Self {
                status: ActivityStatus::Ongoing,
                ..self
            }
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRecord {
    pub month: u8,
    #[serde(default)]
    pub plans: Collection<PlanItem>,
}

impl MonthlyRecord {
    pub fn empty(month: u8) -> Self {
        Self {
            month,
            plans: Collection::new(),
        }
    }

    pub fn with_plans(&self, plans: Collection<PlanItem>) -> Self {
        Self {
            month: self.month,
            plans,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub is_executed: bool,
    #[serde(default = "first_week")]
    pub week: u8,
}

pub fn full_year() -> Collection<MonthlyRecord> {
    (1..=MONTHS_PER_YEAR).map(MonthlyRecord::empty).collect()
}

/// Rebuilds a stored year into exactly twelve records ordered by month.
/// Missing months come back empty; out-of-range and repeated months are dropped.
pub fn normalize_year(raw: Vec<MonthlyRecord>) -> Collection<MonthlyRecord> {
    (1..=MONTHS_PER_YEAR)
        .map(|month| {
            raw.iter()
                .find(|record| record.month == month)
                .cloned()
                .unwrap_or_else(|| MonthlyRecord::empty(month))
        })
        .collect()
}

fn deserialize_year<'de, D>(deserializer: D) -> Result<Collection<MonthlyRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<MonthlyRecord>>::deserialize(deserializer)?;
    Ok(normalize_year(raw.unwrap_or_default()))
}

// Form fields are stored as typed: numbers may arrive as strings, and
// anything that does not parse counts as 0.
fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    let value = match raw {
        Some(serde_json::Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(text)) => text.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(if value.is_finite() { value } else { 0.0 })
}

fn lenient_floor<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_number(deserializer).map(|value| value.trunc() as i32)
}

fn first_week() -> u8 {
    1
}

fn is_false(value: &bool) -> bool {
    !*value
}

// ─── Lease, facilities, tabs, tasks ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub usage: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub area: f64,
    #[serde(default, deserialize_with = "lenient_floor")]
    pub floor: i32,
    pub status: TenantStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub area: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub ratio: f64,
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub building_area: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub bcr: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub gfa: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub far: f64,
    #[serde(default)]
    pub usage: String,
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTab {
    pub key: String,
    pub label: String,
    pub color: TabColor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    pub id: String,
    pub time: String,
    pub category: String,
    pub subject: String,
    pub assignee: String,
    pub status: TaskStatus,
}

// ─── Keys ──────────────────────────────────────────────────────────────────

macro_rules! keyed_by {
    ($ty:ty, $field:ident: $key:ty) => {
        impl Keyed for $ty {
            type Key = $key;

            fn key(&self) -> &$key {
                &self.$field
            }
        }
    };
}

keyed_by!(Kpi, id: String);
keyed_by!(BusinessActivity, id: String);
keyed_by!(MonthlyRecord, month: u8);
keyed_by!(PlanItem, id: String);
keyed_by!(Tenant, id: String);
keyed_by!(Facility, id: String);
keyed_by!(CustomTab, key: String);
keyed_by!(TaskItem, id: String);

// ─── Payloads ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewKpi {
    pub name: String,
    pub target: f64,
    pub current: f64,
    pub unit: String,
    #[serde(default)]
    pub is_headline: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiPatch {
    pub name: Option<String>,
    pub target: Option<f64>,
    pub current: Option<f64>,
    pub unit: Option<String>,
}

impl Patchable for Kpi {
    type Patch = KpiPatch;

    fn patched(&self, patch: KpiPatch) -> Self {
        Self {
            id: self.id.clone(),
            name: patch.name.unwrap_or_else(|| self.name.clone()),
            target: patch.target.unwrap_or(self.target),
            current: patch.current.unwrap_or(self.current),
            unit: patch.unit.unwrap_or_else(|| self.unit.clone()),
            activities: self.activities.clone(),
            is_headline: self.is_headline,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPatch {
    pub content: Option<String>,
    pub status: Option<ActivityStatus>,
    pub date: Option<NaiveDate>,
}

impl Patchable for BusinessActivity {
    type Patch = ActivityPatch;

    fn patched(&self, patch: ActivityPatch) -> Self {
        Self {
            id: self.id.clone(),
            content: patch.content.unwrap_or_else(|| self.content.clone()),
            status: patch.status.unwrap_or(self.status),
            date: patch.date.unwrap_or(self.date),
            monthly_records: self.monthly_records.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlan {
    pub month: u8,
    pub week: u8,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPatch {
    pub text: Option<String>,
    pub is_executed: Option<bool>,
    pub week: Option<u8>,
}

impl Patchable for PlanItem {
    type Patch = PlanPatch;

    fn patched(&self, patch: PlanPatch) -> Self {
        Self {
            id: self.id.clone(),
            text: patch.text.unwrap_or_else(|| self.text.clone()),
            is_executed: patch.is_executed.unwrap_or(self.is_executed),
            week: patch.week.unwrap_or(self.week),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTenant {
    pub name: String,
    pub usage: String,
    pub area: f64,
    pub floor: i32,
    pub status: TenantStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantPatch {
    pub name: Option<String>,
    pub usage: Option<String>,
    pub area: Option<f64>,
    pub floor: Option<i32>,
    pub status: Option<TenantStatus>,
}

impl Patchable for Tenant {
    type Patch = TenantPatch;

    fn patched(&self, patch: TenantPatch) -> Self {
        Self {
            id: self.id.clone(),
            name: patch.name.unwrap_or_else(|| self.name.clone()),
            usage: patch.usage.unwrap_or_else(|| self.usage.clone()),
            area: patch.area.unwrap_or(self.area),
            floor: patch.floor.unwrap_or(self.floor),
            status: patch.status.unwrap_or(self.status),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFacility {
    pub category: String,
    pub name: String,
    pub area: f64,
    pub ratio: f64,
    pub content: String,
    pub building_area: f64,
    pub bcr: f64,
    pub gfa: f64,
    pub far: f64,
    pub usage: String,
    pub height: String,
    pub notes: String,
}

impl NewFacility {
    pub fn into_facility(self, id: String) -> Facility {
        Facility {
            id,
            category: self.category,
            name: self.name,
            area: self.area,
            ratio: self.ratio,
            content: self.content,
            building_area: self.building_area,
            bcr: self.bcr,
            gfa: self.gfa,
            far: self.far,
            usage: self.usage,
            height: self.height,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityPatch {
    pub category: Option<String>,
    pub name: Option<String>,
    pub area: Option<f64>,
    pub ratio: Option<f64>,
    pub content: Option<String>,
    pub building_area: Option<f64>,
    pub bcr: Option<f64>,
    pub gfa: Option<f64>,
    pub far: Option<f64>,
    pub usage: Option<String>,
    pub height: Option<String>,
    pub notes: Option<String>,
}

impl Patchable for Facility {
    type Patch = FacilityPatch;

    fn patched(&self, patch: FacilityPatch) -> Self {
        Self {
            id: self.id.clone(),
            category: patch.category.unwrap_or_else(|| self.category.clone()),
            name: patch.name.unwrap_or_else(|| self.name.clone()),
            area: patch.area.unwrap_or(self.area),
            ratio: patch.ratio.unwrap_or(self.ratio),
            content: patch.content.unwrap_or_else(|| self.content.clone()),
            building_area: patch.building_area.unwrap_or(self.building_area),
            bcr: patch.bcr.unwrap_or(self.bcr),
            gfa: patch.gfa.unwrap_or(self.gfa),
            far: patch.far.unwrap_or(self.far),
            usage: patch.usage.unwrap_or_else(|| self.usage.clone()),
            height: patch.height.unwrap_or_else(|| self.height.clone()),
            notes: patch.notes.unwrap_or_else(|| self.notes.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub time: String,
    pub category: String,
    pub subject: String,
    pub assignee: String,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub time: Option<String>,
    pub category: Option<String>,
    pub subject: Option<String>,
    pub assignee: Option<String>,
    pub status: Option<TaskStatus>,
}

impl Patchable for TaskItem {
    type Patch = TaskPatch;

    fn patched(&self, patch: TaskPatch) -> Self {
        Self {
            id: self.id.clone(),
            time: patch.time.unwrap_or_else(|| self.time.clone()),
            category: patch.category.unwrap_or_else(|| self.category.clone()),
            subject: patch.subject.unwrap_or_else(|| self.subject.clone()),
            assignee: patch.assignee.unwrap_or_else(|| self.assignee.clone()),
            status: patch.status.unwrap_or(self.status),
        }
    }
}

// ─── Settings ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub key_prefix: String,
    pub lease_kpi_id: String,
    pub seed_baseline: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            key_prefix: "complex-mgt-v4".to_string(),
            lease_kpi_id: "default-lease".to_string(),
            seed_baseline: true,
        }
    }
}

// ─── Derived views ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyStats {
    pub total_area: f64,
    pub occupied_area: f64,
    pub rate: f64,
    pub occupied_count: usize,
    pub vacant_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percent: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadlineTile {
    pub kpi_id: Option<String>,
    pub value: f64,
    pub change: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub safety: HeadlineTile,
    pub lease: HeadlineTile,
    pub asset: HeadlineTile,
    pub infra: HeadlineTile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusCounts {
    pub open: usize,
    pub done: usize,
    pub attention: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchHitKind {
    Kpi,
    Activity,
    Plan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub kind: SearchHitKind,
    pub id: String,
    pub name: String,
    pub path: String,
    pub scope: KpiScope,
    pub kpi_id: String,
    pub activity_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupExport {
    pub file_name: String,
    pub contents: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::{BusinessActivity, Facility, Kpi, PlanItem, Tenant};
    use chrono::NaiveDate;

    #[test]
    fn new_activity_has_twelve_distinct_months() {
        let activity = BusinessActivity::new(
            "act-1".to_string(),
            "Inspect Zone A".to_string(),
            NaiveDate::from_ymd_opt(2025, 3, 1).expect("date"),
        );
        let months: Vec<u8> = activity.monthly_records.iter().map(|r| r.month).collect();
        assert_eq!(months, (1..=12).collect::<Vec<_>>());
        assert!(activity.monthly_records.iter().all(|r| r.plans.is_empty()));
    }

    #[test]
    fn legacy_activity_is_padded_to_a_full_year() {
        let raw = r#"{
            "id": "act-1",
            "content": "Patrol",
            "status": "ongoing",
            "date": "2025-01-02",
            "monthlyRecords": [
                { "month": 3, "plans": [{ "id": "p1", "text": "walk", "isExecuted": true }] },
                { "month": 14, "plans": [] }
            ]
        }"#;
        let activity: BusinessActivity = serde_json::from_str(raw).expect("parse");
        assert_eq!(activity.monthly_records.len(), 12);
        let march = activity.month(3).expect("march");
        assert_eq!(march.plans.len(), 1);
        let plan: &PlanItem = march.plans.first().expect("plan");
        assert_eq!(plan.week, 1);
    }

    #[test]
    fn form_saved_facility_reads_string_numbers_and_missing_fields() {
        let raw = r#"{"id":"facility-1700000000000","category":"Commercial","name":"Kiosk","area":"120","buildingArea":"","bcr":" 35.5 ","gfa":"n/a","far":null,"usage":"retail","height":"6m","notes":""}"#;
        let facility: Facility = serde_json::from_str(raw).expect("parse");
        assert_eq!(facility.area, 120.0);
        assert_eq!(facility.bcr, 35.5);
        assert_eq!((facility.gfa, facility.far, facility.building_area, facility.ratio), (0.0, 0.0, 0.0, 0.0));
        assert!(facility.content.is_empty());
    }

    #[test]
    fn form_saved_tenant_reads_string_area_and_floor() {
        let raw = r#"{"id":"U-2F-0001","name":"Cafe","usage":"food","area":"85.5","floor":"2","status":"occupied"}"#;
        let tenant: Tenant = serde_json::from_str(raw).expect("parse");
        assert_eq!(tenant.area, 85.5);
        assert_eq!(tenant.floor, 2);
        let numeric: Tenant =
            serde_json::from_str(r#"{"id":"U-1F-0002","area":40,"floor":1,"status":"vacant"}"#).expect("parse");
        assert_eq!((numeric.area, numeric.floor), (40.0, 1));
        assert!(numeric.name.is_empty());
    }

    #[test]
    fn kpi_without_activities_or_records_loads() {
        let raw = r#"{"id":"k1","name":"Days without incident","target":365,"current":120,"unit":"days"}"#;
        let kpi: Kpi = serde_json::from_str(raw).expect("parse");
        assert!(kpi.activities.is_empty());
        assert!(!kpi.is_headline);
        let round_trip = serde_json::to_string(&kpi).expect("json");
        assert!(!round_trip.contains("isHeadline"));
    }
}
