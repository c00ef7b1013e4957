use crate::collection::Collection;
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::ids::IdGenerator;
use crate::metrics;
use crate::models::{
    ActivityPatch, AppSettings, BackupExport, BusinessActivity, CustomTab, Department, ExportResponse, Facility,
    FacilityPatch, Kpi, KpiPatch, KpiScope, NewFacility, NewKpi, NewPlan, NewTask, NewTenant, OccupancyStats,
    PlanItem, PlanPatch, SearchResult, SummaryStats, TabColor, TaskItem, TaskPatch, TaskStatus, TaskStatusCounts,
    Tenant, TenantPatch, MAX_WEEK, MONTHS_PER_YEAR,
};
use crate::report;
use crate::search;
use crate::seed;
use crate::session::SessionManager;
use crate::store::{CollectionKey, CollectionStore, KeyValueStore};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    tasks: Collection<TaskItem>,
    safety: Collection<Kpi>,
    lease: Collection<Kpi>,
    asset: Collection<Kpi>,
    infra: Collection<Kpi>,
    tenants: Collection<Tenant>,
    facilities: Collection<Facility>,
    custom_tabs: Collection<CustomTab>,
    dynamic: BTreeMap<String, Collection<Kpi>>,
}

impl DashboardState {
    pub fn tasks(&self) -> &Collection<TaskItem> {
        &self.tasks
    }

    pub fn department(&self, department: Department) -> &Collection<Kpi> {
        match department {
            Department::Safety => &self.safety,
            Department::Lease => &self.lease,
            Department::Asset => &self.asset,
            Department::Infra => &self.infra,
        }
    }

    fn department_mut(&mut self, department: Department) -> &mut Collection<Kpi> {
        match department {
            Department::Safety => &mut self.safety,
            Department::Lease => &mut self.lease,
            Department::Asset => &mut self.asset,
            Department::Infra => &mut self.infra,
        }
    }

    pub fn tenants(&self) -> &Collection<Tenant> {
        &self.tenants
    }

    pub fn facilities(&self) -> &Collection<Facility> {
        &self.facilities
    }

    pub fn custom_tabs(&self) -> &Collection<CustomTab> {
        &self.custom_tabs
    }

    pub fn dynamic(&self, tab_key: &str) -> Option<&Collection<Kpi>> {
        self.dynamic.get(tab_key)
    }

    fn scopes(&self) -> Vec<(KpiScope, &Collection<Kpi>)> {
        let mut scopes: Vec<(KpiScope, &Collection<Kpi>)> = Department::ALL
            .iter()
            .map(|&department| (KpiScope::Department(department), self.department(department)))
            .collect();
        for tab in self.custom_tabs.iter() {
            if let Some(kpis) = self.dynamic.get(&tab.key) {
                scopes.push((KpiScope::Custom(tab.key.clone()), kpis));
            }
        }
        scopes
    }
}

pub struct DashboardCore {
    store: CollectionStore,
    settings: AppSettings,
    settings_db: Option<Arc<Database>>,
    sessions: SessionManager,
    ids: IdGenerator,
    state: DashboardState,
}

impl DashboardCore {
    pub fn open(app_data_dir: &Path) -> AppResult<Self> {
        let db = Arc::new(Database::new(&app_data_dir.join("state.sqlite"))?);
        let settings = db.get_settings()?;
        let mut core = Self::with_store(db.clone(), settings);
        core.settings_db = Some(db);
        Ok(core)
    }

    pub fn with_store(backend: Arc<dyn KeyValueStore>, settings: AppSettings) -> Self {
        let mut core = Self {
            store: CollectionStore::new(backend, &settings.key_prefix),
            settings,
            settings_db: None,
            sessions: SessionManager::new(),
            ids: IdGenerator::new(),
            state: DashboardState::default(),
        };
        core.reload();
        core
    }

    /// Re-reads every collection from storage. Nothing is written back, so a
    /// reload never changes what an export would produce.
    pub fn reload(&mut self) {
        let store = &self.store;
        let seed_baseline = self.settings.seed_baseline;
        let lease_kpi_id = self.settings.lease_kpi_id.as_str();
        let kpis = |department: Department| {
            store.load(CollectionKey::for_department(department), || {
                if seed_baseline {
                    seed::baseline_kpis(department, lease_kpi_id)
                } else {
                    Collection::new()
                }
            })
        };

        let mut state = DashboardState {
            tasks: store.load(CollectionKey::Tasks, Collection::new),
            safety: kpis(Department::Safety),
            lease: kpis(Department::Lease),
            asset: kpis(Department::Asset),
            infra: kpis(Department::Infra),
            tenants: store.load(CollectionKey::Tenants, Collection::new),
            facilities: store.load(CollectionKey::Facilities, || {
                if seed_baseline {
                    seed::baseline_facilities()
                } else {
                    Collection::new()
                }
            }),
            custom_tabs: store.load(CollectionKey::CustomTabs, Collection::new),
            dynamic: store.load(CollectionKey::DynamicData, BTreeMap::new),
        };
        state.lease = mirror_lease_rate(&state.lease, &state.tenants, lease_kpi_id);

        tracing::info!(
            prefix = %self.store.prefix(),
            tenants = state.tenants.len(),
            custom_tabs = state.custom_tabs.len(),
            "dashboard state loaded"
        );
        self.state = state;
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn view(&self) -> AppResult<&DashboardState> {
        self.sessions.require_active()?;
        Ok(&self.state)
    }

    pub fn update_settings(&mut self, update: serde_json::Value) -> AppResult<AppSettings> {
        let Some(db) = self.settings_db.as_ref() else {
            return Err(AppError::Internal("settings are not backed by a database".to_string()));
        };
        let settings = db.update_settings(update)?;
        if settings.key_prefix != self.settings.key_prefix {
            self.store = self.store.with_prefix(&settings.key_prefix);
        }
        self.settings = settings.clone();
        self.reload();
        Ok(settings)
    }

    // ─── KPIs ───────────────────────────────────────────────────────────────

    pub fn kpis(&self, scope: &KpiScope) -> AppResult<Collection<Kpi>> {
        match scope {
            KpiScope::Department(department) => Ok(self.state.department(*department).clone()),
            KpiScope::Custom(key) => {
                if !self.state.custom_tabs.contains(key.as_str()) {
                    return Err(AppError::NotFound(format!("Custom tab {} not found", key)));
                }
                Ok(self.state.dynamic.get(key).cloned().unwrap_or_default())
            }
        }
    }

    fn store_kpis(&mut self, scope: &KpiScope, kpis: Collection<Kpi>) -> AppResult<()> {
        match scope {
            KpiScope::Department(department) => {
                let slot = self.state.department_mut(*department);
                if slot.ptr_eq(&kpis) {
                    return Ok(());
                }
                *slot = kpis;
                self.store
                    .save(CollectionKey::for_department(*department), self.state.department(*department))
            }
            KpiScope::Custom(key) => {
                if self.state.dynamic.get(key).is_some_and(|current| current.ptr_eq(&kpis)) {
                    return Ok(());
                }
                self.state.dynamic.insert(key.clone(), kpis);
                self.store.save(CollectionKey::DynamicData, &self.state.dynamic)
            }
        }
    }

    pub fn add_kpi(&mut self, scope: &KpiScope, payload: NewKpi) -> AppResult<Kpi> {
        let name = required(&payload.name, "KPI name")?;
        let kpis = self.kpis(scope)?;
        let kpi = Kpi {
            id: self.ids.next_id("kpi", |candidate| kpis.contains(candidate)),
            name,
            target: payload.target,
            current: payload.current,
            unit: payload.unit.trim().to_string(),
            activities: Collection::new(),
            is_headline: false,
        };

        let mut next = kpis.insert(kpi.clone())?;
        if payload.is_headline {
            next = flag_headline(&next, &kpi.id);
        }
        self.store_kpis(scope, next)?;
        tracing::info!(scope = %scope, kpi_id = %kpi.id, "KPI added");
        Ok(Kpi {
            is_headline: payload.is_headline,
            ..kpi
        })
    }

    pub fn update_kpi(&mut self, scope: &KpiScope, kpi_id: &str, patch: KpiPatch) -> AppResult<()> {
        if let Some(name) = patch.name.as_deref() {
            required(name, "KPI name")?;
        }
        let next = self.kpis(scope)?.replace(kpi_id, patch);
        self.store_kpis(scope, next)
    }

    pub fn delete_kpi(&mut self, scope: &KpiScope, kpi_id: &str) -> AppResult<()> {
        let next = self.kpis(scope)?.remove(kpi_id);
        self.store_kpis(scope, next)
    }

    pub fn set_headline_kpi(&mut self, scope: &KpiScope, kpi_id: &str) -> AppResult<()> {
        let kpis = self.kpis(scope)?;
        if !kpis.contains(kpi_id) {
            return Err(AppError::NotFound(format!("KPI {} not found", kpi_id)));
        }
        self.store_kpis(scope, flag_headline(&kpis, kpi_id))
    }

    // ─── Activities ─────────────────────────────────────────────────────────

    pub fn activity(&self, scope: &KpiScope, kpi_id: &str, activity_id: &str) -> AppResult<BusinessActivity> {
        let kpis = self.kpis(scope)?;
        find_activity(&kpis, kpi_id, activity_id).cloned()
    }

    pub fn add_activity(&mut self, scope: &KpiScope, kpi_id: &str, content: &str) -> AppResult<BusinessActivity> {
        let content = required(content, "activity content")?;
        let kpis = self.kpis(scope)?;
        let kpi = find_kpi(&kpis, kpi_id)?;
        let activity = BusinessActivity::new(
            self.ids.next_id("act", |candidate| kpi.activities.contains(candidate)),
            content,
            Utc::now().date_naive(),
        );

        let next = edit_activities(&kpis, kpi_id, |activities| activities.insert(activity.clone()))?;
        self.store_kpis(scope, next)?;
        tracing::info!(scope = %scope, kpi_id = %kpi_id, activity_id = %activity.id, "activity added");
        Ok(activity)
    }

    pub fn update_activity(
        &mut self,
        scope: &KpiScope,
        kpi_id: &str,
        activity_id: &str,
        patch: ActivityPatch,
    ) -> AppResult<()> {
        if let Some(content) = patch.content.as_deref() {
            required(content, "activity content")?;
        }
        let kpis = self.kpis(scope)?;
        let next = edit_activities(&kpis, kpi_id, |activities| Ok(activities.replace(activity_id, patch)))?;
        self.store_kpis(scope, next)
    }

    pub fn delete_activity(&mut self, scope: &KpiScope, kpi_id: &str, activity_id: &str) -> AppResult<()> {
        let kpis = self.kpis(scope)?;
        let next = edit_activities(&kpis, kpi_id, |activities| Ok(activities.remove(activity_id)))?;
        self.store_kpis(scope, next)
    }

    // ─── Plans ──────────────────────────────────────────────────────────────

    pub fn add_plan(
        &mut self,
        scope: &KpiScope,
        kpi_id: &str,
        activity_id: &str,
        payload: NewPlan,
    ) -> AppResult<PlanItem> {
        check_month(payload.month)?;
        check_week(payload.week)?;
        let text = required(&payload.text, "plan text")?;
        let kpis = self.kpis(scope)?;
        let activity = find_activity(&kpis, kpi_id, activity_id)?;
        let plan = PlanItem {
            id: self.ids.next_id("plan", |candidate| {
                activity.monthly_records.iter().any(|record| record.plans.contains(candidate))
            }),
            text,
            is_executed: false,
            week: payload.week,
        };

        let next = edit_plans(&kpis, kpi_id, activity_id, payload.month, |plans| plans.insert(plan.clone()))?;
        self.store_kpis(scope, next)?;
        Ok(plan)
    }

    pub fn update_plan(
        &mut self,
        scope: &KpiScope,
        kpi_id: &str,
        activity_id: &str,
        month: u8,
        plan_id: &str,
        patch: PlanPatch,
    ) -> AppResult<()> {
        check_month(month)?;
        if let Some(text) = patch.text.as_deref() {
            required(text, "plan text")?;
        }
        if let Some(week) = patch.week {
            check_week(week)?;
        }
        let kpis = self.kpis(scope)?;
        let next = edit_plans(&kpis, kpi_id, activity_id, month, |plans| Ok(plans.replace(plan_id, patch)))?;
        self.store_kpis(scope, next)
    }

    pub fn toggle_plan(
        &mut self,
        scope: &KpiScope,
        kpi_id: &str,
        activity_id: &str,
        month: u8,
        plan_id: &str,
    ) -> AppResult<()> {
        check_month(month)?;
        let kpis = self.kpis(scope)?;
        let next = edit_plans(&kpis, kpi_id, activity_id, month, |plans| {
            Ok(plans.update(plan_id, |plan| PlanItem {
                is_executed: !plan.is_executed,
                ..plan.clone()
            }))
        })?;
        self.store_kpis(scope, next)
    }

    pub fn delete_plan(
        &mut self,
        scope: &KpiScope,
        kpi_id: &str,
        activity_id: &str,
        month: u8,
        plan_id: &str,
    ) -> AppResult<()> {
        check_month(month)?;
        let kpis = self.kpis(scope)?;
        let next = edit_plans(&kpis, kpi_id, activity_id, month, |plans| Ok(plans.remove(plan_id)))?;
        self.store_kpis(scope, next)
    }

    // ─── Tenants ────────────────────────────────────────────────────────────

    fn store_tenants(&mut self, tenants: Collection<Tenant>) -> AppResult<()> {
        if tenants.ptr_eq(&self.state.tenants) {
            return Ok(());
        }
        let lease = mirror_lease_rate(&self.state.lease, &tenants, &self.settings.lease_kpi_id);
        let lease_changed = !lease.ptr_eq(&self.state.lease);
        self.state.tenants = tenants;
        self.state.lease = lease;

        // Both writes are attempted; the first failure is reported.
        let saved_tenants = self.store.save(CollectionKey::Tenants, &self.state.tenants);
        let saved_lease = if lease_changed {
            self.store.save(CollectionKey::Lease, &self.state.lease)
        } else {
            Ok(())
        };
        saved_tenants.and(saved_lease)
    }

    pub fn add_tenant(&mut self, payload: NewTenant) -> AppResult<Tenant> {
        let name = required(&payload.name, "tenant name")?;
        check_area(payload.area)?;
        let tenants = &self.state.tenants;
        let tenant = Tenant {
            id: self.ids.next_unit_id(payload.floor, |candidate| tenants.contains(candidate)),
            name,
            usage: payload.usage.trim().to_string(),
            area: payload.area,
            floor: payload.floor,
            status: payload.status,
        };
        let next = self.state.tenants.insert(tenant.clone())?;
        self.store_tenants(next)?;
        tracing::info!(tenant_id = %tenant.id, floor = tenant.floor, "tenant added");
        Ok(tenant)
    }

    pub fn save_tenant(&mut self, tenant: Tenant) -> AppResult<()> {
        required(&tenant.id, "tenant id")?;
        required(&tenant.name, "tenant name")?;
        check_area(tenant.area)?;
        let next = self.state.tenants.upsert(tenant);
        self.store_tenants(next)
    }

    pub fn update_tenant(&mut self, tenant_id: &str, patch: TenantPatch) -> AppResult<()> {
        if let Some(name) = patch.name.as_deref() {
            required(name, "tenant name")?;
        }
        if let Some(area) = patch.area {
            check_area(area)?;
        }
        let next = self.state.tenants.replace(tenant_id, patch);
        self.store_tenants(next)
    }

    pub fn delete_tenant(&mut self, tenant_id: &str) -> AppResult<()> {
        let next = self.state.tenants.remove(tenant_id);
        self.store_tenants(next)
    }

    // ─── Facilities ─────────────────────────────────────────────────────────

    fn store_facilities(&mut self, facilities: Collection<Facility>) -> AppResult<()> {
        if facilities.ptr_eq(&self.state.facilities) {
            return Ok(());
        }
        self.state.facilities = facilities;
        self.store.save(CollectionKey::Facilities, &self.state.facilities)
    }

    pub fn add_facility(&mut self, payload: NewFacility) -> AppResult<Facility> {
        required(&payload.name, "facility name")?;
        let facilities = &self.state.facilities;
        let id = self.ids.next_id("facility", |candidate| facilities.contains(candidate));
        let facility = payload.into_facility(id);
        let next = self.state.facilities.insert(facility.clone())?;
        self.store_facilities(next)?;
        Ok(facility)
    }

    pub fn update_facility(&mut self, facility_id: &str, patch: FacilityPatch) -> AppResult<()> {
        if let Some(name) = patch.name.as_deref() {
            required(name, "facility name")?;
        }
        let next = self.state.facilities.replace(facility_id, patch);
        self.store_facilities(next)
    }

    pub fn delete_facility(&mut self, facility_id: &str) -> AppResult<()> {
        let next = self.state.facilities.remove(facility_id);
        self.store_facilities(next)
    }

    // ─── Tasks ──────────────────────────────────────────────────────────────

    fn store_tasks(&mut self, tasks: Collection<TaskItem>) -> AppResult<()> {
        if tasks.ptr_eq(&self.state.tasks) {
            return Ok(());
        }
        self.state.tasks = tasks;
        self.store.save(CollectionKey::Tasks, &self.state.tasks)
    }

    pub fn add_task(&mut self, payload: NewTask) -> AppResult<TaskItem> {
        let subject = required(&payload.subject, "task subject")?;
        let tasks = &self.state.tasks;
        let task = TaskItem {
            id: self.ids.next_id("task", |candidate| tasks.contains(candidate)),
            time: payload.time.trim().to_string(),
            category: payload.category.trim().to_string(),
            subject,
            assignee: payload.assignee.trim().to_string(),
            status: payload.status.unwrap_or(TaskStatus::Pending),
        };
        let next = self.state.tasks.insert(task.clone())?;
        self.store_tasks(next)?;
        Ok(task)
    }

    pub fn update_task(&mut self, task_id: &str, patch: TaskPatch) -> AppResult<()> {
        if let Some(subject) = patch.subject.as_deref() {
            required(subject, "task subject")?;
        }
        let next = self.state.tasks.replace(task_id, patch);
        self.store_tasks(next)
    }

    pub fn toggle_task(&mut self, task_id: &str) -> AppResult<()> {
        let next = self.state.tasks.update(task_id, |task| TaskItem {
            status: match task.status {
                TaskStatus::Completed => TaskStatus::Pending,
                TaskStatus::Pending | TaskStatus::Urgent => TaskStatus::Completed,
            },
            ..task.clone()
        });
        self.store_tasks(next)
    }

    pub fn delete_task(&mut self, task_id: &str) -> AppResult<()> {
        let next = self.state.tasks.remove(task_id);
        self.store_tasks(next)
    }

    // ─── Custom tabs ────────────────────────────────────────────────────────

    pub fn add_custom_tab(&mut self, label: &str, color: TabColor) -> AppResult<CustomTab> {
        let label = required(label, "tab label")?;
        let custom_tabs = &self.state.custom_tabs;
        let tab = CustomTab {
            key: self.ids.next_id("custom", |candidate| custom_tabs.contains(candidate)),
            label,
            color,
        };
        self.state.custom_tabs = self.state.custom_tabs.insert(tab.clone())?;
        self.state.dynamic.insert(tab.key.clone(), Collection::new());

        let saved_tabs = self.store.save(CollectionKey::CustomTabs, &self.state.custom_tabs);
        let saved_dynamic = self.store.save(CollectionKey::DynamicData, &self.state.dynamic);
        saved_tabs.and(saved_dynamic)?;
        tracing::info!(tab_key = %tab.key, "custom tab added");
        Ok(tab)
    }

    pub fn remove_custom_tab(&mut self, tab_key: &str) -> AppResult<()> {
        let next = self.state.custom_tabs.remove(tab_key);
        if next.ptr_eq(&self.state.custom_tabs) {
            return Ok(());
        }
        self.state.custom_tabs = next;
        let dynamic_changed = self.state.dynamic.remove(tab_key).is_some();

        let saved_tabs = self.store.save(CollectionKey::CustomTabs, &self.state.custom_tabs);
        let saved_dynamic = if dynamic_changed {
            self.store.save(CollectionKey::DynamicData, &self.state.dynamic)
        } else {
            Ok(())
        };
        saved_tabs.and(saved_dynamic)?;
        tracing::info!(tab_key = %tab_key, "custom tab removed");
        Ok(())
    }

    // ─── Derived views ──────────────────────────────────────────────────────

    pub fn lease_rate(&self) -> f64 {
        metrics::lease_rate(&self.state.tenants)
    }

    pub fn occupancy(&self) -> OccupancyStats {
        metrics::occupancy(self.state.tenants.iter())
    }

    pub fn floor_stats(&self, floor: i32) -> OccupancyStats {
        metrics::floor_occupancy(&self.state.tenants, floor)
    }

    pub fn rentable_units(&self, floor: i32, search: &str) -> Vec<&Tenant> {
        metrics::rentable_units(&self.state.tenants, floor, search)
    }

    pub fn summary_stats(&self) -> SummaryStats {
        metrics::summary_stats(|department| self.state.department(department))
    }

    pub fn monthly_plan_total(&self, month: u8) -> usize {
        metrics::monthly_plan_total(
            Department::ALL
                .iter()
                .flat_map(|&department| self.state.department(department).iter()),
            month,
        )
    }

    pub fn task_status_counts(&self) -> TaskStatusCounts {
        metrics::task_status_counts(&self.state.tasks)
    }

    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        search::search(self.state.scopes(), query)
    }

    pub fn weekly_report(&self, month: u8, week: u8) -> AppResult<String> {
        check_month(month)?;
        check_week(week)?;
        Ok(report::weekly_report(self.state.scopes(), month, week))
    }

    // ─── Backup ─────────────────────────────────────────────────────────────

    pub fn export_backup(&self) -> AppResult<BackupExport> {
        Ok(BackupExport {
            file_name: self.store.backup_file_name(Utc::now().date_naive()),
            contents: self.store.export_document()?,
        })
    }

    pub fn write_backup(&self, export_dir: &Path) -> AppResult<ExportResponse> {
        std::fs::create_dir_all(export_dir).map_err(|error| AppError::Io(error.to_string()))?;
        let backup = self.export_backup()?;
        let output_path = export_dir.join(sanitize_file_name(&backup.file_name));
        if !output_path.starts_with(export_dir) {
            return Err(AppError::Io("Resolved backup path escaped export directory".to_string()));
        }
        std::fs::write(&output_path, backup.contents).map_err(|error| AppError::Io(error.to_string()))?;
        Ok(ExportResponse {
            path: output_path.to_string_lossy().to_string(),
        })
    }

    /// Overwrites every prefixed key with the backup's contents and reloads.
    /// Nothing is touched unless `confirmed` is set and the document parses.
    pub fn import_backup(&mut self, text: &str, confirmed: bool) -> AppResult<usize> {
        if !confirmed {
            return Err(AppError::Validation("import must be confirmed".to_string()));
        }
        let entries = self.store.parse_document(text)?;
        let restored = self.store.restore(&entries)?;
        self.reload();
        tracing::info!(restored, "backup imported");
        Ok(restored)
    }
}

fn required(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn check_month(month: u8) -> AppResult<()> {
    if (1..=MONTHS_PER_YEAR).contains(&month) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("month {} is outside 1..={}", month, MONTHS_PER_YEAR)))
    }
}

fn check_week(week: u8) -> AppResult<()> {
    if (1..=MAX_WEEK).contains(&week) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("week {} is outside 1..={}", week, MAX_WEEK)))
    }
}

fn check_area(area: f64) -> AppResult<()> {
    if area.is_finite() && area >= 0.0 {
        Ok(())
    } else {
        Err(AppError::Validation(format!("area {} must be a non-negative number", area)))
    }
}

fn sanitize_file_name(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|ch| ch == '_' || ch == '.');
    if cleaned.is_empty() {
        "backup.json".to_string()
    } else {
        cleaned.to_string()
    }
}

fn find_kpi<'a>(kpis: &'a Collection<Kpi>, kpi_id: &str) -> AppResult<&'a Kpi> {
    kpis.get(kpi_id)
        .ok_or_else(|| AppError::NotFound(format!("KPI {} not found", kpi_id)))
}

fn find_activity<'a>(kpis: &'a Collection<Kpi>, kpi_id: &str, activity_id: &str) -> AppResult<&'a BusinessActivity> {
    find_kpi(kpis, kpi_id)?
        .activities
        .get(activity_id)
        .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity_id)))
}

fn edit_activities<F>(kpis: &Collection<Kpi>, kpi_id: &str, edit: F) -> AppResult<Collection<Kpi>>
where
    F: FnOnce(&Collection<BusinessActivity>) -> AppResult<Collection<BusinessActivity>>,
{
    let kpi = find_kpi(kpis, kpi_id)?;
    let activities = edit(&kpi.activities)?;
    if activities.ptr_eq(&kpi.activities) {
        return Ok(kpis.clone());
    }
    Ok(kpis.update(kpi_id, |kpi| kpi.with_activities(activities)))
}

fn edit_plans<F>(
    kpis: &Collection<Kpi>,
    kpi_id: &str,
    activity_id: &str,
    month: u8,
    edit: F,
) -> AppResult<Collection<Kpi>>
where
    F: FnOnce(&Collection<PlanItem>) -> AppResult<Collection<PlanItem>>,
{
    edit_activities(kpis, kpi_id, |activities| {
        let activity = activities
            .get(activity_id)
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", activity_id)))?;
        let record = activity
            .month(month)
            .ok_or_else(|| AppError::NotFound(format!("Month {} not found", month)))?;
        let plans = edit(&record.plans)?;
        if plans.ptr_eq(&record.plans) {
            return Ok(activities.clone());
        }
        let records = activity
            .monthly_records
            .update(&month, |record| record.with_plans(plans));
        Ok(activities.update(activity_id, |activity| {
            activity.with_records(records).with_status_from_plans()
        }))
    })
}

fn flag_headline(kpis: &Collection<Kpi>, kpi_id: &str) -> Collection<Kpi> {
    let mut next = kpis.clone();
    for kpi in kpis.iter() {
        let flagged = kpi.id == kpi_id;
        if kpi.is_headline != flagged {
            next = next.update(kpi.id.as_str(), |kpi| Kpi {
                is_headline: flagged,
                ..kpi.clone()
            });
        }
    }
    next
}

fn mirror_lease_rate(lease: &Collection<Kpi>, tenants: &Collection<Tenant>, lease_kpi_id: &str) -> Collection<Kpi> {
    let rate = metrics::lease_rate(tenants);
    match lease.get(lease_kpi_id) {
        Some(kpi) if kpi.current != rate => lease.update(lease_kpi_id, |kpi| Kpi {
            current: rate,
            ..kpi.clone()
        }),
        _ => lease.clone(),
    }
}
