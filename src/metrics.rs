use crate::collection::Collection;
use crate::models::{
    BusinessActivity, Department, HeadlineTile, Kpi, OccupancyStats, PlanItem, Progress, SummaryStats, TaskItem,
    TaskStatus, TaskStatusCounts, Tenant, TenantStatus,
};

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn usable_area(tenant: &Tenant) -> f64 {
    if tenant.area.is_finite() {
        tenant.area
    } else {
        0.0
    }
}

pub fn occupancy<'a>(tenants: impl IntoIterator<Item = &'a Tenant>) -> OccupancyStats {
    let mut stats = OccupancyStats::default();
    for tenant in tenants.into_iter().filter(|tenant| tenant.status.is_rentable()) {
        let area = usable_area(tenant);
        stats.total_area += area;
        match tenant.status {
            TenantStatus::Occupied => {
                stats.occupied_area += area;
                stats.occupied_count += 1;
            }
            TenantStatus::Vacant => stats.vacant_count += 1,
            TenantStatus::Public => {}
        }
    }
    stats.rate = if stats.total_area > 0.0 {
        round1(stats.occupied_area / stats.total_area * 100.0)
    } else {
        0.0
    };
    stats
}

pub fn lease_rate(tenants: &Collection<Tenant>) -> f64 {
    occupancy(tenants.iter()).rate
}

pub fn floor_occupancy(tenants: &Collection<Tenant>, floor: i32) -> OccupancyStats {
    occupancy(tenants.iter().filter(|tenant| tenant.floor == floor))
}

pub fn rentable_units<'a>(tenants: &'a Collection<Tenant>, floor: i32, search: &str) -> Vec<&'a Tenant> {
    tenants
        .iter()
        .filter(|tenant| tenant.floor == floor && tenant.status.is_rentable())
        .filter(|tenant| tenant.name.contains(search) || tenant.id.contains(search))
        .collect()
}

pub fn progress<'a>(plans: impl IntoIterator<Item = &'a PlanItem>) -> Progress {
    let (completed, total) = plans.into_iter().fold((0usize, 0usize), |(completed, total), plan| {
        (completed + usize::from(plan.is_executed), total + 1)
    });
    let percent = if total > 0 {
        (completed as f64 / total as f64 * 100.0).round() as u32
    } else {
        0
    };
    Progress {
        completed,
        total,
        percent,
    }
}

pub fn monthly_progress(activity: &BusinessActivity, month: u8) -> Progress {
    match activity.month(month) {
        Some(record) => progress(record.plans.iter()),
        None => Progress::default(),
    }
}

pub fn weekly_plans(activity: &BusinessActivity, month: u8, week: u8) -> Vec<&PlanItem> {
    activity
        .month(month)
        .map(|record| record.plans.iter().filter(|plan| plan.week == week).collect())
        .unwrap_or_default()
}

pub fn weekly_progress(activity: &BusinessActivity, month: u8, week: u8) -> Progress {
    progress(weekly_plans(activity, month, week))
}

/// Months whose plans are all executed. A month without plans never counts.
pub fn annual_completion_count(activity: &BusinessActivity) -> usize {
    activity
        .monthly_records
        .iter()
        .filter(|record| !record.plans.is_empty() && record.plans.iter().all(|plan| plan.is_executed))
        .count()
}

pub fn headline_kpi(kpis: &Collection<Kpi>) -> Option<&Kpi> {
    kpis.iter().find(|kpi| kpi.is_headline).or_else(|| kpis.first())
}

pub fn headline_tile(kpis: &Collection<Kpi>) -> HeadlineTile {
    match headline_kpi(kpis) {
        Some(kpi) => HeadlineTile {
            kpi_id: Some(kpi.id.clone()),
            value: kpi.current,
            change: 0.0,
        },
        None => HeadlineTile::default(),
    }
}

pub fn summary_stats<'a, F>(kpis_for: F) -> SummaryStats
where
    F: Fn(Department) -> &'a Collection<Kpi>,
{
    SummaryStats {
        safety: headline_tile(kpis_for(Department::Safety)),
        lease: headline_tile(kpis_for(Department::Lease)),
        asset: headline_tile(kpis_for(Department::Asset)),
        infra: headline_tile(kpis_for(Department::Infra)),
    }
}

pub fn monthly_plan_total<'a>(kpis: impl IntoIterator<Item = &'a Kpi>, month: u8) -> usize {
    kpis.into_iter()
        .flat_map(|kpi| kpi.activities.iter())
        .filter_map(|activity| activity.month(month))
        .map(|record| record.plans.len())
        .sum()
}

pub fn task_status_counts(tasks: &Collection<TaskItem>) -> TaskStatusCounts {
    let mut counts = TaskStatusCounts::default();
    for task in tasks.iter() {
        match task.status {
            TaskStatus::Completed => counts.done += 1,
            TaskStatus::Pending | TaskStatus::Urgent => {
                counts.open += 1;
                counts.attention += 1;
            }
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::Collection;
    use crate::models::MonthlyRecord;
    use chrono::NaiveDate;

    fn tenant(id: &str, area: f64, floor: i32, status: TenantStatus) -> Tenant {
        Tenant {
            id: id.to_string(),
            name: format!("Tenant {}", id),
            usage: "retail".to_string(),
            area,
            floor,
            status,
        }
    }

    fn plan(id: &str, week: u8, executed: bool) -> PlanItem {
        PlanItem {
            id: id.to_string(),
            text: format!("plan {}", id),
            is_executed: executed,
            week,
        }
    }

    fn activity_with(month: u8, plans: Vec<PlanItem>) -> BusinessActivity {
        let activity = BusinessActivity::new(
            "act-1".to_string(),
            "Inspect Zone A".to_string(),
            NaiveDate::from_ymd_opt(2025, 1, 1).expect("date"),
        );
        let records = activity
            .monthly_records
            .update(&month, |record: &MonthlyRecord| record.with_plans(plans.into()));
        activity.with_records(records)
    }

    fn kpi(id: &str, current: f64, headline: bool) -> Kpi {
        Kpi {
            id: id.to_string(),
            name: id.to_string(),
            target: 100.0,
            current,
            unit: "%".to_string(),
            activities: Collection::new(),
            is_headline: headline,
        }
    }

    #[test]
    fn lease_rate_excludes_public_space() {
        let tenants: Collection<Tenant> = vec![
            tenant("a", 1000.0, 1, TenantStatus::Occupied),
            tenant("b", 500.0, 1, TenantStatus::Vacant),
            tenant("c", 2000.0, 1, TenantStatus::Public),
        ]
        .into();
        assert_eq!(lease_rate(&tenants), 66.7);
    }

    #[test]
    fn lease_rate_guards_empty_area() {
        assert_eq!(lease_rate(&Collection::new()), 0.0);
        let zero: Collection<Tenant> = vec![tenant("a", 0.0, 1, TenantStatus::Occupied)].into();
        assert_eq!(lease_rate(&zero), 0.0);
        let only_public: Collection<Tenant> = vec![tenant("p", 900.0, 1, TenantStatus::Public)].into();
        assert_eq!(lease_rate(&only_public), 0.0);
    }

    #[test]
    fn floor_stats_and_listing_respect_floor_and_search() {
        let tenants: Collection<Tenant> = vec![
            tenant("U-1F-0001", 100.0, 1, TenantStatus::Occupied),
            tenant("U-1F-0002", 300.0, 1, TenantStatus::Vacant),
            tenant("U-1F-0003", 50.0, 1, TenantStatus::Public),
            tenant("U-2F-0001", 400.0, 2, TenantStatus::Occupied),
        ]
        .into();
        let stats = floor_occupancy(&tenants, 1);
        assert_eq!(stats.total_area, 400.0);
        assert_eq!(stats.occupied_area, 100.0);
        assert_eq!(stats.rate, 25.0);
        assert_eq!((stats.occupied_count, stats.vacant_count), (1, 1));

        let listed: Vec<&str> = rentable_units(&tenants, 1, "").iter().map(|t| t.id.as_str()).collect();
        assert_eq!(listed, vec!["U-1F-0001", "U-1F-0002"]);
        assert_eq!(rentable_units(&tenants, 1, "0002").len(), 1);
    }

    #[test]
    fn progress_rounds_to_whole_percent() {
        let activity = activity_with(4, vec![plan("p1", 1, true), plan("p2", 1, false), plan("p3", 2, false)]);
        let monthly = monthly_progress(&activity, 4);
        assert_eq!((monthly.completed, monthly.total, monthly.percent), (1, 3, 33));
        let weekly = weekly_progress(&activity, 4, 1);
        assert_eq!((weekly.completed, weekly.total, weekly.percent), (1, 2, 50));
        assert_eq!(weekly_progress(&activity, 4, 5), Progress::default());
        assert_eq!(monthly_progress(&activity, 5).percent, 0);
    }

    #[test]
    fn annual_completion_ignores_empty_months() {
        let done = activity_with(6, vec![plan("p1", 2, true)]);
        assert_eq!(annual_completion_count(&done), 1);
        let partial = activity_with(6, vec![plan("p1", 2, true), plan("p2", 3, false)]);
        assert_eq!(annual_completion_count(&partial), 0);
        let untouched = activity_with(6, Vec::new());
        assert_eq!(annual_completion_count(&untouched), 0);
    }

    #[test]
    fn headline_prefers_flag_and_falls_back_to_first() {
        let flagged: Collection<Kpi> = vec![kpi("first", 10.0, false), kpi("flagged", 42.0, true)].into();
        let tile = headline_tile(&flagged);
        assert_eq!(tile.kpi_id.as_deref(), Some("flagged"));
        assert_eq!(tile.value, 42.0);

        let legacy: Collection<Kpi> = vec![kpi("first", 10.0, false), kpi("second", 20.0, false)].into();
        assert_eq!(headline_tile(&legacy).value, 10.0);
        assert_eq!(headline_tile(&Collection::new()), HeadlineTile::default());
    }

    #[test]
    fn summary_reads_each_department() {
        let safety: Collection<Kpi> = vec![kpi("s", 180.0, false)].into();
        let empty = Collection::new();
        let stats = summary_stats(|department| match department {
            Department::Safety => &safety,
            _ => &empty,
        });
        assert_eq!(stats.safety.value, 180.0);
        assert_eq!(stats.lease.kpi_id, None);
    }

    #[test]
    fn monthly_total_counts_plans_across_kpis() {
        let mut first = kpi("k1", 0.0, false);
        first.activities = vec![activity_with(2, vec![plan("a", 1, false), plan("b", 2, true)])].into();
        let mut second = kpi("k2", 0.0, false);
        second.activities = vec![activity_with(2, vec![plan("c", 1, false)])].into();
        assert_eq!(monthly_plan_total([&first, &second], 2), 3);
        assert_eq!(monthly_plan_total([&first, &second], 3), 0);
    }

    #[test]
    fn task_counts_split_done_from_open() {
        let task = |id: &str, status| TaskItem {
            id: id.to_string(),
            time: "09:00".to_string(),
            category: "ops".to_string(),
            subject: "walkthrough".to_string(),
            assignee: "kim".to_string(),
            status,
        };
        let tasks: Collection<TaskItem> = vec![
            task("t1", TaskStatus::Pending),
            task("t2", TaskStatus::Urgent),
            task("t3", TaskStatus::Completed),
        ]
        .into();
        let counts = task_status_counts(&tasks);
        assert_eq!((counts.open, counts.done, counts.attention), (2, 1, 2));
    }
}
