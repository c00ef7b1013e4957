use crate::collection::Collection;
use crate::models::{Kpi, KpiScope, SearchHitKind, SearchResult};

pub fn search<'a, I>(scopes: I, query: &str) -> Vec<SearchResult>
where
    I: IntoIterator<Item = (KpiScope, &'a Collection<Kpi>)>,
{
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }
    let matches = |text: &str| text.to_lowercase().contains(&needle);

    let mut results = Vec::new();
    for (scope, kpis) in scopes {
        for kpi in kpis.iter() {
            if matches(&kpi.name) {
                results.push(SearchResult {
                    kind: SearchHitKind::Kpi,
                    id: kpi.id.clone(),
                    name: kpi.name.clone(),
                    path: kpi.name.clone(),
                    scope: scope.clone(),
                    kpi_id: kpi.id.clone(),
                    activity_id: None,
                });
            }

            for activity in kpi.activities.iter() {
                let activity_path = format!("{} > {}", kpi.name, activity.content);
                if matches(&activity.content) {
                    results.push(SearchResult {
                        kind: SearchHitKind::Activity,
                        id: activity.id.clone(),
                        name: activity.content.clone(),
                        path: activity_path.clone(),
                        scope: scope.clone(),
                        kpi_id: kpi.id.clone(),
                        activity_id: Some(activity.id.clone()),
                    });
                }

                for plan in activity.monthly_records.iter().flat_map(|record| record.plans.iter()) {
                    if matches(&plan.text) {
                        results.push(SearchResult {
                            kind: SearchHitKind::Plan,
                            id: plan.id.clone(),
                            name: plan.text.clone(),
                            path: format!("{} > {}", activity_path, plan.text),
                            scope: scope.clone(),
                            kpi_id: kpi.id.clone(),
                            activity_id: Some(activity.id.clone()),
                        });
                    }
                }
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::search;
    use crate::collection::Collection;
    use crate::models::{
        BusinessActivity, Department, Kpi, KpiScope, MonthlyRecord, PlanItem, SearchHitKind,
    };
    use chrono::NaiveDate;

    fn sample_kpis() -> Collection<Kpi> {
        let activity = BusinessActivity::new(
            "act-1".to_string(),
            "Fence inspection".to_string(),
            NaiveDate::from_ymd_opt(2025, 5, 1).expect("date"),
        );
        let plan = PlanItem {
            id: "plan-1".to_string(),
            text: "Check FENCE north side".to_string(),
            is_executed: false,
            week: 2,
        };
        let records = activity
            .monthly_records
            .update(&6u8, |record: &MonthlyRecord| record.with_plans(vec![plan].into()));
        vec![Kpi {
            id: "kpi-1".to_string(),
            name: "Perimeter safety".to_string(),
            target: 100.0,
            current: 0.0,
            unit: "%".to_string(),
            activities: vec![activity.with_records(records)].into(),
            is_headline: false,
        }]
        .into()
    }

    #[test]
    fn finds_activities_and_plans_case_insensitively() {
        let kpis = sample_kpis();
        let results = search([(KpiScope::Department(Department::Safety), &kpis)], "fence");
        let kinds: Vec<SearchHitKind> = results.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![SearchHitKind::Activity, SearchHitKind::Plan]);
        assert_eq!(
            results[1].path,
            "Perimeter safety > Fence inspection > Check FENCE north side"
        );
        assert_eq!(results[1].activity_id.as_deref(), Some("act-1"));
    }

    #[test]
    fn blank_query_returns_nothing() {
        let kpis = sample_kpis();
        assert!(search([(KpiScope::Custom("custom-1".to_string()), &kpis)], "   ").is_empty());
    }
}
