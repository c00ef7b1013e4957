use crate::collection::Collection;
use crate::models::{Department, Facility, Kpi};
use once_cell::sync::Lazy;

static BASELINE_FACILITIES: Lazy<Vec<Facility>> = Lazy::new(|| {
    vec![
        facility("facility-1", "Public amenities", "Road", 160_666.0, 0.0, "Road", [0.0, 0.0, 0.0, 0.0], "-", "-"),
        facility(
            "facility-2",
            "Public amenities",
            "Pedestrian-only road",
            7_670.0,
            0.0,
            "Pedestrian-only road",
            [0.0, 0.0, 0.0, 0.0],
            "-",
            "-",
        ),
        facility(
            "facility-3",
            "Public amenities",
            "Central management center",
            11_743.0,
            0.0,
            "-",
            [4_267.51, 36.34, 9_000.0, 76.64],
            "Office, neighborhood living",
            "12m (3 floors or less)",
        ),
        facility(
            "facility-4",
            "Lodging",
            "Resort condominium 1",
            30_474.0,
            0.0,
            "Resort condominium 1",
            [9_334.82, 30.63, 36_922.55, 121.16],
            "Lodging, neighborhood living",
            "12m (4 floors or less)",
        ),
        facility(
            "facility-5",
            "Commercial",
            "Wellness mall 1",
            12_475.0,
            2.9,
            "Wellness mall 1",
            [5_590.0, 44.81, 11_700.0, 93.79],
            "Neighborhood living, retail",
            "-",
        ),
        facility(
            "facility-6",
            "Other (medical, research)",
            "Healthcare center",
            15_737.0,
            0.0,
            "Healthcare center",
            [6_000.0, 38.13, 30_000.0, 190.63],
            "Medical, neighborhood living",
            "15m (5 floors or less)",
        ),
    ]
});

#[allow(clippy::too_many_arguments)]
fn facility(
    id: &str,
    category: &str,
    name: &str,
    area: f64,
    ratio: f64,
    content: &str,
    [building_area, bcr, gfa, far]: [f64; 4],
    usage: &str,
    height: &str,
) -> Facility {
    Facility {
        id: id.to_string(),
        category: category.to_string(),
        name: name.to_string(),
        area,
        ratio,
        content: content.to_string(),
        building_area,
        bcr,
        gfa,
        far,
        usage: usage.to_string(),
        height: height.to_string(),
        notes: String::new(),
    }
}

pub fn baseline_facilities() -> Collection<Facility> {
    BASELINE_FACILITIES.iter().cloned().collect()
}

pub fn baseline_kpis(department: Department, lease_kpi_id: &str) -> Collection<Kpi> {
    match department {
        Department::Lease => vec![Kpi {
            id: lease_kpi_id.to_string(),
            name: "Occupancy rate".to_string(),
            target: 100.0,
            current: 0.0,
            unit: "%".to_string(),
            activities: Collection::new(),
            is_headline: true,
        }]
        .into(),
        Department::Safety | Department::Asset | Department::Infra => Collection::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{baseline_facilities, baseline_kpis};
    use crate::models::Department;
    use std::collections::HashSet;

    #[test]
    fn baseline_facilities_have_unique_ids() {
        let facilities = baseline_facilities();
        assert_eq!(facilities.len(), 6);
        let ids: HashSet<&str> = facilities.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids.len(), 6);
    }

    #[test]
    fn only_lease_is_seeded_with_a_kpi() {
        let lease = baseline_kpis(Department::Lease, "default-lease");
        assert_eq!(lease.first().map(|k| k.id.as_str()), Some("default-lease"));
        assert!(baseline_kpis(Department::Safety, "default-lease").is_empty());
    }
}
