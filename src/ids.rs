use chrono::Utc;

// Millis never repeat within one generator; candidates reported as taken are skipped.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last_millis: i64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_millis(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.last_millis = if now > self.last_millis {
            now
        } else {
            self.last_millis + 1
        };
        self.last_millis
    }

    pub fn next_id(&mut self, prefix: &str, taken: impl Fn(&str) -> bool) -> String {
        loop {
            let candidate = format!("{}-{}", prefix, self.next_millis());
            if !taken(&candidate) {
                return candidate;
            }
        }
    }

    pub fn next_unit_id(&mut self, floor: i32, taken: impl Fn(&str) -> bool) -> String {
        loop {
            let millis = self.next_millis();
            let candidate = format!("U-{}F-{:04}", floor, millis.rem_euclid(10_000));
            if !taken(&candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::IdGenerator;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_within_a_burst() {
        let mut ids = IdGenerator::new();
        let generated: HashSet<String> = (0..500).map(|_| ids.next_id("plan", |_| false)).collect();
        assert_eq!(generated.len(), 500);
        assert!(generated.iter().all(|id| id.starts_with("plan-")));
    }

    #[test]
    fn taken_candidates_are_skipped() {
        let mut ids = IdGenerator::new();
        let first = ids.next_id("kpi", |_| false);
        let second = ids.next_id("kpi", |candidate| candidate == first);
        assert_ne!(first, second);
    }

    #[test]
    fn unit_ids_carry_floor_and_four_digits() {
        let mut ids = IdGenerator::new();
        let id = ids.next_unit_id(3, |_| false);
        assert!(id.starts_with("U-3F-"));
        assert_eq!(id.len(), "U-3F-".len() + 4);
    }
}
