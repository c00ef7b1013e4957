use crate::collection::Collection;
use crate::models::{Kpi, KpiScope};

struct ReportLine {
    kpi: String,
    activity: String,
    plan: String,
}

impl ReportLine {
    fn render(&self) -> String {
        format!("- [{}] {}: {}\n", self.kpi, self.activity, self.plan)
    }
}

fn push_section(out: &mut String, title: &str, lines: &[ReportLine]) {
    out.push_str(&format!("### {}\n", title));
    if lines.is_empty() {
        out.push_str("- none\n");
    } else {
        for line in lines {
            out.push_str(&line.render());
        }
    }
    out.push('\n');
}

pub fn weekly_report<'a, I>(scopes: I, month: u8, week: u8) -> String
where
    I: IntoIterator<Item = (KpiScope, &'a Collection<Kpi>)>,
{
    let mut executed = Vec::new();
    let mut pending = Vec::new();

    for (_, kpis) in scopes {
        for kpi in kpis.iter() {
            for activity in kpi.activities.iter() {
                let Some(record) = activity.month(month) else {
                    continue;
                };
                for plan in record.plans.iter().filter(|plan| plan.week == week) {
                    let line = ReportLine {
                        kpi: kpi.name.clone(),
                        activity: activity.content.clone(),
                        plan: plan.text.clone(),
                    };
                    if plan.is_executed {
                        executed.push(line);
                    } else {
                        pending.push(line);
                    }
                }
            }
        }
    }

    let mut out = String::new();
    out.push_str(&format!("## Weekly plan report (month {}, week {})\n\n", month, week));
    push_section(&mut out, "1. Executed", &executed);
    push_section(&mut out, "2. Pending", &pending);
    out.push_str("### 3. Notes\n- \n");
    out
}
