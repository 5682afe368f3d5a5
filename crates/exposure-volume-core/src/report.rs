use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batch::BatchResult;

/// Timing statistics for one named phase of a run. Durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub name: String,
    pub data: Vec<u64>,
    pub total: u64,
    pub avg: f64,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

pub fn prepare_results(name: &str, results: &[BatchResult]) -> RunReport {
    let data: Vec<u64> = results.iter().map(|run| run.timings.duration).collect();
    let total: u64 = data.iter().sum();
    let avg = if data.is_empty() {
        0.0
    } else {
        total as f64 / data.len() as f64
    };

    RunReport {
        name: name.to_string(),
        data,
        total,
        avg,
    }
}

pub fn render_results(reports: &[RunReport]) -> String {
    let mut lines = Vec::new();

    for report in reports {
        if report.is_empty() {
            lines.push(format!("\nNOT RUN: {}", report.name));
            continue;
        }

        lines.push(format!("RESULTS: {}", report.name));
        lines.push("================".to_string());
        lines.extend(report.data.iter().map(u64::to_string));
        lines.push("----------------".to_string());
        lines.push(format!("TOTAL: {}", report.total));
        lines.push(format!("AVG: {}", report.avg));
        lines.push("\n".to_string());
    }

    lines.iter().map(|line| format!("{line}\n")).collect()
}

pub fn print_results(reports: &[RunReport], enabled: bool) {
    if !enabled {
        return;
    }
    print!("{}", render_results(reports));
}
