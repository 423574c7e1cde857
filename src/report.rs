use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use serde::Serialize;

use crate::workload::Iteration;

// 1µs to 60s at 3 significant figures; slower responses saturate at the top.
const LATENCY_LOW_US: u64 = 1;
const LATENCY_HIGH_US: u64 = 60_000_000;

/// Running aggregate over everything the virtual users produced.
/// Owned by the single recorder task, so no locking is needed.
pub struct Stats {
    iterations: u64,
    status_counts: BTreeMap<u16, u64>,
    error_counts: BTreeMap<String, u64>,
    checks: BTreeMap<String, CheckTally>,
    latency_us: Histogram<u64>,
}

#[derive(Debug, Default, Clone, Copy)]
struct CheckTally {
    passes: u64,
    fails: u64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        Self {
            iterations: 0,
            status_counts: BTreeMap::new(),
            error_counts: BTreeMap::new(),
            checks: BTreeMap::new(),
            latency_us: Histogram::new_with_bounds(LATENCY_LOW_US, LATENCY_HIGH_US, 3)
                .expect("static histogram bounds"),
        }
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn record(&mut self, iteration: &Iteration) {
        self.iterations += 1;

        match iteration.outcome.status {
            Some(status) => {
                *self.status_counts.entry(status).or_insert(0) += 1;
            }
            None => {
                let kind = iteration
                    .outcome
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string());
                *self.error_counts.entry(kind).or_insert(0) += 1;
            }
        }

        let tally = self
            .checks
            .entry(iteration.check.name.clone())
            .or_default();
        if iteration.check.pass {
            tally.passes += 1;
        } else {
            tally.fails += 1;
        }

        let us = iteration.outcome.latency.as_micros() as u64;
        self.latency_us.saturating_record(us.max(LATENCY_LOW_US));
    }

    pub fn into_summary(
        self,
        started_at: DateTime<Utc>,
        wall: Duration,
        peak_vus: u32,
    ) -> Summary {
        let duration_secs = wall.as_secs_f64();
        let iterations_per_sec = if duration_secs > 0.0 {
            self.iterations as f64 / duration_secs
        } else {
            0.0
        };

        let checks = self
            .checks
            .into_iter()
            .map(|(name, tally)| {
                let total = tally.passes + tally.fails;
                CheckSummary {
                    name,
                    passes: tally.passes,
                    fails: tally.fails,
                    pass_rate: if total > 0 {
                        tally.passes as f64 / total as f64
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        let ms = |us: u64| us as f64 / 1000.0;
        let hist = &self.latency_us;
        let latency_ms = LatencySummary {
            min: ms(hist.min()),
            mean: hist.mean() / 1000.0,
            p50: ms(hist.value_at_quantile(0.50)),
            p90: ms(hist.value_at_quantile(0.90)),
            p95: ms(hist.value_at_quantile(0.95)),
            p99: ms(hist.value_at_quantile(0.99)),
            max: ms(hist.max()),
        };

        Summary {
            started_at,
            finished_at: Utc::now(),
            duration_secs,
            iterations: self.iterations,
            iterations_per_sec,
            peak_vus,
            checks,
            status_counts: self.status_counts,
            error_counts: self.error_counts,
            latency_ms,
        }
    }
}

/// Final aggregate for the whole run.
#[derive(Debug, Serialize)]
pub struct Summary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub iterations: u64,
    pub iterations_per_sec: f64,
    pub peak_vus: u32,
    pub checks: Vec<CheckSummary>,
    pub status_counts: BTreeMap<u16, u64>,
    pub error_counts: BTreeMap<String, u64>,
    pub latency_ms: LatencySummary,
}

#[derive(Debug, Serialize)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
    pub pass_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct LatencySummary {
    pub min: f64,
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub max: f64,
}

impl Summary {
    pub fn render(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(
            out,
            "run complete: {} iterations in {:.1}s ({:.1}/s), peak {} VUs",
            self.iterations, self.duration_secs, self.iterations_per_sec, self.peak_vus
        );

        if !self.checks.is_empty() {
            let _ = writeln!(out, "\nchecks");
            for check in &self.checks {
                let _ = writeln!(
                    out,
                    "  {}: {:.2}% ({} passed, {} failed)",
                    check.name,
                    check.pass_rate * 100.0,
                    check.passes,
                    check.fails
                );
            }
        }

        if !self.status_counts.is_empty() {
            let _ = writeln!(out, "\nstatus codes");
            for (status, count) in &self.status_counts {
                let _ = writeln!(out, "  {status}: {count}");
            }
        }

        if !self.error_counts.is_empty() {
            let _ = writeln!(out, "\nerrors");
            for (kind, count) in &self.error_counts {
                let _ = writeln!(out, "  {kind}: {count}");
            }
        }

        let l = &self.latency_ms;
        let _ = writeln!(
            out,
            "\nlatency (ms)\n  min {:.1}  mean {:.1}  p50 {:.1}  p90 {:.1}  p95 {:.1}  p99 {:.1}  max {:.1}",
            l.min, l.mean, l.p50, l.p90, l.p95, l.p99, l.max
        );

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{CheckResult, Outcome};

    fn iteration(status: Option<u16>, error: Option<&str>, pass: bool, ms: u64) -> Iteration {
        Iteration {
            outcome: Outcome {
                status,
                latency: Duration::from_millis(ms),
                error: error.map(str::to_string),
            },
            check: CheckResult {
                name: "status was 200".to_string(),
                pass,
            },
        }
    }

    fn summary_of(iterations: &[Iteration]) -> Summary {
        let mut stats = Stats::new();
        for i in iterations {
            stats.record(i);
        }
        stats.into_summary(Utc::now(), Duration::from_secs(10), 5)
    }

    #[test]
    fn test_one_check_tally_per_iteration() {
        let summary = summary_of(&[
            iteration(Some(200), None, true, 10),
            iteration(Some(200), None, true, 20),
            iteration(Some(500), None, false, 30),
        ]);

        assert_eq!(summary.iterations, 3);
        assert_eq!(summary.checks.len(), 1);
        assert_eq!(summary.checks[0].passes, 2);
        assert_eq!(summary.checks[0].fails, 1);
        assert!((summary.checks[0].pass_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_status_and_error_distributions() {
        let summary = summary_of(&[
            iteration(Some(200), None, true, 10),
            iteration(Some(500), None, false, 10),
            iteration(None, Some("connect"), false, 10),
            iteration(None, Some("connect"), false, 10),
            iteration(None, Some("timeout"), false, 10),
        ]);

        assert_eq!(summary.status_counts[&200], 1);
        assert_eq!(summary.status_counts[&500], 1);
        assert_eq!(summary.error_counts["connect"], 2);
        assert_eq!(summary.error_counts["timeout"], 1);
    }

    #[test]
    fn test_latency_quantiles_are_ordered() {
        let iterations: Vec<Iteration> = (1..=100)
            .map(|ms| iteration(Some(200), None, true, ms))
            .collect();
        let summary = summary_of(&iterations);

        let l = &summary.latency_ms;
        assert!(l.min <= l.p50);
        assert!(l.p50 <= l.p90);
        assert!(l.p90 <= l.p99);
        assert!(l.p99 <= l.max);
        assert!(l.max >= 99.0);
    }

    #[test]
    fn test_empty_run_summary() {
        let summary = summary_of(&[]);
        assert_eq!(summary.iterations, 0);
        assert!(summary.checks.is_empty());
        assert_eq!(summary.iterations_per_sec, 0.0);
    }

    #[test]
    fn test_summary_serializes() {
        let summary = summary_of(&[iteration(Some(200), None, true, 10)]);
        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["iterations"], 1);
        assert_eq!(value["checks"][0]["name"], "status was 200");
        assert!(value["latency_ms"]["p95"].is_number());
    }

    #[test]
    fn test_render_mentions_checks_and_latency() {
        let summary = summary_of(&[iteration(Some(200), None, true, 10)]);
        let text = summary.render();
        assert!(text.contains("status was 200"));
        assert!(text.contains("latency (ms)"));
        assert!(text.contains("1 iterations"));
    }
}
