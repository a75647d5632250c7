//! Timing aggregation over invocation results.
//!
//! Everything here is a pure function of its input: results are filtered by
//! variant, sorted, and reduced, so the order in which invocations completed
//! never affects the report.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::contract::{BatchOrder, InvocationResult, RunContext, Variant};
use crate::outcome::{InvocationOutcome, InvocationState};

pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

/// Summary statistics in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DurationStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

impl DurationStats {
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let avg = sorted.iter().sum::<f64>() / sorted.len() as f64;

        Some(Self {
            min,
            // Summation error can push the mean a hair outside the observed range.
            avg: avg.clamp(min, max),
            max,
            p50: percentile(&sorted, 0.5),
            p90: percentile(&sorted, 0.9),
            p99: percentile(&sorted, 0.99),
        })
    }
}

/// Uses floor(q * (n - 1)) over pre-sorted samples.
fn percentile(sorted: &[f64], quantile: f64) -> f64 {
    let idx = ((sorted.len() - 1) as f64 * quantile) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureCounts {
    pub failed: usize,
    pub timed_out: usize,
}

impl FailureCounts {
    pub fn total(&self) -> usize {
        self.failed + self.timed_out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateReport {
    pub variant: Variant,
    pub label: String,
    pub count: usize,
    pub failures: FailureCounts,
    pub write_duration_ms: Option<DurationStats>,
    pub read_duration_ms: Option<DurationStats>,
    pub total_duration_ms: Option<DurationStats>,
    pub round_trip_ms: Option<DurationStats>,
}

impl AggregateReport {
    pub fn attempted(&self) -> usize {
        self.count + self.failures.total()
    }
}

/// Aggregates the successful results of one variant.
///
/// Results belonging to other variants are ignored.
pub fn aggregate_results(
    variant: Variant,
    label: &str,
    results: &[InvocationResult],
    failures: FailureCounts,
) -> AggregateReport {
    let samples: Vec<&InvocationResult> = results
        .iter()
        .filter(|result| result.variant == variant)
        .collect();

    let collect = |field: fn(&InvocationResult) -> Option<f64>| -> Vec<f64> {
        samples.iter().filter_map(|result| field(*result)).collect()
    };

    AggregateReport {
        variant,
        label: label.to_string(),
        count: samples.len(),
        failures,
        write_duration_ms: DurationStats::from_samples(&collect(|r| Some(r.write_duration_ms))),
        read_duration_ms: DurationStats::from_samples(&collect(|r| Some(r.read_duration_ms))),
        total_duration_ms: DurationStats::from_samples(&collect(|r| Some(r.total_duration_ms))),
        round_trip_ms: DurationStats::from_samples(&collect(|r| r.round_trip_ms)),
    }
}

/// Aggregates every outcome of one variant, counting non-successes as failures.
///
/// An outcome still `Pending` at aggregation time never completed and is
/// counted as timed out.
pub fn aggregate_outcomes(
    variant: Variant,
    label: &str,
    outcomes: &[InvocationOutcome],
) -> AggregateReport {
    let mut results = Vec::new();
    let mut failures = FailureCounts::default();

    for outcome in outcomes.iter().filter(|outcome| outcome.variant == variant) {
        match outcome.state() {
            InvocationState::Succeeded(result) => results.push(result.clone()),
            InvocationState::Failed(_) => failures.failed += 1,
            InvocationState::TimedOut(_) | InvocationState::Pending => failures.timed_out += 1,
        }
    }

    aggregate_results(variant, label, &results, failures)
}

/// Final artifact of a benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchmarkReport {
    pub run_context: RunContext,
    pub order: BatchOrder,
    pub started_at: String,
    pub finished_at: String,
    pub elapsed_ms: f64,
    pub reports: Vec<AggregateReport>,
}

impl BenchmarkReport {
    pub fn report(&self, variant: Variant) -> Option<&AggregateReport> {
        self.reports.iter().find(|report| report.variant == variant)
    }

    pub fn total_successes(&self) -> usize {
        self.reports.iter().map(|report| report.count).sum()
    }

    pub fn total_attempted(&self) -> usize {
        self.reports.iter().map(AggregateReport::attempted).sum()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::BenchError;

    use super::*;

    fn result(variant: Variant, write: f64, read: f64) -> InvocationResult {
        InvocationResult {
            variant,
            key: format!("{variant}-{write}-{read}"),
            write_duration_ms: write,
            read_duration_ms: read,
            total_duration_ms: write + read,
            round_trip_ms: Some(write + read + 20.0),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn scenario_results() -> Vec<InvocationResult> {
        [10.0, 12.0, 9.0, 11.0, 13.0]
            .into_iter()
            .zip([5.0, 6.0, 4.0, 5.0, 6.0])
            .map(|(write, read)| result(Variant::A, write, read))
            .collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn aggregates_synthetic_durations() {
        let report =
            aggregate_results(Variant::A, "a", &scenario_results(), FailureCounts::default());

        assert_eq!(report.count, 5);
        let write = report.write_duration_ms.expect("write stats");
        let read = report.read_duration_ms.expect("read stats");
        assert_close(write.min, 9.0);
        assert_close(write.max, 13.0);
        assert_close(write.avg, 11.0);
        assert_close(read.min, 4.0);
        assert_close(read.max, 6.0);
        assert_close(read.avg, 5.2);
        assert_close(write.p50, 11.0);
    }

    #[test]
    fn aggregation_is_pure() {
        let results = scenario_results();
        let failures = FailureCounts {
            failed: 1,
            timed_out: 2,
        };
        assert_eq!(
            aggregate_results(Variant::A, "a", &results, failures),
            aggregate_results(Variant::A, "a", &results, failures)
        );
    }

    #[test]
    fn aggregation_ignores_completion_order() {
        let results = scenario_results();
        let mut reversed = results.clone();
        reversed.reverse();
        assert_eq!(
            aggregate_results(Variant::A, "a", &results, FailureCounts::default()),
            aggregate_results(Variant::A, "a", &reversed, FailureCounts::default())
        );
    }

    #[test]
    fn aggregation_excludes_other_variants() {
        let mut results = scenario_results();
        results.push(result(Variant::B, 500.0, 500.0));

        let report = aggregate_results(Variant::A, "a", &results, FailureCounts::default());
        assert_eq!(report.count, 5);
        assert_close(report.write_duration_ms.expect("write stats").max, 13.0);
    }

    #[test]
    fn stats_keep_min_avg_max_ordering() {
        let samples = [0.1, 0.1, 0.1];
        let stats = DurationStats::from_samples(&samples).expect("stats");
        assert!(stats.min <= stats.avg && stats.avg <= stats.max);

        let spread = [3.5, 0.25, 1000.0, 42.0, 7.75, 0.0];
        let stats = DurationStats::from_samples(&spread).expect("stats");
        assert!(stats.min <= stats.avg && stats.avg <= stats.max);
        assert!(stats.min <= stats.p50 && stats.p50 <= stats.p90 && stats.p90 <= stats.p99);
        assert!(stats.p99 <= stats.max);
    }

    #[test]
    fn empty_samples_have_no_stats() {
        assert!(DurationStats::from_samples(&[]).is_none());
        let report = aggregate_results(Variant::B, "b", &[], FailureCounts::default());
        assert_eq!(report.count, 0);
        assert!(report.write_duration_ms.is_none());
    }

    #[test]
    fn outcomes_split_into_successes_and_failure_counts() {
        let mut outcomes = Vec::new();
        for (sequence, result) in scenario_results().into_iter().enumerate().take(4) {
            let mut outcome = InvocationOutcome::pending(Variant::A, sequence);
            outcome.resolve(InvocationState::Succeeded(result));
            outcomes.push(outcome);
        }
        let mut timed_out = InvocationOutcome::pending(Variant::A, 4);
        timed_out.resolve(InvocationState::TimedOut(BenchError::InvocationTimeout {
            variant: Variant::A,
            timeout_ms: 100,
        }));
        outcomes.push(timed_out);
        let mut failed = InvocationOutcome::pending(Variant::B, 0);
        failed.resolve(InvocationState::Failed(BenchError::InvocationFailed {
            variant: Variant::B,
            message: "boom".to_string(),
        }));
        outcomes.push(failed);
        outcomes.push(InvocationOutcome::pending(Variant::B, 1));

        let report_a = aggregate_outcomes(Variant::A, "a", &outcomes);
        assert_eq!(report_a.count, 4);
        assert_eq!(report_a.failures.timed_out, 1);
        assert_eq!(report_a.failures.total(), 1);
        assert_eq!(report_a.attempted(), 5);

        let report_b = aggregate_outcomes(Variant::B, "b", &outcomes);
        assert_eq!(report_b.count, 0);
        assert_eq!(
            report_b.failures,
            FailureCounts {
                failed: 1,
                timed_out: 1
            }
        );
    }
}
