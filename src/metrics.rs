//! Evaluation metrics
//!
//! Counters are atomics so rayon workers can record without locking; only
//! the rolling duration window takes a lock.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::sim::step::EvaluationSummary;

/// Samples kept for percentile calculation
const HISTORY_LEN: usize = 1000;

#[derive(Debug)]
pub struct EvaluationMetrics {
    pub ticks: AtomicU64,
    pub collisions: AtomicU64,
    /// Instances that ran to completion
    pub instances_completed: AtomicU64,
    /// Instances that aborted and scored the sentinel fitness
    pub instances_aborted: AtomicU64,
    /// Genome evaluations finished (all environments and trials)
    pub evaluations_completed: AtomicU64,
    pub nan_outputs: AtomicU64,
    pub brain_rebuilds: AtomicU64,

    // Instance wall-clock timing (microseconds)
    pub instance_time_us: AtomicU64,
    pub instance_time_p95_us: AtomicU64,
    pub instance_time_p99_us: AtomicU64,
    pub instance_time_max_us: AtomicU64,

    start_time: Instant,

    // Rolling instance times for percentile calculation
    instance_history: RwLock<VecDeque<u64>>,
}

impl EvaluationMetrics {
    pub fn new() -> Self {
        Self {
            ticks: AtomicU64::new(0),
            collisions: AtomicU64::new(0),
            instances_completed: AtomicU64::new(0),
            instances_aborted: AtomicU64::new(0),
            evaluations_completed: AtomicU64::new(0),
            nan_outputs: AtomicU64::new(0),
            brain_rebuilds: AtomicU64::new(0),
            instance_time_us: AtomicU64::new(0),
            instance_time_p95_us: AtomicU64::new(0),
            instance_time_p99_us: AtomicU64::new(0),
            instance_time_max_us: AtomicU64::new(0),
            start_time: Instant::now(),
            instance_history: RwLock::new(VecDeque::with_capacity(HISTORY_LEN)),
        }
    }

    /// Fold a completed instance into the totals
    pub fn record_instance(&self, summary: &EvaluationSummary, rebuilds: u64, elapsed: Duration) {
        self.ticks.fetch_add(summary.ticks, Ordering::Relaxed);
        self.collisions.fetch_add(summary.collisions, Ordering::Relaxed);
        self.nan_outputs.fetch_add(summary.nan_outputs, Ordering::Relaxed);
        self.brain_rebuilds.fetch_add(rebuilds, Ordering::Relaxed);
        self.instances_completed.fetch_add(1, Ordering::Relaxed);
        self.record_instance_time(elapsed);
    }

    /// Count an aborted instance
    pub fn record_abort(&self, ticks: u64, elapsed: Duration) {
        self.ticks.fetch_add(ticks, Ordering::Relaxed);
        self.instances_aborted.fetch_add(1, Ordering::Relaxed);
        self.record_instance_time(elapsed);
    }

    /// Record an instance time and update percentiles
    pub fn record_instance_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.instance_time_us.store(us, Ordering::Relaxed);

        let mut history = self.instance_history.write();
        history.push_back(us);
        while history.len() > HISTORY_LEN {
            history.pop_front();
        }

        let mut sorted: Vec<u64> = history.iter().copied().collect();
        drop(history);
        sorted.sort_unstable();

        let last = sorted.len() - 1;
        let p95_idx = (sorted.len() as f64 * 0.95) as usize;
        let p99_idx = (sorted.len() as f64 * 0.99) as usize;
        self.instance_time_p95_us.store(sorted[p95_idx.min(last)], Ordering::Relaxed);
        self.instance_time_p99_us.store(sorted[p99_idx.min(last)], Ordering::Relaxed);
        self.instance_time_max_us.store(sorted[last], Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("evorobot_ticks_total", "Simulation ticks executed", "counter",
            self.ticks.load(Ordering::Relaxed));
        metric!("evorobot_collisions_total", "Robot collision events", "counter",
            self.collisions.load(Ordering::Relaxed));
        metric!("evorobot_instances_completed_total", "Evaluation instances run to completion", "counter",
            self.instances_completed.load(Ordering::Relaxed));
        metric!("evorobot_instances_aborted_total", "Evaluation instances aborted", "counter",
            self.instances_aborted.load(Ordering::Relaxed));
        metric!("evorobot_evaluations_total", "Genome evaluations finished", "counter",
            self.evaluations_completed.load(Ordering::Relaxed));
        metric!("evorobot_nan_outputs_total", "Controller activations that produced NaN", "counter",
            self.nan_outputs.load(Ordering::Relaxed));
        metric!("evorobot_brain_rebuilds_total", "Brain rebuilds after input density changes", "counter",
            self.brain_rebuilds.load(Ordering::Relaxed));

        metric!("evorobot_instance_time_microseconds", "Last instance wall time", "gauge",
            self.instance_time_us.load(Ordering::Relaxed));
        metric!("evorobot_instance_time_p95_microseconds", "95th percentile instance wall time", "gauge",
            self.instance_time_p95_us.load(Ordering::Relaxed));
        metric!("evorobot_instance_time_p99_microseconds", "99th percentile instance wall time", "gauge",
            self.instance_time_p99_us.load(Ordering::Relaxed));
        metric!("evorobot_instance_time_max_microseconds", "Maximum instance wall time", "gauge",
            self.instance_time_max_us.load(Ordering::Relaxed));
        metric!("evorobot_uptime_seconds", "Process uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// Generate JSON format metrics
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "simulation": {
                "ticks": self.ticks.load(Ordering::Relaxed),
                "collisions": self.collisions.load(Ordering::Relaxed),
                "nan_outputs": self.nan_outputs.load(Ordering::Relaxed),
                "brain_rebuilds": self.brain_rebuilds.load(Ordering::Relaxed),
            },
            "instances": {
                "completed": self.instances_completed.load(Ordering::Relaxed),
                "aborted": self.instances_aborted.load(Ordering::Relaxed),
                "time_us": self.instance_time_us.load(Ordering::Relaxed),
                "time_p95_us": self.instance_time_p95_us.load(Ordering::Relaxed),
                "time_p99_us": self.instance_time_p99_us.load(Ordering::Relaxed),
                "time_max_us": self.instance_time_max_us.load(Ordering::Relaxed),
            },
            "evaluations": self.evaluations_completed.load(Ordering::Relaxed),
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for EvaluationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = EvaluationMetrics::new();
        assert_eq!(metrics.ticks.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.instances_aborted.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_record_instance_accumulates() {
        let metrics = EvaluationMetrics::new();
        let summary = EvaluationSummary {
            ticks: 625,
            collisions: 3,
            nan_outputs: 1,
        };
        metrics.record_instance(&summary, 1, Duration::from_micros(500));
        metrics.record_instance(&summary, 0, Duration::from_micros(700));
        metrics.record_abort(10, Duration::from_micros(50));

        assert_eq!(metrics.ticks.load(Ordering::Relaxed), 1260);
        assert_eq!(metrics.collisions.load(Ordering::Relaxed), 6);
        assert_eq!(metrics.brain_rebuilds.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.instances_completed.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.instances_aborted.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.instance_time_max_us.load(Ordering::Relaxed), 700);
    }

    #[test]
    fn test_percentiles() {
        let metrics = EvaluationMetrics::new();
        for i in 0..100 {
            metrics.record_instance_time(Duration::from_micros(100 + i * 10));
        }
        assert_eq!(metrics.instance_time_p95_us.load(Ordering::Relaxed), 1050);
        assert_eq!(metrics.instance_time_p99_us.load(Ordering::Relaxed), 1090);
        assert_eq!(metrics.instance_time_max_us.load(Ordering::Relaxed), 1090);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = EvaluationMetrics::new();
        metrics.collisions.store(42, Ordering::Relaxed);

        let output = metrics.to_prometheus();
        assert!(output.contains("evorobot_collisions_total 42"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE evorobot_ticks_total counter"));
    }

    #[test]
    fn test_json_format() {
        let metrics = EvaluationMetrics::new();
        metrics.instances_aborted.store(2, Ordering::Relaxed);

        let parsed: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();
        assert_eq!(parsed["instances"]["aborted"], 2);
        assert_eq!(parsed["simulation"]["ticks"], 0);
    }
}
