use std::collections::HashMap;
use std::time::Instant;

/// Observer for detection-loop events.
///
/// Keeps the scheduler free of any particular output mechanism; the CLI
/// logs through the `log` crate, tests use [`NullCycleLogger`].
pub trait CycleLogger: Send {
    /// A cycle finished; `index` counts from zero.
    fn cycle_completed(&mut self, index: u64);

    /// A tick was skipped without producing results.
    fn cycle_skipped(&mut self, reason: &str);

    /// Record how long a named stage took in one cycle.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (faces per cycle, gallery size).
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullCycleLogger;

impl CycleLogger for NullCycleLogger {
    fn cycle_completed(&mut self, _index: u64) {}
    fn cycle_skipped(&mut self, _reason: &str) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running aggregate of one timing or metric series.
///
/// Holds a fixed amount of state no matter how many samples were recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SampleStats {
    count: u64,
    total: f64,
    max: f64,
}

impl SampleStats {
    pub fn record(&mut self, value: f64) {
        self.max = if self.count == 0 { value } else { self.max.max(value) };
        self.count += 1;
        self.total += value;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Accumulates per-stage timings and metrics and logs a summary with
/// throughput at the end of the run.
///
/// Per-cycle progress is logged at debug level every `report_every` cycles.
pub struct LogCycleLogger {
    report_every: u64,
    timings: HashMap<String, SampleStats>,
    metrics: HashMap<String, SampleStats>,
    start_time: Instant,
    completed: u64,
    skipped: u64,
}

impl LogCycleLogger {
    pub fn new(report_every: u64) -> Self {
        Self {
            report_every: report_every.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            completed: 0,
            skipped: 0,
        }
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Returns the formatted summary, or `None` if nothing happened.
    pub fn summary_string(&self) -> Option<String> {
        if self.completed == 0 && self.skipped == 0 && self.timings.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Detection summary ({} cycles, {} skipped, {:.1}s total):",
            self.completed,
            self.skipped,
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let stats = &self.timings[stage];
            let (avg_ms, max_ms, total_ms) = (stats.mean(), stats.max(), stats.total());
            lines.push(format!(
                "  {stage:8}: avg {avg_ms:6.1}ms  max {max_ms:6.1}ms  total {total_ms:7.0}ms"
            ));
        }

        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort();
        for name in names {
            let avg = self.metrics[name].mean();
            lines.push(format!("  {name}: avg {avg:.1}"));
        }

        if self.completed > 0 && elapsed_ms > 0.0 {
            let rate = self.completed as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {rate:.2} cycles/s"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&SampleStats> {
        self.timings.get(stage)
    }

    pub fn metrics_for(&self, name: &str) -> Option<&SampleStats> {
        self.metrics.get(name)
    }
}

impl Default for LogCycleLogger {
    fn default() -> Self {
        Self::new(20)
    }
}

impl CycleLogger for LogCycleLogger {
    fn cycle_completed(&mut self, index: u64) {
        self.completed += 1;
        if (index + 1) % self.report_every == 0 {
            log::debug!("Completed {} detection cycles", index + 1);
        }
    }

    fn cycle_skipped(&mut self, reason: &str) {
        self.skipped += 1;
        log::warn!("Skipping detection cycle: {reason}");
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        record_sample(&mut self.timings, stage, duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        record_sample(&mut self.metrics, name, value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

fn record_sample(series: &mut HashMap<String, SampleStats>, key: &str, value: f64) {
    match series.get_mut(key) {
        Some(stats) => stats.record(value),
        None => series.entry(key.to_string()).or_default().record(value),
    }
}
