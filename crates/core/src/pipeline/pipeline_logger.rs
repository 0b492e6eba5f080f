use std::collections::HashMap;
use std::time::Instant;

/// Observer for per-cycle tracking events.
///
/// Keeps the use case free of any particular output mechanism; the CLI
/// aggregates and prints, embedders and tests discard.
pub trait PipelineLogger: Send {
    /// Report that cycle number `cycle` (1-based) completed.
    fn cycle(&mut self, cycle: usize);

    /// Record how long a named stage took within one cycle.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. active sessions, dropped detections).
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn cycle(&mut self, _cycle: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running count, sum and peak of one stream of samples.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct StageStats {
    pub count: usize,
    pub total: f64,
    pub max: f64,
}

impl StageStats {
    fn record(&mut self, value: f64) {
        if self.count == 0 || value > self.max {
            self.max = value;
        }
        self.count += 1;
        self.total += value;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Aggregating logger for batch replays.
///
/// Keeps one [`StageStats`] per stage and metric, so memory stays flat no
/// matter how long the stream runs. Progress lines are throttled to one
/// every `throttle_cycles` cycles.
pub struct StdoutPipelineLogger {
    throttle_cycles: usize,
    timings: HashMap<String, StageStats>,
    metrics: HashMap<String, StageStats>,
    start_time: Instant,
    cycles: usize,
    last_message: Option<String>,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_cycles: usize) -> Self {
        Self {
            throttle_cycles: throttle_cycles.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            cycles: 0,
            last_message: None,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let wall_secs = self.start_time.elapsed().as_secs_f64();
        let cycles = self.cycles;
        let mut lines = vec![format!(
            "Tracking summary ({cycles} cycles, {wall_secs:.1}s wall):"
        )];

        for (stage, stats) in sorted(&self.timings) {
            lines.push(format!(
                "  {stage:8}: avg {:6.3}ms  max {:6.3}ms  total {:8.1}ms",
                stats.mean(),
                stats.max,
                stats.total
            ));
        }
        for (name, stats) in sorted(&self.metrics) {
            lines.push(format!(
                "  {name}: avg {:.1}  peak {:.0}",
                stats.mean(),
                stats.max
            ));
        }

        if cycles > 0 && wall_secs > 0.0 {
            lines.push(format!(
                "  Throughput: {:.1} cycles/s",
                cycles as f64 / wall_secs
            ));
        }

        Some(lines.join("\n"))
    }

    pub fn timing_stats(&self, stage: &str) -> Option<StageStats> {
        self.timings.get(stage).copied()
    }

    pub fn metric_stats(&self, name: &str) -> Option<StageStats> {
        self.metrics.get(name).copied()
    }

    pub fn cycles(&self) -> usize {
        self.cycles
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn cycle(&mut self, cycle: usize) {
        self.cycles = self.cycles.max(cycle);
        if cycle % self.throttle_cycles == 0 {
            log::info!("Processed {cycle} cycles");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .record(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
        self.last_message = Some(message.to_string());
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

fn sorted(map: &HashMap<String, StageStats>) -> Vec<(&str, StageStats)> {
    let mut entries: Vec<_> = map.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}
