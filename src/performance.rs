//! Profiling of the analysis pipeline
//!
//! When enabled, the server records how long each stage of a request takes
//! (building the analysis, reading include targets, the diagnostic sweep and
//! the request handlers themselves) and how often each included file is
//! read. Everything is kept as running aggregates, so a long session costs a
//! fixed amount of memory per stage.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bfalsp::SourceProvider;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Extraction of the document and its includes
    Analysis,
    /// One read of an include target
    IncludeRead,
    DiagnosticSweep,
    Completion,
    Hover,
    Definition,
    SignatureHelp,
    DocumentSymbols,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Analysis => "analysis",
            Stage::IncludeRead => "include read",
            Stage::DiagnosticSweep => "diagnostic sweep",
            Stage::Completion => "completion",
            Stage::Hover => "hover",
            Stage::Definition => "definition",
            Stage::SignatureHelp => "signature help",
            Stage::DocumentSymbols => "document symbols",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    pub count: u64,
    pub failures: u64,
    pub total: Duration,
    pub max: Duration,
}

impl StageStats {
    fn add(&mut self, elapsed: Duration, failed: bool) {
        self.count += 1;
        self.failures += u64::from(failed);
        self.total += elapsed;
        self.max = self.max.max(elapsed);
    }
}

#[derive(Debug, Default)]
pub struct Profiler {
    enabled: AtomicBool,
    stages: Mutex<HashMap<Stage, StageStats>>,
    include_reads: Mutex<HashMap<PathBuf, u64>>,
    unchanged_publishes: AtomicU64,
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Turning profiling on starts a fresh session.
    pub fn set_enabled(&self, enabled: bool) {
        if enabled {
            self.reset();
        }
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.stages.lock().clear();
        self.include_reads.lock().clear();
        self.unchanged_publishes.store(0, Ordering::Relaxed);
    }

    pub fn record(&self, stage: Stage, elapsed: Duration, failed: bool) {
        if !self.is_enabled() {
            return;
        }
        self.stages.lock().entry(stage).or_default().add(elapsed, failed);
    }

    pub fn time(&self, stage: Stage) -> StageTimer<'_> {
        StageTimer {
            profiler: self,
            stage,
            start: Instant::now(),
        }
    }

    fn record_include(&self, path: &Path, elapsed: Duration, failed: bool) {
        if !self.is_enabled() {
            return;
        }
        self.record(Stage::IncludeRead, elapsed, failed);
        *self.include_reads.lock().entry(path.to_path_buf()).or_insert(0) += 1;
    }

    /// A diagnostic run whose result matched what the client already has.
    pub fn note_unchanged_publish(&self) {
        if self.is_enabled() {
            self.unchanged_publishes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self, stage: Stage) -> StageStats {
        self.stages.lock().get(&stage).copied().unwrap_or_default()
    }

    pub fn report(&self) -> String {
        let millis = |duration: Duration| duration.as_secs_f64() * 1000.0;
        let mut report = String::from("BFA analysis profile\n");

        let mut stages: Vec<(Stage, StageStats)> =
            self.stages.lock().iter().map(|(stage, stats)| (*stage, *stats)).collect();
        stages.sort_by_key(|(stage, _)| *stage);
        if stages.is_empty() {
            report.push_str("  no stages recorded\n");
        }
        for (stage, stats) in stages {
            let _ = write!(
                report,
                "  {:<18} {:>6} runs  avg {:>8.2}ms  max {:>8.2}ms",
                stage.name(),
                stats.count,
                millis(stats.total / stats.count.max(1) as u32),
                millis(stats.max),
            );
            if stats.failures > 0 {
                let _ = write!(report, "  {} failed", stats.failures);
            }
            report.push('\n');
        }

        let mut includes: Vec<(PathBuf, u64)> = self
            .include_reads
            .lock()
            .iter()
            .map(|(path, count)| (path.clone(), *count))
            .collect();
        if !includes.is_empty() {
            includes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            report.push_str("include reads\n");
            for (path, count) in includes {
                let _ = writeln!(report, "  {count:>6}  {}", path.display());
            }
        }

        let _ = writeln!(
            report,
            "unchanged diagnostic sets not republished: {}",
            self.unchanged_publishes.load(Ordering::Relaxed)
        );
        report
    }
}

/// Records the elapsed time of a stage when dropped.
pub struct StageTimer<'a> {
    profiler: &'a Profiler,
    stage: Stage,
    start: Instant,
}

impl Drop for StageTimer<'_> {
    fn drop(&mut self) {
        self.profiler.record(self.stage, self.start.elapsed(), false);
    }
}

/// Times every include read going through `inner`.
pub struct ProfilingSourceProvider<'a> {
    inner: &'a dyn SourceProvider,
    profiler: &'a Profiler,
}

impl<'a> ProfilingSourceProvider<'a> {
    pub fn new(inner: &'a dyn SourceProvider, profiler: &'a Profiler) -> Self {
        ProfilingSourceProvider { inner, profiler }
    }
}

impl SourceProvider for ProfilingSourceProvider<'_> {
    fn read(&self, path: &Path) -> bfalsp::Result<String> {
        let start = Instant::now();
        let result = self.inner.read(path);
        self.profiler
            .record_include(path, start.elapsed(), result.is_err());
        result
    }

    fn identity(&self, path: &Path) -> PathBuf {
        self.inner.identity(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_profiler_records_nothing() {
        let profiler = Profiler::new();
        profiler.record(Stage::Hover, Duration::from_millis(3), false);
        drop(profiler.time(Stage::Analysis));
        profiler.note_unchanged_publish();
        assert_eq!(profiler.stats(Stage::Hover), StageStats::default());
        assert!(profiler.report().contains("no stages recorded"));
    }

    #[test]
    fn stages_keep_running_aggregates() {
        let profiler = Profiler::new();
        profiler.set_enabled(true);
        profiler.record(Stage::DiagnosticSweep, Duration::from_millis(2), false);
        profiler.record(Stage::DiagnosticSweep, Duration::from_millis(6), false);
        drop(profiler.time(Stage::Completion));

        let sweep = profiler.stats(Stage::DiagnosticSweep);
        assert_eq!(sweep.count, 2);
        assert_eq!(sweep.total, Duration::from_millis(8));
        assert_eq!(sweep.max, Duration::from_millis(6));
        assert_eq!(profiler.stats(Stage::Completion).count, 1);

        let report = profiler.report();
        let sweep_at = report.find("diagnostic sweep").unwrap();
        let completion_at = report.find("completion").unwrap();
        assert!(sweep_at < completion_at);
    }

    #[test]
    fn include_reads_are_counted_per_file() {
        let profiler = Profiler::new();
        profiler.set_enabled(true);
        let mut files = HashMap::new();
        files.insert(PathBuf::from("/lib/io.bfa"), ":print".to_string());
        let provider = ProfilingSourceProvider::new(&files, &profiler);

        assert!(provider.read(Path::new("/lib/io.bfa")).is_ok());
        assert!(provider.read(Path::new("/lib/io.bfa")).is_ok());
        assert!(provider.read(Path::new("/lib/gone.bfa")).is_err());
        assert_eq!(provider.identity(Path::new("/lib/io.bfa")), PathBuf::from("/lib/io.bfa"));

        let reads = profiler.stats(Stage::IncludeRead);
        assert_eq!(reads.count, 3);
        assert_eq!(reads.failures, 1);
        let report = profiler.report();
        assert!(report.contains("1 failed"));
        let io_at = report.find("/lib/io.bfa").unwrap();
        let gone_at = report.find("/lib/gone.bfa").unwrap();
        assert!(io_at < gone_at, "most-read include first:\n{report}");
    }

    #[test]
    fn enabling_starts_a_fresh_session() {
        let profiler = Profiler::new();
        profiler.set_enabled(true);
        profiler.record(Stage::Hover, Duration::from_millis(1), false);
        profiler.note_unchanged_publish();
        profiler.set_enabled(true);
        assert_eq!(profiler.stats(Stage::Hover).count, 0);
        assert!(profiler.report().contains("not republished: 0"));
    }
}
