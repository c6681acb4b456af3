//! Build progress reporting.
//!
//! A vector store build walks five phases in order; the reporter forwards one
//! event per step to an optional callback (the CLI prints them to stderr).

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildPhase {
    Load,
    Chunk,
    Embed,
    Index,
    Save,
}

impl BuildPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Chunk => "chunk",
            Self::Embed => "embed",
            Self::Index => "index",
            Self::Save => "save",
        }
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub phase: BuildPhase,
    /// Units done so far (records chunked, texts embedded, ...)
    pub done: u64,
    pub total: u64,
    pub message: String,
    /// Seconds since the reporter was created
    pub elapsed_secs: f64,
}

impl ProgressEvent {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.done as f64 * 100.0 / self.total as f64
        }
    }

    /// One line for humans: `[embed] 40/120 (33%) model=all-minilm`.
    pub fn format_simple(&self) -> String {
        format!(
            "[{}] {}/{} ({:.0}%) {}",
            self.phase,
            self.done,
            self.total,
            self.percentage(),
            self.message
        )
    }
}

pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

#[derive(Clone)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    started: Instant,
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("enabled", &self.callback.is_some())
            .finish()
    }
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(callback),
            started: Instant::now(),
        }
    }

    /// Reporter that drops every event.
    pub fn noop() -> Self {
        Self {
            callback: None,
            started: Instant::now(),
        }
    }

    fn emit(&self, phase: BuildPhase, done: u64, total: u64, message: String) {
        let Some(callback) = &self.callback else {
            return;
        };
        let event = ProgressEvent {
            phase,
            done,
            total,
            message,
            elapsed_secs: self.started.elapsed().as_secs_f64(),
        };
        tracing::trace!(phase = %event.phase, done, total, "{}", event.message);
        callback(event);
    }

    pub fn load(&self, records: u64, path: &str) {
        self.emit(BuildPhase::Load, records, records, format!("read {}", path));
    }

    pub fn chunk(&self, records_done: u64, records_total: u64, chunks_created: usize) {
        self.emit(
            BuildPhase::Chunk,
            records_done,
            records_total,
            format!("{} chunks", chunks_created),
        );
    }

    pub fn embed(&self, texts_done: u64, texts_total: u64, model: &str) {
        self.emit(
            BuildPhase::Embed,
            texts_done,
            texts_total,
            format!("model={}", model),
        );
    }

    pub fn index(&self, vectors: u64, dimension: usize) {
        self.emit(
            BuildPhase::Index,
            vectors,
            vectors,
            format!("flat index, dim {}", dimension),
        );
    }

    pub fn save(&self, path: &str) {
        self.emit(BuildPhase::Save, 1, 1, format!("wrote {}", path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn capturing() -> (ProgressReporter, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::new(Arc::new(move |event| {
            sink.lock().unwrap().push(event);
        }));
        (reporter, events)
    }

    #[test]
    fn test_format_simple() {
        let (reporter, events) = capturing();
        reporter.embed(5, 10, "all-minilm");

        let line = events.lock().unwrap()[0].format_simple();
        assert_eq!(line, "[embed] 5/10 (50%) model=all-minilm");
    }

    #[test]
    fn test_phases_in_order() {
        let (reporter, events) = capturing();
        reporter.load(3, "records.json");
        reporter.chunk(3, 3, 4);
        reporter.embed(4, 4, "mock");
        reporter.index(4, 64);
        reporter.save("store");

        let phases: Vec<BuildPhase> = events.lock().unwrap().iter().map(|e| e.phase).collect();
        assert_eq!(
            phases,
            vec![
                BuildPhase::Load,
                BuildPhase::Chunk,
                BuildPhase::Embed,
                BuildPhase::Index,
                BuildPhase::Save
            ]
        );
    }

    #[test]
    fn test_zero_total_is_complete() {
        let (reporter, events) = capturing();
        reporter.chunk(0, 0, 0);
        assert_eq!(events.lock().unwrap()[0].percentage(), 100.0);
    }

    #[test]
    fn test_noop_reporter() {
        ProgressReporter::noop().index(1, 384);
    }
}
