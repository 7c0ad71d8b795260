//! In-memory line log.

use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lines::LineSplitter;
use super::observation::Observation;
use super::{Pipe, StreamClass};
use crate::error::Result;

/// Hook run on every line before it is stored.
pub type LineParser = Arc<dyn Fn(&mut LogLine) + Send + Sync>;

/// One stored line.
#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    /// 1-based position in the log.
    pub pos: u64,
    pub time: DateTime<Utc>,
    pub source: StreamClass,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Map<String, Value>>,
}

/// Flattened, string-only view of a [`LogLine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub pos: u64,
    pub time: String,
    pub source: String,
    pub message: String,
    pub fields: String,
}

impl LogLine {
    pub fn entry(&self) -> LogEntry {
        LogEntry {
            pos: self.pos,
            time: self.time.to_rfc3339_opts(SecondsFormat::Millis, true),
            source: self.source.as_str().to_string(),
            message: self.message.clone(),
            fields: self
                .fields
                .as_ref()
                .map(|fields| Value::Object(fields.clone()).to_string())
                .unwrap_or_default(),
        }
    }
}

/// Parser that lifts JSON-object lines into [`LogLine::fields`].
pub fn json_fields(line: &mut LogLine) {
    let text = line.message.trim();
    if !text.starts_with('{') {
        return;
    }
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(text) {
        line.fields = Some(fields);
    }
}

/// Keeps every line a process wrote, in arrival order.
///
/// The log only grows; readers get `Arc` handles to stored lines.
pub struct LoggingPipe {
    observation: Observation,
    out: Mutex<LineSplitter>,
    err: Mutex<LineSplitter>,
    lines: RwLock<Vec<Arc<LogLine>>>,
    parser: Option<LineParser>,
}

impl Default for LoggingPipe {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingPipe {
    pub fn new() -> Self {
        Self {
            observation: Observation::new(),
            out: Mutex::new(LineSplitter::new()),
            err: Mutex::new(LineSplitter::new()),
            lines: RwLock::new(Vec::new()),
            parser: None,
        }
    }

    pub fn with_parser(mut self, parser: LineParser) -> Self {
        self.parser = Some(parser);
        self
    }

    fn splitter(&self, class: StreamClass) -> &Mutex<LineSplitter> {
        match class {
            StreamClass::Out => &self.out,
            StreamClass::Err => &self.err,
        }
    }

    fn stored(&self) -> RwLockReadGuard<'_, Vec<Arc<LogLine>>> {
        self.lines.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a complete line, bypassing splitting and watch matching.
    pub fn add(&self, source: StreamClass, message: impl Into<String>) -> u64 {
        let mut lines = self.lines.write().unwrap_or_else(|e| e.into_inner());
        let mut line = LogLine {
            pos: lines.len() as u64 + 1,
            time: Utc::now(),
            source,
            message: message.into(),
            fields: None,
        };
        if let Some(parser) = &self.parser {
            parser(&mut line);
        }
        let pos = line.pos;
        lines.push(Arc::new(line));
        pos
    }

    /// Total number of lines ever added.
    pub fn count(&self) -> u64 {
        self.stored().len() as u64
    }

    /// The first `n` lines, with the current count.
    pub fn head(&self, n: usize) -> (Vec<Arc<LogLine>>, u64) {
        let lines = self.stored();
        let end = n.min(lines.len());
        (lines[..end].to_vec(), lines.len() as u64)
    }

    /// The last `n` lines, with the current count.
    pub fn tail(&self, n: usize) -> (Vec<Arc<LogLine>>, u64) {
        let lines = self.stored();
        let start = lines.len().saturating_sub(n);
        (lines[start..].to_vec(), lines.len() as u64)
    }

    /// Lines stamped strictly after `t`, with the current count.
    pub fn since(&self, t: DateTime<Utc>) -> (Vec<Arc<LogLine>>, u64) {
        let lines = self.stored();
        let start = lines.partition_point(|line| line.time <= t);
        (lines[start..].to_vec(), lines.len() as u64)
    }
}

impl Pipe for LoggingPipe {
    fn observation(&self) -> &Observation {
        &self.observation
    }

    fn write(&self, class: StreamClass, chunk: &[u8]) -> Result<usize> {
        self.observation.observe(chunk);

        let mut splitter = self.splitter(class).lock().unwrap_or_else(|e| e.into_inner());
        for line in splitter.push(chunk) {
            self.add(class, line);
        }
        Ok(chunk.len())
    }

    fn flush(&self, class: StreamClass) -> Result<()> {
        let mut splitter = self.splitter(class).lock().unwrap_or_else(|e| e.into_inner());
        if let Some(rest) = splitter.take_rest() {
            self.add(class, rest);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipes::{Watch, WatchEffect, TRUNCATION_MARKER};

    fn messages(lines: &[Arc<LogLine>]) -> Vec<&str> {
        lines.iter().map(|l| l.message.as_str()).collect()
    }

    #[test]
    fn test_lines_across_writes() {
        let pipe = LoggingPipe::new();
        pipe.write(StreamClass::Out, b"abc\ndef").unwrap();
        assert_eq!(pipe.count(), 1);
        pipe.write(StreamClass::Out, b"\n").unwrap();

        let (lines, count) = pipe.head(10);
        assert_eq!(count, 2);
        assert_eq!(messages(&lines), vec!["abc", "def"]);
        assert_eq!(lines[0].pos, 1);
        assert_eq!(lines[1].pos, 2);
    }

    #[test]
    fn test_streams_buffered_separately() {
        let pipe = LoggingPipe::new();
        pipe.write(StreamClass::Out, b"out-").unwrap();
        pipe.write(StreamClass::Err, b"err line\n").unwrap();
        pipe.write(StreamClass::Out, b"line\n").unwrap();

        let (lines, _) = pipe.head(10);
        assert_eq!(messages(&lines), vec!["err line", "out-line"]);
        assert_eq!(lines[0].source, StreamClass::Err);
        assert_eq!(lines[1].source, StreamClass::Out);
    }

    #[test]
    fn test_flush_emits_partial_line() {
        let pipe = LoggingPipe::new();
        pipe.write(StreamClass::Err, b"no newline").unwrap();
        assert_eq!(pipe.count(), 0);
        pipe.flush(StreamClass::Err).unwrap();
        pipe.flush(StreamClass::Err).unwrap();

        let (lines, count) = pipe.tail(5);
        assert_eq!(count, 1);
        assert_eq!(messages(&lines), vec!["no newline"]);
    }

    #[test]
    fn test_head_and_tail() {
        let pipe = LoggingPipe::new();
        for i in 1..=5 {
            pipe.add(StreamClass::Out, format!("line {}", i));
        }

        let (head, count) = pipe.head(2);
        assert_eq!(count, 5);
        assert_eq!(messages(&head), vec!["line 1", "line 2"]);

        let (tail, _) = pipe.tail(2);
        assert_eq!(messages(&tail), vec!["line 4", "line 5"]);

        let (all, _) = pipe.tail(50);
        assert_eq!(all.len(), 5);
        assert!(pipe.head(0).0.is_empty());
    }

    #[test]
    fn test_since() {
        let pipe = LoggingPipe::new();
        pipe.add(StreamClass::Out, "before");
        std::thread::sleep(std::time::Duration::from_millis(5));
        let mark = Utc::now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        pipe.add(StreamClass::Out, "after 1");
        pipe.add(StreamClass::Err, "after 2");

        let (lines, count) = pipe.since(mark);
        assert_eq!(count, 3);
        assert_eq!(messages(&lines), vec!["after 1", "after 2"]);

        let (lines, _) = pipe.since(Utc::now());
        assert!(lines.is_empty());
    }

    #[test]
    fn test_overlong_line() {
        let pipe = LoggingPipe::new();
        let mut chunk = vec![b'x'; crate::pipes::MAX_LINE_LENGTH + 4];
        chunk.push(b'\n');
        pipe.write(StreamClass::Out, &chunk).unwrap();

        let (lines, _) = pipe.head(10);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].message.ends_with(TRUNCATION_MARKER));
        assert_eq!(lines[1].message, format!("{}xxxx", TRUNCATION_MARKER));
    }

    #[test]
    fn test_write_feeds_observation() {
        let pipe = LoggingPipe::new();
        pipe.observation()
            .add_watch(Watch::new("up", "ready", WatchEffect::MakeReady))
            .unwrap();

        pipe.write(StreamClass::Out, b"server ready").unwrap();
        assert!(pipe.observation().ready());
        assert_eq!(pipe.count(), 0);
    }

    #[test]
    fn test_add_skips_observation() {
        let pipe = LoggingPipe::new();
        pipe.observation()
            .add_watch(Watch::new("up", "ready", WatchEffect::MakeReady))
            .unwrap();

        pipe.add(StreamClass::Out, "ready");
        assert!(!pipe.observation().ready());
    }

    #[test]
    fn test_json_fields_parser() {
        let pipe = LoggingPipe::new().with_parser(Arc::new(json_fields));
        pipe.add(StreamClass::Out, r#"{"level":"info","msg":"started"}"#);
        pipe.add(StreamClass::Out, "plain text");

        let (lines, _) = pipe.head(2);
        let fields = lines[0].fields.as_ref().unwrap();
        assert_eq!(fields["level"], "info");
        assert!(lines[1].fields.is_none());

        let entry = lines[0].entry();
        assert_eq!(entry.pos, 1);
        assert_eq!(entry.source, "out");
        assert!(entry.fields.contains("\"msg\":\"started\""));
        assert!(entry.time.ends_with('Z'));
        assert_eq!(lines[1].entry().fields, "");
    }

    #[test]
    fn test_concurrent_writers() {
        let pipe = Arc::new(LoggingPipe::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let pipe = pipe.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        pipe.add(StreamClass::Out, format!("{}-{}", t, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let (lines, count) = pipe.head(1000);
        assert_eq!(count, 400);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(line.pos, i as u64 + 1);
        }
    }
}
