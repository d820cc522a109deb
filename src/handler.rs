use crate::encoder::{Formatter, SafeJsonEncoder};
use crate::level::Level;
use crate::record::LogRecord;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Callback run on every record before it is formatted.
pub type Processor = Box<dyn Fn(LogRecord) -> LogRecord>;

/// Error returned by a [`Handler`] that could not persist a record.
#[derive(thiserror::Error, Debug)]
pub enum HandlerError {
    #[error("failed to write log file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// For custom handlers refusing a record for reasons of their own, such
    /// as a full queue or a closed connection.
    #[error("handler rejected record: {0}")]
    Rejected(String),
}

/// Destination for [`LogRecord`]s dispatched by a
/// [`Channel`](crate::channel::Channel).
///
/// A handler owns its processors and its formatter: on every record it runs
/// the processors in push order, formats the result, and writes it out.
pub trait Handler {
    /// Whether records of `level` should be given to this handler.
    fn is_handling(&self, level: Level) -> bool;

    /// Process, format and write a single record.
    ///
    /// **Returns**
    /// - `Ok(())` once the formatted record was written.
    /// - `Err(..)` if the destination could not be written.
    fn handle(&mut self, record: LogRecord) -> Result<(), HandlerError>;

    /// Write several records. Default implementation handles them one by
    /// one and stops at the first failure.
    fn handle_batch(&mut self, records: Vec<LogRecord>) -> Result<(), HandlerError> {
        for record in records {
            if self.is_handling(record.level) {
                self.handle(record)?;
            }
        }
        Ok(())
    }

    fn push_processor(&mut self, processor: Processor);

    fn set_formatter(&mut self, formatter: Box<dyn Formatter>);

    /// Release any held resources. Default implementation is a no-op.
    fn close(&mut self) {}
}

/// Appends formatted records to a file.
///
/// The file is opened in append mode on the first write; its directory must
/// already exist.
pub struct StreamHandler {
    path: PathBuf,
    level: Level,
    file: Option<File>,
    processors: Vec<Processor>,
    formatter: Box<dyn Formatter>,
}

impl StreamHandler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StreamHandler {
            path: path.into(),
            level: Level::Debug,
            file: None,
            processors: Vec::new(),
            formatter: Box::new(SafeJsonEncoder),
        }
    }

    /// Only handle records at `level` or above.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn process(&self, record: LogRecord) -> LogRecord {
        self.processors.iter().fold(record, |record, p| p(record))
    }

    fn write(&mut self, text: &str) -> Result<(), HandlerError> {
        let io_err = |source: io::Error| HandlerError::Io {
            path: self.path.clone(),
            source,
        };
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(io_err)?;
            self.file = Some(file);
        }
        match self.file.as_mut() {
            Some(file) => file.write_all(text.as_bytes()).map_err(io_err),
            None => Ok(()),
        }
    }
}

impl Handler for StreamHandler {
    fn is_handling(&self, level: Level) -> bool {
        level >= self.level
    }

    fn handle(&mut self, record: LogRecord) -> Result<(), HandlerError> {
        let record = self.process(record);
        let line = self.formatter.format(&record);
        self.write(&line)
    }

    fn handle_batch(&mut self, records: Vec<LogRecord>) -> Result<(), HandlerError> {
        let records: Vec<LogRecord> = records
            .into_iter()
            .filter(|r| self.is_handling(r.level))
            .map(|r| self.process(r))
            .collect();
        if records.is_empty() {
            return Ok(());
        }
        let text = self.formatter.format_batch(&records);
        self.write(&text)
    }

    fn push_processor(&mut self, processor: Processor) {
        self.processors.push(processor);
    }

    fn set_formatter(&mut self, formatter: Box<dyn Formatter>) {
        self.formatter = formatter;
    }

    fn close(&mut self) {
        self.file = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut handler = StreamHandler::new(&path);

        handler.handle(LogRecord::new("app", Level::Info, "one")).unwrap();
        handler.handle(LogRecord::new("app", Level::Info, "two")).unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["message"], json!("two"));
    }

    #[test]
    fn processors_run_in_push_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut handler = StreamHandler::new(&path);
        handler.push_processor(Box::new(|mut r: LogRecord| {
            r.extra.insert("step".into(), json!("first"));
            r
        }));
        handler.push_processor(Box::new(|mut r: LogRecord| {
            let seen = r.extra.get("step").cloned().unwrap_or(Value::Null);
            r.extra.insert("after".into(), seen);
            r
        }));

        handler.handle(LogRecord::new("app", Level::Info, "x")).unwrap();

        assert_eq!(read_lines(&path)[0]["extra"], json!({"step": "first", "after": "first"}));
    }

    #[test]
    fn batch_filters_by_level_and_writes_one_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut handler = StreamHandler::new(&path).with_level(Level::Warning);

        handler
            .handle_batch(vec![
                LogRecord::new("app", Level::Debug, "skipped"),
                LogRecord::new("app", Level::Error, "kept"),
            ])
            .unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].as_array().map(Vec::len), Some(1));
        assert_eq!(lines[0][0]["message"], json!("kept"));
    }

    #[test]
    fn rejected_error_carries_the_reason() {
        let err = HandlerError::Rejected("queue closed".into());
        assert_eq!(err.to_string(), "handler rejected record: queue closed");
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("app.log");
        let mut handler = StreamHandler::new(&path);

        let err = handler.handle(LogRecord::new("app", Level::Info, "x")).unwrap_err();
        match err {
            HandlerError::Io { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }
}
