use crate::channel::Channel;
use crate::encoder::SafeJsonEncoder;
use crate::entry::{Caller, Entry};
use crate::record::{extra_keys, LogRecord};
use crate::settings::LogSettings;
use serde_json::Value;
use std::cell::RefCell;
use std::fs::DirBuilder;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn};

/// The log directory for a module could not be created or resolved.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("log folder [{}] cannot be created: {reason}", .path.display())]
pub struct SinkInitializationError {
    pub path: PathBuf,
    pub reason: String,
}

/// Observable lifecycle of a [`ContextualLogger`]'s sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    Uninitialized,
    Ready,
    Failed,
}

enum SinkState {
    Uninitialized,
    Ready(Channel),
    Failed(SinkInitializationError),
}

/// Caller data captured by `log` and read back by enrichment.
#[derive(Debug, Default)]
struct Scratch {
    caller: Option<Caller>,
    tags: Vec<String>,
    description: Option<String>,
}

/// Processor state shared between a logger and its handlers.
#[derive(Clone)]
struct Enricher {
    owner: Rc<str>,
    settings: Rc<dyn LogSettings>,
    scratch: Rc<RefCell<Scratch>>,
}

impl Enricher {
    fn enrich(&self, mut record: LogRecord) -> LogRecord {
        if record.is_empty() {
            return record;
        }

        let scratch = self.scratch.borrow();
        let extra = &mut record.extra;
        extra.insert(extra_keys::FILE.into(), Value::from(&*self.owner));
        extra.insert(
            extra_keys::METHOD.into(),
            scratch.caller.map_or(Value::Null, |c| Value::from(c.method)),
        );
        extra.insert(extra_keys::TAGS.into(), Value::from(scratch.tags.clone()));
        extra.insert(
            extra_keys::DESCRIPTION.into(),
            scratch.description.clone().map_or(Value::Null, Value::from),
        );
        extra.insert(extra_keys::ENV.into(), Value::from(self.settings.environment()));
        record
    }
}

/// Logging capability held by an application component.
///
/// Writes each [`Entry`] as one JSON line into
/// `<logs_path>/<module>/<file_name>`, enriched with the owning type, the
/// calling method, tags, description and environment. The sink is set up on
/// the first [`log`](Self::log) call.
///
/// A logger is not `Send`: the caller data written by `log` is read back by
/// its handlers during the same call, so each thread needs its own logger.
pub struct ContextualLogger {
    enricher: Enricher,
    state: SinkState,
}

impl ContextualLogger {
    /// Create a logger whose records report `owner` in `extra.file`.
    pub fn new<S>(settings: S, owner: impl Into<String>) -> Self
    where
        S: LogSettings + 'static,
    {
        let owner: String = owner.into();
        ContextualLogger {
            enricher: Enricher {
                owner: Rc::from(owner),
                settings: Rc::new(settings),
                scratch: Rc::new(RefCell::new(Scratch::default())),
            },
            state: SinkState::Uninitialized,
        }
    }

    /// Create a logger owned by `T`, reported by its full type name.
    pub fn for_type<T: ?Sized, S>(settings: S) -> Self
    where
        S: LogSettings + 'static,
    {
        Self::new(settings, std::any::type_name::<T>())
    }

    pub fn owner(&self) -> &str {
        &self.enricher.owner
    }

    pub fn status(&self) -> SinkStatus {
        match self.state {
            SinkState::Uninitialized => SinkStatus::Uninitialized,
            SinkState::Ready(_) => SinkStatus::Ready,
            SinkState::Failed(_) => SinkStatus::Failed,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SinkState::Ready(_))
    }

    /// The underlying channel, once the sink is ready.
    pub fn channel(&self) -> Option<&Channel> {
        match &self.state {
            SinkState::Ready(channel) => Some(channel),
            _ => None,
        }
    }

    /// Set up the module directory and channel if not done yet.
    ///
    /// **Returns**
    /// - `Ok(())` if the sink is ready (now or already).
    /// - `Err(..)` if the log directory could not be created. The failure is
    ///   final: later calls return the same error without retrying.
    pub fn ensure_initialized(&mut self) -> Result<(), SinkInitializationError> {
        if let SinkState::Uninitialized = self.state {
            self.state = match self.open_channel() {
                Ok(channel) => SinkState::Ready(channel),
                Err(e) => {
                    warn!(
                        path = %e.path.display(),
                        reason = %e.reason,
                        "log sink initialization failed"
                    );
                    SinkState::Failed(e)
                }
            };
        }
        match &self.state {
            SinkState::Failed(e) => Err(e.clone()),
            _ => Ok(()),
        }
    }

    fn open_channel(&self) -> Result<Channel, SinkInitializationError> {
        let settings = &self.enricher.settings;
        let module = settings.log_module();
        let dir = settings.logs_path().join(&module);
        ensure_dir(&dir)?;

        let mut channel = Channel::new(module);
        for mut handler in settings.handlers(&dir) {
            let enricher = self.enricher.clone();
            handler.push_processor(Box::new(move |record| enricher.enrich(record)));
            handler.set_formatter(Box::new(SafeJsonEncoder::new()));
            channel.push_handler(handler);
        }
        debug!(
            channel = channel.name(),
            handlers = channel.handlers().len(),
            "log channel ready"
        );
        Ok(channel)
    }

    /// Add caller metadata to `record.extra`.
    ///
    /// Empty records are returned untouched. Otherwise `extra` gains `file`,
    /// `method`, `tags`, `description` and `env`, using the values captured
    /// by the most recent [`log`](Self::log) call; anything not captured is
    /// `null` (or `[]` for tags).
    pub fn enrich(&self, record: LogRecord) -> LogRecord {
        self.enricher.enrich(record)
    }

    /// Write `entry` to the module log.
    ///
    /// Handler failures (a full disk, a removed file) are swallowed: a
    /// returned `Ok` does not mean the record was persisted.
    ///
    /// **Returns**
    /// - `Err(..)` only when the sink could not be initialized.
    pub fn log(&mut self, entry: Entry) -> Result<(), SinkInitializationError> {
        self.ensure_initialized()?;

        let context = entry.prepared_context();
        let Entry {
            level,
            message,
            description,
            tags,
            caller,
            ..
        } = entry;
        *self.enricher.scratch.borrow_mut() = Scratch {
            caller,
            tags,
            description,
        };

        if let SinkState::Ready(channel) = &mut self.state {
            if let Err(e) = channel.log(level, message, context) {
                debug!(channel = channel.name(), error = %e, "dropping log record");
            }
        }
        Ok(())
    }
}

/// Resolve `dir`, creating it (and its parents) with mode 0755 if missing.
fn ensure_dir(dir: &Path) -> Result<(), SinkInitializationError> {
    if dir.canonicalize().is_ok() {
        return Ok(());
    }

    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    let created = builder.create(dir);

    // Another process may have won the race; only the final state matters.
    match dir.canonicalize() {
        Ok(_) => {
            debug!(path = %dir.display(), "created log directory");
            Ok(())
        }
        Err(resolve_err) => Err(SinkInitializationError {
            path: dir.to_path_buf(),
            reason: created.err().unwrap_or(resolve_err).to_string(),
        }),
    }
}
