use crate::level::Level;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::{Map, Value};

/// Keys written into [`LogRecord::extra`] by enrichment.
pub mod extra_keys {
    pub const FILE: &str = "file";
    pub const METHOD: &str = "method";
    pub const TAGS: &str = "tags";
    pub const DESCRIPTION: &str = "description";
    pub const ENV: &str = "env";
}

/// One log event as it travels from a [`Channel`](crate::channel::Channel)
/// through processors to a formatter.
///
/// Serializes as
/// `{"message","context","level","level_name","channel","datetime","extra"}`
/// with `context` and `extra` always present as objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogRecord {
    pub message: String,
    pub context: Map<String, Value>,
    pub level: Level,
    pub channel: String,
    pub datetime: DateTime<Utc>,
    pub extra: Map<String, Value>,
}

impl LogRecord {
    pub fn new(channel: impl Into<String>, level: Level, message: impl Into<String>) -> Self {
        LogRecord {
            message: message.into(),
            context: Map::new(),
            level,
            channel: channel.into(),
            datetime: Utc::now(),
            extra: Map::new(),
        }
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// True when the record carries nothing worth writing.
    pub fn is_empty(&self) -> bool {
        self.message.is_empty()
            && self.channel.is_empty()
            && self.context.is_empty()
            && self.extra.is_empty()
    }
}

impl Serialize for LogRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("LogRecord", 7)?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("context", &self.context)?;
        state.serialize_field("level", &self.level.code())?;
        state.serialize_field("level_name", self.level.name())?;
        state.serialize_field("channel", &self.channel)?;
        state.serialize_field(
            "datetime",
            &self.datetime.to_rfc3339_opts(SecondsFormat::Micros, true),
        )?;
        state.serialize_field("extra", &self.extra)?;
        state.end()
    }
}
