use crate::level::Level;
use serde::Serialize;
use serde_json::{Map, Value};

/// Message used when a log call carries none.
pub const NO_MESSAGE: &str = "[no message]";

/// Key that replaces the whole context when serialization is requested.
pub const SERIALISED_CONTEXT_KEY: &str = "context-serialised";

/// The code location that invoked `log`.
///
/// Usually built with [`caller!`](crate::caller) at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// Module path of the calling code.
    pub module: &'static str,
    /// Name of the function or method that called `log`.
    pub method: &'static str,
}

impl Caller {
    pub const fn new(module: &'static str, method: &'static str) -> Self {
        Caller { module, method }
    }
}

/// Capture the enclosing function as a [`Caller`].
///
/// Resolved at compile time; closures and async blocks report the function
/// they are written in.
#[macro_export]
macro_rules! caller {
    () => {{
        fn __here() {}
        fn __type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::Caller::new(
            ::std::module_path!(),
            $crate::entry::method_from_path(__type_name_of(__here)),
        )
    }};
}

/// Build an [`Entry`] tagged with the calling function.
///
/// ```ignore
/// logger.log(entry!(Level::Info, "started", json!({"pid": 123})))?;
/// ```
#[macro_export]
macro_rules! entry {
    ($level:expr, $message:expr) => {
        $crate::Entry::new($level, $message).called_from($crate::caller!())
    };
    ($level:expr, $message:expr, $context:expr) => {
        $crate::entry!($level, $message).context($context)
    };
}

#[doc(hidden)]
pub fn method_from_path(path: &'static str) -> &'static str {
    let path = path.strip_suffix("::__here").unwrap_or(path);
    path.rsplit("::")
        .find(|segment| *segment != "{{closure}}")
        .unwrap_or(path)
}

/// Everything one `log` call wants written.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub(crate) level: Level,
    pub(crate) message: String,
    pub(crate) context: Value,
    pub(crate) description: Option<String>,
    pub(crate) tags: Vec<String>,
    pub(crate) serialize_context: bool,
    pub(crate) caller: Option<Caller>,
}

impl Default for Entry {
    fn default() -> Self {
        Entry {
            level: Level::Info,
            message: NO_MESSAGE.to_string(),
            context: Value::Object(Map::new()),
            description: None,
            tags: Vec::new(),
            serialize_context: false,
            caller: None,
        }
    }
}

impl Entry {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Entry::default().level(level).message(message)
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// An empty message is replaced by [`NO_MESSAGE`].
    pub fn message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.message = if message.is_empty() {
            NO_MESSAGE.to_string()
        } else {
            message
        };
        self
    }

    /// Message from raw bytes; invalid UTF-8 is replaced with U+FFFD.
    pub fn message_bytes(self, bytes: &[u8]) -> Self {
        let message = String::from_utf8_lossy(bytes).into_owned();
        self.message(message)
    }

    /// Attach context data. Anything that cannot become JSON is replaced by
    /// a short description of the failure.
    pub fn context<T: Serialize>(mut self, context: T) -> Self {
        self.context = serde_json::to_value(context)
            .unwrap_or_else(|e| Value::String(format!("[unserializable context: {e}]")));
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Replace the context by its serialized form before logging.
    pub fn serialize_context(mut self, serialize: bool) -> Self {
        self.serialize_context = serialize;
        self
    }

    pub fn called_from(mut self, caller: Caller) -> Self {
        self.caller = Some(caller);
        self
    }

    /// Context as it will be handed to the channel.
    pub(crate) fn prepared_context(&self) -> Map<String, Value> {
        let context = if self.serialize_context && !is_blank(&self.context) {
            let blob = serde_json::to_string(&self.context).unwrap_or_default();
            let mut wrapped = Map::new();
            wrapped.insert(SERIALISED_CONTEXT_KEY.to_string(), Value::String(blob));
            Value::Object(wrapped)
        } else {
            self.context.clone()
        };
        normalize(context)
    }
}

/// Loose emptiness: null, false, zero, `""`, `"0"` and empty collections.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

fn normalize(context: Value) -> Map<String, Value> {
    match context {
        Value::Object(map) => map,
        other => {
            let mut wrapped = Map::new();
            wrapped.insert("0".to_string(), other);
            wrapped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Probe;

    impl Probe {
        fn run(&self) -> Caller {
            crate::caller!()
        }

        fn from_closure(&self) -> Caller {
            let capture = || crate::caller!();
            capture()
        }
    }

    #[test]
    fn caller_names_enclosing_method() {
        let caller = Probe.run();
        assert_eq!(caller.method, "run");
        assert_eq!(caller.module, module_path!());
        assert_eq!(Probe.from_closure().method, "from_closure");
    }

    #[test]
    fn entry_macro_captures_caller_and_context() {
        let entry = crate::entry!(Level::Warning, "low stock", json!({"sku": "A-1"}));
        assert_eq!(entry.level, Level::Warning);
        assert_eq!(
            entry.caller.map(|c| c.method),
            Some("entry_macro_captures_caller_and_context")
        );
        assert_eq!(entry.prepared_context(), json!({"sku": "A-1"}).as_object().cloned().unwrap());
    }

    #[test]
    fn defaults_match_bare_log_call() {
        let entry = Entry::default();
        assert_eq!(entry.level, Level::Info);
        assert_eq!(entry.message, NO_MESSAGE);
        assert_eq!(entry.context, json!({}));
        assert!(entry.prepared_context().is_empty());
        assert!(entry.caller.is_none());
        assert_eq!(Entry::new(Level::Info, "").message, NO_MESSAGE);
    }

    #[test]
    fn invalid_utf8_message_is_substituted() {
        let entry = Entry::default().message_bytes(b"bad \xff byte");
        assert_eq!(entry.message, "bad \u{FFFD} byte");
    }

    #[test]
    fn scalar_context_is_wrapped() {
        let entry = Entry::default().context(42);
        assert_eq!(Value::Object(entry.prepared_context()), json!({"0": 42}));

        let entry = Entry::default().context(json!([1, 2]));
        assert_eq!(Value::Object(entry.prepared_context()), json!({"0": [1, 2]}));
    }

    #[test]
    fn null_context_is_wrapped_not_dropped() {
        let entry = Entry::default().context(Value::Null);
        assert_eq!(Value::Object(entry.prepared_context()), json!({"0": null}));

        let entry = Entry::default().context(Value::Null).serialize_context(true);
        assert_eq!(Value::Object(entry.prepared_context()), json!({"0": null}));
    }

    #[test]
    fn serialized_context_replaces_original_keys() {
        let entry = Entry::default().context(json!({"a": 1})).serialize_context(true);
        let context = entry.prepared_context();

        assert!(!context.contains_key("a"));
        let blob = context[SERIALISED_CONTEXT_KEY].as_str().unwrap();
        assert_eq!(serde_json::from_str::<Value>(blob).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn blank_context_is_not_serialized() {
        let entry = Entry::default().serialize_context(true);
        assert!(entry.prepared_context().is_empty());

        let entry = Entry::default().context("0").serialize_context(true);
        assert_eq!(Value::Object(entry.prepared_context()), json!({"0": "0"}));
    }

    #[test]
    fn unserializable_context_degrades_to_text() {
        let mut bad = std::collections::BTreeMap::new();
        bad.insert((1, 2), "tuple keys are not json");
        let entry = Entry::default().context(bad);

        let context = entry.prepared_context();
        assert!(context["0"].as_str().unwrap().starts_with("[unserializable context:"));
    }

    #[test]
    fn tags_accumulate() {
        let entry = Entry::default().tags(["billing"]).tag("eu");
        assert_eq!(entry.tags, vec!["billing".to_string(), "eu".to_string()]);
    }
}
