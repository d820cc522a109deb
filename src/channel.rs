use crate::handler::{Handler, HandlerError};
use crate::level::Level;
use crate::record::LogRecord;
use serde_json::{Map, Value};

/// Named logging engine that stamps records and fans them out to handlers.
pub struct Channel {
    name: String,
    handlers: Vec<Box<dyn Handler>>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Channel {
            name: name.into(),
            handlers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push_handler(&mut self, handler: Box<dyn Handler>) {
        self.handlers.push(handler);
    }

    pub fn handlers(&self) -> &[Box<dyn Handler>] {
        &self.handlers
    }

    /// Build a record for `level`/`message`/`context` and give it to every
    /// handler accepting `level`.
    ///
    /// **Returns**
    /// - `Ok(())` when every accepting handler wrote the record (or none
    ///   accepted it).
    /// - `Err(..)` with the first handler failure; later handlers are not
    ///   called.
    pub fn log(
        &mut self,
        level: Level,
        message: impl Into<String>,
        context: Map<String, Value>,
    ) -> Result<(), HandlerError> {
        let record = LogRecord::new(self.name.clone(), level, message).with_context(context);
        for handler in self.handlers.iter_mut().filter(|h| h.is_handling(level)) {
            handler.handle(record.clone())?;
        }
        Ok(())
    }

    pub fn close(&mut self) {
        for handler in &mut self.handlers {
            handler.close();
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Formatter;
    use crate::handler::Processor;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recording {
        min: Level,
        seen: Rc<RefCell<Vec<LogRecord>>>,
        fail: bool,
    }

    impl Handler for Recording {
        fn is_handling(&self, level: Level) -> bool {
            level >= self.min
        }

        fn handle(&mut self, record: LogRecord) -> Result<(), HandlerError> {
            if self.fail {
                return Err(HandlerError::Rejected("disk full".into()));
            }
            self.seen.borrow_mut().push(record);
            Ok(())
        }

        fn push_processor(&mut self, _processor: Processor) {}

        fn set_formatter(&mut self, _formatter: Box<dyn Formatter>) {}
    }

    fn recording(min: Level, fail: bool) -> (Box<dyn Handler>, Rc<RefCell<Vec<LogRecord>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let handler = Recording {
            min,
            seen: Rc::clone(&seen),
            fail,
        };
        (Box::new(handler), seen)
    }

    #[test]
    fn stamps_channel_name_and_routes_by_level() {
        let mut channel = Channel::new("orders");
        let (all, all_seen) = recording(Level::Debug, false);
        let (errors, error_seen) = recording(Level::Error, false);
        channel.push_handler(all);
        channel.push_handler(errors);

        channel.log(Level::Info, "created", Map::new()).unwrap();
        channel.log(Level::Critical, "crashed", Map::new()).unwrap();

        assert_eq!(all_seen.borrow().len(), 2);
        assert_eq!(error_seen.borrow().len(), 1);
        assert_eq!(error_seen.borrow()[0].message, "crashed");
        assert_eq!(all_seen.borrow()[0].channel, "orders");
    }

    #[test]
    fn first_failure_stops_dispatch() {
        let mut channel = Channel::new("orders");
        let (failing, _) = recording(Level::Debug, true);
        let (after, after_seen) = recording(Level::Debug, false);
        channel.push_handler(failing);
        channel.push_handler(after);

        assert!(channel.log(Level::Info, "x", Map::new()).is_err());
        assert!(after_seen.borrow().is_empty());
    }

    #[test]
    fn no_handlers_is_not_an_error() {
        let mut channel = Channel::new("orders");
        assert!(channel.log(Level::Info, "x", Map::new()).is_ok());
        assert!(channel.handlers().is_empty());
    }
}
