pub mod level;
pub mod record;
pub mod encoder;
pub mod handler;
pub mod channel;
pub mod settings;
pub mod entry;
pub mod logger;

pub use channel::Channel;
pub use encoder::{Formatter, LeniencyGuard, SafeJsonEncoder};
pub use entry::{Caller, Entry};
pub use handler::{Handler, HandlerError, StreamHandler};
pub use level::Level;
pub use logger::{ContextualLogger, SinkInitializationError, SinkStatus};
pub use record::LogRecord;
pub use settings::{LogSettings, StaticSettings};
