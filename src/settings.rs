use crate::handler::{Handler, StreamHandler};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// Environment variable names read by `StaticSettings::from_env`. These are
// purely helpers; the logger only ever talks to a `LogSettings` value.

/// File name written inside the module directory, e.g. `orders.log`.
pub const JSON_LOG_FILE_ENV: &str = "JSON_LOG_FILE";

/// Module name: channel name and directory under the logs path.
pub const JSON_LOG_MODULE_ENV: &str = "JSON_LOG_MODULE";

/// Base directory holding one sub-directory per module.
pub const JSON_LOG_PATH_ENV: &str = "JSON_LOG_PATH";

/// Deployment environment written into `extra.env`.
pub const JSON_LOG_ENV_ENV: &str = "JSON_LOG_ENV";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Where and as what a [`ContextualLogger`](crate::logger::ContextualLogger)
/// writes.
///
/// Records go to `<logs_path>/<log_module>/<log_file_name>`.
pub trait LogSettings {
    fn log_file_name(&self) -> String;

    fn log_module(&self) -> String;

    fn logs_path(&self) -> PathBuf;

    /// Deployment environment, e.g. `production`.
    fn environment(&self) -> String;

    /// Output handlers for the module directory `dir`.
    ///
    /// The logger attaches its enrichment processor and the JSON encoder to
    /// each returned handler. Default implementation is a single
    /// [`StreamHandler`] on `dir/log_file_name`.
    fn handlers(&self, dir: &Path) -> Vec<Box<dyn Handler>> {
        vec![Box::new(StreamHandler::new(dir.join(self.log_file_name())))]
    }
}

/// [`LogSettings`] backed by plain values, deserializable from config files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StaticSettings {
    pub file_name: String,
    pub module: String,
    pub logs_path: PathBuf,
    pub environment: String,
}

impl Default for StaticSettings {
    fn default() -> Self {
        Self {
            file_name: "app.log".to_string(),
            module: "app".to_string(),
            logs_path: PathBuf::from("logs"),
            environment: "development".to_string(),
        }
    }
}

impl StaticSettings {
    /// Build settings from `JSON_LOG_*` environment variables, using the
    /// [`Default`] values for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            file_name: env_or(JSON_LOG_FILE_ENV, &defaults.file_name),
            module: env_or(JSON_LOG_MODULE_ENV, &defaults.module),
            logs_path: PathBuf::from(env_or(
                JSON_LOG_PATH_ENV,
                &defaults.logs_path.to_string_lossy(),
            )),
            environment: env_or(JSON_LOG_ENV_ENV, &defaults.environment),
        }
    }
}

impl LogSettings for StaticSettings {
    fn log_file_name(&self) -> String {
        self.file_name.clone()
    }

    fn log_module(&self) -> String {
        self.module.clone()
    }

    fn logs_path(&self) -> PathBuf {
        self.logs_path.clone()
    }

    fn environment(&self) -> String {
        self.environment.clone()
    }
}
