//! JSON line encoding that tolerates serializer failures.
//!
//! Encoding runs under a per-thread [`EncodingPolicy`]. Code that wants
//! serializer failures surfaced keeps the default `Strict` policy and calls
//! [`SafeJsonEncoder::try_encode`]. The formatter entry points
//! ([`SafeJsonEncoder::encode_single`], [`SafeJsonEncoder::encode_batch`])
//! hold a [`LeniencyGuard`] for the duration of the one serializer call so a
//! malformed value degrades to `null` instead of aborting the write.

use crate::record::LogRecord;
use serde::Serialize;
use std::cell::Cell;

/// How serializer failures are treated on the current thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingPolicy {
    /// Failures are returned as [`EncodeError`].
    Strict,
    /// Failures are replaced by the degraded encoding.
    Lenient,
}

thread_local! {
    static POLICY: Cell<EncodingPolicy> = const { Cell::new(EncodingPolicy::Strict) };
}

/// Policy currently in force on this thread.
pub fn encoding_policy() -> EncodingPolicy {
    POLICY.with(Cell::get)
}

/// Switches this thread to [`EncodingPolicy::Lenient`] until dropped.
///
/// The previous policy is restored on drop, including during unwinding, so
/// nested guards and panicking serializers never leave the relaxed policy
/// behind.
#[must_use = "leniency is released as soon as the guard is dropped"]
pub struct LeniencyGuard {
    previous: EncodingPolicy,
}

impl LeniencyGuard {
    pub fn acquire() -> Self {
        let previous = POLICY.with(|p| p.replace(EncodingPolicy::Lenient));
        LeniencyGuard { previous }
    }
}

impl Drop for LeniencyGuard {
    fn drop(&mut self) {
        POLICY.with(|p| p.set(self.previous));
    }
}

#[derive(thiserror::Error, Debug)]
#[error("json encoding failed: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

/// Output written when a value cannot be represented.
pub const DEGRADED: &str = "null";

/// Turns records into text written by a handler.
pub trait Formatter {
    fn format(&self, record: &LogRecord) -> String;

    fn format_batch(&self, records: &[LogRecord]) -> String;
}

/// JSON Lines formatter: one document per call, newline terminated.
#[derive(Debug, Clone, Copy, Default)]
pub struct SafeJsonEncoder;

impl SafeJsonEncoder {
    pub fn new() -> Self {
        SafeJsonEncoder
    }

    /// Encode `value` honouring the current thread's [`EncodingPolicy`].
    pub fn try_encode<T: Serialize + ?Sized>(value: &T) -> Result<String, EncodeError> {
        match serde_json::to_string(value) {
            Ok(json) => Ok(json),
            Err(e) => match encoding_policy() {
                EncodingPolicy::Strict => Err(EncodeError(e)),
                EncodingPolicy::Lenient => Ok(DEGRADED.to_string()),
            },
        }
    }

    /// One value, one line.
    pub fn encode_single<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let mut line = Self::encode_lenient(value);
        line.push('\n');
        line
    }

    /// All values as a single JSON array on one line.
    pub fn encode_batch<T: Serialize>(&self, values: &[T]) -> String {
        let mut line = Self::encode_lenient(values);
        line.push('\n');
        line
    }

    fn encode_lenient<T: Serialize + ?Sized>(value: &T) -> String {
        let _guard = LeniencyGuard::acquire();
        Self::try_encode(value).unwrap_or_else(|_| DEGRADED.to_string())
    }
}

impl Formatter for SafeJsonEncoder {
    fn format(&self, record: &LogRecord) -> String {
        self.encode_single(record)
    }

    fn format_batch(&self, records: &[LogRecord]) -> String {
        self.encode_batch(records)
    }
}
