//! Logging host function implementation.
//!
//! Lets a relayed module emit log lines that end up in the relay's own
//! `tracing` output, tagged with the request they belong to.

use wasm_relay_core::store::{LogLevel, WorkerContext};
use tracing::{debug, error, info, warn};

/// Host implementation of `env.log`.
///
/// Entries are stored in the [`WorkerContext`] and emitted via `tracing`.
/// Once the context's log caps are reached further entries are dropped,
/// with a single warning for the request.
pub struct LoggingHost;

impl LoggingHost {
    /// Log a message at the specified level.
    pub fn log(ctx: &mut WorkerContext, level: LogLevel, message: &str) {
        let stored = ctx.log(level, message.to_string());

        let request_id = ctx.request_id.as_str();
        if !stored {
            if ctx.dropped_logs == 1 {
                warn!(request_id, "Guest log limit reached, dropping further entries");
            }
            return;
        }

        match level {
            LogLevel::Debug => debug!(request_id, guest_log = true, "{}", message),
            LogLevel::Info => info!(request_id, guest_log = true, "{}", message),
            LogLevel::Warn => warn!(request_id, guest_log = true, "{}", message),
            LogLevel::Error => error!(request_id, guest_log = true, "{}", message),
        }
    }
}

/// Convert a guest log level (0=debug, 1=info, 2=warn, 3=error).
///
/// Unknown values are treated as info.
pub fn level_from_i32(level: i32) -> LogLevel {
    match level {
        0 => LogLevel::Debug,
        2 => LogLevel::Warn,
        3 => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_relay_core::store::MAX_LOG_ENTRIES;

    #[test]
    fn test_logging_stores_in_context() {
        let mut ctx = WorkerContext::new("test-123".into());

        LoggingHost::log(&mut ctx, LogLevel::Info, "Hello");
        LoggingHost::log(&mut ctx, LogLevel::Error, "World");

        assert_eq!(ctx.logs.len(), 2);
        assert_eq!(ctx.logs[0].message, "Hello");
        assert_eq!(ctx.logs[0].level, LogLevel::Info);
        assert_eq!(ctx.logs[1].message, "World");
        assert_eq!(ctx.logs[1].level, LogLevel::Error);
    }

    #[test]
    fn test_logging_stops_at_cap() {
        let mut ctx = WorkerContext::new("test-cap".into());

        for i in 0..MAX_LOG_ENTRIES + 10 {
            LoggingHost::log(&mut ctx, LogLevel::Debug, &format!("line {i}"));
        }

        assert_eq!(ctx.logs.len(), MAX_LOG_ENTRIES);
        assert_eq!(ctx.dropped_logs, 10);
        assert_eq!(ctx.logs[MAX_LOG_ENTRIES - 1].message, format!("line {}", MAX_LOG_ENTRIES - 1));
    }

    #[test]
    fn test_level_from_i32() {
        assert_eq!(level_from_i32(0), LogLevel::Debug);
        assert_eq!(level_from_i32(1), LogLevel::Info);
        assert_eq!(level_from_i32(2), LogLevel::Warn);
        assert_eq!(level_from_i32(3), LogLevel::Error);
        assert_eq!(level_from_i32(99), LogLevel::Info);
        assert_eq!(level_from_i32(-1), LogLevel::Info);
    }
}
