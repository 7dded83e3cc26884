//! # Runtime Configuration Module
//!
//! Environment-variable based tuning for the coroutine runtime and the
//! per-connection I/O limits.
//!
//! ## Environment Variables
//!
//! ### `FIBERSERVE_STACK_SIZE`
//!
//! Stack size for connection coroutines, in decimal (`65536`) or hex
//! (`0x10000`). Default: `0x10000` (64 KiB).
//!
//! Larger stacks support deeper call chains inside handlers; smaller stacks
//! reduce memory for many concurrent connections (1000 connections x 64 KiB
//! = 64 MiB of virtual stack).
//!
//! ### `FIBERSERVE_READ_TIMEOUT_MS`
//!
//! Per-connection read timeout in milliseconds. A connection that produces no
//! complete request within this window is abandoned. Default: `2000`.
//!
//! ### `FIBERSERVE_MAX_REQUEST_BYTES`
//!
//! Upper bound on a single request (head + body), decimal or hex. Requests
//! exceeding it are rejected with 400. Default: `0x10000` (64 KiB).

use std::env;
use std::time::Duration;

/// Runtime configuration loaded from environment variables.
///
/// Load once at startup with [`RuntimeConfig::from_env()`] and hand to the
/// server; invalid or missing values fall back to the defaults above.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for connection coroutines in bytes (default 64 KiB)
    pub stack_size: usize,
    /// Read timeout applied to every accepted connection (default 2 s)
    pub read_timeout: Duration,
    /// Maximum accepted request size in bytes (default 64 KiB)
    pub max_request_bytes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            stack_size: 0x10000,
            read_timeout: Duration::from_millis(2000),
            max_request_bytes: 0x10000,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        RuntimeConfig {
            stack_size: parse_size("FIBERSERVE_STACK_SIZE").unwrap_or(defaults.stack_size),
            read_timeout: env::var("FIBERSERVE_READ_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.read_timeout),
            max_request_bytes: parse_size("FIBERSERVE_MAX_REQUEST_BYTES")
                .unwrap_or(defaults.max_request_bytes),
        }
    }
}

/// Parse a size env var accepting decimal (`65536`) or hex (`0x10000`).
fn parse_size(var: &str) -> Option<usize> {
    let val = env::var(var).ok()?;
    if let Some(hex) = val.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.stack_size, 0x10000);
        assert_eq!(cfg.read_timeout, Duration::from_millis(2000));
        assert_eq!(cfg.max_request_bytes, 0x10000);
    }

    #[test]
    fn parses_hex_sizes() {
        std::env::set_var("FIBERSERVE_TEST_SIZE", "0x8000");
        assert_eq!(parse_size("FIBERSERVE_TEST_SIZE"), Some(0x8000));
        std::env::set_var("FIBERSERVE_TEST_SIZE", "4096");
        assert_eq!(parse_size("FIBERSERVE_TEST_SIZE"), Some(4096));
        std::env::remove_var("FIBERSERVE_TEST_SIZE");
    }
}
