//! Parsers for `/proc` filesystem files.
//!
//! These are pure functions that parse the content of `/proc` files into
//! structured data. They are designed to be easily testable with string inputs.

use crate::collector::SwapInfo;
use crate::fixed::LoadAvg;

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Parses the 1-minute load average from `/proc/loadavg` content.
///
/// Format: `load1 load5 load15 running/total last_pid`. The kernel prints two
/// fractional digits, which fit the three-digit fixed-point scale exactly.
pub fn parse_loadavg(content: &str) -> Result<LoadAvg, ParseError> {
    let parts: Vec<&str> = content.split_whitespace().collect();
    if parts.len() < 5 {
        return Err(ParseError::new("invalid loadavg format"));
    }

    LoadAvg::parse(parts[0]).map_err(|e| ParseError::new(format!("invalid load1: {}", e)))
}

/// Parses the swap totals from `/proc/meminfo` content.
///
/// `/proc/meminfo` reports kB; the result is in bytes.
pub fn parse_meminfo(content: &str) -> Result<SwapInfo, ParseError> {
    let parse_kb = |line: &str| -> Result<u64, ParseError> {
        line.split_whitespace()
            .nth(1)
            .and_then(|s| s.parse::<u64>().ok())
            .and_then(|kb| kb.checked_mul(1024))
            .ok_or_else(|| ParseError::new(format!("invalid meminfo line: {}", line.trim())))
    };

    let mut total = None;
    let mut free = None;

    for line in content.lines() {
        if line.starts_with("SwapTotal:") {
            total = Some(parse_kb(line)?);
        } else if line.starts_with("SwapFree:") {
            free = Some(parse_kb(line)?);
        }
    }

    match (total, free) {
        (Some(total_bytes), Some(free_bytes)) => Ok(SwapInfo {
            total_bytes,
            free_bytes,
        }),
        _ => Err(ParseError::new("SwapTotal/SwapFree missing in meminfo")),
    }
}
