//! The five `sysguard*` directives.

use std::fmt;
use std::time::Duration;

use super::{Action, Limit, LogLevel, ScopeDirectives};
use crate::fixed::Fixed;

/// Why a single directive was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    /// Not one of the directives this module understands.
    Unknown,
    /// Directive used outside of the scope it belongs to.
    NotAllowedHere,
    /// Wrong number of arguments.
    ArgumentCount,
    /// Same directive given twice in one scope.
    Duplicate,
    /// An argument does not follow the grammar.
    InvalidParameter(String),
    /// A single-valued directive got a value outside its domain.
    InvalidValue { value: String, expected: &'static str },
}

impl fmt::Display for DirectiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveError::Unknown => write!(f, "is unknown"),
            DirectiveError::NotAllowedHere => write!(f, "is not allowed here"),
            DirectiveError::ArgumentCount => write!(f, "has invalid number of arguments"),
            DirectiveError::Duplicate => write!(f, "is duplicate"),
            DirectiveError::InvalidParameter(p) => write!(f, "has invalid parameter \"{}\"", p),
            DirectiveError::InvalidValue { value, expected } => {
                write!(f, "has invalid value \"{}\", it must be {}", value, expected)
            }
        }
    }
}

impl std::error::Error for DirectiveError {}

impl ScopeDirectives {
    /// Validates one directive and stores it in this scope.
    pub fn apply(&mut self, name: &str, args: &[String]) -> Result<(), DirectiveError> {
        match name {
            "sysguard" => {
                let value = single(args)?;
                set_once(&mut self.enabled, parse_flag(value)?)
            }
            "sysguard_load" => {
                check_count(args, 1, 2)?;
                if self.load.is_some() && args[0].starts_with("load=") {
                    return Err(DirectiveError::Duplicate);
                }
                self.load = Some(parse_load(args)?);
                Ok(())
            }
            "sysguard_mem" => {
                check_count(args, 1, 2)?;
                if self.swap.is_some() && args[0].starts_with("swapratio=") {
                    return Err(DirectiveError::Duplicate);
                }
                self.swap = Some(parse_mem(args)?);
                Ok(())
            }
            "sysguard_interval" => {
                let value = single(args)?;
                set_once(&mut self.interval, parse_interval(value)?)
            }
            "sysguard_log_level" => {
                let value = single(args)?;
                let level = value
                    .parse::<LogLevel>()
                    .map_err(|_| DirectiveError::InvalidValue {
                        value: value.to_string(),
                        expected: "\"info\", \"notice\", \"warn\" or \"error\"",
                    })?;
                set_once(&mut self.log_level, level)
            }
            _ => Err(DirectiveError::Unknown),
        }
    }
}

fn check_count(args: &[String], min: usize, max: usize) -> Result<(), DirectiveError> {
    if args.len() < min || args.len() > max {
        return Err(DirectiveError::ArgumentCount);
    }
    Ok(())
}

fn single(args: &[String]) -> Result<&str, DirectiveError> {
    check_count(args, 1, 1)?;
    Ok(args[0].as_str())
}

fn set_once<T>(slot: &mut Option<T>, value: T) -> Result<(), DirectiveError> {
    if slot.is_some() {
        return Err(DirectiveError::Duplicate);
    }
    *slot = Some(value);
    Ok(())
}

fn parse_flag(value: &str) -> Result<bool, DirectiveError> {
    if value.eq_ignore_ascii_case("on") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("off") {
        Ok(false)
    } else {
        Err(DirectiveError::InvalidValue {
            value: value.to_string(),
            expected: "\"on\" or \"off\"",
        })
    }
}

fn invalid(arg: &str) -> DirectiveError {
    DirectiveError::InvalidParameter(arg.to_string())
}

/// `load=<number>[ action=<path-or-alias>]`
fn parse_load(args: &[String]) -> Result<Limit<3>, DirectiveError> {
    let number = args[0]
        .strip_prefix("load=")
        .ok_or_else(|| invalid(&args[0]))?;
    let threshold = Fixed::parse(number).map_err(|_| invalid(&args[0]))?;
    let action = parse_action(args.get(1))?;
    Ok(Limit { threshold, action })
}

/// `swapratio=<number>%[ action=<path-or-alias>]`
fn parse_mem(args: &[String]) -> Result<Limit<2>, DirectiveError> {
    let number = args[0]
        .strip_prefix("swapratio=")
        .and_then(|v| v.strip_suffix('%'))
        .ok_or_else(|| invalid(&args[0]))?;
    let threshold = Fixed::parse(number).map_err(|_| invalid(&args[0]))?;
    let action = parse_action(args.get(1))?;
    Ok(Limit { threshold, action })
}

fn parse_action(arg: Option<&String>) -> Result<Action, DirectiveError> {
    let Some(arg) = arg else {
        return Ok(Action::ServiceUnavailable);
    };
    arg.strip_prefix("action=")
        .and_then(Action::parse)
        .ok_or_else(|| invalid(arg))
}

/// Whole seconds, written as a sequence of `<number><unit>` parts in
/// decreasing unit order (`1h 30m`, `1m30s`). Units: `y` (365 days), `M`
/// (30 days), `w`, `d`, `h`, `m`, `s`. A trailing number without unit counts
/// as seconds.
fn parse_interval(value: &str) -> Result<Duration, DirectiveError> {
    let err = || DirectiveError::InvalidValue {
        value: value.to_string(),
        expected: "a positive time interval",
    };

    let mut chars = value.chars().peekable();
    let mut total: u64 = 0;
    let mut last_rank = u8::MAX;

    loop {
        while chars.next_if_eq(&' ').is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut number: u64 = 0;
        let mut digits = 0;
        while let Some(d) = chars.next_if(char::is_ascii_digit) {
            number = number
                .checked_mul(10)
                .and_then(|n| n.checked_add(u64::from(d) - u64::from('0')))
                .ok_or_else(err)?;
            digits += 1;
        }
        if digits == 0 {
            return Err(err());
        }

        let (rank, multiplier) = match chars.next() {
            Some('y') => (7, 365 * 86400),
            Some('M') => (6, 30 * 86400),
            Some('w') => (5, 7 * 86400),
            Some('d') => (4, 86400),
            Some('h') => (3, 3600),
            Some('m') => (2, 60),
            Some('s') => (1, 1),
            None | Some(' ') => (0, 1),
            Some(_) => return Err(err()),
        };
        if rank >= last_rank {
            return Err(err());
        }
        last_rank = rank;

        total = number
            .checked_mul(multiplier)
            .and_then(|n| total.checked_add(n))
            .ok_or_else(err)?;
    }

    if total == 0 {
        return Err(err());
    }
    Ok(Duration::from_secs(total))
}
