//! Time period parsing for `--older-than` and `--time-period`
//!
//! Periods are written as `<integer>*<unit>`, e.g. `3*days` or `5*seconds`.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::error::{Error, Result};

static PERIOD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\S+?)\s*\*\s*(\S+)\s*$").expect("valid period regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 5] = [
        TimeUnit::Seconds,
        TimeUnit::Minutes,
        TimeUnit::Hours,
        TimeUnit::Days,
        TimeUnit::Weeks,
    ];

    pub fn seconds(self) -> u64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 60 * 60,
            TimeUnit::Days => 24 * 60 * 60,
            TimeUnit::Weeks => 7 * 24 * 60 * 60,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
            TimeUnit::Weeks => "weeks",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|unit| unit.as_str() == name)
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `<value>*<unit>` period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePeriod {
    pub value: u64,
    pub unit: TimeUnit,
    pub seconds: u64,
}

impl TimePeriod {
    pub fn parse(text: &str) -> Result<Self> {
        let caps = PERIOD_RE.captures(text).ok_or_else(|| {
            Error::Validation(format!(
                "'{}' is not a time period. Use <number>*<unit>, e.g. \"3*days\"",
                text
            ))
        })?;

        let value = caps[1].parse::<u64>().map_err(|_| {
            Error::Validation(format!("'{}' should be integer.", &caps[1]))
        })?;

        let unit = TimeUnit::from_name(&caps[2]).ok_or_else(|| {
            Error::Validation(format!(
                "unknown time unit '{}'. Use seconds, minutes, hours, days or weeks",
                &caps[2]
            ))
        })?;

        let seconds = value.checked_mul(unit.seconds()).ok_or_else(|| {
            Error::Validation(format!("time period '{}' is too large", text.trim()))
        })?;

        Ok(Self {
            value,
            unit,
            seconds,
        })
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.seconds)
    }
}

impl FromStr for TimePeriod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}*{}", self.value, self.unit)
    }
}
