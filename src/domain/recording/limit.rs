//! Recording length cap
//!
//! `record --duration` and the `max_duration` config key both name a
//! [`RecordingLimit`]. The controller counts elapsed time in whole seconds,
//! so the limit is kept in seconds too.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::error::LimitParseError;

/// Cap applied when neither the CLI nor the config file sets one
pub const DEFAULT_LIMIT_SECS: u64 = 300;

/// Longest recording the CLI will run
pub const MAX_LIMIT_SECS: u64 = 60 * 60;

/// Upper bound on a single recording, between one second and an hour
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordingLimit(u64);

impl RecordingLimit {
    /// Limit of `secs`, or `None` outside `1..=MAX_LIMIT_SECS`
    pub const fn from_secs(secs: u64) -> Option<Self> {
        if secs == 0 || secs > MAX_LIMIT_SECS {
            None
        } else {
            Some(Self(secs))
        }
    }

    pub const fn as_secs(&self) -> u64 {
        self.0
    }

    pub const fn as_std(&self) -> Duration {
        Duration::from_secs(self.0)
    }

    /// Whether a recording that has run `elapsed_secs` must stop
    pub const fn is_reached(&self, elapsed_secs: u64) -> bool {
        elapsed_secs >= self.0
    }

    /// Seconds left before the cap, saturating at zero
    pub const fn remaining(&self, elapsed_secs: u64) -> u64 {
        self.0.saturating_sub(elapsed_secs)
    }
}

impl Default for RecordingLimit {
    fn default() -> Self {
        Self(DEFAULT_LIMIT_SECS)
    }
}

fn unit_secs(unit: char) -> Option<u64> {
    match unit {
        'h' => Some(3600),
        'm' => Some(60),
        's' => Some(1),
        _ => None,
    }
}

impl FromStr for RecordingLimit {
    type Err = LimitParseError;

    /// Accepts plain seconds (`90`) or unit segments in `h`, `m`, `s`
    /// order (`45s`, `2m30s`, `1h`). Each unit may appear once.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || LimitParseError {
            input: s.to_string(),
        };
        let text = s.trim().to_ascii_lowercase();
        if text.is_empty() {
            return Err(err());
        }

        if let Ok(secs) = text.parse::<u64>() {
            return Self::from_secs(secs).ok_or_else(err);
        }

        let mut total: u64 = 0;
        let mut last_unit = u64::MAX;
        let mut rest = text.as_str();
        while !rest.is_empty() {
            let digits = rest.find(|c: char| !c.is_ascii_digit()).ok_or_else(err)?;
            if digits == 0 {
                return Err(err());
            }
            let value: u64 = rest[..digits].parse().map_err(|_| err())?;
            let unit = rest[digits..].chars().next().and_then(unit_secs).ok_or_else(err)?;
            if unit >= last_unit {
                return Err(err());
            }
            last_unit = unit;
            total = value
                .checked_mul(unit)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(err)?;
            rest = &rest[digits + 1..];
        }

        Self::from_secs(total).ok_or_else(err)
    }
}

impl fmt::Display for RecordingLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (h, m, s) = (self.0 / 3600, self.0 % 3600 / 60, self.0 % 60);
        if h > 0 {
            write!(f, "{}h", h)?;
        }
        if m > 0 {
            write!(f, "{}m", m)?;
        }
        if s > 0 || self.0 < 60 {
            write!(f, "{}s", s)?;
        }
        Ok(())
    }
}
