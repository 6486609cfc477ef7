//! Clamped hours/minutes/seconds value and total-seconds conversion

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest representable total (23:59:59)
pub const MAX_TOTAL_SECONDS: u32 = 86_399;

/// A time of day style duration, always within 00:00:00..=23:59:59
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeValue {
    hours: u32,
    minutes: u32,
    seconds: u32,
}

/// Error returned when a time string cannot be parsed
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseTimeError {
    #[error("empty time string")]
    Empty,
    #[error("too many components in time string: {0}")]
    TooManyComponents(String),
    #[error("invalid time component: {0}")]
    InvalidComponent(String),
}

fn clamp_component(value: i64, max: u32) -> u32 {
    value.clamp(0, max as i64) as u32
}

impl TimeValue {
    /// Build a value, clamping each component into its range
    pub fn new(hours: i64, minutes: i64, seconds: i64) -> Self {
        Self {
            hours: clamp_component(hours, 23),
            minutes: clamp_component(minutes, 59),
            seconds: clamp_component(seconds, 59),
        }
    }

    /// Decompose a total, clamped into [0, 86399] first
    pub fn from_total_seconds(total: i64) -> Self {
        let total = clamp_component(total, MAX_TOTAL_SECONDS);
        let hours = total / 3600;
        let minutes = total / 60 - hours * 60;
        let seconds = total - hours * 3600 - minutes * 60;
        Self { hours, minutes, seconds }
    }

    pub fn hours(&self) -> u32 {
        self.hours
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn seconds(&self) -> u32 {
        self.seconds
    }

    pub fn set_hours(&mut self, hours: i64) {
        self.hours = clamp_component(hours, 23);
    }

    pub fn set_minutes(&mut self, minutes: i64) {
        self.minutes = clamp_component(minutes, 59);
    }

    pub fn set_seconds(&mut self, seconds: i64) {
        self.seconds = clamp_component(seconds, 59);
    }

    /// Combined total in seconds
    pub fn total_seconds(&self) -> u32 {
        self.hours * 3600 + self.minutes * 60 + self.seconds
    }
}

/// Clamp each component, then combine into a total
pub fn to_total_seconds(hours: i64, minutes: i64, seconds: i64) -> u32 {
    TimeValue::new(hours, minutes, seconds).total_seconds()
}

/// Clamp a signed second count into the representable range
pub fn clamp_total_seconds(total: i64) -> u32 {
    clamp_component(total, MAX_TOTAL_SECONDS)
}

impl fmt::Display for TimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

impl FromStr for TimeValue {
    type Err = ParseTimeError;

    /// Accepts `HH:MM:SS`, `MM:SS`, or a bare second count.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseTimeError::Empty);
        }

        let parts = trimmed
            .split(':')
            .map(|part| {
                part.trim()
                    .parse::<i64>()
                    .map_err(|_| ParseTimeError::InvalidComponent(part.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        match parts.as_slice() {
            [total] => Ok(Self::from_total_seconds(*total)),
            [minutes, seconds] => Ok(Self::new(0, *minutes, *seconds)),
            [hours, minutes, seconds] => Ok(Self::new(*hours, *minutes, *seconds)),
            _ => Err(ParseTimeError::TooManyComponents(trimmed.to_string())),
        }
    }
}
