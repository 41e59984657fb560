//! Clock-time helpers shared by the reminder and hourly policies.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub const MS_PER_MIN: u64 = 60_000;

/// A daily HH:MM target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ValidationError::InvalidTime {
                value: format!("{hour:02}:{minute:02}"),
            });
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, 0).unwrap_or(NaiveTime::MIN)
    }

    pub fn of(at: NaiveDateTime) -> Self {
        Self {
            hour: at.hour() as u8,
            minute: at.minute() as u8,
        }
    }

    /// Next instant strictly after `now` at which the wall clock shows this
    /// time: today if it has not passed yet, otherwise tomorrow.
    pub fn next_occurrence(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date().and_time(self.as_naive_time());
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTime {
            value: s.to_string(),
        };
        let (h, m) = s.split_once(':').ok_or_else(invalid)?;
        let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(h) || !two_digits(m) {
            return Err(invalid());
        }
        let hour: u8 = h.parse().map_err(|_| invalid())?;
        let minute: u8 = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Milliseconds from `now` until `target` (zero if already past).
pub fn delay_ms(now: NaiveDateTime, target: NaiveDateTime) -> u64 {
    (target - now).num_milliseconds().max(0) as u64
}

/// The next full hour strictly after `now`.
pub fn next_hour_boundary(now: NaiveDateTime) -> NaiveDateTime {
    let hour_start = now
        .date()
        .and_hms_opt(now.hour(), 0, 0)
        .unwrap_or(now);
    hour_start + Duration::hours(1)
}

pub fn minutes_to_ms(min: u32) -> u64 {
    min as u64 * MS_PER_MIN
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn parses_well_formed_times() {
        let t: TimeOfDay = "06:05".parse().unwrap();
        assert_eq!((t.hour(), t.minute()), (6, 5));
        assert_eq!(t.to_string(), "06:05");
    }

    #[test]
    fn rejects_malformed_times() {
        for bad in ["6:00", "24:00", "12:60", "12-00", "", "ab:cd", "12:000"] {
            assert!(bad.parse::<TimeOfDay>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn next_occurrence_today_or_tomorrow() {
        let noon: TimeOfDay = "12:00".parse().unwrap();
        assert_eq!(noon.next_occurrence(at(9, 0, 0)), at(12, 0, 0));
        // Exactly at the target counts as passed.
        assert_eq!(
            noon.next_occurrence(at(12, 0, 0)),
            at(12, 0, 0) + Duration::days(1)
        );
        assert_eq!(
            noon.next_occurrence(at(13, 0, 0)),
            at(12, 0, 0) + Duration::days(1)
        );
    }

    #[test]
    fn hour_boundary() {
        assert_eq!(next_hour_boundary(at(8, 59, 59)), at(9, 0, 0));
        assert_eq!(next_hour_boundary(at(9, 0, 0)), at(10, 0, 0));
        assert_eq!(
            next_hour_boundary(at(23, 30, 0)),
            at(0, 0, 0) + Duration::days(1)
        );
    }

    #[test]
    fn serde_uses_hhmm_strings() {
        let t: TimeOfDay = serde_json::from_str("\"21:30\"").unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"21:30\"");
        assert!(serde_json::from_str::<TimeOfDay>("\"25:00\"").is_err());
    }
}
