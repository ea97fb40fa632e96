use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A date with declared precision: a bare year, a year and month, or a full
/// calendar date.
///
/// The canonical text form is `YYYY`, `YYYY-MM`, or `YYYY-MM-DD` with zero
/// padding, which compares lexicographically in chronological order at every
/// precision ("2024" < "2024-01" < "2024-01-15" < "2024-02"). The stored text
/// therefore works directly in range filters and ORDER BY clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartialDate {
    year: i32,
    month: Option<u8>,
    day: Option<u8>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PartialDateError {
    #[error("expected YYYY, YYYY-MM, or YYYY-MM-DD, got '{0}'")]
    Format(String),
    #[error("year {0} out of range")]
    Year(i32),
    #[error("month {0} out of range")]
    Month(u8),
    #[error("'{0}' is not a valid calendar date")]
    Calendar(String),
}

impl PartialDate {
    pub fn from_year(year: i32) -> Result<Self, PartialDateError> {
        if !(1..=9999).contains(&year) {
            return Err(PartialDateError::Year(year));
        }
        Ok(Self {
            year,
            month: None,
            day: None,
        })
    }

    pub fn from_year_month(year: i32, month: u8) -> Result<Self, PartialDateError> {
        let mut date = Self::from_year(year)?;
        if !(1..=12).contains(&month) {
            return Err(PartialDateError::Month(month));
        }
        date.month = Some(month);
        Ok(date)
    }

    pub fn from_ymd(year: i32, month: u8, day: u8) -> Result<Self, PartialDateError> {
        let mut date = Self::from_year_month(year, month)?;
        if NaiveDate::from_ymd_opt(year, u32::from(month), u32::from(day)).is_none() {
            return Err(PartialDateError::Calendar(format!(
                "{year:04}-{month:02}-{day:02}"
            )));
        }
        date.day = Some(day);
        Ok(date)
    }

    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub const fn month(&self) -> Option<u8> {
        self.month
    }

    #[must_use]
    pub const fn day(&self) -> Option<u8> {
        self.day
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(month) = self.month {
            write!(f, "-{month:02}")?;
        }
        if let Some(day) = self.day {
            write!(f, "-{day:02}")?;
        }
        Ok(())
    }
}

impl FromStr for PartialDate {
    type Err = PartialDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || PartialDateError::Format(s.to_string());

        let parts: Vec<&str> = s.trim().split('-').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(bad());
        }

        if parts[0].len() != 4 || !parts[0].bytes().all(|b| b.is_ascii_digit()) {
            return Err(bad());
        }
        let year: i32 = parts[0].parse().map_err(|_| bad())?;

        let parse_part = |part: &str| -> Result<u8, PartialDateError> {
            if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(bad());
            }
            part.parse().map_err(|_| bad())
        };

        match parts.len() {
            1 => Self::from_year(year),
            2 => Self::from_year_month(year, parse_part(parts[1])?),
            _ => Self::from_ymd(year, parse_part(parts[1])?, parse_part(parts[2])?),
        }
    }
}

impl Serialize for PartialDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PartialDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!("2024".parse::<PartialDate>().unwrap().to_string(), "2024");
        assert_eq!(
            "2024-7".parse::<PartialDate>().unwrap().to_string(),
            "2024-07"
        );
        assert_eq!(
            "2024-07-05".parse::<PartialDate>().unwrap().to_string(),
            "2024-07-05"
        );
        assert_eq!(
            "0850-01-01".parse::<PartialDate>().unwrap().to_string(),
            "0850-01-01"
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<PartialDate>().is_err());
        assert!("24".parse::<PartialDate>().is_err());
        assert!("not-a-date".parse::<PartialDate>().is_err());
        assert!("2024-13".parse::<PartialDate>().is_err());
        assert!("2024-02-30".parse::<PartialDate>().is_err());
        assert!("2024-01-01-01".parse::<PartialDate>().is_err());
    }

    #[test]
    fn test_ordering_matches_canonical_text() {
        let year: PartialDate = "2024".parse().unwrap();
        let month: PartialDate = "2024-01".parse().unwrap();
        let day: PartialDate = "2024-01-15".parse().unwrap();
        let later_month: PartialDate = "2024-02".parse().unwrap();

        assert!(year < month);
        assert!(month < day);
        assert!(day < later_month);

        // The string forms sort the same way, so the database can compare
        // the stored text directly.
        assert!(year.to_string() < month.to_string());
        assert!(month.to_string() < day.to_string());
        assert!(day.to_string() < later_month.to_string());
    }

    #[test]
    fn test_serde_round_trip() {
        let date: PartialDate = "1987-11".parse().unwrap();
        let json = serde_json::to_string(&date).unwrap();
        assert_eq!(json, "\"1987-11\"");
        let back: PartialDate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, date);
    }
}
