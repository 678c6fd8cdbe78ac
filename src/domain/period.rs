//! Learning periods: ISO weeks (`2025-W20`) and calendar months (`2025-05`).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::error::DomainError;

/// Granularity of a learning period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodKind {
    Weekly,
    Monthly,
}

impl PeriodKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

/// A half-open UTC interval `[start, end)` identified by week or month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodId {
    Week { year: i32, week: u32 },
    Month { year: i32, month: u32 },
}

impl PeriodId {
    /// The period of `kind` that contains `at`.
    #[must_use]
    pub fn containing(at: DateTime<Utc>, kind: PeriodKind) -> Self {
        match kind {
            PeriodKind::Weekly => {
                let iso = at.iso_week();
                Self::Week {
                    year: iso.year(),
                    week: iso.week(),
                }
            }
            PeriodKind::Monthly => Self::Month {
                year: at.year(),
                month: at.month(),
            },
        }
    }

    /// The most recent period of `kind` that has fully ended at `at`.
    #[must_use]
    pub fn last_completed(at: DateTime<Utc>, kind: PeriodKind) -> Self {
        Self::containing(at, kind).previous()
    }

    #[must_use]
    pub const fn kind(&self) -> PeriodKind {
        match self {
            Self::Week { .. } => PeriodKind::Weekly,
            Self::Month { .. } => PeriodKind::Monthly,
        }
    }

    /// First instant of the period.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        midnight(self.start_date())
    }

    /// First instant after the period.
    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.next().start()
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start() && at < self.end()
    }

    #[must_use]
    pub fn previous(&self) -> Self {
        match *self {
            Self::Week { .. } => {
                let date = self.start_date() - chrono::Duration::days(7);
                let iso = date.iso_week();
                Self::Week {
                    year: iso.year(),
                    week: iso.week(),
                }
            }
            Self::Month { year, month: 1 } => Self::Month {
                year: year - 1,
                month: 12,
            },
            Self::Month { year, month } => Self::Month {
                year,
                month: month - 1,
            },
        }
    }

    #[must_use]
    pub fn next(&self) -> Self {
        match *self {
            Self::Week { .. } => {
                let date = self.start_date() + chrono::Duration::days(7);
                let iso = date.iso_week();
                Self::Week {
                    year: iso.year(),
                    week: iso.week(),
                }
            }
            Self::Month { year, month: 12 } => Self::Month {
                year: year + 1,
                month: 1,
            },
            Self::Month { year, month } => Self::Month {
                year,
                month: month + 1,
            },
        }
    }

    fn start_date(&self) -> NaiveDate {
        // Fields are validated on parse/construction, so the fallbacks are unreachable.
        match *self {
            Self::Week { year, week } => NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
                .unwrap_or(NaiveDate::MIN),
            Self::Month { year, month } => {
                NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
            }
        }
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

impl fmt::Display for PeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Week { year, week } => write!(f, "{year:04}-W{week:02}"),
            Self::Month { year, month } => write!(f, "{year:04}-{month:02}"),
        }
    }
}

impl FromStr for PeriodId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidPeriod(s.to_string());
        let (year, rest) = s.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;

        if let Some(week) = rest.strip_prefix('W') {
            let week: u32 = week.parse().map_err(|_| invalid())?;
            NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or_else(invalid)?;
            Ok(Self::Week { year, week })
        } else {
            let month: u32 = rest.parse().map_err(|_| invalid())?;
            NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
            Ok(Self::Month { year, month })
        }
    }
}

impl Serialize for PeriodId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PeriodId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
