//! Seasonal minimum-flow schedules keyed on calendar day.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::config::FlowPeriodConfig;

/// A `(month, day)` pair parsed from `DD.MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DayOfYear {
    pub month: u32,
    pub day: u32,
}

impl DayOfYear {
    /// Parses `DD.MM`, accepting 29.02.
    pub fn parse(s: &str) -> Result<Self, String> {
        let (day, month) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| format!("expected DD.MM, got \"{s}\""))?;
        let day: u32 = day
            .parse()
            .map_err(|_| format!("invalid day in \"{s}\""))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("invalid month in \"{s}\""))?;
        // 2000 is a leap year, so 29.02 is accepted.
        NaiveDate::from_ymd_opt(2000, month, day)
            .ok_or_else(|| format!("\"{s}\" is not a calendar day"))?;
        Ok(Self { month, day })
    }

    pub fn of(date: &NaiveDateTime) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }
}

/// Flow requirement active on a given day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Requirement {
    pub flow_m3s: f64,
    pub penalty_per_hour: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct Period {
    start: DayOfYear,
    end: DayOfYear,
    requirement: Requirement,
}

impl Period {
    fn contains(&self, day: DayOfYear) -> bool {
        if self.start <= self.end {
            self.start <= day && day <= self.end
        } else {
            // Wraps over new year, e.g. 01.10 - 30.04.
            day >= self.start || day <= self.end
        }
    }
}

/// An ordered list of inclusive day ranges; the first match wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeasonalFlow {
    periods: Vec<Period>,
}

impl SeasonalFlow {
    /// Parses period definitions.
    ///
    /// # Errors
    ///
    /// Returns a description of the first malformed date or negative flow.
    pub fn from_config(periods: &[FlowPeriodConfig]) -> Result<Self, String> {
        let periods = periods
            .iter()
            .map(|p| {
                let valid = |v: f64| v.is_finite() && v >= 0.0;
                if !valid(p.flow_m3s) || !valid(p.penalty_per_hour) {
                    return Err(format!(
                        "period {}-{} needs non-negative flow and penalty",
                        p.start, p.end
                    ));
                }
                Ok(Period {
                    start: DayOfYear::parse(&p.start)?,
                    end: DayOfYear::parse(&p.end)?,
                    requirement: Requirement {
                        flow_m3s: p.flow_m3s,
                        penalty_per_hour: p.penalty_per_hour,
                    },
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(Self { periods })
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Returns the requirement in force at `date`, if any.
    pub fn requirement(&self, date: &NaiveDateTime) -> Option<Requirement> {
        let day = DayOfYear::of(date);
        self.periods
            .iter()
            .find(|p| p.contains(day))
            .map(|p| p.requirement)
    }
}
