use std::fmt;
use std::str::FromStr;

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceUnit {
    Day,
    Week,
    Month,
}

/// Bounding span of a series, written as "3 months", "1 year", "6 weeks".
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub enum TotalSpan {
    Days(u32),
    Weeks(u32),
    Months(u32),
    Years(u32),
}

impl TotalSpan {
    /// Last date a series anchored at `anchor` may reach. `None` past the calendar's range.
    pub fn end_from(&self, anchor: NaiveDate) -> Option<NaiveDate> {
        match *self {
            TotalSpan::Days(n) => anchor.checked_add_days(Days::new(u64::from(n))),
            TotalSpan::Weeks(n) => anchor.checked_add_days(Days::new(u64::from(n) * 7)),
            TotalSpan::Months(n) => anchor.checked_add_months(Months::new(n)),
            TotalSpan::Years(n) => anchor.checked_add_months(Months::new(n.checked_mul(12)?)),
        }
    }
}

impl FromStr for TotalSpan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (count, unit) = match (parts.next(), parts.next(), parts.next()) {
            (Some(count), Some(unit), None) => (count, unit),
            _ => return Err(format!("invalid span: {s}")),
        };
        let count: u32 = count
            .parse()
            .map_err(|_| format!("invalid span count in: {s}"))?;

        match unit.to_lowercase().as_str() {
            "day" | "days" => Ok(TotalSpan::Days(count)),
            "week" | "weeks" => Ok(TotalSpan::Weeks(count)),
            "month" | "months" => Ok(TotalSpan::Months(count)),
            "year" | "years" => Ok(TotalSpan::Years(count)),
            _ => Err(format!("invalid span unit in: {s}")),
        }
    }
}

impl TryFrom<String> for TotalSpan {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TotalSpan> for String {
    fn from(span: TotalSpan) -> Self {
        span.to_string()
    }
}

impl fmt::Display for TotalSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (n, unit) = match *self {
            TotalSpan::Days(n) => (n, "day"),
            TotalSpan::Weeks(n) => (n, "week"),
            TotalSpan::Months(n) => (n, "month"),
            TotalSpan::Years(n) => (n, "year"),
        };
        if n == 1 {
            write!(f, "1 {unit}")
        } else {
            write!(f, "{n} {unit}s")
        }
    }
}

/// "Every `interval` `unit`s for `total_span`".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurrencePattern {
    pub unit: RecurrenceUnit,
    pub interval: u32,
    pub total_span: TotalSpan,
}

impl RecurrencePattern {
    pub fn new(unit: RecurrenceUnit, interval: u32, total_span: TotalSpan) -> Self {
        Self {
            unit,
            interval,
            total_span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_span_labels() {
        assert_eq!("1 month".parse::<TotalSpan>().unwrap(), TotalSpan::Months(1));
        assert_eq!("3 Months".parse::<TotalSpan>().unwrap(), TotalSpan::Months(3));
        assert_eq!("1 year".parse::<TotalSpan>().unwrap(), TotalSpan::Years(1));
        assert_eq!("6 weeks".parse::<TotalSpan>().unwrap(), TotalSpan::Weeks(6));
        assert_eq!("10 days".parse::<TotalSpan>().unwrap(), TotalSpan::Days(10));
    }

    #[test]
    fn test_parse_span_rejects_garbage() {
        assert!("month".parse::<TotalSpan>().is_err());
        assert!("two months".parse::<TotalSpan>().is_err());
        assert!("2 fortnights".parse::<TotalSpan>().is_err());
        assert!("2 months extra".parse::<TotalSpan>().is_err());
    }

    #[test]
    fn test_pattern_json_uses_span_label() {
        let json = r#"{"unit":"week","interval":1,"total_span":"2 months"}"#;
        let pattern: RecurrencePattern = serde_json::from_str(json).unwrap();
        assert_eq!(pattern.unit, RecurrenceUnit::Week);
        assert_eq!(pattern.total_span, TotalSpan::Months(2));

        let back = serde_json::to_value(&pattern).unwrap();
        assert_eq!(back["total_span"], "2 months");
    }

    #[test]
    fn test_span_end_dates() {
        let anchor = date("2024-01-31");
        assert_eq!(TotalSpan::Months(1).end_from(anchor), Some(date("2024-02-29")));
        assert_eq!(TotalSpan::Years(1).end_from(anchor), Some(date("2025-01-31")));
        assert_eq!(TotalSpan::Weeks(2).end_from(anchor), Some(date("2024-02-14")));
        assert_eq!(TotalSpan::Days(1).end_from(anchor), Some(date("2024-02-01")));
    }
}
