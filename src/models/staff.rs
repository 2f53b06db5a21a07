use std::collections::HashMap;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::services::time::{parse_end_time, parse_time};

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaySchedule {
    pub active: bool,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staff {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub working_hours: HashMap<Weekday, DaySchedule>,
}

impl Staff {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            working_hours: HashMap::new(),
        }
    }

    /// Builder used when configuring a weekly schedule in code.
    pub fn with_day(mut self, day: Weekday, start: &str, end: &str) -> Self {
        self.working_hours.insert(
            day,
            DaySchedule {
                active: true,
                start_time: start.to_string(),
                end_time: end.to_string(),
            },
        );
        self
    }

    pub fn with_day_off(mut self, day: Weekday) -> Self {
        self.working_hours.insert(
            day,
            DaySchedule {
                active: false,
                start_time: "00:00".to_string(),
                end_time: "00:00".to_string(),
            },
        );
        self
    }

    pub fn schedule_for(&self, day: Weekday) -> Option<&DaySchedule> {
        self.working_hours.get(&day)
    }

    /// Rejects schedules whose active days carry unreadable or inverted hours.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (day, schedule) in &self.working_hours {
            if !schedule.active {
                continue;
            }
            let start = parse_time(&schedule.start_time)
                .map_err(|e| anyhow::anyhow!("{day}: {e}"))?;
            let end = parse_end_time(&schedule.end_time)
                .map_err(|e| anyhow::anyhow!("{day}: {e}"))?;
            if start >= end {
                return Err(anyhow::anyhow!(
                    "{day}: start {} is not before end {}",
                    schedule.start_time,
                    schedule.end_time
                ));
            }
        }
        Ok(())
    }

    /// "Mon: 09:00-17:00, Tue: 09:00-17:00" over active days, Monday first.
    pub fn describe_hours(&self) -> String {
        WEEK.iter()
            .filter_map(|day| {
                self.working_hours
                    .get(day)
                    .filter(|s| s.active)
                    .map(|s| format!("{day}: {}-{}", s.start_time, s.end_time))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
