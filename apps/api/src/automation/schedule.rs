//! Daily post schedule: a local `HH:MM` in an IANA time zone, expressed as a
//! cron schedule so the trigger loop and the run engine agree on firing times.

use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use thiserror::Error;

use crate::models::account::Account;
use crate::models::automation::Automation;

pub const DEFAULT_POST_TIME: &str = "09:00";
pub const DEFAULT_TIMEZONE: Tz = Tz::UTC;

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("invalid post time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("unknown time zone '{0}'")]
    InvalidTimezone(String),

    #[error("invalid cron expression '{expr}': {message}")]
    Cron { expr: String, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailySchedule {
    pub time: NaiveTime,
    pub tz: Tz,
}

impl DailySchedule {
    pub fn parse(time: &str, tz: &str) -> Result<Self, ScheduleError> {
        let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
            .map_err(|_| ScheduleError::InvalidTime(time.to_string()))?;
        let tz = Tz::from_str(tz.trim()).map_err(|_| ScheduleError::InvalidTimezone(tz.to_string()))?;
        Ok(Self { time, tz })
    }

    /// Resolves the effective schedule: automation values first, then the
    /// account's, then the defaults.
    pub fn for_automation(
        automation: &Automation,
        account: Option<&Account>,
    ) -> Result<Self, ScheduleError> {
        let pick = |own: Option<&str>, fallback: Option<&str>, default: &'static str| {
            own.filter(|s| !s.trim().is_empty())
                .or(fallback.filter(|s| !s.trim().is_empty()))
                .unwrap_or(default)
                .to_string()
        };
        let time = pick(
            automation.post_time.as_deref(),
            account.and_then(|a| a.daily_post_time.as_deref()),
            DEFAULT_POST_TIME,
        );
        let tz = pick(
            automation.timezone.as_deref(),
            account.and_then(|a| a.timezone.as_deref()),
            DEFAULT_TIMEZONE.name(),
        );
        Self::parse(&time, &tz)
    }

    /// Six-field cron expression (sec min hour dom month dow) in local time.
    pub fn cron_expression(&self) -> String {
        format!("0 {} {} * * *", self.time.minute(), self.time.hour())
    }

    pub fn to_cron(&self) -> Result<Schedule, ScheduleError> {
        let expr = self.cron_expression();
        Schedule::from_str(&expr).map_err(|e| ScheduleError::Cron {
            expr,
            message: e.to_string(),
        })
    }

    /// Next occurrence of the local time strictly after `now`, in UTC.
    pub fn next_after(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        let schedule = self.to_cron()?;
        schedule
            .after(&now.with_timezone(&self.tz))
            .next()
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| ScheduleError::Cron {
                expr: self.cron_expression(),
                message: "no upcoming occurrence".to_string(),
            })
    }
}
