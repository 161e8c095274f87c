// Schedule translation
//
// Converts Redash interval-based schedules into the six-field quartz
// cron expressions required by the Databricks job scheduler.

use crate::error::MigrationError;
use crate::models::{CronSchedule, Schedule};

/// Build a quartz cron expression from a recurrence interval in
/// seconds. The tier boundaries are exact; downstream consumers
/// validate the generated string.
pub fn build_quartz_expression(interval: u64) -> Result<String, MigrationError> {
    let (seconds, minutes, hours) = if interval < 60 {
        (format!("*/{}", interval), "*".to_string(), "*".to_string())
    } else if interval < 3600 {
        (
            format!("{}", interval % 60),
            format!("*/{}", interval / 60),
            "*".to_string(),
        )
    } else if interval < 86400 {
        (
            format!("{}", interval % 60),
            format!("{}", (interval / 60) % 60),
            format!("*/{}", interval / 3600),
        )
    } else {
        return Err(MigrationError::IntervalTooLarge);
    };

    Ok(format!("{} {} {} ? * * *", seconds, minutes, hours))
}

/// Translate a Redash schedule into a Databricks cron schedule, UTC.
/// Schedules without a numeric interval (manual or date-anchored
/// recurrences) are not supported.
pub fn cron_schedule(schedule: &Schedule) -> Result<CronSchedule, MigrationError> {
    let interval = schedule.interval.ok_or(MigrationError::UnsupportedSchedule)?;
    Ok(CronSchedule {
        quartz_cron_expression: build_quartz_expression(interval)?,
        timezone_id: "UTC".to_string(),
    })
}
