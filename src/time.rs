#[cfg(test)]
use std::sync::Mutex;

use anyhow::{bail, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone, Timelike};

#[cfg(test)]
static MOCK_TIME: once_cell::sync::Lazy<Mutex<u64>> =
    once_cell::sync::Lazy::new(|| Mutex::new(Local::now().timestamp() as u64));

#[cfg(test)]
pub fn advance_mock_time(seconds: u64) {
    let mut guard = MOCK_TIME.lock().unwrap();
    *guard += seconds;
}

#[cfg(test)]
pub fn set_mock_time(time: u64) {
    let mut guard = MOCK_TIME.lock().unwrap();
    *guard = time;
}

#[cfg(test)]
pub fn current_timestamp() -> u64 {
    *MOCK_TIME.lock().unwrap()
}

#[cfg(not(test))]
pub fn current_timestamp() -> u64 {
    Local::now().timestamp() as u64
}

/// Parses a time string into a Unix timestamp. Accepted formats: raw unix
/// seconds, `YYYY-MM-DD` (local midnight), or `YYYY-MM-DD HH:MM:SS`.
pub fn parse_time(s: &str) -> Result<u64> {
    if let Ok(timestamp) = s.parse::<u64>() {
        return Ok(timestamp);
    }

    let datetime = if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        match date.and_hms_opt(0, 0, 0) {
            Some(datetime) => datetime,
            None => bail!("invalid date '{s}'"),
        }
    } else if let Ok(datetime) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        datetime
    } else {
        bail!("invalid time '{s}', expected formats: unix timestamp, YYYY-MM-DD, or YYYY-MM-DD HH:MM:SS");
    };

    let local = match Local.from_local_datetime(&datetime).single() {
        Some(local) => local,
        None => bail!("invalid local time '{s}'"),
    };
    Ok(local.timestamp() as u64)
}

/// Formats a Unix timestamp back into the form [`parse_time`] accepts.
/// A timestamp at local midnight renders as a bare date so that values
/// entered without a time-of-day survive a parse/format round trip.
pub fn format_time(time: u64) -> String {
    match Local.timestamp_opt(time as i64, 0).single() {
        Some(datetime) => {
            let t = datetime.time();
            if t.hour() == 0 && t.minute() == 0 && t.second() == 0 {
                datetime.format("%Y-%m-%d").to_string()
            } else {
                datetime.format("%Y-%m-%d %H:%M:%S").to_string()
            }
        }
        None => time.to_string(),
    }
}
