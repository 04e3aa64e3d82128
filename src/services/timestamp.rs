use chrono::{Datelike, Local};

use crate::utils::error::LineParseError;

const MONTHS: [(&str, &str); 12] = [
    ("Jan", "01"),
    ("Feb", "02"),
    ("Mar", "03"),
    ("Apr", "04"),
    ("May", "05"),
    ("Jun", "06"),
    ("Jul", "07"),
    ("Aug", "08"),
    ("Sep", "09"),
    ("Oct", "10"),
    ("Nov", "11"),
    ("Dec", "12"),
];

pub fn month_number(abbrev: &str) -> Result<&'static str, LineParseError> {
    MONTHS
        .iter()
        .find(|(name, _)| *name == abbrev)
        .map(|(_, number)| *number)
        .ok_or_else(|| LineParseError::UnknownMonth(abbrev.to_string()))
}

fn day_of_month(day: &str) -> Result<String, LineParseError> {
    match day.parse::<u32>() {
        Ok(value) if (1..=31).contains(&value) && day.len() <= 2 => Ok(format!("{:02}", value)),
        _ => Err(LineParseError::InvalidDay(day.to_string())),
    }
}

pub fn reconstruct_with_year(
    year: i32,
    month: &str,
    day: &str,
    clock: &str,
) -> Result<String, LineParseError> {
    let month = month_number(month)?;
    let day = day_of_month(day)?;
    Ok(format!("{}-{}-{} {}", year, month, day, clock))
}

// Syslog lines carry no year, so the current one is assumed. Entries from
// before a year boundary come out one year late.
pub fn reconstruct(month: &str, day: &str, clock: &str) -> Result<String, LineParseError> {
    reconstruct_with_year(Local::now().year(), month, day, clock)
}
