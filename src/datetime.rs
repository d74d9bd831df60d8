//! Codec for the `dd/mm/yyyy hh:mm:ss` timestamps carried by every stored record.
//!
//! Timestamps are naive: the site writes local (WIB) time and no conversion is
//! ever applied, the `WIB` suffix of the display form is a label only.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::Error;

pub const FORMAT: &str = "%d/%m/%Y %H:%M:%S";
pub const DATE_FORMAT: &str = "%d/%m/%Y";
pub const TIME_FORMAT: &str = "%H:%M:%S";

const MONTHS: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

/// Current wall-clock time in the site's timezone.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Parse `DD/MM/YYYY HH:MM:SS`.
pub fn parse(s: &str) -> Result<NaiveDateTime, Error> {
    let (date, time) = s
        .trim()
        .split_once(' ')
        .ok_or_else(|| Error::Datetime(s.to_string()))?;

    parse_parts(date, time.trim())
}

/// Parse a record's split `date` (`DD/MM/YYYY`) and `time` (`HH:MM:SS`) fields.
pub fn parse_parts(date: &str, time: &str) -> Result<NaiveDateTime, Error> {
    let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
        .map_err(|_| Error::Datetime(date.to_string()))?;
    let time = NaiveTime::parse_from_str(time.trim(), TIME_FORMAT)
        .map_err(|_| Error::Datetime(time.to_string()))?;

    Ok(NaiveDateTime::new(date, time))
}

/// Comparison form of a stored timestamp; `None` marks it as unusable.
pub fn timestamp(s: &str) -> Option<NaiveDateTime> {
    parse(s).ok()
}

pub fn format(dt: &NaiveDateTime) -> String {
    dt.format(FORMAT).to_string()
}

pub fn format_date(dt: &NaiveDateTime) -> String {
    dt.format(DATE_FORMAT).to_string()
}

pub fn format_time(dt: &NaiveDateTime) -> String {
    dt.format(TIME_FORMAT).to_string()
}

/// `10 Mei 2025, 15:30 WIB`
pub fn format_display(dt: &NaiveDateTime) -> String {
    format!(
        "{} {} {}, {:02}:{:02} WIB",
        dt.day(),
        MONTHS[dt.month0() as usize],
        dt.year(),
        dt.hour(),
        dt.minute()
    )
}

/// Display form of a stored timestamp, or the stored string itself if it
/// does not parse.
pub fn display(s: &str) -> String {
    match parse(s) {
        Ok(dt) => format_display(&dt),
        Err(_) => s.to_string(),
    }
}

/// Accept `dd/mm/yyyy` or the `yyyy-mm-dd` form emitted by date pickers.
pub fn normalize_date(s: &str) -> Result<String, Error> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map(|d| d.format(DATE_FORMAT).to_string())
        .map_err(|_| Error::Datetime(s.to_string()))
}

/// Accept `hh:mm:ss` or `hh:mm` (seconds default to zero).
pub fn normalize_time(s: &str) -> Result<String, Error> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map(|t| t.format(TIME_FORMAT).to_string())
        .map_err(|_| Error::Datetime(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn format_then_parse_keeps_the_second() {
        let dt = at(2025, 5, 10, 15, 30, 7);
        assert_eq!(format(&dt), "10/05/2025 15:30:07");
        assert_eq!(parse(&format(&dt)).unwrap(), dt);
    }

    #[test]
    fn parse_rejects_malformed_strings() {
        assert!(parse("10-05-2025 15:30:00").is_err());
        assert!(parse("10/05/2025").is_err());
        assert!(parse("aa/05/2025 15:30:00").is_err());
        assert!(parse("31/02/2025 10:00:00").is_err());
        assert_eq!(timestamp("garbage"), None);
    }

    #[test]
    fn display_uses_indonesian_month_names() {
        assert_eq!(display("01/05/2025 15:30:45"), "1 Mei 2025, 15:30 WIB");
        assert_eq!(display("24/12/2024 08:05:00"), "24 Desember 2024, 08:05 WIB");
    }

    #[test]
    fn display_passes_malformed_strings_through() {
        assert_eq!(display("kemarin sore"), "kemarin sore");
        assert_eq!(display(""), "");
    }

    #[test]
    fn entry_form_fields_are_normalized() {
        assert_eq!(normalize_date("2025-05-10").unwrap(), "10/05/2025");
        assert_eq!(normalize_date("10/05/2025").unwrap(), "10/05/2025");
        assert_eq!(normalize_time("07:05").unwrap(), "07:05:00");
        assert_eq!(normalize_time("07:05:09").unwrap(), "07:05:09");
        assert!(normalize_date("10.05.2025").is_err());
        assert!(normalize_time("25:00").is_err());
    }
}
