use chrono::{Duration, NaiveDateTime};

use crate::model::{Record, Stored};

/// Keep the records timestamped within the last `window` days of `now`.
///
/// `None` returns the input untouched. Records whose timestamp does not parse
/// are dropped.
pub fn within_days<T: Record>(
    records: Vec<Stored<T>>,
    window: Option<u32>,
    now: NaiveDateTime,
) -> Vec<Stored<T>> {
    let days = match window {
        Some(days) => days,
        None => return records,
    };
    let since = now - Duration::days(i64::from(days));

    records
        .into_iter()
        .filter(|stored| match stored.record.timestamp() {
            Some(ts) => ts >= since,
            None => false,
        })
        .collect()
}

/// Filename fragment for an active day window.
pub fn label(window: Option<u32>) -> String {
    match window {
        Some(days) => format!("{}_hari", days),
        None => "semua".to_string(),
    }
}
