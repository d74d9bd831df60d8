use crate::model::Series;

pub type Endpoint = str;

pub const DASHBOARD: &Endpoint = "/dashboard";
pub const SYSTEM_STATUS: &Endpoint = "/system_status";
pub const RECORDS: &Endpoint = "/records";
pub const METRICS: &Endpoint = "/metrics";

/// `/records/<series>`
pub fn records(series: Series) -> String {
    format!("{}/{}", RECORDS, series)
}
