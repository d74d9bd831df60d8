use prometheus::{Encoder, Gauge, GaugeVec, IntCounterVec, TextEncoder};

use crate::fuel::{FuelBand, TankLevels};
use crate::model::Series;
use crate::power::PowerReadings;
use crate::staleness::Liveness;
use crate::Error;

lazy_static! {
    static ref POWER_SOURCE_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("power_source_active", "1 when the power source is running",),
        &["source"],
    )
    .unwrap();
    static ref POWER_CRITICAL_GAUGE: Gauge = register_gauge!(opts!(
        "power_critical",
        "1 when the grid is down and manual generator activation is required",
    ))
    .unwrap();
    static ref FUEL_TANK_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("fuel_tank_level", "fuel tank fill level (in percent)",),
        &["tank"],
    )
    .unwrap();
    static ref FUEL_SEVERITY_GAUGE: Gauge = register_gauge!(opts!(
        "fuel_status_severity",
        "severity of the weakest tank (0 normal .. 3 critical)",
    ))
    .unwrap();
    static ref SITE_ONLINE_GAUGE: Gauge = register_gauge!(opts!(
        "site_online",
        "1 online, 0 offline, -1 no heartbeat received yet",
    ))
    .unwrap();
    static ref STORE_WRITES_COUNTER: IntCounterVec = register_int_counter_vec!(
        opts!("store_writes_total", "writes accepted by the record store",),
        &["series", "operation"],
    )
    .unwrap();
}

pub fn set_power(readings: &PowerReadings, critical: bool) {
    let sources = [
        ("pln", readings.grid),
        ("genset_135", readings.genset_135),
        ("genset_150", readings.genset_150),
        ("genset_radar", readings.radar),
    ];
    for (source, active) in sources.iter() {
        POWER_SOURCE_GAUGE
            .with_label_values(&[*source])
            .set(if *active { 1.0 } else { 0.0 });
    }
    POWER_CRITICAL_GAUGE.set(if critical { 1.0 } else { 0.0 });
}

pub fn set_fuel(tanks: &TankLevels, overall: FuelBand) {
    for (tank, level) in ["genset_135", "genset_150", "radar"]
        .iter()
        .zip(tanks.levels().iter())
    {
        FUEL_TANK_GAUGE.with_label_values(&[*tank]).set(*level);
    }
    FUEL_SEVERITY_GAUGE.set(f64::from(overall.severity()));
}

/// No power record left to report on.
pub fn clear_power() {
    POWER_SOURCE_GAUGE.reset();
    POWER_CRITICAL_GAUGE.set(0.0);
}

pub fn clear_fuel() {
    FUEL_TANK_GAUGE.reset();
    FUEL_SEVERITY_GAUGE.set(0.0);
}

pub fn set_liveness(liveness: Liveness) {
    SITE_ONLINE_GAUGE.set(match liveness {
        Liveness::Online => 1.0,
        Liveness::Offline => 0.0,
        Liveness::Unknown => -1.0,
    });
}

pub fn record_write(series: Series, operation: &str) {
    record_write_raw(series.as_str(), operation);
}

pub fn record_write_raw(series: &str, operation: &str) {
    STORE_WRITES_COUNTER
        .with_label_values(&[series, operation])
        .inc();
}

/// Read metrics from Prometheus exporter registry.
pub fn read() -> Result<String, Error> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder
        .encode(&metric_families, &mut buffer)
        .or(Err(Error::FormatError))?;
    String::from_utf8(buffer).or(Err(Error::FormatError))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposition_contains_updated_gauges() {
        set_power(
            &PowerReadings {
                grid: false,
                genset_135: true,
                genset_150: false,
                radar: false,
            },
            true,
        );
        record_write(Series::Battery, "create");

        let text = read().unwrap();
        assert!(text.contains("power_source_active{source=\"genset_135\"}"));
        assert!(text.contains("power_critical"));
        assert!(text.contains("store_writes_total{operation=\"create\",series=\"battery\"}"));
    }
}
