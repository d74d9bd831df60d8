//! CSV export of a (filtered) record series.

use chrono::NaiveDateTime;

use crate::fuel::{FuelBand, TankLevels};
use crate::model::{
    BatteryReplacement, FuelLevel, FuelRefill, Maintenance, PowerStatus, Record, Series, Stored,
};
use crate::power::{self, PowerReadings};
use crate::{datetime, filter, Error};

/// One CSV row per record, under a fixed header.
pub trait CsvRow: Record {
    const HEADERS: &'static [&'static str];

    fn row(&self) -> Vec<String>;
}

impl CsvRow for PowerStatus {
    const HEADERS: &'static [&'static str] = &[
        "Tanggal",
        "Status PLN",
        "Genset 135kVA",
        "Genset 150kVA",
        "Genset Radar",
        "Keterangan",
    ];

    fn row(&self) -> Vec<String> {
        let readings = PowerReadings::from(self);
        vec![
            datetime::display(&self.datetime),
            power::status_text(readings.grid).to_string(),
            power::status_text(readings.genset_135).to_string(),
            power::status_text(readings.genset_150).to_string(),
            power::status_text(readings.radar).to_string(),
            power::describe(&readings),
        ]
    }
}

impl CsvRow for FuelLevel {
    const HEADERS: &'static [&'static str] = &[
        "Tanggal",
        "Tangki 135kVA",
        "Tangki 150kVA",
        "Tangki Radar",
        "Status Keseluruhan",
    ];

    fn row(&self) -> Vec<String> {
        let tanks = TankLevels::normalize(&self.tanks);
        let mut row = vec![datetime::display(&self.datetime)];
        row.extend(tanks.levels().iter().map(|level| format!("{}%", level)));
        row.push(tanks.overall().label().to_string());
        row
    }
}

fn technician(technician: &Option<String>) -> String {
    technician.clone().unwrap_or_default()
}

impl CsvRow for FuelRefill {
    const HEADERS: &'static [&'static str] = &["Tanggal", "Waktu", "Jumlah Liter", "Teknisi"];

    fn row(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.time.clone(),
            self.amount.to_string(),
            technician(&self.technician),
        ]
    }
}

impl CsvRow for BatteryReplacement {
    const HEADERS: &'static [&'static str] =
        &["Tanggal", "Waktu", "Jenis Baterai", "Catatan", "Teknisi"];

    fn row(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.time.clone(),
            self.battery_type.clone(),
            self.notes.clone(),
            technician(&self.technician),
        ]
    }
}

impl CsvRow for Maintenance {
    const HEADERS: &'static [&'static str] = &["Tanggal", "Waktu", "Catatan", "Teknisi"];

    fn row(&self) -> Vec<String> {
        vec![
            self.date.clone(),
            self.time.clone(),
            self.note.clone(),
            technician(&self.technician),
        ]
    }
}

/// Every value is double-quoted.
pub fn to_csv<T: CsvRow>(records: &[Stored<T>]) -> Result<String, Error> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());

    writer
        .write_record(T::HEADERS)
        .or(Err(Error::FormatError))?;
    for stored in records {
        writer
            .write_record(stored.record.row())
            .or(Err(Error::FormatError))?;
    }

    let buffer = writer.into_inner().or(Err(Error::FormatError))?;
    String::from_utf8(buffer).or(Err(Error::FormatError))
}

fn series_name(series: Series) -> &'static str {
    match series {
        Series::Status => "status_listrik",
        Series::Level => "level_minyak",
        Series::Fuel => "pengisian_minyak",
        Series::Battery => "penggantian_baterai",
        Series::Maintenance => "maintenance",
    }
}

/// `riwayat_<series>_<filter>_<yyyy-mm-dd>.csv`
pub fn filename(series: Series, window: Option<u32>, today: NaiveDateTime) -> String {
    format!(
        "riwayat_{}_{}_{}.csv",
        series_name(series),
        filter::label(window),
        today.format("%Y-%m-%d")
    )
}
