use chrono::NaiveDateTime;
use num_derive::FromPrimitive;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::{datetime, fuel, Error};

type Percent = f64;
type Liters = f64;

/// The five independent historized record series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Series {
    /// Power source readings.
    Status,
    /// Fuel tank levels.
    Level,
    /// Fuel refills.
    Fuel,
    Battery,
    Maintenance,
}

impl Series {
    pub const ALL: [Series; 5] = [
        Series::Status,
        Series::Level,
        Series::Fuel,
        Series::Battery,
        Series::Maintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Series::Status => "status",
            Series::Level => "level",
            Series::Fuel => "fuel",
            Series::Battery => "battery",
            Series::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Series {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Series::ALL
            .iter()
            .find(|series| series.as_str() == s)
            .copied()
            .ok_or_else(|| Error::validation(format!("unknown series {:?}", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

/// A record as read back from the store, together with its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: RecordId,
    #[serde(flatten)]
    pub record: T,
}

/// Behaviour shared by every record kept in a series.
pub trait Record: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    const SERIES: Series;

    /// Parsed record time, `None` when the stored fields are malformed.
    fn timestamp(&self) -> Option<NaiveDateTime>;

    /// Check and normalize a record before it is written.
    fn validate(self) -> Result<Self, Error>;
}

/// A single 0/1 reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum Switch {
    Off = 0,
    On = 1,
}

impl Switch {
    fn check(name: &str, value: u8) -> Result<Switch, Error> {
        num::FromPrimitive::from_u8(value)
            .ok_or_else(|| Error::validation(format!("{} must be 0 or 1, got {}", name, value)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerStatus {
    pub pln: u8,
    pub genset_135: u8,
    pub genset_150: u8,
    pub genset_radar: u8,
    pub datetime: String,
}

impl Record for PowerStatus {
    const SERIES: Series = Series::Status;

    fn timestamp(&self) -> Option<NaiveDateTime> {
        datetime::timestamp(&self.datetime)
    }

    fn validate(self) -> Result<Self, Error> {
        Switch::check("pln", self.pln)?;
        Switch::check("genset_135", self.genset_135)?;
        Switch::check("genset_150", self.genset_150)?;
        Switch::check("genset_radar", self.genset_radar)?;
        datetime::parse(&self.datetime)?;
        Ok(self)
    }
}

/// Tank readings in every schema the `level` series has been written with.
/// Variant order matters: the richest shape must be tried first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TankReading {
    Triple {
        tangki_135kva: Percent,
        tangki_150kva: Percent,
        tangki_radar: Percent,
    },
    Dual {
        reservoir: Percent,
        drum: Percent,
    },
    Single {
        level: Percent,
    },
}

impl TankReading {
    fn values(&self) -> Vec<Percent> {
        match *self {
            TankReading::Triple {
                tangki_135kva,
                tangki_150kva,
                tangki_radar,
            } => vec![tangki_135kva, tangki_150kva, tangki_radar],
            TankReading::Dual { reservoir, drum } => vec![reservoir, drum],
            TankReading::Single { level } => vec![level],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelLevel {
    #[serde(flatten)]
    pub tanks: TankReading,
    pub datetime: String,
}

impl Record for FuelLevel {
    const SERIES: Series = Series::Level;

    fn timestamp(&self) -> Option<NaiveDateTime> {
        datetime::timestamp(&self.datetime)
    }

    fn validate(self) -> Result<Self, Error> {
        if self.tanks.values().iter().any(|v| !v.is_finite()) {
            return Err(Error::validation("tank levels must be finite numbers"));
        }
        datetime::parse(&self.datetime)?;
        Ok(self)
    }
}

/// Normalize and check the split `date`/`time` pair of an operator entry.
fn validate_entry_time(date: &str, time: &str) -> Result<(String, String), Error> {
    let date = datetime::normalize_date(date)?;
    let time = datetime::normalize_time(time)?;
    datetime::parse_parts(&date, &time)?;
    Ok((date, time))
}

fn require(field: &str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        Err(Error::validation(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelRefill {
    pub date: String,
    pub time: String,
    #[serde(deserialize_with = "fuel::deserialize_amount")]
    pub amount: Liters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician: Option<String>,
}

impl Record for FuelRefill {
    const SERIES: Series = Series::Fuel;

    fn timestamp(&self) -> Option<NaiveDateTime> {
        datetime::parse_parts(&self.date, &self.time).ok()
    }

    fn validate(self) -> Result<Self, Error> {
        let (date, time) = validate_entry_time(&self.date, &self.time)?;
        fuel::check_amount(self.amount)?;
        Ok(FuelRefill { date, time, ..self })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryReplacement {
    pub date: String,
    pub time: String,
    pub battery_type: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician: Option<String>,
}

impl Record for BatteryReplacement {
    const SERIES: Series = Series::Battery;

    fn timestamp(&self) -> Option<NaiveDateTime> {
        datetime::parse_parts(&self.date, &self.time).ok()
    }

    fn validate(self) -> Result<Self, Error> {
        let (date, time) = validate_entry_time(&self.date, &self.time)?;
        require("battery_type", &self.battery_type)?;
        Ok(BatteryReplacement { date, time, ..self })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Maintenance {
    pub date: String,
    pub time: String,
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technician: Option<String>,
}

impl Record for Maintenance {
    const SERIES: Series = Series::Maintenance;

    fn timestamp(&self) -> Option<NaiveDateTime> {
        datetime::parse_parts(&self.date, &self.time).ok()
    }

    fn validate(self) -> Result<Self, Error> {
        let (date, time) = validate_entry_time(&self.date, &self.time)?;
        require("note", &self.note)?;
        Ok(Maintenance { date, time, ..self })
    }
}

/// Last heartbeat written by the monitored site. Not historized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    #[serde(rename = "isOnline")]
    pub is_online: u8,
    pub datetime: String,
}

impl SystemStatus {
    pub fn validate(self) -> Result<Self, Error> {
        Switch::check("isOnline", self.is_online)?;
        datetime::parse(&self.datetime)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn level_records_deserialize_in_every_shape() {
        let triple: FuelLevel = serde_json::from_value(json!({
            "tangki_135kva": 80.0, "tangki_150kva": 60, "tangki_radar": 15,
            "datetime": "10/05/2025 15:30:00"
        }))
        .unwrap();
        assert!(matches!(triple.tanks, TankReading::Triple { .. }));

        let dual: FuelLevel = serde_json::from_value(json!({
            "reservoir": 85, "drum": 75, "datetime": "10/05/2025 15:30:00"
        }))
        .unwrap();
        assert_eq!(
            dual.tanks,
            TankReading::Dual {
                reservoir: 85.0,
                drum: 75.0
            }
        );

        let single: FuelLevel =
            serde_json::from_value(json!({"level": 42, "datetime": "10/05/2025 15:30:00"}))
                .unwrap();
        assert_eq!(single.tanks, TankReading::Single { level: 42.0 });
    }

    #[test]
    fn level_records_keep_their_shape_when_serialized() {
        let dual = FuelLevel {
            tanks: TankReading::Dual {
                reservoir: 50.0,
                drum: 30.0,
            },
            datetime: "10/05/2025 15:30:00".to_string(),
        };
        let value = serde_json::to_value(&dual).unwrap();
        assert_eq!(value["reservoir"], json!(50.0));
        assert!(value.get("tangki_radar").is_none());
    }

    #[test]
    fn power_readings_must_be_binary() {
        let status = PowerStatus {
            pln: 1,
            genset_135: 2,
            genset_150: 0,
            genset_radar: 0,
            datetime: "10/05/2025 15:30:00".to_string(),
        };
        assert!(matches!(status.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn refill_amount_accepts_text_with_decimal_comma() {
        let refill: FuelRefill = serde_json::from_value(json!({
            "date": "2025-05-10", "time": "08:15", "amount": "25,5"
        }))
        .unwrap();
        let refill = refill.validate().unwrap();
        assert_eq!(refill.amount, 25.5);
        assert_eq!(refill.date, "10/05/2025");
        assert_eq!(refill.time, "08:15:00");
        assert_eq!(refill.technician, None);
    }

    #[test]
    fn refill_amount_rejects_non_positive_values() {
        let refill = serde_json::from_value::<FuelRefill>(json!({
            "date": "10/05/2025", "time": "08:15:00", "amount": "0"
        }));
        assert!(refill.is_err());
    }

    #[test]
    fn maintenance_needs_a_note() {
        let entry = Maintenance {
            date: "10/05/2025".to_string(),
            time: "08:15:00".to_string(),
            note: "  ".to_string(),
            technician: Some("Budi".to_string()),
        };
        assert!(entry.validate().is_err());
    }

    #[test]
    fn system_status_uses_camel_case_flag() {
        let status: SystemStatus =
            serde_json::from_value(json!({"isOnline": 1, "datetime": "10/05/2025 15:30:00"}))
                .unwrap();
        assert_eq!(status.is_online, 1);
        assert!(status.validate().is_ok());
    }

    #[test]
    fn series_round_trips_through_its_path_name() {
        for series in Series::ALL.iter() {
            assert_eq!(series.as_str().parse::<Series>().unwrap(), *series);
        }
        assert!("genset".parse::<Series>().is_err());
    }
}
