//! Fuel tank normalization, level classification and refill amount validation.

use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Deserializer, Serialize};

use crate::model::TankReading;
use crate::Error;

const NORMAL_FROM: f64 = 70.0;
const SEDANG_FROM: f64 = 40.0;
const RENDAH_FROM: f64 = 20.0;

const INVALID_AMOUNT: &str = "Jumlah minyak harus berupa angka yang valid dan lebih dari 0";

/// Severity band of a tank level, ordered from healthy to critical.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, FromPrimitive, ToPrimitive,
)]
pub enum FuelBand {
    Normal = 0,
    Sedang = 1,
    Rendah = 2,
    Kritis = 3,
}

impl FuelBand {
    /// Classify a level in percent. Levels are not clamped; anything that is
    /// not at least 20 (including NaN) is critical.
    pub fn classify(level: f64) -> FuelBand {
        if level >= NORMAL_FROM {
            FuelBand::Normal
        } else if level >= SEDANG_FROM {
            FuelBand::Sedang
        } else if level >= RENDAH_FROM {
            FuelBand::Rendah
        } else {
            FuelBand::Kritis
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FuelBand::Normal => "Normal",
            FuelBand::Sedang => "Sedang",
            FuelBand::Rendah => "Rendah",
            FuelBand::Kritis => "Kritis",
        }
    }

    pub fn severity(&self) -> u8 {
        num::ToPrimitive::to_u8(self).unwrap_or(u8::MAX)
    }

    /// Only the critical band keeps a persistent visual alarm.
    pub fn alarm(&self) -> bool {
        *self == FuelBand::Kritis
    }
}

/// Tank levels in the current three-tank layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TankLevels {
    pub genset_135: f64,
    pub genset_150: f64,
    pub radar: f64,
}

impl TankLevels {
    pub const NAMES: [&'static str; 3] = ["Tangki 135kVA", "Tangki 150kVA", "Tangki Radar"];

    /// Normalize any historical tank shape to three tanks.
    pub fn normalize(reading: &TankReading) -> TankLevels {
        match *reading {
            TankReading::Triple {
                tangki_135kva,
                tangki_150kva,
                tangki_radar,
            } => TankLevels {
                genset_135: tangki_135kva,
                genset_150: tangki_150kva,
                radar: tangki_radar,
            },
            TankReading::Dual { reservoir, drum } => TankLevels {
                genset_135: reservoir,
                genset_150: drum,
                radar: f64::max(0.0, (reservoir + drum) / 2.0),
            },
            TankReading::Single { level } => TankLevels {
                genset_135: level,
                genset_150: f64::max(0.0, level - 10.0),
                radar: f64::max(0.0, level - 5.0),
            },
        }
    }

    pub fn levels(&self) -> [f64; 3] {
        [self.genset_135, self.genset_150, self.radar]
    }

    pub fn min(&self) -> f64 {
        self.levels().iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// The weakest tank decides how urgent the installation is.
    pub fn overall(&self) -> FuelBand {
        FuelBand::classify(self.min())
    }
}

/// Parse an operator-entered refill amount, accepting `,` as decimal separator.
pub fn parse_amount(input: &str) -> Result<f64, Error> {
    let amount = input
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| Error::validation(INVALID_AMOUNT))?;

    check_amount(amount)
}

pub fn check_amount(amount: f64) -> Result<f64, Error> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(Error::validation(INVALID_AMOUNT))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AmountInput {
    Number(f64),
    Text(String),
}

/// Refill amounts arrive either as JSON numbers or as the raw form text.
pub fn deserialize_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let amount = match AmountInput::deserialize(deserializer)? {
        AmountInput::Number(n) => check_amount(n),
        AmountInput::Text(s) => parse_amount(&s),
    };
    amount.map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_boundaries() {
        assert_eq!(FuelBand::classify(70.0), FuelBand::Normal);
        assert_eq!(FuelBand::classify(69.999), FuelBand::Sedang);
        assert_eq!(FuelBand::classify(40.0), FuelBand::Sedang);
        assert_eq!(FuelBand::classify(39.999), FuelBand::Rendah);
        assert_eq!(FuelBand::classify(20.0), FuelBand::Rendah);
        assert_eq!(FuelBand::classify(19.999), FuelBand::Kritis);
    }

    #[test]
    fn unclamped_levels_still_classify() {
        assert_eq!(FuelBand::classify(130.0), FuelBand::Normal);
        assert_eq!(FuelBand::classify(-4.0), FuelBand::Kritis);
        assert_eq!(FuelBand::classify(f64::NAN), FuelBand::Kritis);
    }

    #[test]
    fn only_critical_band_alarms() {
        assert!(FuelBand::Kritis.alarm());
        assert!(!FuelBand::Rendah.alarm());
        assert_eq!(FuelBand::Normal.severity(), 0);
        assert_eq!(FuelBand::Kritis.severity(), 3);
        assert!(FuelBand::Rendah > FuelBand::Sedang);
    }

    #[test]
    fn single_tank_records_use_fallback_arithmetic() {
        let tanks = TankLevels::normalize(&TankReading::Single { level: 25.0 });
        assert_eq!(tanks.levels(), [25.0, 15.0, 20.0]);
        assert_eq!(tanks.overall(), FuelBand::classify(15.0));
        assert_eq!(tanks.overall(), FuelBand::Kritis);

        let empty = TankLevels::normalize(&TankReading::Single { level: 3.0 });
        assert_eq!(empty.levels(), [3.0, 0.0, 0.0]);
    }

    #[test]
    fn dual_tank_records_average_into_the_third_tank() {
        let tanks = TankLevels::normalize(&TankReading::Dual {
            reservoir: 80.0,
            drum: 50.0,
        });
        assert_eq!(tanks.levels(), [80.0, 50.0, 65.0]);
        assert_eq!(tanks.overall(), FuelBand::Sedang);
    }

    #[test]
    fn overall_status_follows_the_weakest_tank() {
        let tanks = TankLevels::normalize(&TankReading::Triple {
            tangki_135kva: 90.0,
            tangki_150kva: 85.0,
            tangki_radar: 35.0,
        });
        assert_eq!(tanks.min(), 35.0);
        assert_eq!(tanks.overall(), FuelBand::Rendah);
    }

    #[test]
    fn amount_accepts_both_decimal_separators() {
        assert_eq!(parse_amount("25.5").unwrap(), 25.5);
        assert_eq!(parse_amount("25,5").unwrap(), 25.5);
        assert_eq!(parse_amount(" 200 ").unwrap(), 200.0);
    }

    #[test]
    fn amount_rejects_non_positive_and_garbage() {
        for input in ["0", "-3", "abc", "", "inf", "NaN"].iter() {
            assert!(
                matches!(parse_amount(input), Err(Error::Validation(_))),
                "accepted {:?}",
                input
            );
        }
    }
}
