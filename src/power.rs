//! Derives the operator narrative and the critical flag from the four power
//! source readings.

use serde::Serialize;

use crate::model::PowerStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Generator {
    /// Primary 135 kVA unit.
    Genset135,
    /// Secondary 150 kVA unit.
    Genset150,
    /// Auxiliary unit dedicated to the radar load.
    Radar,
}

impl Generator {
    pub const ALL: [Generator; 3] = [Generator::Genset135, Generator::Genset150, Generator::Radar];

    pub fn label(&self) -> &'static str {
        match self {
            Generator::Genset135 => "135kVA",
            Generator::Genset150 => "150kVA",
            Generator::Radar => "Radar",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PowerReadings {
    pub grid: bool,
    pub genset_135: bool,
    pub genset_150: bool,
    pub radar: bool,
}

impl PowerReadings {
    pub fn is_active(&self, generator: Generator) -> bool {
        match generator {
            Generator::Genset135 => self.genset_135,
            Generator::Genset150 => self.genset_150,
            Generator::Radar => self.radar,
        }
    }

    fn active_generators(&self) -> Vec<Generator> {
        Generator::ALL
            .iter()
            .copied()
            .filter(|g| self.is_active(*g))
            .collect()
    }

    /// Number of main-capacity units (135 kVA, 150 kVA) running.
    fn main_units_active(&self) -> usize {
        [self.genset_135, self.genset_150]
            .iter()
            .filter(|active| **active)
            .count()
    }
}

impl From<&PowerStatus> for PowerReadings {
    fn from(status: &PowerStatus) -> Self {
        PowerReadings {
            grid: status.pln != 0,
            genset_135: status.genset_135 != 0,
            genset_150: status.genset_150 != 0,
            radar: status.genset_radar != 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub description: String,
    /// Manual intervention is needed; rendered as an urgent, blinking notice.
    pub critical: bool,
}

pub fn assess(readings: &PowerReadings) -> Assessment {
    Assessment {
        description: describe(readings),
        critical: is_critical(readings),
    }
}

/// Grid down and either both main units or the radar unit are not running.
pub fn is_critical(readings: &PowerReadings) -> bool {
    !readings.grid && ((!readings.genset_135 && !readings.genset_150) || !readings.radar)
}

pub fn describe(readings: &PowerReadings) -> String {
    if readings.grid {
        let active = readings.active_generators();
        if active.is_empty() {
            return "PLN aktif, Genset otomatis nonaktif".to_string();
        }
        let labels: Vec<&str> = active.iter().map(Generator::label).collect();
        return format!("PLN aktif, Genset {} sedang dipanaskan", labels.join(", "));
    }

    let radar_manual = "Genset Radar harus aktifkan secara manual";
    match (readings.main_units_active(), readings.radar) {
        (0, true) => "PLN nonaktif, Genset Radar otomatis nyala, Genset 135kVA dan 150kVA harus aktifkan secara manual".to_string(),
        (0, false) => "PLN nonaktif, Genset 135kVA, 150kVA, dan Radar harus aktifkan secara manual".to_string(),
        (1, true) => "PLN nonaktif, genset otomatis aktif".to_string(),
        (1, false) => format!("PLN nonaktif, genset otomatis aktif, {}", radar_manual),
        (_, true) => "PLN nonaktif, genset otomatis aktif, genset operasional sedang dipanaskan".to_string(),
        (_, false) => format!(
            "PLN nonaktif, genset otomatis aktif, genset operasional sedang dipanaskan, {}",
            radar_manual
        ),
    }
}

/// A generator badge alarms when it is idle while the grid is down. The grid
/// badge itself never alarms.
pub fn unit_alarm(readings: &PowerReadings, generator: Generator) -> bool {
    !readings.grid && !readings.is_active(generator)
}

pub fn status_text(active: bool) -> &'static str {
    if active {
        "Aktif"
    } else {
        "Nonaktif"
    }
}
