//! Live operator view, kept current by store subscriptions.

use chrono::NaiveDateTime;
use serde::Serialize;

use std::sync::{Arc, Mutex, MutexGuard};

use crate::fuel::{FuelBand, TankLevels};
use crate::model::{FuelLevel, PowerStatus, RecordId, Stored, SystemStatus};
use crate::power::{self, Generator, PowerReadings};
use crate::staleness::{Liveness, SiteMonitor};
use crate::store::{MemoryStore, Subscription};
use crate::{datetime, metrics};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitView {
    pub name: String,
    pub active: bool,
    pub status: &'static str,
    /// Blinks on the operator display.
    pub alarm: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerView {
    pub id: RecordId,
    pub readings: PowerReadings,
    pub units: Vec<UnitView>,
    pub description: String,
    pub critical: bool,
    pub updated: String,
}

impl PowerView {
    pub fn new(stored: &Stored<PowerStatus>) -> Self {
        let readings = PowerReadings::from(&stored.record);
        let assessment = power::assess(&readings);

        let mut units = vec![UnitView {
            name: "PLN".to_string(),
            active: readings.grid,
            status: power::status_text(readings.grid),
            alarm: false,
        }];
        units.extend(Generator::ALL.iter().map(|g| UnitView {
            name: format!("Genset {}", g.label()),
            active: readings.is_active(*g),
            status: power::status_text(readings.is_active(*g)),
            alarm: power::unit_alarm(&readings, *g),
        }));

        PowerView {
            id: stored.id.clone(),
            readings,
            units,
            description: assessment.description,
            critical: assessment.critical,
            updated: datetime::display(&stored.record.datetime),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TankView {
    pub name: &'static str,
    pub level: f64,
    pub band: FuelBand,
    pub label: &'static str,
    pub alarm: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuelView {
    pub id: RecordId,
    pub tanks: Vec<TankView>,
    pub overall: FuelBand,
    pub overall_label: &'static str,
    pub updated: String,
}

impl FuelView {
    pub fn new(stored: &Stored<FuelLevel>) -> Self {
        let levels = TankLevels::normalize(&stored.record.tanks);
        let overall = levels.overall();

        let tanks = TankLevels::NAMES
            .iter()
            .zip(levels.levels().iter())
            .map(|(name, level)| {
                let band = FuelBand::classify(*level);
                TankView {
                    name: *name,
                    level: *level,
                    band,
                    label: band.label(),
                    alarm: band.alarm(),
                }
            })
            .collect();

        FuelView {
            id: stored.id.clone(),
            tanks,
            overall,
            overall_label: overall.label(),
            updated: datetime::display(&stored.record.datetime),
        }
    }

    pub fn levels(&self) -> TankLevels {
        TankLevels {
            genset_135: self.tanks[0].level,
            genset_150: self.tanks[1].level,
            radar: self.tanks[2].level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteView {
    pub liveness: Liveness,
    pub last_update: Option<String>,
    pub title: String,
}

impl SiteView {
    pub fn new(liveness: Liveness, last: Option<&SystemStatus>) -> Self {
        let last_update = last.map(|s| s.datetime.clone());
        let title = match (liveness, &last_update) {
            (Liveness::Unknown, _) => "Memuat status sistem...".to_string(),
            (Liveness::Online, Some(at)) => format!("Sistem Online - Terakhir update: {}", at),
            (Liveness::Offline, Some(at)) => format!("Sistem Offline - Terakhir update: {}", at),
            (_, None) => "Status sistem tidak tersedia".to_string(),
        };
        SiteView {
            liveness,
            last_update,
            title,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub power: Option<PowerView>,
    pub fuel: Option<FuelView>,
    pub site: SiteView,
}

#[derive(Debug, Default)]
struct Latest {
    power: Option<PowerView>,
    fuel: Option<FuelView>,
}

fn lock(latest: &Mutex<Latest>) -> MutexGuard<'_, Latest> {
    match latest.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Projection of the newest power, fuel and heartbeat records. Its
/// subscriptions are released when the dashboard is dropped.
pub struct Dashboard {
    latest: Arc<Mutex<Latest>>,
    monitor: Arc<SiteMonitor>,
    _subscriptions: Vec<Subscription>,
}

impl Dashboard {
    pub fn attach(store: &MemoryStore, monitor: Arc<SiteMonitor>) -> Self {
        let latest = Arc::new(Mutex::new(Latest::default()));

        let power_sink = latest.clone();
        let power = store
            .status
            .subscribe_latest(move |stored: Option<&Stored<PowerStatus>>| {
                let view = stored.map(PowerView::new);
                match &view {
                    Some(view) => {
                        metrics::set_power(&view.readings, view.critical);
                        if view.critical {
                            log::warn!("{}", view.description);
                        }
                    }
                    None => metrics::clear_power(),
                }
                lock(&power_sink).power = view;
            });

        let fuel_sink = latest.clone();
        let fuel = store
            .level
            .subscribe_latest(move |stored: Option<&Stored<FuelLevel>>| {
                let view = stored.map(FuelView::new);
                match &view {
                    Some(view) => {
                        metrics::set_fuel(&view.levels(), view.overall);
                        if view.overall.alarm() {
                            log::warn!("fuel level critical: {:?}", view.levels());
                        }
                    }
                    None => metrics::clear_fuel(),
                }
                lock(&fuel_sink).fuel = view;
            });

        let heartbeat_monitor = monitor.clone();
        let heartbeat = store
            .system_status()
            .subscribe(move |status: &SystemStatus| {
                heartbeat_monitor.observe(status.clone(), datetime::now());
            });

        Dashboard {
            latest,
            monitor,
            _subscriptions: vec![power, fuel, heartbeat],
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let latest = lock(&self.latest);
        Snapshot {
            power: latest.power.clone(),
            fuel: latest.fuel.clone(),
            site: self.site(),
        }
    }

    pub fn site(&self) -> SiteView {
        SiteView::new(
            self.monitor.liveness(),
            self.monitor.last_heartbeat().as_ref(),
        )
    }

    /// Re-evaluate liveness at `now`.
    pub fn refresh_site(&self, now: NaiveDateTime) -> SiteView {
        let liveness = self.monitor.tick(now);
        SiteView::new(liveness, self.monitor.last_heartbeat().as_ref())
    }
}
