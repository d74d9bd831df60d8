//! Feeds the dashboard service with randomised site telemetry.

use powerguard_rs::client::DashboardClient;
use powerguard_rs::model::{FuelLevel, FuelRefill, PowerStatus, SystemStatus, TankReading};
use powerguard_rs::settings::{self, SimulatorSettings};
use powerguard_rs::{datetime, Error};
use rand::seq::SliceRandom;
use rand::Rng;

use std::time::Duration;

/// `(pln, genset_135, genset_150, genset_radar)`
const SCENARIOS: [(u8, u8, u8, u8); 5] = [
    (1, 0, 0, 0),
    (0, 1, 1, 0),
    (1, 1, 0, 0),
    (0, 0, 0, 1),
    (1, 0, 1, 0),
];

/// `(date, time, litres)` written once when seeding is enabled.
const SEED_REFILLS: [(&str, &str, f64); 5] = [
    ("15/01/2025", "08:30:00", 25.5),
    ("10/01/2025", "14:15:00", 30.0),
    ("05/01/2025", "09:45:00", 28.7),
    ("28/12/2024", "16:20:00", 32.1),
    ("20/12/2024", "11:10:00", 27.3),
];

fn random_power_status() -> PowerStatus {
    let (pln, genset_135, genset_150, genset_radar) = *SCENARIOS
        .choose(&mut rand::thread_rng())
        .unwrap_or(&SCENARIOS[0]);

    PowerStatus {
        pln,
        genset_135,
        genset_150,
        genset_radar,
        datetime: datetime::format(&datetime::now()),
    }
}

fn random_fuel_level() -> FuelLevel {
    let mut rng = rand::thread_rng();
    let mut level = || f64::from(rng.gen_range(20u8..=95));

    FuelLevel {
        tanks: TankReading::Triple {
            tangki_135kva: level(),
            tangki_150kva: level(),
            tangki_radar: level(),
        },
        datetime: datetime::format(&datetime::now()),
    }
}

fn heartbeat() -> SystemStatus {
    SystemStatus {
        is_online: 1,
        datetime: datetime::format(&datetime::now()),
    }
}

async fn seed_refills(client: &DashboardClient) -> Result<(), Error> {
    for (date, time, amount) in SEED_REFILLS.iter() {
        let refill = FuelRefill {
            date: date.to_string(),
            time: time.to_string(),
            amount: *amount,
            technician: None,
        };
        let id = client.create(&refill).await?;
        log::info!("seeded refill {}: {:?}", id, refill);
    }
    Ok(())
}

fn report<T>(what: &str, result: Result<T, Error>) {
    match result {
        Ok(_) => log::info!("{} sent", what),
        Err(e) => log::error!("sending {} failed: {}", what, e),
    }
}

async fn run(settings: SimulatorSettings) {
    let client = DashboardClient::new(&settings.api_url);
    log::info!("simulating telemetry against {}", settings.api_url);

    if settings.seed_refills {
        report("refill seed", seed_refills(&client).await);
    }

    let mut power = tokio::time::interval(Duration::from_secs(settings.power_interval));
    let mut level = tokio::time::interval(Duration::from_secs(settings.level_interval));
    let mut heartbeat_timer =
        tokio::time::interval(Duration::from_secs(settings.heartbeat_interval));

    loop {
        tokio::select! {
            _ = power.tick() => {
                let status = random_power_status();
                log::debug!("{:?}", status);
                report("power status", client.create(&status).await);
            }
            _ = level.tick() => {
                let reading = random_fuel_level();
                log::debug!("{:?}", reading);
                report("fuel level", client.create(&reading).await);
            }
            _ = heartbeat_timer.tick() => {
                report("heartbeat", client.set_system_status(&heartbeat()).await);
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("stopping simulation");
                break;
            }
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    match settings::read_simulator_settings() {
        Ok(settings) => run(settings).await,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}
