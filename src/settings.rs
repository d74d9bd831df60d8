use config::Config;
use serde::Deserialize;

use crate::staleness::STALE_AFTER_SECS;
use crate::Error;

const ENV_PREFIX: &str = "PG";
const API_URL: &str = "http://127.0.0.1:8000";

const RECHECK_INTERVAL_MS: u64 = 1000;
const POWER_INTERVAL: u64 = 10;
const LEVEL_INTERVAL: u64 = 30;
const HEARTBEAT_INTERVAL: u64 = 5;

/// Largest value `chrono::Duration::seconds` accepts.
const MAX_SECS: i64 = i64::MAX / 1000;

/// Dashboard service settings, read from `PG_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Heartbeat age after which the site counts as offline.
    pub stale_after_secs: u64,
    /// How often liveness is re-evaluated without a new heartbeat.
    pub recheck_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            stale_after_secs: STALE_AFTER_SECS as u64,
            recheck_interval_ms: RECHECK_INTERVAL_MS,
        }
    }
}

fn non_zero(name: &str, value: u64) -> Result<(), Error> {
    if value == 0 {
        Err(Error::Config(format!("{} must be greater than zero", name)))
    } else {
        Ok(())
    }
}

impl Settings {
    /// Reject values the monitor cannot run with.
    pub fn check(self) -> Result<Self, Error> {
        non_zero("recheck_interval_ms", self.recheck_interval_ms)?;
        match i64::try_from(self.stale_after_secs) {
            Ok(secs) if secs <= MAX_SECS => Ok(self),
            _ => Err(Error::Config(format!(
                "stale_after_secs must not exceed {}",
                MAX_SECS
            ))),
        }
    }

    pub fn stale_after(&self) -> chrono::Duration {
        let secs = i64::try_from(self.stale_after_secs).unwrap_or(MAX_SECS);
        chrono::Duration::seconds(secs.min(MAX_SECS))
    }

    pub fn recheck_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.recheck_interval_ms)
    }
}

/// Settings of the telemetry simulator.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorSettings {
    pub api_url: String,
    pub power_interval: u64,
    pub level_interval: u64,
    pub heartbeat_interval: u64,
    /// Seed a handful of refill entries on start-up.
    pub seed_refills: bool,
}

impl SimulatorSettings {
    pub fn check(self) -> Result<Self, Error> {
        non_zero("power_interval", self.power_interval)?;
        non_zero("level_interval", self.level_interval)?;
        non_zero("heartbeat_interval", self.heartbeat_interval)?;
        Ok(self)
    }
}

fn service_defaults() -> Result<Config, Error> {
    let mut settings = Config::default();
    settings
        .set_default("stale_after_secs", STALE_AFTER_SECS)?
        .set_default("recheck_interval_ms", RECHECK_INTERVAL_MS as i64)?;
    Ok(settings)
}

fn service_settings(settings: Config) -> Result<Settings, Error> {
    let settings: Settings = settings.try_into()?;
    settings.check()
}

/// Fails on malformed or out-of-range values instead of falling back.
pub fn read_settings() -> Result<Settings, Error> {
    let mut settings = service_defaults()?;
    settings.merge(config::Environment::with_prefix(ENV_PREFIX))?;
    service_settings(settings)
}

pub fn read_simulator_settings() -> Result<SimulatorSettings, Error> {
    let mut settings = Config::default();
    settings
        .set_default("api_url", API_URL)?
        .set_default("power_interval", POWER_INTERVAL as i64)?
        .set_default("level_interval", LEVEL_INTERVAL as i64)?
        .set_default("heartbeat_interval", HEARTBEAT_INTERVAL as i64)?
        .set_default("seed_refills", false)?
        .merge(config::Environment::with_prefix(ENV_PREFIX))?;

    let settings: SimulatorSettings = settings.try_into()?;
    settings.check()
}
