#[macro_use]
extern crate rocket;

use powerguard_rs::settings;
use powerguard_rs::store::MemoryStore;
use rocket::{Build, Rocket};

use std::sync::Arc;

#[launch]
fn rocket() -> Rocket<Build> {
    env_logger::init();

    let settings = settings::read_settings().unwrap_or_else(|e| {
        log::error!("{}", e);
        std::process::exit(1)
    });
    log::info!("starting with {:?}", settings);

    powerguard_rs::api::build(&settings, Arc::new(MemoryStore::new()))
}
