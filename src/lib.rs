#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate prometheus;
#[macro_use]
extern crate rocket;

pub mod api;
pub mod client;
pub mod dashboard;
pub mod datetime;
mod error;
pub mod export;
pub mod filter;
pub mod fuel;
pub mod metrics;
pub mod model;
pub mod power;
pub mod settings;
pub mod staleness;
pub mod store;

pub use error::Error;
