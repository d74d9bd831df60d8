//! HTTP surface of the dashboard service.

pub mod endpoint;
pub mod error;

use rocket::fairing::AdHoc;
use rocket::http::{ContentType, Status};
use rocket::request::{FromParam, Request};
use rocket::response::{self, status, Responder, Response};
use rocket::serde::json::Json;
use rocket::{Build, Rocket, State};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use std::io::Cursor;
use std::sync::Arc;

use crate::dashboard::{Dashboard, FuelView, PowerView, SiteView, Snapshot};
use crate::model::{RecordId, Series, Stored, SystemStatus};
use crate::settings::Settings;
use crate::staleness::SiteMonitor;
use crate::store::{with_series, BulkDelete, MemoryStore};
use crate::{datetime, export, filter, metrics, Error};

/// Structure containing state for API handlers.
pub struct StateData {
    store: Arc<MemoryStore>,
    dashboard: Dashboard,
}

impl<'a> FromParam<'a> for Series {
    type Error = &'a str;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse().or(Err(param))
    }
}

/// Request bodies are taken as raw JSON so that shape errors are reported
/// like any other validation failure.
fn from_body<T: DeserializeOwned>(body: Value) -> Result<T, Error> {
    serde_json::from_value(body).map_err(|e| Error::validation(e.to_string()))
}

fn to_json<T: Serialize>(value: &T) -> Result<Json<Value>, Error> {
    serde_json::to_value(value)
        .map(Json)
        .or(Err(Error::FormatError))
}

pub struct CsvFile {
    filename: String,
    body: String,
}

impl<'r> Responder<'r, 'static> for CsvFile {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        Response::build()
            .header(ContentType::CSV)
            .raw_header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", self.filename),
            )
            .sized_body(self.body.len(), Cursor::new(self.body))
            .ok()
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<RecordId>,
}

#[get("/dashboard")]
fn dashboard_route(state: &State<StateData>) -> Json<Snapshot> {
    Json(state.dashboard.snapshot())
}

#[get("/system_status")]
fn system_status_route(state: &State<StateData>) -> Json<SiteView> {
    Json(state.dashboard.refresh_site(datetime::now()))
}

#[put("/system_status", data = "<body>")]
async fn put_system_status_route(
    body: Json<Value>,
    state: &State<StateData>,
) -> Result<Json<SiteView>, Error> {
    let status: SystemStatus = from_body(body.into_inner())?;
    state.store.set_system_status(status).await?;
    Ok(Json(state.dashboard.site()))
}

#[get("/records/<series>?<days>")]
fn list_route(
    series: Series,
    days: Option<u32>,
    state: &State<StateData>,
) -> Result<Json<Value>, Error> {
    let now = datetime::now();
    with_series!(state.store, series, |collection| {
        to_json(&filter::within_days(collection.list(), days, now))
    })
}

#[get("/records/<series>/export?<days>")]
fn export_route(
    series: Series,
    days: Option<u32>,
    state: &State<StateData>,
) -> Result<CsvFile, Error> {
    let now = datetime::now();
    let body = with_series!(state.store, series, |collection| {
        export::to_csv(&filter::within_days(collection.list(), days, now))
    })?;

    Ok(CsvFile {
        filename: export::filename(series, days, now),
        body,
    })
}

/// A single record; power and fuel records also carry their derived view.
#[get("/records/<series>/<id>", rank = 2)]
fn detail_route(
    series: Series,
    id: String,
    state: &State<StateData>,
) -> Result<Json<Value>, Error> {
    let id = RecordId(id);
    let not_found = || Error::NotFound(series, id.clone());

    let detail = match series {
        Series::Status => {
            let stored = state.store.status.get(&id).ok_or_else(not_found)?;
            json!({ "record": stored, "view": PowerView::new(&stored) })
        }
        Series::Level => {
            let stored = state.store.level.get(&id).ok_or_else(not_found)?;
            json!({ "record": stored, "view": FuelView::new(&stored) })
        }
        _ => with_series!(state.store, series, |collection| {
            json!({ "record": collection.get(&id).ok_or_else(not_found)? })
        }),
    };
    Ok(Json(detail))
}

#[post("/records/<series>", data = "<body>")]
async fn create_route(
    series: Series,
    body: Json<Value>,
    state: &State<StateData>,
) -> Result<status::Created<Json<Value>>, Error> {
    let id = with_series!(state.store, series, |collection| {
        collection.create(from_body(body.into_inner())?).await?
    });
    log::info!("{}: created {}", series, id);

    let location = format!("{}/{}", endpoint::records(series), id);
    Ok(status::Created::new(location).body(Json(json!({ "id": id }))))
}

#[patch("/records/<series>/<id>", data = "<patch>")]
async fn update_route(
    series: Series,
    id: String,
    patch: Json<Value>,
    state: &State<StateData>,
) -> Result<Json<Value>, Error> {
    let id = RecordId(id);
    with_series!(state.store, series, |collection| {
        let record = collection.update(&id, patch.into_inner()).await?;
        to_json(&Stored {
            id: id.clone(),
            record,
        })
    })
}

#[delete("/records/<series>/<id>")]
async fn delete_route(
    series: Series,
    id: String,
    state: &State<StateData>,
) -> Result<status::NoContent, Error> {
    let id = RecordId(id);
    with_series!(state.store, series, |collection| {
        collection.delete(&id).await?
    });
    log::info!("{}: deleted {}", series, id);
    Ok(status::NoContent)
}

#[post("/records/<series>/delete", data = "<request>")]
async fn delete_many_route(
    series: Series,
    request: Json<BulkDeleteRequest>,
    state: &State<StateData>,
) -> (Status, Json<BulkDelete>) {
    let report = with_series!(state.store, series, |collection| {
        collection.delete_many(&request.ids).await
    });
    log::info!(
        "{}: bulk delete, {} deleted, {} failed",
        series,
        report.deleted.len(),
        report.failed.len()
    );

    let status = if report.failed.is_empty() {
        Status::Ok
    } else {
        Status::MultiStatus
    };
    (status, Json(report))
}

#[get("/metrics")]
fn metrics_route() -> Result<String, Error> {
    metrics::read()
}

/// Assemble the service around `store`. Liveness re-checks start on liftoff.
pub fn build(settings: &Settings, store: Arc<MemoryStore>) -> Rocket<Build> {
    let monitor = Arc::new(SiteMonitor::new(settings.stale_after()));
    let dashboard = Dashboard::attach(&store, monitor.clone());
    let recheck_interval = settings.recheck_interval();

    rocket::build()
        .manage(StateData { store, dashboard })
        .attach(AdHoc::on_liftoff("Site monitor", move |_| {
            Box::pin(async move {
                log::info!("re-checking site liveness every {:?}", recheck_interval);
                monitor.spawn(recheck_interval);
            })
        }))
        .mount(
            "/",
            routes![
                dashboard_route,
                system_status_route,
                put_system_status_route,
                list_route,
                export_route,
                detail_route,
                create_route,
                update_route,
                delete_route,
                delete_many_route,
                metrics_route,
            ],
        )
}
