//! HTTP client for the dashboard API, used by the simulator and by entry
//! forms running outside the service.

use reqwest::Response;
use serde::Serialize;
use serde_json::Value;

use std::sync::atomic::{AtomicBool, Ordering};

use crate::api::endpoint;
use crate::model::{Record, RecordId, Stored, SystemStatus};
use crate::Error;

/// Map transport-level failure to Error
fn map_api_err(error: reqwest::Error) -> Error {
    match error.status() {
        Some(status) => map_status(status, error.to_string()),
        None => Error::ApiError(error.to_string()),
    }
}

/// Map a non-2xx status of the dashboard API back to the error it was raised from.
fn map_status(status: http::StatusCode, message: String) -> Error {
    match status {
        http::StatusCode::UNPROCESSABLE_ENTITY => Error::Validation(message),
        http::StatusCode::CONFLICT => Error::AlreadySubmitting,
        _ => Error::ApiError(format!("{}: {}", status, message)),
    }
}

/// Error bodies look like `{"error": "..."}`; anything else is passed through.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.to_string())
}

async fn read_json(response: Response) -> Result<Value, Error> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| Error::ApiError(format!("Error reading API response: {}", e)))?;

    if !status.is_success() {
        return Err(map_status(status, error_message(&text)));
    }
    if text.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str::<Value>(&text).map_err(|e| Error::InvalidResponse(text, e.to_string()))
}

/// Clears the in-flight flag however the submission ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct DashboardClient {
    api_url: String,
    client: reqwest::Client,
    submitting: AtomicBool,
}

impl DashboardClient {
    pub fn new(api_url: &str) -> Self {
        DashboardClient {
            api_url: api_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            submitting: AtomicBool::new(false),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn send<B: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Value, Error> {
        let request = self.client.request(method.clone(), self.url(path));
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };

        let value = read_json(request.send().await.map_err(map_api_err)?).await?;
        log::trace!("{} {}: {}", method, path, value);
        Ok(value)
    }

    /// Append a record to its series and return the id assigned by the service.
    pub async fn create<T: Record>(&self, record: &T) -> Result<RecordId, Error> {
        let path = endpoint::records(T::SERIES);
        let response = self.send(reqwest::Method::POST, &path, Some(record)).await?;

        serde_json::from_value::<RecordId>(response["id"].clone())
            .map_err(|e| Error::InvalidResponse(response.to_string(), e.to_string()))
    }

    /// Submit an entry form. A second submission while one is in flight is
    /// rejected; on failure the caller still owns the form and may retry.
    pub async fn submit<T: Record>(&self, form: &T) -> Result<RecordId, Error> {
        if self.submitting.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadySubmitting);
        }
        let _in_flight = InFlight(&self.submitting);

        let form = form.clone().validate()?;
        self.create(&form).await
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    pub async fn list<T: Record>(&self, days: Option<u32>) -> Result<Vec<Stored<T>>, Error> {
        let mut path = endpoint::records(T::SERIES);
        if let Some(days) = days {
            path = format!("{}?days={}", path, days);
        }
        let response = self
            .send::<()>(reqwest::Method::GET, &path, None)
            .await?;

        serde_json::from_value(response.clone())
            .map_err(|e| Error::InvalidResponse(response.to_string(), e.to_string()))
    }

    /// Overwrite the site heartbeat.
    pub async fn set_system_status(&self, status: &SystemStatus) -> Result<(), Error> {
        self.send(reqwest::Method::PUT, endpoint::SYSTEM_STATUS, Some(status))
            .await
            .map(|_| ())
    }

    pub async fn dashboard(&self) -> Result<Value, Error> {
        self.send::<()>(reqwest::Method::GET, endpoint::DASHBOARD, None)
            .await
    }
}
