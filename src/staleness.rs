//! Online/offline detection for the monitored site, based on how old its last
//! heartbeat is.

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use tokio::task::JoinHandle;

use std::sync::{Arc, Mutex, MutexGuard};

use crate::model::SystemStatus;
use crate::{datetime, metrics};

pub const STALE_AFTER_SECS: i64 = 30;

const MIN_RECHECK_PERIOD: std::time::Duration = std::time::Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Liveness {
    /// No heartbeat received yet.
    Unknown,
    Online,
    Offline,
}

/// Decide whether the site is alive at `now`.
///
/// A heartbeat counts while it is at most `stale_after` old. A heartbeat that
/// reports `isOnline = 0` or carries an unparseable timestamp means offline.
pub fn evaluate(
    last: Option<&SystemStatus>,
    now: NaiveDateTime,
    stale_after: Duration,
) -> Liveness {
    let status = match last {
        Some(status) => status,
        None => return Liveness::Unknown,
    };

    if status.is_online == 0 {
        return Liveness::Offline;
    }

    match datetime::timestamp(&status.datetime) {
        Some(ts) if now - ts <= stale_after => Liveness::Online,
        Some(_) => Liveness::Offline,
        None => {
            log::warn!("Unparseable heartbeat datetime: {:?}", status.datetime);
            Liveness::Offline
        }
    }
}

#[derive(Debug)]
struct MonitorState {
    last: Option<SystemStatus>,
    liveness: Liveness,
}

/// Holds the latest heartbeat and keeps re-evaluating it, so that a site that
/// goes silent flips to offline without any new message arriving.
#[derive(Debug)]
pub struct SiteMonitor {
    stale_after: Duration,
    state: Mutex<MonitorState>,
}

impl SiteMonitor {
    pub fn new(stale_after: Duration) -> Self {
        SiteMonitor {
            stale_after,
            state: Mutex::new(MonitorState {
                last: None,
                liveness: Liveness::Unknown,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MonitorState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Record a new heartbeat and evaluate it right away.
    pub fn observe(&self, status: SystemStatus, now: NaiveDateTime) -> Liveness {
        log::debug!("heartbeat received: {:?}", status);
        let mut state = self.state();
        state.last = Some(status);
        self.update(&mut state, now)
    }

    /// Re-evaluate the last heartbeat against `now`.
    pub fn tick(&self, now: NaiveDateTime) -> Liveness {
        let mut state = self.state();
        self.update(&mut state, now)
    }

    fn update(&self, state: &mut MonitorState, now: NaiveDateTime) -> Liveness {
        let liveness = evaluate(state.last.as_ref(), now, self.stale_after);
        if liveness != state.liveness {
            match liveness {
                Liveness::Offline => log::warn!(
                    "site went offline, last heartbeat {:?}",
                    state.last.as_ref().map(|s| s.datetime.as_str())
                ),
                _ => log::info!("site is now {:?}", liveness),
            }
            state.liveness = liveness;
        }
        metrics::set_liveness(liveness);
        liveness
    }

    pub fn liveness(&self) -> Liveness {
        self.state().liveness
    }

    pub fn last_heartbeat(&self) -> Option<SystemStatus> {
        self.state().last.clone()
    }

    /// Re-check every `period` (at least one millisecond) until the returned
    /// task is aborted.
    pub fn spawn(self: Arc<Self>, period: std::time::Duration) -> JoinHandle<()> {
        let period = period.max(MIN_RECHECK_PERIOD);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                self.tick(datetime::now());
            }
        })
    }
}
