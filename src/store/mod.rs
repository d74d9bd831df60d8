//! In-process record store with push-style subscriptions.
//!
//! Every series is an independent [`Collection`]; the site heartbeat is a
//! single non-historized [`Singleton`]. Writes are last-write-wins and
//! subscribers are notified after each write.

mod collection;
mod subscription;

pub use collection::{BulkDelete, Collection, FailedDelete};
pub use subscription::Subscription;

use std::sync::{Arc, Mutex, RwLock};

use crate::model::{
    BatteryReplacement, FuelLevel, FuelRefill, Maintenance, PowerStatus, Series, SystemStatus,
};
use crate::{metrics, Error};
use subscription::Registry;

/// Run `$body` with `$collection` bound to the collection of `$series`.
macro_rules! with_series {
    ($store:expr, $series:expr, |$collection:ident| $body:expr) => {
        match $series {
            $crate::model::Series::Status => {
                let $collection = &$store.status;
                $body
            }
            $crate::model::Series::Level => {
                let $collection = &$store.level;
                $body
            }
            $crate::model::Series::Fuel => {
                let $collection = &$store.fuel;
                $body
            }
            $crate::model::Series::Battery => {
                let $collection = &$store.battery;
                $body
            }
            $crate::model::Series::Maintenance => {
                let $collection = &$store.maintenance;
                $body
            }
        }
    };
}
pub(crate) use with_series;

/// A single value that is overwritten rather than appended to.
pub struct Singleton<T> {
    value: RwLock<Option<T>>,
    /// Serializes `set` so listeners see values in write order.
    publishing: Mutex<()>,
    listeners: Registry<T>,
}

impl<T: Clone + Send + Sync + 'static> Default for Singleton<T> {
    fn default() -> Self {
        Singleton {
            value: RwLock::new(None),
            publishing: Mutex::new(()),
            listeners: subscription::registry(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Singleton<T> {
    pub fn get(&self) -> Option<T> {
        match self.value.read() {
            Ok(value) => value.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub async fn set(&self, value: T) {
        let _publishing = match self.publishing.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match self.value.write() {
            Ok(mut slot) => *slot = Some(value.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(value.clone()),
        }
        subscription::notify(&self.listeners, &value);
    }

    /// Fires immediately if a value is present, then on every `set`.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let callback: Arc<dyn Fn(&T) + Send + Sync> = Arc::new(callback);
        let subscription = subscription::register(&self.listeners, callback.clone());
        if let Some(value) = self.get() {
            callback(&value);
        }
        subscription
    }

    pub fn subscriber_count(&self) -> usize {
        subscription::count(&self.listeners)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub status: Collection<PowerStatus>,
    pub level: Collection<FuelLevel>,
    pub fuel: Collection<FuelRefill>,
    pub battery: Collection<BatteryReplacement>,
    pub maintenance: Collection<Maintenance>,
    system_status: Singleton<SystemStatus>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system_status(&self) -> &Singleton<SystemStatus> {
        &self.system_status
    }

    /// Overwrite the site heartbeat.
    pub async fn set_system_status(&self, status: SystemStatus) -> Result<(), Error> {
        let status = status.validate()?;
        self.system_status.set(status).await;
        metrics::record_write_raw("system_status", "set");
        Ok(())
    }

    pub fn len(&self, series: Series) -> usize {
        with_series!(self, series, |collection| collection.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn system_status_is_overwritten_and_pushed() {
        let store = MemoryStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let subscription = store
            .system_status()
            .subscribe(move |status: &SystemStatus| sink.lock().unwrap().push(status.clone()));
        assert!(seen.lock().unwrap().is_empty());

        for second in 0..3 {
            store
                .set_system_status(SystemStatus {
                    is_online: 1,
                    datetime: format!("10/05/2025 15:30:0{}", second),
                })
                .await
                .unwrap();
        }
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(
            store.system_status().get().unwrap().datetime,
            "10/05/2025 15:30:02"
        );

        drop(subscription);
        assert_eq!(store.system_status().subscriber_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_sets_notify_in_write_order() {
        let singleton: Arc<Singleton<u32>> = Arc::new(Singleton::default());
        let last_seen = Arc::new(Mutex::new(None));

        let sink = last_seen.clone();
        let _subscription = singleton.subscribe(move |value: &u32| {
            *sink.lock().unwrap() = Some(*value);
        });

        let writers: Vec<_> = (0..64u32)
            .map(|value| {
                let singleton = singleton.clone();
                tokio::spawn(async move { singleton.set(value).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        assert_eq!(*last_seen.lock().unwrap(), singleton.get());
    }

    #[tokio::test]
    async fn invalid_heartbeat_is_rejected() {
        let store = MemoryStore::new();
        let result = store
            .set_system_status(SystemStatus {
                is_online: 3,
                datetime: "10/05/2025 15:30:00".to_string(),
            })
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(store.system_status().get(), None);
    }

    #[tokio::test]
    async fn series_are_independent() {
        let store = MemoryStore::new();
        store
            .maintenance
            .create(Maintenance {
                date: "10/05/2025".to_string(),
                time: "09:00".to_string(),
                note: "Servis genset 150kVA".to_string(),
                technician: Some("Andi".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(store.len(Series::Maintenance), 1);
        for series in [Series::Status, Series::Level, Series::Fuel, Series::Battery].iter() {
            assert_eq!(store.len(*series), 0);
        }
    }
}
