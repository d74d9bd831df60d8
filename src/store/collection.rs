use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::subscription::{self, Registry, Subscription};
use crate::model::{Record, RecordId, Stored};
use crate::{metrics, Error};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkDelete {
    pub deleted: Vec<RecordId>,
    pub failed: Vec<FailedDelete>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedDelete {
    pub id: RecordId,
    pub error: String,
}

/// One record series: an append/edit/delete map of records plus the callbacks
/// watching it.
pub struct Collection<T: Record> {
    records: RwLock<BTreeMap<RecordId, T>>,
    sequence: AtomicU64,
    /// Held from a write until its subscribers are notified.
    publishing: Mutex<()>,
    all: Registry<[Stored<T>]>,
    latest: Registry<Option<Stored<T>>>,
}

impl<T: Record> Default for Collection<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Newest first; records without a usable timestamp sink to the end. Ties
/// keep the most recently created record first.
fn newest_first<T: Record>(a: &Stored<T>, b: &Stored<T>) -> Ordering {
    match (a.record.timestamp(), b.record.timestamp()) {
        (Some(ta), Some(tb)) => tb.cmp(&ta),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| b.id.cmp(&a.id))
}

/// Shallow JSON merge; `null` removes a field, `id` is never patched.
fn merge(mut current: Value, patch: Value) -> Result<Value, Error> {
    let patch = match patch {
        Value::Object(patch) => patch,
        other => return Err(Error::InvalidPatch(format!("expected an object, got {}", other))),
    };
    let fields = current.as_object_mut().ok_or(Error::InternalError)?;

    for (key, value) in patch {
        if key == "id" {
            continue;
        }
        if value.is_null() {
            fields.remove(&key);
        } else {
            fields.insert(key, value);
        }
    }
    Ok(current)
}

/// Keys of `merged` the record did not keep, such as misspelled fields or
/// fields of another tank schema.
fn dropped_keys<T: Record>(merged: &Value, record: &T) -> Result<Vec<String>, Error> {
    let kept: BTreeSet<String> = match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => fields.into_iter().map(|(key, _)| key).collect(),
        _ => return Err(Error::InternalError),
    };
    Ok(merged
        .as_object()
        .map(|fields| {
            fields
                .keys()
                .filter(|key| !kept.contains(*key))
                .cloned()
                .collect()
        })
        .unwrap_or_default())
}

impl<T: Record> Collection<T> {
    pub fn new() -> Self {
        Collection {
            records: RwLock::new(BTreeMap::new()),
            sequence: AtomicU64::new(0),
            publishing: Mutex::new(()),
            all: subscription::registry(),
            latest: subscription::registry(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<RecordId, T>> {
        match self.records.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<RecordId, T>> {
        match self.records.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn publishing(&self) -> MutexGuard<'_, ()> {
        match self.publishing.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Keys sort in creation order.
    fn next_id(&self) -> RecordId {
        let seq = self.sequence.fetch_add(1, AtomicOrdering::SeqCst);
        let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        RecordId(format!("{:011x}{:08x}", millis, seq))
    }

    /// Push every subscriber the state after a write. Latest-record
    /// subscribers get `None` once the series has been emptied.
    fn publish(&self) {
        let records = self.list();
        subscription::notify(&self.all, &records[..]);
        subscription::notify(&self.latest, &records.first().cloned());
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// All records, newest first.
    pub fn list(&self) -> Vec<Stored<T>> {
        let mut records: Vec<Stored<T>> = self
            .read()
            .iter()
            .map(|(id, record)| Stored {
                id: id.clone(),
                record: record.clone(),
            })
            .collect();
        records.sort_by(newest_first);
        records
    }

    /// The record with the most recent timestamp.
    pub fn latest(&self) -> Option<Stored<T>> {
        self.list().into_iter().next()
    }

    pub fn get(&self, id: &RecordId) -> Option<Stored<T>> {
        self.read().get(id).map(|record| Stored {
            id: id.clone(),
            record: record.clone(),
        })
    }

    pub async fn create(&self, record: T) -> Result<RecordId, Error> {
        let record = record.validate()?;
        let id = self.next_id();

        log::debug!("{}: create {} {:?}", T::SERIES, id, record);
        let _publishing = self.publishing();
        self.write().insert(id.clone(), record);
        metrics::record_write(T::SERIES, "create");
        self.publish();

        Ok(id)
    }

    /// Merge `patch` into the stored record and re-validate the result. The
    /// stored record is left untouched when the merged record is invalid or
    /// would silently lose a patched key.
    pub async fn update(&self, id: &RecordId, patch: Value) -> Result<T, Error> {
        let current = self
            .get(id)
            .ok_or_else(|| Error::NotFound(T::SERIES, id.clone()))?;
        let current = serde_json::to_value(&current.record).map_err(|_| Error::InternalError)?;

        let merged = merge(current, patch)?;
        let record: T = serde_json::from_value(merged.clone())
            .map_err(|e| Error::validation(e.to_string()))?;
        let dropped = dropped_keys(&merged, &record)?;
        if !dropped.is_empty() {
            return Err(Error::InvalidPatch(format!(
                "unknown fields for {}: {}",
                T::SERIES,
                dropped.join(", ")
            )));
        }
        let record = record.validate()?;

        let _publishing = self.publishing();
        {
            let mut records = self.write();
            match records.get_mut(id) {
                Some(stored) => *stored = record.clone(),
                None => return Err(Error::NotFound(T::SERIES, id.clone())),
            }
        }
        log::debug!("{}: update {} {:?}", T::SERIES, id, record);
        metrics::record_write(T::SERIES, "update");
        self.publish();

        Ok(record)
    }

    pub async fn delete(&self, id: &RecordId) -> Result<(), Error> {
        let _publishing = self.publishing();
        if self.write().remove(id).is_none() {
            return Err(Error::NotFound(T::SERIES, id.clone()));
        }
        log::debug!("{}: delete {}", T::SERIES, id);
        metrics::record_write(T::SERIES, "delete");
        self.publish();

        Ok(())
    }

    /// Delete every id independently and concurrently. Successful deletes are
    /// kept even when others fail.
    pub async fn delete_many(&self, ids: &[RecordId]) -> BulkDelete {
        let results = join_all(ids.iter().map(|id| self.delete(id))).await;

        let mut report = BulkDelete::default();
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(()) => report.deleted.push(id.clone()),
                Err(e) => {
                    log::warn!("{}: bulk delete of {} failed: {}", T::SERIES, id, e);
                    report.failed.push(FailedDelete {
                        id: id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        report
    }

    /// Watch the whole series. Fires immediately with the current records and
    /// after every write, newest first.
    pub fn subscribe_all<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[Stored<T>]) + Send + Sync + 'static,
    {
        let callback: Arc<dyn Fn(&[Stored<T>]) + Send + Sync> = Arc::new(callback);
        let subscription = subscription::register(&self.all, callback.clone());
        callback(&self.list()[..]);
        subscription
    }

    /// Watch the most recent record. Fires immediately unless the series is
    /// empty, then after every write; `None` means the last record was deleted.
    pub fn subscribe_latest<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&Stored<T>>) + Send + Sync + 'static,
    {
        let callback: Arc<dyn Fn(Option<&Stored<T>>) + Send + Sync> = Arc::new(callback);
        let forward = callback.clone();
        let subscription = subscription::register(
            &self.latest,
            Arc::new(move |latest: &Option<Stored<T>>| forward(latest.as_ref())),
        );
        if let Some(latest) = self.latest() {
            callback(Some(&latest));
        }
        subscription
    }

    pub fn subscriber_count(&self) -> usize {
        subscription::count(&self.all) + subscription::count(&self.latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FuelLevel, FuelRefill, PowerStatus, TankReading};
    use serde_json::json;
    use std::sync::Mutex;

    fn power(pln: u8, datetime: &str) -> PowerStatus {
        PowerStatus {
            pln,
            genset_135: 0,
            genset_150: 0,
            genset_radar: 0,
            datetime: datetime.to_string(),
        }
    }

    #[tokio::test]
    async fn list_is_sorted_by_parsed_timestamp() {
        let collection: Collection<PowerStatus> = Collection::new();
        collection.create(power(1, "02/01/2025 00:00:00")).await.unwrap();
        collection.create(power(1, "31/12/2024 23:59:59")).await.unwrap();
        let newest = collection.create(power(0, "10/01/2025 08:00:00")).await.unwrap();

        let dates: Vec<String> = collection
            .list()
            .into_iter()
            .map(|s| s.record.datetime)
            .collect();
        assert_eq!(
            dates,
            vec![
                "10/01/2025 08:00:00",
                "02/01/2025 00:00:00",
                "31/12/2024 23:59:59"
            ]
        );
        assert_eq!(collection.latest().unwrap().id, newest);
    }

    #[tokio::test]
    async fn invalid_records_are_not_written() {
        let collection: Collection<PowerStatus> = Collection::new();
        let result = collection.create(power(1, "tomorrow")).await;
        assert!(matches!(result, Err(Error::Datetime(_))));
        assert!(collection.is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_every_write_until_dropped() {
        let collection: Collection<PowerStatus> = Collection::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let subscription = collection.subscribe_all(move |records: &[Stored<PowerStatus>]| {
            sink.lock().unwrap().push(records.len());
        });
        assert_eq!(*seen.lock().unwrap(), vec![0]);

        collection.create(power(1, "01/01/2025 00:00:00")).await.unwrap();
        collection.create(power(1, "01/01/2025 00:00:01")).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(collection.subscriber_count(), 1);

        drop(subscription);
        assert_eq!(collection.subscriber_count(), 0);
        collection.create(power(1, "01/01/2025 00:00:02")).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn latest_subscription_follows_deletes() {
        let collection: Collection<PowerStatus> = Collection::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let subscription =
            collection.subscribe_latest(move |latest: Option<&Stored<PowerStatus>>| {
                let datetime = latest.map(|l| l.record.datetime.clone());
                sink.lock().unwrap().push(datetime);
            });
        assert!(seen.lock().unwrap().is_empty());

        let newest = collection.create(power(1, "05/01/2025 00:00:00")).await.unwrap();
        let older = collection.create(power(0, "04/01/2025 00:00:00")).await.unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Some("05/01/2025 00:00:00".to_string()),
                Some("05/01/2025 00:00:00".to_string())
            ]
        );

        collection.delete(&newest).await.unwrap();
        collection.delete(&older).await.unwrap();
        assert_eq!(
            seen.lock().unwrap()[2..],
            [Some("04/01/2025 00:00:00".to_string()), None]
        );
        subscription.unsubscribe();
        assert_eq!(collection.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn update_merges_and_revalidates() {
        let collection: Collection<FuelRefill> = Collection::new();
        let id = collection
            .create(FuelRefill {
                date: "10/05/2025".to_string(),
                time: "08:00:00".to_string(),
                amount: 100.0,
                technician: None,
            })
            .await
            .unwrap();

        let updated = collection
            .update(&id, json!({"amount": "120,5", "technician": "Sari"}))
            .await
            .unwrap();
        assert_eq!(updated.amount, 120.5);
        assert_eq!(updated.technician.as_deref(), Some("Sari"));

        let rejected = collection.update(&id, json!({"amount": "-1"})).await;
        assert!(matches!(rejected, Err(Error::Validation(_))));
        assert_eq!(collection.get(&id).unwrap().record.amount, 120.5);

        let not_object = collection.update(&id, json!([1, 2])).await;
        assert!(matches!(not_object, Err(Error::InvalidPatch(_))));

        let missing = collection.update(&RecordId::from("nope"), json!({})).await;
        assert!(matches!(missing, Err(Error::NotFound(_, _))));
    }

    #[tokio::test]
    async fn patch_keys_the_record_would_drop_are_rejected() {
        let collection: Collection<FuelRefill> = Collection::new();
        let id = collection
            .create(FuelRefill {
                date: "10/05/2025".to_string(),
                time: "08:00:00".to_string(),
                amount: 100.0,
                technician: None,
            })
            .await
            .unwrap();

        let typo = collection.update(&id, json!({"amout": 5})).await;
        assert!(matches!(typo, Err(Error::InvalidPatch(_))));
        assert_eq!(collection.get(&id).unwrap().record.amount, 100.0);
    }

    #[tokio::test]
    async fn level_patch_cannot_silently_switch_schema() {
        let collection: Collection<FuelLevel> = Collection::new();
        let id = collection
            .create(FuelLevel {
                tanks: TankReading::Triple {
                    tangki_135kva: 80.0,
                    tangki_150kva: 80.0,
                    tangki_radar: 80.0,
                },
                datetime: "10/05/2025 15:30:00".to_string(),
            })
            .await
            .unwrap();

        let ignored = collection.update(&id, json!({"level": 10})).await;
        assert!(matches!(ignored, Err(Error::InvalidPatch(_))));

        let switched = collection
            .update(
                &id,
                json!({
                    "level": 10,
                    "tangki_135kva": null,
                    "tangki_150kva": null,
                    "tangki_radar": null
                }),
            )
            .await
            .unwrap();
        assert_eq!(switched.tanks, TankReading::Single { level: 10.0 });
    }

    #[tokio::test]
    async fn bulk_delete_keeps_partial_success() {
        let collection: Collection<PowerStatus> = Collection::new();
        let a = collection.create(power(1, "01/01/2025 00:00:00")).await.unwrap();
        let b = collection.create(power(1, "01/01/2025 00:00:01")).await.unwrap();
        let ghost = RecordId::from("ghost");

        let report = collection
            .delete_many(&[a.clone(), ghost.clone(), b.clone()])
            .await;
        assert_eq!(report.deleted, vec![a, b]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id, ghost);
        assert!(collection.is_empty());
    }
}
