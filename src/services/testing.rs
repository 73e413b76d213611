//! In-memory collaborators for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use super::incident_cache::{CacheError, CacheStore};
use super::queue::{QueueError, QueueStore};
use super::webhook::{DeliveryError, WebhookSink};
use crate::db::{CheckHistory, IncidentRepository, IncidentSource};
use crate::error::AppError;
use crate::models::incident::{Incident, IncidentInput};
use crate::models::location::NewLocationCheck;
use crate::models::webhook::Payload;

pub fn incident(id: i64, latitude: f64, longitude: f64, danger_radius_m: i32) -> Incident {
    let ts = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
    Incident {
        id,
        title: format!("Incident {id}"),
        description: (id % 2 == 0).then(|| format!("Details for {id}")),
        latitude,
        longitude,
        danger_radius_m,
        is_active: true,
        created_at: ts,
        updated_at: ts,
    }
}

/// Incident source returning a fixed set and counting calls.
pub struct StaticIncidentSource {
    incidents: Vec<Incident>,
    calls: AtomicUsize,
    fail: bool,
}

impl StaticIncidentSource {
    pub fn new(incidents: Vec<Incident>) -> Self {
        Self {
            incidents,
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IncidentSource for StaticIncidentSource {
    async fn list_active(&self) -> Result<Vec<Incident>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AppError::Internal("connection refused".to_string()));
        }
        Ok(self.incidents.clone())
    }
}

/// Mutable incident table that counts `list_active` reads.
#[derive(Default)]
pub struct MemoryIncidentRepository {
    rows: Mutex<Vec<Incident>>,
    active_reads: AtomicUsize,
}

impl MemoryIncidentRepository {
    pub fn active_reads(&self) -> usize {
        self.active_reads.load(Ordering::SeqCst)
    }

    fn not_found(id: i64) -> AppError {
        AppError::NotFound(format!("incident {id} not found"))
    }
}

#[async_trait]
impl IncidentSource for MemoryIncidentRepository {
    async fn list_active(&self) -> Result<Vec<Incident>, AppError> {
        self.active_reads.fetch_add(1, Ordering::SeqCst);
        let mut active: Vec<Incident> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(active)
    }
}

#[async_trait]
impl IncidentRepository for MemoryIncidentRepository {
    async fn create(&self, input: &IncidentInput) -> Result<Incident, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let mut created = incident(
            rows.len() as i64 + 1,
            input.latitude,
            input.longitude,
            input.danger_radius_m,
        );
        created.title = input.title.clone();
        created.description = input.description.clone();
        created.is_active = input.is_active;
        rows.push(created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> Result<Incident, AppError> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn list(
        &self,
        limit: i64,
        offset: i64,
        only_active: bool,
    ) -> Result<(Vec<Incident>, i64), AppError> {
        let rows: Vec<Incident> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|i| !only_active || i.is_active)
            .cloned()
            .collect();
        let total = rows.len() as i64;
        let page = rows
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn update(&self, id: i64, input: &IncidentInput) -> Result<Incident, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| Self::not_found(id))?;
        row.title = input.title.clone();
        row.description = input.description.clone();
        row.latitude = input.latitude;
        row.longitude = input.longitude;
        row.danger_radius_m = input.danger_radius_m;
        row.is_active = input.is_active;
        Ok(row.clone())
    }

    async fn deactivate(&self, id: i64) -> Result<Incident, AppError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|i| i.id == id && i.is_active)
            .ok_or_else(|| Self::not_found(id))?;
        row.is_active = false;
        Ok(row.clone())
    }
}

#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, String>>,
    reads: AtomicUsize,
    deletes: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryCacheStore {
    pub fn put(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.raw(key))
    }

    async fn set_ex(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), CacheError> {
        self.check()?;
        self.put(key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCheckHistory {
    saved: Mutex<Vec<NewLocationCheck>>,
    fail: AtomicBool,
}

impl MemoryCheckHistory {
    pub fn saved(&self) -> Vec<NewLocationCheck> {
        self.saved.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CheckHistory for MemoryCheckHistory {
    async fn save(&self, check: &NewLocationCheck) -> Result<i64, AppError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Internal("insert failed".to_string()));
        }
        let mut saved = self.saved.lock().unwrap();
        saved.push(check.clone());
        Ok(saved.len() as i64)
    }

    async fn count_unique_users_since(&self, _since: DateTime<Utc>) -> Result<i64, AppError> {
        let saved = self.saved.lock().unwrap();
        let mut users: Vec<&str> = saved.iter().map(|c| c.user_id.as_str()).collect();
        users.sort_unstable();
        users.dedup();
        Ok(users.len() as i64)
    }
}

/// Queue store with a ready list, a due-time ordered delayed set and a dead-letter list.
#[derive(Default)]
pub struct MemoryQueueStore {
    ready: Mutex<VecDeque<String>>,
    delayed: Mutex<Vec<(Instant, String)>>,
    dead: Mutex<Vec<String>>,
    schedule_fails: AtomicBool,
    writes_fail: AtomicBool,
}

impl MemoryQueueStore {
    pub fn ready(&self) -> Vec<String> {
        self.ready.lock().unwrap().iter().cloned().collect()
    }

    pub fn delayed(&self) -> usize {
        self.delayed.lock().unwrap().len()
    }

    pub fn dead(&self) -> Vec<String> {
        self.dead.lock().unwrap().clone()
    }

    /// Makes `schedule` fail with a Redis I/O error.
    pub fn set_schedule_failing(&self, fail: bool) {
        self.schedule_fails.store(fail, Ordering::SeqCst);
    }

    /// Makes `push` and `dead_letter` fail with a Redis I/O error.
    pub fn set_writes_failing(&self, fail: bool) {
        self.writes_fail.store(fail, Ordering::SeqCst);
    }
}

fn store_fault(flag: &AtomicBool) -> Result<(), QueueError> {
    if flag.load(Ordering::SeqCst) {
        return Err(QueueError::Redis(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection reset",
        ))));
    }
    Ok(())
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn push(&self, item: &str) -> Result<(), QueueError> {
        store_fault(&self.writes_fail)?;
        self.ready.lock().unwrap().push_back(item.to_string());
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<String>, QueueError> {
        let next = self.ready.lock().unwrap().pop_front();
        if next.is_some() {
            return Ok(next);
        }
        tokio::time::sleep(timeout).await;
        Ok(self.ready.lock().unwrap().pop_front())
    }

    async fn schedule(&self, item: &str, delay: Duration) -> Result<(), QueueError> {
        store_fault(&self.schedule_fails)?;
        self.delayed
            .lock()
            .unwrap()
            .push((Instant::now() + delay, item.to_string()));
        Ok(())
    }

    async fn promote_due(&self) -> Result<usize, QueueError> {
        let now = Instant::now();
        let mut delayed = self.delayed.lock().unwrap();
        delayed.sort_by_key(|(due, _)| *due);
        let due_count = delayed.iter().take_while(|(due, _)| *due <= now).count();
        let mut ready = self.ready.lock().unwrap();
        for (_, item) in delayed.drain(..due_count) {
            ready.push_back(item);
        }
        Ok(due_count)
    }

    async fn dead_letter(&self, item: &str) -> Result<(), QueueError> {
        store_fault(&self.writes_fail)?;
        self.dead.lock().unwrap().push(item.to_string());
        Ok(())
    }

    async fn len(&self) -> Result<u64, QueueError> {
        Ok(self.ready.lock().unwrap().len() as u64)
    }
}

/// Sink that records every attempt with its (tokio) timestamp.
#[derive(Default)]
pub struct RecordingSink {
    attempts: Mutex<Vec<(Instant, Payload)>>,
    failures_left: AtomicUsize,
}

impl RecordingSink {
    /// Fails the first `failures` deliveries, then succeeds.
    pub fn failing_first(failures: usize) -> Self {
        Self {
            attempts: Mutex::new(Vec::new()),
            failures_left: AtomicUsize::new(failures),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_first(usize::MAX)
    }

    pub fn attempts(&self) -> Vec<(Instant, Payload)> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookSink for RecordingSink {
    async fn deliver(&self, payload: &Payload) -> Result<(), DeliveryError> {
        self.attempts
            .lock()
            .unwrap()
            .push((Instant::now(), payload.clone()));

        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            if left != usize::MAX {
                self.failures_left.store(left - 1, Ordering::SeqCst);
            }
            return Err(DeliveryError::Status(503));
        }
        Ok(())
    }
}
