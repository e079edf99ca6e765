//! Admission control
//!
//! One async semaphore per engine (capacity = the engine's `max_concurrent`)
//! and one per caller id. An acquire waits a bounded time for an engine slot,
//! then probes the caller slot without waiting; a caller at its own limit
//! gives the engine slot straight back instead of holding it.

use crate::config::AdmissionConfig;
use crate::registry::EngineRegistry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Which limit rejected an acquire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitDimension {
    Engine,
    Caller,
}

impl std::fmt::Display for LimitDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitDimension::Engine => f.write_str("engine"),
            LimitDimension::Caller => f.write_str("caller"),
        }
    }
}

/// Errors from admission operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("rate limit exceeded: {dimension} limit reached (engine '{engine}', caller '{caller_id}')")]
    RateLimitExceeded {
        dimension: LimitDimension,
        engine: String,
        caller_id: String,
    },

    #[error("engine '{0}' has no admission capacity configured")]
    UnknownEngine(String),
}

/// Concurrency slots for one engine.
struct EngineSlots {
    semaphore: Arc<Semaphore>,
    capacity: AtomicU32,
    /// Slots to retire as they are returned, after a shrink that could not
    /// take them from the free pool.
    pending_retire: AtomicU32,
    in_flight: AtomicU32,
    resize_lock: Mutex<()>,
}

impl EngineSlots {
    fn new(capacity: u32) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity as usize)),
            capacity: AtomicU32::new(capacity),
            pending_retire: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            resize_lock: Mutex::new(()),
        }
    }

    fn give_back(&self, permit: OwnedSemaphorePermit) {
        let retired = self
            .pending_retire
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok();
        if retired {
            permit.forget();
        } else {
            drop(permit);
        }
    }
}

/// Handle for one admitted request.
///
/// Holds an engine slot and a caller slot. Both are returned by
/// [`Permit::release`] or, on any other exit path, when the permit is dropped.
pub struct Permit {
    engine: String,
    caller_id: String,
    slots: Arc<EngineSlots>,
    engine_permit: Option<OwnedSemaphorePermit>,
    caller_permit: Option<OwnedSemaphorePermit>,
}

impl Permit {
    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn caller_id(&self) -> &str {
        &self.caller_id
    }

    /// Return both slots.
    pub fn release(mut self) {
        self.release_slots();
    }

    fn release_slots(&mut self) {
        let Some(engine_permit) = self.engine_permit.take() else {
            return;
        };
        self.caller_permit.take();
        self.slots.give_back(engine_permit);

        let in_flight = self.slots.in_flight.fetch_sub(1, Ordering::AcqRel) - 1;
        metrics::gauge!(crate::metrics::ADMISSION_IN_FLIGHT, "engine" => self.engine.clone())
            .set(in_flight as f64);
        tracing::debug!(
            engine = %self.engine,
            caller_id = %self.caller_id,
            in_flight,
            "Admission permit released"
        );
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.release_slots();
    }
}

impl std::fmt::Debug for Permit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit")
            .field("engine", &self.engine)
            .field("caller_id", &self.caller_id)
            .field("held", &self.engine_permit.is_some())
            .finish()
    }
}

/// Admission state of one engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineAdmissionStats {
    pub engine: String,
    pub capacity: u32,
    pub in_flight: u32,
    pub available: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionStats {
    pub engines: Vec<EngineAdmissionStats>,
    /// Distinct caller ids seen so far; caller state is never evicted.
    pub tracked_callers: usize,
}

/// Bounded admission per engine and per caller.
pub struct AdmissionController {
    config: AdmissionConfig,
    engines: DashMap<String, Arc<EngineSlots>>,
    callers: DashMap<String, Arc<Semaphore>>,
}

impl AdmissionController {
    pub fn new(config: AdmissionConfig) -> Self {
        Self {
            config,
            engines: DashMap::new(),
            callers: DashMap::new(),
        }
    }

    /// Create a controller with one slot pool per registered engine.
    pub fn from_registry(registry: &EngineRegistry, config: AdmissionConfig) -> Self {
        let controller = Self::new(config);
        for engine in registry.all() {
            controller.register_engine(&engine.name, engine.max_concurrent);
        }
        controller
    }

    /// Add an engine's slot pool. An existing pool is resized instead.
    pub fn register_engine(&self, engine: &str, capacity: u32) {
        if self.engines.contains_key(engine) {
            self.resize(engine, capacity);
            return;
        }
        self.engines
            .entry(engine.to_string())
            .or_insert_with(|| Arc::new(EngineSlots::new(capacity)));
    }

    /// Wait up to the configured timeout for an engine slot, then take a
    /// caller slot without waiting.
    pub async fn acquire(&self, engine: &str, caller_id: &str) -> Result<Permit, AdmissionError> {
        let slots = self
            .engines
            .get(engine)
            .map(|s| Arc::clone(s.value()))
            .ok_or_else(|| AdmissionError::UnknownEngine(engine.to_string()))?;

        let timeout = Duration::from_millis(self.config.acquire_timeout_ms);
        let engine_permit = match tokio::time::timeout(
            timeout,
            Arc::clone(&slots.semaphore).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) | Err(_) => {
                tracing::warn!(
                    engine,
                    caller_id,
                    timeout_ms = self.config.acquire_timeout_ms,
                    "Engine admission timed out"
                );
                return Err(self.rejected(LimitDimension::Engine, engine, caller_id));
            }
        };

        let caller_semaphore = self.caller_semaphore(caller_id);
        let caller_permit = match caller_semaphore.try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                slots.give_back(engine_permit);
                tracing::warn!(
                    engine,
                    caller_id,
                    limit = self.config.max_concurrent_per_caller,
                    "Caller concurrency limit reached"
                );
                return Err(self.rejected(LimitDimension::Caller, engine, caller_id));
            }
        };

        let in_flight = slots.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::gauge!(crate::metrics::ADMISSION_IN_FLIGHT, "engine" => engine.to_string())
            .set(in_flight as f64);
        tracing::debug!(engine, caller_id, in_flight, "Admission permit acquired");

        Ok(Permit {
            engine: engine.to_string(),
            caller_id: caller_id.to_string(),
            slots,
            engine_permit: Some(engine_permit),
            caller_permit: Some(caller_permit),
        })
    }

    fn rejected(&self, dimension: LimitDimension, engine: &str, caller_id: &str) -> AdmissionError {
        AdmissionError::RateLimitExceeded {
            dimension,
            engine: engine.to_string(),
            caller_id: caller_id.to_string(),
        }
    }

    fn caller_semaphore(&self, caller_id: &str) -> Arc<Semaphore> {
        if let Some(semaphore) = self.callers.get(caller_id) {
            return Arc::clone(semaphore.value());
        }
        let limit = self.config.max_concurrent_per_caller as usize;
        self.callers
            .entry(caller_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(limit)))
            .value()
            .clone()
    }

    /// Change an engine's capacity. Growth is immediate; a shrink removes
    /// free slots now and retires busy ones as their permits are released.
    pub fn resize(&self, engine: &str, capacity: u32) {
        let Some(slots) = self.engines.get(engine).map(|s| Arc::clone(s.value())) else {
            self.register_engine(engine, capacity);
            return;
        };

        let _guard = slots.resize_lock.lock();
        let old = slots.capacity.swap(capacity, Ordering::AcqRel);
        if capacity > old {
            let grow = capacity - old;
            let cancelled = slots
                .pending_retire
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    Some(n.saturating_sub(grow))
                })
                .map(|previous| previous.min(grow))
                .unwrap_or(0);
            slots.semaphore.add_permits((grow - cancelled) as usize);
        } else if capacity < old {
            let shrink = (old - capacity) as usize;
            let forgotten = slots.semaphore.forget_permits(shrink);
            slots
                .pending_retire
                .fetch_add((shrink - forgotten) as u32, Ordering::AcqRel);
        }

        tracing::info!(
            engine,
            old_capacity = old,
            new_capacity = capacity,
            "Engine admission capacity changed"
        );
    }

    /// Requests currently admitted to an engine.
    pub fn in_flight(&self, engine: &str) -> u32 {
        self.engines
            .get(engine)
            .map(|s| s.in_flight.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    pub fn capacity(&self, engine: &str) -> Option<u32> {
        self.engines
            .get(engine)
            .map(|s| s.capacity.load(Ordering::Acquire))
    }

    pub fn stats(&self) -> AdmissionStats {
        let mut engines: Vec<_> = self
            .engines
            .iter()
            .map(|entry| EngineAdmissionStats {
                engine: entry.key().clone(),
                capacity: entry.capacity.load(Ordering::Acquire),
                in_flight: entry.in_flight.load(Ordering::Acquire),
                available: entry.semaphore.available_permits() as u32,
            })
            .collect();
        engines.sort_by(|a, b| a.engine.cmp(&b.engine));

        AdmissionStats {
            engines,
            tracked_callers: self.callers.len(),
        }
    }
}
