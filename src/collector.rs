//! Collection cycles and the snapshot cache.
//!
//! A cycle discovers devices, fetches them concurrently under a semaphore
//! with a per-device timeout and an overall cycle deadline, and hands the
//! results to the snapshot builder. [`SnapshotCache`] serialises cycles: at
//! most one runs at a time, and requests arriving within the debounce window
//! (or while a cycle is running) reuse its result.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, instrument, warn};

use crate::device::{discover, Device, DiscoverySettings};
use crate::error::FetchError;
use crate::raw::RawAttributeRecord;
use crate::snapshot::{build, CycleMeta, ScrapeSnapshot};
use crate::tool::{DiagnosticTool, ToolInfo};

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const DEFAULT_DEVICE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Tunables of a collection cycle.
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub discovery: DiscoverySettings,
    pub max_concurrency: usize,
    pub device_timeout: Duration,
    pub cycle_timeout: Duration,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            discovery: DiscoverySettings::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            device_timeout: DEFAULT_DEVICE_TIMEOUT,
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
        }
    }
}

type FetchResult = Result<RawAttributeRecord, FetchError>;

/// Runs collection cycles against one diagnostic tool.
pub struct Collector<T: DiagnosticTool> {
    tool: Arc<T>,
    settings: CollectorSettings,
    tool_info: Option<ToolInfo>,
    cycles: AtomicU64,
}

impl<T: DiagnosticTool> Collector<T> {
    pub fn new(tool: Arc<T>, settings: CollectorSettings) -> Self {
        Self {
            tool,
            settings,
            tool_info: None,
            cycles: AtomicU64::new(0),
        }
    }

    /// Tool version recorded in every snapshot.
    pub fn with_tool_info(mut self, info: ToolInfo) -> Self {
        self.tool_info = Some(info);
        self
    }

    pub fn tool(&self) -> &Arc<T> {
        &self.tool
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Runs one full collection cycle. Never fails: discovery and device
    /// errors are recorded in the snapshot.
    #[instrument(skip(self))]
    pub async fn collect(&self) -> ScrapeSnapshot {
        let start = Instant::now();
        let collected_at = Utc::now();
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;

        // the cycle deadline covers discovery too
        let deadline = start + self.settings.cycle_timeout;
        let discovery_timeout = self.settings.device_timeout.min(self.settings.cycle_timeout);
        let discovery = timeout_at(
            start + discovery_timeout,
            discover(&*self.tool, &self.settings.discovery),
        )
        .await
        .unwrap_or(Err(FetchError::Timeout(discovery_timeout)));

        let (devices, discovery_error) = match discovery {
            Ok(devices) => (devices, None),
            Err(e) => {
                warn!("Device discovery failed: {}", e);
                (Vec::new(), Some(e))
            }
        };

        if devices.is_empty() && discovery_error.is_none() {
            info!("No devices discovered");
        }

        let fetched = self.fetch_all(devices, deadline).await;
        let snapshot = build(
            fetched,
            CycleMeta {
                cycle,
                duration: start.elapsed(),
                collected_at,
                discovery_error,
                tool: self.tool_info.clone(),
            },
        );

        info!(
            "Collection cycle {} finished in {:.3}s: {} devices, {} ok, {} failed",
            cycle,
            snapshot.meta.duration.as_secs_f64(),
            snapshot.attempted,
            snapshot.succeeded,
            snapshot.failed
        );
        snapshot
    }

    /// Fetches every device, returning one result per device in input order.
    /// Fetches still pending at `deadline` are abandoned.
    async fn fetch_all(&self, devices: Vec<Device>, deadline: Instant) -> Vec<(Device, FetchResult)> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let device_timeout = self.settings.device_timeout;
        let mut tasks = JoinSet::new();

        for (index, device) in devices.iter().cloned().enumerate() {
            let tool = Arc::clone(&self.tool);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // the semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                let result = match timeout(device_timeout, tool.read_device(&device)).await {
                    Ok(result) => result,
                    Err(_) => {
                        debug!("Fetch of {} exceeded {:?}", device.id(), device_timeout);
                        Err(FetchError::Timeout(device_timeout))
                    }
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<FetchResult>> = (0..devices.len()).map(|_| None).collect();
        let mut deadline_hit = false;

        loop {
            match timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, result)))) => results[index] = Some(result),
                Ok(Some(Err(e))) => warn!("Device fetch task failed: {}", e),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Cycle deadline of {:?} reached, abandoning {} pending fetches",
                        self.settings.cycle_timeout,
                        tasks.len()
                    );
                    tasks.abort_all();
                    deadline_hit = true;
                    break;
                }
            }
        }

        let cycle_timeout = self.settings.cycle_timeout;
        devices
            .into_iter()
            .zip(results)
            .map(|(device, result)| {
                let result = result.unwrap_or_else(|| {
                    if deadline_hit {
                        Err(FetchError::Timeout(cycle_timeout))
                    } else {
                        Err(FetchError::ParseError("device fetch task failed".into()))
                    }
                });
                (device, result)
            })
            .collect()
    }
}

/// Whether a snapshot was produced for the caller or reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Collected,
    Cached,
}

struct CachedSnapshot {
    snapshot: Arc<ScrapeSnapshot>,
    taken_at: Instant,
    generation: u64,
}

/// State shared between the cache handle and the detached cycle tasks.
struct CacheInner<T: DiagnosticTool> {
    collector: Collector<T>,
    debounce: Duration,
    slot: Mutex<Option<CachedSnapshot>>,
    /// Last published snapshot, readable without waiting for a running cycle.
    published: StdRwLock<Option<(Arc<ScrapeSnapshot>, Instant)>>,
    generation: AtomicU64,
    collecting: AtomicBool,
}

/// Clears the `collecting` flag when a cycle ends, including by panic.
struct CollectingGuard<'a>(&'a AtomicBool);

impl<'a> CollectingGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Relaxed);
        Self(flag)
    }
}

impl Drop for CollectingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

impl<T: DiagnosticTool> CacheInner<T> {
    async fn get_or_collect(&self, seen_generation: u64) -> (Arc<ScrapeSnapshot>, Freshness) {
        let mut slot = self.slot.lock().await;

        if let Some(cached) = slot.as_ref() {
            let completed_while_waiting = cached.generation > seen_generation;
            let fresh = cached.taken_at.elapsed() < self.debounce;
            if completed_while_waiting || fresh {
                debug!(
                    "Serving cached snapshot of cycle {} ({:.3}s old)",
                    cached.snapshot.meta.cycle,
                    cached.taken_at.elapsed().as_secs_f64()
                );
                return (Arc::clone(&cached.snapshot), Freshness::Cached);
            }
        }

        let snapshot = {
            let _collecting = CollectingGuard::set(&self.collecting);
            Arc::new(self.collector.collect().await)
        };

        let taken_at = Instant::now();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        *slot = Some(CachedSnapshot {
            snapshot: Arc::clone(&snapshot),
            taken_at,
            generation,
        });
        if let Ok(mut published) = self.published.write() {
            *published = Some((Arc::clone(&snapshot), taken_at));
        }

        (snapshot, Freshness::Collected)
    }
}

/// Single-slot snapshot cache with single-flight collection.
///
/// Cycles run in a detached task: a caller that goes away (a scrape that
/// timed out, a dropped connection) does not cancel the cycle, and its
/// result is still published for the next caller.
pub struct SnapshotCache<T: DiagnosticTool> {
    inner: Arc<CacheInner<T>>,
}

impl<T: DiagnosticTool> SnapshotCache<T> {
    pub fn new(collector: Collector<T>, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                collector,
                debounce,
                slot: Mutex::new(None),
                published: StdRwLock::new(None),
                generation: AtomicU64::new(0),
                collecting: AtomicBool::new(false),
            }),
        }
    }

    pub fn collector(&self) -> &Collector<T> {
        &self.inner.collector
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    pub fn is_collecting(&self) -> bool {
        self.inner.collecting.load(Ordering::Relaxed)
    }

    /// Most recent snapshot and its age, without triggering a cycle.
    pub fn latest(&self) -> Option<(Arc<ScrapeSnapshot>, Duration)> {
        self.inner
            .published
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|(s, at)| (Arc::clone(s), at.elapsed())))
    }

    /// Returns the cached snapshot when it is younger than the debounce
    /// window, otherwise runs a cycle.
    ///
    /// Callers that queued behind a running cycle receive that cycle's
    /// result instead of starting another one.
    pub async fn get_or_collect(&self) -> (Arc<ScrapeSnapshot>, Freshness) {
        let seen_generation = self.inner.generation.load(Ordering::Acquire);
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.get_or_collect(seen_generation).await });

        match task.await {
            Ok(result) => result,
            Err(e) => match e.try_into_panic() {
                Ok(payload) => std::panic::resume_unwind(payload),
                // the task is never aborted; only runtime shutdown cancels it
                Err(_) => std::future::pending().await,
            },
        }
    }
}
