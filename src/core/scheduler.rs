//! Periodic callback registration.
//!
//! The monitor only needs "call this roughly every interval until cancelled".
//! [`TokioScheduler`] runs each registration as its own task on a Tokio
//! runtime; [`ManualScheduler`] leaves firing to the host loop.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::error::{MonitorError, Result};

pub type TickCallback = Box<dyn FnMut() + Send + 'static>;

/// Identifies one periodic registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

pub trait Scheduler: Send + Sync {
    fn register_periodic(&self, interval: Duration, callback: TickCallback) -> Result<TaskHandle>;

    /// Stop a registration. No new period starts after this returns, but an
    /// invocation already in flight may still run to completion; callbacks
    /// that must not outlive their registration check their own flag.
    fn cancel(&self, handle: TaskHandle);

    fn active_tasks(&self) -> usize;
}

struct TokioTask {
    cancelled: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

/// Runs periodic callbacks as Tokio interval tasks.
pub struct TokioScheduler {
    handle: Handle,
    tasks: Mutex<HashMap<u64, TokioTask>>,
    next_id: AtomicU64,
    runtime: Option<Runtime>,
}

impl TokioScheduler {
    /// Build a scheduler with its own small runtime.
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .thread_name("perfmon-scheduler")
            .build()?;

        Ok(Self {
            handle: runtime.handle().clone(),
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            runtime: Some(runtime),
        })
    }

    /// Use a runtime owned by the host.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle,
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            runtime: None,
        }
    }

    /// Cancel every registration.
    pub fn shutdown(&self) {
        let tasks: Vec<_> = self.tasks.lock().drain().collect();
        for (_, task) in tasks {
            task.cancelled.store(true, Ordering::Release);
            task.join.abort();
        }
    }
}

impl Scheduler for TokioScheduler {
    fn register_periodic(&self, period: Duration, callback: TickCallback) -> Result<TaskHandle> {
        if period.is_zero() {
            return Err(MonitorError::scheduler("periodic interval must be non-zero"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        let mut callback = callback;

        let join = self.handle.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if flag.load(Ordering::Acquire) {
                    break;
                }
                callback();
            }
        });

        self.tasks.lock().insert(id, TokioTask { cancelled, join });
        log::debug!("Registered periodic task {} every {:?}", id, period);

        Ok(TaskHandle(id))
    }

    fn cancel(&self, handle: TaskHandle) {
        if let Some(task) = self.tasks.lock().remove(&handle.0) {
            task.cancelled.store(true, Ordering::Release);
            task.join.abort();
            log::debug!("Cancelled periodic task {}", handle.0);
        }
    }

    fn active_tasks(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.shutdown();
        // The last owner can be a callback running on one of our own workers,
        // where a blocking runtime drop panics.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

struct ManualTask {
    interval: Duration,
    callback: Arc<Mutex<TickCallback>>,
}

/// Scheduler for hosts that already run their own loop.
///
/// Registrations are stored and only run when the host calls [`fire`](Self::fire).
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<BTreeMap<u64, ManualTask>>,
    next_id: AtomicU64,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke every registered callback once. Returns how many ran.
    pub fn fire(&self) -> usize {
        self.fire_where(|_| true)
    }

    /// Invoke only the callbacks registered with `interval`.
    pub fn fire_with_interval(&self, interval: Duration) -> usize {
        self.fire_where(|task_interval| task_interval == interval)
    }

    fn fire_where(&self, matches: impl Fn(Duration) -> bool) -> usize {
        let ids: Vec<u64> = self
            .tasks
            .lock()
            .iter()
            .filter(|(_, task)| matches(task.interval))
            .map(|(id, _)| *id)
            .collect();
        let mut fired = 0;

        for id in ids {
            // A callback may cancel other registrations; look each one up again.
            let callback = match self.tasks.lock().get(&id) {
                Some(task) => Arc::clone(&task.callback),
                None => continue,
            };
            let mut guard = callback.lock();
            (&mut **guard)();
            fired += 1;
        }

        fired
    }

    pub fn interval_of(&self, handle: TaskHandle) -> Option<Duration> {
        self.tasks.lock().get(&handle.0).map(|task| task.interval)
    }
}

impl Scheduler for ManualScheduler {
    fn register_periodic(&self, interval: Duration, callback: TickCallback) -> Result<TaskHandle> {
        if interval.is_zero() {
            return Err(MonitorError::scheduler("periodic interval must be non-zero"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.tasks.lock().insert(
            id,
            ManualTask {
                interval,
                callback: Arc::new(Mutex::new(callback)),
            },
        );
        Ok(TaskHandle(id))
    }

    fn cancel(&self, handle: TaskHandle) {
        self.tasks.lock().remove(&handle.0);
    }

    fn active_tasks(&self) -> usize {
        self.tasks.lock().len()
    }
}
