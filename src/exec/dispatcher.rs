use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::batch::BatchHandle;
use crate::exec::completion::{CallbackError, CompletionGuard, panic_message};
use crate::foundation::error::{BltError, BltResult, ErrorCode};

/// Unit of work handed to the dispatcher. It owns everything it touches, leases included.
pub type Job = Box<dyn FnOnce() -> BltResult<()> + Send + 'static>;

enum Notify {
    Async(CompletionGuard),
    Sync(Sender<BltResult<()>>),
}

struct Task {
    job: Job,
    notify: Notify,
}

#[derive(Default)]
struct Lane {
    queue: VecDeque<Task>,
}

#[derive(Default)]
struct Shared {
    inflight: Mutex<usize>,
    idle: Condvar,
    lanes: Mutex<HashMap<BatchHandle, Lane>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs operations inline or on a worker pool.
///
/// Work submitted under the same batch handle runs on a serial lane in submission order.
/// Unbatched work has no ordering guarantee.
pub struct Dispatcher {
    pool: rayon::ThreadPool,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("threads", &self.pool.current_num_threads())
            .field("inflight", &self.inflight())
            .finish()
    }
}

impl Dispatcher {
    /// Dispatcher over a pool of `threads` workers, or rayon's default when `None`.
    pub fn new(threads: Option<usize>) -> BltResult<Self> {
        Ok(Self {
            pool: build_thread_pool(threads)?,
            shared: Arc::new(Shared::default()),
        })
    }

    /// Run `job` and return its result.
    ///
    /// Runs inline unless earlier work of the same batch is still queued, in which case it
    /// waits behind that work.
    pub fn run_sync(&self, lane: Option<BatchHandle>, job: Job) -> BltResult<()> {
        if let Some(handle) = lane {
            let mut lanes = lock(&self.shared.lanes);
            if let Some(busy) = lanes.get_mut(&handle) {
                let (tx, rx) = mpsc::channel();
                busy.queue.push_back(Task {
                    job,
                    notify: Notify::Sync(tx),
                });
                *lock(&self.shared.inflight) += 1;
                drop(lanes);
                tracing::debug!(batch = handle.raw(), "sync blit queued behind its batch");
                return rx.recv().unwrap_or_else(|_| {
                    Err(BltError::execution(
                        ErrorCode::OpFailed,
                        "queued operation was dropped",
                    ))
                });
            }
        }
        run_guarded(job)
    }

    /// Queue `job`; `guard` receives its result.
    pub fn submit(&self, lane: Option<BatchHandle>, job: Job, guard: CompletionGuard) {
        *lock(&self.shared.inflight) += 1;
        let task = Task {
            job,
            notify: Notify::Async(guard),
        };
        let shared = Arc::clone(&self.shared);
        match lane {
            None => self.pool.spawn(move || execute(&shared, task)),
            Some(handle) => {
                let mut lanes = lock(&self.shared.lanes);
                if let Some(busy) = lanes.get_mut(&handle) {
                    busy.queue.push_back(task);
                    return;
                }
                let mut fresh = Lane::default();
                fresh.queue.push_back(task);
                lanes.insert(handle, fresh);
                drop(lanes);
                self.pool.spawn(move || drain(&shared, handle));
            }
        }
    }

    /// Block until no queued or running work remains.
    pub fn flush(&self) {
        let mut n = lock(&self.shared.inflight);
        while *n > 0 {
            n = self
                .shared
                .idle
                .wait(n)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Number of queued or running operations.
    pub fn inflight(&self) -> usize {
        *lock(&self.shared.inflight)
    }

    /// Worker threads in the pool.
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.flush();
    }
}

fn drain(shared: &Shared, handle: BatchHandle) {
    loop {
        let task = {
            let mut lanes = lock(&shared.lanes);
            let Some(lane) = lanes.get_mut(&handle) else {
                return;
            };
            match lane.queue.pop_front() {
                Some(t) => t,
                None => {
                    lanes.remove(&handle);
                    return;
                }
            }
        };
        execute(shared, task);
    }
}

/// Counts one in-flight operation down when dropped, even while unwinding.
struct InflightSlot<'a>(&'a Shared);

impl Drop for InflightSlot<'_> {
    fn drop(&mut self) {
        let mut n = lock(&self.0.inflight);
        *n = n.saturating_sub(1);
        if *n == 0 {
            self.0.idle.notify_all();
        }
    }
}

fn execute(shared: &Shared, task: Task) {
    let _slot = InflightSlot(shared);
    let Task { job, notify } = task;
    let result = run_guarded(job);
    match notify {
        Notify::Async(guard) => guard.complete(result.map_err(|e| CallbackError::from_error(&e))),
        Notify::Sync(tx) => {
            // The caller may have given up waiting.
            let _ = tx.send(result);
        }
    }
}

fn run_guarded(job: Job) -> BltResult<()> {
    catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|panic| {
        let what = panic_message(panic.as_ref());
        tracing::warn!(panic = %what, "raster kernel panicked");
        Err(BltError::execution(
            ErrorCode::OpFailed,
            format!("kernel panicked: {what}"),
        ))
    })
}

fn build_thread_pool(threads: Option<usize>) -> BltResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(BltError::Other(anyhow::anyhow!(
            "dispatcher 'worker_threads' must be >= 1 when set"
        )));
    }

    let mut builder = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("bltkit-{i}"))
        .panic_handler(|panic| {
            tracing::warn!(panic = %panic_message(panic.as_ref()), "worker task panicked");
        });
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| BltError::Other(anyhow::anyhow!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/exec/dispatcher.rs"]
mod tests;
