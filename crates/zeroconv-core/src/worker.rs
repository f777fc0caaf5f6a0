//! Off-audio-thread reconfiguration and the kernel handoff.
//!
//! [`Reconfigurer`] is the configuration-side half of a
//! [`Convolver`](crate::Convolver). Builds run either inline or on a worker
//! thread spawned through `thread_priority` with the caller's
//! [`SchedulingHints`]. A finished build is published into a single pending
//! slot; the audio side adopts it with `try_lock` at the start of its next
//! `run_*` call and hands the kernel it replaced back through a bounded
//! retire queue, so deallocation happens here rather than on the audio
//! thread.
//!
//! Every request bumps a generation counter. Only a build whose generation
//! is still the latest may publish; anything else is discarded on the
//! worker. A failed build never replaces the active or pending kernel: if
//! it was the latest request, the pending kernel is re-stamped with its
//! generation so the last good build is still adopted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use thread_priority::{ThreadBuilder, ThreadPriority, ThreadPriorityValue};

use crate::engine::ConvolutionEngine;
use crate::error::{ConvolverError, Result};
use crate::kernel::{BuildJob, Kernel};
use crate::readable::IrLoader;

/// Name given to reconfiguration worker threads.
pub const WORKER_THREAD_NAME: &str = "zeroconv-reconfigure";

/// Retired kernels the audio side can hand back before it drops them in place.
const RETIRE_CAPACITY: usize = 8;

/// Highest priority accepted by the cross-platform priority range.
const MAX_PRIORITY: u8 = 99;

/// OS scheduling class for reconfiguration workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SchedPolicy {
    /// Default time-sharing scheduler.
    #[default]
    Other,
    /// Real-time first-in first-out.
    Fifo,
    /// Real-time round robin.
    RoundRobin,
}

/// Policy and priority for the reconfiguration worker.
///
/// Meant to sit below the audio thread: high enough that a rebuild finishes
/// promptly, low enough not to preempt audio. If the OS refuses the request
/// the build still runs at default priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SchedulingHints {
    /// Scheduling class.
    pub policy: SchedPolicy,
    /// Priority in `0..=99`; larger values are clamped.
    pub priority: u8,
}

impl SchedulingHints {
    /// Hints with the given policy and priority.
    pub fn new(policy: SchedPolicy, priority: u8) -> Self {
        Self { policy, priority }
    }

    fn thread_builder(self) -> ThreadBuilder {
        let builder = ThreadBuilder::default().name(WORKER_THREAD_NAME);
        let builder = match ThreadPriorityValue::try_from(self.priority.min(MAX_PRIORITY)) {
            Ok(value) => builder.priority(ThreadPriority::Crossplatform(value)),
            Err(_) => builder,
        };
        #[cfg(unix)]
        let builder = {
            use thread_priority::unix::{
                NormalThreadSchedulePolicy, RealtimeThreadSchedulePolicy, ThreadSchedulePolicy,
            };
            builder.policy(match self.policy {
                SchedPolicy::Other => {
                    ThreadSchedulePolicy::Normal(NormalThreadSchedulePolicy::Other)
                }
                SchedPolicy::Fifo => {
                    ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo)
                }
                SchedPolicy::RoundRobin => {
                    ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::RoundRobin)
                }
            })
        };
        builder
    }
}

/// A published kernel and the request it answers.
pub(crate) struct Pending<E> {
    pub generation: u64,
    pub kernel: Box<Kernel<E>>,
}

/// State shared between a convolver, its handles and their workers.
pub(crate) struct Shared<E> {
    /// Latest requested generation; `0` means nothing was ever requested.
    generation: AtomicU64,
    /// Generation held by `pending`, `0` when empty.
    pending_generation: AtomicU64,
    /// Requests at or below this generation predate the last reset.
    reset_floor: AtomicU64,
    pending: Mutex<Option<Pending<E>>>,
    /// Latency of the most recently published kernel.
    latency: AtomicUsize,
    in_flight: AtomicUsize,
    idle_lock: Mutex<()>,
    idle: Condvar,
    last_error: Mutex<Option<String>>,
    retire_tx: Sender<Box<Kernel<E>>>,
    retire_rx: Receiver<Box<Kernel<E>>>,
}

impl<E: ConvolutionEngine> Shared<E> {
    fn new() -> Self {
        let (retire_tx, retire_rx) = crossbeam_channel::bounded(RETIRE_CAPACITY);
        Self {
            generation: AtomicU64::new(0),
            pending_generation: AtomicU64::new(0),
            reset_floor: AtomicU64::new(0),
            pending: Mutex::new(None),
            latency: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            idle_lock: Mutex::new(()),
            idle: Condvar::new(),
            last_error: Mutex::new(None),
            retire_tx,
            retire_rx,
        }
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drops kernels handed back by the audio side.
    fn collect_retired(&self) {
        while let Ok(kernel) = self.retire_rx.try_recv() {
            drop(kernel);
        }
    }

    /// Publishes `kernel` if `generation` is still current.
    fn publish(&self, generation: u64, kernel: Box<Kernel<E>>) -> bool {
        self.collect_retired();
        let latency = kernel.latency();
        let mut slot = self.pending.lock();
        if self.generation.load(Ordering::Acquire) != generation {
            drop(slot);
            drop(kernel);
            #[cfg(feature = "tracing")]
            tracing::debug!("reconfigure: discarding stale build (generation {generation})");
            return false;
        }
        let replaced = slot.replace(Pending { generation, kernel });
        self.pending_generation.store(generation, Ordering::Release);
        self.latency.store(latency, Ordering::Release);
        drop(slot);
        drop(replaced);
        true
    }

    /// Records a failed build for `generation`.
    ///
    /// A pending kernel from an earlier successful build stays servable
    /// when the failed request was the latest one.
    fn fail(&self, generation: u64, message: String) {
        #[cfg(feature = "tracing")]
        tracing::warn!("reconfigure failed: {message}");
        *self.last_error.lock() = Some(message);

        let mut slot = self.pending.lock();
        if self.generation.load(Ordering::Acquire) == generation
            && let Some(pending) = slot.as_mut()
            && pending.generation > self.reset_floor.load(Ordering::Acquire)
        {
            pending.generation = generation;
            self.pending_generation.store(generation, Ordering::Release);
        }
    }

    fn finish_build(&self) {
        let _guard = self.idle_lock.lock();
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.idle.notify_all();
    }

    /// Audio side: takes the pending kernel if one for the latest request
    /// is available and the slot is not contended.
    pub(crate) fn try_take_pending(&self) -> Option<Box<Kernel<E>>> {
        if self.pending_generation.load(Ordering::Acquire) == 0 {
            return None;
        }
        let mut slot = self.pending.try_lock()?;
        let pending = slot.take()?;
        self.pending_generation.store(0, Ordering::Release);
        drop(slot);
        if pending.generation == self.generation.load(Ordering::Acquire) {
            Some(pending.kernel)
        } else {
            self.retire(pending.kernel);
            None
        }
    }

    /// Audio side: hands a kernel back for deallocation elsewhere.
    pub(crate) fn retire(&self, kernel: Box<Kernel<E>>) {
        match self.retire_tx.try_send(kernel) {
            Ok(()) => {}
            // Nobody collected recently; drop in place.
            Err(TrySendError::Full(kernel) | TrySendError::Disconnected(kernel)) => drop(kernel),
        }
    }

    /// Invalidates all outstanding requests and the pending kernel.
    pub(crate) fn invalidate(&self) {
        let floor = self.next_generation();
        self.reset_floor.store(floor, Ordering::Release);
        if let Some(mut slot) = self.pending.try_lock()
            && let Some(pending) = slot.take()
        {
            self.pending_generation.store(0, Ordering::Release);
            drop(slot);
            self.retire(pending.kernel);
        }
    }

    pub(crate) fn has_servable_pending(&self) -> bool {
        let pending = self.pending_generation.load(Ordering::Acquire);
        pending != 0 && pending == self.generation.load(Ordering::Acquire)
    }

    pub(crate) fn is_building(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) > 0
    }

    pub(crate) fn latency(&self) -> usize {
        self.latency.load(Ordering::Acquire)
    }
}

/// Cloneable handle that (re)builds a convolver's configuration from any thread.
///
/// Obtained from [`Convolver::reconfigurer`](crate::Convolver::reconfigurer).
/// Requests are cheap to issue; only the latest one is ever adopted.
pub struct Reconfigurer<E: ConvolutionEngine> {
    shared: Arc<Shared<E>>,
    job: Arc<BuildJob>,
    loader: Arc<dyn IrLoader>,
    hints: SchedulingHints,
}

impl<E: ConvolutionEngine> Clone for Reconfigurer<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            job: Arc::clone(&self.job),
            loader: Arc::clone(&self.loader),
            hints: self.hints,
        }
    }
}

impl<E: ConvolutionEngine> std::fmt::Debug for Reconfigurer<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconfigurer")
            .field("path", &self.job.path)
            .field("hints", &self.hints)
            .field("building", &self.shared.is_building())
            .finish_non_exhaustive()
    }
}

impl<E: ConvolutionEngine> Reconfigurer<E> {
    pub(crate) fn new(job: BuildJob, loader: Arc<dyn IrLoader>, hints: SchedulingHints) -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            job: Arc::new(job),
            loader,
            hints,
        }
    }

    pub(crate) fn shared(&self) -> &Shared<E> {
        &self.shared
    }

    pub(crate) fn job(&self) -> &BuildJob {
        &self.job
    }

    /// Scheduling hints used for threaded builds.
    pub fn hints(&self) -> SchedulingHints {
        self.hints
    }

    /// Requests a rebuild for blocks of up to `max_block_size` samples.
    ///
    /// With `threaded` the build runs on a worker thread and this returns as
    /// soon as it is started; completion is observable through
    /// [`is_building`](Self::is_building), [`wait_idle`](Self::wait_idle)
    /// and [`last_error`](Self::last_error). Otherwise the build runs here and
    /// its outcome is returned. Either way the previous configuration keeps
    /// serving until the new one is adopted.
    pub fn reconfigure(&self, max_block_size: usize, threaded: bool) -> Result<()> {
        if max_block_size == 0 {
            return Err(ConvolverError::InvalidBlockSize(max_block_size));
        }
        let generation = self.shared.next_generation();
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "reconfigure: '{}' block {max_block_size} generation {generation} threaded={threaded}",
            self.job.path
        );

        if !threaded {
            return run_build(&self.shared, self.loader.as_ref(), &self.job, generation, max_block_size);
        }

        self.shared.in_flight.fetch_add(1, Ordering::AcqRel);
        let shared = Arc::clone(&self.shared);
        let loader = Arc::clone(&self.loader);
        let job = Arc::clone(&self.job);
        let spawned = self.hints.thread_builder().spawn(move |priority| {
            let build = BuildGuard { shared, generation };
            if let Err(_e) = priority {
                #[cfg(feature = "tracing")]
                tracing::warn!("reconfigure: scheduling hints not applied ({_e:?}), using default priority");
            }
            // Failures are recorded in `last_error`.
            let _ = run_build(&build.shared, loader.as_ref(), &job, generation, max_block_size);
        });

        match spawned {
            Ok(_handle) => Ok(()),
            Err(e) => {
                let err = ConvolverError::Worker(e.to_string());
                self.shared.fail(generation, err.to_string());
                self.shared.finish_build();
                Err(err)
            }
        }
    }

    /// Whether a threaded build is still running.
    pub fn is_building(&self) -> bool {
        self.shared.is_building()
    }

    /// Blocks until no build is in flight or `timeout` elapses.
    ///
    /// Returns `true` if idle. Not for use on the audio thread.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.shared.idle_lock.lock();
        while self.shared.is_building() {
            if self.shared.idle.wait_until(&mut guard, deadline).timed_out() {
                return !self.shared.is_building();
            }
        }
        drop(guard);
        self.shared.collect_retired();
        true
    }

    /// Message of the most recent failed build, if any.
    pub fn last_error(&self) -> Option<String> {
        self.shared.last_error.lock().clone()
    }

    /// Latency of the most recently published configuration.
    pub fn latency(&self) -> usize {
        self.shared.latency()
    }
}

/// Marks a threaded build finished when dropped, even if it panicked.
struct BuildGuard<E: ConvolutionEngine> {
    shared: Arc<Shared<E>>,
    generation: u64,
}

impl<E: ConvolutionEngine> Drop for BuildGuard<E> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.shared
                .fail(self.generation, "reconfiguration worker panicked".to_string());
        }
        self.shared.finish_build();
    }
}

fn run_build<E: ConvolutionEngine>(
    shared: &Shared<E>,
    loader: &dyn IrLoader,
    job: &BuildJob,
    generation: u64,
    max_block_size: usize,
) -> Result<()> {
    match Kernel::<E>::build(loader, job, max_block_size) {
        Ok(kernel) => {
            #[cfg(feature = "tracing")]
            tracing::info!(
                "reconfigure: '{}' built, {:?} latency {} block {}",
                job.path,
                kernel.routing(),
                kernel.latency(),
                kernel.block_size()
            );
            shared.publish(generation, Box::new(kernel));
            *shared.last_error.lock() = None;
            Ok(())
        }
        Err(err) => {
            shared.fail(generation, err.to_string());
            Err(err)
        }
    }
}
