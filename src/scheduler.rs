//! Timer-driven single-flight scheduler.
//!
//! Periodically executes one [`Job`] with at most one run in flight at a
//! time, across timer firings and manual triggers alike. The next timer
//! is armed only after the current run completes, so inter-run spacing is
//! `interval + run_duration` rather than a fixed-rate cadence: the
//! simplification that keeps single-flight true with nothing more than
//! one atomic flag.
//!
//! # Design
//!
//! At most one pending timer exists at any moment: a spawned task racing
//! `tokio::time::sleep(interval)` against a cancellation token that only
//! [`Scheduler::stop`] or a rearm cancels. A timer that has fired can no
//! longer be cancelled, so stopping never aborts a run in flight; a stop
//! requested during a run takes effect after the run's terminal status
//! transition.

use crate::error::{JournalError, Result};
use crate::job::Job;
use crate::status::{Status, StatusRegistry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where an execute request came from. A timer firing that loses the
/// in-flight race still owes the chain its next link; a manual trigger
/// does not.
#[derive(Clone, Copy, PartialEq, Eq)]
enum RunOrigin {
    Timer,
    Manual,
}

/// Control state guarded by one lock, so `start`, `stop`, and rearm
/// always observe each other in order.
struct ControlState {
    running: bool,
    pending: Option<CancellationToken>,
    stop_deferred: bool,
}

struct Inner {
    job: Arc<dyn Job>,
    interval: Duration,
    status: Arc<StatusRegistry>,
    control: Mutex<ControlState>,
    in_flight: AtomicBool,
}

/// Periodic executor with single-flight concurrency control.
///
/// Owned by the application root; controllers call
/// [`start`](Self::start) / [`stop`](Self::stop) /
/// [`trigger_now`](Self::trigger_now) and poll the shared
/// [`StatusRegistry`] for state. Requires a tokio runtime.
///
/// Call [`stop`](Self::stop) before dropping the last handle; an
/// un-stopped scheduler keeps its timer chain alive on the runtime.
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create a scheduler that runs `job` every `interval` once started.
    ///
    /// # Errors
    ///
    /// Rejects a zero interval.
    pub fn new(
        job: Arc<dyn Job>,
        interval: Duration,
        status: Arc<StatusRegistry>,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(JournalError::Scheduler(
                "interval must be positive".to_owned(),
            ));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                job,
                interval,
                status,
                control: Mutex::new(ControlState {
                    running: false,
                    pending: None,
                    stop_deferred: false,
                }),
                in_flight: AtomicBool::new(false),
            }),
        })
    }

    /// Arm the timer chain. Idempotent: a second `start` is a logged no-op.
    pub fn start(&self) {
        let mut control = self.inner.lock_control();
        if control.running {
            warn!("scheduler already running");
            return;
        }
        control.running = true;
        control.stop_deferred = false;
        // A manual run may be mid-flight; its terminal transition wins.
        if self.inner.status.status() != Status::Processing {
            self.inner.status.set_status(Status::Running);
        }
        info!(
            interval_secs = self.inner.interval.as_secs(),
            "scheduler started"
        );
        Inner::arm(&self.inner, &mut control);
    }

    /// Disarm the timer chain. Idempotent. Never interrupts a run already
    /// in flight: that run finishes, and the stop completes after its
    /// terminal status transition.
    pub fn stop(&self) {
        let mut control = self.inner.lock_control();
        if !control.running {
            debug!("scheduler already stopped");
            return;
        }
        control.running = false;
        if let Some(pending) = control.pending.take() {
            pending.cancel();
        }
        self.inner.status.set_next_execution(None);
        if self.inner.in_flight.load(Ordering::Acquire) {
            control.stop_deferred = true;
            info!("scheduler stopping, waiting for in-flight run to finish");
        } else {
            self.inner.status.set_status(Status::Stopped);
            info!("scheduler stopped");
        }
    }

    /// Run the job now, off-cycle.
    ///
    /// A logged no-op while a run is already in flight; otherwise the run
    /// is spawned in the background and this returns immediately. Works
    /// whether or not the scheduler is started.
    pub fn trigger_now(&self) {
        if self.inner.in_flight.load(Ordering::Acquire) {
            warn!("run already in flight, ignoring manual trigger");
            return;
        }
        info!("manual run triggered");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            Inner::execute(inner, RunOrigin::Manual).await;
        });
    }

    /// Whether the timer chain is armed, not whether a run is in flight.
    pub fn is_running(&self) -> bool {
        self.inner.lock_control().running
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.inner.interval
    }
}

impl Inner {
    fn lock_control(&self) -> MutexGuard<'_, ControlState> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arm one one-shot timer, replacing (and cancelling) any pending one.
    fn arm(this: &Arc<Inner>, control: &mut ControlState) {
        let token = CancellationToken::new();
        if let Some(previous) = control.pending.replace(token.clone()) {
            previous.cancel();
        }
        if let Ok(delta) = chrono::Duration::from_std(this.interval) {
            this.status
                .set_next_execution(Some(chrono::Utc::now() + delta));
        }
        let inner = Arc::clone(this);
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(inner.interval) => {}
                _ = token.cancelled() => return,
            }
            Inner::execute(inner, RunOrigin::Timer).await;
        });
    }

    /// Execute one run unless another is in flight, then rearm while the
    /// running flag still holds.
    async fn execute(this: Arc<Inner>, origin: RunOrigin) {
        if this
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("run already in flight, skipping this firing");
            if origin == RunOrigin::Timer {
                let mut control = this.lock_control();
                if control.running {
                    Inner::arm(&this, &mut control);
                }
            }
            return;
        }

        // The job reports its own outcome through the registry; this is
        // only the backstop, so one bad run cannot break the chain.
        if let Err(e) = this.job.run().await {
            warn!(error = %e, "job run reported failure");
        }

        this.in_flight.store(false, Ordering::Release);

        let mut control = this.lock_control();
        if control.running {
            Inner::arm(&this, &mut control);
            return;
        }
        // A timer-origin run completing with the flag down means a stop
        // raced the firing; apply the stop now, after the run's terminal
        // transition. Manual runs while stopped keep their terminal status.
        if control.stop_deferred || origin == RunOrigin::Timer {
            control.stop_deferred = false;
            this.status.set_status(Status::Stopped);
            info!("scheduler stopped after in-flight run completed");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Semaphore;

    /// Counts runs; optionally holds each run open until the test
    /// releases a permit.
    struct CountingJob {
        runs: AtomicUsize,
        gate: Option<Semaphore>,
    }

    impl CountingJob {
        fn instant() -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                gate: None,
            })
        }

        fn gated() -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                gate: Some(Semaphore::new(0)),
            })
        }

        fn release_one(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Job for CountingJob {
        async fn run(&self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
            Ok(())
        }
    }

    /// Sleeps a fixed duration per run, for cadence tests.
    struct SlowJob {
        runs: AtomicUsize,
        duration: Duration,
    }

    #[async_trait]
    impl Job for SlowJob {
        async fn run(&self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.duration).await;
            Ok(())
        }
    }

    fn make_scheduler(job: Arc<dyn Job>, secs: u64) -> (Scheduler, Arc<StatusRegistry>) {
        let status = Arc::new(StatusRegistry::new());
        let scheduler = Scheduler::new(job, Duration::from_secs(secs), Arc::clone(&status))
            .expect("valid interval");
        (scheduler, status)
    }

    /// Let spawned tasks run to quiescence (paused clock auto-advances).
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[test]
    fn zero_interval_is_rejected() {
        let status = Arc::new(StatusRegistry::new());
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
            gate: None,
        });
        let result = Scheduler::new(job, Duration::ZERO, status);
        assert!(matches!(result, Err(JournalError::Scheduler(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn no_run_before_first_interval_elapses() {
        let job = CountingJob::instant();
        let (scheduler, _status) = make_scheduler(job.clone(), 10);

        scheduler.start();
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(job.runs(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(job.runs(), 1);

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn two_runs_within_five_units_at_interval_two() {
        let job = CountingJob::instant();
        let (scheduler, status) = make_scheduler(job.clone(), 2);

        scheduler.start();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(job.runs(), 2);
        assert!(status.next_execution().is_some());

        scheduler.stop();
        assert!(status.next_execution().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_waits_for_completion_not_fixed_rate() {
        // interval 2, each run takes 1: runs start at t=2 and t=5, so only
        // two runs by t=7 (a fixed-rate scheduler would have had three).
        let job = Arc::new(SlowJob {
            runs: AtomicUsize::new(0),
            duration: Duration::from_secs(1),
        });
        let (scheduler, _status) = make_scheduler(job.clone(), 2);

        scheduler.start();
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_arms_a_single_chain() {
        let job = CountingJob::instant();
        let (scheduler, _status) = make_scheduler(job.clone(), 2);

        scheduler.start();
        scheduler.start();
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(job.runs(), 5);

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_future_runs() {
        let job = CountingJob::instant();
        let (scheduler, status) = make_scheduler(job.clone(), 2);

        scheduler.start();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(job.runs(), 1);

        scheduler.stop();
        assert!(!scheduler.is_running());
        assert_eq!(status.status(), Status::Stopped);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(job.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let job = CountingJob::instant();
        let (scheduler, _status) = make_scheduler(job, 2);

        scheduler.stop();
        scheduler.start();
        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_run_lets_it_finish_then_stops() {
        let job = CountingJob::gated();
        let (scheduler, status) = make_scheduler(job.clone(), 2);

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(job.runs(), 1);

        // Run is held open by the gate; stop must defer.
        scheduler.stop();
        assert!(!scheduler.is_running());
        assert_ne!(status.status(), Status::Stopped);

        job.release_one();
        settle().await;
        assert_eq!(status.status(), Status::Stopped);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(job.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_now_runs_off_cycle_without_starting() {
        let job = CountingJob::instant();
        let (scheduler, _status) = make_scheduler(job.clone(), 60);

        scheduler.trigger_now();
        settle().await;
        assert_eq!(job.runs(), 1);
        assert!(!scheduler.is_running());

        // No chain was armed by the manual run.
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(job.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_now_while_in_flight_is_a_noop() {
        let job = CountingJob::gated();
        let (scheduler, _status) = make_scheduler(job.clone(), 60);

        scheduler.trigger_now();
        settle().await;
        assert_eq!(job.runs(), 1);

        scheduler.trigger_now();
        scheduler.trigger_now();
        settle().await;
        assert_eq!(job.runs(), 1);

        job.release_one();
        settle().await;
        assert_eq!(job.runs(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_firing_during_manual_run_skips_but_keeps_chain() {
        let job = CountingJob::gated();
        let (scheduler, _status) = make_scheduler(job.clone(), 2);

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        // Manual run claims the flag before the first timer fires.
        scheduler.trigger_now();
        settle().await;
        assert_eq!(job.runs(), 1);

        // Timer fires at t=2 while the manual run is held open: skipped.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(job.runs(), 1);

        // After release the chain is still alive.
        job.release_one();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(job.runs() >= 2);

        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn is_running_reflects_the_flag_not_in_flight() {
        let job = CountingJob::gated();
        let (scheduler, _status) = make_scheduler(job.clone(), 60);

        scheduler.trigger_now();
        settle().await;
        assert_eq!(job.runs(), 1);
        assert!(!scheduler.is_running());

        job.release_one();
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_sets_running_status_and_next_execution() {
        let job = CountingJob::instant();
        let (scheduler, status) = make_scheduler(job, 30);

        assert_eq!(status.status(), Status::Stopped);
        scheduler.start();
        assert_eq!(status.status(), Status::Running);
        assert!(status.next_execution().is_some());

        scheduler.stop();
        assert_eq!(status.status(), Status::Stopped);
    }
}
