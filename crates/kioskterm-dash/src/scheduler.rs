//! Non-blocking periodic status refresh.
//!
//! Each [`RefreshTask`] owns one [`StatusDomain`]. [`RefreshScheduler::tick`]
//! is called once per frame: it collects finished runs, then starts a worker
//! thread for every task that is idle and either forced or due. It never
//! waits on a worker.
//!
//! Cadence is anchored at dispatch time: a task with a 45 s interval that
//! starts at t=0 runs again at t=45 regardless of how long the first run took.
//! A task whose previous run is still in flight when it falls due is skipped,
//! not queued, so a domain never has two runs at once.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::RefreshError;
use crate::status::{Outcome, StatusDomain, StatusPayload, StatusSnapshot};

/// Captures one domain's status. Runs on a worker thread.
pub trait Producer: Send + Sync {
    fn produce(&self) -> Result<StatusPayload, RefreshError>;
}

impl<F> Producer for F
where
    F: Fn() -> Result<StatusPayload, RefreshError> + Send + Sync,
{
    fn produce(&self) -> Result<StatusPayload, RefreshError> {
        self()
    }
}

/// Which tasks a forced refresh applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainSelector {
    One(StatusDomain),
    All,
}

impl DomainSelector {
    fn matches(self, domain: StatusDomain) -> bool {
        match self {
            Self::One(d) => d == domain,
            Self::All => true,
        }
    }
}

pub struct RefreshTask {
    pub domain: StatusDomain,
    producer: Arc<dyn Producer>,
    pub interval: Duration,
    pub last_run: Option<Instant>,
    pub in_flight: bool,
    pub forced: bool,
    /// When the current run last cost this task a due slot.
    skip_noted: Option<Instant>,
}

impl fmt::Debug for RefreshTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTask")
            .field("domain", &self.domain)
            .field("interval", &self.interval)
            .field("last_run", &self.last_run)
            .field("in_flight", &self.in_flight)
            .field("forced", &self.forced)
            .finish()
    }
}

impl RefreshTask {
    fn is_due(&self, now: Instant) -> bool {
        match self.last_run {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// Due while still in flight, and a full interval since the last slot
    /// counted against this run.
    fn misses_slot(&self, now: Instant) -> bool {
        self.is_due(now)
            && self
                .skip_noted
                .is_none_or(|at| now.saturating_duration_since(at) >= self.interval)
    }
}

/// A worker's result.
#[derive(Debug)]
pub struct Completion {
    pub domain: StatusDomain,
    pub started_at: Instant,
    pub snapshot: StatusSnapshot,
}

/// Running totals, for the log and the footer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub dispatched: u64,
    pub completed: u64,
    pub failed: u64,
    /// Intervals a task missed because its previous run was still in
    /// flight. Counted once per interval, not per tick.
    pub skipped: u64,
}

pub struct RefreshScheduler {
    tasks: Vec<RefreshTask>,
    tx: mpsc::Sender<Completion>,
    rx: mpsc::Receiver<Completion>,
    published: Vec<Arc<StatusSnapshot>>,
    stats: SchedulerStats,
}

impl fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("tasks", &self.tasks)
            .field("published", &self.published.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshScheduler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tasks: Vec::new(),
            tx,
            rx,
            published: Vec::new(),
            stats: SchedulerStats::default(),
        }
    }

    /// Add (or replace) the task for `domain`.
    pub fn register(
        &mut self,
        domain: StatusDomain,
        producer: Arc<dyn Producer>,
        interval: Duration,
    ) -> &mut Self {
        let task = RefreshTask {
            domain,
            producer,
            interval,
            last_run: None,
            in_flight: false,
            forced: false,
            skip_noted: None,
        };
        match self.tasks.iter_mut().find(|t| t.domain == domain) {
            Some(existing) => {
                // Keep the in-flight marker so a replaced producer cannot
                // overlap a run that is still going.
                let in_flight = existing.in_flight;
                *existing = task;
                existing.in_flight = in_flight;
            }
            None => self.tasks.push(task),
        }
        self
    }

    pub fn task(&self, domain: StatusDomain) -> Option<&RefreshTask> {
        self.tasks.iter().find(|t| t.domain == domain)
    }

    pub fn tasks(&self) -> &[RefreshTask] {
        &self.tasks
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn in_flight_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.in_flight).count()
    }

    /// Collect finished runs, then dispatch every idle task that is forced
    /// or due. Returns the number of runs started.
    pub fn tick(&mut self, now: Instant) -> usize {
        self.collect();

        let mut started = 0;
        for idx in 0..self.tasks.len() {
            let task = &self.tasks[idx];
            if !(task.forced || task.is_due(now)) {
                continue;
            }
            if task.in_flight {
                if task.misses_slot(now) {
                    self.tasks[idx].skip_noted = Some(now);
                    self.stats.skipped += 1;
                }
                continue;
            }
            self.dispatch(idx, now);
            started += 1;
        }
        started
    }

    /// Snapshots completed since the last call, oldest first.
    pub fn take_published(&mut self) -> Vec<Arc<StatusSnapshot>> {
        std::mem::take(&mut self.published)
    }

    /// Make the selected tasks run on the next tick regardless of interval.
    ///
    /// A task that is in flight keeps the request and runs on the first tick
    /// after its current run completes.
    pub fn force_refresh(&mut self, selector: DomainSelector) {
        for task in self.tasks.iter_mut().filter(|t| selector.matches(t.domain)) {
            task.forced = true;
        }
        tracing::debug!(?selector, "refresh forced");
    }

    fn collect(&mut self) {
        while let Ok(done) = self.rx.try_recv() {
            let Some(task) = self.tasks.iter_mut().find(|t| t.domain == done.domain) else {
                continue;
            };
            task.in_flight = false;
            task.last_run = Some(done.started_at);
            self.stats.completed += 1;
            match &done.snapshot.outcome {
                Outcome::Error(msg) => {
                    self.stats.failed += 1;
                    tracing::warn!(domain = %done.domain, error = %msg, "status refresh failed");
                }
                Outcome::Ok(_) => {
                    tracing::debug!(
                        domain = %done.domain,
                        took_ms = done.started_at.elapsed().as_millis() as u64,
                        "status refreshed"
                    );
                }
            }
            self.published.push(Arc::new(done.snapshot));
        }
    }

    fn dispatch(&mut self, idx: usize, now: Instant) {
        let task = &mut self.tasks[idx];
        task.in_flight = true;
        task.forced = false;
        task.skip_noted = None;
        self.stats.dispatched += 1;

        let domain = task.domain;
        let producer = Arc::clone(&task.producer);
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("kioskterm-refresh-{}", domain.name()))
            .spawn(move || {
                let snapshot = run_producer(domain, producer.as_ref());
                // The receiver is gone once the dashboard quits; late results
                // are dropped.
                let _ = tx.send(Completion {
                    domain,
                    started_at: now,
                    snapshot,
                });
            });

        if let Err(err) = spawned {
            tracing::error!(domain = %domain, error = %err, "cannot start refresh worker");
            let task = &mut self.tasks[idx];
            task.in_flight = false;
            task.last_run = Some(now);
            self.stats.failed += 1;
            self.published.push(Arc::new(StatusSnapshot::error(
                domain,
                format!("cannot start worker: {err}"),
            )));
        }
    }
}

/// Run `producer`, turning errors and panics into error snapshots.
fn run_producer(domain: StatusDomain, producer: &dyn Producer) -> StatusSnapshot {
    match panic::catch_unwind(AssertUnwindSafe(|| producer.produce())) {
        Ok(Ok(payload)) => StatusSnapshot::ok(domain, payload),
        Ok(Err(err)) => StatusSnapshot::error(domain, err.to_string()),
        Err(panic) => StatusSnapshot::error(domain, format!("producer panicked: {}", panic_text(&*panic))),
    }
}

fn panic_text(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::TaskList;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tasks_ok() -> Result<StatusPayload, RefreshError> {
        Ok(StatusPayload::Tasks(TaskList::default()))
    }

    /// Collect until `n` snapshots are published or two seconds pass.
    fn wait_published(s: &mut RefreshScheduler, n: usize) -> Vec<Arc<StatusSnapshot>> {
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut out = Vec::new();
        while out.len() < n && Instant::now() < deadline {
            s.collect();
            out.extend(s.take_published());
            thread::sleep(Duration::from_millis(2));
        }
        out
    }

    #[test]
    fn first_tick_dispatches_every_task() {
        let mut s = RefreshScheduler::new();
        s.register(StatusDomain::Tasks, Arc::new(tasks_ok), Duration::from_secs(45));
        s.register(StatusDomain::Service, Arc::new(tasks_ok), Duration::from_secs(10));
        let now = Instant::now();
        assert_eq!(s.tick(now), 2);
        let published = wait_published(&mut s, 2);
        assert_eq!(published.len(), 2);
    }

    #[test]
    fn forty_five_unit_interval_is_respected() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut s = RefreshScheduler::new();
        s.register(
            StatusDomain::Tasks,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                tasks_ok()
            }),
            Duration::from_secs(45),
        );

        let t0 = Instant::now();
        let mut dispatch_times = Vec::new();
        for t in 0..=90u64 {
            let now = t0 + Duration::from_secs(t);
            if s.tick(now) > 0 {
                dispatch_times.push(t);
                // Let the worker finish before the next simulated second.
                wait_published(&mut s, 1);
            }
        }
        assert_eq!(dispatch_times, vec![0, 45, 90]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn force_refresh_dispatches_on_next_tick() {
        let mut s = RefreshScheduler::new();
        s.register(StatusDomain::Resources, Arc::new(tasks_ok), Duration::from_secs(60));
        let t0 = Instant::now();
        assert_eq!(s.tick(t0), 1);
        wait_published(&mut s, 1);

        let t1 = t0 + Duration::from_secs(1);
        assert_eq!(s.tick(t1), 0);
        s.force_refresh(DomainSelector::One(StatusDomain::Resources));
        assert_eq!(s.tick(t1), 1);
        assert!(!s.task(StatusDomain::Resources).is_some_and(|t| t.forced));
    }

    #[test]
    fn force_refresh_all_only_touches_matching_tasks() {
        let mut s = RefreshScheduler::new();
        s.register(StatusDomain::Service, Arc::new(tasks_ok), Duration::from_secs(60));
        s.register(StatusDomain::Tasks, Arc::new(tasks_ok), Duration::from_secs(60));
        s.force_refresh(DomainSelector::One(StatusDomain::Tasks));
        assert!(s.task(StatusDomain::Tasks).is_some_and(|t| t.forced));
        assert!(s.task(StatusDomain::Service).is_some_and(|t| !t.forced));
        s.force_refresh(DomainSelector::All);
        assert!(s.tasks().iter().all(|t| t.forced));
    }

    #[test]
    fn in_flight_task_is_never_dispatched_twice() {
        let gate = Arc::new(Barrier::new(2));
        let running = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let (g, r, m) = (Arc::clone(&gate), Arc::clone(&running), Arc::clone(&max_seen));
        let mut s = RefreshScheduler::new();
        s.register(
            StatusDomain::Service,
            Arc::new(move || {
                let now = r.fetch_add(1, Ordering::SeqCst) + 1;
                m.fetch_max(now, Ordering::SeqCst);
                g.wait();
                r.fetch_sub(1, Ordering::SeqCst);
                tasks_ok()
            }),
            Duration::from_millis(1),
        );

        let t0 = Instant::now();
        assert_eq!(s.tick(t0), 1);
        // Due on every tick, forced too, but still blocked on the barrier.
        s.force_refresh(DomainSelector::All);
        for i in 1..20u64 {
            assert_eq!(s.tick(t0 + Duration::from_secs(i)), 0);
        }
        assert_eq!(s.stats().skipped, 19);
        gate.wait();
        wait_published(&mut s, 1);

        // The pending force fires once the first run is collected.
        let later = t0 + Duration::from_secs(30);
        assert_eq!(s.tick(later), 1);
        gate.wait();
        wait_published(&mut s, 1);
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn slow_run_counts_one_skip_per_missed_interval() {
        let gate = Arc::new(Barrier::new(2));
        let g = Arc::clone(&gate);
        let mut s = RefreshScheduler::new();
        s.register(
            StatusDomain::Tasks,
            Arc::new(move || {
                g.wait();
                tasks_ok()
            }),
            Duration::from_secs(10),
        );

        let t0 = Instant::now();
        assert_eq!(s.tick(t0), 1);
        // 25 s of frames at 10 fps while the run hangs.
        for frame in 1..=250u64 {
            s.tick(t0 + Duration::from_millis(frame * 100));
        }
        assert_eq!(s.stats().skipped, 3);
        gate.wait();
        wait_published(&mut s, 1);
    }

    #[test]
    fn failing_producer_yields_error_snapshot_and_keeps_schedule() {
        let mut s = RefreshScheduler::new();
        s.register(
            StatusDomain::Tasks,
            Arc::new(|| Err(RefreshError::Http("503 Service Unavailable".into()))),
            Duration::from_secs(10),
        );
        s.register(StatusDomain::Service, Arc::new(tasks_ok), Duration::from_secs(10));

        let t0 = Instant::now();
        assert_eq!(s.tick(t0), 2);
        let published = wait_published(&mut s, 2);
        let failed = published
            .iter()
            .find(|snap| snap.domain == StatusDomain::Tasks)
            .expect("tasks snapshot");
        assert_eq!(
            failed.outcome,
            Outcome::Error("http: 503 Service Unavailable".into())
        );
        assert!(
            published
                .iter()
                .any(|snap| snap.domain == StatusDomain::Service && snap.is_ok())
        );

        // Retried at the next interval, not before.
        assert_eq!(s.tick(t0 + Duration::from_secs(5)), 0);
        assert_eq!(s.tick(t0 + Duration::from_secs(10)), 2);
        assert_eq!(s.stats().failed, 1);
    }

    #[test]
    fn panicking_producer_yields_error_snapshot() {
        let mut s = RefreshScheduler::new();
        s.register(
            StatusDomain::Resources,
            Arc::new(|| -> Result<StatusPayload, RefreshError> { panic!("sensor exploded") }),
            Duration::from_secs(10),
        );
        let t0 = Instant::now();
        s.tick(t0);
        let published = wait_published(&mut s, 1);
        assert_eq!(published.len(), 1);
        let msg = published[0].error_message().unwrap_or_default();
        assert!(msg.contains("sensor exploded"), "{msg}");
        assert!(!s.task(StatusDomain::Resources).is_some_and(|t| t.in_flight));
    }

    #[test]
    fn tick_returns_without_waiting_for_slow_producers() {
        let mut s = RefreshScheduler::new();
        s.register(
            StatusDomain::Tasks,
            Arc::new(|| {
                thread::sleep(Duration::from_millis(500));
                tasks_ok()
            }),
            Duration::from_secs(45),
        );
        let started = Instant::now();
        assert_eq!(s.tick(started), 1);
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(s.in_flight_count(), 1);
        assert!(s.take_published().is_empty());
    }
}
