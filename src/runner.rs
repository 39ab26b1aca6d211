//! Paced execution of a Baby session.
//!
//! The [`RunController`] owns the session behind a mutex. Continuous runs
//! happen on a worker thread that takes the lock for exactly one cycle at a
//! time, so `step`, `pause` and `reset` never observe a half-executed
//! instruction. The wait between cycles is the only point where a run can
//! be cancelled.
//!
//! Observers read [`RunEvent`]s from the channel returned by
//! [`RunController::events`]. The queue holds at most [`EVENT_CAPACITY`]
//! events: a run that finds it full waits at the cycle boundary until an
//! observer catches up or the run is paused.

use crate::cpu::{Baby, CycleEvent};
use crate::asm::snapshot::Snapshot;
use crossbeam_channel as cbc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Events queued before a run waits for observers.
pub const EVENT_CAPACITY: usize = 1024;

/// Notifications published by the run controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// One cycle completed.
    Cycle(CycleEvent),
    /// A run ended because STP executed (or the machine was already halted).
    Halted(Snapshot),
    /// A run was cancelled by `pause` or `reset`, or spent its cycle budget.
    Paused(Snapshot),
}

/// A run in progress.
struct Worker {
    stop: cbc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Step/run/pause/reset control over a single session.
pub struct RunController {
    machine: Arc<Mutex<Baby>>,
    events_tx: cbc::Sender<RunEvent>,
    events_rx: cbc::Receiver<RunEvent>,
    worker: Option<Worker>,
}

fn lock(machine: &Mutex<Baby>) -> MutexGuard<'_, Baby> {
    // A cycle holds the lock without unwinding points, so a poisoned
    // session is still consistent
    machine.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Queue an event without blocking, dropping the oldest one if full.
fn publish(tx: &cbc::Sender<RunEvent>, rx: &cbc::Receiver<RunEvent>, mut event: RunEvent) {
    loop {
        match tx.try_send(event) {
            Ok(()) | Err(cbc::TrySendError::Disconnected(_)) => return,
            Err(cbc::TrySendError::Full(back)) => {
                let _ = rx.try_recv();
                event = back;
            }
        }
    }
}

impl RunController {
    /// Take ownership of a session.
    pub fn new(machine: Baby) -> Self {
        let (events_tx, events_rx) = cbc::bounded(EVENT_CAPACITY);
        Self {
            machine: Arc::new(Mutex::new(machine)),
            events_tx,
            events_rx,
            worker: None,
        }
    }

    /// Receiver for cycle and run-state events.
    ///
    /// All receivers share one queue; each event goes to one of them.
    pub fn events(&self) -> cbc::Receiver<RunEvent> {
        self.events_rx.clone()
    }

    /// True while a run is in progress.
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Execute exactly one cycle, pausing any run first.
    ///
    /// Returns `None` if the machine is halted.
    pub fn step(&mut self) -> Option<CycleEvent> {
        self.pause();
        let event = lock(&self.machine).step()?;
        publish(&self.events_tx, &self.events_rx, RunEvent::Cycle(event.clone()));
        Some(event)
    }

    /// Start running, waiting `delay` after each cycle.
    ///
    /// Does nothing if a run is already in progress.
    pub fn run(&mut self, delay: Duration) {
        self.start(delay, None);
    }

    /// Like [`run`](Self::run), but pause after `max_cycles` cycles.
    pub fn run_limited(&mut self, delay: Duration, max_cycles: u64) {
        self.start(delay, Some(max_cycles));
    }

    fn start(&mut self, delay: Duration, budget: Option<u64>) {
        if self.is_running() {
            return;
        }
        // Reap a worker that finished on its own
        self.join_worker();

        let (stop_tx, stop_rx) = cbc::bounded::<()>(1);
        let machine = Arc::clone(&self.machine);
        let events_tx = self.events_tx.clone();
        let events_rx = self.events_rx.clone();

        log::info!("Run started, {:?} between cycles, limit {:?}", delay, budget);

        let handle = std::thread::spawn(move || {
            let mut executed = 0u64;
            loop {
                if budget.is_some_and(|max| executed >= max) {
                    break;
                }
                let Some(event) = lock(&machine).step() else {
                    break;
                };
                executed += 1;
                let halted = event.halted();

                // Wait for room in the queue unless told to stop
                let stopped = cbc::select! {
                    send(events_tx, RunEvent::Cycle(event)) -> _ => false,
                    recv(stop_rx) -> _ => true,
                };
                if stopped || halted {
                    break;
                }

                // Suspension point: sleep for `delay` unless told to stop
                match stop_rx.recv_timeout(delay) {
                    Err(cbc::RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(cbc::RecvTimeoutError::Disconnected) => break,
                }
            }

            let snapshot = lock(&machine).export_snapshot();
            if snapshot.stop {
                log::info!("Run ended: machine halted after {} cycles", executed);
                publish(&events_tx, &events_rx, RunEvent::Halted(snapshot));
            } else {
                log::info!("Run paused after {} cycles", executed);
                publish(&events_tx, &events_rx, RunEvent::Paused(snapshot));
            }
        });

        self.worker = Some(Worker { stop: stop_tx, handle });
    }

    /// Stop a run at the next cycle boundary and wait for it to finish.
    pub fn pause(&mut self) {
        if let Some(worker) = &self.worker {
            let _ = worker.stop.try_send(());
        }
        self.join_worker();
    }

    /// Pause, then reset the accumulator and control unit.
    pub fn reset(&mut self) {
        self.pause();
        lock(&self.machine).reset();
        log::debug!("Session reset");
    }

    /// Block until the current run ends by itself, then return the state.
    ///
    /// Returns at once if nothing is running. A run ends by itself only when
    /// STP executes or a [`run_limited`](Self::run_limited) budget is spent,
    /// and it cannot get past a full event queue. Waiting on an unlimited run
    /// of a program that never halts blocks forever.
    pub fn wait(&mut self) -> Snapshot {
        self.join_worker();
        self.snapshot()
    }

    /// Current machine state.
    pub fn snapshot(&self) -> Snapshot {
        lock(&self.machine).export_snapshot()
    }

    /// Run `f` with exclusive access to the session, pausing any run first.
    pub fn with_machine<R>(&mut self, f: impl FnOnce(&mut Baby) -> R) -> R {
        self.pause();
        f(&mut lock(&self.machine))
    }

    fn join_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.handle.join().is_err() {
                log::warn!("Run worker panicked");
            }
        }
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        self.pause();
    }
}

impl std::fmt::Debug for RunController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunController")
            .field("running", &self.is_running())
            .field("machine", &*lock(&self.machine))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(source: &str) -> RunController {
        let mut baby = Baby::new();
        baby.load_program(source).unwrap();
        RunController::new(baby)
    }

    #[test]
    fn test_run_to_halt() {
        let mut rc = controller("0: LDN 3\n1: STO 4\n2: STP\n3: 7\n4: 0");
        let events = rc.events();

        rc.run(Duration::ZERO);
        let snap = rc.wait();

        assert!(snap.stop);
        assert_eq!(snap.store[4].to_i32(), -7);
        assert_eq!(snap.control_instruction, 3);

        let received: Vec<RunEvent> = events.try_iter().collect();
        assert_eq!(received.len(), 4);
        assert!(matches!(received[0], RunEvent::Cycle(ref e) if e.line == 0));
        assert!(matches!(received[3], RunEvent::Halted(_)));
    }

    #[test]
    fn test_run_when_halted_changes_nothing() {
        let mut rc = controller("STP");
        let events = rc.events();
        rc.run(Duration::ZERO);
        let first = rc.wait();
        assert_eq!(events.try_iter().count(), 2);

        rc.run(Duration::ZERO);
        let second = rc.wait();

        assert_eq!(first, second);
        let received: Vec<RunEvent> = events.try_iter().collect();
        assert_eq!(received, vec![RunEvent::Halted(second)]);
    }

    #[test]
    fn test_pause_stops_endless_loop() {
        // JMP 0 forever
        let mut rc = controller("JMP 0");
        let events = rc.events();

        rc.run(Duration::from_millis(1));
        let _ = events.recv_timeout(Duration::from_secs(5));
        rc.pause();

        assert!(!rc.is_running());
        let snap = rc.snapshot();
        assert!(!snap.stop);
        assert_eq!(snap.control_instruction, 0);
        assert!(events.try_iter().any(|e| matches!(e, RunEvent::Paused(_))));
    }

    #[test]
    fn test_step_pauses_run() {
        let mut rc = controller("JMP 1\nJMP 0");
        rc.run(Duration::from_secs(60));

        // The worker is parked in its delay; step must cancel it first
        let event = rc.step().unwrap();
        assert!(!rc.is_running());
        assert!(event.line <= 1);
    }

    #[test]
    fn test_step_and_reset() {
        let mut rc = controller("LDN 2\nSTP\nNUM 5");

        let event = rc.step().unwrap();
        assert_eq!(event.snapshot.accumulator.to_i32(), -5);
        rc.step().unwrap();
        assert!(rc.step().is_none());

        rc.reset();
        let snap = rc.snapshot();
        assert!(!snap.stop);
        assert_eq!(snap.control_instruction, 0);
        assert_eq!(snap.store[2].to_i32(), 5);
    }

    #[test]
    fn test_with_machine_loads() {
        let mut rc = controller("STP");
        rc.with_machine(|baby| baby.load_program("LDN nowhere"))
            .unwrap_err();
        let loaded = rc.with_machine(|baby| baby.load_program("LDN 2\nSTP\nNUM 1"));
        assert!(loaded.is_ok());

        rc.run(Duration::ZERO);
        let snap = rc.wait();
        assert_eq!(snap.accumulator.to_i32(), -1);
    }

    #[test]
    fn test_event_queue_stays_bounded() {
        let mut rc = controller("JMP 0");
        let events = rc.events();

        // Nobody reads: the run must stall at the cycle boundary
        rc.run(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(200));
        assert!(events.len() <= EVENT_CAPACITY);
        assert!(rc.is_running());

        rc.pause();
        assert!(events.len() <= EVENT_CAPACITY);
        assert!(rc.with_machine(|baby| baby.cycles) <= EVENT_CAPACITY as u64 + 1);

        let snap = rc.snapshot();
        assert_eq!(events.try_iter().last(), Some(RunEvent::Paused(snap)));
    }

    #[test]
    fn test_run_limited_stops_at_budget() {
        let mut rc = controller("JMP 0");
        let events = rc.events();

        rc.run_limited(Duration::ZERO, 10);
        let snap = rc.wait();

        assert!(!snap.stop);
        assert_eq!(rc.with_machine(|baby| baby.cycles), 10);
        let received: Vec<RunEvent> = events.try_iter().collect();
        assert_eq!(received.len(), 11);
        assert!(received[..10].iter().all(|e| matches!(e, RunEvent::Cycle(_))));
        assert_eq!(received[10], RunEvent::Paused(snap));
    }

    #[test]
    fn test_run_limited_halting_within_budget() {
        let mut rc = controller("LDN 2\nSTP\nNUM 3");
        let events = rc.events();

        rc.run_limited(Duration::ZERO, 2);
        let snap = rc.wait();

        assert!(snap.stop);
        assert_eq!(snap.accumulator.to_i32(), -3);
        assert!(matches!(events.try_iter().last(), Some(RunEvent::Halted(_))));
    }
}
