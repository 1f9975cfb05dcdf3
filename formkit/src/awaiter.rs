//! Polled completion: work that is checked for done-ness on a timer tick
//! rather than signalled.

use std::io;
use std::process::{Child, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A "done yet?" predicate. Polling must never block.
pub trait Awaiter {
    fn is_done(&mut self) -> bool;
}

impl<F: FnMut() -> bool> Awaiter for F {
    fn is_done(&mut self) -> bool {
        self()
    }
}

/// Done once a fixed amount of wall-clock time has passed since creation.
#[derive(Debug, Clone, Copy)]
pub struct TimedAwaiter {
    deadline: Instant,
}

impl TimedAwaiter {
    pub fn new(duration: Duration) -> Self {
        Self {
            deadline: Instant::now() + duration,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

impl Awaiter for TimedAwaiter {
    fn is_done(&mut self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Done once the paired [`DoneSignal`] fires, from any thread.
#[derive(Debug, Clone)]
pub struct FlagAwaiter {
    flag: Arc<AtomicBool>,
}

#[derive(Debug, Clone)]
pub struct DoneSignal {
    flag: Arc<AtomicBool>,
}

impl FlagAwaiter {
    pub fn new() -> (Self, DoneSignal) {
        let flag = Arc::new(AtomicBool::new(false));
        (Self { flag: flag.clone() }, DoneSignal { flag })
    }
}

impl Awaiter for FlagAwaiter {
    fn is_done(&mut self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl DoneSignal {
    pub fn done(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

/// A readiness check paired with the action to run once ready.
pub trait RunAfter {
    fn is_ready(&mut self) -> bool;
    fn run(self: Box<Self>);
}

/// Waits for a child process to exit, then hands its status to a
/// continuation.
pub struct ProcessRunAfter {
    child: Child,
    status: Option<io::Result<ExitStatus>>,
    then: Box<dyn FnOnce(io::Result<ExitStatus>)>,
}

impl ProcessRunAfter {
    pub fn new(child: Child, then: impl FnOnce(io::Result<ExitStatus>) + 'static) -> Self {
        Self {
            child,
            status: None,
            then: Box::new(then),
        }
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

impl RunAfter for ProcessRunAfter {
    fn is_ready(&mut self) -> bool {
        if self.status.is_some() {
            return true;
        }

        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.status = Some(Ok(status));
                true
            }
            Ok(None) => false,
            Err(err) => {
                self.status = Some(Err(err));
                true
            }
        }
    }

    fn run(mut self: Box<Self>) {
        let status = match self.status.take() {
            Some(status) => status,
            None => self.child.wait(),
        };
        (self.then)(status);
    }
}

/// Drives a [`RunAfter`] from anything that polls an [`Awaiter`]: the action
/// runs on the first poll that finds it ready, and the awaiter reports done
/// from then on.
pub struct RunAfterAwaiter {
    pending: Option<Box<dyn RunAfter>>,
}

impl RunAfterAwaiter {
    pub fn new(run_after: impl RunAfter + 'static) -> Self {
        Self {
            pending: Some(Box::new(run_after)),
        }
    }
}

impl Awaiter for RunAfterAwaiter {
    fn is_done(&mut self) -> bool {
        let Some(run_after) = self.pending.as_mut() else {
            return true;
        };

        if !run_after.is_ready() {
            return false;
        }

        if let Some(run_after) = self.pending.take() {
            run_after.run();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn timed_awaiter_with_zero_duration_is_done() {
        let mut awaiter = TimedAwaiter::new(Duration::ZERO);
        assert!(awaiter.is_done());
        assert_eq!(awaiter.remaining(), Duration::ZERO);
    }

    #[test]
    fn timed_awaiter_waits_for_deadline() {
        let mut awaiter = TimedAwaiter::new(Duration::from_secs(3600));
        assert!(!awaiter.is_done());
    }

    #[test]
    fn flag_awaiter_sees_signal_from_another_thread() {
        let (mut awaiter, signal) = FlagAwaiter::new();
        assert!(!awaiter.is_done());

        std::thread::spawn(move || signal.done())
            .join()
            .expect("signal thread");
        assert!(awaiter.is_done());
    }

    struct Countdown {
        polls_left: u32,
        ran: Rc<Cell<u32>>,
    }

    impl RunAfter for Countdown {
        fn is_ready(&mut self) -> bool {
            if self.polls_left == 0 {
                return true;
            }
            self.polls_left -= 1;
            false
        }

        fn run(self: Box<Self>) {
            self.ran.set(self.ran.get() + 1);
        }
    }

    #[test]
    fn run_after_awaiter_runs_action_once() {
        let ran = Rc::new(Cell::new(0));
        let mut awaiter = RunAfterAwaiter::new(Countdown {
            polls_left: 2,
            ran: ran.clone(),
        });

        assert!(!awaiter.is_done());
        assert!(!awaiter.is_done());
        assert_eq!(ran.get(), 0);
        assert!(awaiter.is_done());
        assert!(awaiter.is_done());
        assert_eq!(ran.get(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn process_run_after_reports_exit_status() {
        let child = std::process::Command::new("true")
            .spawn()
            .expect("spawn true");
        let seen = Rc::new(Cell::new(None));
        let sink = seen.clone();
        let mut run_after = ProcessRunAfter::new(child, move |status| {
            sink.set(status.ok().map(|status| status.success()));
        });

        let deadline = Instant::now() + Duration::from_secs(10);
        while !run_after.is_ready() {
            assert!(Instant::now() < deadline, "child did not exit");
            std::thread::sleep(Duration::from_millis(5));
        }
        Box::new(run_after).run();
        assert_eq!(seen.get(), Some(true));
    }
}
