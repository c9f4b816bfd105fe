//! Cancelable trailing-edge timers.
//!
//! Nothing here sleeps. Every operation takes the current instant, and the
//! owner asks for [`Timer::deadline`] to know when to come back. Tests drive
//! the timers with hand-built instants; the async coordinator drives them
//! from tokio's clock.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    /// Start the timer, replacing any pending deadline.
    pub fn start(&mut self, now: Instant, delay: Duration) -> Instant {
        let deadline = now + delay;
        self.deadline = Some(deadline);
        deadline
    }

    /// Returns whether a pending deadline was dropped.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the deadline if it has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(d) if d <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same value as the live one; nothing changed.
    Unchanged,
    /// Live came back to the committed value; the pending commit was dropped.
    Converged,
    /// A commit is scheduled for the given instant.
    Scheduled(Instant),
}

/// A value with a live side and a committed side that trails it by `delay`.
#[derive(Debug, Clone)]
pub struct Debounced<T> {
    live: T,
    committed: T,
    delay: Duration,
    timer: Timer,
}

impl<T: Clone + PartialEq> Debounced<T> {
    /// The initial value is committed straight away.
    pub fn new(initial: T, delay: Duration) -> Self {
        Self { live: initial.clone(), committed: initial, delay, timer: Timer::default() }
    }

    pub fn set(&mut self, value: T, now: Instant) -> Transition {
        if value == self.live {
            return Transition::Unchanged;
        }
        self.live = value;
        if self.live == self.committed {
            self.timer.cancel();
            return Transition::Converged;
        }
        Transition::Scheduled(self.timer.start(now, self.delay))
    }

    /// Commit the live value if its delay elapsed. Returns the new committed value.
    pub fn poll(&mut self, now: Instant) -> Option<&T> {
        if !self.timer.fire(now) {
            return None;
        }
        self.committed = self.live.clone();
        Some(&self.committed)
    }

    pub fn live(&self) -> &T {
        &self.live
    }

    pub fn committed(&self) -> &T {
        &self.committed
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }
}

/// Debounced invocation: each call pushes the single trailing fire back.
#[derive(Debug, Clone)]
pub struct DebouncedCall {
    delay: Duration,
    timer: Timer,
}

impl DebouncedCall {
    pub fn new(delay: Duration) -> Self {
        Self { delay, timer: Timer::default() }
    }

    pub fn call(&mut self, now: Instant) -> Instant {
        self.timer.start(now, self.delay)
    }

    pub fn cancel(&mut self) -> bool {
        self.timer.cancel()
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        self.timer.fire(now)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(500);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn burst_of_changes_commits_once_to_last_value() {
        let t0 = Instant::now();
        let mut d = Debounced::new("a", DELAY);
        let mut commits = Vec::new();

        for (i, v) in ["b", "c", "d", "e"].into_iter().enumerate() {
            let now = t0 + ms(100 * i as u64);
            assert!(matches!(d.set(v, now), Transition::Scheduled(_)));
            if let Some(c) = d.poll(now) {
                commits.push(*c);
            }
        }
        let last = t0 + ms(300);
        assert_eq!(d.deadline(), Some(last + DELAY));
        assert!(d.poll(last + ms(499)).is_none());
        commits.extend(d.poll(last + DELAY).copied());
        assert!(d.poll(last + ms(2000)).is_none());

        assert_eq!(commits, vec!["e"]);
        assert_eq!(*d.committed(), "e");
    }

    #[test]
    fn returning_to_committed_cancels_pending_commit() {
        let t0 = Instant::now();
        let mut d = Debounced::new(1, DELAY);
        assert!(matches!(d.set(2, t0), Transition::Scheduled(_)));
        assert_eq!(d.set(1, t0 + ms(100)), Transition::Converged);
        assert!(d.deadline().is_none());
        assert!(d.poll(t0 + ms(5000)).is_none());
        assert_eq!(*d.committed(), 1);
    }

    #[test]
    fn repeating_live_value_does_not_push_deadline() {
        let t0 = Instant::now();
        let mut d = Debounced::new(0, DELAY);
        d.set(5, t0);
        assert_eq!(d.set(5, t0 + ms(400)), Transition::Unchanged);
        assert_eq!(d.poll(t0 + DELAY), Some(&5));
    }

    #[test]
    fn debounced_call_fires_once_after_last_call() {
        let t0 = Instant::now();
        let mut call = DebouncedCall::new(DELAY);
        call.call(t0);
        call.call(t0 + ms(200));
        assert!(!call.poll(t0 + ms(600)));
        assert!(call.poll(t0 + ms(700)));
        assert!(!call.poll(t0 + ms(900)));

        call.call(t0 + ms(1000));
        assert!(call.cancel());
        assert!(!call.poll(t0 + ms(5000)));
    }
}
