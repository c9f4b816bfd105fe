use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::debounce::DebouncedCall;
use crate::observe::VisibilitySensor;

/// Turns "sentinel visible" into debounced next-page requests.
///
/// Inputs are edge-triggered: the pager only reconsiders when the pair
/// (visible, fetch in flight) changes, so repeated observations of the
/// same state never push the pending request back.
#[derive(Debug, Clone)]
pub struct VisibilityPager {
    call: DebouncedCall,
    last: Option<(bool, bool)>,
}

impl VisibilityPager {
    pub fn new(delay: Duration) -> Self {
        Self { call: DebouncedCall::new(delay), last: None }
    }

    /// Feed the current inputs. Returns true when a request got scheduled.
    pub fn observe(&mut self, visible: bool, fetch_in_flight: bool, now: Instant) -> bool {
        if self.last == Some((visible, fetch_in_flight)) {
            return false;
        }
        self.last = Some((visible, fetch_in_flight));
        if visible && !fetch_in_flight {
            self.call.call(now);
            return true;
        }
        if !visible {
            self.call.cancel();
        }
        false
    }

    /// True when the debounced request is due and may be issued. A request
    /// that comes due while a fetch is running is dropped; the fetch
    /// finishing is itself an input change that re-arms the pager.
    pub fn poll(&mut self, now: Instant, fetch_in_flight: bool) -> bool {
        self.call.poll(now) && !fetch_in_flight
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.call.deadline()
    }

    /// Drop any pending request and forget the last inputs.
    pub fn reset(&mut self) {
        self.call.cancel();
        self.last = None;
    }
}

/// One-way latch: becomes revealed the first time its sentinel is seen and
/// stays that way. Used to mount a feed lazily below other content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevealLatch {
    revealed: bool,
}

impl RevealLatch {
    /// Returns true only on the observation that flips the latch.
    pub fn observe(&mut self, visible: bool) -> bool {
        if visible && !self.revealed {
            self.revealed = true;
            return true;
        }
        false
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }
}

/// Wait for the first time `sensor` reports visible. Returns false if the
/// sensor drops its listener before that. The listener is released either way.
pub async fn wait_for_reveal<V: VisibilitySensor + ?Sized>(sensor: &V) -> bool {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _sub = sensor.register(tx);
    let mut latch = RevealLatch::default();
    while let Some(visible) = rx.recv().await {
        if latch.observe(visible) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(500);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn visible_and_idle_requests_after_delay() {
        let t0 = Instant::now();
        let mut pager = VisibilityPager::new(DELAY);
        assert!(pager.observe(true, false, t0));
        assert!(!pager.poll(t0 + ms(499), false));
        assert!(pager.poll(t0 + DELAY, false));
        assert!(!pager.poll(t0 + ms(2000), false));
    }

    #[test]
    fn flicker_while_in_flight_never_requests() {
        let t0 = Instant::now();
        let mut pager = VisibilityPager::new(DELAY);
        let mut fired = 0;
        let steps = [(true, true), (false, true), (true, true), (false, true), (true, true)];
        for (i, (visible, busy)) in steps.into_iter().enumerate() {
            let now = t0 + ms(100 * i as u64);
            assert!(!pager.observe(visible, busy, now));
            if pager.poll(now + DELAY, busy) {
                fired += 1;
            }
        }
        assert_eq!(fired, 0);

        let done = t0 + ms(1000);
        assert!(pager.observe(true, false, done));
        assert!(pager.poll(done + DELAY, false));
    }

    #[test]
    fn fast_flicker_collapses_into_one_request() {
        let t0 = Instant::now();
        let mut pager = VisibilityPager::new(DELAY);
        pager.observe(true, false, t0);
        pager.observe(false, false, t0 + ms(50));
        pager.observe(true, false, t0 + ms(100));
        assert_eq!(pager.deadline(), Some(t0 + ms(600)));
        assert!(!pager.poll(t0 + ms(550), false));
        assert!(pager.poll(t0 + ms(600), false));
    }

    #[test]
    fn scrolling_away_cancels_the_pending_request() {
        let t0 = Instant::now();
        let mut pager = VisibilityPager::new(DELAY);
        pager.observe(true, false, t0);
        pager.observe(false, false, t0 + ms(200));
        assert!(pager.deadline().is_none());
        assert!(!pager.poll(t0 + ms(1000), false));
    }

    #[test]
    fn due_request_is_dropped_if_fetch_started_meanwhile() {
        let t0 = Instant::now();
        let mut pager = VisibilityPager::new(DELAY);
        pager.observe(true, false, t0);
        assert!(!pager.poll(t0 + DELAY, true));
        assert!(pager.deadline().is_none());
    }

    #[test]
    fn identical_observations_do_not_reschedule() {
        let t0 = Instant::now();
        let mut pager = VisibilityPager::new(DELAY);
        assert!(pager.observe(true, false, t0));
        assert!(!pager.observe(true, false, t0 + ms(400)));
        assert!(pager.poll(t0 + DELAY, false));
        pager.reset();
        assert!(pager.observe(true, false, t0 + ms(600)));
    }

    #[test]
    fn latch_reveals_once() {
        let mut latch = RevealLatch::default();
        assert!(!latch.observe(false));
        assert!(latch.observe(true));
        assert!(!latch.observe(false));
        assert!(!latch.observe(true));
        assert!(latch.is_revealed());
    }

    #[tokio::test(start_paused = true)]
    async fn reveal_waits_for_the_sentinel_then_unregisters() {
        use crate::observe::ManualSensor;

        let sensor = ManualSensor::new();
        let scroller = async {
            tokio::time::sleep(ms(300)).await;
            sensor.set_visible(false);
            tokio::time::sleep(ms(300)).await;
            sensor.set_visible(true);
        };
        let t0 = Instant::now();
        let (revealed, ()) = tokio::join!(wait_for_reveal(&sensor), scroller);
        assert!(revealed);
        assert_eq!(t0.elapsed(), ms(600));
        assert_eq!(sensor.listener_count(), 0);
    }

    #[tokio::test]
    async fn reveal_gives_up_when_the_sensor_goes_away() {
        use crate::observe::Subscription;

        struct Detached;
        impl VisibilitySensor for Detached {
            fn register(&self, _listener: mpsc::UnboundedSender<bool>) -> Subscription {
                Subscription::noop()
            }
        }
        assert!(!wait_for_reveal(&Detached).await);
    }
}
